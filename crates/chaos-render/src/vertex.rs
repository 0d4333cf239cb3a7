//! Vertex formats written by primitive outputs

use bytemuck::{Pod, Zeroable};

/// Stride and attributes of a vertex buffer, carried by each mesh element
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexLayout {
    pub stride: usize,
    pub attributes: &'static [wgpu::VertexAttribute],
}

impl VertexLayout {
    pub fn desc(&self) -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: self.stride as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: self.attributes,
        }
    }
}

/// A plain-data vertex type that knows its GPU layout
pub trait VertexFormat: Pod {
    const ATTRIBUTES: &'static [wgpu::VertexAttribute];

    fn layout() -> VertexLayout {
        VertexLayout {
            stride: std::mem::size_of::<Self>(),
            attributes: Self::ATTRIBUTES,
        }
    }
}

/// Default particle vertex: 2D position, atlas texcoord (u, v, page), color
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ParticleVertex {
    pub position: [f32; 2],
    pub texcoord: [f32; 3],
    pub color: [f32; 4],
}

const PARTICLE_VERTEX_ATTRIBS: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
    0 => Float32x2,   // position
    1 => Float32x3,   // texcoord + page
    2 => Float32x4,   // color
];

impl VertexFormat for ParticleVertex {
    const ATTRIBUTES: &'static [wgpu::VertexAttribute] = &PARTICLE_VERTEX_ATTRIBS;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn particle_vertex_layout() {
        assert_eq!(std::mem::size_of::<ParticleVertex>(), 36);
        let layout = ParticleVertex::layout();
        assert_eq!(layout.stride, 36);
        assert_eq!(layout.attributes.len(), 3);
        assert_eq!(layout.attributes[2].offset, 20);
        assert_eq!(layout.desc().array_stride, 36);
    }
}
