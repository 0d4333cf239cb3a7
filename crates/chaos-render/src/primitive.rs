//! Primitive types emitted by particle layers and the draw calls they turn into

use serde::Deserialize;

/// The shape a layer emits per primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveType {
    /// Three vertices, drawn as-is
    Triangle,
    /// Six vertices forming two triangles, drawn as-is
    TrianglePair,
    /// Four corner vertices, expanded to two triangles through the shared
    /// quad index buffer
    Quad,
}

impl PrimitiveType {
    pub fn vertices_per_primitive(self) -> usize {
        match self {
            PrimitiveType::Triangle => 3,
            PrimitiveType::TrianglePair => 6,
            PrimitiveType::Quad => 4,
        }
    }

    pub fn is_indexed(self) -> bool {
        matches!(self, PrimitiveType::Quad)
    }
}

/// GPU primitive topology of a draw call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    TriangleList,
}

impl Topology {
    pub fn to_wgpu(self) -> wgpu::PrimitiveTopology {
        match self {
            Topology::TriangleList => wgpu::PrimitiveTopology::TriangleList,
        }
    }
}

/// Parameters of one draw call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawPrimitive {
    pub topology: Topology,
    /// Index count when `indexed`, vertex count otherwise
    pub count: u32,
    /// First index (indexed) or first vertex (non-indexed)
    pub start: u32,
    /// Added to every index fetched from the index buffer
    pub base_vertex_index: i32,
    pub indexed: bool,
}

/// Split `quad_count` quads into indexed draws of at most `max_quads_per_draw`
/// quads each, all sharing one index buffer. An index buffer with room for no
/// quads yields no draws.
pub fn quad_draw_primitives(quad_count: usize, max_quads_per_draw: usize) -> Vec<DrawPrimitive> {
    let max = max_quads_per_draw;
    if max == 0 {
        return Vec::new();
    }
    let mut primitives = Vec::with_capacity(quad_count.div_ceil(max));

    let mut remaining = quad_count;
    let mut base_vertex_index = 0usize;
    while remaining > 0 {
        let count = remaining.min(max);
        primitives.push(DrawPrimitive {
            topology: Topology::TriangleList,
            count: (count * 6) as u32,
            start: 0,
            base_vertex_index: base_vertex_index as i32,
            indexed: true,
        });
        base_vertex_index += 4 * count;
        remaining -= count;
    }
    primitives
}

/// One non-indexed draw over `vertex_count` vertices (empty when zero)
pub fn vertex_draw_primitives(vertex_count: usize) -> Vec<DrawPrimitive> {
    if vertex_count == 0 {
        return Vec::new();
    }
    vec![DrawPrimitive {
        topology: Topology::TriangleList,
        count: vertex_count as u32,
        start: 0,
        base_vertex_index: 0,
        indexed: false,
    }]
}
