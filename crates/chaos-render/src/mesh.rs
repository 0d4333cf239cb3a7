//! Per-frame renderable units produced by primitive outputs

use crate::device::GpuBuffer;
use crate::material::RenderMaterial;
use crate::primitive::DrawPrimitive;
use crate::vertex::VertexLayout;
use std::rc::Rc;

/// Buffers, layout, material and draw calls for one flushed batch
pub struct MeshElement {
    pub vertex_buffer: Rc<GpuBuffer>,
    pub index_buffer: Option<Rc<GpuBuffer>>,
    pub vertex_layout: VertexLayout,
    pub material: Option<Rc<RenderMaterial>>,
    pub primitives: Vec<DrawPrimitive>,
    /// Bytes of `vertex_buffer` holding this element's vertices
    pub vertex_bytes: usize,
}

impl MeshElement {
    pub fn vertex_count(&self) -> usize {
        self.vertex_bytes / self.vertex_layout.stride.max(1)
    }
}

/// Ordered mesh elements for the current frame.
///
/// Holding a dynamic mesh keeps its vertex buffers out of the buffer cache;
/// drop it (or call `clear`) once the frame has been submitted.
#[derive(Default)]
pub struct DynamicMesh {
    elements: Vec<MeshElement>,
}

impl DynamicMesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, element: MeshElement) {
        self.elements.push(element);
    }

    pub fn elements(&self) -> &[MeshElement] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn clear(&mut self) {
        self.elements.clear();
    }

    /// Total draw calls the renderer will issue for this mesh
    pub fn draw_call_count(&self) -> usize {
        self.elements.iter().map(|e| e.primitives.len()).sum()
    }

    pub fn vertex_count(&self) -> usize {
        self.elements.iter().map(MeshElement::vertex_count).sum()
    }

    /// Append another mesh's elements, keeping their order
    pub fn append(&mut self, other: &mut DynamicMesh) {
        self.elements.append(&mut other.elements);
    }
}

impl IntoIterator for DynamicMesh {
    type Item = MeshElement;
    type IntoIter = std::vec::IntoIter<MeshElement>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.into_iter()
    }
}
