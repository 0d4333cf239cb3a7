//! Batching writer that turns particles into vertex buffers and draw calls
//!
//! A `PrimitiveOutput` checks a vertex buffer out of the `BufferCache`,
//! stages vertices for it, and on flush uploads them and appends a
//! `MeshElement` to the frame's `DynamicMesh`. A batch that outgrows its
//! buffer is flushed and continues in a fresh one.

use crate::buffer_cache::BufferCache;
use crate::device::{BufferUsage, GpuBuffer};
use crate::mesh::{DynamicMesh, MeshElement};
use crate::material::RenderMaterial;
use crate::primitive::{quad_draw_primitives, vertex_draw_primitives, PrimitiveType};
use crate::resources::GpuResources;
use crate::vertex::VertexFormat;
use bytemuck::Zeroable;
use std::ops::Range;
use std::rc::Rc;
use tracing::{debug, warn};

/// Primitives' worth of vertices reserved when the caller gives no estimate
pub const DEFAULT_PRIMITIVE_HINT: usize = 30;

/// Upper bound for a buffer sized from an estimate
pub const DEFAULT_MAX_VERTEX_BUFFER_BYTES: usize = 4 * 1024 * 1024;

/// Buffer sizing policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputLimits {
    pub default_primitive_hint: usize,
    /// Ceiling for estimated buffer sizes. A single request larger than this
    /// still gets a buffer that fits it.
    pub max_buffer_bytes: usize,
}

impl Default for OutputLimits {
    fn default() -> Self {
        Self {
            default_primitive_hint: DEFAULT_PRIMITIVE_HINT,
            max_buffer_bytes: DEFAULT_MAX_VERTEX_BUFFER_BYTES,
        }
    }
}

pub struct PrimitiveOutput<'a, V: VertexFormat> {
    resources: &'a GpuResources,
    cache: &'a mut BufferCache,
    mesh: &'a mut DynamicMesh,
    primitive_type: PrimitiveType,
    material: Option<Rc<RenderMaterial>>,
    limits: OutputLimits,
    /// Vertices the caller still expects to write
    vertex_hint: usize,
    buffer: Option<Rc<GpuBuffer>>,
    /// Capacity of `buffer`, in vertices
    buffer_vertices: usize,
    staging: Vec<V>,
    flushed_elements: usize,
    dropped_requests: usize,
}

impl<'a, V: VertexFormat> PrimitiveOutput<'a, V> {
    pub fn new(
        resources: &'a GpuResources,
        cache: &'a mut BufferCache,
        mesh: &'a mut DynamicMesh,
        primitive_type: PrimitiveType,
        material: Option<Rc<RenderMaterial>>,
    ) -> Self {
        Self {
            resources,
            cache,
            mesh,
            primitive_type,
            material,
            limits: OutputLimits::default(),
            vertex_hint: 0,
            buffer: None,
            buffer_vertices: 0,
            staging: Vec::new(),
            flushed_elements: 0,
            dropped_requests: 0,
        }
    }

    pub fn with_limits(mut self, limits: OutputLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Number of vertices the caller expects to write. Used to size the next
    /// buffer so that a whole layer usually fits in one.
    pub fn set_vertex_hint(&mut self, vertices: usize) {
        self.vertex_hint = vertices;
    }

    pub fn primitive_type(&self) -> PrimitiveType {
        self.primitive_type
    }

    /// Vertices staged since the last flush
    pub fn pending_vertices(&self) -> usize {
        self.staging.len()
    }

    /// Capacity in bytes of the buffer currently checked out, if any
    pub fn buffer_capacity(&self) -> Option<usize> {
        self.buffer.as_ref().map(|b| b.capacity())
    }

    pub fn flushed_elements(&self) -> usize {
        self.flushed_elements
    }

    /// Requests dropped because no buffer could be acquired
    pub fn dropped_requests(&self) -> usize {
        self.dropped_requests
    }

    /// Reserve `required_size` bytes of vertex data and return them for
    /// writing. `None` means no buffer could be acquired: skip the primitive.
    pub fn generate_primitive(&mut self, required_size: usize) -> Option<&mut [V]> {
        let range = self.reserve(required_size)?;
        Some(&mut self.staging[range])
    }

    /// Vertices for one primitive of this output's type
    pub fn add_primitive(&mut self) -> Option<&mut [V]> {
        self.add_primitives(1)
    }

    pub fn add_primitives(&mut self, count: usize) -> Option<&mut [V]> {
        self.add_vertices(count.saturating_mul(self.primitive_type.vertices_per_primitive()))
    }

    pub fn add_vertices(&mut self, count: usize) -> Option<&mut [V]> {
        self.generate_primitive(count.saturating_mul(std::mem::size_of::<V>()))
    }

    /// Vertex range in the staging area for the next `required_size` bytes.
    /// The size must be a whole number of vertices.
    fn reserve(&mut self, required_size: usize) -> Option<Range<usize>> {
        let vertex_size = std::mem::size_of::<V>();
        if vertex_size == 0 || required_size % vertex_size != 0 {
            debug!(required_size, vertex_size, "request is not a whole number of vertices");
            self.dropped_requests += 1;
            return None;
        }
        let vertex_count = required_size / vertex_size;

        let fits = self
            .staging
            .len()
            .checked_add(vertex_count)
            .is_some_and(|end| end <= self.buffer_vertices);
        if self.buffer.is_some() && !fits {
            self.flush();
        }
        if self.buffer.is_none() && !self.acquire_buffer(vertex_count) {
            if self.dropped_requests == 0 {
                warn!(
                    required_size,
                    "no vertex buffer available, dropping primitives for this batch"
                );
            }
            self.dropped_requests += 1;
            return None;
        }

        let start = self.staging.len();
        self.staging.resize(start + vertex_count, V::zeroed());
        Some(start..start + vertex_count)
    }

    fn acquire_buffer(&mut self, required_vertices: usize) -> bool {
        let vertex_size = std::mem::size_of::<V>();
        let estimate = if self.vertex_hint > 0 {
            self.vertex_hint
        } else {
            self.limits
                .default_primitive_hint
                .saturating_mul(self.primitive_type.vertices_per_primitive())
        };
        let ceiling = (self.limits.max_buffer_bytes / vertex_size).max(1);
        let vertices = estimate.min(ceiling).max(required_vertices);
        let Some(size) = vertices.checked_mul(vertex_size) else {
            debug!(vertices, "vertex buffer size overflows");
            return false;
        };

        match self
            .cache
            .get_buffer(self.resources.device(), size, BufferUsage::Vertex)
        {
            Ok(buffer) => {
                self.buffer_vertices = buffer.capacity() / vertex_size;
                self.staging.reserve(self.buffer_vertices);
                self.buffer = Some(buffer);
                true
            }
            Err(err) => {
                debug!(%err, "vertex buffer acquisition failed");
                false
            }
        }
    }

    /// Upload staged vertices and emit a mesh element. Returns whether an
    /// element was emitted; nothing happens when nothing was written.
    pub fn flush(&mut self) -> bool {
        let Some(buffer) = self.buffer.take() else {
            self.staging.clear();
            return false;
        };
        self.buffer_vertices = 0;
        if self.staging.is_empty() {
            return false;
        }

        let mut vertex_count = self.staging.len();
        self.vertex_hint = self.vertex_hint.saturating_sub(vertex_count);

        if self.primitive_type == PrimitiveType::Quad && vertex_count % 4 != 0 {
            warn!(vertices = vertex_count, "quad batch ends in a partial quad, trailing vertices dropped");
            vertex_count -= vertex_count % 4;
            self.staging.truncate(vertex_count);
        }
        if vertex_count == 0 {
            return false;
        }

        let bytes: &[u8] = bytemuck::cast_slice(&self.staging);
        if let Err(err) = self.resources.device().write_buffer(&buffer, 0, bytes) {
            warn!(%err, vertices = vertex_count, "vertex upload failed, dropping batch");
            self.staging.clear();
            return false;
        }

        let (primitives, index_buffer) = match self.primitive_type {
            PrimitiveType::Quad => {
                let quads = self.resources.quad_index_buffer();
                (
                    quad_draw_primitives(vertex_count / 4, quads.max_quads()),
                    Some(Rc::clone(quads.buffer())),
                )
            }
            PrimitiveType::Triangle | PrimitiveType::TrianglePair => {
                (vertex_draw_primitives(vertex_count), None)
            }
        };

        self.mesh.push(MeshElement {
            vertex_bytes: bytes.len(),
            vertex_buffer: buffer,
            index_buffer,
            vertex_layout: V::layout(),
            material: self.material.clone(),
            primitives,
        });
        self.flushed_elements += 1;
        self.staging.clear();
        true
    }
}

impl<V: VertexFormat> Drop for PrimitiveOutput<'_, V> {
    fn drop(&mut self) {
        self.flush();
    }
}
