//! GPU resources shared by every particle layer: the device, the quad index
//! buffer, materials and bitmaps.
//!
//! Built once during setup and passed by reference to whoever needs it.

use crate::bitmap::{BitmapInfo, BitmapSet};
use crate::buffer_cache::BufferCache;
use crate::config::ResourceConfig;
use crate::context::RenderError;
use crate::device::{BufferUsage, GpuBuffer, GpuDevice};
use crate::material::{MaterialLibrary, RenderMaterial};
use std::rc::Rc;
use tracing::debug;

/// Largest quad count whose indices still fit in `u32`
pub const MAX_QUADS_PER_DRAW: usize = (u32::MAX as usize) / 4;

/// Index buffer that expands quads into two triangles each, shared by every
/// quad draw. One draw can cover at most `max_quads` quads; larger batches
/// are split and rebased with `base_vertex_index`.
pub struct QuadIndexBuffer {
    buffer: Rc<GpuBuffer>,
    max_quads: usize,
}

impl QuadIndexBuffer {
    /// Fails with `InvalidQuadLimit` unless `1 <= max_quads <= MAX_QUADS_PER_DRAW`.
    pub fn new(device: &dyn GpuDevice, max_quads: usize) -> Result<Self, RenderError> {
        if max_quads == 0 || max_quads > MAX_QUADS_PER_DRAW {
            return Err(RenderError::InvalidQuadLimit(max_quads));
        }
        let indices = quad_indices(max_quads);
        let bytes: &[u8] = bytemuck::cast_slice(&indices);
        let buffer = BufferCache::create_buffer(device, bytes.len(), BufferUsage::Index)?;
        device.write_buffer(&buffer, 0, bytes)?;
        debug!(max_quads, "created shared quad index buffer");
        Ok(Self { buffer, max_quads })
    }

    pub fn buffer(&self) -> &Rc<GpuBuffer> {
        &self.buffer
    }

    pub fn max_quads(&self) -> usize {
        self.max_quads
    }
}

/// Index list for `quad_count` quads with corners ordered
/// `[top-left, top-right, bottom-left, bottom-right]`
pub fn quad_indices(quad_count: usize) -> Vec<u32> {
    let mut indices = Vec::with_capacity(quad_count * 6);
    for quad in 0..quad_count as u32 {
        let base = quad * 4;
        indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 1, base + 3]);
    }
    indices
}

pub struct GpuResources {
    device: Rc<dyn GpuDevice>,
    quad_index_buffer: QuadIndexBuffer,
    materials: MaterialLibrary,
    bitmaps: BitmapSet,
}

impl GpuResources {
    pub fn new(device: Rc<dyn GpuDevice>, config: &ResourceConfig) -> Result<Self, RenderError> {
        let quad_index_buffer = QuadIndexBuffer::new(device.as_ref(), config.max_quads_per_draw)?;

        let mut materials = MaterialLibrary::new();
        for material in &config.materials {
            materials.insert(RenderMaterial {
                name: material.name.clone(),
                blend: material.blend,
                texture: material.texture.clone(),
            });
        }

        let mut bitmaps = BitmapSet::new();
        for bitmap in &config.bitmaps {
            bitmaps.insert(BitmapInfo {
                name: bitmap.name.clone(),
                width: bitmap.width,
                height: bitmap.height,
                texcoords: bitmap.texcoords(),
            });
        }

        Ok(Self {
            device,
            quad_index_buffer,
            materials,
            bitmaps,
        })
    }

    pub fn device(&self) -> &dyn GpuDevice {
        self.device.as_ref()
    }

    pub fn quad_index_buffer(&self) -> &QuadIndexBuffer {
        &self.quad_index_buffer
    }

    pub fn find_material(&self, name: &str) -> Option<Rc<RenderMaterial>> {
        self.materials.get(name)
    }

    pub fn find_bitmap_info(&self, name: &str) -> Option<&BitmapInfo> {
        self.bitmaps.find_bitmap_info(name)
    }

    pub fn materials_mut(&mut self) -> &mut MaterialLibrary {
        &mut self.materials
    }

    pub fn bitmaps_mut(&mut self) -> &mut BitmapSet {
        &mut self.bitmaps
    }
}
