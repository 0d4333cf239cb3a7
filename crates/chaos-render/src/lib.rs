//! Chaos Render - GPU buffers, primitive batching and the particle renderer
//!
//! This crate turns vertex data into GPU draw work:
//! - `GpuDevice` - buffer creation and upload (host memory or wgpu)
//! - `BufferCache` - pool of reusable vertex buffers
//! - `PrimitiveOutput` - batches primitives into buffers and draw calls
//! - `DynamicMesh` / `MeshElement` - the per-frame result handed to the renderer
//! - `ParticlePipeline` - wgpu pipelines that draw a dynamic mesh

mod bitmap;
mod buffer_cache;
mod config;
mod context;
mod device;
mod material;
mod mesh;
mod output;
pub mod particle_pipeline;
mod primitive;
mod resources;
mod vertex;

pub use bitmap::{BitmapInfo, BitmapSet, BitmapTexcoords};
pub use buffer_cache::{BufferCache, BufferCacheStats};
pub use config::{BitmapConfig, MaterialConfig, ResourceConfig, DEFAULT_MAX_QUADS_PER_DRAW};
pub use context::{RenderError, WgpuDevice};
pub use device::{BufferStorage, BufferUsage, GpuBuffer, GpuDevice, HostDevice};
pub use material::{BlendMode, MaterialLibrary, RenderMaterial};
pub use mesh::{DynamicMesh, MeshElement};
pub use output::{
    OutputLimits, PrimitiveOutput, DEFAULT_MAX_VERTEX_BUFFER_BYTES, DEFAULT_PRIMITIVE_HINT,
};
pub use particle_pipeline::{ParticlePipeline, ParticleUniforms};
pub use primitive::{
    quad_draw_primitives, vertex_draw_primitives, DrawPrimitive, PrimitiveType, Topology,
};
pub use resources::{quad_indices, GpuResources, QuadIndexBuffer, MAX_QUADS_PER_DRAW};
pub use vertex::{ParticleVertex, VertexFormat, VertexLayout};

#[cfg(test)]
mod tests {
    #[test]
    fn particle_shader_wgsl_parses() {
        let source = include_str!("particle_shader.wgsl");
        naga::front::wgsl::parse_str(source).expect("particle_shader.wgsl failed to parse");
    }
}
