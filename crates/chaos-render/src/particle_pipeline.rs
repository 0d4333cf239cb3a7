//! wgpu render pipeline for particle meshes
//!
//! Consumes a finished `DynamicMesh`: one pipeline per blend mode, one draw
//! call per `DrawPrimitive`.

use crate::material::{BlendMode, RenderMaterial};
use crate::mesh::DynamicMesh;
use crate::primitive::Topology;
use crate::vertex::VertexLayout;
use bytemuck::{Pod, Zeroable};
use tracing::warn;
use wgpu::util::DeviceExt;

/// Camera uniforms shared across all particle draws in a frame
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct ParticleUniforms {
    pub view_proj: [[f32; 4]; 4],
}

impl ParticleUniforms {
    pub const IDENTITY: Self = Self {
        view_proj: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    /// Orthographic projection mapping `[left, right] x [bottom, top]` to clip space
    pub fn orthographic(left: f32, right: f32, bottom: f32, top: f32) -> Self {
        let sx = 2.0 / (right - left);
        let sy = 2.0 / (top - bottom);
        let tx = -(right + left) / (right - left);
        let ty = -(top + bottom) / (top - bottom);
        Self {
            view_proj: [
                [sx, 0.0, 0.0, 0.0],
                [0.0, sy, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [tx, ty, 0.0, 1.0],
            ],
        }
    }
}

pub struct ParticlePipeline {
    pub alpha_pipeline: wgpu::RenderPipeline,
    pub additive_pipeline: wgpu::RenderPipeline,
    pub opaque_pipeline: wgpu::RenderPipeline,
    pub uniform_bind_group_layout: wgpu::BindGroupLayout,
    pub uniform_buffer: wgpu::Buffer,
    pub uniform_bind_group: wgpu::BindGroup,
}

impl ParticlePipeline {
    pub fn new(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        vertex_layout: VertexLayout,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Particle Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("particle_shader.wgsl").into()),
        });

        let uniform_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
                label: Some("Particle Uniform Bind Group Layout"),
            });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Particle Pipeline Layout"),
            bind_group_layouts: &[&uniform_bind_group_layout],
            push_constant_ranges: &[],
        });

        let build = |label: &str, blend: BlendMode| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_particle"),
                    buffers: &[vertex_layout.desc()],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_particle"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: blend.to_wgpu(),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: Topology::TriangleList.to_wgpu(),
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        };

        let alpha_pipeline = build("Particle Alpha Pipeline", BlendMode::Alpha);
        let additive_pipeline = build("Particle Additive Pipeline", BlendMode::Additive);
        let opaque_pipeline = build("Particle Opaque Pipeline", BlendMode::Opaque);

        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Particle Uniform Buffer"),
            contents: bytemuck::cast_slice(&[ParticleUniforms::IDENTITY]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &uniform_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
            label: Some("Particle Uniform Bind Group"),
        });

        Self {
            alpha_pipeline,
            additive_pipeline,
            opaque_pipeline,
            uniform_bind_group_layout,
            uniform_buffer,
            uniform_bind_group,
        }
    }

    pub fn update_uniforms(&self, queue: &wgpu::Queue, uniforms: &ParticleUniforms) {
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[*uniforms]));
    }

    /// Layers without a material draw alpha-blended
    pub fn pipeline_for(&self, material: Option<&RenderMaterial>) -> &wgpu::RenderPipeline {
        match material.map(|m| m.blend).unwrap_or_default() {
            BlendMode::Alpha => &self.alpha_pipeline,
            BlendMode::Additive => &self.additive_pipeline,
            BlendMode::Opaque => &self.opaque_pipeline,
        }
    }

    /// Issue the draw calls of `mesh` in order. Returns the number of draws.
    ///
    /// Elements whose buffers do not live on a wgpu device are skipped.
    pub fn draw_mesh(&self, pass: &mut wgpu::RenderPass<'_>, mesh: &DynamicMesh) -> usize {
        pass.set_bind_group(0, &self.uniform_bind_group, &[]);

        let mut draws = 0;
        for element in mesh.elements() {
            let Some(vertex_buffer) = element.vertex_buffer.wgpu_buffer() else {
                warn!(id = %element.vertex_buffer.id(), "skipping mesh element without a wgpu vertex buffer");
                continue;
            };
            pass.set_pipeline(self.pipeline_for(element.material.as_deref()));
            pass.set_vertex_buffer(0, vertex_buffer.slice(..));

            let index_buffer = element.index_buffer.as_ref().and_then(|b| b.wgpu_buffer());
            if let Some(index_buffer) = index_buffer {
                pass.set_index_buffer(index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            }

            for primitive in &element.primitives {
                let range = primitive.start..primitive.start + primitive.count;
                if primitive.indexed {
                    if index_buffer.is_none() {
                        warn!("indexed draw without an index buffer, skipping");
                        continue;
                    }
                    pass.draw_indexed(range, primitive.base_vertex_index, 0..1);
                } else {
                    pass.draw(range, 0..1);
                }
                draws += 1;
            }
        }
        draws
    }
}
