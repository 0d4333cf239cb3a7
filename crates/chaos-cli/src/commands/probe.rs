//! GPU probe: one quad batch through the wgpu device and particle pipeline

use anyhow::{anyhow, Context, Result};
use chaos_particles::{DefaultLayerTrait, LayerDesc, ParticleManager};
use chaos_render::{
    GpuDevice, GpuResources, ParticlePipeline, ParticleUniforms, ParticleVertex, ResourceConfig,
    VertexFormat, WgpuDevice,
};
use std::rc::Rc;

pub struct ProbeArgs {
    pub quads: usize,
    pub max_quads_per_draw: usize,
    pub size: u32,
}

const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

pub fn run(args: ProbeArgs) -> Result<()> {
    let gpu = Rc::new(
        pollster::block_on(WgpuDevice::new_headless())
            .context("Failed to create headless wgpu device")?,
    );
    println!("Adapter: {}", gpu.adapter_name);

    let config = ResourceConfig {
        max_quads_per_draw: args.max_quads_per_draw,
        ..Default::default()
    };
    config.validate()?;
    let device: Rc<dyn GpuDevice> = gpu.clone();
    let resources = GpuResources::new(device, &config).context("Failed to create GPU resources")?;
    let mut manager = ParticleManager::new(Rc::new(resources));

    let layer_id = manager.add_layer(DefaultLayerTrait::quads(), LayerDesc::new("probe", 0));
    let mut spawner = manager
        .create_particle_spawner(layer_id, None)
        .ok_or_else(|| anyhow!("probe layer vanished"))?;
    let layer = manager
        .layer_mut::<DefaultLayerTrait>(layer_id)
        .ok_or_else(|| anyhow!("probe layer has the wrong type"))?;

    // Lay the quads out on a grid covering the unit square
    let columns = (args.quads as f32).sqrt().ceil().max(1.0) as usize;
    let cell = 1.0 / columns as f32;
    spawner
        .spawn_particles_with(layer, args.quads, true, |particles, _| {
            for (i, p) in particles.iter_mut().enumerate() {
                let (col, row) = (i % columns, i / columns);
                p.position = [(col as f32 + 0.5) * cell, (row as f32 + 0.5) * cell];
                p.half_size = [cell * 0.4; 2];
                p.color = [1.0, 0.6, 0.2, 1.0];
            }
        })
        .ok_or_else(|| anyhow!("failed to spawn probe particles"))?;

    let mesh = manager.display();
    println!(
        "Mesh: {} element(s), {} draw(s), {} vertices",
        mesh.len(),
        mesh.draw_call_count(),
        mesh.vertex_count()
    );

    let target = gpu.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Probe Target"),
        size: wgpu::Extent3d {
            width: args.size,
            height: args.size,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let view = target.create_view(&wgpu::TextureViewDescriptor::default());

    let pipeline = ParticlePipeline::new(&gpu.device, FORMAT, ParticleVertex::layout());
    pipeline.update_uniforms(&gpu.queue, &ParticleUniforms::orthographic(0.0, 1.0, 0.0, 1.0));

    let mut encoder = gpu
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Probe Encoder"),
        });
    let draws = {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Probe Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pipeline.draw_mesh(&mut pass, &mesh)
    };
    gpu.queue.submit(std::iter::once(encoder.finish()));
    drop(mesh);

    let covered = count_covered_pixels(&gpu, &target, args.size)?;
    let stats = manager.buffer_stats();
    println!("Draw calls issued: {}", draws);
    println!(
        "Covered pixels: {} of {}",
        covered,
        args.size as usize * args.size as usize
    );
    println!(
        "Buffer cache: {} buffer(s), {} bytes, {} idle",
        stats.buffer_count, stats.total_capacity, stats.idle_count
    );
    Ok(())
}

/// Read the target back and count pixels with non-zero alpha
fn count_covered_pixels(gpu: &WgpuDevice, texture: &wgpu::Texture, size: u32) -> Result<usize> {
    let unpadded_bytes_per_row = size * 4;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let padded_bytes_per_row = unpadded_bytes_per_row.div_ceil(align) * align;

    let staging = gpu.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Probe Readback"),
        size: (padded_bytes_per_row * size) as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = gpu
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Probe Readback Encoder"),
        });
    encoder.copy_texture_to_buffer(
        wgpu::ImageCopyTexture {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::ImageCopyBuffer {
            buffer: &staging,
            layout: wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(padded_bytes_per_row),
                rows_per_image: Some(size),
            },
        },
        wgpu::Extent3d {
            width: size,
            height: size,
            depth_or_array_layers: 1,
        },
    );
    gpu.queue.submit(std::iter::once(encoder.finish()));

    let slice = staging.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    gpu.device.poll(wgpu::Maintain::Wait);
    rx.recv()
        .context("Readback channel closed")?
        .context("Failed to map readback buffer")?;

    let data = slice.get_mapped_range();
    let mut covered = 0;
    for row in 0..size as usize {
        let start = row * padded_bytes_per_row as usize;
        let pixels = &data[start..start + unpadded_bytes_per_row as usize];
        covered += pixels.chunks_exact(4).filter(|px| px[3] > 0).count();
    }
    drop(data);
    staging.unmap();
    Ok(covered)
}
