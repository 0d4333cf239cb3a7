//! wgpu device setup and render error types

use chaos_core::{BufferId, ChaosError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Failed to get adapter")]
    AdapterNotFound,
    #[error("Failed to create device: {0}")]
    DeviceCreation(String),
    #[error("Failed to allocate {size} byte buffer: {reason}")]
    BufferAllocation { size: usize, reason: String },
    #[error("Failed to write buffer {id}: {reason}")]
    BufferWrite { id: BufferId, reason: String },
    #[error("Quad index buffer cannot hold {0} quads per draw")]
    InvalidQuadLimit(usize),
}

impl From<RenderError> for ChaosError {
    fn from(err: RenderError) -> Self {
        ChaosError::RenderError(err.to_string())
    }
}

/// wgpu device and queue used as the backing store for GPU buffers
pub struct WgpuDevice {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter_name: String,
}

impl WgpuDevice {
    /// Create a device without a surface, suitable for offscreen work
    pub async fn new_headless() -> Result<Self, RenderError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(RenderError::AdapterNotFound)?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Chaos Headless Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await
            .map_err(|e| RenderError::DeviceCreation(e.to_string()))?;

        Ok(Self {
            device,
            queue,
            adapter_name: adapter.get_info().name,
        })
    }

    /// Wrap a device and queue owned by an existing window context
    pub fn from_parts(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self {
            device,
            queue,
            adapter_name: String::from("external"),
        }
    }
}
