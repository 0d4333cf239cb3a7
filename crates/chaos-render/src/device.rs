//! GPU buffer storage and the device abstraction that creates it
//!
//! Buffers live either in host memory (headless runs, tests) or in a `wgpu`
//! buffer. Writes are staged by the caller and uploaded in one call, which
//! stands in for the map / write / unmap sequence.

use crate::context::{RenderError, WgpuDevice};
use chaos_core::BufferId;
use std::cell::{Cell, RefCell};

/// What a buffer is bound as when drawing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BufferUsage {
    Vertex,
    Index,
}

impl BufferUsage {
    fn to_wgpu(self) -> wgpu::BufferUsages {
        match self {
            BufferUsage::Vertex => wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            BufferUsage::Index => wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
        }
    }
}

/// Backing memory of a buffer
pub enum BufferStorage {
    Host(RefCell<Vec<u8>>),
    Wgpu(wgpu::Buffer),
}

/// A fixed-capacity GPU-visible byte region
pub struct GpuBuffer {
    id: BufferId,
    capacity: usize,
    usage: BufferUsage,
    storage: BufferStorage,
}

impl GpuBuffer {
    pub fn new(capacity: usize, usage: BufferUsage, storage: BufferStorage) -> Self {
        Self {
            id: BufferId::new(),
            capacity,
            usage,
            storage,
        }
    }

    pub fn id(&self) -> BufferId {
        self.id
    }

    /// Capacity in bytes
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    pub fn storage(&self) -> &BufferStorage {
        &self.storage
    }

    /// The native buffer, if this one lives on a wgpu device
    pub fn wgpu_buffer(&self) -> Option<&wgpu::Buffer> {
        match &self.storage {
            BufferStorage::Wgpu(buffer) => Some(buffer),
            BufferStorage::Host(_) => None,
        }
    }

    /// Copy of `len` bytes starting at `offset` for host buffers
    pub fn read_host(&self, offset: usize, len: usize) -> Option<Vec<u8>> {
        match &self.storage {
            BufferStorage::Host(bytes) => {
                let end = offset.checked_add(len)?;
                bytes.borrow().get(offset..end).map(<[u8]>::to_vec)
            }
            BufferStorage::Wgpu(_) => None,
        }
    }
}

impl std::fmt::Debug for GpuBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuBuffer")
            .field("id", &self.id)
            .field("capacity", &self.capacity)
            .field("usage", &self.usage)
            .finish()
    }
}

/// Creates and fills GPU buffers
pub trait GpuDevice {
    /// Allocate a buffer of exactly `size` bytes
    fn create_buffer(
        &self,
        label: &str,
        size: usize,
        usage: BufferUsage,
    ) -> Result<GpuBuffer, RenderError>;

    /// Upload `data` at `offset`. The buffer must have been created by this device.
    fn write_buffer(&self, buffer: &GpuBuffer, offset: usize, data: &[u8])
        -> Result<(), RenderError>;

    /// Short human-readable backend name
    fn name(&self) -> &str;
}

/// Device backed by plain host memory.
///
/// An optional byte budget caps the total size this device will ever hand
/// out, after which allocations fail like an exhausted GPU heap would.
#[derive(Default)]
pub struct HostDevice {
    budget: Option<usize>,
    allocated_bytes: Cell<usize>,
    allocation_count: Cell<usize>,
    write_count: Cell<usize>,
}

impl HostDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_budget(budget: usize) -> Self {
        Self {
            budget: Some(budget),
            ..Self::default()
        }
    }

    /// Total bytes allocated over the device lifetime
    pub fn allocated_bytes(&self) -> usize {
        self.allocated_bytes.get()
    }

    pub fn allocation_count(&self) -> usize {
        self.allocation_count.get()
    }

    pub fn write_count(&self) -> usize {
        self.write_count.get()
    }
}

impl GpuDevice for HostDevice {
    fn create_buffer(
        &self,
        _label: &str,
        size: usize,
        usage: BufferUsage,
    ) -> Result<GpuBuffer, RenderError> {
        let Some(total) = self.allocated_bytes.get().checked_add(size) else {
            return Err(RenderError::BufferAllocation {
                size,
                reason: "size overflows the host allocation counter".to_string(),
            });
        };
        if let Some(budget) = self.budget {
            if total > budget {
                return Err(RenderError::BufferAllocation {
                    size,
                    reason: format!(
                        "host budget exhausted ({} of {} bytes in use)",
                        self.allocated_bytes.get(),
                        budget
                    ),
                });
            }
        }
        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(size)
            .map_err(|err| RenderError::BufferAllocation {
                size,
                reason: err.to_string(),
            })?;
        bytes.resize(size, 0u8);

        self.allocated_bytes.set(total);
        self.allocation_count.set(self.allocation_count.get() + 1);
        Ok(GpuBuffer::new(size, usage, BufferStorage::Host(RefCell::new(bytes))))
    }

    fn write_buffer(
        &self,
        buffer: &GpuBuffer,
        offset: usize,
        data: &[u8],
    ) -> Result<(), RenderError> {
        let BufferStorage::Host(bytes) = &buffer.storage else {
            return Err(RenderError::BufferWrite {
                id: buffer.id,
                reason: "buffer was not created by a host device".to_string(),
            });
        };
        let end = offset.saturating_add(data.len());
        if end > buffer.capacity {
            return Err(RenderError::BufferWrite {
                id: buffer.id,
                reason: format!("write of {} bytes at {} exceeds capacity {}", data.len(), offset, buffer.capacity),
            });
        }
        bytes.borrow_mut()[offset..end].copy_from_slice(data);
        self.write_count.set(self.write_count.get() + 1);
        Ok(())
    }

    fn name(&self) -> &str {
        "host"
    }
}

impl GpuDevice for WgpuDevice {
    fn create_buffer(
        &self,
        label: &str,
        size: usize,
        usage: BufferUsage,
    ) -> Result<GpuBuffer, RenderError> {
        // Copies into a wgpu buffer must be 4-byte aligned in size
        let max_size = self.device.limits().max_buffer_size;
        let aligned = u64::try_from(size)
            .ok()
            .and_then(|size| size.checked_next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT))
            .map(|size| size.max(wgpu::COPY_BUFFER_ALIGNMENT))
            .filter(|size| *size <= max_size)
            .ok_or_else(|| RenderError::BufferAllocation {
                size,
                reason: format!("exceeds the device buffer size limit of {max_size} bytes"),
            })?;

        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: aligned,
            usage: usage.to_wgpu(),
            mapped_at_creation: false,
        });
        let validation = pollster::block_on(self.device.pop_error_scope());
        let out_of_memory = pollster::block_on(self.device.pop_error_scope());
        if let Some(err) = validation.or(out_of_memory) {
            return Err(RenderError::BufferAllocation {
                size,
                reason: err.to_string(),
            });
        }

        Ok(GpuBuffer::new(size, usage, BufferStorage::Wgpu(buffer)))
    }

    fn write_buffer(
        &self,
        buffer: &GpuBuffer,
        offset: usize,
        data: &[u8],
    ) -> Result<(), RenderError> {
        let BufferStorage::Wgpu(native) = &buffer.storage else {
            return Err(RenderError::BufferWrite {
                id: buffer.id,
                reason: "buffer was not created by a wgpu device".to_string(),
            });
        };
        if offset.saturating_add(data.len()) > buffer.capacity {
            return Err(RenderError::BufferWrite {
                id: buffer.id,
                reason: format!("write of {} bytes at {} exceeds capacity {}", data.len(), offset, buffer.capacity),
            });
        }

        let align = wgpu::COPY_BUFFER_ALIGNMENT as usize;
        if data.len() % align == 0 {
            self.queue.write_buffer(native, offset as u64, data);
        } else {
            let mut padded = data.to_vec();
            padded.resize(data.len().div_ceil(align) * align, 0);
            self.queue.write_buffer(native, offset as u64, &padded);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "wgpu"
    }
}
