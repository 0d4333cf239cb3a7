//! Pool of reusable GPU buffers, indexed by usage and capacity
//!
//! A pooled buffer is idle when the cache holds the only reference to it.
//! While a `PrimitiveOutput` writes into it, or a `MeshElement` of a frame
//! still waiting to be drawn points at it, the extra `Rc` keeps it out of
//! circulation. Blocks are never evicted.

use crate::context::RenderError;
use crate::device::{BufferUsage, GpuBuffer, GpuDevice};
use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::debug;

/// Counters describing cache behaviour since creation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferCacheStats {
    pub buffer_count: usize,
    pub idle_count: usize,
    pub total_capacity: usize,
    pub allocations: usize,
    pub reuses: usize,
}

#[derive(Default)]
pub struct BufferCache {
    buffers: BTreeMap<(BufferUsage, usize), Vec<Rc<GpuBuffer>>>,
    allocations: usize,
    reuses: usize,
}

impl BufferCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get an idle buffer of at least `size` bytes, allocating one of exactly
    /// `size` bytes when none is available.
    ///
    /// The smallest fitting capacity is preferred. Fails only when the device
    /// cannot allocate.
    pub fn get_buffer(
        &mut self,
        device: &dyn GpuDevice,
        size: usize,
        usage: BufferUsage,
    ) -> Result<Rc<GpuBuffer>, RenderError> {
        let idle = self
            .buffers
            .range((usage, size)..=(usage, usize::MAX))
            .flat_map(|(_, entries)| entries.iter())
            .find(|buffer| Rc::strong_count(buffer) == 1)
            .cloned();

        if let Some(buffer) = idle {
            self.reuses += 1;
            debug!(
                id = %buffer.id(),
                capacity = buffer.capacity(),
                requested = size,
                "reusing pooled buffer"
            );
            return Ok(buffer);
        }

        let buffer = Self::create_buffer(device, size, usage)?;
        self.allocations += 1;
        debug!(id = %buffer.id(), capacity = size, "allocated pooled buffer");
        self.buffers
            .entry((usage, size))
            .or_default()
            .push(Rc::clone(&buffer));
        Ok(buffer)
    }

    /// Create a buffer outside the pool. It is released when the last
    /// reference is dropped.
    pub fn create_buffer(
        device: &dyn GpuDevice,
        size: usize,
        usage: BufferUsage,
    ) -> Result<Rc<GpuBuffer>, RenderError> {
        let label = match usage {
            BufferUsage::Vertex => "Chaos Vertex Buffer",
            BufferUsage::Index => "Chaos Index Buffer",
        };
        device.create_buffer(label, size, usage).map(Rc::new)
    }

    pub fn buffer_count(&self) -> usize {
        self.buffers.values().map(Vec::len).sum()
    }

    pub fn idle_count(&self) -> usize {
        self.buffers
            .values()
            .flatten()
            .filter(|buffer| Rc::strong_count(buffer) == 1)
            .count()
    }

    pub fn total_capacity(&self) -> usize {
        self.buffers
            .values()
            .flatten()
            .map(|buffer| buffer.capacity())
            .sum()
    }

    pub fn stats(&self) -> BufferCacheStats {
        BufferCacheStats {
            buffer_count: self.buffer_count(),
            idle_count: self.idle_count(),
            total_capacity: self.total_capacity(),
            allocations: self.allocations,
            reuses: self.reuses,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::HostDevice;

    #[test]
    fn released_buffer_is_reused() {
        let device = HostDevice::new();
        let mut cache = BufferCache::new();

        let first = cache.get_buffer(&device, 256, BufferUsage::Vertex).unwrap();
        let first_id = first.id();
        drop(first);

        let second = cache.get_buffer(&device, 256, BufferUsage::Vertex).unwrap();
        assert_eq!(second.id(), first_id);
        assert_eq!(device.allocation_count(), 1);
        assert_eq!(cache.stats().reuses, 1);
    }

    #[test]
    fn checked_out_buffer_is_not_handed_out_twice() {
        let device = HostDevice::new();
        let mut cache = BufferCache::new();

        let first = cache.get_buffer(&device, 256, BufferUsage::Vertex).unwrap();
        let second = cache.get_buffer(&device, 256, BufferUsage::Vertex).unwrap();
        assert_ne!(first.id(), second.id());
        assert_eq!(cache.buffer_count(), 2);
        assert_eq!(cache.idle_count(), 0);
    }

    #[test]
    fn smallest_fitting_buffer_wins() {
        let device = HostDevice::new();
        let mut cache = BufferCache::new();

        let big = cache.get_buffer(&device, 1024, BufferUsage::Vertex).unwrap();
        let small = cache.get_buffer(&device, 128, BufferUsage::Vertex).unwrap();
        let (big_id, small_id) = (big.id(), small.id());
        drop(big);
        drop(small);

        let picked = cache.get_buffer(&device, 100, BufferUsage::Vertex).unwrap();
        assert_eq!(picked.id(), small_id);
        assert!(picked.capacity() >= 100);

        let next = cache.get_buffer(&device, 100, BufferUsage::Vertex).unwrap();
        assert_eq!(next.id(), big_id);
    }

    #[test]
    fn too_small_buffers_are_skipped() {
        let device = HostDevice::new();
        let mut cache = BufferCache::new();

        drop(cache.get_buffer(&device, 64, BufferUsage::Vertex).unwrap());
        let buffer = cache.get_buffer(&device, 65, BufferUsage::Vertex).unwrap();
        assert_eq!(buffer.capacity(), 65);
        assert_eq!(cache.buffer_count(), 2);
        assert_eq!(cache.total_capacity(), 129);
    }

    #[test]
    fn usage_partitions_the_pool() {
        let device = HostDevice::new();
        let mut cache = BufferCache::new();

        let vertex = cache.get_buffer(&device, 64, BufferUsage::Vertex).unwrap();
        let vertex_id = vertex.id();
        drop(vertex);
        let index = cache.get_buffer(&device, 64, BufferUsage::Index).unwrap();
        assert_ne!(index.id(), vertex_id);
        assert_eq!(index.usage(), BufferUsage::Index);
    }

    #[test]
    fn allocation_failure_propagates() {
        let device = HostDevice::with_budget(32);
        let mut cache = BufferCache::new();
        assert!(cache.get_buffer(&device, 64, BufferUsage::Vertex).is_err());
        assert_eq!(cache.buffer_count(), 0);
    }

    #[test]
    fn unpooled_buffers_are_not_tracked() {
        let device = HostDevice::new();
        let cache = BufferCache::new();
        let buffer = BufferCache::create_buffer(&device, 32, BufferUsage::Vertex).unwrap();
        assert_eq!(buffer.capacity(), 32);
        assert_eq!(cache.buffer_count(), 0);
    }
}
