//! Handles that add particles to a layer

use crate::layer::ParticleLayer;
use crate::layer_trait::ParticleLayerTrait;
use chaos_core::{AllocationId, LayerId};
use chaos_render::{BitmapInfo, GpuResources};
use tracing::{debug, warn};

/// Bound to one layer and, optionally, one bitmap. Keeps appending to the
/// allocation it last spawned into until asked for a new one.
#[derive(Debug, Clone)]
pub struct ParticleSpawner {
    layer: LayerId,
    requested_bitmap: Option<String>,
    bitmap: Option<BitmapInfo>,
    last_allocation: Option<AllocationId>,
}

impl ParticleSpawner {
    pub(crate) fn new(
        layer: LayerId,
        requested_bitmap: Option<String>,
        bitmap: Option<BitmapInfo>,
    ) -> Self {
        Self {
            layer,
            requested_bitmap,
            bitmap,
            last_allocation: None,
        }
    }

    /// Resolve `bitmap` through `resources` and bind to `layer`
    pub(crate) fn for_layer(
        layer: LayerId,
        layer_name: &str,
        resources: &GpuResources,
        bitmap: Option<&str>,
    ) -> Self {
        let info = bitmap.and_then(|name| resources.find_bitmap_info(name).cloned());
        if let (Some(name), None) = (bitmap, &info) {
            warn!(layer = layer_name, bitmap = name, "spawner bitmap not found");
        }
        Self::new(layer, bitmap.map(str::to_string), info)
    }

    pub fn layer_id(&self) -> LayerId {
        self.layer
    }

    pub fn bitmap(&self) -> Option<&BitmapInfo> {
        self.bitmap.as_ref()
    }

    pub fn last_allocation(&self) -> Option<AllocationId> {
        self.last_allocation
    }

    /// False when a bitmap was requested but never resolved
    pub fn is_valid(&self) -> bool {
        self.requested_bitmap.is_none() || self.bitmap.is_some()
    }

    /// Spawn `count` particles. Returns the allocation they went into, or
    /// `None` if the spawner's bitmap is missing or `layer` is not the layer
    /// the spawner was created for.
    pub fn spawn_particles<T: ParticleLayerTrait>(
        &mut self,
        layer: &mut ParticleLayer<T>,
        count: usize,
        new_allocation: bool,
    ) -> Option<AllocationId> {
        self.spawn_particles_with(layer, count, new_allocation, |_, _| {})
    }

    /// Like `spawn_particles`, then runs `init` over the new particles
    pub fn spawn_particles_with<T, F>(
        &mut self,
        layer: &mut ParticleLayer<T>,
        count: usize,
        new_allocation: bool,
        init: F,
    ) -> Option<AllocationId>
    where
        T: ParticleLayerTrait,
        F: FnOnce(&mut [T::Particle], Option<&BitmapInfo>),
    {
        if !self.is_valid() {
            debug!(bitmap = ?self.requested_bitmap, "spawn refused, bitmap not found");
            return None;
        }
        if layer.id() != self.layer {
            debug!(layer = %self.layer, "spawn refused, spawner belongs to another layer");
            return None;
        }

        let reuse = self
            .last_allocation
            .filter(|id| !new_allocation && layer.allocation(*id).is_some());
        let id = match reuse {
            Some(id) => id,
            None => layer.create_allocation(),
        };
        self.last_allocation = Some(id);

        let particles = layer.spawn_into(id, count, self.bitmap.as_ref())?;
        init(particles, self.bitmap.as_ref());
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::{LayerDesc, ParticleLayerBase};
    use crate::particle::DefaultLayerTrait;
    use chaos_render::{BitmapConfig, GpuResources, HostDevice, ResourceConfig};
    use std::rc::Rc;

    fn resources() -> GpuResources {
        let config = ResourceConfig {
            bitmaps: vec![BitmapConfig {
                name: "spark".into(),
                width: 8,
                height: 8,
                page: 2,
                min: [0.25, 0.25],
                max: [0.5, 0.5],
            }],
            ..Default::default()
        };
        GpuResources::new(Rc::new(HostDevice::new()), &config).unwrap()
    }

    fn layer() -> ParticleLayer<DefaultLayerTrait> {
        ParticleLayer::new(DefaultLayerTrait::quads(), LayerDesc::new("fx", 0), None)
    }

    #[test]
    fn appends_to_last_allocation_until_asked_for_new() {
        let resources = resources();
        let mut layer = layer();
        let mut spawner = layer.create_particle_spawner(&resources, None);

        let first = spawner.spawn_particles(&mut layer, 3, false).unwrap();
        let again = spawner.spawn_particles(&mut layer, 2, false).unwrap();
        assert_eq!(first, again);
        assert_eq!(layer.particles(first).unwrap().len(), 5);

        let fresh = spawner.spawn_particles(&mut layer, 1, true).unwrap();
        assert_ne!(fresh, first);
        assert_eq!(layer.allocation_count(), 2);
        assert_eq!(layer.particle_count(), 6);
    }

    #[test]
    fn missing_bitmap_refuses_to_spawn() {
        let resources = resources();
        let mut layer = layer();
        let mut spawner = layer.create_particle_spawner(&resources, Some("nope"));
        assert!(!spawner.is_valid());
        assert!(spawner.spawn_particles(&mut layer, 4, true).is_none());
        assert_eq!(layer.particle_count(), 0);
        assert_eq!(layer.allocation_count(), 0);
    }

    #[test]
    fn bitmap_texcoords_reach_particles() {
        let resources = resources();
        let mut layer = layer();
        let mut spawner = layer.create_particle_spawner(&resources, Some("spark"));
        let id = spawner
            .spawn_particles_with(&mut layer, 2, false, |particles, bitmap| {
                assert_eq!(bitmap.unwrap().name, "spark");
                particles[1].position = [7.0, 8.0];
            })
            .unwrap();
        let particles = layer.particles(id).unwrap();
        assert_eq!(particles[0].texcoords.page, 2);
        assert_eq!(particles[0].texcoords.min, [0.25, 0.25]);
        assert_eq!(particles[1].position, [7.0, 8.0]);
    }

    #[test]
    fn removed_allocation_is_replaced() {
        let resources = resources();
        let mut layer = layer();
        let mut spawner = layer.create_particle_spawner(&resources, None);
        let first = spawner.spawn_particles(&mut layer, 1, false).unwrap();
        assert!(layer.remove_allocation(first));
        let second = spawner.spawn_particles(&mut layer, 1, false).unwrap();
        assert_ne!(first, second);
        assert_eq!(layer.allocation_count(), 1);
    }

    #[test]
    fn spawner_is_bound_to_its_layer() {
        let resources = resources();
        let mut layer_a = layer();
        let mut layer_b = layer();
        let mut spawner = layer_a.create_particle_spawner(&resources, None);
        assert!(spawner.spawn_particles(&mut layer_b, 1, false).is_none());
        assert!(spawner.spawn_particles(&mut layer_a, 1, false).is_some());
        assert_eq!(spawner.layer_id(), layer_a.id());
    }
}
