//! Owner of every particle layer and the vertex buffer pool they share

use crate::config::ParticleConfig;
use crate::layer::{DisplayContext, LayerDesc, ParticleLayer, ParticleLayerBase};
use crate::layer_trait::ParticleLayerTrait;
use crate::particle::DefaultLayerTrait;
use crate::spawner::ParticleSpawner;
use chaos_core::{ChaosError, LayerId, LayerRequest, Result};
use chaos_render::{BufferCache, BufferCacheStats, DynamicMesh, GpuResources, OutputLimits};
use std::rc::Rc;
use tracing::{debug, warn};

/// Layers are kept sorted by render order; equal orders keep insertion order.
pub struct ParticleManager {
    resources: Rc<GpuResources>,
    cache: BufferCache,
    layers: Vec<Box<dyn ParticleLayerBase>>,
    limits: OutputLimits,
}

impl ParticleManager {
    pub fn new(resources: Rc<GpuResources>) -> Self {
        Self {
            resources,
            cache: BufferCache::new(),
            layers: Vec::new(),
            limits: OutputLimits::default(),
        }
    }

    /// Build a manager and register the configured layers, each driven by
    /// `DefaultLayerTrait`
    pub fn with_config(resources: Rc<GpuResources>, config: &ParticleConfig) -> Result<Self> {
        config.validate()?;
        let mut manager = Self::new(resources);
        manager.limits = config.limits();
        for layer in &config.layers {
            if let Some(material) = &layer.material {
                if manager.resources.find_material(material).is_none() {
                    return Err(ChaosError::MaterialNotFound(material.clone()));
                }
            }
            manager.add_layer(layer.layer_trait(), layer.desc());
        }
        debug!(layers = manager.layers.len(), "particle manager configured");
        Ok(manager)
    }

    pub fn resources(&self) -> &Rc<GpuResources> {
        &self.resources
    }

    pub fn limits(&self) -> OutputLimits {
        self.limits
    }

    /// Register a layer. Its material is looked up by name; an unknown
    /// material leaves the layer without one.
    pub fn add_layer<T: ParticleLayerTrait>(&mut self, layer_trait: T, desc: LayerDesc) -> LayerId {
        let material = desc.material.as_deref().and_then(|name| {
            let found = self.resources.find_material(name);
            if found.is_none() {
                warn!(layer = %desc.name, material = name, "layer material not found");
            }
            found
        });
        let layer = ParticleLayer::new(layer_trait, desc, material).with_limits(self.limits);
        let id = layer.id();
        let order = layer.render_order();

        let index = self
            .layers
            .iter()
            .position(|l| l.render_order() > order)
            .unwrap_or(self.layers.len());
        debug!(layer = %layer.name(), %id, order, index, "adding particle layer");
        self.layers.insert(index, Box::new(layer));
        id
    }

    pub fn remove_layer(&mut self, id: LayerId) -> bool {
        let before = self.layers.len();
        self.layers.retain(|l| l.id() != id);
        self.layers.len() != before
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Layers in render order
    pub fn layers(&self) -> impl Iterator<Item = &dyn ParticleLayerBase> {
        self.layers.iter().map(|l| l.as_ref())
    }

    /// First layer, in render order, matching a name or tag
    pub fn find_layer(&self, request: impl Into<LayerRequest>) -> Option<&dyn ParticleLayerBase> {
        let request = request.into();
        self.layers
            .iter()
            .find(|l| request.matches(l.name(), l.tag()))
            .map(|l| l.as_ref())
    }

    pub fn find_layer_mut(
        &mut self,
        request: impl Into<LayerRequest>,
    ) -> Option<&mut dyn ParticleLayerBase> {
        let request = request.into();
        for layer in &mut self.layers {
            if request.matches(layer.name(), layer.tag()) {
                let layer: &mut dyn ParticleLayerBase = layer.as_mut();
                return Some(layer);
            }
        }
        None
    }

    /// The layer `find_layer` would return, if it is driven by `T`. A later
    /// layer with the same name or tag is never considered.
    pub fn find_layer_typed<T: ParticleLayerTrait>(
        &mut self,
        request: impl Into<LayerRequest>,
    ) -> Option<&mut ParticleLayer<T>> {
        let request = request.into();
        self.layers
            .iter_mut()
            .find(|l| request.matches(l.name(), l.tag()))
            .and_then(|l| l.as_any_mut().downcast_mut::<ParticleLayer<T>>())
    }

    /// Startup lookup: a missing layer is a configuration error
    pub fn require_layer(&self, request: impl Into<LayerRequest>) -> Result<LayerId> {
        let request = request.into();
        self.find_layer(request.clone())
            .map(|l| l.id())
            .ok_or_else(|| ChaosError::LayerNotFound(request.to_string()))
    }

    pub fn layer<T: ParticleLayerTrait>(&self, id: LayerId) -> Option<&ParticleLayer<T>> {
        self.layers
            .iter()
            .find(|l| l.id() == id)
            .and_then(|l| l.as_any().downcast_ref::<ParticleLayer<T>>())
    }

    pub fn layer_mut<T: ParticleLayerTrait>(&mut self, id: LayerId) -> Option<&mut ParticleLayer<T>> {
        self.layers
            .iter_mut()
            .find(|l| l.id() == id)
            .and_then(|l| l.as_any_mut().downcast_mut::<ParticleLayer<T>>())
    }

    /// Typed access that reports why it failed
    pub fn require_layer_typed<T: ParticleLayerTrait>(
        &mut self,
        id: LayerId,
    ) -> Result<&mut ParticleLayer<T>> {
        let layer = self
            .layers
            .iter_mut()
            .find(|l| l.id() == id)
            .ok_or_else(|| ChaosError::LayerNotFound(id.to_string()))?;
        let name = layer.name().to_string();
        layer
            .as_any_mut()
            .downcast_mut::<ParticleLayer<T>>()
            .ok_or(ChaosError::LayerTypeMismatch(name))
    }

    /// Spawner for the layer `id`; `None` if there is no such layer
    pub fn create_particle_spawner(&self, id: LayerId, bitmap: Option<&str>) -> Option<ParticleSpawner> {
        let layer = self.layers.iter().find(|l| l.id() == id)?;
        Some(ParticleSpawner::for_layer(
            layer.id(),
            layer.name(),
            &self.resources,
            bitmap,
        ))
    }

    /// Advance every layer
    pub fn tick(&mut self, delta: f32) {
        for layer in &mut self.layers {
            layer.tick(delta);
        }
    }

    /// Render every layer in order into one dynamic mesh. Buffers return to
    /// the pool once the caller drops the mesh.
    pub fn display(&mut self) -> DynamicMesh {
        let mut mesh = DynamicMesh::new();
        let mut ctx = DisplayContext {
            resources: &self.resources,
            cache: &mut self.cache,
            mesh: &mut mesh,
        };
        for layer in &self.layers {
            layer.display(&mut ctx);
        }
        mesh
    }

    pub fn clear(&mut self) {
        for layer in &mut self.layers {
            layer.clear();
        }
    }

    pub fn particle_count(&self) -> usize {
        self.layers.iter().map(|l| l.particle_count()).sum()
    }

    pub fn buffer_cache(&self) -> &BufferCache {
        &self.cache
    }

    pub fn buffer_stats(&self) -> BufferCacheStats {
        self.cache.stats()
    }
}

/// Layer of default particles registered from configuration
pub type DefaultParticleLayer = ParticleLayer<DefaultLayerTrait>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particle::ParticleDefault;
    use chaos_render::{BlendMode, HostDevice, MaterialConfig, ResourceConfig};

    fn resources_with(max_quads: usize, materials: &[&str]) -> Rc<GpuResources> {
        let config = ResourceConfig {
            max_quads_per_draw: max_quads,
            materials: materials
                .iter()
                .map(|name| MaterialConfig {
                    name: name.to_string(),
                    blend: BlendMode::Alpha,
                    texture: None,
                })
                .collect(),
            ..Default::default()
        };
        Rc::new(GpuResources::new(Rc::new(HostDevice::new()), &config).unwrap())
    }

    fn spawn(manager: &mut ParticleManager, id: LayerId, count: usize) {
        let mut spawner = manager.create_particle_spawner(id, None).unwrap();
        let layer = manager.layer_mut::<DefaultLayerTrait>(id).unwrap();
        spawner.spawn_particles(layer, count, false).unwrap();
    }

    #[test]
    fn hundred_quads_make_one_indexed_draw() {
        let mut manager = ParticleManager::new(resources_with(16384, &[]));
        let id = manager.add_layer(DefaultLayerTrait::quads(), LayerDesc::new("fx", 0));
        spawn(&mut manager, id, 100);

        let mesh = manager.display();
        assert_eq!(mesh.len(), 1);
        let element = &mesh.elements()[0];
        assert!(element.material.is_none());
        assert!(element.index_buffer.is_some());
        assert_eq!(element.primitives.len(), 1);
        assert_eq!(element.primitives[0].count, 600);
        assert!(element.primitives[0].indexed);
    }

    #[test]
    fn empty_layer_emits_nothing() {
        let mut manager = ParticleManager::new(resources_with(16384, &[]));
        manager.add_layer(DefaultLayerTrait::quads(), LayerDesc::new("fx", 0));
        assert!(manager.display().is_empty());
        assert_eq!(manager.buffer_cache().buffer_count(), 0);
    }

    #[test]
    fn large_batches_split_across_draws() {
        let mut manager = ParticleManager::new(resources_with(100, &[]));
        let id = manager.add_layer(DefaultLayerTrait::quads(), LayerDesc::new("fx", 0));
        spawn(&mut manager, id, 250);

        let mesh = manager.display();
        assert_eq!(mesh.len(), 1);
        let primitives = &mesh.elements()[0].primitives;
        let counts: Vec<u32> = primitives.iter().map(|p| p.count).collect();
        let bases: Vec<i32> = primitives.iter().map(|p| p.base_vertex_index).collect();
        assert_eq!(counts, vec![600, 600, 300]);
        assert_eq!(bases, vec![0, 400, 800]);
    }

    #[test]
    fn layers_render_in_order() {
        let mut manager = ParticleManager::new(resources_with(100, &["five", "one", "three"]));
        for (name, order) in [("five", 5), ("one", 1), ("three", 3)] {
            let id = manager.add_layer(
                DefaultLayerTrait::quads(),
                LayerDesc::new(name, order).with_material(name),
            );
            spawn(&mut manager, id, 1);
        }
        let mesh = manager.display();
        let order: Vec<&str> = mesh
            .elements()
            .iter()
            .map(|e| e.material.as_ref().unwrap().name.as_str())
            .collect();
        assert_eq!(order, vec!["one", "three", "five"]);
    }

    #[test]
    fn equal_orders_keep_insertion_order() {
        let mut manager = ParticleManager::new(resources_with(100, &[]));
        manager.add_layer(DefaultLayerTrait::quads(), LayerDesc::new("a", 2));
        manager.add_layer(DefaultLayerTrait::quads(), LayerDesc::new("b", 1));
        manager.add_layer(DefaultLayerTrait::quads(), LayerDesc::new("c", 2));
        let names: Vec<&str> = manager.layers().map(|l| l.name()).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }

    #[test]
    fn duplicate_tags_resolve_to_first_match() {
        let mut manager = ParticleManager::new(resources_with(100, &[]));
        let low = manager.add_layer(DefaultLayerTrait::quads(), LayerDesc::new("x", 0).with_tag(7));
        manager.add_layer(DefaultLayerTrait::quads(), LayerDesc::new("y", 1).with_tag(7));
        assert_eq!(manager.find_layer(7i64).unwrap().id(), low);
        assert_eq!(manager.find_layer("y").unwrap().tag(), 7);
        assert!(manager.find_layer("z").is_none());
        assert!(manager.find_layer(8i64).is_none());
    }

    #[test]
    fn require_layer_reports_missing_layers() {
        let mut manager = ParticleManager::new(resources_with(100, &[]));
        let id = manager.add_layer(DefaultLayerTrait::quads(), LayerDesc::new("sparks", 0));
        assert_eq!(manager.require_layer("sparks").unwrap(), id);
        assert!(matches!(
            manager.require_layer("smoke"),
            Err(ChaosError::LayerNotFound(name)) if name.contains("smoke")
        ));
    }

    struct Dots;

    impl ParticleLayerTrait for Dots {
        type Particle = ParticleDefault;
        type Vertex = chaos_render::ParticleVertex;

        fn particle_to_primitives(
            &self,
            _particle: &ParticleDefault,
            output: &mut chaos_render::PrimitiveOutput<'_, Self::Vertex>,
        ) {
            output.add_primitive();
        }
    }

    #[test]
    fn typed_lookup_checks_the_layer_type() {
        let mut manager = ParticleManager::new(resources_with(100, &[]));
        let id = manager.add_layer(Dots, LayerDesc::new("dots", 0));
        assert!(manager.find_layer_typed::<Dots>("dots").is_some());
        assert!(manager.find_layer_typed::<DefaultLayerTrait>("dots").is_none());
        assert!(manager.layer::<DefaultLayerTrait>(id).is_none());
        assert!(matches!(
            manager.require_layer_typed::<DefaultLayerTrait>(id),
            Err(ChaosError::LayerTypeMismatch(_))
        ));
    }

    #[test]
    fn typed_lookup_only_sees_the_first_match() {
        let mut manager = ParticleManager::new(resources_with(100, &[]));
        let dots = manager.add_layer(Dots, LayerDesc::new("dots", 0).with_tag(5));
        manager.add_layer(DefaultLayerTrait::quads(), LayerDesc::new("quads", 1).with_tag(5));

        assert!(manager.find_layer_typed::<DefaultLayerTrait>(5i64).is_none());
        assert_eq!(manager.find_layer_typed::<Dots>(5i64).unwrap().id(), dots);
        assert!(manager.find_layer_typed::<DefaultLayerTrait>("quads").is_some());
    }

    #[test]
    fn unknown_material_leaves_layer_untextured() {
        let mut manager = ParticleManager::new(resources_with(100, &[]));
        let id = manager.add_layer(
            DefaultLayerTrait::quads(),
            LayerDesc::new("fx", 0).with_material("missing"),
        );
        let layer = manager.layers().find(|l| l.id() == id).unwrap();
        assert!(layer.material().is_none());
    }

    #[test]
    fn tick_and_reuse_buffers_across_frames() {
        let mut manager = ParticleManager::new(resources_with(100, &[]));
        let id = manager.add_layer(DefaultLayerTrait::quads(), LayerDesc::new("fx", 0));
        let mut spawner = manager.create_particle_spawner(id, None).unwrap();
        let layer = manager.layer_mut::<DefaultLayerTrait>(id).unwrap();
        spawner
            .spawn_particles_with(layer, 10, false, |particles, _| {
                for (i, p) in particles.iter_mut().enumerate() {
                    p.lifetime = if i < 4 { 0.5 } else { 5.0 };
                }
            })
            .unwrap();

        let first = manager.display();
        let first_buffer = first.elements()[0].vertex_buffer.id();
        drop(first);

        manager.tick(1.0);
        assert_eq!(manager.particle_count(), 6);

        let second = manager.display();
        assert_eq!(second.vertex_count(), 24);
        assert_eq!(second.elements()[0].vertex_buffer.id(), first_buffer);
        assert_eq!(manager.buffer_stats().reuses, 1);
    }

    #[test]
    fn exhausted_device_drops_particles() {
        let resources = Rc::new(
            GpuResources::new(
                Rc::new(HostDevice::with_budget(100 * 24 + 64)),
                &ResourceConfig {
                    max_quads_per_draw: 100,
                    ..Default::default()
                },
            )
            .unwrap(),
        );
        let mut manager = ParticleManager::new(resources);
        let id = manager.add_layer(DefaultLayerTrait::quads(), LayerDesc::new("fx", 0));
        spawn(&mut manager, id, 50);
        assert!(manager.display().is_empty());
        assert_eq!(manager.particle_count(), 50);
    }

    #[test]
    fn remove_layer_by_id() {
        let mut manager = ParticleManager::new(resources_with(100, &[]));
        let id = manager.add_layer(DefaultLayerTrait::quads(), LayerDesc::new("fx", 0));
        assert!(manager.remove_layer(id));
        assert!(!manager.remove_layer(id));
        assert_eq!(manager.layer_count(), 0);
        assert!(manager.create_particle_spawner(id, None).is_none());
    }

    #[test]
    fn configured_layers_are_registered() {
        let config = ParticleConfig::from_toml_str(
            r#"
default_primitive_hint = 8

[[layers]]
name = "front"
render_order = 2
material = "five"

[[layers]]
name = "back"
render_order = 1
primitive = "triangle"
"#,
        )
        .unwrap();
        let manager = ParticleManager::with_config(resources_with(100, &["five"]), &config).unwrap();
        let names: Vec<&str> = manager.layers().map(|l| l.name()).collect();
        assert_eq!(names, vec!["back", "front"]);
        assert_eq!(manager.limits().default_primitive_hint, 8);
        assert!(manager.find_layer("front").unwrap().material().is_some());
    }

    #[test]
    fn configured_layer_with_unknown_material_fails() {
        let config = ParticleConfig::from_toml_str(
            r#"
[[layers]]
name = "front"
material = "missing"
"#,
        )
        .unwrap();
        let result = ParticleManager::with_config(resources_with(100, &[]), &config);
        assert!(matches!(result, Err(ChaosError::MaterialNotFound(_))));
    }
}
