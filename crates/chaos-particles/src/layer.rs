//! Particle layers: typed particle storage plus the per-frame conversion to
//! mesh elements

use crate::allocation::ParticleAllocation;
use crate::layer_trait::ParticleLayerTrait;
use crate::spawner::ParticleSpawner;
use chaos_core::{AllocationId, LayerId};
use chaos_render::{
    BitmapInfo, BufferCache, DynamicMesh, GpuResources, OutputLimits, PrimitiveOutput, RenderMaterial,
};
use std::any::Any;
use std::rc::Rc;

/// What a layer needs to render: shared resources, the buffer pool, and the
/// frame's mesh to append to
pub struct DisplayContext<'a> {
    pub resources: &'a GpuResources,
    pub cache: &'a mut BufferCache,
    pub mesh: &'a mut DynamicMesh,
}

/// How a layer is registered with the manager
#[derive(Debug, Clone)]
pub struct LayerDesc {
    pub name: String,
    pub tag: i64,
    pub render_order: i32,
    /// Material name, resolved through `GpuResources`
    pub material: Option<String>,
    pub visible: bool,
}

impl LayerDesc {
    pub fn new(name: impl Into<String>, render_order: i32) -> Self {
        Self {
            name: name.into(),
            tag: 0,
            render_order,
            material: None,
            visible: true,
        }
    }

    pub fn with_tag(mut self, tag: i64) -> Self {
        self.tag = tag;
        self
    }

    pub fn with_material(mut self, material: impl Into<String>) -> Self {
        self.material = Some(material.into());
        self
    }
}

/// Type-erased view of a layer, as stored by the manager
pub trait ParticleLayerBase: Any {
    fn id(&self) -> LayerId;
    fn name(&self) -> &str;
    fn tag(&self) -> i64;
    fn render_order(&self) -> i32;
    fn material(&self) -> Option<&Rc<RenderMaterial>>;
    fn is_visible(&self) -> bool;
    fn set_visible(&mut self, visible: bool);
    fn particle_count(&self) -> usize;
    fn allocation_count(&self) -> usize;
    /// Update every particle, drop dead ones and empty self-destroying allocations
    fn tick(&mut self, delta: f32);
    /// Append this layer's mesh elements; returns how many were added
    fn display(&self, ctx: &mut DisplayContext<'_>) -> usize;
    /// Remove every allocation
    fn clear(&mut self);
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

pub struct ParticleLayer<T: ParticleLayerTrait> {
    id: LayerId,
    name: String,
    tag: i64,
    render_order: i32,
    material: Option<Rc<RenderMaterial>>,
    visible: bool,
    limits: OutputLimits,
    layer_trait: T,
    allocations: Vec<ParticleAllocation<T::Particle>>,
    next_allocation: u32,
}

impl<T: ParticleLayerTrait> ParticleLayer<T> {
    pub fn new(layer_trait: T, desc: LayerDesc, material: Option<Rc<RenderMaterial>>) -> Self {
        Self {
            id: LayerId::new(),
            name: desc.name,
            tag: desc.tag,
            render_order: desc.render_order,
            material,
            visible: desc.visible,
            limits: OutputLimits::default(),
            layer_trait,
            allocations: Vec::new(),
            next_allocation: 1,
        }
    }

    pub fn with_limits(mut self, limits: OutputLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    pub fn layer_trait(&self) -> &T {
        &self.layer_trait
    }

    pub fn layer_trait_mut(&mut self) -> &mut T {
        &mut self.layer_trait
    }

    pub fn set_material(&mut self, material: Option<Rc<RenderMaterial>>) {
        self.material = material;
    }

    /// A spawner bound to this layer. When `bitmap` names a bitmap the
    /// resources don't know, the spawner refuses to spawn.
    pub fn create_particle_spawner(
        &self,
        resources: &GpuResources,
        bitmap: Option<&str>,
    ) -> ParticleSpawner {
        ParticleSpawner::for_layer(self.id, &self.name, resources, bitmap)
    }

    /// Create an empty allocation
    pub fn create_allocation(&mut self) -> AllocationId {
        let id = AllocationId(self.next_allocation);
        self.next_allocation += 1;
        self.allocations.push(ParticleAllocation::new(id));
        id
    }

    pub fn allocation(&self, id: AllocationId) -> Option<&ParticleAllocation<T::Particle>> {
        self.allocations.iter().find(|a| a.id() == id)
    }

    pub fn allocation_mut(
        &mut self,
        id: AllocationId,
    ) -> Option<&mut ParticleAllocation<T::Particle>> {
        self.allocations.iter_mut().find(|a| a.id() == id)
    }

    pub fn allocations(&self) -> &[ParticleAllocation<T::Particle>] {
        &self.allocations
    }

    pub fn particles(&self, id: AllocationId) -> Option<&[T::Particle]> {
        self.allocation(id).map(ParticleAllocation::particles)
    }

    /// In-place accessor for one allocation's particles
    pub fn particles_mut(&mut self, id: AllocationId) -> Option<&mut [T::Particle]> {
        self.allocation_mut(id).map(ParticleAllocation::particles_mut)
    }

    pub fn remove_allocation(&mut self, id: AllocationId) -> bool {
        let before = self.allocations.len();
        self.allocations.retain(|a| a.id() != id);
        self.allocations.len() != before
    }

    /// Append `count` particles to `id`, running the trait's initializer on each
    pub(crate) fn spawn_into(
        &mut self,
        id: AllocationId,
        count: usize,
        bitmap: Option<&BitmapInfo>,
    ) -> Option<&mut [T::Particle]> {
        let Self {
            layer_trait,
            allocations,
            ..
        } = self;
        let allocation = allocations.iter_mut().find(|a| a.id() == id)?;
        let particles = allocation.add_particles(count);
        for particle in particles.iter_mut() {
            layer_trait.init_particle(particle, bitmap);
        }
        Some(particles)
    }
}

impl<T: ParticleLayerTrait> ParticleLayerBase for ParticleLayer<T> {
    fn id(&self) -> LayerId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn tag(&self) -> i64 {
        self.tag
    }

    fn render_order(&self) -> i32 {
        self.render_order
    }

    fn material(&self) -> Option<&Rc<RenderMaterial>> {
        self.material.as_ref()
    }

    fn is_visible(&self) -> bool {
        self.visible
    }

    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    fn particle_count(&self) -> usize {
        self.allocations.iter().map(ParticleAllocation::len).sum()
    }

    fn allocation_count(&self) -> usize {
        self.allocations.len()
    }

    fn tick(&mut self, delta: f32) {
        let layer_trait = &self.layer_trait;
        for allocation in self.allocations.iter_mut().filter(|a| !a.is_paused()) {
            allocation.update_and_compact(|p| layer_trait.update_particle(delta, p));
        }
        self.allocations
            .retain(|a| !(a.destroy_when_empty() && a.is_empty()));
    }

    fn display(&self, ctx: &mut DisplayContext<'_>) -> usize {
        if !self.visible {
            return 0;
        }
        let visible: Vec<&ParticleAllocation<T::Particle>> =
            self.allocations.iter().filter(|a| a.is_visible()).collect();
        let particle_count: usize = visible.iter().map(|a| a.len()).sum();

        let before = ctx.mesh.len();
        {
            let mut output: PrimitiveOutput<'_, T::Vertex> = PrimitiveOutput::new(
                ctx.resources,
                &mut *ctx.cache,
                &mut *ctx.mesh,
                self.layer_trait.primitive_type(),
                self.material.clone(),
            )
            .with_limits(self.limits);
            output.set_vertex_hint(particle_count * self.layer_trait.vertices_per_particle());

            for allocation in visible {
                for particle in allocation.particles() {
                    self.layer_trait.particle_to_primitives(particle, &mut output);
                }
            }
            output.flush();
        }
        ctx.mesh.len() - before
    }

    fn clear(&mut self) {
        self.allocations.clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
