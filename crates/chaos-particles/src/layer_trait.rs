//! Per-layer behaviour: how particles update and how they become vertices

use chaos_render::{BitmapInfo, PrimitiveOutput, PrimitiveType, VertexFormat};

/// Implemented once per particle type. A `ParticleLayer<T>` is generic over
/// its trait, so conversion is resolved at compile time.
pub trait ParticleLayerTrait: 'static {
    type Particle: Clone + Default + 'static;
    type Vertex: VertexFormat;

    fn primitive_type(&self) -> PrimitiveType {
        PrimitiveType::Quad
    }

    /// Vertices written per particle, used to size vertex buffers up front
    fn vertices_per_particle(&self) -> usize {
        self.primitive_type().vertices_per_primitive()
    }

    /// Advance one particle by `delta` seconds. Return true to destroy it.
    fn update_particle(&self, _delta: f32, _particle: &mut Self::Particle) -> bool {
        false
    }

    /// Called for each freshly spawned particle, before any caller initializer
    fn init_particle(&self, _particle: &mut Self::Particle, _bitmap: Option<&BitmapInfo>) {}

    /// Write one particle's primitives. A `None` from the output means the
    /// primitive was dropped for this frame and should simply be skipped.
    fn particle_to_primitives(
        &self,
        particle: &Self::Particle,
        output: &mut PrimitiveOutput<'_, Self::Vertex>,
    );
}
