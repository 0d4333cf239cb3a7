//! Chaos Particles - typed particle layers rendered through pooled buffers
//!
//! Provides:
//! - `ParticleLayer<T>` - allocations of one particle type, converted to
//!   vertices by a `ParticleLayerTrait`
//! - `ParticleSpawner` - appends particles to a layer, optionally bound to a bitmap
//! - `ParticleManager` - render-ordered layers sharing one buffer cache,
//!   producing a single `DynamicMesh` per frame
//! - `ParticleEmitter` - rate/burst spawning of default particles

pub mod allocation;
pub mod config;
pub mod emitter;
pub mod layer;
pub mod layer_trait;
pub mod manager;
pub mod particle;
pub mod rand;
pub mod spawner;

pub use allocation::ParticleAllocation;
pub use config::{LayerConfig, ParticleConfig};
pub use emitter::{EmitterConfig, ParticleEmitter};
pub use layer::{DisplayContext, LayerDesc, ParticleLayer, ParticleLayerBase};
pub use layer_trait::ParticleLayerTrait;
pub use manager::{DefaultParticleLayer, ParticleManager};
pub use particle::{DefaultLayerTrait, ParticleDefault};
pub use rand::ParticleRng;
pub use spawner::ParticleSpawner;
