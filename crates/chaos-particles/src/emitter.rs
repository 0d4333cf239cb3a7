//! Emitters: timed spawning of default particles into a named layer

use crate::manager::ParticleManager;
use crate::particle::{lerp_color, DefaultLayerTrait, ParticleDefault};
use crate::rand::ParticleRng;
use crate::spawner::ParticleSpawner;
use chaos_core::{ChaosError, LayerId, LayerRequest, Result};
use serde::Deserialize;
use tracing::debug;

/// Emitter settings, one `[[emitters]]` table per emitter
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmitterConfig {
    /// Name of the layer to spawn into
    pub layer: String,
    pub bitmap: Option<String>,
    /// Particles per second
    pub rate: f32,
    /// Particles spawned at once when the emitter starts (and on every loop)
    pub burst: u32,
    /// Particles alive at once from this emitter
    pub max_particles: usize,
    pub position: [f32; 2],
    /// Half-extents of the spawn box around `position`
    pub extents: [f32; 2],
    /// Degrees, 0 along +X
    pub angle: f32,
    pub spread: f32,
    pub speed_min: f32,
    pub speed_max: f32,
    pub lifetime_min: f32,
    pub lifetime_max: f32,
    pub size_min: f32,
    pub size_max: f32,
    /// Each particle gets a random color between these two
    pub color_start: [f32; 4],
    pub color_end: [f32; 4],
    /// Seconds of emission per cycle; zero emits forever
    pub duration: f32,
    pub looping: bool,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            layer: String::new(),
            bitmap: None,
            rate: 10.0,
            burst: 0,
            max_particles: 256,
            position: [0.0; 2],
            extents: [0.0; 2],
            angle: 90.0,
            spread: 15.0,
            speed_min: 1.0,
            speed_max: 3.0,
            lifetime_min: 1.0,
            lifetime_max: 2.0,
            size_min: 0.1,
            size_max: 0.1,
            color_start: [1.0; 4],
            color_end: [1.0; 4],
            duration: 0.0,
            looping: true,
        }
    }
}

impl EmitterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.layer.is_empty() {
            return Err(ChaosError::ConfigError("emitter has no layer".to_string()));
        }
        if self.rate < 0.0 {
            return Err(ChaosError::ConfigError(format!(
                "emitter rate {} is negative",
                self.rate
            )));
        }
        if self.lifetime_max < self.lifetime_min || self.lifetime_min <= 0.0 {
            return Err(ChaosError::ConfigError(format!(
                "emitter lifetime range [{}, {}] is invalid",
                self.lifetime_min, self.lifetime_max
            )));
        }
        Ok(())
    }

    fn init_particle(&self, rng: &mut ParticleRng, p: &mut ParticleDefault) {
        let offset = rng.in_box(self.extents);
        p.position = [self.position[0] + offset[0], self.position[1] + offset[1]];

        let direction = rng.arc_direction(self.angle, self.spread);
        let speed = rng.range(self.speed_min, self.speed_max);
        p.velocity = [direction[0] * speed, direction[1] * speed];

        let size = rng.range(self.size_min, self.size_max);
        p.half_size = [size * 0.5; 2];
        p.lifetime = rng.range(self.lifetime_min, self.lifetime_max);
        p.age = 0.0;
        p.color = lerp_color(self.color_start, self.color_end, rng.next_f32());
    }
}

/// Runtime state for one emitter. Each emitter owns one allocation in its
/// layer.
pub struct ParticleEmitter {
    config: EmitterConfig,
    layer: LayerId,
    spawner: ParticleSpawner,
    /// Fractional particles carried to the next update
    accumulator: f32,
    elapsed: f32,
    pending_burst: u32,
    playing: bool,
}

impl ParticleEmitter {
    /// Bind to the configured layer. Fails if the layer, or the requested
    /// bitmap, doesn't exist.
    pub fn new(config: EmitterConfig, manager: &ParticleManager) -> Result<Self> {
        config.validate()?;
        let layer = manager.require_layer(LayerRequest::name(config.layer.as_str()))?;
        let spawner = manager
            .create_particle_spawner(layer, config.bitmap.as_deref())
            .ok_or_else(|| ChaosError::LayerNotFound(config.layer.clone()))?;
        if !spawner.is_valid() {
            return Err(ChaosError::BitmapNotFound(
                config.bitmap.clone().unwrap_or_default(),
            ));
        }
        let pending_burst = config.burst;
        Ok(Self {
            config,
            layer,
            spawner,
            accumulator: 0.0,
            elapsed: 0.0,
            pending_burst,
            playing: true,
        })
    }

    pub fn config(&self) -> &EmitterConfig {
        &self.config
    }

    pub fn layer_id(&self) -> LayerId {
        self.layer
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn stop(&mut self) {
        self.playing = false;
        self.accumulator = 0.0;
    }

    /// Restart from the beginning of a cycle, including its burst
    pub fn restart(&mut self) {
        self.playing = true;
        self.elapsed = 0.0;
        self.accumulator = 0.0;
        self.pending_burst = self.config.burst;
    }

    /// Queue extra particles for the next update
    pub fn burst(&mut self, count: u32) {
        self.pending_burst = self.pending_burst.saturating_add(count);
    }

    /// Advance by `dt` seconds and spawn what is due. Returns the number of
    /// particles spawned.
    pub fn update(
        &mut self,
        manager: &mut ParticleManager,
        rng: &mut ParticleRng,
        dt: f32,
    ) -> Result<usize> {
        let mut due = self.pending_burst as usize;
        self.pending_burst = 0;

        if self.playing {
            self.accumulator += self.config.rate * dt;
            let whole = self.accumulator.floor();
            self.accumulator -= whole;
            due = due.saturating_add(whole as usize);

            self.elapsed += dt;
            if self.config.duration > 0.0 && self.elapsed >= self.config.duration {
                if self.config.looping {
                    self.elapsed -= self.config.duration;
                    self.pending_burst = self.config.burst;
                } else {
                    self.playing = false;
                }
            }
        }

        let layer = manager.require_layer_typed::<DefaultLayerTrait>(self.layer)?;
        let alive = self
            .spawner
            .last_allocation()
            .and_then(|id| layer.allocation(id))
            .map_or(0, |a| a.len());
        let count = due.min(self.config.max_particles.saturating_sub(alive));
        if count == 0 {
            return Ok(0);
        }

        let config = &self.config;
        self.spawner
            .spawn_particles_with(layer, count, false, |particles, _| {
                for p in particles {
                    config.init_particle(rng, p);
                }
            })
            .ok_or_else(|| ChaosError::AllocationNotFound(config.layer.clone()))?;
        debug!(layer = %config.layer, count, "emitted particles");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::LayerDesc;
    use chaos_render::{GpuResources, HostDevice, ResourceConfig};
    use std::rc::Rc;

    fn manager() -> ParticleManager {
        let resources =
            GpuResources::new(Rc::new(HostDevice::new()), &ResourceConfig::default()).unwrap();
        let mut manager = ParticleManager::new(Rc::new(resources));
        manager.add_layer(DefaultLayerTrait::quads(), LayerDesc::new("sparks", 0));
        manager
    }

    fn config() -> EmitterConfig {
        EmitterConfig {
            layer: "sparks".into(),
            ..Default::default()
        }
    }

    #[test]
    fn default_config_is_sane() {
        let config = config();
        assert!(config.rate > 0.0);
        assert!(config.lifetime_max >= config.lifetime_min);
        assert!(config.validate().is_ok());
        assert!(EmitterConfig::default().validate().is_err());
    }

    #[test]
    fn parse_from_toml() {
        let toml_str = r#"
layer = "sparks"
rate = 50.0
burst = 5
color_start = [1.0, 0.5, 0.0, 1.0]
position = [2, 3]
"#;
        let config: EmitterConfig = toml::from_str(toml_str).unwrap();
        assert!((config.rate - 50.0).abs() < 0.01);
        assert_eq!(config.burst, 5);
        assert!((config.color_start[1] - 0.5).abs() < 0.01);
        assert_eq!(config.max_particles, 256);
    }

    #[test]
    fn rate_accumulates_across_frames() {
        let mut manager = manager();
        let mut rng = ParticleRng::new(7);
        let mut emitter = ParticleEmitter::new(
            EmitterConfig {
                rate: 10.0,
                ..config()
            },
            &manager,
        )
        .unwrap();

        let mut total = 0;
        for _ in 0..10 {
            total += emitter.update(&mut manager, &mut rng, 0.05).unwrap();
        }
        // 10 per second over half a second, give or take float rounding
        assert!((4..=5).contains(&total), "spawned {total}");
        assert_eq!(manager.particle_count(), total);
    }

    #[test]
    fn burst_and_cap() {
        let mut manager = manager();
        let mut rng = ParticleRng::new(7);
        let mut emitter = ParticleEmitter::new(
            EmitterConfig {
                rate: 0.0,
                burst: 40,
                max_particles: 25,
                ..config()
            },
            &manager,
        )
        .unwrap();
        assert_eq!(emitter.update(&mut manager, &mut rng, 0.1).unwrap(), 25);
        emitter.burst(10);
        assert_eq!(emitter.update(&mut manager, &mut rng, 0.1).unwrap(), 0);
        assert_eq!(manager.particle_count(), 25);
    }

    #[test]
    fn repeated_huge_bursts_saturate() {
        let mut manager = manager();
        let mut rng = ParticleRng::new(3);
        let mut emitter = ParticleEmitter::new(
            EmitterConfig {
                rate: 0.0,
                burst: 0,
                max_particles: 30,
                ..config()
            },
            &manager,
        )
        .unwrap();
        emitter.burst(u32::MAX);
        emitter.burst(u32::MAX);
        assert_eq!(emitter.update(&mut manager, &mut rng, 0.1).unwrap(), 30);
        assert_eq!(manager.particle_count(), 30);
        assert_eq!(emitter.update(&mut manager, &mut rng, 0.1).unwrap(), 0);
    }

    #[test]
    fn particles_start_inside_the_spawn_box() {
        let mut manager = manager();
        let mut rng = ParticleRng::new(99);
        let mut emitter = ParticleEmitter::new(
            EmitterConfig {
                burst: 50,
                rate: 0.0,
                position: [10.0, -5.0],
                extents: [1.0, 2.0],
                ..config()
            },
            &manager,
        )
        .unwrap();
        emitter.update(&mut manager, &mut rng, 0.0).unwrap();

        let id = emitter.layer_id();
        let layer = manager.layer::<DefaultLayerTrait>(id).unwrap();
        for allocation in layer.allocations() {
            for p in allocation.particles() {
                assert!((9.0..=11.0).contains(&p.position[0]));
                assert!((-7.0..=-3.0).contains(&p.position[1]));
                assert!(p.lifetime >= 1.0 && p.lifetime <= 2.0);
            }
        }
    }

    #[test]
    fn one_shot_emitter_stops_after_duration() {
        let mut manager = manager();
        let mut rng = ParticleRng::new(3);
        let mut emitter = ParticleEmitter::new(
            EmitterConfig {
                duration: 0.5,
                looping: false,
                ..config()
            },
            &manager,
        )
        .unwrap();
        emitter.update(&mut manager, &mut rng, 0.6).unwrap();
        assert!(!emitter.is_playing());
        assert_eq!(emitter.update(&mut manager, &mut rng, 1.0).unwrap(), 0);
    }

    #[test]
    fn unknown_layer_or_bitmap_is_an_error() {
        let manager = manager();
        let missing_layer = ParticleEmitter::new(
            EmitterConfig {
                layer: "smoke".into(),
                ..config()
            },
            &manager,
        );
        assert!(matches!(missing_layer, Err(ChaosError::LayerNotFound(_))));

        let missing_bitmap = ParticleEmitter::new(
            EmitterConfig {
                bitmap: Some("nope".into()),
                ..config()
            },
            &manager,
        );
        assert!(matches!(missing_bitmap, Err(ChaosError::BitmapNotFound(_))));
    }
}
