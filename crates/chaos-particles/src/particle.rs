//! The general-purpose particle: a textured, tinted, optionally rotated
//! sprite with simple ballistic motion and a fade over its lifetime.

use chaos_render::{
    BitmapInfo, BitmapTexcoords, ParticleVertex, PrimitiveOutput, PrimitiveType,
};
use tracing::debug;

use crate::layer_trait::ParticleLayerTrait;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleDefault {
    pub position: [f32; 2],
    pub velocity: [f32; 2],
    pub half_size: [f32; 2],
    /// Radians, counter-clockwise
    pub rotation: f32,
    pub color: [f32; 4],
    pub age: f32,
    /// Seconds to live. Zero or less lives until removed by hand.
    pub lifetime: f32,
    pub texcoords: BitmapTexcoords,
}

impl Default for ParticleDefault {
    fn default() -> Self {
        Self {
            position: [0.0; 2],
            velocity: [0.0; 2],
            half_size: [0.5; 2],
            rotation: 0.0,
            color: [1.0; 4],
            age: 0.0,
            lifetime: 0.0,
            texcoords: BitmapTexcoords::default(),
        }
    }
}

impl ParticleDefault {
    /// Normalized age in [0, 1]; particles without a lifetime never age
    pub fn age_ratio(&self) -> f32 {
        if self.lifetime <= 0.0 {
            0.0
        } else {
            (self.age / self.lifetime).clamp(0.0, 1.0)
        }
    }

    /// Corner positions in `[top-left, top-right, bottom-left, bottom-right]` order
    pub fn corners(&self) -> [[f32; 2]; 4] {
        let [hx, hy] = self.half_size;
        let local = [[-hx, hy], [hx, hy], [-hx, -hy], [hx, -hy]];
        let (sin, cos) = self.rotation.sin_cos();
        local.map(|[x, y]| {
            [
                self.position[0] + x * cos - y * sin,
                self.position[1] + x * sin + y * cos,
            ]
        })
    }
}

/// Linear interpolation between two floats
pub fn lerp_f32(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Linear interpolation between two RGBA colors
pub fn lerp_color(a: [f32; 4], b: [f32; 4], t: f32) -> [f32; 4] {
    [
        lerp_f32(a[0], b[0], t),
        lerp_f32(a[1], b[1], t),
        lerp_f32(a[2], b[2], t),
        lerp_f32(a[3], b[3], t),
    ]
}

/// Layer trait for `ParticleDefault`, emitting quads or triangle pairs
#[derive(Debug, Clone, Copy)]
pub struct DefaultLayerTrait {
    primitive_type: PrimitiveType,
    pub gravity: [f32; 2],
    /// Alpha multiplier reached at the end of the lifetime
    pub end_alpha: f32,
}

impl Default for DefaultLayerTrait {
    fn default() -> Self {
        Self::quads()
    }
}

impl DefaultLayerTrait {
    pub fn quads() -> Self {
        Self {
            primitive_type: PrimitiveType::Quad,
            gravity: [0.0; 2],
            end_alpha: 1.0,
        }
    }

    pub fn triangle_pairs() -> Self {
        Self {
            primitive_type: PrimitiveType::TrianglePair,
            ..Self::quads()
        }
    }

    /// Single triangles can't cover a sprite; they become triangle pairs.
    pub fn from_primitive(primitive_type: PrimitiveType) -> Self {
        match primitive_type {
            PrimitiveType::Quad => Self::quads(),
            PrimitiveType::TrianglePair => Self::triangle_pairs(),
            PrimitiveType::Triangle => {
                debug!("default particles render as triangle pairs, not single triangles");
                Self::triangle_pairs()
            }
        }
    }

    pub fn with_gravity(mut self, gravity: [f32; 2]) -> Self {
        self.gravity = gravity;
        self
    }

    pub fn with_end_alpha(mut self, end_alpha: f32) -> Self {
        self.end_alpha = end_alpha;
        self
    }
}

impl ParticleLayerTrait for DefaultLayerTrait {
    type Particle = ParticleDefault;
    type Vertex = ParticleVertex;

    fn primitive_type(&self) -> PrimitiveType {
        self.primitive_type
    }

    fn update_particle(&self, delta: f32, p: &mut ParticleDefault) -> bool {
        p.age += delta;
        if p.lifetime > 0.0 && p.age >= p.lifetime {
            return true;
        }
        p.velocity[0] += self.gravity[0] * delta;
        p.velocity[1] += self.gravity[1] * delta;
        p.position[0] += p.velocity[0] * delta;
        p.position[1] += p.velocity[1] * delta;
        false
    }

    fn init_particle(&self, p: &mut ParticleDefault, bitmap: Option<&BitmapInfo>) {
        if let Some(bitmap) = bitmap {
            p.texcoords = bitmap.texcoords;
        }
    }

    fn particle_to_primitives(
        &self,
        p: &ParticleDefault,
        output: &mut PrimitiveOutput<'_, ParticleVertex>,
    ) {
        let alpha = lerp_f32(1.0, self.end_alpha, p.age_ratio());
        let color = [p.color[0], p.color[1], p.color[2], p.color[3] * alpha];
        let positions = p.corners();
        let texcoords = p.texcoords.corners();
        let corner = |i: usize| ParticleVertex {
            position: positions[i],
            texcoord: texcoords[i],
            color,
        };

        let Some(vertices) = output.add_primitive() else {
            return;
        };
        match self.primitive_type {
            PrimitiveType::Quad => {
                for (i, v) in vertices.iter_mut().enumerate() {
                    *v = corner(i);
                }
            }
            // Same winding as the shared quad index buffer
            PrimitiveType::TrianglePair | PrimitiveType::Triangle => {
                for (v, i) in vertices.iter_mut().zip([0, 1, 2, 2, 1, 3]) {
                    *v = corner(i);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lerp_endpoints() {
        assert!((lerp_f32(0.0, 10.0, 0.5) - 5.0).abs() < 1e-6);
        let mid = lerp_color([1.0; 4], [0.0; 4], 0.5);
        assert!(mid.iter().all(|c| (c - 0.5).abs() < 1e-6));
    }

    #[test]
    fn age_ratio_clamps() {
        let mut p = ParticleDefault {
            lifetime: 2.0,
            age: 3.0,
            ..Default::default()
        };
        assert_eq!(p.age_ratio(), 1.0);
        p.age = 0.5;
        assert!((p.age_ratio() - 0.25).abs() < 1e-6);
        p.lifetime = 0.0;
        assert_eq!(p.age_ratio(), 0.0);
    }

    #[test]
    fn corners_without_rotation() {
        let p = ParticleDefault {
            position: [10.0, 20.0],
            half_size: [1.0, 2.0],
            ..Default::default()
        };
        assert_eq!(
            p.corners(),
            [[9.0, 22.0], [11.0, 22.0], [9.0, 18.0], [11.0, 18.0]]
        );
    }

    #[test]
    fn rotation_turns_corners() {
        let p = ParticleDefault {
            half_size: [1.0, 1.0],
            rotation: std::f32::consts::FRAC_PI_2,
            ..Default::default()
        };
        // top-right (1, 1) rotates to (-1, 1)
        let tr = p.corners()[1];
        assert!((tr[0] + 1.0).abs() < 1e-5 && (tr[1] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn update_moves_and_expires() {
        let layer = DefaultLayerTrait::quads().with_gravity([0.0, -10.0]);
        let mut p = ParticleDefault {
            velocity: [1.0, 0.0],
            lifetime: 1.0,
            ..Default::default()
        };
        assert!(!layer.update_particle(0.5, &mut p));
        assert!((p.position[0] - 0.5).abs() < 1e-6);
        assert!((p.velocity[1] + 5.0).abs() < 1e-6);
        assert!(layer.update_particle(0.5, &mut p));
    }

    #[test]
    fn immortal_particles_survive() {
        let layer = DefaultLayerTrait::quads();
        let mut p = ParticleDefault::default();
        for _ in 0..100 {
            assert!(!layer.update_particle(1.0, &mut p));
        }
    }

    #[test]
    fn init_copies_bitmap_texcoords() {
        let layer = DefaultLayerTrait::quads();
        let bitmap = BitmapInfo {
            name: "spark".to_string(),
            width: 4,
            height: 4,
            texcoords: BitmapTexcoords {
                page: 3,
                min: [0.5, 0.5],
                max: [1.0, 1.0],
            },
        };
        let mut p = ParticleDefault::default();
        layer.init_particle(&mut p, Some(&bitmap));
        assert_eq!(p.texcoords.page, 3);
    }

    #[test]
    fn triangle_request_falls_back_to_pairs() {
        let layer = DefaultLayerTrait::from_primitive(PrimitiveType::Triangle);
        assert_eq!(layer.primitive_type(), PrimitiveType::TrianglePair);
        assert_eq!(layer.vertices_per_particle(), 6);
    }
}
