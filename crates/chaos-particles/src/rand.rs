//! Lightweight xorshift32 PRNG for emitters

use std::f32::consts::TAU;

pub struct ParticleRng {
    state: u32,
}

impl ParticleRng {
    pub fn new(seed: u32) -> Self {
        Self {
            state: if seed == 0 { 1 } else { seed },
        }
    }

    fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }

    /// Returns a float in [0, 1)
    pub fn next_f32(&mut self) -> f32 {
        // 24 high bits fit an f32 mantissa exactly, keeping the result below 1
        (self.next_u32() >> 8) as f32 / (1u32 << 24) as f32
    }

    /// Returns a float in [min, max)
    pub fn range(&mut self, min: f32, max: f32) -> f32 {
        min + self.next_f32() * (max - min)
    }

    /// Random unit vector in the plane
    pub fn random_direction(&mut self) -> [f32; 2] {
        let (sin, cos) = self.range(0.0, TAU).sin_cos();
        [cos, sin]
    }

    /// Unit vector within `spread_deg` degrees either side of `angle_deg`
    /// (0° points along +X, counter-clockwise)
    pub fn arc_direction(&mut self, angle_deg: f32, spread_deg: f32) -> [f32; 2] {
        let offset = if spread_deg > 0.0 {
            self.range(-spread_deg, spread_deg)
        } else {
            0.0
        };
        let (sin, cos) = (angle_deg + offset).to_radians().sin_cos();
        [cos, sin]
    }

    /// Uniform point inside an axis-aligned box of half-extents `extents`
    pub fn in_box(&mut self, extents: [f32; 2]) -> [f32; 2] {
        [
            self.range(-extents[0], extents[0]),
            self.range(-extents[1], extents[1]),
        ]
    }
}
