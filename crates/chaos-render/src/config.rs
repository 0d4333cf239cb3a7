//! Resource configuration (parsed from TOML)

use crate::bitmap::BitmapTexcoords;
use crate::material::BlendMode;
use crate::resources::MAX_QUADS_PER_DRAW;
use chaos_core::{ChaosError, Result};
use serde::Deserialize;

/// Quads a single draw may cover through the shared index buffer. Matches the
/// range a 16-bit index can address.
pub const DEFAULT_MAX_QUADS_PER_DRAW: usize = 16384;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResourceConfig {
    pub max_quads_per_draw: usize,
    pub materials: Vec<MaterialConfig>,
    pub bitmaps: Vec<BitmapConfig>,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            max_quads_per_draw: DEFAULT_MAX_QUADS_PER_DRAW,
            materials: Vec::new(),
            bitmaps: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MaterialConfig {
    pub name: String,
    #[serde(default)]
    pub blend: BlendMode,
    #[serde(default)]
    pub texture: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BitmapConfig {
    pub name: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub min: [f32; 2],
    #[serde(default = "full_extent")]
    pub max: [f32; 2],
}

fn full_extent() -> [f32; 2] {
    [1.0, 1.0]
}

impl BitmapConfig {
    pub fn texcoords(&self) -> BitmapTexcoords {
        BitmapTexcoords {
            page: self.page,
            min: self.min,
            max: self.max,
        }
    }
}

impl ResourceConfig {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_quads_per_draw == 0 {
            return Err(ChaosError::ConfigError(
                "max_quads_per_draw must be at least 1".to_string(),
            ));
        }
        if self.max_quads_per_draw > MAX_QUADS_PER_DRAW {
            return Err(ChaosError::ConfigError(format!(
                "max_quads_per_draw {} exceeds the index range",
                self.max_quads_per_draw
            )));
        }
        Ok(())
    }
}
