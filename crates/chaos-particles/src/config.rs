//! Particle configuration (parsed from TOML)

use crate::layer::LayerDesc;
use crate::particle::DefaultLayerTrait;
use chaos_core::{ChaosError, Result};
use chaos_render::{
    OutputLimits, PrimitiveType, DEFAULT_MAX_VERTEX_BUFFER_BYTES, DEFAULT_PRIMITIVE_HINT,
};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ParticleConfig {
    /// Primitives a layer's first buffer holds when it has no estimate
    pub default_primitive_hint: usize,
    pub max_vertex_buffer_bytes: usize,
    pub layers: Vec<LayerConfig>,
}

impl Default for ParticleConfig {
    fn default() -> Self {
        Self {
            default_primitive_hint: DEFAULT_PRIMITIVE_HINT,
            max_vertex_buffer_bytes: DEFAULT_MAX_VERTEX_BUFFER_BYTES,
            layers: Vec::new(),
        }
    }
}

/// One layer of default particles
#[derive(Debug, Clone, Deserialize)]
pub struct LayerConfig {
    pub name: String,
    #[serde(default)]
    pub tag: i64,
    #[serde(default)]
    pub render_order: i32,
    #[serde(default)]
    pub material: Option<String>,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default = "default_primitive")]
    pub primitive: PrimitiveType,
    #[serde(default)]
    pub gravity: [f32; 2],
    #[serde(default = "default_end_alpha")]
    pub end_alpha: f32,
}

fn default_true() -> bool {
    true
}

fn default_primitive() -> PrimitiveType {
    PrimitiveType::Quad
}

fn default_end_alpha() -> f32 {
    1.0
}

impl LayerConfig {
    pub fn desc(&self) -> LayerDesc {
        LayerDesc {
            name: self.name.clone(),
            tag: self.tag,
            render_order: self.render_order,
            material: self.material.clone(),
            visible: self.visible,
        }
    }

    pub fn layer_trait(&self) -> DefaultLayerTrait {
        DefaultLayerTrait::from_primitive(self.primitive)
            .with_gravity(self.gravity)
            .with_end_alpha(self.end_alpha)
    }
}

impl ParticleConfig {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_primitive_hint == 0 {
            return Err(ChaosError::ConfigError(
                "default_primitive_hint must be at least 1".to_string(),
            ));
        }
        if self.max_vertex_buffer_bytes == 0 {
            return Err(ChaosError::ConfigError(
                "max_vertex_buffer_bytes must be at least 1".to_string(),
            ));
        }
        if let Some(layer) = self.layers.iter().find(|l| l.name.is_empty()) {
            return Err(ChaosError::ConfigError(format!(
                "layer with tag {} has an empty name",
                layer.tag
            )));
        }
        Ok(())
    }

    pub fn limits(&self) -> OutputLimits {
        OutputLimits {
            default_primitive_hint: self.default_primitive_hint,
            max_buffer_bytes: self.max_vertex_buffer_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = ParticleConfig::from_toml_str("").unwrap();
        assert_eq!(config.default_primitive_hint, 30);
        assert_eq!(config.limits(), OutputLimits::default());
        assert!(config.layers.is_empty());
    }

    #[test]
    fn parse_layers() {
        let toml_str = r#"
default_primitive_hint = 64

[[layers]]
name = "sparks"
tag = 3
render_order = 10
material = "glow"
primitive = "triangle_pair"
gravity = [0.0, -9.8]

[[layers]]
name = "smoke"
visible = false
"#;
        let config = ParticleConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.default_primitive_hint, 64);
        assert_eq!(config.layers.len(), 2);

        let sparks = &config.layers[0];
        assert_eq!(sparks.primitive, PrimitiveType::TrianglePair);
        assert_eq!(sparks.desc().material.as_deref(), Some("glow"));
        assert!((sparks.layer_trait().gravity[1] + 9.8).abs() < 1e-6);

        let smoke = config.layers[1].desc();
        assert!(!smoke.visible);
        assert_eq!(smoke.tag, 0);
        assert_eq!(config.layers[1].primitive, PrimitiveType::Quad);
    }

    #[test]
    fn zero_hint_rejected() {
        let err = ParticleConfig::from_toml_str("default_primitive_hint = 0").unwrap_err();
        assert!(matches!(err, ChaosError::ConfigError(_)));
    }

    #[test]
    fn bad_toml_is_a_parse_error() {
        let err = ParticleConfig::from_toml_str("layers = 5").unwrap_err();
        assert!(matches!(err, ChaosError::TomlParseError(_)));
    }
}
