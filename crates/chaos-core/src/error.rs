//! Error types for chaos

use thiserror::Error;

/// The main error type for chaos operations
#[derive(Debug, Error)]
pub enum ChaosError {
    #[error("Layer not found: {0}")]
    LayerNotFound(String),

    #[error("Layer type mismatch: {0}")]
    LayerTypeMismatch(String),

    #[error("Material not found: {0}")]
    MaterialNotFound(String),

    #[error("Bitmap not found: {0}")]
    BitmapNotFound(String),

    #[error("Allocation not found: {0}")]
    AllocationNotFound(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("TOML parse error: {0}")]
    TomlParseError(String),

    #[error("Render error: {0}")]
    RenderError(String),
}

/// Result type alias for chaos operations
pub type Result<T> = std::result::Result<T, ChaosError>;

impl From<toml::de::Error> for ChaosError {
    fn from(err: toml::de::Error) -> Self {
        ChaosError::TomlParseError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_errors_convert() {
        let err: ChaosError = toml::from_str::<toml::Value>("= broken")
            .unwrap_err()
            .into();
        assert!(matches!(err, ChaosError::TomlParseError(_)));
        assert!(err.to_string().starts_with("TOML parse error"));
    }

    #[test]
    fn lookup_error_message() {
        let err = ChaosError::LayerNotFound("sparks".to_string());
        assert_eq!(err.to_string(), "Layer not found: sparks");
    }
}
