//! Error types for the geo crate.
//!
//! Engine operations never fail; these errors cover strict constructors,
//! configuration loading and the JSON boundary of the bindings.

use thiserror::Error;

/// Result type alias for geo operations.
pub type Result<T> = std::result::Result<T, GeoError>;

/// Errors that can occur at the edges of the engine.
#[derive(Debug, Error)]
pub enum GeoError {
    /// Invalid coordinate values
    #[error("Invalid coordinate: {0}")]
    InvalidCoordinate(String),

    /// Configuration value outside its allowed range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// TOML configuration could not be parsed
    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Error code for integration with host error handling.
/// Range: 10xxx for geo errors.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeoErrorCode {
    /// Invalid coordinate values
    InvalidCoordinate = 10002,
    /// JSON parsing error
    JsonParsing = 10003,
    /// Invalid configuration value
    InvalidConfig = 10004,
    /// Configuration parse error
    ConfigParse = 10005,
}

impl GeoError {
    /// Returns the error code for this error.
    pub fn code(&self) -> GeoErrorCode {
        match self {
            GeoError::InvalidCoordinate(_) => GeoErrorCode::InvalidCoordinate,
            GeoError::InvalidConfig(_) => GeoErrorCode::InvalidConfig,
            GeoError::ConfigParse(_) => GeoErrorCode::ConfigParse,
            GeoError::JsonError(_) => GeoErrorCode::JsonParsing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(GeoError::InvalidConfig("x".into()).code() as u32, 10004);
        let json_err = serde_json::from_str::<u32>("nope").unwrap_err();
        assert_eq!(GeoError::from(json_err).code(), GeoErrorCode::JsonParsing);
    }

    #[test]
    fn test_error_display() {
        let err = GeoError::InvalidCoordinate("(91, 0)".into());
        assert_eq!(err.to_string(), "Invalid coordinate: (91, 0)");
    }
}
