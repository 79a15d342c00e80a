//! Error codes and the configuration error type.

mod codes;

pub use codes::ErrorCode;

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read config file {path}: {source}")]
    Io {
        /// Path that was read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration text is not valid TOML for `ClientConfig`.
    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range or inconsistent.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Returns the stable error code.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Io { .. } => ErrorCode::ConfigUnreadable,
            Self::Parse(_) => ErrorCode::ConfigMalformed,
            Self::Invalid(_) => ErrorCode::ConfigInvalid,
        }
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_code() {
        let err = ConfigError::Invalid("max_in_flight must be greater than 0".to_string());
        assert_eq!(err.code(), ErrorCode::ConfigInvalid);
        assert_eq!(err.code().category(), "Config");
        assert_eq!(
            err.to_string(),
            "invalid configuration: max_in_flight must be greater than 0"
        );
    }
}
