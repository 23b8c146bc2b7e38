//! Transform error types

use std::path::PathBuf;
use thiserror::Error;
use vetshim_bundles::RegistryError;

/// Pipeline setup errors
///
/// A build itself never fails with this type; problems with a source are
/// reported as diagnostics on the build result.
#[derive(Error, Debug)]
pub enum TransformError {
    /// Config file could not be read
    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        /// Config path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Config text is not valid TOML for [`PipelineConfig`](crate::PipelineConfig)
    #[error("invalid pipeline config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Config value out of range
    #[error("invalid config value for '{field}': {reason}")]
    InvalidConfig {
        /// Field name
        field: &'static str,
        /// What is wrong
        reason: String,
    },

    /// Bundle registry rejected
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
}

impl TransformError {
    /// Create config read error
    pub fn config_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ConfigRead {
            path: path.into(),
            source,
        }
    }

    /// Create invalid config error
    pub fn invalid_config(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }
}

/// Result type for transform setup
pub type TransformResult<T> = Result<T, TransformError>;
