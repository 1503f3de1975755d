//! Error handling for the rowbridge CLI

use rowbridge_core::BridgeError;
use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Replay line {line}: {reason}")]
    Replay { line: usize, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("TOML encoding error: {0}")]
    TomlEncoding(#[from] toml::ser::Error),
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

impl From<CliError> for BridgeError {
    fn from(err: CliError) -> Self {
        match err {
            CliError::Bridge(inner) => inner,
            other => BridgeError::invalid_configuration(other.to_string()),
        }
    }
}
