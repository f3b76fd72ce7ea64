//! Integration interface error types

use thiserror::Error;

/// Errors surfaced by the injected store, transport and flag backends.
///
/// Malformed relation data is never an error: accessors fall back to
/// their defaults instead.
#[derive(Error, Debug)]
pub enum IntegrationError {
    #[error("Key-value store error: {0}")]
    Store(String),

    #[error("Relation transport error: {0}")]
    Transport(String),

    #[error("Flag store error: {0}")]
    Flag(String),

    #[error("State file version {found} is newer than supported version {supported}")]
    StateVersion { found: u32, supported: u32 },

    #[error("Configuration error: {0}")]
    Config(#[from] aws_integration_config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, IntegrationError>;
