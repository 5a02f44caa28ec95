//! Error handling module for the upstream selector

use thiserror::Error;

/// Custom error type for the upstream selector
#[derive(Error, Debug)]
pub enum Error {
    #[error("Unknown upstream type: {0}")]
    UnknownUpstreamKind(String),

    #[error("Invalid upstream weight {0}: weight must be positive")]
    InvalidWeight(i32),

    #[error("Upstream registry is frozen: probing has already started")]
    RegistryFrozen,

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type for the upstream selector
pub type Result<T> = std::result::Result<T, Error>;

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::Protocol(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            Error::Protocol(err.to_string())
        } else {
            Error::Transport(err.to_string())
        }
    }
}
