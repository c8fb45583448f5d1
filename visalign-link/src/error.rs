//! Error types for visalign-link

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    #[error("Not connected")]
    NotConnected,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Connect to {0} timed out")]
    Timeout(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid payload: {0:?}")]
    InvalidPayload(String),
}

impl From<std::io::Error> for LinkError {
    fn from(err: std::io::Error) -> Self {
        LinkError::Transport(err.to_string())
    }
}

impl From<LinkError> for visalign_core::Error {
    fn from(err: LinkError) -> Self {
        match err {
            LinkError::Config(msg) => visalign_core::Error::Configuration(msg),
            other => visalign_core::Error::Link(other.to_string()),
        }
    }
}
