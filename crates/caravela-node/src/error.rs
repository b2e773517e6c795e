//! Error types for node assembly and its surfaces.

use thiserror::Error;

use caravela_core::{CoreError, OverlayError, RuntimeError};

/// Node-level errors. Overlay membership failures are fatal at boot;
/// everything else surfaces through the API layer.
#[derive(Error, Debug)]
pub enum NodeError {
    /// Bad configuration value.
    #[error("configuration error: {0}")]
    Config(String),

    /// Identifier space or mapping construction failed.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Could not create or join the overlay.
    #[error(transparent)]
    Overlay(#[from] OverlayError),

    /// The container engine could not be probed at boot.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    /// The outbound HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serving the API failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for node operations.
pub type Result<T> = std::result::Result<T, NodeError>;
