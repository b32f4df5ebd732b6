//! Error types for tessera-core.

use std::io;

/// Error type for tessera-core operations.
#[derive(Debug, thiserror::Error)]
pub enum TesseraError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Terminal operation failed.
    #[error("terminal error: {0}")]
    Terminal(String),

    /// Layout calculation failed.
    #[error("layout error: {0}")]
    Layout(String),

    /// Rendering failed.
    #[error("render error: {0}")]
    Render(String),

    /// Color or input parsing failed.
    #[error("parse error: {0}")]
    Parse(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias for tessera-core operations.
pub type Result<T> = std::result::Result<T, TesseraError>;
