//! Error types for tilecue services.

use thiserror::Error;

/// Result type alias using TileError.
pub type TileResult<T> = Result<T, TileError>;

/// Primary error type for tile cache operations.
#[derive(Debug, Error)]
pub enum TileError {
    // === Request Errors ===
    #[error("Invalid tile request: {0}")]
    InvalidRequest(String),

    #[error("Unknown tile source: {0}")]
    UnknownSource(String),

    #[error("Tile {z}/{x}/{y} is outside the valid range")]
    OutOfRange { z: u32, x: u32, y: u32 },

    // === Storage Errors ===
    #[error("Tile not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    // === Upstream / Network Errors ===
    #[error("Upstream returned HTTP {status} for {url}")]
    Upstream { status: u16, url: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Cache server unavailable: {0}")]
    CacheServerUnavailable(String),

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),
}

impl TileError {
    /// Get the HTTP status code the proxy answers with for this error.
    ///
    /// Upstream failures are never forwarded verbatim; the client only
    /// needs to know the tile could not be produced.
    pub fn http_status_code(&self) -> u16 {
        match self {
            TileError::InvalidRequest(_)
            | TileError::UnknownSource(_)
            | TileError::OutOfRange { .. }
            | TileError::NotFound(_) => 404,

            TileError::CacheServerUnavailable(_) => 503,

            _ => 500,
        }
    }
}

impl From<std::io::Error> for TileError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            TileError::NotFound(err.to_string())
        } else {
            TileError::Storage(err.to_string())
        }
    }
}

impl From<serde_yaml::Error> for TileError {
    fn from(err: serde_yaml::Error) -> Self {
        TileError::Config(format!("YAML error: {}", err))
    }
}
