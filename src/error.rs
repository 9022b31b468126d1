//! Error types for rgaconvert

use thiserror::Error;

/// Result type alias for rgaconvert operations
pub type Result<T> = std::result::Result<T, Error>;

/// rgaconvert error type
#[derive(Error, Debug)]
pub enum Error {
    // Negotiation errors
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Caps parse error: {0}")]
    CapsParse(String),

    // Per-frame errors
    #[error("Buffer map failed: {0}")]
    BufferMap(String),

    #[error("RGA blit failed with code {code}")]
    HardwareBlit { code: i32 },

    // Lifecycle errors
    #[error("RGA engine initialization failed: {0}")]
    EngineInit(String),

    #[error("Converter not started")]
    NotStarted,

    // General errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Check if this error only affects the current frame
    pub fn is_per_frame(&self) -> bool {
        matches!(
            self,
            Error::BufferMap(_) | Error::HardwareBlit { .. } | Error::InvalidGeometry(_)
        )
    }

    /// Check if this error rejects caps negotiation
    pub fn is_negotiation(&self) -> bool {
        matches!(self, Error::UnsupportedFormat(_) | Error::CapsParse(_))
    }
}
