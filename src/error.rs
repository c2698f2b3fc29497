//! Crate-level error type

use std::io;

use crate::hub::HubError;
use crate::server::ConfigError;
use crate::store::StoreError;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    /// Room registry or fan-out failure
    Hub(HubError),
    /// Event store or room directory failure
    Store(StoreError),
    /// Configuration could not be loaded or is invalid
    Config(ConfigError),
    /// I/O failure (binding, serving)
    Io(io::Error),
    /// Event could not be serialized
    Json(serde_json::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Hub(e) => write!(f, "Hub error: {}", e),
            Error::Store(e) => write!(f, "Store error: {}", e),
            Error::Config(e) => write!(f, "Config error: {}", e),
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Json(e) => write!(f, "JSON error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Hub(e) => Some(e),
            Error::Store(e) => Some(e),
            Error::Config(e) => Some(e),
            Error::Io(e) => Some(e),
            Error::Json(e) => Some(e),
        }
    }
}

impl From<HubError> for Error {
    fn from(e: HubError) -> Self {
        Error::Hub(e)
    }
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        Error::Store(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e)
    }
}
