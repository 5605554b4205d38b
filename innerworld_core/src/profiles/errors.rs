use std::fmt::{self, Display};

/// A central error enum for synchronization-related errors.
#[derive(Debug)]
pub enum SyncError {
    IoError(std::io::Error),
    StorageError(String),
    TransportError(String),
    Other(String),
}

/// Convert from std::io::Error.
impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> SyncError {
        SyncError::IoError(err)
    }
}

/// Convert from serde_json::Error.
/// Without this, `map_err(SyncError::from)` won't work when (de)serializing the storage records.
impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::StorageError(err.to_string())
    }
}

impl Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::IoError(e) => write!(f, "IO error: {}", e),
            SyncError::StorageError(msg) => write!(f, "Storage error: {}", msg),
            SyncError::TransportError(msg) => write!(f, "Transport error: {}", msg),
            SyncError::Other(msg) => write!(f, "Other error: {}", msg),
        }
    }
}

impl std::error::Error for SyncError {}
