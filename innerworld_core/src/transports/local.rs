use async_trait::async_trait;
use log::info;

use crate::profiles::errors::SyncError;
use crate::profiles::profile::PendingChange;
use crate::transports::transport::SyncTransport;

/// Acknowledges every change without leaving the process.
///
/// The platform currently ships without a backend; this stand-in keeps the
/// queue machinery honest until a real endpoint implements [`SyncTransport`].
#[derive(Debug, Default)]
pub struct LocalTransport;

impl LocalTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SyncTransport for LocalTransport {
    async fn deliver(&self, change: &PendingChange) -> Result<(), SyncError> {
        info!(
            "acknowledged {:?} change {} for '{}'",
            change.kind, change.id, change.target
        );
        Ok(())
    }
}
