use async_trait::async_trait;

use crate::profiles::errors::SyncError;
use crate::profiles::profile::PendingChange;

/// A trait representing the remote endpoint queued changes are replayed to.
///
/// Changes carry their own id, so an implementation may see the same change
/// again after a failure; returning `Ok` is the acknowledgment that lets the
/// store drop it from the queue.
#[async_trait]
pub trait SyncTransport: Send + Sync {
    async fn deliver(&self, change: &PendingChange) -> Result<(), SyncError>;
}
