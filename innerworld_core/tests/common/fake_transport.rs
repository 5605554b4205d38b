//! A deterministic **in-process stand-in** for a remote sync endpoint.
//!
//! *  **From the test's perspective**
//!    * Inspect everything the store delivered via `delivered()`.
//!    * Make a target fail forever with `fail_target`, or exactly once with
//!      `fail_once`, to exercise per-item acknowledgment and retry.
//!
//! *  **Why this exists**: It lets integration tests exercise the *real*
//!    drain machinery (snapshot, retry, per-item acknowledgment) without a
//!    server to talk to.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use innerworld_core::profiles::errors::SyncError;
use innerworld_core::profiles::profile::PendingChange;
use innerworld_core::transports::transport::SyncTransport;

#[derive(Debug, Default)]
pub struct FakeTransport {
    delivered: Mutex<Vec<PendingChange>>,
    attempts: Mutex<usize>,
    fail_targets: Mutex<HashSet<String>>,
    fail_once_targets: Mutex<HashSet<String>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every change acknowledged so far, in delivery order.
    pub fn delivered(&self) -> Vec<PendingChange> {
        self.delivered.lock().unwrap().clone()
    }

    /// Total delivery attempts, including failed ones.
    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap()
    }

    /// Every delivery for `target` fails.
    pub fn fail_target(&self, target: &str) {
        self.fail_targets.lock().unwrap().insert(target.to_string());
    }

    /// The first delivery for `target` fails; later ones succeed.
    pub fn fail_once(&self, target: &str) {
        self.fail_once_targets
            .lock()
            .unwrap()
            .insert(target.to_string());
    }
}

#[async_trait]
impl SyncTransport for FakeTransport {
    async fn deliver(&self, change: &PendingChange) -> Result<(), SyncError> {
        *self.attempts.lock().unwrap() += 1;
        if self.fail_targets.lock().unwrap().contains(&change.target) {
            return Err(SyncError::TransportError(format!(
                "endpoint rejected change for '{}'",
                change.target
            )));
        }
        if self
            .fail_once_targets
            .lock()
            .unwrap()
            .remove(&change.target)
        {
            return Err(SyncError::TransportError(format!(
                "transient failure for '{}'",
                change.target
            )));
        }
        self.delivered.lock().unwrap().push(change.clone());
        Ok(())
    }
}
