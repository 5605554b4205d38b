use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::profiles::profile::{FacilitatorConfig, PendingChange};

/// Storage key of the durable tier record.
pub const DURABLE_KEY: &str = "inner-world-persistent";
/// Storage key of the session tier record.
pub const SESSION_KEY: &str = "inner-world-session";

/// Durable tier payload.
///
/// JSON looks like:
/// `{ "facilitatorConfig": {…}, "currentNNA": "nna-7", "cache": {…}, "timestamp": 1754550000000 }`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DurableRecord {
    pub facilitator_config: Option<FacilitatorConfig>,
    #[serde(rename = "currentNNA")]
    pub current_nna: Option<String>,
    #[serde(default)]
    pub cache: HashMap<String, Value>,
    /// Write time, Unix milliseconds.
    pub timestamp: i64,
}

/// Session tier payload.
///
/// JSON looks like:
/// `{ "pendingChanges": […], "isOnline": true, "timestamp": 1754550000000 }`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub pending_changes: Vec<PendingChange>,
    pub is_online: bool,
    /// Write time, Unix milliseconds.
    pub timestamp: i64,
}
