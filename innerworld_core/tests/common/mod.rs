#![allow(dead_code)]

pub mod fake_transport;
pub mod memory_store;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use innerworld_core::core::sync_store::{SyncOptions, SyncStore};
use innerworld_core::profiles::profile::{
    FacilitatorConfig, GlobalSettings, NnaPermissions, NnaProfile,
};

use fake_transport::FakeTransport;
use memory_store::MemoryStore;

/// A profile at level 1 that may upgrade its own level but not its settings.
pub fn sample_profile(id: &str, alias: &str) -> NnaProfile {
    NnaProfile {
        id: id.to_string(),
        alias: alias.to_string(),
        level: 1,
        avatar: serde_json::Value::Null,
        settings: serde_json::Value::Null,
        permissions: NnaPermissions {
            can_upgrade_level: true,
            can_change_settings: false,
            max_registries_per_day: 5,
        },
        registries_count: Some(0),
        join_date: Some("2025-09-01".to_string()),
        last_updated: Utc::now(),
    }
}

/// A facilitator config with a single NNA: "nna-1", alias "Luna".
pub fn sample_config() -> FacilitatorConfig {
    let mut profiles = HashMap::new();
    let profile = sample_profile("nna-1", "Luna");
    profiles.insert(profile.id.clone(), profile);
    FacilitatorConfig {
        id: "fac-1".to_string(),
        name: "Marta".to_string(),
        nna_profiles: profiles,
        global_settings: GlobalSettings {
            default_permissions: NnaPermissions {
                can_upgrade_level: false,
                can_change_settings: false,
                max_registries_per_day: 3,
            },
            session_duration: 45,
            allow_group_chat: false,
        },
        last_updated: Utc::now(),
    }
}

/// Short windows so tests spend milliseconds, not wall-clock seconds.
pub fn test_options() -> SyncOptions {
    SyncOptions {
        debounce: Duration::from_millis(20),
        retry_attempts: 3,
        retry_base_delay: Duration::from_millis(10),
    }
}

/// A store wired to in-memory backends plus handles to inspect them.
pub struct Harness {
    pub store: SyncStore,
    pub durable: Arc<MemoryStore>,
    pub session: Arc<MemoryStore>,
    pub transport: Arc<FakeTransport>,
}

pub fn spawn_harness() -> Harness {
    let durable = Arc::new(MemoryStore::new());
    let session = Arc::new(MemoryStore::new());
    let transport = Arc::new(FakeTransport::new());
    let store = SyncStore::spawn(
        durable.clone(),
        session.clone(),
        transport.clone(),
        test_options(),
    );
    Harness {
        store,
        durable,
        session,
        transport,
    }
}
