use std::collections::HashMap;

use chrono::Utc;
use log::{debug, warn};
use serde_json::Value;
use uuid::Uuid;

use crate::profiles::profile::{
    FacilitatorConfig, GlobalSettingsUpdate, NnaProfile, PendingChange, PermissionsUpdate,
    ProfileUpdate,
};

/// Cache key the facilitator config is mirrored under.
pub const FACILITATOR_CACHE_KEY: &str = "facilitatorConfig";
/// Cache key the current NNA id is mirrored under.
pub const CURRENT_NNA_CACHE_KEY: &str = "currentNNA";

/// Cache key an individual profile is mirrored under.
pub fn profile_cache_key(id: &str) -> String {
    format!("nna_{id}")
}

/// Everything the synchronization store holds.
///
/// The current NNA is an id into the facilitator config's profile map and is
/// resolved through a lookup on read, so the active view can never drift from
/// the canonical copy. `cache` is a flat last-known-good mirror used only for
/// persistence replay.
#[derive(Debug, Clone)]
pub struct SyncState {
    pub facilitator_config: Option<FacilitatorConfig>,
    pub current_nna: Option<String>,
    pub is_online: bool,
    pub pending_changes: Vec<PendingChange>,
    pub cache: HashMap<String, Value>,
}

/// State transitions. Every specialized update funnels through
/// `UpdateNnaProfile`, so the merge-and-stamp logic exists in one place.
#[derive(Debug, Clone)]
pub enum SyncAction {
    SetFacilitatorConfig(FacilitatorConfig),
    SetCurrentNna { id: String },
    UpdateNnaProfile { id: String, updates: ProfileUpdate },
    UpdateNnaLevel { id: String, level: u32 },
    UpdateNnaPermissions { id: String, permissions: PermissionsUpdate },
    UpdateGlobalSettings { updates: GlobalSettingsUpdate },
    AddPendingChange(PendingChange),
    MarkChangesSynced { ids: Vec<Uuid> },
    ClearPendingChanges,
    SetOnlineStatus(bool),
    UpdateCache { key: String, value: Value },
    SyncFromCache,
}

impl SyncState {
    pub fn new() -> Self {
        Self {
            facilitator_config: None,
            current_nna: None,
            is_online: true,
            pending_changes: Vec::new(),
            cache: HashMap::new(),
        }
    }

    /// Apply one action. Transitions never fail: a mutation against a missing
    /// facilitator config or an unknown profile id leaves the state unchanged.
    pub fn apply(&mut self, action: SyncAction) {
        match action {
            SyncAction::SetFacilitatorConfig(config) => {
                if let Some(current) = self.current_nna.clone() {
                    if !config.nna_profiles.contains_key(&current) {
                        debug!(
                            "current NNA '{}' is not in the new facilitator config, dropping the reference",
                            current
                        );
                        self.current_nna = None;
                        self.cache.remove(CURRENT_NNA_CACHE_KEY);
                    }
                }
                self.cache_insert_json(FACILITATOR_CACHE_KEY.to_string(), &config);
                self.facilitator_config = Some(config);
            }

            SyncAction::SetCurrentNna { id } => {
                let known = self
                    .facilitator_config
                    .as_ref()
                    .is_some_and(|config| config.nna_profiles.contains_key(&id));
                if !known {
                    debug!(
                        "cannot select NNA '{}': not present in the loaded facilitator config",
                        id
                    );
                    return;
                }
                self.cache
                    .insert(CURRENT_NNA_CACHE_KEY.to_string(), Value::String(id.clone()));
                self.current_nna = Some(id);
            }

            SyncAction::UpdateNnaProfile { id, updates } => {
                let Some(config) = self.facilitator_config.as_mut() else {
                    debug!("update for NNA '{}' ignored: no facilitator config loaded", id);
                    return;
                };
                let Some(profile) = config.nna_profiles.get_mut(&id) else {
                    debug!("update for unknown NNA '{}' ignored", id);
                    return;
                };
                updates.apply_to(profile);
                // One clock reading stamps both the profile and its owning config.
                let now = Utc::now();
                profile.last_updated = now;
                let profile_snapshot = profile.clone();
                config.last_updated = now;
                let config_snapshot = config.clone();
                self.cache_insert_json(profile_cache_key(&id), &profile_snapshot);
                self.cache_insert_json(FACILITATOR_CACHE_KEY.to_string(), &config_snapshot);
            }

            SyncAction::UpdateNnaLevel { id, level } => {
                self.apply(SyncAction::UpdateNnaProfile {
                    id,
                    updates: ProfileUpdate {
                        level: Some(level),
                        ..ProfileUpdate::default()
                    },
                });
            }

            SyncAction::UpdateNnaPermissions { id, permissions } => {
                let Some(current) = self
                    .facilitator_config
                    .as_ref()
                    .and_then(|config| config.nna_profiles.get(&id))
                    .map(|profile| profile.permissions.clone())
                else {
                    debug!("permission update for unknown NNA '{}' ignored", id);
                    return;
                };
                let merged = permissions.merged_with(&current);
                self.apply(SyncAction::UpdateNnaProfile {
                    id,
                    updates: ProfileUpdate {
                        permissions: Some(merged),
                        ..ProfileUpdate::default()
                    },
                });
            }

            SyncAction::UpdateGlobalSettings { updates } => {
                let Some(config) = self.facilitator_config.as_mut() else {
                    debug!("global settings update ignored: no facilitator config loaded");
                    return;
                };
                updates.apply_to(&mut config.global_settings);
                config.last_updated = Utc::now();
                let snapshot = config.clone();
                self.cache_insert_json(FACILITATOR_CACHE_KEY.to_string(), &snapshot);
            }

            SyncAction::AddPendingChange(change) => {
                self.pending_changes.push(change);
            }

            SyncAction::MarkChangesSynced { ids } => {
                self.pending_changes.retain(|change| !ids.contains(&change.id));
            }

            SyncAction::ClearPendingChanges => {
                self.pending_changes.clear();
            }

            SyncAction::SetOnlineStatus(online) => {
                self.is_online = online;
            }

            SyncAction::UpdateCache { key, value } => {
                self.cache.insert(key, value);
            }

            SyncAction::SyncFromCache => {
                if let Some(value) = self.cache.get(FACILITATOR_CACHE_KEY) {
                    match serde_json::from_value::<FacilitatorConfig>(value.clone()) {
                        Ok(config) => self.facilitator_config = Some(config),
                        Err(e) => warn!("cached facilitator config is malformed: {e}"),
                    }
                }
                if let Some(Value::String(id)) = self.cache.get(CURRENT_NNA_CACHE_KEY) {
                    let known = self
                        .facilitator_config
                        .as_ref()
                        .is_some_and(|config| config.nna_profiles.contains_key(id));
                    if known {
                        self.current_nna = Some(id.clone());
                    } else {
                        debug!("cached current NNA '{}' not present in config, ignoring", id);
                    }
                }
            }
        }
    }

    pub fn nna_profile(&self, id: &str) -> Option<&NnaProfile> {
        self.facilitator_config
            .as_ref()
            .and_then(|config| config.nna_profiles.get(id))
    }

    /// `false` when the profile or the facilitator config is absent.
    pub fn can_nna_upgrade_level(&self, id: &str) -> bool {
        self.nna_profile(id)
            .map(|profile| profile.permissions.can_upgrade_level)
            .unwrap_or(false)
    }

    pub fn current_nna_profile(&self) -> Option<&NnaProfile> {
        self.current_nna.as_deref().and_then(|id| self.nna_profile(id))
    }

    fn cache_insert_json<T: serde::Serialize>(&mut self, key: String, value: &T) {
        match serde_json::to_value(value) {
            Ok(json) => {
                self.cache.insert(key, json);
            }
            Err(e) => warn!("could not mirror '{}' into the cache: {e}", key),
        }
    }
}

impl Default for SyncState {
    fn default() -> Self {
        Self::new()
    }
}
