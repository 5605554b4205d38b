use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// What an NNA is allowed to do on their own, without the facilitator.
///
/// Serialized camelCase so JSON looks like:
/// `{ "canUpgradeLevel": false, "canChangeSettings": true, "maxRegistriesPerDay": 5 }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NnaPermissions {
    pub can_upgrade_level: bool,
    pub can_change_settings: bool,
    pub max_registries_per_day: u32,
}

/// One child/adolescent profile, owned by a facilitator configuration.
///
/// `avatar` and `settings` are opaque blobs; the store round-trips them
/// without interpreting their contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NnaProfile {
    pub id: String,
    pub alias: String,
    pub level: u32,
    #[serde(default)]
    pub avatar: Value,
    #[serde(default)]
    pub settings: Value,
    pub permissions: NnaPermissions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registries_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_date: Option<String>,
    pub last_updated: DateTime<Utc>,
}

/// Facilitator-wide defaults that apply across all managed profiles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalSettings {
    pub default_permissions: NnaPermissions,
    /// Workshop session length in minutes.
    pub session_duration: u32,
    pub allow_group_chat: bool,
}

/// A facilitator and every NNA profile under their management.
///
/// Profiles are reachable only through `nna_profiles`; the store's
/// current-NNA selection is an id into this map, never a second copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacilitatorConfig {
    pub id: String,
    pub name: String,
    pub nna_profiles: HashMap<String, NnaProfile>,
    pub global_settings: GlobalSettings,
    pub last_updated: DateTime<Utc>,
}

/// Mutation category of a queued offline change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    LevelUpdate,
    PermissionsUpdate,
    ProfileUpdate,
    SettingsUpdate,
    RegistryRecorded,
}

/// A mutation recorded while offline, waiting to be replayed.
///
/// Each change is an idempotent command: `id` lets the remote endpoint
/// deduplicate redelivery, so a change may be retried until acknowledged.
/// JSON looks like:
/// `{ "id": "…", "kind": "level_update", "target": "nna-7", "payload": { "level": 3 }, "timestamp": 1754550000000 }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingChange {
    pub id: Uuid,
    pub kind: ChangeKind,
    pub target: String,
    pub payload: Value,
    /// Enqueue time, Unix milliseconds.
    pub timestamp: i64,
}

impl PendingChange {
    pub fn new(kind: ChangeKind, target: &str, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            target: target.to_string(),
            payload,
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

/// Partial profile update; `None` fields are left as they are.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<NnaPermissions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registries_count: Option<u32>,
}

impl ProfileUpdate {
    /// Merge the set fields into `profile`. Timestamps are the reducer's job.
    pub fn apply_to(&self, profile: &mut NnaProfile) {
        if let Some(alias) = &self.alias {
            profile.alias = alias.clone();
        }
        if let Some(level) = self.level {
            profile.level = level;
        }
        if let Some(avatar) = &self.avatar {
            profile.avatar = avatar.clone();
        }
        if let Some(settings) = &self.settings {
            profile.settings = settings.clone();
        }
        if let Some(permissions) = &self.permissions {
            profile.permissions = permissions.clone();
        }
        if let Some(count) = self.registries_count {
            profile.registries_count = Some(count);
        }
    }
}

/// Partial permission update; merged flag by flag, never a full replace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionsUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_upgrade_level: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_change_settings: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_registries_per_day: Option<u32>,
}

impl PermissionsUpdate {
    pub fn merged_with(&self, base: &NnaPermissions) -> NnaPermissions {
        NnaPermissions {
            can_upgrade_level: self.can_upgrade_level.unwrap_or(base.can_upgrade_level),
            can_change_settings: self.can_change_settings.unwrap_or(base.can_change_settings),
            max_registries_per_day: self
                .max_registries_per_day
                .unwrap_or(base.max_registries_per_day),
        }
    }
}

/// Partial update of the facilitator's global settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalSettingsUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_permissions: Option<NnaPermissions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_group_chat: Option<bool>,
}

impl GlobalSettingsUpdate {
    pub fn apply_to(&self, settings: &mut GlobalSettings) {
        if let Some(permissions) = &self.default_permissions {
            settings.default_permissions = permissions.clone();
        }
        if let Some(duration) = self.session_duration {
            settings.session_duration = duration;
        }
        if let Some(allow) = self.allow_group_chat {
            settings.allow_group_chat = allow;
        }
    }
}
