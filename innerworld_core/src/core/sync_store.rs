use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{debug, error, info, warn};
use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex};
use tokio::time::{sleep, sleep_until, Instant};
use uuid::Uuid;

use crate::core::state::{SyncAction, SyncState, CURRENT_NNA_CACHE_KEY, FACILITATOR_CACHE_KEY};
use crate::profiles::errors::SyncError;
use crate::profiles::profile::{
    ChangeKind, FacilitatorConfig, GlobalSettingsUpdate, NnaProfile, PendingChange,
    PermissionsUpdate, ProfileUpdate,
};
use crate::storage::records::{DurableRecord, SessionRecord, DURABLE_KEY, SESSION_KEY};
use crate::storage::store::KeyValueStore;
use crate::transports::transport::SyncTransport;

/// Tuning knobs for the background task.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Write-behind window: state changes within it coalesce into one write.
    pub debounce: Duration,
    /// Delivery attempts per queued change before it stays queued.
    pub retry_attempts: u32,
    /// Backoff before the second attempt; doubled after each failure.
    pub retry_base_delay: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(100),
            retry_attempts: 3,
            retry_base_delay: Duration::from_millis(250),
        }
    }
}

enum StoreEvent {
    Dirty,
    Sync,
    Stop,
}

/// Single source of truth for facilitator/NNA state.
///
/// Every mutation is serialized through the reducer behind one mutex, so
/// transitions apply one at a time. A background task owns the side effects:
/// it debounces writes to the two storage tiers and replays the offline
/// queue through the transport. Cloning merely bumps reference counts, so
/// a store can be handed to several callers cheaply.
#[derive(Clone)]
pub struct SyncStore {
    state: Arc<Mutex<SyncState>>,
    events_tx: mpsc::Sender<StoreEvent>,
    task: Arc<Mutex<Option<tokio::task::JoinHandle<()>>>>,
}

impl SyncStore {
    /// Rehydrate state from the two tiers and start the background task.
    ///
    /// All collaborators are injected: storage backends for the durable and
    /// session tiers, the transport queued changes are replayed through, and
    /// the timing options.
    pub fn spawn(
        durable: Arc<dyn KeyValueStore>,
        session: Arc<dyn KeyValueStore>,
        transport: Arc<dyn SyncTransport>,
        options: SyncOptions,
    ) -> Self {
        let mut state = SyncState::new();
        rehydrate(&mut state, durable.as_ref(), session.as_ref());
        let state = Arc::new(Mutex::new(state));

        let (events_tx, events_rx) = mpsc::channel::<StoreEvent>(32);
        let task = tokio::spawn(run_store_task(
            state.clone(),
            durable,
            session,
            transport,
            options,
            events_rx,
        ));

        Self {
            state,
            events_tx,
            task: Arc::new(Mutex::new(Some(task))),
        }
    }

    /// Replace the facilitator configuration in full.
    pub async fn initialize_facilitator(&self, config: FacilitatorConfig) {
        self.state
            .lock()
            .await
            .apply(SyncAction::SetFacilitatorConfig(config));
        self.mark_dirty().await;
    }

    /// Select the active NNA. No-op unless `id` exists in the loaded config.
    pub async fn set_current_nna(&self, id: &str) {
        self.state
            .lock()
            .await
            .apply(SyncAction::SetCurrentNna { id: id.to_string() });
        self.mark_dirty().await;
    }

    /// Merge a partial update into the profile at `id`.
    ///
    /// While offline the mutation is also queued for later replay.
    pub async fn update_nna_profile(&self, id: &str, updates: ProfileUpdate) {
        let payload = change_payload(&updates);
        {
            let mut state = self.state.lock().await;
            state.apply(SyncAction::UpdateNnaProfile {
                id: id.to_string(),
                updates,
            });
            if !state.is_online {
                state.apply(SyncAction::AddPendingChange(PendingChange::new(
                    ChangeKind::ProfileUpdate,
                    id,
                    payload,
                )));
            }
        }
        self.mark_dirty().await;
    }

    /// Set an NNA's progression level.
    ///
    /// The store does not check caller identity; whether the caller may raise
    /// levels is the calling layer's decision (the `canUpgradeLevel` flag is
    /// data it can consult via [`SyncStore::can_nna_upgrade_level`]).
    pub async fn update_nna_level(&self, id: &str, level: u32) {
        {
            let mut state = self.state.lock().await;
            state.apply(SyncAction::UpdateNnaLevel {
                id: id.to_string(),
                level,
            });
            if !state.is_online {
                state.apply(SyncAction::AddPendingChange(PendingChange::new(
                    ChangeKind::LevelUpdate,
                    id,
                    json!({ "level": level }),
                )));
            }
        }
        self.mark_dirty().await;
    }

    /// Merge the given flags into an NNA's permission set.
    pub async fn update_nna_permissions(&self, id: &str, permissions: PermissionsUpdate) {
        let payload = change_payload(&permissions);
        {
            let mut state = self.state.lock().await;
            state.apply(SyncAction::UpdateNnaPermissions {
                id: id.to_string(),
                permissions,
            });
            if !state.is_online {
                state.apply(SyncAction::AddPendingChange(PendingChange::new(
                    ChangeKind::PermissionsUpdate,
                    id,
                    payload,
                )));
            }
        }
        self.mark_dirty().await;
    }

    /// Merge a partial update into the facilitator's global settings.
    pub async fn update_global_settings(&self, updates: GlobalSettingsUpdate) {
        let payload = change_payload(&updates);
        {
            let mut state = self.state.lock().await;
            let Some(target) = state.facilitator_config.as_ref().map(|c| c.id.clone()) else {
                debug!("global settings update ignored: no facilitator config loaded");
                return;
            };
            state.apply(SyncAction::UpdateGlobalSettings { updates });
            if !state.is_online {
                state.apply(SyncAction::AddPendingChange(PendingChange::new(
                    ChangeKind::SettingsUpdate,
                    &target,
                    payload,
                )));
            }
        }
        self.mark_dirty().await;
    }

    /// Count one emotional registry for an NNA.
    pub async fn record_registry(&self, id: &str) {
        {
            let mut state = self.state.lock().await;
            let Some(count) = state
                .nna_profile(id)
                .map(|profile| profile.registries_count.unwrap_or(0))
            else {
                debug!("registry for unknown NNA '{id}' ignored");
                return;
            };
            state.apply(SyncAction::UpdateNnaProfile {
                id: id.to_string(),
                updates: ProfileUpdate {
                    registries_count: Some(count + 1),
                    ..ProfileUpdate::default()
                },
            });
            if !state.is_online {
                state.apply(SyncAction::AddPendingChange(PendingChange::new(
                    ChangeKind::RegistryRecorded,
                    id,
                    json!({ "registriesCount": count + 1 }),
                )));
            }
        }
        self.mark_dirty().await;
    }

    /// Queue a change directly. Drained right away if the store is online.
    pub async fn add_pending_change(&self, change: PendingChange) {
        let online = {
            let mut state = self.state.lock().await;
            state.apply(SyncAction::AddPendingChange(change));
            state.is_online
        };
        self.mark_dirty().await;
        if online {
            self.request_sync().await;
        }
    }

    /// Empty the queue entirely, acknowledged or not.
    pub async fn clear_pending_changes(&self) {
        self.state.lock().await.apply(SyncAction::ClearPendingChanges);
        self.mark_dirty().await;
    }

    /// Update the connectivity flag. Driven by the host environment; the
    /// transition to online triggers a drain when changes are queued.
    pub async fn set_online(&self, online: bool) {
        let should_sync = {
            let mut state = self.state.lock().await;
            let was_online = state.is_online;
            state.apply(SyncAction::SetOnlineStatus(online));
            online && !was_online && !state.pending_changes.is_empty()
        };
        self.mark_dirty().await;
        if should_sync {
            self.request_sync().await;
        }
    }

    /// Ask for a drain of the queue now, independent of connectivity.
    pub async fn sync_pending_changes(&self) {
        if self.state.lock().await.pending_changes.is_empty() {
            return;
        }
        self.request_sync().await;
    }

    pub async fn nna_profile(&self, id: &str) -> Option<NnaProfile> {
        self.state.lock().await.nna_profile(id).cloned()
    }

    /// `false` when the profile or the facilitator config is absent.
    pub async fn can_nna_upgrade_level(&self, id: &str) -> bool {
        self.state.lock().await.can_nna_upgrade_level(id)
    }

    /// The active NNA, resolved through the facilitator's profile map.
    pub async fn current_nna(&self) -> Option<NnaProfile> {
        self.state.lock().await.current_nna_profile().cloned()
    }

    pub async fn current_nna_id(&self) -> Option<String> {
        self.state.lock().await.current_nna.clone()
    }

    pub async fn facilitator_config(&self) -> Option<FacilitatorConfig> {
        self.state.lock().await.facilitator_config.clone()
    }

    pub async fn is_online(&self) -> bool {
        self.state.lock().await.is_online
    }

    pub async fn pending_changes(&self) -> Vec<PendingChange> {
        self.state.lock().await.pending_changes.clone()
    }

    pub async fn pending_len(&self) -> usize {
        self.state.lock().await.pending_changes.len()
    }

    /// Stop the background task. Queued events are processed first and one
    /// final write flushes whatever the debounce window still holds.
    pub async fn shutdown(self) -> Result<(), SyncError> {
        let _ = self.events_tx.send(StoreEvent::Stop).await;
        let handle = self.task.lock().await.take();
        match handle {
            Some(task) => task
                .await
                .map_err(|e| SyncError::Other(format!("sync store task failed: {e}"))),
            None => Ok(()),
        }
    }

    async fn mark_dirty(&self) {
        if self.events_tx.send(StoreEvent::Dirty).await.is_err() {
            warn!("sync store task is gone, state will not be persisted");
        }
    }

    async fn request_sync(&self) {
        if self.events_tx.send(StoreEvent::Sync).await.is_err() {
            warn!("sync store task is gone, pending changes will not be replayed");
        }
    }
}

fn change_payload<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

/// Replay the storage tiers into a fresh state. Malformed or unreadable
/// records are logged and skipped; the state keeps its defaults.
fn rehydrate(state: &mut SyncState, durable: &dyn KeyValueStore, session: &dyn KeyValueStore) {
    match durable.read(DURABLE_KEY) {
        Ok(Some(raw)) => match serde_json::from_str::<DurableRecord>(&raw) {
            Ok(record) => {
                if let Some(config) = record.facilitator_config {
                    match serde_json::to_value(&config) {
                        Ok(value) => state.apply(SyncAction::UpdateCache {
                            key: FACILITATOR_CACHE_KEY.to_string(),
                            value,
                        }),
                        Err(e) => warn!("stored facilitator config not replayable: {e}"),
                    }
                }
                if let Some(id) = record.current_nna {
                    state.apply(SyncAction::UpdateCache {
                        key: CURRENT_NNA_CACHE_KEY.to_string(),
                        value: Value::String(id),
                    });
                }
                state.apply(SyncAction::SyncFromCache);
            }
            Err(e) => warn!("ignoring malformed durable record: {e}"),
        },
        Ok(None) => {}
        Err(e) => warn!("could not read durable storage: {e}"),
    }

    match session.read(SESSION_KEY) {
        Ok(Some(raw)) => match serde_json::from_str::<SessionRecord>(&raw) {
            Ok(record) => {
                for change in record.pending_changes {
                    state.apply(SyncAction::AddPendingChange(change));
                }
                state.apply(SyncAction::SetOnlineStatus(record.is_online));
            }
            Err(e) => warn!("ignoring malformed session record: {e}"),
        },
        Ok(None) => {}
        Err(e) => warn!("could not read session storage: {e}"),
    }
}

async fn run_store_task(
    state: Arc<Mutex<SyncState>>,
    durable: Arc<dyn KeyValueStore>,
    session: Arc<dyn KeyValueStore>,
    transport: Arc<dyn SyncTransport>,
    options: SyncOptions,
    mut events_rx: mpsc::Receiver<StoreEvent>,
) {
    debug!("sync store task started");
    let mut flush_at: Option<Instant> = None;
    loop {
        tokio::select! {
            event = events_rx.recv() => match event {
                Some(StoreEvent::Dirty) => {
                    flush_at = Some(Instant::now() + options.debounce);
                }
                Some(StoreEvent::Sync) => {
                    if drain_pending_changes(&state, transport.as_ref(), &options).await {
                        flush_at = Some(Instant::now() + options.debounce);
                    }
                }
                Some(StoreEvent::Stop) | None => break,
            },
            _ = sleep_until(flush_at.unwrap_or_else(Instant::now)), if flush_at.is_some() => {
                persist(&state, durable.as_ref(), session.as_ref()).await;
                flush_at = None;
            }
        }
    }
    // Flush whatever the debounce window still holds.
    persist(&state, durable.as_ref(), session.as_ref()).await;
    debug!("sync store task ended");
}

/// Write both tiers from one snapshot. Failures are logged, never surfaced:
/// the in-memory state stays authoritative.
async fn persist(state: &Mutex<SyncState>, durable: &dyn KeyValueStore, session: &dyn KeyValueStore) {
    let snapshot = state.lock().await.clone();
    let now = Utc::now().timestamp_millis();

    let durable_record = DurableRecord {
        facilitator_config: snapshot.facilitator_config,
        current_nna: snapshot.current_nna,
        cache: snapshot.cache,
        timestamp: now,
    };
    match serde_json::to_string(&durable_record) {
        Ok(raw) => {
            if let Err(e) = durable.write(DURABLE_KEY, &raw) {
                error!("failed to write durable state: {e}");
            }
        }
        Err(e) => error!("failed to serialize durable state: {e}"),
    }

    let session_record = SessionRecord {
        pending_changes: snapshot.pending_changes,
        is_online: snapshot.is_online,
        timestamp: now,
    };
    match serde_json::to_string(&session_record) {
        Ok(raw) => {
            if let Err(e) = session.write(SESSION_KEY, &raw) {
                error!("failed to write session state: {e}");
            }
        }
        Err(e) => error!("failed to serialize session state: {e}"),
    }
}

/// Deliver a snapshot of the queue, change by change, and drop exactly the
/// acknowledged entries. Changes enqueued after the snapshot are untouched,
/// so a drain can never lose a mutation that raced it.
async fn drain_pending_changes(
    state: &Mutex<SyncState>,
    transport: &dyn SyncTransport,
    options: &SyncOptions,
) -> bool {
    let pending = state.lock().await.pending_changes.clone();
    if pending.is_empty() {
        return false;
    }
    info!("syncing {} pending change(s)", pending.len());

    let mut acked: Vec<Uuid> = Vec::new();
    for change in &pending {
        if deliver_with_retry(transport, change, options).await {
            acked.push(change.id);
        }
    }

    let failed = pending.len() - acked.len();
    if failed > 0 {
        warn!("{failed} pending change(s) were not acknowledged and stay queued");
    }
    if acked.is_empty() {
        return false;
    }
    state
        .lock()
        .await
        .apply(SyncAction::MarkChangesSynced { ids: acked });
    true
}

async fn deliver_with_retry(
    transport: &dyn SyncTransport,
    change: &PendingChange,
    options: &SyncOptions,
) -> bool {
    let mut delay = options.retry_base_delay;
    for attempt in 1..=options.retry_attempts {
        match transport.deliver(change).await {
            Ok(()) => {
                debug!("change {} acknowledged on attempt {attempt}", change.id);
                return true;
            }
            Err(e) => {
                warn!(
                    "delivery of change {} failed (attempt {attempt}/{}): {e}",
                    change.id, options.retry_attempts
                );
                if attempt < options.retry_attempts {
                    sleep(delay).await;
                    delay *= 2;
                }
            }
        }
    }
    false
}
