use std::sync::Arc;

use log::LevelFilter;
use tokio::time::{sleep, Duration, Instant};

use innerworld_core::core::sync_store::SyncStore;
use innerworld_core::storage::records::{DURABLE_KEY, SESSION_KEY};
use innerworld_core::storage::store::{JsonFileStore, KeyValueStore};

mod common;
use common::fake_transport::FakeTransport;
use common::memory_store::MemoryStore;
use common::{spawn_harness, test_options};

/// Poll the durable tier until `predicate` accepts its parsed contents.
async fn wait_for_durable_record<F>(store: &MemoryStore, predicate: F) -> serde_json::Value
where
    F: Fn(&serde_json::Value) -> bool,
{
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        if let Some(raw) = store.contents(DURABLE_KEY) {
            if let Ok(record) = serde_json::from_str::<serde_json::Value>(&raw) {
                if predicate(&record) {
                    return record;
                }
            }
        }
        assert!(
            Instant::now() < deadline,
            "timed out waiting for the debounced durable write"
        );
        sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn debounced_write_produces_the_storage_record_shapes() {
    //   Logs will appear only when you run with `-- --nocapture`
    //   or when the test fails.
    let _ = env_logger::Builder::from_default_env()
        .filter_level(LevelFilter::Debug)
        .is_test(true)
        .try_init();

    let harness = spawn_harness();
    harness
        .store
        .initialize_facilitator(common::sample_config())
        .await;
    harness.store.set_current_nna("nna-1").await;

    let record = wait_for_durable_record(&harness.durable, |record| {
        record.get("currentNNA").and_then(|v| v.as_str()) == Some("nna-1")
    })
    .await;

    assert!(
        record.get("facilitatorConfig").is_some(),
        "the durable record carries the whole facilitator config"
    );
    assert!(
        record
            .get("cache")
            .and_then(|cache| cache.get("facilitatorConfig"))
            .is_some(),
        "the cache mirrors the config under its predictable key"
    );
    assert!(record["timestamp"].is_i64());

    let session_raw = harness
        .session
        .contents(SESSION_KEY)
        .expect("the session tier is written in the same flush");
    let session: serde_json::Value =
        serde_json::from_str(&session_raw).expect("session record must be valid JSON");
    assert_eq!(session["isOnline"], serde_json::Value::Bool(true));
    assert_eq!(
        session["pendingChanges"]
            .as_array()
            .expect("pendingChanges must be an array")
            .len(),
        0
    );
}

#[tokio::test]
async fn a_second_store_rehydrates_the_flushed_state() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(LevelFilter::Debug)
        .is_test(true)
        .try_init();

    let durable = Arc::new(MemoryStore::new());
    let session = Arc::new(MemoryStore::new());
    let transport = Arc::new(FakeTransport::new());

    let store = SyncStore::spawn(
        durable.clone(),
        session.clone(),
        transport.clone(),
        test_options(),
    );
    store.initialize_facilitator(common::sample_config()).await;
    store.set_current_nna("nna-1").await;
    store.set_online(false).await;
    store.update_nna_level("nna-1", 2).await;
    store.shutdown().await.expect("shutdown flushes both tiers");

    let revived_transport = Arc::new(FakeTransport::new());
    let revived = SyncStore::spawn(
        durable.clone(),
        session.clone(),
        revived_transport.clone(),
        test_options(),
    );

    let config = revived
        .facilitator_config()
        .await
        .expect("the config must survive the round-trip");
    assert_eq!(config.id, "fac-1");
    assert_eq!(
        revived
            .current_nna()
            .await
            .expect("the current NNA must survive")
            .id,
        "nna-1"
    );
    assert_eq!(
        revived
            .nna_profile("nna-1")
            .await
            .expect("profile must exist")
            .level,
        2
    );
    assert_eq!(
        revived.pending_len().await,
        1,
        "the offline change must still be queued"
    );
    assert!(
        !revived.is_online().await,
        "the connectivity flag survives via the session tier"
    );

    // The rehydrated queue is still drainable.
    revived.set_online(true).await;
    let deadline = Instant::now() + Duration::from_secs(2);
    while revived.pending_len().await > 0 {
        assert!(
            Instant::now() < deadline,
            "timed out waiting for the rehydrated queue to drain"
        );
        sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(revived_transport.delivered().len(), 1);
}

#[tokio::test]
async fn malformed_records_fall_back_to_defaults() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(LevelFilter::Debug)
        .is_test(true)
        .try_init();

    let durable = Arc::new(MemoryStore::new());
    let session = Arc::new(MemoryStore::new());
    durable.seed(DURABLE_KEY, "{ this is not json");
    session.seed(SESSION_KEY, "\"wrong shape\"");

    let store = SyncStore::spawn(
        durable.clone(),
        session.clone(),
        Arc::new(FakeTransport::new()),
        test_options(),
    );

    assert!(store.facilitator_config().await.is_none());
    assert_eq!(store.pending_len().await, 0);
    assert!(store.is_online().await, "defaults apply when storage is garbage");

    // The store must stay usable after the failed rehydration.
    store.initialize_facilitator(common::sample_config()).await;
    assert!(store.facilitator_config().await.is_some());
}

#[test]
fn file_store_round_trips_records_on_disk() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = JsonFileStore::at(dir.path().join("state"))?;

    assert_eq!(store.read(DURABLE_KEY)?, None, "missing keys read as None");

    store.write(DURABLE_KEY, "{\"timestamp\":1}")?;
    assert_eq!(
        store.read(DURABLE_KEY)?.as_deref(),
        Some("{\"timestamp\":1}")
    );

    store.write(DURABLE_KEY, "{\"timestamp\":2}")?;
    assert_eq!(
        store.read(DURABLE_KEY)?.as_deref(),
        Some("{\"timestamp\":2}"),
        "writes replace the previous record"
    );
    Ok(())
}
