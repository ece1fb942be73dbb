// Telemetry subscription behaviour against the in-memory store.
#![allow(clippy::unwrap_used, clippy::float_cmp)]

mod common;

use pretty_assertions::assert_eq;
use serde_json::json;

use common::{Recorder, path, settle};
use pondlink_core::{
    ConnectionPhase, CoreError, MemoryStore, SyncSubscription, TimeSource,
};

#[tokio::test]
async fn short_temperature_key_is_used() {
    let store = MemoryStore::new();
    store.put(&path("sensorData"), json!({ "water": { "temp": 5 } }));

    let recorder = Recorder::default();
    let _sub = SyncSubscription::subscribe(&store, path("sensorData"), recorder.callback()).unwrap();

    let view = recorder.wait_for(1).await;
    let data = view.data.unwrap();
    assert_eq!(data.water.temperature, 5.0);
    assert_eq!(data.water.ph, 0.0);
    assert_eq!(data.water.tds, 0.0);
    assert_eq!(view.connection.phase(), ConnectionPhase::Online);
}

#[tokio::test]
async fn missing_temperature_reads_zero() {
    let store = MemoryStore::new();
    store.put(&path("sensorData"), json!({ "water": { "ph": 7.4 } }));

    let recorder = Recorder::default();
    let _sub = SyncSubscription::subscribe(&store, path("sensorData"), recorder.callback()).unwrap();

    let view = recorder.wait_for(1).await;
    assert_eq!(view.data.unwrap().water.temperature, 0.0);
}

#[tokio::test]
async fn null_payload_goes_offline() {
    let store = MemoryStore::new();

    let recorder = Recorder::default();
    let _sub = SyncSubscription::subscribe(&store, path("sensorData"), recorder.callback()).unwrap();

    let view = recorder.wait_for(1).await;
    assert!(!view.connection.is_online);
    assert!(!view.connection.loading);
    assert_eq!(view.connection.error.as_deref(), Some("No data available"));
    assert!(view.data.is_none());
}

#[tokio::test]
async fn device_timestamp_is_kept_exactly() {
    let store = MemoryStore::new();
    store.put(
        &path("sensorData"),
        json!({ "water": { "temperature": 27 }, "ts": 1_700_000_000_000_i64 }),
    );

    let recorder = Recorder::default();
    let _sub = SyncSubscription::subscribe(&store, path("sensorData"), recorder.callback()).unwrap();

    let view = recorder.wait_for(1).await;
    let at = view.connection.last_update.unwrap();
    assert_eq!(at.timestamp_millis(), 1_700_000_000_000);
    assert_eq!(view.connection.last_update_source, Some(TimeSource::Device));
}

#[tokio::test]
async fn non_positive_timestamps_use_receipt_time() {
    for ts in [0, -1] {
        let store = MemoryStore::new();
        store.put(&path("sensorData"), json!({ "water": { "temperature": 27 }, "ts": ts }));

        let before = chrono::Utc::now();
        let recorder = Recorder::default();
        let _sub = SyncSubscription::subscribe(&store, path("sensorData"), recorder.callback()).unwrap();

        let view = recorder.wait_for(1).await;
        let at = view.connection.last_update.unwrap();
        assert!(at >= before, "ts={ts} produced {at}");
        assert_eq!(view.connection.last_update_source, Some(TimeSource::Received));
    }
}

#[tokio::test]
async fn transport_error_keeps_last_snapshot() {
    let store = MemoryStore::new();
    let telemetry = path("sensorData");
    store.put(&telemetry, json!({ "water": { "temperature": 22, "ph": 7, "tds": 300 } }));

    let recorder = Recorder::default();
    let _sub = SyncSubscription::subscribe(&store, telemetry.clone(), recorder.callback()).unwrap();
    let online = recorder.wait_for(1).await;

    store.emit_error(&telemetry, || CoreError::PermissionDenied {
        path: "sensorData".into(),
    });
    let offline = recorder.wait_for(2).await;

    assert!(!offline.connection.is_online);
    assert_eq!(
        offline.connection.error.as_deref(),
        Some("Permission denied at 'sensorData'")
    );
    assert_eq!(offline.data, online.data);
    assert_eq!(offline.connection.last_update, online.connection.last_update);
}

#[tokio::test]
async fn recovers_after_error() {
    let store = MemoryStore::new();
    let telemetry = path("sensorData");

    let recorder = Recorder::default();
    let sub = SyncSubscription::subscribe(&store, telemetry.clone(), recorder.callback()).unwrap();
    recorder.wait_for(1).await;

    store.put(&telemetry, json!({ "water": { "temperature": 23 } }));
    let view = recorder.wait_for(2).await;
    assert!(view.connection.is_online);
    assert!(view.connection.error.is_none());
    assert_eq!(sub.current(), view);
}

#[tokio::test]
async fn buffered_event_is_dropped_after_unsubscribe() {
    let store = MemoryStore::new();
    let telemetry = path("sensorData");
    store.put(&telemetry, json!({ "water": { "temperature": 20 } }));

    let recorder = Recorder::default();
    let sub = SyncSubscription::subscribe(&store, telemetry.clone(), recorder.callback()).unwrap();
    let mut rx = sub.view();
    let before = recorder.wait_for(1).await;

    // Single-threaded runtime: the pump cannot run between these two lines,
    // so the update is sitting in the listener's buffer at teardown.
    store.put(&telemetry, json!({ "water": { "temperature": 35 } }));
    sub.unsubscribe();

    settle().await;
    assert_eq!(recorder.len(), 1);
    assert_eq!(recorder.last(), Some(before.clone()));
    assert_eq!(*rx.borrow_and_update(), before);
    assert_eq!(store.listener_count(&telemetry), 0);
}

#[tokio::test]
async fn teardown_is_per_listener() {
    let store = MemoryStore::new();
    let telemetry = path("sensorData");
    store.put(&telemetry, json!({ "water": { "temperature": 20 } }));

    let first = Recorder::default();
    let second = Recorder::default();
    let sub_a = SyncSubscription::subscribe(&store, telemetry.clone(), first.callback()).unwrap();
    let _sub_b = SyncSubscription::subscribe(&store, telemetry.clone(), second.callback()).unwrap();
    first.wait_for(1).await;
    second.wait_for(1).await;

    sub_a.unsubscribe();
    settle().await;
    assert_eq!(store.listener_count(&telemetry), 1);

    store.put(&telemetry, json!({ "water": { "temperature": 31 } }));
    let latest = second.wait_for(2).await;
    assert_eq!(latest.data.unwrap().water.temperature, 31.0);

    settle().await;
    assert_eq!(first.len(), 1);
}

#[tokio::test]
async fn dropping_the_handle_unsubscribes() {
    let store = MemoryStore::new();
    let telemetry = path("sensorData");

    let recorder = Recorder::default();
    {
        let _sub = SyncSubscription::subscribe(&store, telemetry.clone(), recorder.callback()).unwrap();
        recorder.wait_for(1).await;
    }

    store.put(&telemetry, json!({ "water": { "temperature": 19 } }));
    settle().await;
    assert_eq!(recorder.len(), 1);
}
