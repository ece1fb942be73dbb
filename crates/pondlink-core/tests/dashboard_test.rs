// Dashboard façade: single live subscription, command routing, and the
// Firebase-backed wiring against a mock server.
#![allow(clippy::unwrap_used, clippy::float_cmp)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, body_string_contains, method, path as url_path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{Recorder, path, settle};
use pondlink_core::{
    ActuatorCommand, CoreError, Dashboard, DashboardConfig, MemoryAuth, MemoryStore,
    ReconnectPolicy, RelayMessage,
};

fn config(database_url: &str) -> DashboardConfig {
    DashboardConfig::new(
        Url::parse(database_url).unwrap(),
        SecretString::from("web-key".to_string()),
    )
    .unwrap()
}

#[tokio::test]
async fn second_start_is_rejected_until_shutdown() {
    let store = Arc::new(MemoryStore::new());
    let dashboard = Dashboard::new(
        config("https://pond.example.com"),
        store.clone(),
        Arc::new(MemoryAuth::new()),
    );

    dashboard.start_telemetry(|_| {}).unwrap();
    let err = dashboard.start_telemetry(|_| {}).unwrap_err();
    assert!(matches!(err, CoreError::AlreadySubscribed));

    dashboard.shutdown();
    settle().await;
    assert_eq!(store.listener_count(&path("sensorData")), 0);

    dashboard.start_telemetry(|_| {}).unwrap();
    dashboard.shutdown();
}

#[tokio::test]
async fn telemetry_receiver_tracks_callback() {
    let store = Arc::new(MemoryStore::new());
    store.put(&path("sensorData"), json!({ "water": { "temperature": 24.5, "ph": 7.1, "tds": 350 } }));
    let dashboard = Dashboard::new(
        config("https://pond.example.com"),
        store.clone(),
        Arc::new(MemoryAuth::new()),
    );
    let mut rx = dashboard.telemetry();
    assert!(rx.borrow().connection.loading);

    let recorder = Recorder::default();
    dashboard.start_telemetry(recorder.callback()).unwrap();
    let seen = recorder.wait_for(1).await;

    let view = rx.wait_for(|v| !v.connection.loading).await.unwrap().clone();
    assert_eq!(view, seen);
    assert_eq!(view.data.unwrap().water.temperature, 24.5);

    dashboard.shutdown();
    store.put(&path("sensorData"), json!({ "water": { "temperature": 30 } }));
    settle().await;
    assert_eq!(*rx.borrow_and_update(), seen);
}

#[tokio::test]
async fn commands_route_through_dashboard() {
    let store = Arc::new(MemoryStore::new());
    let auth = Arc::new(MemoryAuth::new());
    let dashboard = Dashboard::new(config("https://pond.example.com"), store.clone(), auth.clone());

    let result = dashboard.send_command(ActuatorCommand::new(0, true)).await;
    assert!(result.confirmed);
    assert!(dashboard.relay_status(0).borrow().displayed_on());
    assert_eq!(auth.attempts(), 1);
}

#[tokio::test]
async fn connect_signs_in_and_confirms_against_database() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(url_path("/v1/accounts:signUp"))
        .and(query_param("key", "web-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "idToken": "anon-token",
            "localId": "anon-7",
            "expiresIn": "3600"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(url_path("/devices/relay2.json"))
        .and(query_param("auth", "anon-token"))
        .and(body_json(json!({ "message": "OFF" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "OFF" })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(url_path("/devices/relay2.json"))
        .and(query_param("auth", "anon-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "OFF" })))
        .expect(1)
        .mount(&server)
        .await;

    let mut cfg = config(&server.uri());
    cfg.identity_url = Some(Url::parse(&server.uri()).unwrap());
    cfg.timeout = Duration::from_secs(5);
    let dashboard = Dashboard::connect(cfg).unwrap();

    let result = dashboard.send_command(ActuatorCommand::new(1, false)).await;
    assert!(result.confirmed, "unexpected result: {result:?}");
    assert_eq!(result.observed_value, Some(RelayMessage::Off));
}

/// Sign-up that expires at once, so the next command must renew the session.
async fn mount_short_lived_sign_up(server: &MockServer, expected: u64) {
    Mock::given(method("POST"))
        .and(url_path("/v1/accounts:signUp"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "idToken": "anon-token",
            "refreshToken": "refresh-1",
            "localId": "anon-7",
            "expiresIn": "0"
        })))
        .expect(expected)
        .mount(server)
        .await;
}

fn short_lived_config(server: &MockServer) -> DashboardConfig {
    let mut cfg = config(&server.uri());
    cfg.identity_url = Some(Url::parse(&server.uri()).unwrap());
    cfg.timeout = Duration::from_secs(5);
    cfg
}

#[tokio::test]
async fn expired_session_is_refreshed_not_replaced() {
    let server = MockServer::start().await;
    mount_short_lived_sign_up(&server, 1).await;

    Mock::given(method("POST"))
        .and(url_path("/v1/token"))
        .and(query_param("key", "web-key"))
        .and(body_string_contains("refresh_token=refresh-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id_token": "anon-token-2",
            "refresh_token": "refresh-1",
            "user_id": "anon-7",
            "expires_in": "3600"
        })))
        .expect(1)
        .mount(&server)
        .await;

    for token in ["anon-token", "anon-token-2"] {
        Mock::given(method("PUT"))
            .and(url_path("/devices/relay1.json"))
            .and(query_param("auth", token))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "ON" })))
            .expect(1)
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(url_path("/devices/relay1.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "ON" })))
        .mount(&server)
        .await;

    let dashboard = Dashboard::connect(short_lived_config(&server)).unwrap();

    for _ in 0..2 {
        let result = dashboard.send_command(ActuatorCommand::new(0, true)).await;
        assert!(result.confirmed, "unexpected result: {result:?}");
    }
}

#[tokio::test]
async fn refused_refresh_falls_back_to_sign_up() {
    let server = MockServer::start().await;
    mount_short_lived_sign_up(&server, 2).await;

    Mock::given(method("POST"))
        .and(url_path("/v1/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": { "code": 400, "message": "USER_NOT_FOUND" }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(url_path("/devices/relay1.json"))
        .and(query_param("auth", "anon-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "ON" })))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(url_path("/devices/relay1.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "ON" })))
        .mount(&server)
        .await;

    let dashboard = Dashboard::connect(short_lived_config(&server)).unwrap();

    for _ in 0..2 {
        let result = dashboard.send_command(ActuatorCommand::new(0, true)).await;
        assert!(result.confirmed, "unexpected result: {result:?}");
    }
}

#[tokio::test]
async fn connect_reports_denied_telemetry() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(url_path("/sensorData.json"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "error": "Permission denied" })))
        .mount(&server)
        .await;

    let mut cfg = config(&server.uri());
    cfg.reconnect = ReconnectPolicy {
        initial_delay: Duration::from_millis(20),
        max_delay: Duration::from_millis(50),
        max_retries: Some(0),
    };
    let dashboard = Dashboard::connect(cfg).unwrap();

    let recorder = Recorder::default();
    dashboard.start_telemetry(recorder.callback()).unwrap();
    let view = recorder.wait_for(1).await;

    assert!(!view.connection.is_online);
    assert_eq!(
        view.connection.error.as_deref(),
        Some("Permission denied at 'sensorData'")
    );
    dashboard.shutdown();
}
