//! Server-sent event stream for a database path, with auto-reconnect.
//!
//! A streaming `GET` with `Accept: text/event-stream` makes the database push
//! `put`/`patch` events describing changes below the listened path. This
//! module keeps the full value at that path up to date and emits it after
//! every change. Connection failures are reported as [`StreamEvent::Error`]
//! and followed by exponential backoff + jitter before reconnecting.
//!
//! # Example
//!
//! ```rust,ignore
//! use pondlink_api::stream::{ReconnectConfig, StreamEvent};
//! use tokio_util::sync::CancellationToken;
//!
//! let cancel = CancellationToken::new();
//! let mut rx = db.listen("sensorData", ReconnectConfig::default(), cancel.clone())?;
//!
//! while let Some(event) = rx.recv().await {
//!     match event {
//!         StreamEvent::Value(v) => println!("{v}"),
//!         StreamEvent::Error(e) => eprintln!("{e}"),
//!     }
//! }
//! ```

use std::time::Duration;

use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::auth::TokenSlot;
use crate::database::{DatabaseClient, check_status};
use crate::error::Error;

// ── StreamEvent ──────────────────────────────────────────────────────

/// What a listener receives.
#[derive(Debug)]
pub enum StreamEvent {
    /// Full value at the listened path after a change. `Null` when empty.
    Value(Value),
    /// The connection failed; a reconnect is scheduled.
    Error(Error),
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for stream reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum consecutive failures before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

// ── Listening ────────────────────────────────────────────────────────

/// Everything the background loop needs, detached from the client borrow.
struct StreamTarget {
    http: reqwest::Client,
    url: Url,
    path: String,
    tokens: TokenSlot,
}

impl DatabaseClient {
    /// Start streaming the value at `path`.
    ///
    /// Spawns a background task that runs until `cancel` fires or the
    /// returned receiver is dropped. Each listener owns its own connection,
    /// so tearing one down never affects another on the same path.
    pub fn listen(
        &self,
        path: &str,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
    ) -> Result<mpsc::UnboundedReceiver<StreamEvent>, Error> {
        let target = StreamTarget {
            http: self.stream_http().clone(),
            url: self.path_url(path)?,
            path: path.to_owned(),
            tokens: self.tokens().clone(),
        };
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            listen_loop(target, tx, reconnect, cancel).await;
        });

        Ok(rx)
    }
}

/// Main loop: connect → read → on error, report + backoff → reconnect.
async fn listen_loop(
    target: StreamTarget,
    tx: mpsc::UnboundedSender<StreamEvent>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;

    loop {
        let delay = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tx.closed() => break,
            result = connect_and_read(&target, &tx, &cancel) => match result {
                // Server ended the stream. Reconnect after the base delay.
                Ok(()) => {
                    tracing::info!(path = %target.path, "event stream ended, reconnecting");
                    attempt = 0;
                    reconnect.initial_delay
                }
                Err(e) => {
                    if e.is_transient() {
                        tracing::warn!(path = %target.path, error = %e, attempt, "event stream error");
                    } else {
                        tracing::error!(path = %target.path, error = %e, attempt, "event stream refused");
                    }
                    let _ = tx.send(StreamEvent::Error(e));

                    if reconnect.max_retries.is_some_and(|max| attempt >= max) {
                        tracing::error!(path = %target.path, "stream reconnection limit reached, giving up");
                        break;
                    }

                    let delay = calculate_backoff(attempt, &reconnect);
                    attempt = attempt.saturating_add(1);
                    delay
                }
            },
        };

        tracing::debug!(delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX), "waiting before reconnect");
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tx.closed() => break,
            () = tokio::time::sleep(delay) => {}
        }
    }

    tracing::debug!(path = %target.path, "event stream loop exiting");
}

/// Open one streaming connection and read events until it drops.
///
/// The tree is rebuilt from scratch per connection: the server always opens
/// with a `put` at `/` carrying the full current value.
async fn connect_and_read(
    target: &StreamTarget,
    tx: &mpsc::UnboundedSender<StreamEvent>,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    let url = DatabaseClient::authorize(&target.tokens, target.url.clone());
    tracing::info!(path = %target.path, "opening event stream");

    let resp = target
        .http
        .get(url)
        .header(reqwest::header::ACCEPT, "text/event-stream")
        .send()
        .await
        .map_err(Error::Transport)?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return check_status(status, &body, &target.path);
    }

    let mut body = resp.bytes_stream();
    let mut decoder = SseDecoder::default();
    let mut tree = Value::Null;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(()),
            chunk = body.next() => match chunk {
                Some(Ok(bytes)) => {
                    for frame in decoder.push(&bytes) {
                        if let Some(value) = apply_frame(&frame, &mut tree, &target.path)? {
                            let _ = tx.send(StreamEvent::Value(value));
                        }
                    }
                }
                Some(Err(e)) => return Err(Error::Transport(e)),
                None => return Ok(()),
            },
        }
    }
}

// ── Event interpretation ─────────────────────────────────────────────

/// Payload of `put` and `patch` events.
#[derive(Debug, Deserialize)]
struct ChangePayload {
    path: String,
    data: Value,
}

/// Apply one frame to the tree. Returns the new full value when it changed.
fn apply_frame(frame: &SseFrame, tree: &mut Value, listened: &str) -> Result<Option<Value>, Error> {
    match frame.event.as_str() {
        "put" | "patch" => {
            let change: ChangePayload = serde_json::from_str(&frame.data).map_err(|e| {
                Error::Stream(format!("malformed {} payload: {e}", frame.event))
            })?;
            if frame.event == "put" {
                apply_put(tree, &change.path, change.data);
            } else {
                apply_patch(tree, &change.path, change.data)?;
            }
            Ok(Some(tree.clone()))
        }
        "keep-alive" => {
            tracing::trace!("event stream keep-alive");
            Ok(None)
        }
        // Security rules no longer allow reading this location.
        "cancel" => Err(Error::PermissionDenied {
            path: listened.to_owned(),
        }),
        "auth_revoked" => Err(Error::SessionExpired),
        other => {
            tracing::debug!(event = other, "ignoring unknown stream event");
            Ok(None)
        }
    }
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Replace the node at `path` (relative to the tree root).
fn apply_put(tree: &mut Value, path: &str, data: Value) {
    set_at(tree, &segments(path), prune(data));
}

/// Merge each child of `data` into the node at `path`.
fn apply_patch(tree: &mut Value, path: &str, data: Value) -> Result<(), Error> {
    let Value::Object(children) = data else {
        return Err(Error::Stream("patch payload is not an object".into()));
    };
    let base = segments(path);
    for (key, value) in children {
        let mut full = base.clone();
        full.extend(segments(&key));
        set_at(tree, &full, prune(value));
    }
    Ok(())
}

/// Write `data` at `path`, creating parents; `Null` deletes and empty
/// parents collapse back to `Null`.
fn set_at(node: &mut Value, path: &[&str], data: Value) {
    let Some((head, rest)) = path.split_first() else {
        *node = data;
        return;
    };

    if !node.is_object() {
        if data.is_null() {
            return;
        }
        *node = Value::Object(Map::new());
    }

    let emptied = match node {
        Value::Object(map) => {
            let child = map.entry((*head).to_owned()).or_insert(Value::Null);
            set_at(child, rest, data);
            if child.is_null() {
                map.remove(*head);
            }
            map.is_empty()
        }
        _ => false,
    };

    if emptied {
        *node = Value::Null;
    }
}

/// Drop `null` children and collapse empty objects, as the database does.
fn prune(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let kept: Map<String, Value> = map
                .into_iter()
                .map(|(k, v)| (k, prune(v)))
                .filter(|(_, v)| !v.is_null())
                .collect();
            if kept.is_empty() {
                Value::Null
            } else {
                Value::Object(kept)
            }
        }
        other => other,
    }
}

// ── SSE decoding ─────────────────────────────────────────────────────

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SseFrame {
    event: String,
    data: String,
}

/// Incremental `text/event-stream` decoder.
///
/// Bytes are buffered until a full line is available so multi-byte UTF-8
/// sequences split across chunks decode correctly.
#[derive(Debug, Default)]
struct SseDecoder {
    buf: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buf.extend_from_slice(chunk);
        let mut frames = Vec::new();

        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buf.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&raw);
            let line = text.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if let Some(frame) = self.dispatch() {
                    frames.push(frame);
                }
                continue;
            }
            if line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };
            match field {
                "event" => self.event = Some(value.to_owned()),
                "data" => self.data.push(value.to_owned()),
                _ => {}
            }
        }

        frames
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        let data = std::mem::take(&mut self.data);
        if event.is_none() && data.is_empty() {
            return None;
        }
        Some(SseFrame {
            event: event.unwrap_or_else(|| "message".into()),
            data: data.join("\n"),
        })
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) * (1 ± 0.25)`
///
/// The jitter is derived from the attempt number so that many dashboards
/// losing the same connection do not reconnect in lockstep.
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = i32::try_from(attempt.min(30)).unwrap_or(30);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    Duration::from_secs_f64((capped * jitter_factor).max(0.0))
}

// ── Tests ────────────────────────────────────────────────────────────
