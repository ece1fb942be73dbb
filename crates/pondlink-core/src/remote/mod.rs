// ── Remote store seam ──
//
// The core talks to the realtime database and the identity provider only
// through these traits. `firebase` adapts the HTTP clients from
// `pondlink-api`; `memory` is an in-process store for tests and demos.

mod firebase;
mod memory;
mod path;

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::error::CoreError;

pub use firebase::{FirebaseAuth, FirebaseStore};
pub use memory::{MemoryAuth, MemoryStore};
pub use path::StorePath;

// ── Session ──────────────────────────────────────────────────────

/// An authenticated (possibly anonymous) identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub uid: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

/// Source of sessions. Only the two questions the core ever asks.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// The current session, whether or not it is still active.
    fn current_session(&self) -> Option<Session>;

    /// Create a fresh anonymous session and make it current.
    async fn sign_in_anonymously(&self) -> Result<Session, CoreError>;
}

// ── Store ────────────────────────────────────────────────────────

/// A hierarchical key/value store that pushes changes to listeners.
#[async_trait]
pub trait RealtimeStore: Send + Sync {
    /// Read the value at `path`. A missing node is `None`.
    async fn get(&self, path: &StorePath) -> Result<Option<Value>, CoreError>;

    /// Replace the value at `path`.
    async fn set(&self, path: &StorePath, value: Value) -> Result<(), CoreError>;

    /// Attach a listener to `path`. The current value is delivered first.
    ///
    /// Each call returns an independent [`Listener`]; detaching it never
    /// affects any other listener, even on the same path.
    fn listen(&self, path: &StorePath) -> Result<Listener, CoreError>;
}

/// What a listener receives.
#[derive(Debug)]
pub enum RemoteEvent {
    /// Full value at the path after a change. `None` when the node is empty.
    Value(Option<Value>),
    /// The transport failed. Further values may follow after a reconnect.
    Error(CoreError),
}

// ── Listener ─────────────────────────────────────────────────────

/// Identifies one attached listener within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Handle for one registration returned by [`RealtimeStore::listen`].
///
/// Dropping it (or calling [`detach`](Self::detach)) cancels the
/// registration's token, which the store uses to stop delivering to it.
pub struct Listener {
    id: ListenerId,
    events: mpsc::UnboundedReceiver<RemoteEvent>,
    _detach: DropGuard,
}

impl Listener {
    /// Wrap a store's event channel. `token` is cancelled on detach.
    pub fn new(events: mpsc::UnboundedReceiver<RemoteEvent>, token: CancellationToken) -> Self {
        Self {
            id: ListenerId::next(),
            events,
            _detach: token.drop_guard(),
        }
    }

    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Next event, or `None` once the store side has gone away.
    pub async fn next(&mut self) -> Option<RemoteEvent> {
        self.events.recv().await
    }

    /// Stop receiving. Events already buffered are discarded.
    pub fn detach(self) {
        drop(self);
    }
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener").field("id", &self.id).finish_non_exhaustive()
    }
}
