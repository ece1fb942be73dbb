// In-process realtime store.
//
// Values are kept per exact path (no tree semantics): enough for the flat
// `sensorData` / `devices/relayN` layout. Every listener has its own
// registration, removed once its token is cancelled.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use super::{AuthProvider, Listener, ListenerId, RealtimeStore, RemoteEvent, Session, StorePath};
use crate::error::CoreError;

struct Registration {
    path: StorePath,
    tx: mpsc::UnboundedSender<RemoteEvent>,
    token: CancellationToken,
}

impl Registration {
    fn is_attached(&self) -> bool {
        !self.token.is_cancelled() && !self.tx.is_closed()
    }
}

/// A [`RealtimeStore`] that lives in memory.
#[derive(Default)]
pub struct MemoryStore {
    values: DashMap<StorePath, Value>,
    listeners: DashMap<ListenerId, Registration>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a value without going through the trait, notifying listeners.
    /// `Value::Null` removes the node.
    pub fn put(&self, path: &StorePath, value: Value) {
        if value.is_null() {
            self.values.remove(path);
        } else {
            self.values.insert(path.clone(), value);
        }
        let current = self.values.get(path).map(|entry| entry.value().clone());
        self.emit(path, || RemoteEvent::Value(current.clone()));
    }

    /// Current value without going through the trait.
    pub fn read(&self, path: &StorePath) -> Option<Value> {
        self.values.get(path).map(|entry| entry.value().clone())
    }

    /// Deliver a transport error to every listener on `path`.
    pub fn emit_error(&self, path: &StorePath, make: impl Fn() -> CoreError) {
        self.emit(path, || RemoteEvent::Error(make()));
    }

    /// Listeners still attached to `path`.
    pub fn listener_count(&self, path: &StorePath) -> usize {
        self.prune();
        self.listeners.iter().filter(|r| &r.path == path).count()
    }

    /// Number of successful `set` calls.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn emit(&self, path: &StorePath, event: impl Fn() -> RemoteEvent) {
        self.listeners.retain(|id, reg| {
            if !reg.is_attached() {
                trace!(?id, "dropping detached listener");
                return false;
            }
            if &reg.path == path {
                return reg.tx.send(event()).is_ok();
            }
            true
        });
    }

    fn prune(&self) {
        self.listeners.retain(|_, reg| reg.is_attached());
    }
}

#[async_trait]
impl RealtimeStore for MemoryStore {
    async fn get(&self, path: &StorePath) -> Result<Option<Value>, CoreError> {
        Ok(self.read(path))
    }

    async fn set(&self, path: &StorePath, value: Value) -> Result<(), CoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.put(path, value);
        Ok(())
    }

    fn listen(&self, path: &StorePath) -> Result<Listener, CoreError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let token = CancellationToken::new();

        // Initial value first, like the real database's opening `put`.
        let _ = tx.send(RemoteEvent::Value(self.read(path)));

        let listener = Listener::new(rx, token.clone());
        self.listeners.insert(
            listener.id(),
            Registration {
                path: path.clone(),
                tx,
                token,
            },
        );
        Ok(listener)
    }
}

// ── MemoryAuth ───────────────────────────────────────────────────

/// An [`AuthProvider`] that hands out numbered anonymous sessions.
#[derive(Default)]
pub struct MemoryAuth {
    session: RwLock<Option<Session>>,
    attempts: AtomicUsize,
    reject_with: Option<String>,
}

impl MemoryAuth {
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider whose sign-ins always fail with `message`.
    pub fn rejecting(message: impl Into<String>) -> Self {
        Self {
            reject_with: Some(message.into()),
            ..Self::default()
        }
    }

    /// A provider that already has `session`.
    pub fn with_session(session: Session) -> Self {
        Self {
            session: RwLock::new(Some(session)),
            ..Self::default()
        }
    }

    /// How many times `sign_in_anonymously` was called.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthProvider for MemoryAuth {
    fn current_session(&self) -> Option<Session> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn sign_in_anonymously(&self) -> Result<Session, CoreError> {
        let n = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(message) = &self.reject_with {
            return Err(CoreError::AuthenticationFailed {
                message: message.clone(),
            });
        }
        let session = Session {
            uid: format!("anon-{n}"),
            expires_at: None,
        };
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = Some(session.clone());
        Ok(session)
    }
}
