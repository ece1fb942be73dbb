// Shared fakes for pondlink-core integration tests.
#![allow(dead_code, clippy::unwrap_used)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Semaphore;

use pondlink_core::{CoreError, Listener, MemoryStore, RealtimeStore, StorePath, TelemetryView};

/// A `MemoryStore` with knobs: writes can be held open, fail, or be
/// followed by a different read-back than what was written.
#[derive(Default)]
pub struct ScriptedStore {
    pub inner: MemoryStore,
    pub writes: AtomicUsize,
    pub reads: AtomicUsize,
    started: AtomicUsize,
    hold_writes: Mutex<Option<Arc<Semaphore>>>,
    fail_writes: Mutex<Option<String>>,
    fail_reads: Mutex<Option<String>>,
    read_back: Mutex<Option<Value>>,
}

impl ScriptedStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Block every later `set` until a permit is added to the returned
    /// semaphore.
    pub fn hold_writes(&self) -> Arc<Semaphore> {
        let release = Arc::new(Semaphore::new(0));
        *self.hold_writes.lock().unwrap() = Some(release.clone());
        release
    }

    /// Resolves once `n` `set` calls have started in total.
    pub async fn writes_started(&self, n: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while self.started.load(Ordering::SeqCst) < n {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    pub fn fail_writes(&self, message: &str) {
        *self.fail_writes.lock().unwrap() = Some(message.to_owned());
    }

    pub fn fail_reads(&self, message: &str) {
        *self.fail_reads.lock().unwrap() = Some(message.to_owned());
    }

    /// Make every `get` return `value` regardless of what was written.
    pub fn override_read_back(&self, value: Value) {
        *self.read_back.lock().unwrap() = Some(value);
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RealtimeStore for ScriptedStore {
    async fn get(&self, path: &StorePath) -> Result<Option<Value>, CoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.fail_reads.lock().unwrap().clone() {
            return Err(CoreError::Api {
                message,
                status: Some(503),
            });
        }
        if let Some(value) = self.read_back.lock().unwrap().clone() {
            return Ok(Some(value));
        }
        self.inner.get(path).await
    }

    async fn set(&self, path: &StorePath, value: Value) -> Result<(), CoreError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let hold = self.hold_writes.lock().unwrap().clone();
        if let Some(release) = hold {
            release.acquire().await.unwrap().forget();
        }
        if let Some(message) = self.fail_writes.lock().unwrap().clone() {
            return Err(CoreError::PermissionDenied { path: message });
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.set(path, value).await
    }

    fn listen(&self, path: &StorePath) -> Result<Listener, CoreError> {
        self.inner.listen(path)
    }
}

/// Collects every view a subscription callback receives.
#[derive(Clone, Default)]
pub struct Recorder {
    views: Arc<Mutex<Vec<TelemetryView>>>,
}

impl Recorder {
    pub fn callback(&self) -> impl FnMut(&TelemetryView) + Send + 'static {
        let views = Arc::clone(&self.views);
        move |view| views.lock().unwrap().push(view.clone())
    }

    pub fn len(&self) -> usize {
        self.views.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<TelemetryView> {
        self.views.lock().unwrap().last().cloned()
    }

    /// Wait until at least `n` views were recorded.
    pub async fn wait_for(&self, n: usize) -> TelemetryView {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if self.len() >= n {
                    return self.last().unwrap();
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("expected {n} views, got {}", self.len()))
    }
}

pub fn path(raw: &str) -> StorePath {
    StorePath::new(raw).unwrap()
}

/// Let spawned tasks run for a moment.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}
