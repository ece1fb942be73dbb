// ── Telemetry subscription ──
//
// One listener on the telemetry path plus one pump task. The pump folds each
// remote event into a `ConnectionTracker` and hands the new view to the
// callback and a `watch` channel. Delivery and teardown share one mutex:
// once `unsubscribe` returns, the pump can no longer reach the callback, the
// tracker or the channel, even if an event is already buffered.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::error::{CoreError, SyncError};
use crate::model::TelemetryView;
use crate::normalize;
use crate::remote::{Listener, RealtimeStore, RemoteEvent, StorePath};
use crate::tracker::{ConnectionTracker, SyncEvent};

/// Invoked with the new view after every update and every error.
///
/// Runs on the pump task with the delivery lock held. It must not call
/// [`SyncSubscription::unsubscribe`] on its own subscription.
pub type TelemetryCallback = Box<dyn FnMut(&TelemetryView) + Send>;

struct Delivery {
    live: bool,
    tracker: ConnectionTracker,
    callback: Option<TelemetryCallback>,
}

struct Shared {
    delivery: Mutex<Delivery>,
    view_tx: watch::Sender<TelemetryView>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Delivery> {
        self.delivery.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply one event. Returns `false` once the subscription is torn down.
    fn deliver(&self, event: SyncEvent) -> bool {
        let mut delivery = self.lock();
        if !delivery.live {
            return false;
        }
        let view = delivery.tracker.apply(event).clone();
        self.view_tx.send_replace(view.clone());
        if let Some(callback) = delivery.callback.as_mut() {
            callback(&view);
        }
        true
    }
}

/// A live subscription to one telemetry path.
///
/// Dropping it unsubscribes.
pub struct SyncSubscription {
    path: StorePath,
    shared: Arc<Shared>,
    cancel: CancellationToken,
}

impl SyncSubscription {
    /// Attach to `path` on `store` and start delivering views to `callback`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn subscribe<F>(store: &dyn RealtimeStore, path: StorePath, callback: F) -> Result<Self, CoreError>
    where
        F: FnMut(&TelemetryView) + Send + 'static,
    {
        let listener = store.listen(&path)?;
        let (view_tx, _) = watch::channel(TelemetryView::default());
        let shared = Arc::new(Shared {
            delivery: Mutex::new(Delivery {
                live: true,
                tracker: ConnectionTracker::new(),
                callback: Some(Box::new(callback)),
            }),
            view_tx,
        });
        let cancel = CancellationToken::new();

        debug!(%path, listener = ?listener.id(), "telemetry subscription started");
        tokio::spawn(pump(listener, Arc::clone(&shared), cancel.clone(), path.clone()));

        Ok(Self {
            path,
            shared,
            cancel,
        })
    }

    pub fn path(&self) -> &StorePath {
        &self.path
    }

    /// Receiver that always holds the latest view.
    pub fn view(&self) -> watch::Receiver<TelemetryView> {
        self.shared.view_tx.subscribe()
    }

    /// Snapshot of the latest view.
    pub fn current(&self) -> TelemetryView {
        self.shared.view_tx.borrow().clone()
    }

    pub fn is_live(&self) -> bool {
        self.shared.lock().live
    }

    /// Stop the subscription. No callback or state change happens after
    /// this returns.
    pub fn unsubscribe(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        {
            let mut delivery = self.shared.lock();
            if !delivery.live {
                return;
            }
            delivery.live = false;
            delivery.callback = None;
        }
        self.cancel.cancel();
        debug!(path = %self.path, "telemetry subscription stopped");
    }
}

impl Drop for SyncSubscription {
    fn drop(&mut self) {
        self.teardown();
    }
}

async fn pump(mut listener: Listener, shared: Arc<Shared>, cancel: CancellationToken, path: StorePath) {
    loop {
        let event = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = listener.next() => match event {
                Some(event) => event,
                None => {
                    debug!(%path, "store closed the listener");
                    break;
                }
            },
        };

        let sync_event = match event {
            RemoteEvent::Value(value) => normalize::interpret(value.as_ref(), Utc::now()),
            RemoteEvent::Error(e) => {
                warn!(%path, error = %e, "telemetry transport error");
                SyncEvent::Failed(SyncError::from(&e))
            }
        };

        if !shared.deliver(sync_event) {
            trace!(%path, "dropping event after unsubscribe");
            break;
        }
    }
    listener.detach();
}
