// ── Dashboard ──
//
// Owns the collaborators for one mount: the single telemetry subscription
// and the relay command channel, both over the same injected store.

use std::sync::{Arc, Mutex, PoisonError};

use pondlink_api::{DatabaseClient, IdentityClient, ReconnectConfig, TokenSlot, TransportConfig};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::auth_gate::AuthGate;
use crate::command::CommandChannel;
use crate::config::DashboardConfig;
use crate::error::CoreError;
use crate::model::{ActuatorCommand, ActuatorWriteResult, RelayStatus, TelemetryView};
use crate::remote::{AuthProvider, FirebaseAuth, FirebaseStore, RealtimeStore};
use crate::subscription::SyncSubscription;

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<DashboardInner>`.
#[derive(Clone)]
pub struct Dashboard {
    inner: Arc<DashboardInner>,
}

struct DashboardInner {
    config: DashboardConfig,
    store: Arc<dyn RealtimeStore>,
    commands: CommandChannel,
    subscription: Mutex<Option<SyncSubscription>>,
    telemetry_tx: Arc<watch::Sender<TelemetryView>>,
}

impl Dashboard {
    /// Build a dashboard over injected backends. Nothing is contacted
    /// until [`start_telemetry`](Self::start_telemetry) or a command.
    pub fn new(config: DashboardConfig, store: Arc<dyn RealtimeStore>, auth: Arc<dyn AuthProvider>) -> Self {
        let gate = Arc::new(AuthGate::new(auth));
        let (telemetry_tx, _) = watch::channel(TelemetryView::default());
        Self {
            inner: Arc::new(DashboardInner {
                commands: CommandChannel::new(Arc::clone(&store), gate),
                config,
                store,
                subscription: Mutex::new(None),
                telemetry_tx: Arc::new(telemetry_tx),
            }),
        }
    }

    /// Build a dashboard backed by the realtime database and its identity
    /// endpoint. Both clients share one token slot.
    pub fn connect(config: DashboardConfig) -> Result<Self, CoreError> {
        let transport = TransportConfig {
            timeout: config.timeout,
            ..TransportConfig::default()
        };
        let tokens = TokenSlot::new();
        let db = DatabaseClient::new(config.database_url.clone(), tokens.clone(), &transport)?;
        let identity = IdentityClient::new(
            config.api_key.clone(),
            config.identity_url.clone(),
            tokens,
            &transport,
        )?;

        let store = Arc::new(FirebaseStore::new(db, ReconnectConfig::from(&config.reconnect)));
        let auth = Arc::new(FirebaseAuth::new(identity));
        debug!(database = %config.database_url, "dashboard backends ready");
        Ok(Self::new(config, store, auth))
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.inner.config
    }

    // ── Telemetry ────────────────────────────────────────────────

    /// Start the telemetry subscription. Only one may be live at a time.
    pub fn start_telemetry<F>(&self, mut callback: F) -> Result<(), CoreError>
    where
        F: FnMut(&TelemetryView) + Send + 'static,
    {
        let mut slot = self
            .inner
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(SyncSubscription::is_live) {
            return Err(CoreError::AlreadySubscribed);
        }

        let tx = Arc::clone(&self.inner.telemetry_tx);
        let path = self.inner.config.telemetry_path.clone();
        let subscription = SyncSubscription::subscribe(self.inner.store.as_ref(), path, move |view| {
            tx.send_replace(view.clone());
            callback(view);
        })?;

        info!(path = %subscription.path(), "telemetry started");
        *slot = Some(subscription);
        Ok(())
    }

    /// Latest telemetry view, updated for as long as a subscription is live.
    pub fn telemetry(&self) -> watch::Receiver<TelemetryView> {
        self.inner.telemetry_tx.subscribe()
    }

    // ── Relays ───────────────────────────────────────────────────

    pub async fn send_command(&self, cmd: ActuatorCommand) -> ActuatorWriteResult {
        self.inner.commands.send_command(cmd).await
    }

    pub fn relay_status(&self, channel: u32) -> watch::Receiver<RelayStatus> {
        self.inner.commands.relay_status(channel)
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Stop telemetry. Returns once no further view can be published.
    pub fn shutdown(&self) {
        let subscription = self
            .inner
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(subscription) = subscription {
            subscription.unsubscribe();
            debug!("telemetry stopped");
        }
    }
}
