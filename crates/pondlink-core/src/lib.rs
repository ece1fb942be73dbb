// pondlink-core: Telemetry sync and relay commands over a realtime database.

pub mod auth_gate;
pub mod command;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod model;
pub mod normalize;
pub mod remote;
pub mod subscription;
pub mod tracker;

// ── Primary re-exports ──────────────────────────────────────────────
pub use auth_gate::AuthGate;
pub use command::CommandChannel;
pub use config::{DEFAULT_TELEMETRY_PATH, DashboardConfig, ReconnectPolicy};
pub use dashboard::Dashboard;
pub use error::{AuthError, CommandError, CommandErrorKind, CoreError, SyncError};
pub use subscription::{SyncSubscription, TelemetryCallback};
pub use tracker::{ConnectionTracker, SyncEvent};

pub use model::{
    ActuatorCommand, ActuatorWriteResult, ChannelState, ConnectionPhase, ConnectionState,
    RelayMessage, RelayPayload, RelayStatus, TelemetrySnapshot, TelemetryView, TimeSource,
    WaterReadings,
};
pub use remote::{
    AuthProvider, FirebaseAuth, FirebaseStore, Listener, ListenerId, MemoryAuth, MemoryStore,
    RealtimeStore, RemoteEvent, Session, StorePath,
};
