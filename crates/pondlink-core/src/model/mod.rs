// ── Domain model ──
//
// Typed values that cross the normalization boundary. Nothing untyped from
// the remote store travels past `normalize` / `CommandChannel`.

mod actuator;
mod connection;
mod telemetry;

pub use actuator::{
    ActuatorCommand, ActuatorWriteResult, ChannelState, RelayMessage, RelayPayload, RelayStatus,
};
pub use connection::{ConnectionPhase, ConnectionState};
pub use telemetry::{TelemetrySnapshot, TelemetryView, TimeSource, WaterReadings};
