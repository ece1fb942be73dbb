use serde::{Deserialize, Serialize};

use super::connection::ConnectionState;

/// Water-quality readings from the pond station.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WaterReadings {
    /// Degrees Celsius.
    pub temperature: f64,
    pub ph: f64,
    /// Total dissolved solids, ppm.
    pub tds: f64,
}

/// One normalized telemetry update. Produced fresh for every payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub water: WaterReadings,
}

/// Where `ConnectionState::last_update` came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeSource {
    /// The payload's own `ts` field (device clock).
    Device,
    /// Local time at which the payload was received.
    Received,
}

/// Everything a consumer renders: the last good snapshot plus link health.
///
/// `data` survives errors, so a consumer can keep showing stale readings
/// next to an offline indicator.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TelemetryView {
    pub data: Option<TelemetrySnapshot>,
    pub connection: ConnectionState,
}
