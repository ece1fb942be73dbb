use chrono::{DateTime, Utc};
use serde::Serialize;

use super::telemetry::TimeSource;

/// Health of the telemetry subscription as seen by consumers.
///
/// Derived exclusively by [`ConnectionTracker`](crate::tracker::ConnectionTracker);
/// consumers never mutate it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionState {
    pub is_online: bool,
    pub last_update: Option<DateTime<Utc>>,
    pub last_update_source: Option<TimeSource>,
    pub error: Option<String>,
    /// `true` until the first event of either kind arrives.
    pub loading: bool,
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self {
            is_online: false,
            last_update: None,
            last_update_source: None,
            error: None,
            loading: true,
        }
    }
}

/// The three mutually exclusive display states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    Loading,
    Online,
    Offline,
}

impl ConnectionState {
    pub fn phase(&self) -> ConnectionPhase {
        if self.loading {
            ConnectionPhase::Loading
        } else if self.is_online {
            ConnectionPhase::Online
        } else {
            ConnectionPhase::Offline
        }
    }
}
