// ── Connection state derivation ──
//
// Pure: the next `TelemetryView` is a function of the previous one and the
// latest subscription event. No timers, no I/O.

use chrono::{DateTime, Utc};

use crate::error::SyncError;
use crate::model::{ConnectionState, TelemetrySnapshot, TelemetryView, TimeSource};

/// One outcome from the telemetry subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    Update {
        snapshot: TelemetrySnapshot,
        at: DateTime<Utc>,
        source: TimeSource,
    },
    Failed(SyncError),
}

/// Compute the view that follows `previous` after `event`.
///
/// An update replaces the snapshot and clears the error. A failure keeps the
/// last snapshot and `last_update`, goes offline, and records the message.
/// Either way `loading` ends.
pub fn derive(previous: &TelemetryView, event: SyncEvent) -> TelemetryView {
    match event {
        SyncEvent::Update {
            snapshot,
            at,
            source,
        } => TelemetryView {
            data: Some(snapshot),
            connection: ConnectionState {
                is_online: true,
                last_update: Some(at),
                last_update_source: Some(source),
                error: None,
                loading: false,
            },
        },
        SyncEvent::Failed(err) => TelemetryView {
            data: previous.data,
            connection: ConnectionState {
                is_online: false,
                error: Some(err.to_string()),
                loading: false,
                ..previous.connection.clone()
            },
        },
    }
}

/// Holds the current view and folds events into it.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    view: TelemetryView,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> &TelemetryView {
        &self.view
    }

    pub fn apply(&mut self, event: SyncEvent) -> &TelemetryView {
        self.view = derive(&self.view, event);
        &self.view
    }
}
