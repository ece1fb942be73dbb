// ── Relay actuators ──
//
// One relay per channel. Channels are 0-based in the API and 1-based on the
// wire (`devices/relay1` is channel 0).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CommandError;
use crate::remote::StorePath;

/// Wire value stored under a relay node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelayMessage {
    #[serde(rename = "ON")]
    On,
    #[serde(rename = "OFF")]
    Off,
}

impl RelayMessage {
    pub fn from_desired(on: bool) -> Self {
        if on { Self::On } else { Self::Off }
    }

    pub fn is_on(self) -> bool {
        matches!(self, Self::On)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::On => "ON",
            Self::Off => "OFF",
        }
    }
}

impl fmt::Display for RelayMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The JSON object written to and read back from a relay node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayPayload {
    pub message: RelayMessage,
}

/// A request to switch one relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActuatorCommand {
    pub channel_index: u32,
    pub desired: bool,
}

impl ActuatorCommand {
    pub fn new(channel_index: u32, desired: bool) -> Self {
        Self {
            channel_index,
            desired,
        }
    }

    /// 1-based number used in the remote path.
    pub fn relay_number(self) -> u64 {
        u64::from(self.channel_index) + 1
    }

    /// `devices/relay{N}`.
    pub fn path(self) -> StorePath {
        StorePath::relay(self.relay_number())
    }

    pub fn message(self) -> RelayMessage {
        RelayMessage::from_desired(self.desired)
    }

    pub fn payload(self) -> RelayPayload {
        RelayPayload {
            message: self.message(),
        }
    }
}

/// Outcome of [`CommandChannel::send_command`](crate::CommandChannel::send_command).
///
/// Never an `Err`: a write that did not land is `confirmed == false` with the
/// reason in `error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActuatorWriteResult {
    pub confirmed: bool,
    pub observed_value: Option<RelayMessage>,
    pub error: Option<CommandError>,
}

impl ActuatorWriteResult {
    pub(crate) fn confirmed(observed: RelayMessage) -> Self {
        Self {
            confirmed: true,
            observed_value: Some(observed),
            error: None,
        }
    }

    pub(crate) fn failed(observed_value: Option<RelayMessage>, error: CommandError) -> Self {
        Self {
            confirmed: false,
            observed_value,
            error: Some(error),
        }
    }
}

/// Per-channel command lifecycle.
///
/// `Idle -> Pending -> Confirmed | Failed`, and back to `Pending` on the next
/// command. Only `Confirmed` moves the displayed relay state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ChannelState {
    #[default]
    Idle,
    Pending {
        desired: bool,
    },
    Confirmed {
        desired: bool,
    },
    Failed {
        desired: bool,
        error: CommandError,
    },
}

impl ChannelState {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }
}

/// What a consumer observes for one relay.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RelayStatus {
    pub state: ChannelState,
    /// Last value confirmed by read-back. `None` until the first confirmation.
    pub confirmed_on: Option<bool>,
}

impl RelayStatus {
    /// The value to draw: the last confirmed one, off when unknown.
    pub fn displayed_on(&self) -> bool {
        self.confirmed_on.unwrap_or(false)
    }
}
