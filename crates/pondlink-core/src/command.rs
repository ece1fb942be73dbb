// ── Relay commands ──
//
// auth -> write -> read-back, one outstanding command per channel. Each
// channel publishes a `RelayStatus` whose displayed value only moves when a
// read-back confirms the write.

use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::auth_gate::AuthGate;
use crate::error::CommandError;
use crate::model::{ActuatorCommand, ActuatorWriteResult, ChannelState, RelayMessage, RelayPayload, RelayStatus};
use crate::remote::RealtimeStore;

/// Releases a channel's in-flight slot when dropped.
struct InFlight<'a> {
    slots: &'a DashSet<u32>,
    channel: u32,
}

impl<'a> InFlight<'a> {
    fn acquire(slots: &'a DashSet<u32>, channel: u32) -> Option<Self> {
        // Only build the guard on success: dropping one releases the slot.
        if slots.insert(channel) {
            Some(Self { slots, channel })
        } else {
            None
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.slots.remove(&self.channel);
    }
}

pub struct CommandChannel {
    store: Arc<dyn RealtimeStore>,
    auth: Arc<AuthGate>,
    status: DashMap<u32, watch::Sender<RelayStatus>>,
    in_flight: DashSet<u32>,
}

impl CommandChannel {
    pub fn new(store: Arc<dyn RealtimeStore>, auth: Arc<AuthGate>) -> Self {
        Self {
            store,
            auth,
            status: DashMap::new(),
            in_flight: DashSet::new(),
        }
    }

    /// Switch one relay and verify it by reading the node back.
    ///
    /// Never fails outright: anything short of a matching read-back is
    /// `confirmed == false` with the reason attached. A second command for a
    /// channel that already has one in flight is rejected as `Busy` without
    /// touching the store.
    pub async fn send_command(&self, cmd: ActuatorCommand) -> ActuatorWriteResult {
        let channel = cmd.channel_index;
        let Some(_slot) = InFlight::acquire(&self.in_flight, channel) else {
            debug!(channel, "command rejected, channel busy");
            return ActuatorWriteResult::failed(None, CommandError::Busy { channel });
        };

        self.publish(channel, |status| {
            status.state = ChannelState::Pending {
                desired: cmd.desired,
            };
        });

        let result = self.execute(cmd).await;

        match &result.error {
            None => self.publish(channel, |status| {
                status.state = ChannelState::Confirmed {
                    desired: cmd.desired,
                };
                status.confirmed_on = Some(cmd.desired);
            }),
            Some(error) => {
                warn!(channel, error = %error, "relay command not confirmed");
                self.publish(channel, |status| {
                    status.state = ChannelState::Failed {
                        desired: cmd.desired,
                        error: error.clone(),
                    };
                });
            }
        }
        result
    }

    /// Live status for `channel`. Starts `Idle` with no confirmed value.
    pub fn relay_status(&self, channel: u32) -> watch::Receiver<RelayStatus> {
        self.status
            .entry(channel)
            .or_insert_with(|| watch::channel(RelayStatus::default()).0)
            .subscribe()
    }

    /// Whether `channel` has a command outstanding.
    pub fn is_busy(&self, channel: u32) -> bool {
        self.in_flight.contains(&channel)
    }

    async fn execute(&self, cmd: ActuatorCommand) -> ActuatorWriteResult {
        if let Err(e) = self.auth.ensure_session().await {
            return ActuatorWriteResult::failed(None, CommandError::Unauthenticated(e));
        }

        let path = cmd.path();
        let expected = cmd.message();
        info!(channel = cmd.channel_index, %path, desired = %expected, "sending relay command");

        let payload = match serde_json::to_value(cmd.payload()) {
            Ok(payload) => payload,
            Err(e) => {
                return ActuatorWriteResult::failed(
                    None,
                    CommandError::Write {
                        path: path.to_string(),
                        message: e.to_string(),
                    },
                );
            }
        };

        if let Err(e) = self.store.set(&path, payload).await {
            return ActuatorWriteResult::failed(
                None,
                CommandError::Write {
                    path: path.to_string(),
                    message: e.to_string(),
                },
            );
        }

        let observed = match self.store.get(&path).await {
            Ok(value) => observed_message(value),
            Err(e) => {
                return ActuatorWriteResult::failed(
                    None,
                    CommandError::ReadBack {
                        path: path.to_string(),
                        message: e.to_string(),
                    },
                );
            }
        };

        if observed == Some(expected) {
            debug!(%path, "relay command confirmed");
            ActuatorWriteResult::confirmed(expected)
        } else {
            ActuatorWriteResult::failed(observed, CommandError::Mismatch { expected, observed })
        }
    }

    fn publish(&self, channel: u32, update: impl FnOnce(&mut RelayStatus)) {
        self.status
            .entry(channel)
            .or_insert_with(|| watch::channel(RelayStatus::default()).0)
            .send_modify(update);
    }
}

/// The relay value a read-back returned. Anything that is not
/// `{ "message": "ON" | "OFF" }` counts as nothing.
fn observed_message(value: Option<Value>) -> Option<RelayMessage> {
    value
        .and_then(|v| serde_json::from_value::<RelayPayload>(v).ok())
        .map(|payload| payload.message)
}
