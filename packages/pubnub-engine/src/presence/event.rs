use crate::core::Event;
use crate::error::PubNubError;

use super::input::PresenceInput;

/// Facts the presence machine reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum PresenceEvent {
    /// The user subscribed to more channels or groups.
    Joined { input: PresenceInput },
    /// The user unsubscribed from some channels or groups.
    Left { input: PresenceInput },
    /// The user unsubscribed from everything.
    LeftAll,
    Reconnect,
    Disconnect,
    HeartbeatSuccess,
    HeartbeatFailure { reason: PubNubError },
    /// Retries are exhausted or the failure is not retryable.
    HeartbeatGiveUp { reason: PubNubError },
    /// The cooldown timer elapsed.
    TimesUp,
}

impl Event for PresenceEvent {
    fn id(&self) -> &'static str {
        match self {
            PresenceEvent::Joined { .. } => "JOINED",
            PresenceEvent::Left { .. } => "LEFT",
            PresenceEvent::LeftAll => "LEFT_ALL",
            PresenceEvent::Reconnect => "RECONNECT",
            PresenceEvent::Disconnect => "DISCONNECT",
            PresenceEvent::HeartbeatSuccess => "HEARTBEAT_SUCCESS",
            PresenceEvent::HeartbeatFailure { .. } => "HEARTBEAT_FAILED",
            PresenceEvent::HeartbeatGiveUp { .. } => "HEARTBEAT_GIVEUP",
            PresenceEvent::TimesUp => "TIMES_UP",
        }
    }
}
