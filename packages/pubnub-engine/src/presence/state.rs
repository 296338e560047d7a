use crate::core::State;
use crate::error::PubNubError;
use crate::status::ConnectionStatus;

use super::input::PresenceInput;

/// States of the presence heartbeat loop.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PresenceState {
    /// Nothing to announce.
    #[default]
    Inactive,

    /// A heartbeat call is in flight.
    Heartbeating { input: PresenceInput },

    /// Waiting `heartbeat_interval` before the next heartbeat.
    Cooldown { input: PresenceInput },

    /// A heartbeat failed; a delayed retry is scheduled.
    Reconnecting {
        input: PresenceInput,
        attempt: u32,
        reason: PubNubError,
    },

    /// Heartbeating paused by `disconnect()`.
    Stopped { input: PresenceInput },

    /// Retries exhausted. Only `reconnect()` leaves this state.
    Failed {
        input: PresenceInput,
        reason: PubNubError,
    },
}

impl PresenceState {
    /// Channels and groups tracked by the state, if any.
    pub fn input(&self) -> Option<&PresenceInput> {
        match self {
            PresenceState::Inactive => None,
            PresenceState::Heartbeating { input }
            | PresenceState::Cooldown { input }
            | PresenceState::Reconnecting { input, .. }
            | PresenceState::Stopped { input }
            | PresenceState::Failed { input, .. } => Some(input),
        }
    }

    /// Connection status listeners see while in this state.
    pub fn connection_status(&self) -> ConnectionStatus {
        match self {
            PresenceState::Heartbeating { .. } | PresenceState::Cooldown { .. } => {
                ConnectionStatus::Connected
            }
            PresenceState::Reconnecting { .. } => ConnectionStatus::Reconnecting,
            PresenceState::Inactive | PresenceState::Stopped { .. } => {
                ConnectionStatus::Disconnected
            }
            PresenceState::Failed { reason, .. } => ConnectionStatus::ConnectionError(reason.clone()),
        }
    }
}

impl State for PresenceState {
    fn id(&self) -> &'static str {
        match self {
            PresenceState::Inactive => "HEARTBEAT_INACTIVE",
            PresenceState::Heartbeating { .. } => "HEARTBEATING",
            PresenceState::Cooldown { .. } => "HEARTBEAT_COOLDOWN",
            PresenceState::Reconnecting { .. } => "HEARTBEAT_RECONNECTING",
            PresenceState::Stopped { .. } => "HEARTBEAT_STOPPED",
            PresenceState::Failed { .. } => "HEARTBEAT_FAILED",
        }
    }
}
