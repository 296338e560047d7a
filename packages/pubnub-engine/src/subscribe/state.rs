use crate::core::State;
use crate::error::PubNubError;
use crate::status::ConnectionStatus;

use super::cursor::SubscriptionCursor;
use super::input::SubscribeInput;

/// States of the subscribe loop.
///
/// `Handshaking` and its stopped/failed variants keep an optional cursor: a
/// caller restoring a subscription supplies the timetoken to resume from,
/// while a fresh subscription learns it from the handshake.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SubscribeState {
    #[default]
    Unsubscribed,

    Handshaking {
        input: SubscribeInput,
        cursor: Option<SubscriptionCursor>,
    },

    HandshakeStopped {
        input: SubscribeInput,
        cursor: Option<SubscriptionCursor>,
    },

    HandshakeFailed {
        input: SubscribeInput,
        cursor: Option<SubscriptionCursor>,
        reason: PubNubError,
    },

    /// Long-polling for messages.
    Receiving {
        input: SubscribeInput,
        cursor: SubscriptionCursor,
    },

    ReceiveStopped {
        input: SubscribeInput,
        cursor: SubscriptionCursor,
    },

    ReceiveFailed {
        input: SubscribeInput,
        cursor: SubscriptionCursor,
        reason: PubNubError,
    },
}

impl SubscribeState {
    pub fn input(&self) -> Option<&SubscribeInput> {
        match self {
            SubscribeState::Unsubscribed => None,
            SubscribeState::Handshaking { input, .. }
            | SubscribeState::HandshakeStopped { input, .. }
            | SubscribeState::HandshakeFailed { input, .. }
            | SubscribeState::Receiving { input, .. }
            | SubscribeState::ReceiveStopped { input, .. }
            | SubscribeState::ReceiveFailed { input, .. } => Some(input),
        }
    }

    /// Read position, when one is known.
    pub fn cursor(&self) -> Option<SubscriptionCursor> {
        match self {
            SubscribeState::Unsubscribed => None,
            SubscribeState::Handshaking { cursor, .. }
            | SubscribeState::HandshakeStopped { cursor, .. }
            | SubscribeState::HandshakeFailed { cursor, .. } => *cursor,
            SubscribeState::Receiving { cursor, .. }
            | SubscribeState::ReceiveStopped { cursor, .. }
            | SubscribeState::ReceiveFailed { cursor, .. } => Some(*cursor),
        }
    }

    /// Connection status listeners see while in this state.
    ///
    /// A handshake in progress reports `Reconnecting`.
    pub fn connection_status(&self) -> ConnectionStatus {
        match self {
            SubscribeState::Receiving { .. } => ConnectionStatus::Connected,
            SubscribeState::Handshaking { .. } => ConnectionStatus::Reconnecting,
            SubscribeState::Unsubscribed
            | SubscribeState::HandshakeStopped { .. }
            | SubscribeState::ReceiveStopped { .. } => ConnectionStatus::Disconnected,
            SubscribeState::HandshakeFailed { reason, .. } => {
                ConnectionStatus::ConnectionError(reason.clone())
            }
            SubscribeState::ReceiveFailed { reason, .. } => {
                ConnectionStatus::DisconnectedUnexpectedly(reason.clone())
            }
        }
    }
}

impl State for SubscribeState {
    fn id(&self) -> &'static str {
        match self {
            SubscribeState::Unsubscribed => "UNSUBSCRIBED",
            SubscribeState::Handshaking { .. } => "HANDSHAKING",
            SubscribeState::HandshakeStopped { .. } => "HANDSHAKE_STOPPED",
            SubscribeState::HandshakeFailed { .. } => "HANDSHAKE_FAILED",
            SubscribeState::Receiving { .. } => "RECEIVING",
            SubscribeState::ReceiveStopped { .. } => "RECEIVE_STOPPED",
            SubscribeState::ReceiveFailed { .. } => "RECEIVE_FAILED",
        }
    }
}
