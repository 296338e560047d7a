use crate::core::Event;
use crate::error::PubNubError;

use super::cursor::SubscriptionCursor;
use super::input::SubscribeInput;
use super::message::SubscribeMessage;

/// Facts the subscribe machine reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum SubscribeEvent {
    /// The full set of channels and groups changed.
    SubscriptionChanged { input: SubscribeInput },
    /// Like `SubscriptionChanged`, resuming from a known cursor.
    SubscriptionRestored {
        input: SubscribeInput,
        cursor: SubscriptionCursor,
    },
    HandshakeSuccess { cursor: SubscriptionCursor },
    HandshakeFailure { reason: PubNubError },
    ReceiveSuccess {
        cursor: SubscriptionCursor,
        messages: Vec<SubscribeMessage>,
    },
    ReceiveFailure { reason: PubNubError },
    Disconnect,
    Reconnect { cursor: Option<SubscriptionCursor> },
    UnsubscribeAll,
}

impl Event for SubscribeEvent {
    fn id(&self) -> &'static str {
        match self {
            SubscribeEvent::SubscriptionChanged { .. } => "SUBSCRIPTION_CHANGED",
            SubscribeEvent::SubscriptionRestored { .. } => "SUBSCRIPTION_RESTORED",
            SubscribeEvent::HandshakeSuccess { .. } => "HANDSHAKE_SUCCESS",
            SubscribeEvent::HandshakeFailure { .. } => "HANDSHAKE_FAILURE",
            SubscribeEvent::ReceiveSuccess { .. } => "RECEIVE_SUCCESS",
            SubscribeEvent::ReceiveFailure { .. } => "RECEIVE_FAILURE",
            SubscribeEvent::Disconnect => "DISCONNECT",
            SubscribeEvent::Reconnect { .. } => "RECONNECT",
            SubscribeEvent::UnsubscribeAll => "UNSUBSCRIBE_ALL",
        }
    }
}
