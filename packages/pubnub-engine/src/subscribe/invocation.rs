use crate::core::{Dispatch, EffectInvocation};
use crate::status::ConnectionStatus;

use super::cursor::SubscriptionCursor;
use super::input::SubscribeInput;
use super::message::SubscribeMessage;

/// Effect kinds of the subscribe engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscribeEffectKind {
    Handshake,
    Receive,
    EmitStatus,
    EmitMessages,
}

/// Invocations emitted by [`SubscribeTransition`](super::SubscribeTransition).
#[derive(Debug, Clone, PartialEq)]
pub enum SubscribeEffectInvocation {
    Handshake {
        input: SubscribeInput,
    },
    CancelHandshake,
    Receive {
        input: SubscribeInput,
        cursor: SubscriptionCursor,
    },
    CancelReceive,
    EmitStatus {
        status: ConnectionStatus,
    },
    EmitMessages {
        messages: Vec<SubscribeMessage>,
        cursor: SubscriptionCursor,
    },
}

impl EffectInvocation for SubscribeEffectInvocation {
    type Kind = SubscribeEffectKind;

    fn id(&self) -> &'static str {
        match self {
            SubscribeEffectInvocation::Handshake { .. } => "HANDSHAKE",
            SubscribeEffectInvocation::CancelHandshake => "CANCEL_HANDSHAKE",
            SubscribeEffectInvocation::Receive { .. } => "RECEIVE",
            SubscribeEffectInvocation::CancelReceive => "CANCEL_RECEIVE",
            SubscribeEffectInvocation::EmitStatus { .. } => "EMIT_STATUS",
            SubscribeEffectInvocation::EmitMessages { .. } => "EMIT_MESSAGES",
        }
    }

    fn dispatch(&self) -> Dispatch<SubscribeEffectKind> {
        match self {
            SubscribeEffectInvocation::Handshake { .. } => {
                Dispatch::Managed(SubscribeEffectKind::Handshake)
            }
            SubscribeEffectInvocation::CancelHandshake => {
                Dispatch::Cancel(SubscribeEffectKind::Handshake)
            }
            SubscribeEffectInvocation::Receive { .. } => {
                Dispatch::Managed(SubscribeEffectKind::Receive)
            }
            SubscribeEffectInvocation::CancelReceive => {
                Dispatch::Cancel(SubscribeEffectKind::Receive)
            }
            SubscribeEffectInvocation::EmitStatus { .. } => {
                Dispatch::Regular(SubscribeEffectKind::EmitStatus)
            }
            SubscribeEffectInvocation::EmitMessages { .. } => {
                Dispatch::Regular(SubscribeEffectKind::EmitMessages)
            }
        }
    }
}
