use crate::core::{Dispatch, EffectInvocation};
use crate::error::PubNubError;

use super::input::PresenceInput;

/// Effect kinds of the presence engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PresenceEffectKind {
    Heartbeat,
    Leave,
    /// Cooldown timer scheduling the next heartbeat.
    Wait,
    DelayedHeartbeat,
}

/// Invocations emitted by [`PresenceTransition`](super::PresenceTransition).
#[derive(Debug, Clone, PartialEq)]
pub enum PresenceEffectInvocation {
    Heartbeat {
        input: PresenceInput,
    },
    Leave {
        input: PresenceInput,
    },
    Wait {
        input: PresenceInput,
    },
    CancelWait,
    DelayedHeartbeat {
        input: PresenceInput,
        attempt: u32,
        reason: PubNubError,
    },
    CancelDelayedHeartbeat,
}

impl EffectInvocation for PresenceEffectInvocation {
    type Kind = PresenceEffectKind;

    fn id(&self) -> &'static str {
        match self {
            PresenceEffectInvocation::Heartbeat { .. } => "HEARTBEAT",
            PresenceEffectInvocation::Leave { .. } => "LEAVE",
            PresenceEffectInvocation::Wait { .. } => "WAIT",
            PresenceEffectInvocation::CancelWait => "CANCEL_WAIT",
            PresenceEffectInvocation::DelayedHeartbeat { .. } => "DELAYED_HEARTBEAT",
            PresenceEffectInvocation::CancelDelayedHeartbeat => "CANCEL_DELAYED_HEARTBEAT",
        }
    }

    fn dispatch(&self) -> Dispatch<PresenceEffectKind> {
        match self {
            PresenceEffectInvocation::Heartbeat { .. } => {
                Dispatch::Regular(PresenceEffectKind::Heartbeat)
            }
            PresenceEffectInvocation::Leave { .. } => Dispatch::Regular(PresenceEffectKind::Leave),
            PresenceEffectInvocation::Wait { .. } => Dispatch::Managed(PresenceEffectKind::Wait),
            PresenceEffectInvocation::CancelWait => Dispatch::Cancel(PresenceEffectKind::Wait),
            PresenceEffectInvocation::DelayedHeartbeat { .. } => {
                Dispatch::Managed(PresenceEffectKind::DelayedHeartbeat)
            }
            PresenceEffectInvocation::CancelDelayedHeartbeat => {
                Dispatch::Cancel(PresenceEffectKind::DelayedHeartbeat)
            }
        }
    }
}
