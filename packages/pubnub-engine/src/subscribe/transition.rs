//! Subscribe loop transitions.
//!
//! `Handshaking` and `Receiving` start their long-poll on entry and cancel it
//! on exit, so invocations are ordered `exit(from) ++ actions ++ enter(to)`.
//! Re-entering the same state (a subscription change while receiving)
//! cancels the running request before the new one starts.

use crate::core::TransitionResult;
use crate::machine::Transition;
use crate::status::ConnectionStatus;

use super::cursor::SubscriptionCursor;
use super::event::SubscribeEvent;
use super::input::SubscribeInput;
use super::invocation::SubscribeEffectInvocation;
use super::state::SubscribeState;

type SubscribeResult = TransitionResult<SubscribeState, SubscribeEffectInvocation>;

/// Pure transition function of the subscribe loop.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubscribeTransition;

impl Transition for SubscribeTransition {
    type State = SubscribeState;
    type Event = SubscribeEvent;
    type Invocation = SubscribeEffectInvocation;

    fn transition(&self, state: &SubscribeState, event: &SubscribeEvent) -> Option<SubscribeResult> {
        use SubscribeEvent as E;
        use SubscribeState as S;

        match (state, event) {
            // Subscription changes
            (S::Unsubscribed, E::SubscriptionChanged { input }) if input.is_empty() => None,
            (S::Unsubscribed, E::SubscriptionChanged { input }) => Some(transit(
                state,
                S::Handshaking {
                    input: input.clone(),
                    cursor: None,
                },
                [],
            )),
            (S::Handshaking { .. } | S::Receiving { .. }, E::SubscriptionChanged { input })
                if input.is_empty() =>
            {
                Some(transit(state, S::Unsubscribed, [status(ConnectionStatus::Disconnected)]))
            }
            (
                S::HandshakeStopped { .. }
                | S::HandshakeFailed { .. }
                | S::ReceiveStopped { .. }
                | S::ReceiveFailed { .. },
                E::SubscriptionChanged { input },
            ) if input.is_empty() => Some(transit(state, S::Unsubscribed, [])),
            (S::Handshaking { cursor, .. }, E::SubscriptionChanged { input }) => Some(transit(
                state,
                S::Handshaking {
                    input: input.clone(),
                    cursor: *cursor,
                },
                [],
            )),
            (S::HandshakeStopped { cursor, .. }, E::SubscriptionChanged { input }) => {
                Some(transit(
                    state,
                    S::HandshakeStopped {
                        input: input.clone(),
                        cursor: *cursor,
                    },
                    [],
                ))
            }
            (S::HandshakeFailed { cursor, .. }, E::SubscriptionChanged { input }) => Some(transit(
                state,
                S::Handshaking {
                    input: input.clone(),
                    cursor: *cursor,
                },
                [],
            )),
            (S::Receiving { cursor, .. }, E::SubscriptionChanged { input }) => Some(transit(
                state,
                S::Receiving {
                    input: input.clone(),
                    cursor: *cursor,
                },
                [subscription_changed(input)],
            )),
            (S::ReceiveStopped { cursor, .. }, E::SubscriptionChanged { input }) => Some(transit(
                state,
                S::ReceiveStopped {
                    input: input.clone(),
                    cursor: *cursor,
                },
                [],
            )),
            (S::ReceiveFailed { cursor, .. }, E::SubscriptionChanged { input }) => Some(transit(
                state,
                S::Handshaking {
                    input: input.clone(),
                    cursor: Some(*cursor),
                },
                [],
            )),

            // Restored subscriptions
            (_, E::SubscriptionRestored { input, .. }) if input.is_empty() => None,
            (
                S::Unsubscribed
                | S::Handshaking { .. }
                | S::HandshakeFailed { .. }
                | S::ReceiveFailed { .. },
                E::SubscriptionRestored { input, cursor },
            ) => Some(transit(
                state,
                S::Handshaking {
                    input: input.clone(),
                    cursor: Some(*cursor),
                },
                [],
            )),
            (S::HandshakeStopped { .. }, E::SubscriptionRestored { input, cursor }) => {
                Some(transit(
                    state,
                    S::HandshakeStopped {
                        input: input.clone(),
                        cursor: Some(*cursor),
                    },
                    [],
                ))
            }
            (S::Receiving { .. }, E::SubscriptionRestored { input, cursor }) => Some(transit(
                state,
                S::Receiving {
                    input: input.clone(),
                    cursor: *cursor,
                },
                [subscription_changed(input)],
            )),
            (S::ReceiveStopped { .. }, E::SubscriptionRestored { input, cursor }) => {
                Some(transit(
                    state,
                    S::ReceiveStopped {
                        input: input.clone(),
                        cursor: *cursor,
                    },
                    [],
                ))
            }

            // Handshake outcome
            (S::Handshaking { input, cursor }, E::HandshakeSuccess { cursor: received }) => {
                Some(transit(
                    state,
                    S::Receiving {
                        input: input.clone(),
                        cursor: resume_cursor(*cursor, *received),
                    },
                    [status(ConnectionStatus::Connected)],
                ))
            }
            (S::Handshaking { input, cursor }, E::HandshakeFailure { reason }) => Some(transit(
                state,
                S::HandshakeFailed {
                    input: input.clone(),
                    cursor: *cursor,
                    reason: reason.clone(),
                },
                [status(ConnectionStatus::ConnectionError(reason.clone()))],
            )),

            // Receive outcome
            (S::Receiving { input, .. }, E::ReceiveSuccess { cursor, messages }) => {
                let emit = (!messages.is_empty()).then(|| SubscribeEffectInvocation::EmitMessages {
                    messages: messages.clone(),
                    cursor: *cursor,
                });
                Some(transit(
                    state,
                    S::Receiving {
                        input: input.clone(),
                        cursor: *cursor,
                    },
                    emit,
                ))
            }
            (S::Receiving { input, cursor }, E::ReceiveFailure { reason }) => Some(transit(
                state,
                S::ReceiveFailed {
                    input: input.clone(),
                    cursor: *cursor,
                    reason: reason.clone(),
                },
                [status(ConnectionStatus::DisconnectedUnexpectedly(reason.clone()))],
            )),

            // Disconnect
            (S::Handshaking { input, cursor }, E::Disconnect) => Some(transit(
                state,
                S::HandshakeStopped {
                    input: input.clone(),
                    cursor: *cursor,
                },
                [status(ConnectionStatus::Disconnected)],
            )),
            (S::Receiving { input, cursor }, E::Disconnect) => Some(transit(
                state,
                S::ReceiveStopped {
                    input: input.clone(),
                    cursor: *cursor,
                },
                [status(ConnectionStatus::Disconnected)],
            )),

            // Reconnect
            (
                S::HandshakeStopped { input, cursor } | S::HandshakeFailed { input, cursor, .. },
                E::Reconnect { cursor: requested },
            ) => Some(transit(
                state,
                S::Handshaking {
                    input: input.clone(),
                    cursor: requested.or(*cursor),
                },
                [],
            )),
            (
                S::ReceiveStopped { input, cursor } | S::ReceiveFailed { input, cursor, .. },
                E::Reconnect { cursor: requested },
            ) => Some(transit(
                state,
                S::Handshaking {
                    input: input.clone(),
                    cursor: Some(requested.unwrap_or(*cursor)),
                },
                [],
            )),

            // Unsubscribe all
            (S::Handshaking { .. } | S::Receiving { .. }, E::UnsubscribeAll) => Some(transit(
                state,
                S::Unsubscribed,
                [status(ConnectionStatus::Disconnected)],
            )),
            (
                S::HandshakeStopped { .. }
                | S::HandshakeFailed { .. }
                | S::ReceiveStopped { .. }
                | S::ReceiveFailed { .. },
                E::UnsubscribeAll,
            ) => Some(transit(state, S::Unsubscribed, [])),

            _ => None,
        }
    }
}

/// Cursor to receive from after a handshake.
///
/// A restored timetoken wins over the service's, but the region always
/// comes from the handshake.
fn resume_cursor(
    restored: Option<SubscriptionCursor>,
    received: SubscriptionCursor,
) -> SubscriptionCursor {
    match restored {
        Some(restored) if !restored.is_initial() => {
            SubscriptionCursor::new(restored.timetoken, received.region)
        }
        _ => received,
    }
}

fn status(status: ConnectionStatus) -> SubscribeEffectInvocation {
    SubscribeEffectInvocation::EmitStatus { status }
}

fn subscription_changed(input: &SubscribeInput) -> SubscribeEffectInvocation {
    status(ConnectionStatus::SubscriptionChanged {
        channels: input.channel_names(),
        groups: input.group_names(),
    })
}

fn transit(
    from: &SubscribeState,
    to: SubscribeState,
    actions: impl IntoIterator<Item = SubscribeEffectInvocation>,
) -> SubscribeResult {
    let invocations: Vec<SubscribeEffectInvocation> = on_exit(from)
        .into_iter()
        .chain(actions)
        .chain(on_enter(&to))
        .collect();
    TransitionResult::new(to, invocations)
}

fn on_enter(state: &SubscribeState) -> Option<SubscribeEffectInvocation> {
    match state {
        SubscribeState::Handshaking { input, .. } => Some(SubscribeEffectInvocation::Handshake {
            input: input.clone(),
        }),
        SubscribeState::Receiving { input, cursor } => Some(SubscribeEffectInvocation::Receive {
            input: input.clone(),
            cursor: *cursor,
        }),
        _ => None,
    }
}

fn on_exit(state: &SubscribeState) -> Option<SubscribeEffectInvocation> {
    match state {
        SubscribeState::Handshaking { .. } => Some(SubscribeEffectInvocation::CancelHandshake),
        SubscribeState::Receiving { .. } => Some(SubscribeEffectInvocation::CancelReceive),
        _ => None,
    }
}
