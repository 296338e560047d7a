//! Presence heartbeat transitions.
//!
//! Timed states own their timer effect: entering `Cooldown` schedules the
//! next heartbeat and leaving it cancels that schedule, entering
//! `Reconnecting` schedules a delayed heartbeat and leaving it cancels the
//! retry. Invocations are therefore ordered as
//! `exit(from) ++ transition actions ++ enter(to)`, which keeps every cancel
//! ahead of the start it makes room for.

use crate::core::TransitionResult;
use crate::machine::Transition;

use super::event::PresenceEvent;
use super::invocation::PresenceEffectInvocation;
use super::state::PresenceState;

type PresenceResult = TransitionResult<PresenceState, PresenceEffectInvocation>;

/// Pure transition function of the presence heartbeat loop.
#[derive(Debug, Clone, Copy, Default)]
pub struct PresenceTransition;

impl Transition for PresenceTransition {
    type State = PresenceState;
    type Event = PresenceEvent;
    type Invocation = PresenceEffectInvocation;

    fn transition(&self, state: &PresenceState, event: &PresenceEvent) -> Option<PresenceResult> {
        use PresenceEffectInvocation as Invocation;
        use PresenceEvent as E;
        use PresenceState as S;

        match (state, event) {
            (_, E::Joined { input } | E::Left { input }) if input.is_empty() => None,

            (S::Inactive, E::Joined { input }) => Some(transit(
                state,
                S::Heartbeating {
                    input: input.clone(),
                },
                [],
            )),
            (
                S::Heartbeating { input: current }
                | S::Cooldown { input: current }
                | S::Reconnecting { input: current, .. },
                E::Joined { input },
            ) => Some(transit(
                state,
                S::Heartbeating {
                    input: current.clone() + input.clone(),
                },
                [],
            )),
            (S::Stopped { input: current }, E::Joined { input }) => {
                Some(TransitionResult::state_only(S::Stopped {
                    input: current.clone() + input.clone(),
                }))
            }

            (
                S::Heartbeating { input: current }
                | S::Cooldown { input: current }
                | S::Reconnecting { input: current, .. },
                E::Left { input },
            ) => {
                let leaving = current.intersection(input);
                if leaving.is_empty() {
                    return None;
                }
                let remaining = current.clone() - leaving.clone();
                let next = if remaining.is_empty() {
                    S::Inactive
                } else {
                    S::Heartbeating { input: remaining }
                };
                Some(transit(state, next, [Invocation::Leave { input: leaving }]))
            }
            (S::Stopped { input: current }, E::Left { input }) => {
                let leaving = current.intersection(input);
                if leaving.is_empty() {
                    return None;
                }
                // Leave was already announced on disconnect.
                let remaining = current.clone() - leaving;
                let next = if remaining.is_empty() {
                    S::Inactive
                } else {
                    S::Stopped { input: remaining }
                };
                Some(TransitionResult::state_only(next))
            }

            (
                S::Heartbeating { input: current }
                | S::Cooldown { input: current }
                | S::Reconnecting { input: current, .. },
                E::LeftAll,
            ) => Some(transit(
                state,
                S::Inactive,
                [Invocation::Leave {
                    input: current.clone(),
                }],
            )),

            (
                S::Heartbeating { input }
                | S::Cooldown { input }
                | S::Reconnecting { input, .. },
                E::Disconnect,
            ) => Some(transit(
                state,
                S::Stopped {
                    input: input.clone(),
                },
                [Invocation::Leave {
                    input: input.clone(),
                }],
            )),

            (S::Stopped { input } | S::Failed { input, .. }, E::Reconnect) => Some(transit(
                state,
                S::Heartbeating {
                    input: input.clone(),
                },
                [],
            )),

            (
                S::Heartbeating { input } | S::Reconnecting { input, .. },
                E::HeartbeatSuccess,
            ) => Some(transit(
                state,
                S::Cooldown {
                    input: input.clone(),
                },
                [],
            )),

            (S::Heartbeating { input }, E::HeartbeatFailure { reason }) => Some(transit(
                state,
                S::Reconnecting {
                    input: input.clone(),
                    attempt: 0,
                    reason: reason.clone(),
                },
                [],
            )),
            (S::Reconnecting { input, attempt, .. }, E::HeartbeatFailure { reason }) => {
                Some(transit(
                    state,
                    S::Reconnecting {
                        input: input.clone(),
                        attempt: attempt.saturating_add(1),
                        reason: reason.clone(),
                    },
                    [],
                ))
            }

            (S::Reconnecting { input, .. }, E::HeartbeatGiveUp { reason }) => Some(transit(
                state,
                S::Failed {
                    input: input.clone(),
                    reason: reason.clone(),
                },
                [],
            )),

            (S::Cooldown { input }, E::TimesUp) => Some(transit(
                state,
                S::Heartbeating {
                    input: input.clone(),
                },
                [],
            )),

            _ => None,
        }
    }
}

fn transit(
    from: &PresenceState,
    to: PresenceState,
    actions: impl IntoIterator<Item = PresenceEffectInvocation>,
) -> PresenceResult {
    let invocations: Vec<PresenceEffectInvocation> = on_exit(from)
        .into_iter()
        .chain(actions)
        .chain(on_enter(&to))
        .collect();
    TransitionResult::new(to, invocations)
}

fn on_enter(state: &PresenceState) -> Option<PresenceEffectInvocation> {
    match state {
        PresenceState::Heartbeating { input } => Some(PresenceEffectInvocation::Heartbeat {
            input: input.clone(),
        }),
        PresenceState::Cooldown { input } => Some(PresenceEffectInvocation::Wait {
            input: input.clone(),
        }),
        PresenceState::Reconnecting {
            input,
            attempt,
            reason,
        } => Some(PresenceEffectInvocation::DelayedHeartbeat {
            input: input.clone(),
            attempt: *attempt,
            reason: reason.clone(),
        }),
        _ => None,
    }
}

fn on_exit(state: &PresenceState) -> Option<PresenceEffectInvocation> {
    match state {
        PresenceState::Cooldown { .. } => Some(PresenceEffectInvocation::CancelWait),
        PresenceState::Reconnecting { .. } => Some(PresenceEffectInvocation::CancelDelayedHeartbeat),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assert_transition;
    use crate::core::cancel_precedes_start;
    use crate::error::{PubNubError, TransportError};
    use crate::presence::PresenceInput;
    use PresenceEffectInvocation as I;
    use PresenceEvent as E;
    use PresenceState as S;

    fn input(channels: &[&str], groups: &[&str]) -> PresenceInput {
        PresenceInput::new(channels.iter().copied(), groups.iter().copied())
    }

    fn timeout() -> PubNubError {
        TransportError::timeout("heartbeat timed out").into()
    }

    fn server_error() -> PubNubError {
        PubNubError::from_response(500, b"")
    }

    // ==========================================================================
    // Joined
    // ==========================================================================

    #[test]
    fn test_inactive_joined_starts_heartbeating() {
        assert_transition!(
            PresenceTransition,
            S::Inactive,
            E::Joined { input: input(&["c3"], &["g3"]) }
                => S::Heartbeating { input: input(&["c3"], &["g3"]) },
                [I::Heartbeat { input: input(&["c3"], &["g3"]) }]
        );
    }

    #[test]
    fn test_heartbeating_joined_merges() {
        assert_transition!(
            PresenceTransition,
            S::Heartbeating { input: input(&["c1"], &[]) },
            E::Joined { input: input(&["c2"], &["g1"]) }
                => S::Heartbeating { input: input(&["c1", "c2"], &["g1"]) },
                [I::Heartbeat { input: input(&["c1", "c2"], &["g1"]) }]
        );
    }

    #[test]
    fn test_cooldown_joined_cancels_wait() {
        assert_transition!(
            PresenceTransition,
            S::Cooldown { input: input(&["c1"], &[]) },
            E::Joined { input: input(&["c2"], &[]) }
                => S::Heartbeating { input: input(&["c1", "c2"], &[]) },
                [I::CancelWait, I::Heartbeat { input: input(&["c1", "c2"], &[]) }]
        );
    }

    #[test]
    fn test_reconnecting_joined_cancels_delayed_heartbeat() {
        assert_transition!(
            PresenceTransition,
            S::Reconnecting { input: input(&["c1"], &[]), attempt: 2, reason: timeout() },
            E::Joined { input: input(&[], &["g1"]) }
                => S::Heartbeating { input: input(&["c1"], &["g1"]) },
                [I::CancelDelayedHeartbeat, I::Heartbeat { input: input(&["c1"], &["g1"]) }]
        );
    }

    #[test]
    fn test_stopped_joined_only_updates_input() {
        assert_transition!(
            PresenceTransition,
            S::Stopped { input: input(&["c1"], &[]) },
            E::Joined { input: input(&["c2"], &[]) }
                => S::Stopped { input: input(&["c1", "c2"], &[]) },
                []
        );
    }

    #[test]
    fn test_empty_or_failed_joined_is_noop() {
        assert_transition!(
            PresenceTransition,
            S::Inactive,
            E::Joined { input: input(&["only-pnpres"], &[]) } => None
        );
        assert_transition!(
            PresenceTransition,
            S::Failed { input: input(&["c1"], &[]), reason: timeout() },
            E::Joined { input: input(&["c2"], &[]) } => None
        );
    }

    #[test]
    fn test_joined_order_does_not_matter() {
        let a = E::Joined { input: input(&["a"], &["ga"]) };
        let b = E::Joined { input: input(&["b"], &[]) };

        let run = |first: &PresenceEvent, second: &PresenceEvent| {
            let state = PresenceTransition.transition(&S::Inactive, first).unwrap().state;
            PresenceTransition.transition(&state, second).unwrap().state
        };

        let union = PresenceTransition
            .transition(&S::Inactive, &E::Joined { input: input(&["a", "b"], &["ga"]) })
            .unwrap()
            .state;
        assert_eq!(run(&a, &b), union);
        assert_eq!(run(&b, &a), union);
    }

    // ==========================================================================
    // Left
    // ==========================================================================

    #[test]
    fn test_heartbeating_left_reduces_input() {
        assert_transition!(
            PresenceTransition,
            S::Heartbeating { input: input(&["c1", "c2"], &["g1", "g2"]) },
            E::Left { input: input(&["c1"], &["g1"]) }
                => S::Heartbeating { input: input(&["c2"], &["g2"]) },
                [
                    I::Leave { input: input(&["c1"], &["g1"]) },
                    I::Heartbeat { input: input(&["c2"], &["g2"]) },
                ]
        );
    }

    #[test]
    fn test_left_everything_goes_inactive_without_heartbeat() {
        assert_transition!(
            PresenceTransition,
            S::Heartbeating { input: input(&["c1"], &["g1"]) },
            E::Left { input: input(&["c1", "unknown"], &["g1"]) }
                => S::Inactive,
                [I::Leave { input: input(&["c1"], &["g1"]) }]
        );
        assert_transition!(
            PresenceTransition,
            S::Cooldown { input: input(&["c1"], &[]) },
            E::Left { input: input(&["c1"], &[]) }
                => S::Inactive,
                [I::CancelWait, I::Leave { input: input(&["c1"], &[]) }]
        );
        assert_transition!(
            PresenceTransition,
            S::Reconnecting { input: input(&["c1"], &[]), attempt: 0, reason: timeout() },
            E::Left { input: input(&["c1"], &[]) }
                => S::Inactive,
                [I::CancelDelayedHeartbeat, I::Leave { input: input(&["c1"], &[]) }]
        );
    }

    #[test]
    fn test_reconnecting_left_resumes_heartbeating() {
        assert_transition!(
            PresenceTransition,
            S::Reconnecting { input: input(&["c1", "c2"], &[]), attempt: 3, reason: timeout() },
            E::Left { input: input(&["c2"], &[]) }
                => S::Heartbeating { input: input(&["c1"], &[]) },
                [
                    I::CancelDelayedHeartbeat,
                    I::Leave { input: input(&["c2"], &[]) },
                    I::Heartbeat { input: input(&["c1"], &[]) },
                ]
        );
    }

    #[test]
    fn test_stopped_left_sends_nothing() {
        assert_transition!(
            PresenceTransition,
            S::Stopped { input: input(&["c1", "c2"], &[]) },
            E::Left { input: input(&["c1"], &[]) }
                => S::Stopped { input: input(&["c2"], &[]) },
                []
        );
        assert_transition!(
            PresenceTransition,
            S::Stopped { input: input(&["c1"], &[]) },
            E::Left { input: input(&["c1"], &[]) }
                => S::Inactive,
                []
        );
    }

    #[test]
    fn test_left_unknown_channels_is_noop() {
        assert_transition!(
            PresenceTransition,
            S::Heartbeating { input: input(&["c1"], &[]) },
            E::Left { input: input(&["c9"], &[]) } => None
        );
    }

    #[test]
    fn test_left_all() {
        assert_transition!(
            PresenceTransition,
            S::Cooldown { input: input(&["c1"], &["g1"]) },
            E::LeftAll
                => S::Inactive,
                [I::CancelWait, I::Leave { input: input(&["c1"], &["g1"]) }]
        );
        assert_transition!(
            PresenceTransition,
            S::Stopped { input: input(&["c1"], &[]) },
            E::LeftAll => None
        );
        assert_transition!(
            PresenceTransition,
            S::Failed { input: input(&["c1"], &[]), reason: timeout() },
            E::LeftAll => None
        );
    }

    // ==========================================================================
    // Heartbeat loop
    // ==========================================================================

    #[test]
    fn test_success_enters_cooldown() {
        assert_transition!(
            PresenceTransition,
            S::Heartbeating { input: input(&["c1"], &[]) },
            E::HeartbeatSuccess
                => S::Cooldown { input: input(&["c1"], &[]) },
                [I::Wait { input: input(&["c1"], &[]) }]
        );
        assert_transition!(
            PresenceTransition,
            S::Reconnecting { input: input(&["c1"], &[]), attempt: 1, reason: timeout() },
            E::HeartbeatSuccess
                => S::Cooldown { input: input(&["c1"], &[]) },
                [I::CancelDelayedHeartbeat, I::Wait { input: input(&["c1"], &[]) }]
        );
    }

    #[test]
    fn test_cooldown_times_up() {
        let input = input(&["c1"], &["g1"]);
        assert_transition!(
            PresenceTransition,
            S::Cooldown { input: input.clone() },
            E::TimesUp
                => S::Heartbeating { input: input.clone() },
                [I::CancelWait, I::Heartbeat { input: input.clone() }]
        );
    }

    #[test]
    fn test_failure_schedules_delayed_heartbeat() {
        assert_transition!(
            PresenceTransition,
            S::Heartbeating { input: input(&["c1"], &[]) },
            E::HeartbeatFailure { reason: timeout() }
                => S::Reconnecting { input: input(&["c1"], &[]), attempt: 0, reason: timeout() },
                [I::DelayedHeartbeat { input: input(&["c1"], &[]), attempt: 0, reason: timeout() }]
        );
        assert_transition!(
            PresenceTransition,
            S::Reconnecting { input: input(&["c1"], &[]), attempt: 2, reason: timeout() },
            E::HeartbeatFailure { reason: server_error() }
                => S::Reconnecting { input: input(&["c1"], &[]), attempt: 3, reason: server_error() },
                [
                    I::CancelDelayedHeartbeat,
                    I::DelayedHeartbeat { input: input(&["c1"], &[]), attempt: 3, reason: server_error() },
                ]
        );
    }

    #[test]
    fn test_give_up_fails() {
        assert_transition!(
            PresenceTransition,
            S::Reconnecting { input: input(&["c1"], &[]), attempt: 1, reason: timeout() },
            E::HeartbeatGiveUp { reason: server_error() }
                => S::Failed { input: input(&["c1"], &[]), reason: server_error() },
                [I::CancelDelayedHeartbeat]
        );
    }

    #[test]
    fn test_disconnect_and_reconnect() {
        assert_transition!(
            PresenceTransition,
            S::Cooldown { input: input(&["c1"], &[]) },
            E::Disconnect
                => S::Stopped { input: input(&["c1"], &[]) },
                [I::CancelWait, I::Leave { input: input(&["c1"], &[]) }]
        );
        assert_transition!(
            PresenceTransition,
            S::Reconnecting { input: input(&["c1"], &[]), attempt: 0, reason: timeout() },
            E::Disconnect
                => S::Stopped { input: input(&["c1"], &[]) },
                [I::CancelDelayedHeartbeat, I::Leave { input: input(&["c1"], &[]) }]
        );
        assert_transition!(
            PresenceTransition,
            S::Stopped { input: input(&["c1"], &[]) },
            E::Reconnect
                => S::Heartbeating { input: input(&["c1"], &[]) },
                [I::Heartbeat { input: input(&["c1"], &[]) }]
        );
        assert_transition!(
            PresenceTransition,
            S::Failed { input: input(&["c1"], &[]), reason: timeout() },
            E::Reconnect
                => S::Heartbeating { input: input(&["c1"], &[]) },
                [I::Heartbeat { input: input(&["c1"], &[]) }]
        );
    }

    #[test]
    fn test_unexpected_pairs_are_noops() {
        assert_transition!(PresenceTransition, S::Inactive, E::HeartbeatSuccess => None);
        assert_transition!(PresenceTransition, S::Inactive, E::Disconnect => None);
        assert_transition!(
            PresenceTransition,
            S::Heartbeating { input: input(&["c1"], &[]) },
            E::Reconnect => None
        );
        assert_transition!(
            PresenceTransition,
            S::Stopped { input: input(&["c1"], &[]) },
            E::HeartbeatSuccess => None
        );
        assert_transition!(
            PresenceTransition,
            S::Cooldown { input: input(&["c1"], &[]) },
            E::HeartbeatFailure { reason: timeout() } => None
        );
    }

    // ==========================================================================
    // Properties
    // ==========================================================================

    fn all_states() -> Vec<PresenceState> {
        let input = input(&["c1", "c2"], &["g1"]);
        vec![
            S::Inactive,
            S::Heartbeating { input: input.clone() },
            S::Cooldown { input: input.clone() },
            S::Reconnecting { input: input.clone(), attempt: 4, reason: timeout() },
            S::Stopped { input: input.clone() },
            S::Failed { input, reason: timeout() },
        ]
    }

    fn all_events() -> Vec<PresenceEvent> {
        vec![
            E::Joined { input: input(&["c3"], &[]) },
            E::Left { input: input(&["c1"], &[]) },
            E::Left { input: input(&["c1", "c2"], &["g1"]) },
            E::LeftAll,
            E::Reconnect,
            E::Disconnect,
            E::HeartbeatSuccess,
            E::HeartbeatFailure { reason: server_error() },
            E::HeartbeatGiveUp { reason: server_error() },
            E::TimesUp,
        ]
    }

    #[test]
    fn test_transitions_are_deterministic() {
        for state in all_states() {
            for event in all_events() {
                assert_eq!(
                    PresenceTransition.transition(&state, &event),
                    PresenceTransition.transition(&state, &event),
                    "{:?} + {:?}",
                    state,
                    event
                );
            }
        }
    }

    #[test]
    fn test_cancel_always_precedes_restart() {
        for state in all_states() {
            for event in all_events() {
                if let Some(result) = PresenceTransition.transition(&state, &event) {
                    assert!(
                        cancel_precedes_start(result.invocations()),
                        "{:?} + {:?} => {:?}",
                        state,
                        event,
                        result.invocations()
                    );
                }
            }
        }
    }

    #[test]
    fn test_leaving_everything_never_heartbeats() {
        for state in all_states() {
            let Some(current) = state.input().cloned() else {
                continue;
            };
            if let Some(result) = PresenceTransition.transition(&state, &E::Left { input: current }) {
                assert_eq!(result.state, S::Inactive);
                assert!(!result
                    .invocations()
                    .iter()
                    .any(|i| matches!(i, I::Heartbeat { .. } | I::DelayedHeartbeat { .. })));
            }
        }
    }
}
