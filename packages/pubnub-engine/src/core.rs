//! Core traits for the event engine.
//!
//! # Overview
//!
//! The engine separates **facts** from **side effects**:
//! - [`Event`] = Facts (what happened: a user call, a network outcome, a timer)
//! - [`EffectInvocation`] = Declarative instructions to start or cancel an effect
//! - [`State`] = The single value the engine owns between events
//!
//! A transition consumes a `(State, Event)` pair and returns a
//! [`TransitionResult`]: the next state plus an ordered list of invocations.
//! Transitions never perform IO.
//!
//! # Dispatch Policies
//!
//! Every invocation is tagged with a [`Dispatch`] policy keyed by an effect
//! *kind*:
//! - `Regular(kind)`: fire and track, the effect's outcome feeds new events
//! - `Managed(kind)`: like regular, but replaces any running effect of the
//!   same kind (at most one active effect per managed kind)
//! - `Cancel(kind)`: stop and forget every running effect of that kind

use std::fmt::Debug;
use std::hash::Hash;

use smallvec::SmallVec;

/// Marker trait for engine events.
///
/// Events are immutable facts. The `id` is used for logging only.
pub trait Event: Debug + Send + Sync + 'static {
    /// Stable identifier used in logs (e.g. `"HEARTBEAT_SUCCESS"`).
    fn id(&self) -> &'static str;
}

/// Marker trait for engine states.
///
/// States are plain values. The engine replaces its state atomically after
/// each transition and publishes snapshots to observers, hence `Clone`.
pub trait State: Debug + Clone + PartialEq + Send + Sync + 'static {
    /// Stable identifier used in logs (e.g. `"HEARTBEAT_COOLDOWN"`).
    fn id(&self) -> &'static str;
}

/// Key used by the dispatcher to group running effects.
///
/// Blanket-implemented for any small copyable enum.
pub trait EffectKind: Debug + Copy + Eq + Hash + Send + Sync + 'static {}

impl<T> EffectKind for T where T: Debug + Copy + Eq + Hash + Send + Sync + 'static {}

/// How the dispatcher should treat an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dispatch<K> {
    /// Start the effect and track it until it completes.
    Regular(K),
    /// Start the effect, replacing any running effect of the same kind.
    Managed(K),
    /// Cancel every running effect of the given kind (no-op if none).
    Cancel(K),
}

impl<K: Copy> Dispatch<K> {
    /// The effect kind this policy applies to.
    pub fn kind(&self) -> K {
        match self {
            Dispatch::Regular(kind) | Dispatch::Managed(kind) | Dispatch::Cancel(kind) => *kind,
        }
    }

    /// Returns true for `Cancel`.
    pub fn is_cancel(&self) -> bool {
        matches!(self, Dispatch::Cancel(_))
    }
}

/// A declarative instruction emitted by a transition.
pub trait EffectInvocation: Debug + Clone + PartialEq + Send + Sync + 'static {
    /// Kind used for cancellation and managed replacement.
    type Kind: EffectKind;

    /// Stable identifier used in logs.
    fn id(&self) -> &'static str;

    /// Dispatch policy for this invocation.
    fn dispatch(&self) -> Dispatch<Self::Kind>;
}

/// Ordered invocation list returned by a transition.
///
/// Transitions rarely emit more than three invocations, so the list lives
/// inline.
pub type Invocations<I> = SmallVec<[I; 4]>;

/// Outcome of a transition: the next state and the invocations to dispatch,
/// in order.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionResult<S, I> {
    /// State the engine moves to.
    pub state: S,
    /// Invocations to dispatch, in order.
    pub invocations: Invocations<I>,
}

impl<S, I> TransitionResult<S, I> {
    /// Create a result from a state and an ordered list of invocations.
    pub fn new(state: S, invocations: impl IntoIterator<Item = I>) -> Self {
        Self {
            state,
            invocations: invocations.into_iter().collect(),
        }
    }

    /// Create a result that only changes state.
    pub fn state_only(state: S) -> Self {
        Self {
            state,
            invocations: SmallVec::new(),
        }
    }

    /// Invocations as a slice.
    pub fn invocations(&self) -> &[I] {
        &self.invocations
    }
}

/// Checks that every `Cancel(kind)` in the list appears before any start of
/// the same kind.
///
/// A cancel placed after a start would kill the freshly started effect
/// instead of its predecessor.
pub fn cancel_precedes_start<I: EffectInvocation>(invocations: &[I]) -> bool {
    invocations.iter().enumerate().all(|(index, invocation)| {
        let dispatch = invocation.dispatch();
        if !dispatch.is_cancel() {
            return true;
        }
        !invocations[..index]
            .iter()
            .any(|earlier| !earlier.dispatch().is_cancel() && earlier.dispatch().kind() == dispatch.kind())
    })
}
