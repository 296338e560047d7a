//! Transition trait and the panic-guarded runner used by the engine.
//!
//! Transitions are pure functions from `(State, Event)` to the next state and
//! the invocations needed to get there. They perform no IO and own no timers.
//!
//! # Key Properties
//!
//! - **Pure decisions**: no IO, no async, no interior mutability
//! - **Deterministic**: identical inputs always yield identical outputs
//! - **Total**: pairs the machine does not care about return `None` (no-op)

use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::error;

use crate::core::{EffectInvocation, Event, State, TransitionResult};

/// A pure state machine that maps events to state changes and invocations.
///
/// # Example
///
/// ```ignore
/// struct Toggle;
///
/// impl Transition for Toggle {
///     type State = Light;
///     type Event = Press;
///     type Invocation = LampInvocation;
///
///     fn transition(&self, state: &Light, _event: &Press) -> Option<TransitionResult<Light, LampInvocation>> {
///         match state {
///             Light::Off => Some(TransitionResult::new(Light::On, [LampInvocation::PowerOn])),
///             Light::On => Some(TransitionResult::new(Light::Off, [LampInvocation::PowerOff])),
///         }
///     }
/// }
/// ```
pub trait Transition: Send + Sync + 'static {
    /// State owned by the engine.
    type State: State;

    /// Events the machine reacts to.
    type Event: Event;

    /// Invocations the machine may emit.
    type Invocation: EffectInvocation;

    /// Compute the next state and invocations.
    ///
    /// Returns `None` when the event has no meaning in the current state. The
    /// engine then keeps its state and dispatches nothing.
    ///
    /// # Guarantees
    ///
    /// - Called synchronously (no async)
    /// - Called serially (no concurrent calls)
    fn transition(
        &self,
        state: &Self::State,
        event: &Self::Event,
    ) -> Option<TransitionResult<Self::State, Self::Invocation>>;
}

/// Run a transition, converting a panic into a no-op.
///
/// The panic is logged and the engine keeps its previous state.
pub(crate) fn guarded_transition<T: Transition>(
    machine: &T,
    engine: &str,
    state: &T::State,
    event: &T::Event,
) -> Option<TransitionResult<T::State, T::Invocation>> {
    match catch_unwind(AssertUnwindSafe(|| machine.transition(state, event))) {
        Ok(result) => result,
        Err(panic_info) => {
            let panic_msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                (*s).to_string()
            } else if let Some(s) = panic_info.downcast_ref::<String>() {
                s.clone()
            } else {
                "unknown panic".to_string()
            };

            error!(
                engine,
                state = state.id(),
                event = event.id(),
                panic = %panic_msg,
                "transition panicked, keeping current state"
            );
            None
        }
    }
}
