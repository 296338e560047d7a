//! Effect trait and effect factory.
//!
//! Effects are the asynchronous half of the engine. An effect fulfils one
//! invocation (a network call, a timer, a listener notification) and reports
//! its outcome as zero or more events.
//!
//! # Key Properties
//!
//! - **One Invocation = One Effect**
//! - **Snapshot inputs**: effects receive everything they need at creation
//!   time and never read engine state
//! - **Return events**: effects return events, the engine enqueues them
//! - **Cancellable**: a running effect may be dropped at any await point,
//!   unless it opts into finishing on shutdown

use async_trait::async_trait;

use crate::core::{EffectInvocation, Event};

/// Where an effect runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// Spawned on its own task and tracked by the dispatcher (default).
    #[default]
    Spawned,
    /// Awaited by the engine loop before the next invocation is dispatched.
    ///
    /// Reserved for short, non-blocking work whose ordering matters, such as
    /// delivering status changes and messages to listeners.
    Inline,
}

/// An asynchronous unit of work started for an invocation.
///
/// # Example
///
/// ```ignore
/// struct PingEffect {
///     transport: Arc<dyn Transport>,
/// }
///
/// #[async_trait]
/// impl Effect<PingEvent> for PingEffect {
///     fn id(&self) -> &'static str {
///         "PING"
///     }
///
///     async fn run(&self) -> Vec<PingEvent> {
///         match self.transport.send(ping_request()).await {
///             Ok(_) => vec![PingEvent::Pong],
///             Err(err) => vec![PingEvent::Failed { reason: err.into() }],
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait Effect<E: Event>: Send + Sync {
    /// Identifier used in logs.
    fn id(&self) -> &'static str;

    /// Execution mode, `Spawned` unless overridden.
    fn execution_mode(&self) -> ExecutionMode {
        ExecutionMode::Spawned
    }

    /// Whether the effect keeps running when the engine is disposed.
    ///
    /// Such effects are detached instead of aborted, and
    /// [`EngineHandle::shutdown`](crate::EngineHandle::shutdown) waits for
    /// them. Their events are discarded.
    fn finish_on_shutdown(&self) -> bool {
        false
    }

    /// Perform the work and return the resulting events.
    ///
    /// An empty list is a valid outcome: the effect completed without
    /// anything for the state machine to react to.
    async fn run(&self) -> Vec<E>;
}

/// Factory turning invocations into effects.
///
/// Implementations close over a read-only dependency snapshot (transport,
/// timer, configuration) captured when the engine was built.
pub trait EffectHandler<I: EffectInvocation, E: Event>: Send + Sync + 'static {
    /// Create the effect for an invocation.
    ///
    /// Returns `None` for invocations that carry no work (cancellations).
    fn create(&self, invocation: &I) -> Option<Box<dyn Effect<E>>>;
}
