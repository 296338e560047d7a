//! Event engine - serial orchestration of transitions and effects.
//!
//! The engine owns the current state and is the only writer of it:
//!
//! ```text
//! submit(event) ──► queue ──► Transition::transition(state, event)
//!                    ▲                     │
//!                    │          (next state, invocations)
//!                    │                     │
//!                    │                     ▼
//!                    │             EffectDispatcher
//!                    │          cancel │        │ start
//!                    │                 ▼        ▼
//!                    └──────── effect completion (events)
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let engine = Engine::new("presence", PresenceTransition, handler, PresenceState::Inactive);
//!
//! // Start the engine (runs in background)
//! let handle = engine.start();
//!
//! // Fire-and-forget
//! handle.submit(PresenceEvent::Disconnect)?;
//!
//! // Or wait until the event's transition has been applied
//! handle.submit_and_wait(PresenceEvent::Reconnect).await?;
//! assert!(matches!(handle.current_state(), PresenceState::Heartbeating { .. }));
//! ```
//!
//! # Serial Processing
//!
//! User submissions and effect completions share one FIFO queue drained by a
//! single task. A transition never runs concurrently with another, and events
//! produced while handling an event are appended to the queue rather than
//! processed inline.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

use crate::core::{EffectInvocation, Event, State, TransitionResult};
use crate::dispatch::{EffectDispatcher, EffectId};
use crate::effect::EffectHandler;
use crate::error::EngineError;
use crate::machine::{guarded_transition, Transition};

/// Message consumed by the engine loop.
pub(crate) enum Message<E, K> {
    /// An event submitted by a caller or an inline effect.
    Event {
        event: E,
        ack: Option<oneshot::Sender<()>>,
    },
    /// Outcome of a spawned effect.
    Completed { id: EffectId, events: Vec<E> },
    /// Snapshot request for the running effects.
    Inspect { reply: oneshot::Sender<Vec<K>> },
    /// Stop processing.
    Dispose,
    /// Stop processing once effects that finish on shutdown are done.
    Shutdown { reply: oneshot::Sender<()> },
}

type EngineMessage<T> = Message<
    <T as Transition>::Event,
    <<T as Transition>::Invocation as EffectInvocation>::Kind,
>;

/// State shared between the loop and its handles.
struct Shared<T: Transition> {
    sender: mpsc::UnboundedSender<EngineMessage<T>>,
    disposed: AtomicBool,
}

impl<T: Transition> Shared<T> {
    fn dispose(&self, name: &'static str) {
        if !self.disposed.swap(true, Ordering::AcqRel) {
            info!(engine = name, "disposing event engine");
            let _ = self.sender.send(Message::Dispose);
        }
    }
}

// =============================================================================
// Engine
// =============================================================================

/// An event engine before it is started.
pub struct Engine<T: Transition> {
    name: &'static str,
    machine: T,
    state: watch::Sender<T::State>,
    state_rx: watch::Receiver<T::State>,
    dispatcher: EffectDispatcher<T::Invocation, T::Event>,
    receiver: mpsc::UnboundedReceiver<EngineMessage<T>>,
    shared: Arc<Shared<T>>,
}

impl<T: Transition> Engine<T> {
    /// Create an engine in `initial` state.
    ///
    /// `name` tags every log line emitted by this engine.
    pub fn new<H>(name: &'static str, machine: T, handler: H, initial: T::State) -> Self
    where
        H: EffectHandler<T::Invocation, T::Event>,
    {
        Self::with_handler(name, machine, Arc::new(handler), initial)
    }

    /// Create an engine from a shared effect handler.
    pub fn with_handler(
        name: &'static str,
        machine: T,
        handler: Arc<dyn EffectHandler<T::Invocation, T::Event>>,
        initial: T::State,
    ) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (state, state_rx) = watch::channel(initial);
        let dispatcher = EffectDispatcher::new(name, handler, sender.clone());

        Self {
            name,
            machine,
            state,
            state_rx,
            dispatcher,
            receiver,
            shared: Arc::new(Shared {
                sender,
                disposed: AtomicBool::new(false),
            }),
        }
    }

    /// Spawn the processing loop and return a handle to it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(self) -> EngineHandle<T> {
        let name = self.name;
        let shared = self.shared.clone();
        let state = self.state_rx.clone();
        let task = tokio::spawn(self.run());

        EngineHandle {
            inner: Arc::new(HandleInner {
                name,
                shared,
                state,
                task,
            }),
        }
    }

    async fn run(mut self) {
        info!(
            engine = self.name,
            state = self.state.borrow().id(),
            "event engine starting"
        );

        let mut shutdown = None;

        while let Some(message) = self.receiver.recv().await {
            // Anything still queued after dispose is dropped unprocessed.
            if self.shared.disposed.load(Ordering::Acquire) {
                break;
            }

            match message {
                Message::Event { event, ack } => {
                    self.process(event).await;
                    if let Some(ack) = ack {
                        let _ = ack.send(());
                    }
                }
                Message::Completed { id, events } => {
                    if !self.dispatcher.complete(id) {
                        debug!(
                            engine = self.name,
                            %id,
                            dropped = events.len(),
                            "discarding outcome of cancelled effect"
                        );
                        continue;
                    }
                    for event in events {
                        self.process(event).await;
                    }
                }
                Message::Inspect { reply } => {
                    let _ = reply.send(self.dispatcher.active_kinds());
                }
                Message::Dispose => break,
                Message::Shutdown { reply } => {
                    info!(engine = self.name, "shutting down event engine");
                    self.shared.disposed.store(true, Ordering::Release);
                    shutdown = Some(reply);
                    break;
                }
            }
        }

        let finishing = self.dispatcher.shutdown();
        self.receiver.close();

        // Detached effects outlive a plain dispose.
        if let Some(reply) = shutdown {
            if !finishing.is_empty() {
                debug!(
                    engine = self.name,
                    effects = finishing.len(),
                    "waiting for effects to finish"
                );
                futures::future::join_all(finishing).await;
            }
            let _ = reply.send(());
        }
        info!(engine = self.name, "event engine stopped");
    }

    async fn process(&mut self, event: T::Event) {
        let current = self.state.borrow().clone();

        let Some(result) = guarded_transition(&self.machine, self.name, &current, &event) else {
            trace!(
                engine = self.name,
                state = current.id(),
                event = event.id(),
                "event ignored in current state"
            );
            return;
        };

        let TransitionResult { state, invocations } = result;
        debug!(
            engine = self.name,
            from = current.id(),
            event = event.id(),
            to = state.id(),
            invocations = invocations.len(),
            running = self.dispatcher.len(),
            "state transition"
        );

        self.state.send_if_modified(|slot| {
            if *slot == state {
                false
            } else {
                *slot = state;
                true
            }
        });

        for invocation in &invocations {
            trace!(engine = self.name, invocation = invocation.id(), "dispatching invocation");
            self.dispatcher.dispatch(invocation).await;
        }
    }
}

impl<T: Transition> fmt::Debug for Engine<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("name", &self.name)
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Engine Handle
// =============================================================================

struct HandleInner<T: Transition> {
    name: &'static str,
    shared: Arc<Shared<T>>,
    state: watch::Receiver<T::State>,
    task: JoinHandle<()>,
}

impl<T: Transition> Drop for HandleInner<T> {
    fn drop(&mut self) {
        // Last handle gone: nobody can observe the engine any more.
        self.shared.dispose(self.name);
    }
}

/// Handle to a running engine.
///
/// Cheap to clone. The engine is disposed when `dispose()` is called or the
/// last handle is dropped.
///
/// # Fire-and-Forget vs Wait
///
/// - `submit()`: returns once the event is queued.
/// - `submit_and_wait()`: returns once the event's transition has been
///   applied and its invocations dispatched. Effects started by it may still
///   be running.
pub struct EngineHandle<T: Transition> {
    inner: Arc<HandleInner<T>>,
}

impl<T: Transition> Clone for EngineHandle<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Transition> EngineHandle<T> {
    /// Engine name used in logs.
    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    /// Queue an event for processing.
    pub fn submit(&self, event: T::Event) -> Result<(), EngineError> {
        if self.is_disposed() {
            return Err(EngineError::Disposed);
        }
        self.inner
            .shared
            .sender
            .send(Message::Event { event, ack: None })
            .map_err(|_| self.stopped_error())
    }

    /// Queue an event and wait until it has been processed.
    pub async fn submit_and_wait(&self, event: T::Event) -> Result<(), EngineError> {
        let done = self.submit_with_ack(event)?;
        self.wait_for_ack(done).await
    }

    /// Queue an event, returning a receiver resolved once it is processed.
    pub(crate) fn submit_with_ack(
        &self,
        event: T::Event,
    ) -> Result<oneshot::Receiver<()>, EngineError> {
        if self.is_disposed() {
            return Err(EngineError::Disposed);
        }
        let (ack, done) = oneshot::channel();
        self.inner
            .shared
            .sender
            .send(Message::Event {
                event,
                ack: Some(ack),
            })
            .map_err(|_| self.stopped_error())?;
        Ok(done)
    }

    pub(crate) async fn wait_for_ack(&self, done: oneshot::Receiver<()>) -> Result<(), EngineError> {
        done.await.map_err(|_| self.stopped_error())
    }

    /// Latest applied state.
    pub fn current_state(&self) -> T::State {
        self.inner.state.borrow().clone()
    }

    /// Receiver notified on every state change.
    pub fn watch_state(&self) -> watch::Receiver<T::State> {
        self.inner.state.clone()
    }

    /// Kinds of the effects currently running, one entry per effect.
    pub async fn active_effects(
        &self,
    ) -> Result<Vec<<T::Invocation as EffectInvocation>::Kind>, EngineError> {
        if self.is_disposed() {
            return Err(EngineError::Disposed);
        }
        let (reply, response) = oneshot::channel();
        self.inner
            .shared
            .sender
            .send(Message::Inspect { reply })
            .map_err(|_| self.stopped_error())?;

        response.await.map_err(|_| self.stopped_error())
    }

    /// Cancel every running effect, drop queued events, stop processing.
    ///
    /// Idempotent.
    pub fn dispose(&self) {
        self.inner.shared.dispose(self.inner.name);
    }

    /// Stop the engine after the events queued so far.
    ///
    /// Running effects are aborted except those that finish on shutdown,
    /// which are awaited. Resolves immediately when already disposed.
    pub async fn shutdown(&self) {
        if self.is_disposed() {
            return;
        }
        let (reply, done) = oneshot::channel();
        if self
            .inner
            .shared
            .sender
            .send(Message::Shutdown { reply })
            .is_ok()
        {
            // A concurrent dispose drops the reply.
            let _ = done.await;
        }
    }

    /// Whether `dispose()` has been called.
    pub fn is_disposed(&self) -> bool {
        self.inner.shared.disposed.load(Ordering::Acquire)
    }

    /// Whether the processing loop has exited.
    pub fn is_finished(&self) -> bool {
        self.inner.task.is_finished()
    }

    fn stopped_error(&self) -> EngineError {
        if self.is_disposed() {
            EngineError::Disposed
        } else {
            EngineError::Closed
        }
    }
}

impl<T: Transition> fmt::Debug for EngineHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineHandle")
            .field("name", &self.inner.name)
            .field("state", &*self.inner.state.borrow())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
