//! Effect dispatcher and cancellation registry.
//!
//! The `EffectDispatcher` is responsible for:
//! 1. Turning invocations into effects through the [`EffectHandler`]
//! 2. Running effects inline or on their own task
//! 3. Tracking running effects so `Cancel(kind)` can reach them
//! 4. Discarding completions from effects that were cancelled meanwhile
//!
//! # Registry
//!
//! Every spawned effect gets an [`EffectId`]. The registry maps
//! `id -> (kind, abort handle)` for every running effect and
//! `kind -> id` for managed effects, which makes "at most one managed effect
//! per kind" an explicit property of the data structure.

use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, trace};

use crate::core::{Dispatch, EffectInvocation, Event};
use crate::effect::{Effect, EffectHandler, ExecutionMode};
use crate::engine::Message;

/// Identifier of a spawned effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectId(u64);

impl fmt::Display for EffectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "effect-{}", self.0)
    }
}

struct ActiveEffect<K> {
    kind: K,
    name: &'static str,
    task: JoinHandle<()>,
    finish_on_shutdown: bool,
}

/// Starts, tracks, and cancels effects on behalf of one engine.
pub(crate) struct EffectDispatcher<I: EffectInvocation, E: Event> {
    engine: &'static str,
    handler: Arc<dyn EffectHandler<I, E>>,
    sender: mpsc::UnboundedSender<Message<E, I::Kind>>,
    active: HashMap<EffectId, ActiveEffect<I::Kind>>,
    managed: HashMap<I::Kind, EffectId>,
    next_id: u64,
}

impl<I: EffectInvocation, E: Event> EffectDispatcher<I, E> {
    /// Create a dispatcher that reports completions through `sender`.
    pub(crate) fn new(
        engine: &'static str,
        handler: Arc<dyn EffectHandler<I, E>>,
        sender: mpsc::UnboundedSender<Message<E, I::Kind>>,
    ) -> Self {
        Self {
            engine,
            handler,
            sender,
            active: HashMap::new(),
            managed: HashMap::new(),
            next_id: 0,
        }
    }

    /// Apply one invocation.
    pub(crate) async fn dispatch(&mut self, invocation: &I) {
        match invocation.dispatch() {
            Dispatch::Cancel(kind) => {
                self.cancel(kind);
            }
            Dispatch::Managed(kind) => {
                // A managed start supersedes whatever is running for the kind.
                self.cancel(kind);
                self.start(invocation, kind, true).await;
            }
            Dispatch::Regular(kind) => {
                self.start(invocation, kind, false).await;
            }
        }
    }

    async fn start(&mut self, invocation: &I, kind: I::Kind, managed: bool) {
        let Some(effect) = self.handler.create(invocation) else {
            trace!(
                engine = self.engine,
                invocation = invocation.id(),
                "invocation has no effect"
            );
            return;
        };

        match effect.execution_mode() {
            ExecutionMode::Inline => {
                let events = run_guarded(self.engine, effect.as_ref()).await;
                for event in events {
                    // Enqueued behind whatever is already pending, never run inline.
                    let _ = self.sender.send(Message::Event { event, ack: None });
                }
            }
            ExecutionMode::Spawned => {
                let id = EffectId(self.next_id);
                self.next_id += 1;

                let name = effect.id();
                let finish_on_shutdown = effect.finish_on_shutdown();
                let engine = self.engine;
                let sender = self.sender.clone();
                let task = tokio::spawn(async move {
                    let events = run_guarded(engine, effect.as_ref()).await;
                    let _ = sender.send(Message::Completed { id, events });
                });

                trace!(engine = self.engine, effect = name, %id, ?kind, managed, "effect started");
                self.active.insert(
                    id,
                    ActiveEffect {
                        kind,
                        name,
                        task,
                        finish_on_shutdown,
                    },
                );
                if managed {
                    self.managed.insert(kind, id);
                }
            }
        }
    }

    /// Cancel every running effect of `kind`.
    ///
    /// Idempotent: cancelling a kind with nothing running is a no-op.
    /// Returns the number of effects cancelled.
    pub(crate) fn cancel(&mut self, kind: I::Kind) -> usize {
        let ids: Vec<EffectId> = self
            .active
            .iter()
            .filter(|(_, effect)| effect.kind == kind)
            .map(|(id, _)| *id)
            .collect();

        for id in &ids {
            if let Some(effect) = self.active.remove(id) {
                effect.task.abort();
                trace!(engine = self.engine, effect = effect.name, %id, "effect cancelled");
            }
        }
        self.managed.remove(&kind);
        ids.len()
    }

    /// Forget a finished effect.
    ///
    /// Returns `false` when the effect is unknown, i.e. it was cancelled after
    /// it had already produced its result. Such results must be discarded.
    pub(crate) fn complete(&mut self, id: EffectId) -> bool {
        match self.active.remove(&id) {
            Some(effect) => {
                if self.managed.get(&effect.kind) == Some(&id) {
                    self.managed.remove(&effect.kind);
                }
                trace!(engine = self.engine, effect = effect.name, %id, "effect completed");
                true
            }
            None => false,
        }
    }

    /// Stop tracking everything (engine disposal).
    ///
    /// Effects that finish on shutdown are handed back still running, every
    /// other effect is aborted.
    pub(crate) fn shutdown(&mut self) -> Vec<JoinHandle<()>> {
        let mut finishing = Vec::new();
        for (id, effect) in self.active.drain() {
            if effect.finish_on_shutdown {
                trace!(engine = self.engine, effect = effect.name, %id, "effect left to finish");
                finishing.push(effect.task);
            } else {
                effect.task.abort();
                trace!(engine = self.engine, effect = effect.name, %id, "effect cancelled on dispose");
            }
        }
        self.managed.clear();
        finishing
    }

    /// Kinds of all running effects, one entry per effect.
    pub(crate) fn active_kinds(&self) -> Vec<I::Kind> {
        let mut entries: Vec<(EffectId, I::Kind)> =
            self.active.iter().map(|(id, effect)| (*id, effect.kind)).collect();
        entries.sort_by_key(|(id, _)| *id);
        entries.into_iter().map(|(_, kind)| kind).collect()
    }

    /// Number of running effects.
    pub(crate) fn len(&self) -> usize {
        self.active.len()
    }
}

/// Run an effect, converting a panic into an empty outcome.
async fn run_guarded<E: Event>(engine: &'static str, effect: &dyn Effect<E>) -> Vec<E> {
    match AssertUnwindSafe(effect.run()).catch_unwind().await {
        Ok(events) => events,
        Err(_) => {
            error!(engine, effect = effect.id(), "effect panicked, dropping its outcome");
            Vec::new()
        }
    }
}
