use std::sync::{Arc, Mutex};

use crate::bus::UpdateBus;
use crate::config::PubNubConfig;
use crate::engine::{Engine, EngineHandle};
use crate::error::EngineError;
use crate::timer::Timer;
use crate::transport::Transport;

use super::cursor::SubscriptionCursor;
use super::effects::SubscribeEffectHandler;
use super::event::SubscribeEvent;
use super::input::SubscribeInput;
use super::state::SubscribeState;
use super::transition::SubscribeTransition;

/// Caller-facing wrapper around the subscribe engine.
///
/// Keeps the desired subscription set. Each call computes the next set and
/// queues the resulting event under one lock, so concurrent callers are
/// applied in the order they took it.
#[derive(Debug, Clone)]
pub struct SubscribeManager {
    engine: EngineHandle<SubscribeTransition>,
    input: Arc<Mutex<SubscribeInput>>,
}

impl SubscribeManager {
    /// Build and start a subscribe engine.
    pub fn new(
        config: Arc<PubNubConfig>,
        transport: Arc<dyn Transport>,
        timer: Arc<dyn Timer>,
        bus: UpdateBus,
    ) -> Self {
        let handler = SubscribeEffectHandler::new(transport, timer, config, bus);
        let engine = Engine::new(
            "subscribe",
            SubscribeTransition,
            handler,
            SubscribeState::Unsubscribed,
        );
        Self {
            engine: engine.start(),
            input: Arc::new(Mutex::new(SubscribeInput::default())),
        }
    }

    /// Add channels and groups, optionally resuming from `cursor`.
    pub async fn subscribe(
        &self,
        added: SubscribeInput,
        cursor: Option<SubscriptionCursor>,
    ) -> Result<(), EngineError> {
        self.update(|current| {
            let input = current.clone() + added;
            let event = match cursor {
                Some(cursor) => SubscribeEvent::SubscriptionRestored {
                    input: input.clone(),
                    cursor,
                },
                None => SubscribeEvent::SubscriptionChanged {
                    input: input.clone(),
                },
            };
            (input, Some(event))
        })
        .await
    }

    /// Remove channels and groups.
    ///
    /// Removing names that are not subscribed is a no-op.
    pub async fn unsubscribe(
        &self,
        channels: Vec<String>,
        groups: Vec<String>,
    ) -> Result<(), EngineError> {
        self.update(|current| {
            let input = current.remove(channels, groups);
            if input == *current {
                return (input, None);
            }
            let event = SubscribeEvent::SubscriptionChanged {
                input: input.clone(),
            };
            (input, Some(event))
        })
        .await
    }

    pub async fn unsubscribe_all(&self) -> Result<(), EngineError> {
        self.update(|_| (SubscribeInput::default(), Some(SubscribeEvent::UnsubscribeAll)))
            .await
    }

    pub async fn disconnect(&self) -> Result<(), EngineError> {
        self.engine.submit_and_wait(SubscribeEvent::Disconnect).await
    }

    pub async fn reconnect(&self, cursor: Option<SubscriptionCursor>) -> Result<(), EngineError> {
        self.engine
            .submit_and_wait(SubscribeEvent::Reconnect { cursor })
            .await
    }

    /// Desired subscription set.
    pub fn input(&self) -> SubscribeInput {
        self.lock_input().clone()
    }

    pub fn state(&self) -> SubscribeState {
        self.engine.current_state()
    }

    /// Underlying engine handle.
    pub fn engine(&self) -> &EngineHandle<SubscribeTransition> {
        &self.engine
    }

    pub fn dispose(&self) {
        self.engine.dispose();
    }

    async fn update<F>(&self, next: F) -> Result<(), EngineError>
    where
        F: FnOnce(&SubscribeInput) -> (SubscribeInput, Option<SubscribeEvent>),
    {
        let done = {
            let mut current = self.lock_input();
            let (input, event) = next(&current);
            let Some(event) = event else {
                return Ok(());
            };
            let done = self.engine.submit_with_ack(event)?;
            *current = input;
            done
        };
        self.engine.wait_for_ack(done).await
    }

    fn lock_input(&self) -> std::sync::MutexGuard<'_, SubscribeInput> {
        self.input
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
