use std::sync::Arc;

use async_trait::async_trait;
use tracing::trace;

use crate::bus::{ClientUpdate, UpdateBus};
use crate::config::PubNubConfig;
use crate::effect::{Effect, EffectHandler, ExecutionMode};
use crate::status::ConnectionStatus;
use crate::timer::Timer;
use crate::transport::Transport;

use super::event::SubscribeEvent;
use super::invocation::SubscribeEffectInvocation;
use super::message::SubscribeMessage;
use super::request::SubscribeRequest;

/// Builds subscribe effects from a read-only dependency snapshot.
pub struct SubscribeEffectHandler {
    transport: Arc<dyn Transport>,
    timer: Arc<dyn Timer>,
    config: Arc<PubNubConfig>,
    bus: UpdateBus,
}

impl SubscribeEffectHandler {
    pub fn new(
        transport: Arc<dyn Transport>,
        timer: Arc<dyn Timer>,
        config: Arc<PubNubConfig>,
        bus: UpdateBus,
    ) -> Self {
        Self {
            transport,
            timer,
            config,
            bus,
        }
    }
}

impl EffectHandler<SubscribeEffectInvocation, SubscribeEvent> for SubscribeEffectHandler {
    fn create(
        &self,
        invocation: &SubscribeEffectInvocation,
    ) -> Option<Box<dyn Effect<SubscribeEvent>>> {
        match invocation {
            SubscribeEffectInvocation::Handshake { input } => Some(Box::new(HandshakeEffect {
                request: SubscribeRequest {
                    transport: self.transport.clone(),
                    timer: self.timer.clone(),
                    config: self.config.clone(),
                    input: input.clone(),
                    cursor: None,
                },
            })),
            SubscribeEffectInvocation::Receive { input, cursor } => Some(Box::new(ReceiveEffect {
                request: SubscribeRequest {
                    transport: self.transport.clone(),
                    timer: self.timer.clone(),
                    config: self.config.clone(),
                    input: input.clone(),
                    cursor: Some(*cursor),
                },
            })),
            SubscribeEffectInvocation::EmitStatus { status } => Some(Box::new(EmitStatusEffect {
                bus: self.bus.clone(),
                status: status.clone(),
            })),
            SubscribeEffectInvocation::EmitMessages { messages, .. } => {
                Some(Box::new(EmitMessagesEffect {
                    bus: self.bus.clone(),
                    messages: messages.clone(),
                }))
            }
            SubscribeEffectInvocation::CancelHandshake
            | SubscribeEffectInvocation::CancelReceive => None,
        }
    }
}

struct HandshakeEffect {
    request: SubscribeRequest,
}

#[async_trait]
impl Effect<SubscribeEvent> for HandshakeEffect {
    fn id(&self) -> &'static str {
        "HANDSHAKE"
    }

    async fn run(&self) -> Vec<SubscribeEvent> {
        match self.request.execute().await {
            Ok(response) => vec![SubscribeEvent::HandshakeSuccess {
                cursor: response.cursor,
            }],
            Err(reason) => vec![SubscribeEvent::HandshakeFailure { reason }],
        }
    }
}

struct ReceiveEffect {
    request: SubscribeRequest,
}

#[async_trait]
impl Effect<SubscribeEvent> for ReceiveEffect {
    fn id(&self) -> &'static str {
        "RECEIVE"
    }

    async fn run(&self) -> Vec<SubscribeEvent> {
        match self.request.execute().await {
            Ok(response) => {
                trace!(
                    cursor = %response.cursor,
                    messages = response.messages.len(),
                    "received"
                );
                vec![SubscribeEvent::ReceiveSuccess {
                    cursor: response.cursor,
                    messages: response.messages,
                }]
            }
            Err(reason) => vec![SubscribeEvent::ReceiveFailure { reason }],
        }
    }
}

struct EmitStatusEffect {
    bus: UpdateBus,
    status: ConnectionStatus,
}

#[async_trait]
impl Effect<SubscribeEvent> for EmitStatusEffect {
    fn id(&self) -> &'static str {
        "EMIT_STATUS"
    }

    fn execution_mode(&self) -> ExecutionMode {
        ExecutionMode::Inline
    }

    async fn run(&self) -> Vec<SubscribeEvent> {
        self.bus.emit(ClientUpdate::Status(self.status.clone()));
        Vec::new()
    }
}

struct EmitMessagesEffect {
    bus: UpdateBus,
    messages: Vec<SubscribeMessage>,
}

#[async_trait]
impl Effect<SubscribeEvent> for EmitMessagesEffect {
    fn id(&self) -> &'static str {
        "EMIT_MESSAGES"
    }

    fn execution_mode(&self) -> ExecutionMode {
        ExecutionMode::Inline
    }

    async fn run(&self) -> Vec<SubscribeEvent> {
        for message in &self.messages {
            self.bus.emit_message(message.clone());
        }
        Vec::new()
    }
}
