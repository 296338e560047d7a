//! Presence effects: heartbeat, leave, cooldown wait, delayed heartbeat.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, trace, warn};

use crate::config::PubNubConfig;
use crate::effect::{Effect, EffectHandler};
use crate::error::PubNubError;
use crate::retry::heartbeat_retry_delay;
use crate::timer::Timer;
use crate::transport::{execute, names_segment, Transport, TransportRequest};

use super::event::PresenceEvent;
use super::input::PresenceInput;
use super::invocation::PresenceEffectInvocation;

/// Builds presence effects from a read-only dependency snapshot.
pub struct PresenceEffectHandler {
    transport: Arc<dyn Transport>,
    timer: Arc<dyn Timer>,
    config: Arc<PubNubConfig>,
}

impl PresenceEffectHandler {
    pub fn new(
        transport: Arc<dyn Transport>,
        timer: Arc<dyn Timer>,
        config: Arc<PubNubConfig>,
    ) -> Self {
        Self {
            transport,
            timer,
            config,
        }
    }
}

impl EffectHandler<PresenceEffectInvocation, PresenceEvent> for PresenceEffectHandler {
    fn create(
        &self,
        invocation: &PresenceEffectInvocation,
    ) -> Option<Box<dyn Effect<PresenceEvent>>> {
        match invocation {
            PresenceEffectInvocation::Heartbeat { input } => Some(Box::new(HeartbeatEffect {
                transport: self.transport.clone(),
                config: self.config.clone(),
                input: input.clone(),
            })),
            PresenceEffectInvocation::Leave { input } => {
                if self.config.suppress_leave_events {
                    trace!("leave events suppressed");
                    return None;
                }
                Some(Box::new(LeaveEffect {
                    transport: self.transport.clone(),
                    config: self.config.clone(),
                    input: input.clone(),
                }))
            }
            PresenceEffectInvocation::Wait { .. } => Some(Box::new(WaitEffect {
                timer: self.timer.clone(),
                interval: Duration::from_secs(self.config.heartbeat_interval),
            })),
            PresenceEffectInvocation::DelayedHeartbeat {
                input,
                attempt,
                reason,
            } => Some(Box::new(DelayedHeartbeatEffect {
                heartbeat: HeartbeatEffect {
                    transport: self.transport.clone(),
                    config: self.config.clone(),
                    input: input.clone(),
                },
                timer: self.timer.clone(),
                attempt: *attempt,
                reason: reason.clone(),
            })),
            PresenceEffectInvocation::CancelWait
            | PresenceEffectInvocation::CancelDelayedHeartbeat => None,
        }
    }
}

// =============================================================================
// Requests
// =============================================================================

fn presence_request(config: &PubNubConfig, input: &PresenceInput, action: &str) -> TransportRequest {
    let channels = names_segment(&input.channels());
    let groups = input.groups();

    TransportRequest::get(
        [
            "v2",
            "presence",
            "sub-key",
            config.subscribe_key.as_str(),
            "channel",
            channels.as_str(),
            action,
        ],
        config.non_subscribe_request_timeout,
    )
    .with_optional_query(
        "channel-group",
        (!groups.is_empty()).then(|| groups.join(",")),
    )
    .with_query("uuid", config.user_id.clone())
}

pub(crate) fn heartbeat_request(config: &PubNubConfig, input: &PresenceInput) -> TransportRequest {
    presence_request(config, input, "heartbeat")
        .with_query("heartbeat", config.presence_timeout.to_string())
}

pub(crate) fn leave_request(config: &PubNubConfig, input: &PresenceInput) -> TransportRequest {
    presence_request(config, input, "leave")
}

// =============================================================================
// Effects
// =============================================================================

struct HeartbeatEffect {
    transport: Arc<dyn Transport>,
    config: Arc<PubNubConfig>,
    input: PresenceInput,
}

impl HeartbeatEffect {
    async fn heartbeat(&self) -> Vec<PresenceEvent> {
        let request = heartbeat_request(&self.config, &self.input);
        match execute(self.transport.as_ref(), request).await {
            Ok(_) => {
                trace!(channels = ?self.input.channels(), "heartbeat succeeded");
                vec![PresenceEvent::HeartbeatSuccess]
            }
            Err(reason) => {
                warn!(error = %reason, "heartbeat failed");
                vec![PresenceEvent::HeartbeatFailure { reason }]
            }
        }
    }
}

#[async_trait]
impl Effect<PresenceEvent> for HeartbeatEffect {
    fn id(&self) -> &'static str {
        "HEARTBEAT"
    }

    async fn run(&self) -> Vec<PresenceEvent> {
        self.heartbeat().await
    }
}

/// Best-effort leave. Failures are logged and never reported.
struct LeaveEffect {
    transport: Arc<dyn Transport>,
    config: Arc<PubNubConfig>,
    input: PresenceInput,
}

#[async_trait]
impl Effect<PresenceEvent> for LeaveEffect {
    fn id(&self) -> &'static str {
        "LEAVE"
    }

    fn finish_on_shutdown(&self) -> bool {
        true
    }

    async fn run(&self) -> Vec<PresenceEvent> {
        let request = leave_request(&self.config, &self.input);
        if let Err(err) = execute(self.transport.as_ref(), request).await {
            debug!(error = %err, "leave failed");
        }
        Vec::new()
    }
}

struct WaitEffect {
    timer: Arc<dyn Timer>,
    interval: Duration,
}

#[async_trait]
impl Effect<PresenceEvent> for WaitEffect {
    fn id(&self) -> &'static str {
        "WAIT"
    }

    async fn run(&self) -> Vec<PresenceEvent> {
        // Zero interval disables the periodic heartbeat.
        if self.interval.is_zero() {
            return Vec::new();
        }
        self.timer.sleep(self.interval).await;
        vec![PresenceEvent::TimesUp]
    }
}

struct DelayedHeartbeatEffect {
    heartbeat: HeartbeatEffect,
    timer: Arc<dyn Timer>,
    attempt: u32,
    reason: PubNubError,
}

#[async_trait]
impl Effect<PresenceEvent> for DelayedHeartbeatEffect {
    fn id(&self) -> &'static str {
        "DELAYED_HEARTBEAT"
    }

    async fn run(&self) -> Vec<PresenceEvent> {
        let config = &self.heartbeat.config;
        if !config
            .retry_policy
            .should_retry(self.attempt, &self.reason, None)
        {
            warn!(attempt = self.attempt, error = %self.reason, "giving up on heartbeat");
            return vec![PresenceEvent::HeartbeatGiveUp {
                reason: self.reason.clone(),
            }];
        }

        let delay = heartbeat_retry_delay(&config.retry_policy, config.presence_timeout, self.attempt);
        debug!(attempt = self.attempt, ?delay, "retrying heartbeat");
        if !delay.is_zero() {
            self.timer.sleep(delay).await;
        }
        self.heartbeat.heartbeat().await
    }
}
