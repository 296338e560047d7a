//! Testing utilities for engines, transitions, and effects.
//!
//! # Feature Flag
//!
//! This module is only available in tests or with the `testing` feature:
//!
//! ```toml
//! [dev-dependencies]
//! pubnub-engine = { path = "../pubnub-engine", features = ["testing"] }
//! ```
//!
//! # Quick Start
//!
//! ## Using `assert_transition!` Macro
//!
//! ```ignore
//! use pubnub_engine::assert_transition;
//!
//! assert_transition!(
//!     PresenceTransition,
//!     PresenceState::Cooldown { input: input.clone() },
//!     PresenceEvent::TimesUp
//!         => PresenceState::Heartbeating { input: input.clone() },
//!            [PresenceEffectInvocation::CancelWait, PresenceEffectInvocation::Heartbeat { input }]
//! );
//! ```
//!
//! ## Scripting the Transport
//!
//! ```ignore
//! let transport = Arc::new(MockTransport::new());
//! transport.push_json(200, json!({"status": 200, "message": "OK"}));
//! transport.push_error(TransportError::timeout("slow"));
//!
//! // ... drive an engine ...
//!
//! transport.wait_for_requests(2).await;
//! assert_eq!(transport.requests()[1].path.last().map(String::as_str), Some("heartbeat"));
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::TransportError;
use crate::timer::Timer;
use crate::transport::{Transport, TransportRequest, TransportResponse};

/// Asserts the outcome of a single transition.
///
/// # Syntax
///
/// ```ignore
/// // Expect a state change and an exact, ordered invocation list
/// assert_transition!(machine, state, event => next_state, [invocation1, invocation2]);
///
/// // Expect a no-op
/// assert_transition!(machine, state, event => None);
/// ```
///
/// # Panics
///
/// Panics if the transition doesn't match the expectation.
#[macro_export]
macro_rules! assert_transition {
    ($machine:expr, $state:expr, $event:expr => None) => {{
        let state = $state;
        let event = $event;
        let actual = $crate::Transition::transition(&$machine, &state, &event);
        assert!(
            actual.is_none(),
            "Expected no-op for {:?} + {:?}\n  actual: {:?}",
            state,
            event,
            actual
        );
    }};
    ($machine:expr, $state:expr, $event:expr => $expected:expr, [$($invocation:expr),* $(,)?]) => {{
        let state = $state;
        let event = $event;
        let actual = $crate::Transition::transition(&$machine, &state, &event);
        let expected = Some($crate::TransitionResult::new($expected, [$($invocation),*]));
        assert_eq!(
            actual, expected,
            "Unexpected transition for {:?} + {:?}",
            state, event
        );
    }};
}

pub use crate::assert_transition;

type Scripted = Result<TransportResponse, TransportError>;

/// Transport replaying scripted outcomes and recording requests.
///
/// Scripted outcomes are consumed in order. Once the script runs out the
/// fallback is returned; without a fallback the call never completes, which
/// models a long-poll that is waiting for data.
#[derive(Debug)]
pub struct MockTransport {
    script: Mutex<VecDeque<Scripted>>,
    fallback: Mutex<Option<Scripted>>,
    requests: Mutex<Vec<TransportRequest>>,
    sent: watch::Sender<usize>,
    latency: Mutex<Duration>,
    answered: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Self {
        let (sent, _) = watch::channel(0);
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
            sent,
            latency: Mutex::new(Duration::ZERO),
            answered: AtomicUsize::new(0),
        }
    }

    /// Queue a raw response.
    pub fn push_response(&self, status: u16, body: impl Into<Vec<u8>>) -> &Self {
        self.push(Ok(TransportResponse::new(status, body)))
    }

    /// Queue a JSON response.
    pub fn push_json(&self, status: u16, body: serde_json::Value) -> &Self {
        self.push_response(status, body.to_string())
    }

    /// Queue a transport failure.
    pub fn push_error(&self, error: TransportError) -> &Self {
        self.push(Err(error))
    }

    fn push(&self, outcome: Scripted) -> &Self {
        self.script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push_back(outcome);
        self
    }

    /// Outcome returned once the script is exhausted.
    pub fn set_fallback(&self, outcome: Scripted) {
        *self
            .fallback
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(outcome);
    }

    /// Delay applied before every scripted or fallback outcome.
    pub fn set_latency(&self, latency: Duration) {
        *self
            .latency
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = latency;
    }

    /// Number of requests that have been answered, i.e. not cancelled or
    /// still pending.
    pub fn answered_count(&self) -> usize {
        self.answered.load(Ordering::SeqCst)
    }

    /// All requests received so far.
    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Number of requests received so far.
    pub fn request_count(&self) -> usize {
        *self.sent.borrow()
    }

    /// Wait until at least `count` requests have been received.
    pub async fn wait_for_requests(&self, count: usize) {
        let mut receiver = self.sent.subscribe();
        let _ = receiver.wait_for(|sent| *sent >= count).await;
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request);
        self.sent.send_modify(|sent| *sent += 1);

        let scripted = self
            .script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front();
        let outcome = scripted.or_else(|| {
            self.fallback
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .clone()
        });

        let Some(outcome) = outcome else {
            return std::future::pending().await;
        };

        let latency = *self
            .latency
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.answered.fetch_add(1, Ordering::SeqCst);
        outcome
    }
}

/// Timer recording every requested delay before sleeping on tokio time.
///
/// Combine with `#[tokio::test(start_paused = true)]` to make delays
/// instantaneous and deterministic.
#[derive(Debug, Default)]
pub struct RecordingTimer {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays requested so far, in order.
    pub fn delays(&self) -> Vec<Duration> {
        self.delays
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl Timer for RecordingTimer {
    async fn sleep(&self, duration: Duration) {
        self.delays
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(duration);
        tokio::time::sleep(duration).await;
    }
}
