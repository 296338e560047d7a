//! # PubNub Engine
//!
//! Event-driven presence and subscribe engines for a PubNub client, where
//! pure transitions decide and cancellable effects execute.
//!
//! ## Core Concepts
//!
//! Each engine separates **decisions** from **IO**:
//! - [`State`] = Where the engine is (immutable snapshot)
//! - [`Event`] = What happened (user intent or an effect outcome)
//! - [`EffectInvocation`] = What should run next, or be cancelled
//!
//! A [`Transition`] maps `(state, event)` to the next state plus an ordered
//! list of invocations. It performs no IO and is deterministic.
//!
//! ## Architecture
//!
//! ```text
//! PubNubClient
//!     │
//!     ├─► SubscribeManager ─► Engine<SubscribeTransition>
//!     │                           │
//!     │                           ├─► Handshake / Receive (long-poll)
//!     │                           └─► EmitStatus / EmitMessages ─┐
//!     │                                                          │
//!     ├─► PresenceManager ──► Engine<PresenceTransition>         │
//!     │                           │                              │
//!     │                           └─► Heartbeat / Leave / Wait   │
//!     │                                                          ▼
//!     └─► updates() ◄────────────────────────────────────── UpdateBus
//! ```
//!
//! ## Key Invariants
//!
//! 1. **Transitions are pure** - No IO, no async, same input gives same output
//! 2. **One writer** - Only the engine loop replaces the current state
//! 3. **Serial processing** - Events are handled one at a time in FIFO order
//! 4. **Cancelled means silent** - A cancelled effect never feeds an event back
//! 5. **One per kind** - Starting a managed effect cancels the previous one
//!
//! ## Example
//!
//! ```ignore
//! use pubnub_engine::{PubNubClient, PubNubConfig, ReqwestTransport};
//! use std::sync::Arc;
//!
//! let config = PubNubConfig::from_env()?;
//! let transport = Arc::new(ReqwestTransport::new(&config)?);
//! let client = PubNubClient::new(config, transport)?;
//!
//! let mut updates = client.updates();
//! client.subscribe(["chat"], Vec::<String>::new(), true).await?;
//!
//! while let Ok(update) = updates.recv().await {
//!     println!("{:?}", update);
//! }
//! ```

// Core modules
mod core;
mod dispatch;
mod effect;
mod engine;
mod error;
mod machine;

// Service interfaces
mod retry;
mod timer;
mod transport;

mod bus;
mod client;
mod config;
mod http;
mod status;

// Engine instantiations
pub mod presence;
pub mod subscribe;

// Testing utilities (feature-gated)
#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Stress tests (test-only)
#[cfg(test)]
mod stress_tests;

// Re-export core traits
pub use crate::core::{
    cancel_precedes_start, Dispatch, EffectInvocation, EffectKind, Event, Invocations, State,
    TransitionResult,
};

// Re-export engine types
pub use dispatch::EffectId;
pub use effect::{Effect, EffectHandler, ExecutionMode};
pub use engine::{Engine, EngineHandle};
pub use machine::Transition;

// Re-export error types
pub use crate::error::{EngineError, ErrorReason, PubNubError, TransportError, TransportErrorKind};

// Re-export service interfaces
pub use retry::RequestRetryPolicy;
pub use timer::{Timer, TokioTimer};
pub use transport::{Transport, TransportMethod, TransportRequest, TransportResponse};

// Re-export client types
pub use bus::{ClientUpdate, UpdateBus};
pub use client::PubNubClient;
pub use config::{PubNubConfig, MINIMUM_PRESENCE_TIMEOUT};
pub use http::ReqwestTransport;
pub use status::ConnectionStatus;

// Re-export commonly used external types
pub use async_trait::async_trait;
