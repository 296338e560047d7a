//! Subscribe loop.
//!
//! A handshake obtains the initial cursor, then long-poll receives follow
//! one after another, each resuming from the cursor the previous one
//! returned. Received messages and connection status changes are published
//! on the [`UpdateBus`](crate::bus::UpdateBus).
//!
//! ```text
//!                changed              success
//! Unsubscribed ──────────► Handshaking ────────► Receiving ◄─┐
//!                             │  ▲                 │   │     │ success
//!                      failure│  │reconnect        │   └─────┘
//!                             ▼  │          failure│
//!                       HandshakeFailed            ▼
//!                                            ReceiveFailed
//! ```
//!
//! `disconnect` parks the loop in `HandshakeStopped` or `ReceiveStopped`
//! with the cursor kept, so `reconnect` catches up on anything published
//! meanwhile.

mod cursor;
mod effects;
mod event;
mod input;
mod invocation;
mod manager;
mod message;
mod request;
mod state;
mod transition;

pub use cursor::SubscriptionCursor;
pub use effects::SubscribeEffectHandler;
pub use event::SubscribeEvent;
pub use input::SubscribeInput;
pub use invocation::{SubscribeEffectInvocation, SubscribeEffectKind};
pub use manager::SubscribeManager;
pub use message::{MessageKind, SubscribeMessage, PRESENCE_SUFFIX};
pub use state::SubscribeState;
pub use transition::SubscribeTransition;
