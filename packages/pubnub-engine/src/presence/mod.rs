//! Presence heartbeat loop.
//!
//! Announces the user on the channels and groups they are subscribed to,
//! cools down between heartbeats, retries failures with the configured
//! policy, and gives up once retries are exhausted.
//!
//! ```text
//!             joined                success
//! Inactive ──────────► Heartbeating ────────► Cooldown
//!                        │     ▲    ◄──────── (times up)
//!                 failure│     │success
//!                        ▼     │
//!                     Reconnecting ──give up──► Failed
//! ```
//!
//! `disconnect` parks any live state in `Stopped`; `reconnect` resumes
//! heartbeating from `Stopped` or `Failed`.

mod effects;
mod event;
mod input;
mod invocation;
mod manager;
mod state;
mod transition;

pub use effects::PresenceEffectHandler;
pub use event::PresenceEvent;
pub use input::PresenceInput;
pub use invocation::{PresenceEffectInvocation, PresenceEffectKind};
pub use manager::PresenceManager;
pub use state::PresenceState;
pub use transition::PresenceTransition;
