//! Broadcast bus delivering updates to listeners.
//!
//! # Guarantees
//!
//! - **At-most-once delivery**: Slow receivers may miss updates
//! - **In-memory only**: Updates are not persisted
//! - **No replay**: Lagged receivers get `RecvError::Lagged`

use tokio::sync::broadcast;

use crate::status::ConnectionStatus;
use crate::subscribe::SubscribeMessage;

/// Default channel capacity for the update bus.
const DEFAULT_CAPACITY: usize = 1024;

/// Something a listener may want to know about.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientUpdate {
    /// Subscribe loop connection status.
    Status(ConnectionStatus),
    /// Presence heartbeat connection status.
    PresenceStatus(ConnectionStatus),
    /// A message, signal, or other non-presence payload.
    Message(SubscribeMessage),
    /// An event received on a `-pnpres` channel.
    Presence(SubscribeMessage),
}

/// Broadcast channel shared by the engines and the client.
///
/// # Example
///
/// ```ignore
/// let bus = UpdateBus::new();
/// let mut updates = bus.subscribe();
///
/// bus.emit(ClientUpdate::Status(ConnectionStatus::Connected));
///
/// match updates.recv().await? {
///     ClientUpdate::Status(status) => println!("status: {}", status),
///     _ => {}
/// }
/// ```
#[derive(Clone)]
pub struct UpdateBus {
    sender: broadcast::Sender<ClientUpdate>,
}

impl UpdateBus {
    /// Create a new bus with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a new bus with the specified capacity.
    ///
    /// The capacity determines how many updates can be buffered before
    /// slow receivers start lagging.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Send an update to all subscribers (fire-and-forget).
    ///
    /// Returns the number of receivers that received the update.
    pub fn emit(&self, update: ClientUpdate) -> usize {
        self.sender.send(update).unwrap_or(0)
    }

    /// Route a received message to `Message` or `Presence`.
    pub fn emit_message(&self, message: SubscribeMessage) -> usize {
        if message.is_presence() {
            self.emit(ClientUpdate::Presence(message))
        } else {
            self.emit(ClientUpdate::Message(message))
        }
    }

    /// Subscribe to updates emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientUpdate> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for UpdateBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for UpdateBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}
