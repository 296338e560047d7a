//! Connection status reported to listeners.

use std::fmt;

use crate::error::PubNubError;

/// Connection status of the subscribe loop or the presence heartbeat.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionStatus {
    /// Requests are succeeding.
    Connected,

    /// A failed request is being retried.
    Reconnecting,

    /// Stopped on request (disconnect or unsubscribe).
    Disconnected,

    /// An established connection was lost.
    DisconnectedUnexpectedly(PubNubError),

    /// The connection could not be established, or retries were exhausted.
    ConnectionError(PubNubError),

    /// The set of channels and groups changed while connected.
    SubscriptionChanged {
        channels: Vec<String>,
        groups: Vec<String>,
    },
}

impl ConnectionStatus {
    /// Whether the status describes a live connection.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ConnectionStatus::Connected | ConnectionStatus::SubscriptionChanged { .. }
        )
    }

    /// Error carried by failure statuses.
    pub fn error(&self) -> Option<&PubNubError> {
        match self {
            ConnectionStatus::DisconnectedUnexpectedly(err)
            | ConnectionStatus::ConnectionError(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Connected => write!(f, "connected"),
            ConnectionStatus::Reconnecting => write!(f, "reconnecting"),
            ConnectionStatus::Disconnected => write!(f, "disconnected"),
            ConnectionStatus::DisconnectedUnexpectedly(err) => {
                write!(f, "disconnected unexpectedly: {}", err)
            }
            ConnectionStatus::ConnectionError(err) => write!(f, "connection error: {}", err),
            ConnectionStatus::SubscriptionChanged { channels, groups } => write!(
                f,
                "subscription changed (channels: [{}], groups: [{}])",
                channels.join(", "),
                groups.join(", ")
            ),
        }
    }
}
