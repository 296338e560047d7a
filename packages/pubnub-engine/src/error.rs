//! Structured error types for transport, server, and engine failures.
//!
//! `PubNubError` is carried inside states and events, so it is `Clone` and
//! `PartialEq` and holds only owned strings.
//!
//! # Classification
//!
//! - **Transport** errors come from the connection itself (connectivity,
//!   timeout, cancellation, malformed request).
//! - **Api** errors come from a non-2xx response and carry a reason derived
//!   from the status code and the server message.
//!
//! [`PubNubError::is_retryable`] decides whether a failure is worth another
//! attempt. Leave failures are never surfaced at all.
//!
//! # Example
//!
//! ```ignore
//! match client.subscribe_state() {
//!     SubscribeState::HandshakeFailed { reason, .. } => match reason {
//!         PubNubError::Api { reason: ErrorReason::Forbidden, .. } => refresh_token(),
//!         err if err.is_retryable() => client.reconnect(None)?,
//!         err => eprintln!("giving up: {}", err),
//!     },
//!     _ => {}
//! }
//! ```

use std::fmt;

use serde::Deserialize;
use thiserror::Error;

// =============================================================================
// Transport Errors
// =============================================================================

/// Category of a transport-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Unable to reach the origin (DNS, refused connection, reset).
    Connectivity,
    /// The request did not complete in time.
    Timeout,
    /// The request was cancelled before completion.
    Cancelled,
    /// The request could not be built or sent.
    Malformed,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportErrorKind::Connectivity => write!(f, "connectivity"),
            TransportErrorKind::Timeout => write!(f, "timeout"),
            TransportErrorKind::Cancelled => write!(f, "cancelled"),
            TransportErrorKind::Malformed => write!(f, "malformed_request"),
        }
    }
}

/// Failure reported by a [`Transport`](crate::Transport) implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("transport {kind} error: {details}")]
pub struct TransportError {
    /// Failure category.
    pub kind: TransportErrorKind,
    /// Human-readable details.
    pub details: String,
}

impl TransportError {
    /// Create a transport error.
    pub fn new(kind: TransportErrorKind, details: impl Into<String>) -> Self {
        Self {
            kind,
            details: details.into(),
        }
    }

    /// Connectivity failure.
    pub fn connectivity(details: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Connectivity, details)
    }

    /// Timeout.
    pub fn timeout(details: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, details)
    }

    /// Cancellation.
    pub fn cancelled(details: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Cancelled, details)
    }

    /// Malformed request.
    pub fn malformed(details: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Malformed, details)
    }
}

// =============================================================================
// Endpoint Errors
// =============================================================================

/// Reason derived from a non-2xx response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorReason {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    RequestTooLong,
    RateLimited,
    ServerError,
    Unknown,
}

impl ErrorReason {
    /// Derive a reason from an HTTP status code.
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => ErrorReason::BadRequest,
            401 => ErrorReason::Unauthorized,
            403 => ErrorReason::Forbidden,
            404 => ErrorReason::NotFound,
            414 => ErrorReason::RequestTooLong,
            429 => ErrorReason::RateLimited,
            500..=599 => ErrorReason::ServerError,
            _ => ErrorReason::Unknown,
        }
    }

    /// Whether a request failing for this reason may succeed if repeated.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorReason::RateLimited | ErrorReason::ServerError)
    }
}

impl fmt::Display for ErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorReason::BadRequest => write!(f, "bad_request"),
            ErrorReason::Unauthorized => write!(f, "unauthorized"),
            ErrorReason::Forbidden => write!(f, "forbidden"),
            ErrorReason::NotFound => write!(f, "not_found"),
            ErrorReason::RequestTooLong => write!(f, "request_too_long"),
            ErrorReason::RateLimited => write!(f, "rate_limited"),
            ErrorReason::ServerError => write!(f, "server_error"),
            ErrorReason::Unknown => write!(f, "unknown"),
        }
    }
}

/// Error body returned by the service for failed calls.
///
/// Both `{"status":403,"message":"Forbidden","error":true}` and
/// `{"error":{"message":"..."}}` shapes occur in the wild.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

impl ErrorBody {
    fn into_message(self) -> Option<String> {
        self.message.or(self.error_message).or_else(|| match self.error {
            Some(serde_json::Value::Object(map)) => map
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string),
            _ => None,
        })
    }
}

// =============================================================================
// PubNub Error
// =============================================================================

/// Error surfaced by effects and carried in states and events.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PubNubError {
    /// The request never produced a response.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The service answered with a non-2xx status.
    #[error("request failed with status {status} ({reason}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Reason derived from status code.
        reason: ErrorReason,
        /// Message reported by the service.
        message: String,
    },

    /// A 2xx response body could not be decoded.
    #[error("unable to decode response: {details}")]
    Deserialization {
        /// Decoder message.
        details: String,
    },

    /// The effect that would have produced a result was cancelled.
    #[error("effect was cancelled")]
    EffectCanceled,
}

impl PubNubError {
    /// Build an endpoint error from a failed response.
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        let message = serde_json::from_slice::<ErrorBody>(body)
            .ok()
            .and_then(ErrorBody::into_message)
            .unwrap_or_else(|| {
                let text = String::from_utf8_lossy(body).trim().to_string();
                if text.is_empty() {
                    format!("HTTP {}", status)
                } else {
                    text
                }
            });

        PubNubError::Api {
            status,
            reason: ErrorReason::from_status(status),
            message,
        }
    }

    /// Whether repeating the failed request may succeed.
    ///
    /// Connectivity problems, timeouts, rate limiting, and server errors are
    /// retryable. Client errors, malformed requests, decoding failures, and
    /// cancellation are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            PubNubError::Transport(err) => matches!(
                err.kind,
                TransportErrorKind::Connectivity | TransportErrorKind::Timeout
            ),
            PubNubError::Api { reason, .. } => reason.is_retryable(),
            PubNubError::Deserialization { .. } | PubNubError::EffectCanceled => false,
        }
    }

    /// Whether this error reports a cancelled request.
    pub fn is_cancellation(&self) -> bool {
        match self {
            PubNubError::Transport(err) => err.kind == TransportErrorKind::Cancelled,
            PubNubError::EffectCanceled => true,
            _ => false,
        }
    }
}

// =============================================================================
// Engine Error
// =============================================================================

/// Error returned by engine handle operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EngineError {
    /// `dispose()` was called; the engine accepts no further events.
    #[error("event engine has been disposed")]
    Disposed,

    /// The engine loop is no longer running.
    #[error("event engine loop is not running")]
    Closed,
}
