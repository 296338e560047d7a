//! Transport interface consumed by effects.
//!
//! Effects build a [`TransportRequest`] and hand it to a [`Transport`]. The
//! transport owns encoding and connection handling; the engine only cares
//! about the status code and body of the response.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tracing::trace;

use crate::error::{PubNubError, TransportError};

/// HTTP method of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMethod {
    Get,
    Post,
}

/// A request described independently of any HTTP library.
///
/// Path segments and query values are stored unencoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportRequest {
    /// Request method.
    pub method: TransportMethod,
    /// Unencoded path segments, e.g. `["v2", "presence", "sub-key", ...]`.
    pub path: Vec<String>,
    /// Unencoded query parameters.
    pub query: BTreeMap<String, String>,
    /// Optional request body.
    pub body: Option<Vec<u8>>,
    /// Time after which the transport should give up.
    pub timeout: Duration,
}

impl TransportRequest {
    /// Create a `GET` request for the given path segments.
    pub fn get<S: Into<String>>(path: impl IntoIterator<Item = S>, timeout: Duration) -> Self {
        Self {
            method: TransportMethod::Get,
            path: path.into_iter().map(Into::into).collect(),
            query: BTreeMap::new(),
            body: None,
            timeout,
        }
    }

    /// Add a query parameter.
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Add a query parameter when a value is present.
    pub fn with_optional_query(self, key: impl Into<String>, value: Option<String>) -> Self {
        match value {
            Some(value) => self.with_query(key, value),
            None => self,
        }
    }

    /// Slash-joined, unencoded path.
    pub fn path_string(&self) -> String {
        format!("/{}", self.path.join("/"))
    }
}

impl fmt::Display for TransportRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {}", self.method, self.path_string())
    }
}

/// Raw response returned by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: Vec<u8>,
}

impl TransportResponse {
    /// Create a response.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Executes requests against the service.
///
/// Implementations must be cancel-safe: effects drop the returned future when
/// they are cancelled.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Send a request and wait for the response.
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

/// Send a request and turn non-2xx responses into [`PubNubError::Api`].
pub(crate) async fn execute(
    transport: &dyn Transport,
    request: TransportRequest,
) -> Result<TransportResponse, PubNubError> {
    trace!(request = %request, "sending request");
    let response = transport.send(request).await?;
    if response.is_success() {
        Ok(response)
    } else {
        Err(PubNubError::from_response(response.status, &response.body))
    }
}

/// Encode a list of names as a single path segment.
///
/// The service expects `,` when the list is empty.
pub(crate) fn names_segment(names: &[String]) -> String {
    if names.is_empty() {
        ",".to_string()
    } else {
        names.join(",")
    }
}
