//! `reqwest`-backed transport.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::PubNubConfig;
use crate::error::TransportError;
use crate::transport::{Transport, TransportMethod, TransportRequest, TransportResponse};

const USER_AGENT: &str = concat!("pubnub-engine/", env!("CARGO_PKG_VERSION"));

/// Sends requests to the configured origin over HTTP(S).
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http_client: Client,
    base_url: Url,
}

impl ReqwestTransport {
    /// Create a transport for `config.origin_url()`.
    pub fn new(config: &PubNubConfig) -> Result<Self> {
        let base_url = Url::parse(&config.origin_url())
            .with_context(|| format!("Invalid origin {:?}", config.origin))?;
        let http_client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http_client,
            base_url,
        })
    }

    /// Use a preconfigured `reqwest` client (proxies, TLS settings).
    pub fn with_client(mut self, http_client: Client) -> Self {
        self.http_client = http_client;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

/// Percent-encode path segments and query values onto `base`.
fn build_url(base: &Url, request: &TransportRequest) -> Result<Url, TransportError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| TransportError::malformed(format!("{} cannot carry a path", base)))?
        .pop_if_empty()
        .extend(&request.path);

    {
        let mut query = url.query_pairs_mut();
        for (key, value) in &request.query {
            query.append_pair(key, value);
        }
        query.append_pair("requestid", &Uuid::new_v4().to_string());
    }
    Ok(url)
}

fn map_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::timeout(err.to_string())
    } else if err.is_builder() {
        TransportError::malformed(err.to_string())
    } else {
        TransportError::connectivity(err.to_string())
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let url = build_url(&self.base_url, &request)?;
        let start = std::time::Instant::now();

        let builder = match request.method {
            TransportMethod::Get => self.http_client.get(url),
            TransportMethod::Post => self.http_client.post(url),
        };
        let builder = match request.body {
            Some(body) => builder.body(body),
            None => builder,
        };

        let response = builder
            .timeout(request.timeout)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "request failed");
                map_error(e)
            })?;

        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(map_error)?;

        debug!(
            status,
            bytes = body.len(),
            duration_ms = start.elapsed().as_millis(),
            "response received"
        );
        Ok(TransportResponse::new(status, body.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_transport_uses_origin() {
        let transport =
            ReqwestTransport::new(&PubNubConfig::new("sub", "user").with_origin("example.com"))
                .unwrap();
        assert_eq!(transport.base_url().as_str(), "https://example.com/");

        let insecure = PubNubConfig::new("sub", "user").with_secure(false);
        assert_eq!(
            ReqwestTransport::new(&insecure).unwrap().base_url().scheme(),
            "http"
        );
    }

    #[test]
    fn test_url_encodes_segments_and_query() {
        let base = Url::parse("https://ps.pndsn.com").unwrap();
        let request = TransportRequest::get(
            ["v2", "subscribe", "sub", "room 1,news/eu", "0"],
            Duration::from_secs(1),
        )
        .with_query("uuid", "user 1");

        let url = build_url(&base, &request).unwrap();
        assert_eq!(url.path(), "/v2/subscribe/sub/room%201,news%2Feu/0");

        let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(query[0], ("uuid".to_string(), "user 1".to_string()));
        assert_eq!(query[1].0, "requestid");
        assert!(Uuid::parse_str(&query[1].1).is_ok());
    }

    #[test]
    fn test_each_request_gets_fresh_id() {
        let base = Url::parse("https://ps.pndsn.com").unwrap();
        let request = TransportRequest::get(["time", "0"], Duration::from_secs(1));

        let first = build_url(&base, &request).unwrap();
        let second = build_url(&base, &request).unwrap();
        assert_ne!(first.query(), second.query());
    }
}
