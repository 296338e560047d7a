use anyhow::{bail, Context, Result};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

use crate::retry::RequestRetryPolicy;

/// Lowest presence timeout the service accepts, in seconds.
pub const MINIMUM_PRESENCE_TIMEOUT: u64 = 20;

const DEFAULT_ORIGIN: &str = "ps.pndsn.com";
const DEFAULT_PRESENCE_TIMEOUT: u64 = 300;

/// Client configuration.
///
/// Read-only once an engine has been built from it; effect handlers hold an
/// `Arc` snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct PubNubConfig {
    pub subscribe_key: String,
    pub publish_key: Option<String>,
    pub user_id: String,
    /// Host name, without scheme.
    pub origin: String,
    pub secure: bool,
    /// Seconds between heartbeats. `0` disables the periodic heartbeat.
    pub heartbeat_interval: u64,
    /// Seconds after which the service considers the user gone.
    pub presence_timeout: u64,
    pub suppress_leave_events: bool,
    pub retry_policy: RequestRetryPolicy,
    pub subscribe_request_timeout: Duration,
    pub non_subscribe_request_timeout: Duration,
}

impl PubNubConfig {
    /// Create a configuration with defaults for everything but the keys.
    pub fn new(subscribe_key: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            subscribe_key: subscribe_key.into(),
            publish_key: None,
            user_id: user_id.into(),
            origin: DEFAULT_ORIGIN.to_string(),
            secure: true,
            heartbeat_interval: 0,
            presence_timeout: DEFAULT_PRESENCE_TIMEOUT,
            suppress_leave_events: false,
            retry_policy: RequestRetryPolicy::None,
            subscribe_request_timeout: Duration::from_secs(310),
            non_subscribe_request_timeout: Duration::from_secs(10),
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Self::from_vars(|key| env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let subscribe_key =
            var("PUBNUB_SUBSCRIBE_KEY").context("PUBNUB_SUBSCRIBE_KEY must be set")?;
        let user_id = var("PUBNUB_USER_ID").context("PUBNUB_USER_ID must be set")?;

        let mut config = Self::new(subscribe_key, user_id);
        config.publish_key = var("PUBNUB_PUBLISH_KEY");

        if let Some(origin) = var("PUBNUB_ORIGIN") {
            config.origin = origin;
        }
        if let Some(interval) = var("PUBNUB_HEARTBEAT_INTERVAL") {
            config.heartbeat_interval = interval
                .parse()
                .context("PUBNUB_HEARTBEAT_INTERVAL must be a number of seconds")?;
        }
        if let Some(timeout) = var("PUBNUB_PRESENCE_TIMEOUT") {
            config.presence_timeout = timeout
                .parse()
                .context("PUBNUB_PRESENCE_TIMEOUT must be a number of seconds")?;
        }
        if let Some(suppress) = var("PUBNUB_SUPPRESS_LEAVE_EVENTS") {
            config.suppress_leave_events = suppress
                .parse()
                .context("PUBNUB_SUPPRESS_LEAVE_EVENTS must be true or false")?;
        }

        let max_retries = var("PUBNUB_MAX_RETRIES")
            .map(|value| {
                value
                    .parse::<u32>()
                    .context("PUBNUB_MAX_RETRIES must be a valid number")
            })
            .transpose()?;
        if let Some(policy) = var("PUBNUB_RETRY_POLICY") {
            config.retry_policy = parse_retry_policy(&policy, max_retries)?;
        }

        config.validate()
    }

    /// Reject unusable settings and clamp the presence timeout.
    pub fn validate(mut self) -> Result<Self> {
        if self.subscribe_key.trim().is_empty() {
            bail!("subscribe key must not be empty");
        }
        if self.user_id.trim().is_empty() {
            bail!("user id must not be empty");
        }
        if self.origin.trim().is_empty() {
            bail!("origin must not be empty");
        }
        self.presence_timeout = self.presence_timeout.max(MINIMUM_PRESENCE_TIMEOUT);
        Ok(self)
    }

    pub fn with_publish_key(mut self, publish_key: impl Into<String>) -> Self {
        self.publish_key = Some(publish_key.into());
        self
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn with_heartbeat_interval(mut self, seconds: u64) -> Self {
        self.heartbeat_interval = seconds;
        self
    }

    /// Set the presence timeout, clamped to [`MINIMUM_PRESENCE_TIMEOUT`].
    pub fn with_presence_timeout(mut self, seconds: u64) -> Self {
        self.presence_timeout = seconds.max(MINIMUM_PRESENCE_TIMEOUT);
        self
    }

    pub fn with_suppress_leave_events(mut self, suppress: bool) -> Self {
        self.suppress_leave_events = suppress;
        self
    }

    pub fn with_retry_policy(mut self, policy: RequestRetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn with_subscribe_request_timeout(mut self, timeout: Duration) -> Self {
        self.subscribe_request_timeout = timeout;
        self
    }

    pub fn with_non_subscribe_request_timeout(mut self, timeout: Duration) -> Self {
        self.non_subscribe_request_timeout = timeout;
        self
    }

    /// Base URL requests are sent to.
    pub fn origin_url(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{}://{}", scheme, self.origin)
    }
}

fn parse_retry_policy(name: &str, max_retries: Option<u32>) -> Result<RequestRetryPolicy> {
    let mut policy = match name.trim().to_ascii_lowercase().as_str() {
        "" | "none" => return Ok(RequestRetryPolicy::None),
        "linear" => RequestRetryPolicy::default_linear(),
        "exponential" => RequestRetryPolicy::default_exponential(),
        other => bail!(
            "PUBNUB_RETRY_POLICY must be one of none, linear, exponential (got {:?})",
            other
        ),
    };

    if let Some(limit) = max_retries {
        match &mut policy {
            RequestRetryPolicy::Linear { max_retry, .. }
            | RequestRetryPolicy::Exponential { max_retry, .. } => *max_retry = limit,
            RequestRetryPolicy::None => {}
        }
    }
    Ok(policy)
}
