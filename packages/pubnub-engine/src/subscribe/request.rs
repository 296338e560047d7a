//! Long-poll subscribe call with in-place retry.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::PubNubConfig;
use crate::error::PubNubError;
use crate::timer::Timer;
use crate::transport::{execute, names_segment, Transport, TransportRequest};

use super::cursor::SubscriptionCursor;
use super::input::SubscribeInput;
use super::message::SubscribeResponse;

/// One subscribe call: a handshake when `cursor` is `None`, a receive
/// otherwise.
///
/// Retryable failures are retried according to the configured policy before
/// the outcome is reported. Cancellation is dropping the future, which also
/// drops any pending retry delay.
pub(crate) struct SubscribeRequest {
    pub transport: Arc<dyn Transport>,
    pub timer: Arc<dyn Timer>,
    pub config: Arc<PubNubConfig>,
    pub input: SubscribeInput,
    pub cursor: Option<SubscriptionCursor>,
}

impl SubscribeRequest {
    pub(crate) fn request(&self) -> TransportRequest {
        let channels = names_segment(&self.input.channel_names());
        let groups = self.input.group_names();
        let cursor = self.cursor.unwrap_or_default();

        TransportRequest::get(
            [
                "v2",
                "subscribe",
                self.config.subscribe_key.as_str(),
                channels.as_str(),
                "0",
            ],
            self.config.subscribe_request_timeout,
        )
        .with_query("tt", cursor.timetoken.to_string())
        .with_optional_query("tr", (cursor.region != 0).then(|| cursor.region.to_string()))
        .with_optional_query(
            "channel-group",
            (!groups.is_empty()).then(|| groups.join(",")),
        )
        .with_optional_query(
            "heartbeat",
            (self.config.heartbeat_interval > 0).then(|| self.config.presence_timeout.to_string()),
        )
        .with_query("uuid", self.config.user_id.clone())
    }

    pub(crate) async fn execute(&self) -> Result<SubscribeResponse, PubNubError> {
        let policy = &self.config.retry_policy;
        let mut attempt = 0;

        loop {
            let outcome = match execute(self.transport.as_ref(), self.request()).await {
                Ok(response) => SubscribeResponse::parse(&response.body),
                Err(err) => Err(err),
            };

            let err = match outcome {
                Ok(response) => return Ok(response),
                Err(err) => err,
            };

            if err.is_cancellation() || !policy.should_retry(attempt, &err, None) {
                return Err(err);
            }

            let delay = policy.delay(attempt);
            warn!(attempt, ?delay, error = %err, "subscribe request failed, retrying");
            self.timer.sleep(delay).await;
            attempt += 1;
            debug!(attempt, "retrying subscribe request");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::retry::RequestRetryPolicy;
    use crate::testing::{MockTransport, RecordingTimer};
    use serde_json::json;
    use std::time::Duration;

    fn request(
        config: PubNubConfig,
        cursor: Option<SubscriptionCursor>,
    ) -> (SubscribeRequest, Arc<MockTransport>, Arc<RecordingTimer>) {
        let transport = Arc::new(MockTransport::new());
        let timer = Arc::new(RecordingTimer::new());
        let request = SubscribeRequest {
            transport: transport.clone(),
            timer: timer.clone(),
            config: Arc::new(config),
            input: SubscribeInput::new(["a", "b"], ["g"], true),
            cursor,
        };
        (request, transport, timer)
    }

    fn linear(max_retry: u32) -> PubNubConfig {
        PubNubConfig::new("sub-key", "user-1").with_retry_policy(RequestRetryPolicy::Linear {
            delay: Duration::from_secs(2),
            max_retry,
        })
    }

    #[test]
    fn test_handshake_request_shape() {
        let (request, _, _) = request(PubNubConfig::new("sub-key", "user-1"), None);
        let built = request.request();

        assert_eq!(
            built.path_string(),
            "/v2/subscribe/sub-key/a,a-pnpres,b,b-pnpres/0"
        );
        assert_eq!(built.query.get("tt").map(String::as_str), Some("0"));
        assert!(!built.query.contains_key("tr"));
        assert!(!built.query.contains_key("heartbeat"));
        assert_eq!(built.query.get("channel-group").map(String::as_str), Some("g,g-pnpres"));
        assert_eq!(built.timeout, Duration::from_secs(310));
    }

    #[test]
    fn test_receive_request_carries_cursor_and_heartbeat() {
        let config = PubNubConfig::new("sub-key", "user-1").with_heartbeat_interval(60);
        let (request, _, _) = request(config, Some(SubscriptionCursor::new(1234, 7)));
        let built = request.request();

        assert_eq!(built.query.get("tt").map(String::as_str), Some("1234"));
        assert_eq!(built.query.get("tr").map(String::as_str), Some("7"));
        assert_eq!(built.query.get("heartbeat").map(String::as_str), Some("300"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_retryable_failures() {
        let (request, transport, timer) = request(linear(3), None);
        transport
            .push_error(TransportError::connectivity("reset"))
            .push_response(503, "")
            .push_json(200, json!({"t": {"t": "42", "r": 1}, "m": []}));

        let response = request.execute().await.unwrap();
        assert_eq!(response.cursor, SubscriptionCursor::new(42, 1));
        assert_eq!(transport.request_count(), 3);
        assert_eq!(timer.delays(), vec![Duration::from_secs(2); 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_at_retry_limit() {
        let (request, transport, _) = request(linear(1), None);
        transport.set_fallback(Err(TransportError::timeout("slow")));

        let err = request.execute().await.unwrap_err();
        assert_eq!(err, PubNubError::from(TransportError::timeout("slow")));
        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test]
    async fn test_non_retryable_failure_is_returned_once() {
        let (request, transport, timer) = request(linear(5), None);
        transport.push_json(403, json!({"message": "Forbidden"}));

        let err = request.execute().await.unwrap_err();
        assert!(!err.is_retryable());
        assert_eq!(transport.request_count(), 1);
        assert!(timer.delays().is_empty());
    }

    #[tokio::test]
    async fn test_cancellation_is_not_retried() {
        let (request, transport, _) = request(linear(5), None);
        transport.push_error(TransportError::cancelled("aborted"));

        assert!(request.execute().await.unwrap_err().is_cancellation());
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_malformed_body_is_reported() {
        let (request, transport, _) = request(linear(5), None);
        transport.push_response(200, "not json");

        match request.execute().await {
            Err(PubNubError::Deserialization { .. }) => {}
            other => panic!("Expected deserialization error, got {:?}", other.map(|r| r.cursor)),
        }
    }
}
