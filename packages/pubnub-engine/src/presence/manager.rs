use std::sync::Arc;

use futures::Stream;
use tokio::sync::watch;

use crate::config::PubNubConfig;
use crate::engine::{Engine, EngineHandle};
use crate::error::EngineError;
use crate::status::ConnectionStatus;
use crate::timer::Timer;
use crate::transport::Transport;

use super::effects::PresenceEffectHandler;
use super::event::PresenceEvent;
use super::input::PresenceInput;
use super::state::PresenceState;
use super::transition::PresenceTransition;

/// Caller-facing wrapper around the presence engine.
///
/// Every method resolves once the resulting transition has been applied.
#[derive(Debug, Clone)]
pub struct PresenceManager {
    engine: EngineHandle<PresenceTransition>,
}

impl PresenceManager {
    /// Build and start a presence engine.
    pub fn new(
        config: Arc<PubNubConfig>,
        transport: Arc<dyn Transport>,
        timer: Arc<dyn Timer>,
    ) -> Self {
        let handler = PresenceEffectHandler::new(transport, timer, config);
        let engine = Engine::new("presence", PresenceTransition, handler, PresenceState::Inactive);
        Self {
            engine: engine.start(),
        }
    }

    pub async fn announce_join<C, G>(
        &self,
        channels: impl IntoIterator<Item = C>,
        groups: impl IntoIterator<Item = G>,
    ) -> Result<(), EngineError>
    where
        C: Into<String>,
        G: Into<String>,
    {
        let input = PresenceInput::new(channels, groups);
        self.engine
            .submit_and_wait(PresenceEvent::Joined { input })
            .await
    }

    pub async fn announce_left<C, G>(
        &self,
        channels: impl IntoIterator<Item = C>,
        groups: impl IntoIterator<Item = G>,
    ) -> Result<(), EngineError>
    where
        C: Into<String>,
        G: Into<String>,
    {
        let input = PresenceInput::new(channels, groups);
        self.engine.submit_and_wait(PresenceEvent::Left { input }).await
    }

    pub async fn announce_left_all(&self) -> Result<(), EngineError> {
        self.engine.submit_and_wait(PresenceEvent::LeftAll).await
    }

    pub async fn disconnect(&self) -> Result<(), EngineError> {
        self.engine.submit_and_wait(PresenceEvent::Disconnect).await
    }

    pub async fn reconnect(&self) -> Result<(), EngineError> {
        self.engine.submit_and_wait(PresenceEvent::Reconnect).await
    }

    pub fn state(&self) -> PresenceState {
        self.engine.current_state()
    }

    /// Connection status changes, consecutive duplicates removed.
    ///
    /// Only the latest state is observed: transient states passed through
    /// between two polls are skipped.
    pub fn status_updates(&self) -> impl Stream<Item = ConnectionStatus> + Send + 'static {
        let receiver = self.engine.watch_state();
        let last = receiver.borrow().connection_status();
        status_stream(receiver, last)
    }

    /// Underlying engine handle.
    pub fn engine(&self) -> &EngineHandle<PresenceTransition> {
        &self.engine
    }

    pub fn dispose(&self) {
        self.engine.dispose();
    }

    /// Stop the engine, letting leave calls already started complete.
    pub async fn shutdown(&self) {
        self.engine.shutdown().await;
    }
}

fn status_stream(
    receiver: watch::Receiver<PresenceState>,
    last: ConnectionStatus,
) -> impl Stream<Item = ConnectionStatus> + Send + 'static {
    futures::stream::unfold((receiver, last), |(mut receiver, mut last)| async move {
        loop {
            receiver.changed().await.ok()?;
            let status = receiver.borrow_and_update().connection_status();
            if status != last {
                last = status.clone();
                return Some((status, (receiver, last)));
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PubNubError, TransportError};
    use crate::presence::PresenceEffectKind;
    use crate::retry::RequestRetryPolicy;
    use crate::testing::{MockTransport, RecordingTimer};
    use crate::transport::TransportResponse;
    use futures::StreamExt;
    use std::time::Duration;

    fn manager(config: PubNubConfig) -> (PresenceManager, Arc<MockTransport>, Arc<RecordingTimer>) {
        let transport = Arc::new(MockTransport::new());
        let timer = Arc::new(RecordingTimer::new());
        let manager = PresenceManager::new(Arc::new(config), transport.clone(), timer.clone());
        (manager, transport, timer)
    }

    fn ok() -> Result<TransportResponse, TransportError> {
        Ok(TransportResponse::new(200, r#"{"status":200,"message":"OK"}"#))
    }

    fn action(transport: &MockTransport, index: usize) -> String {
        transport.requests()[index].path.last().cloned().unwrap_or_default()
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_loop_repeats_after_interval() {
        let (manager, transport, timer) =
            manager(PubNubConfig::new("sub", "user").with_heartbeat_interval(30));
        transport.set_fallback(ok());

        manager.announce_join(["c1"], ["g1"]).await.unwrap();
        transport.wait_for_requests(1).await;

        let mut states = manager.engine().watch_state();
        states
            .wait_for(|s| matches!(s, PresenceState::Cooldown { .. }))
            .await
            .unwrap();

        transport.wait_for_requests(3).await;
        assert_eq!(action(&transport, 2), "heartbeat");
        assert!(timer.delays().iter().all(|d| *d == Duration::from_secs(30)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_retry_then_give_up() {
        let (manager, transport, timer) = manager(
            PubNubConfig::new("sub", "user").with_retry_policy(RequestRetryPolicy::Linear {
                delay: Duration::from_secs(3),
                max_retry: 2,
            }),
        );
        for _ in 0..3 {
            transport.push_error(TransportError::timeout("slow"));
        }

        manager.announce_join(["c1"], Vec::<String>::new()).await.unwrap();

        let mut states = manager.engine().watch_state();
        let failed = states
            .wait_for(|s| matches!(s, PresenceState::Failed { .. }))
            .await
            .unwrap()
            .clone();

        assert_eq!(
            failed,
            PresenceState::Failed {
                input: PresenceInput::from_channels(["c1"]),
                reason: PubNubError::from(TransportError::timeout("slow")),
            }
        );
        // initial call, immediate retry, one delayed retry
        assert_eq!(transport.request_count(), 3);
        assert_eq!(timer.delays(), vec![Duration::from_secs(3)]);

        // recovery is manual
        transport.set_fallback(ok());
        manager.reconnect().await.unwrap();
        states
            .wait_for(|s| matches!(s, PresenceState::Cooldown { .. }))
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_sends_leave_and_cancels_wait() {
        let (manager, transport, _) =
            manager(PubNubConfig::new("sub", "user").with_heartbeat_interval(60));
        transport.set_fallback(ok());

        manager.announce_join(["c1"], Vec::<String>::new()).await.unwrap();
        let mut states = manager.engine().watch_state();
        states
            .wait_for(|s| matches!(s, PresenceState::Cooldown { .. }))
            .await
            .unwrap();
        assert_eq!(
            manager.engine().active_effects().await.unwrap(),
            vec![PresenceEffectKind::Wait]
        );

        manager.disconnect().await.unwrap();
        transport.wait_for_requests(2).await;
        assert_eq!(action(&transport, 1), "leave");
        assert!(matches!(manager.state(), PresenceState::Stopped { .. }));

        // no more heartbeats once stopped
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_left_all_announces_leave_for_everything() {
        let (manager, transport, _) = manager(PubNubConfig::new("sub", "user"));
        transport.set_fallback(ok());

        manager.announce_join(["c1", "c2"], ["g1"]).await.unwrap();
        manager.announce_left_all().await.unwrap();
        assert_eq!(manager.state(), PresenceState::Inactive);

        transport.wait_for_requests(2).await;
        let leave = transport
            .requests()
            .into_iter()
            .find(|r| r.path.last().map(String::as_str) == Some("leave"))
            .unwrap();
        assert_eq!(leave.path[5], "c1,c2");
        assert_eq!(leave.query.get("channel-group").map(String::as_str), Some("g1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_updates_are_deduplicated() {
        let (manager, transport, _) = manager(PubNubConfig::new("sub", "user"));
        transport.set_fallback(ok());
        let mut updates = Box::pin(manager.status_updates());

        manager.announce_join(["c1"], Vec::<String>::new()).await.unwrap();
        assert_eq!(updates.next().await, Some(ConnectionStatus::Connected));

        manager.disconnect().await.unwrap();
        assert_eq!(updates.next().await, Some(ConnectionStatus::Disconnected));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_cancellation_ends_in_failed() {
        let (manager, transport, timer) = manager(
            PubNubConfig::new("sub", "user").with_retry_policy(RequestRetryPolicy::Linear {
                delay: Duration::from_secs(3),
                max_retry: 2,
            }),
        );
        transport.push_error(TransportError::cancelled("aborted by proxy"));

        manager.announce_join(["c1"], Vec::<String>::new()).await.unwrap();

        let mut states = manager.engine().watch_state();
        let failed = states
            .wait_for(|s| matches!(s, PresenceState::Failed { .. }))
            .await
            .unwrap()
            .clone();
        assert_eq!(
            failed,
            PresenceState::Failed {
                input: PresenceInput::from_channels(["c1"]),
                reason: PubNubError::from(TransportError::cancelled("aborted by proxy")),
            }
        );
        assert_eq!(transport.request_count(), 1);
        assert!(timer.delays().is_empty());
        assert!(manager.engine().active_effects().await.unwrap().is_empty());
    }

    async fn joined_then_left(manager: &PresenceManager, transport: &MockTransport) {
        transport.set_fallback(ok());
        transport.set_latency(Duration::from_millis(20));

        manager.announce_join(["c1"], Vec::<String>::new()).await.unwrap();
        let mut states = manager.engine().watch_state();
        states
            .wait_for(|s| matches!(s, PresenceState::Cooldown { .. }))
            .await
            .unwrap();
        assert_eq!(transport.answered_count(), 1);

        manager.announce_left_all().await.unwrap();
        transport.wait_for_requests(2).await;
        assert_eq!(action(transport, 1), "leave");
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_waits_for_leave() {
        let (manager, transport, _) = manager(PubNubConfig::new("sub", "user"));
        joined_then_left(&manager, &transport).await;

        manager.shutdown().await;
        assert_eq!(transport.answered_count(), 2);
        assert!(manager.engine().is_disposed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_does_not_abort_leave() {
        let (manager, transport, _) = manager(PubNubConfig::new("sub", "user"));
        joined_then_left(&manager, &transport).await;

        manager.dispose();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(transport.answered_count(), 2);
    }

    #[tokio::test]
    async fn test_disposed_manager_rejects_calls() {
        let (manager, _, _) = manager(PubNubConfig::new("sub", "user"));
        manager.dispose();
        assert_eq!(manager.reconnect().await, Err(EngineError::Disposed));
    }
}
