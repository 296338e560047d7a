//! Stress tests for the engine under concurrent submissions and racing
//! cancellations.

#[cfg(test)]
mod stress_tests {
    use crate::bus::UpdateBus;
    use crate::client::PubNubClient;
    use crate::config::PubNubConfig;
    use crate::error::{EngineError, TransportError};
    use crate::presence::{PresenceEffectKind, PresenceInput, PresenceManager, PresenceState};
    use crate::subscribe::{SubscribeEffectKind, SubscribeInput, SubscribeManager, SubscribeState};
    use crate::testing::{MockTransport, RecordingTimer};
    use crate::timer::TokioTimer;
    use crate::transport::{Transport, TransportRequest, TransportResponse};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    // ==========================================================================
    // Test Transports
    // ==========================================================================

    /// Answers after a random delay so completions race with cancellations.
    struct JitterTransport {
        max_delay_ms: u64,
        sent: AtomicUsize,
    }

    impl JitterTransport {
        fn new(max_delay_ms: u64) -> Self {
            Self {
                max_delay_ms,
                sent: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Transport for JitterTransport {
        async fn send(
            &self,
            request: TransportRequest,
        ) -> Result<TransportResponse, TransportError> {
            self.sent.fetch_add(1, Ordering::SeqCst);
            let delay = fastrand::u64(1..=self.max_delay_ms);
            tokio::time::sleep(Duration::from_millis(delay)).await;

            if request.path[1] == "presence" {
                return Ok(TransportResponse::new(200, r#"{"status":200}"#));
            }
            if fastrand::u8(0..10) == 0 {
                return Err(TransportError::connectivity("jitter"));
            }
            let timetoken = fastrand::u64(1..u64::MAX / 2).to_string();
            let body = json!({"t": {"t": timetoken, "r": 1}, "m": []});
            Ok(TransportResponse::new(200, body.to_string()))
        }
    }

    /// Presence calls succeed, handshakes return a cursor, long-polls idle.
    struct IdleTransport;

    #[async_trait]
    impl Transport for IdleTransport {
        async fn send(
            &self,
            request: TransportRequest,
        ) -> Result<TransportResponse, TransportError> {
            tokio::task::yield_now().await;
            if request.path[1] == "presence" {
                return Ok(TransportResponse::new(200, r#"{"status":200}"#));
            }
            if request.query.get("tt").map(String::as_str) == Some("0") {
                let body = json!({"t": {"t": "100", "r": 1}, "m": []});
                return Ok(TransportResponse::new(200, body.to_string()));
            }
            std::future::pending().await
        }
    }

    fn ok_transport() -> Arc<MockTransport> {
        let transport = Arc::new(MockTransport::new());
        transport.set_fallback(Ok(TransportResponse::new(200, r#"{"status":200}"#)));
        transport
    }

    // ==========================================================================
    // TEST: Concurrent joins and leaves converge
    // ==========================================================================
    //
    // Each task joins its own channel and leaves it again when even. However
    // the submissions interleave, the final input holds exactly the odd
    // channels.

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_joins_and_leaves_converge() {
        let manager = PresenceManager::new(
            Arc::new(PubNubConfig::new("sub", "user")),
            ok_transport(),
            Arc::new(TokioTimer),
        );
        let tasks = 200;
        let mut handles = vec![];

        for i in 0..tasks {
            let manager = manager.clone();
            handles.push(tokio::spawn(async move {
                let channel = format!("ch-{}", i);
                manager
                    .announce_join([channel.clone()], Vec::<String>::new())
                    .await
                    .unwrap();
                tokio::task::yield_now().await;
                if i % 2 == 0 {
                    manager
                        .announce_left([channel], Vec::<String>::new())
                        .await
                        .unwrap();
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let expected = PresenceInput::from_channels(
            (0..tasks).filter(|i| i % 2 == 1).map(|i| format!("ch-{}", i)),
        );
        assert_eq!(manager.state().input(), Some(&expected));

        let active = manager.engine().active_effects().await.unwrap();
        let waits = active
            .iter()
            .filter(|kind| **kind == PresenceEffectKind::Wait)
            .count();
        assert!(waits <= 1, "managed effect ran twice: {:?}", active);
    }

    // ==========================================================================
    // TEST: Rapid subscription changes leave exactly one long-poll
    // ==========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_rapid_subscription_changes_keep_single_receive() {
        let transport = Arc::new(MockTransport::new());
        transport.push_json(200, json!({"t": {"t": "1", "r": 1}, "m": []}));
        let manager = SubscribeManager::new(
            Arc::new(PubNubConfig::new("sub", "user")),
            transport.clone(),
            Arc::new(RecordingTimer::new()),
            UpdateBus::new(),
        );

        manager
            .subscribe(SubscribeInput::new(["base"], Vec::<String>::new(), false), None)
            .await
            .unwrap();
        transport.wait_for_requests(2).await;

        let changes = 300;
        for _ in 0..changes {
            let name = format!("ch-{}", fastrand::u16(..));
            let input = SubscribeInput::new([name.clone()], Vec::<String>::new(), fastrand::bool());
            manager.subscribe(input, None).await.unwrap();
            if fastrand::u8(0..4) == 0 {
                manager.unsubscribe(vec![name], vec![]).await.unwrap();
            }
        }

        assert!(matches!(manager.state(), SubscribeState::Receiving { .. }));
        assert!(manager.state().input().is_some_and(|input| input.contains_channel("base")));
        assert_eq!(
            manager.engine().active_effects().await.unwrap(),
            vec![SubscribeEffectKind::Receive]
        );
    }

    // ==========================================================================
    // TEST: Completions racing with disconnect/reconnect
    // ==========================================================================
    //
    // Responses arrive at random times while the loop is toggled. Whatever
    // order things happen in, a final disconnect must leave nothing running.

    #[tokio::test(start_paused = true)]
    async fn test_toggling_while_requests_complete() {
        let transport = Arc::new(JitterTransport::new(40));
        let config = Arc::new(PubNubConfig::new("sub", "user").with_heartbeat_interval(1));
        let subscribe = SubscribeManager::new(
            config.clone(),
            transport.clone(),
            Arc::new(TokioTimer),
            UpdateBus::new(),
        );
        let presence = PresenceManager::new(config, transport.clone(), Arc::new(TokioTimer));

        subscribe
            .subscribe(SubscribeInput::new(["a", "b"], ["g"], true), None)
            .await
            .unwrap();
        presence.announce_join(["a", "b"], ["g"]).await.unwrap();

        for _ in 0..200 {
            tokio::time::sleep(Duration::from_millis(fastrand::u64(0..30))).await;
            match fastrand::u8(0..3) {
                0 => {
                    subscribe.disconnect().await.unwrap();
                    presence.disconnect().await.unwrap();
                }
                1 => {
                    subscribe.reconnect(None).await.unwrap();
                    presence.reconnect().await.unwrap();
                }
                _ => {
                    let channel = format!("c{}", fastrand::u8(0..5));
                    let input = SubscribeInput::new([channel], Vec::<String>::new(), false);
                    subscribe.subscribe(input, None).await.unwrap();
                }
            }
        }

        subscribe.reconnect(None).await.unwrap();
        presence.reconnect().await.unwrap();
        subscribe.disconnect().await.unwrap();
        presence.disconnect().await.unwrap();
        // let in-flight leave calls finish
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert!(subscribe.engine().active_effects().await.unwrap().is_empty());
        assert!(presence.engine().active_effects().await.unwrap().is_empty());
        assert!(matches!(presence.state(), PresenceState::Stopped { .. }));
        assert!(matches!(
            subscribe.state(),
            SubscribeState::HandshakeStopped { .. } | SubscribeState::ReceiveStopped { .. }
        ));
        assert!(transport.sent.load(Ordering::SeqCst) > 0);
    }

    // ==========================================================================
    // TEST: Client operations keep both engines in step
    // ==========================================================================
    //
    // Tasks subscribe and unsubscribe overlapping channel sets through the
    // facade. Whatever the interleaving, the presence engine ends up
    // heartbeating exactly the channels the subscribe engine is subscribed to.

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_client_operations_keep_engines_in_step() {
        let client = Arc::new(
            PubNubClient::new(
                PubNubConfig::new("sub", "user").with_heartbeat_interval(1),
                Arc::new(IdleTransport),
            )
            .unwrap(),
        );
        let mut handles = vec![];

        for i in 0..100 {
            let client = client.clone();
            handles.push(tokio::spawn(async move {
                let channel = format!("ch-{}", i % 10);
                client
                    .subscribe([channel.clone()], Vec::<String>::new(), i % 3 == 0)
                    .await
                    .unwrap();
                tokio::task::yield_now().await;
                if fastrand::bool() {
                    client
                        .unsubscribe([channel], Vec::<String>::new())
                        .await
                        .unwrap();
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let mut subscribed = client.subscription().channels();
        subscribed.sort();
        let mut heartbeated = client
            .presence_state()
            .input()
            .map(|input| input.channels())
            .unwrap_or_default();
        heartbeated.sort();
        assert_eq!(subscribed, heartbeated);

        client.unsubscribe_all().await.unwrap();
        client.shutdown().await;
        assert_eq!(client.presence_state(), PresenceState::Inactive);
        assert_eq!(client.subscribe_state(), SubscribeState::Unsubscribed);
    }

    // ==========================================================================
    // TEST: Dispose while submitters are still running
    // ==========================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_dispose_under_load() {
        let manager = PresenceManager::new(
            Arc::new(PubNubConfig::new("sub", "user")),
            ok_transport(),
            Arc::new(TokioTimer),
        );
        let accepted = Arc::new(AtomicUsize::new(0));
        let rejected = Arc::new(AtomicUsize::new(0));
        let mut handles = vec![];

        for i in 0..100 {
            let manager = manager.clone();
            let accepted = accepted.clone();
            let rejected = rejected.clone();
            handles.push(tokio::spawn(async move {
                for j in 0..20 {
                    let channel = format!("ch-{}-{}", i, j);
                    match manager.announce_join([channel], Vec::<String>::new()).await {
                        Ok(()) => accepted.fetch_add(1, Ordering::SeqCst),
                        Err(EngineError::Disposed) => rejected.fetch_add(1, Ordering::SeqCst),
                        Err(other) => panic!("unexpected error {:?}", other),
                    };
                }
            }));
        }

        tokio::time::sleep(Duration::from_millis(5)).await;
        manager.dispose();

        for h in handles {
            h.await.unwrap();
        }

        assert_eq!(
            accepted.load(Ordering::SeqCst) + rejected.load(Ordering::SeqCst),
            2000
        );
        assert!(manager.engine().is_disposed());
        assert_eq!(
            manager.announce_left_all().await,
            Err(EngineError::Disposed)
        );
    }
}
