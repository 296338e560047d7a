//! Client facade wiring the presence and subscribe engines together.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::info;

use crate::bus::{ClientUpdate, UpdateBus};
use crate::config::PubNubConfig;
use crate::error::EngineError;
use crate::presence::{PresenceManager, PresenceState};
use crate::status::ConnectionStatus;
use crate::subscribe::{SubscribeInput, SubscribeManager, SubscribeState, SubscriptionCursor};
use crate::timer::{Timer, TokioTimer};
use crate::transport::Transport;

/// Entry point for applications.
///
/// Owns one subscribe engine and one presence engine sharing a transport
/// and configuration. Everything the engines report is published on a
/// single broadcast bus, see [`PubNubClient::updates`].
///
/// Operations touching both engines run one at a time, so concurrent calls
/// reach the two engines in the same order.
///
/// # Example
///
/// ```ignore
/// let config = PubNubConfig::from_env()?;
/// let client = PubNubClient::new(config, Arc::new(ReqwestTransport::new(&config)?))?;
/// let mut updates = client.updates();
///
/// client.subscribe(["chat"], Vec::<String>::new(), true).await?;
///
/// while let Ok(update) = updates.recv().await {
///     println!("{:?}", update);
/// }
/// ```
pub struct PubNubClient {
    config: Arc<PubNubConfig>,
    bus: UpdateBus,
    subscribe: SubscribeManager,
    presence: PresenceManager,
    forwarder: JoinHandle<()>,
    operation: Mutex<()>,
}

impl PubNubClient {
    /// Validate `config` and start both engines on the tokio timer.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: PubNubConfig, transport: Arc<dyn Transport>) -> anyhow::Result<Self> {
        Self::with_timer(config, transport, Arc::new(TokioTimer))
    }

    /// Like [`PubNubClient::new`] with a custom timer.
    pub fn with_timer(
        config: PubNubConfig,
        transport: Arc<dyn Transport>,
        timer: Arc<dyn Timer>,
    ) -> anyhow::Result<Self> {
        let config = Arc::new(config.validate()?);
        let bus = UpdateBus::new();

        let subscribe = SubscribeManager::new(
            config.clone(),
            transport.clone(),
            timer.clone(),
            bus.clone(),
        );
        let presence = PresenceManager::new(config.clone(), transport, timer);

        let statuses = presence.status_updates();
        let presence_bus = bus.clone();
        let forwarder = tokio::spawn(async move {
            let mut statuses = Box::pin(statuses);
            while let Some(status) = statuses.next().await {
                presence_bus.emit(ClientUpdate::PresenceStatus(status));
            }
        });

        info!(
            user_id = %config.user_id,
            origin = %config.origin,
            heartbeat_interval = config.heartbeat_interval,
            "client started"
        );

        Ok(Self {
            config,
            bus,
            subscribe,
            presence,
            forwarder,
            operation: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &PubNubConfig {
        &self.config
    }

    /// Subscribe to channels and groups.
    ///
    /// With `with_presence` set, presence events for the names are delivered
    /// as [`ClientUpdate::Presence`]. The names are also announced to the
    /// presence heartbeat.
    pub async fn subscribe<C, G>(
        &self,
        channels: impl IntoIterator<Item = C>,
        groups: impl IntoIterator<Item = G>,
        with_presence: bool,
    ) -> Result<(), EngineError>
    where
        C: Into<String>,
        G: Into<String>,
    {
        self.subscribe_input(SubscribeInput::new(channels, groups, with_presence), None)
            .await
    }

    /// Subscribe and resume delivery from `cursor`.
    pub async fn subscribe_with_cursor<C, G>(
        &self,
        channels: impl IntoIterator<Item = C>,
        groups: impl IntoIterator<Item = G>,
        with_presence: bool,
        cursor: SubscriptionCursor,
    ) -> Result<(), EngineError>
    where
        C: Into<String>,
        G: Into<String>,
    {
        self.subscribe_input(
            SubscribeInput::new(channels, groups, with_presence),
            Some(cursor),
        )
        .await
    }

    async fn subscribe_input(
        &self,
        input: SubscribeInput,
        cursor: Option<SubscriptionCursor>,
    ) -> Result<(), EngineError> {
        let joined = input.presence_input();
        let _operation = self.operation.lock().await;
        self.subscribe.subscribe(input, cursor).await?;
        self.presence
            .announce_join(joined.channels(), joined.groups())
            .await
    }

    /// Unsubscribe from channels and groups.
    ///
    /// Passing `{name}-pnpres` only stops presence events for `name`.
    pub async fn unsubscribe<C, G>(
        &self,
        channels: impl IntoIterator<Item = C>,
        groups: impl IntoIterator<Item = G>,
    ) -> Result<(), EngineError>
    where
        C: Into<String>,
        G: Into<String>,
    {
        let channels: Vec<String> = channels.into_iter().map(Into::into).collect();
        let groups: Vec<String> = groups.into_iter().map(Into::into).collect();

        let _operation = self.operation.lock().await;
        self.subscribe
            .unsubscribe(channels.clone(), groups.clone())
            .await?;
        self.presence.announce_left(channels, groups).await
    }

    pub async fn unsubscribe_all(&self) -> Result<(), EngineError> {
        let _operation = self.operation.lock().await;
        self.subscribe.unsubscribe_all().await?;
        self.presence.announce_left_all().await
    }

    /// Pause both engines, keeping the subscription and cursor.
    pub async fn disconnect(&self) -> Result<(), EngineError> {
        let _operation = self.operation.lock().await;
        self.subscribe.disconnect().await?;
        self.presence.disconnect().await
    }

    /// Resume after `disconnect` or a failure, optionally from `cursor`.
    pub async fn reconnect(&self, cursor: Option<SubscriptionCursor>) -> Result<(), EngineError> {
        let _operation = self.operation.lock().await;
        self.subscribe.reconnect(cursor).await?;
        self.presence.reconnect().await
    }

    /// New receiver of status changes, messages and presence events.
    ///
    /// Only updates published after this call are received.
    pub fn updates(&self) -> broadcast::Receiver<ClientUpdate> {
        self.bus.subscribe()
    }

    /// Status of the subscribe loop.
    pub fn connection_status(&self) -> ConnectionStatus {
        self.subscribe.state().connection_status()
    }

    /// Channels and groups currently requested.
    pub fn subscription(&self) -> SubscribeInput {
        self.subscribe.input()
    }

    pub fn subscribe_state(&self) -> SubscribeState {
        self.subscribe.state()
    }

    pub fn presence_state(&self) -> PresenceState {
        self.presence.state()
    }

    /// Stop both engines, cancelling every in-flight request.
    ///
    /// No leave is announced. Leave calls already started by earlier
    /// operations still run to completion in the background.
    pub fn dispose(&self) {
        self.forwarder.abort();
        self.subscribe.dispose();
        self.presence.dispose();
    }

    /// Stop both engines once pending operations are done, waiting for
    /// started leave calls to complete.
    ///
    /// ```ignore
    /// client.unsubscribe_all().await?;
    /// client.shutdown().await;
    /// ```
    pub async fn shutdown(&self) {
        let _operation = self.operation.lock().await;
        self.forwarder.abort();
        self.subscribe.dispose();
        self.presence.shutdown().await;
        info!("client stopped");
    }
}

impl Drop for PubNubClient {
    fn drop(&mut self) {
        self.forwarder.abort();
    }
}

impl std::fmt::Debug for PubNubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PubNubClient")
            .field("user_id", &self.config.user_id)
            .field("subscribe", &self.subscribe.state())
            .field("presence", &self.presence.state())
            .finish()
    }
}
