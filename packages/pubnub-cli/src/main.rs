//! Command-line subscriber.
//!
//! Subscribes to the given channels and groups and prints status changes,
//! messages and presence events until interrupted.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use pubnub_engine::subscribe::SubscriptionCursor;
use pubnub_engine::{ClientUpdate, PubNubClient, PubNubConfig, ReqwestTransport};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "pubnub")]
#[command(about = "Subscribe to PubNub channels and print what arrives")]
struct Cli {
    /// Channels to subscribe to
    #[arg(short, long, value_delimiter = ',')]
    channels: Vec<String>,

    /// Channel groups to subscribe to
    #[arg(short, long, value_delimiter = ',')]
    groups: Vec<String>,

    /// Also receive presence events (joins, leaves, timeouts)
    #[arg(long)]
    presence: bool,

    /// Resume from this timetoken instead of "now"
    #[arg(long)]
    timetoken: Option<u64>,

    /// Seconds between presence heartbeats (overrides PUBNUB_HEARTBEAT_INTERVAL)
    #[arg(long)]
    heartbeat_interval: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,pubnub_engine=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    if cli.channels.is_empty() && cli.groups.is_empty() {
        bail!("Nothing to subscribe to: pass --channels and/or --groups");
    }

    // Load configuration
    let mut config = PubNubConfig::from_env().context("Failed to load configuration")?;
    if let Some(interval) = cli.heartbeat_interval {
        config = config.with_heartbeat_interval(interval);
    }
    tracing::info!(origin = %config.origin, user_id = %config.user_id, "Configuration loaded");

    let transport = ReqwestTransport::new(&config).context("Failed to create transport")?;
    let client =
        PubNubClient::new(config, Arc::new(transport)).context("Failed to start client")?;
    let mut updates = client.updates();

    match cli.timetoken {
        Some(timetoken) => {
            client
                .subscribe_with_cursor(
                    cli.channels,
                    cli.groups,
                    cli.presence,
                    SubscriptionCursor::new(timetoken, 0),
                )
                .await?
        }
        None => {
            client
                .subscribe(cli.channels, cli.groups, cli.presence)
                .await?
        }
    }
    tracing::info!("Subscribed, press Ctrl-C to stop");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, unsubscribing");
                break;
            }
            update = updates.recv() => match update {
                Ok(update) => print_update(&update),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Output fell behind, updates dropped");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    client.unsubscribe_all().await?;
    client.shutdown().await;
    Ok(())
}

fn print_update(update: &ClientUpdate) {
    match update {
        ClientUpdate::Status(status) => println!("[status] {}", status),
        ClientUpdate::PresenceStatus(status) => println!("[heartbeat] {}", status),
        ClientUpdate::Message(message) => println!(
            "[{}] {} {}",
            message.published,
            message.channel,
            message.payload
        ),
        ClientUpdate::Presence(event) => {
            println!("[presence] {} {}", event.channel, event.payload)
        }
    }
}
