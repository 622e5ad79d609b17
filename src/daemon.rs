//! Daemon - the main joke meter service
//!
//! Wires the Twitch chat connection and the Helix poller to one live aggregator and runs both
//! until interrupted.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::aggregator::LiveAggregator;
use crate::channels::{Channel, ChatMessage, TwitchChannel};
use crate::db::{self, DbPool};
use crate::integrations::HelixClient;
use crate::lifecycle::LifecycleController;
use crate::store::SqliteStore;
use crate::{Config, Error, Result};

/// The joke meter daemon
pub struct Daemon {
    config: Config,
    db: DbPool,
}

impl Daemon {
    /// Create a new daemon instance
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is incomplete or the database cannot be opened
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let db_path = config.db_path();
        let db = db::init(&db_path)?;

        tracing::info!(path = %db_path.display(), "database initialized");

        Ok(Self { config, db })
    }

    fn helix_client(&self) -> Result<HelixClient> {
        let helix = &self.config.helix;
        let twitch = &self.config.twitch;
        match (&helix.client_id, &helix.access_token, &twitch.user_login, &twitch.user_id) {
            (Some(client_id), Some(token), Some(login), Some(user_id)) => Ok(HelixClient::new(
                helix.base_url.clone(),
                client_id.clone(),
                token.clone(),
                login.clone(),
                user_id.clone(),
            )),
            _ => Err(Error::Config("Helix credentials not configured".to_string())),
        }
    }

    /// Run the daemon until interrupted
    ///
    /// # Errors
    ///
    /// Returns error if the chat connection cannot be established, or if it is lost for good
    /// while running
    pub async fn run(self) -> Result<()> {
        let store = Arc::new(SqliteStore::new(self.db.clone()));
        let aggregator = Arc::new(LiveAggregator::new(store));
        let controller =
            LifecycleController::new(Arc::new(self.helix_client()?), Arc::clone(&aggregator));

        let (mut chat, rx) = TwitchChannel::with_receiver(self.config.chat()?);
        chat.connect().await?;

        // Set up shutdown signal
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let shutdown_tx = Arc::new(shutdown_tx);

        let chat_lost = Arc::new(AtomicBool::new(false));
        let chat_task = spawn_chat_handler(
            rx,
            Arc::clone(&aggregator),
            Arc::clone(&shutdown_tx),
            Arc::clone(&chat_lost),
        );

        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutdown requested");
                let _ = shutdown_tx.send(true);
            }
        });

        tracing::info!(
            channel = chat.name(),
            poll_secs = self.config.poll_interval.as_secs(),
            "daemon running"
        );

        controller.run(self.config.poll_interval, shutdown_rx).await;

        let lost = chat_lost.load(Ordering::SeqCst);
        chat_task.abort();
        if let Err(e) = chat.disconnect().await {
            tracing::warn!(error = %e, "failed to disconnect chat");
        }

        if let Some(session_id) = aggregator.session_id().await {
            tracing::info!(
                session_id = %session_id,
                buffered = aggregator.buffered().await,
                "stopping with a live session attached"
            );
        }

        if lost {
            return Err(Error::Channel("Twitch chat connection lost".to_string()));
        }

        tracing::info!("daemon stopped");
        Ok(())
    }
}

/// Spawn the chat handler
///
/// The receiver only closes once the chat reader has given up, so its end marks the chat as
/// lost and stops the daemon.
fn spawn_chat_handler(
    rx: mpsc::Receiver<ChatMessage>,
    aggregator: Arc<LiveAggregator>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    chat_lost: Arc<AtomicBool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        handle_chat_messages(rx, aggregator).await;
        tracing::error!("Twitch chat connection lost, shutting down");
        chat_lost.store(true, Ordering::SeqCst);
        let _ = shutdown_tx.send(true);
    })
}

/// Feed chat messages into the aggregator until the channel closes
async fn handle_chat_messages(
    mut rx: mpsc::Receiver<ChatMessage>,
    aggregator: Arc<LiveAggregator>,
) {
    let mut recorded: u64 = 0;

    while let Some(msg) = rx.recv().await {
        tracing::trace!(channel = %msg.channel, sender = %msg.sender_name, "chat message");
        if aggregator.on_event(&msg.content, msg.meta()).await.is_recorded() {
            recorded += 1;
        }
    }

    tracing::info!(recorded, "chat stream closed");
}
