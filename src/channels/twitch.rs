//! Twitch chat adapter
//!
//! Connects to Twitch chat over IRC-on-WebSocket (TLS by default), requests message tags (for
//! message IDs and send timestamps) and forwards every `PRIVMSG` from the joined channel.
//!
//! A dropped connection or a server `RECONNECT` is retried with a linear backoff. Once retries
//! are exhausted the reader task ends and the message receiver closes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::irc::{IrcLine, parse_line};
use super::{Channel, ChatMessage};
use crate::{Error, Result};

/// Default Twitch chat endpoint
pub const DEFAULT_URL: &str = "wss://irc-ws.chat.twitch.tv:443";

/// Reconnect attempts after the connection drops
const DEFAULT_RECONNECT_ATTEMPTS: u32 = 5;

/// Base delay between reconnect attempts, multiplied by the attempt number
const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(2);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = SplitSink<WsStream, Message>;
type WsReader = SplitStream<WsStream>;
type SharedWriter = Arc<Mutex<Option<WsWriter>>>;

/// Connection settings for Twitch chat
#[derive(Debug, Clone)]
pub struct TwitchChatConfig {
    /// Account the bot logs in as
    pub bot_username: String,
    /// OAuth token, with or without the `oauth:` prefix
    pub oauth_token: String,
    /// Channel to join, without `#`
    pub channel: String,
    /// WebSocket endpoint
    pub url: String,
    /// Reconnect attempts before giving up
    pub reconnect_attempts: u32,
    /// Base delay between reconnect attempts
    pub reconnect_delay: Duration,
}

impl TwitchChatConfig {
    /// Settings for the public Twitch chat server
    #[must_use]
    pub fn new(
        bot_username: impl Into<String>,
        oauth_token: impl Into<String>,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            bot_username: bot_username.into(),
            oauth_token: oauth_token.into(),
            channel: channel.into(),
            url: DEFAULT_URL.to_string(),
            reconnect_attempts: DEFAULT_RECONNECT_ATTEMPTS,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }

    fn pass_line(&self) -> String {
        if self.oauth_token.starts_with("oauth:") {
            format!("PASS {}", self.oauth_token)
        } else {
            format!("PASS oauth:{}", self.oauth_token)
        }
    }

    fn channel_name(&self) -> String {
        self.channel.trim_start_matches('#').to_lowercase()
    }

    fn login_lines(&self) -> [String; 4] {
        [
            "CAP REQ :twitch.tv/tags twitch.tv/commands".to_string(),
            self.pass_line(),
            format!("NICK {}", self.bot_username.to_lowercase()),
            format!("JOIN #{}", self.channel_name()),
        ]
    }
}

/// Why a connection stopped reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadEnd {
    /// Server asked us to reconnect
    Reconnect,
    /// Socket closed or errored
    Closed,
    /// Nobody is receiving messages anymore
    ConsumerGone,
}

/// Twitch chat channel adapter
pub struct TwitchChannel {
    config: TwitchChatConfig,
    writer: SharedWriter,
    reader_task: Option<JoinHandle<()>>,
    connected: Arc<AtomicBool>,
    message_tx: Option<mpsc::Sender<ChatMessage>>,
}

impl TwitchChannel {
    /// Create the adapter and the receiver its messages are delivered to
    ///
    /// The receiver closes once the connection is lost for good.
    #[must_use]
    pub fn with_receiver(config: TwitchChatConfig) -> (Self, mpsc::Receiver<ChatMessage>) {
        let (tx, rx) = mpsc::channel(100);
        let channel = Self {
            config,
            writer: Arc::new(Mutex::new(None)),
            reader_task: None,
            connected: Arc::new(AtomicBool::new(false)),
            message_tx: Some(tx),
        };
        (channel, rx)
    }
}

#[async_trait]
impl Channel for TwitchChannel {
    fn name(&self) -> &'static str {
        "twitch"
    }

    async fn connect(&mut self) -> Result<()> {
        let tx = self
            .message_tx
            .take()
            .ok_or_else(|| Error::Channel("Twitch channel already started".to_string()))?;

        let (writer, reader) = match open(&self.config).await {
            Ok(pair) => pair,
            Err(e) => {
                self.message_tx = Some(tx);
                return Err(e);
            }
        };
        *self.writer.lock().await = Some(writer);
        self.connected.store(true, Ordering::SeqCst);

        self.reader_task = Some(tokio::spawn(run_reader(
            self.config.clone(),
            reader,
            Arc::clone(&self.writer),
            tx,
            Arc::clone(&self.connected),
        )));

        tracing::info!(channel = %self.config.channel_name(), "joined Twitch chat");
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        if let Some(task) = self.reader_task.take() {
            task.abort();
        }
        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.send(Message::Close(None)).await;
        }
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// Open a WebSocket and log in
async fn open(config: &TwitchChatConfig) -> Result<(WsWriter, WsReader)> {
    let (stream, _) = tokio_tungstenite::connect_async(config.url.as_str())
        .await
        .map_err(|e| Error::Channel(format!("failed to connect to {}: {e}", config.url)))?;
    let (mut writer, reader) = stream.split();

    for line in config.login_lines() {
        writer
            .send(Message::Text(line))
            .await
            .map_err(|e| Error::Channel(format!("failed to log in: {e}")))?;
    }

    Ok((writer, reader))
}

/// Read until the connection ends, reconnecting while attempts remain
async fn run_reader(
    config: TwitchChatConfig,
    mut reader: WsReader,
    writer: SharedWriter,
    tx: mpsc::Sender<ChatMessage>,
    connected: Arc<AtomicBool>,
) {
    let bot = config.bot_username.to_lowercase();

    loop {
        let end = read_until_end(&mut reader, &writer, &tx, &bot).await;
        connected.store(false, Ordering::SeqCst);
        writer.lock().await.take();

        if end == ReadEnd::ConsumerGone {
            tracing::debug!("chat receiver dropped, stopping Twitch reader");
            break;
        }
        tracing::warn!(reason = ?end, "Twitch chat connection lost, reconnecting");

        let Some((new_writer, new_reader)) = reconnect(&config).await else {
            tracing::error!(
                attempts = config.reconnect_attempts,
                "giving up on Twitch chat"
            );
            break;
        };
        *writer.lock().await = Some(new_writer);
        reader = new_reader;
        connected.store(true, Ordering::SeqCst);
        tracing::info!("reconnected to Twitch chat");
    }
}

async fn reconnect(config: &TwitchChatConfig) -> Option<(WsWriter, WsReader)> {
    for attempt in 1..=config.reconnect_attempts {
        tokio::time::sleep(config.reconnect_delay * attempt).await;
        match open(config).await {
            Ok(pair) => return Some(pair),
            Err(e) => tracing::warn!(attempt, error = %e, "Twitch reconnect failed"),
        }
    }
    None
}

async fn read_until_end(
    reader: &mut WsReader,
    writer: &SharedWriter,
    tx: &mpsc::Sender<ChatMessage>,
    bot: &str,
) -> ReadEnd {
    while let Some(frame) = reader.next().await {
        match frame {
            // One frame may carry several IRC lines
            Ok(Message::Text(text)) => {
                for line in text.lines() {
                    if let Some(end) = handle_line(line, writer, tx, bot).await {
                        return end;
                    }
                }
            }
            Ok(Message::Ping(data)) => send(writer, Message::Pong(data)).await,
            Ok(Message::Close(_)) => return ReadEnd::Closed,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Twitch chat read error");
                return ReadEnd::Closed;
            }
        }
    }
    ReadEnd::Closed
}

async fn handle_line(
    line: &str,
    writer: &SharedWriter,
    tx: &mpsc::Sender<ChatMessage>,
    bot: &str,
) -> Option<ReadEnd> {
    let parsed = parse_line(line)?;

    match parsed.command.as_str() {
        "PING" => {
            let token = parsed.trailing.as_deref().unwrap_or("tmi.twitch.tv");
            send(writer, Message::Text(format!("PONG :{token}"))).await;
        }
        "PRIVMSG" => {
            let msg = privmsg_to_chat(&parsed, bot)?;
            if tx.send(msg).await.is_err() {
                return Some(ReadEnd::ConsumerGone);
            }
        }
        "NOTICE" => {
            tracing::warn!(notice = ?parsed.trailing, "Twitch notice");
        }
        "RECONNECT" => return Some(ReadEnd::Reconnect),
        _ => {
            tracing::trace!(command = %parsed.command, "ignoring IRC line");
        }
    }
    None
}

async fn send(writer: &SharedWriter, message: Message) {
    let mut guard = writer.lock().await;
    let Some(writer) = guard.as_mut() else {
        return;
    };
    if let Err(e) = writer.send(message).await {
        tracing::warn!(error = %e, "failed to write to Twitch chat");
    }
}

/// Convert a `PRIVMSG` line into a chat message
///
/// Lines without a message ID are dropped; a missing send time falls back to now.
fn privmsg_to_chat(line: &IrcLine, bot_username: &str) -> Option<ChatMessage> {
    let id = line.tag("id")?.to_string();
    let channel = line.params.first()?.trim_start_matches('#').to_string();
    let sender = line.nick()?.to_string();
    let content = line.trailing.clone().unwrap_or_default();

    let sent_at = line
        .tag("tmi-sent-ts")
        .and_then(|ts| ts.parse::<i64>().ok())
        .unwrap_or_else(|| Utc::now().timestamp_millis());

    let sender_name = line
        .tag("display-name")
        .map_or_else(|| sender.clone(), ToString::to_string);
    let is_self = sender.eq_ignore_ascii_case(bot_username);

    Some(ChatMessage {
        id,
        channel,
        sender,
        sender_name,
        content,
        sent_at,
        is_self,
    })
}
