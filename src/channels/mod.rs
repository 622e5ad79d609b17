//! Chat channel adapters
//!
//! A channel connects to a live chat and forwards every message into an mpsc receiver.

mod irc;
mod twitch;

use async_trait::async_trait;

pub use irc::{IrcLine, parse_line};
pub use twitch::{TwitchChannel, TwitchChatConfig};

use crate::Result;
use crate::aggregator::EventMeta;

/// A message from a live chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Message identifier (platform-specific)
    pub id: String,

    /// Channel the message was posted in
    pub channel: String,

    /// Sender login
    pub sender: String,

    /// Sender display name
    pub sender_name: String,

    /// Message content
    pub content: String,

    /// Send time in milliseconds since the Unix epoch
    pub sent_at: i64,

    /// Sent by the account we are connected as
    pub is_self: bool,
}

impl ChatMessage {
    /// Event metadata for the aggregator
    #[must_use]
    pub fn meta(&self) -> EventMeta {
        EventMeta {
            id: self.id.clone(),
            posted_at: self.sent_at,
            is_self: self.is_self,
        }
    }
}

/// Trait for chat channel adapters
#[async_trait]
pub trait Channel: Send + Sync {
    /// Get the channel name
    fn name(&self) -> &'static str;

    /// Connect to the channel
    async fn connect(&mut self) -> Result<()>;

    /// Disconnect from the channel
    async fn disconnect(&mut self) -> Result<()>;

    /// Check if connected
    fn is_connected(&self) -> bool;
}
