//! External service integrations

mod helix;

use async_trait::async_trait;

pub use helix::{DEFAULT_BASE_URL as HELIX_BASE_URL, HelixClient};

use crate::session::{Session, VideoInfo};
use crate::Result;

/// Source of broadcast metadata, polled by the lifecycle controller
#[async_trait]
pub trait StreamSource: Send + Sync {
    /// The channel's live stream, or `None` when offline
    async fn current_stream(&self) -> Result<Option<Session>>;

    /// The channel's most recent video (VOD)
    async fn latest_video(&self) -> Result<Option<VideoInfo>>;
}
