//! Twitch Helix API client
//!
//! Only the two read endpoints the lifecycle controller polls: `streams` and `videos`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;

use super::StreamSource;
use crate::session::{Session, SessionStatus, VideoInfo};
use crate::{Error, Result};

/// Default Helix API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.twitch.tv/helix";

/// Paged Helix response envelope
#[derive(Debug, Deserialize)]
struct HelixPage<T> {
    data: Vec<T>,
}

/// Entry from `GET /streams`
#[derive(Debug, Deserialize)]
struct HelixStream {
    id: String,
    user_id: Option<String>,
    user_name: Option<String>,
    game_id: Option<String>,
    #[serde(rename = "type")]
    stream_type: Option<String>,
    title: Option<String>,
    started_at: DateTime<Utc>,
    thumbnail_url: Option<String>,
}

/// Entry from `GET /videos`
#[derive(Debug, Deserialize)]
struct HelixVideo {
    id: String,
    title: Option<String>,
    url: Option<String>,
    created_at: Option<String>,
    published_at: Option<String>,
    duration: Option<String>,
    thumbnail_url: Option<String>,
}

impl From<HelixVideo> for VideoInfo {
    fn from(video: HelixVideo) -> Self {
        Self {
            id: video.id,
            title: video.title,
            url: video.url,
            created_at: video.created_at,
            published_at: video.published_at,
            duration: video.duration,
            thumbnail_url: video.thumbnail_url,
        }
    }
}

/// Client for the Twitch Helix API
#[derive(Debug, Clone)]
pub struct HelixClient {
    /// HTTP client
    client: Client,
    /// Base URL for the Helix API
    base_url: String,
    /// Application client ID
    client_id: String,
    /// App or user access token
    access_token: String,
    /// Login of the channel to watch
    user_login: String,
    /// Numeric user ID of the channel to watch
    user_id: String,
}

impl HelixClient {
    /// Create a new Helix client
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        client_id: impl Into<String>,
        access_token: impl Into<String>,
        user_login: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client_id: client_id.into(),
            access_token: access_token.into(),
            user_login: user_login.into(),
            user_id: user_id.into(),
        }
    }

    /// Fetch the first entry of a paged endpoint
    async fn first<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Option<T>> {
        let url = format!("{}/{path}", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(query)
            .header("Client-Id", &self.client_id)
            .header("Authorization", format!("Bearer {}", self.access_token))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Upstream(format!("Helix API error: {status} - {body}")));
        }

        let body = response.text().await?;
        parse_first(&body)
    }
}

fn parse_first<T: for<'de> Deserialize<'de>>(body: &str) -> Result<Option<T>> {
    let page: HelixPage<T> = serde_json::from_str(body)
        .map_err(|e| Error::Upstream(format!("malformed Helix response: {e}")))?;
    Ok(page.data.into_iter().next())
}

fn stream_to_session(stream: HelixStream) -> Option<Session> {
    // Reruns and premieres report a type other than "live"
    if stream.stream_type.as_deref().is_some_and(|t| t != "live") {
        return None;
    }

    Some(Session {
        id: stream.id,
        started_at: stream.started_at,
        status: SessionStatus::Live,
        title: stream.title,
        game_id: stream.game_id,
        user_id: stream.user_id,
        user_name: stream.user_name,
        thumbnail_url: stream.thumbnail_url,
        video: None,
    })
}

#[async_trait]
impl StreamSource for HelixClient {
    async fn current_stream(&self) -> Result<Option<Session>> {
        let stream: Option<HelixStream> = self
            .first("streams", &[("user_login", self.user_login.as_str())])
            .await?;
        Ok(stream.and_then(stream_to_session))
    }

    async fn latest_video(&self) -> Result<Option<VideoInfo>> {
        let video: Option<HelixVideo> = self
            .first(
                "videos",
                &[("user_id", self.user_id.as_str()), ("first", "1")],
            )
            .await?;
        Ok(video.map(VideoInfo::from))
    }
}
