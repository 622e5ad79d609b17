//! Broadcast session records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether a broadcast is still running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Live,
    Ended,
}

impl SessionStatus {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Ended => "ended",
        }
    }

    pub(crate) fn from_str(s: &str) -> Option<Self> {
        match s {
            "live" => Some(Self::Live),
            "ended" => Some(Self::Ended),
            _ => None,
        }
    }
}

/// One broadcast, from detected start to detected end
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Stream identifier from the platform
    pub id: String,

    /// When the broadcast went live
    pub started_at: DateTime<Utc>,

    /// Current status
    pub status: SessionStatus,

    /// Stream title
    #[serde(default)]
    pub title: Option<String>,

    /// Category being streamed
    #[serde(default)]
    pub game_id: Option<String>,

    /// Broadcaster user ID
    #[serde(default)]
    pub user_id: Option<String>,

    /// Broadcaster display name
    #[serde(default)]
    pub user_name: Option<String>,

    /// Thumbnail URL template
    #[serde(default)]
    pub thumbnail_url: Option<String>,

    /// Most recent VOD for the channel
    #[serde(default)]
    pub video: Option<VideoInfo>,
}

impl Session {
    /// Create a live session with no extra metadata
    #[must_use]
    pub fn live(id: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            started_at,
            status: SessionStatus::Live,
            title: None,
            game_id: None,
            user_id: None,
            user_name: None,
            thumbnail_url: None,
            video: None,
        }
    }

    /// Whole minutes elapsed between the start of the session and `now`
    #[must_use]
    pub fn uptime_minutes(&self, now: DateTime<Utc>) -> i64 {
        (now - self.started_at).num_minutes()
    }
}

/// A recorded video (VOD) of a broadcast
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}
