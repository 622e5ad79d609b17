//! Session repository for broadcast records

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row};

use super::{DbPool, conn};
use crate::session::{Session, SessionStatus, VideoInfo};
use crate::{Error, Result};

const SESSION_COLUMNS: &str =
    "id, started_at, status, title, game_id, user_id, user_name, thumbnail_url, video_json";

/// Session repository
#[derive(Clone)]
pub struct SessionRepo {
    pool: DbPool,
}

impl SessionRepo {
    /// Create a new session repository
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Insert or merge a session record
    ///
    /// Metadata fields that are `None` keep their stored value. Moving to `Ended`
    /// stamps `ended_at` once.
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn upsert(&self, session: &Session) -> Result<()> {
        let conn = conn(&self.pool)?;

        let video_json = session
            .video
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO sessions (id, started_at, status, title, game_id, user_id, user_name,
                                   thumbnail_url, video_json, ended_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9,
                     CASE WHEN ?3 = 'ended' THEN ?10 END, ?10, ?10)
             ON CONFLICT(id) DO UPDATE SET
                started_at = excluded.started_at,
                status = excluded.status,
                title = COALESCE(excluded.title, title),
                game_id = COALESCE(excluded.game_id, game_id),
                user_id = COALESCE(excluded.user_id, user_id),
                user_name = COALESCE(excluded.user_name, user_name),
                thumbnail_url = COALESCE(excluded.thumbnail_url, thumbnail_url),
                video_json = COALESCE(excluded.video_json, video_json),
                ended_at = CASE WHEN excluded.status = 'ended'
                                THEN COALESCE(ended_at, excluded.ended_at) END,
                updated_at = excluded.updated_at",
            rusqlite::params![
                session.id,
                session.started_at.to_rfc3339(),
                session.status.as_str(),
                session.title,
                session.game_id,
                session.user_id,
                session.user_name,
                session.thumbnail_url,
                video_json,
                now,
            ],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(())
    }

    /// Get a session by ID
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn get(&self, id: &str) -> Result<Option<Session>> {
        let conn = conn(&self.pool)?;

        conn.query_row(
            &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"),
            [id],
            row_to_session,
        )
        .optional()
        .map_err(|e| Error::Database(e.to_string()))
    }

    /// List all sessions, most recent first
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn list(&self) -> Result<Vec<Session>> {
        let conn = conn(&self.pool)?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions ORDER BY started_at DESC"
            ))
            .map_err(|e| Error::Database(e.to_string()))?;

        let sessions = stmt
            .query_map([], row_to_session)
            .map_err(|e| Error::Database(e.to_string()))?
            .filter_map(std::result::Result::ok)
            .collect();

        Ok(sessions)
    }
}

fn row_to_session(row: &Row<'_>) -> rusqlite::Result<Session> {
    let started_at: String = row.get(1)?;
    let started_at = DateTime::parse_from_rfc3339(&started_at)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
        })?;

    let video = row
        .get::<_, Option<String>>(8)?
        .and_then(|json| serde_json::from_str::<VideoInfo>(&json).ok());

    Ok(Session {
        id: row.get(0)?,
        started_at,
        status: SessionStatus::from_str(&row.get::<_, String>(2)?).unwrap_or(SessionStatus::Live),
        title: row.get(3)?,
        game_id: row.get(4)?,
        user_id: row.get(5)?,
        user_name: row.get(6)?,
        thumbnail_url: row.get(7)?,
        video,
    })
}
