//! Summary repository for computed joke scores

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension;
use serde::{Deserialize, Serialize};

use super::{DbPool, conn};
use crate::scorer::{SeriesPoint, SummaryStats};
use crate::{Error, Result};

/// Where a summary came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryKind {
    /// Computed incrementally while the broadcast was running
    Live,
    /// Recomputed offline from the persisted reaction log
    Replay,
}

impl SummaryKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Replay => "replay",
        }
    }

    fn from_str(s: &str) -> Option<Self> {
        match s {
            "live" => Some(Self::Live),
            "replay" => Some(Self::Replay),
            _ => None,
        }
    }
}

/// A persisted summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSummary {
    pub session_id: String,
    pub kind: SummaryKind,
    #[serde(flatten)]
    pub stats: SummaryStats,
    /// Minutes between session start and the scoring pass
    pub uptime_minutes: i64,
    /// Number of reactions scored
    pub event_count: usize,
    pub updated_at: DateTime<Utc>,
}

/// Summary repository
#[derive(Clone)]
pub struct SummaryRepo {
    pool: DbPool,
}

impl SummaryRepo {
    /// Create a new summary repository
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Save a summary, replacing any previous one of the same kind
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn save(
        &self,
        session_id: &str,
        kind: SummaryKind,
        stats: &SummaryStats,
        uptime_minutes: i64,
        event_count: usize,
    ) -> Result<StoredSummary> {
        let conn = conn(&self.pool)?;

        let series_json = serde_json::to_string(&stats.series)?;
        let updated_at = Utc::now();
        let count = i64::try_from(event_count).unwrap_or(i64::MAX);

        conn.execute(
            "INSERT INTO summaries (session_id, kind, total, min, max, running_high, running_low,
                                    series_json, uptime_minutes, event_count, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(session_id, kind) DO UPDATE SET
                total = excluded.total,
                min = excluded.min,
                max = excluded.max,
                running_high = excluded.running_high,
                running_low = excluded.running_low,
                series_json = excluded.series_json,
                uptime_minutes = excluded.uptime_minutes,
                event_count = excluded.event_count,
                updated_at = excluded.updated_at",
            rusqlite::params![
                session_id,
                kind.as_str(),
                stats.total,
                stats.min,
                stats.max,
                stats.running_high,
                stats.running_low,
                series_json,
                uptime_minutes,
                count,
                updated_at.to_rfc3339(),
            ],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(StoredSummary {
            session_id: session_id.to_string(),
            kind,
            stats: stats.clone(),
            uptime_minutes,
            event_count,
            updated_at,
        })
    }

    /// Get the summary of a given kind for a session
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn get(&self, session_id: &str, kind: SummaryKind) -> Result<Option<StoredSummary>> {
        let conn = conn(&self.pool)?;

        let row = conn
            .query_row(
                "SELECT session_id, kind, total, min, max, running_high, running_low,
                        series_json, uptime_minutes, event_count, updated_at
                 FROM summaries WHERE session_id = ?1 AND kind = ?2",
                [session_id, kind.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        SummaryStats {
                            total: row.get(2)?,
                            min: row.get(3)?,
                            max: row.get(4)?,
                            running_high: row.get(5)?,
                            running_low: row.get(6)?,
                            series: Vec::new(),
                        },
                        row.get::<_, String>(7)?,
                        row.get::<_, i64>(8)?,
                        row.get::<_, i64>(9)?,
                        row.get::<_, String>(10)?,
                    ))
                },
            )
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;

        let Some((session_id, kind_str, mut stats, series_json, uptime, count, updated)) = row
        else {
            return Ok(None);
        };

        stats.series = serde_json::from_str::<Vec<SeriesPoint>>(&series_json)?;

        Ok(Some(StoredSummary {
            session_id,
            kind: SummaryKind::from_str(&kind_str).unwrap_or(kind),
            stats,
            uptime_minutes: uptime,
            event_count: usize::try_from(count).unwrap_or(0),
            updated_at: parse_datetime(&updated),
        }))
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}
