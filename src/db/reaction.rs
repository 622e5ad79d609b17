//! Reaction log repository
//!
//! Append-only record of every classified reaction, keyed by chat message ID.

use super::{DbPool, conn};
use crate::reaction::{Polarity, ReactionEvent};
use crate::{Error, Result};

/// Reaction log repository
#[derive(Clone)]
pub struct ReactionRepo {
    pool: DbPool,
}

impl ReactionRepo {
    /// Create a new reaction repository
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Append a reaction to a session's log
    ///
    /// Returns `false` if an event with the same ID was already recorded.
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn append(&self, session_id: &str, event: &ReactionEvent) -> Result<bool> {
        let conn = conn(&self.pool)?;

        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO reactions (session_id, id, posted_at, positive, text)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    session_id,
                    event.id,
                    event.posted_at,
                    event.polarity.is_positive(),
                    event.text,
                ],
            )
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(inserted > 0)
    }

    /// Load a session's reactions ordered by send time
    ///
    /// Ties on `posted_at` fall back to insertion order.
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn list_by_posted_at(&self, session_id: &str) -> Result<Vec<ReactionEvent>> {
        let conn = conn(&self.pool)?;

        let mut stmt = conn
            .prepare(
                "SELECT id, posted_at, positive, text
                 FROM reactions WHERE session_id = ?1
                 ORDER BY posted_at ASC, rowid ASC",
            )
            .map_err(|e| Error::Database(e.to_string()))?;

        let events = stmt
            .query_map([session_id], |row| {
                let positive: bool = row.get(2)?;
                Ok(ReactionEvent {
                    id: row.get(0)?,
                    posted_at: row.get(1)?,
                    polarity: if positive {
                        Polarity::Positive
                    } else {
                        Polarity::Negative
                    },
                    text: row.get(3)?,
                })
            })
            .map_err(|e| Error::Database(e.to_string()))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(events)
    }
}
