//! Persistence sink for sessions, reaction logs and summaries
//!
//! The aggregator and replayer only talk to [`SessionStore`]; [`SqliteStore`] is the
//! production implementation backed by the repositories in [`crate::db`].

use crate::db::{DbPool, ReactionRepo, SessionRepo, StoredSummary, SummaryKind, SummaryRepo};
use crate::reaction::ReactionEvent;
use crate::scorer::SummaryStats;
use crate::session::Session;
use crate::Result;

/// Document-style store keyed by session ID
pub trait SessionStore: Send + Sync {
    /// Insert or merge a session record
    ///
    /// # Errors
    ///
    /// Returns error if the write fails
    fn upsert_session(&self, session: &Session) -> Result<()>;

    /// Load a session record
    ///
    /// # Errors
    ///
    /// Returns error if the read fails
    fn load_session(&self, session_id: &str) -> Result<Option<Session>>;

    /// List every recorded session, most recent first
    ///
    /// # Errors
    ///
    /// Returns error if the read fails
    fn list_sessions(&self) -> Result<Vec<Session>>;

    /// Save a computed summary, replacing the previous one of the same kind
    ///
    /// # Errors
    ///
    /// Returns error if the write fails
    fn save_summary(
        &self,
        session_id: &str,
        kind: SummaryKind,
        stats: &SummaryStats,
        uptime_minutes: i64,
        event_count: usize,
    ) -> Result<StoredSummary>;

    /// Load a summary of the given kind
    ///
    /// # Errors
    ///
    /// Returns error if the read fails
    fn load_summary(&self, session_id: &str, kind: SummaryKind) -> Result<Option<StoredSummary>>;

    /// Append a reaction to the session's event log
    ///
    /// Returns `false` if the event ID was already logged.
    ///
    /// # Errors
    ///
    /// Returns error if the write fails
    fn append_event(&self, session_id: &str, event: &ReactionEvent) -> Result<bool>;

    /// Load the session's event log ordered by `posted_at`
    ///
    /// # Errors
    ///
    /// Returns error if the read fails
    fn load_events(&self, session_id: &str) -> Result<Vec<ReactionEvent>>;
}

/// `SQLite`-backed store
#[derive(Clone)]
pub struct SqliteStore {
    sessions: SessionRepo,
    reactions: ReactionRepo,
    summaries: SummaryRepo,
}

impl SqliteStore {
    /// Create a store over a connection pool
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self {
            sessions: SessionRepo::new(pool.clone()),
            reactions: ReactionRepo::new(pool.clone()),
            summaries: SummaryRepo::new(pool),
        }
    }
}

impl SessionStore for SqliteStore {
    fn upsert_session(&self, session: &Session) -> Result<()> {
        self.sessions.upsert(session)
    }

    fn load_session(&self, session_id: &str) -> Result<Option<Session>> {
        self.sessions.get(session_id)
    }

    fn list_sessions(&self) -> Result<Vec<Session>> {
        self.sessions.list()
    }

    fn save_summary(
        &self,
        session_id: &str,
        kind: SummaryKind,
        stats: &SummaryStats,
        uptime_minutes: i64,
        event_count: usize,
    ) -> Result<StoredSummary> {
        self.summaries
            .save(session_id, kind, stats, uptime_minutes, event_count)
    }

    fn load_summary(&self, session_id: &str, kind: SummaryKind) -> Result<Option<StoredSummary>> {
        self.summaries.get(session_id, kind)
    }

    fn append_event(&self, session_id: &str, event: &ReactionEvent) -> Result<bool> {
        self.reactions.append(session_id, event)
    }

    fn load_events(&self, session_id: &str) -> Result<Vec<ReactionEvent>> {
        self.reactions.list_by_posted_at(session_id)
    }
}
