//! Shared test utilities

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, TimeZone, Utc};
use joke_meter::db::{StoredSummary, SummaryKind};
use joke_meter::{
    DbPool, Error, ReactionEvent, Result, Session, SessionStore, SqliteStore, SummaryStats, db,
};

/// Set up an in-memory test database
#[must_use]
pub fn setup_test_db() -> DbPool {
    db::init_memory().expect("failed to init test db")
}

/// Start time shared by test sessions
pub fn stream_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 20, 0, 0).unwrap()
}

/// A live session starting at [`stream_start`]
pub fn live_session(id: &str) -> Session {
    Session::live(id, stream_start())
}

/// Milliseconds timestamp `minute` minutes and `second` seconds into the stream
pub fn at(minute: i64, second: i64) -> i64 {
    stream_start().timestamp_millis() + minute * 60_000 + second * 1_000
}

/// Store whose writes can be switched to fail
pub struct FlakyStore {
    inner: SqliteStore,
    fail_writes: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: SqliteStore::new(setup_test_db()),
            fail_writes: AtomicBool::new(false),
        })
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_writes.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(Error::Database("disk is on fire".to_string()))
        } else {
            Ok(())
        }
    }
}

impl SessionStore for FlakyStore {
    fn upsert_session(&self, session: &Session) -> Result<()> {
        self.check()?;
        self.inner.upsert_session(session)
    }

    fn load_session(&self, session_id: &str) -> Result<Option<Session>> {
        self.inner.load_session(session_id)
    }

    fn list_sessions(&self) -> Result<Vec<Session>> {
        self.inner.list_sessions()
    }

    fn save_summary(
        &self,
        session_id: &str,
        kind: SummaryKind,
        stats: &SummaryStats,
        uptime_minutes: i64,
        event_count: usize,
    ) -> Result<StoredSummary> {
        self.check()?;
        self.inner
            .save_summary(session_id, kind, stats, uptime_minutes, event_count)
    }

    fn load_summary(&self, session_id: &str, kind: SummaryKind) -> Result<Option<StoredSummary>> {
        self.inner.load_summary(session_id, kind)
    }

    fn append_event(&self, session_id: &str, event: &ReactionEvent) -> Result<bool> {
        self.check()?;
        self.inner.append_event(session_id, event)
    }

    fn load_events(&self, session_id: &str) -> Result<Vec<ReactionEvent>> {
        self.inner.load_events(session_id)
    }
}
