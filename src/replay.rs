//! Offline recomputation of a session's score from its persisted reaction log

use serde::Serialize;

use crate::db::{StoredSummary, SummaryKind};
use crate::scorer::{interval_for, score};
use crate::session::Session;
use crate::store::SessionStore;
use crate::{Error, Result};

/// Result of a replay run
#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    /// The replayed session
    pub session: Session,

    /// The recomputed summary, as persisted
    pub summary: StoredSummary,
}

/// Recompute a session's summary from its event log and persist it as the replay summary
///
/// Events are scored in `posted_at` order regardless of the order they were recorded in.
/// Uptime is measured up to the last logged reaction.
///
/// # Errors
///
/// Returns `Error::NotFound` for an unknown session, or a storage error
pub fn replay(store: &dyn SessionStore, session_id: &str) -> Result<ReplayReport> {
    let session = store
        .load_session(session_id)?
        .ok_or_else(|| Error::NotFound(format!("session {session_id}")))?;

    let events = store.load_events(session_id)?;
    tracing::info!(session_id, events = events.len(), "replaying session");

    let stats = score(&events, session.started_at);
    let start_ms = session.started_at.timestamp_millis();
    let uptime_minutes = events
        .last()
        .map_or(0, |last| interval_for(last.posted_at, start_ms).max(0));

    let summary = store.save_summary(
        session_id,
        SummaryKind::Replay,
        &stats,
        uptime_minutes,
        events.len(),
    )?;

    tracing::debug!(session_id, total = summary.stats.total, "replay summary saved");
    Ok(ReplayReport { session, summary })
}
