//! Live aggregation of reactions for the active broadcast
//!
//! The aggregator owns the in-memory reaction buffer of the attached session. Polling ticks
//! ([`LiveAggregator::on_session_observed`]) and chat messages ([`LiveAggregator::on_event`])
//! both go through one mutex, so a scoring pass always sees a whole buffer and the summary it
//! persists matches the buffer it was computed from.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;

use crate::db::SummaryKind;
use crate::reaction::ReactionEvent;
use crate::scorer::{self, SummaryStats};
use crate::session::{Session, SessionStatus, VideoInfo};
use crate::store::SessionStore;
use crate::{Error, Result};

/// Metadata delivered alongside a chat message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMeta {
    /// Message identifier from the chat source
    pub id: String,
    /// Send time in milliseconds since the Unix epoch
    pub posted_at: i64,
    /// Message was sent by our own account
    pub is_self: bool,
}

/// Lifecycle transition taken on a polling tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// No session was attached and a live stream was observed
    Started,
    /// The attached stream is still live
    Continued,
    /// The attached stream is gone; final scoring pass
    Ended,
    /// Nothing attached, nothing live
    Idle,
}

/// Result of a polling tick
#[derive(Debug)]
pub struct TickOutcome {
    pub transition: Transition,
    /// Session the tick applied to
    pub session_id: Option<String>,
    /// Scoring pass result, for `Continued` and `Ended`
    pub stats: Option<SummaryStats>,
    /// First persistence failure hit during the tick
    pub error: Option<Error>,
}

impl TickOutcome {
    fn new(transition: Transition, session_id: Option<String>) -> Self {
        Self {
            transition,
            session_id,
            stats: None,
            error: None,
        }
    }

    /// Whether every persistence step succeeded
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Why a chat message did not become a reaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Sent by our own account
    SelfMessage,
    /// No broadcast is attached
    NoSession,
    /// Message carries no reaction token
    NotAReaction,
    /// Message ID already buffered for this session
    Duplicate,
}

/// Result of handling a chat message
#[derive(Debug)]
pub enum EventOutcome {
    Ignored(IgnoreReason),
    Recorded {
        event: ReactionEvent,
        /// Set when the event is buffered but could not be written to the event log
        persist_error: Option<Error>,
    },
}

impl EventOutcome {
    /// Whether the message was added to the buffer
    #[must_use]
    pub const fn is_recorded(&self) -> bool {
        matches!(self, Self::Recorded { .. })
    }
}

#[derive(Default)]
struct LiveState {
    session: Option<Session>,
    buffer: Vec<ReactionEvent>,
    /// Buffered events whose event-log write failed
    unlogged: Vec<ReactionEvent>,
    seen: HashSet<String>,
    metadata_saved: bool,
    scoring_passes: u64,
}

impl LiveState {
    fn reset(&mut self) {
        self.buffer.clear();
        self.unlogged.clear();
        self.seen.clear();
        self.metadata_saved = false;
    }

    /// Run the scorer over the buffer
    fn score(&mut self) -> SummaryStats {
        self.scoring_passes += 1;
        self.session
            .as_ref()
            .map(|s| scorer::score(&self.buffer, s.started_at))
            .unwrap_or_default()
    }
}

/// Incremental scorer for the active broadcast
pub struct LiveAggregator {
    store: Arc<dyn SessionStore>,
    state: Mutex<LiveState>,
}

impl LiveAggregator {
    /// Create an aggregator with no session attached
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            state: Mutex::new(LiveState::default()),
        }
    }

    /// Apply a polling observation
    ///
    /// `observed` is the live stream, if any. `video` is the channel's most recent VOD and is
    /// stored with the session on start and on end.
    pub async fn on_session_observed(
        &self,
        observed: Option<Session>,
        video: Option<VideoInfo>,
    ) -> TickOutcome {
        let mut state = self.state.lock().await;

        match (state.session.is_some(), observed) {
            (false, Some(session)) => self.start(&mut state, session, video),
            (true, Some(session)) => self.continue_session(&mut state, &session, video),
            (true, None) => self.end(&mut state, video),
            (false, None) => {
                tracing::debug!("stream has not started");
                TickOutcome::new(Transition::Idle, None)
            }
        }
    }

    fn start(
        &self,
        state: &mut LiveState,
        mut session: Session,
        video: Option<VideoInfo>,
    ) -> TickOutcome {
        tracing::info!(session_id = %session.id, "stream started, attaching session");

        state.reset();
        session.status = SessionStatus::Live;
        if video.is_some() {
            session.video = video;
        }

        let mut outcome = TickOutcome::new(Transition::Started, Some(session.id.clone()));
        match self.store.upsert_session(&session) {
            Ok(()) => state.metadata_saved = true,
            Err(e) => {
                tracing::error!(
                    session_id = %session.id,
                    error = %e,
                    "failed to create session record"
                );
                outcome.error = Some(e);
            }
        }

        state.session = Some(session);
        outcome
    }

    fn continue_session(
        &self,
        state: &mut LiveState,
        observed: &Session,
        video: Option<VideoInfo>,
    ) -> TickOutcome {
        let Some(session) = state.session.as_mut() else {
            return TickOutcome::new(Transition::Idle, None);
        };

        if observed.id != session.id {
            tracing::warn!(
                attached = %session.id,
                observed = %observed.id,
                "observed stream differs from attached session, keeping attached session"
            );
        }
        if video.is_some() {
            session.video = video;
        }

        let session_id = session.id.clone();
        let mut outcome = TickOutcome::new(Transition::Continued, Some(session_id.clone()));

        if !state.metadata_saved {
            if let Some(session) = state.session.as_ref() {
                match self.store.upsert_session(session) {
                    Ok(()) => {
                        tracing::info!(session_id = %session_id, "session record created on retry");
                        state.metadata_saved = true;
                    }
                    Err(e) => {
                        tracing::error!(
                            session_id = %session_id,
                            error = %e,
                            "failed to create session record"
                        );
                        outcome.error = Some(e);
                    }
                }
            }
        }

        if let Err(e) = self.flush_unlogged(state, &session_id) {
            outcome.error.get_or_insert(e);
        }

        tracing::debug!(
            session_id = %session_id,
            events = state.buffer.len(),
            "analyzing reactions"
        );
        let stats = state.score();
        if let Err(e) = self.save_live_summary(state, &stats) {
            tracing::error!(
                session_id = %session_id,
                error = %e,
                "failed to save summary"
            );
            outcome.error.get_or_insert(e);
        }
        outcome.stats = Some(stats);

        outcome
    }

    fn end(&self, state: &mut LiveState, video: Option<VideoInfo>) -> TickOutcome {
        let Some(session_id) = state.session.as_ref().map(|s| s.id.clone()) else {
            return TickOutcome::new(Transition::Idle, None);
        };
        tracing::info!(
            session_id = %session_id,
            events = state.buffer.len(),
            "stream over, final analysis"
        );

        let mut outcome = TickOutcome::new(Transition::Ended, Some(session_id.clone()));

        // The session is only finalized once its event log is complete
        let logged = self.flush_unlogged(state, &session_id);
        let stats = state.score();
        let result = logged
            .and_then(|()| self.save_live_summary(state, &stats))
            .and_then(|()| {
                let mut ended = state
                    .session
                    .clone()
                    .ok_or_else(|| Error::NotFound(session_id.clone()))?;
                ended.status = SessionStatus::Ended;
                if video.is_some() {
                    ended.video = video;
                }
                self.store.upsert_session(&ended)
            });
        outcome.stats = Some(stats);

        match result {
            Ok(()) => {
                state.reset();
                state.session = None;
                tracing::info!(session_id = %session_id, "session finalized");
            }
            Err(e) => {
                // Stay attached so the next tick repeats the final pass
                tracing::error!(
                    session_id = %session_id,
                    error = %e,
                    "failed to finalize session"
                );
                outcome.error = Some(e);
            }
        }

        outcome
    }

    /// Retry event-log writes that failed earlier
    ///
    /// Events that still fail stay queued; the first error is returned.
    fn flush_unlogged(&self, state: &mut LiveState, session_id: &str) -> Result<()> {
        if state.unlogged.is_empty() {
            return Ok(());
        }

        let mut first_error = None;
        let mut still_unlogged = Vec::new();
        for event in std::mem::take(&mut state.unlogged) {
            if let Err(e) = self.store.append_event(session_id, &event) {
                first_error.get_or_insert(e);
                still_unlogged.push(event);
            }
        }

        state.unlogged = still_unlogged;
        match first_error {
            None => {
                tracing::info!(session_id, "pending reactions written to event log");
                Ok(())
            }
            Some(e) => {
                tracing::error!(
                    session_id,
                    pending = state.unlogged.len(),
                    error = %e,
                    "failed to write pending reactions"
                );
                Err(e)
            }
        }
    }

    fn save_live_summary(&self, state: &LiveState, stats: &SummaryStats) -> Result<()> {
        let session = state
            .session
            .as_ref()
            .ok_or_else(|| Error::NotFound("no attached session".to_string()))?;

        self.store.save_summary(
            &session.id,
            SummaryKind::Live,
            stats,
            session.uptime_minutes(Utc::now()),
            state.buffer.len(),
        )?;

        Ok(())
    }

    /// Handle a chat message
    pub async fn on_event(&self, text: &str, meta: EventMeta) -> EventOutcome {
        if meta.is_self {
            tracing::trace!(id = %meta.id, "ignoring own message");
            return EventOutcome::Ignored(IgnoreReason::SelfMessage);
        }

        let mut state = self.state.lock().await;

        let Some(session_id) = state.session.as_ref().map(|s| s.id.clone()) else {
            return EventOutcome::Ignored(IgnoreReason::NoSession);
        };

        let Some(event) = ReactionEvent::from_message(meta.id, meta.posted_at, text) else {
            return EventOutcome::Ignored(IgnoreReason::NotAReaction);
        };

        if !state.seen.insert(event.id.clone()) {
            tracing::debug!(session_id = %session_id, id = %event.id, "duplicate reaction ignored");
            return EventOutcome::Ignored(IgnoreReason::Duplicate);
        }
        state.buffer.push(event.clone());

        tracing::debug!(
            session_id = %session_id,
            id = %event.id,
            polarity = ?event.polarity,
            "reaction recorded"
        );

        let persist_error = match self.store.append_event(&session_id, &event) {
            Ok(_) => None,
            Err(e) => {
                tracing::error!(
                    session_id = %session_id,
                    id = %event.id,
                    error = %e,
                    "failed to save reaction, will retry"
                );
                state.unlogged.push(event.clone());
                Some(e)
            }
        };

        EventOutcome::Recorded {
            event,
            persist_error,
        }
    }

    /// ID of the attached session
    pub async fn session_id(&self) -> Option<String> {
        self.state.lock().await.session.as_ref().map(|s| s.id.clone())
    }

    /// Number of buffered reactions for the attached session
    pub async fn buffered(&self) -> usize {
        self.state.lock().await.buffer.len()
    }

    /// Number of scoring passes run since creation
    pub async fn scoring_passes(&self) -> u64 {
        self.state.lock().await.scoring_passes
    }

    /// Score the current buffer without persisting
    pub async fn current_stats(&self) -> Option<SummaryStats> {
        let state = self.state.lock().await;
        state
            .session
            .as_ref()
            .map(|s| scorer::score(&state.buffer, s.started_at))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::db::init_memory;
    use crate::reaction::Polarity;
    use crate::store::SqliteStore;

    fn setup() -> (LiveAggregator, SqliteStore) {
        let store = SqliteStore::new(init_memory().unwrap());
        (LiveAggregator::new(Arc::new(store.clone())), store)
    }

    fn stream() -> Session {
        Session::live("stream-1", Utc.with_ymd_and_hms(2024, 5, 1, 20, 0, 0).unwrap())
    }

    fn meta(id: &str, minute: i64) -> EventMeta {
        EventMeta {
            id: id.to_string(),
            posted_at: stream().started_at.timestamp_millis() + minute * 60_000,
            is_self: false,
        }
    }

    #[tokio::test]
    async fn test_idle_without_stream() {
        let (agg, _) = setup();
        let outcome = agg.on_session_observed(None, None).await;
        assert_eq!(outcome.transition, Transition::Idle);
        assert!(outcome.is_ok());
        assert_eq!(agg.scoring_passes().await, 0);
    }

    #[tokio::test]
    async fn test_events_dropped_without_session() {
        let (agg, _) = setup();
        let outcome = agg.on_event("+2", meta("a", 0)).await;
        assert!(matches!(outcome, EventOutcome::Ignored(IgnoreReason::NoSession)));
    }

    #[tokio::test]
    async fn test_start_creates_record() {
        let (agg, store) = setup();
        let outcome = agg.on_session_observed(Some(stream()), None).await;

        assert_eq!(outcome.transition, Transition::Started);
        assert!(outcome.is_ok());
        assert_eq!(agg.session_id().await.as_deref(), Some("stream-1"));
        assert!(store.load_session("stream-1").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_event_filtering() {
        let (agg, _) = setup();
        agg.on_session_observed(Some(stream()), None).await;

        let mut own = meta("own", 0);
        own.is_self = true;
        assert!(matches!(
            agg.on_event("+2", own).await,
            EventOutcome::Ignored(IgnoreReason::SelfMessage)
        ));
        assert!(matches!(
            agg.on_event("hello", meta("hi", 0)).await,
            EventOutcome::Ignored(IgnoreReason::NotAReaction)
        ));
        assert!(agg.on_event("+2", meta("a", 0)).await.is_recorded());
        assert!(matches!(
            agg.on_event("+2", meta("a", 0)).await,
            EventOutcome::Ignored(IgnoreReason::Duplicate)
        ));
        assert_eq!(agg.buffered().await, 1);
    }

    #[tokio::test]
    async fn test_continue_scores_buffer() {
        let (agg, store) = setup();
        agg.on_session_observed(Some(stream()), None).await;

        agg.on_event("+2", meta("a", 0)).await;
        agg.on_event("-2", meta("b", 1)).await;

        let outcome = agg.on_session_observed(Some(stream()), None).await;
        assert_eq!(outcome.transition, Transition::Continued);
        let stats = outcome.stats.unwrap();
        assert_eq!(stats.total, 0);
        assert_eq!(stats.running_high, 2);

        let stored = store.load_summary("stream-1", SummaryKind::Live).unwrap().unwrap();
        assert_eq!(stored.stats, stats);
        assert_eq!(stored.event_count, 2);
        assert_eq!(agg.buffered().await, 2);
    }

    #[tokio::test]
    async fn test_end_runs_final_pass_and_detaches() {
        let (agg, store) = setup();
        agg.on_session_observed(Some(stream()), None).await;
        agg.on_event("+2", meta("a", 0)).await;

        let before = agg.scoring_passes().await;
        let outcome = agg.on_session_observed(None, None).await;

        assert_eq!(outcome.transition, Transition::Ended);
        assert!(outcome.is_ok());
        assert_eq!(agg.scoring_passes().await, before + 1);
        assert_eq!(outcome.stats.unwrap().total, 2);
        assert!(agg.session_id().await.is_none());
        assert_eq!(agg.buffered().await, 0);

        let session = store.load_session("stream-1").unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Ended);
    }

    #[tokio::test]
    async fn test_restart_clears_buffer() {
        let (agg, _) = setup();
        agg.on_session_observed(Some(stream()), None).await;
        agg.on_event("-2", meta("a", 0)).await;
        agg.on_session_observed(None, None).await;

        let mut next = stream();
        next.id = "stream-2".to_string();
        agg.on_session_observed(Some(next), None).await;
        assert_eq!(agg.buffered().await, 0);

        let stats = agg.current_stats().await.unwrap();
        assert_eq!(stats, SummaryStats::default());
    }

    #[tokio::test]
    async fn test_recorded_event_is_logged() {
        let (agg, store) = setup();
        agg.on_session_observed(Some(stream()), None).await;
        agg.on_event("haha +2", meta("a", 3)).await;

        let events = store.load_events("stream-1").unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].polarity, Polarity::Positive);
        assert_eq!(events[0].text, "haha +2");
    }
}
