//! Session lifecycle controller
//!
//! Polls the stream metadata source on a fixed cadence and drives the aggregator through
//! `NoSession -> Attached -> ... -> NoSession`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::aggregator::{LiveAggregator, TickOutcome, Transition};
use crate::integrations::StreamSource;

/// Default polling period
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Drives session start, continue and end from polled stream metadata
pub struct LifecycleController {
    source: Arc<dyn StreamSource>,
    aggregator: Arc<LiveAggregator>,
}

impl LifecycleController {
    /// Create a controller over a metadata source and an aggregator
    #[must_use]
    pub fn new(source: Arc<dyn StreamSource>, aggregator: Arc<LiveAggregator>) -> Self {
        Self { source, aggregator }
    }

    /// Run one polling tick
    ///
    /// A failed stream lookup counts as "no stream" for this tick.
    pub async fn tick(&self) -> TickOutcome {
        let observed = match self.source.current_stream().await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(error = %e, "failed to get stream");
                None
            }
        };

        // VOD lookups only matter while a stream is live or being finalized
        let video = if observed.is_some() || self.aggregator.session_id().await.is_some() {
            match self.source.latest_video().await {
                Ok(video) => video,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to get VOD");
                    None
                }
            }
        } else {
            None
        };

        let outcome = self.aggregator.on_session_observed(observed, video).await;
        log_outcome(&outcome);
        outcome
    }

    /// Tick every `period` until `shutdown` flips to `true`
    ///
    /// The first tick runs immediately.
    pub async fn run(&self, period: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(period_secs = period.as_secs(), "lifecycle controller running");

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("lifecycle controller stopped");
    }
}

fn log_outcome(outcome: &TickOutcome) {
    let session_id = outcome.session_id.as_deref().unwrap_or("-");
    match (&outcome.transition, &outcome.error) {
        (Transition::Idle, _) => {}
        (transition, Some(e)) => {
            tracing::warn!(session_id, ?transition, error = %e, "tick completed with errors");
        }
        (transition, None) => {
            let total = outcome.stats.as_ref().map(|s| s.total);
            tracing::debug!(session_id, ?transition, ?total, "tick completed");
        }
    }
}
