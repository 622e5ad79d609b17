//! Joke score aggregation
//!
//! Turns an ordered run of reactions into the summary charted for a broadcast.
//! Every statistic is an independent fold over the same sequence:
//!
//! | stat           | `+2` adds | `-2` adds | notes                         |
//! |----------------|-----------|-----------|-------------------------------|
//! | `total`        | 2         | -2        | net score                     |
//! | `min`          | 0         | -2        | floor, positives count as 0   |
//! | `max`          | 2         | 0         | ceiling, negatives count as 0 |
//! | `running_high` | 2         | -2        | highest running sum, from 0   |
//! | `running_low`  | 2         | -2        | lowest running sum, from 0    |
//!
//! `min`/`max` are bounding folds, not watermarks of the running sum.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::reaction::{Polarity, REACTION_WEIGHT, ReactionEvent};

const MILLIS_PER_MINUTE: i64 = 60_000;

/// Cumulative score at a point in the broadcast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesPoint {
    /// Running score after the sampled event
    pub score: i64,

    /// Whole minutes since the session started
    pub interval: i64,
}

/// Summary of every reaction seen in a session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub total: i64,
    pub min: i64,
    pub max: i64,
    pub running_high: i64,
    pub running_low: i64,
    /// One sample per minute bucket, ascending
    pub series: Vec<SeriesPoint>,
}

/// Score an ordered sequence of reactions
///
/// Events are folded in slice order. Live scoring passes arrival order, replay passes
/// `posted_at` order.
#[must_use]
pub fn score(events: &[ReactionEvent], session_start: DateTime<Utc>) -> SummaryStats {
    let total = events.iter().map(|e| e.polarity.delta()).sum();

    let min = events
        .iter()
        .filter(|e| e.polarity == Polarity::Negative)
        .map(|_| -REACTION_WEIGHT)
        .sum();

    let max = events
        .iter()
        .filter(|e| e.polarity == Polarity::Positive)
        .map(|_| REACTION_WEIGHT)
        .sum();

    let (running_high, running_low) = watermarks(events);

    SummaryStats {
        total,
        min,
        max,
        running_high,
        running_low,
        series: compact_series(&running_series(events, session_start)),
    }
}

/// Highest and lowest values the running sum reaches, both starting at 0
fn watermarks(events: &[ReactionEvent]) -> (i64, i64) {
    let mut sum = 0;
    let mut high = 0;
    let mut low = 0;
    for event in events {
        sum += event.polarity.delta();
        high = high.max(sum);
        low = low.min(sum);
    }
    (high, low)
}

/// One `{score, interval}` sample per event, uncompacted
#[must_use]
pub fn running_series(events: &[ReactionEvent], session_start: DateTime<Utc>) -> Vec<SeriesPoint> {
    let start_ms = session_start.timestamp_millis();
    let mut score = 0;
    events
        .iter()
        .map(|event| {
            score += event.polarity.delta();
            SeriesPoint {
                score,
                interval: interval_for(event.posted_at, start_ms),
            }
        })
        .collect()
}

/// Keep the last sample of every interval, ordered by interval
#[must_use]
pub fn compact_series(samples: &[SeriesPoint]) -> Vec<SeriesPoint> {
    let mut buckets = BTreeMap::new();
    for sample in samples {
        buckets.insert(sample.interval, sample.score);
    }
    buckets
        .into_iter()
        .map(|(interval, score)| SeriesPoint { score, interval })
        .collect()
}

/// Whole minutes from session start
///
/// Division truncates toward zero, so an event up to a minute before the start is in interval
/// 0 and one 90 seconds before is in interval -1. The subtraction saturates at the `i64`
/// bounds instead of overflowing.
pub(crate) const fn interval_for(posted_at: i64, start_ms: i64) -> i64 {
    posted_at.saturating_sub(start_ms) / MILLIS_PER_MINUTE
}
