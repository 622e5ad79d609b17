//! Joke Meter - live audience reaction scoring for Twitch broadcasts
//!
//! This library provides the core functionality for the joke meter:
//! - Reaction classification (`+2` / `-2` chat messages)
//! - Live aggregation and scoring of the attached broadcast
//! - Session lifecycle driven by polled stream metadata
//! - Offline replay of persisted reaction logs
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐      ┌──────────────────────┐
//! │ Twitch chat (IRC/WS) │      │  Helix stream poller │
//! └──────────┬───────────┘      └──────────┬───────────┘
//!            │ on_event                    │ on_session_observed
//! ┌──────────▼─────────────────────────────▼───────────┐
//! │                  Live Aggregator                    │
//! │      buffer  │  scorer  │  session lifecycle        │
//! └──────────────────────────┬─────────────────────────┘
//!                            │
//! ┌──────────────────────────▼─────────────────────────┐
//! │        Session store (SQLite) ◄── Replayer          │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod aggregator;
pub mod channels;
pub mod config;
pub mod daemon;
pub mod db;
pub mod error;
pub mod integrations;
pub mod lifecycle;
pub mod reaction;
pub mod replay;
pub mod scorer;
pub mod session;
pub mod store;

pub use aggregator::{
    EventMeta, EventOutcome, IgnoreReason, LiveAggregator, TickOutcome, Transition,
};
pub use config::Config;
pub use daemon::Daemon;
pub use db::{DbConn, DbPool};
pub use error::{Error, Result};
pub use integrations::{HelixClient, StreamSource};
pub use lifecycle::LifecycleController;
pub use reaction::{Polarity, ReactionEvent, classify};
pub use replay::{ReplayReport, replay};
pub use scorer::{SeriesPoint, SummaryStats, score};
pub use session::{Session, SessionStatus, VideoInfo};
pub use store::{SessionStore, SqliteStore};
