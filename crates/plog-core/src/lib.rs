//! Core domain logic for plogging sessions.
//!
//! This crate contains the fundamental types and logic for:
//! - Geo: haversine distance and position samples
//! - Tracking: the session state machine fed by a location provider
//! - Metrics: pace, speed and calorie estimates derived from a session
//! - History: period statistics and achievements over finished sessions

pub mod achievements;
pub mod geo;
pub mod map;
mod metrics;
pub mod provider;
pub mod sample;
pub mod stats;
pub mod tracker;

pub use achievements::{
    Achievement, AchievementProgress, CATALOGUE, Requirement, evaluate_achievements,
};
pub use metrics::{CalorieModel, DerivedMetrics};
pub use provider::{
    FeedHandle, FeedProvider, FixedProvider, LocationProvider, Permission, ProviderError,
    ProviderEvent, Subscription, WatchOptions,
};
pub use sample::{PositionSample, SampleRejection};
pub use stats::{Period, PeriodStats, SessionStat, SessionTotals};
pub use tracker::{
    CompletedSession, SampleOutcome, Session, SessionId, SessionState, SessionSummary,
    SessionTracker, StopRequest, TrackerConfig, TrackerError,
};
