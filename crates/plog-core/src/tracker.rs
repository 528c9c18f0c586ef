//! Plogging session state machine.
//!
//! ```text
//! Idle --start--> Running <--toggle_pause--> Paused
//!                    |                          |
//!                    +---request_stop/confirm---+--> Stopped --acknowledge--> Idle
//! ```
//!
//! The tracker owns the provider subscription for the lifetime of a session
//! and cancels it when the session stops. Elapsed time is a counter advanced
//! by [`SessionTracker::tick`], which the driver calls once per second; ticks
//! outside of `Running` are ignored, so paused time never counts.

use std::fmt;
use std::iter;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::map::{self, MapSurface};
use crate::metrics::{CalorieModel, DerivedMetrics};
use crate::provider::{
    LocationProvider, Permission, ProviderError, ProviderEvent, Subscription, WatchOptions,
};
use crate::sample::{PositionSample, SampleRejection};

/// Lifecycle state of the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    Running,
    Paused,
    Stopped,
}

impl SessionState {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
        }
    }

    /// Running or paused.
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Running | Self::Paused)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Identity of one session within a tracker's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(u64);

impl SessionId {
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Errors surfaced by tracker operations.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TrackerError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("location provider unavailable")]
    ProviderUnavailable,
    #[error("location provider timed out")]
    ProviderTimeout,
    #[error("a session is already {0}")]
    AlreadyActive(SessionState),
    #[error("no active session (tracker is {0})")]
    NotActive(SessionState),
    #[error("trash can only be collected while running (tracker is {0})")]
    NotRunning(SessionState),
    #[error("session has not been stopped (tracker is {0})")]
    NotStopped(SessionState),
    #[error("stop request belongs to a different session")]
    StaleStopRequest,
}

impl From<ProviderError> for TrackerError {
    fn from(error: ProviderError) -> Self {
        match error {
            ProviderError::PermissionDenied => Self::PermissionDenied,
            ProviderError::Unavailable => Self::ProviderUnavailable,
            ProviderError::Timeout => Self::ProviderTimeout,
        }
    }
}

/// Tunables for a tracker.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrackerConfig {
    pub calories: CalorieModel,
    pub watch: WatchOptions,
}

/// What happened to a delivered sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleOutcome {
    /// Added to the route; `segment_km` is the distance from the previous point.
    Appended { segment_km: f64 },
    /// Session is paused; only the current location moved.
    LocationOnly,
    /// Invalid coordinates; dropped.
    Rejected(SampleRejection),
    /// No running or paused session to apply it to.
    Ignored,
}

/// Data accumulated by one session.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    id: SessionId,
    state: SessionState,
    started_at_ms: i64,
    stopped_at_ms: Option<i64>,
    route: Vec<PositionSample>,
    distance_km: f64,
    trash_count: u32,
    elapsed_seconds: u64,
    rejected_samples: u32,
}

impl Session {
    const fn new(id: SessionId, started_at_ms: i64) -> Self {
        Self {
            id,
            state: SessionState::Running,
            started_at_ms,
            stopped_at_ms: None,
            route: Vec::new(),
            distance_km: 0.0,
            trash_count: 0,
            elapsed_seconds: 0,
            rejected_samples: 0,
        }
    }

    pub const fn id(&self) -> SessionId {
        self.id
    }

    pub const fn state(&self) -> SessionState {
        self.state
    }

    pub const fn started_at_ms(&self) -> i64 {
        self.started_at_ms
    }

    pub const fn stopped_at_ms(&self) -> Option<i64> {
        self.stopped_at_ms
    }

    /// Accepted samples in arrival order.
    pub fn route(&self) -> &[PositionSample] {
        &self.route
    }

    pub const fn distance_km(&self) -> f64 {
        self.distance_km
    }

    pub const fn trash_count(&self) -> u32 {
        self.trash_count
    }

    /// Seconds spent in `Running`.
    pub const fn elapsed_seconds(&self) -> u64 {
        self.elapsed_seconds
    }

    pub const fn rejected_samples(&self) -> u32 {
        self.rejected_samples
    }

    fn summary(&self, calories: &CalorieModel) -> SessionSummary {
        let metrics = DerivedMetrics::compute(self.distance_km, self.elapsed_seconds, calories, None);
        SessionSummary {
            distance_km: self.distance_km,
            elapsed_seconds: self.elapsed_seconds,
            trash_count: self.trash_count,
            estimated_calories: metrics.estimated_calories,
            average_speed_kmh: metrics.average_speed_kmh,
            average_pace_min_per_km: metrics.average_pace_min_per_km,
        }
    }
}

/// Totals reported when a session stops.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub distance_km: f64,
    pub elapsed_seconds: u64,
    pub trash_count: u32,
    pub estimated_calories: u32,
    pub average_speed_kmh: f64,
    pub average_pace_min_per_km: Option<f64>,
}

/// A stopped and acknowledged session, ready to be stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedSession {
    pub started_at_ms: i64,
    pub stopped_at_ms: i64,
    pub summary: SessionSummary,
    pub route: Vec<PositionSample>,
}

impl CompletedSession {
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.started_at_ms)
    }

    pub fn stopped_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.stopped_at_ms)
    }
}

/// Proof that the user was asked to confirm ending a session.
///
/// Obtained from [`SessionTracker::request_stop`] and consumed by
/// [`SessionTracker::confirm_stop`]. Dropping it cancels the stop.
#[derive(Debug)]
#[must_use = "a stop request does nothing until confirmed"]
pub struct StopRequest {
    session: SessionId,
}

impl StopRequest {
    pub const fn session(&self) -> SessionId {
        self.session
    }
}

/// Tracks one plogging session at a time against a location provider.
pub struct SessionTracker<P> {
    provider: P,
    config: TrackerConfig,
    session: Option<Session>,
    subscription: Option<Subscription>,
    current_location: Option<PositionSample>,
    last_fault: Option<ProviderError>,
    next_id: u64,
}

impl<P: fmt::Debug> fmt::Debug for SessionTracker<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionTracker")
            .field("provider", &self.provider)
            .field("state", &self.state())
            .field("session", &self.session)
            .field("subscribed", &self.subscription.is_some())
            .finish_non_exhaustive()
    }
}

impl<P> SessionTracker<P> {
    pub const fn new(provider: P, config: TrackerConfig) -> Self {
        Self {
            provider,
            config,
            session: None,
            subscription: None,
            current_location: None,
            last_fault: None,
            next_id: 1,
        }
    }

    pub const fn provider(&self) -> &P {
        &self.provider
    }

    pub const fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.session
            .as_ref()
            .map_or(SessionState::Idle, Session::state)
    }

    pub const fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Latest valid fix, including fixes received while paused.
    pub const fn current_location(&self) -> Option<&PositionSample> {
        self.current_location.as_ref()
    }

    /// Most recent provider fault, cleared by the next accepted sample.
    pub const fn last_fault(&self) -> Option<ProviderError> {
        self.last_fault
    }

    /// Whether a provider subscription is currently held.
    pub const fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }
}

impl<P: LocationProvider> SessionTracker<P> {
    /// Starts a new session at `now_ms`.
    ///
    /// Fails with [`TrackerError::PermissionDenied`] when location access is
    /// refused; the tracker then stays idle and nothing is reset.
    pub fn start(&mut self, now_ms: i64) -> Result<SessionId, TrackerError> {
        let state = self.state();
        if state != SessionState::Idle {
            return Err(TrackerError::AlreadyActive(state));
        }

        if self.provider.request_permission() == Permission::Denied {
            tracing::warn!("location permission denied, session not started");
            return Err(TrackerError::PermissionDenied);
        }

        // Nothing is written to the tracker until the subscription is settled.
        let mut fault = None;
        let initial_fix = match self.provider.current_position() {
            Ok(fix) if fix.validate().is_ok() => Some(fix),
            Ok(fix) => {
                tracing::debug!(?fix, "ignoring invalid initial fix");
                None
            }
            Err(ProviderError::PermissionDenied) => return Err(TrackerError::PermissionDenied),
            Err(error) => {
                tracing::warn!(%error, "no initial position fix");
                fault = Some(error);
                None
            }
        };

        let subscription = match self.provider.subscribe(self.config.watch) {
            Ok(subscription) => Some(subscription),
            Err(ProviderError::PermissionDenied) => {
                tracing::warn!("location permission revoked while subscribing");
                return Err(TrackerError::PermissionDenied);
            }
            Err(error) => {
                tracing::warn!(%error, "tracking without live position updates");
                fault = Some(error);
                None
            }
        };

        let id = SessionId(self.next_id);
        self.next_id += 1;
        self.current_location = initial_fix;
        self.last_fault = fault;
        self.subscription = subscription;
        self.session = Some(Session::new(id, now_ms));

        tracing::info!(session = %id, started_at_ms = now_ms, "session started");
        Ok(id)
    }

    /// Freezes the clock and route. Pausing a paused session is a no-op.
    pub fn pause(&mut self) -> Result<(), TrackerError> {
        let session = self.active_session_mut()?;
        if session.state == SessionState::Running {
            session.state = SessionState::Paused;
            tracing::info!(
                session = %session.id,
                elapsed_seconds = session.elapsed_seconds,
                "session paused"
            );
        }
        Ok(())
    }

    /// Continues from the accumulated time. Resuming a running session is a no-op.
    pub fn resume(&mut self) -> Result<(), TrackerError> {
        let session = self.active_session_mut()?;
        if session.state == SessionState::Paused {
            session.state = SessionState::Running;
            tracing::info!(
                session = %session.id,
                elapsed_seconds = session.elapsed_seconds,
                "session resumed"
            );
        }
        Ok(())
    }

    /// Flips between running and paused, returning the new state.
    pub fn toggle_pause(&mut self) -> Result<SessionState, TrackerError> {
        match self.state() {
            SessionState::Running => self.pause()?,
            SessionState::Paused => self.resume()?,
            state => return Err(TrackerError::NotActive(state)),
        }
        Ok(self.state())
    }

    /// Advances the running clock by one second.
    ///
    /// Returns whether the tick counted.
    pub fn tick(&mut self) -> bool {
        self.advance(1) == 1
    }

    /// Advances the running clock by `seconds` at once.
    ///
    /// Returns the seconds that counted: all of them while running, none
    /// otherwise.
    pub fn advance(&mut self, seconds: u64) -> u64 {
        match self.session.as_mut() {
            Some(session) if session.state == SessionState::Running => {
                session.elapsed_seconds = session.elapsed_seconds.saturating_add(seconds);
                seconds
            }
            _ => 0,
        }
    }

    /// Applies one position fix.
    pub fn handle_sample(&mut self, sample: PositionSample) -> SampleOutcome {
        let Some(session) = self.session.as_mut().filter(|s| s.state.is_active()) else {
            tracing::trace!(?sample, "sample outside of an active session");
            return SampleOutcome::Ignored;
        };

        if let Err(rejection) = sample.validate() {
            session.rejected_samples = session.rejected_samples.saturating_add(1);
            tracing::debug!(%rejection, ?sample, "dropping invalid sample");
            return SampleOutcome::Rejected(rejection);
        }

        self.current_location = Some(sample);
        self.last_fault = None;

        if session.state == SessionState::Paused {
            return SampleOutcome::LocationOnly;
        }

        let segment_km = session
            .route
            .last()
            .map_or(0.0, |prev| prev.distance_km(&sample));
        session.distance_km += segment_km;
        session.route.push(sample);

        tracing::debug!(
            session = %session.id,
            segment_km,
            distance_km = session.distance_km,
            points = session.route.len(),
            "sample appended"
        );
        SampleOutcome::Appended { segment_km }
    }

    /// Applies everything the subscription has delivered so far.
    ///
    /// Returns the number of events consumed.
    pub fn poll_provider(&mut self) -> usize {
        let Some(subscription) = self.subscription.as_ref() else {
            return 0;
        };
        let events: Vec<ProviderEvent> = iter::from_fn(|| subscription.try_next()).collect();

        for event in &events {
            match *event {
                ProviderEvent::Sample(sample) => {
                    self.handle_sample(sample);
                }
                ProviderEvent::Fault(error) => {
                    tracing::warn!(%error, "location provider fault, keeping last known state");
                    self.last_fault = Some(error);
                }
            }
        }
        events.len()
    }

    /// Counts one collected piece of trash. Only valid while running.
    pub fn collect_trash(&mut self) -> Result<u32, TrackerError> {
        let state = self.state();
        match self.session.as_mut() {
            Some(session) if session.state == SessionState::Running => {
                session.trash_count = session.trash_count.saturating_add(1);
                tracing::info!(session = %session.id, trash_count = session.trash_count, "trash collected");
                Ok(session.trash_count)
            }
            _ => Err(TrackerError::NotRunning(state)),
        }
    }

    /// First half of stopping: asks for confirmation.
    pub fn request_stop(&self) -> Result<StopRequest, TrackerError> {
        match self.session.as_ref() {
            Some(session) if session.state.is_active() => Ok(StopRequest {
                session: session.id,
            }),
            _ => Err(TrackerError::NotActive(self.state())),
        }
    }

    /// Ends the session the request was issued for.
    ///
    /// The subscription is cancelled before this returns. The session stays
    /// readable until [`acknowledge`](Self::acknowledge).
    pub fn confirm_stop(
        &mut self,
        request: StopRequest,
        now_ms: i64,
    ) -> Result<SessionSummary, TrackerError> {
        let state = self.state();
        let Some(session) = self.session.as_mut() else {
            return Err(TrackerError::StaleStopRequest);
        };
        if session.id != request.session {
            return Err(TrackerError::StaleStopRequest);
        }
        if !session.state.is_active() {
            return Err(TrackerError::NotActive(state));
        }

        if let Some(subscription) = self.subscription.take() {
            subscription.cancel();
        }
        session.state = SessionState::Stopped;
        session.stopped_at_ms = Some(now_ms);

        let summary = session.summary(&self.config.calories);
        tracing::info!(
            session = %session.id,
            distance_km = summary.distance_km,
            elapsed_seconds = summary.elapsed_seconds,
            trash_count = summary.trash_count,
            estimated_calories = summary.estimated_calories,
            "session stopped"
        );
        Ok(summary)
    }

    /// Releases a stopped session and returns the tracker to idle.
    pub fn acknowledge(&mut self) -> Result<CompletedSession, TrackerError> {
        let state = self.state();
        if state != SessionState::Stopped {
            return Err(TrackerError::NotStopped(state));
        }
        let Some(session) = self.session.take() else {
            return Err(TrackerError::NotStopped(state));
        };
        self.last_fault = None;
        self.current_location = None;

        tracing::debug!(session = %session.id, "session acknowledged");
        Ok(CompletedSession {
            started_at_ms: session.started_at_ms,
            stopped_at_ms: session.stopped_at_ms.unwrap_or(session.started_at_ms),
            summary: session.summary(&self.config.calories),
            route: session.route,
        })
    }

    /// Summary of the current session, whatever its state.
    pub fn summary(&self) -> Option<SessionSummary> {
        self.session
            .as_ref()
            .map(|session| session.summary(&self.config.calories))
    }

    /// Pace, speed and calories for the current session (zeros when idle).
    pub fn metrics(&self) -> DerivedMetrics {
        let (distance_km, elapsed_seconds) = self
            .session
            .as_ref()
            .map_or((0.0, 0), |s| (s.distance_km, s.elapsed_seconds));
        DerivedMetrics::compute(
            distance_km,
            elapsed_seconds,
            &self.config.calories,
            self.current_location.as_ref(),
        )
    }

    /// Hands the current location and route to a map.
    pub fn publish<S: MapSurface + ?Sized>(&self, surface: &mut S) {
        let route = self.session.as_ref().map_or(&[][..], Session::route);
        map::publish(surface, self.current_location.as_ref(), route);
    }

    fn active_session_mut(&mut self) -> Result<&mut Session, TrackerError> {
        let state = self.state();
        match self.session.as_mut() {
            Some(session) if session.state.is_active() => Ok(session),
            _ => Err(TrackerError::NotActive(state)),
        }
    }
}
