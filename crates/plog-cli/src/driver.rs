//! Feeds session log events into a tracker.
//!
//! Replays run on a simulated clock derived from event timestamps; live
//! sessions use a real interval and share [`apply_event`] and [`finish`].

use anyhow::Result;
use plog_core::{
    CompletedSession, FeedHandle, FeedProvider, LocationProvider, Permission, SessionTracker,
    TrackerConfig, TrackerError,
};

use crate::session_log::LogEvent;
use crate::surface::GeoJsonSurface;

/// A stopped and acknowledged session with its final map state.
#[derive(Debug, Clone, PartialEq)]
pub struct Finished {
    pub completed: CompletedSession,
    pub map: GeoJsonSurface,
    /// Events the tracker refused, such as trash collected while paused.
    pub refused_events: usize,
}

/// Creates a tracker fed by a push provider, returning the feed handle too.
pub fn feed_tracker(config: TrackerConfig) -> (SessionTracker<FeedProvider>, FeedHandle) {
    let provider = FeedProvider::new(Permission::Granted);
    let feed = provider.handle();
    (SessionTracker::new(provider, config), feed)
}

/// Applies one non-stop event. Stop events are left to the caller.
pub fn apply_event<P: LocationProvider>(
    tracker: &mut SessionTracker<P>,
    feed: &FeedHandle,
    event: &LogEvent,
) -> Result<(), TrackerError> {
    match *event {
        LogEvent::Sample(sample) => {
            feed.push(sample);
            tracker.poll_provider();
        }
        LogEvent::Fault { error, .. } => {
            feed.fault(error);
            tracker.poll_provider();
        }
        LogEvent::Pause { .. } => tracker.pause()?,
        LogEvent::Resume { .. } => tracker.resume()?,
        LogEvent::Collect { .. } => {
            tracker.collect_trash()?;
        }
        LogEvent::Stop { .. } => {}
    }
    Ok(())
}

/// Confirms the stop, captures the map and returns the tracker to idle.
pub fn finish<P: LocationProvider>(
    tracker: &mut SessionTracker<P>,
    stop_ms: i64,
    refused_events: usize,
) -> Result<Finished, TrackerError> {
    let request = tracker.request_stop()?;
    tracker.confirm_stop(request, stop_ms)?;

    let mut map = GeoJsonSurface::default();
    tracker.publish(&mut map);

    let completed = tracker.acknowledge()?;
    Ok(Finished {
        completed,
        map,
        refused_events,
    })
}

/// Credits every whole second between session start and an event.
///
/// Each gap is handed to the tracker in one step, so the cost does not
/// depend on how far apart events are.
#[derive(Debug)]
struct SimulatedClock {
    start_ms: i64,
    delivered: u64,
}

impl SimulatedClock {
    const fn new(start_ms: i64) -> Self {
        Self {
            start_ms,
            delivered: 0,
        }
    }

    fn advance_to<P: LocationProvider>(&mut self, at_ms: i64, tracker: &mut SessionTracker<P>) {
        let due = u64::try_from(at_ms.saturating_sub(self.start_ms) / 1000).unwrap_or(0);
        if due > self.delivered {
            tracker.advance(due - self.delivered);
            self.delivered = due;
        }
    }
}

/// Runs a whole log through a fresh tracker.
///
/// The session starts at the first event. Events are applied in file order;
/// the first `stop` ends the session, and a log without one stops at its
/// last event.
pub fn replay(events: &[LogEvent], config: TrackerConfig) -> Result<Finished> {
    let Some(first) = events.first() else {
        anyhow::bail!("session log is empty");
    };
    let start_ms = first.at_ms();

    let (mut tracker, feed) = feed_tracker(config);
    tracker.start(start_ms)?;

    let mut clock = SimulatedClock::new(start_ms);
    let mut refused = 0;
    let mut stop_ms = None;
    let mut consumed = 0;

    for event in events {
        consumed += 1;
        clock.advance_to(event.at_ms(), &mut tracker);

        if let LogEvent::Stop { at_ms } = *event {
            stop_ms = Some(at_ms);
            break;
        }
        if let Err(error) = apply_event(&mut tracker, &feed, event) {
            refused += 1;
            tracing::warn!(%error, ?event, "event refused by tracker");
        }
    }

    let stop_ms = stop_ms.unwrap_or_else(|| {
        tracing::info!("log ended without a stop event, stopping at the last event");
        events.last().map_or(start_ms, LogEvent::at_ms)
    });
    if consumed < events.len() {
        tracing::warn!(
            ignored = events.len() - consumed,
            "ignoring events after stop"
        );
    }

    Ok(finish(&mut tracker, stop_ms.max(start_ms), refused)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    use plog_core::geo::haversine_km;
    use plog_core::{PositionSample, ProviderError};

    fn sample(lat: f64, lon: f64, at_ms: i64) -> LogEvent {
        LogEvent::Sample(PositionSample::new(lat, lon, at_ms))
    }

    #[test]
    fn pause_window_is_excluded_from_elapsed_time() {
        let events = [
            sample(37.5, 127.0, 0),
            sample(37.501, 127.0, 10_000),
            LogEvent::Pause { at_ms: 10_000 },
            sample(37.6, 127.0, 20_000),
            LogEvent::Resume { at_ms: 20_000 },
            LogEvent::Stop { at_ms: 30_000 },
        ];
        let finished = replay(&events, TrackerConfig::default()).unwrap();
        let summary = finished.completed.summary;

        let expected = haversine_km(37.5, 127.0, 37.501, 127.0);
        assert_eq!(summary.elapsed_seconds, 20);
        assert!((summary.distance_km - expected).abs() < 1e-12);
        assert_eq!(summary.estimated_calories, 3);
        assert_eq!(finished.completed.route.len(), 2);
        assert_eq!(finished.completed.started_at_ms, 0);
        assert_eq!(finished.completed.stopped_at_ms, 30_000);
        assert_eq!(finished.refused_events, 0);

        // the paused fix still moved the marker
        assert_eq!(finished.map.center(), Some((37.6, 127.0)));
    }

    #[test]
    fn distant_timestamps_are_credited_in_one_step() {
        let events = [
            sample(37.5, 127.0, 0),
            LogEvent::Pause { at_ms: 5_000 },
            LogEvent::Resume { at_ms: i64::MAX / 2 },
            LogEvent::Stop { at_ms: i64::MAX },
        ];
        let finished = replay(&events, TrackerConfig::default()).unwrap();
        let resumed_at = u64::try_from((i64::MAX / 2) / 1000).unwrap();
        let stopped_at = u64::try_from(i64::MAX / 1000).unwrap();
        assert_eq!(
            finished.completed.summary.elapsed_seconds,
            5 + (stopped_at - resumed_at)
        );
    }

    #[test]
    fn trash_while_paused_is_refused() {
        let events = [
            LogEvent::Collect { at_ms: 0 },
            LogEvent::Pause { at_ms: 1000 },
            LogEvent::Collect { at_ms: 2000 },
            LogEvent::Resume { at_ms: 3000 },
            LogEvent::Collect { at_ms: 4000 },
            LogEvent::Stop { at_ms: 5000 },
        ];
        let finished = replay(&events, TrackerConfig::default()).unwrap();
        assert_eq!(finished.completed.summary.trash_count, 2);
        assert_eq!(finished.completed.summary.elapsed_seconds, 3);
        assert_eq!(finished.refused_events, 1);
    }

    #[test]
    fn log_without_stop_ends_at_last_event() {
        let events = [sample(0.0, 0.0, 5_000), sample(0.0, 0.001, 65_000)];
        let finished = replay(&events, TrackerConfig::default()).unwrap();
        assert_eq!(finished.completed.summary.elapsed_seconds, 60);
        assert_eq!(finished.completed.stopped_at_ms, 65_000);
        assert_eq!(finished.completed.summary.estimated_calories, 10);
    }

    #[test]
    fn events_after_stop_are_ignored() {
        let events = [
            sample(0.0, 0.0, 0),
            LogEvent::Stop { at_ms: 1000 },
            sample(0.0, 1.0, 2000),
            LogEvent::Collect { at_ms: 3000 },
        ];
        let finished = replay(&events, TrackerConfig::default()).unwrap();
        assert_eq!(finished.completed.route.len(), 1);
        assert_eq!(finished.completed.summary.trash_count, 0);
        assert_eq!(finished.completed.summary.elapsed_seconds, 1);
    }

    #[test]
    fn faults_and_invalid_samples_do_not_end_the_session() {
        let events = [
            sample(37.5, 127.0, 0),
            LogEvent::Fault {
                at_ms: 1000,
                error: ProviderError::Unavailable,
            },
            sample(91.0, 127.0, 2000),
            sample(37.501, 127.0, 3000),
            LogEvent::Stop { at_ms: 4000 },
        ];
        let finished = replay(&events, TrackerConfig::default()).unwrap();
        assert_eq!(finished.completed.route.len(), 2);
        assert_eq!(finished.refused_events, 0);
    }

    #[test]
    fn backwards_timestamps_add_no_time() {
        let events = [
            sample(0.0, 0.0, 10_000),
            sample(0.0, 0.0, 4_000),
            LogEvent::Stop { at_ms: 2_000 },
        ];
        let finished = replay(&events, TrackerConfig::default()).unwrap();
        assert_eq!(finished.completed.summary.elapsed_seconds, 0);
        assert_eq!(finished.completed.stopped_at_ms, 10_000);
    }

    #[test]
    fn empty_log_is_an_error() {
        assert!(replay(&[], TrackerConfig::default()).is_err());
    }

    #[test]
    fn calorie_rate_comes_from_config() {
        let mut config = TrackerConfig::default();
        config.calories.calories_per_minute = 6.0;
        let events = [
            LogEvent::Collect { at_ms: 0 },
            LogEvent::Stop { at_ms: 120_000 },
        ];
        let finished = replay(&events, config).unwrap();
        assert_eq!(finished.completed.summary.estimated_calories, 12);
    }
}
