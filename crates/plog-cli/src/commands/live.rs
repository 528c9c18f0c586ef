//! Live command: tracks a session from events streamed on stdin.
//!
//! Input uses the session log format, one event per line. Samples are pushed
//! through the provider feed as they arrive, a one-second interval drives the
//! elapsed clock, and a `stop` line or end of input ends the session.
//!
//! Every second a progress line with the running totals is written to
//! stderr, leaving stdout for the final summary.

use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use plog_core::{LocationProvider, SessionTracker, TrackerConfig};
use plog_db::Database;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::time::MissedTickBehavior;

use super::summary;
use super::util::{format_clock, format_pace};
use crate::cli::SessionOutput;
use crate::driver::{self, Finished};
use crate::session_log::{self, LogEvent};
use crate::Config;

pub fn run<W: Write>(
    writer: &mut W,
    db: Option<&mut Database>,
    config: &Config,
    output: &SessionOutput,
) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to initialize tokio runtime")?;
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut progress = std::io::stderr();
    let finished = runtime.block_on(track(stdin, config.tracker_config(), &mut progress))?;

    summary::finish(writer, db, &finished, output)
}

/// Runs one session until `input` says stop or closes, reporting progress
/// to `progress` once per second.
pub async fn track<R, W>(input: R, config: TrackerConfig, progress: &mut W) -> Result<Finished>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let (mut tracker, feed) = driver::feed_tracker(config);
    let id = tracker.start(Utc::now().timestamp_millis())?;
    tracing::info!(session = %id, "tracking live input, send a stop event or close input to finish");

    let mut lines = input.lines();
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the first tick completes immediately
    ticker.tick().await;

    let mut refused = 0;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                tracker.tick();
                write_progress(&mut *progress, &tracker).context("failed to write progress")?;
            }
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read input")? else {
                    tracing::info!("input closed, stopping session");
                    break;
                };
                match session_log::parse_line(&line) {
                    Ok(None) => {}
                    Ok(Some(LogEvent::Stop { .. })) => break,
                    Ok(Some(event)) => {
                        if let Err(error) = driver::apply_event(&mut tracker, &feed, &event) {
                            refused += 1;
                            tracing::warn!(%error, ?event, "event refused by tracker");
                        }
                    }
                    Err(error) => tracing::warn!("skipping malformed input line: {error:#}"),
                }
            }
        }
    }

    Ok(driver::finish(
        &mut tracker,
        Utc::now().timestamp_millis(),
        refused,
    )?)
}

/// One line of running totals: state, time, distance, pace, calories,
/// trash and the device-reported speed.
pub fn write_progress<W, P>(writer: &mut W, tracker: &SessionTracker<P>) -> std::io::Result<()>
where
    W: Write,
    P: LocationProvider,
{
    let Some(session) = tracker.session() else {
        return Ok(());
    };
    let metrics = tracker.metrics();
    let speed = metrics
        .current_speed_kmh
        .map_or_else(|| "--".to_string(), |kmh| format!("{kmh:.1} km/h"));
    writeln!(
        writer,
        "{:<7}  {}  {:.2} km  {}  {} kcal  {} trash  {speed}",
        session.state(),
        format_clock(session.elapsed_seconds()),
        session.distance_km(),
        format_pace(metrics.average_pace_min_per_km),
        metrics.estimated_calories,
        session.trash_count()
    )
}
