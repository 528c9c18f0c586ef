//! Recorded session logs.
//!
//! A session log is JSON Lines, one tagged event per line:
//!
//! ```text
//! {"type":"sample","latitude":37.5,"longitude":127.0,"captured_at_ms":0}
//! {"type":"pause","at_ms":10000}
//! {"type":"resume","at_ms":20000}
//! {"type":"collect","at_ms":21000}
//! {"type":"fault","at_ms":22000,"error":"timeout"}
//! {"type":"stop","at_ms":30000}
//! ```
//!
//! GPX tracks are read as their track points followed by a stop at the
//! last point.

use std::io::BufRead;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::DateTime;
use plog_core::{PositionSample, ProviderError};
use serde::{Deserialize, Serialize};

/// One line of a session log.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogEvent {
    Sample(PositionSample),
    Pause { at_ms: i64 },
    Resume { at_ms: i64 },
    Collect { at_ms: i64 },
    Stop { at_ms: i64 },
    Fault { at_ms: i64, error: ProviderError },
}

impl LogEvent {
    /// When the event happened, in milliseconds since the Unix epoch.
    pub const fn at_ms(&self) -> i64 {
        match *self {
            Self::Sample(sample) => sample.captured_at_ms,
            Self::Pause { at_ms }
            | Self::Resume { at_ms }
            | Self::Collect { at_ms }
            | Self::Stop { at_ms }
            | Self::Fault { at_ms, .. } => at_ms,
        }
    }
}

/// Parses a single log line. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Result<Option<LogEvent>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let event = serde_json::from_str(line).context("invalid session log event")?;
    Ok(Some(event))
}

/// Parses a whole JSON Lines session log.
pub fn parse_jsonl(input: &str) -> Result<Vec<LogEvent>> {
    let mut events = Vec::new();
    for (index, line) in input.lines().enumerate() {
        let event = parse_line(line).with_context(|| format!("line {}", index + 1))?;
        events.extend(event);
    }
    Ok(events)
}

/// Reads the track points of a GPX document as samples, followed by a stop.
///
/// Points without a timestamp are placed one second after the previous point.
/// Untimed points ahead of the first timed one share its timestamp; a track
/// with no times at all starts at the epoch.
pub fn read_gpx<R: BufRead>(reader: R) -> Result<Vec<LogEvent>> {
    let gpx = gpx::read(reader).map_err(|e| anyhow::anyhow!("failed to parse GPX: {e}"))?;

    let mut points: Vec<(Option<i64>, PositionSample)> = Vec::new();
    for track in gpx.tracks {
        for segment in track.segments {
            for point in segment.points {
                let captured_at_ms = match point.time.as_ref().and_then(|t| t.format().ok()) {
                    Some(timestamp) => Some(
                        DateTime::parse_from_rfc3339(&timestamp)
                            .with_context(|| format!("invalid GPX point time: {timestamp}"))?
                            .timestamp_millis(),
                    ),
                    None => None,
                };

                let position = point.point();
                let mut sample = PositionSample::new(position.y(), position.x(), 0);
                if let Some(speed) = point.speed {
                    sample = sample.with_speed(speed);
                }
                points.push((captured_at_ms, sample));
            }
        }
    }

    if points.is_empty() {
        anyhow::bail!("GPX file has no track points");
    }

    let anchor_ms = points.iter().find_map(|(time, _)| *time).unwrap_or(0);
    let mut last_ms: Option<i64> = None;
    let mut events = Vec::with_capacity(points.len() + 1);
    for (time, mut sample) in points {
        let captured_at_ms = match (time, last_ms) {
            (Some(ms), _) => ms,
            (None, Some(previous)) => previous.saturating_add(1000),
            (None, None) => anchor_ms,
        };
        last_ms = Some(captured_at_ms);
        sample.captured_at_ms = captured_at_ms;
        events.push(LogEvent::Sample(sample));
    }

    events.push(LogEvent::Stop {
        at_ms: last_ms.unwrap_or(anchor_ms),
    });
    Ok(events)
}

/// Loads a session log, choosing the format from the file extension.
pub fn load(path: &Path) -> Result<Vec<LogEvent>> {
    let is_gpx = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gpx"));

    let events = if is_gpx {
        let file = std::fs::File::open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        read_gpx(std::io::BufReader::new(file))
    } else {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        parse_jsonl(&content)
    }
    .with_context(|| format!("failed to load session log {}", path.display()))?;

    tracing::debug!(path = %path.display(), events = events.len(), "loaded session log");
    Ok(events)
}
