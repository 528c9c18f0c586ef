//! Output for a finished session, shared by `replay` and `live`.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use plog_core::{CompletedSession, SessionSummary};
use plog_db::{Database, SessionRecord};
use serde::Serialize;

use super::util::{format_clock, format_pace};
use crate::cli::SessionOutput;
use crate::driver::Finished;

/// JSON shape of a finished session.
#[derive(Debug, Serialize)]
struct JsonFinished<'a> {
    started_at: Option<DateTime<Utc>>,
    stopped_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    summary: &'a SessionSummary,
    route_points: usize,
    refused_events: usize,
    saved_id: Option<&'a str>,
}

/// Stores the session when a database is given, then prints the summary.
pub fn finish<W: Write>(
    writer: &mut W,
    db: Option<&mut Database>,
    finished: &Finished,
    output: &SessionOutput,
) -> Result<()> {
    let record = match db {
        Some(db) => Some(
            db.insert_session(&finished.completed, &output.title, output.notes.as_deref())
                .context("failed to save session")?,
        ),
        None => None,
    };
    if let Some(record) = &record {
        tracing::info!(id = %record.id, title = %record.title, "session saved");
    }

    if output.json {
        write_json(writer, finished, record.as_ref())
    } else {
        write_text(writer, finished, record.as_ref())
    }
}

fn write_json<W: Write>(
    writer: &mut W,
    finished: &Finished,
    record: Option<&SessionRecord>,
) -> Result<()> {
    let completed: &CompletedSession = &finished.completed;
    let json = JsonFinished {
        started_at: completed.started_at(),
        stopped_at: completed.stopped_at(),
        summary: &completed.summary,
        route_points: completed.route.len(),
        refused_events: finished.refused_events,
        saved_id: record.map(|r| r.id.as_str()),
    };
    writeln!(writer, "{}", serde_json::to_string_pretty(&json)?)?;
    Ok(())
}

fn write_text<W: Write>(
    writer: &mut W,
    finished: &Finished,
    record: Option<&SessionRecord>,
) -> Result<()> {
    let summary = &finished.completed.summary;

    writeln!(writer, "SESSION SUMMARY")?;
    writeln!(writer, "───────────────")?;
    writeln!(writer, "Distance:  {:.2} km", summary.distance_km)?;
    writeln!(writer, "Time:      {}", format_clock(summary.elapsed_seconds))?;
    writeln!(
        writer,
        "Pace:      {}",
        format_pace(summary.average_pace_min_per_km)
    )?;
    writeln!(writer, "Speed:     {:.1} km/h", summary.average_speed_kmh)?;
    writeln!(writer, "Trash:     {}", summary.trash_count)?;
    writeln!(writer, "Calories:  {} kcal", summary.estimated_calories)?;
    writeln!(writer, "Route:     {} points", finished.completed.route.len())?;

    if finished.refused_events > 0 {
        writeln!(
            writer,
            "Skipped {} event(s) the tracker refused.",
            finished.refused_events
        )?;
    }

    writeln!(writer)?;
    match record {
        Some(record) => writeln!(writer, "Saved as {}.", record.id)?,
        None => writeln!(writer, "Not saved.")?,
    }
    Ok(())
}
