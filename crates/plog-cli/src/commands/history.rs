//! History command: stored sessions and the totals for a period.

use std::fmt::Display;
use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use plog_core::{Period, PeriodStats, SessionStat};
use plog_db::{Database, SessionRecord};
use serde::Serialize;

use super::util::{format_clock, parse_datetime};

/// Sessions inside a period window.
#[derive(Debug, Serialize)]
pub struct HistoryReport {
    pub period: Period,
    pub timezone: String,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub totals: PeriodStats,
    pub sessions: Vec<SessionRecord>,
}

pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    period: Period,
    since: Option<&str>,
    json: bool,
) -> Result<()> {
    let since = since.map(parse_datetime).transpose()?;
    let report = build_report(db, period, since, Local::now().date_naive(), &Local)?;

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&report)?)?;
    } else {
        write_text(writer, &report, &Local)?;
    }
    Ok(())
}

/// Collects the sessions of `period` around `today`, optionally only those
/// started at or after `since`.
pub fn build_report<Tz: TimeZone>(
    db: &Database,
    period: Period,
    since: Option<DateTime<Utc>>,
    today: NaiveDate,
    tz: &Tz,
) -> Result<HistoryReport> {
    let window = period.bounds(today, tz);
    let sessions: Vec<SessionRecord> = db
        .list_sessions(since)?
        .into_iter()
        .filter(|s| window.is_none_or(|(start, end)| s.start_time >= start && s.start_time < end))
        .collect();
    let stats: Vec<SessionStat> = sessions.iter().map(SessionRecord::stat).collect();

    Ok(HistoryReport {
        period,
        timezone: iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string()),
        start: window.map(|(start, _)| start),
        end: window.map(|(_, end)| end),
        totals: PeriodStats::collect(&stats, None),
        sessions,
    })
}

fn period_heading(period: Period) -> &'static str {
    match period {
        Period::Week => "this week",
        Period::Month => "this month",
        Period::Year => "this year",
        Period::All => "all time",
    }
}

pub fn write_text<W: Write, Tz>(writer: &mut W, report: &HistoryReport, tz: &Tz) -> Result<()>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    writeln!(writer, "HISTORY: {}", period_heading(report.period))?;

    if report.sessions.is_empty() {
        writeln!(writer)?;
        writeln!(writer, "No sessions recorded.")?;
        writeln!(writer)?;
        writeln!(writer, "Hint: Run 'plog replay <FILE>' to record one.")?;
        return Ok(());
    }

    writeln!(writer)?;
    writeln!(
        writer,
        "{:<16}  {:<20}  {:>9}  {:>8}  {:>5}",
        "DATE", "TITLE", "DISTANCE", "TIME", "TRASH"
    )?;
    for session in &report.sessions {
        let date = session
            .start_time
            .with_timezone(tz)
            .format("%Y-%m-%d %H:%M")
            .to_string();
        let title: String = session.title.chars().take(20).collect();
        writeln!(
            writer,
            "{date:<16}  {title:<20}  {:>6.2} km  {:>8}  {:>5}",
            session.distance_km,
            format_clock(session.duration_seconds),
            session.trash_collected
        )?;
    }

    let totals = &report.totals;
    writeln!(writer)?;
    writeln!(writer, "SUMMARY")?;
    writeln!(writer, "───────")?;
    writeln!(writer, "Sessions:  {}", totals.sessions)?;
    writeln!(writer, "Distance:  {:.2} km", totals.distance_km)?;
    writeln!(writer, "Time:      {}", format_clock(totals.duration_seconds))?;
    writeln!(writer, "Trash:     {}", totals.trash)?;
    writeln!(writer, "Calories:  {} kcal", totals.calories)?;
    Ok(())
}
