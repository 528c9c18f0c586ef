//! Profile command: lifetime totals and achievement progress.

use std::io::Write;

use anyhow::Result;
use chrono::{Local, TimeZone};
use plog_core::{AchievementProgress, SessionTotals, evaluate_achievements};
use plog_db::Database;
use serde::Serialize;

use super::util::format_clock;

#[derive(Debug, Serialize)]
pub struct ProfileReport {
    pub totals: SessionTotals,
    pub achievements: Vec<AchievementProgress>,
}

impl ProfileReport {
    pub fn build<Tz: TimeZone>(db: &Database, tz: &Tz) -> Result<Self> {
        let totals = db.profile_totals(tz)?;
        Ok(Self {
            achievements: evaluate_achievements(&totals),
            totals,
        })
    }
}

pub fn run<W: Write>(writer: &mut W, db: &Database, json: bool) -> Result<()> {
    let report = ProfileReport::build(db, &Local)?;
    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&report)?)?;
    } else {
        write_text(writer, &report)?;
    }
    Ok(())
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn write_text<W: Write>(writer: &mut W, report: &ProfileReport) -> Result<()> {
    let totals = &report.totals;
    let stats = &totals.stats;

    writeln!(writer, "PROFILE")?;
    writeln!(writer, "───────")?;
    writeln!(writer, "Sessions:     {}", stats.sessions)?;
    writeln!(writer, "Distance:     {:.2} km", stats.distance_km)?;
    writeln!(writer, "Time:         {}", format_clock(stats.duration_seconds))?;
    writeln!(writer, "Trash:        {}", stats.trash)?;
    writeln!(writer, "Calories:     {} kcal", stats.calories)?;
    writeln!(
        writer,
        "Active days:  {} (longest streak {})",
        totals.active_days, totals.longest_streak_days
    )?;

    let unlocked = report.achievements.iter().filter(|a| a.unlocked).count();
    writeln!(writer)?;
    writeln!(
        writer,
        "ACHIEVEMENTS ({unlocked}/{})",
        report.achievements.len()
    )?;
    writeln!(writer, "────────────")?;
    for entry in &report.achievements {
        let mark = if entry.unlocked { "x" } else { " " };
        let percent = (entry.progress * 100.0).floor() as u32;
        writeln!(
            writer,
            "[{mark}] {:<22} {percent:>3}%  {}",
            entry.achievement.title, entry.achievement.description
        )?;
    }
    Ok(())
}
