//! Status command for showing where sessions are stored and the latest one.

use std::io::Write;
use std::path::Path;

use anyhow::Result;
use plog_db::Database;

use super::util::format_clock;

pub fn run<W: Write>(writer: &mut W, db: &Database, database_path: &Path) -> Result<()> {
    writeln!(writer, "Plogging tracker status")?;
    writeln!(writer, "Database: {}", database_path.display())?;

    let count = db.session_count()?;
    writeln!(writer, "Sessions: {count}")?;

    let Some(latest) = db.latest_session()? else {
        writeln!(writer, "No sessions recorded.")?;
        return Ok(());
    };

    writeln!(
        writer,
        "Latest:   {} {} ({:.2} km, {}, {} trash)",
        latest.start_time.format("%Y-%m-%d %H:%M UTC"),
        latest.title,
        latest.distance_km,
        format_clock(latest.duration_seconds),
        latest.trash_collected
    )?;
    Ok(())
}
