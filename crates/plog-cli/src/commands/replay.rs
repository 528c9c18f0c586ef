//! Replay command: runs a recorded session log or GPX track through the tracker.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use plog_db::Database;

use super::summary;
use crate::cli::SessionOutput;
use crate::driver;
use crate::session_log;
use crate::Config;

pub fn run<W: Write>(
    writer: &mut W,
    db: Option<&mut Database>,
    config: &Config,
    file: &Path,
    output: &SessionOutput,
    geojson: Option<&Path>,
) -> Result<()> {
    let events = session_log::load(file)?;
    let finished = driver::replay(&events, config.tracker_config())
        .with_context(|| format!("failed to replay {}", file.display()))?;

    if let Some(path) = geojson {
        let json = finished.map.to_json()?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write {}", path.display()))?;
        tracing::debug!(path = %path.display(), "wrote map state");
    }

    summary::finish(writer, db, &finished, output)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::PathBuf;

    const LOG: &str = r#"{"type":"sample","latitude":37.5,"longitude":127.0,"captured_at_ms":1768471200000}
{"type":"collect","at_ms":1768471205000}
{"type":"sample","latitude":37.501,"longitude":127.0,"captured_at_ms":1768471210000}
{"type":"stop","at_ms":1768471260000}
"#;

    fn config() -> Config {
        Config {
            database_path: PathBuf::from("unused.db"),
            calories_per_minute: 10.0,
            watch_interval_ms: 2000,
            watch_min_distance_m: 5.0,
        }
    }

    fn output() -> SessionOutput {
        SessionOutput {
            title: "Lunch run".to_string(),
            notes: Some("park loop".to_string()),
            no_save: false,
            json: true,
        }
    }

    #[test]
    fn replay_saves_session_and_writes_geojson() {
        let temp = tempfile::tempdir().unwrap();
        let log = temp.path().join("run.jsonl");
        let map = temp.path().join("map.geojson");
        std::fs::write(&log, LOG).unwrap();

        let mut db = Database::open_in_memory().unwrap();
        let mut out = Vec::new();
        run(&mut out, Some(&mut db), &config(), &log, &output(), Some(&map)).unwrap();

        let latest = db.latest_session().unwrap().unwrap();
        assert_eq!(latest.title, "Lunch run");
        assert_eq!(latest.notes.as_deref(), Some("park loop"));
        assert_eq!(latest.duration_seconds, 60);
        assert_eq!(latest.trash_collected, 1);
        assert_eq!(latest.calories_burned, 10);
        assert_eq!(latest.start_time.to_rfc3339(), "2026-01-15T10:00:00+00:00");
        assert_eq!(db.session_route(&latest.id).unwrap().unwrap().len(), 2);

        let geojson: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&map).unwrap()).unwrap();
        assert_eq!(geojson["type"], "FeatureCollection");
        assert_eq!(geojson["features"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn missing_file_is_reported() {
        let mut out = Vec::new();
        let error = run(
            &mut out,
            None,
            &config(),
            Path::new("/nonexistent/run.jsonl"),
            &output(),
            None,
        )
        .unwrap_err();
        assert!(format!("{error:#}").contains("/nonexistent/run.jsonl"));
        assert!(out.is_empty());
    }
}
