//! Storage layer for plogging history.
//!
//! Provides persistence for finished sessions using `rusqlite`.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! A `Database` instance can be moved between threads but cannot be shared
//! across threads without external synchronization (e.g. a `Mutex<Database>`).
//!
//! # Schema
//!
//! ## Timestamp Format
//!
//! Timestamps are stored as TEXT in RFC 3339 format with millisecond precision
//! (e.g., `2026-01-15T10:30:00.000Z`), so lexicographic ordering matches
//! chronological ordering.
//!
//! ## Route Storage
//!
//! `route_data` holds the accepted position samples of a session as a JSON
//! array. Listing queries never load it; use [`Database::session_route`].

use std::path::Path;

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use plog_core::{CompletedSession, PositionSample, SessionStat, SessionTotals};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Route JSON could not be encoded or decoded.
    #[error("invalid route data: {0}")]
    Route(#[from] serde_json::Error),
    /// A stored timestamp could not be parsed.
    #[error("invalid timestamp for session {session_id}: {timestamp}")]
    TimestampParse {
        session_id: String,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
    /// A session carried a millisecond timestamp outside the representable range.
    #[error("timestamp out of range: {0} ms")]
    TimestampOutOfRange(i64),
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

/// A stored session, without its route.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionRecord {
    pub id: String,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_seconds: u64,
    pub distance_km: f64,
    pub trash_collected: u32,
    pub calories_burned: u32,
    /// Minutes per kilometer.
    pub average_pace: Option<f64>,
    /// Kilometers per hour.
    pub average_speed: Option<f64>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SessionRecord {
    /// The numbers used by history and profile aggregates.
    pub const fn stat(&self) -> SessionStat {
        SessionStat {
            started_at: self.start_time,
            distance_km: self.distance_km,
            duration_seconds: self.duration_seconds,
            trash: self.trash_collected,
            calories: self.calories_burned,
        }
    }
}

/// Row as read from SQLite, before timestamp parsing.
struct RawSession {
    id: String,
    title: String,
    start_time: String,
    end_time: String,
    duration_seconds: i64,
    distance_km: f64,
    trash_collected: u32,
    calories_burned: u32,
    average_pace: Option<f64>,
    average_speed: Option<f64>,
    notes: Option<String>,
    created_at: String,
}

const SESSION_COLUMNS: &str = "id, title, start_time, end_time, duration_seconds, distance_km, \
     trash_collected, calories_burned, average_pace, average_speed, notes, created_at";

impl RawSession {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            start_time: row.get(2)?,
            end_time: row.get(3)?,
            duration_seconds: row.get(4)?,
            distance_km: row.get(5)?,
            trash_collected: row.get(6)?,
            calories_burned: row.get(7)?,
            average_pace: row.get(8)?,
            average_speed: row.get(9)?,
            notes: row.get(10)?,
            created_at: row.get(11)?,
        })
    }

    fn into_record(self) -> Result<SessionRecord, DbError> {
        Ok(SessionRecord {
            start_time: parse_timestamp(&self.start_time, &self.id)?,
            end_time: parse_timestamp(&self.end_time, &self.id)?,
            created_at: parse_timestamp(&self.created_at, &self.id)?,
            duration_seconds: u64::try_from(self.duration_seconds).unwrap_or(0),
            id: self.id,
            title: self.title,
            distance_km: self.distance_km,
            trash_collected: self.trash_collected,
            calories_burned: self.calories_burned,
            average_pace: self.average_pace,
            average_speed: self.average_speed,
            notes: self.notes,
        })
    }
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch(
            "
            -- Sessions table: one row per finished plogging session
            -- start_time/end_time/created_at: RFC 3339 UTC with millis
            -- route_data: JSON array of position samples
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                start_time TEXT NOT NULL,
                end_time TEXT NOT NULL,
                duration_seconds INTEGER NOT NULL DEFAULT 0,
                distance_km REAL NOT NULL DEFAULT 0,
                trash_collected INTEGER NOT NULL DEFAULT 0,
                calories_burned INTEGER NOT NULL DEFAULT 0,
                average_pace REAL,
                average_speed REAL,
                route_data TEXT NOT NULL DEFAULT '[]',
                notes TEXT,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_start ON sessions(start_time);
            ",
        )?;
        Ok(())
    }

    /// Stores a finished session and returns the stored record.
    pub fn insert_session(
        &mut self,
        session: &CompletedSession,
        title: &str,
        notes: Option<&str>,
    ) -> Result<SessionRecord, DbError> {
        self.insert_session_with(session, title, notes, Uuid::new_v4(), Utc::now())
    }

    fn insert_session_with(
        &mut self,
        session: &CompletedSession,
        title: &str,
        notes: Option<&str>,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<SessionRecord, DbError> {
        let start_time = session
            .started_at()
            .ok_or(DbError::TimestampOutOfRange(session.started_at_ms))?;
        let end_time = session
            .stopped_at()
            .ok_or(DbError::TimestampOutOfRange(session.stopped_at_ms))?;
        let summary = &session.summary;
        let average_speed = (summary.elapsed_seconds > 0).then_some(summary.average_speed_kmh);
        let route_data = serde_json::to_string(&session.route)?;

        let record = SessionRecord {
            id: id.to_string(),
            title: title.to_string(),
            start_time,
            end_time,
            duration_seconds: summary.elapsed_seconds,
            distance_km: summary.distance_km,
            trash_collected: summary.trash_count,
            calories_burned: summary.estimated_calories,
            average_pace: summary.average_pace_min_per_km,
            average_speed,
            notes: notes.map(String::from),
            created_at: now,
        };

        self.conn.execute(
            "
            INSERT INTO sessions
            (id, title, start_time, end_time, duration_seconds, distance_km, trash_collected,
             calories_burned, average_pace, average_speed, route_data, notes, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
            params![
                record.id,
                record.title,
                format_timestamp(record.start_time),
                format_timestamp(record.end_time),
                i64::try_from(record.duration_seconds).unwrap_or(i64::MAX),
                record.distance_km,
                record.trash_collected,
                record.calories_burned,
                record.average_pace,
                record.average_speed,
                route_data,
                record.notes,
                format_timestamp(record.created_at),
            ],
        )?;

        tracing::debug!(id = %record.id, points = session.route.len(), "session stored");
        Ok(record)
    }

    /// Lists sessions newest first, optionally only those started at or after `since`.
    pub fn list_sessions(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<SessionRecord>, DbError> {
        // The epoch sorts before every stored timestamp
        let since = since.map_or_else(|| "0".to_string(), format_timestamp);
        let mut stmt = self.conn.prepare(&format!(
            "
            SELECT {SESSION_COLUMNS}
            FROM sessions
            WHERE start_time >= ?
            ORDER BY start_time DESC, id ASC
            "
        ))?;
        let rows = stmt.query_map([since], RawSession::from_row)?;
        let mut raw = Vec::new();
        for row in rows {
            raw.push(row?);
        }
        raw.into_iter().map(RawSession::into_record).collect()
    }

    /// Fetches one session by ID.
    pub fn get_session(&self, id: &str) -> Result<Option<SessionRecord>, DbError> {
        let raw = self
            .conn
            .query_row(
                &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?"),
                [id],
                RawSession::from_row,
            )
            .optional()?;
        raw.map(RawSession::into_record).transpose()
    }

    /// The most recently started session.
    pub fn latest_session(&self) -> Result<Option<SessionRecord>, DbError> {
        let raw = self
            .conn
            .query_row(
                &format!(
                    "SELECT {SESSION_COLUMNS} FROM sessions ORDER BY start_time DESC, id ASC LIMIT 1"
                ),
                [],
                RawSession::from_row,
            )
            .optional()?;
        raw.map(RawSession::into_record).transpose()
    }

    /// Loads the route of a session. `None` if the session does not exist.
    pub fn session_route(&self, id: &str) -> Result<Option<Vec<PositionSample>>, DbError> {
        let data: Option<String> = self
            .conn
            .query_row(
                "SELECT route_data FROM sessions WHERE id = ?",
                [id],
                |row| row.get(0),
            )
            .optional()?;
        data.map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(DbError::from)
    }

    /// Number of stored sessions.
    pub fn session_count(&self) -> Result<u64, DbError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Aggregate inputs for every stored session.
    pub fn session_stats(&self) -> Result<Vec<SessionStat>, DbError> {
        Ok(self
            .list_sessions(None)?
            .iter()
            .map(SessionRecord::stat)
            .collect())
    }

    /// Lifetime totals, with active days counted in `tz`.
    pub fn profile_totals<Tz: TimeZone>(&self, tz: &Tz) -> Result<SessionTotals, DbError> {
        let stats = self.session_stats()?;
        Ok(SessionTotals::from_stats(&stats, tz))
    }
}

fn parse_timestamp(timestamp: &str, session_id: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            session_id: session_id.to_string(),
            timestamp: timestamp.to_string(),
            source,
        })
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    use plog_core::SessionSummary;

    fn completed(started_at_ms: i64, elapsed_seconds: u64, distance_km: f64) -> CompletedSession {
        CompletedSession {
            started_at_ms,
            stopped_at_ms: started_at_ms + i64::try_from(elapsed_seconds).unwrap() * 1000,
            summary: SessionSummary {
                distance_km,
                elapsed_seconds,
                trash_count: 7,
                estimated_calories: 300,
                average_speed_kmh: if elapsed_seconds > 0 {
                    distance_km * 3600.0 / 60.0 / 30.0
                } else {
                    0.0
                },
                average_pace_min_per_km: (distance_km > 0.0).then_some(6.0),
            },
            route: vec![
                PositionSample::new(37.5, 127.0, started_at_ms),
                PositionSample::new(37.501, 127.0, started_at_ms + 10_000),
            ],
        }
    }

    fn table_columns(conn: &Connection, table: &str) -> Vec<String> {
        let mut stmt = conn
            .prepare(&format!("PRAGMA table_info({table})"))
            .unwrap();
        stmt.query_map([], |row| row.get::<_, String>(1))
            .unwrap()
            .map(Result::unwrap)
            .collect()
    }

    // 2026-01-15T10:00:00Z
    const JAN_15: i64 = 1_768_471_200_000;

    #[test]
    fn open_in_memory_database() {
        let db = Database::open_in_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn schema_matches_data_model() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(
            table_columns(&db.conn, "sessions"),
            vec![
                "id",
                "title",
                "start_time",
                "end_time",
                "duration_seconds",
                "distance_km",
                "trash_collected",
                "calories_burned",
                "average_pace",
                "average_speed",
                "route_data",
                "notes",
                "created_at",
            ]
        );
    }

    #[test]
    fn init_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        db.init().unwrap();
        db.init().unwrap();
    }

    #[test]
    fn insert_and_get_session() {
        let mut db = Database::open_in_memory().unwrap();
        let now = DateTime::parse_from_rfc3339("2026-01-15T11:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let record = db
            .insert_session_with(
                &completed(JAN_15, 1800, 5.0),
                "Morning plogging",
                Some("riverside"),
                Uuid::nil(),
                now,
            )
            .unwrap();

        assert_eq!(record.id, Uuid::nil().to_string());
        assert_eq!(record.start_time.to_rfc3339(), "2026-01-15T10:00:00+00:00");
        assert_eq!(record.end_time.to_rfc3339(), "2026-01-15T10:30:00+00:00");

        let fetched = db.get_session(&record.id).unwrap().unwrap();
        assert_eq!(fetched, record);
        assert_eq!(fetched.notes.as_deref(), Some("riverside"));
        assert_eq!(fetched.trash_collected, 7);
        assert_eq!(fetched.average_pace, Some(6.0));
    }

    #[test]
    fn get_missing_session_is_none() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get_session("missing").unwrap().is_none());
        assert!(db.session_route("missing").unwrap().is_none());
    }

    #[test]
    fn route_round_trips_through_json() {
        let mut db = Database::open_in_memory().unwrap();
        let session = completed(JAN_15, 60, 0.1);
        let record = db.insert_session(&session, "Short", None).unwrap();

        let route = db.session_route(&record.id).unwrap().unwrap();
        assert_eq!(route, session.route);
    }

    #[test]
    fn zero_length_session_has_no_speed_or_pace() {
        let mut db = Database::open_in_memory().unwrap();
        let record = db
            .insert_session(&completed(JAN_15, 0, 0.0), "Empty", None)
            .unwrap();
        assert_eq!(record.average_speed, None);
        assert_eq!(record.average_pace, None);
        assert_eq!(record.duration_seconds, 0);
    }

    #[test]
    fn list_sessions_newest_first_with_since_filter() {
        let mut db = Database::open_in_memory().unwrap();
        let day_ms = 86_400_000;
        db.insert_session(&completed(JAN_15 - 2 * day_ms, 600, 1.0), "Two days ago", None)
            .unwrap();
        db.insert_session(&completed(JAN_15, 600, 2.0), "Today", None)
            .unwrap();
        db.insert_session(&completed(JAN_15 - day_ms, 600, 3.0), "Yesterday", None)
            .unwrap();

        let titles: Vec<String> = db
            .list_sessions(None)
            .unwrap()
            .into_iter()
            .map(|s| s.title)
            .collect();
        assert_eq!(titles, vec!["Today", "Yesterday", "Two days ago"]);

        let since = DateTime::from_timestamp_millis(JAN_15 - day_ms).unwrap();
        let recent = db.list_sessions(Some(since)).unwrap();
        assert_eq!(recent.len(), 2);

        assert_eq!(db.session_count().unwrap(), 3);
        assert_eq!(db.latest_session().unwrap().unwrap().title, "Today");
    }

    #[test]
    fn session_stats_mirror_records() {
        let mut db = Database::open_in_memory().unwrap();
        db.insert_session(&completed(JAN_15, 1800, 5.0), "One", None)
            .unwrap();

        let stats = db.session_stats().unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].duration_seconds, 1800);
        assert_eq!(stats[0].trash, 7);
        assert!((stats[0].distance_km - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn profile_totals_span_all_sessions() {
        let mut db = Database::open_in_memory().unwrap();
        let day_ms = 86_400_000;
        for offset in 0..3 {
            db.insert_session(&completed(JAN_15 + offset * day_ms, 1800, 5.0), "Daily", None)
                .unwrap();
        }

        let totals = db.profile_totals(&Utc).unwrap();
        assert_eq!(totals.stats.sessions, 3);
        assert_eq!(totals.stats.trash, 21);
        assert_eq!(totals.stats.calories, 900);
        assert_eq!(totals.active_days, 3);
        assert_eq!(totals.longest_streak_days, 3);
        assert!((totals.stats.distance_km - 15.0).abs() < 1e-9);
    }

    #[test]
    fn empty_database_has_no_latest_session() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.latest_session().unwrap().is_none());
        assert_eq!(db.session_count().unwrap(), 0);
    }

    #[test]
    fn out_of_range_timestamp_is_rejected() {
        let mut db = Database::open_in_memory().unwrap();
        let mut session = completed(JAN_15, 60, 0.1);
        session.started_at_ms = i64::MAX;
        assert!(matches!(
            db.insert_session(&session, "Broken", None),
            Err(DbError::TimestampOutOfRange(i64::MAX))
        ));
    }

    #[test]
    fn database_persists_across_opens() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("plog.db");

        {
            let mut db = Database::open(&path).unwrap();
            db.insert_session(&completed(JAN_15, 60, 0.1), "Persisted", None)
                .unwrap();
        }

        let db = Database::open(&path).unwrap();
        assert_eq!(db.session_count().unwrap(), 1);
    }
}
