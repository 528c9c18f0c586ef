//! Aggregates over finished sessions.

use std::fmt;

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// The numbers of one finished session that feed history and profile views.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionStat {
    pub started_at: DateTime<Utc>,
    pub distance_km: f64,
    pub duration_seconds: u64,
    pub trash: u32,
    pub calories: u32,
}

/// History window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    #[default]
    Week,
    Month,
    Year,
    All,
}

impl Period {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
            Self::All => "all",
        }
    }

    /// Half-open `[start, end)` window containing `today`, using local
    /// midnights of `tz`. Weeks start on Monday. `All` has no bounds.
    pub fn bounds<Tz: TimeZone>(
        self,
        today: NaiveDate,
        tz: &Tz,
    ) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let (first, next) = match self {
            Self::All => return None,
            Self::Week => {
                let monday =
                    today - Days::new(u64::from(today.weekday().num_days_from_monday()));
                (monday, monday + Days::new(7))
            }
            Self::Month => {
                let first = today.with_day(1)?;
                (first, first.checked_add_months(Months::new(1))?)
            }
            Self::Year => {
                let first = NaiveDate::from_ymd_opt(today.year(), 1, 1)?;
                (first, first.checked_add_months(Months::new(12))?)
            }
        };
        Some((local_midnight_to_utc(first, tz)?, local_midnight_to_utc(next, tz)?))
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            "all" => Ok(Self::All),
            _ => Err(format!("invalid period: {s} (expected week, month, year or all)")),
        }
    }
}

/// Converts a local date at midnight to UTC.
/// Handles DST ambiguity by picking the earlier time.
fn local_midnight_to_utc<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> Option<DateTime<Utc>> {
    let midnight = date.and_time(NaiveTime::from_hms_opt(0, 0, 0)?);
    tz.from_local_datetime(&midnight)
        .earliest()
        .or_else(|| {
            // DST spring-forward gap at midnight; 1am local exists
            let one_am = date.and_time(NaiveTime::from_hms_opt(1, 0, 0)?);
            tz.from_local_datetime(&one_am).earliest()
        })
        .map(|dt| dt.with_timezone(&Utc))
}

/// Summed numbers for a set of sessions.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PeriodStats {
    pub sessions: u32,
    pub distance_km: f64,
    pub duration_seconds: u64,
    pub trash: u64,
    pub calories: u64,
}

impl PeriodStats {
    /// Sums the sessions whose start falls inside `window` (all when `None`).
    pub fn collect<'a, I>(stats: I, window: Option<(DateTime<Utc>, DateTime<Utc>)>) -> Self
    where
        I: IntoIterator<Item = &'a SessionStat>,
    {
        let mut total = Self::default();
        for stat in stats {
            if window.is_some_and(|(start, end)| stat.started_at < start || stat.started_at >= end)
            {
                continue;
            }
            total.add(stat);
        }
        total
    }

    fn add(&mut self, stat: &SessionStat) {
        self.sessions = self.sessions.saturating_add(1);
        self.distance_km += stat.distance_km;
        self.duration_seconds = self.duration_seconds.saturating_add(stat.duration_seconds);
        self.trash = self.trash.saturating_add(u64::from(stat.trash));
        self.calories = self.calories.saturating_add(u64::from(stat.calories));
    }
}

/// Lifetime numbers shown on the profile.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SessionTotals {
    #[serde(flatten)]
    pub stats: PeriodStats,
    /// Distinct local days with at least one session.
    pub active_days: u32,
    /// Longest run of consecutive active days.
    pub longest_streak_days: u32,
}

impl SessionTotals {
    /// Totals over every session, with days counted in `tz`.
    pub fn from_stats<Tz: TimeZone>(stats: &[SessionStat], tz: &Tz) -> Self {
        let mut days: Vec<NaiveDate> = stats
            .iter()
            .map(|stat| stat.started_at.with_timezone(tz).date_naive())
            .collect();
        days.sort_unstable();
        days.dedup();

        Self {
            stats: PeriodStats::collect(stats, None),
            active_days: u32::try_from(days.len()).unwrap_or(u32::MAX),
            longest_streak_days: longest_streak(&days),
        }
    }
}

/// Longest run of consecutive dates in a sorted, deduplicated slice.
fn longest_streak(days: &[NaiveDate]) -> u32 {
    let mut longest = 0u32;
    let mut current = 0u32;
    let mut previous: Option<NaiveDate> = None;

    for &day in days {
        current = match previous.and_then(|p| p.succ_opt()) {
            Some(expected) if expected == day => current + 1,
            _ => 1,
        };
        longest = longest.max(current);
        previous = Some(day);
    }
    longest
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stat(started_at: &str, distance_km: f64, trash: u32) -> SessionStat {
        SessionStat {
            started_at: DateTime::parse_from_rfc3339(started_at)
                .unwrap()
                .with_timezone(&Utc),
            distance_km,
            duration_seconds: 1800,
            trash,
            calories: 300,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn week_starts_on_monday() {
        // 2026-01-15 is a Thursday
        let (start, end) = Period::Week.bounds(date(2026, 1, 15), &Utc).unwrap();
        assert_eq!(start, utc("2026-01-12T00:00:00Z"));
        assert_eq!(end, utc("2026-01-19T00:00:00Z"));
    }

    #[test]
    fn month_and_year_bounds() {
        let (start, end) = Period::Month.bounds(date(2026, 12, 31), &Utc).unwrap();
        assert_eq!(start, utc("2026-12-01T00:00:00Z"));
        assert_eq!(end, utc("2027-01-01T00:00:00Z"));

        let (start, end) = Period::Year.bounds(date(2026, 6, 1), &Utc).unwrap();
        assert_eq!(start, utc("2026-01-01T00:00:00Z"));
        assert_eq!(end, utc("2027-01-01T00:00:00Z"));
    }

    #[test]
    fn bounds_follow_the_given_timezone() {
        let kst = chrono::FixedOffset::east_opt(9 * 3600).unwrap();
        let (start, _) = Period::Month.bounds(date(2026, 3, 10), &kst).unwrap();
        assert_eq!(start, utc("2026-02-28T15:00:00Z"));
    }

    #[test]
    fn all_has_no_bounds() {
        assert!(Period::All.bounds(date(2026, 1, 1), &Utc).is_none());
    }

    #[test]
    fn period_parses_from_str() {
        assert_eq!("month".parse::<Period>(), Ok(Period::Month));
        assert!("fortnight".parse::<Period>().is_err());
        assert_eq!(Period::Year.to_string(), "year");
    }

    #[test]
    fn collect_respects_half_open_window() {
        let stats = [
            stat("2026-01-11T23:59:59Z", 1.0, 1),
            stat("2026-01-12T00:00:00Z", 2.0, 2),
            stat("2026-01-18T12:00:00Z", 3.0, 3),
            stat("2026-01-19T00:00:00Z", 4.0, 4),
        ];
        let window = Period::Week.bounds(date(2026, 1, 15), &Utc);

        let week = PeriodStats::collect(&stats, window);
        assert_eq!(week.sessions, 2);
        assert!((week.distance_km - 5.0).abs() < 1e-9);
        assert_eq!(week.trash, 5);
        assert_eq!(week.duration_seconds, 3600);
        assert_eq!(week.calories, 600);

        let all = PeriodStats::collect(&stats, None);
        assert_eq!(all.sessions, 4);
    }

    #[test]
    fn totals_count_days_and_streaks() {
        let stats = [
            stat("2026-01-01T08:00:00Z", 1.0, 1),
            stat("2026-01-02T08:00:00Z", 1.0, 1),
            stat("2026-01-02T18:00:00Z", 1.0, 1),
            stat("2026-01-03T08:00:00Z", 1.0, 1),
            stat("2026-01-05T08:00:00Z", 1.0, 1),
        ];
        let totals = SessionTotals::from_stats(&stats, &Utc);
        assert_eq!(totals.stats.sessions, 5);
        assert_eq!(totals.active_days, 4);
        assert_eq!(totals.longest_streak_days, 3);
    }

    #[test]
    fn empty_totals_are_zero() {
        let totals = SessionTotals::from_stats(&[], &Utc);
        assert_eq!(totals, SessionTotals::default());
    }

    #[test]
    fn streak_spans_month_boundary() {
        let days = [date(2026, 1, 30), date(2026, 1, 31), date(2026, 2, 1)];
        assert_eq!(longest_streak(&days), 3);
        assert_eq!(longest_streak(&[]), 0);
    }
}
