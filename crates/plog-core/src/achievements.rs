//! Achievement catalogue and progress.

use serde::Serialize;

use crate::stats::SessionTotals;

/// What an achievement measures.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", content = "target", rename_all = "snake_case")]
pub enum Requirement {
    /// Number of finished sessions.
    Sessions(u32),
    /// Lifetime pieces of trash collected.
    Trash(u64),
    /// Lifetime distance in kilometers.
    DistanceKm(f64),
    /// Consecutive days with at least one session.
    StreakDays(u32),
}

impl Requirement {
    /// Fraction of the target reached, clamped to `[0, 1]`.
    #[allow(clippy::cast_precision_loss)]
    pub fn progress(&self, totals: &SessionTotals) -> f64 {
        let (value, target) = match *self {
            Self::Sessions(target) => (f64::from(totals.stats.sessions), f64::from(target)),
            Self::Trash(target) => (totals.stats.trash as f64, target as f64),
            Self::DistanceKm(target) => (totals.stats.distance_km, target),
            Self::StreakDays(target) => (f64::from(totals.longest_streak_days), f64::from(target)),
        };
        if target <= 0.0 {
            return 1.0;
        }
        (value / target).clamp(0.0, 1.0)
    }
}

/// A static catalogue entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Achievement {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub requirement: Requirement,
}

/// Every achievement, in display order.
pub const CATALOGUE: &[Achievement] = &[
    Achievement {
        id: "first_plogging",
        title: "First Plogging",
        description: "Finish your first plogging session",
        requirement: Requirement::Sessions(1),
    },
    Achievement {
        id: "environment_guardian",
        title: "Environment Guardian",
        description: "Collect 100 pieces of trash",
        requirement: Requirement::Trash(100),
    },
    Achievement {
        id: "earth_keeper",
        title: "Earth Keeper",
        description: "Collect 500 pieces of trash",
        requirement: Requirement::Trash(500),
    },
    Achievement {
        id: "marathon_runner",
        title: "Marathon Runner",
        description: "Cover 42 km in total",
        requirement: Requirement::DistanceKm(42.0),
    },
    Achievement {
        id: "weekly_challenge",
        title: "Weekly Challenge",
        description: "Go plogging 7 days in a row",
        requirement: Requirement::StreakDays(7),
    },
    Achievement {
        id: "kilometer_king",
        title: "Kilometer King",
        description: "Cover 100 km in total",
        requirement: Requirement::DistanceKm(100.0),
    },
];

/// An achievement together with how close the user is to it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AchievementProgress {
    #[serde(flatten)]
    pub achievement: Achievement,
    pub unlocked: bool,
    pub progress: f64,
}

/// Evaluates the whole catalogue against lifetime totals.
pub fn evaluate_achievements(totals: &SessionTotals) -> Vec<AchievementProgress> {
    CATALOGUE
        .iter()
        .map(|achievement| {
            let progress = achievement.requirement.progress(totals);
            AchievementProgress {
                achievement: *achievement,
                unlocked: progress >= 1.0,
                progress,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::stats::PeriodStats;

    fn totals(sessions: u32, distance_km: f64, trash: u64, streak: u32) -> SessionTotals {
        SessionTotals {
            stats: PeriodStats {
                sessions,
                distance_km,
                duration_seconds: 0,
                trash,
                calories: 0,
            },
            active_days: streak,
            longest_streak_days: streak,
        }
    }

    fn unlocked_ids(totals: &SessionTotals) -> Vec<&'static str> {
        evaluate_achievements(totals)
            .into_iter()
            .filter(|p| p.unlocked)
            .map(|p| p.achievement.id)
            .collect()
    }

    #[test]
    fn nothing_unlocked_without_sessions() {
        let progress = evaluate_achievements(&SessionTotals::default());
        assert_eq!(progress.len(), CATALOGUE.len());
        assert!(progress.iter().all(|p| !p.unlocked));
        assert!(progress.iter().all(|p| p.progress.abs() < f64::EPSILON));
    }

    #[test]
    fn thresholds_unlock_matching_entries() {
        let totals = totals(12, 45.5, 130, 3);
        assert_eq!(
            unlocked_ids(&totals),
            vec!["first_plogging", "environment_guardian", "marathon_runner"]
        );
    }

    #[test]
    fn progress_is_partial_and_clamped() {
        let progress = evaluate_achievements(&totals(3, 50.0, 250, 7));
        let by_id = |id: &str| progress.iter().find(|p| p.achievement.id == id).unwrap();

        assert!((by_id("earth_keeper").progress - 0.5).abs() < 1e-9);
        assert!((by_id("kilometer_king").progress - 0.5).abs() < 1e-9);
        assert!((by_id("marathon_runner").progress - 1.0).abs() < f64::EPSILON);
        assert!(by_id("weekly_challenge").unlocked);
    }

    #[test]
    fn serializes_flat_with_requirement() {
        let progress = evaluate_achievements(&SessionTotals::default());
        let json = serde_json::to_value(progress[1]).unwrap();
        assert_eq!(json["id"], "environment_guardian");
        assert_eq!(json["requirement"]["kind"], "trash");
        assert_eq!(json["requirement"]["target"], 100);
        assert_eq!(json["unlocked"], false);
    }
}
