//! Values derived from a session on demand.

use serde::{Deserialize, Serialize};

use crate::sample::PositionSample;

/// Calorie estimate as a flat per-minute burn rate.
///
/// Deliberately rough: distance, speed and body weight are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalorieModel {
    pub calories_per_minute: f64,
}

impl Default for CalorieModel {
    fn default() -> Self {
        Self {
            calories_per_minute: 10.0,
        }
    }
}

impl CalorieModel {
    /// Estimated kilocalories for `elapsed_seconds` of activity.
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn estimate(&self, elapsed_seconds: u64) -> u32 {
        let minutes = elapsed_seconds as f64 / 60.0;
        let calories = (minutes * self.calories_per_minute).round();
        if calories.is_finite() && calories > 0.0 {
            calories as u32
        } else {
            0
        }
    }
}

/// Pace, speed and calories recomputed from distance and running time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DerivedMetrics {
    /// Zero until any running time has accrued.
    pub average_speed_kmh: f64,
    /// `None` while the average speed is zero.
    pub average_pace_min_per_km: Option<f64>,
    pub estimated_calories: u32,
    /// Device-reported speed of the latest fix.
    pub current_speed_kmh: Option<f64>,
}

impl DerivedMetrics {
    #[allow(clippy::cast_precision_loss)]
    pub fn compute(
        distance_km: f64,
        elapsed_seconds: u64,
        calories: &CalorieModel,
        latest: Option<&PositionSample>,
    ) -> Self {
        let average_speed_kmh = if elapsed_seconds > 0 {
            distance_km / (elapsed_seconds as f64 / 3600.0)
        } else {
            0.0
        };
        let average_pace_min_per_km =
            (average_speed_kmh > 0.0).then(|| 60.0 / average_speed_kmh);

        Self {
            average_speed_kmh,
            average_pace_min_per_km,
            estimated_calories: calories.estimate(elapsed_seconds),
            current_speed_kmh: latest.and_then(PositionSample::speed_kmh),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calories_follow_minutes() {
        let model = CalorieModel::default();
        assert_eq!(model.estimate(0), 0);
        assert_eq!(model.estimate(60), 10);
        assert_eq!(model.estimate(90), 15);
        // 20s = 3.33 kcal rounds down
        assert_eq!(model.estimate(20), 3);
        assert_eq!(model.estimate(45), 8);
    }

    #[test]
    fn calorie_rate_is_configurable() {
        let model = CalorieModel {
            calories_per_minute: 7.5,
        };
        assert_eq!(model.estimate(120), 15);
    }

    #[test]
    fn nonsense_calorie_rate_yields_zero() {
        let model = CalorieModel {
            calories_per_minute: -3.0,
        };
        assert_eq!(model.estimate(600), 0);
    }

    #[test]
    fn zero_elapsed_guards_division() {
        let metrics = DerivedMetrics::compute(1.0, 0, &CalorieModel::default(), None);
        assert!(metrics.average_speed_kmh.abs() < f64::EPSILON);
        assert_eq!(metrics.average_pace_min_per_km, None);
        assert_eq!(metrics.estimated_calories, 0);
    }

    #[test]
    fn zero_distance_has_no_pace() {
        let metrics = DerivedMetrics::compute(0.0, 600, &CalorieModel::default(), None);
        assert!(metrics.average_speed_kmh.abs() < f64::EPSILON);
        assert_eq!(metrics.average_pace_min_per_km, None);
        assert_eq!(metrics.estimated_calories, 100);
    }

    #[test]
    fn speed_and_pace_from_distance_and_time() {
        // 5 km in 30 minutes
        let metrics = DerivedMetrics::compute(5.0, 1800, &CalorieModel::default(), None);
        assert!((metrics.average_speed_kmh - 10.0).abs() < 1e-9);
        assert!((metrics.average_pace_min_per_km.unwrap() - 6.0).abs() < 1e-9);
        assert_eq!(metrics.estimated_calories, 300);
    }

    #[test]
    fn current_speed_comes_from_latest_fix() {
        let fix = PositionSample::new(0.0, 0.0, 0).with_speed(3.0);
        let metrics = DerivedMetrics::compute(0.0, 0, &CalorieModel::default(), Some(&fix));
        let speed = metrics.current_speed_kmh.unwrap();
        assert!((speed - 10.8).abs() < 1e-9);
    }
}
