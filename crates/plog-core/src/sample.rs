//! Position samples delivered by a location provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geo::haversine_km;

/// Why a sample was refused by the tracker.
///
/// Rejected samples are dropped silently; they never abort a session.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum SampleRejection {
    /// Latitude or longitude was NaN or infinite.
    #[error("coordinates are not finite")]
    NonFinite,
    /// Latitude outside of [-90, 90].
    #[error("latitude out of range: {0}")]
    LatitudeOutOfRange(f64),
    /// Longitude outside of [-180, 180].
    #[error("longitude out of range: {0}")]
    LongitudeOutOfRange(f64),
}

/// A single position fix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// When the fix was taken, in milliseconds since the Unix epoch.
    pub captured_at_ms: i64,
    /// Device-reported ground speed in meters per second.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_mps: Option<f64>,
    /// Horizontal accuracy radius in meters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy_m: Option<f64>,
}

impl PositionSample {
    /// Creates a sample without speed or accuracy.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64, captured_at_ms: i64) -> Self {
        Self {
            latitude,
            longitude,
            captured_at_ms,
            speed_mps: None,
            accuracy_m: None,
        }
    }

    /// Sets the device-reported speed.
    #[must_use]
    pub const fn with_speed(mut self, speed_mps: f64) -> Self {
        self.speed_mps = Some(speed_mps);
        self
    }

    /// Checks that the coordinates describe a point on Earth.
    pub fn validate(&self) -> Result<(), SampleRejection> {
        if !self.latitude.is_finite() || !self.longitude.is_finite() {
            return Err(SampleRejection::NonFinite);
        }
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(SampleRejection::LatitudeOutOfRange(self.latitude));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(SampleRejection::LongitudeOutOfRange(self.longitude));
        }
        Ok(())
    }

    /// Great-circle distance to another sample, in kilometers.
    pub fn distance_km(&self, other: &Self) -> f64 {
        haversine_km(self.latitude, self.longitude, other.latitude, other.longitude)
    }

    /// Capture time as a UTC timestamp, if representable.
    pub fn captured_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.captured_at_ms)
    }

    /// Device-reported speed converted to km/h.
    pub fn speed_kmh(&self) -> Option<f64> {
        self.speed_mps
            .filter(|speed| speed.is_finite() && *speed >= 0.0)
            .map(|speed| speed * 3.6)
    }
}
