//! Map rendering seam.
//!
//! A map only ever receives state; nothing is read back from it.

use crate::sample::PositionSample;

/// A drawing surface that can show the runner and the route so far.
pub trait MapSurface {
    fn set_center(&mut self, latitude: f64, longitude: f64);
    fn set_marker(&mut self, latitude: f64, longitude: f64);
    /// Replaces the drawn route with `points` as `(lat, lon)` pairs.
    fn set_polyline(&mut self, points: &[(f64, f64)]);
}

/// Pushes the current location and route to a surface.
///
/// The view follows `current`, falling back to the end of the route. A
/// polyline is only drawn once the route has two points.
pub fn publish<S>(surface: &mut S, current: Option<&PositionSample>, route: &[PositionSample])
where
    S: MapSurface + ?Sized,
{
    if let Some(focus) = current.or_else(|| route.last()) {
        surface.set_center(focus.latitude, focus.longitude);
        surface.set_marker(focus.latitude, focus.longitude);
    }

    if route.len() > 1 {
        let points: Vec<(f64, f64)> = route
            .iter()
            .map(|sample| (sample.latitude, sample.longitude))
            .collect();
        surface.set_polyline(&points);
    }
}
