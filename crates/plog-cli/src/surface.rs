//! A map surface that renders to GeoJSON.

use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value};
use plog_core::map::MapSurface;
use serde_json::Value as JsonValue;

/// Keeps the last published map state and writes it as a `FeatureCollection`.
///
/// The marker becomes a `Point` feature, the route a `LineString`; the view
/// center is stored as a foreign member. GeoJSON positions are `[lon, lat]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeoJsonSurface {
    center: Option<(f64, f64)>,
    marker: Option<(f64, f64)>,
    polyline: Vec<(f64, f64)>,
}

impl MapSurface for GeoJsonSurface {
    fn set_center(&mut self, latitude: f64, longitude: f64) {
        self.center = Some((latitude, longitude));
    }

    fn set_marker(&mut self, latitude: f64, longitude: f64) {
        self.marker = Some((latitude, longitude));
    }

    fn set_polyline(&mut self, points: &[(f64, f64)]) {
        self.polyline = points.to_vec();
    }
}

impl GeoJsonSurface {
    pub const fn center(&self) -> Option<(f64, f64)> {
        self.center
    }

    pub fn to_feature_collection(&self) -> FeatureCollection {
        let mut features = Vec::new();

        if self.polyline.len() > 1 {
            let coords = self
                .polyline
                .iter()
                .map(|&(lat, lon)| vec![lon, lat])
                .collect();
            features.push(feature(Value::LineString(coords), "route"));
        }

        if let Some((lat, lon)) = self.marker {
            features.push(feature(Value::Point(vec![lon, lat]), "marker"));
        }

        let foreign_members = self.center.map(|(lat, lon)| {
            let mut members = JsonObject::new();
            members.insert("center".to_string(), serde_json::json!([lon, lat]));
            members
        });

        FeatureCollection {
            bbox: None,
            features,
            foreign_members,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.to_feature_collection())
    }
}

fn feature(value: Value, role: &str) -> Feature {
    let mut props = JsonObject::new();
    props.insert("role".to_string(), JsonValue::String(role.to_string()));

    Feature {
        bbox: None,
        geometry: Some(Geometry::new(value)),
        id: None,
        properties: Some(props),
        foreign_members: None,
    }
}
