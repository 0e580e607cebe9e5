//! Minimal GeoJSON model for map-driving payloads
//!
//! Only what the `filter_update` task payload needs: a FeatureCollection
//! carried through to the map layer. Geometry coordinates stay as raw
//! JSON — the client never does geometry math, it only forwards.

use serde::{Deserialize, Serialize};

/// A GeoJSON FeatureCollection as delivered by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: String,
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            kind: "FeatureCollection".into(),
            features,
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
    #[serde(default)]
    pub geometry: Option<Geometry>,
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    #[serde(rename = "type")]
    pub kind: String,
    pub coordinates: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_feature_collection() {
        let raw = r#"{
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "id": "42101001500",
                    "geometry": {"type": "Polygon", "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]]]},
                    "properties": {"incident_count": 12}
                }
            ]
        }"#;

        let fc: FeatureCollection = serde_json::from_str(raw).unwrap();
        assert_eq!(fc.kind, "FeatureCollection");
        assert_eq!(fc.len(), 1);
        let feature = &fc.features[0];
        assert_eq!(feature.properties["incident_count"], 12);
        assert_eq!(feature.geometry.as_ref().unwrap().kind, "Polygon");
    }

    #[test]
    fn test_empty_collection_roundtrip() {
        let fc = FeatureCollection::new(vec![]);
        assert!(fc.is_empty());

        let value = serde_json::to_value(&fc).unwrap();
        assert_eq!(value["type"], "FeatureCollection");
        let back: FeatureCollection = serde_json::from_value(value).unwrap();
        assert_eq!(back, fc);
    }

    #[test]
    fn test_feature_without_geometry() {
        let raw = r#"{"type": "Feature", "properties": {}}"#;
        let feature: Feature = serde_json::from_str(raw).unwrap();
        assert!(feature.geometry.is_none());
        assert!(feature.id.is_none());
    }
}
