//! GeoJSON output model.

use serde::Serialize;

use crate::codec::{Geometry, Properties};

/// Named CRS attached to every collection (Web Mercator meters).
pub const CRS_NAME: &str = "urn:ogc:def:crs:EPSG::3857";

pub type Position = [f64; 2];

/// GeoJSON geometry object.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum GeoJsonGeometry {
    Point { coordinates: Position },
    MultiPoint { coordinates: Vec<Position> },
    LineString { coordinates: Vec<Position> },
    MultiLineString { coordinates: Vec<Vec<Position>> },
    Polygon { coordinates: Vec<Vec<Position>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Position>>> },
}

impl GeoJsonGeometry {
    /// Builds the GeoJSON form of a world-coordinate geometry.
    ///
    /// Single parts map to the simple types, several parts to the `Multi*`
    /// types. Returns `None` for an empty geometry.
    pub fn from_geometry(geometry: &Geometry<f64>) -> Option<Self> {
        match geometry {
            Geometry::Point(points) => match points.as_slice() {
                [] => None,
                [point] => Some(GeoJsonGeometry::Point { coordinates: *point }),
                _ => Some(GeoJsonGeometry::MultiPoint {
                    coordinates: points.clone(),
                }),
            },
            Geometry::LineString(lines) => match lines.as_slice() {
                [] => None,
                [line] => Some(GeoJsonGeometry::LineString {
                    coordinates: line.clone(),
                }),
                _ => Some(GeoJsonGeometry::MultiLineString {
                    coordinates: lines.clone(),
                }),
            },
            Geometry::Polygon(polygons) => match polygons.as_slice() {
                [] => None,
                [rings] => Some(GeoJsonGeometry::Polygon {
                    coordinates: rings.clone(),
                }),
                _ => Some(GeoJsonGeometry::MultiPolygon {
                    coordinates: polygons.clone(),
                }),
            },
        }
    }

    /// GeoJSON type name.
    pub fn type_name(&self) -> &'static str {
        match self {
            GeoJsonGeometry::Point { .. } => "Point",
            GeoJsonGeometry::MultiPoint { .. } => "MultiPoint",
            GeoJsonGeometry::LineString { .. } => "LineString",
            GeoJsonGeometry::MultiLineString { .. } => "MultiLineString",
            GeoJsonGeometry::Polygon { .. } => "Polygon",
            GeoJsonGeometry::MultiPolygon { .. } => "MultiPolygon",
        }
    }
}

/// GeoJSON feature.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename = "Feature")]
pub struct Feature {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub geometry: GeoJsonGeometry,
    pub properties: Properties,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrsProperties {
    pub name: String,
}

/// Named coordinate reference system member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Crs {
    #[serde(rename = "type")]
    pub kind: String,
    pub properties: CrsProperties,
}

impl Default for Crs {
    fn default() -> Self {
        Self {
            kind: "name".to_string(),
            properties: CrsProperties {
                name: CRS_NAME.to_string(),
            },
        }
    }
}

/// GeoJSON feature collection tagged with the Web Mercator CRS.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "type", rename = "FeatureCollection")]
pub struct FeatureCollection {
    pub crs: Crs,
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, feature: Feature) {
        self.features.push(feature);
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Serializes the collection as compact JSON.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::PropertyValue;
    use serde_json::json;

    #[test]
    fn test_single_and_multi_parts() {
        let point = Geometry::Point(vec![[1.0, 2.0]]);
        assert_eq!(
            GeoJsonGeometry::from_geometry(&point),
            Some(GeoJsonGeometry::Point {
                coordinates: [1.0, 2.0]
            })
        );

        let points = Geometry::Point(vec![[1.0, 2.0], [3.0, 4.0]]);
        assert_eq!(
            GeoJsonGeometry::from_geometry(&points).map(|g| g.type_name()),
            Some("MultiPoint")
        );

        let lines = Geometry::LineString(vec![
            vec![[0.0, 0.0], [1.0, 1.0]],
            vec![[2.0, 2.0], [3.0, 3.0]],
        ]);
        assert_eq!(
            GeoJsonGeometry::from_geometry(&lines).map(|g| g.type_name()),
            Some("MultiLineString")
        );

        let empty: Geometry<f64> = Geometry::Polygon(Vec::new());
        assert_eq!(GeoJsonGeometry::from_geometry(&empty), None);
    }

    #[test]
    fn test_feature_collection_json_shape() {
        let mut properties = Properties::new();
        properties.insert("class".to_string(), PropertyValue::from("wood"));

        let mut collection = FeatureCollection::new();
        collection.push(Feature {
            id: Some(7),
            geometry: GeoJsonGeometry::Point {
                coordinates: [1.5, -2.0],
            },
            properties,
        });

        let value: serde_json::Value =
            serde_json::from_slice(&collection.to_json_bytes().unwrap()).unwrap();

        assert_eq!(
            value,
            json!({
                "type": "FeatureCollection",
                "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::3857"}},
                "features": [{
                    "type": "Feature",
                    "id": 7,
                    "geometry": {"type": "Point", "coordinates": [1.5, -2.0]},
                    "properties": {"class": "wood"}
                }]
            })
        );
    }

    #[test]
    fn test_feature_without_id_omits_member() {
        let feature = Feature {
            id: None,
            geometry: GeoJsonGeometry::LineString {
                coordinates: vec![[0.0, 0.0], [1.0, 1.0]],
            },
            properties: Properties::new(),
        };

        let value = serde_json::to_value(&feature).unwrap();
        assert!(value.get("id").is_none());
        assert_eq!(value["geometry"]["type"], "LineString");
    }
}
