//! Feature aggregation.
//!
//! Decoded features are reprojected into Web Mercator meters, classified by
//! their feature path `layer[.class[.subclass]]` and appended to one GeoJSON
//! feature collection per path.

mod geojson;

pub use geojson::{
    Crs, CrsProperties, Feature, FeatureCollection, GeoJsonGeometry, Position, CRS_NAME,
};

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;
use tracing::{trace, warn};

use crate::codec::{DecodedTile, Geometry, Properties, RawFeature};
use crate::coord::{tile_bounds, Reprojector, TileCoord};

/// Property naming a feature's class.
pub const CLASS_KEY: &str = "class";

/// Property naming a feature's subclass.
pub const SUBCLASS_KEY: &str = "subclass";

/// A feature could not be added to any collection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregationError {
    /// The feature has a subclass but no class.
    #[error("Feature in layer '{layer}' has subclass '{subclass}' but no class")]
    OrphanSubclass { layer: String, subclass: String },

    /// The feature carries no coordinates.
    #[error("Feature in layer '{layer}' has an empty geometry")]
    EmptyGeometry { layer: String },
}

/// Bucket key of a feature: layer name plus optional class and subclass.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeaturePath {
    pub layer: String,
    pub class: Option<String>,
    pub subclass: Option<String>,
}

impl FeaturePath {
    /// Derives the path from a feature's `class` and `subclass` properties.
    ///
    /// Empty values count as absent.
    pub fn from_properties(layer: &str, properties: &Properties) -> Result<Self, AggregationError> {
        let lookup = |key: &str| {
            properties
                .get(key)
                .map(|v| v.to_string())
                .filter(|v| !v.is_empty())
        };

        let class = lookup(CLASS_KEY);
        let subclass = lookup(SUBCLASS_KEY);

        if let (None, Some(subclass)) = (&class, &subclass) {
            return Err(AggregationError::OrphanSubclass {
                layer: layer.to_string(),
                subclass: subclass.clone(),
            });
        }

        Ok(Self {
            layer: layer.to_string(),
            class,
            subclass,
        })
    }
}

impl fmt::Display for FeaturePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.layer)?;
        if let Some(class) = &self.class {
            write!(f, ".{}", class)?;
            if let Some(subclass) = &self.subclass {
                write!(f, ".{}", subclass)?;
            }
        }
        Ok(())
    }
}

/// A feature in world coordinates, with its resolved path.
#[derive(Debug, Clone, PartialEq)]
pub struct ReprojectedFeature {
    pub path: FeaturePath,
    pub id: Option<u64>,
    pub geometry: Geometry<f64>,
    pub properties: Properties,
}

impl ReprojectedFeature {
    /// GeoJSON form of the feature, `None` if the geometry is empty.
    pub fn to_geojson(&self) -> Option<Feature> {
        GeoJsonGeometry::from_geometry(&self.geometry).map(|geometry| Feature {
            id: self.id,
            geometry,
            properties: self.properties.clone(),
        })
    }
}

/// Counters for one or more ingested tiles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub added: usize,
    pub rejected: usize,
}

impl IngestReport {
    pub fn merge(&mut self, other: IngestReport) {
        self.added += other.added;
        self.rejected += other.rejected;
    }
}

/// Accumulates reprojected features into one collection per feature path.
///
/// Collections are created on first use of a path and only ever grow.
#[derive(Debug, Default)]
pub struct FeatureAggregator {
    reprojector: Reprojector,
    collections: BTreeMap<String, FeatureCollection>,
}

impl FeatureAggregator {
    pub fn new(reprojector: Reprojector) -> Self {
        Self {
            reprojector,
            collections: BTreeMap::new(),
        }
    }

    pub fn reprojector(&self) -> &Reprojector {
        &self.reprojector
    }

    /// Reprojects one feature of `layer` from `tile` and resolves its path.
    ///
    /// Local coordinates are scaled by the layer's `extent`.
    pub fn reproject_feature(
        &self,
        layer: &str,
        extent: u32,
        feature: &RawFeature,
        tile: &TileCoord,
    ) -> Result<ReprojectedFeature, AggregationError> {
        let path = FeaturePath::from_properties(layer, &feature.properties)?;
        if feature.geometry.is_empty() {
            return Err(AggregationError::EmptyGeometry {
                layer: layer.to_string(),
            });
        }

        let bounds = tile_bounds(tile);
        let geometry = feature
            .geometry
            .map_coords(|local| self.reprojector.reproject_scaled(local, &bounds, extent));

        Ok(ReprojectedFeature {
            path,
            id: feature.id,
            geometry,
            properties: feature.properties.clone(),
        })
    }

    /// Appends a reprojected feature to the collection of its path.
    pub fn add(&mut self, feature: ReprojectedFeature) -> Result<(), AggregationError> {
        let geojson = feature
            .to_geojson()
            .ok_or_else(|| AggregationError::EmptyGeometry {
                layer: feature.path.layer.clone(),
            })?;

        let key = feature.path.to_string();
        trace!(feature_path = %key, "Adding feature");
        self.collections.entry(key).or_default().push(geojson);
        Ok(())
    }

    /// Reprojects and adds one raw feature.
    pub fn add_feature(
        &mut self,
        layer: &str,
        extent: u32,
        feature: &RawFeature,
        tile: &TileCoord,
    ) -> Result<(), AggregationError> {
        let reprojected = self.reproject_feature(layer, extent, feature, tile)?;
        self.add(reprojected)
    }

    /// Adds every feature of every layer of a decoded tile.
    ///
    /// Rejected features are logged and skipped; the rest of the tile is
    /// still ingested.
    pub fn ingest(&mut self, tile: &TileCoord, decoded: &DecodedTile) -> IngestReport {
        let mut report = IngestReport::default();

        for layer in &decoded.layers {
            for feature in &layer.features {
                match self.add_feature(&layer.name, layer.extent, feature, tile) {
                    Ok(()) => report.added += 1,
                    Err(e) => {
                        warn!(tile = %tile, layer = %layer.name, error = %e, "Rejected feature");
                        report.rejected += 1;
                    }
                }
            }
        }

        report
    }

    /// Collection for a feature path, if any feature landed there.
    pub fn collection(&self, feature_path: &str) -> Option<&FeatureCollection> {
        self.collections.get(feature_path)
    }

    /// All collections keyed by feature path, in path order.
    pub fn collections(&self) -> &BTreeMap<String, FeatureCollection> {
        &self.collections
    }

    /// Number of distinct feature paths.
    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }

    /// Total number of features over all collections.
    pub fn feature_count(&self) -> usize {
        self.collections.values().map(FeatureCollection::len).sum()
    }

    pub fn into_collections(self) -> BTreeMap<String, FeatureCollection> {
        self.collections
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{DecodedLayer, PropertyValue};
    use crate::coord::{TileScheme, DEFAULT_EXTENT, ORIGIN_SHIFT};

    fn props(pairs: &[(&str, &str)]) -> Properties {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), PropertyValue::from(*v)))
            .collect()
    }

    fn square() -> Geometry<i64> {
        Geometry::Polygon(vec![vec![vec![
            [0, 0],
            [4096, 0],
            [4096, 4096],
            [0, 4096],
            [0, 0],
        ]]])
    }

    #[test]
    fn test_feature_path_display() {
        let path = FeaturePath::from_properties(
            "landcover",
            &props(&[("class", "wood"), ("subclass", "forest")]),
        )
        .unwrap();
        assert_eq!(path.to_string(), "landcover.wood.forest");

        let path = FeaturePath::from_properties("water", &props(&[("class", "lake")])).unwrap();
        assert_eq!(path.to_string(), "water.lake");

        let path = FeaturePath::from_properties("housenumber", &Properties::new()).unwrap();
        assert_eq!(path.to_string(), "housenumber");
    }

    #[test]
    fn test_non_string_class_is_rendered() {
        let mut properties = Properties::new();
        properties.insert("class".to_string(), PropertyValue::Int(3));

        let path = FeaturePath::from_properties("road", &properties).unwrap();
        assert_eq!(path.to_string(), "road.3");
    }

    #[test]
    fn test_orphan_subclass_rejected() {
        let result = FeaturePath::from_properties("landcover", &props(&[("subclass", "forest")]));
        assert_eq!(
            result,
            Err(AggregationError::OrphanSubclass {
                layer: "landcover".to_string(),
                subclass: "forest".to_string()
            })
        );
    }

    #[test]
    fn test_empty_class_counts_as_absent() {
        let path = FeaturePath::from_properties("poi", &props(&[("class", "")])).unwrap();
        assert_eq!(path.to_string(), "poi");

        let result =
            FeaturePath::from_properties("poi", &props(&[("class", ""), ("subclass", "cafe")]));
        assert!(matches!(result, Err(AggregationError::OrphanSubclass { .. })));
    }

    #[test]
    fn test_full_tile_polygon_at_zoom_zero() {
        let aggregator = FeatureAggregator::default();
        let feature = RawFeature::new(square(), Properties::new());
        let tile = TileCoord::new(0, 0, 0, TileScheme::Tms);

        let reprojected = aggregator
            .reproject_feature("earth", DEFAULT_EXTENT, &feature, &tile)
            .unwrap();

        let o = ORIGIN_SHIFT.trunc();
        let expected = Geometry::Polygon(vec![vec![vec![
            [-o, -o],
            [o, -o],
            [o, o],
            [-o, o],
            [-o, -o],
        ]]]);
        assert_eq!(reprojected.geometry, expected);
    }

    #[test]
    fn test_ingest_buckets_by_path() {
        let tile = TileCoord::new(1, 0, 0, TileScheme::Tms);
        let forest = props(&[("class", "wood"), ("subclass", "forest")]);
        let point = || Geometry::Point(vec![[10, 20]]);
        let decoded = DecodedTile {
            layers: vec![
                DecodedLayer {
                    name: "landcover".to_string(),
                    extent: 4096,
                    features: vec![
                        RawFeature::new(square(), forest.clone()),
                        RawFeature::new(square(), forest),
                        RawFeature::new(square(), props(&[("class", "grass")])),
                    ],
                },
                DecodedLayer {
                    name: "poi".to_string(),
                    extent: 4096,
                    features: vec![
                        RawFeature::new(point(), props(&[("subclass", "cafe")])),
                        RawFeature::new(point(), Properties::new()),
                    ],
                },
            ],
        };

        let mut aggregator = FeatureAggregator::default();
        let report = aggregator.ingest(&tile, &decoded);

        assert_eq!(report, IngestReport { added: 4, rejected: 1 });
        assert_eq!(aggregator.len(), 3);
        assert_eq!(aggregator.feature_count(), 4);
        let forests = aggregator.collection("landcover.wood.forest");
        assert_eq!(forests.map(|c| c.len()), Some(2));
        assert_eq!(aggregator.collection("landcover.grass").map(|c| c.len()), Some(1));
        assert_eq!(aggregator.collection("poi").map(|c| c.len()), Some(1));

        let keys: Vec<_> = aggregator.collections().keys().cloned().collect();
        assert_eq!(keys, vec!["landcover.grass", "landcover.wood.forest", "poi"]);
    }

    #[test]
    fn test_point_is_unwrapped() {
        let mut aggregator = FeatureAggregator::default();
        let tile = TileCoord::new(0, 0, 0, TileScheme::Tms);
        let feature = RawFeature::new(Geometry::Point(vec![[2048, 2048]]), Properties::new());
        aggregator
            .add_feature("poi", DEFAULT_EXTENT, &feature, &tile)
            .unwrap();

        let collection = aggregator.collection("poi").unwrap();
        assert_eq!(
            collection.features[0].geometry,
            GeoJsonGeometry::Point {
                coordinates: [0.0, 0.0]
            }
        );
    }

    #[test]
    fn test_empty_geometry_rejected() {
        let mut aggregator = FeatureAggregator::default();
        let tile = TileCoord::new(0, 0, 0, TileScheme::Tms);
        let result = aggregator.add_feature(
            "roads",
            DEFAULT_EXTENT,
            &RawFeature::new(Geometry::LineString(Vec::new()), Properties::new()),
            &tile,
        );

        assert!(matches!(result, Err(AggregationError::EmptyGeometry { .. })));
        assert!(aggregator.is_empty());
    }

    #[test]
    fn test_feature_id_carried() {
        let mut aggregator = FeatureAggregator::default();
        let tile = TileCoord::new(0, 0, 0, TileScheme::Tms);
        let mut feature = RawFeature::new(Geometry::Point(vec![[0, 0]]), Properties::new());
        feature.id = Some(42);

        aggregator
            .add_feature("poi", DEFAULT_EXTENT, &feature, &tile)
            .unwrap();
        assert_eq!(aggregator.collection("poi").unwrap().features[0].id, Some(42));
    }

    #[test]
    fn test_layer_extent_scales_coordinates() {
        let tile = TileCoord::new(0, 0, 0, TileScheme::Tms);
        let edge = ORIGIN_SHIFT.trunc();
        let decoded = DecodedTile {
            layers: vec![
                DecodedLayer {
                    name: "small".to_string(),
                    extent: 512,
                    features: vec![RawFeature::new(
                        Geometry::Point(vec![[512, 512]]),
                        Properties::new(),
                    )],
                },
                DecodedLayer {
                    name: "large".to_string(),
                    extent: 8192,
                    features: vec![RawFeature::new(
                        Geometry::Point(vec![[4096, 8192]]),
                        Properties::new(),
                    )],
                },
            ],
        };

        let mut aggregator = FeatureAggregator::default();
        aggregator.ingest(&tile, &decoded);

        assert_eq!(
            aggregator.collection("small").unwrap().features[0].geometry,
            GeoJsonGeometry::Point {
                coordinates: [edge, edge]
            }
        );
        assert_eq!(
            aggregator.collection("large").unwrap().features[0].geometry,
            GeoJsonGeometry::Point {
                coordinates: [0.0, edge]
            }
        );
    }
}
