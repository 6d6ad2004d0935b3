//! Tile source to GeoJSON orchestration.
//!
//! One run loads raw tiles from a [`TileSource`], decodes each with the
//! [`TileCodec`], feeds the features to a [`FeatureAggregator`] and finally
//! hands every feature collection to a [`LayerSink`].
//!
//! Failures are isolated per tile and per feature: a tile that cannot be
//! decoded or a feature that cannot be classified is logged, counted and
//! skipped while the rest of the run continues.

mod sink;

pub use sink::{DirectorySink, LayerSink, MemorySink};

use std::collections::BTreeMap;
use std::io;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::aggregate::{FeatureAggregator, FeatureCollection, IngestReport};
use crate::codec::TileCodec;
use crate::coord::Reprojector;
use crate::source::{LoadRequest, RawTile, SourceError, TileSource};

/// Errors that end a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The sampled tile is not a compressed vector tile.
    #[error("'{0}' does not contain Mapbox vector tiles")]
    NotVectorTiles(String),

    /// The source failed to deliver tiles.
    #[error("Tile source failed: {0}")]
    Source(#[from] SourceError),

    /// A collection could not be serialized.
    #[error("Failed to serialize '{feature_path}': {source}")]
    Serialize {
        feature_path: String,
        #[source]
        source: serde_json::Error,
    },

    /// The sink rejected a collection.
    #[error("Failed to write layer '{feature_path}': {source}")]
    Sink {
        feature_path: String,
        #[source]
        source: io::Error,
    },
}

/// Summary of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
    pub tiles_loaded: usize,
    pub tiles_decoded: usize,
    pub decode_failures: usize,
    pub fetch_failures: usize,
    pub duplicate_tiles: usize,
    pub features_added: usize,
    pub features_rejected: usize,
    pub collections_written: usize,
    pub cancelled: bool,
}

impl PipelineReport {
    fn record_ingest(&mut self, report: IngestReport) {
        self.features_added += report.added;
        self.features_rejected += report.rejected;
    }
}

/// Returns true if the source's first payload decodes as a vector tile.
///
/// The sampled tile is not recorded as delivered. Any failure, including an
/// empty source, answers false.
pub fn is_vector_tile_source(source: &mut dyn TileSource, codec: &TileCodec) -> bool {
    match source.sample_payload() {
        Ok(Some(payload)) => match codec.decode(&payload) {
            Ok(_) => true,
            Err(e) => {
                debug!(source = source.source(), error = %e, "Sampled tile is not a vector tile");
                false
            }
        },
        Ok(None) => {
            debug!(source = source.source(), "Source holds no tiles to sample");
            false
        }
        Err(e) => {
            debug!(source = source.source(), error = %e, "Sampling failed");
            false
        }
    }
}

/// Drives source, codec, aggregator and sink.
#[derive(Debug, Clone, Copy)]
pub struct Pipeline {
    codec: TileCodec,
    reprojector: Reprojector,
    check_format: bool,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(TileCodec::default(), Reprojector::default())
    }
}

impl Pipeline {
    /// Creates a pipeline that checks its source's tile format before loading.
    ///
    /// Layers without a declared extent are read with the reprojector's extent.
    pub fn new(codec: TileCodec, reprojector: Reprojector) -> Self {
        Self {
            codec: codec.with_default_extent(reprojector.extent()),
            reprojector,
            check_format: true,
        }
    }

    /// Enables or disables the vector tile format check.
    pub fn with_format_check(mut self, check_format: bool) -> Self {
        self.check_format = check_format;
        self
    }

    pub fn codec(&self) -> &TileCodec {
        &self.codec
    }

    pub fn reprojector(&self) -> &Reprojector {
        &self.reprojector
    }

    /// Loads, decodes and aggregates tiles without materializing them.
    ///
    /// `for_each` is forwarded to the source and runs once per loaded item.
    pub fn collect(
        &self,
        source: &mut dyn TileSource,
        request: &LoadRequest,
        for_each: Option<&dyn Fn()>,
    ) -> Result<(FeatureAggregator, PipelineReport), PipelineError> {
        if self.check_format && !is_vector_tile_source(source, &self.codec) {
            return Err(PipelineError::NotVectorTiles(source.source().to_string()));
        }

        info!(source = source.source(), zoom = ?request.zoom, "Loading tiles");
        let mut batch = source.load_tiles(request, for_each);

        if let Some(e) = batch.error.take() {
            return Err(PipelineError::Source(e));
        }

        let mut report = PipelineReport {
            tiles_loaded: batch.tiles.len(),
            fetch_failures: batch.failed.len(),
            duplicate_tiles: batch.skipped_duplicates,
            cancelled: batch.cancelled,
            ..PipelineReport::default()
        };

        let mut aggregator = FeatureAggregator::new(self.reprojector);
        for tile in &batch.tiles {
            match self.aggregate_tile(&mut aggregator, tile) {
                Some(ingested) => {
                    report.tiles_decoded += 1;
                    report.record_ingest(ingested);
                }
                None => report.decode_failures += 1,
            }
        }

        Ok((aggregator, report))
    }

    /// Decodes one tile into the aggregator. Returns `None` if decoding failed.
    pub fn aggregate_tile(
        &self,
        aggregator: &mut FeatureAggregator,
        tile: &RawTile,
    ) -> Option<IngestReport> {
        match self.codec.decode(&tile.payload) {
            Ok(decoded) => Some(aggregator.ingest(&tile.coord, &decoded)),
            Err(e) => {
                warn!(tile = %tile.coord, error = %e, "Skipping undecodable tile");
                None
            }
        }
    }

    /// Serializes every collection and hands it to `sink`, in path order.
    pub fn materialize(
        collections: BTreeMap<String, FeatureCollection>,
        sink: &mut dyn LayerSink,
    ) -> Result<usize, PipelineError> {
        let mut written = 0;

        for (feature_path, collection) in collections {
            let json = collection
                .to_json_bytes()
                .map_err(|source| PipelineError::Serialize {
                    feature_path: feature_path.clone(),
                    source,
                })?;

            sink.materialize(&feature_path, &json)
                .map_err(|source| PipelineError::Sink {
                    feature_path: feature_path.clone(),
                    source,
                })?;

            debug!(feature_path = %feature_path, features = collection.len(), "Materialized layer");
            written += 1;
        }

        Ok(written)
    }

    /// Runs the whole pipeline.
    pub fn run(
        &self,
        source: &mut dyn TileSource,
        request: &LoadRequest,
        sink: &mut dyn LayerSink,
        for_each: Option<&dyn Fn()>,
    ) -> Result<PipelineReport, PipelineError> {
        let (aggregator, mut report) = self.collect(source, request, for_each)?;
        report.collections_written = Self::materialize(aggregator.into_collections(), sink)?;

        info!(
            tiles = report.tiles_loaded,
            decoded = report.tiles_decoded,
            decode_failures = report.decode_failures,
            fetch_failures = report.fetch_failures,
            features = report.features_added,
            rejected = report.features_rejected,
            collections = report.collections_written,
            cancelled = report.cancelled,
            "Pipeline finished"
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::proto;
    use crate::coord::{TileCoord, TileScheme};
    use crate::source::{CancelFlag, LoadedTileSet, ProgressCallback, TileBatch};
    use flate2::write::{DeflateEncoder, GzEncoder};
    use prost::Message;
    use std::io::Write;

    /// In-memory source serving a fixed list of tiles.
    struct StaticSource {
        tiles: Vec<RawTile>,
        loaded: LoadedTileSet,
        cancel: CancelFlag,
        sampled: usize,
    }

    impl StaticSource {
        fn new(tiles: Vec<RawTile>) -> Self {
            Self {
                tiles,
                loaded: LoadedTileSet::new(),
                cancel: CancelFlag::new(),
                sampled: 0,
            }
        }
    }

    impl TileSource for StaticSource {
        fn source(&self) -> &str {
            "memory"
        }

        fn name(&self) -> String {
            "memory".to_string()
        }

        fn min_zoom(&mut self) -> Option<u8> {
            None
        }

        fn max_zoom(&mut self) -> Option<u8> {
            None
        }

        fn mask_level(&mut self) -> Option<String> {
            None
        }

        fn scheme(&mut self) -> TileScheme {
            TileScheme::Tms
        }

        fn load_tiles(
            &mut self,
            _request: &LoadRequest,
            _for_each: Option<&dyn Fn()>,
        ) -> TileBatch {
            let mut batch = TileBatch::default();
            for tile in &self.tiles {
                if self.loaded.insert(tile.coord) {
                    batch.tiles.push(tile.clone());
                }
            }
            batch
        }

        fn sample_payload(&mut self) -> Result<Option<Vec<u8>>, SourceError> {
            self.sampled += 1;
            Ok(self.tiles.first().map(|t| t.payload.clone()))
        }

        fn set_progress_handler(&mut self, _handler: ProgressCallback) {}

        fn cancel_flag(&self) -> CancelFlag {
            self.cancel.clone()
        }

        fn loaded_tiles(&self) -> &LoadedTileSet {
            &self.loaded
        }
    }

    fn gzip(bytes: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(bytes).unwrap();
        encoder.finish().unwrap()
    }

    /// A tile with one point feature of the given class in layer `poi`.
    fn poi_tile(class: &str) -> Vec<u8> {
        let tile = proto::Tile {
            layers: vec![proto::Layer {
                version: Some(2),
                name: "poi".to_string(),
                features: vec![proto::Feature {
                    id: None,
                    tags: vec![0, 0],
                    r#type: Some(1),
                    geometry: vec![9, 50, 34],
                }],
                keys: vec!["class".to_string()],
                values: vec![proto::Value {
                    string_value: Some(class.to_string()),
                    ..Default::default()
                }],
                extent: Some(4096),
            }],
        };
        gzip(&tile.encode_to_vec())
    }

    fn raw(col: u32, payload: Vec<u8>) -> RawTile {
        RawTile {
            coord: TileCoord::new(14, col, 0, TileScheme::Tms),
            payload,
        }
    }

    #[test]
    fn test_format_check_accepts_vector_tiles() {
        let mut source = StaticSource::new(vec![raw(0, poi_tile("cafe"))]);
        assert!(is_vector_tile_source(&mut source, &TileCodec::default()));
        assert!(source.loaded_tiles().is_empty());
    }

    #[test]
    fn test_format_check_rejects_other_payloads() {
        let mut png = StaticSource::new(vec![raw(0, b"\x89PNG\r\n\x1a\n".to_vec())]);
        assert!(!is_vector_tile_source(&mut png, &TileCodec::default()));

        let mut empty = StaticSource::new(Vec::new());
        assert!(!is_vector_tile_source(&mut empty, &TileCodec::default()));
    }

    #[test]
    fn test_run_rejects_non_vector_source() {
        let mut source = StaticSource::new(vec![raw(0, b"not a tile".to_vec())]);
        let mut sink = MemorySink::new();

        let result = Pipeline::default().run(&mut source, &LoadRequest::zoom(14), &mut sink, None);
        assert!(matches!(result, Err(PipelineError::NotVectorTiles(_))));
        assert!(sink.layers.is_empty());
    }

    #[test]
    fn test_run_skips_undecodable_tiles() {
        let mut deflate = DeflateEncoder::new(Vec::new(), flate2::Compression::default());
        deflate.write_all(&[0x1a, 0x05, 0x01]).unwrap();
        let bad = deflate.finish().unwrap();

        let mut source = StaticSource::new(vec![
            raw(0, poi_tile("cafe")),
            raw(1, bad),
            raw(2, poi_tile("bar")),
        ]);
        let mut sink = MemorySink::new();

        let report = Pipeline::default()
            .run(&mut source, &LoadRequest::zoom(14), &mut sink, None)
            .unwrap();

        assert_eq!(report.tiles_loaded, 3);
        assert_eq!(report.tiles_decoded, 2);
        assert_eq!(report.decode_failures, 1);
        assert_eq!(report.features_added, 2);
        assert_eq!(report.collections_written, 2);
        assert_eq!(
            sink.layers.keys().cloned().collect::<Vec<_>>(),
            vec!["poi.bar", "poi.cafe"]
        );
    }

    #[test]
    fn test_run_without_format_check_skips_sampling() {
        let mut source = StaticSource::new(vec![raw(0, poi_tile("cafe"))]);
        let mut sink = MemorySink::new();

        Pipeline::default()
            .with_format_check(false)
            .run(&mut source, &LoadRequest::zoom(14), &mut sink, None)
            .unwrap();

        assert_eq!(source.sampled, 0);
        assert_eq!(sink.layers.len(), 1);
    }

    #[test]
    fn test_run_over_remote_source() {
        use crate::http::tests::MockHttpClient;
        use crate::http::NetworkError;
        use crate::source::RemoteTileSource;

        let base = "https://tiles.example.com";
        let descriptor = format!(
            r#"{{"tiles": ["{}/{{z}}/{{x}}/{{y}}.pbf"], "minzoom": 1, "maxzoom": 1}}"#,
            base
        );
        let client = MockHttpClient::new()
            .with_response(&format!("{}/tiles.json", base), descriptor.into_bytes())
            .with_response(&format!("{}/1/0/0.pbf", base), poi_tile("cafe"))
            .with_response(&format!("{}/1/1/0.pbf", base), poi_tile("bar"))
            .with_response(&format!("{}/1/0/1.pbf", base), b"garbage".to_vec())
            .with_error(
                &format!("{}/1/1/1.pbf", base),
                NetworkError::Request {
                    url: format!("{}/1/1/1.pbf", base),
                    reason: "timed out".to_string(),
                },
            );
        let mut source = RemoteTileSource::with_client(&format!("{}/tiles.json", base), client)
            .unwrap()
            .with_page_size(2);
        let mut sink = MemorySink::new();

        let report = Pipeline::default()
            .run(&mut source, &LoadRequest::zoom(1), &mut sink, None)
            .unwrap();

        assert_eq!(report.tiles_loaded, 3);
        assert_eq!(report.tiles_decoded, 2);
        assert_eq!(report.decode_failures, 1);
        assert_eq!(report.fetch_failures, 1);
        assert_eq!(report.collections_written, 2);

        // XYZ row 0 is the northern half of the world.
        let point = |path: &str| {
            let json: serde_json::Value = serde_json::from_slice(&sink.layers[path]).unwrap();
            let coords = &json["features"][0]["geometry"]["coordinates"];
            (coords[0].as_f64().unwrap(), coords[1].as_f64().unwrap())
        };
        let (cafe_x, cafe_y) = point("poi.cafe");
        let (bar_x, bar_y) = point("poi.bar");
        assert!(cafe_x < 0.0 && cafe_y > 0.0);
        assert!(bar_x > 0.0 && bar_y > 0.0);
        assert_eq!(source.loaded_tiles().len(), 3);
    }

    #[test]
    fn test_second_run_on_same_source_yields_nothing_new() {
        let mut source = StaticSource::new(vec![raw(0, poi_tile("cafe"))]);
        let pipeline = Pipeline::default();

        let first = pipeline
            .run(&mut source, &LoadRequest::zoom(14), &mut MemorySink::new(), None)
            .unwrap();
        let second = pipeline
            .run(&mut source, &LoadRequest::zoom(14), &mut MemorySink::new(), None)
            .unwrap();

        assert_eq!(first.tiles_loaded, 1);
        assert_eq!(second.tiles_loaded, 0);
        assert_eq!(second.collections_written, 0);
    }

    #[test]
    fn test_materialize_reports_sink_failure() {
        struct FailingSink;

        impl LayerSink for FailingSink {
            fn materialize(&mut self, _feature_path: &str, _json: &[u8]) -> io::Result<()> {
                Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"))
            }
        }

        let mut collections = BTreeMap::new();
        collections.insert("water".to_string(), FeatureCollection::new());

        let result = Pipeline::materialize(collections, &mut FailingSink);
        assert!(matches!(
            result,
            Err(PipelineError::Sink { ref feature_path, .. }) if feature_path == "water"
        ));
    }
}
