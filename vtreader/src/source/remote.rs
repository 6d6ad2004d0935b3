//! Remote tile source fetching from a TileJSON tile template.

use std::thread;

use tracing::{debug, error, info, trace, warn};

use super::{
    CancelFlag, LoadRequest, LoadedTileSet, ProgressCallback, ProgressHandle, RawTile,
    SourceError, TileBatch, TileJson, TileSource,
};
use crate::coord::{TileCoord, TileRange, TileScheme};
use crate::http::{HttpClient, NetworkError, ReqwestClient};

/// Number of concurrent fetches per page.
pub const DEFAULT_PAGE_SIZE: usize = 5;

/// A tile queued for fetching.
#[derive(Debug, Clone)]
struct PendingTile {
    coord: TileCoord,
    url: String,
}

/// Outcome of one page of fetches.
struct PageResult {
    results: Vec<(TileCoord, Result<Vec<u8>, NetworkError>)>,
    cancelled: bool,
}

/// Tile source fetching vector tiles over HTTP.
///
/// Fetches run in pages of `page_size` threads. Each page is joined in launch
/// order before the next page starts, so at most `page_size` requests are in
/// flight at any time.
pub struct RemoteTileSource<C: HttpClient = ReqwestClient> {
    url: String,
    client: C,
    descriptor: TileJson,
    template: String,
    page_size: usize,
    loaded: LoadedTileSet,
    progress: ProgressHandle,
    cancel: CancelFlag,
}

impl RemoteTileSource<ReqwestClient> {
    /// Connects to a TileJSON URL using a reqwest client.
    pub fn connect(url: &str, timeout_secs: u64) -> Result<Self, SourceError> {
        let client = ReqwestClient::with_timeout(timeout_secs)?;
        Self::with_client(url, client)
    }
}

impl<C: HttpClient> RemoteTileSource<C> {
    /// Validates `url` and loads its TileJSON descriptor with `client`.
    pub fn with_client(url: &str, client: C) -> Result<Self, SourceError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| SourceError::Config(format!("invalid URL '{}': {}", url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(SourceError::Config(format!(
                "URL must start with http:// or https://: {}",
                url
            )));
        }

        let descriptor = TileJson::load(&client, url)?;
        let template = descriptor
            .tile_template()
            .map(str::to_string)
            .ok_or_else(|| SourceError::Descriptor {
                url: url.to_string(),
                reason: "descriptor lists no tile URLs".to_string(),
            })?;

        info!(url, template = %template, "Connected to remote tile set");

        Ok(Self {
            url: url.to_string(),
            client,
            descriptor,
            template,
            page_size: DEFAULT_PAGE_SIZE,
            loaded: LoadedTileSet::new(),
            progress: ProgressHandle::default(),
            cancel: CancelFlag::new(),
        })
    }

    /// Sets the number of concurrent fetches per page (at least 1).
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn descriptor(&self) -> &TileJson {
        &self.descriptor
    }

    /// URL of one tile; the row is substituted as stored in the source scheme.
    pub fn tile_url(&self, coord: &TileCoord) -> String {
        self.template
            .replace("{z}", &coord.zoom.to_string())
            .replace("{x}", &coord.col.to_string())
            .replace("{y}", &coord.row.to_string())
    }

    /// Fetches one page, joining handles in launch order.
    ///
    /// Once the cancel flag is seen, remaining handles are still joined but
    /// their results are dropped.
    fn fetch_page(
        &self,
        page: &[PendingTile],
        offset: usize,
        for_each: Option<&dyn Fn()>,
    ) -> PageResult {
        let client = &self.client;

        thread::scope(|scope| {
            let handles: Vec<_> = page
                .iter()
                .map(|tile| scope.spawn(move || client.get(&tile.url)))
                .collect();

            let mut results = Vec::with_capacity(page.len());
            let mut cancelled = false;

            for (index, (tile, handle)) in page.iter().zip(handles).enumerate() {
                if cancelled {
                    let _ = handle.join();
                    continue;
                }

                if let Some(callback) = for_each {
                    callback();
                }

                if self.cancel.is_cancelled() {
                    cancelled = true;
                    let _ = handle.join();
                    continue;
                }

                let result = handle.join().unwrap_or_else(|_| {
                    Err(NetworkError::Request {
                        url: tile.url.clone(),
                        reason: "fetch thread panicked".to_string(),
                    })
                });
                results.push((tile.coord, result));

                self.progress.advance(offset + index + 1);
            }

            PageResult { results, cancelled }
        })
    }
}

impl<C: HttpClient> TileSource for RemoteTileSource<C> {
    fn source(&self) -> &str {
        &self.url
    }

    fn name(&self) -> String {
        if let Some(id) = self.descriptor.id() {
            return id.to_string();
        }
        reqwest::Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| self.url.clone())
    }

    fn min_zoom(&mut self) -> Option<u8> {
        self.descriptor.min_zoom()
    }

    fn max_zoom(&mut self) -> Option<u8> {
        self.descriptor.max_zoom()
    }

    fn mask_level(&mut self) -> Option<String> {
        self.descriptor.mask_level()
    }

    fn scheme(&mut self) -> TileScheme {
        self.descriptor.scheme()
    }

    /// Loads tiles at one zoom level.
    ///
    /// Without an explicit zoom the descriptor's minimum zoom (or 0) is used,
    /// since enumerating every zoom of a remote tile set is unbounded.
    fn load_tiles(&mut self, request: &LoadRequest, for_each: Option<&dyn Fn()>) -> TileBatch {
        self.cancel.reset();
        let mut batch = TileBatch::default();

        let scheme = self.scheme();
        let zoom = request
            .zoom
            .or_else(|| self.descriptor.min_zoom())
            .unwrap_or(0);

        let resolved = LoadRequest {
            zoom: Some(zoom),
            ..*request
        };
        if let Err(e) = resolved.validate() {
            error!(url = %self.url, error = %e, "Rejected load request");
            batch.error = Some(e.into());
            return batch;
        }
        let range = request.range.unwrap_or_else(|| TileRange::full(zoom));

        let mut pending = Vec::new();
        for (col, row) in range.iter() {
            if request.max_tiles.is_some_and(|max| pending.len() >= max) {
                break;
            }

            let coord = TileCoord::new(zoom, col, row, scheme);
            if self.loaded.contains(&coord) {
                trace!(tile = %coord, "Skipping already loaded tile");
                batch.skipped_duplicates += 1;
                continue;
            }

            pending.push(PendingTile {
                coord,
                url: self.tile_url(&coord),
            });
        }

        let total = pending.len();
        self.progress
            .start(format!("Getting {} tiles from source...", total), total);
        debug!(zoom, total, page_size = self.page_size, "Fetching remote tiles");

        let mut fetched = Vec::with_capacity(total);
        for (page_index, page) in pending.chunks(self.page_size).enumerate() {
            if self.cancel.is_cancelled() {
                batch.cancelled = true;
                break;
            }

            let page_result = self.fetch_page(page, page_index * self.page_size, for_each);
            for (coord, result) in page_result.results {
                match result {
                    Ok(payload) => fetched.push(RawTile { coord, payload }),
                    Err(e) => {
                        warn!(tile = %coord, error = %e, "Tile fetch failed");
                        batch.failed.push((coord, e));
                    }
                }
            }

            if page_result.cancelled {
                batch.cancelled = true;
                break;
            }
        }

        for tile in fetched {
            if self.loaded.insert(tile.coord) {
                batch.tiles.push(tile);
            }
        }

        if batch.cancelled {
            info!(delivered = batch.tiles.len(), "Remote load cancelled");
        }
        debug!(
            delivered = batch.tiles.len(),
            failed = batch.failed.len(),
            duplicates = batch.skipped_duplicates,
            "Remote load finished"
        );
        batch
    }

    /// Fetches the top-left tile of the minimum zoom.
    fn sample_payload(&mut self) -> Result<Option<Vec<u8>>, SourceError> {
        let zoom = self.descriptor.min_zoom().unwrap_or(0);
        let coord = TileCoord::new(zoom, 0, 0, TileScheme::Xyz).with_scheme(self.scheme());
        let payload = self.client.get(&self.tile_url(&coord))?;
        Ok(Some(payload))
    }

    fn set_progress_handler(&mut self, handler: ProgressCallback) {
        self.progress.set(handler);
    }

    fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    fn loaded_tiles(&self) -> &LoadedTileSet {
        &self.loaded
    }
}
