//! Progress reporting, cooperative cancellation and per-source dedup state.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::coord::{TileCoord, TileScheme};

/// Progress notification emitted by a tile source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// A new bounded task starts.
    Started { message: String, max_progress: usize },
    /// Number of items processed so far in the current task.
    Advanced { progress: usize },
}

/// Callback receiving progress notifications.
pub type ProgressCallback = Box<dyn Fn(ProgressEvent) + Send + Sync>;

/// Optional progress callback owned by a source.
#[derive(Default)]
pub struct ProgressHandle {
    callback: Option<ProgressCallback>,
}

impl ProgressHandle {
    /// Installs (or replaces) the callback.
    pub fn set(&mut self, callback: ProgressCallback) {
        self.callback = Some(callback);
    }

    /// Announces a new task of `max_progress` items.
    pub fn start(&self, message: impl Into<String>, max_progress: usize) {
        if let Some(cb) = &self.callback {
            cb(ProgressEvent::Started {
                message: message.into(),
                max_progress,
            });
        }
    }

    /// Reports the current item count.
    pub fn advance(&self, progress: usize) {
        if let Some(cb) = &self.callback {
            cb(ProgressEvent::Advanced { progress });
        }
    }
}

impl fmt::Debug for ProgressHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressHandle")
            .field("installed", &self.callback.is_some())
            .finish()
    }
}

/// Shared cancellation flag.
///
/// Cloning yields a handle to the same flag, so a signal handler or UI thread
/// can request cancellation while a source is loading. The source only polls
/// the flag between rows, pages and joined fetches.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Creates a flag that is not set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns true once cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clears the flag.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Tiles already delivered by one source instance.
///
/// Entries are stored in the TMS convention, so the same tile addressed in
/// either scheme is recorded once. Never cleared while the source lives; a
/// new source starts with an empty set.
#[derive(Debug, Clone, Default)]
pub struct LoadedTileSet {
    tiles: HashSet<TileCoord>,
}

impl LoadedTileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a tile. Returns false if it was already recorded.
    pub fn insert(&mut self, tile: TileCoord) -> bool {
        self.tiles.insert(tile.with_scheme(TileScheme::Tms))
    }

    pub fn contains(&self, tile: &TileCoord) -> bool {
        self.tiles.contains(&tile.with_scheme(TileScheme::Tms))
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_progress_handle_without_callback_is_silent() {
        let handle = ProgressHandle::default();
        handle.start("nothing", 3);
        handle.advance(1);
    }

    #[test]
    fn test_progress_handle_forwards_events() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);

        let mut handle = ProgressHandle::default();
        handle.set(Box::new(move |e| sink.lock().unwrap().push(e)));
        handle.start("Reading", 2);
        handle.advance(1);

        let events = events.lock().unwrap();
        assert_eq!(
            *events,
            vec![
                ProgressEvent::Started {
                    message: "Reading".to_string(),
                    max_progress: 2
                },
                ProgressEvent::Advanced { progress: 1 },
            ]
        );
    }

    #[test]
    fn test_cancel_flag_shared_between_clones() {
        let flag = CancelFlag::new();
        let other = flag.clone();

        other.cancel();
        assert!(flag.is_cancelled());

        flag.reset();
        assert!(!other.is_cancelled());
    }

    #[test]
    fn test_loaded_set_dedups_across_schemes() {
        let mut set = LoadedTileSet::new();
        assert!(set.insert(TileCoord::new(2, 1, 0, TileScheme::Tms)));
        assert!(!set.insert(TileCoord::new(2, 1, 3, TileScheme::Xyz)));
        assert!(set.contains(&TileCoord::new(2, 1, 3, TileScheme::Xyz)));
        assert!(!set.contains(&TileCoord::new(2, 1, 0, TileScheme::Xyz)));
        assert_eq!(set.len(), 1);
    }
}
