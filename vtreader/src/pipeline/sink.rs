//! Layer materialization targets.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Receives one serialized feature collection per feature path.
pub trait LayerSink {
    fn materialize(&mut self, feature_path: &str, json: &[u8]) -> io::Result<()>;
}

/// Writes each collection to `<directory>/<feature_path>.geojson`.
///
/// Feature paths that sanitize to the same file name get a numeric suffix,
/// so `poi.a/b` and `poi.a_b` never overwrite each other.
#[derive(Debug)]
pub struct DirectorySink {
    directory: PathBuf,
    written: Vec<PathBuf>,
    owners: HashMap<PathBuf, String>,
}

impl DirectorySink {
    /// Creates the directory if needed.
    pub fn new(directory: impl Into<PathBuf>) -> io::Result<Self> {
        let directory = directory.into();
        fs::create_dir_all(&directory)?;
        Ok(Self {
            directory,
            written: Vec::new(),
            owners: HashMap::new(),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Files written so far, in write order.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    /// Target file for a feature path, before collision handling.
    pub fn file_path(&self, feature_path: &str) -> PathBuf {
        self.directory
            .join(format!("{}.geojson", sanitize_file_name(feature_path)))
    }

    /// Returns the file owned by `feature_path`, claiming a free one if needed.
    fn claim(&mut self, feature_path: &str) -> PathBuf {
        let base = self.file_path(feature_path);
        let mut path = base.clone();
        let mut suffix = 1;

        while let Some(owner) = self.owners.get(&path) {
            if owner == feature_path {
                return path;
            }
            suffix += 1;
            path = self.directory.join(format!(
                "{}_{}.geojson",
                sanitize_file_name(feature_path),
                suffix
            ));
        }

        if path != base {
            warn!(
                feature_path,
                path = %path.display(),
                "File name already used by another feature path, writing to a suffixed file"
            );
        }
        self.owners.insert(path.clone(), feature_path.to_string());
        path
    }
}

impl LayerSink for DirectorySink {
    fn materialize(&mut self, feature_path: &str, json: &[u8]) -> io::Result<()> {
        let path = self.claim(feature_path);
        fs::write(&path, json)?;
        debug!(feature_path, path = %path.display(), bytes = json.len(), "Wrote layer");
        self.written.push(path);
        Ok(())
    }
}

/// Keeps collections in memory, keyed by feature path.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub layers: BTreeMap<String, Vec<u8>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LayerSink for MemorySink {
    fn materialize(&mut self, feature_path: &str, json: &[u8]) -> io::Result<()> {
        self.layers.insert(feature_path.to_string(), json.to_vec());
        Ok(())
    }
}

/// Replaces characters that cannot appear in a file name.
fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}
