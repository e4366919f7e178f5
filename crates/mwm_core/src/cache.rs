//! Persistent storage of merged sample sets.
//!
//! One entry per configuration key. An entry holds the frequency axes it was
//! computed on and, per mode, the propagation constants and convergence
//! flags in row-major order. Both collections live in one document, so a
//! write either replaces the whole entry or leaves the old one in place.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use log::{info, warn};
use nalgebra::DMatrix;
use num_complex::Complex64;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::{invalid, Result};
use crate::grid::FrequencyGrid;
use crate::types::{ModeLabel, SampleSet};

const FORMAT_VERSION: u32 = 1;

/// Human-readable key identifying a physical configuration.
///
/// Independently built configurations with equal keys share cache entries.
pub fn cache_key(shape: &str, size: f64, fill: &str, clad: &str) -> String {
    format!(
        "{}_size_{}_core_{}_clad_{}",
        shape,
        format_size(size),
        fill,
        clad
    )
}

/// Shortest round-trip decimal, with a trailing `.0` for integral sizes.
fn format_size(size: f64) -> String {
    let text = size.to_string();
    if size.is_finite() && !text.contains('.') && !text.contains('e') {
        format!("{}.0", text)
    } else {
        text
    }
}

/// Raw key/document storage.
pub trait CacheStore: Send + Sync + fmt::Debug {
    /// Returns `None` when no entry exists for `key`.
    fn read(&self, key: &str) -> Result<Option<String>>;

    /// Replaces the entry for `key` in one step.
    fn write(&self, key: &str, contents: &str) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;
}

/// One JSON file per key under a root directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `~/.mwm`.
    pub fn default_root() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|home| home.join(".mwm"))
            .ok_or_else(|| invalid("could not determine the home directory for the cache"))
    }

    pub fn at_default_root() -> Result<Self> {
        Ok(Self::new(Self::default_root()?))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", key))
    }
}

impl CacheStore for FileStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn write(&self, key: &str, contents: &str) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        // Same directory as the target, so the final rename cannot cross filesystems.
        let mut staged = NamedTempFile::new_in(&self.root)?;
        staged.write_all(contents.as_bytes())?;
        staged.as_file().sync_all()?;
        staged.persist(self.path_for(key)).map_err(|err| err.error)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// Process-local store, mostly for tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl CacheStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn write(&self, key: &str, contents: &str) -> Result<()> {
        self.entries
            .write()
            .insert(key.to_string(), contents.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }
}

/// Outcome of a cache read. Only `Found` carries data.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    Found(SampleSet),
    NotFound,
    /// Stored axes differ from the configured grid; shapes are `(rows, cols)`.
    Mismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },
    Corrupted(String),
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredSamples {
    version: u32,
    ws: Vec<f64>,
    wis: Vec<f64>,
    modes: Vec<StoredMode>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredMode {
    label: ModeLabel,
    betas: Vec<Complex64>,
    convs: Vec<bool>,
}

fn row_major<T: Clone>(matrix: &DMatrix<T>) -> Vec<T> {
    let (rows, cols) = matrix.shape();
    (0..rows)
        .flat_map(|i| (0..cols).map(move |j| (i, j)))
        .map(|idx| matrix[idx].clone())
        .collect()
}

/// Writes `set` under `key`, replacing any previous entry.
pub fn save(store: &dyn CacheStore, key: &str, grid: &FrequencyGrid, set: &SampleSet) -> Result<()> {
    set.validate(grid.shape())?;
    let modes = set
        .betas
        .iter()
        .map(|(label, betas)| {
            let convs = set
                .convs
                .get(label)
                .ok_or_else(|| invalid(format!("no convergence grid for mode {}", label)))?;
            Ok(StoredMode {
                label: *label,
                betas: row_major(betas),
                convs: row_major(convs),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    let record = StoredSamples {
        version: FORMAT_VERSION,
        ws: grid.ws().to_vec(),
        wis: grid.wis().to_vec(),
        modes,
    };
    let contents = serde_json::to_string(&record)?;
    store.write(key, &contents)?;
    info!("saved {} modes to cache entry {}", record.modes.len(), key);
    Ok(())
}

/// Reads the entry for `key` and checks it against `grid`.
///
/// Store I/O failures are errors; everything else that keeps the entry from
/// being used is reported through [`CacheLookup`].
pub fn load(store: &dyn CacheStore, key: &str, grid: &FrequencyGrid) -> Result<CacheLookup> {
    let contents = match store.read(key)? {
        Some(contents) => contents,
        None => {
            info!("no cache entry for {}", key);
            return Ok(CacheLookup::NotFound);
        }
    };
    let lookup = decode(&contents, grid);
    match &lookup {
        CacheLookup::Found(set) => info!("loaded {} modes from cache entry {}", set.betas.len(), key),
        CacheLookup::Mismatch { expected, found } => warn!(
            "cache entry {} was computed on a {:?} grid, expected {:?}",
            key, found, expected
        ),
        CacheLookup::Corrupted(reason) => warn!("cache entry {} is unusable: {}", key, reason),
        CacheLookup::NotFound => {}
    }
    Ok(lookup)
}

fn decode(contents: &str, grid: &FrequencyGrid) -> CacheLookup {
    let record: StoredSamples = match serde_json::from_str(contents) {
        Ok(record) => record,
        Err(err) => return CacheLookup::Corrupted(err.to_string()),
    };
    if record.version != FORMAT_VERSION {
        return CacheLookup::Corrupted(format!("unsupported format version {}", record.version));
    }

    let expected = grid.shape();
    let found = (record.wis.len(), record.ws.len());
    if !grid.same_axes(&record.ws, &record.wis) {
        return CacheLookup::Mismatch { expected, found };
    }

    let (rows, cols) = expected;
    let mut set = SampleSet {
        betas: BTreeMap::new(),
        convs: BTreeMap::new(),
    };
    for mode in record.modes {
        if mode.betas.len() != rows * cols || mode.convs.len() != rows * cols {
            return CacheLookup::Corrupted(format!(
                "mode {} holds {}/{} values, expected {}",
                mode.label,
                mode.betas.len(),
                mode.convs.len(),
                rows * cols
            ));
        }
        if set.betas.contains_key(&mode.label) {
            return CacheLookup::Corrupted(format!("mode {} stored twice", mode.label));
        }
        set.betas
            .insert(mode.label, DMatrix::from_row_slice(rows, cols, &mode.betas));
        set.convs
            .insert(mode.label, DMatrix::from_row_slice(rows, cols, &mode.convs));
    }
    CacheLookup::Found(set)
}
