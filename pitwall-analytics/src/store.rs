//! Read-through caches for static track data
//!
//! Both stores are keyed by the normalized track key and read their backend at
//! most once per key for the life of the process.

use crate::track::TrackPath;
use pitwall_core::error::{AnalyticsError, Result};
use pitwall_core::units::Seconds;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where track records come from
///
/// `Ok(None)` means the record does not exist; `Err` means it exists (or might)
/// but could not be read.
pub trait TrackDataBackend: Send + Sync {
    /// Raw centerline record (JSON) for a track
    fn read_centerline(&self, key: &str) -> io::Result<Option<String>>;

    /// Raw reference lap record (seconds, as text) for a track
    fn read_reference_lap(&self, key: &str) -> io::Result<Option<String>>;
}

/// Filesystem layout: `<root>/tracks/<key>/points_<key>.json` and
/// `<root>/tracks/<key>/laptime.txt`
#[derive(Debug, Clone)]
pub struct FsBackend {
    root: PathBuf,
}

impl FsBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn centerline_path(&self, key: &str) -> PathBuf {
        self.track_dir(key).join(format!("points_{key}.json"))
    }

    pub fn reference_lap_path(&self, key: &str) -> PathBuf {
        self.track_dir(key).join("laptime.txt")
    }

    fn track_dir(&self, key: &str) -> PathBuf {
        self.root.join("tracks").join(key)
    }
}

fn read_optional(path: &Path) -> io::Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

impl TrackDataBackend for FsBackend {
    fn read_centerline(&self, key: &str) -> io::Result<Option<String>> {
        read_optional(&self.centerline_path(key))
    }

    fn read_reference_lap(&self, key: &str) -> io::Result<Option<String>> {
        read_optional(&self.reference_lap_path(key))
    }
}

/// In-memory records, used for built-in tracks and tests
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    centerlines: HashMap<String, String>,
    reference_laps: HashMap<String, String>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_centerline(mut self, key: &str, json: impl Into<String>) -> Self {
        self.centerlines.insert(key.to_string(), json.into());
        self
    }

    pub fn with_reference_lap(mut self, key: &str, text: impl Into<String>) -> Self {
        self.reference_laps.insert(key.to_string(), text.into());
        self
    }
}

impl TrackDataBackend for MemoryBackend {
    fn read_centerline(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.centerlines.get(key).cloned())
    }

    fn read_reference_lap(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.reference_laps.get(key).cloned())
    }
}

/// Consults each backend in order; the first one holding the record wins
pub struct ChainedBackend {
    backends: Vec<Arc<dyn TrackDataBackend>>,
}

impl ChainedBackend {
    pub fn new(backends: Vec<Arc<dyn TrackDataBackend>>) -> Self {
        Self { backends }
    }
}

impl TrackDataBackend for ChainedBackend {
    fn read_centerline(&self, key: &str) -> io::Result<Option<String>> {
        for backend in &self.backends {
            if let Some(record) = backend.read_centerline(key)? {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    fn read_reference_lap(&self, key: &str) -> io::Result<Option<String>> {
        for backend in &self.backends {
            if let Some(record) = backend.read_reference_lap(key)? {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }
}

/// Why a centerline could not be used
#[derive(Debug, Clone, PartialEq)]
pub struct LoadFailure {
    /// Error kind, as reported by `AnalyticsError::kind`
    pub kind: &'static str,
    pub message: String,
}

impl From<&AnalyticsError> for LoadFailure {
    fn from(err: &AnalyticsError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Cached track centerlines
///
/// Missing or corrupt records become an empty path so pace tracking simply
/// goes inert for that track. Corrupt or unreadable records are remembered
/// as a `LoadFailure`; a record that does not exist is not a failure.
pub struct TrackPathStore {
    backend: Arc<dyn TrackDataBackend>,
    cache: HashMap<String, Arc<TrackPath>>,
    failures: HashMap<String, LoadFailure>,
}

impl TrackPathStore {
    pub fn new(backend: Arc<dyn TrackDataBackend>) -> Self {
        Self {
            backend,
            cache: HashMap::new(),
            failures: HashMap::new(),
        }
    }

    pub fn get(&mut self, key: &str) -> Arc<TrackPath> {
        if key.is_empty() {
            return Arc::new(TrackPath::empty());
        }
        if let Some(path) = self.cache.get(key) {
            return Arc::clone(path);
        }

        let path = match self.load(key) {
            Ok(path) => path,
            Err(err) => {
                self.failures.insert(key.to_string(), LoadFailure::from(&err));
                TrackPath::empty()
            }
        };
        let path = Arc::new(path);
        self.cache.insert(key.to_string(), Arc::clone(&path));
        path
    }

    /// Load failure recorded for a cached key
    pub fn failure(&self, key: &str) -> Option<&LoadFailure> {
        self.failures.get(key)
    }

    fn load(&self, key: &str) -> Result<TrackPath> {
        match self.backend.read_centerline(key) {
            Ok(Some(data)) => match TrackPath::from_json(key, &data) {
                Ok(path) => {
                    info!(track = key, points = path.len(), "track centerline loaded");
                    Ok(path)
                }
                Err(err) => {
                    warn!(track = key, %err, "track centerline is corrupt, pace tracking disabled");
                    Err(err)
                }
            },
            Ok(None) => {
                debug!(track = key, "no track centerline, pace tracking disabled");
                Ok(TrackPath::empty())
            }
            Err(source) => {
                warn!(track = key, err = %source, "failed to read track centerline");
                Err(AnalyticsError::Io {
                    key: key.to_string(),
                    source,
                })
            }
        }
    }

    /// Forget every cached centerline so the next lookup re-reads the backend
    pub fn clear(&mut self) {
        self.cache.clear();
        self.failures.clear();
    }
}

/// Cached reference lap times, used when the live last-lap time is unusable
pub struct ReferenceLapStore {
    backend: Arc<dyn TrackDataBackend>,
    cache: HashMap<String, Option<Seconds>>,
}

impl ReferenceLapStore {
    pub fn new(backend: Arc<dyn TrackDataBackend>) -> Self {
        Self {
            backend,
            cache: HashMap::new(),
        }
    }

    /// Reference lap for a track, or `DataUnavailable`
    pub fn get(&mut self, key: &str) -> Result<Seconds> {
        let cached = match self.cache.get(key) {
            Some(cached) => *cached,
            None => {
                let loaded = self.load(key);
                self.cache.insert(key.to_string(), loaded);
                loaded
            }
        };
        cached.ok_or_else(|| AnalyticsError::DataUnavailable(format!("reference lap for '{key}'")))
    }

    fn load(&self, key: &str) -> Option<Seconds> {
        if key.is_empty() {
            return None;
        }
        let text = match self.backend.read_reference_lap(key) {
            Ok(Some(text)) => text,
            Ok(None) => {
                warn!(track = key, "no reference lap record");
                return None;
            }
            Err(err) => {
                warn!(track = key, %err, "failed to read reference lap record");
                return None;
            }
        };

        match parse_reference_lap(key, &text) {
            Ok(seconds) => {
                info!(track = key, seconds = seconds.0, "reference lap loaded");
                Some(seconds)
            }
            Err(err) => {
                warn!(track = key, %err, "reference lap record is corrupt");
                None
            }
        }
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }
}

fn parse_reference_lap(key: &str, text: &str) -> Result<Seconds> {
    let value: f32 = text.trim().parse().map_err(|e: std::num::ParseFloatError| {
        AnalyticsError::Parse {
            key: key.to_string(),
            reason: e.to_string(),
        }
    })?;
    if !value.is_finite() || value <= 0.0 {
        return Err(AnalyticsError::Parse {
            key: key.to_string(),
            reason: format!("lap time must be positive, got {value}"),
        });
    }
    Ok(Seconds(value))
}
