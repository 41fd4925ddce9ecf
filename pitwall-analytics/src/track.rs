//! Track centerline geometry

use pitwall_core::error::{AnalyticsError, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;

/// Strip simulator padding from a raw track identifier
///
/// Shared-memory strings are fixed-size buffers; everything after the first
/// NUL is garbage.
pub fn clean_track_name(raw: &str) -> &str {
    raw.split('\0').next().unwrap_or_default().trim()
}

/// Cache and file key for a raw track identifier
pub fn normalize_track_key(raw: &str) -> String {
    clean_track_name(raw).to_lowercase().replace(' ', "_")
}

/// Ordered, duplicate-free centerline of one track in the (x, z) plane
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackPath {
    points: Arc<Vec<[f32; 2]>>,
}

impl TrackPath {
    /// Build a path, dropping repeated points (first occurrence wins)
    ///
    /// Recorded laps contain the same point many times while the car sits
    /// still; nearest-point lookups need every index to be distinct.
    pub fn new(points: impl IntoIterator<Item = [f32; 2]>) -> Self {
        let mut seen = HashSet::new();
        let points: Vec<[f32; 2]> = points
            .into_iter()
            .filter(|p| p[0].is_finite() && p[1].is_finite())
            .filter(|p| seen.insert((p[0].to_bits(), p[1].to_bits())))
            .collect();
        Self {
            points: Arc::new(points),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[[f32; 2]] {
        self.points.as_slice()
    }

    /// Shared handle to the points, for views that outlive the borrow
    pub fn shared_points(&self) -> Arc<Vec<[f32; 2]>> {
        Arc::clone(&self.points)
    }

    pub fn point(&self, index: usize) -> Option<[f32; 2]> {
        self.points.get(index).copied()
    }

    /// Index of the point closest to (x, z); ties go to the lowest index
    ///
    /// None for an empty path or a non-finite query.
    pub fn nearest_index(&self, x: f32, z: f32) -> Option<usize> {
        if !x.is_finite() || !z.is_finite() {
            return None;
        }
        let mut best: Option<(usize, f32)> = None;
        for (i, p) in self.points.iter().enumerate() {
            let dx = p[0] - x;
            let dz = p[1] - z;
            let d2 = dx * dx + dz * dz;
            match best {
                Some((_, best_d2)) if d2 >= best_d2 => {}
                _ => best = Some((i, d2)),
            }
        }
        best.map(|(i, _)| i)
    }

    /// Straight-line distance between two path points
    pub fn distance(&self, a: usize, b: usize) -> f32 {
        match (self.point(a), self.point(b)) {
            (Some(p), Some(q)) => ((p[0] - q[0]).powi(2) + (p[1] - q[1]).powi(2)).sqrt(),
            _ => 0.0,
        }
    }

    /// Parse a centerline record
    ///
    /// Accepts an array of `{"x":..,"z":..}` objects (other fields ignored),
    /// an array of `[x, z]` pairs, or an object holding either under `points`.
    pub fn from_json(key: &str, data: &str) -> Result<Self> {
        let record: CenterlineRecord =
            serde_json::from_str(data).map_err(|e| AnalyticsError::Parse {
                key: key.to_string(),
                reason: e.to_string(),
            })?;

        let points = match record {
            CenterlineRecord::Points(points) | CenterlineRecord::Wrapped { points } => points,
        };
        Ok(Self::new(points.into_iter().map(RecordPoint::into_xz)))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CenterlineRecord {
    Points(Vec<RecordPoint>),
    Wrapped { points: Vec<RecordPoint> },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RecordPoint {
    Object { x: f32, z: f32 },
    Pair([f32; 2]),
}

impl RecordPoint {
    fn into_xz(self) -> [f32; 2] {
        match self {
            RecordPoint::Object { x, z } => [x, z],
            RecordPoint::Pair(p) => p,
        }
    }
}
