//! Per-car pace tracking and sector dominance
//!
//! Each observed car is snapped to the nearest centerline point every tick.
//! Forward motion between two snaps yields a speed that is written to every
//! point crossed and averaged per sector. When a car leaves a sector, the
//! sector's running average is committed and the previous pass is kept for
//! comparison, which is what the dominance projection colors.

use crate::track::TrackPath;
use chrono::{DateTime, Utc};
use pitwall_core::view::{DominanceClass, DominanceSegment, Rgb};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// Samples closer together than this are duplicates
pub const MIN_SAMPLE_DT: f32 = 1e-6;
/// Relative changes below this are noise
pub const DOMINANCE_DEADBAND: f32 = 0.03;
/// Relative change that maps to full color
pub const DOMINANCE_SATURATION: f32 = 0.10;

/// How path indices are grouped into sectors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectorLayout {
    sector_length: usize,
    sector_count: usize,
    path_len: usize,
}

impl SectorLayout {
    /// Layout for a path of `path_len` points; None for an empty path
    ///
    /// An explicit `sector_count` splits the path evenly (the last sector takes
    /// the remainder). Otherwise sectors are `default_length` points long and
    /// the count is rounded up.
    pub fn new(path_len: usize, sector_count: Option<usize>, default_length: usize) -> Option<Self> {
        if path_len == 0 {
            return None;
        }
        let (sector_length, sector_count) = match sector_count.filter(|&c| c > 0) {
            Some(count) => ((path_len / count).max(1), count),
            None => {
                let length = default_length.max(1);
                (length, path_len.div_ceil(length))
            }
        };
        Some(Self {
            sector_length,
            sector_count,
            path_len,
        })
    }

    pub fn sector_length(&self) -> usize {
        self.sector_length
    }

    pub fn sector_count(&self) -> usize {
        self.sector_count
    }

    pub fn sector_of(&self, index: usize) -> usize {
        (index / self.sector_length).min(self.sector_count - 1)
    }

    /// Path index range `[start, end)` covered by a sector
    pub fn bounds(&self, sector: usize) -> (usize, usize) {
        let start = (sector * self.sector_length).min(self.path_len);
        let end = if sector + 1 >= self.sector_count {
            self.path_len
        } else {
            ((sector + 1) * self.sector_length).min(self.path_len)
        };
        (start, end)
    }
}

/// Speed recorded at one path point
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PointSpeed {
    pub speed: f32,
    pub last_speed: f32,
}

/// Speed aggregate for one sector
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Sector {
    /// Average of the last completed pass
    pub avg: f32,
    /// Average of the pass before that
    pub prev_avg: f32,
    pub running_sum: f32,
    pub running_count: u32,
}

impl Sector {
    fn accumulate(&mut self, speed: f32) {
        self.running_sum += speed;
        self.running_count += 1;
    }

    fn commit(&mut self) {
        if self.running_count == 0 {
            return;
        }
        self.prev_avg = self.avg;
        self.avg = self.running_sum / self.running_count as f32;
        self.clear_running();
    }

    fn clear_running(&mut self) {
        self.running_sum = 0.0;
        self.running_count = 0;
    }
}

/// Tracking state for one car
#[derive(Debug, Clone)]
pub struct PaceState {
    pub points: Vec<PointSpeed>,
    pub last_seen_index: Option<usize>,
    pub last_seen_time: DateTime<Utc>,
    pub current_sector: Option<usize>,
    pub sectors: Vec<Sector>,
}

impl PaceState {
    fn new(path_len: usize, sector_count: usize, index: usize, now: DateTime<Utc>) -> Self {
        Self {
            points: vec![PointSpeed::default(); path_len],
            last_seen_index: Some(index),
            last_seen_time: now,
            current_sector: None,
            sectors: vec![Sector::default(); sector_count],
        }
    }

    /// Forget the position after a teleport; committed averages survive
    fn relocate(&mut self, index: usize, now: DateTime<Utc>) {
        self.last_seen_index = Some(index);
        self.last_seen_time = now;
        self.current_sector = None;
        for sector in &mut self.sectors {
            sector.clear_running();
        }
    }
}

/// What a single observation did to a car's state
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PaceUpdate {
    /// No usable track path
    Inert,
    /// First sighting of the car
    Initialized { index: usize },
    /// Duplicate or stale sample
    Skipped,
    /// Still nearest to the same point
    Stationary,
    /// Small backward move, treated as snapping noise; `index` is the snapped
    /// point, the car stays anchored at the furthest point reached
    Jitter { index: usize },
    /// Implausible jump; position re-anchored without a speed
    Reset { index: usize },
    /// Normal forward motion over `steps` points
    Advanced { index: usize, steps: usize, speed: f32 },
}

/// Pace tracker for every car on one track
pub struct PaceTracker {
    path: Arc<TrackPath>,
    layout: Option<SectorLayout>,
    cars: HashMap<u32, PaceState>,
    stale_after: f32,
}

impl PaceTracker {
    pub fn new(
        path: Arc<TrackPath>,
        sector_count: Option<usize>,
        default_sector_length: usize,
        stale_after_secs: f32,
    ) -> Self {
        let layout = SectorLayout::new(path.len(), sector_count, default_sector_length);
        Self {
            path,
            layout,
            cars: HashMap::new(),
            stale_after: stale_after_secs,
        }
    }

    pub fn path(&self) -> &TrackPath {
        &self.path
    }

    pub fn layout(&self) -> Option<SectorLayout> {
        self.layout
    }

    pub fn is_inert(&self) -> bool {
        self.layout.is_none()
    }

    pub fn tracked_cars(&self) -> usize {
        self.cars.len()
    }

    pub fn state(&self, car_id: u32) -> Option<&PaceState> {
        self.cars.get(&car_id)
    }

    /// Feed one position sample for a car
    pub fn observe(&mut self, car_id: u32, x: f32, z: f32, now: DateTime<Utc>) -> PaceUpdate {
        let Some(layout) = self.layout else {
            return PaceUpdate::Inert;
        };
        let Some(index) = self.path.nearest_index(x, z) else {
            trace!(car_id, x, z, "unusable position sample");
            return PaceUpdate::Skipped;
        };
        let n = self.path.len();

        let state = match self.cars.entry(car_id) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                debug!(car_id, index, "tracking new car");
                entry.insert(PaceState::new(n, layout.sector_count(), index, now));
                return PaceUpdate::Initialized { index };
            }
        };

        let dt = match (now - state.last_seen_time).num_microseconds() {
            Some(us) => us as f32 / 1_000_000.0,
            None => return PaceUpdate::Skipped,
        };
        if dt <= MIN_SAMPLE_DT {
            return PaceUpdate::Skipped;
        }

        let Some(old) = state.last_seen_index else {
            state.relocate(index, now);
            return PaceUpdate::Reset { index };
        };

        let delta = circular_delta(old, index, n);
        if delta == 0 {
            state.last_seen_time = now;
            return PaceUpdate::Stationary;
        }
        if delta < 0 {
            if delta.unsigned_abs() > layout.sector_length() {
                debug!(car_id, from = old, to = index, "implausible position jump, re-anchoring");
                state.relocate(index, now);
                return PaceUpdate::Reset { index };
            }
            // Stay anchored at `old` so the next forward walk does not
            // revisit points already credited this pass
            trace!(car_id, from = old, to = index, "backward jitter ignored");
            state.last_seen_time = now;
            return PaceUpdate::Jitter { index };
        }

        let steps = delta as usize;
        let speed = self.path.distance(old, index) / dt;
        for k in 1..=steps {
            let i = (old + k) % n;
            let sector = layout.sector_of(i);
            if let Some(active) = state.current_sector {
                if active != sector {
                    state.sectors[active].commit();
                }
            }
            state.current_sector = Some(sector);

            let point = &mut state.points[i];
            point.last_speed = point.speed;
            point.speed = speed;
            state.sectors[sector].accumulate(speed);
        }
        state.last_seen_index = Some(index);
        state.last_seen_time = now;

        PaceUpdate::Advanced { index, steps, speed }
    }

    /// Drop cars that have not been observed for the stale window
    pub fn evict_stale(&mut self, now: DateTime<Utc>) -> usize {
        let stale_after = self.stale_after;
        let before = self.cars.len();
        self.cars.retain(|car_id, state| {
            let idle = (now - state.last_seen_time).num_milliseconds() as f32 / 1000.0;
            let keep = idle <= stale_after;
            if !keep {
                debug!(car_id, idle, "evicting stale car");
            }
            keep
        });
        before - self.cars.len()
    }

    /// Dominance segments for the reference car, one per sector
    ///
    /// Sectors the reference car has not completed twice are neutral; an
    /// unknown reference car yields all-neutral segments.
    pub fn dominance(&self, reference_car: Option<u32>) -> Vec<DominanceSegment> {
        let Some(layout) = self.layout else {
            return Vec::new();
        };
        let state = reference_car.and_then(|id| self.cars.get(&id));

        (0..layout.sector_count())
            .filter_map(|sector| {
                let (start_index, end_index) = layout.bounds(sector);
                if start_index >= end_index {
                    return None;
                }
                let (avg, prev_avg) = state
                    .map(|s| (s.sectors[sector].avg, s.sectors[sector].prev_avg))
                    .unwrap_or_default();
                let shade = classify(avg, prev_avg);
                Some(DominanceSegment {
                    sector,
                    start_index,
                    end_index,
                    rel: shade.rel,
                    class: shade.class,
                    intensity: shade.intensity,
                    color: shade.color,
                })
            })
            .collect()
    }

    pub fn reset(&mut self) {
        self.cars.clear();
    }
}

/// Signed index change on a closed loop, in (-n/2, n/2]
fn circular_delta(old: usize, new: usize, n: usize) -> isize {
    let forward = (new + n - old) % n;
    if forward <= n / 2 {
        forward as isize
    } else {
        -((n - forward) as isize)
    }
}

/// Classification of one sector's pace change
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shade {
    pub rel: f32,
    pub class: DominanceClass,
    pub intensity: f32,
    pub color: Rgb,
}

/// Classify a sector by its relative average-speed change
pub fn classify(avg: f32, prev_avg: f32) -> Shade {
    let neutral = |rel| Shade {
        rel,
        class: DominanceClass::Neutral,
        intensity: 0.0,
        color: Rgb::NEUTRAL,
    };

    // Without a committed previous pass there is nothing to compare against
    if prev_avg <= 0.0 {
        return neutral(0.0);
    }
    let rel = (avg - prev_avg) / prev_avg.max(1e-6);
    if rel.abs() < DOMINANCE_DEADBAND {
        return neutral(rel);
    }

    let scaled = rel.clamp(-DOMINANCE_SATURATION, DOMINANCE_SATURATION) / DOMINANCE_SATURATION;
    let intensity = scaled.abs();
    let (class, target) = if rel > 0.0 {
        (DominanceClass::Improved, Rgb::IMPROVED)
    } else {
        (DominanceClass::Worse, Rgb::WORSE)
    };
    Shade {
        rel,
        class,
        intensity,
        color: Rgb::NEUTRAL.lerp(target, intensity),
    }
}
