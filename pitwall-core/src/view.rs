//! View-models produced by the analytics engine
//!
//! One `AnalyticsFrame` is produced per tick. It carries three independent
//! views (fuel, tyres, track) so presentation can render whichever it needs.

use crate::model::{SessionFlag, WheelSet};
use crate::units::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;

/// Everything the engine derived from one snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsFrame {
    /// Timestamp of the snapshot this frame was derived from
    pub timestamp: DateTime<Utc>,

    /// Normalized track key
    pub track_key: String,

    /// Fuel projection; None when no estimate is available this tick
    pub fuel: Option<FuelPlan>,

    /// Tyre view; None when the tick's tyre inputs were rejected
    pub tyres: Option<TyreView>,

    pub track: TrackView,

    /// Per-component problems encountered this tick
    pub issues: Vec<ComponentIssue>,
}

/// Fuel-strategy projection to the end of the session
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FuelPlan {
    pub fuel_left: Liters,
    pub fuel_per_lap: Liters,
    /// Last lap time actually used for the projection
    pub effective_last_lap: Seconds,
    /// Laps to go, counting the lap in progress (always >= 1)
    pub laps_remaining: u32,
    pub fuel_needed: Liters,
    /// Fuel left minus fuel needed; negative means a shortfall
    pub margin: Liters,
}

/// Per-wheel tyre view
pub type TyreView = WheelSet<WheelView>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WheelView {
    /// Core temperature, passed through from the snapshot
    pub temperature: Celsius,
    /// Remaining grip, 1.0 = new tyre
    pub grip: Percentage,
}

/// Track map with car markers and the reference car's sector dominance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackView {
    /// Track name as reported by the simulator (NUL padding stripped)
    pub track_name: String,
    pub flag: SessionFlag,
    /// Ordered centerline as (x, z) pairs, shared with the track cache
    pub path: Arc<Vec<[f32; 2]>>,
    pub cars: Vec<CarMarker>,
    pub segments: Vec<DominanceSegment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CarMarker {
    pub car_id: u32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub is_player: bool,
}

/// Dominance classification for one sector of the track
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DominanceSegment {
    pub sector: usize,
    /// First path index of the sector
    pub start_index: usize,
    /// One past the last path index of the sector
    pub end_index: usize,
    /// Relative change of the sector's average speed against the previous pass
    pub rel: f32,
    pub class: DominanceClass,
    /// Blend amount from neutral toward the class color, 0..=1
    pub intensity: f32,
    pub color: Rgb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DominanceClass {
    Neutral,
    Improved,
    Worse,
}

/// 8-bit RGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const NEUTRAL: Rgb = Rgb(200, 200, 205);
    pub const IMPROVED: Rgb = Rgb(120, 255, 180);
    pub const WORSE: Rgb = Rgb(255, 120, 140);

    /// Linear blend from `self` toward `to`, `t` clamped to [0, 1]
    pub fn lerp(self, to: Rgb, t: f32) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
        Rgb(mix(self.0, to.0), mix(self.1, to.1), mix(self.2, to.2))
    }
}

/// A component that could not produce its view this tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentIssue {
    pub component: Component,
    /// Error kind, e.g. "data_unavailable"
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    Fuel,
    Tyres,
    Track,
}

// === View Masking for Selective Output ===

/// Specifies which views to include in serialized output
///
/// Streaming clients that only render one card can ask for just that view.
#[derive(Debug, Clone, Default)]
pub struct ViewMask {
    views: HashSet<String>,
    include_all: bool,
}

impl ViewMask {
    /// Create a mask that includes all views
    pub fn all() -> Self {
        Self {
            views: HashSet::new(),
            include_all: true,
        }
    }

    /// Create a mask from a comma-separated list of view names
    pub fn parse(views: &str) -> Self {
        let views: HashSet<String> = views
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();

        Self {
            views,
            include_all: false,
        }
    }

    /// Check if a view should be included
    pub fn includes(&self, view: &str) -> bool {
        self.include_all || self.views.contains(&view.to_lowercase())
    }

    /// Check if all views should be included
    pub fn is_all(&self) -> bool {
        self.include_all
    }
}

impl FromStr for ViewMask {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl AnalyticsFrame {
    /// Serialize this frame respecting the given view mask
    ///
    /// `timestamp`, `track_key` and `issues` are always included.
    pub fn to_json_filtered(&self, mask: Option<&ViewMask>) -> serde_json::Result<String> {
        let mask = match mask {
            Some(mask) if !mask.is_all() => mask,
            _ => return serde_json::to_string(self),
        };

        let mut map = serde_json::Map::new();
        map.insert(
            "timestamp".to_string(),
            serde_json::to_value(self.timestamp)?,
        );
        map.insert(
            "track_key".to_string(),
            serde_json::to_value(&self.track_key)?,
        );

        if mask.includes("fuel") {
            map.insert("fuel".to_string(), serde_json::to_value(self.fuel)?);
        }
        if mask.includes("tyres") {
            map.insert("tyres".to_string(), serde_json::to_value(self.tyres)?);
        }
        if mask.includes("track") {
            map.insert("track".to_string(), serde_json::to_value(&self.track)?);
        }
        map.insert("issues".to_string(), serde_json::to_value(&self.issues)?);

        serde_json::to_string(&map)
    }
}
