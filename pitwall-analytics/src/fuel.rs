//! Fuel-to-finish projection

use crate::store::ReferenceLapStore;
use pitwall_core::error::{AnalyticsError, Result};
use pitwall_core::units::{Liters, Seconds};
use pitwall_core::{FuelPlan, TelemetrySnapshot};

/// Longest lap time accepted from live telemetry
pub const MAX_PLAUSIBLE_LAP: Seconds = Seconds(3600.0);

/// Inputs of a fuel projection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuelInputs {
    pub fuel_left: Liters,
    pub fuel_per_lap: Liters,
    pub last_lap_time: Seconds,
    pub session_time_left: Seconds,
}

impl FuelInputs {
    pub fn from_snapshot(snapshot: &TelemetrySnapshot) -> Self {
        Self {
            fuel_left: snapshot.fuel_left,
            fuel_per_lap: snapshot.fuel_per_lap,
            last_lap_time: snapshot.last_lap_time,
            session_time_left: snapshot.session_time_left,
        }
    }
}

/// Whether a recorded lap time can be used for the projection
pub fn is_plausible_lap(lap: Seconds) -> bool {
    lap.0 > 0.0 && lap.0 <= MAX_PLAUSIBLE_LAP.0
}

/// Project fuel to the end of the session
///
/// `fallback_lap` is only consulted when the recorded lap time is implausible
/// (no lap completed yet, or garbage).
pub fn project(inputs: FuelInputs, fallback_lap: impl FnOnce() -> Result<Seconds>) -> Result<FuelPlan> {
    for (field, value) in [
        ("fuel_left", inputs.fuel_left.0),
        ("fuel_per_lap", inputs.fuel_per_lap.0),
        ("session_time_left", inputs.session_time_left.0),
    ] {
        if !value.is_finite() {
            return Err(AnalyticsError::invalid(field, format!("{value} is not finite")));
        }
    }
    if inputs.session_time_left.0 < 0.0 {
        return Err(AnalyticsError::invalid(
            "session_time_left",
            format!("{} s is negative", inputs.session_time_left.0),
        ));
    }

    let lap = if is_plausible_lap(inputs.last_lap_time) {
        inputs.last_lap_time
    } else {
        fallback_lap()?
    };
    if !is_plausible_lap(lap) {
        return Err(AnalyticsError::invalid(
            "last_lap_time",
            format!("reference lap {} s is out of range", lap.0),
        ));
    }

    let laps_remaining = (inputs.session_time_left.0 / lap.0).floor() as u32 + 1;
    let fuel_needed = inputs.fuel_per_lap.0 * laps_remaining as f32;

    Ok(FuelPlan {
        fuel_left: inputs.fuel_left,
        fuel_per_lap: inputs.fuel_per_lap,
        effective_last_lap: lap,
        laps_remaining,
        fuel_needed: Liters(fuel_needed),
        margin: Liters(inputs.fuel_left.0 - fuel_needed),
    })
}

/// Fuel planner backed by the reference lap store
pub struct FuelPlanner {
    references: ReferenceLapStore,
}

impl FuelPlanner {
    pub fn new(references: ReferenceLapStore) -> Self {
        Self { references }
    }

    pub fn plan(&mut self, snapshot: &TelemetrySnapshot, track_key: &str) -> Result<FuelPlan> {
        let references = &mut self.references;
        project(FuelInputs::from_snapshot(snapshot), || references.get(track_key))
    }

    pub fn clear_cache(&mut self) {
        self.references.clear();
    }
}
