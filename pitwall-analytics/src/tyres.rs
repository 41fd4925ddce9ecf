//! Tyre wear simulation
//!
//! The simulator exposes live temperatures but no usable wear figure, so wear
//! is integrated here from slip, load, temperature, pressure and driver inputs.

use chrono::{DateTime, Utc};
use pitwall_core::error::{AnalyticsError, Result};
use pitwall_core::units::{Celsius, Percentage, Psi};
use pitwall_core::view::{TyreView, WheelView};
use pitwall_core::{TelemetrySnapshot, Wheel, WheelSample, WheelSet};
use tracing::trace;

/// Wear per second at unit multipliers
pub const BASE_WEAR_RATE: f32 = 0.00004;
/// Wear saturates here; grip is already zero past 1.0
pub const MAX_WEAR: f32 = 1.2;
/// Pressure with no wear penalty (GT3 dry)
pub const OPTIMAL_PRESSURE: Psi = Psi(27.5);
/// Combined slip is capped so a spinning wheel does not dominate
pub const MAX_SLIP_ENERGY: f32 = 3.0;

/// Core temperature multiplier
pub fn temp_multiplier(temp: Celsius) -> f32 {
    if temp.0 < 70.0 {
        0.7
    } else if temp.0 <= 95.0 {
        1.0
    } else if temp.0 <= 105.0 {
        1.3
    } else {
        1.7
    }
}

/// Pressure multiplier, growing with distance from the optimum
pub fn pressure_multiplier(pressure: Psi) -> f32 {
    1.0 + (pressure.0 - OPTIMAL_PRESSURE.0).abs() * 0.08
}

/// Driver abuse: brake pressure on the fronts, throttle on the rears
fn abuse(wheel: Wheel, snapshot: &TelemetrySnapshot) -> f32 {
    if wheel.is_front() {
        snapshot.brake * (1.0 + snapshot.abs_level * 0.8)
    } else {
        snapshot.throttle * (1.0 + snapshot.tc_level * 0.6)
    }
}

/// Wear added to one wheel over `dt` seconds
pub fn wear_delta(wheel: Wheel, sample: &WheelSample, snapshot: &TelemetrySnapshot, dt: f32) -> f32 {
    let slip_energy = (sample.slip_ratio.abs() + sample.slip_angle.0.abs()).min(MAX_SLIP_ENERGY);
    let load_factor = 1.0 + sample.suspension_travel.0 * 0.6;

    BASE_WEAR_RATE
        * slip_energy
        * load_factor
        * temp_multiplier(sample.core_temp)
        * pressure_multiplier(sample.pressure)
        * (1.0 + abuse(wheel, snapshot))
        * snapshot.tyre_wear_aid_rate
        * dt
}

/// Persistent wear accumulators for the player's four tyres
#[derive(Debug, Clone)]
pub struct TyreWearModel {
    wear: WheelSet<f32>,
    last_tick: Option<DateTime<Utc>>,
    max_dt: f32,
}

impl TyreWearModel {
    pub fn new(max_dt: f32) -> Self {
        Self {
            wear: WheelSet::default(),
            last_tick: None,
            max_dt,
        }
    }

    /// Advance wear by the time since the previous tick and return the view
    ///
    /// A missing, non-positive or too large time step (pause, lag spike,
    /// session restart) leaves wear untouched.
    pub fn update(&mut self, snapshot: &TelemetrySnapshot) -> Result<TyreView> {
        validate(snapshot)?;

        let now = snapshot.timestamp;
        let dt = self
            .last_tick
            .and_then(|last| (now - last).num_microseconds())
            .map(|us| us as f32 / 1_000_000.0);
        self.last_tick = Some(now);

        match dt {
            Some(dt) if dt > 0.0 && dt <= self.max_dt => {
                for (wheel, wear) in self.wear.all_wheels_mut() {
                    let delta = wear_delta(wheel, snapshot.wheels.get(wheel), snapshot, dt);
                    *wear = (*wear + delta).min(MAX_WEAR);
                }
            }
            _ => trace!(?dt, "tyre wear step skipped"),
        }

        Ok(self.view(snapshot))
    }

    fn view(&self, snapshot: &TelemetrySnapshot) -> TyreView {
        self.wear.map(|wheel, wear| WheelView {
            temperature: snapshot.wheels.get(wheel).core_temp,
            grip: Percentage::new(1.0 - wear),
        })
    }

    pub fn wear(&self) -> WheelSet<f32> {
        self.wear
    }

    /// Back to new tyres, forgetting the previous tick time
    pub fn reset(&mut self) {
        self.wear = WheelSet::default();
        self.last_tick = None;
    }
}

fn validate(snapshot: &TelemetrySnapshot) -> Result<()> {
    for (field, value) in [("brake", snapshot.brake), ("throttle", snapshot.throttle)] {
        if !(0.0..=1.0).contains(&value) {
            return Err(AnalyticsError::invalid(field, format!("{value} is outside [0, 1]")));
        }
    }
    for (field, value) in [
        ("abs_level", snapshot.abs_level),
        ("tc_level", snapshot.tc_level),
        ("tyre_wear_aid_rate", snapshot.tyre_wear_aid_rate),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(AnalyticsError::invalid(field, format!("{value} must be finite and >= 0")));
        }
    }
    for (wheel, sample) in snapshot.wheels.all_wheels() {
        let values = [
            sample.slip_ratio,
            sample.slip_angle.0,
            sample.suspension_travel.0,
            sample.core_temp.0,
            sample.pressure.0,
        ];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(AnalyticsError::invalid(
                "wheels",
                format!("{} sample has non-finite values", wheel.label()),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use pitwall_core::units::{Meters, Radians};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn sample(temp: f32) -> WheelSample {
        WheelSample {
            slip_ratio: 0.1,
            slip_angle: Radians(-0.05),
            suspension_travel: Meters(0.05),
            core_temp: Celsius(temp),
            pressure: Psi(27.5),
        }
    }

    fn snapshot_at(ms: i64) -> TelemetrySnapshot {
        TelemetrySnapshot {
            timestamp: start() + Duration::milliseconds(ms),
            brake: 0.5,
            throttle: 0.8,
            abs_level: 2.0,
            tc_level: 3.0,
            tyre_wear_aid_rate: 1.0,
            wheels: WheelSet::new(sample(80.0), sample(82.0), sample(100.0), sample(110.0)),
            ..Default::default()
        }
    }

    #[test]
    fn test_temp_multiplier_boundaries() {
        let cases = [
            (69.9, 0.7),
            (70.0, 1.0),
            (95.0, 1.0),
            (95.1, 1.3),
            (105.0, 1.3),
            (105.1, 1.7),
        ];
        for (temp, expected) in cases {
            assert_eq!(temp_multiplier(Celsius(temp)), expected, "temp {temp}");
        }
    }

    #[test]
    fn test_pressure_multiplier() {
        assert_eq!(pressure_multiplier(Psi(27.5)), 1.0);
        assert!((pressure_multiplier(Psi(30.0)) - 1.2).abs() < 1e-6);
        assert!((pressure_multiplier(Psi(25.0)) - 1.2).abs() < 1e-6);
    }

    #[test]
    fn test_wear_delta_matches_formula() {
        let snap = snapshot_at(0);
        let fl = wear_delta(Wheel::FrontLeft, &snap.wheels.front_left, &snap, 0.1);
        // slip 0.15, load 1.03, temp 1.0, pressure 1.0, abuse 0.5 * 2.6 = 1.3
        let expected = 0.00004 * 0.15 * 1.03 * 1.0 * 1.0 * 2.3 * 1.0 * 0.1;
        assert!((fl - expected).abs() < 1e-10, "{fl} vs {expected}");

        let rr = wear_delta(Wheel::RearRight, &snap.wheels.rear_right, &snap, 0.1);
        // abuse 0.8 * 2.8 = 2.24, temp 1.7
        let expected = 0.00004 * 0.15 * 1.03 * 1.7 * 1.0 * 3.24 * 1.0 * 0.1;
        assert!((rr - expected).abs() < 1e-10, "{rr} vs {expected}");
    }

    #[test]
    fn test_first_tick_does_not_wear() {
        let mut model = TyreWearModel::new(0.2);
        let view = model.update(&snapshot_at(0)).unwrap();
        assert_eq!(model.wear(), WheelSet::default());
        assert_eq!(view.front_left.grip, Percentage(1.0));
        assert_eq!(view.rear_right.temperature, Celsius(110.0));
    }

    #[test]
    fn test_wear_non_decreasing_with_valid_dt() {
        let mut model = TyreWearModel::new(0.2);
        model.update(&snapshot_at(0)).unwrap();
        let mut previous = model.wear();
        for i in 1..50 {
            model.update(&snapshot_at(i * 150)).unwrap();
            let current = model.wear();
            for ((_, now), (_, before)) in current.all_wheels().into_iter().zip(previous.all_wheels()) {
                assert!(now >= before);
            }
            previous = current;
        }
        assert!(model.wear().front_left > 0.0);
    }

    #[test]
    fn test_out_of_range_dt_is_ignored() {
        let mut model = TyreWearModel::new(0.2);
        model.update(&snapshot_at(0)).unwrap();
        // Lag spike
        model.update(&snapshot_at(500)).unwrap();
        assert_eq!(model.wear(), WheelSet::default());
        // Same timestamp
        model.update(&snapshot_at(500)).unwrap();
        assert_eq!(model.wear(), WheelSet::default());
        // Clock went backwards
        model.update(&snapshot_at(400)).unwrap();
        assert_eq!(model.wear(), WheelSet::default());
        // Exactly at the limit is still valid
        model.update(&snapshot_at(600)).unwrap();
        assert!(model.wear().front_left > 0.0);
    }

    #[test]
    fn test_wear_clamped_at_max() {
        let mut model = TyreWearModel::new(0.2);
        let mut snap = snapshot_at(0);
        snap.tyre_wear_aid_rate = 100_000.0;
        model.update(&snap).unwrap();
        for i in 1..200 {
            let mut next = snapshot_at(i * 200);
            next.tyre_wear_aid_rate = 100_000.0;
            let view = model.update(&next).unwrap();
            assert!(view.front_left.grip.0 >= 0.0);
        }
        let wear = model.wear();
        for (_, w) in wear.all_wheels() {
            assert_eq!(*w, MAX_WEAR);
        }
    }

    #[test]
    fn test_invalid_input_leaves_state_untouched() {
        let mut model = TyreWearModel::new(0.2);
        model.update(&snapshot_at(0)).unwrap();
        let mut bad = snapshot_at(100);
        bad.brake = 1.5;
        let err = model.update(&bad).unwrap_err();
        assert!(matches!(err, AnalyticsError::InvalidInput { field: "brake", .. }));

        let mut bad = snapshot_at(100);
        bad.wheels.rear_left.core_temp = Celsius(f32::NAN);
        assert!(model.update(&bad).is_err());
        assert_eq!(model.wear(), WheelSet::default());

        // The rejected ticks did not move the clock
        model.update(&snapshot_at(100)).unwrap();
        assert!(model.wear().front_left > 0.0);
    }

    #[test]
    fn test_reset_restores_new_tyres() {
        let mut model = TyreWearModel::new(0.2);
        model.update(&snapshot_at(0)).unwrap();
        model.update(&snapshot_at(100)).unwrap();
        assert!(model.wear().front_left > 0.0);

        model.reset();
        assert_eq!(model.wear(), WheelSet::default());
        // First tick after a reset has no previous time
        model.update(&snapshot_at(200)).unwrap();
        assert_eq!(model.wear(), WheelSet::default());
    }
}
