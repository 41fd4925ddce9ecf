//! Telemetry snapshot model
//!
//! Defines the TelemetrySnapshot structure every source converts to. One
//! snapshot is consumed per engine tick and is never mutated by the engine.
//!
//! World coordinates follow the simulator: X and Z span the ground plane,
//! Y is up. Track analytics only use the (x, z) plane.

use crate::units::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Complete telemetry snapshot for one tick
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetrySnapshot {
    /// Wall-clock time when this snapshot was captured
    pub timestamp: DateTime<Utc>,

    /// Source name (e.g. "Demo", "Recording")
    pub source: String,

    // === Fuel & Timing ===
    /// Fuel remaining in the tank
    pub fuel_left: Liters,

    /// Average fuel used per lap, as reported by the simulator
    pub fuel_per_lap: Liters,

    /// Last completed lap time; zero or garbage before the first full lap
    pub last_lap_time: Seconds,

    /// Session time remaining
    pub session_time_left: Seconds,

    // === Session ===
    /// Raw track identifier, possibly NUL padded
    pub track_id: String,

    /// Current flag status
    pub session_flag: SessionFlag,

    // === Driver Inputs & Aids ===
    /// Brake input (0.0 to 1.0)
    pub brake: f32,

    /// Throttle input (0.0 to 1.0)
    pub throttle: f32,

    /// ABS setting (0 = off)
    pub abs_level: f32,

    /// Traction control setting (0 = off)
    pub tc_level: f32,

    // === Tyres ===
    pub wheels: WheelSet<WheelSample>,

    /// Tyre wear multiplier configured in the session (1.0 = realistic)
    pub tyre_wear_aid_rate: f32,

    // === Cars on track ===
    pub cars: Vec<CarPosition>,

    /// Car id of the local player
    pub player_car_id: Option<u32>,
}

/// Values indexed by wheel (Front-Left, Front-Right, Rear-Left, Rear-Right)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WheelSet<T> {
    pub front_left: T,
    pub front_right: T,
    pub rear_left: T,
    pub rear_right: T,
}

impl<T> WheelSet<T> {
    pub fn new(front_left: T, front_right: T, rear_left: T, rear_right: T) -> Self {
        Self {
            front_left,
            front_right,
            rear_left,
            rear_right,
        }
    }

    pub fn all_wheels(&self) -> [(Wheel, &T); 4] {
        [
            (Wheel::FrontLeft, &self.front_left),
            (Wheel::FrontRight, &self.front_right),
            (Wheel::RearLeft, &self.rear_left),
            (Wheel::RearRight, &self.rear_right),
        ]
    }

    pub fn all_wheels_mut(&mut self) -> [(Wheel, &mut T); 4] {
        [
            (Wheel::FrontLeft, &mut self.front_left),
            (Wheel::FrontRight, &mut self.front_right),
            (Wheel::RearLeft, &mut self.rear_left),
            (Wheel::RearRight, &mut self.rear_right),
        ]
    }

    pub fn get(&self, wheel: Wheel) -> &T {
        match wheel {
            Wheel::FrontLeft => &self.front_left,
            Wheel::FrontRight => &self.front_right,
            Wheel::RearLeft => &self.rear_left,
            Wheel::RearRight => &self.rear_right,
        }
    }

    /// Build a new set by applying `f` to every wheel
    pub fn map<U>(&self, mut f: impl FnMut(Wheel, &T) -> U) -> WheelSet<U> {
        WheelSet {
            front_left: f(Wheel::FrontLeft, &self.front_left),
            front_right: f(Wheel::FrontRight, &self.front_right),
            rear_left: f(Wheel::RearLeft, &self.rear_left),
            rear_right: f(Wheel::RearRight, &self.rear_right),
        }
    }
}

/// Wheel position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Wheel {
    FrontLeft,
    FrontRight,
    RearLeft,
    RearRight,
}

impl Wheel {
    pub fn is_front(self) -> bool {
        matches!(self, Wheel::FrontLeft | Wheel::FrontRight)
    }

    pub fn label(self) -> &'static str {
        match self {
            Wheel::FrontLeft => "FL",
            Wheel::FrontRight => "FR",
            Wheel::RearLeft => "RL",
            Wheel::RearRight => "RR",
        }
    }
}

/// Physics sample for a single wheel
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WheelSample {
    /// Slip ratio (longitudinal slip)
    pub slip_ratio: f32,

    /// Slip angle (lateral slip)
    pub slip_angle: Radians,

    /// Suspension travel
    pub suspension_travel: Meters,

    /// Tyre core temperature
    pub core_temp: Celsius,

    /// Tyre pressure
    pub pressure: Psi,
}

/// World position of one car
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CarPosition {
    pub car_id: u32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl CarPosition {
    pub fn new(car_id: u32, x: f32, y: f32, z: f32) -> Self {
        Self { car_id, x, y, z }
    }

    /// Parked / unused slots report exactly the origin
    pub fn is_at_origin(&self) -> bool {
        self.x == 0.0 && self.z == 0.0
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Race flag types
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionFlag {
    #[default]
    None,
    Green,
    Yellow,
    Blue,
    White,
    Checkered,
    Black,
    Penalty,
    Orange,
}

impl TelemetrySnapshot {
    /// Whether `car` is the local player
    pub fn is_player(&self, car: &CarPosition) -> bool {
        self.player_car_id == Some(car.car_id)
    }
}
