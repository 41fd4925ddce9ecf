//! Type-safe wrappers for physical units
//!
//! Newtype wrappers around f32 so fuel, time and temperature values cannot be
//! mixed up between the snapshot, the analytics components and the views.
//!
//! All unit types serialize with 4 decimal places to reduce JSON payload size.

use serde::{Deserialize, Serialize};

/// Round f32 to 4 decimal places for compact JSON serialization
fn round4<S: serde::Serializer>(val: &f32, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f32((*val * 10000.0).round() / 10000.0)
}

/// Meters
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Meters(#[serde(serialize_with = "round4")] pub f32);

/// Radians
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Radians(#[serde(serialize_with = "round4")] pub f32);

/// Celsius
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Celsius(#[serde(serialize_with = "round4")] pub f32);

/// Pounds per square inch (tyre pressure)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Psi(#[serde(serialize_with = "round4")] pub f32);

/// Liters (fuel)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Liters(#[serde(serialize_with = "round4")] pub f32);

/// Seconds (lap times, session time, durations)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Seconds(#[serde(serialize_with = "round4")] pub f32);

/// Percentage (0.0 to 1.0)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Percentage(#[serde(serialize_with = "round4")] pub f32);

impl Percentage {
    /// Create a new percentage, clamping to [0.0, 1.0]
    pub fn new(value: f32) -> Self {
        Self(value.clamp(0.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage_clamp() {
        assert_eq!(Percentage::new(1.5).0, 1.0);
        assert_eq!(Percentage::new(-0.5).0, 0.0);
        assert_eq!(Percentage::new(0.5).0, 0.5);
    }

    #[test]
    fn test_units_serialize_rounded() {
        let json = serde_json::to_string(&Liters(41.600_002)).unwrap();
        assert_eq!(json, "41.6");
    }
}
