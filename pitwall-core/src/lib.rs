//! PitWall Core Library
//!
//! This crate provides the telemetry snapshot model, the view-models the
//! analytics engine produces, the shared error taxonomy and the source trait.

pub mod error;
pub mod model;
pub mod source;
pub mod units;
pub mod view;

pub use error::AnalyticsError;
pub use model::{CarPosition, SessionFlag, TelemetrySnapshot, Wheel, WheelSample, WheelSet};
pub use source::TelemetrySource;
pub use view::{AnalyticsFrame, FuelPlan, TrackView, TyreView, ViewMask};
