//! Telemetry sources for PitWall
//!
//! Each source turns its input into one `TelemetrySnapshot` per engine tick.

pub mod demo;
pub mod recording;

pub use demo::DemoSource;
pub use recording::{RecordingSource, RecordingWriter};
