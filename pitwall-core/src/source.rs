//! Telemetry source trait definition

use crate::model::TelemetrySnapshot;
use anyhow::Result;

/// Trait for telemetry sources feeding the analytics engine
///
/// Each source is responsible for:
/// - Detecting whether its simulator or file is available
/// - Reading one snapshot per engine tick
/// - Converting source-specific data to the unified TelemetrySnapshot
pub trait TelemetrySource: Send + Sync {
    /// Get the name of this source (e.g., "Demo", "Recording")
    fn name(&self) -> &str;

    /// Check if the source is currently available
    ///
    /// This should be a lightweight check (e.g., file exists, shared memory mapped)
    fn detect(&self) -> bool;

    /// Start reading telemetry
    fn start(&mut self) -> Result<()>;

    /// Stop reading telemetry
    fn stop(&mut self) -> Result<()>;

    /// Read the snapshot for the current tick
    ///
    /// Returns:
    /// - `Ok(Some(snapshot))` if a snapshot is available
    /// - `Ok(None)` if there is nothing new; the tick becomes a no-op
    /// - `Err(_)` if an error occurred
    fn read_snapshot(&mut self) -> Result<Option<TelemetrySnapshot>>;

    /// Get whether the source is currently active
    fn is_active(&self) -> bool;
}
