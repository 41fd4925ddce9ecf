//! PitWall analytics
//!
//! Turns a stream of [`TelemetrySnapshot`](pitwall_core::TelemetrySnapshot)s
//! into race-engineering views:
//!
//! - **Fuel**: laps to finish and the fuel margin, with a per-track reference
//!   lap when no valid lap has been recorded yet
//! - **Tyres**: wear integrated from slip, load, temperature, pressure and
//!   driver inputs, shown as remaining grip
//! - **Track**: the centerline, car markers and per-sector pace dominance of
//!   the player against their own previous lap
//!
//! [`AnalyticsEngine`] owns all of it and is driven one tick at a time.

pub mod config;
pub mod engine;
pub mod fuel;
pub mod pace;
pub mod store;
pub mod track;
pub mod tyres;

pub use config::EngineConfig;
pub use engine::{AnalyticsEngine, EngineStatus};
pub use fuel::FuelPlanner;
pub use pace::{PaceTracker, PaceUpdate, SectorLayout};
pub use store::{
    ChainedBackend, FsBackend, LoadFailure, MemoryBackend, ReferenceLapStore, TrackDataBackend,
    TrackPathStore,
};
pub use track::{clean_track_name, normalize_track_key, TrackPath};
pub use tyres::TyreWearModel;
