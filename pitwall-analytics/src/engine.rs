//! Per-tick orchestration of the analytics components

use crate::config::EngineConfig;
use crate::fuel::FuelPlanner;
use crate::pace::PaceTracker;
use crate::store::{FsBackend, ReferenceLapStore, TrackDataBackend, TrackPathStore};
use crate::track::{clean_track_name, normalize_track_key, TrackPath};
use crate::tyres::TyreWearModel;
use pitwall_core::error::AnalyticsError;
use pitwall_core::view::{CarMarker, Component, ComponentIssue};
use pitwall_core::{AnalyticsFrame, TelemetrySnapshot, TrackView};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Snapshot of the engine's bookkeeping, for status endpoints
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineStatus {
    pub track_key: Option<String>,
    pub path_points: usize,
    pub tracked_cars: usize,
    pub ticks: u64,
}

/// Owns all analytics state; feed it one snapshot per tick
///
/// The engine is single-writer: callers that ingest telemetry on another task
/// must serialize access (the server keeps it behind a mutex).
pub struct AnalyticsEngine {
    config: EngineConfig,
    tracks: TrackPathStore,
    fuel: FuelPlanner,
    tyres: TyreWearModel,
    pace: Option<PaceTracker>,
    track_key: Option<String>,
    ticks: u64,
}

impl AnalyticsEngine {
    pub fn new(config: EngineConfig, backend: Arc<dyn TrackDataBackend>) -> Self {
        Self {
            tracks: TrackPathStore::new(Arc::clone(&backend)),
            fuel: FuelPlanner::new(ReferenceLapStore::new(backend)),
            tyres: TyreWearModel::new(config.max_wear_dt_secs),
            pace: None,
            track_key: None,
            ticks: 0,
            config,
        }
    }

    /// Engine reading track data from `config.data_dir`
    pub fn from_config(config: EngineConfig) -> Self {
        let backend = Arc::new(FsBackend::new(config.data_dir.clone()));
        Self::new(config, backend)
    }

    /// Run every component against one snapshot
    ///
    /// Components are independent: a failure in one is reported in
    /// `frame.issues` and does not stop the others.
    pub fn tick(&mut self, snapshot: &TelemetrySnapshot) -> AnalyticsFrame {
        self.ticks += 1;
        let track_key = normalize_track_key(&snapshot.track_id);
        self.bind_track(&track_key);

        let mut issues = Vec::new();

        let fuel = match self.fuel.plan(snapshot, &track_key) {
            Ok(plan) => Some(plan),
            Err(err) => {
                debug!(%err, "no fuel estimate this tick");
                issues.push(issue(Component::Fuel, &err));
                None
            }
        };

        let tyres = match self.tyres.update(snapshot) {
            Ok(view) => Some(view),
            Err(err) => {
                warn!(%err, "tyre update rejected");
                issues.push(issue(Component::Tyres, &err));
                None
            }
        };

        if let Some(failure) = self.tracks.failure(&track_key) {
            issues.push(ComponentIssue {
                component: Component::Track,
                kind: failure.kind.to_string(),
                message: failure.message.clone(),
            });
        }
        let track = self.update_track(snapshot);

        AnalyticsFrame {
            timestamp: snapshot.timestamp,
            track_key,
            fuel,
            tyres,
            track,
            issues,
        }
    }

    fn bind_track(&mut self, track_key: &str) {
        if self.track_key.as_deref() == Some(track_key) {
            return;
        }
        if let Some(previous) = &self.track_key {
            info!(from = %previous, to = track_key, "track changed, resetting session state");
        }
        self.tyres.reset();

        let path = self.tracks.get(track_key);
        self.pace = Some(self.tracker_for(path));
        self.track_key = Some(track_key.to_string());
    }

    fn tracker_for(&self, path: Arc<TrackPath>) -> PaceTracker {
        PaceTracker::new(
            path,
            self.config.sector_count,
            self.config.default_sector_length,
            self.config.stale_car_after_secs,
        )
    }

    fn update_track(&mut self, snapshot: &TelemetrySnapshot) -> TrackView {
        let cars: Vec<CarMarker> = snapshot
            .cars
            .iter()
            .filter(|car| car.is_finite() && !car.is_at_origin())
            .map(|car| CarMarker {
                car_id: car.car_id,
                x: car.x,
                y: car.y,
                z: car.z,
                is_player: snapshot.is_player(car),
            })
            .collect();

        let mut view = TrackView {
            track_name: clean_track_name(&snapshot.track_id).to_string(),
            flag: snapshot.session_flag,
            cars,
            ..Default::default()
        };

        if let Some(pace) = self.pace.as_mut() {
            for car in &view.cars {
                pace.observe(car.car_id, car.x, car.z, snapshot.timestamp);
            }
            pace.evict_stale(snapshot.timestamp);
            view.path = pace.path().shared_points();
            view.segments = pace.dominance(snapshot.player_car_id);
        }
        view
    }

    /// Clear session state: tyre wear and every car's pace history
    ///
    /// Cached track data is kept.
    pub fn reset(&mut self) {
        info!("analytics engine reset");
        self.tyres.reset();
        if let Some(pace) = self.pace.as_mut() {
            pace.reset();
        }
    }

    /// Drop cached track data so edited files are picked up
    ///
    /// Tyre wear is kept. The bound track's centerline is re-read at once;
    /// pace history survives unless the centerline changed, since path
    /// indices from the old one would no longer line up.
    pub fn reload_track_data(&mut self) {
        self.tracks.clear();
        self.fuel.clear_cache();

        let Some(track_key) = self.track_key.clone() else {
            return;
        };
        let path = self.tracks.get(&track_key);
        if self.pace.as_ref().is_some_and(|pace| *pace.path() == *path) {
            info!(track = %track_key, "track data reloaded, centerline unchanged");
            return;
        }
        info!(track = %track_key, points = path.len(), "centerline changed, pace history cleared");
        self.pace = Some(self.tracker_for(path));
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            track_key: self.track_key.clone(),
            path_points: self.pace.as_ref().map_or(0, |p| p.path().len()),
            tracked_cars: self.pace.as_ref().map_or(0, |p| p.tracked_cars()),
            ticks: self.ticks,
        }
    }

    pub fn tyres(&self) -> &TyreWearModel {
        &self.tyres
    }

    pub fn pace(&self) -> Option<&PaceTracker> {
        self.pace.as_ref()
    }
}

fn issue(component: Component, err: &AnalyticsError) -> ComponentIssue {
    ComponentIssue {
        component,
        kind: err.kind().to_string(),
        message: err.to_string(),
    }
}
