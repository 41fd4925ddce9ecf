//! Source lifecycle and engine tick loop
//!
//! This module handles:
//! - Polling sources for detection
//! - Starting/stopping sources when they appear or go away
//! - Reading one snapshot per tick and running it through the engine
//! - Publishing the resulting frames to subscribers

use crate::config::ServerConfig;
use crate::state::AppState;
use anyhow::{Context, Result};
use pitwall_analytics::{AnalyticsEngine, ChainedBackend, EngineConfig, FsBackend, TrackDataBackend};
use pitwall_sources::{DemoSource, RecordingSource, RecordingWriter};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

/// Engine reading bundled demo track data first, then `config.data_dir`
pub fn build_engine(config: &EngineConfig) -> AnalyticsEngine {
    let backends: Vec<Arc<dyn TrackDataBackend>> = vec![
        Arc::new(DemoSource::track_data()),
        Arc::new(FsBackend::new(config.data_dir.clone())),
    ];
    AnalyticsEngine::new(config.clone(), Arc::new(ChainedBackend::new(backends)))
}

/// Register the sources named by the config
pub async fn register_sources(state: &AppState, config: &ServerConfig) {
    for path in &config.recordings {
        state
            .register_source(Box::new(RecordingSource::new(path.clone())))
            .await;
    }
    if config.demo {
        state.register_source(Box::new(DemoSource::new())).await;
    }
}

/// Main manager loop; returns once `state.shutdown` is cancelled
pub async fn run(state: AppState, config: ServerConfig) {
    register_sources(&state, &config).await;

    let mut recorder = match config.record_to.as_ref().map(RecordingWriter::create) {
        Some(Ok(writer)) => Some(writer),
        Some(Err(e)) => {
            error!("Recording disabled: {:#}", e);
            None
        }
        None => None,
    };

    info!(
        tick_ms = config.tick_interval_ms,
        "Source manager started"
    );

    let mut ticker = tokio::time::interval(config.tick_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_detection: Option<Instant> = None;

    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        // Rate limit detection checks
        if last_detection.map_or(true, |t| t.elapsed() >= config.detection_interval()) {
            last_detection = Some(Instant::now());
            if let Err(e) = detection_cycle(&state).await {
                error!("Error in detection cycle: {:#}", e);
            }
        }

        if let Err(e) = tick_cycle(&state, recorder.as_mut()).await {
            warn!("Error in tick: {:#}", e);
        }
    }

    if let Some(recorder) = recorder.as_mut() {
        if let Err(e) = recorder.flush() {
            warn!("{:#}", e);
        }
    }
    stop_active(&state).await;
    info!("Source manager stopped");
}

/// Check all sources for detection and switch the active one
pub async fn detection_cycle(state: &AppState) -> Result<()> {
    let mut sources = state.sources.write().await;
    let mut active_source = state.active_source.write().await;

    // If we have an active source, check if it's still detected
    if let Some(ref active_name) = *active_source {
        if let Some(source) = sources.iter_mut().find(|s| s.name() == active_name) {
            if source.detect() {
                return Ok(());
            }
            info!("Source {} no longer detected, stopping", active_name);
            if let Err(e) = source.stop() {
                error!("Error stopping source {}: {:#}", active_name, e);
            }
        }
        *active_source = None;
    }

    // No active source, look for detected ones in registration order
    for source in sources.iter_mut() {
        if !source.detect() || source.is_active() {
            continue;
        }
        info!("Source {} detected, starting", source.name());
        match source.start() {
            Ok(()) => {
                *active_source = Some(source.name().to_string());
                // A new source is a new session
                state.engine.lock().await.reset();
                info!("Source {} started successfully", source.name());
                break;
            }
            Err(e) => {
                error!("Failed to start source {}: {:#}", source.name(), e);
            }
        }
    }

    Ok(())
}

/// Read one snapshot from the active source and run the engine on it
///
/// Returns whether a frame was published; a tick without a snapshot is a
/// no-op.
pub async fn tick_cycle(state: &AppState, recorder: Option<&mut RecordingWriter>) -> Result<bool> {
    let Some(active_name) = state.active_source.read().await.clone() else {
        return Ok(false);
    };

    let snapshot = {
        let mut sources = state.sources.write().await;
        let Some(source) = sources.iter_mut().find(|s| s.name() == active_name) else {
            return Ok(false);
        };
        let snapshot = source
            .read_snapshot()
            .with_context(|| format!("Error reading snapshot from {active_name}"))?;
        match snapshot {
            Some(snapshot) => snapshot,
            None => return Ok(false),
        }
    };

    if let Some(recorder) = recorder {
        if let Err(e) = recorder.write(&snapshot) {
            warn!("Failed to record snapshot: {:#}", e);
        }
    }

    let frame = state.engine.lock().await.tick(&snapshot);
    state.publish(frame).await;
    Ok(true)
}

async fn stop_active(state: &AppState) {
    let Some(active_name) = state.active_source.write().await.take() else {
        return;
    };
    let mut sources = state.sources.write().await;
    if let Some(source) = sources.iter_mut().find(|s| s.name() == active_name) {
        if let Err(e) = source.stop() {
            error!("Error stopping source {}: {:#}", active_name, e);
        }
    }
}
