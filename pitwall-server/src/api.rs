//! REST API and SSE routes

use crate::state::AppState;
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures::stream::{Stream, StreamExt as FuturesStreamExt};
use pitwall_analytics::EngineStatus;
use pitwall_core::ViewMask;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use tower_http::cors::CorsLayer;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/sources", get(list_sources))
        .route("/api/analytics/latest", get(latest_frame))
        .route("/api/analytics/stream", get(analytics_stream))
        .route("/api/engine/status", get(engine_status))
        .route("/api/engine/reset", post(engine_reset))
        .route("/api/engine/reload", post(engine_reload))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// === Source Endpoints ===

#[derive(Serialize)]
struct SourceInfo {
    name: String,
    detected: bool,
    active: bool,
}

async fn list_sources(State(state): State<AppState>) -> Json<Vec<SourceInfo>> {
    let sources = state.sources.read().await;
    let active_name = state.active_source.read().await;

    let info: Vec<SourceInfo> = sources
        .iter()
        .map(|source| SourceInfo {
            name: source.name().to_string(),
            detected: source.detect(),
            active: source.is_active() || active_name.as_deref() == Some(source.name()),
        })
        .collect();

    Json(info)
}

// === Analytics Endpoints ===

#[derive(Deserialize)]
struct ViewsQuery {
    views: Option<String>,
}

impl ViewsQuery {
    fn mask(&self) -> Option<ViewMask> {
        self.views.as_deref().map(ViewMask::parse)
    }
}

async fn latest_frame(
    State(state): State<AppState>,
    Query(query): Query<ViewsQuery>,
) -> Result<Response, (StatusCode, String)> {
    let latest = state.latest.read().await;
    let frame = latest
        .as_ref()
        .ok_or((StatusCode::NOT_FOUND, "No analytics frame yet".to_string()))?;

    let json = frame.to_json_filtered(query.mask().as_ref()).map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to serialize frame: {}", e),
        )
    })?;

    Ok(([(header::CONTENT_TYPE, "application/json")], json).into_response())
}

async fn analytics_stream(
    State(state): State<AppState>,
    Query(query): Query<ViewsQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.subscribe();
    let view_mask = query.mask();

    let stream = BroadcastStream::new(rx)
        .filter_map(move |result| {
            let mask = view_mask.clone();
            async move {
                match result {
                    Ok(frame) => match frame.to_json_filtered(mask.as_ref()) {
                        Ok(json) => Some(Ok(Event::default().data(json))),
                        Err(e) => {
                            tracing::error!("Failed to serialize frame: {}", e);
                            None
                        }
                    },
                    Err(e) => {
                        tracing::warn!("Broadcast stream error: {}", e);
                        None
                    }
                }
            }
        })
        .take_until(state.shutdown.clone().cancelled_owned());

    Sse::new(stream).keep_alive(KeepAlive::default())
}

// === Engine Endpoints ===

#[derive(Serialize)]
struct StatusResponse {
    active_source: Option<String>,
    #[serde(flatten)]
    engine: EngineStatus,
}

async fn engine_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let active_source = state.active_source.read().await.clone();
    let engine = state.engine.lock().await.status();
    Json(StatusResponse {
        active_source,
        engine,
    })
}

async fn engine_reset(State(state): State<AppState>) -> StatusCode {
    state.engine.lock().await.reset();
    *state.latest.write().await = None;
    StatusCode::NO_CONTENT
}

async fn engine_reload(State(state): State<AppState>) -> StatusCode {
    state.engine.lock().await.reload_track_data();
    tracing::info!("Track data caches cleared");
    StatusCode::NO_CONTENT
}
