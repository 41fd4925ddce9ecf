//! Application state management

use pitwall_analytics::AnalyticsEngine;
use pitwall_core::{AnalyticsFrame, TelemetrySource};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio_util::sync::CancellationToken;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// All registered sources
    pub sources: Arc<RwLock<Vec<Box<dyn TelemetrySource>>>>,

    /// Name of the currently active source
    pub active_source: Arc<RwLock<Option<String>>>,

    /// The analytics engine; only the tick loop and reset requests lock it
    pub engine: Arc<Mutex<AnalyticsEngine>>,

    /// Most recent frame, for polling clients
    pub latest: Arc<RwLock<Option<AnalyticsFrame>>>,

    /// Broadcast channel for analytics frames
    /// Multiple consumers can subscribe to receive frames
    pub frames_tx: broadcast::Sender<AnalyticsFrame>,

    /// Cancelled on shutdown; stops the tick loop and open streams
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(engine: AnalyticsEngine) -> Self {
        // 10 s of frames at the default tick rate
        let (frames_tx, _) = broadcast::channel(50);

        Self {
            sources: Arc::new(RwLock::new(Vec::new())),
            active_source: Arc::new(RwLock::new(None)),
            engine: Arc::new(Mutex::new(engine)),
            latest: Arc::new(RwLock::new(None)),
            frames_tx,
            shutdown: CancellationToken::new(),
        }
    }

    /// Register a source
    pub async fn register_source(&self, source: Box<dyn TelemetrySource>) {
        let mut sources = self.sources.write().await;
        sources.push(source);
    }

    /// Subscribe to analytics frames
    pub fn subscribe(&self) -> broadcast::Receiver<AnalyticsFrame> {
        self.frames_tx.subscribe()
    }

    /// Store a frame as the latest and send it to subscribers
    pub async fn publish(&self, frame: AnalyticsFrame) {
        *self.latest.write().await = Some(frame.clone());
        // Ignore error if no receivers (they'll get the next frame)
        let _ = self.frames_tx.send(frame);
    }
}
