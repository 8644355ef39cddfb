use std::sync::Arc;
use tokio::sync::broadcast;

use crate::config::AppConfig;
use crate::stream::StreamHub;
use crate::video::capture::{CaptureConfig, CaptureManager};
use crate::video::metadata::MetadataExtractor;

/// Application-wide state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Shared capture handle, one per process
    pub capture: CaptureManager,
    /// Streaming client registry
    pub hub: Arc<StreamHub>,
    /// Camera metadata extractor
    pub metadata: MetadataExtractor,
    /// Shutdown signal sender
    pub shutdown_tx: broadcast::Sender<()>,
}

impl AppState {
    pub fn new(config: AppConfig, shutdown_tx: broadcast::Sender<()>) -> Arc<Self> {
        let capture = CaptureManager::new(CaptureConfig {
            source: config.camera.source(),
            resolution: config.video.resolution(),
            fps: config.video.fps,
            format: config.video.capture_format,
        });
        let metadata = MetadataExtractor::new(capture.clone(), config.camera.clone());

        Arc::new(Self {
            config,
            capture,
            hub: Arc::new(StreamHub::new()),
            metadata,
            shutdown_tx,
        })
    }
}
