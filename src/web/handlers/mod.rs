use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::dashboard::{build_dashboard, DashboardResponse};
use crate::error::Result;
use crate::state::AppState;
use crate::stream::mjpeg::{run_client_loop, ClientGuard, StreamPacing};

// ============================================================================
// Health
// ============================================================================

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: chrono::Local::now().to_rfc3339(),
    })
}

// ============================================================================
// Dashboard
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    /// "demo" switches feed URLs to pre-recorded assets
    pub mode: Option<String>,
}

pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<DashboardResponse>> {
    let camera_meta = state.metadata.get_metadata().await;
    let demo = query.mode.as_deref() == Some("demo");

    let response = build_dashboard(
        &state.config.dashboard,
        &state.config.web.public_url,
        camera_meta,
        demo,
    )?;
    Ok(Json(response))
}

// ============================================================================
// MJPEG video stream
// ============================================================================

/// Serve an MJPEG stream for one client.
///
/// Both feed paths (`live` and `manipulated`) are backed by the same
/// capture source; the manipulated variant is produced upstream.
pub async fn video_stream(
    State(state): State<Arc<AppState>>,
    Path(feed_type): Path<String>,
) -> Response {
    let client_id = uuid::Uuid::new_v4().to_string();
    debug!("Starting {} stream for client {}", feed_type, client_id);

    // RAII guard - registers the client now, unregisters when the
    // response body is dropped
    let guard = Arc::new(ClientGuard::new(client_id.clone(), state.hub.clone()));

    // Bounded channel (capacity=1) implements backpressure: the frame
    // loop only produces once the previous part was consumed
    let (tx, mut rx) = tokio::sync::mpsc::channel::<bytes::Bytes>(1);

    let guard_clone = guard.clone();
    let capture = state.capture.clone();
    let hub = state.hub.clone();
    let quality = state.config.video.quality;
    let blank_resolution = state.config.video.blank_resolution();
    tokio::spawn(async move {
        let _guard = guard_clone; // Keep guard alive
        run_client_loop(
            capture,
            hub,
            client_id,
            quality,
            blank_resolution,
            StreamPacing::default(),
            tx,
        )
        .await;
    });

    let body_stream = async_stream::stream! {
        let _guard = guard;
        while let Some(data) = rx.recv().await {
            yield Ok::<bytes::Bytes, std::io::Error>(data);
        }
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(
            header::CONTENT_TYPE,
            "multipart/x-mixed-replace; boundary=frame",
        )
        .header(header::CACHE_CONTROL, "no-cache, no-store, must-revalidate")
        .header(header::PRAGMA, "no-cache")
        .header(header::EXPIRES, "0")
        .header(header::CONNECTION, "keep-alive")
        .body(Body::from_stream(body_stream))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
