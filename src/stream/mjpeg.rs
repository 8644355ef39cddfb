//! MJPEG stream plumbing
//!
//! Each HTTP client gets its own frame loop feeding a bounded channel;
//! the channel capacity of one provides backpressure, and a failed send
//! means the client went away.

use bytes::{BufMut, Bytes, BytesMut};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::video::capture::CaptureManager;
use crate::video::encoder::JpegEncoder;
use crate::video::format::Resolution;
use crate::video::frame::Frame;

/// Multipart boundary token
pub const BOUNDARY: &str = "frame";

/// Client ID type (UUID string)
pub type ClientId = String;

/// Build one multipart part around a JPEG image
pub fn mjpeg_part(jpeg_data: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(128 + jpeg_data.len());

    buf.put_slice(b"--frame\r\n");
    buf.put_slice(b"Content-Type: image/jpeg\r\n");
    buf.put_slice(format!("Content-Length: {}\r\n", jpeg_data.len()).as_bytes());
    buf.put_slice(b"\r\n");

    buf.put_slice(jpeg_data);
    buf.put_slice(b"\r\n");

    buf.freeze()
}

/// Sleep intervals between emitted parts
#[derive(Debug, Clone, Copy)]
pub struct StreamPacing {
    /// Delay after a frame was sent (roughly 30 fps)
    pub emit: Duration,
    /// Delay while the source is looping or unavailable
    pub degraded: Duration,
}

impl Default for StreamPacing {
    fn default() -> Self {
        Self {
            emit: Duration::from_millis(33),
            degraded: Duration::from_millis(100),
        }
    }
}

/// Per-client session information
#[derive(Debug, Clone)]
pub struct ClientSession {
    pub id: ClientId,
    pub connected_at: Instant,
    pub frames_sent: u64,
}

impl ClientSession {
    fn new(id: ClientId) -> Self {
        Self {
            id,
            connected_at: Instant::now(),
            frames_sent: 0,
        }
    }
}

/// Registry of connected streaming clients
#[derive(Default)]
pub struct StreamHub {
    clients: RwLock<HashMap<ClientId, ClientSession>>,
}

impl StreamHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn client_count(&self) -> usize {
        self.clients.read().len()
    }

    fn register_client(&self, client_id: ClientId) {
        let session = ClientSession::new(client_id.clone());
        self.clients.write().insert(client_id.clone(), session);
        info!(
            "Client {} connected (total: {})",
            client_id,
            self.client_count()
        );
    }

    fn unregister_client(&self, client_id: &str) {
        if let Some(session) = self.clients.write().remove(client_id) {
            let duration_secs = session.connected_at.elapsed().as_secs_f32();
            info!(
                "Client {} disconnected after {:.1}s ({} frames)",
                client_id, duration_secs, session.frames_sent
            );
        }
    }

    pub fn record_frame_sent(&self, client_id: &str) {
        if let Some(session) = self.clients.write().get_mut(client_id) {
            session.frames_sent += 1;
        }
    }
}

/// RAII guard for client lifecycle management
/// Ensures cleanup even on panic or abrupt disconnection
pub struct ClientGuard {
    client_id: ClientId,
    hub: Arc<StreamHub>,
}

impl ClientGuard {
    pub fn new(client_id: ClientId, hub: Arc<StreamHub>) -> Self {
        hub.register_client(client_id.clone());
        Self { client_id, hub }
    }

    pub fn id(&self) -> &ClientId {
        &self.client_id
    }
}

impl Drop for ClientGuard {
    fn drop(&mut self) {
        self.hub.unregister_client(&self.client_id);
    }
}

/// Per-client frame loop.
///
/// Reads frames from the shared capture handle, encodes them, and pushes
/// multipart parts into the bounded channel until the receiver drops.
/// When the source degrades, a blank frame is emitted at the slow rate
/// so the connection stays alive.
pub async fn run_client_loop(
    capture: CaptureManager,
    hub: Arc<StreamHub>,
    client_id: ClientId,
    quality: u32,
    blank_resolution: Resolution,
    pacing: StreamPacing,
    tx: mpsc::Sender<Bytes>,
) {
    let mut encoder = match JpegEncoder::new(quality) {
        Ok(encoder) => encoder,
        Err(e) => {
            warn!("Client {}: failed to create encoder: {}", client_id, e);
            return;
        }
    };
    let blank = Frame::blank(blank_resolution);

    loop {
        match capture.read_frame().await {
            Ok(frame) => {
                match encoder.encode(&frame) {
                    Ok(jpeg) => {
                        // A failed send means the HTTP client went away
                        if tx.send(mjpeg_part(&jpeg)).await.is_err() {
                            break;
                        }
                        hub.record_frame_sent(&client_id);
                    }
                    Err(e) => {
                        warn!("Client {}: encode failed, skipping frame: {}", client_id, e);
                        continue;
                    }
                }
                tokio::time::sleep(pacing.emit).await;
            }
            Err(AppError::EndOfStream) => {
                // Clip wrapped around; pause briefly before replaying
                debug!("Client {}: source looped", client_id);
                tokio::time::sleep(pacing.degraded).await;
            }
            Err(e) => {
                // Source unavailable: keep the connection alive with a
                // blank frame at the slow rate
                debug!("Client {}: source degraded: {}", client_id, e);
                match encoder.encode(&blank) {
                    Ok(jpeg) => {
                        if tx.send(mjpeg_part(&jpeg)).await.is_err() {
                            break;
                        }
                        hub.record_frame_sent(&client_id);
                    }
                    Err(e) => {
                        warn!("Client {}: blank encode failed: {}", client_id, e);
                    }
                }
                tokio::time::sleep(pacing.degraded).await;
            }
        }
    }
}
