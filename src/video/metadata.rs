//! Camera metadata reported to the dashboard

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

use super::capture::{CaptureManager, DeviceProbe, SourceSpec};
use crate::config::CameraConfig;

/// Feed status shown on the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedStatus {
    Online,
    Offline,
}

/// Nested device block of the metadata record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub model: String,
    pub firmware: String,
    pub ip: String,
    pub codec: String,
    pub lens: String,
    #[serde(rename = "irMode")]
    pub ir_mode: String,
}

/// Camera metadata record, serialized camelCase for the dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceMetadata {
    pub camera_id: String,
    pub camera_name: String,
    pub location: String,
    pub status: FeedStatus,
    pub latency_ms: u64,
    pub fps: u32,
    pub resolution: String,
    pub device: DeviceDescriptor,
}

/// Builds metadata records from the shared capture handle.
///
/// Never fails: when the source cannot be opened, an offline record with
/// zeroed properties is returned instead.
#[derive(Clone)]
pub struct MetadataExtractor {
    capture: CaptureManager,
    identity: CameraConfig,
}

impl MetadataExtractor {
    pub fn new(capture: CaptureManager, identity: CameraConfig) -> Self {
        Self { capture, identity }
    }

    pub async fn get_metadata(&self) -> DeviceMetadata {
        match self.capture.probe().await {
            Ok(probe) => self.online_metadata(&probe),
            Err(e) => {
                warn!("Metadata probe failed: {}", e);
                self.offline_metadata()
            }
        }
    }

    fn is_webcam(&self) -> bool {
        matches!(self.capture.config().source, SourceSpec::Webcam { .. })
    }

    fn online_metadata(&self, probe: &DeviceProbe) -> DeviceMetadata {
        let is_webcam = self.is_webcam();
        let model = if is_webcam { "Webcam" } else { "Video File" };

        DeviceMetadata {
            camera_id: self.identity.camera_id.clone(),
            camera_name: self.identity.camera_name.clone(),
            location: self.identity.location.clone(),
            status: FeedStatus::Online,
            latency_ms: simulated_latency_ms(),
            fps: normalize_fps(probe.fps),
            resolution: format!("{}x{}", probe.width, probe.height),
            device: DeviceDescriptor {
                model: model.to_string(),
                firmware: "1.0.0".to_string(),
                ip: if is_webcam { "localhost" } else { "10.0.12.44" }.to_string(),
                codec: normalize_codec(&probe.codec),
                lens: if is_webcam { "Built-in" } else { "N/A" }.to_string(),
                ir_mode: "N/A".to_string(),
            },
        }
    }

    fn offline_metadata(&self) -> DeviceMetadata {
        DeviceMetadata {
            camera_id: self.identity.camera_id.clone(),
            camera_name: self.identity.camera_name.clone(),
            location: self.identity.location.clone(),
            status: FeedStatus::Offline,
            latency_ms: 0,
            fps: 0,
            resolution: "unknown".to_string(),
            device: DeviceDescriptor {
                model: "Unknown".to_string(),
                firmware: "Unknown".to_string(),
                ip: "Unknown".to_string(),
                codec: "unknown".to_string(),
                lens: "N/A".to_string(),
                ir_mode: "N/A".to_string(),
            },
        }
    }
}

/// Sources sometimes report a zero or negative rate; fall back to 30.
fn normalize_fps(fps: i32) -> u32 {
    if fps > 0 {
        fps as u32
    } else {
        30
    }
}

/// Trim driver padding from the codec name; empty means MJPEG.
fn normalize_codec(codec: &str) -> String {
    let trimmed = codec.trim();
    if trimmed.is_empty() {
        "MJPEG".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Latency indicator: 45ms base plus a slow 30 second sweep.
fn simulated_latency_ms() -> u64 {
    let unix_secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    45 + unix_secs % 30
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CameraConfig;
    use crate::video::capture::{CaptureConfig, SourceSpec};
    use std::path::PathBuf;

    #[test]
    fn test_normalize_fps() {
        assert_eq!(normalize_fps(25), 25);
        assert_eq!(normalize_fps(0), 30);
        assert_eq!(normalize_fps(-1), 30);
    }

    #[test]
    fn test_normalize_codec() {
        assert_eq!(normalize_codec("YUYV"), "YUYV");
        assert_eq!(normalize_codec("  H264  "), "H264");
        assert_eq!(normalize_codec(""), "MJPEG");
        assert_eq!(normalize_codec("   "), "MJPEG");
    }

    #[test]
    fn test_simulated_latency_range() {
        let latency = simulated_latency_ms();
        assert!((45..75).contains(&latency));
    }

    #[tokio::test]
    async fn test_unavailable_source_yields_offline_record() {
        let capture = CaptureManager::new(CaptureConfig {
            source: SourceSpec::File {
                path: PathBuf::from("/nonexistent/clip.mjpg"),
            },
            ..Default::default()
        });
        let extractor = MetadataExtractor::new(capture, CameraConfig::default());

        let meta = extractor.get_metadata().await;
        assert_eq!(meta.status, FeedStatus::Offline);
        assert_eq!(meta.latency_ms, 0);
        assert_eq!(meta.fps, 0);
        assert_eq!(meta.resolution, "unknown");
        assert_eq!(meta.device.model, "Unknown");
        assert_eq!(meta.device.codec, "unknown");
        assert_eq!(meta.device.lens, "N/A");
        // Identity strings survive even when the source is down
        assert_eq!(meta.camera_id, "R-39-F-003");
    }

    #[test]
    fn test_serializes_camel_case() {
        let meta = DeviceMetadata {
            camera_id: "R-39-F-003".to_string(),
            camera_name: "CAM 41A".to_string(),
            location: "Terminal 2 / Concourse F".to_string(),
            status: FeedStatus::Online,
            latency_ms: 50,
            fps: 30,
            resolution: "1280x720".to_string(),
            device: DeviceDescriptor {
                model: "Webcam".to_string(),
                firmware: "1.0.0".to_string(),
                ip: "localhost".to_string(),
                codec: "YUYV".to_string(),
                lens: "Built-in".to_string(),
                ir_mode: "N/A".to_string(),
            },
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["cameraId"], "R-39-F-003");
        assert_eq!(json["cameraName"], "CAM 41A");
        assert_eq!(json["latencyMs"], 50);
        assert_eq!(json["status"], "online");
        assert_eq!(json["device"]["irMode"], "N/A");
    }
}
