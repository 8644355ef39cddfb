//! Dashboard payload assembly
//!
//! Builds the metadata document consumed by the surveillance dashboard:
//! feed URLs, target panel, camera metadata, and synthetic detections
//! whose positions drift slowly with wall-clock time.

use std::io::Cursor;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use chrono::Local;
use image::{ImageFormat, Rgb, RgbImage};
use serde::{Deserialize, Serialize};

use crate::config::DashboardConfig;
use crate::error::{AppError, Result};
use crate::video::metadata::DeviceMetadata;

/// One video feed reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedSource {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
}

/// Live and manipulated feed pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feeds {
    pub live: FeedSource,
    pub manipulated: FeedSource,
}

/// Target panel content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    pub portrait_url: String,
    pub confidence: f64,
    pub label: String,
}

/// Normalized bounding box (fractions of the frame)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

/// A synthetic detection overlayed on a feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    pub id: String,
    pub feed: String,
    pub bbox: BoundingBox,
    pub confidence: f64,
    pub is_target: bool,
}

/// Complete dashboard document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    pub timestamp: String,
    pub feeds: Feeds,
    pub target: Target,
    pub camera_meta: DeviceMetadata,
    pub detections: Vec<Detection>,
}

/// Assemble the dashboard document.
///
/// In demo mode the feed URLs point at pre-recorded assets served by the
/// frontend instead of the MJPEG endpoints.
pub fn build_dashboard(
    config: &DashboardConfig,
    public_url: &str,
    camera_meta: DeviceMetadata,
    demo: bool,
) -> Result<DashboardResponse> {
    let (live_url, manipulated_url) = if demo {
        (
            config.demo_live_url.clone(),
            config.demo_manipulated_url.clone(),
        )
    } else {
        (
            format!("{}/api/video/live", public_url),
            format!("{}/api/video/manipulated", public_url),
        )
    };

    let portrait_url = match &config.portrait_url {
        Some(url) => url.clone(),
        None => placeholder_portrait()?,
    };

    let t = unix_time_secs();

    Ok(DashboardResponse {
        timestamp: Local::now().to_rfc3339(),
        feeds: Feeds {
            live: FeedSource {
                kind: "mp4".to_string(),
                url: live_url,
            },
            manipulated: FeedSource {
                kind: "mp4".to_string(),
                url: manipulated_url,
            },
        },
        target: Target {
            portrait_url,
            confidence: 0.20 + 0.15 * ((t % 10.0) / 10.0),
            label: config.target_label.clone(),
        },
        camera_meta,
        detections: generate_detections(t),
    })
}

/// Synthetic detections that drift with wall-clock time.
///
/// Two moving target boxes (one per feed) plus two static bystanders.
pub fn generate_detections(t: f64) -> Vec<Detection> {
    let live_x = 0.42 + 0.05 * (t % 3.0 - 1.5);
    let live_y = 0.18 + 0.03 * (t % 2.0 - 1.0);

    let manip_x = 0.38 + 0.04 * (t % 2.5 - 1.25);
    let manip_y = 0.20 + 0.02 * (t % 3.0 - 1.5);

    vec![
        Detection {
            id: "d-live-1".to_string(),
            feed: "live".to_string(),
            bbox: BoundingBox {
                x: live_x.clamp(0.1, 0.8),
                y: live_y.clamp(0.1, 0.7),
                w: 0.10,
                h: 0.22,
            },
            confidence: 0.75 + 0.08 * ((t % 5.0) / 5.0),
            is_target: true,
        },
        Detection {
            id: "d-manip-1".to_string(),
            feed: "manipulated".to_string(),
            bbox: BoundingBox {
                x: manip_x.clamp(0.1, 0.8),
                y: manip_y.clamp(0.1, 0.7),
                w: 0.11,
                h: 0.23,
            },
            confidence: 0.72 + 0.06 * ((t % 4.0) / 4.0),
            is_target: true,
        },
        Detection {
            id: "d-live-2".to_string(),
            feed: "live".to_string(),
            bbox: BoundingBox {
                x: 0.15,
                y: 0.45,
                w: 0.08,
                h: 0.18,
            },
            confidence: 0.65,
            is_target: false,
        },
        Detection {
            id: "d-manip-2".to_string(),
            feed: "manipulated".to_string(),
            bbox: BoundingBox {
                x: 0.70,
                y: 0.35,
                w: 0.09,
                h: 0.20,
            },
            confidence: 0.58,
            is_target: false,
        },
    ]
}

/// Generate a dark 200x200 silhouette placeholder as a PNG data URL.
pub fn placeholder_portrait() -> Result<String> {
    let img = RgbImage::from_pixel(200, 200, Rgb([26, 31, 38]));
    let mut png = Cursor::new(Vec::new());
    img.write_to(&mut png, ImageFormat::Png)
        .map_err(|e| AppError::Internal(format!("Failed to render portrait: {}", e)))?;
    let encoded = base64::engine::general_purpose::STANDARD.encode(png.into_inner());
    Ok(format!("data:image/png;base64,{}", encoded))
}

fn unix_time_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::metadata::{DeviceDescriptor, FeedStatus};

    fn sample_meta() -> DeviceMetadata {
        DeviceMetadata {
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
        }
    }

    #[test]
    fn test_live_mode_uses_stream_urls() {
        let response = build_dashboard(
            &DashboardConfig::default(),
            "http://localhost:8080",
            sample_meta(),
            false,
        )
        .unwrap();
        assert_eq!(
            response.feeds.live.url,
            "http://localhost:8080/api/video/live"
        );
        assert_eq!(
            response.feeds.manipulated.url,
            "http://localhost:8080/api/video/manipulated"
        );
        assert_eq!(response.feeds.live.kind, "mp4");
    }

    #[test]
    fn test_demo_mode_uses_recorded_assets() {
        let response = build_dashboard(
            &DashboardConfig::default(),
            "http://localhost:8080",
            sample_meta(),
            true,
        )
        .unwrap();
        assert_eq!(response.feeds.live.url, "/phase4_original.mp4");
        assert_eq!(response.feeds.manipulated.url, "/phase4_removed.mp4");
    }

    #[test]
    fn test_target_confidence_bounds() {
        let response = build_dashboard(
            &DashboardConfig::default(),
            "http://localhost:8080",
            sample_meta(),
            false,
        )
        .unwrap();
        assert!(response.target.confidence >= 0.20);
        assert!(response.target.confidence < 0.35);
        assert_eq!(response.target.label, "VIP1");
        assert_eq!(response.target.portrait_url, "/VIP1.jpg");
    }

    #[test]
    fn test_detection_shape_and_bounds() {
        // Sweep a range of times; moving boxes must stay clamped
        for i in 0..200 {
            let t = i as f64 * 0.137;
            let detections = generate_detections(t);
            assert_eq!(detections.len(), 4);

            let live = &detections[0];
            assert_eq!(live.id, "d-live-1");
            assert_eq!(live.feed, "live");
            assert!(live.is_target);
            assert!((0.1..=0.8).contains(&live.bbox.x));
            assert!((0.1..=0.7).contains(&live.bbox.y));
            assert!((0.75..0.83).contains(&live.confidence));

            let manip = &detections[1];
            assert_eq!(manip.feed, "manipulated");
            assert!((0.1..=0.8).contains(&manip.bbox.x));
            assert!((0.1..=0.7).contains(&manip.bbox.y));

            // Bystanders are static
            assert_eq!(detections[2].bbox.x, 0.15);
            assert!(!detections[2].is_target);
            assert_eq!(detections[3].bbox.x, 0.70);
            assert!(!detections[3].is_target);
        }
    }

    #[test]
    fn test_detections_move_over_time() {
        let a = generate_detections(0.3);
        let b = generate_detections(1.1);
        assert_ne!(a[0].bbox.x, b[0].bbox.x);
    }

    #[test]
    fn test_placeholder_portrait_is_png_data_url() {
        let url = placeholder_portrait().unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
        // Payload decodes back to a PNG signature
        let payload = url.trim_start_matches("data:image/png;base64,");
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(payload)
            .unwrap();
        assert_eq!(&bytes[..8], &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]);
    }

    #[test]
    fn test_generated_portrait_used_when_unset() {
        let config = DashboardConfig {
            portrait_url: None,
            target_label: "UNKNOWN SUBJECT".to_string(),
            ..DashboardConfig::default()
        };
        let response =
            build_dashboard(&config, "http://localhost:8080", sample_meta(), false).unwrap();
        assert!(response.target.portrait_url.starts_with("data:image/png;base64,"));
        assert_eq!(response.target.label, "UNKNOWN SUBJECT");
    }

    #[test]
    fn test_serializes_camel_case() {
        let response = build_dashboard(
            &DashboardConfig::default(),
            "http://localhost:8080",
            sample_meta(),
            false,
        )
        .unwrap();
        let json = serde_json::to_value(&response).unwrap();
        assert!(json["cameraMeta"]["cameraId"].is_string());
        assert!(json["target"]["portraitUrl"].is_string());
        assert_eq!(json["detections"][0]["isTarget"], true);
        assert_eq!(json["feeds"]["live"]["type"], "mp4");
    }
}
