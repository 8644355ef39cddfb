use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::video::capture::SourceSpec;
use crate::video::format::{CaptureFormat, Resolution};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Camera source and identity settings
    pub camera: CameraConfig,
    /// Capture and encoding settings
    pub video: VideoConfig,
    /// Web server settings
    pub web: WebConfig,
    /// Dashboard content settings
    pub dashboard: DashboardConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig::default(),
            video: VideoConfig::default(),
            web: WebConfig::default(),
            dashboard: DashboardConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            AppError::Config(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        toml::from_str(&raw).map_err(|e| AppError::Config(format!("Invalid config file: {}", e)))
    }
}

/// Camera source selection and identity strings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CameraConfig {
    /// Use a webcam (true) or a motion-JPEG clip file (false)
    pub use_webcam: bool,
    /// V4L2 device index (0 for the default webcam)
    pub camera_index: usize,
    /// Clip path, only used when `use_webcam` is false
    pub video_file: PathBuf,
    /// Camera identifier reported in metadata
    pub camera_id: String,
    /// Display name reported in metadata
    pub camera_name: String,
    /// Location string reported in metadata
    pub location: String,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            use_webcam: true,
            camera_index: 0,
            video_file: PathBuf::from("sample_video.mjpg"),
            camera_id: "R-39-F-003".to_string(),
            camera_name: "CAM 41A".to_string(),
            location: "Terminal 2 / Concourse F".to_string(),
        }
    }
}

impl CameraConfig {
    /// Resolve the configured capture source
    pub fn source(&self) -> SourceSpec {
        if self.use_webcam {
            SourceSpec::Webcam {
                index: self.camera_index,
            }
        } else {
            SourceSpec::File {
                path: self.video_file.clone(),
            }
        }
    }
}

/// Capture and encoding configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VideoConfig {
    /// Requested capture width
    pub width: u32,
    /// Requested capture height
    pub height: u32,
    /// Target frame rate
    pub fps: u32,
    /// JPEG quality (1-100)
    pub quality: u32,
    /// Raw pixel format requested from webcam sources
    pub capture_format: CaptureFormat,
    /// Width of the blank frame emitted while the source is unavailable
    pub blank_width: u32,
    /// Height of the blank frame emitted while the source is unavailable
    pub blank_height: u32,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            fps: 30,
            quality: 85,
            capture_format: CaptureFormat::Yuyv,
            blank_width: 640,
            blank_height: 480,
        }
    }
}

impl VideoConfig {
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    pub fn blank_resolution(&self) -> Resolution {
        Resolution::new(self.blank_width, self.blank_height)
    }
}

/// Web server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    /// Bind address
    pub bind_address: String,
    /// HTTP port
    pub port: u16,
    /// Base URL used when building absolute feed URLs
    pub public_url: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
            public_url: "http://localhost:8080".to_string(),
        }
    }
}

/// Dashboard content configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Pre-recorded asset served for the live feed in demo mode
    pub demo_live_url: String,
    /// Pre-recorded asset served for the manipulated feed in demo mode
    pub demo_manipulated_url: String,
    /// Target portrait URL; a generated placeholder is used when unset
    pub portrait_url: Option<String>,
    /// Target label shown next to the portrait
    pub target_label: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            demo_live_url: "/phase4_original.mp4".to_string(),
            demo_manipulated_url: "/phase4_removed.mp4".to_string(),
            portrait_url: Some("/VIP1.jpg".to_string()),
            target_label: "VIP1".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_deployment() {
        let config = AppConfig::default();
        assert!(config.camera.use_webcam);
        assert_eq!(config.camera.camera_id, "R-39-F-003");
        assert_eq!(config.video.resolution(), Resolution::new(1280, 720));
        assert_eq!(config.video.blank_resolution(), Resolution::new(640, 480));
        assert_eq!(config.video.quality, 85);
        assert_eq!(config.web.port, 8080);
    }

    #[test]
    fn test_partial_toml_overrides() {
        let raw = r#"
            [camera]
            use_webcam = false
            video_file = "clips/loop.mjpg"

            [video]
            fps = 15
        "#;
        let config: AppConfig = toml::from_str(raw).unwrap();
        assert!(!config.camera.use_webcam);
        assert_eq!(config.video.fps, 15);
        // Untouched sections keep their defaults
        assert_eq!(config.video.quality, 85);
        assert_eq!(config.web.port, 8080);
        match config.camera.source() {
            SourceSpec::File { path } => assert_eq!(path, PathBuf::from("clips/loop.mjpg")),
            other => panic!("unexpected source: {:?}", other),
        }
    }
}
