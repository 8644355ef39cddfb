//! Resolution and capture format definitions

use serde::{Deserialize, Serialize};
use std::fmt;
use v4l::FourCC;

/// Frame resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    /// 640x480
    pub const VGA: Resolution = Resolution {
        width: 640,
        height: 480,
    };
    /// 1280x720
    pub const HD720: Resolution = Resolution {
        width: 1280,
        height: 720,
    };

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Byte length of an RGB24 raster at this resolution
    pub fn rgb24_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Raw pixel formats requested from webcam sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CaptureFormat {
    /// YUYV 4:2:2 packed (most USB webcams)
    Yuyv,
    /// MJPEG compressed (capture cards, high-resolution webcams)
    Mjpeg,
}

impl CaptureFormat {
    /// Convert to V4L2 FourCC
    pub fn to_fourcc(&self) -> FourCC {
        match self {
            CaptureFormat::Yuyv => FourCC::new(b"YUYV"),
            CaptureFormat::Mjpeg => FourCC::new(b"MJPG"),
        }
    }
}

impl fmt::Display for CaptureFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureFormat::Yuyv => write!(f, "YUYV"),
            CaptureFormat::Mjpeg => write!(f, "MJPG"),
        }
    }
}
