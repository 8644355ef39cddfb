//! JPEG encoder using turbojpeg.

use bytes::Bytes;
use turbojpeg::{Compressor, Image, PixelFormat as TJPixelFormat};

use crate::error::{AppError, Result};
use crate::video::frame::Frame;

/// Encodes RGB24 frames to JPEG.
///
/// Resolution-independent: each frame carries its own dimensions, so the
/// same encoder serves both live frames and the smaller blank frame.
///
/// Note: not thread-safe due to turbojpeg limitations. Each streaming
/// client owns its own encoder.
pub struct JpegEncoder {
    compressor: Compressor,
    quality: u32,
}

impl JpegEncoder {
    /// Create an encoder with the given JPEG quality (clamped to 1-100)
    pub fn new(quality: u32) -> Result<Self> {
        let quality = quality.clamp(1, 100);
        let mut compressor = Compressor::new().map_err(|e| {
            AppError::Encode(format!("Failed to create turbojpeg compressor: {}", e))
        })?;
        compressor
            .set_quality(quality as i32)
            .map_err(|e| AppError::Encode(format!("Failed to set JPEG quality: {}", e)))?;
        Ok(Self {
            compressor,
            quality,
        })
    }

    pub fn quality(&self) -> u32 {
        self.quality
    }

    /// Encode an RGB24 frame to JPEG bytes
    pub fn encode(&mut self, frame: &Frame) -> Result<Bytes> {
        let width = frame.width() as usize;
        let height = frame.height() as usize;
        let pitch = width * 3;

        if frame.len() < pitch * height {
            return Err(AppError::Encode(format!(
                "RGB data too small: {} < {}",
                frame.len(),
                pitch * height
            )));
        }

        let image = Image {
            pixels: frame.data(),
            width,
            pitch,
            height,
            format: TJPixelFormat::RGB,
        };

        let jpeg = self
            .compressor
            .compress_to_vec(image)
            .map_err(|e| AppError::Encode(format!("JPEG compression failed: {}", e)))?;

        Ok(Bytes::from(jpeg))
    }
}
