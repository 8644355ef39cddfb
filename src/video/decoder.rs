//! JPEG decoder using TurboJPEG (software) -> RGB24.

use turbojpeg::{Decompressor, Image, PixelFormat as TJPixelFormat};

use crate::error::{AppError, Result};
use crate::video::format::Resolution;

/// Decodes individual JPEG images to RGB24 rasters.
///
/// Not thread-safe; callers serialize access through the capture lock.
pub struct MjpegDecoder {
    decompressor: Decompressor,
}

impl MjpegDecoder {
    pub fn new() -> Result<Self> {
        let decompressor = Decompressor::new().map_err(|e| {
            AppError::Encode(format!("Failed to create turbojpeg decoder: {}", e))
        })?;
        Ok(Self { decompressor })
    }

    /// Read only the JPEG header and return the image dimensions.
    pub fn read_dimensions(&mut self, jpeg: &[u8]) -> Result<Resolution> {
        let header = self
            .decompressor
            .read_header(jpeg)
            .map_err(|e| AppError::Encode(format!("turbojpeg read_header failed: {}", e)))?;
        Ok(Resolution::new(header.width as u32, header.height as u32))
    }

    /// Decode a JPEG image to an RGB24 raster, returning the pixels and the
    /// dimensions taken from the JPEG header.
    pub fn decode_rgb(&mut self, jpeg: &[u8]) -> Result<(Vec<u8>, Resolution)> {
        let header = self
            .decompressor
            .read_header(jpeg)
            .map_err(|e| AppError::Encode(format!("turbojpeg read_header failed: {}", e)))?;

        let pitch = header.width * 3;
        let mut image = Image {
            pixels: vec![0u8; header.height * pitch],
            width: header.width,
            pitch,
            height: header.height,
            format: TJPixelFormat::RGB,
        };

        self.decompressor
            .decompress(jpeg, image.as_deref_mut())
            .map_err(|e| AppError::Encode(format!("turbojpeg decode failed: {}", e)))?;

        let resolution = Resolution::new(header.width as u32, header.height as u32);
        Ok((image.pixels, resolution))
    }
}
