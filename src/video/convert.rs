//! Pixel format conversion utilities
//!
//! Webcam captures arrive as packed YUYV 4:2:2 and are converted to RGB24
//! before JPEG encoding.

use crate::error::{AppError, Result};
use crate::video::format::Resolution;

/// Calculate YUYV buffer size for a given resolution
pub fn yuyv_buffer_size(resolution: Resolution) -> usize {
    (resolution.width * resolution.height * 2) as usize
}

/// Convert packed YUYV 4:2:2 to RGB24 (BT.601, integer arithmetic).
///
/// Each four-byte group Y0 U Y1 V produces two RGB pixels sharing the
/// same chroma sample.
pub fn yuyv_to_rgb(yuyv: &[u8], resolution: Resolution) -> Result<Vec<u8>> {
    let width = resolution.width as usize;
    let height = resolution.height as usize;
    let expected = width * height * 2;

    if yuyv.len() < expected {
        return Err(AppError::Encode(format!(
            "YUYV data too small: {} < {}",
            yuyv.len(),
            expected
        )));
    }
    if width % 2 != 0 {
        return Err(AppError::Encode(format!(
            "YUYV requires even width, got {}",
            width
        )));
    }

    let mut rgb = vec![0u8; width * height * 3];

    for (group, out) in yuyv[..expected].chunks_exact(4).zip(rgb.chunks_exact_mut(6)) {
        let y0 = group[0] as i32;
        let u = group[1] as i32 - 128;
        let y1 = group[2] as i32;
        let v = group[3] as i32 - 128;

        // BT.601 coefficients, 8-bit fixed point
        let r_off = (351 * v) >> 8;
        let g_off = (86 * u + 179 * v) >> 8;
        let b_off = (444 * u) >> 8;

        out[0] = (y0 + r_off).clamp(0, 255) as u8;
        out[1] = (y0 - g_off).clamp(0, 255) as u8;
        out[2] = (y0 + b_off).clamp(0, 255) as u8;
        out[3] = (y1 + r_off).clamp(0, 255) as u8;
        out[4] = (y1 - g_off).clamp(0, 255) as u8;
        out[5] = (y1 + b_off).clamp(0, 255) as u8;
    }

    Ok(rgb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_size() {
        assert_eq!(yuyv_buffer_size(Resolution::HD720), 1280 * 720 * 2);
    }

    #[test]
    fn test_too_small_input_rejected() {
        let result = yuyv_to_rgb(&[0u8; 16], Resolution::new(4, 4));
        assert!(result.is_err());
    }

    #[test]
    fn test_grayscale_conversion() {
        // Neutral chroma (128) keeps R == G == B == Y
        let resolution = Resolution::new(2, 2);
        let yuyv = vec![
            16, 128, 200, 128, // row 0: Y=16, Y=200
            90, 128, 90, 128, // row 1: Y=90, Y=90
        ];
        let rgb = yuyv_to_rgb(&yuyv, resolution).unwrap();
        assert_eq!(rgb.len(), 2 * 2 * 3);
        assert_eq!(&rgb[0..3], &[16, 16, 16]);
        assert_eq!(&rgb[3..6], &[200, 200, 200]);
        assert_eq!(&rgb[6..9], &[90, 90, 90]);
    }

    #[test]
    fn test_output_clamped() {
        // Extreme chroma must not wrap around
        let resolution = Resolution::new(2, 2);
        let yuyv = vec![255, 255, 255, 255, 0, 0, 0, 0];
        let rgb = yuyv_to_rgb(&yuyv, resolution).unwrap();
        // Row 0, pixel 0: Y=255 V=127 -> R clamps at 255
        assert_eq!(rgb[0], 255);
        // Row 1, pixel 0: Y=0 V=-128 -> R clamps at 0
        assert_eq!(rgb[6], 0);
    }
}
