//! Frame data structures

use bytes::Bytes;
use std::time::Instant;

use super::format::Resolution;

/// A decoded RGB24 raster produced by one capture read, or synthesized as an
/// all-zero raster when the source is unavailable.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Raw RGB24 data (width * height * 3 bytes)
    data: Bytes,
    /// Frame resolution
    pub resolution: Resolution,
    /// Frame sequence number
    pub sequence: u64,
    /// Timestamp when the frame was captured
    pub capture_ts: Instant,
}

impl Frame {
    /// Create a new frame
    pub fn new(data: Bytes, resolution: Resolution, sequence: u64) -> Self {
        Self {
            data,
            resolution,
            sequence,
            capture_ts: Instant::now(),
        }
    }

    /// Create a frame from a Vec<u8>
    pub fn from_vec(data: Vec<u8>, resolution: Resolution, sequence: u64) -> Self {
        Self::new(Bytes::from(data), resolution, sequence)
    }

    /// Create an all-zero (black) frame at the given resolution
    pub fn blank(resolution: Resolution) -> Self {
        Self::from_vec(vec![0u8; resolution.rgb24_len()], resolution, 0)
    }

    /// Get frame data as a byte slice
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get data length
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if frame is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get width
    pub fn width(&self) -> u32 {
        self.resolution.width
    }

    /// Get height
    pub fn height(&self) -> u32 {
        self.resolution.height
    }
}

/// Validate JPEG data: SOI marker at the start and a plausible end marker.
pub fn is_valid_jpeg(data: &[u8]) -> bool {
    if data.len() < 125 {
        return false;
    }
    let start_marker = ((data[0] as u16) << 8) | data[1] as u16;
    if start_marker != 0xFFD8 {
        return false;
    }
    let end = data.len();
    let end_marker = ((data[end - 2] as u16) << 8) | data[end - 1] as u16;
    // Valid end markers: 0xFFD9, 0xD900, 0x0000 (padded)
    matches!(end_marker, 0xFFD9 | 0xD900 | 0x0000)
}
