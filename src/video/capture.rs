//! Capture sources and the shared capture manager
//!
//! One capture handle is shared by every streaming client. Reads are
//! serialized through a single async mutex, and the blocking V4L2 and
//! file work runs on the blocking pool with the lock guard moved into
//! the task, so concurrent clients never open the source twice.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use v4l::buffer::Type;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::capture::Parameters;
use v4l::video::Capture;
use v4l::Format;

use super::convert;
use super::decoder::MjpegDecoder;
use super::format::{CaptureFormat, Resolution};
use super::frame::Frame;
use crate::error::{AppError, Result};

/// Number of memory-mapped capture buffers
const BUFFER_COUNT: u32 = 4;
/// Minimum plausible JPEG size inside a clip file
const MIN_JPEG_SIZE: usize = 125;

/// Where frames come from
#[derive(Debug, Clone, PartialEq)]
pub enum SourceSpec {
    /// V4L2 webcam by device index
    Webcam { index: usize },
    /// Motion-JPEG clip file, looped forever
    File { path: PathBuf },
}

impl SourceSpec {
    pub fn describe(&self) -> String {
        match self {
            SourceSpec::Webcam { index } => format!("/dev/video{}", index),
            SourceSpec::File { path } => path.display().to_string(),
        }
    }
}

/// Capture configuration
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub source: SourceSpec,
    /// Requested resolution (drivers may negotiate a different one)
    pub resolution: Resolution,
    /// Target frame rate
    pub fps: u32,
    /// Raw pixel format requested from webcam sources
    pub format: CaptureFormat,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            source: SourceSpec::Webcam { index: 0 },
            resolution: Resolution::HD720,
            fps: 30,
            format: CaptureFormat::Yuyv,
        }
    }
}

/// Raw device properties reported by an open source
#[derive(Debug, Clone)]
pub struct DeviceProbe {
    /// Negotiated frame rate; may be zero when the driver does not report one
    pub fps: i32,
    pub width: u32,
    pub height: u32,
    /// Codec name as reported by the source; may be empty
    pub codec: String,
}

/// An open webcam capture stream
struct WebcamStream {
    // The mmap stream keeps its own handle; the device stays around for
    // format queries.
    device: Device,
    stream: MmapStream<'static>,
    resolution: Resolution,
    format: CaptureFormat,
    decoder: MjpegDecoder,
}

impl WebcamStream {
    fn open(index: usize, config: &CaptureConfig) -> Result<Self> {
        let device = Device::new(index).map_err(|e| {
            AppError::CaptureUnavailable(format!(
                "Failed to open /dev/video{}: {}",
                index, e
            ))
        })?;

        let requested = Format::new(
            config.resolution.width,
            config.resolution.height,
            config.format.to_fourcc(),
        );
        let actual = device.set_format(&requested).map_err(|e| {
            AppError::CaptureUnavailable(format!("Failed to set capture format: {}", e))
        })?;

        let resolution = Resolution::new(actual.width, actual.height);
        let format = if &actual.fourcc.repr == b"MJPG" {
            CaptureFormat::Mjpeg
        } else {
            CaptureFormat::Yuyv
        };

        if resolution != config.resolution {
            warn!(
                "Requested {}, driver negotiated {}",
                config.resolution, resolution
            );
        }

        if config.fps > 0 {
            if let Err(e) = device.set_params(&Parameters::with_fps(config.fps)) {
                warn!("Failed to set hardware FPS: {}", e);
            }
        }

        let stream =
            MmapStream::with_buffers(&device, Type::VideoCapture, BUFFER_COUNT).map_err(|e| {
                AppError::CaptureUnavailable(format!("Failed to start capture stream: {}", e))
            })?;

        info!(
            "Opened webcam /dev/video{} at {} {}",
            index, resolution, format
        );

        Ok(Self {
            device,
            stream,
            resolution,
            format,
            decoder: MjpegDecoder::new()?,
        })
    }

    fn read_rgb(&mut self, sequence: u64) -> Result<Frame> {
        let (buf, meta) = self.stream.next().map_err(|e| {
            AppError::CaptureUnavailable(format!("Capture read failed: {}", e))
        })?;
        let data = &buf[..meta.bytesused as usize];

        match self.format {
            CaptureFormat::Yuyv => {
                let rgb = convert::yuyv_to_rgb(data, self.resolution)?;
                Ok(Frame::from_vec(rgb, self.resolution, sequence))
            }
            CaptureFormat::Mjpeg => {
                let (rgb, resolution) = self.decoder.decode_rgb(data)?;
                Ok(Frame::from_vec(rgb, resolution, sequence))
            }
        }
    }

    fn probe(&self) -> DeviceProbe {
        let fps = self
            .device
            .params()
            .ok()
            .map(|p| {
                if p.interval.numerator > 0 {
                    (p.interval.denominator / p.interval.numerator) as i32
                } else {
                    0
                }
            })
            .unwrap_or(0);

        DeviceProbe {
            fps,
            width: self.resolution.width,
            height: self.resolution.height,
            codec: self.format.to_string(),
        }
    }
}

/// A looping motion-JPEG clip
struct FileStream {
    data: Vec<u8>,
    pos: usize,
    resolution: Resolution,
    fps: u32,
    decoder: MjpegDecoder,
}

impl FileStream {
    fn open(path: &Path, config: &CaptureConfig) -> Result<Self> {
        let data = std::fs::read(path).map_err(|e| {
            AppError::CaptureUnavailable(format!(
                "Failed to read clip {}: {}",
                path.display(),
                e
            ))
        })?;

        let mut decoder = MjpegDecoder::new()?;

        // The clip must contain at least one decodable JPEG; take the
        // dimensions from the first one.
        let first = find_jpeg(&data, 0).ok_or_else(|| {
            AppError::CaptureUnavailable(format!(
                "Clip {} contains no JPEG frames",
                path.display()
            ))
        })?;
        let resolution = decoder.read_dimensions(&data[first.0..first.1])?;

        info!(
            "Opened clip {} ({} bytes, {})",
            path.display(),
            data.len(),
            resolution
        );

        Ok(Self {
            data,
            pos: 0,
            resolution,
            fps: config.fps,
            decoder,
        })
    }

    fn read_rgb(&mut self, sequence: u64) -> Result<Frame> {
        loop {
            let Some((start, end)) = find_jpeg(&self.data, self.pos) else {
                // End of clip: rewind so the next read restarts from the
                // first frame, and report the wrap to the caller.
                self.pos = 0;
                return Err(AppError::EndOfStream);
            };

            match self.decoder.decode_rgb(&self.data[start..end]) {
                Ok((rgb, resolution)) => {
                    self.pos = end;
                    return Ok(Frame::from_vec(rgb, resolution, sequence));
                }
                Err(e) => {
                    // Corrupt chunk: skip past it and try the next frame
                    debug!("Skipping undecodable chunk at {}: {}", start, e);
                    self.pos = start + 2;
                }
            }
        }
    }

    fn probe(&self) -> DeviceProbe {
        DeviceProbe {
            fps: self.fps as i32,
            width: self.resolution.width,
            height: self.resolution.height,
            codec: "MJPEG".to_string(),
        }
    }
}

/// Locate the next complete JPEG (SOI..EOI) at or after `from`.
/// Returns the byte range including both markers.
fn find_jpeg(data: &[u8], from: usize) -> Option<(usize, usize)> {
    let mut start = from;
    loop {
        let soi = find_marker(data, start, [0xFF, 0xD8])?;
        if let Some(eoi) = find_marker(data, soi + 2, [0xFF, 0xD9]) {
            let end = eoi + 2;
            if end - soi >= MIN_JPEG_SIZE {
                return Some((soi, end));
            }
            // Implausibly small; resume after this SOI
            start = soi + 2;
        } else {
            // Truncated tail without an EOI
            return None;
        }
    }
}

fn find_marker(data: &[u8], from: usize, marker: [u8; 2]) -> Option<usize> {
    if from >= data.len() {
        return None;
    }
    data[from..]
        .windows(2)
        .position(|w| w == marker)
        .map(|p| from + p)
}

/// One of the two source backends
enum SourceStream {
    Webcam(WebcamStream),
    File(FileStream),
}

impl SourceStream {
    fn open(config: &CaptureConfig) -> Result<Self> {
        match &config.source {
            SourceSpec::Webcam { index } => {
                Ok(SourceStream::Webcam(WebcamStream::open(*index, config)?))
            }
            SourceSpec::File { path } => Ok(SourceStream::File(FileStream::open(path, config)?)),
        }
    }

    fn read_rgb(&mut self, sequence: u64) -> Result<Frame> {
        match self {
            SourceStream::Webcam(s) => s.read_rgb(sequence),
            SourceStream::File(s) => s.read_rgb(sequence),
        }
    }

    fn probe(&self) -> DeviceProbe {
        match self {
            SourceStream::Webcam(s) => s.probe(),
            SourceStream::File(s) => s.probe(),
        }
    }
}

/// Capture slot guarded by the shared mutex
struct Slot {
    stream: Option<SourceStream>,
    released: bool,
}

/// Shared capture handle
///
/// Cloned into every streaming client; all clones read through the same
/// underlying source.
#[derive(Clone)]
pub struct CaptureManager {
    config: CaptureConfig,
    slot: Arc<Mutex<Slot>>,
    open_attempts: Arc<AtomicU64>,
    frames_read: Arc<AtomicU64>,
}

impl CaptureManager {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            slot: Arc::new(Mutex::new(Slot {
                stream: None,
                released: false,
            })),
            open_attempts: Arc::new(AtomicU64::new(0)),
            frames_read: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// How many times the underlying source was (re)opened
    pub fn open_attempts(&self) -> u64 {
        self.open_attempts.load(Ordering::Relaxed)
    }

    /// Total frames successfully read
    pub fn frames_read(&self) -> u64 {
        self.frames_read.load(Ordering::Relaxed)
    }

    /// Read the next frame, opening the source on first use.
    ///
    /// Returns `EndOfStream` when a clip wraps around, and
    /// `CaptureUnavailable` when the source cannot be opened or read.
    /// A read error drops the open stream so the next call reopens.
    pub async fn read_frame(&self) -> Result<Frame> {
        let guard = self.slot.clone().lock_owned().await;
        let config = self.config.clone();
        let open_attempts = self.open_attempts.clone();
        let frames_read = self.frames_read.clone();

        tokio::task::spawn_blocking(move || {
            let mut guard = guard;
            if guard.released {
                return Err(AppError::CaptureUnavailable(
                    "Capture has been shut down".to_string(),
                ));
            }

            if guard.stream.is_none() {
                open_attempts.fetch_add(1, Ordering::Relaxed);
                guard.stream = Some(SourceStream::open(&config)?);
            }
            let stream = match guard.stream.as_mut() {
                Some(stream) => stream,
                None => {
                    return Err(AppError::CaptureUnavailable(
                        "Capture source not open".to_string(),
                    ))
                }
            };

            let sequence = frames_read.load(Ordering::Relaxed);
            match stream.read_rgb(sequence) {
                Ok(frame) => {
                    frames_read.fetch_add(1, Ordering::Relaxed);
                    Ok(frame)
                }
                Err(AppError::EndOfStream) => Err(AppError::EndOfStream),
                Err(e) => {
                    // Drop the broken stream so the next read reopens
                    warn!("Capture read failed, will reopen: {}", e);
                    guard.stream = None;
                    Err(e)
                }
            }
        })
        .await
        .map_err(|e| AppError::Internal(format!("Capture task failed: {}", e)))?
    }

    /// Probe the source properties, opening it on first use.
    pub async fn probe(&self) -> Result<DeviceProbe> {
        let guard = self.slot.clone().lock_owned().await;
        let config = self.config.clone();
        let open_attempts = self.open_attempts.clone();

        tokio::task::spawn_blocking(move || {
            let mut guard = guard;
            if guard.released {
                return Err(AppError::CaptureUnavailable(
                    "Capture has been shut down".to_string(),
                ));
            }
            if guard.stream.is_none() {
                open_attempts.fetch_add(1, Ordering::Relaxed);
                guard.stream = Some(SourceStream::open(&config)?);
            }
            match guard.stream.as_ref() {
                Some(stream) => Ok(stream.probe()),
                None => Err(AppError::CaptureUnavailable(
                    "Capture source not open".to_string(),
                )),
            }
        })
        .await
        .map_err(|e| AppError::Internal(format!("Probe task failed: {}", e)))?
    }

    /// Release the source. Idempotent; subsequent reads fail.
    pub async fn release(&self) {
        let mut guard = self.slot.lock().await;
        if guard.stream.take().is_some() {
            info!("Released capture source {}", self.config.source.describe());
        }
        guard.released = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::encoder::JpegEncoder;
    use std::io::Write;

    fn frame_with_fill(fill: u8, resolution: Resolution) -> Frame {
        Frame::from_vec(vec![fill; resolution.rgb24_len()], resolution, 0)
    }

    fn write_clip(frames: &[Frame]) -> tempfile::NamedTempFile {
        let mut encoder = JpegEncoder::new(85).unwrap();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for frame in frames {
            let jpeg = encoder.encode(frame).unwrap();
            file.write_all(&jpeg).unwrap();
        }
        file.flush().unwrap();
        file
    }

    fn file_config(path: &Path) -> CaptureConfig {
        CaptureConfig {
            source: SourceSpec::File {
                path: path.to_path_buf(),
            },
            resolution: Resolution::HD720,
            fps: 30,
            format: CaptureFormat::Yuyv,
        }
    }

    #[tokio::test]
    async fn test_clip_loops_bit_identical() {
        let resolution = Resolution::new(64, 48);
        let clip = write_clip(&[
            frame_with_fill(10, resolution),
            frame_with_fill(200, resolution),
        ]);
        let capture = CaptureManager::new(file_config(clip.path()));

        let first = capture.read_frame().await.unwrap();
        let second = capture.read_frame().await.unwrap();
        assert_ne!(first.data(), second.data());

        // Clip exhausted: wrap is reported once, then playback restarts
        match capture.read_frame().await {
            Err(AppError::EndOfStream) => {}
            other => panic!("expected EndOfStream, got {:?}", other.map(|f| f.len())),
        }
        let replay = capture.read_frame().await.unwrap();
        assert_eq!(replay.data(), first.data());
        assert_eq!(replay.resolution, resolution);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reads_open_once() {
        let resolution = Resolution::new(32, 32);
        // Plenty of frames so no reader hits the wrap
        let frames: Vec<Frame> = (0..32u8).map(|i| frame_with_fill(i * 8, resolution)).collect();
        let clip = write_clip(&frames);
        let capture = CaptureManager::new(file_config(clip.path()));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let capture = capture.clone();
            handles.push(tokio::spawn(async move { capture.read_frame().await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(capture.open_attempts(), 1);
        assert_eq!(capture.frames_read(), 8);
    }

    #[tokio::test]
    async fn test_missing_clip_is_unavailable() {
        let capture = CaptureManager::new(file_config(Path::new("/nonexistent/clip.mjpg")));
        match capture.read_frame().await {
            Err(AppError::CaptureUnavailable(_)) => {}
            other => panic!("expected CaptureUnavailable, got {:?}", other.map(|f| f.len())),
        }
    }

    #[tokio::test]
    async fn test_clip_without_jpeg_is_unavailable() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0u8; 4096]).unwrap();
        file.flush().unwrap();
        let capture = CaptureManager::new(file_config(file.path()));
        assert!(matches!(
            capture.read_frame().await,
            Err(AppError::CaptureUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_release_is_idempotent_and_final() {
        let resolution = Resolution::new(32, 32);
        let clip = write_clip(&[frame_with_fill(50, resolution)]);
        let capture = CaptureManager::new(file_config(clip.path()));

        capture.read_frame().await.unwrap();
        capture.release().await;
        capture.release().await;

        assert!(matches!(
            capture.read_frame().await,
            Err(AppError::CaptureUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_probe_reports_clip_properties() {
        let resolution = Resolution::new(96, 64);
        let clip = write_clip(&[frame_with_fill(30, resolution)]);
        let capture = CaptureManager::new(file_config(clip.path()));

        let probe = capture.probe().await.unwrap();
        assert_eq!(probe.width, 96);
        assert_eq!(probe.height, 64);
        assert_eq!(probe.fps, 30);
        assert_eq!(probe.codec, "MJPEG");
        // Probing opened the source; the first read must not reopen
        capture.read_frame().await.unwrap();
        assert_eq!(capture.open_attempts(), 1);
    }

    #[test]
    fn test_find_jpeg_skips_garbage_prefix() {
        let mut data = vec![0xABu8; 300];
        data.extend([0xFF, 0xD8]);
        data.extend(vec![0u8; 200]);
        data.extend([0xFF, 0xD9]);
        let (start, end) = find_jpeg(&data, 0).unwrap();
        assert_eq!(start, 300);
        assert_eq!(end, data.len());
    }

    #[test]
    fn test_find_jpeg_truncated_tail() {
        let mut data = vec![0xFF, 0xD8];
        data.extend(vec![0u8; 200]);
        // No EOI marker
        assert!(find_jpeg(&data, 0).is_none());
    }
}
