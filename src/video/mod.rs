//! Video capture, conversion and JPEG encoding

pub mod capture;
pub mod convert;
pub mod decoder;
pub mod encoder;
pub mod format;
pub mod frame;
pub mod metadata;

pub use capture::{CaptureConfig, CaptureManager, SourceSpec};
pub use encoder::JpegEncoder;
pub use format::{CaptureFormat, Resolution};
pub use frame::Frame;
pub use metadata::{DeviceMetadata, MetadataExtractor};
