//! MJPEG streaming over HTTP

pub mod mjpeg;

pub use mjpeg::{mjpeg_part, ClientGuard, StreamHub, StreamPacing, BOUNDARY};
