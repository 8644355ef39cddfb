//! camfeed - Camera streaming backend
//!
//! This crate exposes a webcam (or a looping motion-JPEG clip) as a
//! continuous `multipart/x-mixed-replace` HTTP feed, alongside a dashboard
//! endpoint describing the device and synthetic detection overlays.

pub mod config;
pub mod dashboard;
pub mod error;
pub mod state;
pub mod stream;
pub mod video;
pub mod web;

pub use error::{AppError, Result};
