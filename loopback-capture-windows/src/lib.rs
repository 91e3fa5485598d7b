//! # loopback-capture-windows
//!
//! Windows WASAPI backend for loopback-capture.
//!
//! Provides:
//! - `WasapiLoopbackSource`: loopback session on the default render endpoint,
//!   implementing `LoopbackSource`
//!
//! ## Platform Requirements
//! - Windows Vista+ (shared-mode loopback)
//! - Visual Studio Build Tools 2022 + Windows SDK for linking
//!
//! ## Usage
//! ```ignore
//! use loopback_capture_core::{CaptureConfiguration, LoopbackRecorder, StopListener, StopToken};
//! use loopback_capture_windows::WasapiLoopbackSource;
//!
//! let source = WasapiLoopbackSource::open_default()?;
//! let recorder = LoopbackRecorder::new(source, CaptureConfiguration::new("capture.wav"))?;
//! let result = recorder.record(StopToken::new(), StopListener::new(std::io::BufReader::new(std::io::stdin())))?;
//! ```

#[cfg(target_os = "windows")]
pub mod wasapi_loopback;

#[cfg(target_os = "windows")]
pub use wasapi_loopback::WasapiLoopbackSource;
