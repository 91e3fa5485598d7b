//! # loopback-capture-core
//!
//! Platform-agnostic loopback capture core library.
//!
//! Streams the packets of a loopback session into a WAV file whose header is
//! written up front with placeholder sizes and backpatched on stop. Platform
//! backends (Windows WASAPI) implement the `LoopbackSource` trait and plug into
//! the generic `LoopbackRecorder`.
//!
//! ## Architecture
//!
//! ```text
//! loopback-capture-core (this crate)
//! ├── traits/       ← LoopbackSource, Packet, CaptureDelegate
//! ├── models/       ← CaptureError, CaptureState, StopReason, CaptureConfiguration, AudioFormat, RecordingResult
//! ├── processing/   ← WAV header layout
//! ├── session/      ← LoopbackRecorder (capture loop), StopToken + StopListener
//! └── storage/      ← WavStreamWriter
//! ```

pub mod models;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use models::audio_format::{AudioFormat, FormatSummary};
pub use models::config::CaptureConfiguration;
pub use models::error::CaptureError;
pub use models::recording_result::{CaptureStats, RecordingResult};
pub use models::state::{CaptureState, StopReason};
pub use processing::wav_format::WavHeaderInfo;
pub use session::recorder::LoopbackRecorder;
pub use session::stop::{ListenerExit, ListenerHandle, StopListener, StopToken};
pub use storage::wav_writer::{HeaderPatchState, WavStreamWriter};
pub use traits::capture_delegate::CaptureDelegate;
pub use traits::loopback_source::{LoopbackSource, Packet, PacketData, PacketSink};
