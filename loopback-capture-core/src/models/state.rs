use serde::{Deserialize, Serialize};

use super::error::CaptureError;

/// Capture loop state machine.
///
/// State transitions:
/// ```text
/// idle → started → draining ⇄ sleeping
///                     ↓          ↓
///                  stopping → finalized
///
/// idle → failed   (session start refused)
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureState {
    Idle,
    Started,
    Draining,
    Sleeping,
    Stopping,
    Finalized,
    Failed(CaptureError),
}

impl CaptureState {
    /// Started, draining, or sleeping: the device session is running.
    pub fn is_capturing(&self) -> bool {
        matches!(self, Self::Started | Self::Draining | Self::Sleeping)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finalized | Self::Failed(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Started => "started",
            Self::Draining => "draining",
            Self::Sleeping => "sleeping",
            Self::Stopping => "stopping",
            Self::Finalized => "finalized",
            Self::Failed(_) => "failed",
        }
    }
}

/// What ended a capture run. The first trigger wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StopReason {
    /// A line arrived on the stop input.
    Input,
    /// The stop input reached end of file.
    InputClosed,
    /// Reading the stop input failed.
    InputError,
    /// Ctrl-C / console close.
    Interrupt,
    /// The configured maximum duration elapsed.
    MaxDuration,
    /// A fatal write error ended the capture.
    WriteFailure,
}
