use crate::models::error::CaptureError;
use crate::models::recording_result::RecordingResult;
use crate::models::state::CaptureState;

/// Event delegate for capture notifications.
///
/// All methods are called from the capture loop's thread, between device
/// calls; keep them short.
pub trait CaptureDelegate: Send + Sync {
    /// Called when the capture loop changes state.
    fn on_state_changed(&self, state: &CaptureState);

    /// Called when a drain cycle is abandoned because of a device error.
    fn on_error(&self, error: &CaptureError);

    /// Called after the file is finalized and the device stopped.
    fn on_capture_finished(&self, result: &RecordingResult);
}
