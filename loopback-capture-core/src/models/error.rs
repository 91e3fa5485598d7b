use thiserror::Error;

/// Errors that can occur while acquiring, running, or finalizing a loopback capture.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// Device enumeration, activation, format negotiation, or session start failed.
    #[error("setup failed: {0}")]
    Setup(String),

    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The output sink could not be opened or written.
    #[error("storage error: {0}")]
    Storage(String),

    /// Packet query, acquire, or release failed mid-capture.
    #[error("device error: {0}")]
    Device(String),

    /// The header backpatch failed; payload already on disk is kept.
    #[error("finalize failed: {0}")]
    Finalize(String),
}

impl CaptureError {
    /// Whether the capture loop recovers from this error locally.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Device(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_device_errors_are_transient() {
        assert!(CaptureError::Device("GetBuffer failed".into()).is_transient());
        assert!(!CaptureError::Storage("disk full".into()).is_transient());
        assert!(!CaptureError::Setup("no endpoint".into()).is_transient());
        assert!(!CaptureError::Finalize("seek failed".into()).is_transient());
    }

    #[test]
    fn display_includes_context() {
        let err = CaptureError::Storage("failed to create file: denied".into());
        assert_eq!(err.to_string(), "storage error: failed to create file: denied");
    }
}
