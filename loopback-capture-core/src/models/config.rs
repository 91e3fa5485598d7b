use std::path::PathBuf;
use std::time::Duration;

/// Default pause between drain cycles.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Configuration for a loopback capture run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfiguration {
    /// WAV file the capture is written to. Parent directories are created.
    pub output_path: PathBuf,

    /// How long the loop sleeps once the device queue is empty (default: 10ms).
    pub poll_interval: Duration,

    /// Stop automatically after this much wall-clock capture time (None = until signalled).
    pub max_duration: Option<Duration>,
}

impl CaptureConfiguration {
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.output_path.as_os_str().is_empty() {
            return Err("output path must not be empty".into());
        }
        if self.poll_interval.is_zero() {
            return Err("poll interval must be positive".into());
        }
        if self.max_duration.is_some_and(|d| d.is_zero()) {
            return Err("max duration must be positive".into());
        }
        Ok(())
    }
}

impl Default for CaptureConfiguration {
    fn default() -> Self {
        Self {
            output_path: PathBuf::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_duration: None,
        }
    }
}
