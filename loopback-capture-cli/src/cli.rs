use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use loopback_capture_core::CaptureConfiguration;

#[derive(Parser, Debug)]
#[command(name = "capture_audio")]
#[command(version, about = "Record the default output device's loopback stream to a WAV file")]
#[command(
    long_about = "Record the default output device's loopback stream to a WAV file.\n\n\
                  Capture runs until a line (or end of input) arrives on stdin, Ctrl-C is \
                  pressed, or --max-seconds elapses; the WAV header is finalized on the way out."
)]
pub struct Cli {
    /// Output WAV file (parent directories are created)
    #[arg(long, value_name = "PATH", value_parser = parse_output_path)]
    pub out: PathBuf,

    /// Pause between device polls once the packet queue is empty
    #[arg(long, value_name = "MS", default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    pub poll_interval_ms: u64,

    /// Stop automatically after this many seconds
    #[arg(long, value_name = "SECS", allow_negative_numbers = true, value_parser = parse_max_seconds)]
    pub max_seconds: Option<Duration>,
}

impl Cli {
    pub fn into_config(self) -> CaptureConfiguration {
        CaptureConfiguration {
            output_path: self.out,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            max_duration: self.max_seconds,
        }
    }
}

fn parse_output_path(value: &str) -> Result<PathBuf, String> {
    if value.trim().is_empty() {
        return Err("output path must not be empty".into());
    }
    Ok(PathBuf::from(value))
}

fn parse_max_seconds(value: &str) -> Result<Duration, String> {
    let secs: f64 = value.parse().map_err(|e| format!("not a number: {}", e))?;
    if !secs.is_finite() || secs <= 0.0 {
        return Err("must be a positive number of seconds".into());
    }
    let duration = Duration::try_from_secs_f64(secs).map_err(|e| format!("out of range: {}", e))?;
    if duration.is_zero() {
        return Err("rounds down to zero".into());
    }
    Ok(duration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn out_is_required() {
        let err = Cli::try_parse_from(["capture_audio"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
        assert!(err.use_stderr());
    }

    #[test]
    fn empty_out_is_rejected() {
        let err = Cli::try_parse_from(["capture_audio", "--out", ""]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
    }

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["capture_audio", "--out", "C:\\temp\\capture.wav"]).unwrap();
        let config = cli.into_config();
        assert_eq!(config.output_path, PathBuf::from("C:\\temp\\capture.wav"));
        assert_eq!(config.poll_interval, Duration::from_millis(10));
        assert_eq!(config.max_duration, None);
    }

    #[test]
    fn poll_interval_and_max_seconds() {
        let cli = Cli::try_parse_from([
            "capture_audio",
            "--out",
            "out.wav",
            "--poll-interval-ms",
            "25",
            "--max-seconds",
            "1.5",
        ])
        .unwrap();
        let config = cli.into_config();
        assert_eq!(config.poll_interval, Duration::from_millis(25));
        assert_eq!(config.max_duration, Some(Duration::from_millis(1500)));
    }

    #[test]
    fn rejects_zero_poll_interval() {
        let err = Cli::try_parse_from(["capture_audio", "--out", "out.wav", "--poll-interval-ms", "0"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
    }

    #[test]
    fn rejects_non_positive_max_seconds() {
        for value in ["0", "-3", "NaN", "soon"] {
            let err = Cli::try_parse_from(["capture_audio", "--out", "out.wav", "--max-seconds", value]).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ValueValidation, "value {}", value);
        }
    }

    #[test]
    fn rejects_max_seconds_beyond_duration_range() {
        for value in ["1e20", "1e300"] {
            let err = Cli::try_parse_from(["capture_audio", "--out", "out.wav", "--max-seconds", value]).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ValueValidation, "value {}", value);
        }
    }

    #[test]
    fn rejects_max_seconds_below_a_nanosecond() {
        let err = Cli::try_parse_from(["capture_audio", "--out", "out.wav", "--max-seconds", "1e-12"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
    }

    #[test]
    fn accepted_arguments_always_make_a_valid_config() {
        let cli = Cli::try_parse_from([
            "capture_audio",
            "--out",
            "nested/dir/out.wav",
            "--poll-interval-ms",
            "1",
            "--max-seconds",
            "86400",
        ])
        .unwrap();
        let config = cli.into_config();
        assert_eq!(config.max_duration, Some(Duration::from_secs(86400)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn help_is_not_an_error_exit() {
        let err = Cli::try_parse_from(["capture_audio", "--help"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        assert!(!err.use_stderr());
    }
}
