//! `capture_audio --out <PATH>`
//!
//! Records the default render device's loopback stream until a line arrives
//! on stdin, then finalizes the WAV header and prints a JSON summary on stdout.
//!
//! Exit codes: 0 after a stop-triggered shutdown, 1 on bad arguments or any
//! setup failure.

mod cli;

use std::io::{self, BufReader};
use std::process::ExitCode;

use clap::Parser;

use loopback_capture_core::{
    CaptureConfiguration, CaptureError, RecordingResult, StopListener, StopReason, StopToken,
};

use cli::Cli;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match run(cli.into_config()) {
        Ok(result) => {
            match result.to_json() {
                Ok(json) => println!("{}", json),
                Err(e) => log::warn!("{}", e),
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// `config` is validated by the recorder; the argument parsers enforce the same bounds.
fn run(config: CaptureConfiguration) -> Result<RecordingResult, CaptureError> {
    let stop = StopToken::new();
    let interrupt = stop.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        interrupt.trigger(StopReason::Interrupt);
    }) {
        log::warn!("Ctrl-C handler not installed: {}", e);
    }

    let listener = StopListener::new(BufReader::new(io::stdin()));
    record(config, stop, listener)
}

#[cfg(target_os = "windows")]
fn record(
    config: CaptureConfiguration,
    stop: StopToken,
    listener: StopListener<BufReader<io::Stdin>>,
) -> Result<RecordingResult, CaptureError> {
    use loopback_capture_core::LoopbackRecorder;
    use loopback_capture_windows::WasapiLoopbackSource;

    let source = WasapiLoopbackSource::open_default()?;
    LoopbackRecorder::new(source, config)?.record(stop, listener)
}

#[cfg(not(target_os = "windows"))]
fn record(
    _config: CaptureConfiguration,
    _stop: StopToken,
    _listener: StopListener<BufReader<io::Stdin>>,
) -> Result<RecordingResult, CaptureError> {
    Err(CaptureError::Setup(
        "WASAPI loopback capture is only available on Windows".into(),
    ))
}
