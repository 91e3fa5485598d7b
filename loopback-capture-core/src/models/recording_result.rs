use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::audio_format::FormatSummary;
use super::error::CaptureError;
use super::state::StopReason;

/// Summary returned when a capture run shuts down.
///
/// Serializable so the CLI can hand it to whatever launched the recorder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingResult {
    pub id: String,
    pub file_path: PathBuf,
    pub created_at: String,
    pub format: FormatSummary,
    pub packets: u64,
    pub silent_packets: u64,
    pub frames: u64,
    pub payload_bytes: u64,
    pub duration_secs: f64,
    /// SHA-256 of the payload bytes (hex).
    pub payload_sha256: String,
    /// False when the header backpatch failed and the size fields are stale.
    pub header_finalized: bool,
    pub stop_reason: StopReason,
    pub transient_errors: u64,
    /// Outer loop iterations, i.e. how often the device queue was polled.
    pub drain_cycles: u64,
}

impl RecordingResult {
    pub fn to_json(&self) -> Result<String, CaptureError> {
        serde_json::to_string(self)
            .map_err(|e| CaptureError::Storage(format!("failed to serialize recording result: {}", e)))
    }
}

/// Running totals kept by the capture loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub packets: u64,
    pub silent_packets: u64,
    pub frames: u64,
    pub transient_errors: u64,
    pub drain_cycles: u64,
}

impl CaptureStats {
    pub fn record_packet(&mut self, frames: u32, silent: bool) {
        self.packets += 1;
        self.frames += frames as u64;
        if silent {
            self.silent_packets += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::audio_format::AudioFormat;

    #[test]
    fn stats_count_silent_packets() {
        let mut stats = CaptureStats::default();
        stats.record_packet(100, false);
        stats.record_packet(50, true);
        assert_eq!(stats.packets, 2);
        assert_eq!(stats.silent_packets, 1);
        assert_eq!(stats.frames, 150);
    }

    #[test]
    fn result_json_round_trip() {
        let result = RecordingResult {
            id: "abc".into(),
            file_path: PathBuf::from("capture.wav"),
            created_at: "2026-01-01T00:00:00+00:00".into(),
            format: AudioFormat::pcm(48000, 2, 16).summary(),
            packets: 2,
            silent_packets: 1,
            frames: 150,
            payload_bytes: 600,
            duration_secs: 0.003125,
            payload_sha256: "00".into(),
            header_finalized: true,
            stop_reason: StopReason::Input,
            transient_errors: 0,
            drain_cycles: 3,
        };

        let json = result.to_json().unwrap();
        assert!(json.contains("\"stop_reason\":\"input\""));
        assert!(json.contains("\"encoding\":\"pcm\""));
        assert!(json.contains("\"drain_cycles\":3"));
        let parsed: RecordingResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, result);
    }
}
