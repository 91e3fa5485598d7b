use std::io::{BufRead, Seek, Write};
use std::sync::Arc;
use std::time::Instant;

use crate::models::config::CaptureConfiguration;
use crate::models::error::CaptureError;
use crate::models::recording_result::{CaptureStats, RecordingResult};
use crate::models::state::{CaptureState, StopReason};
use crate::session::stop::{StopListener, StopToken};
use crate::storage::wav_writer::WavStreamWriter;
use crate::traits::capture_delegate::CaptureDelegate;
use crate::traits::loopback_source::{LoopbackSource, Packet, PacketData};

/// Drives one loopback capture from session start to finalized file.
///
/// Data flow:
/// ```text
/// [LoopbackSource] ─ packets ─→ drain ─ bytes / zeros ─→ [WavStreamWriter]
///        ↑                        ↑
///      start/stop            StopToken ←── StopListener (stdin), Ctrl-C, max duration
/// ```
///
/// The inner drain empties the device queue completely before the loop sleeps;
/// the stop token is only consulted between drains.
pub struct LoopbackRecorder<S: LoopbackSource> {
    source: S,
    config: CaptureConfiguration,
    delegate: Option<Arc<dyn CaptureDelegate>>,
    state: CaptureState,
    stats: CaptureStats,
}

impl<S: LoopbackSource> LoopbackRecorder<S> {
    pub fn new(source: S, config: CaptureConfiguration) -> Result<Self, CaptureError> {
        config.validate().map_err(CaptureError::Configuration)?;
        source.format().validate()?;

        Ok(Self {
            source,
            config,
            delegate: None,
            state: CaptureState::Idle,
            stats: CaptureStats::default(),
        })
    }

    pub fn set_delegate(&mut self, delegate: Arc<dyn CaptureDelegate>) {
        self.delegate = Some(delegate);
    }

    pub fn state(&self) -> &CaptureState {
        &self.state
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Open the configured output file and record into it until `stop` trips.
    ///
    /// The device is only started once the header is on disk; if the file
    /// cannot be created the source is released without being started.
    pub fn record<R: BufRead + Send + 'static>(
        self,
        stop: StopToken,
        listener: StopListener<R>,
    ) -> Result<RecordingResult, CaptureError> {
        let writer = WavStreamWriter::create(&self.config.output_path, self.source.format())?;
        log::info!("writing {}", self.config.output_path.display());
        self.record_with_writer(writer, stop, listener)
    }

    /// Record into an already started writer.
    ///
    /// Shutdown order is fixed: stop the device, join the listener, finalize the
    /// header, close the sink, then release the source when `self` drops.
    pub fn record_with_writer<W: Write + Seek, R: BufRead + Send + 'static>(
        mut self,
        mut writer: WavStreamWriter<W>,
        stop: StopToken,
        listener: StopListener<R>,
    ) -> Result<RecordingResult, CaptureError> {
        if let Err(e) = self.source.start() {
            log::error!("failed to start {}: {}", self.source.description(), e);
            self.set_state(CaptureState::Failed(e.clone()));
            return Err(e);
        }
        self.set_state(CaptureState::Started);
        log::info!(
            "capturing from {} ({} Hz, {} ch, {}-bit {}, block align {})",
            self.source.description(),
            self.source.format().sample_rate,
            self.source.format().channels,
            self.source.format().bits_per_sample,
            self.source.format().format_tag_name(),
            self.source.format().block_align,
        );

        let listener = match listener.spawn(stop.clone()) {
            Ok(handle) => handle,
            Err(e) => {
                let _ = self.source.stop();
                self.set_state(CaptureState::Failed(e.clone()));
                return Err(e);
            }
        };

        let capture_result = self.capture(&mut writer, &stop);

        self.set_state(CaptureState::Stopping);
        if let Err(e) = self.source.stop() {
            log::warn!("failed to stop {}: {}", self.source.description(), e);
        }
        log::debug!("stop listener {:?}", listener.join());

        let payload_bytes = writer.payload_bytes();
        let payload_sha256 = writer.payload_checksum();
        let header_finalized = match writer.finalize() {
            Ok(sink) => {
                drop(sink);
                true
            }
            Err(e) => {
                log::error!("{}; payload kept, header sizes left unpatched", e);
                if let Some(ref delegate) = self.delegate {
                    delegate.on_error(&e);
                }
                false
            }
        };
        self.set_state(CaptureState::Finalized);

        capture_result?;

        let format = self.source.format();
        let result = RecordingResult {
            id: uuid::Uuid::new_v4().to_string(),
            file_path: self.config.output_path.clone(),
            created_at: chrono::Utc::now().to_rfc3339(),
            format: format.summary(),
            packets: self.stats.packets,
            silent_packets: self.stats.silent_packets,
            frames: self.stats.frames,
            payload_bytes,
            duration_secs: format.frames_to_secs(self.stats.frames),
            payload_sha256,
            header_finalized,
            stop_reason: stop.reason().unwrap_or(StopReason::Input),
            transient_errors: self.stats.transient_errors,
            drain_cycles: self.stats.drain_cycles,
        };

        log::info!(
            "capture finished: {} packets ({} silent) over {} drain cycles, {} bytes, {:.2}s, stop reason {:?}",
            result.packets,
            result.silent_packets,
            result.drain_cycles,
            result.payload_bytes,
            result.duration_secs,
            result.stop_reason,
        );

        if let Some(ref delegate) = self.delegate {
            delegate.on_capture_finished(&result);
        }

        Ok(result)
    }

    // --- Internal helpers ---

    fn set_state(&mut self, new_state: CaptureState) {
        if self.state == new_state {
            return;
        }
        log::trace!("capture state: {} -> {}", self.state.name(), new_state.name());
        self.state = new_state;
        if let Some(ref delegate) = self.delegate {
            delegate.on_state_changed(&self.state);
        }
    }

    /// Outer loop: drain, check stop, sleep. Only a payload write failure ends it early.
    fn capture<W: Write + Seek>(
        &mut self,
        writer: &mut WavStreamWriter<W>,
        stop: &StopToken,
    ) -> Result<(), CaptureError> {
        let started = Instant::now();

        while !stop.is_stopped() {
            if let Some(max) = self.config.max_duration {
                if started.elapsed() >= max {
                    stop.trigger(StopReason::MaxDuration);
                    break;
                }
            }

            self.set_state(CaptureState::Draining);
            self.stats.drain_cycles += 1;
            match self.drain(writer) {
                Ok(()) => {}
                Err(e) if e.is_transient() => {
                    log::warn!("drain cycle abandoned: {}", e);
                    self.stats.transient_errors += 1;
                    if let Some(ref delegate) = self.delegate {
                        delegate.on_error(&e);
                    }
                }
                Err(e) => {
                    log::error!("capture aborted: {}", e);
                    stop.trigger(StopReason::WriteFailure);
                    return Err(e);
                }
            }

            if stop.is_stopped() {
                break;
            }
            self.set_state(CaptureState::Sleeping);
            stop.wait_timeout(self.config.poll_interval);
        }

        Ok(())
    }

    /// Move every pending packet into the writer.
    fn drain<W: Write + Seek>(&mut self, writer: &mut WavStreamWriter<W>) -> Result<(), CaptureError> {
        let block_align = self.source.format().block_align as u64;
        let stats = &mut self.stats;
        let source = &mut self.source;

        let mut pending = source.next_packet_size()?;
        while pending > 0 {
            source.with_next_packet(&mut |packet: &Packet<'_>| {
                let len = packet.frames as u64 * block_align;
                match packet.data {
                    PacketData::Silent => writer.append_silence(len)?,
                    PacketData::Audio(bytes) => {
                        let available = (bytes.len() as u64).min(len) as usize;
                        writer.append_payload(&bytes[..available])?;
                        if (available as u64) < len {
                            log::warn!("short packet: {} of {} bytes, padding with silence", available, len);
                            writer.append_silence(len - available as u64)?;
                        }
                    }
                }
                stats.record_packet(packet.frames, packet.is_silent());
                Ok(())
            })?;
            pending = source.next_packet_size()?;
        }

        Ok(())
    }
}
