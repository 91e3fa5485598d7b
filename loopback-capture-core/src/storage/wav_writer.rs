use std::fs::{self, File};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::models::audio_format::AudioFormat;
use crate::models::error::CaptureError;
use crate::processing::wav_format;

/// Zero block used to materialize silent packets without allocating.
static SILENCE: [u8; 4096] = [0u8; 4096];

/// Stream positions recorded while the header is written.
///
/// Consumed by [`WavStreamWriter::finalize`]; nothing else needs them, so the
/// payload never has to be buffered to size the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderPatchState {
    pub riff_size_offset: u64,
    pub data_size_offset: u64,
    pub data_start_offset: u64,
}

/// Append-only WAV writer with a backpatched header.
///
/// `begin` writes the header with zeroed size fields, the payload is streamed
/// with `append_payload` / `append_silence`, and `finalize` fills in both sizes
/// from the final stream length. A file whose writer is never finalized keeps
/// the zeroed fields: a readable but size-inconsistent WAV.
///
/// `finalize` takes the writer by value, so it runs at most once:
///
/// ```compile_fail
/// use std::io::Cursor;
/// use loopback_capture_core::{AudioFormat, WavStreamWriter};
///
/// let format = AudioFormat::pcm(48000, 2, 16);
/// let writer = WavStreamWriter::begin(Cursor::new(Vec::new()), &format).unwrap();
/// writer.finalize().unwrap();
/// writer.finalize().unwrap();
/// ```
pub struct WavStreamWriter<W: Write + Seek> {
    sink: W,
    patch: HeaderPatchState,
    payload_bytes: u64,
    hasher: Sha256,
}

impl WavStreamWriter<BufWriter<File>> {
    /// Create (or truncate) `path` and write the provisional header.
    pub fn create(path: &Path, format: &AudioFormat) -> Result<Self, CaptureError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| CaptureError::Storage(format!("failed to create directory: {}", e)))?;
        }

        let file = File::create(path)
            .map_err(|e| CaptureError::Storage(format!("failed to create {}: {}", path.display(), e)))?;

        Self::begin(BufWriter::new(file), format)
    }
}

impl<W: Write + Seek> WavStreamWriter<W> {
    /// Write the provisional header at the sink's current position.
    pub fn begin(mut sink: W, format: &AudioFormat) -> Result<Self, CaptureError> {
        format.validate()?;

        let header = wav_format::generate_wav_header(format);
        let start = sink
            .stream_position()
            .map_err(|e| CaptureError::Storage(format!("failed to query position: {}", e)))?;
        sink.write_all(&header)
            .map_err(|e| CaptureError::Storage(format!("failed to write WAV header: {}", e)))?;

        let header_len = header.len() as u64;
        let patch = HeaderPatchState {
            riff_size_offset: start + wav_format::RIFF_SIZE_OFFSET as u64,
            data_size_offset: start + header_len - 4,
            data_start_offset: start + header_len,
        };

        Ok(Self {
            sink,
            patch,
            payload_bytes: 0,
            hasher: Sha256::new(),
        })
    }

    /// Append captured frame bytes.
    pub fn append_payload(&mut self, data: &[u8]) -> Result<(), CaptureError> {
        self.sink
            .write_all(data)
            .map_err(|e| CaptureError::Storage(format!("payload write failed: {}", e)))?;
        self.hasher.update(data);
        self.payload_bytes += data.len() as u64;
        Ok(())
    }

    /// Append `len` zero bytes.
    pub fn append_silence(&mut self, len: u64) -> Result<(), CaptureError> {
        let mut remaining = len;
        while remaining > 0 {
            let chunk = remaining.min(SILENCE.len() as u64) as usize;
            self.append_payload(&SILENCE[..chunk])?;
            remaining -= chunk as u64;
        }
        Ok(())
    }

    /// Payload bytes written so far (header excluded).
    pub fn payload_bytes(&self) -> u64 {
        self.payload_bytes
    }

    /// Hex SHA-256 of the payload written so far.
    pub fn payload_checksum(&self) -> String {
        hex_encode(&self.hasher.clone().finalize())
    }

    pub fn patch_state(&self) -> HeaderPatchState {
        self.patch
    }

    /// Backpatch both size fields and return the sink positioned at end of file.
    pub fn finalize(mut self) -> Result<W, CaptureError> {
        let patch = self.patch;
        let sink = &mut self.sink;
        let err = |e: std::io::Error| CaptureError::Finalize(e.to_string());

        let file_end = sink.seek(SeekFrom::End(0)).map_err(err)?;
        let riff_size = wav_format::chunk_size_field(file_end - 8);
        let data_size = wav_format::chunk_size_field(file_end - patch.data_start_offset);

        sink.seek(SeekFrom::Start(patch.riff_size_offset)).map_err(err)?;
        sink.write_all(&riff_size.to_le_bytes()).map_err(err)?;

        sink.seek(SeekFrom::Start(patch.data_size_offset)).map_err(err)?;
        sink.write_all(&data_size.to_le_bytes()).map_err(err)?;

        sink.seek(SeekFrom::Start(file_end)).map_err(err)?;
        sink.flush().map_err(err)?;

        log::debug!("finalized WAV header: riff size {}, data size {}", riff_size, data_size);
        Ok(self.sink)
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
