use serde::{Deserialize, Serialize};

use super::error::CaptureError;

/// `WAVE_FORMAT_PCM`
pub const FORMAT_TAG_PCM: u16 = 0x0001;
/// `WAVE_FORMAT_IEEE_FLOAT`
pub const FORMAT_TAG_IEEE_FLOAT: u16 = 0x0003;
/// `WAVE_FORMAT_EXTENSIBLE`
pub const FORMAT_TAG_EXTENSIBLE: u16 = 0xFFFE;

/// Size of the fixed `WAVEFORMATEX` fields, including the trailing `cbSize`.
pub const BASE_DESCRIPTOR_SIZE: usize = 18;

/// Extension length carried by `WAVEFORMATEXTENSIBLE`.
pub const EXTENSIBLE_EXTENSION_SIZE: usize = 22;

/// `KSDATAFORMAT_SUBTYPE_IEEE_FLOAT` in its on-disk byte order.
const SUBTYPE_IEEE_FLOAT: [u8; 16] = [
    0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10, 0x00, 0x80, 0x00, 0x00, 0xAA, 0x00, 0x38, 0x9B, 0x71,
];

/// Stream format negotiated with the render device.
///
/// Mirrors `WAVEFORMATEX` plus the opaque `cbSize` extension blob, so
/// extensible descriptors survive into the file byte-for-byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFormat {
    pub format_tag: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub avg_bytes_per_sec: u32,
    /// Bytes per frame across all channels.
    pub block_align: u16,
    pub bits_per_sample: u16,
    pub extension: Vec<u8>,
}

impl AudioFormat {
    /// Integer PCM with no extension.
    pub fn pcm(sample_rate: u32, channels: u16, bits_per_sample: u16) -> Self {
        let block_align = channels * bits_per_sample / 8;
        Self {
            format_tag: FORMAT_TAG_PCM,
            channels,
            sample_rate,
            avg_bytes_per_sec: sample_rate * block_align as u32,
            block_align,
            bits_per_sample,
            extension: Vec::new(),
        }
    }

    /// 32-bit float in a `WAVEFORMATEXTENSIBLE` wrapper, the usual shared-mode mix format.
    pub fn extensible_float(sample_rate: u32, channels: u16, channel_mask: u32) -> Self {
        let bits_per_sample = 32;
        let block_align = channels * bits_per_sample / 8;

        let mut extension = Vec::with_capacity(EXTENSIBLE_EXTENSION_SIZE);
        extension.extend_from_slice(&bits_per_sample.to_le_bytes()); // wValidBitsPerSample
        extension.extend_from_slice(&channel_mask.to_le_bytes());
        extension.extend_from_slice(&SUBTYPE_IEEE_FLOAT);

        Self {
            format_tag: FORMAT_TAG_EXTENSIBLE,
            channels,
            sample_rate,
            avg_bytes_per_sec: sample_rate * block_align as u32,
            block_align,
            bits_per_sample,
            extension,
        }
    }

    /// Parse a `WAVEFORMATEX` image: 18 fixed bytes followed by `cbSize` extension bytes.
    pub fn from_descriptor_bytes(bytes: &[u8]) -> Result<Self, CaptureError> {
        if bytes.len() < BASE_DESCRIPTOR_SIZE {
            return Err(CaptureError::Setup(format!(
                "format descriptor too short: {} bytes",
                bytes.len()
            )));
        }

        let u16_at = |at: usize| u16::from_le_bytes([bytes[at], bytes[at + 1]]);
        let u32_at = |at: usize| u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);

        let extension_len = u16_at(16) as usize;
        let extension = bytes
            .get(BASE_DESCRIPTOR_SIZE..BASE_DESCRIPTOR_SIZE + extension_len)
            .ok_or_else(|| {
                CaptureError::Setup(format!(
                    "format descriptor declares {} extension bytes but only {} follow",
                    extension_len,
                    bytes.len() - BASE_DESCRIPTOR_SIZE
                ))
            })?
            .to_vec();

        let format = Self {
            format_tag: u16_at(0),
            channels: u16_at(2),
            sample_rate: u32_at(4),
            avg_bytes_per_sec: u32_at(8),
            block_align: u16_at(12),
            bits_per_sample: u16_at(14),
            extension,
        };
        format.validate()?;
        Ok(format)
    }

    /// Serialize as a `WAVEFORMATEX` image (the `fmt ` chunk body).
    pub fn to_descriptor_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.descriptor_len());
        bytes.extend_from_slice(&self.format_tag.to_le_bytes());
        bytes.extend_from_slice(&self.channels.to_le_bytes());
        bytes.extend_from_slice(&self.sample_rate.to_le_bytes());
        bytes.extend_from_slice(&self.avg_bytes_per_sec.to_le_bytes());
        bytes.extend_from_slice(&self.block_align.to_le_bytes());
        bytes.extend_from_slice(&self.bits_per_sample.to_le_bytes());
        bytes.extend_from_slice(&(self.extension.len() as u16).to_le_bytes());
        bytes.extend_from_slice(&self.extension);
        bytes
    }

    /// Length of the `fmt ` chunk body: base fields plus extension.
    pub fn descriptor_len(&self) -> usize {
        BASE_DESCRIPTOR_SIZE + self.extension.len()
    }

    pub fn validate(&self) -> Result<(), CaptureError> {
        if self.channels == 0 {
            return Err(CaptureError::Setup("format has zero channels".into()));
        }
        if self.sample_rate == 0 {
            return Err(CaptureError::Setup("format has zero sample rate".into()));
        }
        if self.block_align == 0 {
            return Err(CaptureError::Setup("format has zero block alignment".into()));
        }
        if self.extension.len() > u16::MAX as usize {
            return Err(CaptureError::Setup(format!(
                "format extension too large: {} bytes",
                self.extension.len()
            )));
        }
        Ok(())
    }

    /// Payload bytes occupied by `frames` frames.
    pub fn bytes_for_frames(&self, frames: u32) -> u64 {
        frames as u64 * self.block_align as u64
    }

    /// Seconds of audio represented by `frames` frames.
    pub fn frames_to_secs(&self, frames: u64) -> f64 {
        frames as f64 / self.sample_rate as f64
    }

    pub fn format_tag_name(&self) -> &'static str {
        match self.format_tag {
            FORMAT_TAG_PCM => "pcm",
            FORMAT_TAG_IEEE_FLOAT => "ieee-float",
            FORMAT_TAG_EXTENSIBLE => "extensible",
            _ => "other",
        }
    }

    pub fn summary(&self) -> FormatSummary {
        FormatSummary {
            encoding: self.format_tag_name().to_string(),
            sample_rate: self.sample_rate,
            channels: self.channels,
            bits_per_sample: self.bits_per_sample,
            block_align: self.block_align,
        }
    }
}

/// Serializable description of a recording's format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatSummary {
    pub encoding: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub block_align: u16,
}
