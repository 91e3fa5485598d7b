/// RIFF/WAVE container layout for streamed captures.
///
/// The header is written once with zeroed size fields and backpatched when the
/// capture stops. The `fmt ` chunk carries the device descriptor verbatim, so
/// its size (and therefore the header size) depends on the extension length.
///
/// Layout:
/// ```text
/// [0-3]    "RIFF"
/// [4-7]    file size - 8            (0 until finalized)
/// [8-11]   "WAVE"
/// [12-15]  "fmt "
/// [16-19]  18 + cbSize
/// [20-..]  WAVEFORMATEX + extension
/// [..]     "data"
/// [..]     payload size             (0 until finalized)
/// [..]     interleaved frames
/// ```
use crate::models::audio_format::AudioFormat;
use crate::models::error::CaptureError;

pub const RIFF_TAG: &[u8; 4] = b"RIFF";
pub const WAVE_TAG: &[u8; 4] = b"WAVE";
pub const FMT_TAG: &[u8; 4] = b"fmt ";
pub const DATA_TAG: &[u8; 4] = b"data";

/// Offset of the RIFF size field.
pub const RIFF_SIZE_OFFSET: usize = 4;
/// Offset of the format descriptor.
pub const DESCRIPTOR_OFFSET: usize = 20;

/// Bytes in front of the payload for a given format.
pub fn header_len(format: &AudioFormat) -> usize {
    DESCRIPTOR_OFFSET + format.descriptor_len() + 8
}

/// Header with placeholder size fields.
pub fn generate_wav_header(format: &AudioFormat) -> Vec<u8> {
    let mut header = Vec::with_capacity(header_len(format));

    // RIFF chunk descriptor
    header.extend_from_slice(RIFF_TAG);
    header.extend_from_slice(&0u32.to_le_bytes());
    header.extend_from_slice(WAVE_TAG);

    // fmt sub-chunk
    header.extend_from_slice(FMT_TAG);
    header.extend_from_slice(&(format.descriptor_len() as u32).to_le_bytes());
    header.extend_from_slice(&format.to_descriptor_bytes());

    // data sub-chunk
    header.extend_from_slice(DATA_TAG);
    header.extend_from_slice(&0u32.to_le_bytes());

    header
}

/// Clamp a chunk size to the 32-bit field RIFF provides.
pub fn chunk_size_field(size: u64) -> u32 {
    u32::try_from(size).unwrap_or_else(|_| {
        log::warn!("chunk size {} exceeds the RIFF limit, clamping to {}", size, u32::MAX);
        u32::MAX
    })
}

/// Fields read back from a WAV header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WavHeaderInfo {
    pub riff_size: u32,
    pub format: AudioFormat,
    pub data_size_offset: usize,
    pub data_size: u32,
    pub data_start: usize,
}

impl WavHeaderInfo {
    /// Parse the header at the start of `bytes`. Expects `fmt ` followed directly by `data`,
    /// which is the layout `generate_wav_header` produces.
    pub fn parse(bytes: &[u8]) -> Result<Self, CaptureError> {
        let invalid = |what: &str| CaptureError::Storage(format!("invalid WAV header: {}", what));
        let u32_at = |at: usize| -> Result<u32, CaptureError> {
            bytes
                .get(at..at + 4)
                .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .ok_or_else(|| invalid("truncated"))
        };

        if bytes.get(0..4) != Some(&RIFF_TAG[..]) || bytes.get(8..12) != Some(&WAVE_TAG[..]) {
            return Err(invalid("missing RIFF/WAVE tags"));
        }
        if bytes.get(12..16) != Some(&FMT_TAG[..]) {
            return Err(invalid("missing fmt chunk"));
        }

        let riff_size = u32_at(RIFF_SIZE_OFFSET)?;
        let fmt_size = u32_at(16)? as usize;
        let descriptor = bytes
            .get(DESCRIPTOR_OFFSET..DESCRIPTOR_OFFSET + fmt_size)
            .ok_or_else(|| invalid("truncated fmt chunk"))?;
        let format = AudioFormat::from_descriptor_bytes(descriptor)?;

        let data_tag_offset = DESCRIPTOR_OFFSET + fmt_size;
        if bytes.get(data_tag_offset..data_tag_offset + 4) != Some(&DATA_TAG[..]) {
            return Err(invalid("missing data chunk"));
        }
        let data_size_offset = data_tag_offset + 4;
        let data_size = u32_at(data_size_offset)?;

        Ok(Self {
            riff_size,
            format,
            data_size_offset,
            data_size,
            data_start: data_size_offset + 4,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pcm_header_is_46_bytes() {
        let format = AudioFormat::pcm(48000, 2, 16);
        let header = generate_wav_header(&format);
        assert_eq!(header.len(), 46);
        assert_eq!(header_len(&format), 46);
    }

    #[test]
    fn header_tags_and_placeholders() {
        let header = generate_wav_header(&AudioFormat::pcm(48000, 2, 16));
        assert_eq!(&header[0..4], b"RIFF");
        assert_eq!(&header[4..8], &[0, 0, 0, 0]);
        assert_eq!(&header[8..12], b"WAVE");
        assert_eq!(&header[12..16], b"fmt ");
        assert_eq!(u32::from_le_bytes([header[16], header[17], header[18], header[19]]), 18);
        assert_eq!(&header[38..42], b"data");
        assert_eq!(&header[42..46], &[0, 0, 0, 0]);
    }

    #[test]
    fn extensible_header_sizes_fmt_chunk_to_extension() {
        let format = AudioFormat::extensible_float(48000, 2, 0x3);
        let header = generate_wav_header(&format);
        assert_eq!(header.len(), 20 + 40 + 8);

        let fmt_size = u32::from_le_bytes([header[16], header[17], header[18], header[19]]);
        assert_eq!(fmt_size, 40);
        assert_eq!(&header[60..64], b"data");
    }

    #[test]
    fn parse_generated_header() {
        let format = AudioFormat::extensible_float(44100, 6, 0x3F);
        let info = WavHeaderInfo::parse(&generate_wav_header(&format)).unwrap();
        assert_eq!(info.format, format);
        assert_eq!(info.riff_size, 0);
        assert_eq!(info.data_size, 0);
        assert_eq!(info.data_size_offset, 64);
        assert_eq!(info.data_start, 68);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(WavHeaderInfo::parse(b"RIFX\0\0\0\0WAVE").is_err());
        assert!(WavHeaderInfo::parse(b"RIFF").is_err());
    }

    #[test]
    fn chunk_size_saturates() {
        assert_eq!(chunk_size_field(600), 600);
        assert_eq!(chunk_size_field(u32::MAX as u64 + 10), u32::MAX);
    }
}
