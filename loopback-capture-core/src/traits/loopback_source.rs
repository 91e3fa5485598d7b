use crate::models::audio_format::AudioFormat;
use crate::models::error::CaptureError;

/// Frame data of one captured packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketData<'a> {
    /// The device flagged the packet as silent; its buffer must not be read.
    Silent,
    /// Interleaved frames, `frames * block_align` bytes.
    Audio(&'a [u8]),
}

/// A batch of frames delivered atomically by the capture session.
///
/// Borrowed from the device buffer and valid only inside the callback passed to
/// [`LoopbackSource::with_next_packet`]; the source releases it afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet<'a> {
    pub frames: u32,
    pub data: PacketData<'a>,
}

impl Packet<'_> {
    pub fn is_silent(&self) -> bool {
        matches!(self.data, PacketData::Silent)
    }
}

/// Callback that consumes one packet before it is released.
pub type PacketSink<'s> = dyn FnMut(&Packet<'_>) -> Result<(), CaptureError> + 's;

/// A started-on-demand loopback session on an output device.
///
/// Implemented by:
/// - `WasapiLoopbackSource` (Windows)
/// - scripted sources in tests
///
/// Acquisition happens in the implementation's constructor; dropping the source
/// releases everything it acquired, in reverse order.
pub trait LoopbackSource {
    /// Format negotiated when the session was opened.
    fn format(&self) -> &AudioFormat;

    /// Start the device session. Failure is a setup error.
    fn start(&mut self) -> Result<(), CaptureError>;

    /// Stop the device session.
    fn stop(&mut self) -> Result<(), CaptureError>;

    /// Frames in the next pending packet, 0 when the queue is empty.
    fn next_packet_size(&mut self) -> Result<u32, CaptureError>;

    /// Acquire the next packet, hand it to `sink`, then release it.
    ///
    /// The packet is released whether or not `sink` succeeds. A `sink` error is
    /// returned as-is; acquire or release failures are `CaptureError::Device`.
    fn with_next_packet(&mut self, sink: &mut PacketSink<'_>) -> Result<(), CaptureError>;

    /// Human-readable name for logs.
    fn description(&self) -> String {
        "loopback source".into()
    }
}
