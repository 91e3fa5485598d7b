//! WASAPI loopback source for the default render endpoint.
//!
//! Opens the default render device in shared mode with
//! `AUDCLNT_STREAMFLAGS_LOOPBACK`, which yields the mix being sent to the
//! speakers. No special permissions needed on Windows.
//!
//! ## Notes
//! - DRM-protected audio is silenced in loopback
//! - The mix format is recorded verbatim (usually 32-bit float, extensible)
//! - Packets flagged `AUDCLNT_BUFFERFLAGS_SILENT` are handed on as silence
//!   without touching their buffer

use std::ffi::c_void;

use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;

use loopback_capture_core::models::audio_format::{AudioFormat, BASE_DESCRIPTOR_SIZE};
use loopback_capture_core::models::error::CaptureError;
use loopback_capture_core::traits::loopback_source::{LoopbackSource, Packet, PacketData, PacketSink};

/// Shared-mode buffer requested from the engine: 100ms in 100ns units.
const BUFFER_DURATION: i64 = 1_000_000;

/// Loopback capture session on the default render endpoint.
///
/// Everything is acquired in [`WasapiLoopbackSource::open_default`] and
/// released on drop. Fields drop in declaration order, which is the reverse of
/// acquisition: capture client, mix format, audio client, device, enumerator,
/// then COM.
pub struct WasapiLoopbackSource {
    capture_client: IAudioCaptureClient,
    _mix_format: MixFormat,
    audio_client: IAudioClient,
    _device: IMMDevice,
    _enumerator: IMMDeviceEnumerator,
    format: AudioFormat,
    device_id: String,
    _com: CoUninitializeGuard,
}

impl WasapiLoopbackSource {
    /// Open a loopback session on the default render device.
    ///
    /// Sequence:
    /// 1. CoInitializeEx (MTA)
    /// 2. Get default render endpoint
    /// 3. Activate IAudioClient
    /// 4. GetMixFormat
    /// 5. Initialize with LOOPBACK flag in shared mode
    /// 6. Get IAudioCaptureClient
    ///
    /// The session is not started; [`LoopbackSource::start`] does that.
    pub fn open_default() -> Result<Self, CaptureError> {
        unsafe {
            CoInitializeEx(None, COINIT_MULTITHREADED)
                .ok()
                .map_err(|e| CaptureError::Setup(format!("CoInitializeEx failed: {}", e)))?;
            let com = CoUninitializeGuard;

            let enumerator: IMMDeviceEnumerator = CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL)
                .map_err(|e| CaptureError::Setup(format!("failed to create enumerator: {}", e)))?;

            // Loopback reads from the RENDER endpoint, not a capture endpoint
            let device = enumerator
                .GetDefaultAudioEndpoint(eRender, eConsole)
                .map_err(|e| CaptureError::Setup(format!("GetDefaultAudioEndpoint failed: {}", e)))?;
            let device_id = device_id(&device);

            let audio_client: IAudioClient = device
                .Activate(CLSCTX_ALL, None)
                .map_err(|e| CaptureError::Setup(format!("Activate IAudioClient failed: {}", e)))?;

            let mix_format = MixFormat(
                audio_client
                    .GetMixFormat()
                    .map_err(|e| CaptureError::Setup(format!("GetMixFormat failed: {}", e)))?,
            );
            let format = mix_format.to_audio_format()?;

            audio_client
                .Initialize(
                    AUDCLNT_SHAREMODE_SHARED,
                    AUDCLNT_STREAMFLAGS_LOOPBACK,
                    BUFFER_DURATION,
                    0,
                    mix_format.0,
                    None,
                )
                .map_err(|e| CaptureError::Setup(format!("IAudioClient::Initialize (loopback) failed: {}", e)))?;

            let capture_client: IAudioCaptureClient = audio_client
                .GetService()
                .map_err(|e| CaptureError::Setup(format!("GetService failed: {}", e)))?;

            log::debug!(
                "opened loopback on {} ({} Hz, {} ch, {} bytes/frame)",
                device_id,
                format.sample_rate,
                format.channels,
                format.block_align
            );

            Ok(Self {
                capture_client,
                _mix_format: mix_format,
                audio_client,
                _device: device,
                _enumerator: enumerator,
                format,
                device_id,
                _com: com,
            })
        }
    }
}

impl LoopbackSource for WasapiLoopbackSource {
    fn format(&self) -> &AudioFormat {
        &self.format
    }

    fn start(&mut self) -> Result<(), CaptureError> {
        unsafe {
            self.audio_client
                .Start()
                .map_err(|e| CaptureError::Setup(format!("IAudioClient::Start failed: {}", e)))
        }
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        unsafe {
            self.audio_client
                .Stop()
                .map_err(|e| CaptureError::Device(format!("IAudioClient::Stop failed: {}", e)))
        }
    }

    fn next_packet_size(&mut self) -> Result<u32, CaptureError> {
        unsafe {
            self.capture_client
                .GetNextPacketSize()
                .map_err(|e| CaptureError::Device(format!("GetNextPacketSize failed: {}", e)))
        }
    }

    fn with_next_packet(&mut self, sink: &mut PacketSink<'_>) -> Result<(), CaptureError> {
        unsafe {
            let mut buffer_ptr: *mut u8 = std::ptr::null_mut();
            let mut num_frames: u32 = 0;
            let mut flags: u32 = 0;

            self.capture_client
                .GetBuffer(&mut buffer_ptr, &mut num_frames, &mut flags, None, None)
                .map_err(|e| CaptureError::Device(format!("GetBuffer failed: {}", e)))?;

            // A non-silent packet without a buffer is written as silence so the
            // file still advances by the packet's duration.
            let silent = flags & (AUDCLNT_BUFFERFLAGS_SILENT.0 as u32) != 0 || buffer_ptr.is_null();
            let data = if silent {
                PacketData::Silent
            } else {
                let len = num_frames as usize * self.format.block_align as usize;
                PacketData::Audio(std::slice::from_raw_parts(buffer_ptr, len))
            };

            let written = sink(&Packet {
                frames: num_frames,
                data,
            });

            let released = self
                .capture_client
                .ReleaseBuffer(num_frames)
                .map_err(|e| CaptureError::Device(format!("ReleaseBuffer failed: {}", e)));

            written.and(released)
        }
    }

    fn description(&self) -> String {
        format!("default render endpoint {}", self.device_id)
    }
}

/// Endpoint ID string, for logs.
unsafe fn device_id(device: &IMMDevice) -> String {
    match device.GetId() {
        Ok(id) => {
            let text = id.to_string().unwrap_or_default();
            CoTaskMemFree(Some(id.0 as *const c_void));
            text
        }
        Err(_) => "<unknown>".into(),
    }
}

/// Owns the `WAVEFORMATEX` returned by `GetMixFormat`.
struct MixFormat(*mut WAVEFORMATEX);

impl MixFormat {
    /// Copy the descriptor, extension included, into an owned [`AudioFormat`].
    unsafe fn to_audio_format(&self) -> Result<AudioFormat, CaptureError> {
        if self.0.is_null() {
            return Err(CaptureError::Setup("GetMixFormat returned no format".into()));
        }

        let base = std::slice::from_raw_parts(self.0 as *const u8, BASE_DESCRIPTOR_SIZE);
        let extension_len = u16::from_le_bytes([base[16], base[17]]) as usize;
        let full = std::slice::from_raw_parts(self.0 as *const u8, BASE_DESCRIPTOR_SIZE + extension_len);
        AudioFormat::from_descriptor_bytes(full)
    }
}

impl Drop for MixFormat {
    fn drop(&mut self) {
        if !self.0.is_null() {
            unsafe {
                CoTaskMemFree(Some(self.0 as *const c_void));
            }
        }
    }
}

/// RAII guard to call CoUninitialize when dropped.
struct CoUninitializeGuard;

impl Drop for CoUninitializeGuard {
    fn drop(&mut self) {
        unsafe {
            CoUninitialize();
        }
    }
}
