//! Real audio capture using CPAL (Cross-Platform Audio Library).
//!
//! The hardware callback appends samples to a short, capped buffer and never
//! blocks: on overflow the oldest samples are discarded and an overrun counter
//! is incremented. The capture thread drains the buffer through
//! `read_samples`.

use crate::audio::source::AudioSource;
use crate::config::AudioConfig;
use crate::defaults;
use crate::error::{LarynxError, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Run a closure with stderr temporarily redirected to /dev/null.
///
/// This suppresses noisy ALSA/JACK/PipeWire messages that CPAL triggers
/// when probing audio backends. The messages are harmless but confusing to
/// users.
///
/// # Safety
/// Uses `libc::dup`/`libc::dup2` to save and restore file descriptor 2
/// (stderr). Safe as long as no other thread is concurrently manipulating
/// fd 2.
fn with_suppressed_stderr<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    unsafe {
        let saved_fd = libc::dup(2);
        let devnull = libc::open(c"/dev/null".as_ptr(), libc::O_WRONLY);
        if saved_fd >= 0 && devnull >= 0 {
            libc::dup2(devnull, 2);
            libc::close(devnull);
        }

        let result = f();

        if saved_fd >= 0 {
            libc::dup2(saved_fd, 2);
            libc::close(saved_fd);
        }

        result
    }
}

/// Preferred device names for PipeWire/PulseAudio environments.
const PREFERRED_DEVICES: &[&str] = &["pipewire", "pulse", "default"];

/// Device name patterns to filter out (not useful for voice input).
const FILTERED_PATTERNS: &[&str] = &[
    "surround", "front:", "rear:", "center:", "side:", "hdmi", "s/pdif",
];

fn should_filter_device(name: &str) -> bool {
    let lower = name.to_lowercase();
    FILTERED_PATTERNS.iter().any(|p| lower.contains(p))
}

fn is_preferred_device(name: &str) -> bool {
    let lower = name.to_lowercase();
    PREFERRED_DEVICES.iter().any(|p| lower.contains(p))
}

/// List available audio input devices.
///
/// Preferred devices are marked with "\[recommended\]"; obviously unusable
/// ones (surround channels, HDMI) are filtered out.
///
/// # Errors
/// Returns `LarynxError::AudioCapture` if device enumeration fails.
pub fn list_devices() -> Result<Vec<String>> {
    let devices = with_suppressed_stderr(|| {
        let host = cpal::default_host();
        host.input_devices()
    })
    .map_err(|e| LarynxError::AudioCapture {
        message: format!("Failed to enumerate input devices: {}", e),
    })?;

    let mut names = Vec::new();
    for device in devices {
        if let Ok(name) = device.name() {
            if should_filter_device(&name) {
                continue;
            }
            if is_preferred_device(&name) {
                names.push(format!("{} [recommended]", name));
            } else {
                names.push(name);
            }
        }
    }

    Ok(names)
}

/// Find the input device matching `device_name`, or the best default.
///
/// Defaults prefer PipeWire/PulseAudio so the desktop's device selection is
/// respected.
fn find_device(device_name: Option<&str>) -> Result<cpal::Device> {
    with_suppressed_stderr(|| {
        let host = cpal::default_host();

        if let Some(name) = device_name {
            let devices = host.input_devices().map_err(|e| LarynxError::AudioCapture {
                message: format!("Failed to enumerate devices: {}", e),
            })?;
            for dev in devices {
                if dev.name().as_deref() == Ok(name) {
                    return Ok(dev);
                }
            }
            return Err(LarynxError::DeviceUnavailable {
                device: name.to_string(),
            });
        }

        if let Ok(devices) = host.input_devices() {
            for dev in devices {
                if let Ok(name) = dev.name() {
                    if is_preferred_device(&name) && !should_filter_device(&name) {
                        return Ok(dev);
                    }
                }
            }
        }

        host.default_input_device()
            .ok_or_else(|| LarynxError::DeviceUnavailable {
                device: "default".to_string(),
            })
    })
}

/// Wrapper for cpal::Stream to make it Send.
///
/// SAFETY: the stream is only touched while holding the Mutex in
/// `CpalAudioSource`, so access is serialized even though the handle moves
/// between threads.
struct SendableStream(cpal::Stream);

unsafe impl Send for SendableStream {}

/// Microphone capture via CPAL, producing 16-bit PCM mono at the configured
/// sample rate.
///
/// Tries the exact target format first (i16, then f32, both mono at the
/// target rate); falls back to the device's native config with software
/// channel mixing and decimation. The callback-side buffer is capped; when the
/// consumer falls behind, the oldest samples are dropped and counted as
/// overruns rather than ever stalling the callback.
pub struct CpalAudioSource {
    device: cpal::Device,
    stream: Mutex<Option<SendableStream>>,
    buffer: Arc<Mutex<Vec<i16>>>,
    overruns: Arc<AtomicU64>,
    sample_rate: u32,
    buffer_cap: usize,
}

impl CpalAudioSource {
    /// Open the device described by the audio configuration.
    ///
    /// The device itself is located here; the stream starts on `start()`.
    pub fn open(config: &AudioConfig) -> Result<Self> {
        let device = find_device(config.device.as_deref())?;
        let buffer_cap = (config.sample_rate * defaults::DEVICE_BUFFER_SECS) as usize;

        Ok(Self {
            device,
            stream: Mutex::new(None),
            buffer: Arc::new(Mutex::new(Vec::new())),
            overruns: Arc::new(AtomicU64::new(0)),
            sample_rate: config.sample_rate,
            buffer_cap,
        })
    }

    /// Callback-side buffer overruns since the stream started.
    pub fn overruns(&self) -> u64 {
        self.overruns.load(Ordering::Relaxed)
    }

    /// Append converted samples to the capped buffer, dropping the oldest on
    /// overflow. Called from the audio callback; must never block beyond the
    /// short buffer lock.
    fn push_samples(buffer: &Mutex<Vec<i16>>, overruns: &AtomicU64, cap: usize, samples: &[i16]) {
        if let Ok(mut buf) = buffer.lock() {
            buf.extend_from_slice(samples);
            if buf.len() > cap {
                let excess = buf.len() - cap;
                buf.drain(..excess);
                overruns.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Build the input stream.
    ///
    /// Tries in order:
    /// 1. i16/mono at the target rate — zero-conversion path
    /// 2. f32/mono at the target rate — devices that only expose float
    /// 3. Device native config with software mixing/decimation — PipeWire
    ///    setups that accept non-native configs but never deliver data
    fn build_stream(&self) -> Result<cpal::Stream> {
        let target_config = cpal::StreamConfig {
            channels: 1,
            sample_rate: cpal::SampleRate(self.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let err_callback = |err| {
            eprintln!("larynx: audio stream error: {}", err);
        };

        let buffer = Arc::clone(&self.buffer);
        let overruns = Arc::clone(&self.overruns);
        let cap = self.buffer_cap;
        if let Ok(stream) = self.device.build_input_stream(
            &target_config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                Self::push_samples(&buffer, &overruns, cap, data);
            },
            err_callback,
            None,
        ) {
            return Ok(stream);
        }

        let buffer = Arc::clone(&self.buffer);
        let overruns = Arc::clone(&self.overruns);
        if let Ok(stream) = self.device.build_input_stream(
            &target_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let converted: Vec<i16> = data
                    .iter()
                    .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                    .collect();
                Self::push_samples(&buffer, &overruns, cap, &converted);
            },
            err_callback,
            None,
        ) {
            return Ok(stream);
        }

        self.build_stream_native()
    }

    /// Build a stream at the device's native config, converting in software.
    fn build_stream_native(&self) -> Result<cpal::Stream> {
        use cpal::SampleFormat;

        let default_config =
            self.device
                .default_input_config()
                .map_err(|e| LarynxError::AudioCapture {
                    message: format!("Failed to query default input config: {}", e),
                })?;

        let native_rate = default_config.sample_rate().0;
        let native_channels = default_config.channels() as usize;
        let target_rate = self.sample_rate;
        let stream_config: cpal::StreamConfig = default_config.clone().into();

        let err_callback = |err| {
            eprintln!("larynx: audio stream error: {}", err);
        };

        let buffer = Arc::clone(&self.buffer);
        let overruns = Arc::clone(&self.overruns);
        let cap = self.buffer_cap;

        match default_config.sample_format() {
            SampleFormat::I16 => self
                .device
                .build_input_stream(
                    &stream_config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        let converted =
                            downmix_and_decimate(data, native_channels, native_rate, target_rate);
                        Self::push_samples(&buffer, &overruns, cap, &converted);
                    },
                    err_callback,
                    None,
                )
                .map_err(|e| LarynxError::AudioCapture {
                    message: format!("Failed to build native i16 stream: {}", e),
                }),
            SampleFormat::F32 => self
                .device
                .build_input_stream(
                    &stream_config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        let as_i16: Vec<i16> = data
                            .iter()
                            .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                            .collect();
                        let converted = downmix_and_decimate(
                            &as_i16,
                            native_channels,
                            native_rate,
                            target_rate,
                        );
                        Self::push_samples(&buffer, &overruns, cap, &converted);
                    },
                    err_callback,
                    None,
                )
                .map_err(|e| LarynxError::AudioCapture {
                    message: format!("Failed to build native f32 stream: {}", e),
                }),
            fmt => Err(LarynxError::AudioFormatMismatch {
                expected: "i16 or f32".to_string(),
                actual: format!("{:?}", fmt),
            }),
        }
    }
}

impl AudioSource for CpalAudioSource {
    fn start(&mut self) -> Result<()> {
        let stream = self.build_stream()?;
        stream.play().map_err(|e| LarynxError::AudioCapture {
            message: format!("Failed to start audio stream: {}", e),
        })?;

        if let Ok(mut guard) = self.stream.lock() {
            *guard = Some(SendableStream(stream));
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        // Dropping the stream stops capture and releases the device.
        if let Ok(mut guard) = self.stream.lock() {
            guard.take();
        }
        if let Ok(mut buf) = self.buffer.lock() {
            buf.clear();
        }
        Ok(())
    }

    fn read_samples(&mut self) -> Result<Vec<i16>> {
        let mut buf = self.buffer.lock().map_err(|_| LarynxError::AudioCapture {
            message: "capture buffer lock poisoned".to_string(),
        })?;
        Ok(std::mem::take(&mut *buf))
    }
}

/// Mix multi-channel audio to mono and decimate to the target rate.
///
/// Nearest-sample decimation is adequate here: speech engines are tolerant of
/// it and the preferred-format paths avoid this code entirely on PipeWire and
/// PulseAudio hosts.
fn downmix_and_decimate(
    samples: &[i16],
    channels: usize,
    source_rate: u32,
    target_rate: u32,
) -> Vec<i16> {
    let mono: Vec<i16> = if channels <= 1 {
        samples.to_vec()
    } else {
        samples
            .chunks_exact(channels)
            .map(|frame| {
                let sum: i32 = frame.iter().map(|&s| s as i32).sum();
                (sum / channels as i32) as i16
            })
            .collect()
    };

    if source_rate == target_rate || source_rate == 0 {
        return mono;
    }

    let out_len = (mono.len() as u64 * target_rate as u64 / source_rate as u64) as usize;
    (0..out_len)
        .map(|i| {
            let src = (i as u64 * source_rate as u64 / target_rate as u64) as usize;
            mono[src.min(mono.len().saturating_sub(1))]
        })
        .collect()
}
