//! Default configuration constants for larynx.
//!
//! Shared across configuration types to ensure consistency and eliminate
//! duplication.

use std::time::Duration;

/// Default audio sample rate in Hz.
///
/// 16kHz is the standard for speech recognition and provides a good balance
/// between quality and computational efficiency for voice applications.
pub const SAMPLE_RATE: u32 = 16000;

/// Default audio frame duration in milliseconds.
///
/// Frames are the unit of transfer between capture and recognition. 100ms at
/// 16kHz is 1600 samples per frame, small enough for sub-2-second end-to-end
/// latency and large enough to keep per-frame overhead negligible.
pub const FRAME_DURATION_MS: u32 = 100;

/// Default capacity of the capture → recognizer frame queue, in frames.
///
/// 16 frames at 100ms each buffers ~1.6 seconds of audio. When the recognizer
/// falls behind, the oldest queued frame is dropped rather than blocking the
/// capture side.
pub const AUDIO_QUEUE_FRAMES: usize = 16;

/// Default capacity of the recognizer → reconciler event queue.
pub const EVENT_QUEUE_LEN: usize = 32;

/// Default drain timeout in milliseconds.
///
/// On Stop, workers get this long to consume queued frames and flush a final
/// hypothesis (roughly 2x the expected engine latency). Past the deadline,
/// remaining queued data is discarded and the shutdown still completes.
pub const DRAIN_TIMEOUT_MS: u64 = 3000;

/// Interval at which the capture thread polls the audio source.
pub const CAPTURE_POLL_INTERVAL: Duration = Duration::from_millis(16);

/// Consecutive capture read failures tolerated before the session is torn down.
pub const MAX_CONSECUTIVE_READ_ERRORS: u32 = 10;

/// Maximum seconds of raw samples the capture device buffer holds before
/// discarding the oldest samples.
pub const DEVICE_BUFFER_SECS: u32 = 2;
