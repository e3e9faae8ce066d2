//! Audio source abstraction.

use crate::error::{LarynxError, Result};
use std::collections::VecDeque;

/// Trait for audio input sources.
///
/// This trait allows swapping implementations (real capture device vs mock).
/// A source is single-session: once stopped it is not restarted; each
/// recording session opens a fresh source.
pub trait AudioSource: Send {
    /// Start capturing audio from the source.
    fn start(&mut self) -> Result<()>;

    /// Stop capturing audio and release the device. Idempotent.
    fn stop(&mut self) -> Result<()>;

    /// Read whatever samples the source has buffered since the last read.
    ///
    /// Non-blocking; returns an empty Vec when nothing is buffered yet.
    /// Samples are 16-bit PCM mono at the configured sample rate.
    fn read_samples(&mut self) -> Result<Vec<i16>>;

    /// Whether this source ends on its own (file/mock) rather than running
    /// until stopped (microphone). Finite sources signal exhaustion by
    /// returning empty reads after `start`.
    fn is_finite(&self) -> bool {
        false
    }
}

/// Mock audio source for testing.
///
/// Yields scripted sample chunks, one per read, then empty reads.
pub struct MockAudioSource {
    chunks: VecDeque<Vec<i16>>,
    is_started: bool,
    stopped: bool,
    should_fail_start: bool,
    should_fail_read: bool,
    error_message: String,
}

impl MockAudioSource {
    /// Create a mock source with no audio.
    pub fn new() -> Self {
        Self {
            chunks: VecDeque::new(),
            is_started: false,
            stopped: false,
            should_fail_start: false,
            should_fail_read: false,
            error_message: "mock audio error".to_string(),
        }
    }

    /// Script the chunks returned by successive reads.
    pub fn with_chunks(mut self, chunks: Vec<Vec<i16>>) -> Self {
        self.chunks = chunks.into();
        self
    }

    /// Script `frames` reads of `frame_len` zero samples each.
    pub fn with_silence(mut self, frames: usize, frame_len: usize) -> Self {
        self.chunks = (0..frames).map(|_| vec![0i16; frame_len]).collect();
        self
    }

    /// Configure the mock to fail on start.
    pub fn with_start_failure(mut self) -> Self {
        self.should_fail_start = true;
        self
    }

    /// Configure the mock to fail on every read.
    pub fn with_read_failure(mut self) -> Self {
        self.should_fail_read = true;
        self
    }

    /// Configure the error message for failures.
    pub fn with_error_message(mut self, message: &str) -> Self {
        self.error_message = message.to_string();
        self
    }

    /// Check if the source is started.
    pub fn is_started(&self) -> bool {
        self.is_started
    }

    /// Check if the source was ever stopped.
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }
}

impl Default for MockAudioSource {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSource for MockAudioSource {
    fn start(&mut self) -> Result<()> {
        if self.should_fail_start {
            return Err(LarynxError::DeviceUnavailable {
                device: self.error_message.clone(),
            });
        }
        self.is_started = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.is_started = false;
        self.stopped = true;
        Ok(())
    }

    fn read_samples(&mut self) -> Result<Vec<i16>> {
        if self.should_fail_read {
            return Err(LarynxError::AudioCapture {
                message: self.error_message.clone(),
            });
        }
        if !self.is_started {
            return Ok(Vec::new());
        }
        Ok(self.chunks.pop_front().unwrap_or_default())
    }

    fn is_finite(&self) -> bool {
        true
    }
}
