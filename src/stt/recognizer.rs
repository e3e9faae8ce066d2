//! Streaming recognition engine interface.

use crate::error::{LarynxError, Result};
use crate::pipeline::types::RecognitionEvent;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Trait for streaming speech recognition engines.
///
/// This trait allows swapping implementations (real engine vs mock). An
/// engine is stateful: it accumulates acoustic context across `feed` calls
/// until its own endpointing produces a `Final`, then starts the next
/// utterance. Engine resources are released on drop.
pub trait Recognizer: Send {
    /// Feed one frame of audio and return at most one recognition event.
    ///
    /// Synchronous per call and possibly expensive. Audio must be 16-bit PCM
    /// mono at the engine's required sample rate; malformed input is a
    /// contract violation and surfaces as `LarynxError::Engine`, which is
    /// fatal to the recording session rather than retried.
    fn feed(&mut self, samples: &[i16]) -> Result<Option<RecognitionEvent>>;

    /// Signal end-of-input and return the final hypothesis, if any.
    ///
    /// Treats the boundary as an implicit Final so an in-progress utterance
    /// is committed rather than discarded when recording stops.
    fn flush(&mut self) -> Result<Option<RecognitionEvent>>;

    /// Discard in-progress utterance state.
    ///
    /// Called when a new recording session starts or after an engine error.
    fn reset(&mut self);
}

/// Mock recognizer for testing.
///
/// Replays a scripted sequence of per-feed results, then returns `Ok(None)`
/// for any further frames. The flush result is scripted separately.
pub struct MockRecognizer {
    script: VecDeque<Result<Option<RecognitionEvent>>>,
    flush_result: Option<RecognitionEvent>,
    feed_counter: Option<Arc<AtomicU64>>,
    feed_delay: Option<std::time::Duration>,
    reset_count: u64,
}

impl MockRecognizer {
    /// Create a mock that emits nothing.
    pub fn new() -> Self {
        Self {
            script: VecDeque::new(),
            flush_result: None,
            feed_counter: None,
            feed_delay: None,
            reset_count: 0,
        }
    }

    /// Script the events returned by successive `feed` calls.
    ///
    /// `None` entries model frames that produce no hypothesis change.
    pub fn with_script(mut self, events: Vec<Option<RecognitionEvent>>) -> Self {
        self.script = events.into_iter().map(Ok).collect();
        self
    }

    /// Script the event returned by `flush`.
    pub fn with_flush(mut self, event: RecognitionEvent) -> Self {
        self.flush_result = Some(event);
        self
    }

    /// Make the feed at the given zero-based position fail with an engine
    /// error.
    pub fn with_failure_at(mut self, position: usize, message: &str) -> Self {
        while self.script.len() <= position {
            self.script.push_back(Ok(None));
        }
        self.script[position] = Err(LarynxError::Engine {
            message: message.to_string(),
        });
        self
    }

    /// Share a counter incremented once per `feed` call.
    ///
    /// Lets tests assert that every queued frame actually reached the engine.
    pub fn with_feed_counter(mut self, counter: Arc<AtomicU64>) -> Self {
        self.feed_counter = Some(counter);
        self
    }

    /// Sleep this long inside every `feed`, to model a slow engine.
    pub fn with_feed_delay(mut self, delay: std::time::Duration) -> Self {
        self.feed_delay = Some(delay);
        self
    }

    /// Number of times `reset` has been called.
    pub fn reset_count(&self) -> u64 {
        self.reset_count
    }
}

impl Default for MockRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Recognizer for MockRecognizer {
    fn feed(&mut self, _samples: &[i16]) -> Result<Option<RecognitionEvent>> {
        if let Some(delay) = self.feed_delay {
            std::thread::sleep(delay);
        }
        if let Some(ref counter) = self.feed_counter {
            counter.fetch_add(1, Ordering::SeqCst);
        }
        match self.script.pop_front() {
            Some(result) => result,
            None => Ok(None),
        }
    }

    fn flush(&mut self) -> Result<Option<RecognitionEvent>> {
        Ok(self.flush_result.take())
    }

    fn reset(&mut self) {
        self.reset_count += 1;
    }
}
