//! Station feeding audio frames to the recognition engine.

use crate::pipeline::error::StationError;
use crate::pipeline::station::Station;
use crate::pipeline::types::{AudioFrame, RecognitionEvent};
use crate::stt::recognizer::Recognizer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Shared handle to the engine, persistent across recording sessions.
///
/// Loading a model is expensive; the controller keeps one engine alive and
/// resets it at each Start. Only the recognizer station's thread locks it
/// while a session is running, so contention is nil in practice.
pub type SharedRecognizer = Arc<Mutex<Box<dyn Recognizer>>>;

/// Consumes the audio-frame queue in strict FIFO order and emits recognition
/// events.
///
/// An engine error is a contract violation (wrong format reaching the engine)
/// or an internal decode failure; either way the session cannot continue, so
/// it surfaces as fatal. On end-of-input the engine is flushed so an
/// in-progress utterance is committed rather than discarded.
pub struct RecognizerStation {
    recognizer: SharedRecognizer,
    /// Cleared when a drain timeout abandons the session; a stale station
    /// must not feed the shared engine a successor session now owns.
    live: Arc<AtomicBool>,
}

impl RecognizerStation {
    pub fn new(recognizer: SharedRecognizer, live: Arc<AtomicBool>) -> Self {
        Self { recognizer, live }
    }
}

impl Station for RecognizerStation {
    type Input = AudioFrame;
    type Output = RecognitionEvent;

    fn process(&mut self, frame: AudioFrame) -> Result<Option<RecognitionEvent>, StationError> {
        if !self.live.load(Ordering::SeqCst) {
            // Abandoned session: discard queued audio instead of feeding it.
            return Ok(None);
        }

        let mut engine = self
            .recognizer
            .lock()
            .map_err(|_| StationError::Fatal("recognizer lock poisoned".to_string()))?;

        engine
            .feed(&frame.samples)
            .map_err(|e| StationError::Fatal(e.to_string()))
    }

    fn flush(&mut self) -> Result<Option<RecognitionEvent>, StationError> {
        if !self.live.load(Ordering::SeqCst) {
            return Ok(None);
        }

        let mut engine = self
            .recognizer
            .lock()
            .map_err(|_| StationError::Fatal("recognizer lock poisoned".to_string()))?;

        engine
            .flush()
            .map_err(|e| StationError::Fatal(e.to_string()))
    }

    fn name(&self) -> &'static str {
        "Recognizer"
    }
}
