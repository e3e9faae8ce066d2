//! Vosk-backed streaming recognizer (feature `vosk`).
//!
//! Requires libvosk at link time and a model directory on disk. The engine's
//! endpointing drives utterance boundaries: `accept_waveform` reports
//! `Finalized` when it judges the utterance complete, otherwise the current
//! partial hypothesis is available.

use crate::error::{LarynxError, Result};
use crate::pipeline::types::RecognitionEvent;
use crate::stt::recognizer::Recognizer;
use std::path::Path;
use vosk::{DecodingState, Model};

/// Streaming recognizer backed by a Vosk model.
pub struct VoskRecognizer {
    recognizer: vosk::Recognizer,
    /// Last partial hypothesis emitted, to suppress duplicate events when the
    /// engine's hypothesis hasn't changed between frames.
    last_partial: String,
}

impl VoskRecognizer {
    /// Load a model and create a recognizer for the given sample rate.
    ///
    /// Fails with `ModelNotFound` if the model directory is missing or
    /// unreadable, and `Engine` if recognizer construction fails.
    pub fn new(model_path: &Path, sample_rate: u32) -> Result<Self> {
        if !model_path.is_dir() {
            return Err(LarynxError::ModelNotFound {
                path: model_path.display().to_string(),
            });
        }

        let model = Model::new(model_path.display().to_string()).ok_or_else(|| {
            LarynxError::ModelNotFound {
                path: model_path.display().to_string(),
            }
        })?;

        let recognizer =
            vosk::Recognizer::new(&model, sample_rate as f32).ok_or_else(|| LarynxError::Engine {
                message: format!("failed to create recognizer at {sample_rate}Hz"),
            })?;

        Ok(Self {
            recognizer,
            last_partial: String::new(),
        })
    }
}

impl Recognizer for VoskRecognizer {
    fn feed(&mut self, samples: &[i16]) -> Result<Option<RecognitionEvent>> {
        let state = self
            .recognizer
            .accept_waveform(samples)
            .map_err(|e| LarynxError::Engine {
                message: format!("accept_waveform rejected input: {e}"),
            })?;

        match state {
            DecodingState::Finalized => {
                self.last_partial.clear();
                let text = self
                    .recognizer
                    .result()
                    .single()
                    .map(|r| r.text.to_string())
                    .unwrap_or_default();
                Ok(Some(RecognitionEvent::Final { text }))
            }
            DecodingState::Running => {
                let partial = self.recognizer.partial_result().partial.to_string();
                if partial == self.last_partial {
                    return Ok(None);
                }
                self.last_partial = partial.clone();
                Ok(Some(RecognitionEvent::Partial { text: partial }))
            }
            DecodingState::Failed => Err(LarynxError::Engine {
                message: "decoder failure while accepting waveform".to_string(),
            }),
        }
    }

    fn flush(&mut self) -> Result<Option<RecognitionEvent>> {
        self.last_partial.clear();
        let text = self
            .recognizer
            .final_result()
            .single()
            .map(|r| r.text.to_string())
            .unwrap_or_default();
        if text.is_empty() {
            Ok(None)
        } else {
            Ok(Some(RecognitionEvent::Final { text }))
        }
    }

    fn reset(&mut self) {
        self.last_partial.clear();
        self.recognizer.reset();
    }
}
