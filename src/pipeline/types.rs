//! Data types flowing through the transcription pipeline.

use std::time::Instant;

/// A fixed-duration frame of raw audio samples.
///
/// Produced by the capture thread, consumed exactly once by the recognizer
/// station. Frames are transferred along the queue, never shared.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// PCM samples (16-bit signed integers, mono).
    pub samples: Vec<i16>,
    /// Timestamp when this frame was captured.
    pub timestamp: Instant,
    /// Sequence number for ordering and drop accounting.
    pub sequence: u64,
}

impl AudioFrame {
    /// Creates a new audio frame.
    pub fn new(samples: Vec<i16>, timestamp: Instant, sequence: u64) -> Self {
        Self {
            samples,
            timestamp,
            sequence,
        }
    }

    /// Frame duration in milliseconds at the given sample rate.
    pub fn duration_ms(&self, sample_rate: u32) -> u32 {
        if sample_rate == 0 {
            return 0;
        }
        (self.samples.len() as u64 * 1000 / sample_rate as u64) as u32
    }
}

/// The recognizer's current hypothesis for the in-progress utterance.
///
/// Within one utterance the engine emits zero or more `Partial` events, each
/// superseding the last, followed by exactly one `Final` that supersedes them
/// all. Partials are revisable; engines routinely rewrite earlier words of a
/// hypothesis, so consumers must replace, never append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    /// Tentative, revisable transcription of the in-progress utterance.
    Partial { text: String },
    /// Committed transcription once the engine judges the utterance complete.
    Final { text: String },
}

impl RecognitionEvent {
    /// The hypothesis text, regardless of kind.
    pub fn text(&self) -> &str {
        match self {
            RecognitionEvent::Partial { text } | RecognitionEvent::Final { text } => text,
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, RecognitionEvent::Final { .. })
    }
}

/// A buffer mutation produced by the reconciler.
///
/// Exactly one command per non-empty recognition event; commands are applied
/// to the text buffer in event order by a single consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferCommand {
    /// Replace the pending region wholesale.
    SetPending(String),
    /// Append formatted text to the committed region and clear pending.
    CommitPending(String),
}
