//! Merges the partial/final event stream into text buffer mutations.

use crate::buffer::TextBuffer;
use crate::pipeline::error::StationError;
use crate::pipeline::station::Station;
use crate::pipeline::types::{BufferCommand, RecognitionEvent};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Translates recognition events into buffer commands.
///
/// Exactly one command per non-empty event: a partial replaces the pending
/// region wholesale (hypotheses supersede, never append), a final commits the
/// utterance and clears pending. Events whose text is empty or whitespace are
/// dropped so blank entries never reach the buffer.
pub fn translate(event: &RecognitionEvent) -> Option<BufferCommand> {
    let text = event.text().trim();
    match event {
        RecognitionEvent::Partial { .. } => {
            if text.is_empty() {
                None
            } else {
                Some(BufferCommand::SetPending(text.to_string()))
            }
        }
        RecognitionEvent::Final { .. } => {
            if text.is_empty() {
                None
            } else {
                Some(BufferCommand::CommitPending(text.to_string()))
            }
        }
    }
}

/// Terminal station applying buffer commands in event order.
///
/// This is the single writer of the text buffer: the runner consumes the
/// event queue in strict FIFO order, so an older partial can never overwrite
/// a newer final.
pub struct ReconcilerStation {
    buffer: Arc<TextBuffer>,
    /// Cleared when a drain timeout abandons the session; a stale station
    /// must not mutate a buffer that persists into the next session.
    live: Arc<AtomicBool>,
}

impl ReconcilerStation {
    pub fn new(buffer: Arc<TextBuffer>, live: Arc<AtomicBool>) -> Self {
        Self { buffer, live }
    }

    fn apply(&self, command: BufferCommand) {
        match command {
            BufferCommand::SetPending(text) => self.buffer.set_pending(&text),
            BufferCommand::CommitPending(text) => self.buffer.commit_pending(&text),
        }
    }
}

impl Station for ReconcilerStation {
    type Input = RecognitionEvent;
    type Output = ();

    fn process(&mut self, event: RecognitionEvent) -> Result<Option<()>, StationError> {
        if !self.live.load(Ordering::SeqCst) {
            // Abandoned session: drop late events instead of writing them.
            return Ok(None);
        }
        if let Some(command) = translate(&event) {
            self.apply(command);
        }
        Ok(None)
    }

    fn name(&self) -> &'static str {
        "Reconciler"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partial(text: &str) -> RecognitionEvent {
        RecognitionEvent::Partial {
            text: text.to_string(),
        }
    }

    fn final_ev(text: &str) -> RecognitionEvent {
        RecognitionEvent::Final {
            text: text.to_string(),
        }
    }

    fn station(buffer: Arc<TextBuffer>) -> ReconcilerStation {
        ReconcilerStation::new(buffer, Arc::new(AtomicBool::new(true)))
    }

    #[test]
    fn test_translate_partial_to_set_pending() {
        assert_eq!(
            translate(&partial("hel")),
            Some(BufferCommand::SetPending("hel".to_string()))
        );
    }

    #[test]
    fn test_translate_final_to_commit() {
        assert_eq!(
            translate(&final_ev("hello world")),
            Some(BufferCommand::CommitPending("hello world".to_string()))
        );
    }

    #[test]
    fn test_translate_drops_empty_text() {
        assert_eq!(translate(&partial("")), None);
        assert_eq!(translate(&partial("   ")), None);
        assert_eq!(translate(&final_ev("")), None);
        assert_eq!(translate(&final_ev(" \t ")), None);
    }

    #[test]
    fn test_partials_supersede_then_final_commits() {
        let buffer = Arc::new(TextBuffer::new());
        let mut station = station(buffer.clone());

        station.process(partial("hel")).unwrap();
        station.process(partial("hello")).unwrap();
        assert_eq!(buffer.snapshot().pending, "hello");

        station.process(final_ev("hello world")).unwrap();
        let snap = buffer.snapshot();
        assert_eq!(snap.committed, "Hello world.");
        assert_eq!(snap.pending, "");
        assert_eq!(buffer.word_count(), 2);
    }

    #[test]
    fn test_sequence_of_utterances_commits_in_order() {
        let buffer = Arc::new(TextBuffer::new());
        let mut station = station(buffer.clone());

        for ev in [
            partial("how"),
            final_ev("how are you"),
            partial("i am"),
            final_ev("i am fine"),
        ] {
            station.process(ev).unwrap();
        }

        assert_eq!(buffer.snapshot().committed, "How are you. I am fine.");
    }

    #[test]
    fn test_empty_final_clears_nothing_and_commits_nothing() {
        let buffer = Arc::new(TextBuffer::new());
        let mut station = station(buffer.clone());

        station.process(partial("half a thought")).unwrap();
        station.process(final_ev("")).unwrap();

        // The empty final is dropped entirely; the pending hypothesis stays
        // until a real final or clear supersedes it.
        let snap = buffer.snapshot();
        assert_eq!(snap.committed, "");
        assert_eq!(snap.pending, "half a thought");
    }

    #[test]
    fn test_stale_station_never_mutates_the_buffer() {
        let buffer = Arc::new(TextBuffer::new());
        let live = Arc::new(AtomicBool::new(true));
        let mut station = ReconcilerStation::new(buffer.clone(), live.clone());

        station.process(final_ev("kept")).unwrap();
        live.store(false, Ordering::SeqCst);
        station.process(final_ev("discarded")).unwrap();
        station.process(partial("also discarded")).unwrap();

        let snap = buffer.snapshot();
        assert_eq!(snap.committed, "Kept.");
        assert_eq!(snap.pending, "");
    }
}
