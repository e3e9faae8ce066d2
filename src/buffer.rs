//! Thread-safe accumulator for recognition output.
//!
//! Holds two logical regions: `committed` (finalized utterances, append-only)
//! and `pending` (the in-flight partial hypothesis, replaced wholesale on each
//! partial result and cleared when an utterance finalizes). All operations are
//! atomic with respect to concurrent readers: a snapshot never pairs a
//! committed region from before a commit with a pending region from after it.

use std::sync::Mutex;

/// A consistent view of the buffer as of one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Finalized utterances joined with single spaces.
    pub committed: String,
    /// The current in-flight partial hypothesis, empty if none.
    pub pending: String,
}

impl Snapshot {
    /// Committed text plus the in-flight partial, for single-region displays.
    pub fn full_text(&self) -> String {
        if self.pending.is_empty() {
            self.committed.clone()
        } else if self.committed.is_empty() {
            self.pending.clone()
        } else {
            format!("{} {}", self.committed, self.pending)
        }
    }
}

#[derive(Debug, Default)]
struct Regions {
    committed: Vec<String>,
    pending: String,
}

/// Thread-safe text buffer for accumulating transcription results.
///
/// Mutations are expected to come from a single writer (the reconciler) while
/// any number of readers take snapshots; the mutex critical sections are
/// bounded by string length, so readers never stall writers for long and the
/// capture path never touches this lock at all.
#[derive(Debug, Default)]
pub struct TextBuffer {
    regions: Mutex<Regions>,
}

impl TextBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the pending region wholesale.
    ///
    /// Partial hypotheses supersede each other; there is no append semantic
    /// here. An empty string clears the pending region.
    pub fn set_pending(&self, text: &str) {
        let mut regions = self.lock();
        regions.pending = collapse_whitespace(text);
    }

    /// Append a finalized utterance to the committed region and clear pending.
    ///
    /// The text is formatted first (whitespace collapsed, first letter
    /// capitalized, terminal punctuation ensured). Both mutations happen under
    /// one lock acquisition, so no reader can observe the committed text
    /// alongside the stale pending hypothesis it supersedes.
    pub fn commit_pending(&self, text: &str) {
        let formatted = format_utterance(text);
        let mut regions = self.lock();
        if !formatted.is_empty() {
            regions.committed.push(formatted);
        }
        regions.pending.clear();
    }

    /// Atomically empty both regions.
    pub fn clear(&self) {
        let mut regions = self.lock();
        regions.committed.clear();
        regions.pending.clear();
    }

    /// Returns a consistent (committed, pending) pair as of one instant.
    pub fn snapshot(&self) -> Snapshot {
        let regions = self.lock();
        Snapshot {
            committed: regions.committed.join(" "),
            pending: regions.pending.clone(),
        }
    }

    /// Count of whitespace-delimited tokens across committed and pending.
    ///
    /// Recomputed on every call rather than tracked incrementally, so
    /// formatting edge cases cannot make the count drift from the text.
    pub fn word_count(&self) -> usize {
        let regions = self.lock();
        let committed: usize = regions
            .committed
            .iter()
            .map(|s| s.split_whitespace().count())
            .sum();
        committed + regions.pending.split_whitespace().count()
    }

    /// True when both regions are empty.
    pub fn is_empty(&self) -> bool {
        let regions = self.lock();
        regions.committed.is_empty() && regions.pending.is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Regions> {
        // A poisoned lock means a writer panicked mid-mutation; the regions
        // are still structurally valid strings, so recover the guard.
        match self.regions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Collapse runs of whitespace to single spaces and trim the ends.
fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Format a finalized utterance for display.
///
/// Policy: collapse whitespace, capitalize the first character, and append a
/// period unless the text already ends in sentence punctuation. The exact
/// heuristics are a documented choice, not inferred engine behavior.
fn format_utterance(text: &str) -> String {
    let cleaned = collapse_whitespace(text);
    if cleaned.is_empty() {
        return cleaned;
    }

    let mut chars = cleaned.chars();
    let mut formatted = match chars.next() {
        Some(first) => {
            let mut s = String::with_capacity(cleaned.len() + 1);
            s.extend(first.to_uppercase());
            s.push_str(chars.as_str());
            s
        }
        None => cleaned,
    };

    if !formatted.ends_with(['.', '!', '?']) {
        formatted.push('.');
    }

    formatted
}
