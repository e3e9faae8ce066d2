//! Speech-to-text engine abstraction and implementations.

pub mod recognizer;

#[cfg(feature = "vosk")]
pub mod vosk;

pub use recognizer::{MockRecognizer, Recognizer};

#[cfg(feature = "vosk")]
pub use vosk::VoskRecognizer;
