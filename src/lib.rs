//! larynx - Real-time speech transcription
//!
//! Streams microphone audio through a speech-recognition engine and
//! accumulates partial/final hypotheses into stable, presentable text.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
pub mod buffer;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod error;
pub mod pipeline;
pub mod stt;

// Core traits (source → recognize → reconcile)
pub use audio::source::AudioSource;
pub use stt::recognizer::Recognizer;

// Pipeline
pub use pipeline::controller::{PipelineController, PipelineState};
pub use pipeline::types::{AudioFrame, RecognitionEvent};

// Text accumulation
pub use buffer::{Snapshot, TextBuffer};

// Error handling
pub use error::{LarynxError, Result};

// Config
pub use config::Config;
