//! Capture-to-text pipeline.
//!
//! Implements a multi-station pipeline where each worker runs in its own
//! thread, connected by bounded crossbeam channels. The capture side never
//! blocks: a full frame queue drops its oldest entry instead.

pub mod controller;
pub mod error;
pub mod reconciler;
pub mod recognizer_station;
pub mod station;
pub mod types;

pub use controller::{PipelineController, PipelineState, SourceFactory};
pub use error::{ChannelReporter, ErrorReporter, LogReporter, StationError};
pub use reconciler::ReconcilerStation;
pub use recognizer_station::{RecognizerStation, SharedRecognizer};
pub use station::{Station, StationRunner};
pub use types::{AudioFrame, BufferCommand, RecognitionEvent};
