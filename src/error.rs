//! Error types for larynx.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LarynxError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Audio capture errors
    #[error("Audio input device unavailable: {device}")]
    DeviceUnavailable { device: String },

    #[error("Audio format mismatch: expected {expected}, got {actual}")]
    AudioFormatMismatch { expected: String, actual: String },

    #[error("Audio capture failed: {message}")]
    AudioCapture { message: String },

    // Recognition errors
    #[error("Recognition model not found at {path}")]
    ModelNotFound { path: String },

    #[error("Recognition engine error: {message}")]
    Engine { message: String },

    // Lifecycle errors
    #[error("Operation not valid while pipeline is {state}")]
    Busy { state: String },

    #[error("Text buffer is busy: clear is only valid while idle")]
    BufferBusy,

    #[error("Shutdown drain timed out after {timeout_ms}ms; remaining queued audio discarded")]
    DrainTimeout { timeout_ms: u64 },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, LarynxError>;
