use crate::defaults;
use crate::error::{LarynxError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub stt: SttConfig,
    pub pipeline: PipelineConfig,
}

/// Audio capture configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    /// Input device name, or None to auto-select.
    pub device: Option<String>,
    /// Sample rate in Hz; must match the recognition engine's required rate.
    pub sample_rate: u32,
    /// Frame duration in milliseconds.
    pub frame_duration_ms: u32,
}

/// Speech-to-text configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SttConfig {
    /// Path to the recognition model directory.
    pub model_path: String,
}

/// Pipeline queue and shutdown configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Capture → recognizer queue capacity, in frames.
    pub audio_queue_frames: usize,
    /// Recognizer → reconciler queue capacity, in events.
    pub event_queue_len: usize,
    /// Maximum milliseconds Stop waits for workers to drain queued audio.
    pub drain_timeout_ms: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: defaults::SAMPLE_RATE,
            frame_duration_ms: defaults::FRAME_DURATION_MS,
        }
    }
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            model_path: String::new(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            audio_queue_frames: defaults::AUDIO_QUEUE_FRAMES,
            event_queue_len: defaults::EVENT_QUEUE_LEN,
            drain_timeout_ms: defaults::DRAIN_TIMEOUT_MS,
        }
    }
}

impl AudioConfig {
    /// Number of samples in one frame at this configuration.
    pub fn frame_len(&self) -> usize {
        (self.sample_rate as usize * self.frame_duration_ms as usize) / 1000
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file is missing or contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LarynxError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                LarynxError::Io(e)
            }
        })?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file, or return defaults if the file doesn't
    /// exist.
    ///
    /// Invalid TOML is still an error; only a missing file falls back to
    /// defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(LarynxError::ConfigFileNotFound { .. }) => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - LARYNX_MODEL → stt.model_path
    /// - LARYNX_AUDIO_DEVICE → audio.device
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(model) = std::env::var("LARYNX_MODEL") {
            if !model.is_empty() {
                self.stt.model_path = model;
            }
        }

        if let Ok(device) = std::env::var("LARYNX_AUDIO_DEVICE") {
            if !device.is_empty() {
                self.audio.device = Some(device);
            }
        }

        self
    }

    /// Validate configuration values.
    ///
    /// Checks the ranges the pipeline depends on; serde defaults guarantee
    /// presence, not sanity.
    pub fn validate(&self) -> Result<()> {
        if self.audio.sample_rate == 0 {
            return Err(LarynxError::ConfigInvalidValue {
                key: "audio.sample_rate".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if !(20..=1000).contains(&self.audio.frame_duration_ms) {
            return Err(LarynxError::ConfigInvalidValue {
                key: "audio.frame_duration_ms".to_string(),
                message: "must be between 20 and 1000".to_string(),
            });
        }
        // A zero-sample frame would make the capture loop spin forever.
        if self.audio.frame_len() == 0 {
            return Err(LarynxError::ConfigInvalidValue {
                key: "audio.sample_rate".to_string(),
                message: "too low for frame_duration_ms: frames would hold no samples".to_string(),
            });
        }
        if self.pipeline.audio_queue_frames == 0 {
            return Err(LarynxError::ConfigInvalidValue {
                key: "pipeline.audio_queue_frames".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.pipeline.event_queue_len == 0 {
            return Err(LarynxError::ConfigInvalidValue {
                key: "pipeline.event_queue_len".to_string(),
                message: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}
