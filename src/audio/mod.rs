//! Audio capture: source abstraction and CPAL-backed implementation.

pub mod source;

#[cfg(feature = "cpal-audio")]
pub mod capture;

pub use source::{AudioSource, MockAudioSource};

#[cfg(feature = "cpal-audio")]
pub use capture::{CpalAudioSource, list_devices};
