//! Streaming CW (Morse code) telegraphy decoder for real-time audio.
//!
//! Audio comes in as `f32` samples in `[-1, 1]` and is pushed through a
//! fixed pipeline: an optional Butterworth bandpass tuned to the tone
//! frequency, an envelope detector that turns the filtered signal into a
//! hysteretic on/off trace, a timing classifier that turns on/off run
//! lengths into dits, dahs, and spacing, a Morse pattern decoder, and an
//! output filter that suppresses noisy startup text. See [`CwDecoder`].

pub mod config;
pub mod decoder;
pub mod envelope;
pub mod iir;
pub mod kalman;
pub mod morse;
pub mod multipass;
pub mod output;
pub mod timing;

pub use config::{CwConfig, EnvelopeMode, TimingMode};
pub use decoder::{decode_multi, CwDecoder};
