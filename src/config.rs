//! Decoder configuration.
//!
//! A `CwConfig` is a plain value object supplied by the caller and never
//! mutated by the core. It is the entire input surface of the crate: there
//! are no config files, environment variables, or persisted state.

/// Timing classifier selection.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TimingMode {
    /// Exponential moving average on the dit duration (simple).
    Ema,
    /// 5-state Kalman filter in log-space (default, see [`crate::kalman`]).
    Kalman,
}

impl Default for TimingMode {
    fn default() -> Self {
        TimingMode::Kalman
    }
}

/// Envelope smoothing filter selection.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EnvelopeMode {
    /// Second-order Butterworth lowpass.
    Iir,
    /// Cascaded moving-average (default, approximates a Gaussian smoother).
    Multipass,
}

impl Default for EnvelopeMode {
    fn default() -> Self {
        EnvelopeMode::Multipass
    }
}

/// Decoder configuration. Construct with [`CwConfig::default`] and override
/// only the fields that need to differ; every field has a documented
/// default equivalent to the original `cw_config_init()`.
#[derive(Copy, Clone, Debug)]
pub struct CwConfig {
    /// Audio sample rate in Hz.
    pub sample_rate: u32,
    /// CW tone center frequency in Hz.
    pub center_freq: f32,
    /// Bandpass filter width in Hz. Zero disables the bandpass stage.
    pub bandwidth: f32,

    /// Hysteresis "on" threshold, as a fraction of the tracked peak.
    pub threshold_on: f32,
    /// Hysteresis "off" threshold, as a fraction of the tracked peak.
    /// Must be strictly less than `threshold_on`.
    pub threshold_off: f32,

    /// Timing classifier.
    pub timing_mode: TimingMode,
    /// Envelope smoother.
    pub envelope_mode: EnvelopeMode,

    /// Initial speed estimate in words per minute.
    pub initial_wpm: f32,
    /// Minimum speed bound in words per minute.
    pub min_wpm: f32,
    /// Maximum speed bound in words per minute.
    pub max_wpm: f32,

    /// Envelope smoothing window, in seconds.
    pub envelope_window_s: f32,
    /// Noise floor as a fraction of the current dit estimate.
    pub min_element_ratio: f32,
    /// Absolute noise floor, in seconds.
    pub min_element_s: f32,

    /// Enable the duration HMM. Plumbed through for API compatibility with
    /// the original decoder but not read anywhere in this core, since
    /// HMM-based re-decoding is not implemented here.
    pub use_hmm: bool,
    /// Output filter: minimum word length before warm-up is considered safe.
    pub min_word_length: usize,

    /// Number of cascaded moving-average passes (1-8).
    pub multipass_passes: usize,
}

impl Default for CwConfig {
    fn default() -> Self {
        CwConfig {
            sample_rate: 48_000,
            center_freq: 700.0,
            bandwidth: 100.0,
            threshold_on: 0.5,
            threshold_off: 0.4,
            timing_mode: TimingMode::Kalman,
            envelope_mode: EnvelopeMode::Multipass,
            initial_wpm: 20.0,
            min_wpm: 5.0,
            max_wpm: 60.0,
            envelope_window_s: 0.005,
            min_element_ratio: 0.3,
            min_element_s: 0.010,
            use_hmm: false,
            min_word_length: 2,
            multipass_passes: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = CwConfig::default();
        assert_eq!(cfg.sample_rate, 48_000);
        assert_eq!(cfg.center_freq, 700.0);
        assert_eq!(cfg.bandwidth, 100.0);
        assert!(cfg.threshold_off < cfg.threshold_on);
        assert_eq!(cfg.timing_mode, TimingMode::Kalman);
        assert_eq!(cfg.envelope_mode, EnvelopeMode::Multipass);
        assert_eq!(cfg.multipass_passes, 3);
    }
}
