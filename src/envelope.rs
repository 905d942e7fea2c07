//! Envelope detector: rectify, smooth, track peak, and threshold
//! hysteretically into a binary on/off trace.

use crate::config::EnvelopeMode;
use crate::iir::IirFilter;
use crate::multipass::MultipassAverage;

/// Audio is processed in sub-chunks of at most this many samples, bounding
/// the scratch buffer regardless of the caller's chunk size.
pub const SUBCHUNK: usize = 4096;

enum Smoother {
    Iir(IirFilter),
    Multipass(MultipassAverage),
}

/// Peak-tracking hysteretic envelope follower.
pub struct Envelope {
    smoother: Smoother,
    threshold_on: f32,
    threshold_off: f32,
    peak_level: f32,
    prev_state: bool,
}

impl Envelope {
    /// `window_s` is the smoothing window in seconds; `mp_passes` is the
    /// number of multipass-mode cascade passes (ignored in IIR mode).
    pub fn new(
        sample_rate: u32,
        window_s: f32,
        threshold_on: f32,
        threshold_off: f32,
        mode: EnvelopeMode,
        mp_passes: usize,
    ) -> Self {
        let smoother = match mode {
            EnvelopeMode::Multipass => {
                // cutoff = 1 / (2 * window_s)
                // window = sample_rate / (cutoff * pi * sqrt(n_passes))
                let cutoff = 1.0 / (2.0 * window_s);
                let window_f = sample_rate as f32
                    / (cutoff * std::f32::consts::PI * (mp_passes as f32).sqrt());
                let mut window = window_f as usize;
                if window < 5 {
                    window = 5;
                }
                if window % 2 == 0 {
                    window += 1;
                }
                Smoother::Multipass(MultipassAverage::new(mp_passes, window))
            }
            EnvelopeMode::Iir => {
                let cutoff_hz = 1.0 / (2.0 * window_s);
                Smoother::Iir(IirFilter::design_lowpass(2, cutoff_hz, sample_rate as f32))
            }
        };

        Envelope {
            smoother,
            threshold_on,
            threshold_off,
            peak_level: 0.0,
            prev_state: false,
        }
    }

    /// Process `audio` and write one on/off decision per sample into
    /// `on_off` (same length as `audio`).
    pub fn process(&mut self, audio: &[f32], on_off: &mut [bool]) {
        debug_assert_eq!(audio.len(), on_off.len());

        let mut scratch = [0.0f32; SUBCHUNK];
        let mut processed = 0;
        let n = audio.len();

        while processed < n {
            let chunk = (n - processed).min(SUBCHUNK);
            let tmp = &mut scratch[..chunk];

            for (t, &x) in tmp.iter_mut().zip(&audio[processed..processed + chunk]) {
                *t = x.abs();
            }

            match &mut self.smoother {
                Smoother::Multipass(mp) => mp.process(tmp),
                Smoother::Iir(f) => f.process(tmp),
            }

            let chunk_peak = tmp.iter().cloned().fold(0.0f32, f32::max);
            if chunk_peak > self.peak_level {
                self.peak_level = chunk_peak;
            } else {
                self.peak_level = 0.995 * self.peak_level + 0.005 * chunk_peak;
            }

            let on_thr = (self.peak_level * self.threshold_on).max(1e-10);
            let off_thr = (self.peak_level * self.threshold_off).max(1e-10);

            let mut state = self.prev_state;
            for (i, &x) in tmp.iter().enumerate() {
                state = if state { x >= off_thr } else { x >= on_thr };
                on_off[processed + i] = state;
            }
            self.prev_state = state;

            processed += chunk;
        }
    }

    /// Current peak-tracking level (always >= 0).
    pub fn peak_level(&self) -> f32 {
        self.peak_level
    }

    pub fn reset(&mut self) {
        self.peak_level = 0.0;
        self.prev_state = false;
        match &mut self.smoother {
            Smoother::Multipass(mp) => mp.reset(),
            Smoother::Iir(f) => f.reset(),
        }
    }
}
