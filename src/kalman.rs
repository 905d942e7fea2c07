//! 5-state log-domain Kalman filter for CW element timing.
//!
//! The state vector holds `[log dit, log dah, log elem_space, log char_space,
//! log word_space]`, all in log-samples. Working in log-space turns the
//! multiplicative timing ratios ITU-R M.1677 defines (dah = 3x dit, etc.)
//! into additive offsets, which is what makes the fixed ratio-bound clamps
//! in [`Kalman::apply_bounds`] simple interval checks.

use std::f32::consts::LN_2;

/// Number of tracked durations.
pub const STATES: usize = 5;

/// Index into the state vector / covariance matrix.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum State {
    Dit = 0,
    Dah = 1,
    ElemSpace = 2,
    CharSpace = 3,
    WordSpace = 4,
}

/// Log-domain Kalman filter tracking the five CW element durations jointly.
#[derive(Clone)]
pub struct Kalman {
    x: [f32; STATES],
    p: [[f32; STATES]; STATES],
    q: [f32; STATES],
    r: f32,
    innovation_gate: f32,
    sample_rate: u32,
    min_wpm: f32,
    max_wpm: f32,
}

impl Kalman {
    pub fn new(sample_rate: u32, initial_wpm: f32, min_wpm: f32, max_wpm: f32) -> Self {
        let mut k = Kalman {
            x: [0.0; STATES],
            p: [[0.0; STATES]; STATES],
            q: [0.01; STATES],
            r: 0.1,
            innovation_gate: LN_2,
            sample_rate,
            min_wpm,
            max_wpm,
        };
        k.reset(initial_wpm);
        k
    }

    /// Reset to the state implied by `initial_wpm`, per the PARIS standard
    /// (a dit is `1.2 / wpm` seconds).
    pub fn reset(&mut self, initial_wpm: f32) {
        let dit_s = 1.2 / initial_wpm;
        let dit_samples = dit_s * self.sample_rate as f32;

        self.x[State::Dit as usize] = dit_samples.ln();
        self.x[State::Dah as usize] = (dit_samples * 3.0).ln();
        self.x[State::ElemSpace as usize] = dit_samples.ln();
        self.x[State::CharSpace as usize] = (dit_samples * 3.0).ln();
        self.x[State::WordSpace as usize] = (dit_samples * 7.0).ln();

        self.p = [[0.0; STATES]; STATES];
        for i in 0..STATES {
            self.p[i][i] = 0.1;
        }
    }

    fn apply_bounds(&mut self) {
        let min_dit = (1.2 / self.max_wpm) * self.sample_rate as f32;
        let max_dit = (1.2 / self.min_wpm) * self.sample_rate as f32;
        let log_min = min_dit.ln();
        let log_max = max_dit.ln();

        let dit = &mut self.x[State::Dit as usize];
        *dit = dit.clamp(log_min, log_max);

        let ld = self.x[State::Dit as usize];

        let dah = &mut self.x[State::Dah as usize];
        *dah = dah.clamp(ld + 2.0f32.ln(), ld + 4.0f32.ln());

        let es = &mut self.x[State::ElemSpace as usize];
        *es = es.clamp(ld - LN_2, ld + LN_2);

        let cs = &mut self.x[State::CharSpace as usize];
        *cs = cs.clamp(ld + 2.0f32.ln(), ld + 4.0f32.ln());

        let ws = &mut self.x[State::WordSpace as usize];
        *ws = ws.clamp(ld + 5.0f32.ln(), ld + 9.0f32.ln());
    }

    /// Update a single state with a new duration measurement, in samples.
    /// Returns `false` if the measurement is invalid or rejected by the
    /// innovation gate (an outlier relative to the current estimate).
    pub fn update(&mut self, state: State, duration_samples: f32) -> bool {
        if duration_samples <= 0.0 {
            return false;
        }
        let idx = state as usize;

        let z = duration_samples.ln();
        let innovation = z - self.x[idx];
        if innovation.abs() > self.innovation_gate {
            return false;
        }

        let s = (self.p[idx][idx] + self.r).max(1e-10);

        let mut gain = [0.0f32; STATES];
        for i in 0..STATES {
            gain[i] = self.p[i][idx] / s;
        }

        for i in 0..STATES {
            self.x[i] += gain[i] * innovation;
        }

        // Joseph-form covariance update: numerically stable, keeps P
        // symmetric positive semi-definite even with an imprecise gain.
        let mut p_new = [[0.0f32; STATES]; STATES];
        for i in 0..STATES {
            for j in 0..STATES {
                let ikh_p = self.p[i][j] - gain[i] * self.p[idx][j];
                let mut v = ikh_p - self.p[i][idx] * gain[j] + gain[i] * self.p[idx][idx] * gain[j];
                v += gain[i] * self.r * gain[j];
                p_new[i][j] = v;
            }
        }
        for i in 0..STATES {
            for j in 0..STATES {
                self.p[i][j] = p_new[i][j];
            }
            self.p[i][i] += self.q[i];
        }

        self.apply_bounds();
        true
    }

    /// Current duration estimate for `state`, in samples.
    pub fn duration(&self, state: State) -> f32 {
        self.x[state as usize].exp()
    }

    /// Geometric-mean threshold between two adjacent states, used to
    /// classify a measured duration as belonging to the shorter or the
    /// longer of the pair.
    pub fn threshold(&self, a: State, b: State) -> f32 {
        ((self.x[a as usize] + self.x[b as usize]) / 2.0).exp()
    }

    /// Current speed estimate in words per minute, derived from the dit
    /// duration.
    pub fn wpm(&self) -> f32 {
        let dit_samples = self.x[State::Dit as usize].exp();
        let dit_s = dit_samples / self.sample_rate as f32;
        if dit_s <= 0.0 {
            return 20.0;
        }
        1.2 / dit_s
    }

    #[cfg(test)]
    fn covariance_is_symmetric(&self) -> bool {
        for i in 0..STATES {
            for j in 0..STATES {
                if (self.p[i][j] - self.p[j][i]).abs() > 1e-4 {
                    return false;
                }
            }
        }
        true
    }
}
