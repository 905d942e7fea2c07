//! Cascaded moving-average smoother.
//!
//! `N` passes of an `M`-point centered moving average approximate a
//! Gaussian smoother with cutoff `sample_rate / (M * pi * sqrt(N))`. Each
//! pass tracks a running sum in O(1) per sample and carries the trailing
//! `M-1` samples across chunk boundaries in a small ring buffer.

use tinyvec::ArrayVec;

/// Maximum number of cascaded passes.
pub const MAX_PASSES: usize = 8;
/// Maximum window length (forced odd, so the largest usable value is 255).
pub const MAX_WINDOW: usize = 255;

#[derive(Clone)]
struct Pass {
    /// Trailing `window - 1` samples carried from the previous chunk.
    tail: ArrayVec<[f32; MAX_WINDOW]>,
    running_sum: f32,
}

impl Default for Pass {
    fn default() -> Self {
        Pass {
            tail: ArrayVec::new(),
            running_sum: 0.0,
        }
    }
}

/// `n_passes` (1..=8) cascaded `window_size`-point moving averages.
#[derive(Clone, Default)]
pub struct MultipassAverage {
    passes: ArrayVec<[Pass; MAX_PASSES]>,
    window_size: usize,
}

impl MultipassAverage {
    /// `window_size` is clamped to `[3, MAX_WINDOW]` and forced odd (the
    /// caller, the envelope detector, additionally enforces a floor of 5
    /// per its own window-size-from-seconds computation).
    pub fn new(n_passes: usize, window_size: usize) -> Self {
        let n_passes = n_passes.clamp(1, MAX_PASSES);
        let mut window_size = window_size.clamp(3, MAX_WINDOW);
        if window_size % 2 == 0 {
            window_size += 1;
        }
        let window_size = window_size.min(MAX_WINDOW);

        let mut passes = ArrayVec::new();
        for _ in 0..n_passes {
            passes.push(Pass::default());
        }
        MultipassAverage { passes, window_size }
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Process `data` in place through every cascaded pass.
    pub fn process(&mut self, data: &mut [f32]) {
        let w = self.window_size;
        let inv_w = 1.0 / w as f32;
        let n = data.len();

        for pass in self.passes.iter_mut() {
            let mut sum = pass.running_sum;

            if pass.tail.is_empty() && n > 0 {
                sum = data[0] * (w - 1) as f32;
            }

            for i in 0..n {
                sum += data[i];

                let oldest_idx = i as isize - w as isize;
                if oldest_idx >= 0 {
                    // Deliberately reads the already-smoothed output at this
                    // index when it falls within the current chunk, matching
                    // the original in-place implementation exactly.
                    sum -= data[oldest_idx as usize];
                } else {
                    let buf_idx = pass.tail.len() as isize + oldest_idx;
                    if buf_idx >= 0 && (buf_idx as usize) < pass.tail.len() {
                        sum -= pass.tail[buf_idx as usize];
                    } else {
                        sum -= data[0];
                    }
                }

                data[i] = sum * inv_w;
            }

            let save_n = (w - 1).min(n).min(MAX_WINDOW);
            if n >= w - 1 {
                pass.tail.clear();
                for &v in &data[n - save_n..n] {
                    pass.tail.push(v);
                }
            } else {
                let keep = pass.tail.len().saturating_sub(n);
                if keep > 0 {
                    for j in 0..keep {
                        pass.tail[j] = pass.tail[pass.tail.len() - keep + j];
                    }
                }
                pass.tail.truncate(keep);
                for j in 0..n {
                    if pass.tail.len() < MAX_WINDOW {
                        pass.tail.push(data[j]);
                    }
                }
                if pass.tail.len() > save_n {
                    pass.tail.truncate(save_n);
                }
            }

            pass.running_sum = sum;
        }
    }

    /// Zero all transient state (running sums and carried tails).
    pub fn reset(&mut self) {
        for pass in self.passes.iter_mut() {
            pass.tail.clear();
            pass.running_sum = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dc_gain_is_unity() {
        let mut mp = MultipassAverage::new(3, 9);
        let mut data = [2.0f32; 2000];
        mp.process(&mut data);
        // After the transient dies out the output should settle at the
        // input level (DC gain of 1).
        for &v in &data[200..] {
            assert!((v - 2.0).abs() < 1e-4, "{v}");
        }
    }

    #[test]
    fn window_forced_odd_and_bounded() {
        let mp = MultipassAverage::new(3, 10);
        assert_eq!(mp.window_size() % 2, 1);
        let mp = MultipassAverage::new(3, 1000);
        assert!(mp.window_size() <= MAX_WINDOW);
    }

    #[test]
    fn short_chunk_then_long_chunk_does_not_panic() {
        let mut mp = MultipassAverage::new(2, 15);
        let mut short = [1.0f32; 3];
        mp.process(&mut short);
        let mut long = [1.0f32; 100];
        mp.process(&mut long);
    }

    #[test]
    fn chunking_independence_matches_reference_pass() {
        let input: Vec<f32> = (0..500).map(|i| ((i as f32) * 0.01).sin()).collect();

        let mut whole = MultipassAverage::new(2, 11);
        let mut out_whole = input.clone();
        whole.process(&mut out_whole);

        let mut chunked = MultipassAverage::new(2, 11);
        let mut out_chunked = input.clone();
        let mut pos = 0;
        for chunk_len in [7usize, 13, 1, 200, 279] {
            let end = (pos + chunk_len).min(out_chunked.len());
            chunked.process(&mut out_chunked[pos..end]);
            pos = end;
            if pos >= out_chunked.len() {
                break;
            }
        }

        assert_eq!(out_whole, out_chunked);
    }
}
