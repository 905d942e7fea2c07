//! Butterworth IIR filter designer and second-order-section (SOS) cascade.
//!
//! Coefficients are computed via the analog Butterworth prototype, a
//! lowpass-to-bandpass transform when needed, and the bilinear transform,
//! never via a closed-form biquad formula. Processing runs each section in
//! Direct Form II Transposed, which is numerically stable for single
//! precision (see `tick`).

use num_complex::Complex64;
use tinyvec::ArrayVec;

/// Maximum number of cascaded second-order sections (order 10 lowpass, or
/// order-4-per-side bandpass, both fit within this bound).
pub const MAX_SECTIONS: usize = 8;

/// A single biquad second-order section in Direct Form II Transposed.
#[derive(Copy, Clone, Debug, Default)]
pub struct Section {
    /// Numerator coefficients b0, b1, b2.
    pub b: [f32; 3],
    /// Denominator coefficients a0 (always 1, not stored), a1, a2.
    pub a: [f32; 2],
    /// Transposed state pair.
    z: [f32; 2],
}

impl Section {
    #[inline]
    fn tick(&mut self, x: f32) -> f32 {
        let y = self.b[0] * x + self.z[0];
        self.z[0] = self.b[1] * x - self.a[0] * y + self.z[1];
        self.z[1] = self.b[2] * x - self.a[1] * y;
        y
    }

    fn reset(&mut self) {
        self.z = [0.0, 0.0];
    }

    /// Frequency response at `frequency / sample_rate` (cycles/sample).
    fn response(&self, omega: f64) -> Complex64 {
        let z1 = Complex64::from_polar(1.0, -std::f64::consts::TAU * omega);
        let z2 = z1 * z1;
        let num = Complex64::new(self.b[0] as f64, 0.0)
            + Complex64::new(self.b[1] as f64, 0.0) * z1
            + Complex64::new(self.b[2] as f64, 0.0) * z2;
        let den = Complex64::new(1.0, 0.0)
            + Complex64::new(self.a[0] as f64, 0.0) * z1
            + Complex64::new(self.a[1] as f64, 0.0) * z2;
        num / den
    }
}

/// Cascade of up to [`MAX_SECTIONS`] biquad sections. An empty cascade
/// (`n_sections() == 0`) is pass-through: `process` leaves its input
/// untouched. This is the only failure mode the designer has: invalid
/// `(order, edges)` degrade to pass-through rather than signaling an error.
#[derive(Clone, Default)]
pub struct IirFilter {
    sections: ArrayVec<[Section; MAX_SECTIONS]>,
}

impl IirFilter {
    /// An empty, pass-through cascade.
    pub fn pass_through() -> Self {
        IirFilter::default()
    }

    pub fn n_sections(&self) -> usize {
        self.sections.len()
    }

    /// Design a Butterworth lowpass filter of the given `order` (1..=10).
    pub fn design_lowpass(order: usize, cutoff_hz: f32, sample_rate: f32) -> Self {
        let mut filt = IirFilter::default();
        if order < 1 || order > 2 * MAX_SECTIONS {
            return filt;
        }

        let warped = prewarp(cutoff_hz, sample_rate);
        let poles = butter_analog_poles(order);

        let scaled: Vec<(f64, f64)> = poles.iter().map(|&(re, im)| (re * warped, im * warped)).collect();

        for k in 0..order / 2 {
            let (pz_re, pz_im) = bilinear(scaled[k].0, scaled[k].1, sample_rate as f64);
            let sec = sos_from_pole_pair(pz_re, pz_im, -1.0, 0.0, 1.0);
            if filt.sections.try_push(sec).is_some() {
                break;
            }
        }
        if order % 2 == 1 {
            let mid = order / 2;
            let (pz_re, _pz_im) = bilinear(scaled[mid].0, scaled[mid].1, sample_rate as f64);
            let sec = sos_from_real_pole(pz_re, -1.0, 1.0);
            filt.sections.try_push(sec);
        }

        normalize_lowpass_gain(&mut filt);
        filt
    }

    /// Design a Butterworth bandpass filter. `order` is the per-side
    /// prototype order (total order is `2 * order`); each prototype pole
    /// contributes two sections.
    pub fn design_bandpass(order: usize, low_hz: f32, high_hz: f32, sample_rate: f32) -> Self {
        let mut filt = IirFilter::default();
        if order < 1 {
            return filt;
        }

        let nyquist = sample_rate as f64 / 2.0;
        let mut wn_low = low_hz as f64 / nyquist;
        let mut wn_high = high_hz as f64 / nyquist;
        if wn_low <= 0.0 {
            wn_low = 0.001;
        }
        if wn_high >= 1.0 {
            wn_high = 0.999;
        }
        if wn_low >= wn_high {
            return filt;
        }

        let fs = sample_rate as f64;
        let w_low = 2.0 * fs * (std::f64::consts::PI * wn_low / 2.0).tan();
        let w_high = 2.0 * fs * (std::f64::consts::PI * wn_high / 2.0).tan();
        let bw = w_high - w_low;
        let w0 = (w_low * w_high).sqrt();

        let poles = butter_analog_poles(order);

        for &(p_re, p_im) in &poles {
            let half_re = p_re * bw / 2.0;
            let half_im = p_im * bw / 2.0;

            // (p*bw/2)^2 - w0^2
            let mut sq_re = half_re * half_re - half_im * half_im;
            let sq_im = 2.0 * half_re * half_im;
            sq_re -= w0 * w0;

            let mag = (sq_re * sq_re + sq_im * sq_im).sqrt();
            let phase = sq_im.atan2(sq_re);
            let sqrt_mag = mag.sqrt();
            let sqrt_re = sqrt_mag * (phase / 2.0).cos();
            let sqrt_im = sqrt_mag * (phase / 2.0).sin();

            let s1 = (half_re + sqrt_re, half_im + sqrt_im);
            let s2 = (half_re - sqrt_re, half_im - sqrt_im);

            for &(s_re, s_im) in &[s1, s2] {
                if filt.sections.len() >= MAX_SECTIONS {
                    break;
                }
                let (z_re, z_im) = bilinear(s_re, s_im, fs);
                // Bandpass zeros at z = +-1, i.e. numerator z^2 - 1.
                let sec = Section {
                    b: [1.0, 0.0, -1.0],
                    a: [(-2.0 * z_re) as f32, (z_re * z_re + z_im * z_im) as f32],
                    z: [0.0, 0.0],
                };
                filt.sections.push(sec);
            }
        }

        normalize_bandpass_gain(&mut filt, low_hz as f64, high_hz as f64, fs);
        filt
    }

    /// Process samples in-place through the cascade (Direct Form II
    /// Transposed), one section at a time across the whole buffer.
    pub fn process(&mut self, data: &mut [f32]) {
        for sec in self.sections.iter_mut() {
            for x in data.iter_mut() {
                *x = sec.tick(*x);
            }
        }
    }

    /// Zero every section's state, keeping coefficients.
    pub fn reset(&mut self) {
        for sec in self.sections.iter_mut() {
            sec.reset();
        }
    }

    /// Combined frequency response at `frequency_hz`, for testing gain
    /// normalization.
    pub fn response(&self, frequency_hz: f64, sample_rate: f64) -> Complex64 {
        let omega = frequency_hz / sample_rate;
        self.sections
            .iter()
            .fold(Complex64::new(1.0, 0.0), |acc, sec| acc * sec.response(omega))
    }
}

fn prewarp(cutoff_hz: f32, sample_rate: f32) -> f64 {
    let mut wn = cutoff_hz as f64 / (sample_rate as f64 / 2.0);
    if wn >= 1.0 {
        wn = 0.999;
    }
    if wn <= 0.0 {
        wn = 0.001;
    }
    2.0 * sample_rate as f64 * (std::f64::consts::PI * wn / 2.0).tan()
}

/// Analog Butterworth prototype poles on the unit circle's left half-plane.
fn butter_analog_poles(order: usize) -> Vec<(f64, f64)> {
    (0..order)
        .map(|k| {
            let angle = std::f64::consts::PI * (2 * k + order + 1) as f64 / (2 * order) as f64;
            (angle.cos(), angle.sin())
        })
        .collect()
}

/// s = 2*fs*(z-1)/(z+1)  =>  z = (1 + s/(2*fs)) / (1 - s/(2*fs))
fn bilinear(s_re: f64, s_im: f64, fs: f64) -> (f64, f64) {
    let t = 1.0 / (2.0 * fs);
    let num_re = 1.0 + s_re * t;
    let num_im = s_im * t;
    let den_re = 1.0 - s_re * t;
    let den_im = -s_im * t;
    let den_mag2 = den_re * den_re + den_im * den_im;
    (
        (num_re * den_re + num_im * den_im) / den_mag2,
        (num_im * den_re - num_re * den_im) / den_mag2,
    )
}

fn sos_from_pole_pair(pz_re: f64, pz_im: f64, zz_re: f64, zz_im: f64, gain: f64) -> Section {
    Section {
        b: [
            gain as f32,
            (gain * (-2.0 * zz_re)) as f32,
            (gain * (zz_re * zz_re + zz_im * zz_im)) as f32,
        ],
        a: [(-2.0 * pz_re) as f32, (pz_re * pz_re + pz_im * pz_im) as f32],
        z: [0.0, 0.0],
    }
}

fn sos_from_real_pole(pz: f64, zz: f64, gain: f64) -> Section {
    Section {
        b: [gain as f32, (gain * -zz) as f32, 0.0],
        a: [-pz as f32, 0.0],
        z: [0.0, 0.0],
    }
}

/// Normalize so |H(DC)| == 1, by scaling the first section's numerator.
fn normalize_lowpass_gain(filt: &mut IirFilter) {
    let mut total_gain = 1.0f64;
    for sec in filt.sections.iter() {
        let num_dc = sec.b[0] as f64 + sec.b[1] as f64 + sec.b[2] as f64;
        let den_dc = 1.0 + sec.a[0] as f64 + sec.a[1] as f64;
        if den_dc.abs() > 1e-12 {
            total_gain *= num_dc / den_dc;
        }
    }
    if total_gain.abs() > 1e-12 && !filt.sections.is_empty() {
        let correction = (1.0 / total_gain) as f32;
        let first = &mut filt.sections[0];
        first.b[0] *= correction;
        first.b[1] *= correction;
        first.b[2] *= correction;
    }
}

/// Normalize so |H(band center)| == 1, by scaling the first section's
/// numerator.
fn normalize_bandpass_gain(filt: &mut IirFilter, low_hz: f64, high_hz: f64, fs: f64) {
    let wc = 2.0 * std::f64::consts::PI * (low_hz + high_hz) / 2.0 / fs;
    let cos_wc = wc.cos();
    let sin_wc = wc.sin();
    let cos2 = cos_wc * cos_wc - sin_wc * sin_wc;
    let sin2 = 2.0 * sin_wc * cos_wc;

    let mut total = Complex64::new(1.0, 0.0);
    for sec in filt.sections.iter() {
        let b0 = sec.b[0] as f64;
        let b1 = sec.b[1] as f64;
        let b2 = sec.b[2] as f64;
        let a1 = sec.a[0] as f64;
        let a2 = sec.a[1] as f64;

        let nr = b0 + b1 * cos_wc + b2 * cos2;
        let ni = -b1 * sin_wc - b2 * sin2;
        let dr = 1.0 + a1 * cos_wc + a2 * cos2;
        let di = -a1 * sin_wc - a2 * sin2;

        let dm2 = dr * dr + di * di;
        if dm2 < 1e-20 {
            continue;
        }
        let h = Complex64::new(nr, ni) / Complex64::new(dr, di);
        total *= h;
    }

    let gain_mag = total.norm();
    if gain_mag > 1e-12 && !filt.sections.is_empty() {
        let correction = (1.0 / gain_mag) as f32;
        let first = &mut filt.sections[0];
        first.b[0] *= correction;
        first.b[1] *= correction;
        first.b[2] *= correction;
    }
}
