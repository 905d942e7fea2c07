//! Top-level pipeline: bandpass filter -> envelope detector -> timing FSM
//! -> pattern decoder -> output filter.
//!
//! No heap allocation happens inside [`CwDecoder::process`]: every stage's
//! state is bounded and preallocated in [`CwDecoder::new`].

use crate::config::CwConfig;
use crate::envelope::Envelope;
use crate::iir::IirFilter;
use crate::morse::{self, MAX_PATTERN};
use crate::output::OutputFilter;
use crate::timing::{Element, Timing};

/// Audio is processed in chunks of at most this many samples, bounding the
/// per-call scratch buffers regardless of the caller's chunk size.
const SUBCHUNK: usize = 4096;

/// Owns all per-stage state for one audio channel.
pub struct CwDecoder {
    cfg: CwConfig,
    bandpass: Option<IirFilter>,
    envelope: Envelope,
    timing: Timing,
    pattern: [char; MAX_PATTERN],
    pattern_len: usize,
    output: OutputFilter,
}

impl CwDecoder {
    pub fn new(cfg: &CwConfig) -> Self {
        let bandpass = if cfg.bandwidth > 0.0 {
            let mut low = cfg.center_freq - cfg.bandwidth / 2.0;
            let mut high = cfg.center_freq + cfg.bandwidth / 2.0;
            if low < 1.0 {
                low = 1.0;
            }
            let nyquist = cfg.sample_rate as f32 / 2.0;
            if high >= nyquist {
                high = nyquist - 1.0;
            }
            if low < high {
                Some(IirFilter::design_bandpass(2, low, high, cfg.sample_rate as f32))
            } else {
                None
            }
        } else {
            None
        };

        let envelope = Envelope::new(
            cfg.sample_rate,
            cfg.envelope_window_s,
            cfg.threshold_on,
            cfg.threshold_off,
            cfg.envelope_mode,
            cfg.multipass_passes,
        );

        let timing = Timing::new(
            cfg.timing_mode,
            cfg.sample_rate,
            cfg.initial_wpm,
            cfg.min_wpm,
            cfg.max_wpm,
            cfg.min_element_ratio,
            cfg.min_element_s,
        );

        let output = OutputFilter::new(cfg.min_word_length);

        CwDecoder {
            cfg: *cfg,
            bandpass,
            envelope,
            timing,
            pattern: ['\0'; MAX_PATTERN],
            pattern_len: 0,
            output,
        }
    }

    /// Feed an element into the pattern decoder; on a completed character or
    /// word boundary, resolve the pattern and append the decoded text
    /// (plus a trailing space on a word boundary) into `scratch`, returning
    /// the number of characters written.
    fn pattern_feed(&mut self, elem: Element, scratch: &mut [char; 4]) -> usize {
        if elem == Element::Dit || elem == Element::Dah {
            if self.pattern_len < MAX_PATTERN - 1 {
                self.pattern[self.pattern_len] = if elem == Element::Dit { '.' } else { '-' };
                self.pattern_len += 1;
            }
            return 0;
        }

        let mut written = 0;

        if elem == Element::CharSpace || elem == Element::WordSpace {
            if self.pattern_len > 0 {
                let n = morse::lookup_merged(&self.pattern[..self.pattern_len], &mut scratch[written..]);
                written += n;
                self.pattern_len = 0;
            }
            if elem == Element::WordSpace && written < scratch.len() {
                scratch[written] = ' ';
                written += 1;
            }
        }

        written
    }

    fn pattern_flush(&mut self, scratch: &mut [char; 4]) -> usize {
        if self.pattern_len == 0 {
            return 0;
        }
        let n = morse::lookup_merged(&self.pattern[..self.pattern_len], scratch);
        self.pattern_len = 0;
        n
    }

    /// Process an audio chunk, writing decoded ASCII text into `out`.
    /// Returns the number of bytes written (never more than `out.len()`).
    pub fn process(&mut self, audio: &[f32], out: &mut [u8]) -> usize {
        if audio.is_empty() || out.is_empty() {
            return 0;
        }

        let mut total_written = 0;
        let mut processed = 0;
        let n = audio.len();

        let mut work = [0.0f32; SUBCHUNK];
        let mut on_off = [false; SUBCHUNK];

        while processed < n && total_written < out.len() {
            let chunk = (n - processed).min(SUBCHUNK);
            work[..chunk].copy_from_slice(&audio[processed..processed + chunk]);

            if let Some(bp) = &mut self.bandpass {
                bp.process(&mut work[..chunk]);
            }

            self.envelope.process(&work[..chunk], &mut on_off[..chunk]);

            for i in 0..chunk {
                if total_written >= out.len() {
                    break;
                }
                let elem = self.timing.process_sample(on_off[i]);
                if elem != Element::None {
                    let mut pat_out = ['\0'; 4];
                    let pat_n = self.pattern_feed(elem, &mut pat_out);
                    if pat_n > 0 {
                        let filt_n = self.output.feed(&pat_out[..pat_n], &mut out[total_written..]);
                        total_written += filt_n;
                    }
                }
            }

            processed += chunk;
        }

        total_written
    }

    /// Flush pending element, pattern, and word-buffer state. Call once
    /// after the last [`process`](Self::process) call for a stream.
    pub fn finalize(&mut self, out: &mut [u8]) -> usize {
        let mut written = 0;

        let elem = self.timing.finalize();
        if elem != Element::None {
            let mut pat_out = ['\0'; 4];
            let pat_n = self.pattern_feed(elem, &mut pat_out);
            if pat_n > 0 {
                written += self.output.feed(&pat_out[..pat_n], &mut out[written..]);
            }
        }

        {
            let mut pat_out = ['\0'; 4];
            let pat_n = self.pattern_flush(&mut pat_out);
            if pat_n > 0 {
                written += self.output.feed(&pat_out[..pat_n], &mut out[written..]);
            }
        }

        written += self.output.flush(&mut out[written..]);
        written
    }

    pub fn get_wpm(&self) -> f32 {
        self.timing.wpm()
    }

    /// Reset all per-stage state, keeping the original configuration.
    pub fn reset(&mut self) {
        if let Some(bp) = &mut self.bandpass {
            bp.reset();
        }
        self.envelope.reset();
        self.timing.reset(self.cfg.initial_wpm);
        self.pattern_len = 0;
        self.output.reset();
    }
}

/// Sequential multi-channel batch entry point: decodes each channel
/// independently with its own fresh [`CwDecoder`]. Returns `false` if
/// `cfgs`, `audio`, and `out_bufs` don't all have the same length.
pub fn decode_multi(cfgs: &[CwConfig], audio: &[&[f32]], out_bufs: &mut [&mut [u8]]) -> bool {
    if cfgs.len() != audio.len() || cfgs.len() != out_bufs.len() {
        return false;
    }

    for ch in 0..cfgs.len() {
        let mut dec = CwDecoder::new(&cfgs[ch]);
        let wrote = dec.process(audio[ch], out_bufs[ch]);
        dec.finalize(&mut out_bufs[ch][wrote..]);
    }

    true
}
