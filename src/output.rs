//! Output filter: word buffering and warm-up noise suppression.
//!
//! Startup noise tends to decode as short runs of the noise-prone
//! single/double-element characters (E, T, I, A, N, M, and the `?`
//! fallback). Words built entirely from those characters are suppressed
//! until the first word long enough, or containing some other character,
//! passes, after which suppression is permanently disabled.

use tinyvec::ArrayVec;

/// Maximum buffered word length, matching the bounded scratch buffer the
/// rest of the pipeline uses for pattern accumulation.
pub const MAX_WORD: usize = 64;

fn is_noise_char(ch: char) -> bool {
    matches!(ch, 'E' | 'T' | 'I' | 'A' | 'N' | 'M' | '?')
}

/// Warm-up word filter.
pub struct OutputFilter {
    word_buf: ArrayVec<[char; MAX_WORD]>,
    warmed_up: bool,
    min_word_length: usize,
}

impl OutputFilter {
    pub fn new(min_word_length: usize) -> Self {
        OutputFilter {
            word_buf: ArrayVec::new(),
            warmed_up: false,
            min_word_length,
        }
    }

    fn emit_word(&mut self, out: &mut [u8]) -> usize {
        if self.word_buf.is_empty() {
            return 0;
        }

        if self.warmed_up {
            return copy_word(&self.word_buf, out);
        }

        if self.word_buf.len() < self.min_word_length {
            let all_noise = self.word_buf.iter().all(|&c| is_noise_char(c));
            if all_noise {
                return 0;
            }
        }

        self.warmed_up = true;
        copy_word(&self.word_buf, out)
    }

    /// Feed decoded characters through the filter, writing output bytes
    /// (ASCII, including word-separating spaces) into `out`. Returns the
    /// number of bytes written; stops early if `out` fills.
    pub fn feed(&mut self, text: &[char], out: &mut [u8]) -> usize {
        let mut written = 0;

        for &ch in text {
            if written >= out.len() {
                break;
            }

            if ch == ' ' {
                let n = self.emit_word(&mut out[written..]);
                written += n;
                if n > 0 && written < out.len() {
                    out[written] = b' ';
                    written += 1;
                }
                self.word_buf.clear();
            } else if self.word_buf.len() < MAX_WORD - 1 {
                self.word_buf.push(ch);
            }
        }

        written
    }

    /// Flush any buffered partial word at end of stream.
    pub fn flush(&mut self, out: &mut [u8]) -> usize {
        let n = self.emit_word(out);
        self.word_buf.clear();
        n
    }

    pub fn reset(&mut self) {
        self.word_buf.clear();
        self.warmed_up = false;
    }
}

fn copy_word(word: &ArrayVec<[char; MAX_WORD]>, out: &mut [u8]) -> usize {
    let n = word.len().min(out.len());
    for (dst, &ch) in out[..n].iter_mut().zip(word.iter()) {
        *dst = ch as u8;
    }
    n
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_str(f: &mut OutputFilter, s: &str, out: &mut [u8]) -> usize {
        let chars: Vec<char> = s.chars().collect();
        f.feed(&chars, out)
    }

    #[test]
    fn short_noise_word_suppressed_until_warm() {
        let mut f = OutputFilter::new(2);
        let mut out = [0u8; 64];
        let n = feed_str(&mut f, "E ", &mut out);
        assert_eq!(n, 0);
    }

    #[test]
    fn first_valid_word_passes_and_latches_warm() {
        let mut f = OutputFilter::new(2);
        let mut out = [0u8; 64];
        let n = feed_str(&mut f, "E HELLO E ", &mut out);
        let text = std::str::from_utf8(&out[..n]).unwrap();
        assert!(text.contains("HELLO"));

        let mut out2 = [0u8; 16];
        let n2 = feed_str(&mut f, "E ", &mut out2);
        assert_eq!(&out2[..n2], b"E ");
    }

    #[test]
    fn non_noise_short_word_passes_immediately() {
        let mut f = OutputFilter::new(3);
        let mut out = [0u8; 16];
        let n = feed_str(&mut f, "OK ", &mut out);
        assert_eq!(&out[..n], b"OK ");
    }

    #[test]
    fn flush_emits_pending_partial_word() {
        let mut f = OutputFilter::new(2);
        let mut out = [0u8; 16];
        feed_str(&mut f, "HELLO", &mut out);
        let n = f.flush(&mut out);
        assert_eq!(&out[..n], b"HELLO");
    }

    #[test]
    fn reset_clears_warm_latch() {
        let mut f = OutputFilter::new(2);
        let mut out = [0u8; 64];
        feed_str(&mut f, "OK ", &mut out);
        f.reset();
        let n = feed_str(&mut f, "E ", &mut out);
        assert_eq!(n, 0);
    }
}
