//! Sampled waveforms of the bells.

use std::f64::consts::PI;

use log::trace;
use once_cell::sync::OnceCell;

use crate::note::Pitch;

/// Maximum amplitude of a signed 8-bit sample.
pub const MAX_VOLUME: f64 = 127.0;

/// One measure of a plain sine for every pitch of the bell set, computed on first use.
///
/// Every buffer has the same length, so any note of at most one measure
/// is a prefix of its pitch's buffer. The rest is all zeros.
pub struct WaveTable {
    sample_rate: u32,
    len: usize,
    waves: Vec<OnceCell<Box<[i8]>>>,
}

impl WaveTable {
    /// Create a table of buffers holding `measure_length_ms` of audio at `sample_rate`.
    pub fn new(sample_rate: u32, measure_length_ms: u32) -> Self {
        let len = samples_for_ms(sample_rate, measure_length_ms);
        Self {
            sample_rate,
            len,
            waves: (0..Pitch::COUNT).map(|_| OnceCell::new()).collect(),
        }
    }

    /// Number of samples in every buffer.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The waveform of a pitch.
    pub fn get(&self, pitch: Pitch) -> &[i8] {
        self.waves[pitch.index()].get_or_init(|| self.render(pitch))
    }

    fn render(&self, pitch: Pitch) -> Box<[i8]> {
        trace!("rendering {} samples for {}", self.len, pitch);
        match pitch.frequency() {
            None => vec![0; self.len].into_boxed_slice(),
            Some(freq) => {
                let step = freq * 2.0 * PI / f64::from(self.sample_rate);
                (0..self.len)
                    .map(|i| ((i as f64 * step).sin() * MAX_VOLUME) as i8)
                    .collect()
            }
        }
    }
}

/// Number of samples that play for `ms` milliseconds.
pub fn samples_for_ms(sample_rate: u32, ms: u32) -> usize {
    (u64::from(sample_rate) * u64::from(ms) / 1000) as usize
}
