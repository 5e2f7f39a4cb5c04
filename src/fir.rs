//! Module: fir
//!
//! Purpose: Fixed-coefficient FIR bandpass applied to each chunk before it is
//! sent.
//!
//! Architecture:
//! - History is a doubled buffer (`2 * taps`): every sample is written at
//!   `pos` and `pos + taps`, so the last `taps` inputs are always one
//!   contiguous slice and the inner loop has no modulo
//! - History carries across chunks; it is only zeroed at construction
//! - Output is clamped to `i16` and written back over the input chunk
//!
//! Safety: Safe. No allocation after `new`.

use crate::sample::{clamp_to_sample, Sample};

/// Number of taps in [`BANDPASS_1KHZ`].
pub const BANDPASS_TAPS: usize = 63;

/// Bandpass centred at 1 kHz for Fs = 8 kHz (odd length, symmetric).
pub static BANDPASS_1KHZ: [f32; BANDPASS_TAPS] = [
    -0.0448093, 0.0322875, 0.0181163, 0.0087615, 0.0056797,
    0.0086685, 0.0148049, 0.0187190, 0.0151019, 0.0027594,
    -0.0132676, -0.0232561, -0.0187804, 0.0006382, 0.0250536,
    0.0387214, 0.0299817, 0.0002609, -0.0345546, -0.0525282,
    -0.0395620, 0.0000246, 0.0440998, 0.0651867, 0.0479110,
    0.0000135, -0.0508558, -0.0736313, -0.0529380, -0.0000709,
    0.0540186, 0.0766746, 0.0540186, -0.0000709, -0.0529380,
    -0.0736313, -0.0508558, 0.0000135, 0.0479110, 0.0651867,
    0.0440998, 0.0000246, -0.0395620, -0.0525282, -0.0345546,
    0.0002609, 0.0299817, 0.0387214, 0.0250536, 0.0006382,
    -0.0187804, -0.0232561, -0.0132676, 0.0027594, 0.0151019,
    0.0187190, 0.0148049, 0.0086685, 0.0056797, 0.0087615,
    0.0181163, 0.0322875, -0.0448093,
];

/// Streaming FIR filter with history carried between chunks.
pub struct FirFilter {
    coeffs: &'static [f32],
    /// Doubled history; after `push`, the newest input sits at `pos + taps - 1`.
    history: Box<[f32]>,
    pos: usize,
}

impl FirFilter {
    /// Create a filter with zeroed history.
    pub fn new(coeffs: &'static [f32]) -> Self {
        Self {
            coeffs,
            history: vec![0.0; coeffs.len() * 2].into_boxed_slice(),
            pos: 0,
        }
    }

    /// The 1 kHz bandpass used on the streaming path.
    pub fn bandpass() -> Self {
        Self::new(&BANDPASS_1KHZ)
    }

    /// Number of taps.
    #[inline]
    pub fn taps(&self) -> usize {
        self.coeffs.len()
    }

    /// Filter `chunk` in place.
    ///
    /// Output `n` is the inner product of the coefficients with the most
    /// recent `taps` raw inputs ending at input `n`, clamped to `i16`.
    ///
    /// # Timing
    ///
    /// O(len * taps), no allocation.
    pub fn filter_in_place(&mut self, chunk: &mut [Sample]) {
        for sample in chunk.iter_mut() {
            self.push(f32::from(*sample));
            *sample = clamp_to_sample(self.output());
        }
    }

    #[inline]
    fn push(&mut self, x: f32) {
        let taps = self.coeffs.len();
        if taps == 0 {
            return;
        }
        self.history[self.pos] = x;
        self.history[self.pos + taps] = x;
        self.pos += 1;
        if self.pos == taps {
            self.pos = 0;
        }
    }

    /// Window `history[pos..pos + taps]` holds inputs oldest-first.
    #[inline]
    fn output(&self) -> f32 {
        let taps = self.coeffs.len();
        let window = &self.history[self.pos..self.pos + taps];
        // coeffs[0] pairs with the newest input.
        self.coeffs
            .iter()
            .zip(window.iter().rev())
            .map(|(c, x)| c * x)
            .sum()
    }
}
