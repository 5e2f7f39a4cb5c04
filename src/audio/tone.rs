//! Test-tone source shaped like a microphone ADC reading.
//!
//! A sine from a quarter-wave table, driven by a 32-bit phase accumulator,
//! offset to the middle of the 12-bit ADC range.

use crate::sample::Sample;
use crate::timer::SampleSource;

/// Entries per full cycle.
pub const LUT_SIZE: usize = 256;

const QUARTER: usize = LUT_SIZE / 4;

/// One full cycle scaled to ±2047 (12-bit half range).
///
/// Index 0 = 0°, 64 = 90°, 128 = 180°, 192 = 270°.
pub static SINE_LUT: [i16; LUT_SIZE] = {
    let mut table = [0i16; LUT_SIZE];
    let mut i = 0;
    while i <= QUARTER {
        let angle = (i as f64) * core::f64::consts::FRAC_PI_2 / (QUARTER as f64);
        let v = (quarter_sin(angle) * 2047.0 + 0.5) as i16;
        table[i] = v;
        if i < QUARTER {
            table[2 * QUARTER - i] = v;
        }
        if i > 0 {
            table[2 * QUARTER + i] = -v;
            table[LUT_SIZE - i] = -v;
        }
        i += 1;
    }
    table
};

/// Taylor sine, accurate on `[0, π/2]`.
const fn quarter_sin(x: f64) -> f64 {
    let x2 = x * x;
    let x3 = x2 * x;
    let x5 = x3 * x2;
    let x7 = x5 * x2;
    let x9 = x7 * x2;
    x - x3 / 6.0 + x5 / 120.0 - x7 / 5040.0 + x9 / 362880.0
}

/// ADC mid-scale for a 12-bit converter.
pub const ADC_MIDSCALE: Sample = 2048;

/// Sine generator standing in for the microphone.
pub struct ToneSource {
    phase: u32,
    phase_inc: u32,
}

impl ToneSource {
    /// `freq_hz` tone at `sample_rate` Hz, full 12-bit swing.
    pub fn new(freq_hz: u32, sample_rate: u32) -> Self {
        Self {
            phase: 0,
            phase_inc: Self::calc_phase_inc(freq_hz, sample_rate),
        }
    }

    /// phase_inc = freq * 2^32 / sample_rate
    #[inline]
    fn calc_phase_inc(freq_hz: u32, sample_rate: u32) -> u32 {
        ((u64::from(freq_hz) << 32) / u64::from(sample_rate.max(1))) as u32
    }

    #[inline]
    pub fn next_sample(&mut self) -> Sample {
        let idx = (self.phase >> 24) as usize;
        self.phase = self.phase.wrapping_add(self.phase_inc);
        ADC_MIDSCALE + SINE_LUT[idx]
    }
}

impl SampleSource for ToneSource {
    fn read(&mut self) -> Sample {
        self.next_sample()
    }
}
