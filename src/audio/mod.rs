//! Host-side audio sources.
//!
//! Architecture:
//! - Tone generator: LUT + phase accumulator, centred on the ADC mid-scale
//! - Used by the host simulation in place of the microphone ADC

pub mod tone;

pub use tone::{ToneSource, LUT_SIZE, SINE_LUT};
