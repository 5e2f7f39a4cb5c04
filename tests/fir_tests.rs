//! Band-pass filter tests

use rust_live_caption::audio::ToneSource;
use rust_live_caption::fir::{FirFilter, BANDPASS_1KHZ, BANDPASS_TAPS};
use rust_live_caption::sample::Sample;

fn rms(samples: &[Sample]) -> f64 {
    let sum: f64 = samples.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
    (sum / samples.len() as f64).sqrt()
}

/// Centred tone, filtered in chunks, measured after the filter settles.
fn filtered_rms(freq_hz: u32) -> f64 {
    let mut tone = ToneSource::new(freq_hz, 8000);
    let mut fir = FirFilter::bandpass();
    let mut output = Vec::new();
    for _ in 0..8 {
        let mut chunk: Vec<Sample> = (0..256).map(|_| tone.next_sample() - 2048).collect();
        fir.filter_in_place(&mut chunk);
        output.extend_from_slice(&chunk);
    }
    rms(&output[BANDPASS_TAPS * 2..])
}

#[test]
fn test_bandpass_shape() {
    assert_eq!(BANDPASS_1KHZ.len(), BANDPASS_TAPS);
    assert_eq!(FirFilter::bandpass().taps(), BANDPASS_TAPS);
}

#[test]
fn test_passband_beats_dc() {
    let mut fir = FirFilter::bandpass();
    let mut dc = vec![1000 as Sample; 1024];
    fir.filter_in_place(&mut dc);
    let dc_out = rms(&dc[BANDPASS_TAPS..]);

    assert!(filtered_rms(1000) > dc_out);
}

#[test]
fn test_chunking_does_not_change_output() {
    let input: Vec<Sample> = (0..512).map(|i| ((i * 37) % 2000 - 1000) as Sample).collect();

    let mut whole = input.clone();
    FirFilter::bandpass().filter_in_place(&mut whole);

    let mut fir = FirFilter::bandpass();
    let mut pieces = input.clone();
    for chunk in pieces.chunks_mut(100) {
        fir.filter_in_place(chunk);
    }

    assert_eq!(whole, pieces);
}

#[test]
fn test_1khz_passes_3khz_rejected() {
    let pass = filtered_rms(1000);
    let stop = filtered_rms(3000);
    assert!(pass > 5.0 * stop, "pass {} stop {}", pass, stop);
}
