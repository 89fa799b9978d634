//! Audio level metering.

use crate::audio::sample::AudioSample;

/// RMS level of `samples` as a percentage (0-100).
pub fn calculate_rms_level<Sample: AudioSample>(samples: &[Sample]) -> u32 {
    if samples.is_empty() {
        return 0;
    }
    let sum_sq: f64 = samples
        .iter()
        .map(|s| {
            let v = s.to_f32_normalized() as f64;
            v * v
        })
        .sum();
    let rms = (sum_sq / samples.len() as f64).sqrt();
    (rms * 100.0).min(100.0) as u32
}
