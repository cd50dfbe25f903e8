/// Number of buckets in the waveform summary drawn under the timeline.
pub const ENVELOPE_BUCKETS: usize = 256;

/// Summarises mono samples into `buckets` mean absolute amplitudes,
/// normalised so the loudest bucket is 1. Silent input stays all zero.
pub fn amplitude_envelope(samples: &[f32], buckets: usize) -> Vec<f32> {
    if buckets == 0 {
        return Vec::new();
    }

    let block_size = (samples.len() / buckets).max(1);
    let mut envelope: Vec<f32> = (0..buckets)
        .map(|bucket| {
            let start = bucket * block_size;
            let end = (start + block_size).min(samples.len());
            if start >= end {
                0.0
            } else {
                mean_abs(&samples[start..end])
            }
        })
        .collect();

    let peak = envelope.iter().copied().fold(0.0_f32, f32::max);
    if peak > 0.0 {
        for value in &mut envelope {
            *value /= peak;
        }
    }
    envelope
}

fn mean_abs(samples: &[f32]) -> f32 {
    let sum: f32 = samples.iter().map(|sample| sample.abs()).sum();
    sum / samples.len() as f32
}
