//! Offline mono downmix and sample-rate conversion

/// Average interleaved channels into one
pub fn downmix_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }

    let channels = channels as usize;
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Number of output frames when rendering `frames` at `from_rate` into `to_rate`.
///
/// Truncates: a partial trailing output frame is dropped.
pub fn output_len(frames: usize, from_rate: u32, to_rate: u32) -> usize {
    if from_rate == 0 {
        return 0;
    }
    (frames as u64 * to_rate as u64 / from_rate as u64) as usize
}

/// Render a whole mono clip at a new sample rate using linear interpolation
pub fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if samples.is_empty() || from_rate == 0 || to_rate == 0 {
        return Vec::new();
    }
    if from_rate == to_rate {
        return samples.to_vec();
    }

    let out_len = output_len(samples.len(), from_rate, to_rate);
    let step = from_rate as f64 / to_rate as f64;
    let last = samples.len() - 1;

    (0..out_len)
        .map(|i| {
            let position = i as f64 * step;
            let index = (position.floor() as usize).min(last);
            let next = (index + 1).min(last);
            let frac = (position - index as f64) as f32;
            samples[index] + (samples[next] - samples[index]) * frac
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stereo_downmix_averages() {
        let mono = downmix_to_mono(&[1.0, 0.0, -0.5, -0.5, 0.25, 0.75], 2);
        assert_eq!(mono, vec![0.5, -0.5, 0.5]);
    }

    #[test]
    fn downsample_48k_to_16k_keeps_duration() {
        let one_second: Vec<f32> = (0..48000).map(|i| (i as f32 / 48000.0).sin()).collect();
        let out = resample_linear(&one_second, 48000, 16000);
        assert_eq!(out.len(), 16000);
        assert!((out[100] - one_second[300]).abs() < 1e-6);
    }

    #[test]
    fn upsample_interpolates_between_samples() {
        let out = resample_linear(&[0.0, 1.0], 8000, 16000);
        assert_eq!(out, vec![0.0, 0.5, 1.0, 1.0]);
    }

    #[test]
    fn output_length_truncates_partial_frames() {
        // 0.5 s at 44.1 kHz plus one frame is 8000.36 frames at 16 kHz
        assert_eq!(output_len(22051, 44100, 16000), 8000);
        // 2 frames at 48 kHz is two thirds of a 16 kHz frame
        assert_eq!(output_len(2, 48000, 16000), 0);
        assert_eq!(output_len(44099, 44100, 16000), 15999);
        assert_eq!(resample_linear(&vec![0.0; 44099], 44100, 16000).len(), 15999);
    }

    #[test]
    fn same_rate_is_identity() {
        let input = vec![0.1, -0.2, 0.3];
        assert_eq!(resample_linear(&input, 16000, 16000), input);
        assert!(resample_linear(&[], 44100, 16000).is_empty());
    }
}
