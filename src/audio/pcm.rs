// Wire encoding for recorder buffers
//
// The recognizer expects 16 kHz mono little-endian i16 PCM in binary frames.
// Recorders may run at any rate, so new buffers are concatenated and
// downsampled before encoding.

/// Sample rate of the PCM sent to the recognizer
pub const TARGET_SAMPLE_RATE: u32 = 16000;

/// Concatenate buffers, downsample to 16 kHz and encode as little-endian bytes
pub fn encode_pcm(buffers: &[Vec<i16>], sample_rate: u32) -> Vec<u8> {
    let joined: Vec<i16> = buffers.iter().flatten().copied().collect();

    downsample(&joined, sample_rate, TARGET_SAMPLE_RATE)
        .iter()
        .flat_map(|s| s.to_le_bytes())
        .collect()
}

/// Downsample mono samples
///
/// Integer ratios decimate (take every Nth sample); other ratios pick the
/// nearest preceding source sample. Upsampling is not supported and the
/// input is returned unchanged.
pub fn downsample(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate <= to_rate || to_rate == 0 {
        return samples.to_vec();
    }

    if from_rate % to_rate == 0 {
        let ratio = (from_rate / to_rate) as usize;
        return samples.iter().step_by(ratio).copied().collect();
    }

    let out_len = (samples.len() as u64 * to_rate as u64 / from_rate as u64) as usize;
    (0..out_len)
        .map(|i| {
            let idx = (i as u64 * from_rate as u64 / to_rate as u64) as usize;
            samples[idx.min(samples.len() - 1)]
        })
        .collect()
}

/// Normalised RMS level of a buffer (0.0 to 1.0)
pub fn power_level(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    let rms = (sum / samples.len() as f64).sqrt();
    (rms / i16::MAX as f64).min(1.0) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passthrough_at_target_rate() {
        let samples = vec![1, -2, 3];
        assert_eq!(downsample(&samples, 16000, 16000), samples);
    }

    #[test]
    fn test_integer_ratio_decimates() {
        let samples: Vec<i16> = (0..9).collect();
        assert_eq!(downsample(&samples, 48000, 16000), vec![0, 3, 6]);
    }

    #[test]
    fn test_fractional_ratio_picks_nearest() {
        // 44.1kHz -> 16kHz keeps roughly 36% of the samples
        let samples: Vec<i16> = (0..441).collect();
        let out = downsample(&samples, 44100, 16000);

        assert_eq!(out.len(), 160);
        assert_eq!(out[0], 0);
        assert_eq!(out[1], 2); // 1 * 44100 / 16000 = 2.75 -> 2
        assert!(out.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_upsampling_is_passthrough() {
        let samples = vec![5, 6];
        assert_eq!(downsample(&samples, 8000, 16000), samples);
    }

    #[test]
    fn test_encode_concatenates_little_endian() {
        let buffers = vec![vec![1i16, 256], vec![-1]];
        let bytes = encode_pcm(&buffers, 16000);

        assert_eq!(bytes, vec![0x01, 0x00, 0x00, 0x01, 0xff, 0xff]);
    }

    #[test]
    fn test_encode_downsamples_before_encoding() {
        let buffers = vec![vec![7i16, 0, 0, 9, 0, 0]];
        let bytes = encode_pcm(&buffers, 48000);

        assert_eq!(bytes, vec![7, 0, 9, 0]);
    }

    #[test]
    fn test_power_level_bounds() {
        assert_eq!(power_level(&[]), 0.0);
        assert_eq!(power_level(&[0, 0, 0]), 0.0);

        let loud = power_level(&[i16::MAX, i16::MAX]);
        assert!((loud - 1.0).abs() < 1e-6);
    }
}
