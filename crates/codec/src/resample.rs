//! The two resampling strategies spec §4.2 calls for explicitly: linear
//! interpolation for narrowband G.711 (8 kHz -> target), and 3:1 block
//! averaging for Opus (48 kHz -> 16 kHz). Neither reaches for a general DSP
//! resampler crate -- the spec pins down the exact algorithm, so we
//! implement it directly, the way the teacher's own G.722/G.711 modules
//! hand-roll their sample-domain math rather than delegating it.

/// Linear-interpolation resample from `from_hz` to `to_hz`. Used for
/// µ-law/A-law's 8 kHz -> 16 kHz (or whatever target is configured) upsample.
pub fn linear_resample(samples: &[i16], from_hz: u32, to_hz: u32) -> Vec<i16> {
    if samples.is_empty() || from_hz == to_hz {
        return samples.to_vec();
    }
    let ratio = from_hz as f64 / to_hz as f64;
    let out_len = ((samples.len() as f64) / ratio).round() as usize;
    let mut out = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let src_pos = i as f64 * ratio;
        let idx = src_pos.floor() as usize;
        let frac = src_pos - idx as f64;
        let s0 = samples[idx.min(samples.len() - 1)] as f64;
        let s1 = samples[(idx + 1).min(samples.len() - 1)] as f64;
        let interpolated = s0 + (s1 - s0) * frac;
        out.push(interpolated.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16);
    }
    out
}

/// 3:1 block-averaging downsample, used for Opus's 48 kHz decoder output
/// when the target rate is 16 kHz. Every group of 3 input samples becomes
/// one output sample (mean, rounded). A trailing partial group is averaged
/// over however many samples remain.
pub fn downsample_3to1_averaging(samples: &[i16]) -> Vec<i16> {
    if samples.is_empty() {
        return Vec::new();
    }
    samples
        .chunks(3)
        .map(|chunk| {
            let sum: i64 = chunk.iter().map(|&s| s as i64).sum();
            (sum / chunk.len() as i64) as i16
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_resample_is_identity_when_rates_match() {
        let samples = vec![1, 2, 3, 4];
        assert_eq!(linear_resample(&samples, 16_000, 16_000), samples);
    }

    #[test]
    fn linear_resample_upsamples_8k_to_16k_doubles_length() {
        let samples = vec![0, 1000, 2000, 3000, 4000];
        let out = linear_resample(&samples, 8_000, 16_000);
        assert_eq!(out.len(), samples.len() * 2);
    }

    #[test]
    fn downsample_3to1_averages_each_group() {
        let samples = vec![3, 6, 9, 12, 15, 18];
        let out = downsample_3to1_averaging(&samples);
        assert_eq!(out, vec![6, 15]);
    }

    #[test]
    fn downsample_3to1_handles_trailing_partial_group() {
        let samples = vec![10, 20, 30, 40];
        let out = downsample_3to1_averaging(&samples);
        assert_eq!(out, vec![20, 40]);
    }
}
