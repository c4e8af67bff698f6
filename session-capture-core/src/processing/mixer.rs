use crate::models::config::MixPreset;
use crate::models::frame::{Frame, MixedBlock};

/// Pure-math block mixer. All operations work on `&[f32]` buffers with no
/// platform dependencies.
///
/// Combines one microphone frame and one system-loopback frame into one
/// output block at the session's channel count, applying the configured
/// gain preset and hard-clipping to `[-1.0, 1.0]`.
#[derive(Debug, Clone)]
pub struct BlockMixer {
    gain_mic: f32,
    gain_system: f32,
    output_channels: u16,
}

impl BlockMixer {
    pub fn new(preset: MixPreset, output_channels: u16) -> Self {
        let (gain_mic, gain_system) = preset.gains();
        Self {
            gain_mic,
            gain_system,
            output_channels,
        }
    }

    pub fn output_channels(&self) -> u16 {
        self.output_channels
    }

    /// Mix one frame from each stream into one output block.
    ///
    /// Both frames are first normalized to the output channel layout, then
    /// truncated to the shorter frame count. Frames are paired by arrival
    /// order only; clock drift between the two endpoints accumulates and is
    /// not corrected.
    pub fn mix(&self, mic: &Frame, system: &Frame, sequence: u64) -> MixedBlock {
        let mic_samples = normalize_channels(&mic.samples, mic.channels, self.output_channels);
        let sys_samples = normalize_channels(&system.samples, system.channels, self.output_channels);

        let channels = self.output_channels as usize;
        let frames = (mic_samples.len() / channels).min(sys_samples.len() / channels);

        let mut samples = Vec::with_capacity(frames * channels);
        for i in 0..frames * channels {
            let mixed = self.gain_mic * mic_samples[i] + self.gain_system * sys_samples[i];
            samples.push(mixed.clamp(-1.0, 1.0));
        }

        MixedBlock { samples, sequence }
    }

    /// Degraded microphone-only path: the frame passes through unmixed,
    /// normalized to the output channel layout.
    pub fn passthrough(&self, frame: &Frame, sequence: u64) -> MixedBlock {
        MixedBlock {
            samples: normalize_channels(&frame.samples, frame.channels, self.output_channels),
            sequence,
        }
    }
}

/// Convert interleaved samples from `from` channels to `to` channels.
///
/// Downmixing averages all source channels per frame; upmixing duplicates
/// mono into every output channel.
pub fn normalize_channels(samples: &[f32], from: u16, to: u16) -> Vec<f32> {
    if from == to || from == 0 {
        return samples.to_vec();
    }
    let mono = if from == 1 {
        samples.to_vec()
    } else {
        downmix_to_mono(samples, from as usize)
    };
    if to == 1 {
        return mono;
    }
    let mut out = Vec::with_capacity(mono.len() * to as usize);
    for &sample in &mono {
        for _ in 0..to {
            out.push(sample);
        }
    }
    out
}

/// Downmix interleaved multi-channel audio to mono by averaging channels
/// per frame.
pub fn downmix_to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let frame_count = samples.len() / channels;
    let scale = 1.0 / channels as f32;
    let mut mono = Vec::with_capacity(frame_count);
    for frame in 0..frame_count {
        let mut sum = 0.0f32;
        for ch in 0..channels {
            sum += samples[frame * channels + ch];
        }
        mono.push(sum * scale);
    }
    mono
}

/// RMS level of samples (0.0–1.0 for normalized audio).
pub fn rms_level(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

/// Peak absolute level of samples.
pub fn peak_level(samples: &[f32]) -> f32 {
    samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max)
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use approx::assert_relative_eq;

    use super::*;

    fn frame(samples: Vec<f32>, channels: u16, sequence: u64) -> Frame {
        Frame {
            samples,
            channels,
            sequence,
            captured_at: Instant::now(),
        }
    }

    #[test]
    fn zero_inputs_mix_to_zero() {
        let mixer = BlockMixer::new(MixPreset::Additive, 1);
        let mic = frame(vec![0.0; 64], 1, 0);
        let sys = frame(vec![0.0; 128], 2, 0);

        let block = mixer.mix(&mic, &sys, 0);

        assert_eq!(block.samples.len(), 64);
        assert!(block.samples.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn full_scale_additive_clamps_to_one() {
        let mixer = BlockMixer::new(MixPreset::Additive, 1);
        let mic = frame(vec![1.0; 32], 1, 0);
        let sys = frame(vec![1.0; 32], 1, 0);

        let block = mixer.mix(&mic, &sys, 0);

        assert!(block.samples.iter().all(|&s| s == 1.0));
    }

    #[test]
    fn negative_overflow_clamps_to_minus_one() {
        let mixer = BlockMixer::new(MixPreset::Additive, 1);
        let mic = frame(vec![-1.0; 8], 1, 0);
        let sys = frame(vec![-0.5; 8], 1, 0);

        let block = mixer.mix(&mic, &sys, 0);

        assert!(block.samples.iter().all(|&s| s == -1.0));
    }

    #[test]
    fn balanced_preset_weights_mic_over_system() {
        let mixer = BlockMixer::new(MixPreset::Balanced, 1);
        let mic = frame(vec![0.5; 4], 1, 0);
        let sys = frame(vec![0.5; 4], 1, 0);

        let block = mixer.mix(&mic, &sys, 0);

        for &s in &block.samples {
            assert_relative_eq!(s, 0.7 * 0.5 + 0.3 * 0.5, epsilon = 1e-6);
        }
    }

    #[test]
    fn unequal_frames_truncate_to_shorter() {
        let mixer = BlockMixer::new(MixPreset::Additive, 1);
        let mic = frame(vec![0.1; 100], 1, 0);
        let sys = frame(vec![0.1; 60], 1, 0);

        let block = mixer.mix(&mic, &sys, 3);

        assert_eq!(block.samples.len(), 60);
        assert_eq!(block.sequence, 3);
    }

    #[test]
    fn stereo_system_downmixes_into_mono_target() {
        let mixer = BlockMixer::new(MixPreset::Additive, 1);
        let mic = frame(vec![0.0, 0.0], 1, 0);
        // Stereo pairs (0.2, 0.8) and (0.4, 0.6) both average to 0.5.
        let sys = frame(vec![0.2, 0.8, 0.4, 0.6], 2, 0);

        let block = mixer.mix(&mic, &sys, 0);

        assert_eq!(block.samples.len(), 2);
        assert_relative_eq!(block.samples[0], 0.5, epsilon = 1e-6);
        assert_relative_eq!(block.samples[1], 0.5, epsilon = 1e-6);
    }

    #[test]
    fn mono_mic_duplicates_into_stereo_target() {
        let mixer = BlockMixer::new(MixPreset::Additive, 2);
        let mic = frame(vec![0.25, 0.5], 1, 0);
        let sys = frame(vec![0.0, 0.0, 0.0, 0.0], 2, 0);

        let block = mixer.mix(&mic, &sys, 0);

        assert_eq!(block.samples, vec![0.25, 0.25, 0.5, 0.5]);
    }

    #[test]
    fn passthrough_keeps_samples_unmixed() {
        let mixer = BlockMixer::new(MixPreset::Balanced, 1);
        let mic = frame(vec![0.9, -0.9, 0.1], 1, 7);

        let block = mixer.passthrough(&mic, 7);

        assert_eq!(block.samples, vec![0.9, -0.9, 0.1]);
        assert_eq!(block.sequence, 7);
    }

    #[test]
    fn downmix_stereo_to_mono() {
        let mono = downmix_to_mono(&[0.2, 0.8, 0.4, 0.6], 2);
        assert_eq!(mono.len(), 2);
        assert_relative_eq!(mono[0], 0.5, epsilon = 1e-6);
        assert_relative_eq!(mono[1], 0.5, epsilon = 1e-6);
    }

    #[test]
    fn downmix_mono_passthrough() {
        let samples = vec![0.1, 0.2, 0.3];
        assert_eq!(downmix_to_mono(&samples, 1), samples);
    }

    #[test]
    fn rms_level_silence() {
        assert_eq!(rms_level(&[0.0, 0.0, 0.0]), 0.0);
    }

    #[test]
    fn rms_level_full_scale() {
        assert_relative_eq!(rms_level(&[1.0, 1.0, 1.0]), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn peak_level_basic() {
        assert_relative_eq!(peak_level(&[0.1, -0.5, 0.3]), 0.5, epsilon = 1e-6);
    }
}
