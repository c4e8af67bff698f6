use std::path::PathBuf;
use std::time::Duration;

/// Gain preset applied when combining the microphone and system streams.
///
/// `Additive` sums both streams at unity gain and relies on hard clipping;
/// `Balanced` weights the microphone over the system mix so speech stays
/// intelligible under loud game audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MixPreset {
    Additive,
    Balanced,
}

impl MixPreset {
    /// `(gain_mic, gain_system)` for this preset.
    pub fn gains(&self) -> (f32, f32) {
        match self {
            Self::Additive => (1.0, 1.0),
            Self::Balanced => (0.7, 0.3),
        }
    }
}

/// Configuration for a recording session.
#[derive(Debug, Clone, PartialEq)]
pub struct RecorderConfig {
    /// Capture and output sample rate in Hz (default: 44100).
    pub sample_rate: u32,

    /// Frames per captured block (default: 1024).
    pub block_size: usize,

    /// Output channel count when both streams are present (1 or 2).
    /// Microphone-only sessions always commit mono.
    pub output_channels: u16,

    /// Gain preset for the mix (default: `Additive`).
    pub mix_preset: MixPreset,

    /// Directory where recordings are written, created on demand.
    pub output_directory: PathBuf,

    /// Capacity of the per-stream hand-off queue, in blocks. A full queue
    /// blocks the reader's next push.
    pub queue_capacity: usize,

    /// How long `stop()` waits for each reader to confirm termination
    /// before abandoning it.
    pub shutdown_grace: Duration,
}

impl RecorderConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate == 0 {
            return Err("sample rate must be positive".into());
        }
        if self.block_size == 0 {
            return Err("block size must be positive".into());
        }
        if ![1, 2].contains(&self.output_channels) {
            return Err(format!("unsupported channel count: {}", self.output_channels));
        }
        if self.queue_capacity == 0 {
            return Err("queue capacity must be positive".into());
        }
        Ok(())
    }
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            block_size: 1024,
            output_channels: 2,
            mix_preset: MixPreset::Additive,
            output_directory: PathBuf::from("recordings"),
            queue_capacity: 8,
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(RecorderConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_bad_channel_count() {
        let config = RecorderConfig {
            output_channels: 6,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_block_size() {
        let config = RecorderConfig {
            block_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn preset_gains() {
        assert_eq!(MixPreset::Additive.gains(), (1.0, 1.0));
        assert_eq!(MixPreset::Balanced.gains(), (0.7, 0.3));
    }
}
