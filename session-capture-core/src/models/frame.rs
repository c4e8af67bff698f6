use std::time::Instant;

/// One fixed-size block of interleaved samples from a single endpoint.
///
/// Produced by a `StreamReader`, consumed exactly once by the mixer.
/// Sequence numbers are per-stream and strictly increasing.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Interleaved f32 samples, nominally in `[-1.0, 1.0]`.
    pub samples: Vec<f32>,
    pub channels: u16,
    pub sequence: u64,
    pub captured_at: Instant,
}

impl Frame {
    /// Number of per-channel sample groups in this block.
    pub fn frame_count(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }
}

/// One post-mix output block, owned by the session's pending buffer until
/// committed to file.
#[derive(Debug, Clone, PartialEq)]
pub struct MixedBlock {
    /// Interleaved f32 samples at the session's output channel count.
    pub samples: Vec<f32>,
    pub sequence: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_count_divides_by_channels() {
        let frame = Frame {
            samples: vec![0.0; 2048],
            channels: 2,
            sequence: 0,
            captured_at: Instant::now(),
        };
        assert_eq!(frame.frame_count(), 1024);
    }

    #[test]
    fn frame_count_zero_channels_is_zero() {
        let frame = Frame {
            samples: vec![0.0; 16],
            channels: 0,
            sequence: 0,
            captured_at: Instant::now(),
        };
        assert_eq!(frame.frame_count(), 0);
    }
}
