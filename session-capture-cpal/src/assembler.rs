/// Re-chunks arbitrarily sized capture callbacks into fixed-size blocks.
///
/// `cpal` delivers whatever the driver hands it; the engine wants exact
/// `block_size * channels` sample blocks. Leftover samples stay pending
/// until the next callback.
pub(crate) struct BlockAssembler {
    block_samples: usize,
    pending: Vec<f32>,
}

impl BlockAssembler {
    pub fn new(block_samples: usize) -> Self {
        Self {
            block_samples,
            pending: Vec::with_capacity(block_samples * 2),
        }
    }

    /// Feed captured samples, invoking `emit` once per completed block.
    pub fn push<F: FnMut(Vec<f32>)>(&mut self, samples: &[f32], mut emit: F) {
        self.pending.extend_from_slice(samples);
        while self.pending.len() >= self.block_samples {
            let rest = self.pending.split_off(self.block_samples);
            let block = std::mem::replace(&mut self.pending, rest);
            emit(block);
        }
    }
}
