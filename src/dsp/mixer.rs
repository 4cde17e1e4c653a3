//! Mixer: sums node inputs for one render block.

/// Accumulation buffer reused across blocks.
#[derive(Debug, Clone, Default)]
pub struct Mixer {
    buffer: Vec<f64>,
}

impl Mixer {
    pub fn new() -> Self {
        Mixer { buffer: Vec::new() }
    }

    /// Zero `num_samples` frames.
    pub fn clear(&mut self, num_samples: usize) {
        self.buffer.clear();
        self.buffer.resize(num_samples, 0.0);
    }

    /// Add a whole block; extra input frames are ignored.
    pub fn add_block(&mut self, block: &[f64]) {
        for (acc, &s) in self.buffer.iter_mut().zip(block) {
            *acc += s;
        }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

/// Write a mono block into an interleaved output, soft clipped and
/// duplicated across `channels`.
pub fn write_interleaved(mono: &[f64], out: &mut [f32], channels: usize) {
    let channels = channels.max(1);
    for (frame, &s) in out.chunks_mut(channels).zip(mono) {
        frame.fill(soft_clip(s) as f32);
    }
}

/// tanh soft clipper; keeps the master sum inside [-1, 1] without
/// hard-clip distortion.
pub fn soft_clip(x: f64) -> f64 {
    x.tanh()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_gives_silence() {
        let mut m = Mixer::new();
        m.clear(128);
        assert_eq!(m.len(), 128);
        assert!(m.as_slice().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn accumulates_blocks() {
        let mut m = Mixer::new();
        m.clear(3);
        m.add_block(&[0.5, 1.0, 0.0]);
        m.add_block(&[0.3, -1.0, 0.25, 9.0]);
        assert_eq!(m.as_slice(), &[0.8, 0.0, 0.25]);
    }

    #[test]
    fn interleaved_output_is_clipped_and_duplicated() {
        let mut out = [0.0_f32; 4];
        write_interleaved(&[100.0, 0.0], &mut out, 2);
        assert!(out[0] <= 1.0 && out[0] > 0.99);
        assert_eq!(out[0], out[1]);
        assert_eq!(out[2], 0.0);
    }
}
