//! Decoded sample buffers and the playback cursor that reads them.
//!
//! A `SampleBuffer` is immutable once built and shared through `Arc` by
//! every voice playing it. `BufferVoice` resamples from the buffer's native
//! rate to the context rate with linear interpolation.

use std::sync::Arc;

/// Mono audio held in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    pub data: Vec<f64>,
    pub sample_rate: u32,
}

impl SampleBuffer {
    pub fn new(data: Vec<f64>, sample_rate: u32) -> Self {
        SampleBuffer { data, sample_rate }
    }

    /// From interleaved 16-bit PCM, averaging channels down to mono.
    pub fn from_i16(pcm: &[i16], channels: usize, sample_rate: u32) -> Self {
        let channels = channels.max(1);
        let data = pcm
            .chunks(channels)
            .map(|frame| {
                frame.iter().map(|&s| s as f64 / 32768.0).sum::<f64>() / frame.len() as f64
            })
            .collect();
        SampleBuffer { data, sample_rate }
    }

    /// From interleaved f32 samples, averaging channels down to mono.
    pub fn from_f32(samples: &[f32], channels: usize, sample_rate: u32) -> Self {
        let channels = channels.max(1);
        let data = samples
            .chunks(channels)
            .map(|frame| frame.iter().map(|&s| s as f64).sum::<f64>() / frame.len() as f64)
            .collect();
        SampleBuffer { data, sample_rate }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn duration(&self) -> f64 {
        self.data.len() as f64 / self.sample_rate as f64
    }

    /// Linear interpolation at a fractional frame position. With `wrap`, the
    /// frame after the last one is the first one (seamless loops).
    pub fn read_interpolated(&self, position: f64, wrap: bool) -> f64 {
        let len = self.data.len();
        if len == 0 || position < 0.0 {
            return 0.0;
        }
        let idx = position as usize;
        if idx >= len {
            return 0.0;
        }
        let next = if idx + 1 < len {
            self.data[idx + 1]
        } else if wrap {
            self.data[0]
        } else {
            0.0
        };
        let frac = position - idx as f64;
        self.data[idx] * (1.0 - frac) + next * frac
    }
}

/// Read cursor over a shared buffer.
#[derive(Debug, Clone)]
pub struct BufferVoice {
    buffer: Arc<SampleBuffer>,
    position: f64,
    step: f64,
    pub looping: bool,
    finished: bool,
}

impl BufferVoice {
    pub fn new(buffer: Arc<SampleBuffer>, looping: bool, context_rate: f64) -> Self {
        let step = buffer.sample_rate as f64 / context_rate;
        BufferVoice {
            finished: buffer.is_empty(),
            buffer,
            position: 0.0,
            step,
            looping,
        }
    }

    /// Next output sample, scaled by `playback_rate` (1.0 = native pitch).
    pub fn next_sample(&mut self, playback_rate: f64) -> f64 {
        if self.finished {
            return 0.0;
        }
        let sample = self.buffer.read_interpolated(self.position, self.looping);
        self.position += self.step * playback_rate.max(0.0);

        let len = self.buffer.len() as f64;
        if self.position >= len {
            if self.looping {
                self.position %= len;
            } else {
                self.finished = true;
            }
        }
        sample
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}
