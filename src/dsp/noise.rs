//! Noise buffers for percussive and airy synth layers.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::sampler::SampleBuffer;

/// `seconds` of uniform white noise in [-1, 1).
pub fn white_noise(seconds: f64, sample_rate: u32, rng: &mut StdRng) -> SampleBuffer {
    let len = (seconds * sample_rate as f64).ceil().max(1.0) as usize;
    let data = (0..len).map(|_| rng.gen_range(-1.0..1.0)).collect();
    SampleBuffer::new(data, sample_rate)
}

/// White noise shaped by a per-sample gain curve `shape(t_seconds)`.
pub fn shaped_noise(
    seconds: f64,
    sample_rate: u32,
    rng: &mut StdRng,
    shape: impl Fn(f64) -> f64,
) -> SampleBuffer {
    let len = (seconds * sample_rate as f64).ceil().max(1.0) as usize;
    let sr = sample_rate as f64;
    let data = (0..len)
        .map(|i| rng.gen_range(-1.0..1.0) * shape(i as f64 / sr))
        .collect();
    SampleBuffer::new(data, sample_rate)
}

/// One loop period of evenly spaced decaying noise clicks, the ratchet
/// texture of a spinning mechanism. `clicks` bursts per `period` seconds.
pub fn click_train(
    period: f64,
    clicks: usize,
    click_decay: f64,
    sample_rate: u32,
    rng: &mut StdRng,
) -> SampleBuffer {
    let spacing = period / clicks.max(1) as f64;
    shaped_noise(period, sample_rate, rng, |t| {
        let local = t % spacing;
        (-local / click_decay).exp()
    })
}

/// Deterministic generator for tests and offline renders.
pub fn seeded(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}
