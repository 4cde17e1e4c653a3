//! Offline renderer: one synth effect to samples or a WAV byte buffer.

use crate::dsp::mixer::soft_clip;
use crate::dsp::noise::seeded;
use crate::graph::AudioContext;
use crate::synth::{self, SynthType};

/// One-shots are cut here if they somehow never end.
const MAX_SECONDS: f64 = 10.0;

/// How much of a looping effect gets rendered.
pub const LOOP_PREVIEW_SECONDS: f64 = 2.0;

const BLOCK: usize = 128;

/// Render `synth` mono at `sample_rate`. One-shots run until their last
/// source ends; loops run for `LOOP_PREVIEW_SECONDS`.
pub fn render_synth(synth: SynthType, volume: f64, sample_rate: u32) -> Vec<f64> {
    let mut ctx = AudioContext::new(f64::from(sample_rate), BLOCK);
    let out = ctx.create_gain(1.0);
    ctx.set_persistent(out);
    ctx.connect(out, ctx.destination());

    let mut rng = seeded(u64::from(sample_rate));
    let mut live = synth::generate(synth, &mut ctx, out, 0.0, volume, &mut rng).len();

    let limit = if synth.is_looping() { LOOP_PREVIEW_SECONDS } else { MAX_SECONDS };
    let total = (limit * f64::from(sample_rate)).ceil() as usize;
    let mut samples = Vec::with_capacity(total.min(sample_rate as usize * 2));
    while samples.len() < total && live > 0 {
        let frames = BLOCK.min(total - samples.len());
        samples.extend(ctx.render_block(frames));
        live = live.saturating_sub(ctx.take_ended().len());
    }
    samples
}

/// Render `synth` to a 16-bit stereo WAV file as bytes.
pub fn render_synth_wav(synth: SynthType, volume: f64, sample_rate: u32) -> Vec<u8> {
    let pcm: Vec<i16> = render_synth(synth, volume, sample_rate)
        .into_iter()
        .flat_map(|s| {
            let v = (soft_clip(s) * f64::from(i16::MAX)) as i16;
            [v, v]
        })
        .collect();
    encode_wav(&pcm, sample_rate, 2)
}

/// Encode interleaved i16 PCM samples to a WAV byte buffer.
pub fn encode_wav(samples: &[i16], sample_rate: u32, channels: u16) -> Vec<u8> {
    let bits_per_sample: u16 = 16;
    let byte_rate = sample_rate * channels as u32 * (bits_per_sample as u32 / 8);
    let block_align = channels * (bits_per_sample / 8);
    let data_size = (samples.len() * 2) as u32;
    let file_size = 36 + data_size;

    let mut buf = Vec::with_capacity(44 + data_size as usize);

    buf.extend_from_slice(b"RIFF");
    buf.extend_from_slice(&file_size.to_le_bytes());
    buf.extend_from_slice(b"WAVE");

    buf.extend_from_slice(b"fmt ");
    buf.extend_from_slice(&16u32.to_le_bytes()); // chunk size
    buf.extend_from_slice(&1u16.to_le_bytes()); // PCM
    buf.extend_from_slice(&channels.to_le_bytes());
    buf.extend_from_slice(&sample_rate.to_le_bytes());
    buf.extend_from_slice(&byte_rate.to_le_bytes());
    buf.extend_from_slice(&block_align.to_le_bytes());
    buf.extend_from_slice(&bits_per_sample.to_le_bytes());

    buf.extend_from_slice(b"data");
    buf.extend_from_slice(&data_size.to_le_bytes());
    for &sample in samples {
        buf.extend_from_slice(&sample.to_le_bytes());
    }

    buf
}
