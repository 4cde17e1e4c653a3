//! DSP primitives: oscillators, filters, envelopes, sample buffers, noise,
//! block mixing, spectrum analysis and offline WAV rendering.

pub mod analyser;
pub mod envelope;
pub mod filter;
pub mod mixer;
pub mod noise;
pub mod oscillator;
pub mod renderer;
pub mod sampler;
