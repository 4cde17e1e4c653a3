//! Slot machine sounds: payouts, lever, reels.

use crate::dsp::envelope::Envelope;
use crate::dsp::filter::FilterType;
use crate::dsp::noise::{click_train, white_noise};
use crate::dsp::oscillator::Waveform;

use super::{FilterSpec, SynthScope};

/// C major arpeggio over a soft bass note.
pub fn win(s: &mut SynthScope<'_>) {
    let v = s.volume();
    s.tone(Waveform::Sine, 130.81, 0.0, Envelope::new(0.3 * v, 0.01, 0.5));
    for (i, freq) in [523.25, 659.25, 783.99, 1046.5].into_iter().enumerate() {
        s.tone(Waveform::Square, freq, 0.02 + i as f64 * 0.08, Envelope::pluck(0.12 * v, 0.3));
    }
}

/// Bass hit, then a seven-note arpeggio, then a long shimmer.
pub fn jackpot(s: &mut SynthScope<'_>) {
    let v = s.volume();

    // bass hit
    s.sweep(Waveform::Sine, 80.0, 40.0, 0.3, 0.0, Envelope::pluck(0.6 * v, 0.6));
    s.tone(Waveform::Square, 55.0, 0.0, Envelope::pluck(0.15 * v, 0.4));

    const ARPEGGIO: [f64; 7] = [523.25, 659.25, 783.99, 1046.5, 1318.51, 1567.98, 2093.0];
    for (i, freq) in ARPEGGIO.into_iter().enumerate() {
        s.tone(Waveform::Triangle, freq, 0.03 + i as f64 * 0.06, Envelope::pluck(0.18 * v, 0.5));
    }

    s.noise(
        0.05,
        Some(FilterSpec::new(FilterType::Highpass, 7000.0, 0.7)),
        Envelope::new(0.12 * v, 0.05, 1.2),
    );
}

/// Ratcheting loop with a motor hum underneath. Runs until stopped.
pub fn spin_mech(s: &mut SynthScope<'_>) {
    let v = s.volume();
    let sr = s.ctx.sample_rate() as u32;
    let clicks = click_train(0.5, 6, 0.004, sr, s.rng);
    s.loop_buffer(clicks, Some(FilterSpec::new(FilterType::Bandpass, 2500.0, 2.0)), 0.6 * v);
    s.loop_tone(Waveform::Triangle, 60.0, None, 0.08 * v);
}

/// Faster clicks plus a whirring band of noise. Runs until stopped.
pub fn reel_spin(s: &mut SynthScope<'_>) {
    let v = s.volume();
    let sr = s.ctx.sample_rate() as u32;
    let clicks = click_train(0.3, 8, 0.003, sr, s.rng);
    s.loop_buffer(clicks, Some(FilterSpec::new(FilterType::Highpass, 1500.0, 0.7)), 0.4 * v);
    let whir = white_noise(1.0, sr, s.rng);
    s.loop_buffer(whir, Some(FilterSpec::new(FilterType::Bandpass, 800.0, 3.0)), 0.25 * v);
}

/// Reel landing: a low thunk and a click.
pub fn reel_stop(s: &mut SynthScope<'_>) {
    let v = s.volume();
    s.sweep(Waveform::Sine, 150.0, 60.0, 0.1, 0.0, Envelope::pluck(0.5 * v, 0.15));
    s.noise(
        0.0,
        Some(FilterSpec::new(FilterType::Highpass, 2000.0, 0.7)),
        Envelope::pluck(0.3 * v, 0.02),
    );
}

pub fn lever_pull(s: &mut SynthScope<'_>) {
    let v = s.volume();
    let sr = s.ctx.sample_rate() as u32;
    let ratchet = click_train(0.35, 7, 0.004, sr, s.rng);
    s.buffer(
        ratchet.into(),
        0.0,
        Some(FilterSpec::new(FilterType::Bandpass, 1800.0, 1.5)),
        Envelope::new(0.5 * v, 0.01, 0.34),
    );
    s.sweep(Waveform::Sine, 220.0, 110.0, 0.35, 0.0, Envelope::new(0.2 * v, 0.02, 0.33));
}

/// Spring snap back followed by the arm hitting its stop.
pub fn lever_release(s: &mut SynthScope<'_>) {
    let v = s.volume();
    s.sweep(Waveform::Triangle, 300.0, 900.0, 0.08, 0.0, Envelope::pluck(0.2 * v, 0.1));
    s.noise(
        0.08,
        Some(FilterSpec::new(FilterType::Lowpass, 400.0, 0.7)),
        Envelope::pluck(0.5 * v, 0.1),
    );
}
