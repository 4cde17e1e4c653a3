//! Interface cues: short, bright, quiet.

use crate::dsp::envelope::Envelope;
use crate::dsp::filter::FilterType;
use crate::dsp::oscillator::Waveform;

use super::{FilterSpec, SynthScope};

pub fn tick(s: &mut SynthScope<'_>) {
    let v = s.volume();
    s.tone(Waveform::Triangle, 2400.0, 0.0, Envelope::pluck(0.25 * v, 0.03));
}

pub fn hover(s: &mut SynthScope<'_>) {
    let v = s.volume();
    s.sweep(Waveform::Sine, 1200.0, 1500.0, 0.04, 0.0, Envelope::pluck(0.12 * v, 0.06));
}

/// Two-note confirm, a fifth apart.
pub fn select(s: &mut SynthScope<'_>) {
    let v = s.volume();
    s.tone(Waveform::Sine, 880.0, 0.0, Envelope::pluck(0.3 * v, 0.12));
    s.tone(Waveform::Sine, 1320.0, 0.05, Envelope::pluck(0.3 * v, 0.15));
}

pub fn back(s: &mut SynthScope<'_>) {
    let v = s.volume();
    s.sweep(Waveform::Triangle, 660.0, 440.0, 0.1, 0.0, Envelope::pluck(0.25 * v, 0.15));
}

pub fn whoosh(s: &mut SynthScope<'_>) {
    let v = s.volume();
    let air = s.noise(
        0.0,
        Some(FilterSpec::new(FilterType::Bandpass, 400.0, 1.2)),
        Envelope::new(0.5 * v, 0.08, 0.3),
    );
    s.sweep_filter(air, 400.0, 3000.0, 0.0, 0.3);
}

pub fn swoosh(s: &mut SynthScope<'_>) {
    let v = s.volume();
    let air = s.noise(
        0.0,
        Some(FilterSpec::new(FilterType::Highpass, 1500.0, 0.8)),
        Envelope::new(0.4 * v, 0.02, 0.2),
    );
    s.sweep_filter(air, 1500.0, 5000.0, 0.0, 0.18);
}

/// Rising C major triad with a little air on top.
pub fn reveal(s: &mut SynthScope<'_>) {
    let v = s.volume();
    for (i, freq) in [523.25, 659.25, 783.99].into_iter().enumerate() {
        s.tone(Waveform::Sine, freq, i as f64 * 0.06, Envelope::new(0.2 * v, 0.01, 0.4));
    }
    s.noise(
        0.12,
        Some(FilterSpec::new(FilterType::Highpass, 6000.0, 0.7)),
        Envelope::new(0.08 * v, 0.02, 0.25),
    );
}

pub fn transition(s: &mut SynthScope<'_>) {
    let v = s.volume();
    let air = s.noise(
        0.0,
        Some(FilterSpec::new(FilterType::Bandpass, 200.0, 1.0)),
        Envelope::new(0.4 * v, 0.2, 0.4),
    );
    s.sweep_filter(air, 200.0, 1200.0, 0.0, 0.6);
    s.sweep(Waveform::Sine, 110.0, 220.0, 0.5, 0.0, Envelope::new(0.2 * v, 0.15, 0.45));
}

pub fn ui_open(s: &mut SynthScope<'_>) {
    let v = s.volume();
    s.sweep(Waveform::Sine, 400.0, 900.0, 0.15, 0.0, Envelope::new(0.25 * v, 0.01, 0.2));
    s.noise(
        0.0,
        Some(FilterSpec::new(FilterType::Highpass, 3000.0, 0.7)),
        Envelope::pluck(0.08 * v, 0.08),
    );
}

pub fn ui_close(s: &mut SynthScope<'_>) {
    let v = s.volume();
    s.sweep(Waveform::Sine, 900.0, 350.0, 0.15, 0.0, Envelope::new(0.25 * v, 0.01, 0.18));
}
