//! Neon district palette: saw sweeps, glitches, subs, bells.

use rand::Rng;

use crate::dsp::envelope::{glide, Envelope};
use crate::dsp::filter::FilterType;
use crate::dsp::oscillator::Waveform;
use crate::graph::ParamKind;

use super::{FilterSpec, SynthScope};

/// Scatter of square blips at random pitches plus a crunchy noise band.
pub fn glitch(s: &mut SynthScope<'_>) {
    let v = s.volume();
    for i in 0..5 {
        let freq = s.rng.gen_range(200.0..2000.0);
        s.tone(Waveform::Square, freq, i as f64 * 0.035, Envelope::pluck(0.15 * v, 0.03));
    }
    s.noise(
        0.0,
        Some(FilterSpec::new(FilterType::Bandpass, 3000.0, 4.0)),
        Envelope::pluck(0.3 * v, 0.15),
    );
}

pub fn sweep(s: &mut SynthScope<'_>) {
    let v = s.volume();
    let env = Envelope::new(0.2 * v, 0.05, 0.45);
    let source = s.ctx.create_oscillator(Waveform::Sawtooth, 100.0);
    let chain = s.tone_through(source, FilterSpec::new(FilterType::Lowpass, 300.0, 4.0), env);
    if let Some(freq) = s.ctx.param_mut(chain.source, ParamKind::Frequency) {
        glide(freq, 100.0, 2000.0, s.start, 0.5);
    }
    s.sweep_filter(chain, 300.0, 5000.0, 0.0, 0.5);
}

/// Detuned saw chord opening up through a lowpass.
pub fn reveal(s: &mut SynthScope<'_>) {
    let v = s.volume();
    for (i, freq) in [220.0, 329.63, 440.0, 441.5].into_iter().enumerate() {
        let source = s.ctx.create_oscillator(Waveform::Sawtooth, freq);
        let env = Envelope::new(0.1 * v, 0.05, 1.0);
        let lowpass = FilterSpec::new(FilterType::Lowpass, 200.0, 2.0);
        let chain = s.tone_through_at(source, lowpass, i as f64 * 0.02, env);
        s.sweep_filter(chain, 200.0, 4000.0, i as f64 * 0.02, 0.8);
    }
}

/// Sub drop: pitch falls an octave into a filtered square.
pub fn bass(s: &mut SynthScope<'_>) {
    let v = s.volume();
    s.sweep(Waveform::Sine, 110.0, 55.0, 0.05, 0.0, Envelope::pluck(0.5 * v, 0.8));
    let source = s.ctx.create_oscillator(Waveform::Square, 55.0);
    let lowpass = FilterSpec::new(FilterType::Lowpass, 200.0, 1.0);
    s.tone_through(source, lowpass, Envelope::pluck(0.25 * v, 0.6));
}

/// Wah: the cutoff rocks up and down twice.
pub fn wow(s: &mut SynthScope<'_>) {
    let v = s.volume();
    let source = s.ctx.create_oscillator(Waveform::Sawtooth, 150.0);
    let bandpass = FilterSpec::new(FilterType::Bandpass, 300.0, 6.0);
    let chain = s.tone_through(source, bandpass, Envelope::new(0.4 * v, 0.02, 0.6));
    let start = s.start;
    if let Some(cutoff) = chain.filter.and_then(|f| s.ctx.param_mut(f, ParamKind::Frequency)) {
        cutoff.set_value_at_time(300.0, start);
        for (i, target) in [1800.0, 400.0, 1800.0, 300.0].into_iter().enumerate() {
            cutoff.linear_ramp_to_value_at_time(target, start + (i + 1) as f64 * 0.15);
        }
    }
    s.tone(Waveform::Triangle, 75.0, 0.0, Envelope::new(0.15 * v, 0.02, 0.5));
}

/// Pentatonic bells in random order over a sparkle of noise.
pub fn magic_reveal(s: &mut SynthScope<'_>) {
    let v = s.volume();
    const SCALE: [f64; 5] = [1046.5, 1174.66, 1318.51, 1567.98, 1760.0];
    for i in 0..6 {
        let freq = SCALE[s.rng.gen_range(0..SCALE.len())];
        s.tone(Waveform::Sine, freq, i as f64 * 0.07, Envelope::new(0.15 * v, 0.005, 0.6));
    }
    s.noise(
        0.0,
        Some(FilterSpec::new(FilterType::Highpass, 5000.0, 0.7)),
        Envelope::new(0.1 * v, 0.1, 0.6),
    );
}

/// Long filtered swell for the opening sequence.
pub fn intro_whoosh(s: &mut SynthScope<'_>) {
    let v = s.volume();
    let air = s.noise(
        0.0,
        Some(FilterSpec::new(FilterType::Bandpass, 150.0, 1.0)),
        Envelope::new(0.5 * v, 0.6, 0.8),
    );
    s.sweep_filter(air, 150.0, 2500.0, 0.0, 1.2);
    s.sweep(Waveform::Sine, 40.0, 80.0, 1.0, 0.0, Envelope::new(0.3 * v, 0.5, 0.8));
}

/// Soft heel strike; pitch varies a little per step.
pub fn footstep(s: &mut SynthScope<'_>) {
    let v = s.volume();
    let pitch = s.rng.gen_range(0.9..1.1);
    s.noise(
        0.0,
        Some(FilterSpec::new(FilterType::Lowpass, 600.0 * pitch, 0.7)),
        Envelope::pluck(0.5 * v, 0.06),
    );
    s.sweep(Waveform::Sine, 90.0 * pitch, 50.0, 0.05, 0.0, Envelope::pluck(0.3 * v, 0.08));
}

#[cfg(test)]
mod tests {
    use crate::synth::tests::{build, render_until_quiet};
    use crate::synth::SynthType;

    #[test]
    fn glitch_blips_and_noise() {
        let (_, _, sources) = build(SynthType::CyberGlitch, 0.5);
        assert_eq!(sources.len(), 6);
    }

    #[test]
    fn bass_energy_sits_low() {
        let (mut ctx, _, _) = build(SynthType::CyberBass, 1.0);
        let (audio, _) = render_until_quiet(&mut ctx, 2.0);
        // count zero crossings over the first 0.2 s; a 55-110 Hz tone has few
        let window = &audio[..3200];
        let crossings = window.windows(2).filter(|w| w[0].signum() != w[1].signum()).count();
        assert!(crossings < 100, "{crossings} crossings");
    }

    #[test]
    fn intro_whoosh_is_the_longest_one_shot() {
        let (mut ctx, _, _) = build(SynthType::IntroWhoosh, 0.5);
        let (audio, ended) = render_until_quiet(&mut ctx, 4.0);
        assert!(ended);
        assert!(audio.len() > 16000 * 14 / 10);
    }
}
