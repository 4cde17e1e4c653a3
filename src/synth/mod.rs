//! Procedural sound effects.
//!
//! Every effect is a plain function that wires oscillator and noise chains
//! into a supplied output node, each chain with its own gain envelope and
//! a bounded lifetime. Nothing here keeps state between calls; the engine
//! only sees the list of source nodes that were started.

pub mod casino;
pub mod cyber;
pub mod ui;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::dsp::envelope::{glide, Envelope, SILENCE_FLOOR};
use crate::dsp::filter::FilterType;
use crate::dsp::noise;
use crate::dsp::oscillator::Waveform;
use crate::dsp::sampler::SampleBuffer;
use crate::config::unit_level;
use crate::engine::bus::BusId;
use crate::graph::{AudioContext, NodeId, ParamKind};

/// Extra lifetime past the envelope end so the exponential tail completes.
const TAIL: f64 = 0.02;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SynthType {
    Tick,
    Hover,
    Select,
    Back,
    Whoosh,
    Swoosh,
    Reveal,
    Transition,
    UiOpen,
    UiClose,
    Win,
    Jackpot,
    SpinMech,
    LeverPull,
    LeverRelease,
    ReelSpin,
    ReelStop,
    IntroWhoosh,
    Footstep,
    CyberGlitch,
    CyberSweep,
    CyberReveal,
    CyberBass,
    CyberWow,
    MagicReveal,
}

pub type Generator = fn(&mut SynthScope<'_>);

impl SynthType {
    pub const ALL: [SynthType; 25] = [
        SynthType::Tick,
        SynthType::Hover,
        SynthType::Select,
        SynthType::Back,
        SynthType::Whoosh,
        SynthType::Swoosh,
        SynthType::Reveal,
        SynthType::Transition,
        SynthType::UiOpen,
        SynthType::UiClose,
        SynthType::Win,
        SynthType::Jackpot,
        SynthType::SpinMech,
        SynthType::LeverPull,
        SynthType::LeverRelease,
        SynthType::ReelSpin,
        SynthType::ReelStop,
        SynthType::IntroWhoosh,
        SynthType::Footstep,
        SynthType::CyberGlitch,
        SynthType::CyberSweep,
        SynthType::CyberReveal,
        SynthType::CyberBass,
        SynthType::CyberWow,
        SynthType::MagicReveal,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SynthType::Tick => "tick",
            SynthType::Hover => "hover",
            SynthType::Select => "select",
            SynthType::Back => "back",
            SynthType::Whoosh => "whoosh",
            SynthType::Swoosh => "swoosh",
            SynthType::Reveal => "reveal",
            SynthType::Transition => "transition",
            SynthType::UiOpen => "uiOpen",
            SynthType::UiClose => "uiClose",
            SynthType::Win => "win",
            SynthType::Jackpot => "jackpot",
            SynthType::SpinMech => "spinMech",
            SynthType::LeverPull => "leverPull",
            SynthType::LeverRelease => "leverRelease",
            SynthType::ReelSpin => "reelSpin",
            SynthType::ReelStop => "reelStop",
            SynthType::IntroWhoosh => "introWhoosh",
            SynthType::Footstep => "footstep",
            SynthType::CyberGlitch => "cyberGlitch",
            SynthType::CyberSweep => "cyberSweep",
            SynthType::CyberReveal => "cyberReveal",
            SynthType::CyberBass => "cyberBass",
            SynthType::CyberWow => "cyberWow",
            SynthType::MagicReveal => "magicReveal",
        }
    }

    /// Interface sounds go to the ui bus, footsteps to spatial, the rest to sfx.
    pub fn bus(&self) -> BusId {
        match self {
            SynthType::Tick
            | SynthType::Hover
            | SynthType::Select
            | SynthType::Back
            | SynthType::Whoosh
            | SynthType::Swoosh
            | SynthType::Reveal
            | SynthType::Transition
            | SynthType::UiOpen
            | SynthType::UiClose => BusId::Ui,
            SynthType::Footstep => BusId::Spatial,
            _ => BusId::Sfx,
        }
    }

    /// Runs until explicitly stopped.
    pub fn is_looping(&self) -> bool {
        matches!(self, SynthType::SpinMech | SynthType::ReelSpin)
    }

    pub fn generator(&self) -> Generator {
        match self {
            SynthType::Tick => ui::tick,
            SynthType::Hover => ui::hover,
            SynthType::Select => ui::select,
            SynthType::Back => ui::back,
            SynthType::Whoosh => ui::whoosh,
            SynthType::Swoosh => ui::swoosh,
            SynthType::Reveal => ui::reveal,
            SynthType::Transition => ui::transition,
            SynthType::UiOpen => ui::ui_open,
            SynthType::UiClose => ui::ui_close,
            SynthType::Win => casino::win,
            SynthType::Jackpot => casino::jackpot,
            SynthType::SpinMech => casino::spin_mech,
            SynthType::LeverPull => casino::lever_pull,
            SynthType::LeverRelease => casino::lever_release,
            SynthType::ReelSpin => casino::reel_spin,
            SynthType::ReelStop => casino::reel_stop,
            SynthType::IntroWhoosh => cyber::intro_whoosh,
            SynthType::Footstep => cyber::footstep,
            SynthType::CyberGlitch => cyber::glitch,
            SynthType::CyberSweep => cyber::sweep,
            SynthType::CyberReveal => cyber::reveal,
            SynthType::CyberBass => cyber::bass,
            SynthType::CyberWow => cyber::wow,
            SynthType::MagicReveal => cyber::magic_reveal,
        }
    }
}

impl fmt::Display for SynthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SynthType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SynthType::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| format!("unknown synth '{s}'"))
    }
}

/// Build `synth` into `ctx`, feeding `out`, starting at `start`.
/// Returns every source node that was scheduled.
pub fn generate(
    synth: SynthType,
    ctx: &mut AudioContext,
    out: NodeId,
    start: f64,
    volume: f64,
    rng: &mut StdRng,
) -> Vec<NodeId> {
    let mut scope = SynthScope {
        ctx,
        out,
        start,
        volume: unit_level(volume).unwrap_or(0.0),
        rng,
        sources: Vec::new(),
    };
    (synth.generator())(&mut scope);
    scope.sources
}

/// Optional filter stage between a source and its envelope gain.
#[derive(Debug, Clone, Copy)]
pub struct FilterSpec {
    pub kind: FilterType,
    pub frequency: f64,
    pub q: f64,
}

impl FilterSpec {
    pub fn new(kind: FilterType, frequency: f64, q: f64) -> Self {
        FilterSpec { kind, frequency, q }
    }
}

/// Handles to one built chain, for extra automation.
#[derive(Debug, Clone, Copy)]
pub struct Chain {
    pub source: NodeId,
    pub filter: Option<NodeId>,
    pub gain: NodeId,
}

/// What a generator gets to build with.
pub struct SynthScope<'a> {
    pub ctx: &'a mut AudioContext,
    out: NodeId,
    start: f64,
    volume: f64,
    pub rng: &'a mut StdRng,
    sources: Vec<NodeId>,
}

impl SynthScope<'_> {
    pub fn volume(&self) -> f64 {
        self.volume
    }

    fn sample_rate(&self) -> u32 {
        self.ctx.sample_rate() as u32
    }

    /// Oscillator at `frequency`, enveloped, starting `offset` seconds in.
    pub fn tone(
        &mut self,
        waveform: Waveform,
        frequency: f64,
        offset: f64,
        env: Envelope,
    ) -> Chain {
        let source = self.ctx.create_oscillator(waveform, frequency);
        self.finish_chain(source, None, offset, env)
    }

    /// Like `tone`, gliding exponentially to `to` over `glide_time`.
    pub fn sweep(
        &mut self,
        waveform: Waveform,
        from: f64,
        to: f64,
        glide_time: f64,
        offset: f64,
        env: Envelope,
    ) -> Chain {
        let chain = self.tone(waveform, from, offset, env);
        let at = self.start + offset;
        if let Some(freq) = self.ctx.param_mut(chain.source, ParamKind::Frequency) {
            glide(freq, from, to, at, glide_time);
        }
        chain
    }

    /// Envelope an already created source through `filter`.
    pub fn tone_through(&mut self, source: NodeId, filter: FilterSpec, env: Envelope) -> Chain {
        self.tone_through_at(source, filter, 0.0, env)
    }

    pub fn tone_through_at(
        &mut self,
        source: NodeId,
        filter: FilterSpec,
        offset: f64,
        env: Envelope,
    ) -> Chain {
        self.finish_chain(source, Some(filter), offset, env)
    }

    /// Fresh white noise burst through an optional filter.
    pub fn noise(&mut self, offset: f64, filter: Option<FilterSpec>, env: Envelope) -> Chain {
        let buffer = noise::white_noise(env.duration() + TAIL, self.sample_rate(), self.rng);
        self.buffer(Arc::new(buffer), offset, filter, env)
    }

    /// One-shot buffer playback.
    pub fn buffer(
        &mut self,
        buffer: Arc<SampleBuffer>,
        offset: f64,
        filter: Option<FilterSpec>,
        env: Envelope,
    ) -> Chain {
        let source = self.ctx.create_buffer_source(buffer, false);
        self.finish_chain(source, filter, offset, env)
    }

    /// Move a chain's filter cutoff exponentially to `to`.
    pub fn sweep_filter(&mut self, chain: Chain, from: f64, to: f64, offset: f64, duration: f64) {
        let at = self.start + offset;
        if let Some(freq) = chain.filter.and_then(|f| self.ctx.param_mut(f, ParamKind::Frequency)) {
            glide(freq, from, to, at, duration);
        }
    }

    /// A source that runs until stopped from outside, at a flat `level`
    /// after a short fade-in.
    pub fn looping(&mut self, source: NodeId, filter: Option<FilterSpec>, level: f64) -> Chain {
        let gain = self.ctx.create_gain(0.0);
        let at = self.start;
        if let Some(param) = self.ctx.param_mut(gain, ParamKind::Gain) {
            param.set_value_at_time(0.0, at);
            param.linear_ramp_to_value_at_time(level.max(SILENCE_FLOOR), at + 0.05);
        }
        let filter = self.route(source, filter, gain);
        self.ctx.start(source, at);
        self.sources.push(source);
        Chain { source, filter, gain }
    }

    pub fn loop_buffer(
        &mut self,
        buffer: SampleBuffer,
        filter: Option<FilterSpec>,
        level: f64,
    ) -> Chain {
        let source = self.ctx.create_buffer_source(Arc::new(buffer), true);
        self.looping(source, filter, level)
    }

    pub fn loop_tone(
        &mut self,
        waveform: Waveform,
        frequency: f64,
        filter: Option<FilterSpec>,
        level: f64,
    ) -> Chain {
        let source = self.ctx.create_oscillator(waveform, frequency);
        self.looping(source, filter, level)
    }

    fn route(
        &mut self,
        source: NodeId,
        filter: Option<FilterSpec>,
        gain: NodeId,
    ) -> Option<NodeId> {
        let filter = filter.map(|spec| {
            let id = self.ctx.create_filter(spec.kind, spec.frequency, spec.q);
            self.ctx.connect(source, id);
            self.ctx.connect(id, gain);
            id
        });
        if filter.is_none() {
            self.ctx.connect(source, gain);
        }
        self.ctx.connect(gain, self.out);
        filter
    }

    fn finish_chain(
        &mut self,
        source: NodeId,
        filter: Option<FilterSpec>,
        offset: f64,
        env: Envelope,
    ) -> Chain {
        let at = self.start + offset.max(0.0);
        let gain = self.ctx.create_gain(0.0);
        let end = match self.ctx.param_mut(gain, ParamKind::Gain) {
            Some(param) => env.apply(param, at),
            None => at + env.duration(),
        };
        let filter = self.route(source, filter, gain);
        self.ctx.start(source, at);
        self.ctx.stop(source, end + TAIL);
        self.sources.push(source);
        Chain { source, filter, gain }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::dsp::noise::seeded;

    pub(crate) fn build(synth: SynthType, volume: f64) -> (AudioContext, NodeId, Vec<NodeId>) {
        let mut ctx = AudioContext::new(16000.0, 128);
        let out = ctx.create_gain(1.0);
        ctx.connect(out, ctx.destination());
        let mut rng = seeded(1);
        let sources = generate(synth, &mut ctx, out, 0.0, volume, &mut rng);
        (ctx, out, sources)
    }

    /// Render until every source has ended or `limit` seconds pass.
    pub(crate) fn render_until_quiet(ctx: &mut AudioContext, limit: f64) -> (Vec<f64>, bool) {
        let mut all = Vec::new();
        while ctx.current_time() < limit {
            all.extend(ctx.render_block(128));
            if ctx.created_sources() > 0 && ctx.node_count() <= 2 {
                return (all, true);
            }
        }
        (all, false)
    }

    #[test]
    fn names_round_trip_through_from_str() {
        for synth in SynthType::ALL {
            assert_eq!(synth.name().parse::<SynthType>().unwrap(), synth);
        }
        assert!("kazoo".parse::<SynthType>().is_err());
    }

    #[test]
    fn serde_uses_camel_case_names() {
        let json = serde_json::to_string(&SynthType::LeverPull).unwrap();
        assert_eq!(json, "\"leverPull\"");
        let parsed: SynthType = serde_json::from_str("\"cyberWow\"").unwrap();
        assert_eq!(parsed, SynthType::CyberWow);
    }

    #[test]
    fn routing() {
        assert_eq!(SynthType::Tick.bus(), BusId::Ui);
        assert_eq!(SynthType::UiClose.bus(), BusId::Ui);
        assert_eq!(SynthType::Jackpot.bus(), BusId::Sfx);
        assert_eq!(SynthType::Footstep.bus(), BusId::Spatial);
        let looping: Vec<_> = SynthType::ALL.into_iter().filter(SynthType::is_looping).collect();
        assert_eq!(looping, [SynthType::SpinMech, SynthType::ReelSpin]);
    }

    #[test]
    fn one_shots_are_audible_and_end_on_their_own() {
        for synth in SynthType::ALL.into_iter().filter(|s| !s.is_looping()) {
            let (mut ctx, _, sources) = build(synth, 0.8);
            assert!(!sources.is_empty(), "{synth} built nothing");
            let (audio, ended) = render_until_quiet(&mut ctx, 4.0);
            assert!(ended, "{synth} never finished");
            let peak = audio.iter().fold(0.0f64, |m, s| m.max(s.abs()));
            assert!(peak > 0.01, "{synth} silent, peak {peak}");
            assert!(audio.iter().all(|s| s.is_finite()), "{synth} produced NaN");
        }
    }

    #[test]
    fn zero_volume_is_silent_but_valid() {
        let (mut ctx, _, _) = build(SynthType::Win, 0.0);
        let (audio, ended) = render_until_quiet(&mut ctx, 3.0);
        assert!(ended);
        assert!(audio.iter().all(|s| s.abs() < 0.01));
    }

    #[test]
    fn loops_keep_running_until_stopped() {
        for synth in [SynthType::SpinMech, SynthType::ReelSpin] {
            let (mut ctx, _, sources) = build(synth, 0.8);
            let (audio, ended) = render_until_quiet(&mut ctx, 2.0);
            assert!(!ended, "{synth} stopped by itself");
            assert!(audio[16000..].iter().any(|s| s.abs() > 0.005));
            let now = ctx.current_time();
            for s in sources {
                ctx.stop(s, now);
            }
            ctx.render_block(128);
            assert!(ctx.node_count() <= 2);
        }
    }
}
