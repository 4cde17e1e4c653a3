//! Graph node kinds and their per-block processing.

use std::sync::Arc;

use crate::dsp::analyser::Analyser;
use crate::dsp::filter::BiquadFilter;
use crate::dsp::oscillator::Oscillator;
use crate::dsp::sampler::{BufferVoice, SampleBuffer};

use super::param::AudioParam;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u64);

/// Which automatable parameter of a node to address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Gain,
    Frequency,
    Q,
    PlaybackRate,
}

/// Start/stop window of a source node, in context seconds.
#[derive(Debug, Clone, Copy)]
pub struct Schedule {
    pub start: f64,
    pub stop: f64,
    pub ended: bool,
}

impl Default for Schedule {
    fn default() -> Self {
        Schedule {
            start: f64::INFINITY,
            stop: f64::INFINITY,
            ended: false,
        }
    }
}

#[derive(Debug)]
pub enum NodeKind {
    Destination,
    Gain {
        gain: AudioParam,
    },
    Filter {
        filter: BiquadFilter,
        frequency: AudioParam,
        q: AudioParam,
    },
    Oscillator {
        osc: Oscillator,
        frequency: AudioParam,
        schedule: Schedule,
    },
    Buffer {
        voice: BufferVoice,
        playback_rate: AudioParam,
        schedule: Schedule,
    },
    /// Pass-through tap feeding a spectrum analyser.
    Analyser(Box<Analyser>),
}

#[derive(Debug)]
pub struct Node {
    pub kind: NodeKind,
    pub inputs: Vec<NodeId>,
    /// Persistent nodes (buses, destination) are never garbage collected.
    pub persistent: bool,
    /// Set once anything has been connected; orphan collection only applies
    /// to nodes that lost all of their inputs, not fresh ones.
    pub had_inputs: bool,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Node {
            kind,
            inputs: Vec::new(),
            persistent: false,
            had_inputs: false,
        }
    }

    pub fn is_source(&self) -> bool {
        matches!(self.kind, NodeKind::Oscillator { .. } | NodeKind::Buffer { .. })
    }

    pub fn schedule_mut(&mut self) -> Option<&mut Schedule> {
        match &mut self.kind {
            NodeKind::Oscillator { schedule, .. } | NodeKind::Buffer { schedule, .. } => {
                Some(schedule)
            }
            _ => None,
        }
    }

    pub fn param_mut(&mut self, kind: ParamKind) -> Option<&mut AudioParam> {
        match (&mut self.kind, kind) {
            (NodeKind::Gain { gain }, ParamKind::Gain) => Some(gain),
            (NodeKind::Filter { frequency, .. }, ParamKind::Frequency)
            | (NodeKind::Oscillator { frequency, .. }, ParamKind::Frequency) => Some(frequency),
            (NodeKind::Filter { q, .. }, ParamKind::Q) => Some(q),
            (NodeKind::Buffer { playback_rate, .. }, ParamKind::PlaybackRate) => {
                Some(playback_rate)
            }
            _ => None,
        }
    }

    pub fn param(&self, kind: ParamKind) -> Option<&AudioParam> {
        match (&self.kind, kind) {
            (NodeKind::Gain { gain }, ParamKind::Gain) => Some(gain),
            (NodeKind::Filter { frequency, .. }, ParamKind::Frequency)
            | (NodeKind::Oscillator { frequency, .. }, ParamKind::Frequency) => Some(frequency),
            (NodeKind::Filter { q, .. }, ParamKind::Q) => Some(q),
            (NodeKind::Buffer { playback_rate, .. }, ParamKind::PlaybackRate) => {
                Some(playback_rate)
            }
            _ => None,
        }
    }

    pub fn prune_params(&mut self, t: f64) {
        match &mut self.kind {
            NodeKind::Gain { gain } => gain.prune_before(t),
            NodeKind::Filter { frequency, q, .. } => {
                frequency.prune_before(t);
                q.prune_before(t);
            }
            NodeKind::Oscillator { frequency, .. } => frequency.prune_before(t),
            NodeKind::Buffer { playback_rate, .. } => playback_rate.prune_before(t),
            NodeKind::Destination | NodeKind::Analyser(_) => {}
        }
    }

    /// Render one block. `input` is the summed input, `t0` the context time
    /// of the first frame. Returns true if a source ended during this block.
    pub fn process_block(&mut self, input: &[f64], out: &mut [f64], t0: f64, dt: f64) -> bool {
        match &mut self.kind {
            NodeKind::Destination => {
                out.copy_from_slice(input);
                false
            }
            NodeKind::Gain { gain } => {
                for (i, (o, &x)) in out.iter_mut().zip(input).enumerate() {
                    *o = x * gain.value_at(t0 + i as f64 * dt);
                }
                false
            }
            NodeKind::Filter { filter, frequency, q } => {
                for (i, (o, &x)) in out.iter_mut().zip(input).enumerate() {
                    let t = t0 + i as f64 * dt;
                    filter.set_params(frequency.value_at(t), q.value_at(t));
                    *o = filter.process(x);
                }
                false
            }
            NodeKind::Analyser(analyser) => {
                out.copy_from_slice(input);
                analyser.push(input);
                false
            }
            NodeKind::Oscillator {
                osc,
                frequency,
                schedule,
            } => render_source(out, t0, dt, schedule, |t| {
                Some(osc.next_sample(frequency.value_at(t)))
            }),
            NodeKind::Buffer {
                voice,
                playback_rate,
                schedule,
            } => render_source(out, t0, dt, schedule, |t| {
                let s = voice.next_sample(playback_rate.value_at(t));
                if voice.is_finished() { None } else { Some(s) }
            }),
        }
    }
}

/// Shared start/stop handling for sources. `next` yields `None` once the
/// underlying generator has run out.
fn render_source(
    out: &mut [f64],
    t0: f64,
    dt: f64,
    schedule: &mut Schedule,
    mut next: impl FnMut(f64) -> Option<f64>,
) -> bool {
    if schedule.ended {
        out.fill(0.0);
        return false;
    }
    for (i, o) in out.iter_mut().enumerate() {
        let t = t0 + i as f64 * dt;
        if schedule.ended || t < schedule.start {
            *o = 0.0;
            continue;
        }
        if t >= schedule.stop {
            schedule.ended = true;
            *o = 0.0;
            continue;
        }
        match next(t) {
            Some(s) => *o = s,
            None => {
                schedule.ended = true;
                *o = 0.0;
            }
        }
    }
    schedule.ended
}

pub(crate) fn buffer_node(buffer: Arc<SampleBuffer>, looping: bool, sample_rate: f64) -> NodeKind {
    NodeKind::Buffer {
        voice: BufferVoice::new(buffer, looping, sample_rate),
        playback_rate: AudioParam::new(1.0),
        schedule: Schedule::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::oscillator::Waveform;

    #[test]
    fn source_silent_before_start_and_after_stop() {
        let mut node = Node::new(NodeKind::Oscillator {
            osc: Oscillator::new(Waveform::Square, 100.0),
            frequency: AudioParam::new(10.0),
            schedule: Schedule { start: 0.1, stop: 0.2, ended: false },
        });
        let mut out = vec![0.0; 30];
        let ended = node.process_block(&[0.0; 30], &mut out, 0.0, 0.01);
        assert!(ended);
        assert!(out[..10].iter().all(|&s| s == 0.0));
        assert!(out[10..20].iter().any(|&s| s != 0.0));
        assert!(out[20..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn unstarted_source_never_ends() {
        let buffer = Arc::new(SampleBuffer::new(vec![1.0; 4], 100));
        let mut node = Node::new(buffer_node(buffer, false, 100.0));
        let mut out = vec![0.0; 16];
        assert!(!node.process_block(&[0.0; 16], &mut out, 0.0, 0.01));
    }

    #[test]
    fn gain_scales_input() {
        let mut node = Node::new(NodeKind::Gain { gain: AudioParam::new(0.5) });
        let mut out = vec![0.0; 2];
        node.process_block(&[1.0, -2.0], &mut out, 0.0, 0.01);
        assert_eq!(out, vec![0.5, -1.0]);
    }

    #[test]
    fn param_lookup_matches_kind() {
        let mut node = Node::new(NodeKind::Gain { gain: AudioParam::new(1.0) });
        assert!(node.param_mut(ParamKind::Gain).is_some());
        assert!(node.param_mut(ParamKind::Frequency).is_none());
    }
}
