//! Audio context: sample clock, node arena, block renderer.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use crate::config::AnalyserConfig;
use crate::dsp::analyser::Analyser;
use crate::dsp::filter::{BiquadFilter, FilterType};
use crate::dsp::mixer::{write_interleaved, Mixer};
use crate::dsp::oscillator::{Oscillator, Waveform};
use crate::dsp::sampler::SampleBuffer;

use super::node::{buffer_node, Node, NodeId, NodeKind, ParamKind, Schedule};
use super::param::AudioParam;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Running,
    Suspended,
    Closed,
}

pub struct AudioContext {
    sample_rate: f64,
    block_size: usize,
    frames: u64,
    state: ContextState,
    nodes: BTreeMap<NodeId, Node>,
    next_id: u64,
    destination: NodeId,
    ended: Vec<NodeId>,
    created_sources: usize,
    mixer: Mixer,
    /// Processing order, rebuilt only after the topology changes.
    order: Vec<NodeId>,
    slots: HashMap<NodeId, usize>,
    /// Per-node output blocks, indexed like `order` and reused across blocks.
    outputs: Vec<Vec<f64>>,
    order_dirty: bool,
    removed_since_gc: bool,
}

impl AudioContext {
    pub fn new(sample_rate: f64, block_size: usize) -> Self {
        let mut ctx = AudioContext {
            sample_rate,
            block_size: block_size.max(1),
            frames: 0,
            state: ContextState::Running,
            nodes: BTreeMap::new(),
            next_id: 0,
            destination: NodeId(0),
            ended: Vec::new(),
            created_sources: 0,
            mixer: Mixer::new(),
            order: Vec::new(),
            slots: HashMap::new(),
            outputs: Vec::new(),
            order_dirty: true,
            removed_since_gc: false,
        };
        let mut dest = Node::new(NodeKind::Destination);
        dest.persistent = true;
        ctx.destination = ctx.insert(dest);
        ctx
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Seconds of audio rendered so far.
    pub fn current_time(&self) -> f64 {
        self.frames as f64 / self.sample_rate
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    pub fn destination(&self) -> NodeId {
        self.destination
    }

    pub fn suspend(&mut self) {
        if self.state == ContextState::Running {
            self.state = ContextState::Suspended;
        }
    }

    pub fn resume(&mut self) {
        if self.state == ContextState::Suspended {
            self.state = ContextState::Running;
        }
    }

    /// Terminal: drops every node.
    pub fn close(&mut self) {
        self.state = ContextState::Closed;
        self.nodes.retain(|id, _| *id == self.destination);
        self.ended.clear();
        self.order_dirty = true;
    }

    fn insert(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        if node.is_source() {
            self.created_sources += 1;
        }
        self.nodes.insert(id, node);
        self.order_dirty = true;
        id
    }

    pub fn create_gain(&mut self, value: f64) -> NodeId {
        self.insert(Node::new(NodeKind::Gain { gain: AudioParam::new(value) }))
    }

    pub fn create_filter(&mut self, filter_type: FilterType, frequency: f64, q: f64) -> NodeId {
        self.insert(Node::new(NodeKind::Filter {
            filter: BiquadFilter::new(filter_type, self.sample_rate),
            frequency: AudioParam::new(frequency),
            q: AudioParam::new(q),
        }))
    }

    pub fn create_oscillator(&mut self, waveform: Waveform, frequency: f64) -> NodeId {
        self.insert(Node::new(NodeKind::Oscillator {
            osc: Oscillator::new(waveform, self.sample_rate),
            frequency: AudioParam::new(frequency),
            schedule: Schedule::default(),
        }))
    }

    pub fn create_buffer_source(&mut self, buffer: Arc<SampleBuffer>, looping: bool) -> NodeId {
        self.insert(Node::new(buffer_node(buffer, looping, self.sample_rate)))
    }

    pub fn create_analyser(&mut self, config: AnalyserConfig) -> NodeId {
        self.insert(Node::new(NodeKind::Analyser(Box::new(Analyser::new(config)))))
    }

    /// Exempt a node from orphan collection.
    pub fn set_persistent(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.persistent = true;
        }
    }

    /// Route `from`'s output into `to`. Unknown ids are ignored.
    pub fn connect(&mut self, from: NodeId, to: NodeId) {
        if from == to || !self.nodes.contains_key(&from) {
            return;
        }
        if let Some(node) = self.nodes.get_mut(&to) {
            if !node.inputs.contains(&from) {
                node.inputs.push(from);
                self.order_dirty = true;
            }
            node.had_inputs = true;
        }
    }

    /// Remove a node and every connection to it. Idempotent.
    pub fn remove(&mut self, id: NodeId) {
        self.remove_all(&[id]);
    }

    /// Remove several nodes with a single pass over the remaining inputs.
    pub fn remove_all(&mut self, ids: &[NodeId]) {
        let mut removed = false;
        for id in ids {
            if *id != self.destination && self.nodes.remove(id).is_some() {
                removed = true;
            }
        }
        if !removed {
            return;
        }
        for node in self.nodes.values_mut() {
            node.inputs.retain(|input| !ids.contains(input));
        }
        self.order_dirty = true;
        self.removed_since_gc = true;
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Total source nodes ever created by this context.
    pub fn created_sources(&self) -> usize {
        self.created_sources
    }

    pub fn start(&mut self, id: NodeId, time: f64) {
        if let Some(schedule) = self.nodes.get_mut(&id).and_then(Node::schedule_mut) {
            schedule.start = time;
        }
    }

    pub fn stop(&mut self, id: NodeId, time: f64) {
        if let Some(schedule) = self.nodes.get_mut(&id).and_then(Node::schedule_mut) {
            schedule.stop = schedule.stop.min(time);
        }
    }

    pub fn param_mut(&mut self, id: NodeId, kind: ParamKind) -> Option<&mut AudioParam> {
        self.nodes.get_mut(&id).and_then(|n| n.param_mut(kind))
    }

    pub fn param(&self, id: NodeId, kind: ParamKind) -> Option<&AudioParam> {
        self.nodes.get(&id).and_then(|n| n.param(kind))
    }

    pub fn analyser_mut(&mut self, id: NodeId) -> Option<&mut Analyser> {
        match self.nodes.get_mut(&id).map(|n| &mut n.kind) {
            Some(NodeKind::Analyser(analyser)) => Some(analyser.as_mut()),
            _ => None,
        }
    }

    /// Sources that ended (and were removed) since the last call.
    pub fn take_ended(&mut self) -> Vec<NodeId> {
        std::mem::take(&mut self.ended)
    }

    /// Render interleaved output. Suspended/closed contexts write silence
    /// and do not advance the clock.
    pub fn render(&mut self, out: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        let block_samples = self.block_size * channels;
        for chunk in out.chunks_mut(block_samples) {
            let frames = chunk.len() / channels;
            if self.process(frames) {
                write_interleaved(self.destination_block(), chunk, channels);
            } else {
                chunk.fill(0.0);
            }
        }
    }

    /// Render `frames` mono frames from the destination.
    pub fn render_block(&mut self, frames: usize) -> Vec<f64> {
        if self.process(frames) {
            self.destination_block().to_vec()
        } else {
            vec![0.0; frames]
        }
    }

    /// Output of the destination from the last processed block.
    fn destination_block(&self) -> &[f64] {
        match self.slots.get(&self.destination).and_then(|&slot| self.outputs.get(slot)) {
            Some(block) => block.as_slice(),
            None => &[],
        }
    }

    /// Run every node for one block. False (and no clock advance) unless
    /// the context is running.
    fn process(&mut self, frames: usize) -> bool {
        if self.state != ContextState::Running || frames == 0 {
            return false;
        }
        if self.order_dirty {
            self.rebuild_order();
        }

        let t0 = self.current_time();
        let dt = 1.0 / self.sample_rate;
        let first_ended = self.ended.len();

        let AudioContext {
            nodes,
            mixer,
            order,
            slots,
            outputs,
            ended,
            ..
        } = self;
        for (position, id) in order.iter().enumerate() {
            let (done, rest) = outputs.split_at_mut(position);
            let out = &mut rest[0];
            out.clear();
            out.resize(frames, 0.0);
            let Some(node) = nodes.get_mut(id) else { continue };
            mixer.clear(frames);
            // inputs later in the order only exist on cycles; they are skipped
            for input in &node.inputs {
                if let Some(block) = slots.get(input).and_then(|&slot| done.get(slot)) {
                    mixer.add_block(block);
                }
            }
            if node.process_block(mixer.as_slice(), out, t0, dt) {
                ended.push(*id);
            }
        }

        self.frames += frames as u64;
        let now = self.current_time();
        for node in self.nodes.values_mut() {
            node.prune_params(now);
        }
        if self.ended.len() > first_ended {
            let finished = self.ended[first_ended..].to_vec();
            self.remove_all(&finished);
        }
        if self.removed_since_gc {
            self.collect_orphans();
        }
        true
    }

    fn rebuild_order(&mut self) {
        self.order = self.processing_order();
        self.slots = self.order.iter().enumerate().map(|(slot, &id)| (id, slot)).collect();
        self.outputs.resize_with(self.order.len(), Vec::new);
        self.order_dirty = false;
    }

    /// Every node, inputs before consumers. Cycles are broken arbitrarily.
    fn processing_order(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut visited = HashSet::with_capacity(self.nodes.len());
        for &root in self.nodes.keys() {
            if visited.contains(&root) {
                continue;
            }
            // iterative post-order DFS over inputs
            let mut stack = vec![(root, false)];
            while let Some((id, expanded)) = stack.pop() {
                if expanded {
                    order.push(id);
                    continue;
                }
                if !visited.insert(id) {
                    continue;
                }
                stack.push((id, true));
                if let Some(node) = self.nodes.get(&id) {
                    for &input in node.inputs.iter().rev() {
                        if !visited.contains(&input) {
                            stack.push((input, false));
                        }
                    }
                }
            }
        }
        order
    }

    /// Drop non-persistent processing nodes that lost all their inputs,
    /// cascading downstream.
    fn collect_orphans(&mut self) {
        loop {
            let orphans: Vec<NodeId> = self
                .nodes
                .iter()
                .filter(|(_, n)| {
                    !n.persistent && !n.is_source() && n.had_inputs && n.inputs.is_empty()
                })
                .map(|(&id, _)| id)
                .collect();
            if orphans.is_empty() {
                break;
            }
            self.remove_all(&orphans);
        }
        self.removed_since_gc = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> AudioContext {
        AudioContext::new(8000.0, 128)
    }

    #[test]
    fn clock_advances_only_while_running() {
        let mut c = ctx();
        c.render_block(800);
        assert!((c.current_time() - 0.1).abs() < 1e-12);
        c.suspend();
        assert!(c.render_block(800).iter().all(|&s| s == 0.0));
        assert!((c.current_time() - 0.1).abs() < 1e-12);
        c.resume();
        c.render_block(800);
        assert!((c.current_time() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn oscillator_through_gain_reaches_destination() {
        let mut c = ctx();
        let osc = c.create_oscillator(Waveform::Sine, 440.0);
        let gain = c.create_gain(0.5);
        c.connect(osc, gain);
        c.connect(gain, c.destination());
        c.start(osc, 0.0);
        let out = c.render_block(256);
        let peak = out.iter().fold(0.0_f64, |m, s| m.max(s.abs()));
        assert!(peak > 0.4 && peak <= 0.5 + 1e-9, "peak {peak}");
    }

    #[test]
    fn ended_source_is_reported_and_chain_collected() {
        let mut c = ctx();
        let osc = c.create_oscillator(Waveform::Sine, 440.0);
        let filter = c.create_filter(FilterType::Lowpass, 1000.0, 1.0);
        let gain = c.create_gain(1.0);
        c.connect(osc, filter);
        c.connect(filter, gain);
        c.connect(gain, c.destination());
        c.start(osc, 0.0);
        c.stop(osc, 0.01);
        c.render_block(128);
        assert_eq!(c.take_ended(), vec![osc]);
        assert!(!c.contains(osc));
        assert!(!c.contains(filter));
        assert!(!c.contains(gain));
        assert!(c.take_ended().is_empty());
    }

    #[test]
    fn persistent_nodes_survive_orphaning() {
        let mut c = ctx();
        let bus = c.create_gain(1.0);
        c.set_persistent(bus);
        c.connect(bus, c.destination());
        let osc = c.create_oscillator(Waveform::Sine, 440.0);
        c.connect(osc, bus);
        c.start(osc, 0.0);
        c.stop(osc, 0.001);
        c.render_block(64);
        assert!(c.contains(bus));
    }

    #[test]
    fn fresh_gain_is_not_collected() {
        let mut c = ctx();
        let gain = c.create_gain(1.0);
        c.render_block(64);
        assert!(c.contains(gain));
    }

    #[test]
    fn unconnected_source_still_ends() {
        let mut c = ctx();
        let buf = Arc::new(SampleBuffer::new(vec![0.1; 10], 8000));
        let src = c.create_buffer_source(buf, false);
        c.start(src, 0.0);
        c.render_block(64);
        assert_eq!(c.take_ended(), vec![src]);
    }

    #[test]
    fn remove_is_idempotent() {
        let mut c = ctx();
        let gain = c.create_gain(1.0);
        c.remove(gain);
        c.remove(gain);
        c.remove(c.destination());
        assert!(c.contains(c.destination()));
    }

    #[test]
    fn render_interleaves_channels() {
        let mut c = ctx();
        let osc = c.create_oscillator(Waveform::Square, 200.0);
        c.connect(osc, c.destination());
        c.start(osc, 0.0);
        let mut out = vec![0.0_f32; 300 * 2];
        c.render(&mut out, 2);
        assert!(out.chunks(2).all(|f| f[0] == f[1]));
        assert!((c.current_time() - 300.0 / 8000.0).abs() < 1e-12);
    }

    #[test]
    fn order_is_cached_until_the_graph_changes() {
        let mut c = ctx();
        let osc = c.create_oscillator(Waveform::Sine, 440.0);
        c.connect(osc, c.destination());
        c.start(osc, 0.0);
        c.render_block(64);
        assert!(!c.order_dirty);
        let order = c.order.clone();
        c.render_block(64);
        assert_eq!(c.order, order);

        let gain = c.create_gain(0.5);
        assert!(c.order_dirty);
        c.connect(gain, c.destination());
        c.render_block(64);
        assert!(!c.order_dirty);
        assert_eq!(c.order.len(), 3);
        assert_eq!(c.outputs.len(), 3);
    }

    #[test]
    fn removing_a_node_mid_stream_keeps_rendering() {
        let mut c = ctx();
        let a = c.create_oscillator(Waveform::Sine, 440.0);
        let b = c.create_oscillator(Waveform::Sine, 660.0);
        let gain = c.create_gain(1.0);
        c.connect(a, gain);
        c.connect(b, gain);
        c.connect(gain, c.destination());
        c.start(a, 0.0);
        c.start(b, 0.0);
        c.render_block(128);
        c.remove_all(&[a, b]);
        assert!(c.render_block(128).iter().all(|&s| s == 0.0));
        // both inputs gone: the gain is collected with them
        assert!(!c.contains(gain));
        assert_eq!(c.node_count(), 1);
    }

    #[test]
    fn created_sources_counts_every_source() {
        let mut c = ctx();
        c.create_oscillator(Waveform::Sine, 1.0);
        c.create_gain(1.0);
        c.create_buffer_source(Arc::new(SampleBuffer::new(vec![0.0], 8000)), false);
        assert_eq!(c.created_sources(), 2);
    }
}
