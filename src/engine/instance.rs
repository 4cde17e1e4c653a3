//! Playback instances and the table that tracks them.

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::graph::NodeId;
use crate::synth::SynthType;

/// Per-call playback options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayOptions {
    /// Caller-chosen instance id; generated when absent.
    pub instance_id: Option<String>,
    /// Multiplier on the descriptor's default volume.
    pub volume: Option<f64>,
    /// Linear fade-in on the instance gain, seconds.
    pub fade_in: Option<f64>,
}

impl PlayOptions {
    pub fn with_id(instance_id: impl Into<String>) -> Self {
        PlayOptions {
            instance_id: Some(instance_id.into()),
            ..PlayOptions::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceKind {
    Sample,
    Synth(SynthType),
}

#[derive(Debug, Clone)]
pub enum InstanceState {
    /// Waiting for a decode. The flag is raised by `stop` so the deferred
    /// start is suppressed.
    Loading { cancelled: Arc<AtomicBool> },
    Playing,
    /// Fading out; teardown is scheduled.
    Stopping,
}

#[derive(Debug, Clone)]
pub struct PlaybackInstance {
    pub id: String,
    pub sound_id: String,
    pub kind: InstanceKind,
    pub gain: Option<NodeId>,
    pub sources: Vec<NodeId>,
    pub start_time: f64,
    pub state: InstanceState,
}

impl PlaybackInstance {
    pub fn loading(id: String, sound_id: String, cancelled: Arc<AtomicBool>) -> Self {
        PlaybackInstance {
            id,
            sound_id,
            kind: InstanceKind::Sample,
            gain: None,
            sources: Vec::new(),
            start_time: 0.0,
            state: InstanceState::Loading { cancelled },
        }
    }

    pub fn playing(
        id: String,
        sound_id: String,
        kind: InstanceKind,
        gain: NodeId,
        sources: Vec<NodeId>,
        start_time: f64,
    ) -> Self {
        PlaybackInstance {
            id,
            sound_id,
            kind,
            gain: Some(gain),
            sources,
            start_time,
            state: InstanceState::Playing,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, InstanceState::Loading { .. })
    }
}

#[derive(Debug, Default)]
pub struct InstanceTable {
    instances: HashMap<String, PlaybackInstance>,
    by_source: HashMap<NodeId, String>,
    next_seq: u64,
}

impl InstanceTable {
    pub fn new() -> Self {
        InstanceTable::default()
    }

    /// `"<sound_id>-<n>"` with a monotonic `n`, unique for the engine's life.
    pub fn next_id(&mut self, sound_id: &str) -> String {
        self.next_seq += 1;
        format!("{sound_id}-{}", self.next_seq)
    }

    /// Insert or replace. A replaced instance's sources are unindexed and
    /// returned so the caller can tear them down.
    pub fn insert(&mut self, instance: PlaybackInstance) -> Option<PlaybackInstance> {
        let previous = self.remove(&instance.id);
        for &source in &instance.sources {
            self.by_source.insert(source, instance.id.clone());
        }
        self.instances.insert(instance.id.clone(), instance);
        previous
    }

    pub fn get(&self, id: &str) -> Option<&PlaybackInstance> {
        self.instances.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut PlaybackInstance> {
        self.instances.get_mut(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<PlaybackInstance> {
        let instance = self.instances.remove(id)?;
        for source in &instance.sources {
            self.by_source.remove(source);
        }
        Some(instance)
    }

    /// A source finished on its own. Returns the instance id if that was
    /// its last live source and the instance was removed.
    pub fn source_ended(&mut self, source: NodeId) -> Option<String> {
        let id = self.by_source.remove(&source)?;
        let instance = self.instances.get_mut(&id)?;
        instance.sources.retain(|&s| s != source);
        if instance.sources.is_empty() && !instance.is_loading() {
            self.instances.remove(&id);
            return Some(id);
        }
        None
    }

    pub fn ids_with_prefix(&self, prefix: &str) -> Vec<String> {
        let mut ids: Vec<String> = self
            .instances
            .keys()
            .filter(|id| id.starts_with(prefix))
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    pub fn any_with_prefix(&self, prefix: &str) -> bool {
        self.instances.keys().any(|id| id.starts_with(prefix))
    }

    pub fn ids_of_kind(&self, kind: InstanceKind) -> Vec<String> {
        self.instances.values().filter(|i| i.kind == kind).map(|i| i.id.clone()).collect()
    }

    pub fn ids(&self) -> Vec<String> {
        self.instances.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playing(table: &mut InstanceTable, id: &str, sources: &[u64]) {
        table.insert(PlaybackInstance::playing(
            id.to_string(),
            "snd".to_string(),
            InstanceKind::Sample,
            NodeId(1000),
            sources.iter().map(|&s| NodeId(s)).collect(),
            0.0,
        ));
    }

    #[test]
    fn ids_are_unique_and_prefixed() {
        let mut t = InstanceTable::new();
        let a = t.next_id("tick");
        let b = t.next_id("tick");
        assert_ne!(a, b);
        assert!(a.starts_with("tick-") && b.starts_with("tick-"));
    }

    #[test]
    fn prefix_queries() {
        let mut t = InstanceTable::new();
        playing(&mut t, "lounge-1", &[1]);
        playing(&mut t, "lounge-2", &[2]);
        playing(&mut t, "tick-3", &[3]);
        assert_eq!(t.ids_with_prefix("lounge"), vec!["lounge-1", "lounge-2"]);
        assert!(t.any_with_prefix("tick"));
        assert!(!t.any_with_prefix("jackpot"));
    }

    #[test]
    fn last_source_end_removes_instance() {
        let mut t = InstanceTable::new();
        playing(&mut t, "jackpot-1", &[1, 2]);
        assert_eq!(t.source_ended(NodeId(1)), None);
        assert!(t.get("jackpot-1").is_some());
        assert_eq!(t.source_ended(NodeId(2)), Some("jackpot-1".to_string()));
        assert!(t.is_empty());
        assert_eq!(t.source_ended(NodeId(2)), None);
    }

    #[test]
    fn removed_instance_ignores_late_source_end() {
        let mut t = InstanceTable::new();
        playing(&mut t, "a-1", &[7]);
        assert!(t.remove("a-1").is_some());
        assert!(t.remove("a-1").is_none());
        assert_eq!(t.source_ended(NodeId(7)), None);
    }
}
