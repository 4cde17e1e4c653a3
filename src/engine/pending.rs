//! FIFO of play requests made while the engine could not start them.

use std::collections::VecDeque;

use crate::synth::SynthType;

use super::instance::PlayOptions;
use super::registry::SoundDescriptor;

#[derive(Debug, Clone)]
pub enum PendingRequest {
    Sample {
        sound_id: String,
        descriptor: SoundDescriptor,
        instance_id: String,
        options: PlayOptions,
    },
    Synth {
        synth: SynthType,
        volume: f64,
        instance_id: String,
    },
}

impl PendingRequest {
    pub fn instance_id(&self) -> &str {
        match self {
            PendingRequest::Sample { instance_id, .. }
            | PendingRequest::Synth { instance_id, .. } => instance_id,
        }
    }
}

/// Requests are replayed in arrival order, each exactly once.
#[derive(Debug, Default)]
pub struct PendingQueue {
    queue: VecDeque<PendingRequest>,
}

impl PendingQueue {
    pub fn new() -> Self {
        PendingQueue::default()
    }

    pub fn push(&mut self, request: PendingRequest) {
        tracing::debug!(instance = request.instance_id(), "queued until engine is ready");
        self.queue.push_back(request);
    }

    /// Empties the queue; anything queued while the result is being
    /// replayed lands in a fresh queue.
    pub fn drain(&mut self) -> Vec<PendingRequest> {
        self.queue.drain(..).collect()
    }

    /// Drop a queued request; `true` if one was removed.
    pub fn cancel(&mut self, instance_id: &str) -> bool {
        let before = self.queue.len();
        self.queue.retain(|r| r.instance_id() != instance_id);
        before != self.queue.len()
    }

    pub fn cancel_prefix(&mut self, prefix: &str) -> usize {
        let before = self.queue.len();
        self.queue.retain(|r| !r.instance_id().starts_with(prefix));
        before - self.queue.len()
    }

    pub fn cancel_synth(&mut self, synth: SynthType) -> usize {
        let before = self.queue.len();
        self.queue.retain(|r| {
            !matches!(r, PendingRequest::Synth { synth: queued, .. } if *queued == synth)
        });
        before - self.queue.len()
    }

    pub fn contains(&self, instance_id: &str) -> bool {
        self.queue.iter().any(|r| r.instance_id() == instance_id)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::bus::BusId;
    use crate::engine::registry::SampleRef;

    fn sample(id: &str) -> PendingRequest {
        PendingRequest::Sample {
            sound_id: "lounge".into(),
            descriptor: SoundDescriptor::new(SampleRef::url("lounge.wav"), BusId::Music),
            instance_id: id.into(),
            options: PlayOptions::default(),
        }
    }

    #[test]
    fn drains_in_order_once() {
        let mut q = PendingQueue::new();
        q.push(sample("lounge-1"));
        q.push(PendingRequest::Synth {
            synth: SynthType::Tick,
            volume: 0.5,
            instance_id: "tick-2".into(),
        });
        let ids: Vec<String> = q.drain().iter().map(|r| r.instance_id().to_string()).collect();
        assert_eq!(ids, ["lounge-1", "tick-2"]);
        assert!(q.drain().is_empty());
    }

    #[test]
    fn cancel_by_id_and_prefix() {
        let mut q = PendingQueue::new();
        q.push(sample("lounge-1"));
        q.push(sample("lounge-2"));
        q.push(sample("bar-3"));
        assert!(q.cancel("lounge-1"));
        assert!(!q.cancel("lounge-1"));
        assert_eq!(q.cancel_prefix("lounge"), 1);
        assert!(q.contains("bar-3"));
        assert_eq!(q.len(), 1);
    }
}
