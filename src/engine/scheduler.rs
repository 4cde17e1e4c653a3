//! Deferred teardowns on the audio clock.
//!
//! A stop with a fade leaves the instance running until the fade has
//! finished; the scheduler remembers when each one is due. Keyed by
//! instance id, so rescheduling or a teardown that has already happened
//! some other way is harmless.

use std::collections::HashMap;

/// Grace period after a fade before nodes are released.
pub const TEARDOWN_SLACK: f64 = 0.05;

#[derive(Debug, Default)]
pub struct TeardownScheduler {
    due: HashMap<String, f64>,
}

impl TeardownScheduler {
    pub fn new() -> Self {
        TeardownScheduler::default()
    }

    /// Keeps the earlier time if the instance is already scheduled.
    pub fn schedule(&mut self, instance_id: &str, at: f64) {
        self.due
            .entry(instance_id.to_string())
            .and_modify(|t| *t = t.min(at))
            .or_insert(at);
    }

    pub fn cancel(&mut self, instance_id: &str) -> bool {
        self.due.remove(instance_id).is_some()
    }

    pub fn is_scheduled(&self, instance_id: &str) -> bool {
        self.due.contains_key(instance_id)
    }

    /// Remove and return everything due at or before `now`, earliest first.
    pub fn take_due(&mut self, now: f64) -> Vec<String> {
        let mut ready: Vec<(f64, String)> = self
            .due
            .iter()
            .filter(|&(_, &t)| t <= now)
            .map(|(id, &t)| (t, id.clone()))
            .collect();
        ready.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        for (_, id) in &ready {
            self.due.remove(id);
        }
        ready.into_iter().map(|(_, id)| id).collect()
    }

    pub fn len(&self) -> usize {
        self.due.len()
    }

    pub fn is_empty(&self) -> bool {
        self.due.is_empty()
    }

    pub fn clear(&mut self) {
        self.due.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn takes_only_due_entries_in_time_order() {
        let mut s = TeardownScheduler::new();
        s.schedule("b", 0.3);
        s.schedule("a", 0.2);
        s.schedule("c", 1.0);
        assert!(s.take_due(0.1).is_empty());
        assert_eq!(s.take_due(0.5), ["a", "b"]);
        assert_eq!(s.len(), 1);
        assert!(s.take_due(0.5).is_empty());
    }

    #[test]
    fn reschedule_keeps_earliest() {
        let mut s = TeardownScheduler::new();
        s.schedule("x", 1.0);
        s.schedule("x", 0.4);
        s.schedule("x", 2.0);
        assert!(s.take_due(0.39).is_empty());
        assert_eq!(s.take_due(0.4), ["x"]);
    }

    #[test]
    fn cancel_is_idempotent() {
        let mut s = TeardownScheduler::new();
        s.schedule("x", 1.0);
        assert!(s.cancel("x"));
        assert!(!s.cancel("x"));
        assert!(s.take_due(10.0).is_empty());
    }
}
