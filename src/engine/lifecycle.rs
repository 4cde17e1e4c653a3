//! Engine lifecycle: Uninitialized → Ready ⇄ Suspended → Disposed.
//!
//! Mute lives here too because it gates playback the same way readiness
//! does: requests made while muted are queued, not dropped.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    Uninitialized,
    Ready,
    Suspended,
    Disposed,
}

#[derive(Debug)]
pub struct Lifecycle {
    state: EngineState,
    muted: bool,
    platform_failed: bool,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Lifecycle {
            state: EngineState::Uninitialized,
            muted: false,
            platform_failed: false,
        }
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Lifecycle::default()
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn is_disposed(&self) -> bool {
        self.state == EngineState::Disposed
    }

    /// Whether play requests start immediately.
    pub fn accepts_playback(&self) -> bool {
        self.state == EngineState::Ready && !self.muted
    }

    /// `init` only does work from a clean Uninitialized state.
    pub fn can_init(&self) -> bool {
        self.state == EngineState::Uninitialized && !self.platform_failed
    }

    /// Returns `true` when queued requests should now be flushed.
    pub fn init_succeeded(&mut self) -> bool {
        if self.state != EngineState::Uninitialized {
            return false;
        }
        self.state = EngineState::Ready;
        !self.muted
    }

    /// The platform refused; the engine stays silent for good.
    pub fn init_failed(&mut self) {
        self.platform_failed = true;
    }

    pub fn platform_failed(&self) -> bool {
        self.platform_failed
    }

    /// `true` if the state changed.
    pub fn suspend(&mut self) -> bool {
        if self.state == EngineState::Ready {
            self.state = EngineState::Suspended;
            true
        } else {
            false
        }
    }

    /// `true` if the state changed.
    pub fn resume(&mut self) -> bool {
        if self.state == EngineState::Suspended {
            self.state = EngineState::Ready;
            true
        } else {
            false
        }
    }

    /// Returns `true` when unmuting should flush queued requests.
    pub fn set_muted(&mut self, muted: bool) -> bool {
        let was = self.muted;
        self.muted = muted;
        was && !muted && self.state == EngineState::Ready
    }

    /// `false` if already disposed.
    pub fn dispose(&mut self) -> bool {
        if self.state == EngineState::Disposed {
            return false;
        }
        self.state = EngineState::Disposed;
        true
    }
}
