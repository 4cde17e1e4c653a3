//! Bus topology: master ← {music, sfx, ui, spatial}, with rampable gains.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::{duration_or_zero, unit_level, AnalyserConfig, BusLevels};
use crate::graph::{AudioContext, NodeId, ParamKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusId {
    Master,
    Music,
    Sfx,
    Ui,
    Spatial,
}

impl BusId {
    pub const ALL: [BusId; 5] = [
        BusId::Master,
        BusId::Music,
        BusId::Sfx,
        BusId::Ui,
        BusId::Spatial,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BusId::Master => "master",
            BusId::Music => "music",
            BusId::Sfx => "sfx",
            BusId::Ui => "ui",
            BusId::Spatial => "spatial",
        }
    }
}

impl fmt::Display for BusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BusId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BusId::ALL
            .into_iter()
            .find(|bus| bus.as_str() == s)
            .ok_or_else(|| format!("unknown bus '{s}'"))
    }
}

/// Node ids of the fixed bus graph. Built once per engine and torn down
/// only with the whole context.
///
/// Mute is a separate gain stage between master and the destination, so
/// muting never touches the master level the user set.
#[derive(Debug, Clone)]
pub struct BusMixer {
    master: NodeId,
    music: NodeId,
    sfx: NodeId,
    ui: NodeId,
    spatial: NodeId,
    mute: NodeId,
    analyser: NodeId,
    muted: bool,
}

impl BusMixer {
    pub fn build(ctx: &mut AudioContext, levels: &BusLevels, analyser: AnalyserConfig) -> Self {
        let mut persistent_gain = |ctx: &mut AudioContext, value: f64| {
            let id = ctx.create_gain(unit_level(value).unwrap_or(0.0));
            ctx.set_persistent(id);
            id
        };

        let mute = persistent_gain(ctx, 1.0);
        let master = persistent_gain(ctx, levels.master);
        let music = persistent_gain(ctx, levels.music);
        let sfx = persistent_gain(ctx, levels.sfx);
        let ui = persistent_gain(ctx, levels.ui);
        let spatial = persistent_gain(ctx, levels.spatial);

        ctx.connect(mute, ctx.destination());
        ctx.connect(master, mute);
        for bus in [music, sfx, ui, spatial] {
            ctx.connect(bus, master);
        }

        // visualisation taps the music bus only
        let tap = ctx.create_analyser(analyser);
        ctx.set_persistent(tap);
        ctx.connect(music, tap);

        BusMixer {
            master,
            music,
            sfx,
            ui,
            spatial,
            mute,
            analyser: tap,
            muted: false,
        }
    }

    pub fn node(&self, bus: BusId) -> NodeId {
        match bus {
            BusId::Master => self.master,
            BusId::Music => self.music,
            BusId::Sfx => self.sfx,
            BusId::Ui => self.ui,
            BusId::Spatial => self.spatial,
        }
    }

    pub fn analyser(&self) -> NodeId {
        self.analyser
    }

    /// Clamp to [0, 1] and ramp linearly from the current value, replacing
    /// any ramp still pending on this bus. NaN is ignored.
    pub fn set_volume(&self, ctx: &mut AudioContext, bus: BusId, value: f64, ramp: f64) {
        let Some(target) = unit_level(value) else {
            tracing::warn!(%bus, "ignoring NaN volume");
            return;
        };
        let ramp = duration_or_zero(ramp);
        let now = ctx.current_time();
        let Some(gain) = ctx.param_mut(self.node(bus), ParamKind::Gain) else {
            return;
        };
        gain.cancel_and_hold_at_time(now);
        if ramp > 0.0 {
            gain.linear_ramp_to_value_at_time(target, now + ramp);
        } else {
            gain.set_value_at_time(target, now);
        }
    }

    /// Gain right now, mid-ramp included.
    pub fn volume(&self, ctx: &AudioContext, bus: BusId) -> f64 {
        ctx.param(self.node(bus), ParamKind::Gain)
            .map_or(0.0, |gain| gain.value_at(ctx.current_time()))
    }

    /// Gain once pending ramps complete.
    pub fn target_volume(&self, ctx: &AudioContext, bus: BusId) -> f64 {
        ctx.param(self.node(bus), ParamKind::Gain)
            .map_or(0.0, |gain| gain.final_value())
    }

    /// Instant, unramped silence (or restore) of the whole mix.
    pub fn set_muted(&mut self, ctx: &mut AudioContext, muted: bool) {
        self.muted = muted;
        let now = ctx.current_time();
        if let Some(gain) = ctx.param_mut(self.mute, ParamKind::Gain) {
            gain.cancel_scheduled_values(now);
            gain.set_value_at_time(if muted { 0.0 } else { 1.0 }, now);
        }
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }
}
