//! Sound descriptors and the id → descriptor registry.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::unit_level;
use crate::error::AudioError;

use super::bus::BusId;

/// Where a sample's bytes come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SampleRef {
    /// http(s) URL, `file://` URL, or plain filesystem path.
    External {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sha256: Option<String>,
    },
    /// Whole encoded file, base64.
    Inline { data: String },
}

impl SampleRef {
    pub fn url(url: impl Into<String>) -> Self {
        SampleRef::External {
            url: url.into(),
            sha256: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            SampleRef::External { url, .. } => url.trim().is_empty(),
            SampleRef::Inline { data } => data.is_empty(),
        }
    }

    /// Short label for log lines.
    pub fn describe(&self) -> String {
        match self {
            SampleRef::External { url, .. } => url.clone(),
            SampleRef::Inline { data } => format!("<inline {} bytes b64>", data.len()),
        }
    }
}

fn default_volume() -> f64 {
    1.0
}

fn default_bus() -> BusId {
    BusId::Sfx
}

/// How to play one registered sound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoundDescriptor {
    pub source: SampleRef,
    #[serde(default = "default_volume")]
    pub default_volume: f64,
    #[serde(default, rename = "loop")]
    pub looping: bool,
    #[serde(default = "default_bus")]
    pub bus: BusId,
}

impl SoundDescriptor {
    pub fn new(source: SampleRef, bus: BusId) -> Self {
        SoundDescriptor {
            source,
            default_volume: 1.0,
            looping: false,
            bus,
        }
    }

    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn volume(mut self, volume: f64) -> Self {
        self.default_volume = volume;
        self
    }
}

/// A sound table as shipped by the host, e.g. `{ "lounge": {...}, ... }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SoundTable(pub HashMap<String, SoundDescriptor>);

impl SoundTable {
    pub fn from_json(json: &str) -> Result<Self, AudioError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[derive(Debug, Default)]
pub struct SoundRegistry {
    sounds: HashMap<String, SoundDescriptor>,
}

/// Outcome of a registration, so the caller can invalidate cached audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Added,
    Replaced { source_changed: bool },
    Rejected,
}

impl SoundRegistry {
    pub fn new() -> Self {
        SoundRegistry::default()
    }

    /// Upsert; last write wins. Descriptors with an empty id or source are
    /// rejected. Volume is clamped into [0, 1]; NaN falls back to full volume.
    pub fn register(&mut self, id: &str, mut descriptor: SoundDescriptor) -> Registration {
        if id.is_empty() || descriptor.source.is_empty() {
            tracing::warn!(id, "rejecting sound with empty id or source");
            return Registration::Rejected;
        }
        descriptor.default_volume = unit_level(descriptor.default_volume).unwrap_or(1.0);
        match self.sounds.insert(id.to_string(), descriptor) {
            None => Registration::Added,
            Some(previous) => Registration::Replaced {
                source_changed: previous.source != self.sounds[id].source,
            },
        }
    }

    pub fn get(&self, id: &str) -> Option<&SoundDescriptor> {
        self.sounds.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sounds.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sounds.is_empty()
    }

    pub fn clear(&mut self) {
        self.sounds.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_write_wins() {
        let mut reg = SoundRegistry::new();
        let a = SoundDescriptor::new(SampleRef::url("a.mp3"), BusId::Sfx);
        let b = SoundDescriptor::new(SampleRef::url("b.mp3"), BusId::Ui);
        assert_eq!(reg.register("click", a), Registration::Added);
        assert_eq!(
            reg.register("click", b.clone()),
            Registration::Replaced { source_changed: true }
        );
        assert_eq!(reg.get("click"), Some(&b));
        assert_eq!(
            reg.register("click", b.volume(0.3)),
            Registration::Replaced { source_changed: false }
        );
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn rejects_empty_source_and_clamps_volume() {
        let mut reg = SoundRegistry::new();
        let empty = SoundDescriptor::new(SampleRef::url("  "), BusId::Sfx);
        assert_eq!(reg.register("x", empty), Registration::Rejected);
        let loud = SoundDescriptor::new(SampleRef::url("x.wav"), BusId::Sfx).volume(4.0);
        reg.register("x", loud);
        assert_eq!(reg.get("x").unwrap().default_volume, 1.0);
        let broken = SoundDescriptor::new(SampleRef::url("x.wav"), BusId::Sfx).volume(f64::NAN);
        reg.register("x", broken);
        assert_eq!(reg.get("x").unwrap().default_volume, 1.0);
    }

    #[test]
    fn table_from_json() {
        let table = SoundTable::from_json(
            r#"{
                "lounge": { "source": { "type": "external", "url": "/audio/lounge.mp3" },
                            "defaultVolume": 0.4, "loop": true, "bus": "music" },
                "chip": { "source": { "type": "inline", "data": "UklGRg==" } }
            }"#,
        )
        .unwrap();
        let lounge = &table.0["lounge"];
        assert!(lounge.looping);
        assert_eq!(lounge.bus, BusId::Music);
        assert_eq!(lounge.source, SampleRef::url("/audio/lounge.mp3"));
        let chip = &table.0["chip"];
        assert_eq!(chip.bus, BusId::Sfx);
        assert_eq!(chip.default_volume, 1.0);
        assert!(!chip.looping);
    }
}
