//! Engine configuration, loadable from JSON.

use serde::{Deserialize, Serialize};

use crate::engine::bus::BusId;
use crate::error::AudioError;

/// Where rendered audio goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// The host pulls samples with `AudioEngine::render`.
    Offline,
    /// The default output device (requires the `device` feature).
    Device,
}

/// Spectrum analyser settings. Defaults match a browser `AnalyserNode`
/// configured with `fftSize = 256`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnalyserConfig {
    pub fft_size: usize,
    /// Smoothing time constant [0, 1).
    pub smoothing: f64,
    pub min_db: f64,
    pub max_db: f64,
}

impl Default for AnalyserConfig {
    fn default() -> Self {
        AnalyserConfig {
            fft_size: 256,
            smoothing: 0.8,
            min_db: -100.0,
            max_db: -30.0,
        }
    }
}

/// Starting gain of every bus.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusLevels {
    pub master: f64,
    pub music: f64,
    pub sfx: f64,
    pub ui: f64,
    pub spatial: f64,
}

impl Default for BusLevels {
    fn default() -> Self {
        BusLevels {
            master: 0.8,
            music: 0.6,
            sfx: 0.8,
            ui: 0.6,
            spatial: 0.8,
        }
    }
}

/// `value` clamped into [0, 1], infinities included. `None` for NaN, which
/// has no place on a gain timeline.
pub fn unit_level(value: f64) -> Option<f64> {
    (!value.is_nan()).then(|| value.clamp(0.0, 1.0))
}

/// A ramp or fade length usable on the render clock: finite and not
/// negative, else zero.
pub fn duration_or_zero(seconds: f64) -> f64 {
    if seconds.is_finite() { seconds.max(0.0) } else { 0.0 }
}

impl BusLevels {
    pub fn get(&self, bus: BusId) -> f64 {
        match bus {
            BusId::Master => self.master,
            BusId::Music => self.music,
            BusId::Sfx => self.sfx,
            BusId::Ui => self.ui,
            BusId::Spatial => self.spatial,
        }
    }

    /// Store a clamped level. NaN leaves the old level in place and
    /// returns false.
    pub fn set(&mut self, bus: BusId, value: f64) -> bool {
        let Some(level) = unit_level(value) else {
            return false;
        };
        let slot = match bus {
            BusId::Master => &mut self.master,
            BusId::Music => &mut self.music,
            BusId::Sfx => &mut self.sfx,
            BusId::Ui => &mut self.ui,
            BusId::Spatial => &mut self.spatial,
        };
        *slot = level;
        true
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub sample_rate: u32,
    /// Frames rendered per graph pass.
    pub block_size: usize,
    pub output: OutputMode,
    /// Default `set_volume` ramp in seconds.
    pub default_ramp: f64,
    /// Default `stop` fade in seconds.
    pub default_fade: f64,
    pub bus_levels: BusLevels,
    pub analyser: AnalyserConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            sample_rate: 48000,
            block_size: 128,
            output: OutputMode::Offline,
            default_ramp: 0.1,
            default_fade: 0.1,
            bus_levels: BusLevels::default(),
            analyser: AnalyserConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Headless config at the given rate.
    pub fn offline(sample_rate: u32) -> Self {
        EngineConfig {
            sample_rate,
            ..EngineConfig::default()
        }
    }

    /// Parse and validate a JSON config. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, AudioError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AudioError> {
        if self.sample_rate == 0 {
            return Err(AudioError::Config("sampleRate must be positive".into()));
        }
        if self.block_size == 0 {
            return Err(AudioError::Config("blockSize must be positive".into()));
        }
        let fft = self.analyser.fft_size;
        if !fft.is_power_of_two() || !(32..=32768).contains(&fft) {
            return Err(AudioError::Config(format!(
                "analyser.fftSize must be a power of two in 32..=32768, got {fft}"
            )));
        }
        if !(0.0..1.0).contains(&self.analyser.smoothing) {
            return Err(AudioError::Config("analyser.smoothing must be in [0, 1)".into()));
        }
        if let Some(bus) = BusId::ALL.into_iter().find(|&bus| self.bus_levels.get(bus).is_nan()) {
            return Err(AudioError::Config(format!("busLevels.{bus} is not a number")));
        }
        let durations = [("defaultRamp", self.default_ramp), ("defaultFade", self.default_fade)];
        for (name, seconds) in durations {
            if !seconds.is_finite() || seconds < 0.0 {
                return Err(AudioError::Config(format!(
                    "{name} must be a finite, non-negative duration"
                )));
            }
        }
        if self.analyser.min_db >= self.analyser.max_db {
            return Err(AudioError::Config("analyser.minDb must be below maxDb".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_gives_defaults() {
        let config = EngineConfig::from_json("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn partial_json_overrides() {
        let config = EngineConfig::from_json(
            r#"{ "sampleRate": 22050, "output": "offline", "busLevels": { "music": 0.3 } }"#,
        )
        .unwrap();
        assert_eq!(config.sample_rate, 22050);
        assert!((config.bus_levels.music - 0.3).abs() < 1e-12);
        assert!((config.bus_levels.master - 0.8).abs() < 1e-12);
    }

    #[test]
    fn rejects_bad_fft_size() {
        let err = EngineConfig::from_json(r#"{ "analyser": { "fftSize": 300 } }"#).unwrap_err();
        assert!(matches!(err, AudioError::Config(_)));
    }

    #[test]
    fn rejects_zero_sample_rate() {
        assert!(EngineConfig::from_json(r#"{ "sampleRate": 0 }"#).is_err());
    }

    #[test]
    fn bus_levels_clamp() {
        let mut levels = BusLevels::default();
        levels.set(BusId::Ui, 3.0);
        assert_eq!(levels.get(BusId::Ui), 1.0);
        levels.set(BusId::Ui, -1.0);
        assert_eq!(levels.get(BusId::Ui), 0.0);
        assert!(levels.set(BusId::Ui, f64::INFINITY));
        assert_eq!(levels.get(BusId::Ui), 1.0);
        assert!(!levels.set(BusId::Ui, f64::NAN));
        assert_eq!(levels.get(BusId::Ui), 1.0);
    }

    #[test]
    fn non_finite_levels_and_durations_are_defined() {
        assert_eq!(unit_level(f64::NEG_INFINITY), Some(0.0));
        assert_eq!(unit_level(0.25), Some(0.25));
        assert_eq!(unit_level(f64::NAN), None);
        assert_eq!(duration_or_zero(f64::INFINITY), 0.0);
        assert_eq!(duration_or_zero(f64::NAN), 0.0);
        assert_eq!(duration_or_zero(-1.0), 0.0);
        assert_eq!(duration_or_zero(0.3), 0.3);
    }

    #[test]
    fn rejects_nan_bus_level() {
        let mut config = EngineConfig::default();
        config.bus_levels.music = f64::NAN;
        assert!(matches!(config.validate(), Err(AudioError::Config(_))));
    }
}
