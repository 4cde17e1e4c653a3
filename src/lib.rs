pub mod config;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod graph;
pub mod synth;

pub use crate::config::EngineConfig;
#[cfg(feature = "engine")]
pub use crate::engine::AudioEngine;
pub use crate::engine::{BusId, EngineState, PlayOptions, SampleRef, SoundDescriptor, SoundTable};
pub use crate::error::AudioError;
pub use crate::synth::SynthType;

use serde::Serialize;
use wasm_bindgen::prelude::*;

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// WASM-exposed: return the casino_audio version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

fn parse_synth(name: &str) -> Result<SynthType, JsValue> {
    name.parse::<SynthType>().map_err(|e| JsValue::from_str(&e))
}

/// WASM-exposed: render one synth effect to mono f32 samples, for
/// AudioWorklet playback.
#[wasm_bindgen]
pub fn render_synth_samples(
    name: &str,
    volume: f64,
    sample_rate: u32,
) -> Result<Vec<f32>, JsValue> {
    let synth = parse_synth(name)?;
    let samples = dsp::renderer::render_synth(synth, volume, sample_rate);
    Ok(samples.iter().map(|&s| s as f32).collect())
}

/// WASM-exposed: render one synth effect to a WAV byte array.
#[wasm_bindgen]
pub fn render_synth_wav(name: &str, volume: f64, sample_rate: u32) -> Result<Vec<u8>, JsValue> {
    let synth = parse_synth(name)?;
    Ok(dsp::renderer::render_synth_wav(synth, volume, sample_rate))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthInfo {
    pub name: &'static str,
    pub bus: BusId,
    pub looping: bool,
}

/// Every synth with its routed bus.
pub fn catalog() -> Vec<SynthInfo> {
    SynthType::ALL
        .into_iter()
        .map(|synth| SynthInfo {
            name: synth.name(),
            bus: synth.bus(),
            looping: synth.is_looping(),
        })
        .collect()
}

/// WASM-exposed: the synth catalog as an array of `{ name, bus, looping }`.
#[wasm_bindgen]
pub fn synth_catalog() -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(&catalog()).map_err(|e| JsValue::from_str(&format!("{e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_lists_every_synth_once() {
        let catalog = catalog();
        assert_eq!(catalog.len(), 25);
        let names: std::collections::HashSet<_> = catalog.iter().map(|s| s.name).collect();
        assert_eq!(names.len(), 25);
        assert!(catalog.iter().any(|s| s.name == "jackpot" && s.bus == BusId::Sfx));
    }

    #[test]
    fn catalog_serializes_camel_case() {
        let json = serde_json::to_value(catalog()).unwrap();
        assert_eq!(json[0]["name"], "tick");
        assert_eq!(json[0]["bus"], "ui");
        assert_eq!(json[0]["looping"], false);
    }

    #[test]
    fn render_samples_by_name() {
        let samples = render_synth_samples("tick", 0.5, 16000).unwrap();
        assert!(!samples.is_empty());
    }

    #[test]
    fn version_matches_manifest() {
        assert_eq!(core_version(), env!("CARGO_PKG_VERSION"));
    }
}
