//! Where rendered audio goes.
//!
//! Offline engines are pulled by the caller through `render`. With the
//! `device` feature the default output device pulls instead, from its own
//! callback thread.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::{EngineConfig, OutputMode};
use crate::error::AudioError;

use super::inner::EngineCore;

/// Output chosen at init time.
pub enum Backend {
    Offline,
    #[cfg(feature = "device")]
    Device(device::ActiveStream),
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Offline => f.write_str("Offline"),
            #[cfg(feature = "device")]
            Backend::Device(stream) => {
                write!(f, "Device({} Hz, {} ch)", stream.sample_rate, stream.channels)
            }
        }
    }
}

/// Open the configured output. Returns the backend and the sample rate the
/// graph has to run at.
pub fn open(
    config: &EngineConfig,
    core: &Arc<Mutex<EngineCore>>,
) -> Result<(Backend, f64), AudioError> {
    match config.output {
        OutputMode::Offline => Ok((Backend::Offline, f64::from(config.sample_rate))),
        OutputMode::Device => open_device(config, core),
    }
}

#[cfg(feature = "device")]
fn open_device(
    config: &EngineConfig,
    core: &Arc<Mutex<EngineCore>>,
) -> Result<(Backend, f64), AudioError> {
    let stream = device::build_output_stream(config.sample_rate, Arc::clone(core))?;
    let rate = f64::from(stream.sample_rate);
    Ok((Backend::Device(stream), rate))
}

#[cfg(not(feature = "device"))]
fn open_device(
    _config: &EngineConfig,
    _core: &Arc<Mutex<EngineCore>>,
) -> Result<(Backend, f64), AudioError> {
    Err(AudioError::Platform(
        "device output requested but built without the `device` feature".to_string(),
    ))
}

#[cfg(feature = "device")]
pub mod device {
    use std::sync::Arc;

    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use parking_lot::Mutex;

    use crate::engine::inner::EngineCore;
    use crate::error::AudioError;

    pub struct ActiveStream {
        // StreamInner sidesteps the !Send marker on cpal::Stream
        _stream: cpal::platform::StreamInner,
        pub sample_rate: u32,
        pub channels: usize,
    }

    fn platform(context: &str, err: impl std::fmt::Display) -> AudioError {
        AudioError::Platform(format!("{context}: {err}"))
    }

    pub fn build_output_stream(
        desired_rate: u32,
        core: Arc<Mutex<EngineCore>>,
    ) -> Result<ActiveStream, AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| AudioError::Platform("no output device available".to_string()))?;

        tracing::info!(
            device = %device.name().unwrap_or_else(|_| String::from("<no name>")),
            "selected audio device"
        );

        let supported = device
            .supported_output_configs()
            .map_err(|e| platform("querying configs", e))?
            .filter(|config| config.sample_format().is_float())
            .max_by(cpal::SupportedStreamConfigRange::cmp_default_heuristics)
            .ok_or_else(|| AudioError::Platform("no float output configuration".to_string()))?;

        let rate = desired_rate.clamp(supported.min_sample_rate().0, supported.max_sample_rate().0);
        let config: cpal::StreamConfig = supported.with_sample_rate(cpal::SampleRate(rate)).into();
        let channels = usize::from(config.channels);
        tracing::debug!(?config, "audio device config");

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    core.lock().render(data, channels);
                },
                |err| tracing::warn!("audio device error: {err}"),
                None,
            )
            .map_err(|e| platform("building stream", e))?;
        stream.play().map_err(|e| platform("starting stream", e))?;

        Ok(ActiveStream {
            _stream: stream.into_inner(),
            sample_rate: config.sample_rate.0,
            channels,
        })
    }
}
