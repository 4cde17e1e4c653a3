//! Spectrum analyser with `AnalyserNode::getByteFrequencyData` semantics:
//! Blackman window, magnitude FFT, exponential smoothing over successive
//! snapshots, dB mapped linearly onto 0..=255.

use std::collections::VecDeque;
use std::f64::consts::PI;
use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::config::AnalyserConfig;

/// Number of low bins averaged by [`bass_level`].
pub const BASS_BINS: usize = 4;

pub struct Analyser {
    config: AnalyserConfig,
    history: VecDeque<f64>,
    smoothed: Vec<f64>,
    window: Vec<f64>,
    fft: Arc<dyn Fft<f64>>,
}

impl std::fmt::Debug for Analyser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyser").field("config", &self.config).finish_non_exhaustive()
    }
}

impl Analyser {
    pub fn new(config: AnalyserConfig) -> Self {
        let n = config.fft_size;
        let window = (0..n)
            .map(|i| {
                let x = i as f64 / n as f64;
                0.42 - 0.5 * (2.0 * PI * x).cos() + 0.08 * (4.0 * PI * x).cos()
            })
            .collect();
        Analyser {
            config,
            history: VecDeque::from(vec![0.0; n]),
            smoothed: vec![0.0; n / 2],
            window,
            fft: FftPlanner::new().plan_fft_forward(n),
        }
    }

    pub fn bin_count(&self) -> usize {
        self.config.fft_size / 2
    }

    /// Feed rendered samples; only the most recent `fft_size` are kept.
    pub fn push(&mut self, block: &[f64]) {
        for &s in block {
            if self.history.len() == self.config.fft_size {
                self.history.pop_front();
            }
            self.history.push_back(s);
        }
    }

    /// Take a smoothed spectrum snapshot as bytes.
    pub fn byte_frequency_data(&mut self) -> Vec<u8> {
        let n = self.config.fft_size;
        let mut spectrum: Vec<Complex<f64>> = self
            .history
            .iter()
            .zip(&self.window)
            .map(|(&s, &w)| Complex::new(s * w, 0.0))
            .collect();
        self.fft.process(&mut spectrum);

        let tau = self.config.smoothing;
        let range = self.config.max_db - self.config.min_db;
        self.smoothed
            .iter_mut()
            .zip(&spectrum)
            .map(|(prev, bin)| {
                let magnitude = bin.norm() / n as f64;
                *prev = tau * *prev + (1.0 - tau) * magnitude;
                let db = if *prev > 0.0 { 20.0 * prev.log10() } else { f64::NEG_INFINITY };
                let scaled = 255.0 * (db - self.config.min_db) / range;
                scaled.clamp(0.0, 255.0) as u8
            })
            .collect()
    }
}

/// Mean of the lowest bins normalised to [0, 1].
pub fn bass_level(frequency_data: &[u8]) -> f64 {
    let bins = &frequency_data[..frequency_data.len().min(BASS_BINS)];
    if bins.is_empty() {
        return 0.0;
    }
    let sum: f64 = bins.iter().map(|&b| b as f64).sum();
    (sum / bins.len() as f64 / 255.0).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AnalyserConfig {
        AnalyserConfig {
            smoothing: 0.0,
            ..AnalyserConfig::default()
        }
    }

    #[test]
    fn silence_is_all_zero() {
        let mut a = Analyser::new(config());
        a.push(&[0.0; 512]);
        let data = a.byte_frequency_data();
        assert_eq!(data.len(), 128);
        assert!(data.iter().all(|&b| b == 0));
    }

    #[test]
    fn low_tone_lights_low_bins() {
        let mut a = Analyser::new(config());
        // bin width at 8 kHz / 256 = 31.25 Hz; 62.5 Hz lands on bin 2
        let tone: Vec<f64> = (0..256)
            .map(|i| (2.0 * PI * 62.5 * i as f64 / 8000.0).sin())
            .collect();
        a.push(&tone);
        let data = a.byte_frequency_data();
        assert!(data[2] > 200, "bin 2 = {}", data[2]);
        assert!(data[100] < data[2] / 2);
        assert!(bass_level(&data) > 0.5);
    }

    #[test]
    fn smoothing_lags_changes() {
        let mut a = Analyser::new(AnalyserConfig::default());
        let tone: Vec<f64> = (0..256).map(|i| 0.001 * (2.0 * PI * i as f64 / 16.0).sin()).collect();
        a.push(&tone);
        let first = a.byte_frequency_data()[16];
        let second = a.byte_frequency_data()[16];
        assert!(second > first);
    }

    #[test]
    fn bass_level_bounds() {
        assert_eq!(bass_level(&[0; 128]), 0.0);
        assert_eq!(bass_level(&[255; 128]), 1.0);
        assert_eq!(bass_level(&[]), 0.0);
        assert!((bass_level(&[255, 0, 255, 0, 9, 9]) - 0.5).abs() < 1e-12);
    }
}
