//! Biquad filter with WebAudio `BiquadFilterNode` coefficients.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterType {
    Lowpass,
    Highpass,
    Bandpass,
    Notch,
    Peaking,
}

/// Second-order IIR section, Direct Form II Transposed. Coefficients follow
/// the Audio EQ Cookbook and are recomputed only when frequency or Q move,
/// so sweeping filters pay per changed sample, static ones never.
#[derive(Debug, Clone)]
pub struct BiquadFilter {
    pub filter_type: FilterType,
    pub gain_db: f64,
    frequency: f64,
    q: f64,
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
    z1: f64,
    z2: f64,
    sample_rate: f64,
}

impl BiquadFilter {
    pub fn new(filter_type: FilterType, sample_rate: f64) -> Self {
        let mut f = BiquadFilter {
            filter_type,
            gain_db: 0.0,
            frequency: 350.0,
            q: 1.0,
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            z1: 0.0,
            z2: 0.0,
            sample_rate,
        };
        f.recompute();
        f
    }

    /// Update cutoff and Q; coefficients are only rebuilt if either changed.
    pub fn set_params(&mut self, frequency: f64, q: f64) {
        let nyquist = self.sample_rate / 2.0;
        let frequency = frequency.clamp(1.0, nyquist * 0.999);
        let q = q.max(1e-4);
        if frequency != self.frequency || q != self.q {
            self.frequency = frequency;
            self.q = q;
            self.recompute();
        }
    }

    fn recompute(&mut self) {
        let w0 = 2.0 * PI * self.frequency / self.sample_rate;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / (2.0 * self.q);

        let (b0, b1, b2, a0, a1, a2) = match self.filter_type {
            FilterType::Lowpass => {
                let b1 = 1.0 - cos_w0;
                (b1 / 2.0, b1, b1 / 2.0, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha)
            }
            FilterType::Highpass => {
                let b0 = (1.0 + cos_w0) / 2.0;
                (b0, -(1.0 + cos_w0), b0, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha)
            }
            FilterType::Bandpass => (alpha, 0.0, -alpha, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha),
            FilterType::Notch => (1.0, -2.0 * cos_w0, 1.0, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha),
            FilterType::Peaking => {
                let a = 10.0_f64.powf(self.gain_db / 40.0);
                (
                    1.0 + alpha * a,
                    -2.0 * cos_w0,
                    1.0 - alpha * a,
                    1.0 + alpha / a,
                    -2.0 * cos_w0,
                    1.0 - alpha / a,
                )
            }
        };

        self.b0 = b0 / a0;
        self.b1 = b1 / a0;
        self.b2 = b2 / a0;
        self.a1 = a1 / a0;
        self.a2 = a2 / a0;
    }

    pub fn process(&mut self, input: f64) -> f64 {
        let output = self.b0 * input + self.z1;
        self.z1 = self.b1 * input - self.a1 * output + self.z2;
        self.z2 = self.b2 * input - self.a2 * output;
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowpass_passes_dc() {
        let mut f = BiquadFilter::new(FilterType::Lowpass, 44100.0);
        f.set_params(5000.0, 0.707);
        let mut out = 0.0;
        for _ in 0..1000 {
            out = f.process(1.0);
        }
        assert!((out - 1.0).abs() < 0.001, "got {out}");
    }

    #[test]
    fn highpass_blocks_dc() {
        let mut f = BiquadFilter::new(FilterType::Highpass, 44100.0);
        f.set_params(1000.0, 0.707);
        let mut out = 1.0;
        for _ in 0..2000 {
            out = f.process(1.0);
        }
        assert!(out.abs() < 0.001, "got {out}");
    }

    #[test]
    fn lowpass_attenuates_high_freq() {
        let mut f = BiquadFilter::new(FilterType::Lowpass, 44100.0);
        f.set_params(200.0, 0.707);
        let mut max_out = 0.0_f64;
        for i in 0..4410 {
            let input = (2.0 * PI * 10000.0 * i as f64 / 44100.0).sin();
            let out = f.process(input);
            if i > 1000 {
                max_out = max_out.max(out.abs());
            }
        }
        assert!(max_out < 0.01, "amplitude {max_out}");
    }

    #[test]
    fn cutoff_above_nyquist_stays_finite() {
        let mut f = BiquadFilter::new(FilterType::Bandpass, 8000.0);
        f.set_params(20000.0, 8.0);
        for i in 0..5000 {
            let input = if i % 50 == 0 { 1.0 } else { 0.0 };
            assert!(f.process(input).is_finite());
        }
    }
}
