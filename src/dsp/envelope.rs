//! Attack/decay envelopes written onto an `AudioParam`.

use crate::graph::param::AudioParam;

/// Exponential ramps cannot reach zero, so decays end here instead.
pub const SILENCE_FLOOR: f64 = 0.001;

/// Linear attack to `peak`, optional hold, then exponential decay to the
/// silence floor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    pub attack: f64,
    pub hold: f64,
    pub decay: f64,
    pub peak: f64,
}

impl Envelope {
    /// Percussive shape: near-instant attack, no hold.
    pub fn pluck(peak: f64, decay: f64) -> Self {
        Envelope {
            attack: 0.005,
            hold: 0.0,
            decay,
            peak,
        }
    }

    pub fn new(peak: f64, attack: f64, decay: f64) -> Self {
        Envelope {
            attack,
            hold: 0.0,
            decay,
            peak,
        }
    }

    pub fn with_hold(mut self, hold: f64) -> Self {
        self.hold = hold;
        self
    }

    /// Total time from `start` until the curve reaches the floor.
    pub fn duration(&self) -> f64 {
        self.attack + self.hold + self.decay
    }

    /// Schedule the shape on `param` starting at `start`; returns the end time.
    pub fn apply(&self, param: &mut AudioParam, start: f64) -> f64 {
        let peak = self.peak.max(SILENCE_FLOOR);
        if self.attack > 0.0 {
            param.set_value_at_time(0.0, start);
            param.linear_ramp_to_value_at_time(peak, start + self.attack);
        } else {
            param.set_value_at_time(peak, start);
        }
        let decay_start = start + self.attack + self.hold;
        if self.hold > 0.0 {
            param.set_value_at_time(peak, decay_start);
        }
        let end = decay_start + self.decay;
        param.exponential_ramp_to_value_at_time(SILENCE_FLOOR, end);
        end
    }
}

/// Exponential pitch glide from `from` to `to` Hz.
pub fn glide(param: &mut AudioParam, from: f64, to: f64, start: f64, duration: f64) {
    param.set_value_at_time(from, start);
    param.exponential_ramp_to_value_at_time(to, start + duration);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_reaches_peak_then_floor() {
        let mut gain = AudioParam::new(0.0);
        let env = Envelope::new(0.8, 0.01, 0.2);
        let end = env.apply(&mut gain, 1.0);
        assert!((end - 1.21).abs() < 1e-12);
        assert_eq!(gain.value_at(1.0), 0.0);
        assert!((gain.value_at(1.01) - 0.8).abs() < 1e-12);
        assert!((gain.value_at(end) - SILENCE_FLOOR).abs() < 1e-12);
        assert!(gain.value_at(1.1) < 0.8 && gain.value_at(1.1) > SILENCE_FLOOR);
    }

    #[test]
    fn hold_keeps_peak() {
        let mut gain = AudioParam::new(0.0);
        Envelope::new(0.5, 0.01, 0.1).with_hold(0.2).apply(&mut gain, 0.0);
        assert!((gain.value_at(0.15) - 0.5).abs() < 1e-12);
        assert!(gain.value_at(0.25) < 0.5);
    }

    #[test]
    fn zero_volume_never_targets_zero() {
        let mut gain = AudioParam::new(0.0);
        Envelope::pluck(0.0, 0.1).apply(&mut gain, 0.0);
        // decays from the floor, so the exponential segment is well defined
        assert!(gain.value_at(0.05) > 0.0);
    }

    #[test]
    fn glide_is_exponential() {
        let mut freq = AudioParam::new(440.0);
        glide(&mut freq, 100.0, 400.0, 0.0, 2.0);
        assert!((freq.value_at(1.0) - 200.0).abs() < 1e-9);
    }
}
