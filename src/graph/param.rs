//! Automatable parameter timeline (gain, frequency, Q).

/// One scheduled automation point. Ramps interpolate from the previous
/// point to this one.
#[derive(Debug, Clone, Copy, PartialEq)]
enum ParamEvent {
    Set { value: f64, time: f64 },
    Linear { value: f64, time: f64 },
    Exponential { value: f64, time: f64 },
}

impl ParamEvent {
    fn time(&self) -> f64 {
        match *self {
            ParamEvent::Set { time, .. }
            | ParamEvent::Linear { time, .. }
            | ParamEvent::Exponential { time, .. } => time,
        }
    }

    fn value(&self) -> f64 {
        match *self {
            ParamEvent::Set { value, .. }
            | ParamEvent::Linear { value, .. }
            | ParamEvent::Exponential { value, .. } => value,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AudioParam {
    default: f64,
    events: Vec<ParamEvent>,
}

impl AudioParam {
    pub fn new(value: f64) -> Self {
        AudioParam {
            default: value,
            events: Vec::new(),
        }
    }

    fn insert(&mut self, event: ParamEvent) {
        let idx = self.events.partition_point(|e| e.time() <= event.time());
        self.events.insert(idx, event);
    }

    pub fn set_value_at_time(&mut self, value: f64, time: f64) {
        self.insert(ParamEvent::Set { value, time });
    }

    pub fn linear_ramp_to_value_at_time(&mut self, value: f64, time: f64) {
        self.insert(ParamEvent::Linear { value, time });
    }

    /// Exponential ramp. Endpoints that are not both positive cannot be
    /// interpolated geometrically; the previous value is held until `time`.
    pub fn exponential_ramp_to_value_at_time(&mut self, value: f64, time: f64) {
        self.insert(ParamEvent::Exponential { value, time });
    }

    /// Drop every event at or after `time`.
    pub fn cancel_scheduled_values(&mut self, time: f64) {
        self.events.retain(|e| e.time() < time);
    }

    /// Freeze the curve at its value at `time` and drop everything later.
    pub fn cancel_and_hold_at_time(&mut self, time: f64) {
        let held = self.value_at(time);
        self.cancel_scheduled_values(time);
        self.set_value_at_time(held, time);
    }

    /// Value the curve settles at once every event has run.
    pub fn final_value(&self) -> f64 {
        self.events.last().map_or(self.default, ParamEvent::value)
    }

    pub fn value_at(&self, t: f64) -> f64 {
        let mut prev_value = self.default;
        let mut prev_time = 0.0;

        for event in &self.events {
            if event.time() <= t {
                prev_value = event.value();
                prev_time = event.time();
                continue;
            }
            return match *event {
                ParamEvent::Set { .. } => prev_value,
                ParamEvent::Linear { value, time } => {
                    let span = time - prev_time;
                    if span <= 0.0 {
                        value
                    } else {
                        prev_value + (value - prev_value) * ((t - prev_time) / span)
                    }
                }
                ParamEvent::Exponential { value, time } => {
                    let span = time - prev_time;
                    if prev_value <= 0.0 || value <= 0.0 || span <= 0.0 {
                        prev_value
                    } else {
                        prev_value * (value / prev_value).powf((t - prev_time) / span)
                    }
                }
            };
        }
        prev_value
    }

    /// Forget events that can no longer affect values at or after `t`,
    /// keeping the last elapsed point as the origin of any pending ramp.
    pub fn prune_before(&mut self, t: f64) {
        let elapsed = self.events.partition_point(|e| e.time() <= t);
        if elapsed > 1 {
            let keep_from = elapsed - 1;
            self.default = self.events[keep_from].value();
            self.events.drain(..keep_from);
        }
    }
}
