//! Per sample ramped values, used to avoid zipper noise on gain changes.

use crate::utils::ms_to_samples;

// -------------------------------------------------------------------------------------------------

/// Linearly ramps towards a target value within a fixed number of sample frames.
#[derive(Debug, Clone)]
pub struct LinearSmoothedValue {
    current: f32,
    target: f32,
    current_step: f32,
    ramp_samples: u32,
    num_pending_steps: u32,
}

impl LinearSmoothedValue {
    /// Create a new, settled value which ramps over `ramp_ms` on target changes.
    pub fn new(value: f32, sample_rate: u32, ramp_ms: f32) -> Self {
        let ramp_samples = ms_to_samples(ramp_ms, sample_rate).round();
        let ramp_samples = if ramp_samples.is_finite() && ramp_samples >= 1.0 {
            ramp_samples.min(u32::MAX as f32) as u32
        } else {
            1
        };
        Self {
            current: value,
            target: value,
            current_step: 0.0,
            ramp_samples,
            num_pending_steps: 0,
        }
    }

    #[inline(always)]
    pub fn current(&self) -> f32 {
        self.current
    }

    #[inline(always)]
    pub fn target(&self) -> f32 {
        self.target
    }

    #[inline(always)]
    pub fn need_ramp(&self) -> bool {
        self.num_pending_steps > 0
    }

    /// Set current and target to the same value.
    pub fn init(&mut self, value: f32) {
        self.current = value;
        self.target = value;
        self.num_pending_steps = 0;
    }

    /// Set a new target value and start ramping from the current value.
    pub fn set_target(&mut self, target: f32) {
        self.target = target;
        if self.current == target {
            self.num_pending_steps = 0;
        } else {
            self.num_pending_steps = self.ramp_samples;
            self.current_step = (target - self.current) / self.ramp_samples as f32;
        }
    }

    /// Ramp, if needed, and return the current value.
    #[inline]
    pub fn next_value(&mut self) -> f32 {
        if self.num_pending_steps > 0 {
            self.current += self.current_step;
            self.num_pending_steps -= 1;
            if self.num_pending_steps == 0 {
                self.current = self.target;
            }
        }
        self.current
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::assert_eq_with_epsilon;

    #[test]
    fn linear_ramp() {
        let mut value = LinearSmoothedValue::new(1.0, 1000, 10.0);
        assert!(!value.need_ramp());
        assert_eq!(value.next_value(), 1.0);

        value.set_target(0.0);
        assert!(value.need_ramp());
        let ramp = (0..10).map(|_| value.next_value()).collect::<Vec<_>>();
        assert_eq_with_epsilon!(ramp[0], 0.9, 1e-6);
        assert_eq_with_epsilon!(ramp[4], 0.5, 1e-6);
        assert_eq!(ramp[9], 0.0);
        assert!(!value.need_ramp());
        assert_eq!(value.next_value(), 0.0);

        value.set_target(0.5);
        value.next_value();
        value.init(0.25);
        assert!(!value.need_ramp());
        assert_eq!(value.next_value(), 0.25);
    }
}
