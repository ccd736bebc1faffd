//! Free running trigger clock.

// -------------------------------------------------------------------------------------------------

/// Phase accumulator which emits a tick each time its phase completes a cycle.
#[derive(Debug, Clone)]
pub struct Metro {
    sample_rate: u32,
    phase: f64,
    phase_inc: f64,
}

impl Metro {
    pub fn new(sample_rate: u32, frequency: f64) -> Self {
        debug_assert!(sample_rate > 0, "Invalid sample rate");
        let mut metro = Self {
            sample_rate,
            phase: 0.0,
            phase_inc: 0.0,
        };
        metro.set_frequency(frequency);
        metro
    }

    /// Set a new tick frequency in Hz. Negative or non finite frequencies stop the clock.
    pub fn set_frequency(&mut self, frequency: f64) {
        self.phase_inc = if frequency.is_finite() && frequency > 0.0 {
            frequency / self.sample_rate as f64
        } else {
            0.0
        };
    }

    /// Current tick frequency in Hz.
    pub fn frequency(&self) -> f64 {
        self.phase_inc * self.sample_rate as f64
    }

    /// Restart the cycle from phase 0.
    pub fn reset(&mut self) {
        self.phase = 0.0;
    }

    /// Advance by one sample frame. Returns true when a cycle completed.
    pub fn process(&mut self) -> bool {
        self.phase += self.phase_inc;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
            true
        } else {
            false
        }
    }
}

// -------------------------------------------------------------------------------------------------
