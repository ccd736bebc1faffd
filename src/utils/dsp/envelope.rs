//! Two segment linear attack/decay envelope for grains.

use crate::utils::ms_to_samples;

// -------------------------------------------------------------------------------------------------

/// Current processing stage in an [`AdEnvelope`].
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub enum AdStage {
    #[default]
    /// Before the attack and after the decay (zero volume).
    Idle,
    Attack,
    Decay,
}

// -------------------------------------------------------------------------------------------------

/// One shot envelope which ramps linearly from 0 to 1 in the attack stage and back to 0 in the
/// decay stage. Stage lengths are counted in sample frames.
#[derive(Debug, Clone)]
pub struct AdEnvelope {
    sample_rate: u32,
    attack_samples: u32,
    decay_samples: u32,
    stage: AdStage,
    position: u32,
    output: f32,
}

impl AdEnvelope {
    /// Create a new idle envelope with 1ms attack and decay times.
    pub fn new(sample_rate: u32) -> Self {
        debug_assert!(sample_rate > 0, "Invalid sample rate");
        let mut envelope = Self {
            sample_rate,
            attack_samples: 1,
            decay_samples: 1,
            stage: AdStage::Idle,
            position: 0,
            output: 0.0,
        };
        envelope.set_times(1.0, 1.0);
        envelope
    }

    /// Current stage.
    pub fn stage(&self) -> AdStage {
        self.stage
    }

    /// True while the envelope is in its attack or decay stage.
    #[inline]
    pub fn is_running(&self) -> bool {
        self.stage != AdStage::Idle
    }

    /// Last processed output value.
    pub fn output(&self) -> f32 {
        self.output
    }

    /// Set attack and decay times in milliseconds. Each stage lasts at least one sample frame.
    /// Applies to the next triggered run.
    pub fn set_times(&mut self, attack_ms: f32, decay_ms: f32) {
        self.attack_samples = Self::samples(attack_ms, self.sample_rate);
        self.decay_samples = Self::samples(decay_ms, self.sample_rate);
    }

    /// Start a new run from zero, restarting a running envelope.
    pub fn trigger(&mut self) {
        self.stage = AdStage::Attack;
        self.position = 0;
        self.output = 0.0;
    }

    /// Stop the envelope immediately.
    pub fn reset(&mut self) {
        self.stage = AdStage::Idle;
        self.position = 0;
        self.output = 0.0;
    }

    /// Advance the envelope by one sample frame and return its new value.
    pub fn process(&mut self) -> f32 {
        match self.stage {
            AdStage::Idle => {
                self.output = 0.0;
            }
            AdStage::Attack => {
                self.position += 1;
                self.output = self.position as f32 / self.attack_samples as f32;
                if self.position >= self.attack_samples {
                    self.stage = AdStage::Decay;
                    self.position = 0;
                }
            }
            AdStage::Decay => {
                self.position += 1;
                self.output = 1.0 - self.position as f32 / self.decay_samples as f32;
                if self.position >= self.decay_samples {
                    self.stage = AdStage::Idle;
                    self.position = 0;
                    self.output = 0.0;
                }
            }
        }
        self.output
    }

    fn samples(duration_ms: f32, sample_rate: u32) -> u32 {
        let samples = ms_to_samples(duration_ms, sample_rate).round();
        if samples.is_finite() && samples >= 1.0 {
            samples.min(u32::MAX as f32) as u32
        } else {
            1
        }
    }
}

// -------------------------------------------------------------------------------------------------
