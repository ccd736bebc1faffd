//! Raised cosine punch-in/punch-out window for click free recording.

use std::f32::consts::PI;

use crate::utils::ms_to_samples;

// -------------------------------------------------------------------------------------------------

/// Processing state of a [`PunchWindow`].
#[derive(Debug, Default, Clone, Copy, PartialEq, strum::Display)]
pub enum WindowState {
    /// Fully closed: the window value is 0.
    #[default]
    Off,
    FadeIn,
    /// Fully open: the window value is 1.
    On,
    FadeOut,
}

// -------------------------------------------------------------------------------------------------

/// Gain window which fades between 0 and 1 with a raised cosine curve.
///
/// Fades always start from the window's current value, so reversing a running fade does not
/// jump. The window starts closed.
#[derive(Debug, Clone)]
pub struct PunchWindow {
    state: WindowState,
    fade_samples: u32,
    position: u32,
    from: f32,
    to: f32,
    value: f32,
}

impl PunchWindow {
    /// Create a new closed window with the given fade duration.
    pub fn new(sample_rate: u32, fade_duration_ms: f32) -> Self {
        let fade_samples = ms_to_samples(fade_duration_ms, sample_rate).round();
        let fade_samples = if fade_samples.is_finite() && fade_samples >= 1.0 {
            fade_samples as u32
        } else {
            1
        };
        Self {
            state: WindowState::Off,
            fade_samples,
            position: 0,
            from: 0.0,
            to: 0.0,
            value: 0.0,
        }
    }

    /// Current state.
    pub fn state(&self) -> WindowState {
        self.state
    }

    /// Current window value in range `[0, 1]`.
    pub fn value(&self) -> f32 {
        self.value
    }

    /// True when the window is fully closed.
    #[inline]
    pub fn is_off(&self) -> bool {
        self.state == WindowState::Off
    }

    /// True when the window is open or opening.
    #[inline]
    pub fn is_opening_or_open(&self) -> bool {
        matches!(self.state, WindowState::FadeIn | WindowState::On)
    }

    /// Start opening the window. Does nothing when the window already is open or opening.
    pub fn begin_fade_in(&mut self) {
        if !self.is_opening_or_open() {
            self.start(1.0, WindowState::FadeIn);
        }
    }

    /// Start closing the window. Does nothing when the window already is closed or closing.
    pub fn begin_fade_out(&mut self) {
        if self.is_opening_or_open() {
            self.start(0.0, WindowState::FadeOut);
        }
    }

    /// Advance the window by one sample frame and return its new value.
    pub fn process(&mut self) -> f32 {
        match self.state {
            WindowState::Off => self.value = 0.0,
            WindowState::On => self.value = 1.0,
            WindowState::FadeIn | WindowState::FadeOut => {
                self.position += 1;
                if self.position >= self.fade_samples {
                    self.value = self.to;
                    self.state = if self.to > 0.0 {
                        WindowState::On
                    } else {
                        WindowState::Off
                    };
                } else {
                    let phase = self.position as f32 / self.fade_samples as f32;
                    let curve = 0.5 - 0.5 * (PI * phase).cos();
                    self.value = self.from + (self.to - self.from) * curve;
                }
            }
        }
        self.value
    }

    fn start(&mut self, to: f32, state: WindowState) {
        self.from = self.value;
        self.to = to;
        self.position = 0;
        self.state = state;
    }
}

// -------------------------------------------------------------------------------------------------
