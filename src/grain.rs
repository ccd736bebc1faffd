//! Enveloped playback grains which read from a shared [`CircularBuffer`].

use crate::{
    buffer::CircularBuffer,
    utils::{
        clamp_finite, dsp::envelope::AdEnvelope, ms_to_samples, semitones_to_speed,
        wrap_position,
    },
};

// -------------------------------------------------------------------------------------------------

pub mod pool;

pub use pool::{BusyVoices, GrainPool};

// -------------------------------------------------------------------------------------------------

/// Processing state of a [`Grain`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum GrainState {
    #[default]
    Idle,
    Playing,
}

// -------------------------------------------------------------------------------------------------

/// A single enveloped playback voice.
///
/// Grains read from a circular buffer at a start position with a playback rate given in
/// semitones. When the read position reaches the grain's end, it loops back to its start, so
/// the attack/decay envelope alone defines when a grain stops playing.
#[derive(Debug, Clone)]
pub struct Grain<const CHANNELS: usize> {
    state: GrainState,
    sample_rate: u32,
    frame_count: usize,
    start_position: f32,
    end_position_virtual: f32,
    end_position: f32,
    read_position: f32,
    rate_semitones: f32,
    speed: f32,
    duration_ms: f32,
    attack_fraction: f32,
    envelope: AdEnvelope,
}

impl<const CHANNELS: usize> Grain<CHANNELS> {
    /// Minimum length of the envelope's attack and decay segments.
    pub const MIN_SEGMENT_MS: f32 = 2.0;
    /// Minimum grain duration.
    pub const MIN_DURATION_MS: f32 = 2.0 * Self::MIN_SEGMENT_MS;

    /// Create a new idle grain which reads from buffers with `frame_count` frames.
    pub fn new(sample_rate: u32, frame_count: usize) -> Self {
        debug_assert!(frame_count > 0, "Need a non empty buffer");
        Self {
            state: GrainState::Idle,
            sample_rate,
            frame_count,
            start_position: 0.0,
            end_position_virtual: 0.0,
            end_position: 0.0,
            read_position: 0.0,
            rate_semitones: 0.0,
            speed: 1.0,
            duration_ms: Self::MIN_DURATION_MS,
            attack_fraction: 0.0,
            envelope: AdEnvelope::new(sample_rate),
        }
    }

    pub fn state(&self) -> GrainState {
        self.state
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.state == GrainState::Playing
    }

    pub fn start_position(&self) -> f32 {
        self.start_position
    }

    /// Unwrapped end position (start position plus duration in frames).
    pub fn end_position_virtual(&self) -> f32 {
        self.end_position_virtual
    }

    /// End position, wrapped into the buffer bounds.
    pub fn end_position(&self) -> f32 {
        self.end_position
    }

    pub fn read_position(&self) -> f32 {
        self.read_position
    }

    pub fn rate_semitones(&self) -> f32 {
        self.rate_semitones
    }

    pub fn duration_ms(&self) -> f32 {
        self.duration_ms
    }

    pub fn attack_fraction(&self) -> f32 {
        self.attack_fraction
    }

    /// Start playing from `start_position` with the given rate, duration and attack time
    /// (as fraction of the duration). Retriggers the grain when it is already playing.
    ///
    /// Invalid arguments fall back to safe values: start 0, rate 0, minimum duration.
    pub fn trigger(
        &mut self,
        start_position: f32,
        rate_semitones: f32,
        duration_ms: f32,
        attack_fraction: f32,
    ) {
        self.start_position = wrap_position(start_position, self.frame_count);
        self.rate_semitones = if rate_semitones.is_finite() {
            rate_semitones
        } else {
            0.0
        };
        self.speed = semitones_to_speed(self.rate_semitones);
        self.duration_ms = if duration_ms.is_finite() {
            duration_ms.max(Self::MIN_DURATION_MS)
        } else {
            Self::MIN_DURATION_MS
        };
        self.attack_fraction = clamp_finite(attack_fraction, 0.0, 1.0);

        self.end_position_virtual =
            self.start_position + ms_to_samples(self.duration_ms, self.sample_rate);
        self.end_position = wrap_position(self.end_position_virtual, self.frame_count);
        self.read_position = self.start_position;

        let attack_ms = (self.attack_fraction * self.duration_ms)
            .min(self.duration_ms - Self::MIN_SEGMENT_MS)
            .max(Self::MIN_SEGMENT_MS);
        let decay_ms = (self.duration_ms - attack_ms).max(Self::MIN_SEGMENT_MS);
        self.envelope.set_times(attack_ms, decay_ms);
        self.envelope.trigger();

        self.state = GrainState::Playing;
    }

    /// Stop playing immediately.
    pub fn reset(&mut self) {
        self.envelope.reset();
        self.state = GrainState::Idle;
    }

    /// Render a single frame from the given buffer. Idle grains render silence.
    pub fn process_frame(&mut self, buffer: &CircularBuffer<CHANNELS>) -> [f32; CHANNELS] {
        if self.state == GrainState::Idle {
            return [0.0; CHANNELS];
        }
        debug_assert_eq!(
            buffer.frame_count(),
            self.frame_count,
            "Buffer size changed while playing"
        );

        let envelope = self.envelope.process();
        let output = buffer.peek(self.read_position).map(|s| s * envelope);

        // loop back to start when passing the end position
        let distance_to_end =
            wrap_position(self.end_position - self.read_position, self.frame_count);
        if distance_to_end > 0.0 && distance_to_end <= self.speed {
            self.read_position = self.start_position;
        } else {
            self.read_position = wrap_position(self.read_position + self.speed, self.frame_count);
        }

        if !self.envelope.is_running() {
            self.state = GrainState::Idle;
        }
        output
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::assert_eq_with_epsilon;

    fn constant_buffer(frame_count: usize, value: f32) -> CircularBuffer<1> {
        let mut buffer = CircularBuffer::new(frame_count).unwrap();
        for index in 0..frame_count {
            buffer.set_frame(index, [value]);
        }
        buffer
    }

    #[test]
    fn lifecycle() {
        let buffer = constant_buffer(48000, 0.5);
        let mut grain = Grain::<1>::new(48000, buffer.frame_count());
        assert_eq!(grain.state(), GrainState::Idle);
        assert_eq!(grain.process_frame(&buffer), [0.0]);

        grain.trigger(1000.0, 0.0, 100.0, 0.1);
        assert!(grain.is_playing());
        assert_eq_with_epsilon!(grain.end_position(), 5800.0, 1e-2);

        let mut frames = 0;
        let mut peak = 0.0f32;
        while grain.is_playing() && frames < 48000 {
            peak = peak.max(grain.process_frame(&buffer)[0]);
            frames += 1;
        }
        assert!((4799..=4801).contains(&frames), "played {frames} frames");
        assert_eq_with_epsilon!(peak, 0.5, 1e-4);
        assert_eq!(grain.process_frame(&buffer), [0.0]);
    }

    #[test]
    fn playback_rate() {
        let mut buffer = CircularBuffer::<1>::new(1000).unwrap();
        for index in 0..1000 {
            buffer.set_frame(index, [index as f32 / 1000.0]);
        }
        let mut grain = Grain::<1>::new(1000, buffer.frame_count());
        grain.trigger(100.0, 12.0, 500.0, 0.5);
        grain.process_frame(&buffer);
        assert_eq_with_epsilon!(grain.read_position(), 102.0, 1e-4);
        grain.process_frame(&buffer);
        assert_eq_with_epsilon!(grain.read_position(), 104.0, 1e-4);

        grain.trigger(100.0, -12.0, 500.0, 0.5);
        grain.process_frame(&buffer);
        assert_eq_with_epsilon!(grain.read_position(), 100.5, 1e-4);
    }

    #[test]
    fn loops_at_end_position() {
        let buffer = constant_buffer(1000, 0.5);
        let mut grain = Grain::<1>::new(1000, buffer.frame_count());
        // 100 frames at double speed reach the end after 50 frames
        grain.trigger(950.0, 12.0, 100.0, 0.5);
        assert_eq_with_epsilon!(grain.end_position_virtual(), 1050.0, 1e-4);
        assert_eq_with_epsilon!(grain.end_position(), 50.0, 1e-4);
        for _ in 0..49 {
            grain.process_frame(&buffer);
        }
        assert_eq_with_epsilon!(grain.read_position(), 48.0, 1e-3);
        grain.process_frame(&buffer);
        assert_eq_with_epsilon!(grain.read_position(), 950.0, 1e-3);
        assert!(grain.is_playing());
    }

    #[test]
    fn safe_trigger_arguments() {
        let buffer = constant_buffer(100, 0.5);
        let mut grain = Grain::<1>::new(1000, buffer.frame_count());
        grain.trigger(f32::NAN, f32::INFINITY, -10.0, 5.0);
        assert_eq!(grain.start_position(), 0.0);
        assert_eq!(grain.rate_semitones(), 0.0);
        assert_eq!(grain.duration_ms(), Grain::<1>::MIN_DURATION_MS);
        assert_eq!(grain.attack_fraction(), 1.0);
        // 2ms attack + 2ms decay at 1kHz
        let frames = (0..10)
            .take_while(|_| {
                grain.process_frame(&buffer);
                grain.is_playing()
            })
            .count();
        assert_eq!(frames, 3);
        assert!(buffer.samples().iter().all(|s| *s == 0.5));

        grain.trigger(-10.0, 0.0, 100.0, 0.0);
        assert_eq!(grain.start_position(), 90.0);
        grain.reset();
        assert_eq!(grain.state(), GrainState::Idle);
    }
}
