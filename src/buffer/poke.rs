use crate::{
    buffer::CircularBuffer,
    utils::{clamp_finite, wrap_position, zap_gremlins},
};

// -------------------------------------------------------------------------------------------------

/// Smallest denominator used when computing interpolation steps.
const MIN_STEP_DENOMINATOR: f32 = 1e-6;

// -------------------------------------------------------------------------------------------------

/// Writes into a [`CircularBuffer`] at fractional positions ("Ipoke").
///
/// When the write head moves less than a frame per call, all inputs which land on the same
/// frame get averaged. When the write head jumps over several frames, the skipped frames get
/// linearly interpolated between the last and the new input, walking along the shorter way
/// around the circular buffer. So recording at any rate never leaves holes in the buffer.
///
/// Frames are only written when the write head leaves them (or when writing stops), so the
/// frame at the current write position is pending until then.
///
/// Each write mixes the new value with the existing content, scaled by the writer's feedback
/// amount: `old * feedback + new`.
#[derive(Debug, Clone)]
pub struct FractionalWriter<const CHANNELS: usize> {
    last_index: Option<usize>,
    accumulated: [f32; CHANNELS],
    accumulation_count: u32,
    feedback: f32,
}

impl<const CHANNELS: usize> Default for FractionalWriter<CHANNELS> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const CHANNELS: usize> FractionalWriter<CHANNELS> {
    /// Create a new idle writer which overwrites existing content (feedback = 0).
    pub fn new() -> Self {
        Self {
            last_index: None,
            accumulated: [0.0; CHANNELS],
            accumulation_count: 0,
            feedback: 0.0,
        }
    }

    /// True while a write is in progress.
    pub fn is_writing(&self) -> bool {
        self.last_index.is_some()
    }

    /// Frame index of the pending (not yet written) write, if any.
    pub fn last_index(&self) -> Option<usize> {
        self.last_index
    }

    /// Amount of existing buffer content kept when writing.
    pub fn feedback(&self) -> f32 {
        self.feedback
    }

    /// Set amount of existing buffer content kept when writing, in range `[0, 1]`.
    pub fn set_feedback(&mut self, feedback: f32) {
        self.feedback = zap_gremlins(clamp_finite(feedback, 0.0, 1.0));
    }

    /// Drop the current write state without writing pending frames.
    pub fn reset(&mut self) {
        self.last_index = None;
        self.accumulated = [0.0; CHANNELS];
        self.accumulation_count = 0;
    }

    /// Write `input` at the given fractional frame position.
    ///
    /// Negative (or non finite) positions stop writing: the pending frame gets flushed and the
    /// write state is cleared.
    pub fn poke(
        &mut self,
        buffer: &mut CircularBuffer<CHANNELS>,
        position: f32,
        input: [f32; CHANNELS],
    ) {
        if !position.is_finite() || position < 0.0 {
            self.stop(buffer);
            return;
        }
        let input = input.map(zap_gremlins);
        let frame_count = buffer.frame_count();
        let index = (wrap_position(position, frame_count) as usize).min(frame_count - 1);
        match self.last_index {
            None => self.start(index, input),
            Some(last_index) if last_index == index => {
                for (a, i) in self.accumulated.iter_mut().zip(input) {
                    *a += i;
                }
                self.accumulation_count += 1;
            }
            Some(last_index) => {
                let average = self.average();
                self.write(buffer, last_index, &average);

                // take the shorter way around the buffer
                let frames = frame_count as isize;
                let mut step = index as isize - last_index as isize;
                if step > frames / 2 {
                    step -= frames;
                } else if step < -frames / 2 {
                    step += frames;
                }
                let distance = step.unsigned_abs();
                if distance > 1 {
                    let denominator = (distance as f32).max(MIN_STEP_DENOMINATOR);
                    let mut coefficients = [0.0; CHANNELS];
                    for ((c, i), a) in coefficients.iter_mut().zip(input).zip(average) {
                        *c = (i - a) / denominator;
                    }
                    let direction = step.signum();
                    let mut value = average;
                    let mut fill_index = last_index as isize;
                    for _ in 1..distance {
                        fill_index += direction;
                        for (v, c) in value.iter_mut().zip(coefficients) {
                            *v += c;
                        }
                        let wrapped_index = buffer.wrap_index(fill_index);
                        self.write(buffer, wrapped_index, &value);
                    }
                }
                self.start(index, input);
            }
        }
    }

    /// Flush the pending frame and stop writing.
    pub fn stop(&mut self, buffer: &mut CircularBuffer<CHANNELS>) {
        if let Some(last_index) = self.last_index {
            let average = self.average();
            self.write(buffer, last_index, &average);
        }
        self.reset();
    }

    fn start(&mut self, index: usize, input: [f32; CHANNELS]) {
        self.last_index = Some(index);
        self.accumulated = input;
        self.accumulation_count = 1;
    }

    fn average(&self) -> [f32; CHANNELS] {
        let count = self.accumulation_count.max(1) as f32;
        self.accumulated.map(|a| a / count)
    }

    fn write(&self, buffer: &mut CircularBuffer<CHANNELS>, index: usize, value: &[f32; CHANNELS]) {
        let mut frame = buffer.frame(index);
        for (f, v) in frame.iter_mut().zip(value) {
            *f = zap_gremlins(*f * self.feedback + v);
        }
        buffer.set_frame(index, frame);
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::assert_eq_with_epsilon;

    const SENTINEL: f32 = 9.0;

    fn buffer_with_sentinels<const CHANNELS: usize>(frames: usize) -> CircularBuffer<CHANNELS> {
        let mut buffer = CircularBuffer::new(frames).unwrap();
        for index in 0..frames {
            buffer.set_frame(index, [SENTINEL; CHANNELS]);
        }
        buffer
    }

    #[test]
    fn round_trip() {
        let mut buffer = CircularBuffer::<2>::new(16).unwrap();
        let mut writer = FractionalWriter::new();
        writer.poke(&mut buffer, 5.0, [0.7, -0.3]);
        assert!(writer.is_writing());
        assert_eq!(writer.last_index(), Some(5));
        // pending until the write head leaves the frame
        assert_eq!(buffer.frame(5), [0.0, 0.0]);
        writer.poke(&mut buffer, -1.0, [0.0, 0.0]);
        assert!(!writer.is_writing());
        assert_eq_with_epsilon!(buffer.peek(5.0)[0], 0.7, 1e-6);
        assert_eq_with_epsilon!(buffer.peek(5.0)[1], -0.3, 1e-6);
    }

    #[test]
    fn averaging() {
        let mut buffer = CircularBuffer::<1>::new(16).unwrap();
        let mut writer = FractionalWriter::new();
        writer.poke(&mut buffer, 3.0, [0.2]);
        writer.poke(&mut buffer, 3.3, [0.4]);
        writer.poke(&mut buffer, 3.6, [0.6]);
        writer.poke(&mut buffer, 4.0, [1.0]);
        assert_eq_with_epsilon!(buffer.frame(3)[0], 0.4, 1e-6);
        writer.stop(&mut buffer);
        assert_eq_with_epsilon!(buffer.frame(4)[0], 1.0, 1e-6);
    }

    #[test]
    fn feedback() {
        let mut buffer = CircularBuffer::<1>::new(8).unwrap();
        buffer.set_frame(3, [0.5]);
        let mut writer = FractionalWriter::new();
        writer.set_feedback(0.5);
        writer.poke(&mut buffer, 3.0, [0.2]);
        writer.stop(&mut buffer);
        assert_eq_with_epsilon!(buffer.frame(3)[0], 0.45, 1e-6);

        writer.set_feedback(2.0);
        assert_eq!(writer.feedback(), 1.0);
        writer.set_feedback(f32::NAN);
        assert_eq!(writer.feedback(), 0.0);
    }

    #[test]
    fn wraparound_without_gaps() {
        // unit rate
        let mut buffer = buffer_with_sentinels::<1>(100);
        let mut writer = FractionalWriter::new();
        for index in 0..250 {
            writer.poke(&mut buffer, index as f32, [index as f32 / 250.0]);
        }
        assert!(buffer.samples().iter().all(|s| *s != SENTINEL));
        // third pass overwrote the start of the buffer, second pass the end
        assert_eq_with_epsilon!(buffer.frame(10)[0], 210.0 / 250.0, 1e-6);
        assert_eq_with_epsilon!(buffer.frame(60)[0], 160.0 / 250.0, 1e-6);

        // faster than unit rate: skipped frames get filled
        let mut buffer = buffer_with_sentinels::<1>(100);
        let mut writer = FractionalWriter::new();
        for index in 0..250 {
            writer.poke(&mut buffer, index as f32 * 1.7, [0.5]);
        }
        assert!(buffer.samples().iter().all(|s| (*s - 0.5).abs() < 1e-5));
    }

    #[test]
    fn jumps_are_interpolated() {
        let mut buffer = CircularBuffer::<1>::new(100).unwrap();
        let mut writer = FractionalWriter::new();
        writer.poke(&mut buffer, 10.0, [0.0]);
        writer.poke(&mut buffer, 30.0, [1.0]);
        writer.stop(&mut buffer);
        let max_delta = 1.0 / 20.0;
        for index in 10..30 {
            let delta = (buffer.frame(index + 1)[0] - buffer.frame(index)[0]).abs();
            assert!(delta <= max_delta + 1e-5, "delta at {index} is {delta}");
        }
        assert_eq_with_epsilon!(buffer.frame(20)[0], 0.5, 1e-5);
        assert_eq_with_epsilon!(buffer.frame(30)[0], 1.0, 1e-6);

        // takes the shorter way around the buffer end
        let mut buffer = buffer_with_sentinels::<1>(100);
        let mut writer = FractionalWriter::new();
        writer.poke(&mut buffer, 95.0, [0.0]);
        writer.poke(&mut buffer, 5.0, [1.0]);
        writer.stop(&mut buffer);
        for index in (95..100).chain(0..=5) {
            assert_ne!(buffer.frame(index)[0], SENTINEL, "frame {index} not written");
        }
        assert_eq!(buffer.frame(50)[0], SENTINEL);
        assert_eq_with_epsilon!(buffer.frame(0)[0], 0.5, 1e-5);

        // and backwards
        let mut buffer = buffer_with_sentinels::<1>(100);
        let mut writer = FractionalWriter::new();
        writer.poke(&mut buffer, 5.0, [1.0]);
        writer.poke(&mut buffer, 95.0, [0.0]);
        writer.stop(&mut buffer);
        assert_eq_with_epsilon!(buffer.frame(0)[0], 0.5, 1e-5);
        assert_eq!(buffer.frame(50)[0], SENTINEL);
    }

    #[test]
    fn gremlins_are_zapped() {
        let mut buffer = CircularBuffer::<2>::new(8).unwrap();
        let mut writer = FractionalWriter::new();
        writer.poke(&mut buffer, 0.0, [f32::NAN, f32::INFINITY]);
        writer.poke(&mut buffer, 1.0, [1e-30, 0.5]);
        writer.poke(&mut buffer, 2.0, [0.0, 0.0]);
        writer.stop(&mut buffer);
        assert_eq!(buffer.frame(0), [0.0, 0.0]);
        assert_eq!(buffer.frame(1), [0.0, 0.5]);
        assert!(buffer.samples().iter().all(|s| s.is_finite()));

        writer.poke(&mut buffer, 3.0, [1.0, 1.0]);
        writer.reset();
        writer.poke(&mut buffer, f32::NAN, [0.0, 0.0]);
        assert_eq!(buffer.frame(3), [0.0, 0.0]);
    }
}
