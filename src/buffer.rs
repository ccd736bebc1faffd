//! Fixed size circular sample buffer with fractional (interpolated) read access.
//!
//! Writing happens through a [`FractionalWriter`], which fills gaps and averages
//! overlapping writes when the write head does not move by exactly one frame per call.

use assume::assume;

use crate::{
    utils::{wrap_position, zap_gremlins},
    Error,
};

// -------------------------------------------------------------------------------------------------

mod poke;

pub use poke::FractionalWriter;

// -------------------------------------------------------------------------------------------------

/// Interleaved circular audio buffer with `CHANNELS` channels.
///
/// The buffer is allocated once on construction and never resized. All positions are wrapped
/// into `[0, frame_count)` before addressing.
#[derive(Debug, Clone)]
pub struct CircularBuffer<const CHANNELS: usize> {
    samples: Box<[f32]>,
    frame_count: usize,
}

impl<const CHANNELS: usize> CircularBuffer<CHANNELS> {
    // largest sample count a `Box<[f32]>` can hold
    const MAX_SAMPLE_COUNT: usize = isize::MAX as usize / std::mem::size_of::<f32>();

    /// Create a new, silent buffer with the given number of frames.
    pub fn new(frame_count: usize) -> Result<Self, Error> {
        if CHANNELS == 0 {
            return Err(Error::UnsupportedChannelCount(CHANNELS));
        }
        let sample_count = frame_count
            .checked_mul(CHANNELS)
            .filter(|count| *count > 0 && *count <= Self::MAX_SAMPLE_COUNT)
            .ok_or(Error::InvalidBufferSize(frame_count))?;
        Ok(Self {
            samples: vec![0.0; sample_count].into_boxed_slice(),
            frame_count,
        })
    }

    /// Create a new, silent buffer which holds `duration_secs` seconds of audio.
    pub fn with_duration(duration_secs: f32, sample_rate: u32) -> Result<Self, Error> {
        if sample_rate == 0 {
            return Err(Error::InvalidSampleRate(sample_rate));
        }
        let frames = (duration_secs * sample_rate as f32).round();
        if !frames.is_finite() || frames < 1.0 {
            return Err(Error::InvalidBufferSize(0));
        }
        Self::new(frames as usize)
    }

    /// Number of frames in the buffer.
    #[inline]
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Raw interleaved sample data.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Silence the whole buffer.
    pub fn clear(&mut self) {
        self.samples.fill(0.0);
    }

    /// Wrap a signed frame index into the buffer bounds.
    #[inline]
    pub fn wrap_index(&self, index: isize) -> usize {
        index.rem_euclid(self.frame_count as isize) as usize
    }

    /// Read the frame at the given index, wrapping the index into the buffer bounds.
    #[inline]
    pub fn frame(&self, index: usize) -> [f32; CHANNELS] {
        let offset = (index % self.frame_count) * CHANNELS;
        assume!(unsafe: offset + CHANNELS <= self.samples.len());
        let mut frame = [0.0; CHANNELS];
        frame.copy_from_slice(&self.samples[offset..offset + CHANNELS]);
        frame
    }

    /// Overwrite the frame at the given index, wrapping the index into the buffer bounds.
    #[inline]
    pub fn set_frame(&mut self, index: usize, frame: [f32; CHANNELS]) {
        let offset = (index % self.frame_count) * CHANNELS;
        assume!(unsafe: offset + CHANNELS <= self.samples.len());
        self.samples[offset..offset + CHANNELS].copy_from_slice(&frame);
    }

    /// Read a linearly interpolated frame at the given fractional position.
    ///
    /// Interpolates between the frames at `floor(position)` and `floor(position) + 1`, both
    /// wrapped into the buffer bounds. Non finite positions read frame 0.
    pub fn peek(&self, position: f32) -> [f32; CHANNELS] {
        let position = wrap_position(position, self.frame_count);
        let index = (position as usize).min(self.frame_count - 1);
        let fraction = position - index as f32;
        let current = self.frame(index);
        let next = self.frame(index + 1);
        let mut output = [0.0; CHANNELS];
        for ((o, c), n) in output.iter_mut().zip(current).zip(next) {
            *o = zap_gremlins(c + (n - c) * fraction);
        }
        output
    }
}

// -------------------------------------------------------------------------------------------------
