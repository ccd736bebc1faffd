use crate::{buffer::CircularBuffer, grain::Grain};

// -------------------------------------------------------------------------------------------------

/// Fixed capacity list of busy voice indices, most recently triggered voice first.
///
/// Voices get inserted at the front and stolen from the back.
#[derive(Debug, Clone)]
pub struct BusyVoices<const CAPACITY: usize> {
    indices: [usize; CAPACITY],
    len: usize,
}

impl<const CAPACITY: usize> Default for BusyVoices<CAPACITY> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const CAPACITY: usize> BusyVoices<CAPACITY> {
    pub const fn new() -> Self {
        Self {
            indices: [0; CAPACITY],
            len: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Voice indices, front (most recently triggered) first.
    #[inline]
    pub fn as_slice(&self) -> &[usize] {
        &self.indices[..self.len]
    }

    pub fn contains(&self, index: usize) -> bool {
        self.as_slice().contains(&index)
    }

    /// Insert an index at the front. When the list is full, the back index gets dropped.
    pub fn push_front(&mut self, index: usize) {
        if CAPACITY == 0 {
            return;
        }
        let len = self.len.min(CAPACITY - 1);
        self.indices.copy_within(0..len, 1);
        self.indices[0] = index;
        self.len = len + 1;
    }

    /// Remove and return the index at the back.
    pub fn pop_back(&mut self) -> Option<usize> {
        if self.len == 0 {
            None
        } else {
            self.len -= 1;
            Some(self.indices[self.len])
        }
    }

    /// Keep only the indices for which `keep` returns true, preserving their order.
    pub fn retain<F: FnMut(usize) -> bool>(&mut self, mut keep: F) {
        let mut write = 0;
        for read in 0..self.len {
            let index = self.indices[read];
            if keep(index) {
                self.indices[write] = index;
                write += 1;
            }
        }
        self.len = write;
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }
}

// -------------------------------------------------------------------------------------------------

/// Fixed size pool of [`Grain`] voices with voice stealing.
///
/// The pool reuses its grains, so triggering and processing never allocates.
#[derive(Debug, Clone)]
pub struct GrainPool<const CHANNELS: usize, const POOL_SIZE: usize> {
    grains: [Grain<CHANNELS>; POOL_SIZE],
    busy_voices: BusyVoices<POOL_SIZE>,
}

impl<const CHANNELS: usize, const POOL_SIZE: usize> GrainPool<CHANNELS, POOL_SIZE> {
    /// Create a new pool with idle grains which read from buffers with `frame_count` frames.
    pub fn new(sample_rate: u32, frame_count: usize) -> Self {
        Self {
            grains: std::array::from_fn(|_| Grain::new(sample_rate, frame_count)),
            busy_voices: BusyVoices::new(),
        }
    }

    /// All voices in fixed voice index order.
    pub fn voices(&self) -> &[Grain<CHANNELS>; POOL_SIZE] {
        &self.grains
    }

    /// Busy voice indices as of the last trigger, most recently triggered first.
    pub fn busy_voices(&self) -> &BusyVoices<POOL_SIZE> {
        &self.busy_voices
    }

    /// Number of currently playing voices.
    pub fn playing_count(&self) -> usize {
        self.grains.iter().filter(|g| g.is_playing()).count()
    }

    /// Trigger a grain on the first idle voice. When all voices are busy and `steal` is set,
    /// the voice at the back of the busy list gets retriggered.
    ///
    /// Returns the index of the triggered voice, or None when no voice was available.
    pub fn trigger_grain(
        &mut self,
        start_position: f32,
        rate_semitones: f32,
        duration_ms: f32,
        attack_fraction: f32,
        steal: bool,
    ) -> Option<usize> {
        let grains = &self.grains;
        self.busy_voices.retain(|index| grains[index].is_playing());

        let index = match self.grains.iter().position(|g| !g.is_playing()) {
            Some(index) => index,
            None if steal => self.busy_voices.pop_back()?,
            None => return None,
        };
        self.grains[index].trigger(start_position, rate_semitones, duration_ms, attack_fraction);
        self.busy_voices.push_front(index);
        Some(index)
    }

    /// Render the sum of all voices. Idle voices contribute silence.
    pub fn process_frame(&mut self, buffer: &CircularBuffer<CHANNELS>) -> [f32; CHANNELS] {
        let mut output = [0.0; CHANNELS];
        for grain in &mut self.grains {
            let frame = grain.process_frame(buffer);
            for (o, f) in output.iter_mut().zip(frame) {
                *o += f;
            }
        }
        output
    }

    /// Stop all voices immediately.
    pub fn reset(&mut self) {
        for grain in &mut self.grains {
            grain.reset();
        }
        self.busy_voices.clear();
    }
}

// -------------------------------------------------------------------------------------------------
