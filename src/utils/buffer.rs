// -------------------------------------------------------------------------------------------------

/// Number of complete frames in the given interleaved buffer.
#[inline]
pub fn frame_count<const CHANNELS: usize>(interleaved: &[f32]) -> usize {
    debug_assert!(CHANNELS > 0, "Need at least one channel");
    interleaved.len() / CHANNELS
}

// -------------------------------------------------------------------------------------------------

/// Copy a single interleaved frame slice into a fixed size frame array.
///
/// Missing channels in `frame` are filled with zeros, excess channels are ignored.
#[inline]
pub fn read_frame<const CHANNELS: usize>(frame: &[f32]) -> [f32; CHANNELS] {
    let mut result = [0.0; CHANNELS];
    for (r, f) in result.iter_mut().zip(frame) {
        *r = *f;
    }
    result
}

/// Copy a fixed size frame array into a single interleaved frame slice.
#[inline]
pub fn write_frame<const CHANNELS: usize>(frame: &mut [f32], values: &[f32; CHANNELS]) {
    for (f, v) in frame.iter_mut().zip(values) {
        *f = *v;
    }
}

// -------------------------------------------------------------------------------------------------

/// Process the given interleaved buffer in-place, frame by frame, with the given frame function.
///
/// Trailing samples which do not form a complete frame are cleared.
pub fn process_frames<const CHANNELS: usize, F>(interleaved: &mut [f32], mut process: F)
where
    F: FnMut([f32; CHANNELS]) -> [f32; CHANNELS],
{
    let mut chunks = interleaved.chunks_exact_mut(CHANNELS);
    for frame in &mut chunks {
        let output = process(read_frame::<CHANNELS>(frame));
        write_frame(frame, &output);
    }
    chunks.into_remainder().fill(0.0);
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames() {
        let stereo = [1.0, 4.0, 2.0, 3.0, 3.0, 2.0];
        assert_eq!(frame_count::<2>(&stereo), 3);
        assert_eq!(frame_count::<1>(&stereo), 6);

        assert_eq!(read_frame::<2>(&stereo[2..4]), [2.0, 3.0]);
        assert_eq!(read_frame::<3>(&stereo[4..6]), [3.0, 2.0, 0.0]);

        let mut frame = [0.0; 2];
        write_frame(&mut frame, &[5.0, 6.0]);
        assert_eq!(frame, [5.0, 6.0]);
    }

    #[test]
    fn process_in_place() {
        // swap channels
        let mut stereo = [1.0, 4.0, 2.0, 3.0, 3.0];
        process_frames::<2, _>(&mut stereo, |[l, r]| [r, l]);
        assert_eq!(stereo, [4.0, 1.0, 3.0, 2.0, 0.0]);

        // mono gain
        let mut mono = [1.0, -2.0, 0.5];
        process_frames::<1, _>(&mut mono, |[s]| [s * 2.0]);
        assert_eq!(mono, [2.0, -4.0, 1.0]);
    }
}
