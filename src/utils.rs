//! Numeric helpers shared by the buffer, grain and engine implementations.

pub mod buffer;
pub mod dsp;
pub mod smoothed;

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
macro_rules! assert_eq_with_epsilon {
    ($x:expr, $y:expr, $d:expr) => {{
        let (x, y, d) = (($x) as f64, ($y) as f64, ($d) as f64);
        if !((x - y).abs() <= d) {
            panic!("assertion failed: |{x} - {y}| <= {d}");
        }
    }};
}

#[cfg(test)]
pub(crate) use assert_eq_with_epsilon;

// -------------------------------------------------------------------------------------------------

/// Absolute values below this threshold are treated as denormals and flushed to zero.
const GREMLIN_MIN: f32 = 1e-15;
/// Absolute values above this threshold are treated as runaway values and flushed to zero.
const GREMLIN_MAX: f32 = 1e15;

/// Replace denormalized, infinite and NaN values with zero.
///
/// Very small numbers fail the first test, which eliminates denormals (zero fails too, but
/// that's fine as it returns zero). Very large numbers fail the second test, which eliminates
/// infinities. NaNs fail both tests.
#[inline(always)]
pub fn zap_gremlins(value: f32) -> f32 {
    let abs = value.abs();
    if abs > GREMLIN_MIN && abs < GREMLIN_MAX {
        value
    } else {
        0.0
    }
}

// -------------------------------------------------------------------------------------------------

/// Wrap a fractional frame position into the range `[0, frame_count)`.
///
/// Non-finite positions are mapped to 0.
#[inline]
pub fn wrap_position(position: f32, frame_count: usize) -> f32 {
    debug_assert!(frame_count > 0, "Need a non empty buffer to wrap positions");
    if !position.is_finite() {
        return 0.0;
    }
    let frames = frame_count as f32;
    let wrapped = position.rem_euclid(frames);
    // rem_euclid may round up to `frames` for tiny negative inputs
    if wrapped >= frames {
        0.0
    } else {
        wrapped
    }
}

// -------------------------------------------------------------------------------------------------

/// Convert a pitch offset in semitones to a playback speed factor (equal-tempered).
#[inline]
pub fn semitones_to_speed(semitones: f32) -> f32 {
    (semitones / 12.0).exp2()
}

/// Convert a duration in milliseconds to a (fractional) number of sample frames.
#[inline]
pub fn ms_to_samples(duration_ms: f32, sample_rate: u32) -> f32 {
    duration_ms * 0.001 * sample_rate as f32
}

// -------------------------------------------------------------------------------------------------

/// Linearly map `value` from range `[a, b]` into `[c, d]`, clamping at the range borders.
pub fn linlin(value: f32, a: f32, b: f32, c: f32, d: f32) -> f32 {
    if value <= a {
        c
    } else if value >= b {
        d
    } else {
        (value - a) / (b - a) * (d - c) + c
    }
}

/// Clamp a value into the given range. NaN values are mapped to `min`, so clamped parameters
/// never carry NaNs into the processing.
#[inline]
pub fn clamp_finite(value: f32, min: f32, max: f32) -> f32 {
    debug_assert!(min <= max, "Invalid clamp range");
    if value.is_nan() {
        min
    } else {
        value.clamp(min, max)
    }
}

// -------------------------------------------------------------------------------------------------
