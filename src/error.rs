use std::{error, fmt};

// -------------------------------------------------------------------------------------------------

/// Provides an enumeration of all possible errors reported by glitchgrain.
///
/// Errors are only reported while constructing or configuring engines and effects. The real-time
/// processing functions never fail: invalid values are clamped or zeroed instead.
#[derive(Debug, Clone, PartialEq)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    InvalidSampleRate(u32),
    InvalidBufferSize(usize),
    UnsupportedChannelCount(usize),
    ParameterError(String),
}

impl error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSampleRate(sample_rate) => {
                write!(f, "Invalid sample rate: {sample_rate}")
            }
            Self::InvalidBufferSize(frame_count) => {
                write!(f, "Invalid buffer size: {frame_count} frames")
            }
            Self::UnsupportedChannelCount(channel_count) => {
                write!(f, "Unsupported channel count: {channel_count}")
            }
            Self::ParameterError(str) => write!(f, "Invalid parameter: {str}"),
        }
    }
}
