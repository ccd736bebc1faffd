#![doc = include_str!("../README.md")]

// private mods (will be partly re-exported)
mod buffer;
mod effect;
mod engine;
mod error;
mod grain;
mod pattern;

// public, flat re-exports
pub use error::Error;

pub use buffer::{CircularBuffer, FractionalWriter};
pub use engine::{
    GlitchEngine, GlitchEngineState, GlitchParameters, GrainVoiceState, PitchSpreadType,
    DEFAULT_POOL_SIZE,
};
pub use grain::{BusyVoices, Grain, GrainPool, GrainState};
pub use pattern::{GrainEvent, GrainPattern, MAX_PATTERN_LENGTH};

pub use effect::{Effect, EffectMessage, EffectMessagePayload};
pub use parameter::{Parameter, ParameterType, ParameterValueUpdate};

// public mods
pub mod parameter;
pub mod utils;

pub mod effects {
    //! Effect wrappers around the glitch engine.

    pub use super::effect::glitch::{GlitchEffect, GlitchEffectMessage};
}
