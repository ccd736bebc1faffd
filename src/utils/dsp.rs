//! Small DSP building blocks used by grains and the glitch engine.

pub mod envelope;
pub mod metro;
pub mod window;
