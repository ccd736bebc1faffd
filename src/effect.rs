use std::any::Any;

use four_cc::FourCC;

use crate::{
    parameter::{Parameter, ParameterValueUpdate},
    Error,
};

// -------------------------------------------------------------------------------------------------

pub mod glitch;

// -------------------------------------------------------------------------------------------------

/// Carries [`Effect`] specific payloads, which can't or should not be expressed as
/// [`Parameter`]s, such as triggers.
///
/// This trait is implemented by message enums specific to each effect. The payload gets
/// downcast to the concrete message type within the effect's `process_message` implementation.
pub trait EffectMessage: Any + Send + Sync {
    /// The static name of the target effect for this message. Should match the target
    /// effect's [`Effect::name`].
    fn effect_name(&self) -> &'static str;

    /// Returns the message payload as a `dyn Any` reference.
    fn payload(&self) -> &dyn Any;
}

/// Type used in [`Effect::process_message`] to receive messages.
pub type EffectMessagePayload = dyn EffectMessage;

// -------------------------------------------------------------------------------------------------

/// Effects manipulate interleaved audio samples in `f32` format in-place.
///
/// Parameter values are changed via [`Effect::process_parameter_update`], custom payloads via
/// [`Effect::process_message`]. Both are applied between processed blocks.
///
/// NB: all `process_XXX` functions are called in realtime audio threads, so they must not
/// block or allocate. All other functions are called in the main thread to set up the effect.
pub trait Effect: Send + Sync + 'static {
    /// A unique, static name for the effect.
    fn name(&self) -> &'static str;

    /// Returns a list of parameter descriptors for this effect, e.g. to build generic UIs.
    fn parameters(&self) -> Vec<&dyn Parameter>;

    /// Initializes the effect with the audio output's properties. May allocate.
    ///
    /// Must be called before the effect gets processed.
    fn initialize(
        &mut self,
        sample_rate: u32,
        channel_count: usize,
        max_frames: usize,
    ) -> Result<(), Error>;

    /// Processes an interleaved audio buffer in-place.
    fn process(&mut self, output: &mut [f32]);

    /// Handles a parameter update, identified by the parameter's id.
    fn process_parameter_update(
        &mut self,
        id: FourCC,
        value: &ParameterValueUpdate,
    ) -> Result<(), Error>;

    /// Handles optional effect specific messages.
    fn process_message(&mut self, _message: &EffectMessagePayload) -> Result<(), Error> {
        Err(Error::ParameterError(format!(
            "{}: Received unexpected message payload.",
            self.name()
        )))
    }
}
