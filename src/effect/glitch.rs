use std::any::Any;

use four_cc::FourCC;

use crate::{
    effect::{Effect, EffectMessage, EffectMessagePayload},
    engine::{GlitchEngine, GlitchParameters, PitchSpreadType},
    parameter::{
        BooleanParameter, BooleanParameterValue, EnumParameter, EnumParameterValue,
        FloatParameter, FloatParameterValue, IntegerParameter, IntegerParameterValue, Parameter,
        ParameterValueUpdate,
    },
    utils::buffer::process_frames,
    Error,
};

// -------------------------------------------------------------------------------------------------

/// Messages for [`GlitchEffect`].
#[derive(Clone, Debug)]
pub enum GlitchEffectMessage {
    /// Start glitching from the current position in the recorded input.
    Trigger,
    /// Stop glitching and continue recording.
    Stop,
    /// Forget the recorded grain pattern.
    ResetPattern,
}

impl EffectMessage for GlitchEffectMessage {
    fn effect_name(&self) -> &'static str {
        GlitchEffect::EFFECT_NAME
    }
    fn payload(&self) -> &dyn Any {
        self
    }
}

// -------------------------------------------------------------------------------------------------

// Mono or stereo engine instance, created in `initialize`.
#[derive(Debug)]
enum EngineInstance {
    Mono(GlitchEngine<1>),
    Stereo(GlitchEngine<2>),
}

impl EngineInstance {
    fn new(
        sample_rate: u32,
        channel_count: usize,
        frame_count: usize,
        seed: Option<u64>,
    ) -> Result<Self, Error> {
        match (channel_count, seed) {
            (1, Some(seed)) => Ok(Self::Mono(GlitchEngine::with_seed(
                sample_rate,
                frame_count,
                seed,
            )?)),
            (1, None) => Ok(Self::Mono(GlitchEngine::new(sample_rate, frame_count)?)),
            (2, Some(seed)) => Ok(Self::Stereo(GlitchEngine::with_seed(
                sample_rate,
                frame_count,
                seed,
            )?)),
            (2, None) => Ok(Self::Stereo(GlitchEngine::new(sample_rate, frame_count)?)),
            _ => Err(Error::UnsupportedChannelCount(channel_count)),
        }
    }
}

// Adds the engine's output to the dry input.
fn process_engine<const CHANNELS: usize>(engine: &mut GlitchEngine<CHANNELS>, output: &mut [f32]) {
    process_frames::<CHANNELS, _>(output, |input| {
        let wet = engine.process_frame(input);
        std::array::from_fn(|channel| input[channel] + wet[channel])
    });
}

// Dispatches a call to the mono or stereo engine.
macro_rules! with_engine {
    ($instance:expr, $engine:ident => $body:expr) => {
        match $instance {
            EngineInstance::Mono($engine) => $body,
            EngineInstance::Stereo($engine) => $body,
        }
    };
}

// -------------------------------------------------------------------------------------------------

/// A mono or stereo granular glitch effect, wrapping a [`GlitchEngine`].
///
/// The effect continuously records its input and passes it through. Send
/// [`GlitchEffectMessage::Trigger`] to start adding grains to the dry signal and
/// [`GlitchEffectMessage::Stop`] to return to the dry signal only.
#[derive(Debug)]
pub struct GlitchEffect {
    buffer_duration: f32,
    seed: Option<u64>,
    engine: Option<EngineInstance>,

    duration: FloatParameterValue,
    duration_jitter: FloatParameterValue,
    spread: FloatParameterValue,
    pitch: IntegerParameterValue,
    pitch_spread: FloatParameterValue,
    pitch_spread_type: EnumParameterValue<PitchSpreadType>,
    skip: FloatParameterValue,
    level: FloatParameterValue,
    attack: FloatParameterValue,
    overlap: FloatParameterValue,
    memory: FloatParameterValue,
    feedback: FloatParameterValue,
    pattern_length: IntegerParameterValue,
    freeze: BooleanParameterValue,
}

impl GlitchEffect {
    pub const EFFECT_NAME: &str = "GlitchEffect";
    pub const DURATION_ID: FourCC = FourCC(*b"dura");
    pub const DURATION_JITTER_ID: FourCC = FourCC(*b"djit");
    pub const SPREAD_ID: FourCC = FourCC(*b"sprd");
    pub const PITCH_ID: FourCC = FourCC(*b"ptch");
    pub const PITCH_SPREAD_ID: FourCC = FourCC(*b"pspr");
    pub const PITCH_SPREAD_TYPE_ID: FourCC = FourCC(*b"pstp");
    pub const SKIP_ID: FourCC = FourCC(*b"skip");
    pub const LEVEL_ID: FourCC = FourCC(*b"levl");
    pub const ATTACK_ID: FourCC = FourCC(*b"attk");
    pub const OVERLAP_ID: FourCC = FourCC(*b"ovlp");
    pub const MEMORY_ID: FourCC = FourCC(*b"memo");
    pub const FEEDBACK_ID: FourCC = FourCC(*b"fdbk");
    pub const PATTERN_LENGTH_ID: FourCC = FourCC(*b"plen");
    pub const FREEZE_ID: FourCC = FourCC(*b"frez");

    /// Default length of the recording buffer in seconds.
    pub const DEFAULT_BUFFER_DURATION: f32 = 10.0;
    /// Maximum length of the recording buffer in seconds.
    pub const MAX_BUFFER_DURATION: f32 = 600.0;

    /// Creates a new `GlitchEffect` with default parameter values and buffer duration.
    pub fn new() -> Self {
        let defaults = GlitchParameters::default();
        Self {
            buffer_duration: Self::DEFAULT_BUFFER_DURATION,
            seed: None,
            engine: None,

            duration: FloatParameter::new(
                Self::DURATION_ID,
                "Duration",
                20.0..=2000.0,
                defaults.duration_ms,
            )
            .with_unit("ms")
            .with_precision(0)
            .into(),
            duration_jitter: FloatParameter::new(
                Self::DURATION_JITTER_ID,
                "Duration Jitter",
                0.0..=1.0,
                defaults.duration_jitter,
            )
            .into(),
            spread: FloatParameter::new(Self::SPREAD_ID, "Spread", 0.0..=1.0, defaults.spread)
                .into(),
            pitch: IntegerParameter::new(Self::PITCH_ID, "Pitch", -12..=12, 0)
                .with_unit("st")
                .into(),
            pitch_spread: FloatParameter::new(
                Self::PITCH_SPREAD_ID,
                "Pitch Spread",
                0.0..=24.0,
                defaults.pitch_spread,
            )
            .with_unit("st")
            .into(),
            pitch_spread_type: EnumParameterValue::from_description(EnumParameter::new(
                Self::PITCH_SPREAD_TYPE_ID,
                "Pitch Spread Type",
                PitchSpreadType::default(),
            )),
            skip: FloatParameter::new(
                Self::SKIP_ID,
                "Skip",
                0.0..=1.0,
                defaults.skip_probability,
            )
            .into(),
            level: FloatParameter::new(Self::LEVEL_ID, "Level", 0.0..=1.0, defaults.level).into(),
            attack: FloatParameter::new(Self::ATTACK_ID, "Attack", 0.0..=1.0, defaults.attack)
                .into(),
            overlap: FloatParameter::new(
                Self::OVERLAP_ID,
                "Overlap",
                0.1..=4.0,
                defaults.overlap,
            )
            .into(),
            memory: FloatParameter::new(Self::MEMORY_ID, "Memory", 0.0..=1.0, 1.0).into(),
            feedback: FloatParameter::new(Self::FEEDBACK_ID, "Feedback", 0.0..=1.0, 0.0).into(),
            pattern_length: IntegerParameter::new(
                Self::PATTERN_LENGTH_ID,
                "Pattern Length",
                0..=16,
                0,
            )
            .into(),
            freeze: BooleanParameter::new(Self::FREEZE_ID, "Freeze", defaults.freeze).into(),
        }
    }

    /// Set the length of the recording buffer in seconds. Applied in `initialize`.
    pub fn with_buffer_duration(mut self, seconds: f32) -> Self {
        self.buffer_duration = seconds;
        self
    }

    /// Use a deterministically seeded random number generator. Applied in `initialize`.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Glitch engine parameters from the current parameter values.
    pub fn glitch_parameters(&self) -> GlitchParameters {
        GlitchParameters {
            duration_ms: self.duration.value(),
            skip_probability: self.skip.value(),
            spread: self.spread.value(),
            pitch: self.pitch.value() as f32,
            pitch_spread: self.pitch_spread.value(),
            level: self.level.value(),
            attack: self.attack.value(),
            freeze: self.freeze.value(),
            overlap: self.overlap.value(),
            duration_jitter: self.duration_jitter.value(),
        }
    }

    /// True while the engine is glitching. False before the effect got initialized.
    pub fn is_glitching(&self) -> bool {
        self.engine
            .as_ref()
            .is_some_and(|instance| with_engine!(instance, engine => engine.is_enabled()))
    }

    fn apply_parameters(&mut self) {
        let parameters = self.glitch_parameters();
        let memory = self.memory.value();
        let feedback = self.feedback.value();
        let pitch_spread_type = self.pitch_spread_type.value();
        let pattern_length = self.pattern_length.value().max(0) as usize;
        if let Some(instance) = self.engine.as_mut() {
            with_engine!(instance, engine => {
                engine.set_parameters(parameters);
                engine.set_memory(memory);
                engine.set_feedback(feedback);
                engine.set_pitch_spread_type(pitch_spread_type);
                engine.set_pattern_length(pattern_length);
            })
        }
    }

    fn assert_no_alloc<T, F: FnOnce() -> T>(func: F) -> T {
        #[cfg(feature = "assert-allocs")]
        return assert_no_alloc::assert_no_alloc::<T, F>(func);

        #[cfg(not(feature = "assert-allocs"))]
        return func();
    }
}

impl Default for GlitchEffect {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for GlitchEffect {
    fn name(&self) -> &'static str {
        Self::EFFECT_NAME
    }

    fn parameters(&self) -> Vec<&dyn Parameter> {
        vec![
            self.duration.description(),
            self.duration_jitter.description(),
            self.spread.description(),
            self.pitch.description(),
            self.pitch_spread.description(),
            self.pitch_spread_type.description(),
            self.skip.description(),
            self.level.description(),
            self.attack.description(),
            self.overlap.description(),
            self.memory.description(),
            self.feedback.description(),
            self.pattern_length.description(),
            self.freeze.description(),
        ]
    }

    fn initialize(
        &mut self,
        sample_rate: u32,
        channel_count: usize,
        _max_frames: usize,
    ) -> Result<(), Error> {
        if !(self.buffer_duration > 0.0 && self.buffer_duration <= Self::MAX_BUFFER_DURATION) {
            return Err(Error::ParameterError(format!(
                "{}: Invalid buffer duration: {}",
                self.name(),
                self.buffer_duration
            )));
        }
        let frame_count = (self.buffer_duration * sample_rate as f32).round() as usize;
        self.engine = Some(EngineInstance::new(
            sample_rate,
            channel_count,
            frame_count,
            self.seed,
        )?);
        self.apply_parameters();
        log::info!(
            "Initialized {} with {channel_count} channels and {:.1}s buffer",
            self.name(),
            self.buffer_duration
        );
        Ok(())
    }

    fn process(&mut self, output: &mut [f32]) {
        if let Some(instance) = self.engine.as_mut() {
            Self::assert_no_alloc(|| {
                with_engine!(instance, engine => process_engine(engine, output))
            });
        }
    }

    fn process_parameter_update(
        &mut self,
        id: FourCC,
        value: &ParameterValueUpdate,
    ) -> Result<(), Error> {
        match id {
            Self::DURATION_ID => self.duration.apply_update(value),
            Self::DURATION_JITTER_ID => self.duration_jitter.apply_update(value),
            Self::SPREAD_ID => self.spread.apply_update(value),
            Self::PITCH_ID => self.pitch.apply_update(value),
            Self::PITCH_SPREAD_ID => self.pitch_spread.apply_update(value),
            Self::PITCH_SPREAD_TYPE_ID => self.pitch_spread_type.apply_update(value),
            Self::SKIP_ID => self.skip.apply_update(value),
            Self::LEVEL_ID => self.level.apply_update(value),
            Self::ATTACK_ID => self.attack.apply_update(value),
            Self::OVERLAP_ID => self.overlap.apply_update(value),
            Self::MEMORY_ID => self.memory.apply_update(value),
            Self::FEEDBACK_ID => self.feedback.apply_update(value),
            Self::PATTERN_LENGTH_ID => self.pattern_length.apply_update(value),
            Self::FREEZE_ID => self.freeze.apply_update(value),
            _ => {
                return Err(Error::ParameterError(format!(
                    "Unknown parameter: '{id}' for effect '{}'",
                    self.name()
                )))
            }
        };
        self.apply_parameters();
        Ok(())
    }

    fn process_message(&mut self, message: &EffectMessagePayload) -> Result<(), Error> {
        if let Some(message) = message.payload().downcast_ref::<GlitchEffectMessage>() {
            if let Some(instance) = self.engine.as_mut() {
                with_engine!(instance, engine => match message {
                    GlitchEffectMessage::Trigger => engine.trigger_glitch(),
                    GlitchEffectMessage::Stop => engine.stop_glitch(),
                    GlitchEffectMessage::ResetPattern => engine.reset_pattern(),
                })
            }
            Ok(())
        } else {
            Err(Error::ParameterError(format!(
                "{}: Invalid/unknown message payload",
                self.name()
            )))
        }
    }
}

// -------------------------------------------------------------------------------------------------
