//! The glitch engine: records its input into a circular buffer and triggers grains from it
//! with a free running clock.

use std::{fmt, ops::RangeInclusive};

use rand::{rngs::SmallRng, Rng, SeedableRng};

use crate::{
    buffer::{CircularBuffer, FractionalWriter},
    grain::{GrainPool, GrainState},
    pattern::{GrainEvent, GrainPattern, MAX_PATTERN_LENGTH},
    utils::{
        buffer::process_frames,
        clamp_finite,
        dsp::{
            metro::Metro,
            window::{PunchWindow, WindowState},
        },
        ms_to_samples,
        smoothed::LinearSmoothedValue, semitones_to_speed, wrap_position, zap_gremlins,
    },
    Error,
};

// -------------------------------------------------------------------------------------------------

/// Default number of grain voices in a [`GlitchEngine`].
pub const DEFAULT_POOL_SIZE: usize = 4;

// -------------------------------------------------------------------------------------------------

/// Distribution of per grain pitch variations.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::VariantNames,
)]
pub enum PitchSpreadType {
    /// All grains play at the base pitch.
    None,
    /// Uniformly distributed pitch offsets within `±spread` semitones.
    #[default]
    Random,
    /// Random whole octave offsets within `±floor(spread / 12)` octaves.
    Octaves,
}

impl PitchSpreadType {
    /// Calculate a grain's pitch in semitones from the base pitch and spread amount.
    pub fn rate_semitones<R: Rng>(&self, pitch: f32, spread: f32, rng: &mut R) -> f32 {
        match self {
            Self::None => pitch,
            Self::Random => pitch + (2.0 * rng.random::<f32>() - 1.0) * spread,
            Self::Octaves => {
                let octaves = (spread / 12.0).floor().max(0.0) as i32;
                let step = rng.random_range(-octaves..=octaves);
                pitch + 12.0 * step as f32
            }
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// Control parameters of a [`GlitchEngine`], applied as a whole.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlitchParameters {
    /// Trigger clock period in milliseconds.
    pub duration_ms: f32,
    /// Probability that a clock tick does not trigger a grain.
    pub skip_probability: f32,
    /// How far back into the buffer history grain start positions get scattered.
    pub spread: f32,
    /// Base pitch offset in semitones.
    pub pitch: f32,
    /// Pitch variation amount in semitones, see [`PitchSpreadType`].
    pub pitch_spread: f32,
    /// Output volume.
    pub level: f32,
    /// Grain attack time as fraction of the grain duration.
    pub attack: f32,
    /// Stop recording while glitching.
    pub freeze: bool,
    /// Grain duration relative to the trigger clock period.
    pub overlap: f32,
    /// Random variation of each clock period, up to `±50%` of the duration at 1.
    pub duration_jitter: f32,
}

impl GlitchParameters {
    pub const DURATION_RANGE: RangeInclusive<f32> = 20.0..=5000.0;
    pub const PITCH_SPREAD_RANGE: RangeInclusive<f32> = 0.0..=24.0;
    pub const OVERLAP_RANGE: RangeInclusive<f32> = 0.1..=4.0;

    /// Returns a copy with all values clamped into their valid ranges.
    /// NaNs fall back to the lower bounds, a non finite pitch to 0.
    pub fn clamped(&self) -> Self {
        fn clamp(value: f32, range: &RangeInclusive<f32>) -> f32 {
            clamp_finite(value, *range.start(), *range.end())
        }
        Self {
            duration_ms: clamp(self.duration_ms, &Self::DURATION_RANGE),
            skip_probability: clamp_finite(self.skip_probability, 0.0, 1.0),
            spread: clamp_finite(self.spread, 0.0, 1.0),
            pitch: if self.pitch.is_finite() {
                self.pitch
            } else {
                0.0
            },
            pitch_spread: clamp(self.pitch_spread, &Self::PITCH_SPREAD_RANGE),
            level: clamp_finite(self.level, 0.0, 1.0),
            attack: clamp_finite(self.attack, 0.0, 1.0),
            freeze: self.freeze,
            overlap: clamp(self.overlap, &Self::OVERLAP_RANGE),
            duration_jitter: clamp_finite(self.duration_jitter, 0.0, 1.0),
        }
    }

    /// True when any of the values which shape recorded grain patterns differ.
    fn pattern_differs(&self, other: &Self) -> bool {
        const EPSILON: f32 = 1e-4;
        let differs = |a: f32, b: f32| (a - b).abs() > EPSILON;
        differs(self.duration_ms, other.duration_ms)
            || differs(self.spread, other.spread)
            || differs(self.pitch, other.pitch)
            || differs(self.pitch_spread, other.pitch_spread)
            || differs(self.skip_probability, other.skip_probability)
            || differs(self.attack, other.attack)
    }
}

impl Default for GlitchParameters {
    fn default() -> Self {
        Self {
            duration_ms: 80.0,
            skip_probability: 0.3,
            spread: 0.0,
            pitch: 0.0,
            pitch_spread: 0.0,
            level: 1.0,
            attack: 0.1,
            freeze: false,
            overlap: 1.0,
            duration_jitter: 0.0,
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// Snapshot of a single grain voice in a [`GlitchEngineState`].
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct GrainVoiceState {
    pub state: GrainState,
    pub read_position: f32,
    pub rate_semitones: f32,
    pub duration_ms: f32,
}

/// Read-only snapshot of a [`GlitchEngine`]'s internal state for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct GlitchEngineState<const POOL_SIZE: usize> {
    pub write_position: f32,
    pub enabled: bool,
    pub anchor: f32,
    pub tick_count: usize,
    pub window_state: WindowState,
    pub pattern_mode: bool,
    pub pattern_length: usize,
    pub pattern_index: usize,
    pub voices: [GrainVoiceState; POOL_SIZE],
}

impl<const POOL_SIZE: usize> fmt::Display for GlitchEngineState<POOL_SIZE> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Glitch Engine State:")?;
        writeln!(f, "  Write Position: {:.2}", self.write_position)?;
        writeln!(f, "  Enabled: {}", self.enabled)?;
        writeln!(f, "  Anchor: {:.2}", self.anchor)?;
        writeln!(f, "  Clock Ticks: {}", self.tick_count)?;
        writeln!(f, "  Window: {}", self.window_state)?;
        writeln!(f, "  Pattern Mode: {}", self.pattern_mode)?;
        writeln!(f, "  Pattern Length: {}", self.pattern_length)?;
        writeln!(f, "  Pattern Index: {}", self.pattern_index)?;
        writeln!(f, "  Grains:")?;
        for (index, voice) in self.voices.iter().enumerate() {
            writeln!(
                f,
                "    #{index}: {} pos={:.2} rate={:.2}st dur={:.1}ms",
                voice.state, voice.read_position, voice.rate_semitones, voice.duration_ms
            )?;
        }
        Ok(())
    }
}

// -------------------------------------------------------------------------------------------------

/// Granular glitch engine.
///
/// Continuously records its input into a circular buffer, unless frozen while glitching. After
/// [`trigger_glitch`](Self::trigger_glitch) a clock with a period of the glitch duration
/// triggers grains, which play back recent buffer content with the configured pitch, spread
/// and envelope. The first clock cycle after a trigger only records, so the grain sounding
/// first is the audio which has been played while the glitch got triggered.
///
/// Recording fades in and out with a short raised cosine window to avoid clicks when freezing.
///
/// All memory is allocated on construction: processing never allocates.
#[derive(Debug)]
pub struct GlitchEngine<const CHANNELS: usize, const POOL_SIZE: usize = DEFAULT_POOL_SIZE> {
    sample_rate: u32,
    buffer: CircularBuffer<CHANNELS>,
    writer: FractionalWriter<CHANNELS>,
    write_position: f32,
    window: PunchWindow,
    last_should_write: bool,
    grains: GrainPool<CHANNELS, POOL_SIZE>,
    pattern: GrainPattern,
    pattern_mode: bool,
    clock: Metro,
    period_ms: f32,
    tick_count: usize,
    enabled: bool,
    just_triggered: bool,
    anchor: f32,
    parameters: GlitchParameters,
    level: LinearSmoothedValue,
    memory: f32,
    pitch_spread_type: PitchSpreadType,
    rng: SmallRng,
}

impl<const CHANNELS: usize, const POOL_SIZE: usize> GlitchEngine<CHANNELS, POOL_SIZE> {
    /// Fade duration of the recording window.
    pub const WINDOW_FADE_MS: f32 = 50.0;
    /// Ramp duration of output level changes.
    pub const LEVEL_RAMP_MS: f32 = 20.0;

    /// Create a new engine with a buffer of `frame_count` frames and a randomly seeded random
    /// number generator.
    pub fn new(sample_rate: u32, frame_count: usize) -> Result<Self, Error> {
        Self::with_rng(sample_rate, frame_count, SmallRng::from_os_rng())
    }

    /// Create a new engine with a deterministically seeded random number generator.
    pub fn with_seed(sample_rate: u32, frame_count: usize, seed: u64) -> Result<Self, Error> {
        Self::with_rng(sample_rate, frame_count, SmallRng::seed_from_u64(seed))
    }

    fn with_rng(sample_rate: u32, frame_count: usize, rng: SmallRng) -> Result<Self, Error> {
        if sample_rate == 0 {
            return Err(Error::InvalidSampleRate(sample_rate));
        }
        let buffer = CircularBuffer::new(frame_count)?;
        let writer = FractionalWriter::new();
        let mut window = PunchWindow::new(sample_rate, Self::WINDOW_FADE_MS);
        window.begin_fade_in();
        let parameters = GlitchParameters::default();
        let clock = Metro::new(sample_rate, 1000.0 / parameters.duration_ms as f64);
        log::info!(
            "Creating glitch engine: {CHANNELS} channel(s), {POOL_SIZE} voices, {:.2}s buffer",
            frame_count as f64 / sample_rate as f64
        );
        Ok(Self {
            sample_rate,
            buffer,
            writer,
            write_position: 0.0,
            window,
            last_should_write: true,
            grains: GrainPool::new(sample_rate, frame_count),
            pattern: GrainPattern::default(),
            pattern_mode: false,
            clock,
            period_ms: parameters.duration_ms,
            tick_count: 0,
            enabled: false,
            just_triggered: false,
            anchor: 0.0,
            level: LinearSmoothedValue::new(parameters.level, sample_rate, Self::LEVEL_RAMP_MS),
            parameters,
            memory: 1.0,
            pitch_spread_type: PitchSpreadType::default(),
            rng,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// The recording buffer.
    pub fn buffer(&self) -> &CircularBuffer<CHANNELS> {
        &self.buffer
    }

    /// The grain voices.
    pub fn grains(&self) -> &GrainPool<CHANNELS, POOL_SIZE> {
        &self.grains
    }

    /// The grain pattern. Only used while pattern mode is enabled.
    pub fn pattern(&self) -> &GrainPattern {
        &self.pattern
    }

    /// True while glitching, after [`Self::trigger_glitch`].
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn write_position(&self) -> f32 {
        self.write_position
    }

    /// Number of clock ticks since the last glitch trigger.
    pub fn tick_count(&self) -> usize {
        self.tick_count
    }

    /// Currently applied (clamped) parameters.
    pub fn parameters(&self) -> &GlitchParameters {
        &self.parameters
    }

    /// Apply new control parameters. Values get clamped into their valid ranges.
    ///
    /// Resets the grain pattern when pattern relevant parameters changed.
    pub fn set_parameters(&mut self, parameters: GlitchParameters) {
        let parameters = parameters.clamped();
        if parameters.pattern_differs(&self.parameters) {
            self.reset_pattern();
        }
        self.parameters = parameters;
        self.level.set_target(parameters.level);
        self.set_period(parameters.duration_ms);
    }

    /// Current trigger clock period, which is the duration with jitter applied.
    pub fn period_ms(&self) -> f32 {
        self.period_ms
    }

    /// How far back into the buffer grains may start, as fraction of the buffer length.
    pub fn memory(&self) -> f32 {
        self.memory
    }

    pub fn set_memory(&mut self, memory: f32) {
        self.memory = clamp_finite(memory, 0.0, 1.0);
    }

    /// Amount of old buffer content kept while recording.
    pub fn feedback(&self) -> f32 {
        self.writer.feedback()
    }

    pub fn set_feedback(&mut self, feedback: f32) {
        self.writer.set_feedback(feedback);
    }

    pub fn pitch_spread_type(&self) -> PitchSpreadType {
        self.pitch_spread_type
    }

    /// Change the pitch spread distribution. Resets the grain pattern on changes.
    pub fn set_pitch_spread_type(&mut self, pitch_spread_type: PitchSpreadType) {
        if pitch_spread_type != self.pitch_spread_type {
            self.pitch_spread_type = pitch_spread_type;
            self.reset_pattern();
        }
    }

    /// Pattern length, or 0 when pattern mode is disabled.
    pub fn pattern_length(&self) -> usize {
        if self.pattern_mode {
            self.pattern.pattern_length()
        } else {
            0
        }
    }

    /// Enable pattern mode with the given length, clamped to `MAX_PATTERN_LENGTH`.
    /// A length of 0 disables pattern mode.
    pub fn set_pattern_length(&mut self, pattern_length: usize) {
        if pattern_length == 0 {
            self.pattern_mode = false;
        } else {
            self.pattern_mode = true;
            self.pattern.set_pattern_length(pattern_length.min(MAX_PATTERN_LENGTH));
        }
    }

    /// Forget the recorded grain pattern.
    pub fn reset_pattern(&mut self) {
        if !self.pattern.recorded_events().is_empty() {
            log::debug!("Resetting glitch pattern");
        }
        self.pattern.reset();
    }

    /// Start glitching: restarts the trigger clock and locks the grain start position to the
    /// current write position.
    pub fn trigger_glitch(&mut self) {
        log::debug!("Triggering glitch at write position {:.0}", self.write_position);
        self.clock.reset();
        self.set_period(self.parameters.duration_ms);
        self.tick_count = 0;
        self.enabled = true;
        self.just_triggered = true;
        self.anchor = self.write_position;
    }

    /// Stop triggering new grains. Playing grains fade out with their envelopes and recording
    /// resumes.
    pub fn stop_glitch(&mut self) {
        if self.enabled {
            log::debug!("Stopping glitch");
        }
        self.enabled = false;
    }

    /// Silence the buffer and all grains and stop glitching.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.writer.reset();
        self.grains.reset();
        self.pattern.reset();
        self.clock.reset();
        self.tick_count = 0;
        self.enabled = false;
        self.just_triggered = false;
        self.write_position = 0.0;
        self.anchor = 0.0;
        self.level.init(self.parameters.level);
        self.set_period(self.parameters.duration_ms);
    }

    /// Snapshot of the current internal state.
    pub fn state(&self) -> GlitchEngineState<POOL_SIZE> {
        let voices = self.grains.voices();
        GlitchEngineState {
            write_position: self.write_position,
            enabled: self.enabled,
            anchor: self.anchor,
            tick_count: self.tick_count,
            window_state: self.window.state(),
            pattern_mode: self.pattern_mode,
            pattern_length: self.pattern.pattern_length(),
            pattern_index: self.pattern.playback_index(),
            voices: std::array::from_fn(|index| GrainVoiceState {
                state: voices[index].state(),
                read_position: voices[index].read_position(),
                rate_semitones: voices[index].rate_semitones(),
                duration_ms: voices[index].duration_ms(),
            }),
        }
    }

    /// Process a single frame: record `input` and return the grains' output.
    pub fn process_frame(&mut self, input: [f32; CHANNELS]) -> [f32; CHANNELS] {
        // punch recording in or out
        let should_write = !(self.parameters.freeze && self.enabled && self.tick_count > 0);
        if should_write && !self.last_should_write {
            self.window.begin_fade_in();
        } else if !should_write && self.last_should_write {
            self.window.begin_fade_out();
        }
        self.last_should_write = should_write;

        let gain = self.window.process();
        let input = input.map(|s| zap_gremlins(s) * gain);
        if self.window.is_off() {
            self.writer.poke(&mut self.buffer, -1.0, input);
        } else {
            self.writer.poke(&mut self.buffer, self.write_position, input);
            self.write_position =
                wrap_position(self.write_position + 1.0, self.buffer.frame_count());
        }

        // the first clock cycle after a trigger only records
        let ticked = self.clock.process();
        if ticked {
            self.tick_count += 1;
            self.jitter_period();
        }
        if ticked && self.enabled && self.tick_count > 0 {
            self.trigger_grain();
        }

        let level = self.level.next_value();
        self.grains.process_frame(&self.buffer).map(|s| s * level)
    }

    /// Process an interleaved buffer in-place, frame by frame.
    pub fn process(&mut self, interleaved: &mut [f32]) {
        process_frames::<CHANNELS, _>(interleaved, |frame| self.process_frame(frame));
    }

    fn trigger_grain(&mut self) {
        let parameters = self.parameters;
        let frame_count = self.buffer.frame_count();

        let rate_semitones = self.pitch_spread_type.rate_semitones(
            parameters.pitch,
            parameters.pitch_spread,
            &mut self.rng,
        );
        let duration_ms = self.period_ms * parameters.overlap;

        // look back by the amount of frames the grain consumes
        let speed = semitones_to_speed(rate_semitones);
        if speed > 1.0 || parameters.overlap > 1.0 {
            let consumed_frames = ms_to_samples(duration_ms, self.sample_rate) * speed;
            self.anchor = wrap_position(self.write_position - consumed_frames, frame_count);
        }
        let scatter =
            self.rng.random::<f32>() * parameters.spread * self.memory * frame_count as f32;
        let start_position = wrap_position(self.anchor - scatter, frame_count);

        let skipped =
            self.rng.random::<f32>() < parameters.skip_probability && !self.just_triggered;

        let mut event = GrainEvent {
            start_position,
            rate_semitones,
            duration_ms,
            attack: parameters.attack,
            skipped,
        };
        if self.pattern_mode {
            event = self.pattern.process_event(event);
        }
        if !event.skipped {
            self.just_triggered = false;
            self.grains.trigger_grain(
                event.start_position,
                event.rate_semitones,
                event.duration_ms,
                event.attack,
                true,
            );
        }
    }

    /// Draw a new clock period around the duration, when jittering.
    fn jitter_period(&mut self) {
        let parameters = self.parameters;
        if parameters.duration_jitter > 0.0 {
            let offset = (self.rng.random::<f32>() - 0.5) * parameters.duration_ms;
            let period_ms = clamp_finite(
                parameters.duration_ms + parameters.duration_jitter * offset,
                *GlitchParameters::DURATION_RANGE.start(),
                *GlitchParameters::DURATION_RANGE.end(),
            );
            self.set_period(period_ms);
        }
    }

    fn set_period(&mut self, period_ms: f32) {
        self.period_ms = period_ms;
        self.clock.set_frequency(1000.0 / period_ms as f64);
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::f64::consts::TAU;

    use super::*;
    use crate::utils::assert_eq_with_epsilon;

    fn glitch_parameters() -> GlitchParameters {
        GlitchParameters {
            skip_probability: 0.0,
            ..GlitchParameters::default()
        }
    }

    #[test]
    fn construction() {
        assert_eq!(
            GlitchEngine::<1>::new(0, 100).unwrap_err(),
            Error::InvalidSampleRate(0)
        );
        assert_eq!(
            GlitchEngine::<1>::new(48000, 0).unwrap_err(),
            Error::InvalidBufferSize(0)
        );
        let engine = GlitchEngine::<2>::new(48000, 4800).unwrap();
        assert!(!engine.is_enabled());
        assert_eq!(engine.parameters(), &GlitchParameters::default());
        assert_eq!(engine.memory(), 1.0);
        assert_eq!(engine.pitch_spread_type(), PitchSpreadType::Random);
        assert_eq!(engine.pattern_length(), 0);
        assert_eq!(engine.state().window_state, WindowState::FadeIn);
        assert_eq!(engine.buffer().frame_count(), 4800);
    }

    #[test]
    fn parameter_clamping() {
        let mut engine = GlitchEngine::<1>::with_seed(48000, 4800, 1).unwrap();
        engine.set_parameters(GlitchParameters {
            duration_ms: -5.0,
            skip_probability: 1.5,
            spread: f32::NAN,
            pitch: f32::INFINITY,
            pitch_spread: 30.0,
            level: -1.0,
            attack: 2.0,
            freeze: true,
            overlap: 10.0,
            duration_jitter: 5.0,
        });
        let parameters = engine.parameters();
        assert_eq!(parameters.duration_ms, 20.0);
        assert_eq!(parameters.skip_probability, 1.0);
        assert_eq!(parameters.spread, 0.0);
        assert_eq!(parameters.pitch, 0.0);
        assert_eq!(parameters.pitch_spread, 24.0);
        assert_eq!(parameters.level, 0.0);
        assert_eq!(parameters.attack, 1.0);
        assert!(parameters.freeze);
        assert_eq!(parameters.overlap, 4.0);
        assert_eq!(parameters.duration_jitter, 1.0);

        engine.set_memory(-1.0);
        assert_eq!(engine.memory(), 0.0);
        engine.set_memory(f32::NAN);
        assert_eq!(engine.memory(), 0.0);
        engine.set_memory(0.5);
        assert_eq!(engine.memory(), 0.5);

        engine.set_feedback(3.0);
        assert_eq!(engine.feedback(), 1.0);

        engine.set_pattern_length(100);
        assert_eq!(engine.pattern_length(), MAX_PATTERN_LENGTH);
        engine.set_pattern_length(0);
        assert_eq!(engine.pattern_length(), 0);
    }

    #[test]
    fn pitch_spread_types() {
        let mut rng = SmallRng::seed_from_u64(42);
        for _ in 0..100 {
            assert_eq!(PitchSpreadType::None.rate_semitones(3.0, 12.0, &mut rng), 3.0);
            let random = PitchSpreadType::Random.rate_semitones(3.0, 5.0, &mut rng);
            assert!((-2.0..=8.0).contains(&random));
            let octaves = PitchSpreadType::Octaves.rate_semitones(3.0, 24.0, &mut rng);
            let steps = (octaves - 3.0) / 12.0;
            assert!(steps.fract() == 0.0 && (-2.0..=2.0).contains(&steps));
            assert_eq!(PitchSpreadType::Octaves.rate_semitones(3.0, 11.0, &mut rng), 3.0);
        }
        let randoms = (0..10)
            .map(|_| PitchSpreadType::Random.rate_semitones(0.0, 12.0, &mut rng))
            .collect::<Vec<_>>();
        assert!(randoms.windows(2).any(|w| w[0] != w[1]));

        assert_eq!("Octaves".parse::<PitchSpreadType>(), Ok(PitchSpreadType::Octaves));
        assert_eq!(PitchSpreadType::None.to_string(), "None");
    }

    #[test]
    fn write_position_wraps() {
        let mut engine = GlitchEngine::<1>::with_seed(1000, 100, 2).unwrap();
        for _ in 0..250 {
            engine.process_frame([0.5]);
        }
        assert_eq!(engine.write_position(), 50.0);
        // fade in is done after 50 frames, so all frames got overwritten at full gain
        assert!(engine
            .buffer()
            .samples()
            .iter()
            .all(|s| (s - 0.5).abs() < 1e-6));
    }

    #[test]
    fn write_and_trigger_states() {
        for freeze in [false, true] {
            for enabled in [false, true] {
                let mut engine = GlitchEngine::<1>::with_seed(1000, 1000, 7).unwrap();
                engine.set_parameters(GlitchParameters {
                    duration_ms: 20.0,
                    freeze,
                    ..glitch_parameters()
                });
                for _ in 0..200 {
                    assert_eq!(engine.process_frame([0.5]), [0.0]);
                }
                if enabled {
                    engine.trigger_glitch();
                }
                let mut peak = 0.0f32;
                for _ in 0..300 {
                    peak = peak.max(engine.process_frame([0.5])[0].abs());
                }
                let position = engine.write_position();
                for _ in 0..10 {
                    engine.process_frame([0.5]);
                }

                let state = engine.state();
                assert_eq!(state.enabled, enabled);
                if freeze && enabled {
                    assert_eq!(state.write_position, position);
                    assert_eq!(state.window_state, WindowState::Off);
                } else {
                    assert_eq!(state.write_position, wrap_position(position + 10.0, 1000));
                    assert_eq!(state.window_state, WindowState::On);
                }
                if enabled {
                    assert!(state.tick_count >= 14, "{} ticks", state.tick_count);
                    assert!(peak > 0.1, "peak is {peak}");
                } else {
                    assert_eq!(peak, 0.0);
                }
            }
        }
    }

    #[test]
    fn trigger_latency_and_stop() {
        let mut engine = GlitchEngine::<1>::with_seed(1000, 1000, 3).unwrap();
        engine.set_parameters(GlitchParameters {
            duration_ms: 100.0,
            ..glitch_parameters()
        });
        for _ in 0..500 {
            engine.process_frame([0.5]);
        }
        engine.trigger_glitch();
        assert!(engine.is_enabled());
        assert_eq!(engine.tick_count(), 0);
        assert_eq!(engine.state().anchor, 500.0);

        // first cycle only records
        for _ in 0..99 {
            engine.process_frame([0.5]);
        }
        assert_eq!(engine.tick_count(), 0);
        assert_eq!(engine.grains().playing_count(), 0);
        for _ in 0..2 {
            engine.process_frame([0.5]);
        }
        assert_eq!(engine.tick_count(), 1);
        assert_eq!(engine.grains().playing_count(), 1);
        assert_eq!(engine.grains().voices()[0].start_position(), 500.0);

        // running grains finish, but no new ones get triggered
        engine.stop_glitch();
        assert!(!engine.is_enabled());
        for _ in 0..500 {
            engine.process_frame([0.5]);
        }
        assert_eq!(engine.grains().playing_count(), 0);
    }

    #[test]
    fn first_grain_is_never_skipped() {
        let mut engine = GlitchEngine::<1>::with_seed(1000, 1000, 4).unwrap();
        engine.set_parameters(GlitchParameters {
            duration_ms: 50.0,
            skip_probability: 1.0,
            ..GlitchParameters::default()
        });
        engine.trigger_glitch();
        for _ in 0..55 {
            engine.process_frame([0.5]);
        }
        assert_eq!(engine.grains().playing_count(), 1);
        for _ in 0..500 {
            engine.process_frame([0.5]);
        }
        assert_eq!(engine.grains().playing_count(), 0);
        assert!(engine.tick_count() >= 10);
    }

    #[test]
    fn duration_jitter() {
        let mut engine = GlitchEngine::<1>::with_seed(1000, 2000, 21).unwrap();
        engine.set_parameters(GlitchParameters {
            duration_ms: 100.0,
            duration_jitter: 1.0,
            ..glitch_parameters()
        });
        for _ in 0..1000 {
            engine.process_frame([0.5]);
        }
        engine.trigger_glitch();
        assert_eq!(engine.period_ms(), 100.0);

        let mut durations = Vec::new();
        let mut tick_count = engine.tick_count();
        while durations.len() < 20 {
            engine.process_frame([0.5]);
            if engine.tick_count() != tick_count {
                tick_count = engine.tick_count();
                let voice = engine.grains().busy_voices().as_slice()[0];
                let grain_duration = engine.grains().voices()[voice].duration_ms();
                assert_eq!(grain_duration, engine.period_ms());
                durations.push(grain_duration);
            }
        }
        assert!(
            durations.iter().all(|d| (50.0..=150.0).contains(d)),
            "{durations:?}"
        );
        assert!(durations.windows(2).any(|w| w[0] != w[1]));

        // no jitter: periods stay at the duration
        engine.set_parameters(GlitchParameters {
            duration_jitter: 0.0,
            ..*engine.parameters()
        });
        for _ in 0..500 {
            engine.process_frame([0.5]);
            assert_eq!(engine.period_ms(), 100.0);
        }
    }

    #[test]
    fn level_changes_are_ramped() {
        let create_engine = || {
            let mut engine = GlitchEngine::<1>::with_seed(1000, 1000, 8).unwrap();
            engine.set_parameters(GlitchParameters {
                duration_ms: 200.0,
                attack: 0.5,
                ..glitch_parameters()
            });
            for _ in 0..1000 {
                engine.process_frame([0.5]);
            }
            engine.trigger_glitch();
            for _ in 0..250 {
                engine.process_frame([0.5]);
            }
            engine
        };
        let mut reference = create_engine();
        let mut ramped = create_engine();
        ramped.set_parameters(GlitchParameters {
            level: 0.0,
            ..*ramped.parameters()
        });
        for n in 0..30 {
            let expected = reference.process_frame([0.5])[0];
            let output = ramped.process_frame([0.5])[0];
            assert!(expected > 0.01, "no grain output at frame {n}");
            let gain = (1.0 - (n + 1) as f32 / 20.0).max(0.0);
            assert_eq_with_epsilon!(output, expected * gain, 1e-5);
        }
    }

    #[test]
    fn pattern_replay() {
        fn collect_events(engine: &mut GlitchEngine<1>, count: usize) -> Vec<(f32, f32)> {
            let mut events = Vec::new();
            let mut tick_count = engine.tick_count();
            while events.len() < count {
                engine.process_frame([0.25]);
                if engine.tick_count() != tick_count {
                    tick_count = engine.tick_count();
                    let voice = engine.grains().busy_voices().as_slice()[0];
                    let grain = &engine.grains().voices()[voice];
                    events.push((grain.start_position(), grain.rate_semitones()));
                }
            }
            events
        }

        let mut engine = GlitchEngine::<1>::with_seed(1000, 2000, 11).unwrap();
        engine.set_parameters(GlitchParameters {
            duration_ms: 20.0,
            spread: 1.0,
            pitch_spread: 12.0,
            ..glitch_parameters()
        });
        engine.set_pattern_length(4);
        for _ in 0..2000 {
            engine.process_frame([0.25]);
        }
        engine.trigger_glitch();

        let events = collect_events(&mut engine, 12);
        assert_ne!(events[0], events[1]);
        assert_eq!(events[4..8], events[0..4]);
        assert_eq!(events[8..12], events[0..4]);
        let recorded = engine.pattern().recorded_events();
        assert_eq!(recorded.len(), 4);
        for (event, recorded) in events.iter().zip(recorded) {
            assert_eq!(event.0, recorded.start_position);
            assert_eq!(event.1, recorded.rate_semitones);
        }

        // resetting records a fresh pattern
        engine.reset_pattern();
        let fresh_events = collect_events(&mut engine, 8);
        assert_ne!(fresh_events[0..4], events[0..4]);
        assert_eq!(fresh_events[4..8], fresh_events[0..4]);

        // moving pattern relevant controls resets it too
        engine.set_parameters(GlitchParameters {
            level: 0.5,
            ..*engine.parameters()
        });
        assert_eq!(engine.pattern().recorded_events().len(), 4);
        engine.set_parameters(GlitchParameters {
            pitch: 5.0,
            ..*engine.parameters()
        });
        assert!(engine.pattern().recorded_events().is_empty());
        collect_events(&mut engine, 2);
        engine.set_pitch_spread_type(PitchSpreadType::Octaves);
        assert!(engine.pattern().recorded_events().is_empty());
    }

    #[test]
    fn gremlins_are_zapped() {
        let mut engine = GlitchEngine::<2>::with_seed(1000, 500, 5).unwrap();
        engine.set_parameters(GlitchParameters {
            duration_ms: 20.0,
            ..glitch_parameters()
        });
        engine.trigger_glitch();
        for n in 0..1000 {
            let input = match n % 4 {
                0 => [f32::NAN, 0.5],
                1 => [f32::INFINITY, f32::NEG_INFINITY],
                2 => [1e-40, -0.5],
                _ => [0.5, f32::NAN],
            };
            let output = engine.process_frame(input);
            assert!(output.iter().all(|s| s.is_finite()));
        }
        assert!(engine.buffer().samples().iter().all(|s| s.is_finite()));
    }

    #[test]
    fn block_processing_and_state() {
        let mut engine = GlitchEngine::<2>::with_seed(48000, 4800, 9).unwrap();
        let mut block = vec![0.5; 2 * 64];
        engine.process(&mut block);
        assert_eq!(engine.write_position(), 64.0);
        assert!(block.iter().all(|s| *s == 0.0));

        let state = engine.state();
        assert_eq!(state.write_position, 64.0);
        assert!(!state.enabled);
        assert!(state
            .voices
            .iter()
            .all(|voice| voice.state == GrainState::Idle));
        assert!(!state.to_string().is_empty());

        engine.reset();
        assert_eq!(engine.write_position(), 0.0);
        assert!(engine.buffer().samples().iter().all(|s| *s == 0.0));
    }

    #[test]
    fn glitches_recorded_sine() {
        const SAMPLE_RATE: u32 = 48000;
        let mut engine =
            GlitchEngine::<1>::with_seed(SAMPLE_RATE, SAMPLE_RATE as usize, 1234).unwrap();
        engine.set_parameters(GlitchParameters {
            duration_ms: 100.0,
            skip_probability: 0.0,
            spread: 0.0,
            pitch: 0.0,
            pitch_spread: 0.0,
            overlap: 1.0,
            ..GlitchParameters::default()
        });

        let omega = TAU * 440.0 / SAMPLE_RATE as f64;
        let sine = |n: usize| (0.5 * (omega * n as f64).sin()) as f32;

        // record one second
        for n in 0..SAMPLE_RATE as usize {
            assert_eq!(engine.process_frame([sine(n)]), [0.0]);
        }

        engine.trigger_glitch();
        let start = SAMPLE_RATE as usize;
        let output = (start..start + 12000)
            .map(|n| engine.process_frame([sine(n)])[0])
            .collect::<Vec<_>>();

        // first grain sounds after one clock cycle
        let first = output
            .iter()
            .position(|s| s.abs() > 1e-6)
            .expect("Expected glitch output");
        assert!((4790..=4810).contains(&first), "first grain at {first}");

        // correlate against a 440Hz reference tone
        let grain = &output[first..first + 4800];
        let (mut in_phase, mut quadrature, mut energy) = (0.0f64, 0.0f64, 0.0f64);
        for (n, sample) in grain.iter().enumerate() {
            let sample = *sample as f64;
            in_phase += sample * (omega * n as f64).sin();
            quadrature += sample * (omega * n as f64).cos();
            energy += sample * sample;
        }
        let correlation = 2.0 * (in_phase * in_phase + quadrature * quadrature)
            / (grain.len() as f64 * energy);
        assert!(correlation > 0.6, "correlation is {correlation}");
        let rms = (energy / grain.len() as f64).sqrt();
        assert!(rms > 0.05, "rms is {rms}");
    }
}
