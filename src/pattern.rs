//! Records grain trigger events and replays them cyclically.

// -------------------------------------------------------------------------------------------------

/// Maximum number of events a [`GrainPattern`] can record.
pub const MAX_PATTERN_LENGTH: usize = 16;

// -------------------------------------------------------------------------------------------------

/// Parameters of a single grain trigger.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct GrainEvent {
    pub start_position: f32,
    pub rate_semitones: f32,
    pub duration_ms: f32,
    /// Attack time as fraction of the duration.
    pub attack: f32,
    /// Skipped events do not trigger a grain, but still occupy a pattern step.
    pub skipped: bool,
}

// -------------------------------------------------------------------------------------------------

/// Deterministic grain trigger sequencer.
///
/// Until `pattern_length` events are recorded, new events are recorded and passed through.
/// After that, incoming events are replaced with the recorded ones, cycling through the pattern.
#[derive(Debug, Clone)]
pub struct GrainPattern {
    events: [GrainEvent; MAX_PATTERN_LENGTH],
    recorded_count: usize,
    pattern_length: usize,
    playback_index: usize,
}

impl Default for GrainPattern {
    fn default() -> Self {
        Self::new(MAX_PATTERN_LENGTH)
    }
}

impl GrainPattern {
    /// Create a new empty pattern. The length gets clamped to `[1, MAX_PATTERN_LENGTH]`.
    pub fn new(pattern_length: usize) -> Self {
        Self {
            events: [GrainEvent::default(); MAX_PATTERN_LENGTH],
            recorded_count: 0,
            pattern_length: pattern_length.clamp(1, MAX_PATTERN_LENGTH),
            playback_index: 0,
        }
    }

    pub fn pattern_length(&self) -> usize {
        self.pattern_length
    }

    /// Pattern step which is played (or recorded) next.
    pub fn playback_index(&self) -> usize {
        self.playback_index
    }

    /// All recorded events, which may be more than the current pattern length.
    pub fn recorded_events(&self) -> &[GrainEvent] {
        &self.events[..self.recorded_count]
    }

    /// True when the pattern has been recorded and now replays.
    pub fn is_complete(&self) -> bool {
        self.recorded_count >= self.pattern_length
    }

    /// Change the number of steps. Already recorded events are kept when shrinking.
    pub fn set_pattern_length(&mut self, pattern_length: usize) {
        self.pattern_length = pattern_length.clamp(1, MAX_PATTERN_LENGTH);
        self.playback_index %= self.pattern_length;
    }

    /// Record or replay an event: returns the event which should be played.
    pub fn process_event(&mut self, candidate: GrainEvent) -> GrainEvent {
        let event = if self.recorded_count < self.pattern_length {
            self.events[self.recorded_count] = candidate;
            self.recorded_count += 1;
            candidate
        } else {
            self.events[self.playback_index]
        };
        self.playback_index = (self.playback_index + 1) % self.pattern_length;
        event
    }

    /// Forget all recorded events and restart the pattern.
    pub fn reset(&mut self) {
        self.recorded_count = 0;
        self.playback_index = 0;
    }
}

// -------------------------------------------------------------------------------------------------
