//! Renders a plucked test signal through the glitch effect into a stereo WAV file.

use std::{error::Error, f32::consts::PI, path::PathBuf};

use arg::{parse_args, Args};

use glitchgrain::{
    effects::{GlitchEffect, GlitchEffectMessage},
    Effect, ParameterValueUpdate, PitchSpreadType,
};

// -------------------------------------------------------------------------------------------------

#[cfg(all(debug_assertions, feature = "assert-allocs"))]
#[global_allocator]
static A: assert_no_alloc::AllocDisabler = assert_no_alloc::AllocDisabler;

// -------------------------------------------------------------------------------------------------

const DEFAULT_LOG_LEVEL: log::Level = if cfg!(debug_assertions) {
    log::Level::Debug
} else {
    log::Level::Warn
};

const SAMPLE_RATE: u32 = 48000;
const CHANNEL_COUNT: usize = 2;
const BLOCK_SIZE: usize = 256;
const LENGTH_IN_SECONDS: f32 = 12.0;

// -------------------------------------------------------------------------------------------------

#[derive(Args, Debug, Default)]
struct Arguments {
    #[arg(short = "o", long = "output")]
    /// Path of the rendered wav file. By default \"glitch.wav\".
    output_path: Option<PathBuf>,
    #[arg(short = "s", long = "seed")]
    /// Seed for the random number generator. Random by default.
    seed: Option<u64>,
    #[arg(short = "l", long = "log-level")]
    /// Set logging level to \"debug\", \"info\", \"warn\" or \"error\".
    /// By default \"debug\" in dev builds and \"warn\" in release builds.
    log_level: Option<log::Level>,
}

// -------------------------------------------------------------------------------------------------

// A decaying, slowly rising sine pluck every quarter second.
fn test_signal(frame: usize) -> f32 {
    let time = frame as f32 / SAMPLE_RATE as f32;
    let note = (time * 4.0).floor();
    let pluck_time = time - note / 4.0;
    let frequency = 220.0 * (((note as usize % 8) as f32) / 12.0).exp2();
    (2.0 * PI * frequency * time).sin() * (-pluck_time * 12.0).exp() * 0.5
}

// -------------------------------------------------------------------------------------------------

fn main() -> Result<(), Box<dyn Error>> {
    let args = parse_args::<Arguments>();

    simple_logger::SimpleLogger::new()
        .with_level(args.log_level.unwrap_or(DEFAULT_LOG_LEVEL).to_level_filter())
        .init()?;

    let mut effect = GlitchEffect::new().with_buffer_duration(4.0);
    if let Some(seed) = args.seed {
        effect = effect.with_seed(seed);
    }
    effect.initialize(SAMPLE_RATE, CHANNEL_COUNT, BLOCK_SIZE)?;

    // Set some initial parameters
    let parameter_updates = [
        (GlitchEffect::DURATION_ID, ParameterValueUpdate::Raw(Box::new(125.0f32))),
        (GlitchEffect::SPREAD_ID, ParameterValueUpdate::Raw(Box::new(0.2f32))),
        (GlitchEffect::PITCH_SPREAD_ID, ParameterValueUpdate::Raw(Box::new(12.0f32))),
        (
            GlitchEffect::PITCH_SPREAD_TYPE_ID,
            ParameterValueUpdate::Raw(Box::new(PitchSpreadType::Octaves)),
        ),
        (GlitchEffect::OVERLAP_ID, ParameterValueUpdate::Raw(Box::new(1.5f32))),
        (GlitchEffect::DURATION_JITTER_ID, ParameterValueUpdate::Raw(Box::new(0.3f32))),
    ];
    for (id, update) in &parameter_updates {
        effect.process_parameter_update(*id, update)?;
    }

    let output_path = args
        .output_path
        .unwrap_or_else(|| PathBuf::from("glitch.wav"));
    let spec = hound::WavSpec {
        channels: CHANNEL_COUNT as u16,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(&output_path, spec)?;

    let total_frames = (LENGTH_IN_SECONDS * SAMPLE_RATE as f32) as usize;
    let seconds_to_frames = |seconds: f32| (seconds * SAMPLE_RATE as f32) as usize;

    let mut buffer = vec![0.0f32; BLOCK_SIZE * CHANNEL_COUNT];
    let mut frame = 0;
    while frame < total_frames {
        let block_frames = BLOCK_SIZE.min(total_frames - frame);
        let block_start = frame;
        let block_end = frame + block_frames;
        let crosses = |seconds: f32| (block_start..block_end).contains(&seconds_to_frames(seconds));

        // Glitch some sections, the last one as 4 step pattern
        if crosses(3.0) || crosses(6.0) || crosses(9.0) {
            if crosses(9.0) {
                effect.process_parameter_update(
                    GlitchEffect::PATTERN_LENGTH_ID,
                    &ParameterValueUpdate::Raw(Box::new(4i32)),
                )?;
            }
            effect.process_message(&GlitchEffectMessage::Trigger)?;
        } else if crosses(5.0) || crosses(8.0) || crosses(11.5) {
            effect.process_message(&GlitchEffectMessage::Stop)?;
        }

        let samples = block_frames * CHANNEL_COUNT;
        for (index, frame_samples) in buffer[..samples]
            .chunks_exact_mut(CHANNEL_COUNT)
            .enumerate()
        {
            frame_samples.fill(test_signal(frame + index));
        }
        effect.process(&mut buffer[..samples]);
        for sample in &buffer[..samples] {
            writer.write_sample(*sample)?;
        }
        frame += block_frames;
    }
    writer.finalize()?;

    log::info!("Rendered {} seconds into '{}'", LENGTH_IN_SECONDS, output_path.display());
    Ok(())
}
