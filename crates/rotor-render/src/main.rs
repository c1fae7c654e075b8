//! Rotor offline renderer
//!
//! Runs a WAV file through the phase rotation engine block by block, the
//! same way a host would, and writes the result as 32-bit float WAV.
//!
//! ## Usage
//!
//! ```text
//! rotor-render <in.wav> <out.wav> [--config path] [--stages N]
//!              [--frequency HZ] [--resonance Q] [--spread HZ] [--linear]
//!              [--interval N] [--block N]
//! ```
//!
//! Without `--config` the default config file is read if it exists.
//! Command line values override the config.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use rotor_core::config::{self, RotorConfig};
use rotor_core::types::{AudioChannels, ChannelBuffer};
use rotor_core::{ProcessSpec, SpreadCurve};

#[derive(Parser, Debug)]
#[command(name = "rotor-render", about = "Render a WAV file through the Rotor phase rotator")]
struct RenderArgs {
    /// Input WAV file
    #[arg()]
    input: PathBuf,

    /// Output WAV file (32-bit float)
    #[arg()]
    output: PathBuf,

    /// Config file (defaults to the user config if present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of all-pass stages
    #[arg(long)]
    stages: Option<u32>,

    /// Center frequency in Hz
    #[arg(long)]
    frequency: Option<f32>,

    /// Resonance (Q)
    #[arg(long)]
    resonance: Option<f32>,

    /// Spread width in Hz, may be negative
    #[arg(long, allow_negative_numbers = true)]
    spread: Option<f32>,

    /// Distribute stages linearly instead of logarithmically
    #[arg(long)]
    linear: bool,

    /// Samples between coefficient recomputes while ramping
    #[arg(long)]
    interval: Option<u32>,

    /// Block size in samples
    #[arg(long = "block", default_value_t = 512)]
    block_size: usize,
}

impl RenderArgs {
    /// Fold command line overrides into the loaded config
    fn apply(&self, config: &mut RotorConfig) {
        let params = &mut config.params;
        if let Some(stages) = self.stages {
            params.filter_stages = stages;
        }
        if let Some(frequency) = self.frequency {
            params.frequency = frequency;
        }
        if let Some(resonance) = self.resonance {
            params.resonance = resonance;
        }
        if let Some(spread) = self.spread {
            params.spread = spread;
        }
        // Without the flag the config decides
        if self.linear {
            params.spread_curve = SpreadCurve::from_linear(true);
        }
        if let Some(interval) = self.interval {
            params.smoothing_interval = interval;
        }
    }
}

/// Read a WAV file into a planar buffer scaled to [-1, 1]
fn read_wav(path: &Path) -> Result<(ChannelBuffer, u32)> {
    let reader = WavReader::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    let spec = reader.spec();
    let num_channels = spec.channels as usize;
    if num_channels == 0 {
        bail!("{:?} has no channels", path);
    }

    log::info!(
        "Input: {} ch, {} Hz, {}-bit {:?}",
        spec.channels,
        spec.sample_rate,
        spec.bits_per_sample,
        spec.sample_format
    );

    let mut interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<_, _>>()
            .context("Failed to decode float samples")?,
        SampleFormat::Int => {
            let scale = 1.0 / (1_i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|s| s as f32 * scale))
                .collect::<Result<_, _>>()
                .context("Failed to decode integer samples")?
        }
    };

    // Drop a trailing partial frame
    interleaved.truncate(interleaved.len() - interleaved.len() % num_channels);
    Ok((
        ChannelBuffer::from_interleaved(&interleaved, num_channels),
        spec.sample_rate,
    ))
}

fn write_wav(path: &Path, buffer: &ChannelBuffer, sample_rate: u32) -> Result<()> {
    let spec = WavSpec {
        channels: buffer.num_channels() as u16,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer =
        WavWriter::create(path, spec).with_context(|| format!("Failed to create {:?}", path))?;

    for sample in buffer.to_interleaved() {
        writer.write_sample(sample)?;
    }
    writer.finalize().context("Failed to finalize output WAV")?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = RenderArgs::parse();

    let mut config: RotorConfig = match &args.config {
        Some(path) => config::try_load_config(path)?,
        None => config::load_config(&config::default_config_path(config::CONFIG_FILENAME)),
    };
    args.apply(&mut config);
    // Offline rendering must see every stage change before the next block
    config.engine.background_reconfiguration = false;

    let (mut buffer, sample_rate) = read_wav(&args.input)?;
    let num_channels = buffer.num_channels();

    let block_size = args.block_size.max(1);
    let spec = ProcessSpec::new(sample_rate as f32, block_size, num_channels);

    let (mut engine, mut controller) = rotor_core::create(&config);
    controller.prepare(spec)?;
    engine.prepare(spec)?;

    let params = controller.params();
    log::info!(
        "Rendering {:?}: {} stages, {} Hz, Q {}, spread {} Hz ({:?}), interval {}",
        args.input,
        params.filter_stages,
        params.frequency,
        params.resonance,
        params.spread,
        params.spread_curve,
        params.smoothing_interval
    );

    let frames = buffer.len();
    let mut start = 0;
    while start < frames {
        let end = (start + block_size).min(frames);
        let mut block: Vec<&mut [f32]> = buffer
            .channels_mut()
            .map(|channel| &mut channel[start..end])
            .collect();
        engine.process(&mut block[..]);
        start = end;
    }

    write_wav(&args.output, &buffer, sample_rate)?;
    log::info!(
        "Wrote {} frames to {:?} ({} coefficient updates)",
        frames,
        args.output,
        engine.coefficient_updates()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        RenderArgs::command().debug_assert();
    }

    #[test]
    fn test_parse_positional_and_flags() {
        let parsed = RenderArgs::try_parse_from([
            "rotor-render",
            "in.wav",
            "--stages",
            "64",
            "out.wav",
            "--spread",
            "-800",
            "--linear",
        ])
        .unwrap();

        assert_eq!(parsed.input, PathBuf::from("in.wav"));
        assert_eq!(parsed.output, PathBuf::from("out.wav"));
        assert_eq!(parsed.stages, Some(64));
        assert_eq!(parsed.spread, Some(-800.0));
        assert!(parsed.linear);
        assert_eq!(parsed.block_size, 512);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        let parse = |args: &[&str]| {
            RenderArgs::try_parse_from(std::iter::once("rotor-render").chain(args.iter().copied()))
        };
        assert!(parse(&["in.wav"]).is_err());
        assert!(parse(&["in.wav", "out.wav", "--stages"]).is_err());
        assert!(parse(&["in.wav", "out.wav", "--stages", "many"]).is_err());
        assert!(parse(&["in.wav", "out.wav", "--wet"]).is_err());
    }

    #[test]
    fn test_overrides_apply_to_config() {
        let parsed = RenderArgs::try_parse_from([
            "rotor-render",
            "a.wav",
            "b.wav",
            "--frequency",
            "250",
            "--interval",
            "32",
        ])
        .unwrap();
        let mut config = RotorConfig::default();
        config.params.spread_curve = SpreadCurve::Linear;
        parsed.apply(&mut config);

        assert_eq!(config.params.frequency, 250.0);
        assert_eq!(config.params.smoothing_interval, 32);
        // No --linear: the config's curve stands
        assert_eq!(config.params.spread_curve, SpreadCurve::Linear);

        let parsed =
            RenderArgs::try_parse_from(["rotor-render", "a.wav", "b.wav", "--linear"]).unwrap();
        let mut config = RotorConfig::default();
        parsed.apply(&mut config);
        assert_eq!(config.params.spread_curve, SpreadCurve::Linear);
    }

    #[test]
    fn test_wav_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");

        let buffer = ChannelBuffer::from_channels(vec![vec![0.5, -0.25, 0.0], vec![0.1, 0.2, 0.3]]);
        write_wav(&path, &buffer, 44_100).unwrap();
        let (read, sample_rate) = read_wav(&path).unwrap();

        assert_eq!(sample_rate, 44_100);
        assert_eq!(read, buffer);
    }
}
