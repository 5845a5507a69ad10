//! cw-synth: render a string of text as a Morse-code WAV file.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use cw_generator::Generator;
use cw_tools::WavFileSink;

#[derive(Debug, Clone, Parser)]
#[command(name = "cw-synth")]
#[command(about = "Render text as a Morse-code WAV file")]
struct SynthArgs {
    /// Text to send.
    text: String,

    /// Output WAV path.
    #[arg(short, long, default_value = "out.wav")]
    output: PathBuf,

    /// Sending speed, in words per minute.
    #[arg(short, long, default_value_t = 20)]
    speed_wpm: u32,

    /// Sidetone frequency, in Hz.
    #[arg(short, long, default_value_t = 700)]
    frequency_hz: i32,

    /// Volume, as a percentage.
    #[arg(long, default_value_t = 80)]
    volume_pct: u8,

    /// Sample rate of the rendered WAV file.
    #[arg(long, default_value_t = 48_000)]
    sample_rate: u32,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let args = SynthArgs::parse();

    let sink = WavFileSink::create(&args.output, args.sample_rate, 256)?;
    let generator = Generator::new(Box::new(sink))?;
    generator.set_speed_wpm(args.speed_wpm)?;
    generator.set_frequency_hz(args.frequency_hz)?;
    generator.set_volume_pct(args.volume_pct)?;

    generator.start()?;
    generator.enqueue_string(&args.text)?;
    generator.wait_for_queue_level(0)?;
    // Let the synthesis thread flush the tail of the last tone before we
    // tear the sink down.
    std::thread::sleep(std::time::Duration::from_millis(100));
    generator.stop()?;

    tracing::info!(output = %args.output.display(), "wrote WAV file");
    Ok(())
}
