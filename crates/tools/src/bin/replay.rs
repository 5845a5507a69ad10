//! cw-replay: feed a JSON array of (mark, space) duration pairs through a
//! [`cw_receiver::Receiver`] and print the characters it decodes.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use cw_receiver::Receiver;
use cw_tools::MarkSpace;

#[derive(Debug, Clone, Parser)]
#[command(name = "cw-replay")]
#[command(about = "Decode recorded mark/space timings through the CW receiver")]
struct ReplayArgs {
    /// Path to a JSON file containing an array of {"mark_us", "space_us"}.
    input: PathBuf,

    /// Receiver's nominal speed, in words per minute.
    #[arg(short, long, default_value_t = 20)]
    speed_wpm: u32,

    /// Classification tolerance, as a percentage either side of nominal.
    #[arg(short, long, default_value_t = 35)]
    tolerance_pct: u32,

    /// Track sender speed adaptively instead of using a fixed speed.
    #[arg(long)]
    adaptive: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let args = ReplayArgs::parse();

    let raw = std::fs::read_to_string(&args.input)?;
    let pairs: Vec<MarkSpace> = serde_json::from_str(&raw)?;

    let receiver = Receiver::new(args.speed_wpm, args.tolerance_pct, args.adaptive);
    let mut t: u64 = 0;
    let mut decoded = String::new();

    for pair in pairs {
        receiver.mark_begin(t)?;
        t += pair.mark_us;
        receiver.mark_end(t)?;
        t += pair.space_us;

        if let Some(result) = receiver.poll_character(t) {
            match result.character {
                Some(c) => decoded.push(c),
                None => {
                    tracing::warn!(representation = %result.representation, "no table entry");
                    decoded.push('\u{25a1}'); // replacement glyph for an undecodable representation
                }
            }
            if result.is_end_of_word {
                decoded.push(' ');
            }
        }
    }

    println!("{}", decoded.trim_end());
    Ok(())
}
