//! Shared plumbing for the `cw-tools` demonstration binaries: a
//! [`hound`]-backed [`cw_generator::AudioSink`] and the JSON mark/space
//! format `cw-replay` consumes.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use cw_generator::AudioSink;
use serde::{Deserialize, Serialize};

/// Writes the generator's PCM output straight to a 16-bit mono WAV file.
pub struct WavFileSink {
    writer: hound::WavWriter<BufWriter<File>>,
    sample_rate: u32,
    frame_size: usize,
}

impl WavFileSink {
    pub fn create(path: impl AsRef<Path>, sample_rate: u32, frame_size: usize) -> anyhow::Result<Self> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let writer = hound::WavWriter::create(path, spec)?;
        Ok(WavFileSink {
            writer,
            sample_rate,
            frame_size,
        })
    }
}

impl AudioSink for WavFileSink {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn frame_size(&self) -> usize {
        self.frame_size
    }

    fn write_frames(&mut self, samples: &[f32]) -> cw_core::error::Result<usize> {
        for &s in samples {
            let clamped = s.clamp(-1.0, 1.0);
            self.writer
                .write_sample((clamped * i16::MAX as f32) as i16)
                .map_err(|e| cw_core::error::CwError::Io(e.to_string()))?;
        }
        Ok(samples.len())
    }
}

/// One (mark, space) duration pair, in microseconds, as produced by an
/// external segmentation step; `cw-replay` feeds these straight into a
/// [`cw_receiver::Receiver`] (segmenting raw audio into timestamps is out
/// of scope, per the receiver's external-collaborator boundary).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MarkSpace {
    pub mark_us: u64,
    pub space_us: u64,
}
