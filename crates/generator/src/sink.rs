//! Audio sink plugin contract.
//!
//! Concrete sound-system back-ends (null/console/OSS/ALSA/PulseAudio) are
//! deliberately out of scope; this module specifies only the
//! interface the synthesis thread drives. `open`/`close` map onto
//! construction/`Drop` in Rust rather than a separate handle, which is the
//! idiomatic equivalent of the C `open(device) -> handle` / `close(handle)`
//! pair.

use cw_core::error::Result;

/// A blocking PCM sink the synthesis thread renders into. Implementations
/// must accept blocking writes: the synthesis thread treats the sink as
/// providing its own back-pressure.
pub trait AudioSink: Send {
    /// Sample rate the sink actually runs at; the generator derives its
    /// slope table and oscillator step from this value.
    fn sample_rate(&self) -> u32;

    /// Native frame size of the sink, in samples. Partial frames are
    /// buffered across tones by the synthesis thread.
    fn frame_size(&self) -> usize;

    /// Write interleaved mono samples (single channel) in `[-1.0, 1.0]`.
    /// Returns the number of samples actually written.
    fn write_frames(&mut self, samples: &[f32]) -> Result<usize>;
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// In-memory sink used only by this crate's own tests; concrete
    /// backends live outside this crate's scope.
    #[derive(Clone)]
    pub struct RecordingSink {
        sample_rate: u32,
        frame_size: usize,
        pub samples: Arc<Mutex<Vec<f32>>>,
        pub fail_next_n: Arc<Mutex<usize>>,
    }

    impl RecordingSink {
        pub fn new(sample_rate: u32, frame_size: usize) -> Self {
            RecordingSink {
                sample_rate,
                frame_size,
                samples: Arc::new(Mutex::new(Vec::new())),
                fail_next_n: Arc::new(Mutex::new(0)),
            }
        }

        pub fn recorded_len(&self) -> usize {
            self.samples.lock().unwrap().len()
        }

        pub fn arrange_failures(&self, n: usize) {
            *self.fail_next_n.lock().unwrap() = n;
        }
    }

    impl AudioSink for RecordingSink {
        fn sample_rate(&self) -> u32 {
            self.sample_rate
        }

        fn frame_size(&self) -> usize {
            self.frame_size
        }

        fn write_frames(&mut self, samples: &[f32]) -> Result<usize> {
            let mut remaining = self.fail_next_n.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(cw_core::error::CwError::Io("simulated sink failure".into()));
            }
            drop(remaining);
            self.samples.lock().unwrap().extend_from_slice(samples);
            Ok(samples.len())
        }
    }
}
