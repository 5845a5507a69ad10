//! Straight key: a single boolean line, keyed directly through the
//! generator's tone queue.

use std::sync::{Arc, Mutex, Weak};

use cw_core::tone::{SlopeMode, Tone};
use cw_generator::Generator;
use cw_receiver::Receiver;

use crate::error::{KeyError, Result};

struct Inner {
    value_closed: bool,
    receiver: Option<Weak<Receiver>>,
}

/// Non-owning handle to a [`Generator`]: a `StraightKey` must be dropped
/// before its generator. Using a
/// `Weak` makes a dangling reference a runtime `GeneratorGone` error
/// instead of a use-after-free. Optionally also forwards its transitions
/// to a [`Receiver`], held the same non-owning way.
pub struct StraightKey {
    generator: Weak<Generator>,
    inner: Mutex<Inner>,
}

impl StraightKey {
    pub fn new(generator: &Arc<Generator>) -> Self {
        StraightKey {
            generator: Arc::downgrade(generator),
            inner: Mutex::new(Inner {
                value_closed: false,
                receiver: None,
            }),
        }
    }

    /// Also feed this key's transitions into `receiver` as
    /// `mark_begin`/`mark_end` calls, alongside the generator side-tone.
    pub fn set_receiver(&self, receiver: &Arc<Receiver>) {
        self.inner.lock().unwrap().receiver = Some(Arc::downgrade(receiver));
    }

    /// Stop feeding a previously attached receiver.
    pub fn clear_receiver(&self) {
        self.inner.lock().unwrap().receiver = None;
    }

    /// Update the key line. `true` = closed (keying down). Starts or cancels
    /// the audible side-tone via the generator's tone queue, and reports the
    /// same transition to an attached receiver as `mark_begin`/`mark_end`.
    pub fn notify_event(&self, closed: bool) -> Result<()> {
        let generator = self.generator.upgrade().ok_or(KeyError::GeneratorGone)?;
        let ts = generator.now_us();
        let mut g = self.inner.lock().unwrap();
        if g.value_closed == closed {
            return Ok(());
        }
        g.value_closed = closed;
        let receiver = g.receiver.as_ref().and_then(Weak::upgrade);
        drop(g);

        if closed {
            generator.flush_queue();
            let tone = Tone::forever(generator.frequency_hz(), SlopeMode::StandardBoth)
                .map_err(KeyError::from)?;
            generator.enqueue_tone(tone).map_err(KeyError::from)?;
            if let Some(rx) = receiver {
                rx.mark_begin(ts).map_err(KeyError::from)?;
            }
        } else {
            generator.flush_queue();
            if let Some(rx) = receiver {
                rx.mark_end(ts).map_err(KeyError::from)?;
            }
        }
        Ok(())
    }

    pub fn is_busy(&self) -> bool {
        self.inner.lock().unwrap().value_closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cw_generator::AudioSink;

    /// Sink that discards everything; `cw-generator`'s own recording sink
    /// is test-private, so this crate's tests need their own no-op stand-in.
    struct NullSink;

    impl AudioSink for NullSink {
        fn sample_rate(&self) -> u32 {
            8000
        }
        fn frame_size(&self) -> usize {
            64
        }
        fn write_frames(&mut self, samples: &[f32]) -> cw_core::error::Result<usize> {
            Ok(samples.len())
        }
    }

    fn generator() -> Arc<Generator> {
        let sink: Box<dyn AudioSink> = Box::new(NullSink);
        Generator::new(sink).unwrap()
    }

    #[test]
    fn closing_starts_forever_tone_and_opening_cancels_it() {
        let gen = generator();
        let key = StraightKey::new(&gen);
        assert!(!key.is_busy());
        key.notify_event(true).unwrap();
        assert!(key.is_busy());
        assert_eq!(gen.get_queue_length(), 1);
        key.notify_event(false).unwrap();
        assert!(!key.is_busy());
        assert_eq!(gen.get_queue_length(), 0);
    }

    #[test]
    fn dropped_generator_yields_generator_gone() {
        let gen = generator();
        let key = StraightKey::new(&gen);
        drop(gen);
        assert!(matches!(key.notify_event(true), Err(KeyError::GeneratorGone)));
    }

    #[test]
    fn attached_receiver_gets_mark_begin_and_end() {
        let gen = generator();
        let key = StraightKey::new(&gen);
        let rx = Arc::new(Receiver::new(20, 35, false));
        key.set_receiver(&rx);

        key.notify_event(true).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(50));
        key.notify_event(false).unwrap();

        // A mark was recorded: poll far enough past mark_end to force the
        // buffered representation out, regardless of how it classified.
        let result = rx.poll_representation(10_000_000);
        assert!(result.is_some());
        assert!(!result.unwrap().representation.is_empty());
    }

    #[test]
    fn cleared_receiver_stops_receiving_marks() {
        let gen = generator();
        let key = StraightKey::new(&gen);
        let rx = Arc::new(Receiver::new(20, 35, false));
        key.set_receiver(&rx);
        key.clear_receiver();

        key.notify_event(true).unwrap();
        key.notify_event(false).unwrap();

        assert!(rx.poll_representation(10_000_000).is_none());
    }
}
