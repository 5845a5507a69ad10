//! The `Tone` record queued between producers and the generator's synthesis
//! thread.

use crate::error::{CwError, Result};

/// Highest frequency a [`Tone`] may carry, in Hz.
pub const FREQUENCY_MAX: i32 = 4000;

/// Duration a [`Tone::forever`] tone actually carries. It is re-read from
/// the queue head on every dequeue rather than consumed, so this only
/// needs to be short enough that the synthesis thread revisits it often;
/// it is not the tone's real-world duration.
pub const FOREVER_TONE_TICK_US: i64 = 1_000;

/// Per-tone amplitude-envelope shaping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlopeMode {
    /// No rise or fall; full amplitude for the whole tone.
    #[default]
    NoSlopes,
    /// Rising slope only, then full amplitude.
    RisingOnly,
    /// Full amplitude, then falling slope.
    FallingOnly,
    /// Both rising and falling slopes (the common case).
    StandardBoth,
}

/// One queued audio element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    /// Duration in microseconds. `0` means "drop on enqueue".
    pub length_us: i64,
    /// Tone frequency in Hz, `0..=4000`. `0` means silence.
    pub frequency_hz: i32,
    pub slope_mode: SlopeMode,
    /// When set and this is the last tone in the queue, `dequeue` keeps
    /// re-returning it instead of removing it.
    pub is_forever: bool,
    /// Marks the first tone belonging to a character (used by `handle_backspace`).
    pub is_first: bool,
}

impl Tone {
    /// Construct a tone, validating frequency and duration.
    /// Does not itself implement the "`length_us == 0` means drop" rule;
    /// that is a queue-level concern (see `ToneQueue::enqueue`).
    pub fn new(length_us: i64, frequency_hz: i32, slope_mode: SlopeMode) -> Result<Self> {
        if length_us < 0 {
            return Err(CwError::Invalid(format!(
                "tone length_us must be >= 0, got {length_us}"
            )));
        }
        if !(0..=FREQUENCY_MAX).contains(&frequency_hz) {
            return Err(CwError::Invalid(format!(
                "tone frequency_hz must be in 0..={FREQUENCY_MAX}, got {frequency_hz}"
            )));
        }
        Ok(Tone {
            length_us,
            frequency_hz,
            slope_mode,
            is_forever: false,
            is_first: false,
        })
    }

    pub fn silence(length_us: i64) -> Result<Self> {
        Tone::new(length_us, 0, SlopeMode::NoSlopes)
    }

    pub fn forever(frequency_hz: i32, slope_mode: SlopeMode) -> Result<Self> {
        let mut t = Tone::new(FOREVER_TONE_TICK_US, frequency_hz, slope_mode)?;
        t.is_forever = true;
        Ok(t)
    }

    pub fn with_first(mut self, is_first: bool) -> Self {
        self.is_first = is_first;
        self
    }

    pub fn is_silent(&self) -> bool {
        self.frequency_hz == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_frequency() {
        assert!(Tone::new(100, -1, SlopeMode::NoSlopes).is_err());
        assert!(Tone::new(100, FREQUENCY_MAX + 1, SlopeMode::NoSlopes).is_err());
        assert!(Tone::new(100, FREQUENCY_MAX, SlopeMode::NoSlopes).is_ok());
    }

    #[test]
    fn rejects_negative_length() {
        assert!(Tone::new(-1, 440, SlopeMode::NoSlopes).is_err());
    }

    #[test]
    fn forever_tone_flags_set() {
        let t = Tone::forever(600, SlopeMode::StandardBoth).unwrap();
        assert!(t.is_forever);
        assert_eq!(t.length_us, FOREVER_TONE_TICK_US);
    }
}
