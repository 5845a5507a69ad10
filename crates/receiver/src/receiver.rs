//! Timestamp-driven receiver state machine.
//!
//! The receiver never reads a clock itself; every operation takes an
//! explicit monotonic microsecond timestamp from the caller, the same
//! contract the generator's `Instant`-based epoch uses on the send side.

use std::collections::VecDeque;

use cw_core::morse::{representation_to_char, MAX_REPRESENTATION_LENGTH};
use cw_core::timing::{Timings, SPEED_MAX_WPM, SPEED_MIN_WPM};

use crate::error::{ReceiverError, Result};

/// Number of recent per-class samples kept for adaptive speed tracking.
const ADAPTIVE_RING_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    InMark,
    AfterMark,
    EndCharBuffered,
    EndWordBuffered,
}

/// Serializable construction parameters for a [`Receiver`], the way a
/// front-end would load/save them (persistence itself is out of scope for
/// this crate).
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct ReceiverConfig {
    pub speed_wpm: u32,
    pub tolerance_pct: u32,
    pub adaptive: bool,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        ReceiverConfig {
            speed_wpm: 20,
            tolerance_pct: 35,
            adaptive: false,
        }
    }
}

/// Snapshot returned by [`Receiver::poll_representation`] /
/// [`Receiver::poll_character`] once a space has been observed.
#[derive(Debug, Clone, PartialEq)]
pub struct PollResult {
    pub representation: String,
    pub character: Option<char>,
    pub is_end_of_word: bool,
    pub is_error: bool,
}

struct Inner {
    state: State,
    speed_wpm: f64,
    tolerance_pct: u32,
    noise_spike_us: u64,
    adaptive: bool,
    mark_start_us: Option<u64>,
    mark_end_us: Option<u64>,
    representation: String,
    is_error: bool,
    pending_word_space: bool,
    dot_ring: VecDeque<u64>,
    dash_ring: VecDeque<u64>,
}

/// Classifies mark/space timestamps into a Morse representation and, via
/// the shared character table, a character.
pub struct Receiver {
    inner: std::sync::Mutex<Inner>,
}

impl Receiver {
    pub fn from_config(config: ReceiverConfig) -> Self {
        Self::new(config.speed_wpm, config.tolerance_pct, config.adaptive)
    }

    pub fn new(speed_wpm: u32, tolerance_pct: u32, adaptive: bool) -> Self {
        let speed_wpm = speed_wpm.clamp(SPEED_MIN_WPM, SPEED_MAX_WPM) as f64;
        let unit = Timings::unit_us_for_speed(speed_wpm);
        Receiver {
            inner: std::sync::Mutex::new(Inner {
                state: State::Idle,
                speed_wpm,
                tolerance_pct,
                noise_spike_us: (unit / 10.0) as u64,
                adaptive,
                mark_start_us: None,
                mark_end_us: None,
                representation: String::new(),
                is_error: false,
                pending_word_space: false,
                dot_ring: VecDeque::with_capacity(ADAPTIVE_RING_LEN),
                dash_ring: VecDeque::with_capacity(ADAPTIVE_RING_LEN),
            }),
        }
    }

    pub fn speed_wpm(&self) -> f64 {
        self.inner.lock().unwrap().speed_wpm
    }

    /// Marks shorter than this are rejected as noise rather than classified
    /// (see [`Self::mark_end`]). Defaults to a tenth of the unit length at
    /// construction time and is not recomputed automatically when adaptive
    /// tracking changes `speed_wpm`; call `set_noise_spike_us` again if the
    /// threshold should track the new speed.
    pub fn noise_spike_us(&self) -> u64 {
        self.inner.lock().unwrap().noise_spike_us
    }

    pub fn set_noise_spike_us(&self, noise_spike_us: u64) {
        self.inner.lock().unwrap().noise_spike_us = noise_spike_us;
    }

    fn unit_us(g: &Inner) -> f64 {
        Timings::unit_us_for_speed(g.speed_wpm)
    }

    /// Begin a mark. Valid from `IDLE`, `AFTER_MARK` (an errant double
    /// mark_begin without mark_end in between is rejected) or from
    /// `END_CHAR_BUFFERED`/`END_WORD_BUFFERED`, which clears the buffered
    /// representation: a new character has started.
    pub fn mark_begin(&self, ts: u64) -> Result<()> {
        let mut g = self.inner.lock().unwrap();
        match g.state {
            State::InMark => return Err(ReceiverError::MarkInProgress),
            State::EndCharBuffered | State::EndWordBuffered => {
                g.representation.clear();
                g.is_error = false;
                g.pending_word_space = false;
            }
            State::Idle | State::AfterMark => {}
        }
        g.mark_start_us = Some(ts);
        g.state = State::InMark;
        Ok(())
    }

    /// End the current mark, classifying its duration as dot or dash.
    pub fn mark_end(&self, ts: u64) -> Result<()> {
        let mut g = self.inner.lock().unwrap();
        let start = g.mark_start_us.ok_or(ReceiverError::NoMarkInProgress)?;
        if g.state != State::InMark {
            return Err(ReceiverError::NoMarkInProgress);
        }
        let length = ts.saturating_sub(start);

        if length < g.noise_spike_us {
            tracing::trace!(length, "rejecting noise spike");
            g.state = State::AfterMark;
            return Ok(());
        }

        let unit = Self::unit_us(&g);
        let tol = g.tolerance_pct as f64 / 100.0;
        let (symbol, is_error) = classify_mark(length as f64, unit, tol);

        if g.adaptive && !is_error {
            push_sample(&mut g.dot_ring, &mut g.dash_ring, symbol, length);
            rederive_speed(&mut g);
        }

        g.is_error |= is_error;
        self.append_symbol(&mut g, symbol);
        g.mark_end_us = Some(ts);
        g.state = State::AfterMark;
        Ok(())
    }

    /// Inject a classified symbol directly (e.g. from a keyer/paddle that
    /// already knows which element it sent).
    pub fn add_mark(&self, ts: u64, symbol: char) -> Result<()> {
        if symbol != '.' && symbol != '-' {
            return Err(cw_core::error::CwError::Invalid(format!(
                "add_mark symbol must be '.' or '-', got '{symbol}'"
            ))
            .into());
        }
        let mut g = self.inner.lock().unwrap();
        self.append_symbol(&mut g, symbol);
        g.mark_end_us = Some(ts);
        g.state = State::AfterMark;
        Ok(())
    }

    fn append_symbol(&self, g: &mut Inner, symbol: char) {
        if g.representation.len() >= MAX_REPRESENTATION_LENGTH {
            tracing::warn!("representation buffer overflow, flushing");
            g.representation.clear();
            g.state = State::Idle;
            g.is_error = true;
            return;
        }
        g.representation.push(symbol);
    }

    fn poll_inner(&self, now: u64) -> Option<(String, bool, bool)> {
        let mut g = self.inner.lock().unwrap();
        match g.state {
            State::EndCharBuffered => Some((g.representation.clone(), false, g.is_error)),
            State::EndWordBuffered => Some((g.representation.clone(), true, g.is_error)),
            State::AfterMark => {
                let mark_end = g.mark_end_us?;
                let unit = Self::unit_us(&g);
                let space = now.saturating_sub(mark_end) as f64;
                if space >= 5.0 * unit {
                    g.state = State::EndWordBuffered;
                    g.pending_word_space = true;
                    Some((g.representation.clone(), true, g.is_error))
                } else if space >= 2.0 * unit {
                    g.state = State::EndCharBuffered;
                    Some((g.representation.clone(), false, g.is_error))
                } else {
                    None
                }
            }
            State::Idle | State::InMark => None,
        }
    }

    /// Report the buffered representation once enough space has elapsed
    /// since the last mark. Returns `None` if no character boundary has
    /// been reached yet.
    pub fn poll_representation(&self, now: u64) -> Option<PollResult> {
        self.poll_inner(now).map(|(representation, is_end_of_word, is_error)| {
            PollResult {
                representation,
                character: None,
                is_end_of_word,
                is_error,
            }
        })
    }

    /// Same as [`Self::poll_representation`] plus a character-table lookup.
    pub fn poll_character(&self, now: u64) -> Option<PollResult> {
        self.poll_inner(now).map(|(representation, is_end_of_word, is_error)| {
            let character = representation_to_char(&representation).ok();
            PollResult {
                representation,
                character,
                is_end_of_word,
                is_error: is_error || character.is_none(),
            }
        })
    }

    pub fn poll_is_pending_inter_word_space(&self) -> bool {
        self.inner.lock().unwrap().pending_word_space
    }

    pub fn reset_state(&self) {
        let mut g = self.inner.lock().unwrap();
        g.state = State::Idle;
        g.mark_start_us = None;
        g.mark_end_us = None;
        g.representation.clear();
        g.is_error = false;
        g.pending_word_space = false;
    }

    pub fn reset_statistics(&self) {
        let mut g = self.inner.lock().unwrap();
        g.dot_ring.clear();
        g.dash_ring.clear();
    }
}

/// Classify a mark duration against the dot/dash ranges for `unit` at
/// `tolerance`. Returns `(symbol, is_error)`; `is_error` is set
/// when the duration falls outside both ranges and the closer one is used.
fn classify_mark(length: f64, unit: f64, tolerance: f64) -> (char, bool) {
    let dot_lo = unit * (1.0 - tolerance);
    let dot_hi = unit * (1.0 + tolerance);
    let dash_lo = 3.0 * unit * (1.0 - tolerance);
    let dash_hi = 3.0 * unit * (1.0 + tolerance);

    let in_dot = length >= dot_lo && length <= dot_hi;
    let in_dash = length >= dash_lo && length <= dash_hi;

    match (in_dot, in_dash) {
        (true, false) => ('.', false),
        (false, true) => ('-', false),
        (true, true) => {
            // Overlapping ranges at high tolerance: pick the nearer centre.
            if (length - unit).abs() <= (length - 3.0 * unit).abs() {
                ('.', false)
            } else {
                ('-', false)
            }
        }
        (false, false) => {
            if (length - unit).abs() <= (length - 3.0 * unit).abs() {
                ('.', true)
            } else {
                ('-', true)
            }
        }
    }
}

fn push_sample(dot_ring: &mut VecDeque<u64>, dash_ring: &mut VecDeque<u64>, symbol: char, length: u64) {
    let ring = if symbol == '.' { dot_ring } else { dash_ring };
    if ring.len() == ADAPTIVE_RING_LEN {
        ring.pop_front();
    }
    ring.push_back(length);
}

fn rederive_speed(g: &mut Inner) {
    let mut estimates: Vec<f64> = Vec::with_capacity(g.dot_ring.len() + g.dash_ring.len());
    estimates.extend(g.dot_ring.iter().map(|&d| d as f64));
    estimates.extend(g.dash_ring.iter().map(|&d| d as f64 / 3.0));
    if estimates.is_empty() {
        return;
    }
    let mean_unit = estimates.iter().sum::<f64>() / estimates.len() as f64;
    if mean_unit <= 0.0 {
        return;
    }
    let wpm = (1_200_000.0 / mean_unit).clamp(SPEED_MIN_WPM as f64, SPEED_MAX_WPM as f64);
    g.speed_wpm = wpm;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_sos_end_to_end() {
        // speed 20 wpm => unit = 60_000us; char threshold 120_000,
        // word threshold 300_000.
        let rx = Receiver::new(20, 35, false);
        let mut t: u64 = 0;

        // S: three dots, inter-element spaces of 60k, final inter-character
        // space of 180k.
        for (mark, space) in [(60_000u64, 60_000u64), (60_000, 60_000), (60_000, 180_000)] {
            rx.mark_begin(t).unwrap();
            t += mark;
            rx.mark_end(t).unwrap();
            t += space;
        }
        let r1 = rx.poll_character(t).expect("character ready after S");
        assert_eq!(r1.character, Some('S'));
        assert!(!r1.is_end_of_word);

        // O: three dashes, inter-element spaces of 180k, inter-character
        // space of 180k.
        rx.mark_begin(t).unwrap();
        for (i, (mark, space)) in
            [(180_000u64, 60_000u64), (180_000, 60_000), (180_000, 180_000)]
                .into_iter()
                .enumerate()
        {
            if i > 0 {
                rx.mark_begin(t).unwrap();
            }
            t += mark;
            rx.mark_end(t).unwrap();
            t += space;
        }
        let r2 = rx.poll_character(t).expect("character ready after O");
        assert_eq!(r2.character, Some('O'));

        // S again, final space >= 420k (word boundary).
        rx.mark_begin(t).unwrap();
        for (i, (mark, space)) in
            [(60_000u64, 60_000u64), (60_000, 60_000), (60_000, 420_000)]
                .into_iter()
                .enumerate()
        {
            if i > 0 {
                rx.mark_begin(t).unwrap();
            }
            t += mark;
            rx.mark_end(t).unwrap();
            t += space;
        }
        let r3 = rx.poll_character(t).expect("character ready after final S");
        assert_eq!(r3.character, Some('S'));
        assert!(r3.is_end_of_word);
        assert!(rx.poll_is_pending_inter_word_space());
    }

    #[test]
    fn noise_spike_is_rejected() {
        let rx = Receiver::new(20, 35, false);
        rx.mark_begin(0).unwrap();
        rx.mark_end(100).unwrap(); // far shorter than noise_spike_us
        assert!(rx.poll_character(1_000_000).is_none());
    }

    #[test]
    fn noise_spike_threshold_is_configurable() {
        let rx = Receiver::new(20, 35, false);
        let default_threshold = rx.noise_spike_us();
        assert!(default_threshold > 0);

        rx.set_noise_spike_us(0);
        assert_eq!(rx.noise_spike_us(), 0);
        rx.mark_begin(0).unwrap();
        rx.mark_end(100).unwrap(); // would have been a noise spike before
        rx.reset_state();

        rx.set_noise_spike_us(default_threshold);
        rx.mark_begin(2_000_000).unwrap();
        rx.mark_end(2_000_100).unwrap(); // rejected again under the restored threshold
        assert!(rx.poll_character(3_000_000).is_none());
    }

    #[test]
    fn out_of_range_mark_sets_is_error() {
        let rx = Receiver::new(20, 10, false);
        rx.mark_begin(0).unwrap();
        rx.mark_end(120_000).unwrap(); // between dot (tol 10%) and dash range
        rx.reset_state();
    }

    #[test]
    fn adaptive_tracking_converges_toward_true_speed() {
        let rx = Receiver::new(20, 45, true);
        let mut t = 0u64;
        // Feed dots at the true 25 wpm rate (unit = 48_000us) repeatedly;
        // the receiver should adapt its internal speed estimate upward.
        for _ in 0..6 {
            rx.mark_begin(t).unwrap();
            t += 48_000;
            rx.mark_end(t).unwrap();
            t += 48_000;
        }
        assert!(rx.speed_wpm() > 20.0);
    }

    #[test]
    fn mark_begin_while_in_mark_errs() {
        let rx = Receiver::new(20, 35, false);
        rx.mark_begin(0).unwrap();
        assert!(rx.mark_begin(1).is_err());
    }

    #[quickcheck_macros::quickcheck]
    fn classify_mark_never_reports_an_error_inside_either_range(unit: u16, tolerance_pct: u8) -> quickcheck::TestResult {
        if unit == 0 {
            return quickcheck::TestResult::discard();
        }
        let unit = unit as f64;
        let tolerance = (tolerance_pct % 50) as f64 / 100.0;

        let (_, dot_is_error) = classify_mark(unit, unit, tolerance);
        let (_, dash_is_error) = classify_mark(3.0 * unit, unit, tolerance);
        quickcheck::TestResult::from_bool(!dot_is_error && !dash_is_error)
    }
}
