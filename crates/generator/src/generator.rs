//! The CW tone generator: owns a tone queue, a slope table and an audio
//! sink handle, and runs the real-time synthesis thread.

use std::f64::consts::PI;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Instant;

use cw_core::error::{CwError, Result};
use cw_core::morse::{char_to_representation, MAX_REPRESENTATION_LENGTH};
use cw_core::slope::{SlopeShape, SlopeTable};
use cw_core::timing::{
    Timings, FREQUENCY_MAX_HZ, FREQUENCY_MIN_HZ, GAP_MAX, GAP_MIN, SPEED_MAX_WPM, SPEED_MIN_WPM,
    VOLUME_MAX_PCT, VOLUME_MIN_PCT, WEIGHTING_MAX, WEIGHTING_MIN,
};
use cw_core::tone::{SlopeMode, Tone};
use cw_core::tone_queue::{DequeueOutcome, ToneQueue, DEFAULT_CAPACITY};

use crate::sink::AudioSink;

/// Library default parameter values.
pub const DEFAULT_SPEED_WPM: u32 = 12;
pub const DEFAULT_FREQUENCY_HZ: i32 = 800;
pub const DEFAULT_VOLUME_PCT: u8 = 70;
pub const DEFAULT_GAP: u32 = 0;
pub const DEFAULT_WEIGHTING: u32 = 50;
pub const DEFAULT_SLOPE_SHAPE: SlopeShape = SlopeShape::RaisedCosine;
pub const DEFAULT_SLOPE_US: u32 = 5000;

/// Number of consecutive sink write failures before the synthesis thread
/// enters degraded mode: it keeps dequeuing so producers aren't
/// blocked, but drops samples, until `stop()`.
const MAX_CONSECUTIVE_IO_ERRORS: usize = 3;

#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct GeneratorConfig {
    pub speed_wpm: u32,
    pub frequency_hz: i32,
    pub volume_pct: u8,
    pub gap: u32,
    pub weighting: u32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig {
            speed_wpm: DEFAULT_SPEED_WPM,
            frequency_hz: DEFAULT_FREQUENCY_HZ,
            volume_pct: DEFAULT_VOLUME_PCT,
            gap: DEFAULT_GAP,
            weighting: DEFAULT_WEIGHTING,
        }
    }
}

impl GeneratorConfig {
    fn timings(&self) -> Timings {
        Timings::derive(self.speed_wpm, self.weighting, self.gap)
    }
}

type KeyingCallback = Box<dyn Fn(u64, bool) + Send + Sync>;

/// Owns exactly one [`ToneQueue`], one [`SlopeTable`], one [`AudioSink`] and
/// one synthesis thread.
pub struct Generator {
    tone_queue: Arc<ToneQueue>,
    slope: Mutex<Arc<SlopeTable>>,
    params: Mutex<GeneratorConfig>,
    sink: Arc<Mutex<Box<dyn AudioSink>>>,
    running: AtomicBool,
    shutting_down: Arc<AtomicBool>,
    degraded: Arc<AtomicBool>,
    thread: Mutex<Option<JoinHandle<()>>>,
    epoch: Instant,
    keying_callback: Arc<Mutex<Option<KeyingCallback>>>,
}

impl Generator {
    /// Create a generator with default parameters and [`DEFAULT_CAPACITY`].
    pub fn new(sink: Box<dyn AudioSink>) -> Result<Arc<Self>> {
        Self::with_tone_queue_capacity(sink, DEFAULT_CAPACITY, DEFAULT_CAPACITY)
    }

    pub fn with_tone_queue_capacity(
        sink: Box<dyn AudioSink>,
        capacity: usize,
        high_water_mark: usize,
    ) -> Result<Arc<Self>> {
        let sample_rate = sink.sample_rate();
        let slope = SlopeTable::new(DEFAULT_SLOPE_SHAPE, DEFAULT_SLOPE_US, sample_rate)?;
        Ok(Arc::new(Generator {
            tone_queue: ToneQueue::with_capacity(capacity, high_water_mark)?,
            slope: Mutex::new(Arc::new(slope)),
            params: Mutex::new(GeneratorConfig::default()),
            sink: Arc::new(Mutex::new(sink)),
            running: AtomicBool::new(false),
            shutting_down: Arc::new(AtomicBool::new(false)),
            degraded: Arc::new(AtomicBool::new(false)),
            thread: Mutex::new(None),
            epoch: Instant::now(),
            keying_callback: Arc::new(Mutex::new(None)),
        }))
    }

    /// Microseconds elapsed since this generator's construction. Shared by
    /// the synthesis thread's keying callback timestamps and by any `Key`
    /// forwarding those transitions on to a `Receiver`.
    pub fn now_us(&self) -> u64 {
        self.epoch.elapsed().as_micros() as u64
    }

    // ---- parameters --------------------------------------------------

    pub fn speed_wpm(&self) -> u32 {
        self.params.lock().unwrap().speed_wpm
    }

    pub fn set_speed_wpm(&self, wpm: u32) -> Result<()> {
        if !(SPEED_MIN_WPM..=SPEED_MAX_WPM).contains(&wpm) {
            return Err(CwError::Invalid(format!(
                "speed_wpm must be in {SPEED_MIN_WPM}..={SPEED_MAX_WPM}, got {wpm}"
            )));
        }
        self.params.lock().unwrap().speed_wpm = wpm;
        Ok(())
    }

    pub fn frequency_hz(&self) -> i32 {
        self.params.lock().unwrap().frequency_hz
    }

    pub fn set_frequency_hz(&self, hz: i32) -> Result<()> {
        if !(FREQUENCY_MIN_HZ..=FREQUENCY_MAX_HZ).contains(&hz) {
            return Err(CwError::Invalid(format!(
                "frequency_hz must be in {FREQUENCY_MIN_HZ}..={FREQUENCY_MAX_HZ}, got {hz}"
            )));
        }
        self.params.lock().unwrap().frequency_hz = hz;
        Ok(())
    }

    pub fn volume_pct(&self) -> u8 {
        self.params.lock().unwrap().volume_pct
    }

    pub fn set_volume_pct(&self, pct: u8) -> Result<()> {
        if !(VOLUME_MIN_PCT..=VOLUME_MAX_PCT).contains(&pct) {
            return Err(CwError::Invalid(format!("volume_pct must be <= {VOLUME_MAX_PCT}")));
        }
        self.params.lock().unwrap().volume_pct = pct;
        Ok(())
    }

    pub fn gap(&self) -> u32 {
        self.params.lock().unwrap().gap
    }

    pub fn set_gap(&self, gap: u32) -> Result<()> {
        if !(GAP_MIN..=GAP_MAX).contains(&gap) {
            return Err(CwError::Invalid(format!("gap must be in {GAP_MIN}..={GAP_MAX}")));
        }
        self.params.lock().unwrap().gap = gap;
        Ok(())
    }

    pub fn weighting(&self) -> u32 {
        self.params.lock().unwrap().weighting
    }

    pub fn set_weighting(&self, weighting: u32) -> Result<()> {
        if !(WEIGHTING_MIN..=WEIGHTING_MAX).contains(&weighting) {
            return Err(CwError::Invalid(format!(
                "weighting must be in {WEIGHTING_MIN}..={WEIGHTING_MAX}"
            )));
        }
        self.params.lock().unwrap().weighting = weighting;
        Ok(())
    }

    pub fn timings(&self) -> Timings {
        self.params.lock().unwrap().timings()
    }

    /// Re-derive the slope table for a new shape/duration. Applied on the
    /// next tone boundary, never mid-tone, since the synthesis thread reads
    /// the shared `Arc<SlopeTable>` once per dequeued tone.
    pub fn set_tone_slope(&self, shape: SlopeShape, slope_us: u32) -> Result<()> {
        let sample_rate = self.sink.lock().unwrap().sample_rate();
        let table = SlopeTable::new(shape, slope_us, sample_rate)?;
        *self.slope.lock().unwrap() = Arc::new(table);
        Ok(())
    }

    // ---- tone queue forwarding ----------------------------

    pub fn register_low_level_callback<F>(&self, level: usize, func: Option<F>) -> Result<()>
    where
        F: Fn(Option<&dyn std::any::Any>) + Send + 'static,
    {
        self.tone_queue.register_low_level_callback(level, func)
    }

    pub fn wait_for_queue_level(&self, level: usize) -> Result<()> {
        self.tone_queue.wait_for_level(level)
    }

    pub fn wait_for_tone(&self) -> Result<()> {
        self.tone_queue.wait_for_tone()
    }

    pub fn is_queue_full(&self) -> bool {
        self.tone_queue.is_full()
    }

    pub fn get_queue_length(&self) -> usize {
        self.tone_queue.length()
    }

    pub fn flush_queue(&self) {
        self.tone_queue.flush()
    }

    pub fn handle_backspace(&self) {
        self.tone_queue.handle_backspace()
    }

    /// External keying callback, invoked at every TK transition with
    /// `(monotonic_timestamp_us, new_state_closed, _)`.
    pub fn register_keying_callback<F>(&self, callback: F)
    where
        F: Fn(u64, bool) + Send + Sync + 'static,
    {
        *self.keying_callback.lock().unwrap() = Some(Box::new(callback));
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Acquire)
    }

    // ---- enqueueing helpers -----------------------------

    /// Enqueue one mark tone at the generator's current frequency, plus its
    /// trailing inter-element/inter-character silence (see
    /// [`Self::enqueue_character_partial`] for the version without the
    /// trailing inter-character gap).
    pub fn enqueue_character(&self, c: char) -> Result<()> {
        self.enqueue_character_internal(c, true)
    }

    pub fn enqueue_character_partial(&self, c: char) -> Result<()> {
        self.enqueue_character_internal(c, false)
    }

    fn enqueue_character_internal(&self, c: char, with_character_gap: bool) -> Result<()> {
        let representation = char_to_representation(c)?;
        debug_assert!(representation.len() <= MAX_REPRESENTATION_LENGTH);
        let params = *self.params.lock().unwrap();
        let t = params.timings();
        let freq = params.frequency_hz;

        let symbols: Vec<char> = representation.chars().collect();
        for (i, sym) in symbols.iter().enumerate() {
            let mark_len = if *sym == '.' { t.dot_us } else { t.dash_us };
            let mark = Tone::new(mark_len, freq, SlopeMode::StandardBoth)?.with_first(i == 0);
            self.tone_queue.enqueue(mark)?;

            let is_last_symbol = i + 1 == symbols.len();
            if !is_last_symbol {
                self.tone_queue
                    .enqueue(Tone::silence(t.inter_element_us)?)?;
            } else if with_character_gap {
                self.tone_queue
                    .enqueue(Tone::silence(t.inter_character_us)?)?;
            }
        }
        Ok(())
    }

    /// Enqueue a string character by character; a space emits an
    /// inter-word gap. Fails with `Invalid` on the first unsupported
    /// character; tones already enqueued for earlier characters remain
    /// queued.
    pub fn enqueue_string(&self, s: &str) -> Result<()> {
        let mut chars = s.chars().peekable();
        while let Some(c) = chars.next() {
            if c == ' ' {
                let t = self.params.lock().unwrap().timings();
                self.tone_queue.enqueue(Tone::silence(t.inter_word_us)?)?;
            } else {
                self.enqueue_character_partial(c)?;
                let is_last = chars.peek().is_none();
                let next_is_space = chars.peek() == Some(&' ');
                if !is_last && !next_is_space {
                    let t = self.params.lock().unwrap().timings();
                    self.tone_queue
                        .enqueue(Tone::silence(t.inter_character_us)?)?;
                } else if is_last {
                    let t = self.params.lock().unwrap().timings();
                    self.tone_queue
                        .enqueue(Tone::silence(t.inter_character_us)?)?;
                }
            }
        }
        Ok(())
    }

    /// Enqueue a single pre-built tone directly (used by the iambic keyer
    /// and straight key to drive audible side-tone).
    pub fn enqueue_tone(&self, tone: Tone) -> Result<()> {
        self.tone_queue.enqueue(tone)
    }

    pub fn tone_queue(&self) -> Arc<ToneQueue> {
        Arc::clone(&self.tone_queue)
    }

    // ---- lifecycle -----------------------------------------------------

    /// Spawn the synthesis thread. Idempotent while already running.
    pub fn start(self: &Arc<Self>) -> Result<()> {
        if self.running.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.shutting_down.store(false, Ordering::Release);
        self.degraded.store(false, Ordering::Release);

        let gen = Arc::clone(self);
        let handle = std::thread::Builder::new()
            .name("cw-generator-synth".into())
            .spawn(move || gen.synthesis_loop())
            .map_err(|e| CwError::NoMemory(e.to_string()))?;
        *self.thread.lock().unwrap() = Some(handle);
        Ok(())
    }

    /// Signal the synthesis thread to exit and join it; closes the sink
    /// device. Leaves the tone queue's contents intact for reconfiguration.
    pub fn stop(&self) -> Result<()> {
        if !self.running.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        self.shutting_down.store(true, Ordering::Release);
        self.tone_queue.wake_consumer();
        if let Some(handle) = self.thread.lock().unwrap().take() {
            handle.join().map_err(|_| CwError::Io("synthesis thread panicked".into()))?;
        }
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    // ---- synthesis thread body ----------------------------

    fn synthesis_loop(self: Arc<Self>) {
        tracing::debug!("cw-generator synthesis thread starting");
        let mut phase: f64 = 0.0;
        let mut pending: Vec<f32> = Vec::new();
        let mut tk_closed = false;
        let mut consecutive_io_errors: usize = 0;

        loop {
            if self.shutting_down.load(Ordering::Acquire) {
                break;
            }

            match self.tone_queue.dequeue() {
                DequeueOutcome::Idle => {
                    let shutting_down = Arc::clone(&self.shutting_down);
                    self.tone_queue
                        .park_consumer_until(|| shutting_down.load(Ordering::Acquire));
                    continue;
                }
                DequeueOutcome::EmptyNewly => {
                    self.set_tk(&mut tk_closed, false);
                    self.render_silence_into(&mut pending, 1, &mut consecutive_io_errors);
                    continue;
                }
                DequeueOutcome::Dequeued {
                    tone,
                    low_water_crossed,
                } => {
                    self.set_tk(&mut tk_closed, !tone.is_silent());
                    self.render_tone(&tone, &mut phase, &mut pending, &mut consecutive_io_errors);
                    if low_water_crossed {
                        self.tone_queue.invoke_low_water_callback();
                    }
                }
            }
        }

        let _ = self.sink.lock().unwrap();
        tracing::debug!("cw-generator synthesis thread exiting");
    }

    fn set_tk(&self, tk_closed: &mut bool, new_closed: bool) {
        if *tk_closed != new_closed {
            *tk_closed = new_closed;
            if let Some(cb) = self.keying_callback.lock().unwrap().as_ref() {
                cb(self.now_us(), new_closed);
            }
        }
    }

    /// Flush one buffer's worth of silence (used on `EmptyNewly` to drain
    /// the previous tone's fall slope).
    fn render_silence_into(
        &self,
        pending: &mut Vec<f32>,
        frames: usize,
        consecutive_io_errors: &mut usize,
    ) {
        let frame_size = self.sink.lock().unwrap().frame_size().max(1);
        pending.extend(std::iter::repeat(0.0f32).take(frame_size * frames));
        self.flush_pending(pending, consecutive_io_errors);
    }

    fn render_tone(
        &self,
        tone: &Tone,
        phase: &mut f64,
        pending: &mut Vec<f32>,
        consecutive_io_errors: &mut usize,
    ) {
        let (sample_rate, volume_frac) = {
            let sink = self.sink.lock().unwrap();
            let volume_frac = self.params.lock().unwrap().volume_pct as f64 / 100.0;
            (sink.sample_rate(), volume_frac)
        };
        let slope = Arc::clone(&self.slope.lock().unwrap());

        let total_samples =
            ((tone.length_us as i128) * sample_rate as i128 / 1_000_000) as usize;

        if tone.is_silent() {
            pending.extend(std::iter::repeat(0.0f32).take(total_samples));
            self.flush_pending(pending, consecutive_io_errors);
            return;
        }

        let raw_n = slope.len();
        let n = raw_n.min(total_samples / 2);
        let use_rise = matches!(
            tone.slope_mode,
            SlopeMode::RisingOnly | SlopeMode::StandardBoth
        ) && n > 0;
        let use_fall = matches!(
            tone.slope_mode,
            SlopeMode::FallingOnly | SlopeMode::StandardBoth
        ) && n > 0;

        let omega = 2.0 * PI * tone.frequency_hz as f64 / sample_rate as f64;

        for i in 0..total_samples {
            let envelope = if use_rise && i < n {
                slope.amplitude(i)
            } else if use_fall && i >= total_samples - n {
                slope.amplitude(total_samples - 1 - i)
            } else {
                1.0
            };
            let sample = volume_frac * envelope * phase.sin();
            pending.push(sample as f32);
            *phase += omega;
            if *phase > 2.0 * PI {
                *phase -= 2.0 * PI;
            }
        }
        self.flush_pending(pending, consecutive_io_errors);
    }

    fn flush_pending(&self, pending: &mut Vec<f32>, consecutive_io_errors: &mut usize) {
        let frame_size = self.sink.lock().unwrap().frame_size().max(1);
        while pending.len() >= frame_size {
            let chunk: Vec<f32> = pending.drain(..frame_size).collect();
            if self.degraded.load(Ordering::Acquire) {
                continue;
            }
            let mut sink = self.sink.lock().unwrap();
            match sink.write_frames(&chunk) {
                Ok(_) => {
                    *consecutive_io_errors = 0;
                }
                Err(e) => {
                    *consecutive_io_errors += 1;
                    tracing::warn!(error = %e, consecutive = *consecutive_io_errors, "sink write failed");
                    if *consecutive_io_errors >= MAX_CONSECUTIVE_IO_ERRORS {
                        tracing::error!("sink exceeded failure budget, entering degraded mode");
                        self.degraded.store(true, Ordering::Release);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::test_support::RecordingSink;

    fn gen_with_sink(sample_rate: u32) -> (Arc<Generator>, RecordingSink) {
        let sink = RecordingSink::new(sample_rate, 64);
        let boxed: Box<dyn AudioSink> = Box::new(sink.clone());
        let gen = Generator::new(boxed).unwrap();
        (gen, sink)
    }

    #[test]
    fn default_params_match_library_defaults() {
        let (gen, _sink) = gen_with_sink(8000);
        assert_eq!(gen.speed_wpm(), DEFAULT_SPEED_WPM);
        assert_eq!(gen.frequency_hz(), DEFAULT_FREQUENCY_HZ);
        assert_eq!(gen.volume_pct(), DEFAULT_VOLUME_PCT);
    }

    #[test]
    fn setters_validate_ranges() {
        let (gen, _sink) = gen_with_sink(8000);
        assert!(gen.set_speed_wpm(3).is_err());
        assert!(gen.set_speed_wpm(61).is_err());
        assert!(gen.set_speed_wpm(20).is_ok());
        assert!(gen.set_frequency_hz(-1).is_err());
        assert!(gen.set_frequency_hz(4001).is_err());
    }

    #[test]
    fn enqueue_character_lays_down_mark_and_gap() {
        let (gen, _sink) = gen_with_sink(8000);
        gen.set_speed_wpm(20).unwrap();
        gen.enqueue_character('E').unwrap(); // single dot
        assert_eq!(gen.get_queue_length(), 2); // mark + inter-character gap
    }

    #[test]
    fn enqueue_string_rejects_unknown_character_but_keeps_prior_tones() {
        let (gen, _sink) = gen_with_sink(8000);
        gen.enqueue_string("E").unwrap();
        let len_before = gen.get_queue_length();
        assert!(gen.enqueue_string("\u{1}").is_err());
        assert_eq!(gen.get_queue_length(), len_before);
    }

    #[test]
    fn start_stop_is_idempotent_and_renders_samples() {
        let (gen, sink) = gen_with_sink(8000);
        gen.set_speed_wpm(20).unwrap();
        gen.start().unwrap();
        gen.start().unwrap();
        gen.enqueue_character('E').unwrap();
        gen.wait_for_queue_level(0).unwrap();
        // Give the synthesis thread a moment to flush partial frames.
        std::thread::sleep(std::time::Duration::from_millis(50));
        gen.stop().unwrap();
        gen.stop().unwrap();
        assert!(sink.recorded_len() > 0);
    }

    #[test]
    fn degrades_after_repeated_sink_failures() {
        let (gen, sink) = gen_with_sink(8000);
        sink.arrange_failures(10_000);
        gen.start().unwrap();
        gen.enqueue_character('S').unwrap();
        gen.wait_for_queue_level(0).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(100));
        gen.stop().unwrap();
        assert!(gen.is_degraded());
    }

    #[test]
    fn tk_callback_fires_on_mark_transitions() {
        use std::sync::atomic::AtomicUsize as AU;
        let (gen, _sink) = gen_with_sink(8000);
        gen.set_speed_wpm(20).unwrap();
        let transitions = Arc::new(AU::new(0));
        let t2 = Arc::clone(&transitions);
        gen.register_keying_callback(move |_ts, _closed| {
            t2.fetch_add(1, Ordering::SeqCst);
        });
        gen.start().unwrap();
        gen.enqueue_character('E').unwrap();
        gen.wait_for_queue_level(0).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(50));
        gen.stop().unwrap();
        // At least one CLOSED and one OPEN transition.
        assert!(transitions.load(Ordering::SeqCst) >= 2);
    }
}
