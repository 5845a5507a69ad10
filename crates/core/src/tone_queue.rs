//! Bounded circular buffer of timed tones with forever-tone handling,
//! low-water callback, and condvar-based producer/consumer wake-up.
//!
//! The single consumer thread parks on a condition variable paired with
//! the queue's mutex rather than a signal. A blocked wake-up path is
//! exposed only as a test-only knob (`block_wakeup`).

use std::sync::{Arc, Condvar, Mutex};

use crate::error::{CwError, Result};
use crate::tone::Tone;

/// Default ring capacity.
pub const DEFAULT_CAPACITY: usize = 3000;
/// Hard ceiling on a configured capacity.
pub const CAPACITY_MAX: usize = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueueState {
    Idle,
    Busy,
}

/// Outcome of a single [`ToneQueue::dequeue`] call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DequeueOutcome {
    /// Queue was, and remains, empty. Consumer should sleep.
    Idle,
    /// A tone was dequeued. `low_water_crossed` is `true` if this dequeue
    /// crossed the low-water mark from above (the caller should invoke the
    /// low-water callback *after* releasing the queue lock
    /// step 5).
    Dequeued {
        tone: Tone,
        low_water_crossed: bool,
    },
    /// Queue had tones moments ago but is now empty; state transitioned to
    /// `IDLE`. The consumer should flush one buffer of silence and loop.
    EmptyNewly,
}

type LowWaterCallback = Box<dyn Fn(Option<&dyn std::any::Any>) + Send + 'static>;

struct Inner {
    ring: Vec<Tone>,
    capacity: usize,
    head: usize,
    tail: usize,
    len: usize,
    state: QueueState,
    low_water_mark: usize,
    low_water_callback: Option<LowWaterCallback>,
    block_wakeup: bool,
}

impl Inner {
    fn next_index(&self, i: usize) -> usize {
        (i + 1) % self.capacity
    }

    fn prev_index(&self, i: usize) -> usize {
        (i + self.capacity - 1) % self.capacity
    }
}

/// A bounded ring of [`Tone`]s shared between producer threads and the
/// generator's single consumer thread.
pub struct ToneQueue {
    inner: Mutex<Inner>,
    not_idle: Condvar,
    drained: Condvar,
}

impl ToneQueue {
    /// Create a queue with [`DEFAULT_CAPACITY`] and a high water mark equal
    /// to capacity (i.e. the low-water callback is inert until configured).
    pub fn new() -> Arc<Self> {
        Self::with_capacity(DEFAULT_CAPACITY, DEFAULT_CAPACITY).expect("default capacity is valid")
    }

    /// Create a queue with an explicit capacity and high water mark.
    pub fn with_capacity(capacity: usize, high_water_mark: usize) -> Result<Arc<Self>> {
        if capacity == 0 || capacity > CAPACITY_MAX {
            return Err(CwError::Invalid(format!(
                "capacity must be in 1..={CAPACITY_MAX}, got {capacity}"
            )));
        }
        if high_water_mark > capacity {
            return Err(CwError::Invalid(format!(
                "high_water_mark {high_water_mark} must be <= capacity {capacity}"
            )));
        }
        Ok(Arc::new(ToneQueue {
            inner: Mutex::new(Inner {
                ring: vec![Tone::silence(0).unwrap(); capacity],
                capacity,
                head: 0,
                tail: 0,
                len: 0,
                state: QueueState::Idle,
                low_water_mark,
                low_water_callback: None,
                block_wakeup: false,
            }),
            not_idle: Condvar::new(),
            drained: Condvar::new(),
        }))
    }

    pub fn get_capacity(&self) -> usize {
        self.inner.lock().unwrap().capacity
    }

    pub fn get_high_water_mark(&self) -> usize {
        self.inner.lock().unwrap().low_water_mark
    }

    pub fn length(&self) -> usize {
        self.inner.lock().unwrap().len
    }

    pub fn is_full(&self) -> bool {
        let g = self.inner.lock().unwrap();
        g.len == g.capacity
    }

    /// Enqueue a tone. Zero-length tones are silently dropped.
    pub fn enqueue(&self, tone: Tone) -> Result<()> {
        if !(0..=crate::tone::FREQUENCY_MAX).contains(&tone.frequency_hz) {
            return Err(CwError::Invalid(format!(
                "frequency_hz out of range: {}",
                tone.frequency_hz
            )));
        }
        if tone.length_us < 0 {
            return Err(CwError::Invalid("length_us must be >= 0".into()));
        }
        if tone.length_us == 0 {
            return Ok(());
        }

        let mut g = self.inner.lock().unwrap();
        if g.len == g.capacity {
            return Err(CwError::Again);
        }

        let tail = g.tail;
        g.ring[tail] = tone;
        g.tail = g.next_index(tail);
        g.len += 1;

        if g.state == QueueState::Idle {
            g.state = QueueState::Busy;
        }
        drop(g);
        self.not_idle.notify_all();
        Ok(())
    }

    /// Dequeue one tone, or report that the queue is idle / just emptied.
    pub fn dequeue(&self) -> DequeueOutcome {
        let mut g = self.inner.lock().unwrap();

        if g.state == QueueState::Idle {
            return DequeueOutcome::Idle;
        }

        // state == Busy
        if g.len == 0 {
            g.state = QueueState::Idle;
            drop(g);
            self.drained.notify_all();
            return DequeueOutcome::EmptyNewly;
        }

        let head = g.head;
        let tone = g.ring[head];

        if tone.is_forever && g.len == 1 {
            // Keep re-returning the forever tone; no removal, no low-water callback.
            return DequeueOutcome::Dequeued {
                tone,
                low_water_crossed: false,
            };
        }

        let len_before = g.len;
        g.head = g.next_index(head);
        g.len -= 1;

        let low_water_crossed =
            len_before > g.low_water_mark && g.len <= g.low_water_mark;

        // If len is now 0, state stays BUSY: the next dequeue() call
        // reports EmptyNewly so the consumer gets one more turn to flush
        // trailing silence before the queue goes IDLE.

        DequeueOutcome::Dequeued {
            tone,
            low_water_crossed,
        }
    }

    /// Run the registered low-water callback, if any. Caller invokes this
    /// after releasing any lock it might hold.
    pub fn invoke_low_water_callback(&self) {
        let g = self.inner.lock().unwrap();
        if let Some(cb) = g.low_water_callback.as_ref() {
            cb(None);
        }
    }

    /// Register (or, with `func = None`, disable) the low-water callback.
    pub fn register_low_level_callback<F>(&self, level: usize, func: Option<F>) -> Result<()>
    where
        F: Fn(Option<&dyn std::any::Any>) + Send + 'static,
    {
        let mut g = self.inner.lock().unwrap();
        if level >= g.capacity {
            return Err(CwError::Invalid(format!(
                "low water level {level} must be < capacity {}",
                g.capacity
            )));
        }
        g.low_water_mark = level;
        g.low_water_callback = func.map(|f| Box::new(f) as LowWaterCallback);
        Ok(())
    }

    /// Empty the queue immediately. Does not invoke the low-water callback,
    /// and clears any pending low-water state.
    pub fn flush(&self) {
        let mut g = self.inner.lock().unwrap();
        g.head = 0;
        g.tail = 0;
        g.len = 0;
        g.state = QueueState::Idle;
        drop(g);
        self.drained.notify_all();
        self.not_idle.notify_all();
    }

    /// Block until `length() <= level`.
    pub fn wait_for_level(&self, level: usize) -> Result<()> {
        let mut g = self.inner.lock().unwrap();
        if g.block_wakeup {
            return Err(CwError::Deadlk);
        }
        while g.len > level {
            g = self.drained.wait(g).unwrap();
            if g.block_wakeup {
                return Err(CwError::Deadlk);
            }
        }
        Ok(())
    }

    /// Block until the current head tone changes or the queue goes idle.
    pub fn wait_for_tone(&self) -> Result<()> {
        let mut g = self.inner.lock().unwrap();
        if g.block_wakeup {
            return Err(CwError::Deadlk);
        }
        let starting_head = g.head;
        while g.head == starting_head && g.state != QueueState::Idle {
            g = self.not_idle.wait(g).unwrap();
            if g.block_wakeup {
                return Err(CwError::Deadlk);
            }
        }
        Ok(())
    }

    /// Block until the queue leaves `IDLE` or `should_stop` reports true.
    /// The synthesis thread's main loop uses this to sleep between tones
    /// without spinning, and to wake promptly on `Generator::stop`.
    pub(crate) fn park_consumer_until<F: Fn() -> bool>(&self, should_stop: F) {
        let mut g = self.inner.lock().unwrap();
        while g.state == QueueState::Idle && !should_stop() {
            g = self.not_idle.wait(g).unwrap();
        }
    }

    /// Wake any thread parked in [`Self::park_consumer_until`] without
    /// changing queue state; used by `Generator::stop` to break the
    /// synthesis thread out of its sleep promptly.
    pub fn wake_consumer(&self) {
        self.not_idle.notify_all();
    }

    /// Test-only: make `wait_for_*` return `Deadlk` instead of blocking, to
    /// model a caller that has blocked the wake-up signalling path.
    #[doc(hidden)]
    pub fn set_block_wakeup(&self, blocked: bool) {
        let mut g = self.inner.lock().unwrap();
        g.block_wakeup = blocked;
        drop(g);
        self.not_idle.notify_all();
        self.drained.notify_all();
    }

    /// Scan backwards from `tail` for a tone with `is_first == true`;
    /// truncate the queue to just before it. No-op if none is found.
    /// Atomic with respect to concurrent `dequeue` calls (same mutex).
    pub fn handle_backspace(&self) {
        let mut g = self.inner.lock().unwrap();
        if g.len == 0 {
            return;
        }
        let mut scan = g.prev_index(g.tail);
        let mut scanned = 0usize;
        while scanned < g.len {
            if g.ring[scan].is_first {
                let removed = (g.tail + g.capacity - scan) % g.capacity;
                g.tail = scan;
                g.len -= removed;
                if g.len == 0 {
                    g.state = QueueState::Idle;
                }
                return;
            }
            scan = g.prev_index(scan);
            scanned += 1;
        }
        // No character boundary found: leave the queue unchanged.
    }
}
