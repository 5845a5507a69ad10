//! Curtis-mode iambic keyer FSM.
//!
//! Nine states: `IDLE`, four `IN_*`/`AFTER_*` pairs on the dot/dash side,
//! split into an `A` and a `B` half. The `B` half exists purely to resolve
//! the Curtis-mode-B "squeeze" latch: a paddle reversal caught mid-element
//! forces exactly one opposite-sense element before returning to normal
//! alternation.

use std::sync::{Arc, Condvar, Mutex, Weak};

use cw_core::tone::{SlopeMode, Tone};
use cw_generator::Generator;
use cw_receiver::Receiver;

use crate::error::{KeyError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FsmState {
    Idle,
    InDotA,
    InDashA,
    AfterDotA,
    AfterDashA,
    InDotB,
    InDashB,
    AfterDotB,
    AfterDashB,
}

struct Inner {
    fsm: FsmState,
    dot_paddle: bool,
    dash_paddle: bool,
    dot_latch: bool,
    dash_latch: bool,
    curtis_b_latch: bool,
    receiver: Option<Weak<Receiver>>,
}

/// Serializable construction parameters for an [`IambicKeyer`].
#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
pub struct KeyerConfig {
    pub curtis_mode_b: bool,
}

/// Paddle-driven iambic keyer. Holds a non-owning [`Weak`] reference to its
/// [`Generator`]: once the generator is dropped, further
/// operations fail with [`KeyError::GeneratorGone`] instead of dangling.
pub struct IambicKeyer {
    generator: Weak<Generator>,
    curtis_mode_b: bool,
    inner: Mutex<Inner>,
    advanced: Condvar,
}

impl IambicKeyer {
    pub fn from_config(generator: &Arc<Generator>, config: KeyerConfig) -> Arc<Self> {
        Self::new(generator, config.curtis_mode_b)
    }

    pub fn new(generator: &Arc<Generator>, curtis_mode_b: bool) -> Arc<Self> {
        Arc::new(IambicKeyer {
            generator: Arc::downgrade(generator),
            curtis_mode_b,
            inner: Mutex::new(Inner {
                fsm: FsmState::Idle,
                dot_paddle: false,
                dash_paddle: false,
                dot_latch: false,
                dash_latch: false,
                curtis_b_latch: false,
                receiver: None,
            }),
            advanced: Condvar::new(),
        })
    }

    fn generator(&self) -> Result<Arc<Generator>> {
        self.generator.upgrade().ok_or(KeyError::GeneratorGone)
    }

    /// Also feed every element this keyer emits into `receiver` as
    /// `mark_begin`/`mark_end` calls, alongside the generator side-tone.
    pub fn set_receiver(&self, receiver: &Arc<Receiver>) {
        self.inner.lock().unwrap().receiver = Some(Arc::downgrade(receiver));
    }

    /// Stop feeding a previously attached receiver.
    pub fn clear_receiver(&self) {
        self.inner.lock().unwrap().receiver = None;
    }

    pub fn notify_dot_paddle(&self, dot: bool) -> Result<()> {
        self.notify_paddle_internal(Some(dot), None)
    }

    pub fn notify_dash_paddle(&self, dash: bool) -> Result<()> {
        self.notify_paddle_internal(None, Some(dash))
    }

    pub fn notify_paddle(&self, dot: bool, dash: bool) -> Result<()> {
        self.notify_paddle_internal(Some(dot), Some(dash))
    }

    fn notify_paddle_internal(&self, dot: Option<bool>, dash: Option<bool>) -> Result<()> {
        let generator = self.generator()?;
        let mut g = self.inner.lock().unwrap();

        let dot_rising = matches!(dot, Some(true)) && !g.dot_paddle;
        let dash_rising = matches!(dash, Some(true)) && !g.dash_paddle;

        if let Some(v) = dot {
            g.dot_paddle = v;
        }
        if let Some(v) = dash {
            g.dash_paddle = v;
        }

        if g.fsm == FsmState::Idle {
            if g.dot_paddle {
                g.fsm = FsmState::InDotA;
                self.emit(&g, &generator, true)?;
            } else if g.dash_paddle {
                g.fsm = FsmState::InDashA;
                self.emit(&g, &generator, false)?;
            }
        } else {
            if dot_rising {
                g.dot_latch = true;
            }
            if dash_rising {
                g.dash_latch = true;
            }
            if dot_rising && dash_rising && self.curtis_mode_b {
                g.curtis_b_latch = true;
            }
        }
        drop(g);
        self.advanced.notify_all();
        Ok(())
    }

    fn emit(&self, g: &Inner, generator: &Generator, dot: bool) -> Result<()> {
        let t = generator.timings();
        let freq = generator.frequency_hz();
        let mark_len = if dot { t.dot_us } else { t.dash_us };
        let mark = Tone::new(mark_len, freq, SlopeMode::StandardBoth).map_err(KeyError::from)?;
        generator.enqueue_tone(mark).map_err(KeyError::from)?;
        if let Some(rx) = g.receiver.as_ref().and_then(Weak::upgrade) {
            rx.mark_begin(generator.now_us())?;
        }
        let gap = Tone::silence(t.inter_element_us).map_err(KeyError::from)?;
        generator.enqueue_tone(gap).map_err(KeyError::from)?;
        Ok(())
    }

    fn mark_end_if_receiver(&self, g: &Inner, generator: &Generator) -> Result<()> {
        if let Some(rx) = g.receiver.as_ref().and_then(Weak::upgrade) {
            rx.mark_end(generator.now_us())?;
        }
        Ok(())
    }

    /// Advance the FSM one step. Called by the driving code once the
    /// generator's keying callback reports the current element's mark has
    /// finished.
    pub fn tick(&self) -> Result<()> {
        let generator = self.generator()?;
        let mut g = self.inner.lock().unwrap();
        match g.fsm {
            FsmState::Idle => {}
            FsmState::InDotA => {
                self.mark_end_if_receiver(&g, &generator)?;
                g.fsm = FsmState::AfterDotA;
            }
            FsmState::InDashA => {
                self.mark_end_if_receiver(&g, &generator)?;
                g.fsm = FsmState::AfterDashA;
            }
            FsmState::InDotB => {
                self.mark_end_if_receiver(&g, &generator)?;
                g.fsm = FsmState::AfterDotB;
            }
            FsmState::InDashB => {
                self.mark_end_if_receiver(&g, &generator)?;
                g.fsm = FsmState::AfterDashB;
            }
            FsmState::AfterDotA => self.after_dot_a(&mut g, &generator)?,
            FsmState::AfterDashA => self.after_dash_a(&mut g, &generator)?,
            FsmState::AfterDotB => self.after_dot_b(&mut g, &generator)?,
            FsmState::AfterDashB => self.after_dash_b(&mut g, &generator)?,
        }
        drop(g);
        self.advanced.notify_all();
        Ok(())
    }

    fn after_dot_a(&self, g: &mut Inner, generator: &Generator) -> Result<()> {
        if g.dash_paddle || g.dash_latch {
            g.dash_latch = false;
            g.fsm = FsmState::InDashB;
            self.emit(g, generator, false)
        } else if g.dot_paddle {
            g.fsm = FsmState::InDotA;
            self.emit(g, generator, true)
        } else {
            g.fsm = FsmState::Idle;
            Ok(())
        }
    }

    fn after_dash_a(&self, g: &mut Inner, generator: &Generator) -> Result<()> {
        if g.dot_paddle || g.dot_latch {
            g.dot_latch = false;
            g.fsm = FsmState::InDotB;
            self.emit(g, generator, true)
        } else if g.dash_paddle {
            g.fsm = FsmState::InDashA;
            self.emit(g, generator, false)
        } else {
            g.fsm = FsmState::Idle;
            Ok(())
        }
    }

    fn after_dot_b(&self, g: &mut Inner, generator: &Generator) -> Result<()> {
        if g.curtis_b_latch {
            g.curtis_b_latch = false;
            g.fsm = FsmState::InDashA;
            self.emit(g, generator, false)
        } else if g.dash_paddle || g.dash_latch {
            g.dash_latch = false;
            g.fsm = FsmState::InDashB;
            self.emit(g, generator, false)
        } else if g.dot_paddle {
            g.fsm = FsmState::InDotA;
            self.emit(g, generator, true)
        } else {
            g.fsm = FsmState::Idle;
            Ok(())
        }
    }

    fn after_dash_b(&self, g: &mut Inner, generator: &Generator) -> Result<()> {
        if g.curtis_b_latch {
            g.curtis_b_latch = false;
            g.fsm = FsmState::InDotA;
            self.emit(g, generator, true)
        } else if g.dot_paddle || g.dot_latch {
            g.dot_latch = false;
            g.fsm = FsmState::InDotB;
            self.emit(g, generator, true)
        } else if g.dash_paddle {
            g.fsm = FsmState::InDashA;
            self.emit(g, generator, false)
        } else {
            g.fsm = FsmState::Idle;
            Ok(())
        }
    }

    /// Block until the FSM advances one step (a `tick()` or a paddle
    /// notification that started a new element).
    pub fn wait_for_element(&self) -> Result<()> {
        self.generator()?;
        let g = self.inner.lock().unwrap();
        let _ = self.advanced.wait(g).unwrap();
        Ok(())
    }

    /// Block until the FSM returns to `IDLE`.
    pub fn wait_for_keyer(&self) -> Result<()> {
        self.generator()?;
        let mut g = self.inner.lock().unwrap();
        while g.fsm != FsmState::Idle {
            g = self.advanced.wait(g).unwrap();
        }
        Ok(())
    }

    pub fn is_busy(&self) -> bool {
        self.inner.lock().unwrap().fsm != FsmState::Idle
    }
}
