//! cw-core - Morse data tables, tone queue and slope table
//!
//! Shared primitives used by `cw-generator`, `cw-receiver` and `cw-key`:
//! the character/representation lookup tables, the `Tone` record and its
//! bounded queue, the per-generator slope (envelope) table, derived Morse
//! timings, and the error kinds every other `cw-*` crate returns.

pub mod error;
pub mod morse;
pub mod slope;
pub mod timing;
pub mod tone;
pub mod tone_queue;

pub use error::{CwError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{
        error::{CwError, Result},
        morse::{
            char_is_valid, char_to_representation, phonetic_for, procedural_signal_for,
            representation_is_valid, representation_to_char, string_is_valid, ProceduralSignal,
        },
        slope::{SlopeShape, SlopeTable},
        timing::Timings,
        tone::{SlopeMode, Tone},
        tone_queue::{DequeueOutcome, ToneQueue},
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn morse_tables_validate_at_startup() {
        morse::validate_tables().unwrap();
    }
}
