//! `cw-receiver`: classifies mark/space timestamps into Morse
//! representations and characters, with adaptive speed tracking.

pub mod error;
pub mod receiver;

pub use error::ReceiverError;
pub use receiver::{PollResult, Receiver, ReceiverConfig};

pub mod prelude {
    pub use crate::error::ReceiverError;
    pub use crate::receiver::{PollResult, Receiver, ReceiverConfig};
}
