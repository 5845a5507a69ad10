//! Error type for `cw-key`.

use thiserror::Error;

pub use cw_core::error::CwError;
use cw_receiver::ReceiverError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum KeyError {
    #[error(transparent)]
    Core(#[from] CwError),

    #[error(transparent)]
    Receiver(#[from] ReceiverError),

    /// The associated `Generator` was dropped before this key. A `Key` is
    /// meant to be destroyed before its `Generator`; this is the runtime
    /// signal that the ordering was violated instead of a dangling pointer.
    #[error("associated generator has been dropped")]
    GeneratorGone,
}

pub type Result<T> = std::result::Result<T, KeyError>;
