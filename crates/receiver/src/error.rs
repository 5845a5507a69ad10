//! Error type for `cw-receiver`.

use thiserror::Error;

pub use cw_core::error::CwError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReceiverError {
    #[error(transparent)]
    Core(#[from] CwError),

    #[error("mark_end called without a matching mark_begin")]
    NoMarkInProgress,

    #[error("mark_begin called while a mark is already in progress")]
    MarkInProgress,
}

pub type Result<T> = std::result::Result<T, ReceiverError>;
