//! `cw-key`: straight key and Curtis-mode iambic keyer FSMs, driving a
//! [`cw_generator::Generator`]'s tone queue.

pub mod error;
pub mod iambic;
pub mod straight_key;

pub use error::KeyError;
pub use iambic::{IambicKeyer, KeyerConfig};
pub use straight_key::StraightKey;

pub mod prelude {
    pub use crate::error::KeyError;
    pub use crate::iambic::{IambicKeyer, KeyerConfig};
    pub use crate::straight_key::StraightKey;
}
