//! Command implementations

mod keys;
mod offline;
mod tag;

pub use keys::*;
pub use offline::*;
pub use tag::*;
