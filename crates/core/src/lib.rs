//! GridScript Core - Fundamental types shared by the registry and compiler

mod error;
mod types;
mod spatial;

pub use error::*;
pub use types::*;
pub use spatial::*;
