// Block model, merkle folding, chain state and validation live under
// `blockchain/core`; everything is re-exported here.

pub mod core;
pub use core::*;
