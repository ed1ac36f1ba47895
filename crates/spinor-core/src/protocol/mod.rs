//! Protocol implementations
//!
//! Single-step SPI25 command sequences shared by discovery, quad-enable
//! configuration and the operation sequencer.

mod spi25;

pub use spi25::*;
