//! SPI types and command structures
//!
//! This module provides types for representing a single NOR flash
//! transaction, its I/O mode and address width, and the JEDEC opcodes
//! the core issues.

mod address;
mod command;
mod io_mode;
pub mod opcodes;

pub use address::AddressWidth;
pub use command::{Direction, SpiCommand};
pub use io_mode::IoMode;
