//! SFDP (Serial Flash Discoverable Parameters) handling
//!
//! This module implements reading, decoding and encoding of the SFDP
//! structures defined by JEDEC JESD216 that a generic NOR driver needs.
//!
//! # Overview
//!
//! SFDP data is stored in a reserved area of the flash chip and can be
//! read using the RDSFDP command (0x5A). The structure contains:
//!
//! - An SFDP header with signature and revision info
//! - One or more parameter headers describing available tables
//! - Parameter tables containing capability information
//!
//! Only the Basic Flash Parameter table (0xFF00) is mandatory. The
//! 4-byte Address Instruction table (0xFF84) is used when present.

pub mod decoder;
pub mod encoder;
mod reader;
mod types;

pub use decoder::{decode_bfp, decode_four_byte_table, density_bits, density_bytes};
pub use encoder::encode_bfp;
#[cfg(feature = "alloc")]
pub use encoder::encode_sfdp;
pub use reader::*;
pub use types::*;
