//! spinor-core - SFDP discovery and generic serial NOR command core
//!
//! This crate turns the JEDEC JESD216 Serial Flash Discoverable Parameters
//! of a NOR flash into a capability model, and then drives read, page
//! program and erase sequences (write-enable handshake, status polling,
//! page chunking, erase planning, quad-enable configuration) on top of a
//! single abstract [`Transport`] operation. It is `no_std` compatible and
//! knows nothing about the controller that actually moves the bits.
//!
//! # Features
//!
//! - `std` - Enable standard library support (includes `alloc` and `serde`)
//! - `alloc` - Enable the SFDP image encoder
//! - `serde` - Derive `Serialize`/`Deserialize` for configuration types
//!
//! # Example
//!
//! ```ignore
//! use spinor_core::capability::{FlashConfig, RuntimeDiscovered};
//! use spinor_core::flash::NorFlash;
//!
//! fn program<T: spinor_core::Transport>(bus: T) -> Result<(), spinor_core::Error<T::Error>> {
//!     let mut flash = NorFlash::discover(bus, &RuntimeDiscovered::default(), &FlashConfig::default())?;
//!     println!("Size: {} bytes", flash.capabilities().size);
//!     flash.erase(0, 4096)?;
//!     flash.write(0, b"hello")?;
//!     Ok(())
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(any(feature = "std", test))]
extern crate std;

pub mod capability;
pub mod erase;
pub mod error;
pub mod flash;
pub mod protocol;
pub mod qe;
pub mod sfdp;
pub mod spi;
pub mod transport;

pub use error::{DecodeError, Error, Result};
pub use transport::Transport;
