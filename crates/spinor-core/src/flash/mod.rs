//! Read, program and erase sequencing
//!
//! This module drives the multi-transaction operations on top of the
//! single-step commands in [`crate::protocol`]:
//!
//! - [`NorFlash`] - a discovered device owning its transport
//! - [`SharedNorFlash`] - a device behind a blocking mutex
//! - [`write_cycle`] - the write-enable / issue / poll cycle shared by
//!   program, erase and status register writes

mod device;
mod sequencer;
mod shared;

pub use device::NorFlash;
pub use sequencer::{write_cycle, SequencerState};
pub use shared::{CriticalSectionRawMutex, NoopRawMutex, RawMutex, SharedNorFlash};
