//! Capability model and the sources it is built from
//!
//! Discovery runs once per device: a [`CapabilitySource`] produces the
//! decoded parameter tables, [`negotiate`] combines them with the
//! [`FlashConfig`] into an immutable [`CapabilityModel`]. Every later
//! operation only consults the model.

mod config;
mod model;
mod source;

pub use config::*;
pub use model::*;
pub use source::*;
