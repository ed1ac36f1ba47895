//! Quad enable command implementation

use spinor_core::protocol::StatusRegister;
use spinor_core::qe::QeState;
use spinor_core::Error;
use spinor_dummy::DummyFlash;

use crate::config::Settings;
use crate::error::{CliError, Result};

/// Set the Quad Enable bit per the part's QER and print the registers
///
/// Fails when the QER has no known handling or the bit does not read back
/// as set; the registers are printed either way.
pub fn run_quad_enable(dummy: &mut DummyFlash, settings: &Settings) -> Result<()> {
    let mut flash = super::discover(dummy, settings)?;
    let qer = flash.capabilities().qer;

    let outcome = match flash.configure_quad_enable()? {
        QeState::Enabled => {
            println!("Quad enable set ({:?})", qer);
            Ok(())
        }
        QeState::Disabled => {
            println!("Part has no quad enable bit ({:?})", qer);
            Ok(())
        }
        QeState::Unsupported => Err(CliError::Flash(Error::UnsupportedQerType(qer))),
        QeState::Failed { register, value } => {
            Err(CliError::Flash(Error::QeVerificationFailed { register, value }))
        }
    };

    for reg in [StatusRegister::Sr1, StatusRegister::Sr2, StatusRegister::Sr3] {
        let value = flash.read_status_register(reg)?;
        println!("SR{}: 0x{:02X}", reg.number(), value);
    }
    outcome
}
