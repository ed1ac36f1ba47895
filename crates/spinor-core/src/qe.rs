//! Quad Enable configuration
//!
//! Parts that share the HOLD/WP pins with IO2/IO3 need a non-volatile QE
//! bit set before any 1-1-4 or 1-4-4 transaction. Where the bit lives, and
//! how its register is written, depends on the Quad Enable Requirement
//! advertised in BFP DWORD 15. All conventions are handled here over the
//! single [`QerType`] enum.

use crate::capability::PollPolicy;
use crate::error::Result;
use crate::flash::{write_cycle, SequencerState};
use crate::protocol::{self, StatusRegister};
use crate::sfdp::QerType;
use crate::spi::opcodes;
use crate::transport::Transport;

/// Terminal state of the Quad Enable configurator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QeState {
    /// The part has no QE bit; quad commands work as they are
    Disabled,
    /// The QE bit is set
    Enabled,
    /// The QER value has no known handling
    Unsupported,
    /// The QE bit did not stick
    Failed {
        /// Status register number (1-3)
        register: u8,
        /// Value read back
        value: u8,
    },
}

/// Location of the QE bit: status register and bit mask
pub fn qe_bit(qer: QerType) -> Option<(StatusRegister, u8)> {
    match qer {
        QerType::S1B6 => Some((StatusRegister::Sr1, opcodes::SR1_QE_B6)),
        QerType::S2B7 => Some((StatusRegister::Sr2, opcodes::SR2_QE_B7)),
        QerType::S2B1v1 | QerType::S2B1v4 | QerType::S2B1v5 | QerType::S2B1v6 => {
            Some((StatusRegister::Sr2, opcodes::SR2_QE_B1))
        }
        QerType::None | QerType::Reserved(_) => None,
    }
}

/// Check if the QE bit is set
///
/// Returns `None` when the QER has no QE bit.
pub fn is_quad_enabled<T: Transport + ?Sized>(
    transport: &mut T,
    qer: QerType,
) -> Result<Option<bool>, T::Error> {
    match qe_bit(qer) {
        Some((reg, mask)) => {
            let value = protocol::read_status(transport, reg, qer)?;
            Ok(Some(value & mask != 0))
        }
        None => Ok(None),
    }
}

/// Make sure the QE bit is set
///
/// Reads the register holding the bit and leaves it alone when the bit is
/// already set, so calling this again performs no write. Otherwise the bit
/// is written under a write-enable handshake and read back.
pub fn configure<T: Transport + ?Sized>(
    transport: &mut T,
    qer: QerType,
    wel_retries: u8,
    poll: &PollPolicy,
) -> Result<QeState, T::Error> {
    let (reg, mask) = match (qer, qe_bit(qer)) {
        (QerType::None, _) => return Ok(QeState::Disabled),
        (_, Some(bit)) => bit,
        (_, None) => {
            log::warn!("QER {:?} not supported", qer);
            return Ok(QeState::Unsupported);
        }
    };

    let value = protocol::read_status(transport, reg, qer)?;
    if value & mask != 0 {
        log::debug!("QE already set in SR{}: {:02x}", reg.number(), value);
        return Ok(QeState::Enabled);
    }

    log::debug!("Setting QE in SR{}: {:02x} -> {:02x}", reg.number(), value, value | mask);
    let mut state = SequencerState::Idle;
    write_cycle(transport, &mut state, wel_retries, poll, |t| {
        protocol::write_status(t, reg, value | mask, qer)
    })?;

    let value = protocol::read_status(transport, reg, qer)?;
    if value & mask == 0 {
        log::error!("QE not set in SR{} after write: {:02x}", reg.number(), value);
        return Ok(QeState::Failed {
            register: reg.number(),
            value,
        });
    }
    Ok(QeState::Enabled)
}
