//! SPI25 protocol implementation
//!
//! This module implements the common SPI NOR command sequences as single
//! steps: status register access under the different Quad-Enable
//! conventions, the write-enable handshake, WIP polling, and the read,
//! page program and erase transactions. Sequencing the steps into whole
//! operations is the job of [`crate::flash`].

use crate::capability::PollPolicy;
use crate::error::{Error, Result};
use crate::sfdp::{QerType, ReadMode};
use crate::spi::{opcodes, AddressWidth, IoMode, SpiCommand};
use crate::transport::Transport;

/// Status registers addressed by number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusRegister {
    /// Status register 1 (WIP, WEL, protection bits)
    Sr1,
    /// Status register 2
    Sr2,
    /// Status register 3
    Sr3,
}

impl StatusRegister {
    /// Register number as used in datasheets
    pub const fn number(self) -> u8 {
        match self {
            Self::Sr1 => 1,
            Self::Sr2 => 2,
            Self::Sr3 => 3,
        }
    }
}

/// Manufacturer and device ID as returned by RDID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct JedecId(pub [u8; 3]);

impl JedecId {
    /// JEP106 manufacturer code
    pub const fn manufacturer(&self) -> u8 {
        self.0[0]
    }

    /// Memory type and capacity bytes
    pub const fn device(&self) -> u16 {
        ((self.0[1] as u16) << 8) | self.0[2] as u16
    }
}

impl core::fmt::Display for JedecId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:02X} {:04X}", self.manufacturer(), self.device())
    }
}

fn execute<T: Transport + ?Sized>(transport: &mut T, cmd: &mut SpiCommand<'_>) -> Result<(), T::Error> {
    log::trace!(
        "op 0x{:02X} addr {:?}/{} dummy {} {:?} {}",
        cmd.opcode,
        cmd.address,
        cmd.address_width.bytes(),
        cmd.dummy_cycles,
        cmd.direction(),
        cmd.data_len()
    );
    transport.transact(cmd).map_err(Error::Transport)
}

/// Read the JEDEC ID from a flash chip
pub fn read_jedec_id<T: Transport + ?Sized>(transport: &mut T) -> Result<JedecId, T::Error> {
    let mut buf = [0u8; 3];
    let mut cmd = SpiCommand::read_reg(opcodes::RDID, &mut buf);
    execute(transport, &mut cmd)?;
    Ok(JedecId(buf))
}

/// Send the software reset sequence
///
/// RSTEN then RST, with the settle times most parts specify after each.
pub fn software_reset<T: Transport + ?Sized>(transport: &mut T) -> Result<(), T::Error> {
    let mut cmd = SpiCommand::simple(opcodes::RSTEN);
    execute(transport, &mut cmd)?;
    transport.delay_us(50);
    let mut cmd = SpiCommand::simple(opcodes::RST);
    execute(transport, &mut cmd)?;
    transport.delay_us(100);
    Ok(())
}

/// Read a status register
///
/// SR2 is read with 0x3F on S2B7 parts and 0x35 everywhere else.
pub fn read_status<T: Transport + ?Sized>(
    transport: &mut T,
    reg: StatusRegister,
    qer: QerType,
) -> Result<u8, T::Error> {
    let opcode = match (reg, qer) {
        (StatusRegister::Sr1, _) => opcodes::RDSR,
        (StatusRegister::Sr2, QerType::S2B7) => opcodes::RDSR2_S2B7,
        (StatusRegister::Sr2, _) => opcodes::RDSR2,
        (StatusRegister::Sr3, _) => opcodes::RDSR3,
    };
    let mut buf = [0u8; 1];
    let mut cmd = SpiCommand::read_reg(opcode, &mut buf);
    execute(transport, &mut cmd)?;
    Ok(buf[0])
}

/// Read the status register 1
pub fn read_status1<T: Transport + ?Sized>(transport: &mut T) -> Result<u8, T::Error> {
    read_status(transport, StatusRegister::Sr1, QerType::None)
}

/// Write a status register with the command the part's convention asks for
///
/// This issues the write transaction only; the caller is responsible for
/// the write-enable handshake before and for polling WIP after.
///
/// - SR1 on S2B1v1 parts: a one byte WRSR clears SR2, so SR2 is read back
///   and sent along as the second byte.
/// - SR2 on S2B1v1/v4/v5 parts: written as the second byte of WRSR with
///   the current SR1, volatile bits masked, as the first.
/// - SR2 on S2B7 parts: dedicated 0x3E.
/// - SR2 otherwise: dedicated 0x31.
pub fn write_status<T: Transport + ?Sized>(
    transport: &mut T,
    reg: StatusRegister,
    value: u8,
    qer: QerType,
) -> Result<(), T::Error> {
    let mut data = [value, 0];
    let (opcode, len) = match (reg, qer) {
        (StatusRegister::Sr1, QerType::S2B1v1) => {
            data[1] = read_status(transport, StatusRegister::Sr2, qer)?;
            (opcodes::WRSR, 2)
        }
        (StatusRegister::Sr1, _) => (opcodes::WRSR, 1),
        (StatusRegister::Sr2, QerType::S2B1v1 | QerType::S2B1v4 | QerType::S2B1v5) => {
            let sr1 = read_status1(transport)? & !(opcodes::SR1_WIP | opcodes::SR1_WEL);
            data = [sr1, value];
            (opcodes::WRSR, 2)
        }
        (StatusRegister::Sr2, QerType::S2B7) => (opcodes::WRSR2_S2B7, 1),
        (StatusRegister::Sr2, _) => (opcodes::WRSR2, 1),
        (StatusRegister::Sr3, _) => (opcodes::WRSR3, 1),
    };
    let mut cmd = SpiCommand::write_reg(opcode, &data[..len]);
    execute(transport, &mut cmd)
}

/// Send the Write Enable command
pub fn write_enable<T: Transport + ?Sized>(transport: &mut T) -> Result<(), T::Error> {
    let mut cmd = SpiCommand::simple(opcodes::WREN);
    execute(transport, &mut cmd)
}

/// Send the Write Disable command
pub fn write_disable<T: Transport + ?Sized>(transport: &mut T) -> Result<(), T::Error> {
    let mut cmd = SpiCommand::simple(opcodes::WRDI);
    execute(transport, &mut cmd)
}

/// Check if the Write Enable Latch is set
pub fn check_wel<T: Transport + ?Sized>(transport: &mut T) -> Result<bool, T::Error> {
    let status = read_status1(transport)?;
    Ok(status & opcodes::SR1_WEL != 0)
}

/// Check if a write or erase operation is in progress
pub fn is_busy<T: Transport + ?Sized>(transport: &mut T) -> Result<bool, T::Error> {
    let status = read_status1(transport)?;
    Ok(status & opcodes::SR1_WIP != 0)
}

/// Read SR1 until WEL shows up, at most `retries` times
pub fn confirm_write_enable<T: Transport + ?Sized>(
    transport: &mut T,
    retries: u8,
) -> Result<(), T::Error> {
    for _ in 0..retries.max(1) {
        if check_wel(transport)? {
            return Ok(());
        }
    }
    Err(Error::WriteEnableTimeout)
}

/// Wait for the WIP (Write In Progress) bit to clear
///
/// Polls SR1 every `policy.delay_us`. Without `policy.max_polls` the loop
/// only ends when the part reports ready or the transport fails; callers
/// that need a deadline set a bound and get [`Error::BusyTimeout`].
pub fn wait_ready<T: Transport + ?Sized>(transport: &mut T, policy: &PollPolicy) -> Result<(), T::Error> {
    let mut polls: u32 = 0;
    loop {
        if !is_busy(transport)? {
            if polls > 0 {
                log::trace!("ready after {} polls", polls);
            }
            return Ok(());
        }
        polls = polls.saturating_add(1);
        if policy.max_polls.is_some_and(|max| polls >= max) {
            return Err(Error::BusyTimeout);
        }
        if policy.delay_us > 0 {
            transport.delay_us(policy.delay_us);
        }
    }
}

/// Read data with the given read mode
///
/// Split into transactions no longer than the transport allows.
pub fn read<T: Transport + ?Sized>(
    transport: &mut T,
    mode: &ReadMode,
    width: AddressWidth,
    addr: u32,
    buf: &mut [u8],
) -> Result<(), T::Error> {
    let max_len = transport.max_read_len().max(1);
    let mut offset = 0;

    while offset < buf.len() {
        let chunk_len = core::cmp::min(max_len, buf.len() - offset);
        let chunk = &mut buf[offset..offset + chunk_len];
        let mut cmd = SpiCommand::read(mode.opcode, width, addr + offset as u32, chunk)
            .with_io_mode(mode.io_mode)
            .with_dummy_cycles(mode.dummy_cycles());
        execute(transport, &mut cmd)?;
        offset += chunk_len;
    }

    Ok(())
}

/// Issue a page program transaction
///
/// The data must not cross a page boundary.
pub fn program<T: Transport + ?Sized>(
    transport: &mut T,
    opcode: u8,
    io_mode: IoMode,
    width: AddressWidth,
    addr: u32,
    data: &[u8],
) -> Result<(), T::Error> {
    let mut cmd = SpiCommand::write(opcode, width, addr, data).with_io_mode(io_mode);
    execute(transport, &mut cmd)
}

/// Issue a sector/block erase transaction
pub fn erase_block<T: Transport + ?Sized>(
    transport: &mut T,
    opcode: u8,
    width: AddressWidth,
    addr: u32,
) -> Result<(), T::Error> {
    let mut cmd = SpiCommand::erase(opcode, width, addr);
    execute(transport, &mut cmd)
}

/// Issue a chip erase transaction
pub fn chip_erase<T: Transport + ?Sized>(transport: &mut T, opcode: u8) -> Result<(), T::Error> {
    let mut cmd = SpiCommand::simple(opcode);
    execute(transport, &mut cmd)
}

/// Enter 4-byte address mode
pub fn enter_4byte_mode<T: Transport + ?Sized>(transport: &mut T) -> Result<(), T::Error> {
    let mut cmd = SpiCommand::simple(opcodes::EN4B);
    execute(transport, &mut cmd)
}

/// Read SFDP (Serial Flash Discoverable Parameters)
pub fn read_sfdp<T: Transport + ?Sized>(
    transport: &mut T,
    addr: u32,
    buf: &mut [u8],
) -> Result<(), T::Error> {
    let max_read = transport.max_read_len().max(1);
    let mut offset = 0;

    while offset < buf.len() {
        let chunk_len = core::cmp::min(max_read, buf.len() - offset);
        let chunk = &mut buf[offset..offset + chunk_len];
        let mut cmd = SpiCommand::read(
            opcodes::RDSFDP,
            AddressWidth::ThreeByte,
            addr + offset as u32,
            chunk,
        )
        .with_dummy_cycles(opcodes::RDSFDP_DUMMY_CYCLES);
        execute(transport, &mut cmd)?;
        offset += chunk_len;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec;
    use std::vec::Vec;

    /// Records every transaction and answers status reads from a script
    #[derive(Default)]
    struct Recorder {
        ops: Vec<(u8, Vec<u8>)>,
        status: [u8; 3],
        sr1_script: Vec<u8>,
        delays: u32,
    }

    impl Transport for Recorder {
        type Error = ();

        fn transact(&mut self, cmd: &mut SpiCommand<'_>) -> core::result::Result<(), ()> {
            self.ops.push((cmd.opcode, cmd.write_data.to_vec()));
            let value = match cmd.opcode {
                opcodes::RDSR if !self.sr1_script.is_empty() => self.sr1_script.remove(0),
                opcodes::RDSR => self.status[0],
                opcodes::RDSR2 | opcodes::RDSR2_S2B7 => self.status[1],
                opcodes::RDSR3 => self.status[2],
                opcodes::RDID => {
                    cmd.read_buf.copy_from_slice(&[0xEF, 0x40, 0x18]);
                    return Ok(());
                }
                _ => return Ok(()),
            };
            cmd.read_buf[0] = value;
            Ok(())
        }

        fn delay_us(&mut self, _us: u32) {
            self.delays += 1;
        }
    }

    fn writes(rec: &Recorder) -> Vec<(u8, Vec<u8>)> {
        rec.ops
            .iter()
            .filter(|(op, _)| {
                !matches!(
                    *op,
                    opcodes::RDSR | opcodes::RDSR2 | opcodes::RDSR2_S2B7 | opcodes::RDSR3
                )
            })
            .cloned()
            .collect()
    }

    #[test]
    fn sr1_write_carries_sr2_on_v1() {
        let mut rec = Recorder {
            status: [0x00, 0x02, 0x00],
            ..Default::default()
        };
        write_status(&mut rec, StatusRegister::Sr1, 0x40, QerType::S2B1v1).unwrap();
        assert_eq!(writes(&rec), [(opcodes::WRSR, vec![0x40, 0x02])]);

        let mut rec = Recorder::default();
        write_status(&mut rec, StatusRegister::Sr1, 0x40, QerType::S1B6).unwrap();
        assert_eq!(writes(&rec), [(opcodes::WRSR, vec![0x40])]);
    }

    #[test]
    fn sr2_write_through_wrsr_on_v1_v4_v5() {
        for qer in [QerType::S2B1v1, QerType::S2B1v4, QerType::S2B1v5] {
            let mut rec = Recorder {
                status: [0x1C, 0x00, 0x00],
                ..Default::default()
            };
            write_status(&mut rec, StatusRegister::Sr2, 0x02, qer).unwrap();
            assert_eq!(writes(&rec), [(opcodes::WRSR, vec![0x1C, 0x02])], "{:?}", qer);
        }
    }

    #[test]
    fn sr2_write_dedicated_opcodes() {
        let mut rec = Recorder::default();
        write_status(&mut rec, StatusRegister::Sr2, 0x02, QerType::S2B1v6).unwrap();
        assert_eq!(writes(&rec), [(opcodes::WRSR2, vec![0x02])]);
        assert_eq!(rec.ops.len(), 1);

        let mut rec = Recorder::default();
        write_status(&mut rec, StatusRegister::Sr2, 0x80, QerType::S2B7).unwrap();
        assert_eq!(writes(&rec), [(opcodes::WRSR2_S2B7, vec![0x80])]);
    }

    #[test]
    fn sr2_read_opcode_depends_on_qer() {
        let mut rec = Recorder::default();
        read_status(&mut rec, StatusRegister::Sr2, QerType::S2B7).unwrap();
        read_status(&mut rec, StatusRegister::Sr2, QerType::S2B1v5).unwrap();
        let ops: Vec<u8> = rec.ops.iter().map(|(op, _)| *op).collect();
        assert_eq!(ops, [opcodes::RDSR2_S2B7, opcodes::RDSR2]);
    }

    #[test]
    fn wel_confirmation_is_bounded() {
        let mut rec = Recorder::default();
        assert_eq!(confirm_write_enable(&mut rec, 5), Err(Error::WriteEnableTimeout));
        assert_eq!(rec.ops.len(), 5);

        let mut rec = Recorder {
            sr1_script: vec![0x00, 0x00, opcodes::SR1_WEL],
            ..Default::default()
        };
        assert_eq!(confirm_write_enable(&mut rec, 5), Ok(()));
        assert_eq!(rec.ops.len(), 3);
    }

    #[test]
    fn wait_ready_polls_until_clear() {
        let mut rec = Recorder {
            sr1_script: vec![0x01, 0x03, 0x01, 0x00],
            ..Default::default()
        };
        let policy = PollPolicy {
            delay_us: 10,
            max_polls: None,
        };
        wait_ready(&mut rec, &policy).unwrap();
        assert_eq!(rec.ops.len(), 4);
        assert_eq!(rec.delays, 3);
    }

    #[test]
    fn wait_ready_bound() {
        let mut rec = Recorder {
            status: [opcodes::SR1_WIP, 0, 0],
            ..Default::default()
        };
        let policy = PollPolicy {
            delay_us: 0,
            max_polls: Some(4),
        };
        assert_eq!(wait_ready(&mut rec, &policy), Err(Error::BusyTimeout));
        assert_eq!(rec.ops.len(), 4);
        assert_eq!(rec.delays, 0);
    }

    #[test]
    fn jedec_id_splits_manufacturer_and_device() {
        let mut rec = Recorder::default();
        let id = read_jedec_id(&mut rec).unwrap();
        assert_eq!(id, JedecId([0xEF, 0x40, 0x18]));
        assert_eq!(id.manufacturer(), 0xEF);
        assert_eq!(id.device(), 0x4018);
        assert_eq!(std::format!("{}", id), "EF 4018");
    }

    #[test]
    fn reset_sends_enable_then_reset() {
        let mut rec = Recorder::default();
        software_reset(&mut rec).unwrap();
        assert_eq!(rec.ops, [(opcodes::RSTEN, vec![]), (opcodes::RST, vec![])]);
        assert_eq!(rec.delays, 2);
    }
}
