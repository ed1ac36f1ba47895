//! spinor-dummy - In-memory serial NOR flash emulator for testing
//!
//! [`DummyFlash`] implements [`Transport`] on top of a byte array and
//! behaves like a real part as far as the core can observe: it serves an
//! SFDP image built from its [`DummyConfig`], keeps the write enable
//! latch, reports WIP for a configurable number of status reads after
//! every modifying command, implements the status register conventions of
//! its Quad Enable Requirement, switches between 3- and 4-byte addressing,
//! answers RDID and the RSTEN/RST reset pair and applies NOR program/erase
//! semantics. Every transaction is logged.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use spinor_core::sfdp::{
    encode_sfdp, AddressMode, BasicFlashParams, EraseType, FourByteAddrTable, FourByteEntry,
    FourByteInstructions, QerType, ReadMode, ReadModes, SfdpRevision,
};
use spinor_core::spi::{opcodes, AddressWidth, IoMode, SpiCommand};
use spinor_core::Transport;

/// Failures of the emulated part
///
/// A real part silently ignores most of these; the emulator reports them so
/// that tests see sequencing mistakes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DummyError {
    /// Opcode the emulated part does not implement
    #[error("unsupported opcode 0x{0:02X}")]
    UnsupportedOpcode(u8),
    /// Access past the end of the array
    #[error("access of {len} bytes at 0x{addr:08X} out of range")]
    AddressOutOfRange {
        /// Start address
        addr: u32,
        /// Access length
        len: usize,
    },
    /// Address phase width does not match the current address mode
    #[error("opcode 0x{opcode:02X} sent with {got}-byte address, part expects {expected}")]
    WrongAddressWidth {
        /// Offending opcode
        opcode: u8,
        /// Address bytes the part expects
        expected: u8,
        /// Address bytes sent
        got: u8,
    },
    /// Line usage does not match the opcode
    #[error("opcode 0x{opcode:02X} sent as {got}, expects {expected}")]
    WrongIoMode {
        /// Offending opcode
        opcode: u8,
        /// I/O mode of the opcode
        expected: IoMode,
        /// I/O mode sent
        got: IoMode,
    },
    /// Dummy cycles do not match the opcode
    #[error("opcode 0x{opcode:02X} sent with {got} dummy cycles, expects {expected}")]
    WrongDummyCycles {
        /// Offending opcode
        opcode: u8,
        /// Dummy cycles the part expects
        expected: u8,
        /// Dummy cycles sent
        got: u8,
    },
    /// Modifying command without the write enable latch
    #[error("opcode 0x{0:02X} without write enable")]
    NotWriteEnabled(u8),
    /// Command other than a status read while a write is in progress
    #[error("opcode 0x{0:02X} while busy")]
    Busy(u8),
    /// Four line transfer while the QE bit is clear
    #[error("opcode 0x{0:02X} needs the QE bit")]
    QuadDisabled(u8),
    /// Failure injected by the test
    #[error("injected failure on opcode 0x{0:02X}")]
    Injected(u8),
}

/// Description of the emulated part
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DummyConfig {
    /// Manufacturer and device ID returned by RDID
    pub jedec_id: [u8; 3],
    /// Size in bytes
    pub size: u32,
    /// Page program size in bytes
    pub page_size: u32,
    /// Address bytes the part supports
    pub address_mode: AddressMode,
    /// Ways into 4-byte addressing
    pub four_byte_entry: FourByteEntry,
    /// Serve a 4-byte Address Instruction table
    pub four_byte_table: bool,
    /// Erase types in table order
    pub erase_types: [EraseType; 4],
    /// Quad Enable Requirement; `None` serves a 9 DWORD table without it
    pub qer: Option<QerType>,
    /// Fast read modes besides 1-1-1
    pub read_modes: Vec<ReadMode>,
    /// Status registers 1-3 at power on
    pub status: [u8; 3],
    /// Status reads reporting WIP after each modifying command
    pub busy_polls: u32,
    /// Answer RDSFDP; otherwise the part reads as all 0xFF
    pub sfdp: bool,
    /// Largest read the transport accepts in one transaction
    pub max_read_len: usize,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            jedec_id: [0xEF, 0x40, 0x18],
            size: 16 * 1024 * 1024,
            page_size: 256,
            address_mode: AddressMode::ThreeByteOnly,
            four_byte_entry: FourByteEntry::empty(),
            four_byte_table: false,
            erase_types: [
                EraseType::new(12, opcodes::SE_20),
                EraseType::new(15, opcodes::BE_52),
                EraseType::new(16, opcodes::BE_D8),
                EraseType::ABSENT,
            ],
            qer: Some(QerType::S2B1v4),
            read_modes: vec![
                ReadMode::new(IoMode::DualOut, opcodes::DOR, 0, 8),
                ReadMode::new(IoMode::DualIo, opcodes::DIOR, 4, 0),
                ReadMode::new(IoMode::QuadOut, opcodes::QOR, 0, 8),
                ReadMode::new(IoMode::QuadIo, opcodes::QIOR, 2, 4),
            ],
            status: [0; 3],
            busy_polls: 2,
            sfdp: true,
            max_read_len: 4096,
        }
    }
}

impl DummyConfig {
    /// Basic Flash Parameters the part advertises
    pub fn basic_params(&self) -> BasicFlashParams {
        let mut read_modes = ReadModes::new();
        let _ = read_modes.push(ReadMode::SINGLE);
        let mut fast = self.read_modes.clone();
        fast.sort_by_key(|m| m.io_mode);
        for mode in fast.into_iter().filter(|m| m.io_mode != IoMode::Single) {
            let _ = read_modes.push(mode);
        }

        let four_byte_entry = match self.address_mode {
            AddressMode::ThreeByteOnly if self.four_byte_entry.is_empty() => None,
            _ => Some(self.four_byte_entry),
        };

        BasicFlashParams {
            revision: SfdpRevision::JESD216B,
            length_dwords: 9,
            density_bytes: self.size,
            address_mode: self.address_mode,
            erase_types: self.erase_types,
            read_modes,
            page_size: self.page_size,
            quad_enable: self.qer,
            four_byte_entry,
        }
    }

    /// 4-byte Address Instruction table the part advertises
    pub fn four_byte_addr_table(&self) -> Option<FourByteAddrTable> {
        if !self.four_byte_table {
            return None;
        }
        let mut instructions = FourByteInstructions::READ | FourByteInstructions::FAST_READ | FourByteInstructions::PP;
        let mut erase_opcodes = [None; 4];
        let erase_bits = [
            FourByteInstructions::ERASE_1,
            FourByteInstructions::ERASE_2,
            FourByteInstructions::ERASE_3,
            FourByteInstructions::ERASE_4,
        ];
        for (i, et) in self.erase_types.iter().enumerate() {
            if let Some(op) = et.is_present().then(|| opcodes::erase_opcode_4b(et.opcode)).flatten() {
                erase_opcodes[i] = Some(op);
                instructions |= erase_bits[i];
            }
        }
        Some(FourByteAddrTable {
            instructions,
            erase_opcodes,
        })
    }

    fn read_mode_for(&self, opcode: u8) -> Option<ReadMode> {
        if opcode == opcodes::READ || opcode == opcodes::READ_4B {
            return Some(ReadMode::SINGLE);
        }
        self.read_modes
            .iter()
            .find(|m| m.opcode == opcode || opcodes::read_opcode_4b(m.opcode) == Some(opcode))
            .copied()
    }
}

/// One logged transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// Opcode
    pub opcode: u8,
    /// Address, if any
    pub address: Option<u32>,
    /// Address width
    pub address_width: AddressWidth,
    /// I/O mode
    pub io_mode: IoMode,
    /// Dummy cycles
    pub dummy_cycles: u8,
    /// Bytes written to the part
    pub write_data: Vec<u8>,
    /// Bytes read from the part
    pub read_len: usize,
}

/// Emulated serial NOR flash
#[derive(Debug, Clone)]
pub struct DummyFlash {
    config: DummyConfig,
    data: Vec<u8>,
    sfdp: Vec<u8>,
    status: [u8; 3],
    write_enabled: bool,
    busy: u32,
    four_byte_mode: bool,
    reset_enabled: bool,
    log: Vec<Transaction>,
    fail_on: Option<u8>,
    wel_stuck: bool,
    status_locked: bool,
}

impl DummyFlash {
    /// Create an erased part
    pub fn new(config: DummyConfig) -> Self {
        let sfdp = if config.sfdp {
            encode_sfdp(&config.basic_params(), config.four_byte_addr_table().as_ref())
        } else {
            Vec::new()
        };
        Self {
            data: vec![0xFF; config.size as usize],
            sfdp,
            status: config.status,
            write_enabled: false,
            busy: 0,
            four_byte_mode: config.address_mode == AddressMode::FourByteOnly,
            reset_enabled: false,
            log: Vec::new(),
            fail_on: None,
            wel_stuck: false,
            status_locked: false,
            config,
        }
    }

    /// Create a part with initial contents
    pub fn with_data(config: DummyConfig, initial: &[u8]) -> Self {
        let mut flash = Self::new(config);
        let len = initial.len().min(flash.data.len());
        flash.data[..len].copy_from_slice(&initial[..len]);
        flash
    }

    /// Configuration of the part
    pub fn config(&self) -> &DummyConfig {
        &self.config
    }

    /// Array contents
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Array contents, mutable
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// SFDP image served by RDSFDP
    pub fn sfdp_image(&self) -> &[u8] {
        &self.sfdp
    }

    /// Status registers 1-3, WEL and WIP not included
    pub fn status(&self) -> [u8; 3] {
        self.status
    }

    /// Returns true if the part decodes 4-byte addresses
    pub fn in_four_byte_mode(&self) -> bool {
        self.four_byte_mode
    }

    /// Every transaction since creation or the last [`Self::clear_log`]
    pub fn transactions(&self) -> &[Transaction] {
        &self.log
    }

    /// Opcodes of the logged transactions
    pub fn opcodes(&self) -> Vec<u8> {
        self.log.iter().map(|t| t.opcode).collect()
    }

    /// Number of logged transactions with `opcode`
    pub fn count(&self, opcode: u8) -> usize {
        self.log.iter().filter(|t| t.opcode == opcode).count()
    }

    /// Forget the logged transactions
    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    /// Fail every transaction with `opcode`
    pub fn fail_on(&mut self, opcode: Option<u8>) {
        self.fail_on = opcode;
    }

    /// Keep WEL clear whatever WREN does
    pub fn set_wel_stuck(&mut self, stuck: bool) {
        self.wel_stuck = stuck;
    }

    /// Accept status register writes without changing anything
    pub fn set_status_locked(&mut self, locked: bool) {
        self.status_locked = locked;
    }

    fn qe_set(&self) -> bool {
        match self.config.qer.unwrap_or_default() {
            QerType::S1B6 => self.status[0] & opcodes::SR1_QE_B6 != 0,
            QerType::S2B7 => self.status[1] & opcodes::SR2_QE_B7 != 0,
            QerType::S2B1v1 | QerType::S2B1v4 | QerType::S2B1v5 | QerType::S2B1v6 => {
                self.status[1] & opcodes::SR2_QE_B1 != 0
            }
            QerType::None | QerType::Reserved(_) => true,
        }
    }

    fn check_width(&self, cmd: &SpiCommand<'_>, dedicated_4b: bool) -> Result<(), DummyError> {
        let expected = if dedicated_4b || self.four_byte_mode { 4 } else { 3 };
        let got = cmd.address_width.bytes();
        if got != expected || cmd.address.is_none() {
            return Err(DummyError::WrongAddressWidth {
                opcode: cmd.opcode,
                expected,
                got,
            });
        }
        Ok(())
    }

    fn check_io(&self, cmd: &SpiCommand<'_>, expected: IoMode) -> Result<(), DummyError> {
        if cmd.io_mode != expected {
            return Err(DummyError::WrongIoMode {
                opcode: cmd.opcode,
                expected,
                got: cmd.io_mode,
            });
        }
        if expected.requires_quad() && !self.qe_set() {
            return Err(DummyError::QuadDisabled(cmd.opcode));
        }
        Ok(())
    }

    fn range(&self, addr: u32, len: usize) -> Result<core::ops::Range<usize>, DummyError> {
        let start = addr as usize;
        if start + len > self.data.len() {
            return Err(DummyError::AddressOutOfRange { addr, len });
        }
        Ok(start..start + len)
    }

    fn take_write_enable(&mut self, opcode: u8) -> Result<(), DummyError> {
        if !self.write_enabled {
            return Err(DummyError::NotWriteEnabled(opcode));
        }
        self.write_enabled = false;
        self.busy = self.config.busy_polls;
        Ok(())
    }

    fn handle_read(&mut self, cmd: &mut SpiCommand<'_>, mode: ReadMode) -> Result<(), DummyError> {
        let dedicated = opcodes::read_opcode_4b(mode.opcode) == Some(cmd.opcode) && cmd.opcode != mode.opcode;
        self.check_width(cmd, dedicated)?;
        self.check_io(cmd, mode.io_mode)?;
        if cmd.dummy_cycles != mode.dummy_cycles() {
            return Err(DummyError::WrongDummyCycles {
                opcode: cmd.opcode,
                expected: mode.dummy_cycles(),
                got: cmd.dummy_cycles,
            });
        }
        if cmd.read_buf.len() > self.config.max_read_len {
            return Err(DummyError::AddressOutOfRange {
                addr: cmd.address.unwrap_or(0),
                len: cmd.read_buf.len(),
            });
        }
        let range = self.range(cmd.address.unwrap_or(0), cmd.read_buf.len())?;
        cmd.read_buf.copy_from_slice(&self.data[range]);
        Ok(())
    }

    fn handle_sfdp(&mut self, cmd: &mut SpiCommand<'_>) -> Result<(), DummyError> {
        if cmd.address_width != AddressWidth::ThreeByte {
            return Err(DummyError::WrongAddressWidth {
                opcode: cmd.opcode,
                expected: 3,
                got: cmd.address_width.bytes(),
            });
        }
        if cmd.dummy_cycles != opcodes::RDSFDP_DUMMY_CYCLES {
            return Err(DummyError::WrongDummyCycles {
                opcode: cmd.opcode,
                expected: opcodes::RDSFDP_DUMMY_CYCLES,
                got: cmd.dummy_cycles,
            });
        }
        let start = cmd.address.unwrap_or(0) as usize;
        for (i, byte) in cmd.read_buf.iter_mut().enumerate() {
            *byte = self.sfdp.get(start + i).copied().unwrap_or(0xFF);
        }
        Ok(())
    }

    fn handle_program(&mut self, cmd: &SpiCommand<'_>, dedicated_4b: bool) -> Result<(), DummyError> {
        self.check_width(cmd, dedicated_4b)?;
        self.check_io(cmd, opcodes::program_io_mode(cmd.opcode))?;
        self.take_write_enable(cmd.opcode)?;

        let addr = cmd.address.unwrap_or(0);
        let page = self.config.page_size as usize;
        let base = addr as usize - addr as usize % page;
        self.range(base as u32, page)?;
        // Data past the page end wraps to its start
        for (i, &byte) in cmd.write_data.iter().enumerate() {
            let at = base + (addr as usize % page + i) % page;
            self.data[at] &= byte;
        }
        Ok(())
    }

    fn handle_erase(&mut self, cmd: &SpiCommand<'_>, size: u32, dedicated_4b: bool) -> Result<(), DummyError> {
        self.check_width(cmd, dedicated_4b)?;
        self.take_write_enable(cmd.opcode)?;
        let addr = cmd.address.unwrap_or(0) & !(size - 1);
        let range = self.range(addr, size as usize)?;
        self.data[range].fill(0xFF);
        Ok(())
    }

    fn handle_write_status(&mut self, cmd: &SpiCommand<'_>) -> Result<(), DummyError> {
        self.take_write_enable(cmd.opcode)?;
        if self.status_locked {
            return Ok(());
        }
        let data = cmd.write_data;
        let qer = self.config.qer.unwrap_or_default();
        match (cmd.opcode, data) {
            (opcodes::WRSR, [sr1]) => {
                self.status[0] = *sr1;
                if qer == QerType::S2B1v1 {
                    self.status[1] = 0;
                }
            }
            (opcodes::WRSR, [sr1, sr2, ..]) => {
                self.status[0] = *sr1;
                self.status[1] = *sr2;
            }
            (opcodes::WRSR2 | opcodes::WRSR2_S2B7, [sr2, ..]) => self.status[1] = *sr2,
            (opcodes::WRSR3, [sr3, ..]) => self.status[2] = *sr3,
            _ => return Err(DummyError::UnsupportedOpcode(cmd.opcode)),
        }
        self.status[0] &= !(opcodes::SR1_WIP | opcodes::SR1_WEL);
        Ok(())
    }

    fn erase_size(&self, opcode: u8) -> Option<(u32, bool)> {
        self.config.erase_types.iter().filter(|et| et.is_present()).find_map(|et| {
            if et.opcode == opcode {
                Some((et.size(), false))
            } else if opcodes::erase_opcode_4b(et.opcode) == Some(opcode) {
                Some((et.size(), true))
            } else {
                None
            }
        })
    }

    /// Back to the power-on state; the array and status registers survive
    fn reset(&mut self) {
        self.write_enabled = false;
        self.busy = 0;
        self.four_byte_mode = self.config.address_mode == AddressMode::FourByteOnly;
    }

    fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> Result<(), DummyError> {
        if self.fail_on == Some(cmd.opcode) {
            return Err(DummyError::Injected(cmd.opcode));
        }

        // RST only counts right after RSTEN, and aborts a running cycle
        let reset_enabled = core::mem::take(&mut self.reset_enabled);
        match cmd.opcode {
            opcodes::RSTEN => {
                self.reset_enabled = true;
                return Ok(());
            }
            opcodes::RST => {
                if reset_enabled {
                    self.reset();
                }
                return Ok(());
            }
            _ => {}
        }

        if cmd.opcode == opcodes::RDSR {
            let mut sr1 = self.status[0];
            if self.write_enabled {
                sr1 |= opcodes::SR1_WEL;
            }
            if self.busy > 0 {
                self.busy -= 1;
                sr1 |= opcodes::SR1_WIP;
            }
            if let Some(b) = cmd.read_buf.first_mut() {
                *b = sr1;
            }
            return Ok(());
        }
        if self.busy > 0 {
            return Err(DummyError::Busy(cmd.opcode));
        }

        let qer = self.config.qer.unwrap_or_default();
        let opcode = cmd.opcode;
        match opcode {
            opcodes::WREN => self.write_enabled = !self.wel_stuck,
            opcodes::WRDI => self.write_enabled = false,
            opcodes::RDID => {
                let len = cmd.read_buf.len().min(3);
                cmd.read_buf[..len].copy_from_slice(&self.config.jedec_id[..len]);
            }
            opcodes::RDSR2_S2B7 if qer == QerType::S2B7 => fill_reg(cmd, self.status[1]),
            opcodes::RDSR2 => fill_reg(cmd, self.status[1]),
            opcodes::RDSR3 => fill_reg(cmd, self.status[2]),
            opcodes::WRSR2_S2B7 if qer == QerType::S2B7 => self.handle_write_status(cmd)?,
            opcodes::WRSR | opcodes::WRSR2 | opcodes::WRSR3 => self.handle_write_status(cmd)?,
            opcodes::RDSFDP if self.config.sfdp => self.handle_sfdp(cmd)?,
            opcodes::RDSFDP => cmd.read_buf.fill(0xFF),
            opcodes::EN4B => {
                let entry = self.config.four_byte_entry;
                if self.config.address_mode != AddressMode::ThreeOrFourByte {
                    return Err(DummyError::UnsupportedOpcode(opcode));
                }
                if entry.contains(FourByteEntry::B7) {
                    self.four_byte_mode = true;
                } else if entry.contains(FourByteEntry::WREN_B7) {
                    if !self.write_enabled {
                        return Err(DummyError::NotWriteEnabled(opcode));
                    }
                    self.write_enabled = false;
                    self.four_byte_mode = true;
                } else {
                    return Err(DummyError::UnsupportedOpcode(opcode));
                }
            }
            opcodes::EX4B if self.config.address_mode == AddressMode::ThreeOrFourByte => {
                self.four_byte_mode = false;
            }
            opcodes::PP | opcodes::PP_1_1_2 | opcodes::PP_1_1_4 | opcodes::PP_1_4_4 => {
                self.handle_program(cmd, false)?
            }
            opcodes::PP_4B | opcodes::PP_1_1_4_4B | opcodes::PP_1_4_4_4B => {
                self.handle_program(cmd, true)?
            }
            opcodes::CE_C7 | opcodes::CE_60 => {
                self.take_write_enable(opcode)?;
                self.data.fill(0xFF);
            }
            _ => {
                if let Some(mode) = self.config.read_mode_for(opcode) {
                    self.handle_read(cmd, mode)?;
                } else if let Some((size, dedicated)) = self.erase_size(opcode) {
                    self.handle_erase(cmd, size, dedicated)?;
                } else {
                    return Err(DummyError::UnsupportedOpcode(opcode));
                }
            }
        }
        Ok(())
    }
}

fn fill_reg(cmd: &mut SpiCommand<'_>, value: u8) {
    if let Some(b) = cmd.read_buf.first_mut() {
        *b = value;
    }
}

impl Transport for DummyFlash {
    type Error = DummyError;

    fn transact(&mut self, cmd: &mut SpiCommand<'_>) -> Result<(), DummyError> {
        let result = self.execute(cmd);
        self.log.push(Transaction {
            opcode: cmd.opcode,
            address: cmd.address,
            address_width: cmd.address_width,
            io_mode: cmd.io_mode,
            dummy_cycles: cmd.dummy_cycles,
            write_data: cmd.write_data.to_vec(),
            read_len: cmd.read_buf.len(),
        });
        if let Err(ref e) = result {
            log::debug!("dummy: {}", e);
        }
        result
    }

    fn max_read_len(&self) -> usize {
        self.config.max_read_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spinor_core::protocol;

    fn ready(flash: &mut DummyFlash) {
        while protocol::is_busy(flash).unwrap() {}
    }

    #[test]
    fn serves_sfdp_signature() {
        let mut flash = DummyFlash::new(DummyConfig::default());
        assert!(spinor_core::sfdp::is_supported(&mut flash));

        let mut flash = DummyFlash::new(DummyConfig {
            sfdp: false,
            ..Default::default()
        });
        assert!(!spinor_core::sfdp::is_supported(&mut flash));
    }

    #[test]
    fn program_and_erase_semantics() {
        let mut flash = DummyFlash::new(DummyConfig::default());
        let width = AddressWidth::ThreeByte;

        protocol::write_enable(&mut flash).unwrap();
        protocol::program(&mut flash, opcodes::PP, IoMode::Single, width, 0x1000, &[0x0F, 0xF0]).unwrap();
        ready(&mut flash);
        protocol::write_enable(&mut flash).unwrap();
        protocol::program(&mut flash, opcodes::PP, IoMode::Single, width, 0x1000, &[0x3C, 0x3C]).unwrap();
        ready(&mut flash);
        assert_eq!(&flash.data()[0x1000..0x1002], &[0x0C, 0x30]);

        protocol::write_enable(&mut flash).unwrap();
        protocol::erase_block(&mut flash, opcodes::SE_20, width, 0x1800).unwrap();
        ready(&mut flash);
        assert!(flash.data()[0x1000..0x2000].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn program_wraps_inside_the_page() {
        let mut flash = DummyFlash::new(DummyConfig::default());
        protocol::write_enable(&mut flash).unwrap();
        let data = [0u8; 4];
        protocol::program(&mut flash, opcodes::PP, IoMode::Single, AddressWidth::ThreeByte, 0xFE, &data).unwrap();
        assert_eq!(&flash.data()[0xFE..0x100], &[0, 0]);
        assert_eq!(&flash.data()[0..2], &[0, 0]);
        assert_eq!(flash.data()[0x100], 0xFF);
    }

    #[test]
    fn modifying_commands_need_wel() {
        let mut flash = DummyFlash::new(DummyConfig::default());
        let err = protocol::chip_erase(&mut flash, opcodes::CE_C7);
        assert_eq!(
            err,
            Err(spinor_core::Error::Transport(DummyError::NotWriteEnabled(0xC7)))
        );
    }

    #[test]
    fn commands_while_busy_are_rejected() {
        let mut flash = DummyFlash::new(DummyConfig::default());
        protocol::write_enable(&mut flash).unwrap();
        protocol::chip_erase(&mut flash, opcodes::CE_C7).unwrap();
        assert!(protocol::write_enable(&mut flash).is_err());
        assert!(protocol::is_busy(&mut flash).unwrap());
        assert!(protocol::is_busy(&mut flash).unwrap());
        assert!(!protocol::is_busy(&mut flash).unwrap());
        assert!(protocol::write_enable(&mut flash).is_ok());
    }

    #[test]
    fn one_byte_wrsr_clears_sr2_on_s2b1v1() {
        let mut flash = DummyFlash::new(DummyConfig {
            qer: Some(QerType::S2B1v1),
            status: [0, opcodes::SR2_QE_B1, 0],
            busy_polls: 0,
            ..Default::default()
        });
        protocol::write_enable(&mut flash).unwrap();
        let mut cmd = SpiCommand::write_reg(opcodes::WRSR, &[0x1C]);
        flash.transact(&mut cmd).unwrap();
        assert_eq!(flash.status(), [0x1C, 0, 0]);

        protocol::write_enable(&mut flash).unwrap();
        protocol::write_status(&mut flash, protocol::StatusRegister::Sr1, 0x00, QerType::S2B1v1).unwrap();
        assert_eq!(flash.status()[0], 0);
    }

    #[test]
    fn four_byte_entry() {
        let mut flash = DummyFlash::new(DummyConfig {
            size: 32 * 1024 * 1024,
            address_mode: AddressMode::ThreeOrFourByte,
            four_byte_entry: FourByteEntry::WREN_B7,
            ..Default::default()
        });
        assert!(protocol::enter_4byte_mode(&mut flash).is_err());
        protocol::write_enable(&mut flash).unwrap();
        protocol::enter_4byte_mode(&mut flash).unwrap();
        assert!(flash.in_four_byte_mode());

        let mut buf = [0u8; 4];
        let mut cmd = SpiCommand::read(opcodes::READ, AddressWidth::ThreeByte, 0, &mut buf);
        assert!(matches!(
            flash.transact(&mut cmd),
            Err(DummyError::WrongAddressWidth { expected: 4, got: 3, .. })
        ));
    }

    #[test]
    fn answers_jedec_id() {
        let mut flash = DummyFlash::new(DummyConfig {
            jedec_id: [0xC2, 0x20, 0x19],
            ..Default::default()
        });
        let id = protocol::read_jedec_id(&mut flash).unwrap();
        assert_eq!(id.manufacturer(), 0xC2);
        assert_eq!(id.device(), 0x2019);
    }

    #[test]
    fn reset_restores_power_on_state() {
        let mut flash = DummyFlash::new(DummyConfig {
            size: 32 * 1024 * 1024,
            address_mode: AddressMode::ThreeOrFourByte,
            four_byte_entry: FourByteEntry::B7,
            status: [0, opcodes::SR2_QE_B1, 0],
            ..Default::default()
        });
        protocol::enter_4byte_mode(&mut flash).unwrap();
        protocol::write_enable(&mut flash).unwrap();
        assert!(flash.in_four_byte_mode());

        // RST without RSTEN right before it is ignored
        let mut cmd = SpiCommand::simple(opcodes::RST);
        flash.transact(&mut cmd).unwrap();
        assert!(flash.in_four_byte_mode());

        protocol::software_reset(&mut flash).unwrap();
        assert!(!flash.in_four_byte_mode());
        assert!(!protocol::check_wel(&mut flash).unwrap());
        assert_eq!(flash.status(), [0, opcodes::SR2_QE_B1, 0]);
    }

    #[test]
    fn reset_aborts_a_running_cycle() {
        let mut flash = DummyFlash::new(DummyConfig::default());
        protocol::write_enable(&mut flash).unwrap();
        protocol::chip_erase(&mut flash, opcodes::CE_C7).unwrap();
        assert!(protocol::write_enable(&mut flash).is_err());
        protocol::software_reset(&mut flash).unwrap();
        assert!(!protocol::is_busy(&mut flash).unwrap());
    }

    #[test]
    fn log_records_every_transaction() {
        let mut flash = DummyFlash::new(DummyConfig::default());
        flash.fail_on(Some(opcodes::WREN));
        assert!(protocol::write_enable(&mut flash).is_err());
        protocol::read_status1(&mut flash).unwrap();
        assert_eq!(flash.opcodes(), [opcodes::WREN, opcodes::RDSR]);
        assert_eq!(flash.count(opcodes::RDSR), 1);
        flash.clear_log();
        assert!(flash.transactions().is_empty());
    }
}
