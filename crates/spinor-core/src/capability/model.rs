//! The capability model of one discovered part

use crate::erase::{self, PageLayout};
use crate::sfdp::{EraseType, QerType, ReadMode, ReadModes};
use crate::spi::{AddressWidth, IoMode};

use super::BusWidth;

/// How 4-byte addressing was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum AddressEntry {
    /// Still in 3-byte addressing
    #[default]
    None,
    /// Dedicated 4-byte opcodes, no mode switch
    Native4Byte,
    /// Entered with 0xB7
    EnterB7,
    /// Entered with WREN followed by 0xB7
    WrenEnterB7,
    /// The part only knows 4-byte addresses
    Always,
}

/// Everything the sequencer needs to know about a part
///
/// Built once by discovery and never modified afterwards. All opcodes are
/// the ones actually put on the wire, so a model using native 4-byte
/// opcodes already carries their 4-byte forms.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CapabilityModel {
    /// Device size in bytes
    pub size: u32,
    /// Page program size in bytes
    pub page_size: u32,
    /// Address bytes sent with every addressed command
    pub address_width: AddressWidth,
    /// How the address width was reached
    pub address_entry: AddressEntry,
    /// Read mode used for data reads
    pub read_mode: ReadMode,
    /// Every read mode the part advertised
    pub read_modes: ReadModes,
    /// Page program opcode
    pub write_opcode: u8,
    /// Line usage of the page program opcode
    pub write_io_mode: IoMode,
    /// Erase types in table order
    pub erase_types: [EraseType; 4],
    /// Chip erase opcode
    pub chip_erase_opcode: u8,
    /// Quad Enable Requirement
    pub qer: QerType,
    /// Data lines available
    pub bus_width: BusWidth,
}

impl CapabilityModel {
    /// Returns true if dedicated 4-byte opcodes are in use
    pub fn native_four_byte(&self) -> bool {
        self.address_entry == AddressEntry::Native4Byte
    }

    /// Smallest present erase type
    pub fn smallest_erase(&self) -> Option<EraseType> {
        erase::smallest_erase(&self.erase_types)
    }

    /// Smallest erase size in bytes, if any erase type is present
    pub fn erase_granularity(&self) -> Option<u32> {
        self.smallest_erase().map(|et| et.size())
    }

    /// Uniform page layout for flash page layout consumers
    pub fn page_layout(&self) -> PageLayout {
        erase::page_layout(&self.erase_types, self.page_size, self.size)
    }

    /// Returns true if the selected read or program mode needs QE set
    pub fn needs_quad(&self) -> bool {
        self.read_mode.io_mode.requires_quad() || self.write_io_mode.requires_quad()
    }

    /// Returns true if `[offset, offset + len)` lies inside the device
    pub fn contains(&self, offset: u32, len: u64) -> bool {
        offset as u64 + len <= self.size as u64
    }
}

impl core::fmt::Display for CapabilityModel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        writeln!(f, "size:        {} bytes", self.size)?;
        writeln!(f, "page size:   {} bytes", self.page_size)?;
        writeln!(f, "addressing:  {} ({:?})", self.address_width, self.address_entry)?;
        writeln!(
            f,
            "read:        {} opcode 0x{:02X} dummy {}",
            self.read_mode.io_mode,
            self.read_mode.opcode,
            self.read_mode.dummy_cycles()
        )?;
        writeln!(
            f,
            "program:     {} opcode 0x{:02X}",
            self.write_io_mode, self.write_opcode
        )?;
        for (i, et) in self.erase_types.iter().enumerate() {
            if et.is_present() {
                writeln!(f, "erase {}:     {} bytes opcode 0x{:02X}", i + 1, et.size(), et.opcode)?;
            }
        }
        writeln!(f, "chip erase:  opcode 0x{:02X}", self.chip_erase_opcode)?;
        write!(f, "QER:         {:?}", self.qer)
    }
}
