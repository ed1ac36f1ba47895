//! SFDP type definitions
//!
//! Wire layouts and decoded field types for the SFDP header, parameter
//! headers, the Basic Flash Parameter table and the 4-byte Address
//! Instruction table, as defined by JEDEC JESD216.

use bitflags::bitflags;
use zerocopy::byteorder::little_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::spi::{opcodes, IoMode};

/// SFDP signature magic value ("SFDP" in little-endian)
pub const SFDP_SIGNATURE: u32 = 0x50444653;

/// Size of the SFDP header and of each parameter header
pub const HEADER_LEN: usize = 8;

/// Smallest number of parameter headers the reader asks for
pub const MIN_PARAMETER_HEADERS: usize = 2;

/// Largest number of parameter headers the reader looks at
pub const MAX_PARAMETER_HEADERS: usize = 8;

/// Mandatory DWORDs of the Basic Flash Parameter table (JESD216)
pub const BFP_MIN_DWORDS: usize = 9;

/// DWORDs of the Basic Flash Parameter table that are read at most
pub const BFP_MAX_DWORDS: usize = 20;

/// Length of the 4-byte Address Instruction table
pub const FOUR_BYTE_TABLE_DWORDS: usize = 2;

// ============================================================================
// Parameter IDs (MSB << 8 | LSB)
// ============================================================================

/// Basic Flash Parameter Table ID
pub const PARAM_ID_BASIC: u16 = 0xFF00;
/// 4-byte Address Instruction Table ID
pub const PARAM_ID_4BYTE_ADDR: u16 = 0xFF84;

// ============================================================================
// Wire layouts
// ============================================================================

/// SFDP header as stored at SFDP address 0
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct RawSfdpHeader {
    /// "SFDP"
    pub signature: U32,
    /// Minor revision
    pub minor: u8,
    /// Major revision
    pub major: u8,
    /// Number of parameter headers minus one
    pub nph: u8,
    /// Access protocol
    pub access: u8,
}

/// Parameter header as stored after the SFDP header
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct RawParameterHeader {
    /// Parameter ID LSB
    pub id_lsb: u8,
    /// Minor revision
    pub minor: u8,
    /// Major revision
    pub major: u8,
    /// Table length in DWORDs
    pub len_dw: u8,
    /// Table pointer, little-endian 24-bit
    pub pointer: [u8; 3],
    /// Parameter ID MSB
    pub id_msb: u8,
}

// ============================================================================
// SFDP Revision
// ============================================================================

/// SFDP revision information
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SfdpRevision {
    /// Major revision number
    pub major: u8,
    /// Minor revision number
    pub minor: u8,
}

impl SfdpRevision {
    /// Create a new revision
    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }

    /// JESD216 (original, 9 DWORDs)
    pub const JESD216: Self = Self::new(1, 0);
    /// JESD216B (16 DWORDs, added QE requirements)
    pub const JESD216B: Self = Self::new(1, 6);
}

impl core::fmt::Display for SfdpRevision {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

// ============================================================================
// Headers
// ============================================================================

/// Decoded SFDP header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SfdpHeader {
    /// Signature as read
    pub signature: u32,
    /// SFDP revision
    pub revision: SfdpRevision,
    /// Number of parameter headers, 0-based as on the wire
    pub nph: u8,
    /// Access protocol byte
    pub access_protocol: u8,
}

impl SfdpHeader {
    /// Parse the 8 header bytes
    pub fn parse(data: &[u8; HEADER_LEN]) -> Self {
        let raw: RawSfdpHeader = zerocopy::transmute!(*data);
        Self {
            signature: raw.signature.get(),
            revision: SfdpRevision::new(raw.major, raw.minor),
            nph: raw.nph,
            access_protocol: raw.access,
        }
    }

    /// Encode back to the 8 header bytes
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let raw = RawSfdpHeader {
            signature: U32::new(self.signature),
            minor: self.revision.minor,
            major: self.revision.major,
            nph: self.nph,
            access: self.access_protocol,
        };
        zerocopy::transmute!(raw)
    }

    /// Returns true if the signature reads "SFDP"
    pub fn is_valid(&self) -> bool {
        self.signature == SFDP_SIGNATURE
    }

    /// Number of parameter headers that follow
    pub fn num_param_headers(&self) -> usize {
        self.nph as usize + 1
    }
}

/// Decoded parameter header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterHeader {
    /// Parameter ID (MSB from byte 7, LSB from byte 0)
    pub id: u16,
    /// Table revision
    pub revision: SfdpRevision,
    /// Table length in DWORDs
    pub length_dwords: u8,
    /// Byte address of the table in SFDP space
    pub table_pointer: u32,
}

impl ParameterHeader {
    /// Header for a Basic Flash Parameter table
    pub const fn basic(revision: SfdpRevision, length_dwords: u8, table_pointer: u32) -> Self {
        Self {
            id: PARAM_ID_BASIC,
            revision,
            length_dwords,
            table_pointer,
        }
    }

    /// Parse the 8 header bytes
    pub fn parse(data: &[u8; HEADER_LEN]) -> Self {
        let raw: RawParameterHeader = zerocopy::transmute!(*data);
        let [p0, p1, p2] = raw.pointer;
        Self {
            id: ((raw.id_msb as u16) << 8) | raw.id_lsb as u16,
            revision: SfdpRevision::new(raw.major, raw.minor),
            length_dwords: raw.len_dw,
            table_pointer: u32::from_le_bytes([p0, p1, p2, 0]),
        }
    }

    /// Encode back to the 8 header bytes
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let [p0, p1, p2, _] = self.table_pointer.to_le_bytes();
        let raw = RawParameterHeader {
            id_lsb: self.id as u8,
            minor: self.revision.minor,
            major: self.revision.major,
            len_dw: self.length_dwords,
            pointer: [p0, p1, p2],
            id_msb: (self.id >> 8) as u8,
        };
        zerocopy::transmute!(raw)
    }

    /// Table length in bytes
    pub fn length_bytes(&self) -> usize {
        self.length_dwords as usize * 4
    }

    /// Check if this is the Basic Flash Parameter table
    pub fn is_basic(&self) -> bool {
        self.id == PARAM_ID_BASIC
    }

    /// Check if this is the 4-byte Address Instruction table
    pub fn is_four_byte_table(&self) -> bool {
        self.id == PARAM_ID_4BYTE_ADDR
    }
}

// ============================================================================
// Address mode
// ============================================================================

/// Address bytes supported by the part (BFP DWORD 1 bits 18:17)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum AddressMode {
    /// 3-byte addressing only
    #[default]
    ThreeByteOnly,
    /// 3-byte by default, switchable to 4-byte
    ThreeOrFourByte,
    /// 4-byte addressing only
    FourByteOnly,
}

impl AddressMode {
    /// Decode the 2-bit field; the reserved value reads as 3-byte only
    pub fn from_bfpt(value: u8) -> Self {
        match value & 0x03 {
            1 => Self::ThreeOrFourByte,
            2 => Self::FourByteOnly,
            _ => Self::ThreeByteOnly,
        }
    }

    /// Encode as the 2-bit field
    pub fn to_bfpt(self) -> u8 {
        match self {
            Self::ThreeByteOnly => 0,
            Self::ThreeOrFourByte => 1,
            Self::FourByteOnly => 2,
        }
    }
}

// ============================================================================
// Erase types
// ============================================================================

/// One erase granularity: `2^exponent` bytes erased by `opcode`
///
/// An exponent of 0 marks the slot as absent. The slot index is
/// significant and must never be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EraseType {
    /// Size exponent
    pub exponent: u8,
    /// Erase opcode
    pub opcode: u8,
}

impl EraseType {
    /// Absent slot
    pub const ABSENT: Self = Self {
        exponent: 0,
        opcode: 0,
    };

    /// Create an erase type
    pub const fn new(exponent: u8, opcode: u8) -> Self {
        Self { exponent, opcode }
    }

    /// Erase size in bytes, 0 when absent or not representable
    pub const fn size(&self) -> u32 {
        if self.exponent == 0 || self.exponent >= 32 {
            0
        } else {
            1 << self.exponent
        }
    }

    /// Returns true if this slot describes a usable erase
    pub const fn is_present(&self) -> bool {
        self.size() != 0
    }
}

// ============================================================================
// Read modes
// ============================================================================

/// A read command variant with its timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReadMode {
    /// Line usage of the command
    pub io_mode: IoMode,
    /// Instruction opcode
    pub opcode: u8,
    /// Mode clock cycles after the address
    pub mode_clocks: u8,
    /// Wait states before valid output
    pub wait_states: u8,
}

impl ReadMode {
    /// Plain 1-1-1 READ, always available
    pub const SINGLE: Self = Self::new(IoMode::Single, opcodes::READ, 0, 0);

    /// Create a read mode
    pub const fn new(io_mode: IoMode, opcode: u8, mode_clocks: u8, wait_states: u8) -> Self {
        Self {
            io_mode,
            opcode,
            mode_clocks,
            wait_states,
        }
    }

    /// Decode a packed 16-bit half: [15:8] opcode, [7:5] mode clocks, [4:0] wait states
    pub const fn from_half(io_mode: IoMode, half: u16) -> Self {
        Self {
            io_mode,
            opcode: (half >> 8) as u8,
            mode_clocks: ((half >> 5) & 0x07) as u8,
            wait_states: (half & 0x1F) as u8,
        }
    }

    /// Encode as a packed 16-bit half
    pub const fn to_half(&self) -> u16 {
        ((self.opcode as u16) << 8)
            | (((self.mode_clocks & 0x07) as u16) << 5)
            | (self.wait_states & 0x1F) as u16
    }

    /// Dummy cycles to program into the transaction
    pub const fn dummy_cycles(&self) -> u8 {
        self.mode_clocks + self.wait_states
    }
}

/// Discovered read modes, slowest first
pub type ReadModes = heapless::Vec<ReadMode, 5>;

// ============================================================================
// Quad Enable Requirements
// ============================================================================

/// Quad Enable Requirement (BFP DWORD 15 bits 22:20)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum QerType {
    /// No QE bit; quad opcodes select quad mode themselves
    #[default]
    None,
    /// SR2 bit 1; a one byte WRSR clears SR2, so SR1 writes carry both bytes
    S2B1v1,
    /// SR1 bit 6
    S1B6,
    /// SR2 bit 7, read with 0x3F and written with 0x3E
    S2B7,
    /// SR2 bit 1; SR2 is written through a two byte WRSR
    S2B1v4,
    /// SR2 bit 1; read with 0x35, written through a two byte WRSR
    S2B1v5,
    /// SR2 bit 1; read with 0x35, written with 0x31
    S2B1v6,
    /// Value without a defined meaning
    Reserved(u8),
}

impl QerType {
    /// Decode the 3-bit field
    pub fn from_bfpt(value: u8) -> Self {
        match value & 0x07 {
            0 => Self::None,
            1 => Self::S2B1v1,
            2 => Self::S1B6,
            3 => Self::S2B7,
            4 => Self::S2B1v4,
            5 => Self::S2B1v5,
            6 => Self::S2B1v6,
            v => Self::Reserved(v),
        }
    }

    /// Encode as the 3-bit field
    pub fn to_bfpt(self) -> u8 {
        match self {
            Self::None => 0,
            Self::S2B1v1 => 1,
            Self::S1B6 => 2,
            Self::S2B7 => 3,
            Self::S2B1v4 => 4,
            Self::S2B1v5 => 5,
            Self::S2B1v6 => 6,
            Self::Reserved(v) => v & 0x07,
        }
    }
}

// ============================================================================
// 4-byte addressing
// ============================================================================

bitflags! {
    /// Methods to enter 4-byte addressing (BFP DWORD 16 bits 31:24)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    #[cfg_attr(feature = "serde", serde(transparent))]
    pub struct FourByteEntry: u8 {
        /// Issue 0xB7
        const B7 = 1 << 0;
        /// Issue WREN, then 0xB7
        const WREN_B7 = 1 << 1;
        /// 8-bit volatile extended address register
        const EXT_ADDR_REG = 1 << 2;
        /// 8-bit volatile bank register
        const BANK_REG = 1 << 3;
        /// 8-bit non-volatile configuration register
        const NV_CONFIG_REG = 1 << 4;
        /// Dedicated 4-byte instruction set
        const DEDICATED_4B = 1 << 5;
        /// Always operates in 4-byte mode
        const ALWAYS_4B = 1 << 6;
    }
}

bitflags! {
    /// Supported 4-byte instructions (4BAIT DWORD 1)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FourByteInstructions: u32 {
        /// 1-1-1 READ (0x13)
        const READ = 1 << 0;
        /// 1-1-1 FAST_READ (0x0C)
        const FAST_READ = 1 << 1;
        /// 1-1-2 fast read (0x3C)
        const READ_1_1_2 = 1 << 2;
        /// 1-2-2 fast read (0xBC)
        const READ_1_2_2 = 1 << 3;
        /// 1-1-4 fast read (0x6C)
        const READ_1_1_4 = 1 << 4;
        /// 1-4-4 fast read (0xEC)
        const READ_1_4_4 = 1 << 5;
        /// 1-1-1 page program (0x12)
        const PP = 1 << 6;
        /// 1-1-4 page program (0x34)
        const PP_1_1_4 = 1 << 7;
        /// 1-4-4 page program (0x3E)
        const PP_1_4_4 = 1 << 8;
        /// Erase type 1
        const ERASE_1 = 1 << 9;
        /// Erase type 2
        const ERASE_2 = 1 << 10;
        /// Erase type 3
        const ERASE_3 = 1 << 11;
        /// Erase type 4
        const ERASE_4 = 1 << 12;
    }
}

/// Decoded 4-byte Address Instruction table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FourByteAddrTable {
    /// Supported instructions
    pub instructions: FourByteInstructions,
    /// 4-byte erase opcode per erase type slot
    pub erase_opcodes: [Option<u8>; 4],
}

impl FourByteAddrTable {
    /// Decode from the two table DWORDs
    pub fn from_dwords(dword1: u32, dword2: u32) -> Self {
        let mut erase_opcodes = [None; 4];
        for (slot, byte) in erase_opcodes.iter_mut().zip(dword2.to_le_bytes()) {
            // 0xFF marks an erase type without a 4-byte instruction
            *slot = (byte != 0xFF).then_some(byte);
        }
        Self {
            instructions: FourByteInstructions::from_bits_truncate(dword1),
            erase_opcodes,
        }
    }

    /// Encode as the two table DWORDs
    pub fn to_dwords(&self) -> [u32; 2] {
        let mut bytes = [0xFF; 4];
        for (byte, slot) in bytes.iter_mut().zip(self.erase_opcodes) {
            if let Some(op) = slot {
                *byte = op;
            }
        }
        [self.instructions.bits(), u32::from_le_bytes(bytes)]
    }
}

// ============================================================================
// Basic Flash Parameters
// ============================================================================

/// Fields decoded from the Basic Flash Parameter table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicFlashParams {
    /// Table revision
    pub revision: SfdpRevision,
    /// DWORDs the fields were decoded from
    pub length_dwords: u8,
    /// Device size in bytes
    pub density_bytes: u32,
    /// Supported address bytes
    pub address_mode: AddressMode,
    /// Erase types 1..4 in table order
    pub erase_types: [EraseType; 4],
    /// Supported read modes, slowest first, always starting with 1-1-1
    pub read_modes: ReadModes,
    /// Page program size in bytes
    pub page_size: u32,
    /// Quad Enable Requirement, if the table is long enough to carry it
    pub quad_enable: Option<QerType>,
    /// 4-byte entry methods, if the table is long enough to carry them
    pub four_byte_entry: Option<FourByteEntry>,
}

impl Default for BasicFlashParams {
    fn default() -> Self {
        let mut read_modes = ReadModes::new();
        // Capacity covers every mode, this cannot fail.
        let _ = read_modes.push(ReadMode::SINGLE);
        Self {
            revision: SfdpRevision::JESD216,
            length_dwords: BFP_MIN_DWORDS as u8,
            density_bytes: 0,
            address_mode: AddressMode::ThreeByteOnly,
            erase_types: [EraseType::ABSENT; 4],
            read_modes,
            page_size: 256,
            quad_enable: None,
            four_byte_entry: None,
        }
    }
}

impl BasicFlashParams {
    /// Look up the discovered read mode for an I/O mode
    pub fn read_mode(&self, io_mode: IoMode) -> Option<&ReadMode> {
        self.read_modes.iter().find(|m| m.io_mode == io_mode)
    }
}
