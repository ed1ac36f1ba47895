//! Standard JEDEC SPI flash opcodes
//!
//! This module defines the command opcodes the core issues, as specified
//! by JEDEC JESD216 (SFDP) and common manufacturer conventions.

// ============================================================================
// Write control
// ============================================================================

/// Write Enable - required before any write/erase operation
pub const WREN: u8 = 0x06;
/// Write Disable - clears WEL bit in status register
pub const WRDI: u8 = 0x04;

// ============================================================================
// Identification and reset
// ============================================================================

/// Read JEDEC ID (manufacturer + device ID)
pub const RDID: u8 = 0x9F;
/// Reset Enable
pub const RSTEN: u8 = 0x66;
/// Reset Device, only accepted right after RSTEN
pub const RST: u8 = 0x99;

// ============================================================================
// Status register operations
// ============================================================================

/// Read Status Register 1
pub const RDSR: u8 = 0x05;
/// Read Status Register 2
pub const RDSR2: u8 = 0x35;
/// Read Status Register 3
pub const RDSR3: u8 = 0x15;
/// Write Status Register 1 (or 1 and 2 with a two byte payload)
pub const WRSR: u8 = 0x01;
/// Write Status Register 2
pub const WRSR2: u8 = 0x31;
/// Write Status Register 3
pub const WRSR3: u8 = 0x11;
/// Read Status Register 2 on parts with QE at SR2 bit 7
pub const RDSR2_S2B7: u8 = 0x3F;
/// Write Status Register 2 on parts with QE at SR2 bit 7
pub const WRSR2_S2B7: u8 = 0x3E;

// ============================================================================
// Read commands - 3-byte address
// ============================================================================

/// Read Data
pub const READ: u8 = 0x03;
/// Fast Read (with dummy byte)
pub const FAST_READ: u8 = 0x0B;
/// Dual Output Fast Read (1-1-2)
pub const DOR: u8 = 0x3B;
/// Dual I/O Fast Read (1-2-2)
pub const DIOR: u8 = 0xBB;
/// Quad Output Fast Read (1-1-4)
pub const QOR: u8 = 0x6B;
/// Quad I/O Fast Read (1-4-4)
pub const QIOR: u8 = 0xEB;

// ============================================================================
// Read commands - 4-byte address
// ============================================================================

/// Read Data with 4-byte address
pub const READ_4B: u8 = 0x13;
/// Fast Read with 4-byte address
pub const FAST_READ_4B: u8 = 0x0C;
/// Dual Output Fast Read with 4-byte address
pub const DOR_4B: u8 = 0x3C;
/// Dual I/O Fast Read with 4-byte address
pub const DIOR_4B: u8 = 0xBC;
/// Quad Output Fast Read with 4-byte address
pub const QOR_4B: u8 = 0x6C;
/// Quad I/O Fast Read with 4-byte address
pub const QIOR_4B: u8 = 0xEC;

// ============================================================================
// Program commands
// ============================================================================

/// Page Program
pub const PP: u8 = 0x02;
/// Page Program with 4-byte address
pub const PP_4B: u8 = 0x12;
/// Dual Input Page Program (1-1-2)
pub const PP_1_1_2: u8 = 0xA2;
/// Quad Input Page Program (1-1-4)
pub const PP_1_1_4: u8 = 0x32;
/// Quad Input Page Program with 4-byte address
pub const PP_1_1_4_4B: u8 = 0x34;
/// Quad I/O Page Program (1-4-4)
pub const PP_1_4_4: u8 = 0x38;
/// Quad I/O Page Program with 4-byte address
pub const PP_1_4_4_4B: u8 = 0x3E;

// ============================================================================
// Erase commands
// ============================================================================

/// Sector Erase 4 KiB
pub const SE_20: u8 = 0x20;
/// Sector Erase 4 KiB with 4-byte address
pub const SE_21: u8 = 0x21;
/// Block Erase 32 KiB
pub const BE_52: u8 = 0x52;
/// Block Erase 32 KiB with 4-byte address
pub const BE_5C: u8 = 0x5C;
/// Block Erase 64 KiB
pub const BE_D8: u8 = 0xD8;
/// Block Erase 64 KiB with 4-byte address
pub const BE_DC: u8 = 0xDC;
/// Chip Erase
pub const CE_C7: u8 = 0xC7;
/// Chip Erase (alternate opcode)
pub const CE_60: u8 = 0x60;

// ============================================================================
// Address mode
// ============================================================================

/// Enter 4-byte address mode
pub const EN4B: u8 = 0xB7;
/// Exit 4-byte address mode
pub const EX4B: u8 = 0xE9;

// ============================================================================
// SFDP
// ============================================================================

/// Read SFDP (3-byte address, 8 dummy cycles)
pub const RDSFDP: u8 = 0x5A;
/// Dummy cycles required by RDSFDP
pub const RDSFDP_DUMMY_CYCLES: u8 = 8;

// ============================================================================
// Status register bits
// ============================================================================

/// Status Register 1: Write In Progress
pub const SR1_WIP: u8 = 0x01;
/// Status Register 1: Write Enable Latch
pub const SR1_WEL: u8 = 0x02;
/// Status Register 1: Quad Enable (S1B6 parts)
pub const SR1_QE_B6: u8 = 0x40;
/// Status Register 2: Quad Enable (S2B1 parts)
pub const SR2_QE_B1: u8 = 0x02;
/// Status Register 2: Quad Enable (S2B7 parts)
pub const SR2_QE_B7: u8 = 0x80;

// ============================================================================
// 3-byte to 4-byte opcode conversion
// ============================================================================

/// Map a 3-byte read opcode to its dedicated 4-byte address form
pub const fn read_opcode_4b(opcode: u8) -> Option<u8> {
    match opcode {
        READ => Some(READ_4B),
        FAST_READ => Some(FAST_READ_4B),
        DOR => Some(DOR_4B),
        DIOR => Some(DIOR_4B),
        QOR => Some(QOR_4B),
        QIOR => Some(QIOR_4B),
        _ => None,
    }
}

/// Map a 3-byte page program opcode to its dedicated 4-byte address form
pub const fn program_opcode_4b(opcode: u8) -> Option<u8> {
    match opcode {
        PP => Some(PP_4B),
        PP_1_1_4 => Some(PP_1_1_4_4B),
        PP_1_4_4 => Some(PP_1_4_4_4B),
        _ => None,
    }
}

/// Map a 3-byte erase opcode to its dedicated 4-byte address form
pub const fn erase_opcode_4b(opcode: u8) -> Option<u8> {
    match opcode {
        SE_20 => Some(SE_21),
        BE_52 => Some(BE_5C),
        BE_D8 => Some(BE_DC),
        _ => None,
    }
}

/// I/O mode implied by a page program opcode
pub const fn program_io_mode(opcode: u8) -> crate::spi::IoMode {
    use crate::spi::IoMode;
    match opcode {
        PP_1_1_2 => IoMode::DualOut,
        PP_1_1_4 | PP_1_1_4_4B => IoMode::QuadOut,
        PP_1_4_4 | PP_1_4_4_4B => IoMode::QuadIo,
        _ => IoMode::Single,
    }
}
