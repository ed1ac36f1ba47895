//! SFDP encoding
//!
//! The inverse of the decoder for every field it extracts. Used to
//! synthesize SFDP images for emulated parts and for round-trip testing.

use super::types::*;

/// Encoded Basic Flash Parameter table
pub type BfpWords = heapless::Vec<u32, BFP_MAX_DWORDS>;

fn encode_density(bytes: u32) -> u32 {
    let bits = bytes as u64 * 8;
    match bits.checked_sub(1) {
        Some(direct) if direct <= 0x7FFF_FFFF => direct as u32,
        _ => (1 << 31) | bits.trailing_zeros(),
    }
}

fn encode_read_half(params: &BasicFlashParams, io_mode: crate::spi::IoMode) -> (bool, u16) {
    match params.read_mode(io_mode) {
        Some(mode) => (true, mode.to_half()),
        None => (false, 0),
    }
}

/// Number of DWORDs needed to carry every field of `params`
pub fn required_dwords(params: &BasicFlashParams) -> usize {
    let needed = if params.four_byte_entry.is_some() {
        16
    } else if params.quad_enable.is_some() {
        15
    } else {
        BFP_MIN_DWORDS
    };
    needed
        .max(params.length_dwords as usize)
        .min(BFP_MAX_DWORDS)
}

/// Encode a Basic Flash Parameter table in host order DWORDs
pub fn encode_bfp(params: &BasicFlashParams) -> BfpWords {
    use crate::spi::IoMode;

    let len = required_dwords(params);
    let mut dw = [0u32; BFP_MAX_DWORDS];

    let (dual_out, h112) = encode_read_half(params, IoMode::DualOut);
    let (dual_io, h122) = encode_read_half(params, IoMode::DualIo);
    let (quad_out, h114) = encode_read_half(params, IoMode::QuadOut);
    let (quad_io, h144) = encode_read_half(params, IoMode::QuadIo);

    // DWORD 1: 4 KiB erase, address bytes, fast read support
    let erase_4k = params.erase_types.iter().find(|e| e.exponent == 12);
    dw[0] = match erase_4k {
        Some(e) => 0x01 | ((e.opcode as u32) << 8),
        None => 0x03 | (0xFF << 8),
    };
    dw[0] |= (params.address_mode.to_bfpt() as u32) << 17;
    dw[0] |= (dual_out as u32) << 16;
    dw[0] |= (dual_io as u32) << 20;
    dw[0] |= (quad_io as u32) << 21;
    dw[0] |= (quad_out as u32) << 22;
    dw[0] |= 0xFF80_0000;

    dw[1] = encode_density(params.density_bytes);
    dw[2] = ((h114 as u32) << 16) | h144 as u32;
    dw[3] = ((h122 as u32) << 16) | h112 as u32;
    // No 2-2-2 or 4-4-4 support
    dw[4] = 0xFFFF_FFEE;
    dw[5] = 0x0000_FFFF;
    dw[6] = 0x0000_FFFF;

    let e = &params.erase_types;
    dw[7] = u32::from_le_bytes([e[0].exponent, e[0].opcode, e[1].exponent, e[1].opcode]);
    dw[8] = u32::from_le_bytes([e[2].exponent, e[2].opcode, e[3].exponent, e[3].opcode]);

    dw[10] = (params.page_size.trailing_zeros() & 0x0F) << 4;
    dw[14] = (params.quad_enable.map_or(0, QerType::to_bfpt) as u32) << 20;
    dw[15] = (params.four_byte_entry.map_or(0, |f| f.bits()) as u32) << 24;

    let mut words = BfpWords::new();
    let _ = words.extend_from_slice(&dw[..len]);
    words
}

/// Build a complete SFDP image: header, parameter headers and tables
///
/// Tables are placed from offset 0x30. The 4-byte Address Instruction
/// table, when given, follows the Basic Flash Parameter table.
#[cfg(feature = "alloc")]
pub fn encode_sfdp(
    params: &BasicFlashParams,
    four_byte: Option<&FourByteAddrTable>,
) -> alloc::vec::Vec<u8> {
    use alloc::vec::Vec;

    const TABLE_BASE: usize = 0x30;

    let bfp = encode_bfp(params);
    let nph = if four_byte.is_some() { 1 } else { 0 };
    let header = SfdpHeader {
        signature: SFDP_SIGNATURE,
        revision: params.revision,
        nph,
        access_protocol: 0xFF,
    };
    let bfp_header = ParameterHeader::basic(params.revision, bfp.len() as u8, TABLE_BASE as u32);
    let four_byte_ptr = TABLE_BASE + bfp.len() * 4;

    let mut image: Vec<u8> = Vec::with_capacity(four_byte_ptr + FOUR_BYTE_TABLE_DWORDS * 4);
    image.extend_from_slice(&header.to_bytes());
    image.extend_from_slice(&bfp_header.to_bytes());
    if four_byte.is_some() {
        let hdr = ParameterHeader {
            id: PARAM_ID_4BYTE_ADDR,
            revision: SfdpRevision::new(1, 0),
            length_dwords: FOUR_BYTE_TABLE_DWORDS as u8,
            table_pointer: four_byte_ptr as u32,
        };
        image.extend_from_slice(&hdr.to_bytes());
    }
    image.resize(TABLE_BASE, 0xFF);
    for word in &bfp {
        image.extend_from_slice(&word.to_le_bytes());
    }
    if let Some(table) = four_byte {
        for word in table.to_dwords() {
            image.extend_from_slice(&word.to_le_bytes());
        }
    }
    image
}
