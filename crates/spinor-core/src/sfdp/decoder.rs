//! Basic Flash Parameter table decoding
//!
//! Every function here works on DWORDs already converted to host order.
//! The reader and the configuration-supplied table source both convert the
//! little-endian wire bytes before calling in.

use crate::error::DecodeError;
use crate::spi::IoMode;

use super::types::*;

/// Decode the density DWORD to a size in bits
///
/// Bit 31 set: the low 31 bits hold N and the density is 2^N bits.
/// Bit 31 clear: the DWORD holds the density in bits minus one.
pub fn density_bits(dword: u32) -> Result<u64, DecodeError> {
    if dword & (1 << 31) == 0 {
        return Ok(dword as u64 + 1);
    }
    let n = dword & 0x7FFF_FFFF;
    if n >= 64 {
        return Err(DecodeError::InvalidDensity(dword));
    }
    Ok(1u64 << n)
}

/// Decode the density DWORD to a size in bytes that fits a 32-bit address space
pub fn density_bytes(dword: u32) -> Result<u32, DecodeError> {
    let bytes = density_bits(dword)? / 8;
    if bytes == 0 || bytes > u32::MAX as u64 {
        return Err(DecodeError::InvalidDensity(dword));
    }
    Ok(bytes as u32)
}

/// Parse Basic Flash Parameter Table DWORD 1
///
/// Address bytes and fast read support bits.
fn parse_dword1(dword: u32, params: &mut BasicFlashParams) -> ReadSupport {
    // Bits [18:17] - Address bytes
    params.address_mode = AddressMode::from_bfpt(((dword >> 17) & 0x03) as u8);

    ReadSupport {
        // Bit 16 - 1-1-2, bit 20 - 1-2-2, bit 21 - 1-4-4, bit 22 - 1-1-4
        dual_out: dword & (1 << 16) != 0,
        dual_io: dword & (1 << 20) != 0,
        quad_io: dword & (1 << 21) != 0,
        quad_out: dword & (1 << 22) != 0,
    }
}

/// Read modes enabled in DWORD 1
#[derive(Debug, Clone, Copy, Default)]
struct ReadSupport {
    dual_out: bool,
    dual_io: bool,
    quad_out: bool,
    quad_io: bool,
}

/// Parse DWORDs 3 and 4 into read modes for the enabled variants
///
/// DWORD 3 carries 1-1-4 in its high half and 1-4-4 in its low half,
/// DWORD 4 carries 1-2-2 high and 1-1-2 low.
fn parse_read_modes(support: ReadSupport, dword3: u32, dword4: u32, params: &mut BasicFlashParams) {
    let hi = |dw: u32| (dw >> 16) as u16;
    let lo = |dw: u32| dw as u16;

    let candidates = [
        (support.dual_out, IoMode::DualOut, lo(dword4)),
        (support.dual_io, IoMode::DualIo, hi(dword4)),
        (support.quad_out, IoMode::QuadOut, hi(dword3)),
        (support.quad_io, IoMode::QuadIo, lo(dword3)),
    ];

    params.read_modes.clear();
    let _ = params.read_modes.push(ReadMode::SINGLE);
    for (enabled, io_mode, half) in candidates {
        if !enabled {
            continue;
        }
        let mode = ReadMode::from_half(io_mode, half);
        log::trace!(
            "Read {}: opcode 0x{:02X} mode {} wait {}",
            io_mode,
            mode.opcode,
            mode.mode_clocks,
            mode.wait_states
        );
        let _ = params.read_modes.push(mode);
    }
}

/// Parse Basic Flash Parameter Table DWORDs 8-9
///
/// Four (exponent, opcode) pairs, kept in slot order.
fn parse_erase_types(dword8: u32, dword9: u32, params: &mut BasicFlashParams) {
    let [e1, o1, e2, o2] = dword8.to_le_bytes();
    let [e3, o3, e4, o4] = dword9.to_le_bytes();

    for (slot, (exponent, opcode)) in params
        .erase_types
        .iter_mut()
        .zip([(e1, o1), (e2, o2), (e3, o3), (e4, o4)])
    {
        *slot = match exponent {
            0 => EraseType::ABSENT,
            1..=31 => EraseType::new(exponent, opcode),
            _ => {
                log::warn!("Ignoring erase type with exponent {}", exponent);
                EraseType::ABSENT
            }
        };
    }
}

/// Parse Basic Flash Parameter Table DWORD 11
///
/// Bits [7:4] - page size exponent.
fn parse_dword11(dword: u32, params: &mut BasicFlashParams) {
    let exp = (dword >> 4) & 0x0F;
    params.page_size = if exp > 0 { 1u32 << exp } else { 256 };
}

/// Parse Basic Flash Parameter Table DWORD 15
///
/// Bits [22:20] - Quad Enable Requirements.
fn parse_dword15(dword: u32, params: &mut BasicFlashParams) {
    params.quad_enable = Some(QerType::from_bfpt(((dword >> 20) & 0x07) as u8));
}

/// Parse Basic Flash Parameter Table DWORD 16
///
/// Bits [31:24] - 4-byte address entry methods.
fn parse_dword16(dword: u32, params: &mut BasicFlashParams) {
    params.four_byte_entry = Some(FourByteEntry::from_bits_truncate((dword >> 24) as u8));
}

/// Decode a Basic Flash Parameter table
///
/// `words` may be longer than the header claims; only
/// `min(header.length_dwords, words.len(), 20)` DWORDs are looked at.
/// Fields of DWORDs beyond that length keep their defaults: 256 byte pages
/// below 11 DWORDs, no QER below 15, no 4-byte entry methods below 16.
pub fn decode_bfp(header: &ParameterHeader, words: &[u32]) -> Result<BasicFlashParams, DecodeError> {
    let len = words
        .len()
        .min(header.length_dwords as usize)
        .min(BFP_MAX_DWORDS);
    if len < BFP_MIN_DWORDS {
        return Err(DecodeError::TableTooShort { dwords: len });
    }

    let dw = |n: usize| words[n - 1];

    let mut params = BasicFlashParams {
        revision: header.revision,
        length_dwords: len as u8,
        ..Default::default()
    };

    let support = parse_dword1(dw(1), &mut params);
    params.density_bytes = density_bytes(dw(2))?;
    parse_read_modes(support, dw(3), dw(4), &mut params);
    parse_erase_types(dw(8), dw(9), &mut params);

    if len >= 11 {
        parse_dword11(dw(11), &mut params);
    }
    if len >= 15 {
        parse_dword15(dw(15), &mut params);
    }
    if len >= 16 {
        parse_dword16(dw(16), &mut params);
    }

    log::debug!(
        "BFP v{} {} DW: {} bytes, page {}, {:?}, QER {:?}",
        params.revision,
        len,
        params.density_bytes,
        params.page_size,
        params.address_mode,
        params.quad_enable
    );
    for (idx, etp) in params.erase_types.iter().enumerate() {
        if etp.is_present() {
            log::debug!("Erase {}: {} with 0x{:02X}", idx + 1, etp.size(), etp.opcode);
        }
    }

    Ok(params)
}

/// Decode a 4-byte Address Instruction table
pub fn decode_four_byte_table(words: &[u32]) -> Result<FourByteAddrTable, DecodeError> {
    match words {
        [dword1, dword2, ..] => Ok(FourByteAddrTable::from_dwords(*dword1, *dword2)),
        _ => Err(DecodeError::TableTooShort { dwords: words.len() }),
    }
}

/// Convert little-endian table bytes to host order DWORDs
pub fn words_from_le_bytes(bytes: &[u8], out: &mut [u32]) -> Result<usize, DecodeError> {
    if bytes.len() % 4 != 0 {
        return Err(DecodeError::MisalignedTable { len: bytes.len() });
    }
    let mut count = 0;
    for (word, chunk) in out.iter_mut().zip(bytes.chunks_exact(4)) {
        *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        count += 1;
    }
    Ok(count)
}
