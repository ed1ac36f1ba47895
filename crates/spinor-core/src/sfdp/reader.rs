//! SFDP reading
//!
//! Fetches the SFDP header, the parameter headers and the tables the core
//! understands over the transport, then hands the DWORDs to the decoder.

use crate::error::{DecodeError, Error, Result};
use crate::protocol;
use crate::transport::Transport;

use super::decoder::{decode_bfp, decode_four_byte_table};
use super::types::*;

/// Raw tables as read from the part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SfdpTables {
    /// SFDP header
    pub header: SfdpHeader,
    /// Parameter headers that were looked at
    pub param_headers: heapless::Vec<ParameterHeader, MAX_PARAMETER_HEADERS>,
    /// Basic Flash Parameter table header
    pub bfp_header: ParameterHeader,
    /// Basic Flash Parameter table, host order, at most 20 DWORDs
    pub bfp: heapless::Vec<u32, BFP_MAX_DWORDS>,
    /// 4-byte Address Instruction table, host order
    pub four_byte: Option<[u32; FOUR_BYTE_TABLE_DWORDS]>,
}

/// Decoded SFDP content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SfdpInfo {
    /// SFDP header
    pub header: SfdpHeader,
    /// Basic Flash Parameters
    pub basic_params: BasicFlashParams,
    /// 4-byte Address Instruction table, if present
    pub four_byte_table: Option<FourByteAddrTable>,
}

/// Read raw SFDP data
pub fn read_sfdp<T: Transport + ?Sized>(
    transport: &mut T,
    addr: u32,
    buf: &mut [u8],
) -> Result<(), T::Error> {
    protocol::read_sfdp(transport, addr, buf)
}

/// Read `words.len()` DWORDs at `addr` and convert them to host order
fn read_dwords<T: Transport + ?Sized>(
    transport: &mut T,
    addr: u32,
    words: &mut [u32],
) -> Result<(), T::Error> {
    let mut buf = [0u8; BFP_MAX_DWORDS * 4];
    let bytes = &mut buf[..words.len() * 4];
    read_sfdp(transport, addr, bytes)?;
    for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(4)) {
        *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    Ok(())
}

/// Read the SFDP header, up to `max_headers` parameter headers and the tables
///
/// `max_headers` is raised to at least 2 so that a leading vendor table
/// does not hide the Basic Flash Parameter table, and capped at
/// [`MAX_PARAMETER_HEADERS`]. The header block is fetched in a single read.
pub fn read_tables<T: Transport + ?Sized>(
    transport: &mut T,
    max_headers: usize,
) -> Result<SfdpTables, T::Error> {
    let wanted = max_headers.clamp(MIN_PARAMETER_HEADERS, MAX_PARAMETER_HEADERS);
    let mut buf = [0u8; HEADER_LEN * (MAX_PARAMETER_HEADERS + 1)];
    let block = &mut buf[..HEADER_LEN * (wanted + 1)];
    read_sfdp(transport, 0, block)?;

    let mut raw = [0u8; HEADER_LEN];
    raw.copy_from_slice(&block[..HEADER_LEN]);
    let header = SfdpHeader::parse(&raw);
    if !header.is_valid() {
        log::debug!("SFDP signature 0x{:08X} invalid", header.signature);
        return Err(Error::InvalidMagic(header.signature));
    }
    if header.revision.major != 1 {
        return Err(DecodeError::UnsupportedRevision {
            major: header.revision.major,
            minor: header.revision.minor,
        }
        .into());
    }

    let count = wanted.min(header.num_param_headers());
    log::debug!(
        "SFDP v{} AP {:x} with {} PH",
        header.revision,
        header.access_protocol,
        header.num_param_headers()
    );

    let mut param_headers = heapless::Vec::new();
    for chunk in block[HEADER_LEN..].chunks_exact(HEADER_LEN).take(count) {
        raw.copy_from_slice(chunk);
        let php = ParameterHeader::parse(&raw);
        log::debug!(
            "PH{}: {:04x} rev {} {} DW @ {:x}",
            param_headers.len(),
            php.id,
            php.revision,
            php.length_dwords,
            php.table_pointer
        );
        let _ = param_headers.push(php);
    }

    let bfp_header = param_headers
        .iter()
        .find(|php| php.is_basic())
        .copied()
        .ok_or(DecodeError::MissingBasicTable)?;

    let len = (bfp_header.length_dwords as usize).min(BFP_MAX_DWORDS);
    let mut bfp = heapless::Vec::new();
    let _ = bfp.resize(len, 0);
    read_dwords(transport, bfp_header.table_pointer, &mut bfp)?;

    let mut four_byte = None;
    if let Some(php) = param_headers.iter().find(|php| php.is_four_byte_table()) {
        if php.length_dwords as usize >= FOUR_BYTE_TABLE_DWORDS {
            let mut words = [0u32; FOUR_BYTE_TABLE_DWORDS];
            read_dwords(transport, php.table_pointer, &mut words)?;
            four_byte = Some(words);
        } else {
            log::warn!("4-byte address table too short ({} DW)", php.length_dwords);
        }
    }

    Ok(SfdpTables {
        header,
        param_headers,
        bfp_header,
        bfp,
        four_byte,
    })
}

/// Read and decode SFDP from the part
///
/// # Example
///
/// ```ignore
/// use spinor_core::sfdp;
///
/// let info = sfdp::probe(&mut bus, 2)?;
/// println!("Flash size: {} bytes", info.basic_params.density_bytes);
/// ```
pub fn probe<T: Transport + ?Sized>(transport: &mut T, max_headers: usize) -> Result<SfdpInfo, T::Error> {
    let tables = read_tables(transport, max_headers)?;
    let basic_params = decode_bfp(&tables.bfp_header, &tables.bfp)?;
    let four_byte_table = match tables.four_byte {
        Some(words) => Some(decode_four_byte_table(&words)?),
        None => None,
    };
    Ok(SfdpInfo {
        header: tables.header,
        basic_params,
        four_byte_table,
    })
}

/// Check for the SFDP signature without parsing anything else
pub fn is_supported<T: Transport + ?Sized>(transport: &mut T) -> bool {
    let mut buf = [0u8; 4];
    if read_sfdp(transport, 0, &mut buf).is_err() {
        return false;
    }
    u32::from_le_bytes(buf) == SFDP_SIGNATURE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spi::{opcodes, AddressWidth, IoMode, SpiCommand};
    use std::vec::Vec;

    /// Complete SFDP table of an 8 MiB part with a leading BFP of 9 DWORDs
    /// and a vendor table behind it.
    #[rustfmt::skip]
    const MX25L6436E_SFDP: [u8; 88] = [
        0x53, 0x46, 0x44, 0x50, // @0x00: SFDP signature "SFDP"
        0x00, 0x01, 0x01, 0xFF, // @0x04: revision 1.0, 2 headers (NPH=1)
        0x00, 0x00, 0x01, 0x09, // @0x08: JEDEC SFDP header rev. 1.0, 9 DW long
        0x1C, 0x00, 0x00, 0xFF, // @0x0C: PTP0 = 0x1C
        0xC2, 0x00, 0x01, 0x04, // @0x10: vendor header rev. 1.0, 4 DW long
        0x48, 0x00, 0x00, 0xFF, // @0x14: PTP1 = 0x48
        0xFF, 0xFF, 0xFF, 0xFF, // @0x18: hole
        0xE5, 0x20, 0xC9, 0xFF, // @0x1C: DWORD 1
        0xFF, 0xFF, 0xFF, 0x03, // @0x20: DWORD 2 - density
        0x00, 0xFF, 0x08, 0x6B, // @0x24: DWORD 3
        0x08, 0x3B, 0x00, 0xFF, // @0x28: DWORD 4
        0xEE, 0xFF, 0xFF, 0xFF, // @0x2C: DWORD 5
        0xFF, 0xFF, 0x00, 0x00, // @0x30: DWORD 6
        0xFF, 0xFF, 0x00, 0xFF, // @0x34: DWORD 7
        0x0C, 0x20, 0x0F, 0x52, // @0x38: DWORD 8 - erase types
        0x10, 0xD8, 0x00, 0xFF, // @0x3C: DWORD 9 - erase types
        0xFF, 0xFF, 0xFF, 0xFF, // @0x40: hole
        0xFF, 0xFF, 0xFF, 0xFF, // @0x44: hole
        0x00, 0x36, 0x00, 0x27, // @0x48: vendor table start
        0xF4, 0x4F, 0xFF, 0xFF, // @0x4C
        0xD9, 0xC8, 0xFF, 0xFF, // @0x50
        0xFF, 0xFF, 0xFF, 0xFF, // @0x54: vendor table end
    ];

    /// Serves an SFDP image and records the reads it saw
    struct MockSfdpFlash<'a> {
        sfdp_data: &'a [u8],
        max_read: usize,
        reads: Vec<(u32, usize)>,
    }

    impl<'a> MockSfdpFlash<'a> {
        fn new(sfdp_data: &'a [u8]) -> Self {
            Self {
                sfdp_data,
                max_read: usize::MAX,
                reads: Vec::new(),
            }
        }
    }

    impl Transport for MockSfdpFlash<'_> {
        type Error = &'static str;

        fn transact(&mut self, cmd: &mut SpiCommand<'_>) -> core::result::Result<(), Self::Error> {
            if cmd.opcode != opcodes::RDSFDP {
                return Err("unexpected opcode");
            }
            assert_eq!(cmd.address_width, AddressWidth::ThreeByte);
            assert_eq!(cmd.dummy_cycles, 8);
            assert_eq!(cmd.io_mode, IoMode::Single);
            let addr = cmd.address.ok_or("no address")? as usize;
            self.reads.push((addr as u32, cmd.read_buf.len()));
            for (i, byte) in cmd.read_buf.iter_mut().enumerate() {
                *byte = self.sfdp_data.get(addr + i).copied().unwrap_or(0xFF);
            }
            Ok(())
        }

        fn max_read_len(&self) -> usize {
            self.max_read
        }
    }

    #[test]
    fn parse_mx25l6436e_sfdp() {
        let mut mock = MockSfdpFlash::new(&MX25L6436E_SFDP);
        let info = probe(&mut mock, 2).unwrap();

        assert!(info.header.is_valid());
        assert_eq!(info.header.revision, SfdpRevision::new(1, 0));
        assert_eq!(info.header.num_param_headers(), 2);

        let params = &info.basic_params;
        // (0x03FFFFFF + 1) / 8 = 8 MiB
        assert_eq!(params.density_bytes, 8 * 1024 * 1024);
        assert_eq!(params.length_dwords, 9);
        assert_eq!(params.address_mode, AddressMode::ThreeByteOnly);
        assert_eq!(params.page_size, 256);
        assert_eq!(params.quad_enable, None);
        assert_eq!(
            params.erase_types,
            [
                EraseType::new(12, 0x20),
                EraseType::new(15, 0x52),
                EraseType::new(16, 0xD8),
                EraseType::ABSENT,
            ]
        );

        // DWORD 1 = 0xFFC920E5: 1-1-2 and 1-1-4 enabled
        let modes: Vec<IoMode> = params.read_modes.iter().map(|m| m.io_mode).collect();
        assert_eq!(modes, [IoMode::Single, IoMode::DualOut, IoMode::QuadOut]);
        assert_eq!(
            params.read_mode(IoMode::QuadOut),
            Some(&ReadMode::new(IoMode::QuadOut, 0x6B, 0, 8))
        );
        assert_eq!(
            params.read_mode(IoMode::DualOut),
            Some(&ReadMode::new(IoMode::DualOut, 0x3B, 0, 8))
        );
        assert!(info.four_byte_table.is_none());
    }

    #[test]
    fn header_block_is_one_read() {
        let mut mock = MockSfdpFlash::new(&MX25L6436E_SFDP);
        read_tables(&mut mock, 2).unwrap();
        assert_eq!(mock.reads, [(0x00, 24), (0x1C, 36)]);
    }

    #[test]
    fn header_count_is_raised_to_two() {
        let mut mock = MockSfdpFlash::new(&MX25L6436E_SFDP);
        let tables = read_tables(&mut mock, 0).unwrap();
        assert_eq!(tables.param_headers.len(), 2);
        assert_eq!(tables.param_headers[1].id, 0xFFC2);
    }

    #[test]
    fn reads_are_split_at_transport_limit() {
        let mut mock = MockSfdpFlash::new(&MX25L6436E_SFDP);
        mock.max_read = 16;
        let tables = read_tables(&mut mock, 2).unwrap();
        assert_eq!(tables.bfp.len(), 9);
        assert!(mock.reads.iter().all(|&(_, len)| len <= 16));
        assert_eq!(tables.bfp[1], 0x03FF_FFFF);
    }

    #[test]
    fn bad_signature() {
        let mut image = MX25L6436E_SFDP;
        image[0] = 0x00;
        let mut mock = MockSfdpFlash::new(&image);
        assert_eq!(
            probe(&mut mock, 2),
            Err(Error::InvalidMagic(0x5044_4600))
        );
        assert!(!is_supported(&mut mock));
    }

    #[test]
    fn bfp_not_among_headers() {
        let mut image = MX25L6436E_SFDP;
        // turn the BFP header into a vendor header
        image[8] = 0x01;
        let mut mock = MockSfdpFlash::new(&image);
        assert_eq!(
            probe(&mut mock, 2),
            Err(Error::Decode(DecodeError::MissingBasicTable))
        );
    }

    #[test]
    fn bfp_after_vendor_table() {
        let mut image = MX25L6436E_SFDP;
        // swap the two parameter headers
        let (first, second) = image[8..24].split_at_mut(8);
        first.swap_with_slice(second);
        let mut mock = MockSfdpFlash::new(&image);
        let info = probe(&mut mock, 2).unwrap();
        assert_eq!(info.basic_params.density_bytes, 8 * 1024 * 1024);
    }

    #[test]
    fn transport_error_is_propagated() {
        struct Broken;
        impl Transport for Broken {
            type Error = u8;
            fn transact(&mut self, _cmd: &mut SpiCommand<'_>) -> core::result::Result<(), u8> {
                Err(42)
            }
        }
        assert_eq!(probe(&mut Broken, 2), Err(Error::Transport(42)));
    }

    #[cfg(feature = "alloc")]
    #[test]
    fn encoded_image_reads_back() {
        use crate::sfdp::encoder::encode_sfdp;

        let params = BasicFlashParams {
            length_dwords: 16,
            density_bytes: 64 * 1024 * 1024,
            address_mode: AddressMode::ThreeOrFourByte,
            erase_types: [
                EraseType::new(12, 0x20),
                EraseType::ABSENT,
                EraseType::new(16, 0xD8),
                EraseType::ABSENT,
            ],
            quad_enable: Some(QerType::S1B6),
            four_byte_entry: Some(FourByteEntry::B7),
            ..Default::default()
        };
        let table = FourByteAddrTable {
            instructions: FourByteInstructions::READ,
            erase_opcodes: [Some(0x21), None, Some(0xDC), None],
        };
        let image = encode_sfdp(&params, Some(&table));
        let mut mock = MockSfdpFlash::new(&image);
        let info = probe(&mut mock, 2).unwrap();
        assert_eq!(info.basic_params, params);
        assert_eq!(info.four_byte_table, Some(table));
    }
}
