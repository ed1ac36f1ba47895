//! Capability sources and negotiation
//!
//! A part's parameters can be compiled in, supplied as raw Basic Flash
//! Parameter bytes by board configuration, or read from the part at run
//! time. All three go through the same negotiation against the
//! [`FlashConfig`] and yield the same [`CapabilityModel`].

use crate::error::{DecodeError, Error, Result};
use crate::protocol;
use crate::sfdp::{
    self, decode_bfp, decode_four_byte_table, AddressMode, BasicFlashParams, EraseType,
    FourByteAddrTable, FourByteEntry, ParameterHeader, QerType, ReadMode, SfdpRevision,
    BFP_MAX_DWORDS, FOUR_BYTE_TABLE_DWORDS,
};
use crate::spi::{opcodes, AddressWidth};
use crate::transport::Transport;

use super::{AddressEntry, CapabilityModel, FlashConfig};

/// Decoded parameter tables of a part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashParameters {
    /// Basic Flash Parameters
    pub basic: BasicFlashParams,
    /// 4-byte Address Instruction table, if known
    pub four_byte: Option<FourByteAddrTable>,
}

/// Where a part's parameters come from
pub trait CapabilitySource {
    /// Produce the decoded parameter tables
    fn parameters<T: Transport + ?Sized>(
        &self,
        transport: &mut T,
        config: &FlashConfig,
    ) -> Result<FlashParameters, T::Error>;

    /// Produce the parameters and negotiate them into a capability model
    ///
    /// This may put the part into 4-byte address mode.
    fn discover<T: Transport + ?Sized>(
        &self,
        transport: &mut T,
        config: &FlashConfig,
    ) -> Result<CapabilityModel, T::Error> {
        let params = self.parameters(transport, config)?;
        negotiate(transport, &params, config)
    }
}

/// Parameters known at build time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticTable {
    /// Basic Flash Parameters
    pub basic: BasicFlashParams,
    /// 4-byte Address Instruction table
    pub four_byte: Option<FourByteAddrTable>,
}

impl StaticTable {
    /// Create a source from decoded parameters
    pub const fn new(basic: BasicFlashParams) -> Self {
        Self {
            basic,
            four_byte: None,
        }
    }

    /// Attach a 4-byte Address Instruction table
    pub fn with_four_byte(mut self, table: FourByteAddrTable) -> Self {
        self.four_byte = Some(table);
        self
    }
}

impl CapabilitySource for StaticTable {
    fn parameters<T: Transport + ?Sized>(
        &self,
        _transport: &mut T,
        _config: &FlashConfig,
    ) -> Result<FlashParameters, T::Error> {
        Ok(FlashParameters {
            basic: self.basic.clone(),
            four_byte: self.four_byte,
        })
    }
}

/// Raw table bytes supplied by board configuration
///
/// The bytes are the tables as stored in the part, little-endian DWORDs,
/// the way a `sfdp-bfp` devicetree property carries them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceTreeConstant<'a> {
    /// Basic Flash Parameter table bytes
    pub bfp: &'a [u8],
    /// 4-byte Address Instruction table bytes
    pub four_byte: Option<&'a [u8]>,
}

impl<'a> DeviceTreeConstant<'a> {
    /// Create a source from Basic Flash Parameter table bytes
    pub const fn new(bfp: &'a [u8]) -> Self {
        Self {
            bfp,
            four_byte: None,
        }
    }
}

impl CapabilitySource for DeviceTreeConstant<'_> {
    fn parameters<T: Transport + ?Sized>(
        &self,
        _transport: &mut T,
        _config: &FlashConfig,
    ) -> Result<FlashParameters, T::Error> {
        let mut words = [0u32; BFP_MAX_DWORDS];
        let count = sfdp::decoder::words_from_le_bytes(self.bfp, &mut words)?;
        let header = ParameterHeader::basic(SfdpRevision::JESD216, count as u8, 0);
        let basic = decode_bfp(&header, &words[..count])?;

        let four_byte = match self.four_byte {
            Some(bytes) => {
                let mut words = [0u32; FOUR_BYTE_TABLE_DWORDS];
                let count = sfdp::decoder::words_from_le_bytes(bytes, &mut words)?;
                Some(decode_four_byte_table(&words[..count])?)
            }
            None => None,
        };

        Ok(FlashParameters { basic, four_byte })
    }
}

/// Parameters read from the part over RDSFDP
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RuntimeDiscovered;

impl CapabilitySource for RuntimeDiscovered {
    fn parameters<T: Transport + ?Sized>(
        &self,
        transport: &mut T,
        config: &FlashConfig,
    ) -> Result<FlashParameters, T::Error> {
        let info = sfdp::probe(transport, config.sfdp_headers as usize)?;
        Ok(FlashParameters {
            basic: info.basic_params,
            four_byte: info.four_byte_table,
        })
    }
}

/// Fastest discovered read mode the bus can drive
///
/// With native 4-byte opcodes only modes that have a 4-byte form are
/// candidates.
fn select_read_mode(
    params: &FlashParameters,
    config: &FlashConfig,
    native: bool,
) -> Option<ReadMode> {
    params
        .basic
        .read_modes
        .iter()
        .filter(|mode| config.bus_width.allows(mode.io_mode))
        .filter_map(|mode| {
            if !native {
                return Some(*mode);
            }
            opcodes::read_opcode_4b(mode.opcode).map(|opcode| ReadMode { opcode, ..*mode })
        })
        .max_by_key(|mode| mode.io_mode)
}

/// Erase types with their dedicated 4-byte opcodes
///
/// The 4-byte Address Instruction table wins over the fixed mapping. A
/// slot without any 4-byte form is dropped.
fn four_byte_erase_types(
    erase_types: &[EraseType; 4],
    table: Option<&FourByteAddrTable>,
) -> [EraseType; 4] {
    let mut out = [EraseType::ABSENT; 4];
    for (i, (slot, et)) in out.iter_mut().zip(erase_types).enumerate() {
        if !et.is_present() {
            continue;
        }
        let opcode = table
            .and_then(|t| t.erase_opcodes[i])
            .or_else(|| opcodes::erase_opcode_4b(et.opcode));
        match opcode {
            Some(opcode) => *slot = EraseType::new(et.exponent, opcode),
            None => log::warn!(
                "Erase {}: no 4-byte form of 0x{:02X}, dropped",
                i + 1,
                et.opcode
            ),
        }
    }
    out
}

/// Decide how addresses are sent, switching the part if needed
fn select_address<T: Transport + ?Sized>(
    transport: &mut T,
    params: &FlashParameters,
    config: &FlashConfig,
    size: u32,
) -> Result<(AddressWidth, AddressEntry), T::Error> {
    let needs_4byte = !AddressWidth::ThreeByte.covers(size);

    match params.basic.address_mode {
        AddressMode::ThreeByteOnly => {
            if config.four_byte_opcodes || needs_4byte {
                return Err(Error::AddressModeUnavailable);
            }
            Ok((AddressWidth::ThreeByte, AddressEntry::None))
        }
        AddressMode::FourByteOnly => Ok((AddressWidth::FourByte, AddressEntry::Always)),
        AddressMode::ThreeOrFourByte => {
            let entry = params.basic.four_byte_entry.unwrap_or_default();
            if config.four_byte_opcodes {
                return Ok((AddressWidth::FourByte, AddressEntry::Native4Byte));
            }
            if !needs_4byte {
                return Ok((AddressWidth::ThreeByte, AddressEntry::None));
            }
            if entry.contains(FourByteEntry::B7) {
                protocol::enter_4byte_mode(transport)?;
                Ok((AddressWidth::FourByte, AddressEntry::EnterB7))
            } else if entry.contains(FourByteEntry::WREN_B7) {
                protocol::write_enable(transport)?;
                protocol::enter_4byte_mode(transport)?;
                Ok((AddressWidth::FourByte, AddressEntry::WrenEnterB7))
            } else if entry.contains(FourByteEntry::DEDICATED_4B) || params.four_byte.is_some() {
                Ok((AddressWidth::FourByte, AddressEntry::Native4Byte))
            } else {
                log::warn!("{} bytes need 4-byte addressing, entry methods {:?}", size, entry);
                Err(Error::AddressModeUnavailable)
            }
        }
    }
}

/// Turn decoded parameters into a capability model
pub fn negotiate<T: Transport + ?Sized>(
    transport: &mut T,
    params: &FlashParameters,
    config: &FlashConfig,
) -> Result<CapabilityModel, T::Error> {
    let basic = &params.basic;

    let size = match config.expected_size {
        Some(expected) => {
            if basic.density_bytes != expected {
                log::warn!(
                    "SFDP density {} bytes differs from configured {} bytes, using configured",
                    basic.density_bytes,
                    expected
                );
            }
            expected
        }
        None => basic.density_bytes,
    };
    if size == 0 {
        return Err(DecodeError::InvalidDensity(0).into());
    }
    if !basic.page_size.is_power_of_two() {
        return Err(Error::UnsupportedConfig("page size must be a non-zero power of two"));
    }

    let (address_width, address_entry) = select_address(transport, params, config, size)?;
    let native = address_entry == AddressEntry::Native4Byte;

    let read_mode = select_read_mode(params, config, native)
        .ok_or(Error::UnsupportedConfig("no read mode usable on this bus"))?;

    let mut write_opcode = config.write_opcode.unwrap_or(opcodes::PP);
    let write_io_mode = opcodes::program_io_mode(write_opcode);
    if !config.bus_width.allows(write_io_mode) {
        return Err(Error::UnsupportedConfig(
            "write opcode needs more data lines than the bus has",
        ));
    }
    let mut erase_types = basic.erase_types;
    if native {
        write_opcode = opcodes::program_opcode_4b(write_opcode)
            .ok_or(Error::UnsupportedConfig("write opcode has no 4-byte form"))?;
        erase_types = four_byte_erase_types(&erase_types, params.four_byte.as_ref());
    }

    let qer = basic
        .quad_enable
        .or(config.quad_enable)
        .unwrap_or(QerType::None);

    let model = CapabilityModel {
        size,
        page_size: basic.page_size,
        address_width,
        address_entry,
        read_mode,
        read_modes: basic.read_modes.clone(),
        write_opcode,
        write_io_mode,
        erase_types,
        chip_erase_opcode: opcodes::CE_C7,
        qer,
        bus_width: config.bus_width,
    };

    log::debug!(
        "{} bytes, {} addressing ({:?}), read {} 0x{:02X}, program 0x{:02X}, QER {:?}",
        model.size,
        model.address_width,
        model.address_entry,
        model.read_mode.io_mode,
        model.read_mode.opcode,
        model.write_opcode,
        model.qer
    );
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::BusWidth;
    use crate::sfdp::{encode_bfp, ReadModes};
    use crate::spi::{IoMode, SpiCommand};
    use std::vec::Vec;

    /// Records opcodes; never expected to serve data
    #[derive(Default)]
    struct Opcodes(Vec<u8>);

    impl Transport for Opcodes {
        type Error = ();

        fn transact(&mut self, cmd: &mut SpiCommand<'_>) -> core::result::Result<(), ()> {
            self.0.push(cmd.opcode);
            Ok(())
        }
    }

    fn params(size: u32, mode: AddressMode, entry: Option<FourByteEntry>) -> BasicFlashParams {
        let mut read_modes = ReadModes::new();
        read_modes.push(ReadMode::SINGLE).unwrap();
        read_modes.push(ReadMode::new(IoMode::DualOut, 0x3B, 0, 8)).unwrap();
        read_modes.push(ReadMode::new(IoMode::QuadOut, 0x6B, 0, 8)).unwrap();
        read_modes.push(ReadMode::new(IoMode::QuadIo, 0xEB, 2, 4)).unwrap();
        BasicFlashParams {
            length_dwords: 16,
            density_bytes: size,
            address_mode: mode,
            erase_types: [
                EraseType::new(12, 0x20),
                EraseType::new(15, 0x52),
                EraseType::new(16, 0xD8),
                EraseType::ABSENT,
            ],
            read_modes,
            quad_enable: Some(QerType::S2B1v6),
            four_byte_entry: entry,
            ..Default::default()
        }
    }

    const MIB: u32 = 1024 * 1024;

    fn discover(source: &impl CapabilitySource, config: &FlashConfig) -> (Result<CapabilityModel, ()>, Vec<u8>) {
        let mut bus = Opcodes::default();
        let result = source.discover(&mut bus, config);
        (result, bus.0)
    }

    #[test]
    fn read_mode_follows_bus_width() {
        let source = StaticTable::new(params(8 * MIB, AddressMode::ThreeByteOnly, None));
        let (model, _) = discover(&source, &FlashConfig::default());
        assert_eq!(model.unwrap().read_mode, ReadMode::SINGLE);

        let config = FlashConfig::default().with_bus_width(BusWidth::Dual);
        let (model, _) = discover(&source, &config);
        assert_eq!(model.unwrap().read_mode.opcode, 0x3B);

        let config = FlashConfig::default().with_bus_width(BusWidth::Quad);
        let (model, _) = discover(&source, &config);
        let model = model.unwrap();
        assert_eq!(model.read_mode.opcode, 0xEB);
        assert_eq!(model.read_mode.dummy_cycles(), 6);
        assert!(model.needs_quad());
    }

    #[test]
    fn small_switchable_part_stays_three_byte() {
        let source = StaticTable::new(params(16 * MIB, AddressMode::ThreeOrFourByte, Some(FourByteEntry::B7)));
        let (model, ops) = discover(&source, &FlashConfig::default());
        assert_eq!(model.unwrap().address_width, AddressWidth::ThreeByte);
        assert!(ops.is_empty());
    }

    #[test]
    fn large_part_enters_four_byte_mode() {
        let source = StaticTable::new(params(32 * MIB, AddressMode::ThreeOrFourByte, Some(FourByteEntry::B7)));
        let (model, ops) = discover(&source, &FlashConfig::default());
        let model = model.unwrap();
        assert_eq!(model.address_width, AddressWidth::FourByte);
        assert_eq!(model.address_entry, AddressEntry::EnterB7);
        assert_eq!(ops, [opcodes::EN4B]);

        let source = StaticTable::new(params(32 * MIB, AddressMode::ThreeOrFourByte, Some(FourByteEntry::WREN_B7)));
        let (model, ops) = discover(&source, &FlashConfig::default());
        assert_eq!(model.unwrap().address_entry, AddressEntry::WrenEnterB7);
        assert_eq!(ops, [opcodes::WREN, opcodes::EN4B]);
    }

    #[test]
    fn large_part_without_entry_method_fails() {
        let source = StaticTable::new(params(32 * MIB, AddressMode::ThreeOrFourByte, None));
        let (model, _) = discover(&source, &FlashConfig::default());
        assert_eq!(model, Err(Error::AddressModeUnavailable));

        let source = StaticTable::new(params(32 * MIB, AddressMode::ThreeByteOnly, None));
        let (model, _) = discover(&source, &FlashConfig::default());
        assert_eq!(model, Err(Error::AddressModeUnavailable));
    }

    #[test]
    fn native_opcodes_are_translated() {
        let table = FourByteAddrTable {
            erase_opcodes: [Some(0x21), None, Some(0xDC), None],
            ..Default::default()
        };
        let source = StaticTable::new(params(32 * MIB, AddressMode::ThreeOrFourByte, None)).with_four_byte(table);
        let config = FlashConfig::default()
            .with_four_byte_opcodes(true)
            .with_bus_width(BusWidth::Quad);
        let (model, ops) = discover(&source, &config);
        let model = model.unwrap();
        assert!(ops.is_empty());
        assert!(model.native_four_byte());
        assert_eq!(model.read_mode.opcode, opcodes::QIOR_4B);
        assert_eq!(model.write_opcode, opcodes::PP_4B);
        assert_eq!(model.erase_types[0], EraseType::new(12, 0x21));
        assert_eq!(model.erase_types[1], EraseType::new(15, opcodes::BE_5C));
        assert_eq!(model.erase_types[2], EraseType::new(16, 0xDC));
    }

    #[test]
    fn configured_size_wins() {
        let source = StaticTable::new(params(8 * MIB, AddressMode::ThreeByteOnly, None));
        let config = FlashConfig::default().with_expected_size(4 * MIB);
        let (model, _) = discover(&source, &config);
        assert_eq!(model.unwrap().size, 4 * MIB);
    }

    #[test]
    fn qer_falls_back_to_config() {
        let mut basic = params(8 * MIB, AddressMode::ThreeByteOnly, None);
        basic.quad_enable = None;
        let source = StaticTable::new(basic);
        let (model, _) = discover(&source, &FlashConfig::default());
        assert_eq!(model.unwrap().qer, QerType::None);

        let config = FlashConfig::default().with_quad_enable(QerType::S1B6);
        let (model, _) = discover(&source, &config);
        assert_eq!(model.unwrap().qer, QerType::S1B6);
    }

    #[test]
    fn quad_write_opcode_needs_quad_bus() {
        let source = StaticTable::new(params(8 * MIB, AddressMode::ThreeByteOnly, None));
        let config = FlashConfig {
            write_opcode: Some(opcodes::PP_1_1_4),
            ..Default::default()
        };
        let (model, _) = discover(&source, &config);
        assert!(matches!(model, Err(Error::UnsupportedConfig(_))));

        let config = FlashConfig {
            write_opcode: Some(opcodes::PP_1_1_4),
            bus_width: BusWidth::Quad,
            ..Default::default()
        };
        let (model, _) = discover(&source, &config);
        assert_eq!(model.unwrap().write_io_mode, IoMode::QuadOut);
    }

    #[test]
    fn devicetree_bytes_match_static_table() {
        let basic = params(8 * MIB, AddressMode::ThreeByteOnly, None);
        let bytes: Vec<u8> = encode_bfp(&basic)
            .iter()
            .flat_map(|w| w.to_le_bytes())
            .collect();
        let config = FlashConfig::default().with_bus_width(BusWidth::Quad);
        let (from_bytes, _) = discover(&DeviceTreeConstant::new(&bytes), &config);
        let (from_table, _) = discover(&StaticTable::new(basic), &config);
        assert_eq!(from_bytes.unwrap(), from_table.unwrap());
    }

    #[test]
    fn devicetree_bytes_must_be_whole_dwords() {
        let bytes = [0u8; 38];
        let (model, _) = discover(&DeviceTreeConstant::new(&bytes), &FlashConfig::default());
        assert_eq!(model, Err(Error::Decode(DecodeError::MisalignedTable { len: 38 })));
    }

    #[test]
    fn page_size_must_be_power_of_two() {
        for page_size in [0, 300] {
            let mut basic = params(8 * MIB, AddressMode::ThreeByteOnly, None);
            basic.page_size = page_size;
            let (model, ops) = discover(&StaticTable::new(basic), &FlashConfig::default());
            assert!(matches!(model, Err(Error::UnsupportedConfig(_))), "page size {}", page_size);
            assert!(ops.is_empty());
        }
    }
}
