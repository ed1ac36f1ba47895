//! TOML configuration for the emulated part and its discovery
//!
//! ```toml
//! source = "sfdp"
//!
//! [flash]
//! bus_width = 4
//! quad_enable = "s2b1v4"
//!
//! [chip]
//! jedec_id = [0xEF, 0x40, 0x19]
//! size = "32 MiB"
//! address_mode = "three-or-four-byte"
//! four_byte_entry = ["b7", "wren-b7"]
//! qer = "s1b6"
//!
//! [[chip.erase]]
//! size = "4 KiB"
//! opcode = 0x20
//!
//! [[chip.erase]]
//! size = "64 KiB"
//! opcode = 0xD8
//! ```

use std::fs;
use std::path::Path;

use serde::Deserialize;
use spinor_core::capability::FlashConfig;
use spinor_core::sfdp::{AddressMode, EraseType, FourByteEntry, QerType};
use spinor_core::spi::IoMode;
use spinor_dummy::DummyConfig;

use crate::error::{CliError, Result};

/// Where the capability model comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Read SFDP from the part
    #[default]
    Sfdp,
    /// Decode a raw Basic Flash Parameter table handed over as bytes
    Bfp,
    /// Use the decoded parameters directly
    Static,
}

/// Top level configuration file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub source: Source,
    pub flash: FlashConfig,
    pub chip: ChipSection,
}

/// `[chip]` table describing the emulated part
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChipSection {
    /// Manufacturer and device ID answered to RDID
    pub jedec_id: [u8; 3],
    #[serde(deserialize_with = "deserialize_size")]
    pub size: u32,
    #[serde(deserialize_with = "deserialize_size")]
    pub page_size: u32,
    pub address_mode: AddressMode,
    pub four_byte_entry: Vec<String>,
    pub four_byte_table: bool,
    pub erase: Vec<EraseSection>,
    pub qer: Option<QerType>,
    /// Fast read modes to advertise; the emulator defaults when absent
    pub read_modes: Option<Vec<IoMode>>,
    /// Status registers 1-3 at power on
    pub status: [u8; 3],
    pub busy_polls: u32,
    pub sfdp: bool,
    #[serde(deserialize_with = "deserialize_size")]
    pub max_read_len: u32,
}

/// One `[[chip.erase]]` entry
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EraseSection {
    #[serde(deserialize_with = "deserialize_size")]
    pub size: u32,
    #[serde(deserialize_with = "deserialize_hex_u8")]
    pub opcode: u8,
}

impl Default for ChipSection {
    fn default() -> Self {
        let dummy = DummyConfig::default();
        Self {
            jedec_id: dummy.jedec_id,
            size: dummy.size,
            page_size: dummy.page_size,
            address_mode: dummy.address_mode,
            four_byte_entry: Vec::new(),
            four_byte_table: dummy.four_byte_table,
            erase: dummy
                .erase_types
                .iter()
                .filter(|et| et.is_present())
                .map(|et| EraseSection {
                    size: et.size(),
                    opcode: et.opcode,
                })
                .collect(),
            qer: dummy.qer,
            read_modes: None,
            status: dummy.status,
            busy_polls: dummy.busy_polls,
            sfdp: dummy.sfdp,
            max_read_len: dummy.max_read_len as u32,
        }
    }
}

impl Settings {
    /// Load settings from `path`, or use the defaults when there is none
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = fs::read_to_string(path).map_err(|e| CliError::io(path, e))?;
        let settings: Self = toml::from_str(&content).map_err(|source| CliError::Config {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("Loaded configuration from {:?}", path);
        Ok(settings)
    }
}

impl ChipSection {
    /// Build the emulator description
    pub fn to_dummy(&self) -> Result<DummyConfig> {
        let defaults = DummyConfig::default();

        if self.erase.len() > 4 {
            return Err(CliError::InvalidConfig(format!(
                "at most 4 erase types, got {}",
                self.erase.len()
            )));
        }
        let mut erase_types = [EraseType::ABSENT; 4];
        for (slot, erase) in erase_types.iter_mut().zip(&self.erase) {
            if !erase.size.is_power_of_two() {
                return Err(CliError::InvalidConfig(format!(
                    "erase size {} is not a power of two",
                    erase.size
                )));
            }
            *slot = EraseType::new(erase.size.trailing_zeros() as u8, erase.opcode);
        }

        if !self.page_size.is_power_of_two() || self.page_size > 1 << 15 {
            return Err(CliError::InvalidConfig(format!(
                "page size {} is not a power of two up to 32 KiB",
                self.page_size
            )));
        }
        if self.size == 0 || self.size % self.page_size != 0 {
            return Err(CliError::InvalidConfig(format!(
                "size {} is not a multiple of the page size",
                self.size
            )));
        }

        let read_modes = match &self.read_modes {
            Some(modes) => defaults
                .read_modes
                .iter()
                .filter(|m| modes.contains(&m.io_mode))
                .copied()
                .collect(),
            None => defaults.read_modes.clone(),
        };

        Ok(DummyConfig {
            jedec_id: self.jedec_id,
            size: self.size,
            page_size: self.page_size,
            address_mode: self.address_mode,
            four_byte_entry: parse_entry(&self.four_byte_entry)?,
            four_byte_table: self.four_byte_table,
            erase_types,
            qer: self.qer,
            read_modes,
            status: self.status,
            busy_polls: self.busy_polls,
            sfdp: self.sfdp,
            max_read_len: self.max_read_len as usize,
        })
    }
}

/// Map entry method names onto [`FourByteEntry`] flags
fn parse_entry(names: &[String]) -> Result<FourByteEntry> {
    names.iter().try_fold(FourByteEntry::empty(), |acc, name| {
        let flag = match name.to_lowercase().as_str() {
            "b7" => FourByteEntry::B7,
            "wren-b7" => FourByteEntry::WREN_B7,
            "ext-addr-reg" => FourByteEntry::EXT_ADDR_REG,
            "bank-reg" => FourByteEntry::BANK_REG,
            "nv-config-reg" => FourByteEntry::NV_CONFIG_REG,
            "dedicated-4b" => FourByteEntry::DEDICATED_4B,
            "always-4b" => FourByteEntry::ALWAYS_4B,
            other => {
                return Err(CliError::InvalidConfig(format!(
                    "unknown 4-byte entry method '{}'",
                    other
                )))
            }
        };
        Ok(acc | flag)
    })
}

/// Deserialize a u8 that can be written as an integer or a hex string
fn deserialize_hex_u8<'de, D>(deserializer: D) -> std::result::Result<u8, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = deserialize_size(deserializer)?;
    u8::try_from(value).map_err(|_| serde::de::Error::custom(format!("0x{:X} does not fit a byte", value)))
}

/// Deserialize a size that can be an integer or a string like "16 MiB"
fn deserialize_size<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum SizeOrStr {
        Int(u32),
        Str(String),
    }

    match SizeOrStr::deserialize(deserializer)? {
        SizeOrStr::Int(n) => Ok(n),
        SizeOrStr::Str(s) => parse_size(&s).map_err(serde::de::Error::custom),
    }
}

/// Parse a number like "4096", "0x1000", "64 KiB" or "16 MiB"
pub fn parse_size(s: &str) -> std::result::Result<u32, String> {
    let s = s.trim();

    if let Ok(n) = s.parse::<u32>() {
        return Ok(n);
    }
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return u32::from_str_radix(hex.trim(), 16).map_err(|e| format!("invalid hex: {}", e));
    }

    let lower = s.to_lowercase();
    let (num, multiplier) = if let Some(n) = lower.strip_suffix("mib") {
        (n, 1024 * 1024)
    } else if let Some(n) = lower.strip_suffix("kib") {
        (n, 1024)
    } else if let Some(n) = lower.strip_suffix('b') {
        (n, 1)
    } else {
        return Err(format!("invalid size: {}", s));
    };

    let num: u32 = num.trim().parse().map_err(|_| format!("invalid size: {}", s))?;
    num.checked_mul(multiplier)
        .ok_or_else(|| format!("size too large: {}", s))
}
