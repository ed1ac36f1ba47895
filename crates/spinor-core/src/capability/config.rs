//! Integrator supplied configuration

use crate::protocol::JedecId;
use crate::sfdp::{QerType, MIN_PARAMETER_HEADERS};
use crate::spi::IoMode;

/// Data lines wired between controller and flash
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u8", into = "u8"))]
pub enum BusWidth {
    /// One data line each way
    #[default]
    Single,
    /// Two bidirectional lines
    Dual,
    /// Four bidirectional lines
    Quad,
}

impl BusWidth {
    /// Number of data lines
    pub const fn lines(self) -> u8 {
        match self {
            Self::Single => 1,
            Self::Dual => 2,
            Self::Quad => 4,
        }
    }

    /// Returns true if `mode` can be driven on this bus
    pub const fn allows(self, mode: IoMode) -> bool {
        mode.max_lines() <= self.lines()
    }
}

impl TryFrom<u8> for BusWidth {
    type Error = &'static str;

    fn try_from(lines: u8) -> Result<Self, Self::Error> {
        match lines {
            1 => Ok(Self::Single),
            2 => Ok(Self::Dual),
            4 => Ok(Self::Quad),
            _ => Err("bus width must be 1, 2 or 4 data lines"),
        }
    }
}

impl From<BusWidth> for u8 {
    fn from(width: BusWidth) -> Self {
        width.lines()
    }
}

/// How WIP is polled after program and erase commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PollPolicy {
    /// Delay between two status reads, in microseconds
    pub delay_us: u32,
    /// Give up after this many busy reads; `None` polls until ready
    pub max_polls: Option<u32>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            delay_us: 10,
            max_polls: None,
        }
    }
}

/// Per-device configuration
///
/// Everything here either constrains what discovery may select (bus
/// width, native 4-byte opcodes) or fills in what a short parameter table
/// cannot express (Quad Enable Requirement, size).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FlashConfig {
    /// Data lines available for read and program
    pub bus_width: BusWidth,
    /// Known device size in bytes; wins over the discovered density
    pub expected_size: Option<u32>,
    /// Quad Enable Requirement used when the table does not carry one
    pub quad_enable: Option<QerType>,
    /// Page program opcode overriding the default 0x02
    pub write_opcode: Option<u8>,
    /// Use dedicated 4-byte opcodes instead of switching address mode
    pub four_byte_opcodes: bool,
    /// Status reads spent confirming the write enable latch
    pub wel_retries: u8,
    /// WIP polling
    pub poll: PollPolicy,
    /// Parameter headers to scan during runtime discovery
    pub sfdp_headers: u8,
    /// Fail discovery unless RDID returns this ID
    pub expected_jedec_id: Option<JedecId>,
    /// Send RSTEN/RST before identifying the part
    pub software_reset: bool,
}

impl Default for FlashConfig {
    fn default() -> Self {
        Self {
            bus_width: BusWidth::Single,
            expected_size: None,
            quad_enable: None,
            write_opcode: None,
            four_byte_opcodes: false,
            wel_retries: 8,
            poll: PollPolicy::default(),
            sfdp_headers: MIN_PARAMETER_HEADERS as u8,
            expected_jedec_id: None,
            software_reset: false,
        }
    }
}

impl FlashConfig {
    /// Set the bus width
    pub fn with_bus_width(mut self, width: BusWidth) -> Self {
        self.bus_width = width;
        self
    }

    /// Set the expected device size
    pub fn with_expected_size(mut self, size: u32) -> Self {
        self.expected_size = Some(size);
        self
    }

    /// Set the Quad Enable Requirement fallback
    pub fn with_quad_enable(mut self, qer: QerType) -> Self {
        self.quad_enable = Some(qer);
        self
    }

    /// Use dedicated 4-byte opcodes
    pub fn with_four_byte_opcodes(mut self, enable: bool) -> Self {
        self.four_byte_opcodes = enable;
        self
    }

    /// Require the part to answer RDID with `id`
    pub fn with_expected_jedec_id(mut self, id: JedecId) -> Self {
        self.expected_jedec_id = Some(id);
        self
    }

    /// Reset the part before discovery
    pub fn with_software_reset(mut self, reset: bool) -> Self {
        self.software_reset = reset;
        self
    }

    /// Set the WIP polling policy
    pub fn with_poll(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bus_width_limits_modes() {
        assert!(BusWidth::Single.allows(IoMode::Single));
        assert!(!BusWidth::Single.allows(IoMode::DualOut));
        assert!(BusWidth::Dual.allows(IoMode::DualIo));
        assert!(!BusWidth::Dual.allows(IoMode::QuadOut));
        assert!(BusWidth::Quad.allows(IoMode::QuadIo));
        assert_eq!(BusWidth::try_from(3), Err("bus width must be 1, 2 or 4 data lines"));
        assert_eq!(u8::from(BusWidth::Quad), 4);
    }

    #[test]
    fn defaults() {
        let config = FlashConfig::default();
        assert_eq!(config.wel_retries, 8);
        assert_eq!(config.sfdp_headers, 2);
        assert_eq!(config.poll.max_polls, None);
    }
}
