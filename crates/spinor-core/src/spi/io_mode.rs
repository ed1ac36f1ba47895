//! SPI I/O modes

/// I/O mode for SPI transactions
///
/// Named by the number of lines used for the command, address and data
/// phases. Declared from slowest to fastest, which is also the order read
/// modes are listed in after discovery.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum IoMode {
    /// Standard SPI: 1-1-1 (cmd, addr, data all on single line)
    #[default]
    Single,
    /// Dual Output: 1-1-2 (data phase on 2 lines)
    DualOut,
    /// Dual I/O: 1-2-2 (addr and data on 2 lines)
    DualIo,
    /// Quad Output: 1-1-4 (data phase on 4 lines)
    QuadOut,
    /// Quad I/O: 1-4-4 (addr and data on 4 lines)
    QuadIo,
}

impl IoMode {
    /// Returns the number of lines used for the address phase
    pub const fn addr_lines(&self) -> u8 {
        match self {
            Self::Single | Self::DualOut | Self::QuadOut => 1,
            Self::DualIo => 2,
            Self::QuadIo => 4,
        }
    }

    /// Returns the number of lines used for the data phase
    pub const fn data_lines(&self) -> u8 {
        match self {
            Self::Single => 1,
            Self::DualOut | Self::DualIo => 2,
            Self::QuadOut | Self::QuadIo => 4,
        }
    }

    /// Widest phase of the transaction
    pub const fn max_lines(&self) -> u8 {
        let addr = self.addr_lines();
        let data = self.data_lines();
        if addr > data {
            addr
        } else {
            data
        }
    }

    /// Returns true if this mode needs the quad enable bit
    pub const fn requires_quad(&self) -> bool {
        matches!(self, Self::QuadOut | Self::QuadIo)
    }

    /// Short "x-y-z" label
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Single => "1-1-1",
            Self::DualOut => "1-1-2",
            Self::DualIo => "1-2-2",
            Self::QuadOut => "1-1-4",
            Self::QuadIo => "1-4-4",
        }
    }
}

impl core::fmt::Display for IoMode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}
