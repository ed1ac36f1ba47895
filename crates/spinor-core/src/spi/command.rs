//! SPI command structure

use super::{AddressWidth, IoMode};

/// Direction of the data phase of a transaction
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Command (and address) only
    None,
    /// Data flows from the flash into `read_buf`
    Read,
    /// Data flows from `write_data` to the flash
    Write,
}

/// A single SPI transaction
///
/// Designed to avoid allocation - uses slices for data.
/// The lifetime parameter `'a` ties the command to the buffers it references.
pub struct SpiCommand<'a> {
    /// The opcode byte
    pub opcode: u8,

    /// Address (if any)
    pub address: Option<u32>,

    /// Address width
    pub address_width: AddressWidth,

    /// I/O mode
    pub io_mode: IoMode,

    /// Number of dummy cycles after address
    pub dummy_cycles: u8,

    /// Data to write after opcode/address/dummy
    pub write_data: &'a [u8],

    /// Buffer to read into (mutable)
    pub read_buf: &'a mut [u8],
}

impl<'a> SpiCommand<'a> {
    /// Create a simple command with no address or data (e.g., WREN, WRDI)
    pub fn simple(opcode: u8) -> Self {
        Self {
            opcode,
            address: None,
            address_width: AddressWidth::None,
            io_mode: IoMode::Single,
            dummy_cycles: 0,
            write_data: &[],
            read_buf: &mut [],
        }
    }

    /// Create a read register command with no address (e.g., RDSR)
    pub fn read_reg(opcode: u8, buf: &'a mut [u8]) -> Self {
        Self {
            read_buf: buf,
            ..Self::simple(opcode)
        }
    }

    /// Create a write register command with no address (e.g., WRSR)
    pub fn write_reg(opcode: u8, data: &'a [u8]) -> Self {
        Self {
            write_data: data,
            ..Self::simple(opcode)
        }
    }

    /// Create an addressed read command
    pub fn read(opcode: u8, width: AddressWidth, addr: u32, buf: &'a mut [u8]) -> Self {
        Self {
            address: Some(addr),
            address_width: width,
            read_buf: buf,
            ..Self::simple(opcode)
        }
    }

    /// Create an addressed write command (e.g., PP)
    pub fn write(opcode: u8, width: AddressWidth, addr: u32, data: &'a [u8]) -> Self {
        Self {
            address: Some(addr),
            address_width: width,
            write_data: data,
            ..Self::simple(opcode)
        }
    }

    /// Create an addressed command without data phase (sector/block erase)
    pub fn erase(opcode: u8, width: AddressWidth, addr: u32) -> Self {
        Self {
            address: Some(addr),
            address_width: width,
            ..Self::simple(opcode)
        }
    }

    /// Set the I/O mode for this command
    pub fn with_io_mode(mut self, mode: IoMode) -> Self {
        self.io_mode = mode;
        self
    }

    /// Set the number of dummy cycles
    pub fn with_dummy_cycles(mut self, cycles: u8) -> Self {
        self.dummy_cycles = cycles;
        self
    }

    /// Direction of the data phase
    pub fn direction(&self) -> Direction {
        if !self.read_buf.is_empty() {
            Direction::Read
        } else if !self.write_data.is_empty() {
            Direction::Write
        } else {
            Direction::None
        }
    }

    /// Number of bytes in the data phase
    pub fn data_len(&self) -> usize {
        match self.direction() {
            Direction::Read => self.read_buf.len(),
            Direction::Write => self.write_data.len(),
            Direction::None => 0,
        }
    }

    /// Returns true if this command has an address phase
    pub fn has_address(&self) -> bool {
        self.address.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_follows_buffers() {
        let mut buf = [0u8; 2];
        assert_eq!(SpiCommand::simple(0x06).direction(), Direction::None);
        assert_eq!(
            SpiCommand::read_reg(0x05, &mut buf).direction(),
            Direction::Read
        );
        let cmd = SpiCommand::write(0x02, AddressWidth::ThreeByte, 0x100, &[1, 2, 3]);
        assert_eq!(cmd.direction(), Direction::Write);
        assert_eq!(cmd.data_len(), 3);
        assert!(cmd.has_address());
    }
}
