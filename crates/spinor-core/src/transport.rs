//! The one operation the core needs from its environment

use crate::spi::SpiCommand;

/// Synchronous command/address/dummy/data transaction on a flash bus
///
/// Implemented by whatever peripheral driver sits below the core (SPI, QSPI,
/// OSPI controller, or an emulator). The core never interprets
/// [`Transport::Error`]; it is returned to the caller inside
/// [`Error::Transport`](crate::Error::Transport).
///
/// `transact` must block until the transaction has completed. For a read
/// the whole of `cmd.read_buf` is filled.
pub trait Transport {
    /// Transport specific error
    type Error: core::fmt::Debug;

    /// Execute one transaction
    fn transact(&mut self, cmd: &mut SpiCommand<'_>) -> Result<(), Self::Error>;

    /// Largest data phase a single read transaction may carry
    fn max_read_len(&self) -> usize {
        usize::MAX
    }

    /// Wait between status polls
    fn delay_us(&mut self, _us: u32) {}
}

impl<T: Transport + ?Sized> Transport for &mut T {
    type Error = T::Error;

    fn transact(&mut self, cmd: &mut SpiCommand<'_>) -> Result<(), Self::Error> {
        (**self).transact(cmd)
    }

    fn max_read_len(&self) -> usize {
        (**self).max_read_len()
    }

    fn delay_us(&mut self, us: u32) {
        (**self).delay_us(us)
    }
}
