//! NOR flash device
//!
//! [`NorFlash`] owns a transport and the capability model discovered
//! through it. It can only be built by a successful discovery, so every
//! operation runs against a complete model.

use crate::capability::{CapabilityModel, CapabilitySource, FlashConfig, PollPolicy};
use crate::erase::{self, PageLayout};
use crate::error::{Error, Result};
use crate::protocol::{self, JedecId, StatusRegister};
use crate::qe::{self, QeState};
use crate::transport::Transport;

use super::sequencer::{write_cycle, SequencerState};

/// A discovered serial NOR flash
///
/// Operations take `&mut self`: one owner issues one operation at a time.
/// Use [`super::SharedNorFlash`] to share a device between contexts.
///
/// # Example
///
/// ```ignore
/// use spinor_core::capability::{FlashConfig, RuntimeDiscovered};
/// use spinor_core::flash::NorFlash;
///
/// let mut flash = NorFlash::discover(&mut bus, &RuntimeDiscovered, &FlashConfig::default())?;
/// let mut buf = [0u8; 16];
/// flash.read(0, &mut buf)?;
/// ```
#[derive(Debug)]
pub struct NorFlash<T> {
    transport: T,
    caps: CapabilityModel,
    jedec_id: JedecId,
    wel_retries: u8,
    poll: PollPolicy,
    state: SequencerState,
    qe: QeState,
}

impl<T: Transport> NorFlash<T> {
    /// Discover the part behind `transport`
    ///
    /// Optionally resets the part, reads its JEDEC ID and checks it against
    /// the configured one. Builds the capability model from `source`, then
    /// sets the QE bit when the selected read or program mode uses four
    /// data lines. Pass `&mut bus` to keep ownership of the transport on
    /// failure.
    pub fn discover<S: CapabilitySource + ?Sized>(
        mut transport: T,
        source: &S,
        config: &FlashConfig,
    ) -> Result<Self, T::Error> {
        if config.software_reset {
            protocol::software_reset(&mut transport)?;
        }
        let jedec_id = protocol::read_jedec_id(&mut transport)?;
        log::debug!("JEDEC ID {}", jedec_id);
        if let Some(expected) = config.expected_jedec_id {
            if expected != jedec_id {
                return Err(Error::JedecIdMismatch {
                    expected,
                    found: jedec_id,
                });
            }
        }

        let caps = source.discover(&mut transport, config)?;

        let qe = if caps.needs_quad() {
            match qe::configure(&mut transport, caps.qer, config.wel_retries, &config.poll)? {
                QeState::Unsupported => return Err(Error::UnsupportedQerType(caps.qer)),
                QeState::Failed { register, value } => {
                    return Err(Error::QeVerificationFailed { register, value })
                }
                state => state,
            }
        } else {
            QeState::Disabled
        };
        log::debug!("QE {:?}", qe);

        Ok(Self {
            transport,
            caps,
            jedec_id,
            wel_retries: config.wel_retries,
            poll: config.poll,
            state: SequencerState::Idle,
            qe,
        })
    }

    /// The capability model
    pub fn capabilities(&self) -> &CapabilityModel {
        &self.caps
    }

    /// ID read during discovery
    pub fn jedec_id(&self) -> JedecId {
        self.jedec_id
    }

    /// Device size in bytes
    pub fn size(&self) -> u32 {
        self.caps.size
    }

    /// Current sequencer state; `Idle` between operations
    pub fn state(&self) -> SequencerState {
        self.state
    }

    /// QE state reached during discovery
    pub fn quad_enable_state(&self) -> QeState {
        self.qe
    }

    /// Uniform page layout
    pub fn page_layout(&self) -> PageLayout {
        self.caps.page_layout()
    }

    /// Access the transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Access the transport mutably
    ///
    /// Commands sent this way bypass the model; leaving the part in
    /// another address mode breaks later operations.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Give the transport back
    pub fn release(self) -> T {
        self.transport
    }

    fn check_range(&self, offset: u32, len: usize) -> Result<(), T::Error> {
        let len = len as u64;
        if !self.caps.contains(offset, len) {
            return Err(Error::AddressOutOfRange {
                offset,
                len,
                size: self.caps.size,
            });
        }
        Ok(())
    }

    /// Read `buf.len()` bytes at `offset`
    pub fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), T::Error> {
        self.check_range(offset, buf.len())?;
        if buf.is_empty() {
            return Ok(());
        }
        protocol::read(
            &mut self.transport,
            &self.caps.read_mode,
            self.caps.address_width,
            offset,
            buf,
        )
    }

    /// Program `data` at `offset`
    ///
    /// The target must be erased. The data is split so that no program
    /// command crosses a page boundary.
    pub fn write(&mut self, offset: u32, data: &[u8]) -> Result<(), T::Error> {
        self.check_range(offset, data.len())?;
        if data.is_empty() {
            return Ok(());
        }

        let page_size = self.caps.page_size as usize;
        let opcode = self.caps.write_opcode;
        let io_mode = self.caps.write_io_mode;
        let width = self.caps.address_width;

        let mut done = 0usize;
        while done < data.len() {
            let addr = offset + done as u32;
            let to_page_end = page_size - (addr as usize % page_size);
            let chunk = &data[done..done + to_page_end.min(data.len() - done)];

            log::trace!("program {} bytes at 0x{:x}", chunk.len(), addr);
            write_cycle(
                &mut self.transport,
                &mut self.state,
                self.wel_retries,
                &self.poll,
                |t| protocol::program(t, opcode, io_mode, width, addr, chunk),
            )?;
            done += chunk.len();
        }
        Ok(())
    }

    /// Erase `len` bytes at `offset`
    ///
    /// A request covering the whole device uses chip erase. Otherwise both
    /// ends must be aligned to the smallest erase size, and each step uses
    /// the largest erase that fits. The part must report ready before the
    /// first erase command goes out.
    pub fn erase(&mut self, offset: u32, len: u32) -> Result<(), T::Error> {
        self.check_range(offset, len as usize)?;
        if len == 0 {
            return Ok(());
        }
        if offset == 0 && len == self.caps.size {
            return self.chip_erase();
        }

        let granularity = self
            .caps
            .erase_granularity()
            .ok_or(Error::NoErasePossible {
                offset,
                remaining: len,
            })?;
        if offset % granularity != 0 || len % granularity != 0 {
            return Err(Error::MisalignedErase {
                offset,
                len,
                granularity,
            });
        }

        protocol::wait_ready(&mut self.transport, &self.poll)?;
        let width = self.caps.address_width;
        for step in erase::plan_region(&self.caps.erase_types, offset, len) {
            let (addr, et) = step?;
            log::trace!("erase {} bytes at 0x{:x} with {:02X}", et.size(), addr, et.opcode);
            write_cycle(
                &mut self.transport,
                &mut self.state,
                self.wel_retries,
                &self.poll,
                |t| protocol::erase_block(t, et.opcode, width, addr),
            )?;
        }
        Ok(())
    }

    /// Erase the whole device
    pub fn chip_erase(&mut self) -> Result<(), T::Error> {
        protocol::wait_ready(&mut self.transport, &self.poll)?;
        let opcode = self.caps.chip_erase_opcode;
        log::trace!("chip erase with {:02X}", opcode);
        write_cycle(
            &mut self.transport,
            &mut self.state,
            self.wel_retries,
            &self.poll,
            |t| protocol::chip_erase(t, opcode),
        )
    }

    /// Read raw SFDP bytes
    pub fn read_sfdp(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), T::Error> {
        protocol::read_sfdp(&mut self.transport, offset, buf)
    }

    /// Read a status register
    pub fn read_status_register(&mut self, reg: StatusRegister) -> Result<u8, T::Error> {
        protocol::read_status(&mut self.transport, reg, self.caps.qer)
    }

    /// Write a status register under the write-enable handshake
    ///
    /// The write command follows the part's Quad Enable convention.
    pub fn write_status_register(&mut self, reg: StatusRegister, value: u8) -> Result<(), T::Error> {
        let qer = self.caps.qer;
        write_cycle(
            &mut self.transport,
            &mut self.state,
            self.wel_retries,
            &self.poll,
            |t| protocol::write_status(t, reg, value, qer),
        )
    }

    /// Run the Quad Enable configurator again
    pub fn configure_quad_enable(&mut self) -> Result<QeState, T::Error> {
        let state = qe::configure(&mut self.transport, self.caps.qer, self.wel_retries, &self.poll)?;
        if matches!(state, QeState::Enabled) {
            self.qe = state;
        }
        Ok(state)
    }
}
