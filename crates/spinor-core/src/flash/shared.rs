//! Device shared between execution contexts

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;

use crate::capability::CapabilityModel;
use crate::error::Result;
use crate::transport::Transport;

use super::NorFlash;

pub use embassy_sync::blocking_mutex::raw::{CriticalSectionRawMutex, NoopRawMutex, RawMutex};

/// A [`NorFlash`] behind a blocking mutex
///
/// The lock is held for the whole multi-transaction operation, so a
/// program cycle can never interleave with another context's erase. The
/// raw mutex is the integrator's choice: [`CriticalSectionRawMutex`] for
/// interrupt and thread contexts, [`NoopRawMutex`] when there is only one.
///
/// Calling back into the same device from inside [`SharedNorFlash::lock`]
/// panics.
pub struct SharedNorFlash<M: RawMutex, T> {
    inner: Mutex<M, RefCell<NorFlash<T>>>,
}

impl<M: RawMutex, T: Transport> SharedNorFlash<M, T> {
    /// Wrap a discovered device
    pub fn new(flash: NorFlash<T>) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(flash)),
        }
    }

    /// Run `f` with exclusive access to the device
    pub fn lock<R>(&self, f: impl FnOnce(&mut NorFlash<T>) -> R) -> R {
        self.inner.lock(|cell| f(&mut cell.borrow_mut()))
    }

    /// Read `buf.len()` bytes at `offset`
    pub fn read(&self, offset: u32, buf: &mut [u8]) -> Result<(), T::Error> {
        self.lock(|flash| flash.read(offset, buf))
    }

    /// Program `data` at `offset`
    pub fn write(&self, offset: u32, data: &[u8]) -> Result<(), T::Error> {
        self.lock(|flash| flash.write(offset, data))
    }

    /// Erase `len` bytes at `offset`
    pub fn erase(&self, offset: u32, len: u32) -> Result<(), T::Error> {
        self.lock(|flash| flash.erase(offset, len))
    }

    /// Copy of the capability model
    pub fn capabilities(&self) -> CapabilityModel {
        self.lock(|flash| flash.capabilities().clone())
    }

    /// Unwrap the device
    pub fn into_inner(self) -> NorFlash<T> {
        self.inner.into_inner().into_inner()
    }
}
