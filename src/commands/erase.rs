//! Erase command implementation

use spinor_dummy::DummyFlash;

use crate::config::Settings;
use crate::error::Result;

/// Erase `length` bytes at `offset`; the whole device by default
pub fn run_erase(
    dummy: &mut DummyFlash,
    settings: &Settings,
    offset: u32,
    length: Option<u32>,
) -> Result<()> {
    let mut flash = super::discover(dummy, settings)?;
    let len = super::resolve_range(flash.size(), offset, length)?;

    if offset == 0 && len == flash.size() {
        println!("Erasing entire chip ({} bytes)", len);
    } else {
        println!("Erasing 0x{:X} bytes at 0x{:08X}", len, offset);
    }
    super::write::erase_with_progress(&mut flash, offset, len)?;
    Ok(())
}
