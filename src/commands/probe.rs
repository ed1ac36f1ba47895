//! Probe command implementation

use spinor_dummy::DummyFlash;

use crate::config::Settings;
use crate::error::Result;

/// Discover the part and print what was negotiated
pub fn run_probe(dummy: &mut DummyFlash, settings: &Settings) -> Result<()> {
    let flash = super::discover(dummy, settings)?;
    let caps = flash.capabilities();

    println!("Discovered via {:?}:", settings.source);
    println!("JEDEC ID:  {}", flash.jedec_id());
    println!("{}", caps);

    let layout = flash.page_layout();
    println!(
        "Layout:    {} pages of {} bytes",
        layout.pages_count, layout.pages_size
    );
    println!("QE state:  {:?}", flash.quad_enable_state());

    for mode in caps.read_modes.iter() {
        let marker = if mode.io_mode == caps.read_mode.io_mode { '*' } else { ' ' };
        let usable = if caps.bus_width.allows(mode.io_mode) { "" } else { " (bus too narrow)" };
        println!(
            " {} {:<6} opcode 0x{:02X}, {} dummy cycles{}",
            marker,
            mode.io_mode.to_string(),
            mode.opcode,
            mode.dummy_cycles(),
            usable
        );
    }
    Ok(())
}
