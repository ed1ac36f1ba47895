//! SFDP dump command implementation

use spinor_core::sfdp;
use spinor_dummy::DummyFlash;

use crate::config::Settings;
use crate::error::Result;

/// Print the raw headers and tables, then their decoded form
pub fn run_sfdp(dummy: &mut DummyFlash, settings: &Settings) -> Result<()> {
    let tables = sfdp::read_tables(dummy, settings.flash.sfdp_headers as usize)?;

    println!(
        "SFDP v{} with {} parameter header(s)",
        tables.header.revision,
        tables.header.num_param_headers()
    );
    for ph in tables.param_headers.iter() {
        println!(
            "  id 0x{:04X} v{} {:>2} DWORDs at 0x{:06X}",
            ph.id, ph.revision, ph.length_dwords, ph.table_pointer
        );
    }

    println!("Basic Flash Parameter table:");
    for (i, dw) in tables.bfp.iter().enumerate() {
        println!("  DW{:<2} 0x{:08X}", i + 1, dw);
    }
    if let Some(words) = tables.four_byte {
        println!("4-byte Address Instruction table:");
        for (i, dw) in words.iter().enumerate() {
            println!("  DW{:<2} 0x{:08X}", i + 1, dw);
        }
    }

    let params = sfdp::decode_bfp(&tables.bfp_header, &tables.bfp)?;
    println!();
    println!("Density:      {} bytes", params.density_bytes);
    println!("Page size:    {} bytes", params.page_size);
    println!("Address mode: {:?}", params.address_mode);
    for (i, et) in params.erase_types.iter().enumerate().filter(|(_, et)| et.is_present()) {
        println!("Erase type {}: {} bytes, opcode 0x{:02X}", i + 1, et.size(), et.opcode);
    }
    for mode in params.read_modes.iter() {
        println!(
            "Read {}:    opcode 0x{:02X}, {} mode clocks, {} wait states",
            mode.io_mode, mode.opcode, mode.mode_clocks, mode.wait_states
        );
    }
    match params.quad_enable {
        Some(qer) => println!("QER:          {:?}", qer),
        None => println!("QER:          not in table"),
    }
    if let Some(entry) = params.four_byte_entry {
        println!("4B entry:     {:?}", entry);
    }
    if let Some(words) = tables.four_byte {
        let table = sfdp::decode_four_byte_table(&words)?;
        println!("4B opcodes:   {:?}", table.instructions);
    }
    Ok(())
}
