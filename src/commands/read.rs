//! Read command implementation

use std::fs;
use std::path::Path;

use spinor_dummy::DummyFlash;

use crate::config::Settings;
use crate::error::{CliError, Result};

/// Read `length` bytes at `offset` into `output`
pub fn run_read(
    dummy: &mut DummyFlash,
    settings: &Settings,
    output: &Path,
    offset: u32,
    length: Option<u32>,
) -> Result<()> {
    let mut flash = super::discover(dummy, settings)?;
    let len = super::resolve_range(flash.size(), offset, length)?;

    let mut data = vec![0u8; len as usize];
    let pb = super::progress_bar(len as u64, "Reading");
    let mut done = 0u32;
    for chunk in data.chunks_mut(super::CHUNK_SIZE as usize) {
        flash.read(offset + done, chunk)?;
        done += chunk.len() as u32;
        pb.set_position(done as u64);
    }
    pb.finish_with_message("Read complete");

    fs::write(output, &data).map_err(|e| CliError::io(output, e))?;
    println!("Wrote {} bytes to {:?}", data.len(), output);
    Ok(())
}
