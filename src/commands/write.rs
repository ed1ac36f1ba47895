//! Write command implementation

use std::fs;
use std::path::Path;

use spinor_dummy::DummyFlash;

use crate::config::Settings;
use crate::error::{CliError, Result};

use super::Flash;

/// Program `input` at `offset`, optionally erasing the covered blocks first
///
/// With `erase`, the range is widened to the erase granularity and the
/// bytes around the file are read back and programmed again, so only the
/// file's own range changes. The result is verified by reading it back.
pub fn run_write(
    dummy: &mut DummyFlash,
    settings: &Settings,
    input: &Path,
    offset: u32,
    erase: bool,
) -> Result<()> {
    let data = fs::read(input).map_err(|e| CliError::io(input, e))?;
    println!("Read {} bytes from {:?}", data.len(), input);

    let mut flash = super::discover(dummy, settings)?;
    super::resolve_range(flash.size(), offset, Some(data.len() as u32))?;
    if data.is_empty() {
        return Ok(());
    }

    let (start, image) = if erase {
        let (start, image) = merge_into_blocks(&mut flash, offset, &data)?;
        erase_with_progress(&mut flash, start, image.len() as u32)?;
        (start, image)
    } else {
        (offset, data.clone())
    };

    let pb = super::progress_bar(image.len() as u64, "Writing");
    let mut done = 0u32;
    for chunk in image.chunks(super::CHUNK_SIZE as usize) {
        flash.write(start + done, chunk)?;
        done += chunk.len() as u32;
        pb.set_position(done as u64);
    }
    pb.finish_with_message("Write complete");

    let mut back = vec![0u8; data.len()];
    flash.read(offset, &mut back)?;
    if let Some(pos) = back.iter().zip(&data).position(|(a, b)| a != b) {
        return Err(CliError::Verify {
            offset: offset + pos as u32,
            expected: data[pos],
            found: back[pos],
        });
    }
    println!("Verified {} bytes at 0x{:08X}", data.len(), offset);
    Ok(())
}

/// Widen `[offset, offset + data.len())` to whole erase blocks and fill the
/// margins with the current contents
fn merge_into_blocks(flash: &mut Flash<'_>, offset: u32, data: &[u8]) -> Result<(u32, Vec<u8>)> {
    let Some(granularity) = flash.capabilities().erase_granularity() else {
        return Ok((offset, data.to_vec()));
    };
    let end = offset as u64 + data.len() as u64;
    let start = offset - offset % granularity;
    let aligned_end = end.div_ceil(granularity as u64) * granularity as u64;

    let mut image = vec![0u8; (aligned_end - start as u64) as usize];
    flash.read(start, &mut image)?;
    let at = (offset - start) as usize;
    image[at..at + data.len()].copy_from_slice(data);

    log::debug!(
        "Erasing 0x{:08X}..0x{:08X} around 0x{:X} bytes at 0x{:08X}",
        start,
        aligned_end,
        data.len(),
        offset
    );
    Ok((start, image))
}

pub(super) fn erase_with_progress(flash: &mut Flash<'_>, offset: u32, len: u32) -> Result<()> {
    let granularity = flash.capabilities().erase_granularity().unwrap_or(len.max(1));
    let whole_chip = offset == 0 && len == flash.size();
    let step = if whole_chip { len } else { super::CHUNK_SIZE.max(granularity) };

    let pb = super::progress_bar(len as u64, "Erasing");
    let mut done = 0u32;
    while done < len {
        let n = step.min(len - done);
        flash.erase(offset + done, n)?;
        done += n;
        pb.set_position(done as u64);
    }
    pb.finish_with_message("Erase complete");
    Ok(())
}
