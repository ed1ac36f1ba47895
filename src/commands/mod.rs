//! CLI command implementations
//!
//! Every command works on a [`DummyFlash`] built from the `[chip]`
//! configuration and, when `--image` is given, preloaded with that file.
//! The device is discovered through the configured capability source
//! before the command runs.

mod erase;
mod probe;
mod quad_enable;
mod read;
mod sfdp;
mod write;

pub use erase::run_erase;
pub use probe::run_probe;
pub use quad_enable::run_quad_enable;
pub use read::run_read;
pub use sfdp::run_sfdp;
pub use write::run_write;

use std::fs;
use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};
use spinor_core::capability::{DeviceTreeConstant, RuntimeDiscovered, StaticTable};
use spinor_core::flash::NorFlash;
use spinor_core::sfdp::{ParameterHeader, HEADER_LEN};
use spinor_dummy::{DummyConfig, DummyFlash};

use crate::config::{Settings, Source};
use crate::error::{CliError, Result};

/// Chunk size used for progress reporting
pub const CHUNK_SIZE: u32 = 64 * 1024;

/// A discovered device borrowing the emulator
pub type Flash<'a> = NorFlash<&'a mut DummyFlash>;

/// Create the emulated part, loading `image` when it exists
pub fn open_image(chip: DummyConfig, image: Option<&Path>) -> Result<DummyFlash> {
    let Some(path) = image.filter(|p| p.exists()) else {
        return Ok(DummyFlash::new(chip));
    };
    let data = fs::read(path).map_err(|e| CliError::io(path, e))?;
    if data.len() > chip.size as usize {
        log::warn!(
            "Image {:?} is {} bytes, only the first {} are used",
            path,
            data.len(),
            chip.size
        );
    }
    log::info!("Loaded {} bytes from {:?}", data.len().min(chip.size as usize), path);
    Ok(DummyFlash::with_data(chip, &data))
}

/// Write the emulated contents back to `path`
pub fn save_image(dummy: &DummyFlash, path: &Path) -> Result<()> {
    fs::write(path, dummy.data()).map_err(|e| CliError::io(path, e))?;
    log::info!("Saved {} bytes to {:?}", dummy.data().len(), path);
    Ok(())
}

/// Discover the device through the configured capability source
pub fn discover<'a>(dummy: &'a mut DummyFlash, settings: &Settings) -> Result<Flash<'a>> {
    let flash = match settings.source {
        Source::Sfdp => NorFlash::discover(dummy, &RuntimeDiscovered, &settings.flash)?,
        Source::Bfp => {
            let (bfp, four_byte) = served_tables(dummy);
            let mut source = DeviceTreeConstant::new(&bfp);
            source.four_byte = four_byte.as_deref();
            NorFlash::discover(dummy, &source, &settings.flash)?
        }
        Source::Static => {
            let config = dummy.config();
            let mut source = StaticTable::new(config.basic_params());
            if let Some(table) = config.four_byte_addr_table() {
                source = source.with_four_byte(table);
            }
            NorFlash::discover(dummy, &source, &settings.flash)?
        }
    };
    Ok(flash)
}

/// Copy the parameter tables out of the emulator's SFDP image
///
/// Stands in for tables handed over by firmware, such as a device tree
/// property.
fn served_tables(dummy: &DummyFlash) -> (Vec<u8>, Option<Vec<u8>>) {
    let image = dummy.sfdp_image();
    let mut bfp = Vec::new();
    let mut four_byte = None;

    for chunk in image.get(HEADER_LEN..).unwrap_or_default().chunks_exact(HEADER_LEN).take(2) {
        let mut raw = [0u8; HEADER_LEN];
        raw.copy_from_slice(chunk);
        let header = ParameterHeader::parse(&raw);
        let start = header.table_pointer as usize;
        let Some(table) = image.get(start..start + header.length_bytes()) else {
            continue;
        };
        if header.is_basic() {
            bfp = table.to_vec();
        } else if header.is_four_byte_table() {
            four_byte = Some(table.to_vec());
        }
    }
    (bfp, four_byte)
}

/// Resolve an optional length to the rest of the device and check bounds
pub fn resolve_range(size: u32, offset: u32, length: Option<u32>) -> Result<u32> {
    let len = length.unwrap_or_else(|| size.saturating_sub(offset));
    if offset as u64 + len as u64 > size as u64 {
        return Err(CliError::Range {
            offset,
            len: len as u64,
            size,
        });
    }
    Ok(len)
}

/// Progress bar in the style used by every command
pub fn progress_bar(total: u64, phase: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::default_bar().template(&format!(
        "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{bytes}}/{{total_bytes}} ({{bytes_per_sec}}, {{eta}}) {}",
        phase
    )) {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_range() {
        assert_eq!(resolve_range(0x1000, 0, None).unwrap(), 0x1000);
        assert_eq!(resolve_range(0x1000, 0x800, None).unwrap(), 0x800);
        assert_eq!(resolve_range(0x1000, 0x800, Some(0x100)).unwrap(), 0x100);
        assert!(resolve_range(0x1000, 0x800, Some(0x801)).is_err());
        assert_eq!(resolve_range(0x1000, 0x2000, None).unwrap(), 0);
    }

    #[test]
    fn test_sources_discover_the_same_part() {
        let chip = DummyConfig {
            four_byte_table: true,
            ..Default::default()
        };
        let mut models = Vec::new();
        for source in [Source::Sfdp, Source::Bfp, Source::Static] {
            let settings = Settings {
                source,
                ..Default::default()
            };
            let mut dummy = DummyFlash::new(chip.clone());
            let flash = discover(&mut dummy, &settings).unwrap();
            models.push(flash.capabilities().clone());
        }
        assert_eq!(models[0], models[1]);
        assert_eq!(models[0], models[2]);
    }

    #[test]
    fn test_image_round_trip() {
        let dir = std::env::temp_dir().join(format!("spinor-image-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("flash.bin");

        let chip = DummyConfig {
            size: 0x10000,
            ..Default::default()
        };
        let mut dummy = open_image(chip.clone(), Some(&path)).unwrap();
        assert!(dummy.data().iter().all(|&b| b == 0xFF));
        dummy.data_mut()[..4].copy_from_slice(b"NOR!");
        save_image(&dummy, &path).unwrap();

        let dummy = open_image(chip, Some(&path)).unwrap();
        assert_eq!(&dummy.data()[..4], b"NOR!");
        fs::remove_dir_all(&dir).unwrap();
    }
}
