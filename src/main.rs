//! spinor - SFDP discovery and serial NOR sequencing from the command line
//!
//! Drives `spinor-core` against the `spinor-dummy` emulator. The emulated
//! part is described in the `[chip]` table of the configuration file and
//! its contents can be kept in an image file between runs, so a sequence
//! of invocations behaves like a real part on a bench:
//!
//! ```text
//! spinor --image flash.bin erase
//! spinor --image flash.bin write -i firmware.bin --offset 0x10000
//! spinor --image flash.bin read -o dump.bin
//! ```

mod cli;
mod commands;
mod config;
mod error;

use clap::Parser;
use cli::{Cli, Commands};

/// Log level for the number of `-v` flags; `None` leaves `RUST_LOG` in charge
fn verbosity(verbose: u8) -> Option<log::LevelFilter> {
    match verbose {
        0 => None,
        1 => Some(log::LevelFilter::Debug),
        _ => Some(log::LevelFilter::Trace),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(level) = verbosity(cli.verbose) {
        builder.filter_level(level);
    }
    builder.init();

    let settings = config::Settings::load(cli.config.as_deref())?;
    let chip = settings.chip.to_dummy()?;
    let mut dummy = commands::open_image(chip, cli.image.as_deref())?;

    let modified = match cli.command {
        Commands::Probe => {
            commands::run_probe(&mut dummy, &settings)?;
            false
        }
        Commands::Sfdp => {
            commands::run_sfdp(&mut dummy, &settings)?;
            false
        }
        Commands::Read {
            output,
            offset,
            length,
        } => {
            commands::run_read(&mut dummy, &settings, &output, offset, length)?;
            false
        }
        Commands::Write {
            input,
            offset,
            erase,
        } => {
            commands::run_write(&mut dummy, &settings, &input, offset, erase)?;
            true
        }
        Commands::Erase { offset, length } => {
            commands::run_erase(&mut dummy, &settings, offset, length)?;
            true
        }
        Commands::QuadEnable => {
            commands::run_quad_enable(&mut dummy, &settings)?;
            false
        }
    };

    if modified {
        if let Some(path) = &cli.image {
            commands::save_image(&dummy, path)?;
        }
    }
    Ok(())
}
