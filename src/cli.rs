//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

#[derive(Parser)]
#[command(name = "spinor")]
#[command(author, version, about = "SFDP serial NOR flash against an emulated part", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Configuration file (TOML) describing the part and discovery
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Backing file for the flash contents; loaded at start, saved after changes
    #[arg(long, global = true)]
    pub image: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Discover the part and print its capability model
    Probe,

    /// Dump the raw SFDP headers and decoded parameter tables
    Sfdp,

    /// Read flash contents to file
    Read {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Start address (hex or decimal)
        #[arg(long, value_parser = parse_hex_u32, default_value = "0")]
        offset: u32,

        /// Bytes to read; defaults to the rest of the device
        #[arg(long, value_parser = parse_hex_u32)]
        length: Option<u32>,
    },

    /// Program a file into flash
    Write {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,

        /// Start address (hex or decimal)
        #[arg(long, value_parser = parse_hex_u32, default_value = "0")]
        offset: u32,

        /// Erase the covered blocks first, keeping bytes outside the file
        #[arg(long)]
        erase: bool,
    },

    /// Erase a range, or the whole chip
    Erase {
        /// Start address (hex or decimal)
        #[arg(long, value_parser = parse_hex_u32, default_value = "0")]
        offset: u32,

        /// Bytes to erase; defaults to the rest of the device
        #[arg(long, value_parser = parse_hex_u32)]
        length: Option<u32>,
    },

    /// Set the Quad Enable bit and show the status registers
    QuadEnable,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_parse_hex_u32() {
        assert_eq!(parse_hex_u32("0x1000"), Ok(0x1000));
        assert_eq!(parse_hex_u32("0XFF"), Ok(0xFF));
        assert_eq!(parse_hex_u32("4096"), Ok(4096));
        assert!(parse_hex_u32("0xZZ").is_err());
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_erase_args() {
        let cli = Cli::parse_from(["spinor", "-vv", "erase", "--offset", "0x10000", "--length", "0x2000"]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Erase { offset, length } => {
                assert_eq!(offset, 0x10000);
                assert_eq!(length, Some(0x2000));
            }
            _ => panic!("expected erase"),
        }
    }
}
