//! Error types for the command line tool

use std::path::PathBuf;

use spinor_core::DecodeError;
use spinor_dummy::DummyError;
use thiserror::Error;

/// Errors surfaced by `spinor` subcommands
#[derive(Debug, Error)]
pub enum CliError {
    /// File could not be read or written
    #[error("{path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file did not parse
    #[error("invalid configuration {path:?}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// A value in the configuration is out of range
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The requested range does not fit the device
    #[error("range 0x{offset:08X}+0x{len:X} outside device of 0x{size:X} bytes")]
    Range { offset: u32, len: u64, size: u32 },

    /// Read back differs from what was written
    #[error("verify failed at 0x{offset:08X}: expected 0x{expected:02X}, found 0x{found:02X}")]
    Verify { offset: u32, expected: u8, found: u8 },

    /// Discovery or a flash operation failed
    #[error(transparent)]
    Flash(#[from] spinor_core::Error<DummyError>),

    /// A parameter table did not decode
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl CliError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
