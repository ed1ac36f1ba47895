//! Error types for spinor-core
//!
//! The core never interprets failures of the transport: they are carried
//! verbatim in [`Error::Transport`]. Everything else is a condition the core
//! detected itself.

use core::fmt;

use crate::erase::NoErasePossible;
use crate::protocol::JedecId;
use crate::sfdp::QerType;

/// Malformed or truncated SFDP data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Basic Flash Parameter table shorter than the 9 mandatory DWORDs
    TableTooShort {
        /// Number of DWORDs available
        dwords: usize,
    },
    /// Density DWORD decodes to zero or does not fit a 32-bit address space
    InvalidDensity(u32),
    /// No parameter header with the Basic Flash Parameter id
    MissingBasicTable,
    /// SFDP major revision other than 1
    UnsupportedRevision {
        /// Major revision found
        major: u8,
        /// Minor revision found
        minor: u8,
    },
    /// Raw table bytes are not a whole number of DWORDs
    MisalignedTable {
        /// Length of the table in bytes
        len: usize,
    },
}

/// Core error type, generic over the transport error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error<E> {
    /// The transport failed to carry out a transaction
    Transport(E),
    /// SFDP header signature is not "SFDP"
    InvalidMagic(u32),
    /// Part answered RDID with another ID than the configured one
    JedecIdMismatch {
        /// Configured ID
        expected: JedecId,
        /// ID read from the part
        found: JedecId,
    },
    /// SFDP table could not be decoded
    Decode(DecodeError),
    /// No supported erase type is aligned at the offset and fits the range
    NoErasePossible {
        /// Offset the planner was asked about
        offset: u32,
        /// Bytes still to erase
        remaining: u32,
    },
    /// Erase offset or length not aligned to the smallest erase granularity
    MisalignedErase {
        /// Requested offset
        offset: u32,
        /// Requested length
        len: u32,
        /// Smallest supported erase size
        granularity: u32,
    },
    /// Write-Enable-Latch did not read back as set
    WriteEnableTimeout,
    /// Write-In-Progress still set after the configured number of polls
    BusyTimeout,
    /// Access outside the device
    AddressOutOfRange {
        /// Requested offset
        offset: u32,
        /// Requested length
        len: u64,
        /// Device size in bytes
        size: u32,
    },
    /// Quad-Enable requirement value has no known handling
    UnsupportedQerType(QerType),
    /// Quad-Enable bit did not read back as set after being written
    QeVerificationFailed {
        /// Status register number (1-3)
        register: u8,
        /// Value read back
        value: u8,
    },
    /// Requested addressing mode cannot be reached on this part
    AddressModeUnavailable,
    /// Configuration asks for something the discovered part cannot do
    UnsupportedConfig(&'static str),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TableTooShort { dwords } => {
                write!(f, "basic flash parameter table too short ({} DWORDs)", dwords)
            }
            Self::InvalidDensity(dword) => write!(f, "invalid density DWORD 0x{:08X}", dword),
            Self::MissingBasicTable => write!(f, "no basic flash parameter table"),
            Self::UnsupportedRevision { major, minor } => {
                write!(f, "SFDP revision {}.{} not supported", major, minor)
            }
            Self::MisalignedTable { len } => {
                write!(f, "parameter table length {} is not a multiple of 4", len)
            }
        }
    }
}

impl<E: fmt::Display> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "transport error: {}", e),
            Self::InvalidMagic(magic) => write!(f, "invalid SFDP signature 0x{:08X}", magic),
            Self::JedecIdMismatch { expected, found } => {
                write!(f, "JEDEC ID {} does not match expected {}", found, expected)
            }
            Self::Decode(e) => write!(f, "SFDP decode error: {}", e),
            Self::NoErasePossible { offset, remaining } => write!(
                f,
                "no erase type fits 0x{:X} bytes at 0x{:08X}",
                remaining, offset
            ),
            Self::MisalignedErase {
                offset,
                len,
                granularity,
            } => write!(
                f,
                "erase of 0x{:X} bytes at 0x{:08X} not aligned to 0x{:X}",
                len, offset, granularity
            ),
            Self::WriteEnableTimeout => write!(f, "write enable latch not set"),
            Self::BusyTimeout => write!(f, "flash still busy after polling limit"),
            Self::AddressOutOfRange { offset, len, size } => write!(
                f,
                "range 0x{:08X}+0x{:X} outside device of 0x{:X} bytes",
                offset, len, size
            ),
            Self::UnsupportedQerType(qer) => write!(f, "unsupported quad enable type {:?}", qer),
            Self::QeVerificationFailed { register, value } => write!(
                f,
                "quad enable bit not set in SR{} (read 0x{:02X})",
                register, value
            ),
            Self::AddressModeUnavailable => write!(f, "required address mode unavailable"),
            Self::UnsupportedConfig(what) => write!(f, "unsupported configuration: {}", what),
        }
    }
}

impl<E> From<DecodeError> for Error<E> {
    fn from(e: DecodeError) -> Self {
        Self::Decode(e)
    }
}

impl<E> From<NoErasePossible> for Error<E> {
    fn from(e: NoErasePossible) -> Self {
        Self::NoErasePossible {
            offset: e.offset,
            remaining: e.remaining,
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for DecodeError {}

#[cfg(feature = "std")]
impl<E: fmt::Debug + fmt::Display> std::error::Error for Error<E> {}

/// Result type alias using the core Error type
pub type Result<T, E> = core::result::Result<T, Error<E>>;
