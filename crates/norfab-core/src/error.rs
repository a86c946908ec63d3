//! Error types for norfab-core
//!
//! This module provides a no_std compatible error type that can be used
//! throughout the crate.
//!
//! Failures fall into three groups. Configuration errors (an address outside
//! every known flash bank, a misaligned unit address, bad geometry) indicate a
//! logic defect in the caller and are never retried. Hardware errors (a busy
//! flag that never clears, an erase verify that keeps reporting errors) leave
//! the addressed flash in an unspecified state. Zero-length requests are
//! rejected rather than treated as no-ops so a caller bug cannot pass silently.

use core::fmt;

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Configuration errors
    /// Address is outside every configured flash bank
    AddressOutOfBank {
        /// The offending address
        addr: u32,
    },
    /// A range starts in one flash bank and ends in another
    RangeCrossesBanks {
        /// Start address of the range
        addr: u32,
    },
    /// Page operation on an address that is not page-aligned
    MisalignedPage {
        /// The offending address
        addr: u32,
    },
    /// Sector operation on an address that is not sector-aligned
    MisalignedSector {
        /// The offending address
        addr: u32,
    },
    /// Geometry constants are not powers of two, not ordered
    /// `sector >= wordline >= page`, or exceed supported limits
    InvalidGeometry,
    /// Bank map is empty or contains overlapping banks
    InvalidBankMap,

    // Degenerate input
    /// Zero-length request (no defined semantics for empty ranges)
    ZeroLength,
    /// Provided buffer does not match the length the operation requires
    BufferSizeMismatch,

    // Hardware errors
    /// Busy-wait on a hardware completion flag timed out
    HardwareTimeout,
    /// Flash still reports erase-verify errors after an erase
    EraseVerifyFailed {
        /// Address of the first unit that failed verification
        addr: u32,
    },
    /// Page or burst program failed
    ProgramFailed {
        /// Address of the failed program operation
        addr: u32,
    },
    /// Bus read faulted (e.g. uncorrectable ECC error)
    ReadFaulted {
        /// Address of the failed read
        addr: u32,
    },
    /// Driver does not implement the requested capability
    UnsupportedOperation,

    // Layout file errors
    /// Board layout file could not be parsed
    LayoutParse,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddressOutOfBank { addr } => {
                write!(f, "address 0x{:08X} outside every flash bank", addr)
            }
            Self::RangeCrossesBanks { addr } => {
                write!(f, "range at 0x{:08X} crosses a flash bank boundary", addr)
            }
            Self::MisalignedPage { addr } => {
                write!(f, "address 0x{:08X} is not page-aligned", addr)
            }
            Self::MisalignedSector { addr } => {
                write!(f, "address 0x{:08X} is not sector-aligned", addr)
            }
            Self::InvalidGeometry => write!(f, "invalid flash geometry"),
            Self::InvalidBankMap => write!(f, "invalid flash bank map"),
            Self::ZeroLength => write!(f, "zero-length request"),
            Self::BufferSizeMismatch => write!(f, "buffer size mismatch"),
            Self::HardwareTimeout => write!(f, "hardware busy-wait timed out"),
            Self::EraseVerifyFailed { addr } => {
                write!(f, "erase verify failed at 0x{:08X}", addr)
            }
            Self::ProgramFailed { addr } => {
                write!(f, "program operation failed at 0x{:08X}", addr)
            }
            Self::ReadFaulted { addr } => write!(f, "bus read faulted at 0x{:08X}", addr),
            Self::UnsupportedOperation => write!(f, "operation not supported by driver"),
            Self::LayoutParse => write!(f, "board layout file could not be parsed"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
