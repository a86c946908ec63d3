//! Flash bank layout
//!
//! A device's address space holds disjoint sub-ranges with different physical
//! characteristics: a data flash bank and up to two program flash banks.
//! Every operation resolves the bank containing its address before calling
//! into the driver; an address outside every bank is a configuration error.

#[cfg(feature = "std")]
mod toml;

#[cfg(feature = "std")]
pub use toml::{parse_layout_str, read_layout_file};

use crate::error::{Error, Result};

/// Maximum number of banks a map can hold
pub const MAX_BANKS: usize = 8;

/// Physical flash bank classification, passed through to the driver so it can
/// select the right command set for the address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "std", serde(rename_all = "lowercase"))]
pub enum BankKind {
    /// Data flash (small-page EEPROM-style bank)
    Data,
    /// Program flash bank 0
    Program0,
    /// Program flash bank 1
    Program1,
}

/// One contiguous flash bank
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub struct FlashBank {
    /// Which physical bank this range belongs to
    pub kind: BankKind,
    /// Start address (inclusive)
    pub start: u32,
    /// End address (inclusive)
    pub end: u32,
}

impl FlashBank {
    /// Create a new bank
    pub fn new(kind: BankKind, start: u32, end: u32) -> Self {
        Self { kind, start, end }
    }

    /// Size of this bank in bytes
    pub fn size(&self) -> u32 {
        self.end - self.start + 1
    }

    /// Check if an address is within this bank
    pub fn contains(&self, addr: u32) -> bool {
        addr >= self.start && addr <= self.end
    }

    /// Check if this bank overlaps with another
    pub fn overlaps(&self, other: &FlashBank) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

/// The set of banks a device exposes
#[derive(Debug, Clone, Default)]
pub struct BankMap {
    banks: heapless::Vec<FlashBank, MAX_BANKS>,
}

impl BankMap {
    /// Create an empty bank map
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a bank, rejecting overlaps with banks already in the map
    pub fn add_bank(&mut self, bank: FlashBank) -> Result<()> {
        if bank.end < bank.start || self.banks.iter().any(|b| b.overlaps(&bank)) {
            return Err(Error::InvalidBankMap);
        }
        self.banks.push(bank).map_err(|_| Error::InvalidBankMap)
    }

    /// Build a map from a slice of banks
    pub fn from_banks(banks: &[FlashBank]) -> Result<Self> {
        let mut map = Self::new();
        for bank in banks {
            map.add_bank(*bank)?;
        }
        if map.banks.is_empty() {
            return Err(Error::InvalidBankMap);
        }
        Ok(map)
    }

    /// All banks in the map
    pub fn banks(&self) -> &[FlashBank] {
        &self.banks
    }

    /// Resolve the bank containing `addr`
    ///
    /// An address outside every bank is a caller logic defect, not a
    /// recoverable condition.
    pub fn bank_for(&self, addr: u32) -> Result<&FlashBank> {
        self.banks
            .iter()
            .find(|b| b.contains(addr))
            .ok_or(Error::AddressOutOfBank { addr })
    }

    /// Resolve the bank containing the whole range `[addr, addr + len)`
    ///
    /// `len` must be non-zero. A range that starts in one bank and ends in
    /// another (or runs off the end of its bank) is rejected.
    pub fn bank_for_range(&self, addr: u32, len: u32) -> Result<&FlashBank> {
        let bank = self.bank_for(addr)?;
        let end = addr
            .checked_add(len - 1)
            .ok_or(Error::AddressOutOfBank { addr })?;
        if !bank.contains(end) {
            return Err(Error::RangeCrossesBanks { addr });
        }
        Ok(bank)
    }
}
