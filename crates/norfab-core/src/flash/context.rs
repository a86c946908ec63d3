//! Flash context - configuration state for region operations

use crate::error::Result;
use crate::geometry::FlashGeometry;
use crate::layout::{BankMap, FlashBank};

/// Configuration for one flash device
///
/// Holds the validated geometry and the bank map every operation resolves
/// addresses against. Built once during bring-up and shared by reference.
#[derive(Debug, Clone)]
pub struct RegionContext {
    /// Device geometry constants
    pub geometry: FlashGeometry,
    /// Physical bank sub-ranges
    pub banks: BankMap,
}

impl RegionContext {
    /// Create a context, validating the geometry
    pub fn new(geometry: FlashGeometry, banks: BankMap) -> Result<Self> {
        geometry.validate()?;
        Ok(Self { geometry, banks })
    }

    /// Build a context from a TOML board description string
    #[cfg(feature = "std")]
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let (geometry, banks) = crate::layout::parse_layout_str(content)?;
        Self::new(geometry, banks)
    }

    /// Build a context from a TOML board description file
    #[cfg(feature = "std")]
    pub fn from_toml_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let (geometry, banks) = crate::layout::read_layout_file(path)?;
        Self::new(geometry, banks)
    }

    /// Resolve the bank containing the whole range `[addr, addr + len)`
    pub fn bank_for_range(&self, addr: u32, len: u32) -> Result<&FlashBank> {
        self.banks.bank_for_range(addr, len)
    }
}
