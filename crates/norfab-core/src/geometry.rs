//! Flash geometry constants and unit alignment helpers
//!
//! The three programming/erase units form a strict hierarchy: a page is the
//! smallest programmable unit, a wordline groups pages for erase verification,
//! and a sector is the smallest erasable unit. All three are powers of two
//! with `sector >= wordline >= page`, so aligning an address down to a unit
//! boundary is a single mask operation.

use crate::error::{Error, Result};

/// Largest page length the direct-program staging buffer supports
pub const MAX_PAGE_LEN: usize = 1024;

/// Fixed geometry of one flash device
///
/// Built once at configuration time and never mutated. [`FlashGeometry::validate`]
/// must pass before any operation uses the geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub struct FlashGeometry {
    /// Smallest programmable unit, in bytes
    pub page_len: u32,
    /// Erase-verify granularity between page and sector, in bytes
    pub wordline_len: u32,
    /// Smallest erasable unit, in bytes
    pub sector_len: u32,
    /// Value every byte of an erased unit reads as (typically 0xFF)
    pub erased_byte: u8,
}

impl FlashGeometry {
    /// Create a geometry and validate it
    pub fn new(page_len: u32, wordline_len: u32, sector_len: u32, erased_byte: u8) -> Result<Self> {
        let geometry = Self {
            page_len,
            wordline_len,
            sector_len,
            erased_byte,
        };
        geometry.validate()?;
        Ok(geometry)
    }

    /// Check the power-of-two and ordering invariants
    pub fn validate(&self) -> Result<()> {
        let units = [self.page_len, self.wordline_len, self.sector_len];
        if units.iter().any(|u| *u == 0 || !u.is_power_of_two()) {
            return Err(Error::InvalidGeometry);
        }
        if !(self.sector_len >= self.wordline_len && self.wordline_len >= self.page_len) {
            return Err(Error::InvalidGeometry);
        }
        if self.page_len as usize > MAX_PAGE_LEN {
            return Err(Error::InvalidGeometry);
        }
        Ok(())
    }

    /// Base address of the page containing `addr`
    #[inline]
    pub fn page_base(&self, addr: u32) -> u32 {
        addr & !(self.page_len - 1)
    }

    /// Base address of the wordline containing `addr`
    #[inline]
    pub fn wordline_base(&self, addr: u32) -> u32 {
        addr & !(self.wordline_len - 1)
    }

    /// Base address of the sector containing `addr`
    #[inline]
    pub fn sector_base(&self, addr: u32) -> u32 {
        addr & !(self.sector_len - 1)
    }

    /// Whether `addr` sits on a page boundary
    #[inline]
    pub fn page_aligned(&self, addr: u32) -> bool {
        addr & (self.page_len - 1) == 0
    }

    /// Whether `addr` sits on a sector boundary
    #[inline]
    pub fn sector_aligned(&self, addr: u32) -> bool {
        addr & (self.sector_len - 1) == 0
    }

    /// Number of pages per sector
    #[inline]
    pub fn pages_per_sector(&self) -> u32 {
        self.sector_len / self.page_len
    }

    /// Sectors needed to cover `len` bytes, rounding any remainder up
    ///
    /// A request that is not a sector multiple still erases the whole
    /// containing sector; exact multiples do not over-erase.
    #[inline]
    pub fn sectors_for_len(&self, len: u32) -> u32 {
        len.div_ceil(self.sector_len)
    }

    /// Iterator over the base addresses of every page touched by
    /// `[addr, addr + len)`. `len` must be non-zero.
    pub fn pages_in(&self, addr: u32, len: u32) -> impl Iterator<Item = u32> {
        let start = self.page_base(addr);
        let end = self.page_base(addr + len - 1);
        let step = self.page_len;
        (start..=end).step_by(step as usize)
    }

    /// Iterator over the base addresses of every sector touched by
    /// `[addr, addr + len)`. `len` must be non-zero.
    pub fn sectors_in(&self, addr: u32, len: u32) -> impl Iterator<Item = u32> {
        let start = self.sector_base(addr);
        let end = self.sector_base(addr + len - 1);
        let step = self.sector_len;
        (start..=end).step_by(step as usize)
    }
}
