//! Erase-state classification
//!
//! Flash cells have no cheap software-visible "erased" bit; the only safe way
//! to learn whether a unit is erased is the hardware erase-verify operation.
//! The classifier always asks the cheapest question that covers the span:
//! sector verify for anything wider than a wordline, wordline verify for
//! anything wider than a page, page verify otherwise.

use crate::driver::{FlashDriver, VerifyGranularity};
use crate::error::{Error, Result};
use crate::geometry::FlashGeometry;
use crate::layout::BankKind;

/// Check whether the unit covering `[addr, addr + len)` is erased
///
/// The address is aligned down to the chosen granularity before the driver
/// verify runs, so the answer covers the whole containing unit, not just the
/// queried span. `len == 0` has no defined semantics and is rejected.
pub fn is_erased<D: FlashDriver + ?Sized>(
    driver: &mut D,
    geometry: &FlashGeometry,
    bank: BankKind,
    addr: u32,
    len: u32,
) -> Result<bool> {
    if len == 0 {
        return Err(Error::ZeroLength);
    }

    let (granularity, base) = if len > geometry.wordline_len {
        (VerifyGranularity::Sector, geometry.sector_base(addr))
    } else if len > geometry.page_len {
        (VerifyGranularity::Wordline, geometry.wordline_base(addr))
    } else {
        (VerifyGranularity::Page, geometry.page_base(addr))
    };

    driver.erase_verify(bank, granularity, base)
}

/// Check whether every page touched by `[addr, addr + len)` is erased
///
/// This is the write fast-path question: direct programming is only legal
/// when the whole touched span is erased.
pub fn span_fully_erased<D: FlashDriver + ?Sized>(
    driver: &mut D,
    geometry: &FlashGeometry,
    bank: BankKind,
    addr: u32,
    len: u32,
) -> Result<bool> {
    if len == 0 {
        return Err(Error::ZeroLength);
    }

    for page in geometry.pages_in(addr, len) {
        if !is_erased(driver, geometry, bank, page, geometry.page_len)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Check whether any page touched by `[addr, addr + len)` is erased
///
/// Distinct from [`span_fully_erased`]: a single erased page in a span of
/// programmed pages already makes direct programming into the span
/// meaningful.
pub fn contains_erased_page<D: FlashDriver + ?Sized>(
    driver: &mut D,
    geometry: &FlashGeometry,
    bank: BankKind,
    addr: u32,
    len: u32,
) -> Result<bool> {
    if len == 0 {
        return Err(Error::ZeroLength);
    }

    for page in geometry.pages_in(addr, len) {
        if is_erased(driver, geometry, bank, page, geometry.page_len)? {
            return Ok(true);
        }
    }
    Ok(false)
}
