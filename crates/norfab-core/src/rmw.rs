//! Sector cache and read-modify-write engine
//!
//! Byte-addressable writes over page/sector-granular hardware hinge on this
//! module: when any touched page already holds data, the whole containing
//! sector is staged in RAM, the new bytes are merged in, the sector is
//! erased, and the merged image is programmed back page by page (or burst by
//! burst). The staging step never bus-reads an erased page; the classifier's
//! verified answer is the only safe way to know a read is legal, because
//! reading erased cells can raise an uncorrectable-error trap.

use alloc::vec;
use alloc::vec::Vec;

use crate::classify;
use crate::driver::{FlashDriver, ProgramWindow};
use crate::error::{Error, Result};
use crate::geometry::FlashGeometry;
use crate::layout::BankKind;
use crate::program;

/// One sector-sized RAM staging buffer
///
/// Owned by the caller and lent to [`read_modify_write`](SectorCache::read_modify_write)
/// for the duration of one operation; the exclusive borrow is what guarantees
/// at most one RMW in flight. Contents are undefined between calls and after
/// any failure.
pub struct SectorCache {
    buf: Vec<u8>,
}

impl SectorCache {
    /// Allocate a cache for the given geometry
    pub fn new(geometry: &FlashGeometry) -> Self {
        Self {
            buf: vec![0; geometry.sector_len as usize],
        }
    }

    /// Replace the bytes at `offset` within the sector at `sector_addr`,
    /// preserving every other byte of the sector
    ///
    /// Steps: fill the cache page by page (erased pages synthesized from the
    /// fill value, programmed pages read from flash), merge `new_bytes` at
    /// `offset`, erase the sector, program the cache back in address order.
    /// Any failure leaves the sector indeterminate; there is no multi-step
    /// recovery, matching the device's lack of an atomic multi-page commit.
    pub fn read_modify_write<D: FlashDriver + ?Sized>(
        &mut self,
        driver: &mut D,
        geometry: &FlashGeometry,
        bank: BankKind,
        sector_addr: u32,
        offset: u32,
        new_bytes: &[u8],
    ) -> Result<()> {
        if !geometry.sector_aligned(sector_addr) {
            return Err(Error::MisalignedSector { addr: sector_addr });
        }
        if new_bytes.is_empty() {
            return Err(Error::ZeroLength);
        }
        if offset as usize + new_bytes.len() > geometry.sector_len as usize {
            return Err(Error::BufferSizeMismatch);
        }
        debug_assert_eq!(self.buf.len(), geometry.sector_len as usize);

        log::debug!(
            "rmw: sector 0x{:08X}, {} bytes at offset {}",
            sector_addr,
            new_bytes.len(),
            offset
        );

        self.fill(driver, geometry, bank, sector_addr)?;

        let start = offset as usize;
        self.buf[start..start + new_bytes.len()].copy_from_slice(new_bytes);

        // The on-flash copy dies here; only the merged RAM image survives.
        {
            let mut window = ProgramWindow::open(driver)?;
            window.driver().erase_sectors(bank, sector_addr, 1)?;
        }

        program::program_span(driver, geometry, bank, sector_addr, &self.buf)
    }

    /// Stage the whole sector into the cache
    fn fill<D: FlashDriver + ?Sized>(
        &mut self,
        driver: &mut D,
        geometry: &FlashGeometry,
        bank: BankKind,
        sector_addr: u32,
    ) -> Result<()> {
        let page_len = geometry.page_len as usize;

        for page in geometry.pages_in(sector_addr, geometry.sector_len) {
            let slot_start = (page - sector_addr) as usize;
            let slot = &mut self.buf[slot_start..slot_start + page_len];

            if classify::is_erased(driver, geometry, bank, page, geometry.page_len)? {
                slot.fill(geometry.erased_byte);
            } else {
                driver.read(bank, page, slot)?;
            }
        }

        Ok(())
    }
}
