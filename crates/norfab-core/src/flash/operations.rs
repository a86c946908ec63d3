//! High-level flash operations
//!
//! The public surface of the layer: byte-addressed `write`, sector-granular
//! `erase`, trap-safe `read`, and the `lock`/`unlock` pair bracketing a
//! sequence of destructive calls. Each logical operation runs to completion
//! before returning and either fully applies or leaves the addressed range
//! unspecified; there is no partial-success reporting and no internal retry.

use crate::classify;
use crate::driver::{FlashDriver, ProgramWindow};
use crate::error::{Error, Result};
#[cfg(feature = "alloc")]
use crate::program;
#[cfg(feature = "alloc")]
use crate::rmw::SectorCache;

use super::context::RegionContext;

/// Write `data` at `addr`, at byte granularity
///
/// Picks one of two strategies for the whole request: when every touched
/// page is erased, the payload is programmed directly into place (no erase);
/// otherwise each touched sector goes through one cached
/// read-modify-write cycle, so bytes in the same sectors but outside the
/// request survive. The two paths are never mixed within one call.
#[cfg(feature = "alloc")]
pub fn write<D: FlashDriver + ?Sized>(
    driver: &mut D,
    ctx: &RegionContext,
    cache: &mut SectorCache,
    addr: u32,
    data: &[u8],
) -> Result<()> {
    if data.is_empty() {
        return Err(Error::ZeroLength);
    }

    let len = data.len() as u32;
    let bank = ctx.bank_for_range(addr, len)?.kind;
    let geometry = &ctx.geometry;

    if classify::span_fully_erased(driver, geometry, bank, addr, len)? {
        log::debug!("write 0x{:08X}+{}: direct program path", addr, len);
        return program::program_direct(driver, geometry, bank, addr, data);
    }

    log::debug!("write 0x{:08X}+{}: cached rmw path", addr, len);

    let mut cursor = addr;
    let mut remaining = data;
    for sector in geometry.sectors_in(addr, len) {
        let sector_end = sector + geometry.sector_len;
        let take = core::cmp::min(remaining.len(), (sector_end - cursor) as usize);
        let (chunk, rest) = remaining.split_at(take);

        cache.read_modify_write(driver, geometry, bank, sector, cursor - sector, chunk)?;

        remaining = rest;
        cursor = sector_end;
    }

    Ok(())
}

/// Erase the sectors covering `[addr, addr + len)`
///
/// Erasing is always sector-granular: `addr` is aligned down to its sector
/// and the sector count is `len` divided by the sector length, rounded up,
/// so a sub-sector request erases the whole containing sector. All sectors
/// go to the driver as one bulk erase under a single protection-window
/// toggle, then each is verified erased.
pub fn erase<D: FlashDriver + ?Sized>(
    driver: &mut D,
    ctx: &RegionContext,
    addr: u32,
    len: u32,
) -> Result<()> {
    if len == 0 {
        return Err(Error::ZeroLength);
    }

    let geometry = &ctx.geometry;
    let sector_addr = geometry.sector_base(addr);
    let count = geometry.sectors_for_len(len);
    let span = count * geometry.sector_len;
    let bank = ctx.bank_for_range(sector_addr, span)?.kind;

    log::debug!("erase 0x{:08X}: {} sector(s)", sector_addr, count);

    {
        let mut window = ProgramWindow::open(driver)?;
        window.driver().erase_sectors(bank, sector_addr, count)?;
    }

    // A sector that still reports verify errors after the erase is a
    // hardware fault, not something to retry blind.
    for sector in geometry.sectors_in(sector_addr, span) {
        if !classify::is_erased(driver, geometry, bank, sector, geometry.sector_len)? {
            return Err(Error::EraseVerifyFailed { addr: sector });
        }
    }

    Ok(())
}

/// Read `buf.len()` bytes starting at `addr`
///
/// Pages the classifier reports erased are synthesized from the erased byte
/// value without any bus access; only programmed pages are read through the
/// driver. This mirrors the cache-fill rule and keeps reads of
/// never-programmed flash from trapping.
pub fn read<D: FlashDriver + ?Sized>(
    driver: &mut D,
    ctx: &RegionContext,
    addr: u32,
    buf: &mut [u8],
) -> Result<()> {
    if buf.is_empty() {
        return Err(Error::ZeroLength);
    }

    let len = buf.len() as u32;
    let bank = ctx.bank_for_range(addr, len)?.kind;
    let geometry = &ctx.geometry;

    let mut cursor = addr;
    let mut filled = 0usize;
    for page in geometry.pages_in(addr, len) {
        let page_end = page + geometry.page_len;
        let take = core::cmp::min(buf.len() - filled, (page_end - cursor) as usize);
        let slot = &mut buf[filled..filled + take];

        if classify::is_erased(driver, geometry, bank, page, geometry.page_len)? {
            slot.fill(geometry.erased_byte);
        } else {
            driver.read(bank, cursor, slot)?;
        }

        filled += take;
        cursor = page_end;
    }

    Ok(())
}

/// Release board-level write protection before a write/erase sequence
pub fn unlock<D: FlashDriver + ?Sized>(driver: &mut D) -> Result<()> {
    driver.unlock()
}

/// Restore board-level write protection after a write/erase sequence
pub fn lock<D: FlashDriver + ?Sized>(driver: &mut D) -> Result<()> {
    driver.lock()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(all(test, feature = "alloc"))]
mod tests {
    use super::*;
    use crate::driver::{DriverFeatures, VerifyGranularity};
    use crate::geometry::FlashGeometry;
    use crate::layout::{BankKind, BankMap, FlashBank};
    use alloc::vec;
    use alloc::vec::Vec;

    const PAGE: u32 = 32;
    const WORDLINE: u32 = 64;
    const SECTOR: u32 = 256;
    const SECTORS: u32 = 4;
    const SIZE: u32 = SECTOR * SECTORS;

    /// A mock driver that simulates one program-flash bank
    ///
    /// Tracks per-page programmed state so erase-verify answers are accurate
    /// and so bus reads of erased pages fault the way the real device's ECC
    /// does. Records every operation for assertions.
    struct MockDriver {
        mem: Vec<u8>,
        programmed: Vec<bool>,
        burst_len: u32,
        /// (address, sector count) per bulk erase
        erases: Vec<(u32, u32)>,
        /// bus reads actually issued
        bus_reads: Vec<(u32, usize)>,
        programs: u32,
        bursts: u32,
        window_open: bool,
        window_toggles: u32,
    }

    impl MockDriver {
        fn new() -> Self {
            Self {
                mem: vec![0xFF; SIZE as usize],
                programmed: vec![false; (SIZE / PAGE) as usize],
                burst_len: 0,
                erases: Vec::new(),
                bus_reads: Vec::new(),
                programs: 0,
                bursts: 0,
                window_open: false,
                window_toggles: 0,
            }
        }

        fn with_burst(burst_len: u32) -> Self {
            let mut drv = Self::new();
            drv.burst_len = burst_len;
            drv
        }

        /// Program a whole region out-of-band, marking its pages programmed
        fn preload(&mut self, addr: u32, data: &[u8]) {
            let start = addr as usize;
            self.mem[start..start + data.len()].copy_from_slice(data);
            for page in (addr / PAGE)..((addr + data.len() as u32).div_ceil(PAGE)) {
                self.programmed[page as usize] = true;
            }
        }

        fn pages_erased_in(&self, addr: u32, len: u32) -> bool {
            let first = addr / PAGE;
            let last = (addr + len - 1) / PAGE;
            (first..=last).all(|p| !self.programmed[p as usize])
        }
    }

    impl FlashDriver for MockDriver {
        fn features(&self) -> DriverFeatures {
            if self.burst_len > 0 {
                DriverFeatures::BURST
            } else {
                DriverFeatures::empty()
            }
        }

        fn burst_len(&self) -> u32 {
            self.burst_len
        }

        fn erase_verify(
            &mut self,
            _bank: BankKind,
            granularity: VerifyGranularity,
            addr: u32,
        ) -> Result<bool> {
            let unit = match granularity {
                VerifyGranularity::Page => PAGE,
                VerifyGranularity::Wordline => WORDLINE,
                VerifyGranularity::Sector => SECTOR,
            };
            Ok(self.pages_erased_in(addr, unit))
        }

        fn program_page(&mut self, _bank: BankKind, addr: u32, data: &[u8]) -> Result<()> {
            assert!(self.window_open, "program outside protection window");
            assert_eq!(addr % PAGE, 0);
            assert_eq!(data.len(), PAGE as usize);
            self.programs += 1;
            self.programmed[(addr / PAGE) as usize] = true;
            for (i, b) in data.iter().enumerate() {
                self.mem[addr as usize + i] &= b;
            }
            Ok(())
        }

        fn program_burst(&mut self, _bank: BankKind, addr: u32, data: &[u8]) -> Result<()> {
            assert!(self.window_open, "burst outside protection window");
            assert_eq!(addr % self.burst_len, 0);
            assert_eq!(data.len(), self.burst_len as usize);
            self.bursts += 1;
            for page in (addr / PAGE)..((addr + self.burst_len) / PAGE) {
                self.programmed[page as usize] = true;
            }
            for (i, b) in data.iter().enumerate() {
                self.mem[addr as usize + i] &= b;
            }
            Ok(())
        }

        fn erase_sectors(&mut self, _bank: BankKind, addr: u32, count: u32) -> Result<()> {
            assert!(self.window_open, "erase outside protection window");
            assert_eq!(addr % SECTOR, 0);
            self.erases.push((addr, count));
            let start = addr as usize;
            let end = (addr + count * SECTOR) as usize;
            self.mem[start..end].fill(0xFF);
            for page in (addr / PAGE)..((addr + count * SECTOR) / PAGE) {
                self.programmed[page as usize] = false;
            }
            Ok(())
        }

        fn read(&mut self, _bank: BankKind, addr: u32, buf: &mut [u8]) -> Result<()> {
            let first = addr / PAGE;
            let last = (addr + buf.len() as u32 - 1) / PAGE;
            if (first..=last).any(|p| !self.programmed[p as usize]) {
                // reading erased cells trips ECC
                return Err(Error::ReadFaulted { addr });
            }
            self.bus_reads.push((addr, buf.len()));
            let start = addr as usize;
            buf.copy_from_slice(&self.mem[start..start + buf.len()]);
            Ok(())
        }

        fn window_open(&mut self) -> Result<()> {
            self.window_open = true;
            self.window_toggles += 1;
            Ok(())
        }

        fn window_close(&mut self) {
            self.window_open = false;
        }
    }

    fn context() -> RegionContext {
        let geometry = FlashGeometry::new(PAGE, WORDLINE, SECTOR, 0xFF).unwrap();
        let banks =
            BankMap::from_banks(&[FlashBank::new(BankKind::Program0, 0, SIZE - 1)]).unwrap();
        RegionContext::new(geometry, banks).unwrap()
    }

    fn cache(ctx: &RegionContext) -> SectorCache {
        SectorCache::new(&ctx.geometry)
    }

    #[test]
    fn rmw_scenario_preserves_sector_contents() {
        // already-programmed sector of 0x00; 10 bytes of 0xAA at offset 5
        let ctx = context();
        let mut drv = MockDriver::new();
        drv.preload(0, &[0x00; SECTOR as usize]);
        let mut cache = cache(&ctx);

        write(&mut drv, &ctx, &mut cache, 5, &[0xAA; 10]).unwrap();

        assert_eq!(drv.erases, &[(0, 1)], "non-erased page forces the rmw path");
        assert_eq!(&drv.mem[0..5], &[0x00; 5]);
        assert_eq!(&drv.mem[5..15], &[0xAA; 10]);
        assert!(drv.mem[15..SECTOR as usize].iter().all(|b| *b == 0x00));
    }

    #[test]
    fn direct_path_records_no_erase() {
        // whole containing page erased; a page of 0x11 goes straight in
        let ctx = context();
        let mut drv = MockDriver::new();
        let mut cache = cache(&ctx);

        write(&mut drv, &ctx, &mut cache, 64, &[0x11; PAGE as usize]).unwrap();

        assert!(drv.erases.is_empty());
        assert_eq!(drv.programs, 1);

        let mut back = [0u8; PAGE as usize];
        read(&mut drv, &ctx, 64, &mut back).unwrap();
        assert_eq!(back, [0x11; PAGE as usize]);
    }

    #[test]
    fn page_round_trip() {
        let ctx = context();
        let mut drv = MockDriver::new();
        let mut cache = cache(&ctx);

        let data: Vec<u8> = (0..PAGE as u8).collect();
        write(&mut drv, &ctx, &mut cache, 96, &data).unwrap();

        let mut back = vec![0u8; PAGE as usize];
        read(&mut drv, &ctx, 96, &mut back).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn erased_read_synthesizes_without_bus_access() {
        let ctx = context();
        let mut drv = MockDriver::new();

        let mut buf = vec![0u8; PAGE as usize];
        read(&mut drv, &ctx, 0, &mut buf).unwrap();

        assert_eq!(buf, vec![0xFF; PAGE as usize]);
        assert!(drv.bus_reads.is_empty(), "no bus access to an erased page");
    }

    #[test]
    fn read_mixes_synthesized_and_programmed_pages() {
        let ctx = context();
        let mut drv = MockDriver::new();
        drv.preload(32, &[0x42; PAGE as usize]);

        // span pages 0 (erased), 1 (programmed), 2 (erased), unaligned edges
        let mut buf = vec![0u8; 64];
        read(&mut drv, &ctx, 16, &mut buf).unwrap();

        assert_eq!(&buf[0..16], &[0xFF; 16]);
        assert_eq!(&buf[16..48], &[0x42; 32]);
        assert_eq!(&buf[48..64], &[0xFF; 16]);
        assert_eq!(drv.bus_reads, &[(32, 32)]);
    }

    #[test]
    fn erase_rounds_partial_lengths_up_to_whole_sectors() {
        let ctx = context();
        let mut drv = MockDriver::new();

        erase(&mut drv, &ctx, 0, 1).unwrap();
        assert_eq!(drv.erases, &[(0, 1)]);

        erase(&mut drv, &ctx, 0, SECTOR + 1).unwrap();
        assert_eq!(drv.erases, &[(0, 1), (0, 2)]);

        // exact multiple does not over-erase
        erase(&mut drv, &ctx, 0, 2 * SECTOR).unwrap();
        assert_eq!(drv.erases.last(), Some(&(0, 2)));
    }

    #[test]
    fn erase_aligns_address_down_and_is_idempotent() {
        let ctx = context();
        let mut drv = MockDriver::new();
        drv.preload(SECTOR, &[0x77; SECTOR as usize]);

        erase(&mut drv, &ctx, SECTOR + 17, 1).unwrap();
        assert_eq!(drv.erases, &[(SECTOR, 1)]);
        assert!(drv.pages_erased_in(SECTOR, SECTOR));

        // a second erase of the same sector leaves the same state
        erase(&mut drv, &ctx, SECTOR, SECTOR).unwrap();
        assert!(drv.pages_erased_in(SECTOR, SECTOR));
        let mut buf = vec![0u8; SECTOR as usize];
        read(&mut drv, &ctx, SECTOR, &mut buf).unwrap();
        assert!(buf.iter().all(|b| *b == 0xFF));
    }

    #[test]
    fn erase_uses_one_window_toggle_for_bulk_erase() {
        let ctx = context();
        let mut drv = MockDriver::new();

        erase(&mut drv, &ctx, 0, 3 * SECTOR).unwrap();

        assert_eq!(drv.erases, &[(0, 3)]);
        assert_eq!(drv.window_toggles, 1);
        assert!(!drv.window_open);
    }

    #[test]
    fn write_spanning_sectors_preserves_both_neighbours() {
        let ctx = context();
        let mut drv = MockDriver::new();
        drv.preload(0, &[0x00; 2 * SECTOR as usize]);
        let mut cache = cache(&ctx);

        // 32 bytes straddling the seam between sectors 0 and 1
        let start = SECTOR - 16;
        write(&mut drv, &ctx, &mut cache, start, &[0xBB; 32]).unwrap();

        assert_eq!(drv.erases, &[(0, 1), (SECTOR, 1)]);
        let s = start as usize;
        assert!(drv.mem[..s].iter().all(|b| *b == 0x00));
        assert_eq!(&drv.mem[s..s + 32], &[0xBB; 32]);
        assert!(drv.mem[s + 32..2 * SECTOR as usize]
            .iter()
            .all(|b| *b == 0x00));
    }

    #[test]
    fn burst_capable_driver_writes_back_in_bursts() {
        let ctx = context();
        let mut drv = MockDriver::with_burst(WORDLINE);
        drv.preload(0, &[0x00; SECTOR as usize]);
        let mut cache = cache(&ctx);

        write(&mut drv, &ctx, &mut cache, 5, &[0xAA; 10]).unwrap();

        assert_eq!(drv.bursts, (SECTOR / WORDLINE), "whole sector in bursts");
        assert_eq!(drv.programs, 0);
        assert_eq!(&drv.mem[5..15], &[0xAA; 10]);
    }

    #[test]
    fn zero_length_requests_are_fatal() {
        let ctx = context();
        let mut drv = MockDriver::new();
        let mut cache = cache(&ctx);

        assert_eq!(
            write(&mut drv, &ctx, &mut cache, 0, &[]),
            Err(Error::ZeroLength)
        );
        assert_eq!(erase(&mut drv, &ctx, 0, 0), Err(Error::ZeroLength));
        let mut empty: [u8; 0] = [];
        assert_eq!(read(&mut drv, &ctx, 0, &mut empty), Err(Error::ZeroLength));
    }

    #[test]
    fn out_of_bank_address_is_fatal() {
        let ctx = context();
        let mut drv = MockDriver::new();
        let mut cache = cache(&ctx);

        assert_eq!(
            write(&mut drv, &ctx, &mut cache, SIZE, &[0u8; 4]),
            Err(Error::AddressOutOfBank { addr: SIZE })
        );
        let mut buf = [0u8; 4];
        assert_eq!(
            read(&mut drv, &ctx, SIZE + 4, &mut buf),
            Err(Error::AddressOutOfBank { addr: SIZE + 4 })
        );
    }

    #[test]
    fn write_running_off_the_bank_end_is_fatal() {
        let ctx = context();
        let mut drv = MockDriver::new();
        let mut cache = cache(&ctx);

        assert_eq!(
            write(&mut drv, &ctx, &mut cache, SIZE - 2, &[0u8; 4]),
            Err(Error::RangeCrossesBanks { addr: SIZE - 2 })
        );
        assert!(drv.erases.is_empty());
        assert_eq!(drv.programs, 0);
    }
}
