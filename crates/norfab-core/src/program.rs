//! Page programming
//!
//! Programming is only legal on erased pages; programming a non-erased bit
//! silently corrupts data or trips ECC on the next read. The functions here
//! enforce alignment and buffer-size preconditions loudly, hold the
//! protection window open for the tightest possible scope around each
//! destructive driver call, and leave the erased-precondition check to the
//! classifier.

use crate::driver::{DriverFeatures, FlashDriver, ProgramWindow};
use crate::error::{Error, Result};
use crate::geometry::{FlashGeometry, MAX_PAGE_LEN};
use crate::layout::BankKind;

/// Staging buffer for one erased-value-padded page
pub(crate) type PageBuf = heapless::Vec<u8, MAX_PAGE_LEN>;

/// Program exactly one page
///
/// `addr` must be page-aligned and `data` exactly one page long; either
/// violation is a configuration error, never passed through to hardware
/// where it would misbehave silently. The page must already be erased.
pub fn program_page<D: FlashDriver + ?Sized>(
    driver: &mut D,
    geometry: &FlashGeometry,
    bank: BankKind,
    addr: u32,
    data: &[u8],
) -> Result<()> {
    if !geometry.page_aligned(addr) {
        return Err(Error::MisalignedPage { addr });
    }
    if data.len() != geometry.page_len as usize {
        return Err(Error::BufferSizeMismatch);
    }

    let mut window = ProgramWindow::open(driver)?;
    window.driver().program_page(bank, addr, data)
}

/// Program unaligned bytes into erased flash
///
/// Splits `data` into page-sized chunks, padding the partial head and tail
/// pages with the erased byte value so the pad programs as a no-op on the
/// erased cells around the payload. The whole touched span must be erased.
pub fn program_direct<D: FlashDriver + ?Sized>(
    driver: &mut D,
    geometry: &FlashGeometry,
    bank: BankKind,
    addr: u32,
    data: &[u8],
) -> Result<()> {
    if data.is_empty() {
        return Err(Error::ZeroLength);
    }

    let page_len = geometry.page_len as usize;
    let mut page_addr = geometry.page_base(addr);
    let mut offset = (addr - page_addr) as usize;
    let mut remaining = data;

    while !remaining.is_empty() {
        let take = core::cmp::min(page_len - offset, remaining.len());

        let mut page = PageBuf::new();
        // capacity is checked by geometry validation
        page.resize(page_len, geometry.erased_byte)
            .map_err(|_| Error::InvalidGeometry)?;
        page[offset..offset + take].copy_from_slice(&remaining[..take]);

        program_page(driver, geometry, bank, page_addr, &page)?;

        remaining = &remaining[take..];
        page_addr += geometry.page_len;
        offset = 0;
    }

    Ok(())
}

/// Program a page-aligned, page-multiple span from `data`
///
/// Used by the sector write-back path. Prefers the driver's burst primitive
/// when advertised and applicable, one protection-window toggle per burst;
/// falls back to single-page programs otherwise.
pub(crate) fn program_span<D: FlashDriver + ?Sized>(
    driver: &mut D,
    geometry: &FlashGeometry,
    bank: BankKind,
    addr: u32,
    data: &[u8],
) -> Result<()> {
    if !geometry.page_aligned(addr) {
        return Err(Error::MisalignedPage { addr });
    }
    if data.is_empty() || data.len() % geometry.page_len as usize != 0 {
        return Err(Error::BufferSizeMismatch);
    }

    let burst = burst_step(driver, geometry, addr, data.len());
    if let Some(step) = burst {
        log::trace!(
            "write-back at 0x{:08X}: {} bytes in bursts of {}",
            addr,
            data.len(),
            step
        );
        let mut current = addr;
        for chunk in data.chunks(step as usize) {
            let mut window = ProgramWindow::open(driver)?;
            window.driver().program_burst(bank, current, chunk)?;
            current += step;
        }
    } else {
        log::trace!(
            "write-back at 0x{:08X}: {} bytes page by page",
            addr,
            data.len()
        );
        let mut current = addr;
        for chunk in data.chunks(geometry.page_len as usize) {
            program_page(driver, geometry, bank, current, chunk)?;
            current += geometry.page_len;
        }
    }

    Ok(())
}

/// Burst size to use for a span, or `None` when bursts do not apply
///
/// Bursts are only used when the driver advertises them, the burst length is
/// a page multiple, and both the span start and length are burst multiples.
fn burst_step<D: FlashDriver + ?Sized>(
    driver: &D,
    geometry: &FlashGeometry,
    addr: u32,
    len: usize,
) -> Option<u32> {
    if !driver.features().contains(DriverFeatures::BURST) {
        return None;
    }
    let burst = driver.burst_len();
    if burst == 0
        || burst % geometry.page_len != 0
        || addr % burst != 0
        || len % burst as usize != 0
    {
        return None;
    }
    Some(burst)
}
