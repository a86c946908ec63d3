//! Device driver trait definitions
//!
//! The [`FlashDriver`] trait is the seam between the portable region manager
//! and the register-level IAP sequencing of a concrete flash family. An
//! implementation wraps the vendor primitives (enter-page-mode, load-page,
//! write-page, write-burst, erase-sector, erase-verify, busy-wait) behind the
//! operations below; each one busy-waits for hardware completion before
//! returning. The layer above never touches registers.

use crate::error::{Error, Result};
use crate::layout::BankKind;
use bitflags::bitflags;

bitflags! {
    /// Driver feature flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DriverFeatures: u32 {
        /// Supports burst programming (a hardware-defined run of pages per
        /// protection-window toggle)
        const BURST = 1 << 0;
    }
}

impl Default for DriverFeatures {
    fn default() -> Self {
        DriverFeatures::empty()
    }
}

/// Granularity of a hardware erase-verify operation
///
/// Verification hardware operates at fixed unit sizes; coarser checks are
/// cheaper, so callers pick the coarsest unit that covers the span of
/// interest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VerifyGranularity {
    /// One page
    Page,
    /// One wordline
    Wordline,
    /// One sector
    Sector,
}

/// Flash device driver capability
///
/// All addresses passed in are absolute device addresses already resolved to
/// a bank by the caller; the `bank` tag tells the driver which physical bank
/// command set to use. Destructive operations (`program_page`,
/// `program_burst`, `erase_sectors`) are only called while the caller holds
/// the protection window open via [`ProgramWindow`].
pub trait FlashDriver {
    /// Get the features supported by this driver
    fn features(&self) -> DriverFeatures {
        DriverFeatures::empty()
    }

    /// Bytes programmed per burst operation
    ///
    /// Only meaningful when [`DriverFeatures::BURST`] is advertised. Must be
    /// a power-of-two multiple of the page length.
    fn burst_len(&self) -> u32 {
        0
    }

    /// Run the hardware erase-verify for the unit of `granularity` at the
    /// unit-aligned address `addr`
    ///
    /// Returns `true` when the verify reported zero erase errors. This
    /// clears and re-evaluates a hardware status flag; it is not a pure
    /// observation and costs a busy-wait.
    fn erase_verify(
        &mut self,
        bank: BankKind,
        granularity: VerifyGranularity,
        addr: u32,
    ) -> Result<bool>;

    /// Program one page at the page-aligned address `addr`
    ///
    /// `data` is exactly one page. The page must be erased; the driver does
    /// not check. Busy-waits until the cells are committed.
    fn program_page(&mut self, bank: BankKind, addr: u32, data: &[u8]) -> Result<()>;

    /// Program one burst of [`burst_len`](FlashDriver::burst_len) bytes at
    /// the burst-aligned address `addr`
    ///
    /// Functionally equivalent to repeated single-page programs; exists to
    /// amortize the protection-window cost.
    fn program_burst(&mut self, _bank: BankKind, _addr: u32, _data: &[u8]) -> Result<()> {
        Err(Error::UnsupportedOperation)
    }

    /// Erase `count` sectors starting at the sector-aligned address `addr`,
    /// busy-waiting until the hardware reports completion
    fn erase_sectors(&mut self, bank: BankKind, addr: u32, count: u32) -> Result<()>;

    /// Raw bus read of programmed cells into `buf`
    ///
    /// Reading erased cells through the bus may raise an uncorrectable-error
    /// trap on some flash families; callers must gate every read behind a
    /// successful erase-verify answer of "not erased".
    fn read(&mut self, bank: BankKind, addr: u32, buf: &mut [u8]) -> Result<()>;

    /// Open the hardware protection window (write/erase enable)
    fn window_open(&mut self) -> Result<()>;

    /// Close the hardware protection window
    fn window_close(&mut self);

    /// Board-level write-protect release, called once before a sequence of
    /// write/erase operations. A no-op on parts without one.
    fn unlock(&mut self) -> Result<()> {
        Ok(())
    }

    /// Board-level write-protect restore, paired with
    /// [`unlock`](FlashDriver::unlock)
    fn lock(&mut self) -> Result<()> {
        Ok(())
    }
}

// Blanket impl for boxed drivers to allow trait objects
#[cfg(feature = "alloc")]
impl FlashDriver for alloc::boxed::Box<dyn FlashDriver + Send> {
    fn features(&self) -> DriverFeatures {
        (**self).features()
    }

    fn burst_len(&self) -> u32 {
        (**self).burst_len()
    }

    fn erase_verify(
        &mut self,
        bank: BankKind,
        granularity: VerifyGranularity,
        addr: u32,
    ) -> Result<bool> {
        (**self).erase_verify(bank, granularity, addr)
    }

    fn program_page(&mut self, bank: BankKind, addr: u32, data: &[u8]) -> Result<()> {
        (**self).program_page(bank, addr, data)
    }

    fn program_burst(&mut self, bank: BankKind, addr: u32, data: &[u8]) -> Result<()> {
        (**self).program_burst(bank, addr, data)
    }

    fn erase_sectors(&mut self, bank: BankKind, addr: u32, count: u32) -> Result<()> {
        (**self).erase_sectors(bank, addr, count)
    }

    fn read(&mut self, bank: BankKind, addr: u32, buf: &mut [u8]) -> Result<()> {
        (**self).read(bank, addr, buf)
    }

    fn window_open(&mut self) -> Result<()> {
        (**self).window_open()
    }

    fn window_close(&mut self) {
        (**self).window_close()
    }

    fn unlock(&mut self) -> Result<()> {
        (**self).unlock()
    }

    fn lock(&mut self) -> Result<()> {
        (**self).lock()
    }
}

/// Scoped hold of the hardware protection window
///
/// The window opens on construction and closes when the guard drops, on
/// every exit path. The guard borrows the driver exclusively for its
/// lifetime, so no other flash call can interleave with the destructive
/// register sequence it brackets.
pub struct ProgramWindow<'a, D: FlashDriver + ?Sized> {
    driver: &'a mut D,
}

impl<'a, D: FlashDriver + ?Sized> ProgramWindow<'a, D> {
    /// Open the protection window
    pub fn open(driver: &'a mut D) -> Result<Self> {
        driver.window_open()?;
        Ok(Self { driver })
    }

    /// Access the driver while the window is held open
    pub fn driver(&mut self) -> &mut D {
        self.driver
    }
}

impl<D: FlashDriver + ?Sized> Drop for ProgramWindow<'_, D> {
    fn drop(&mut self) {
        self.driver.window_close();
    }
}
