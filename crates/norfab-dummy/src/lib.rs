//! norfab-dummy - In-memory flash driver emulator for testing
//!
//! This crate provides a dummy [`FlashDriver`] that emulates a banked NOR
//! flash device in memory. It tracks per-page programmed state so that
//! erase-verify answers are accurate and, like the real hardware, it faults
//! bus reads that touch erased cells. Every driver call is counted, which
//! lets tests assert not just on the resulting contents but on how the
//! region manager got there (no erase on the direct path, no bus read of an
//! erased page, one window toggle per bulk erase).

use norfab_core::driver::{DriverFeatures, FlashDriver, VerifyGranularity};
use norfab_core::error::{Error, Result};
use norfab_core::geometry::FlashGeometry;
use norfab_core::layout::{BankKind, BankMap, FlashBank};

/// Configuration for the dummy flash
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Device geometry
    pub geometry: FlashGeometry,
    /// Banks the device exposes
    pub banks: Vec<FlashBank>,
    /// Bytes per burst program, 0 to disable burst support
    pub burst_len: u32,
    /// Fault bus reads that touch erased cells (models the ECC trap)
    pub trap_on_erased_read: bool,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            // AURIX-style program flash geometry
            geometry: FlashGeometry::new(32, 512, 16 * 1024, 0xFF).unwrap(),
            banks: vec![
                FlashBank::new(BankKind::Program0, 0xA000_0000, 0xA007_FFFF),
                FlashBank::new(BankKind::Data, 0xAF00_0000, 0xAF01_FFFF),
            ],
            burst_len: 256,
            trap_on_erased_read: true,
        }
    }
}

/// Counts of driver calls issued by the layer above
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpCounters {
    /// Hardware erase-verify operations
    pub verifies: u32,
    /// Single-page programs
    pub programs: u32,
    /// Burst programs
    pub bursts: u32,
    /// Bulk sector erase commands (not sectors erased)
    pub erases: u32,
    /// Bus reads actually issued
    pub bus_reads: u32,
    /// Protection-window opens
    pub window_opens: u32,
    /// Board-level unlock calls
    pub unlocks: u32,
    /// Board-level lock calls
    pub locks: u32,
}

/// Per-bank emulated storage
#[derive(Debug, Clone)]
struct BankState {
    bank: FlashBank,
    mem: Vec<u8>,
    /// One flag per page; programming sets it, erasing clears it
    programmed: Vec<bool>,
}

/// Dummy flash driver
///
/// Emulates a banked flash device in memory for testing purposes.
pub struct DummyFlash {
    config: DummyConfig,
    banks: Vec<BankState>,
    counters: OpCounters,
    window_open: bool,
    verify_stuck: bool,
}

impl DummyFlash {
    /// Create a new dummy flash with the given configuration, fully erased
    pub fn new(config: DummyConfig) -> Self {
        let page_len = config.geometry.page_len;
        let banks = config
            .banks
            .iter()
            .map(|bank| BankState {
                bank: *bank,
                mem: vec![config.geometry.erased_byte; bank.size() as usize],
                programmed: vec![false; (bank.size() / page_len) as usize],
            })
            .collect();
        Self {
            config,
            banks,
            counters: OpCounters::default(),
            window_open: false,
            verify_stuck: false,
        }
    }

    /// Create a dummy flash with the default configuration
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// The configuration this device was built with
    pub fn config(&self) -> &DummyConfig {
        &self.config
    }

    /// A bank map matching the configured banks
    pub fn bank_map(&self) -> BankMap {
        BankMap::from_banks(&self.config.banks).unwrap()
    }

    /// Driver call counters so far
    pub fn counters(&self) -> OpCounters {
        self.counters
    }

    /// Reset the call counters
    pub fn reset_counters(&mut self) {
        self.counters = OpCounters::default();
    }

    /// Make every subsequent erase-verify report errors, modelling a sector
    /// that no longer erases
    pub fn set_verify_stuck(&mut self, stuck: bool) {
        self.verify_stuck = stuck;
    }

    /// Raw view of a bank's memory, erased cells included
    pub fn bank_mem(&self, kind: BankKind) -> Option<&[u8]> {
        self.banks
            .iter()
            .find(|s| s.bank.kind == kind)
            .map(|s| &s.mem[..])
    }

    /// Program contents out-of-band, marking the touched pages programmed
    ///
    /// Models a device that already holds an image, without going through
    /// the driver interface.
    pub fn preload(&mut self, addr: u32, data: &[u8]) {
        let page_len = self.config.geometry.page_len;
        let state = self.state_for(addr).expect("preload outside banks");
        let off = (addr - state.bank.start) as usize;
        state.mem[off..off + data.len()].copy_from_slice(data);
        let first = off as u32 / page_len;
        let last = (off as u32 + data.len() as u32 - 1) / page_len;
        for page in first..=last {
            state.programmed[page as usize] = true;
        }
    }

    fn state_for(&mut self, addr: u32) -> Result<&mut BankState> {
        self.banks
            .iter_mut()
            .find(|s| s.bank.contains(addr))
            .ok_or(Error::AddressOutOfBank { addr })
    }

    /// Page index range within a bank covering `[off, off + len)`
    fn page_span(page_len: u32, off: u32, len: u32) -> (u32, u32) {
        let first = off / page_len;
        let last = (off + len - 1) / page_len;
        (first, last)
    }
}

impl FlashDriver for DummyFlash {
    fn features(&self) -> DriverFeatures {
        if self.config.burst_len > 0 {
            DriverFeatures::BURST
        } else {
            DriverFeatures::empty()
        }
    }

    fn burst_len(&self) -> u32 {
        self.config.burst_len
    }

    fn erase_verify(
        &mut self,
        _bank: BankKind,
        granularity: VerifyGranularity,
        addr: u32,
    ) -> Result<bool> {
        self.counters.verifies += 1;
        if self.verify_stuck {
            return Ok(false);
        }
        let geometry = self.config.geometry;
        let unit = match granularity {
            VerifyGranularity::Page => geometry.page_len,
            VerifyGranularity::Wordline => geometry.wordline_len,
            VerifyGranularity::Sector => geometry.sector_len,
        };
        let state = self.state_for(addr)?;
        let off = addr - state.bank.start;
        let (first, last) = Self::page_span(geometry.page_len, off, unit);
        Ok((first..=last).all(|p| !state.programmed[p as usize]))
    }

    fn program_page(&mut self, _bank: BankKind, addr: u32, data: &[u8]) -> Result<()> {
        if !self.window_open {
            return Err(Error::ProgramFailed { addr });
        }
        let geometry = self.config.geometry;
        if !geometry.page_aligned(addr) || data.len() != geometry.page_len as usize {
            return Err(Error::ProgramFailed { addr });
        }
        self.counters.programs += 1;
        let state = self.state_for(addr)?;
        let off = (addr - state.bank.start) as usize;
        if off + data.len() > state.mem.len() {
            return Err(Error::AddressOutOfBank { addr });
        }
        state.programmed[off / geometry.page_len as usize] = true;
        // NOR programming only clears bits
        for (i, b) in data.iter().enumerate() {
            state.mem[off + i] &= b;
        }
        Ok(())
    }

    fn program_burst(&mut self, _bank: BankKind, addr: u32, data: &[u8]) -> Result<()> {
        if self.config.burst_len == 0 {
            return Err(Error::UnsupportedOperation);
        }
        if !self.window_open || data.len() != self.config.burst_len as usize {
            return Err(Error::ProgramFailed { addr });
        }
        self.counters.bursts += 1;
        let page_len = self.config.geometry.page_len;
        let state = self.state_for(addr)?;
        let off = (addr - state.bank.start) as usize;
        if off + data.len() > state.mem.len() {
            return Err(Error::AddressOutOfBank { addr });
        }
        let (first, last) = Self::page_span(page_len, off as u32, data.len() as u32);
        for page in first..=last {
            state.programmed[page as usize] = true;
        }
        for (i, b) in data.iter().enumerate() {
            state.mem[off + i] &= b;
        }
        Ok(())
    }

    fn erase_sectors(&mut self, _bank: BankKind, addr: u32, count: u32) -> Result<()> {
        if !self.window_open {
            return Err(Error::ProgramFailed { addr });
        }
        let geometry = self.config.geometry;
        if !geometry.sector_aligned(addr) {
            return Err(Error::MisalignedSector { addr });
        }
        self.counters.erases += 1;
        log::trace!("dummy: erase {} sector(s) at 0x{:08X}", count, addr);
        let erased_byte = geometry.erased_byte;
        let state = self.state_for(addr)?;
        let off = (addr - state.bank.start) as usize;
        let len = (count * geometry.sector_len) as usize;
        if off + len > state.mem.len() {
            return Err(Error::AddressOutOfBank { addr });
        }
        state.mem[off..off + len].fill(erased_byte);
        let first = off as u32 / geometry.page_len;
        let last = first + (len as u32 / geometry.page_len) - 1;
        for page in first..=last {
            state.programmed[page as usize] = false;
        }
        Ok(())
    }

    fn read(&mut self, _bank: BankKind, addr: u32, buf: &mut [u8]) -> Result<()> {
        let geometry = self.config.geometry;
        let trap = self.config.trap_on_erased_read;
        let state = self.state_for(addr)?;
        let off = (addr - state.bank.start) as usize;
        if off + buf.len() > state.mem.len() {
            return Err(Error::AddressOutOfBank { addr });
        }
        let (first, last) = Self::page_span(geometry.page_len, off as u32, buf.len() as u32);
        if trap && (first..=last).any(|p| !state.programmed[p as usize]) {
            // uncorrectable-error trap on erased cells
            return Err(Error::ReadFaulted { addr });
        }
        buf.copy_from_slice(&state.mem[off..off + buf.len()]);
        self.counters.bus_reads += 1;
        Ok(())
    }

    fn window_open(&mut self) -> Result<()> {
        self.window_open = true;
        self.counters.window_opens += 1;
        Ok(())
    }

    fn window_close(&mut self) {
        self.window_open = false;
    }

    fn unlock(&mut self) -> Result<()> {
        self.counters.unlocks += 1;
        Ok(())
    }

    fn lock(&mut self) -> Result<()> {
        self.counters.locks += 1;
        Ok(())
    }
}
