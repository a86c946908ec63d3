//! norfab-core - NOR flash region manager for firmware update agents
//!
//! This crate reconciles arbitrary byte-range write/erase/read requests with
//! the physical constraints of NOR-class flash: programming is page-granular
//! and only legal on erased pages, erasing is sector-granular, and reading an
//! erased page over the bus can raise an uncorrectable-error trap. The
//! register-level IAP sequencing is injected through the [`driver::FlashDriver`]
//! trait; everything above it is portable.
//!
//! # Features
//!
//! - `std` - Enable standard library support (includes `alloc` and the TOML
//!   board-layout loader)
//! - `alloc` - Enable heap allocation (required for the sector cache)
//!
//! # Example
//!
//! ```ignore
//! use norfab_core::flash::{self, RegionContext};
//! use norfab_core::rmw::SectorCache;
//!
//! fn update<D: norfab_core::driver::FlashDriver>(
//!     driver: &mut D,
//!     ctx: &RegionContext,
//!     image: &[u8],
//! ) -> norfab_core::Result<()> {
//!     let mut cache = SectorCache::new(&ctx.geometry);
//!     flash::unlock(driver)?;
//!     let result = flash::write(driver, ctx, &mut cache, 0xA004_0000, image);
//!     flash::lock(driver)?;
//!     result
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod classify;
pub mod driver;
pub mod error;
pub mod flash;
pub mod geometry;
pub mod layout;
pub mod program;
#[cfg(feature = "alloc")]
pub mod rmw;

pub use error::{Error, Result};
