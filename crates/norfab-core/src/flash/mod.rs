//! Flash region manager - public write/erase/read API

mod context;
mod operations;

pub use context::RegionContext;
pub use operations::{erase, lock, read, unlock};
#[cfg(feature = "alloc")]
pub use operations::write;
