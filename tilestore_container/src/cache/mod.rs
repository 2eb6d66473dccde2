//! The shared tile cache and its entries.

mod entry;
mod tile_cache;

pub use entry::*;
pub use tile_cache::*;
