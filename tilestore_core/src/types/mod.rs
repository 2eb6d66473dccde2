//! Value types shared by all tilestore crates.

mod blob;
mod byte_range;
mod byte_size;
mod loading_policy;
mod rect;
mod tile_level;

pub use blob::*;
pub use byte_range::*;
pub use byte_size::*;
pub use loading_policy::*;
pub use rect::*;
pub use tile_level::*;
