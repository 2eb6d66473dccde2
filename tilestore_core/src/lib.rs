//! Core building blocks of the tile store: rectangles and tile addressing, on-disk layouts,
//! pooled buffers, binary mesh fragments, random-access data readers and configuration.

pub mod config;
pub mod error;
pub mod fragment;
pub mod io;
pub mod layout;
pub mod macros;
pub mod pool;
pub mod types;

pub use config::*;
pub use error::*;
pub use fragment::*;
pub use layout::*;
pub use pool::*;
pub use types::*;

#[doc(hidden)]
pub use wildmatch;
