//! Tile store containers: grid readers, the shared tile cache and the data containers built on top.
//!
//! A [`DataContainer`] is bound to one [`GridReader`] and hands out its data. How and when the data
//! is read depends on the [`LoadingPolicy`](tilestore_core::LoadingPolicy) the container was
//! created for by the [`ContainerRegistry`].
//!
//! # Quick start
//! ```rust
//! use std::sync::Arc;
//! use tilestore_container::*;
//! use tilestore_core::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let raster = MemoryGridReader::new("demo", 4, 4, 1, Blob::from(vec![7u8; 16]))?;
//!     let cache = Arc::new(TileCache::new(CacheConfig::new(1 << 20, None)));
//!     let registry = ContainerRegistry::new(cache);
//!
//!     let container = registry.with_loading_policy(Arc::new(raster), LoadingPolicy::Cached).await?;
//!     let data = container.get_read_only_data().await?;
//!     assert_eq!(data.len(), 16);
//!     Ok(())
//! }
//! ```

mod cache;
pub use cache::*;

mod container;
pub use container::*;

mod reader;
pub use reader::*;

mod registry;
pub use registry::*;

#[cfg(test)]
pub(crate) mod testing;
