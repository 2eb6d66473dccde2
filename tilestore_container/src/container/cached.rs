//! A container backed by the shared tile cache.

use super::{Binding, ContainerStats, DataContainer};
use crate::{GridReader, TileCache};
use anyhow::Result;
use async_trait::async_trait;
use std::{fmt, sync::Arc};
use tilestore_core::{LoadingPolicy, ReadOnlyBlob};
use uuid::Uuid;

/// Reads on first access through a [`TileCache`], where the data competes with other containers
/// for the cache's byte budget and may be evicted or spilled to disk.
pub struct CachedContainer {
	binding: Binding,
	cache: Arc<TileCache>,
}

impl CachedContainer {
	pub fn new(cache: Arc<TileCache>) -> CachedContainer {
		CachedContainer {
			binding: Binding::default(),
			cache,
		}
	}

	pub fn cache(&self) -> &Arc<TileCache> {
		&self.cache
	}
}

#[async_trait]
impl DataContainer for CachedContainer {
	async fn bind(&self, reader: Arc<dyn GridReader>) -> Result<()> {
		self.binding.bind(reader, |_| {});
		Ok(())
	}

	fn identifier(&self) -> Option<Uuid> {
		self.binding.id()
	}

	fn policy(&self) -> LoadingPolicy {
		LoadingPolicy::Cached
	}

	fn reader(&self) -> Option<Arc<dyn GridReader>> {
		self.binding.reader()
	}

	async fn get_read_only_data(&self) -> Result<ReadOnlyBlob> {
		let bound = self.binding.current()?;
		let rect = bound.reader.dimensions().rect();
		let lookup = self.cache.lookup(bound.id, rect, bound.reader);
		self.binding.record(lookup.outcome());
		Ok(ReadOnlyBlob::from(lookup.wait().await?))
	}

	fn stats(&self) -> ContainerStats {
		self.binding.stats()
	}

	fn occupied_bytes(&self) -> u64 {
		self.binding.id().map_or(0, |id| self.cache.entry_bytes(&id))
	}

	fn clear(&self) -> u64 {
		self.binding.id().map_or(0, |id| self.cache.remove(&id))
	}
}

impl fmt::Debug for CachedContainer {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("CachedContainer")
			.field("id", &self.binding.id())
			.field("occupied_bytes", &self.occupied_bytes())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::CountingReader;
	use pretty_assertions::assert_eq;
	use std::time::Duration;
	use tilestore_core::{CacheConfig, StoreError};

	fn cache(max_bytes: usize) -> Arc<TileCache> {
		Arc::new(TileCache::new(CacheConfig::new(max_bytes, None)))
	}

	#[tokio::test]
	async fn hits_after_the_first_lookup() -> Result<()> {
		let reader = CountingReader::new(4, 2).arc();
		let container = CachedContainer::new(cache(1024));
		container.bind(reader.clone()).await?;

		for _ in 0..6 {
			assert_eq!(container.get_read_only_data().await?.as_slice(), &[2u8; 16]);
		}
		assert_eq!(reader.reads(), 1);
		assert_eq!(container.stats(), ContainerStats { hits: 5, misses: 1 });
		assert_eq!(container.occupied_bytes(), 16);
		Ok(())
	}

	#[tokio::test]
	async fn rebinding_misses_although_old_entry_is_cached() -> Result<()> {
		let cache = cache(1024);
		let reader = CountingReader::new(4, 0).arc();
		let container = CachedContainer::new(cache.clone());

		container.bind(reader.clone()).await?;
		container.get_read_only_data().await?;
		let old_id = container.identifier().unwrap();

		container.bind(reader.clone()).await?;
		container.get_read_only_data().await?;
		assert!(cache.entry(&old_id).is_some());
		assert_eq!(cache.len(), 2);
		assert_eq!(container.stats(), ContainerStats { hits: 0, misses: 2 });
		assert_eq!(reader.reads(), 2);
		Ok(())
	}

	#[tokio::test]
	async fn containers_share_the_budget() -> Result<()> {
		let cache = cache(40);
		let first = CachedContainer::new(cache.clone());
		let second = CachedContainer::new(cache.clone());
		first.bind(CountingReader::new(4, 1).arc()).await?;
		second.bind(CountingReader::new(5, 2).arc()).await?;

		first.get_read_only_data().await?;
		assert_eq!(first.occupied_bytes(), 16);
		second.get_read_only_data().await?;
		assert_eq!(first.occupied_bytes(), 0);
		assert_eq!(second.occupied_bytes(), 25);
		assert!(cache.occupied_bytes() <= 40);
		Ok(())
	}

	#[tokio::test]
	async fn clear_removes_the_cache_entry() -> Result<()> {
		let cache = cache(1024);
		let container = CachedContainer::new(cache.clone());
		assert_eq!(container.clear(), 0);

		container.bind(CountingReader::new(4, 0).arc()).await?;
		container.get_read_only_data().await?;
		assert_eq!(container.clear(), 16);
		assert!(cache.is_empty());
		Ok(())
	}

	#[tokio::test]
	async fn timeout_leaves_the_load_running() -> Result<()> {
		let reader = CountingReader::new(4, 4).with_delay(Duration::from_millis(200)).arc();
		let container = CachedContainer::new(cache(1024));
		container.bind(reader.clone()).await?;

		let err = container.get_data_timeout(Duration::from_millis(10)).await.unwrap_err();
		assert!(matches!(StoreError::find(&err), Some(StoreError::Timeout(_))));
		tokio::time::sleep(Duration::from_millis(400)).await;

		let data = container.get_read_only_data().await?;
		assert_eq!(data.as_slice(), &[4u8; 16]);
		assert_eq!(reader.reads(), 1);
		assert_eq!(container.stats(), ContainerStats { hits: 1, misses: 1 });
		Ok(())
	}

	#[tokio::test]
	async fn unbound_container() {
		let container = CachedContainer::new(cache(16));
		let err = container.get_data().await.unwrap_err();
		assert!(matches!(StoreError::find(&err), Some(StoreError::Unbound)));
		assert_eq!(container.occupied_bytes(), 0);
	}
}
