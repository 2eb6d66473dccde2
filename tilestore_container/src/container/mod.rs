//! Data containers: one reader's data, held according to a loading policy.
//!
//! Every container reads the full raster of the reader it is bound to. Binding mints a fresh
//! identifier, so data cached for a previous binding is never served for the new one.

mod cached;
mod lazy;
mod loader;
mod memory;

pub use cached::*;
pub use lazy::*;
pub use memory::*;

pub(crate) use loader::{LoadGuard, LoadSlot, Lookup, SharedLoad, read_full, spawn_load};

use crate::{CacheOutcome, GridReader};
use anyhow::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::{
	fmt::Debug,
	sync::{
		Arc,
		atomic::{AtomicU64, Ordering},
	},
	time::Duration,
};
use tilestore_core::{Blob, LoadingPolicy, ReadOnlyBlob, StoreError};
use uuid::Uuid;

/// Lookup counters of a container. Joining a load that is already running counts as a hit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ContainerStats {
	pub hits: u64,
	pub misses: u64,
}

#[async_trait]
pub trait DataContainer: Debug + Send + Sync {
	/// Replaces the reader and assigns a new identifier.
	async fn bind(&self, reader: Arc<dyn GridReader>) -> Result<()>;

	/// Identifier of the current binding, `None` while unbound.
	fn identifier(&self) -> Option<Uuid>;

	fn policy(&self) -> LoadingPolicy;

	fn reader(&self) -> Option<Arc<dyn GridReader>>;

	/// The data of the bound reader, shared and immutable.
	async fn get_read_only_data(&self) -> Result<ReadOnlyBlob>;

	/// The data of the bound reader as a copy owned by the caller.
	async fn get_data(&self) -> Result<Blob> {
		Ok(self.get_read_only_data().await?.to_blob())
	}

	/// Like [`DataContainer::get_read_only_data`], but gives up waiting after `timeout`.
	///
	/// A load started by this call keeps running and serves later calls.
	async fn get_data_timeout(&self, timeout: Duration) -> Result<ReadOnlyBlob> {
		match tokio::time::timeout(timeout, self.get_read_only_data()).await {
			Ok(result) => result,
			Err(_) => Err(StoreError::Timeout(timeout).into()),
		}
	}

	fn stats(&self) -> ContainerStats;

	/// Bytes this container currently holds in memory.
	fn occupied_bytes(&self) -> u64;

	/// Frees the held data. Returns the bytes freed.
	fn clear(&self) -> u64;
}

#[derive(Clone, Debug)]
pub(crate) struct Bound {
	pub id: Uuid,
	pub reader: Arc<dyn GridReader>,
}

/// The current reader and identifier of a container, plus its counters.
#[derive(Debug, Default)]
pub(crate) struct Binding {
	bound: RwLock<Option<Bound>>,
	hits: AtomicU64,
	misses: AtomicU64,
}

impl Binding {
	/// Binds `reader` under a new identifier. `on_bind` runs before any caller can see it.
	pub fn bind(&self, reader: Arc<dyn GridReader>, on_bind: impl FnOnce(Uuid)) -> Bound {
		let bound = Bound {
			id: Uuid::new_v4(),
			reader,
		};
		let mut current = self.bound.write();
		on_bind(bound.id);
		if let Some(previous) = current.replace(bound.clone()) {
			log::debug!("rebound container {} to {} ('{}')", previous.id, bound.id, bound.reader.name());
		}
		bound
	}

	pub fn current(&self) -> Result<Bound> {
		Ok(self.bound.read().clone().ok_or(StoreError::Unbound)?)
	}

	pub fn id(&self) -> Option<Uuid> {
		self.bound.read().as_ref().map(|bound| bound.id)
	}

	pub fn reader(&self) -> Option<Arc<dyn GridReader>> {
		self.bound.read().as_ref().map(|bound| Arc::clone(&bound.reader))
	}

	pub fn record(&self, outcome: CacheOutcome) {
		let counter = match outcome {
			CacheOutcome::Hit | CacheOutcome::Joined => &self.hits,
			CacheOutcome::Miss => &self.misses,
		};
		counter.fetch_add(1, Ordering::Relaxed);
	}

	pub fn stats(&self) -> ContainerStats {
		ContainerStats {
			hits: self.hits.load(Ordering::Relaxed),
			misses: self.misses.load(Ordering::Relaxed),
		}
	}
}
