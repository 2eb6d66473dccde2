//! The shared, budget-bounded tile cache.
//!
//! Entries are keyed by container id. A miss starts exactly one load per id; callers that arrive
//! while it runs wait for the same result. When a new buffer would exceed the byte budget, the least
//! recently accessed buffers are evicted until it fits. Entries that were spilled to disk with
//! [`TileCache::flush`] keep their on-disk flag when evicted and are reloaded from the spill file
//! on their next miss.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use tilestore_container::{CacheOutcome, MemoryGridReader, TileCache};
//! use tilestore_core::{Blob, CacheConfig, Rect};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cache = Arc::new(TileCache::new(CacheConfig::new(1024, None)));
//!     let reader = Arc::new(MemoryGridReader::new("demo", 8, 8, 1, Blob::new_sized(64))?);
//!     let id = uuid::Uuid::new_v4();
//!
//!     let (_, outcome) = cache.get_or_load(id, Rect::new(0, 0, 8, 8), reader.clone()).await?;
//!     assert_eq!(outcome, CacheOutcome::Miss);
//!     let (data, outcome) = cache.get_or_load(id, Rect::new(0, 0, 8, 8), reader).await?;
//!     assert_eq!(outcome, CacheOutcome::Hit);
//!     assert_eq!(data.len(), 64);
//!     assert_eq!(cache.occupied_bytes(), 64);
//!     Ok(())
//! }
//! ```

use super::CacheEntry;
use crate::{
	GridReader,
	container::{LoadGuard, Lookup, SharedLoad, read_full, spawn_load},
};
use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::{
	collections::HashMap,
	fmt, fs,
	path::{Path, PathBuf},
	sync::{
		Arc,
		atomic::{AtomicU64, Ordering},
	},
};
use tilestore_core::{Blob, CacheConfig, Rect};
use tilestore_derive::context;
use uuid::Uuid;

/// How a cache lookup was served.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheOutcome {
	/// The buffer was in memory.
	Hit,
	/// Another caller's load for the same id was already running.
	Joined,
	/// This call started the load.
	Miss,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
	pub hits: u64,
	pub misses: u64,
	pub joins: u64,
	pub evictions: u64,
	pub spills: u64,
	pub entries: usize,
	pub occupied_bytes: u64,
}

#[derive(Default)]
struct CacheState {
	entries: HashMap<Uuid, CacheEntry>,
	pending: HashMap<Uuid, SharedLoad>,
	occupied: u64,
	tick: u64,
}

impl CacheState {
	fn next_tick(&mut self) -> u64 {
		self.tick += 1;
		self.tick
	}

	/// Returns the buffer for `id` and marks it as accessed.
	fn touch(&mut self, id: &Uuid) -> Option<Arc<Blob>> {
		let tick = self.next_tick();
		let entry = self.entries.get_mut(id)?;
		let buffer = Arc::clone(entry.buffer()?);
		entry.touch(tick);
		Some(buffer)
	}

	/// Evicts least recently accessed buffers until `incoming` more bytes fit into `max_bytes`.
	/// Returns the number of evicted buffers.
	fn evict_for(&mut self, incoming: u64, max_bytes: u64, keep: &Uuid) -> u64 {
		let mut evicted = 0;
		while self.occupied + incoming > max_bytes {
			let victim = self
				.entries
				.iter()
				.filter(|(id, entry)| entry.is_loaded() && *id != keep)
				.min_by_key(|(_, entry)| entry.last_access())
				.map(|(id, _)| *id);
			let Some(victim) = victim else { break };

			let persisted = self.entries.get(&victim).is_some_and(CacheEntry::is_persisted);
			let freed = if persisted {
				self.entries.get_mut(&victim).map_or(0, |entry| entry.clear(false))
			} else {
				self.entries.remove(&victim).map_or(0, |mut entry| entry.clear(true))
			};
			self.occupied -= freed;
			evicted += 1;
			log::trace!("evicted {victim} ({freed} bytes)");
		}
		evicted
	}
}

pub struct TileCache {
	max_bytes: u64,
	spill_dir: Option<PathBuf>,
	state: Mutex<CacheState>,
	hits: AtomicU64,
	misses: AtomicU64,
	joins: AtomicU64,
	evictions: AtomicU64,
	spills: AtomicU64,
}

impl TileCache {
	pub fn new(config: CacheConfig) -> TileCache {
		TileCache {
			max_bytes: config.max_bytes.as_u64(),
			spill_dir: config.spill_dir,
			state: Mutex::new(CacheState::default()),
			hits: AtomicU64::new(0),
			misses: AtomicU64::new(0),
			joins: AtomicU64::new(0),
			evictions: AtomicU64::new(0),
			spills: AtomicU64::new(0),
		}
	}

	/// Returns the buffer cached for `id`, loading it from `reader` (or from its spill file) on a
	/// miss. `rect` is the region the buffer covers.
	pub async fn get_or_load(
		self: &Arc<Self>,
		id: Uuid,
		rect: Rect,
		reader: Arc<dyn GridReader>,
	) -> Result<(Arc<Blob>, CacheOutcome)> {
		let lookup = self.lookup(id, rect, reader);
		let outcome = lookup.outcome();
		Ok((lookup.wait().await?, outcome))
	}

	/// Like [`TileCache::get_or_load`], but returns before waiting for a load.
	pub(crate) fn lookup(self: &Arc<Self>, id: Uuid, rect: Rect, reader: Arc<dyn GridReader>) -> Lookup {
		let mut state = self.state.lock();
		if let Some(buffer) = state.touch(&id) {
			self.hits.fetch_add(1, Ordering::Relaxed);
			return Lookup::Ready(buffer);
		}
		if let Some(load) = state.pending.get(&id) {
			self.joins.fetch_add(1, Ordering::Relaxed);
			return Lookup::Pending(load.clone(), CacheOutcome::Joined);
		}

		let spill_file = state
			.entries
			.get(&id)
			.filter(|entry| entry.is_persisted())
			.and_then(|_| self.spill_path(&id));
		let load = self.start_load(id, rect, reader, spill_file);
		state.pending.insert(id, load.clone());
		self.misses.fetch_add(1, Ordering::Relaxed);
		Lookup::Pending(load, CacheOutcome::Miss)
	}

	fn start_load(
		self: &Arc<Self>,
		id: Uuid,
		rect: Rect,
		reader: Arc<dyn GridReader>,
		spill_file: Option<PathBuf>,
	) -> SharedLoad {
		let cache = Arc::clone(self);
		spawn_load(async move {
			let guard = LoadGuard::new({
				let cache = Arc::clone(&cache);
				move || cache.abandon_load(&id)
			});
			let result = match spill_file {
				Some(path) => read_spill_file(&path).await,
				None => read_full(reader).await,
			};
			guard.finish();
			cache.finish_load(id, rect, &result);
			result
		})
	}

	/// Forgets the load for `id` when it ended without a result.
	fn abandon_load(&self, id: &Uuid) {
		self.state.lock().pending.remove(id);
		log::warn!("load for {id} ended without a result");
	}

	fn finish_load(&self, id: Uuid, rect: Rect, result: &Result<Arc<Blob>>) {
		let mut state = self.state.lock();
		state.pending.remove(&id);
		let Ok(buffer) = result else { return };

		let size = buffer.len();
		if size > self.max_bytes {
			log::warn!(
				"buffer of {size} bytes for {id} exceeds the cache budget of {} bytes and is not retained",
				self.max_bytes
			);
			return;
		}

		let evicted = state.evict_for(size, self.max_bytes, &id);
		if evicted > 0 {
			self.evictions.fetch_add(evicted, Ordering::Relaxed);
		}
		let tick = state.next_tick();
		let entry = state.entries.entry(id).or_insert_with(|| CacheEntry::new(rect));
		let delta = entry.set_buffer(Some(Arc::clone(buffer)));
		entry.touch(tick);
		state.occupied = state.occupied.saturating_add_signed(delta);
		if evicted > 0 {
			log::debug!(
				"cache occupancy after evicting {evicted} buffers: {} of {} bytes",
				state.occupied,
				self.max_bytes
			);
		}
	}

	/// Writes every in-memory entry that is not on disk yet to the spill directory.
	///
	/// Returns the number of files written. Does nothing without a spill directory.
	#[context("flushing tile cache")]
	pub fn flush(&self) -> Result<usize> {
		let Some(spill_dir) = &self.spill_dir else {
			return Ok(0);
		};
		let unwritten: Vec<(Uuid, Arc<Blob>)> = {
			let state = self.state.lock();
			state
				.entries
				.iter()
				.filter(|(_, entry)| !entry.is_persisted())
				.filter_map(|(id, entry)| Some((*id, Arc::clone(entry.buffer()?))))
				.collect()
		};
		if unwritten.is_empty() {
			return Ok(0);
		}

		fs::create_dir_all(spill_dir).with_context(|| format!("creating spill directory {spill_dir:?}"))?;
		let mut written = Vec::with_capacity(unwritten.len());
		for (id, buffer) in unwritten {
			let path = spill_dir.join(spill_file_name(&id));
			fs::write(&path, buffer.as_slice()).with_context(|| format!("writing spill file {path:?}"))?;
			written.push(id);
		}

		let mut state = self.state.lock();
		for id in &written {
			match state.entries.get_mut(id) {
				Some(entry) => entry.mark_written(),
				// removed while writing
				None => remove_file(&spill_dir.join(spill_file_name(id))),
			}
		}
		self.spills.fetch_add(written.len() as u64, Ordering::Relaxed);
		log::debug!("spilled {} entries to {spill_dir:?}", written.len());
		Ok(written.len())
	}

	/// Drops the entry for `id` and its spill file. Returns the bytes freed.
	pub fn remove(&self, id: &Uuid) -> u64 {
		let mut state = self.state.lock();
		let Some(mut entry) = state.entries.remove(id) else {
			return 0;
		};
		if entry.is_persisted()
			&& let Some(path) = self.spill_path(id)
		{
			remove_file(&path);
		}
		let freed = entry.clear(true);
		state.occupied -= freed;
		freed
	}

	/// Frees all buffers. With `delete_files`, spill files and persisted entries go too; otherwise
	/// persisted entries stay and are reloaded from disk on demand.
	pub fn clear(&self, delete_files: bool) -> u64 {
		let mut state = self.state.lock();
		let mut freed = 0;
		let mut removed = Vec::new();
		for (id, entry) in &mut state.entries {
			if entry.is_persisted() && !delete_files {
				freed += entry.clear(false);
			} else {
				if entry.is_persisted()
					&& let Some(path) = self.spill_path(id)
				{
					remove_file(&path);
				}
				freed += entry.clear(true);
				removed.push(*id);
			}
		}
		for id in removed {
			state.entries.remove(&id);
		}
		state.occupied -= freed;
		freed
	}

	/// Bytes held in memory for `id`.
	pub fn entry_bytes(&self, id: &Uuid) -> u64 {
		self.state.lock().entries.get(id).map_or(0, CacheEntry::occupied_bytes)
	}

	/// A copy of the entry for `id`.
	pub fn entry(&self, id: &Uuid) -> Option<CacheEntry> {
		self.state.lock().entries.get(id).cloned()
	}

	pub fn occupied_bytes(&self) -> u64 {
		self.state.lock().occupied
	}

	pub fn max_bytes(&self) -> u64 {
		self.max_bytes
	}

	pub fn spill_dir(&self) -> Option<&Path> {
		self.spill_dir.as_deref()
	}

	pub fn len(&self) -> usize {
		self.state.lock().entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn stats(&self) -> CacheStats {
		let state = self.state.lock();
		CacheStats {
			hits: self.hits.load(Ordering::Relaxed),
			misses: self.misses.load(Ordering::Relaxed),
			joins: self.joins.load(Ordering::Relaxed),
			evictions: self.evictions.load(Ordering::Relaxed),
			spills: self.spills.load(Ordering::Relaxed),
			entries: state.entries.len(),
			occupied_bytes: state.occupied,
		}
	}

	fn spill_path(&self, id: &Uuid) -> Option<PathBuf> {
		Some(self.spill_dir.as_ref()?.join(spill_file_name(id)))
	}
}

impl Drop for TileCache {
	fn drop(&mut self) {
		let state = self.state.get_mut();
		for (id, entry) in &state.entries {
			if entry.is_persisted()
				&& let Some(path) = self.spill_dir.as_ref().map(|dir| dir.join(spill_file_name(id)))
			{
				remove_file(&path);
			}
		}
	}
}

impl fmt::Debug for TileCache {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TileCache")
			.field("max_bytes", &self.max_bytes)
			.field("spill_dir", &self.spill_dir)
			.field("stats", &self.stats())
			.finish()
	}
}

fn spill_file_name(id: &Uuid) -> String {
	format!("{id}.tile")
}

async fn read_spill_file(path: &Path) -> Result<Arc<Blob>> {
	let data = tokio::fs::read(path)
		.await
		.with_context(|| format!("reading spill file {path:?}"))?;
	log::trace!("reloaded {} bytes from {path:?}", data.len());
	Ok(Arc::new(Blob::from(data)))
}

fn remove_file(path: &Path) {
	if let Err(err) = fs::remove_file(path) {
		log::warn!("could not remove spill file {path:?}: {err}");
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::CountingReader;
	use pretty_assertions::assert_eq;
	use std::time::Duration;
	use tilestore_core::StoreError;

	const RECT: Rect = Rect::new(0, 0, 10, 10);

	fn cache(max_bytes: usize, spill_dir: Option<&Path>) -> Arc<TileCache> {
		Arc::new(TileCache::new(CacheConfig::new(max_bytes, spill_dir)))
	}

	#[tokio::test]
	async fn miss_then_hit() -> Result<()> {
		let cache = cache(1000, None);
		let reader = CountingReader::new(10, 3).arc();
		let id = Uuid::new_v4();

		let (first, outcome) = cache.get_or_load(id, RECT, reader.clone()).await?;
		assert_eq!(outcome, CacheOutcome::Miss);
		let (second, outcome) = cache.get_or_load(id, RECT, reader.clone()).await?;
		assert_eq!(outcome, CacheOutcome::Hit);
		assert!(Arc::ptr_eq(&first, &second));
		assert_eq!(reader.reads(), 1);

		let stats = cache.stats();
		assert_eq!((stats.hits, stats.misses, stats.entries), (1, 1, 1));
		assert_eq!(stats.occupied_bytes, 100);
		assert_eq!(cache.entry(&id).map(|entry| entry.rect()), Some(RECT));
		Ok(())
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
	async fn concurrent_callers_share_one_load() -> Result<()> {
		let cache = cache(1000, None);
		let reader = CountingReader::new(10, 1).with_delay(Duration::from_millis(50)).arc();
		let id = Uuid::new_v4();

		let tasks: Vec<_> = (0..16)
			.map(|_| {
				let cache = cache.clone();
				let reader = reader.clone();
				tokio::spawn(async move { cache.get_or_load(id, RECT, reader).await })
			})
			.collect();
		let mut misses = 0;
		for task in tasks {
			let (data, outcome) = task.await??;
			assert_eq!(data.len(), 100);
			if outcome == CacheOutcome::Miss {
				misses += 1;
			}
		}

		assert_eq!(reader.reads(), 1);
		assert_eq!(misses, 1);
		let stats = cache.stats();
		assert_eq!(stats.misses, 1);
		assert_eq!(stats.hits + stats.joins, 15);
		Ok(())
	}

	#[tokio::test]
	async fn evicts_least_recently_accessed() -> Result<()> {
		let cache = cache(300, None);
		let reader = CountingReader::new(10, 0).arc();
		let ids: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();

		for id in &ids[..3] {
			cache.get_or_load(*id, RECT, reader.clone()).await?;
		}
		// refresh the oldest entry, so the second one is now least recently accessed
		cache.get_or_load(ids[0], RECT, reader.clone()).await?;
		cache.get_or_load(ids[3], RECT, reader.clone()).await?;

		assert!(cache.entry(&ids[0]).is_some());
		assert!(cache.entry(&ids[1]).is_none());
		assert!(cache.entry(&ids[2]).is_some());
		assert!(cache.entry(&ids[3]).is_some());
		assert_eq!(cache.occupied_bytes(), 300);
		assert_eq!(cache.stats().evictions, 1);

		let (_, outcome) = cache.get_or_load(ids[1], RECT, reader.clone()).await?;
		assert_eq!(outcome, CacheOutcome::Miss);
		assert!(cache.occupied_bytes() <= cache.max_bytes());
		Ok(())
	}

	#[tokio::test]
	async fn oversized_buffers_are_not_retained() -> Result<()> {
		let cache = cache(50, None);
		let reader = CountingReader::new(10, 0).arc();
		let (data, _) = cache.get_or_load(Uuid::new_v4(), RECT, reader).await?;
		assert_eq!(data.len(), 100);
		assert!(cache.is_empty());
		assert_eq!(cache.occupied_bytes(), 0);
		Ok(())
	}

	#[tokio::test]
	async fn failed_loads_are_shared_and_retried() -> Result<()> {
		let cache = cache(1000, None);
		let reader = CountingReader::new(10, 0).arc();
		reader.set_failing(true);
		let id = Uuid::new_v4();

		let err = cache.get_or_load(id, RECT, reader.clone()).await.unwrap_err();
		assert!(matches!(StoreError::find(&err), Some(StoreError::LoadFailed(_))));
		assert!(err.to_string().contains("upstream unavailable"));

		reader.set_failing(false);
		let (_, outcome) = cache.get_or_load(id, RECT, reader.clone()).await?;
		assert_eq!(outcome, CacheOutcome::Miss);
		assert_eq!(reader.reads(), 2);
		Ok(())
	}

	#[tokio::test]
	async fn panicking_load_is_retried() -> Result<()> {
		let cache = cache(1000, None);
		let reader = CountingReader::new(10, 5).arc();
		reader.panic_once();
		let id = Uuid::new_v4();

		let err = cache.get_or_load(id, RECT, reader.clone()).await.unwrap_err();
		assert!(matches!(StoreError::find(&err), Some(StoreError::LoadFailed(_))));
		assert!(cache.is_empty());

		let (data, outcome) = cache.get_or_load(id, RECT, reader.clone()).await?;
		assert_eq!(outcome, CacheOutcome::Miss);
		assert_eq!(data.as_slice(), &[5u8; 100]);
		assert_eq!(reader.reads(), 2);
		Ok(())
	}

	#[tokio::test]
	async fn spilled_entries_reload_from_disk() -> Result<()> {
		let dir = tempfile::tempdir()?;
		let cache = cache(100, Some(dir.path()));
		let first = CountingReader::new(10, 7).arc();
		let second = CountingReader::new(10, 8).arc();
		let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

		cache.get_or_load(a, RECT, first.clone()).await?;
		assert_eq!(cache.flush()?, 1);
		assert_eq!(cache.flush()?, 0);
		let spill_file = dir.path().join(format!("{a}.tile"));
		assert!(spill_file.exists());

		// evicts `a`, which stays known as persisted
		cache.get_or_load(b, RECT, second.clone()).await?;
		let entry = cache.entry(&a).unwrap();
		assert!(!entry.is_loaded());
		assert!(entry.is_persisted());

		let (data, outcome) = cache.get_or_load(a, RECT, first.clone()).await?;
		assert_eq!(outcome, CacheOutcome::Miss);
		assert_eq!(data.as_slice(), &[7u8; 100]);
		assert_eq!(first.reads(), 1);
		assert_eq!(cache.stats().spills, 1);

		drop(cache);
		assert!(!spill_file.exists());
		Ok(())
	}

	#[tokio::test]
	async fn remove_and_clear() -> Result<()> {
		let dir = tempfile::tempdir()?;
		let cache = cache(1000, Some(dir.path()));
		let reader = CountingReader::new(10, 0).arc();
		let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
		for id in &ids {
			cache.get_or_load(*id, RECT, reader.clone()).await?;
		}

		assert_eq!(cache.remove(&ids[0]), 100);
		assert_eq!(cache.remove(&ids[0]), 0);
		assert_eq!(cache.flush()?, 2);

		assert_eq!(cache.clear(false), 200);
		assert_eq!(cache.len(), 2);
		assert_eq!(cache.occupied_bytes(), 0);

		cache.get_or_load(ids[1], RECT, reader.clone()).await?;
		assert_eq!(reader.reads(), 3);
		assert_eq!(cache.clear(true), 100);
		assert!(cache.is_empty());
		assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);
		Ok(())
	}

	#[test]
	fn flush_without_spill_dir() -> Result<()> {
		assert_eq!(cache(10, None).flush()?, 0);
		Ok(())
	}
}
