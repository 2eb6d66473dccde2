//! Single-flight loading shared by the tile cache and the container slots.
//!
//! A load runs on its own tokio task. Callers wait on a [`SharedLoad`] handle, so any number of
//! them can wait for the same load, and a caller that stops waiting does not cancel it.

use crate::{CacheOutcome, GridReader};
use anyhow::{Result, anyhow};
use futures::{
	FutureExt,
	future::{BoxFuture, Shared},
};
use parking_lot::Mutex;
use std::{future::Future, sync::Arc};
use tilestore_core::{Blob, StoreError};
use uuid::Uuid;

pub(crate) type SharedLoad = Shared<BoxFuture<'static, Result<Arc<Blob>, Arc<anyhow::Error>>>>;

/// Starts `load` on a new task.
pub(crate) fn spawn_load<F>(load: F) -> SharedLoad
where
	F: Future<Output = Result<Arc<Blob>>> + Send + 'static,
{
	let handle = tokio::spawn(async move { load.await.map_err(Arc::new) });
	async move {
		match handle.await {
			Ok(result) => result,
			Err(err) => Err(Arc::new(anyhow!("loader task failed: {err}"))),
		}
	}
	.boxed()
	.shared()
}

/// Runs a cleanup when dropped before [`LoadGuard::finish`], e.g. while a panicking load unwinds.
pub(crate) struct LoadGuard<F: FnOnce()> {
	cleanup: Option<F>,
}

impl<F: FnOnce()> LoadGuard<F> {
	pub fn new(cleanup: F) -> Self {
		LoadGuard { cleanup: Some(cleanup) }
	}

	pub fn finish(mut self) {
		self.cleanup = None;
	}
}

impl<F: FnOnce()> Drop for LoadGuard<F> {
	fn drop(&mut self) {
		if let Some(cleanup) = self.cleanup.take() {
			cleanup();
		}
	}
}

/// Result of looking up a buffer: either at hand, or a load to wait for.
pub(crate) enum Lookup {
	Ready(Arc<Blob>),
	Pending(SharedLoad, CacheOutcome),
}

impl Lookup {
	pub fn outcome(&self) -> CacheOutcome {
		match self {
			Lookup::Ready(_) => CacheOutcome::Hit,
			Lookup::Pending(_, outcome) => *outcome,
		}
	}

	pub async fn wait(self) -> Result<Arc<Blob>> {
		match self {
			Lookup::Ready(data) => Ok(data),
			Lookup::Pending(load, _) => load.await.map_err(|err| StoreError::LoadFailed(err).into()),
		}
	}
}

/// Reads the whole raster of `reader`.
pub(crate) async fn read_full(reader: Arc<dyn GridReader>) -> Result<Arc<Blob>> {
	let result = reader.read_all().await?;
	log::trace!("read {} bytes of {} from '{}'", result.data.len(), result.rect, reader.name());
	Ok(Arc::new(result.data))
}

#[derive(Default)]
struct SlotState {
	id: Option<Uuid>,
	data: Option<Arc<Blob>>,
	pending: Option<(Uuid, SharedLoad)>,
}

impl SlotState {
	fn forget_pending(&mut self, id: Uuid) {
		if self.pending.as_ref().is_some_and(|(pending_id, _)| *pending_id == id) {
			self.pending = None;
		}
	}
}

/// A single cached buffer without a budget, keyed by the current container id.
#[derive(Clone, Default)]
pub(crate) struct LoadSlot {
	state: Arc<Mutex<SlotState>>,
}

impl LoadSlot {
	/// Forgets the held data and any load for a previous id.
	pub fn reset(&self, id: Uuid) {
		let mut state = self.state.lock();
		state.id = Some(id);
		state.data = None;
		state.pending = None;
	}

	/// Returns the data for `id`, or the load producing it. Starts a load from `reader` if none is
	/// running for `id`.
	pub fn lookup(&self, id: Uuid, reader: Arc<dyn GridReader>) -> Lookup {
		let mut state = self.state.lock();
		if state.id == Some(id)
			&& let Some(data) = &state.data
		{
			return Lookup::Ready(Arc::clone(data));
		}
		if let Some((pending_id, load)) = &state.pending
			&& *pending_id == id
		{
			return Lookup::Pending(load.clone(), CacheOutcome::Joined);
		}
		if state.id != Some(id) {
			// taken before a rebind: read, but leave the current binding's load alone
			return Lookup::Pending(spawn_load(read_full(reader)), CacheOutcome::Miss);
		}

		let slot = Arc::clone(&self.state);
		let load = spawn_load(async move {
			let guard = LoadGuard::new({
				let slot = Arc::clone(&slot);
				move || slot.lock().forget_pending(id)
			});
			let result = read_full(reader).await;
			guard.finish();
			let mut state = slot.lock();
			state.forget_pending(id);
			if state.id == Some(id)
				&& let Ok(data) = &result
			{
				state.data = Some(Arc::clone(data));
			}
			result
		});
		state.pending = Some((id, load.clone()));
		Lookup::Pending(load, CacheOutcome::Miss)
	}

	/// Drops the held data, returning its size.
	pub fn clear(&self) -> u64 {
		self.state.lock().data.take().map_or(0, |data| data.len())
	}

	pub fn occupied_bytes(&self) -> u64 {
		self.state.lock().data.as_ref().map_or(0, |data| data.len())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::CountingReader;
	use pretty_assertions::assert_eq;
	use std::time::Duration;

	#[tokio::test]
	async fn panicking_reader_does_not_block_the_slot() -> Result<()> {
		let slot = LoadSlot::default();
		let id = Uuid::new_v4();
		slot.reset(id);
		let reader = CountingReader::new(2, 3).arc();
		reader.panic_once();

		let err = slot.lookup(id, reader.clone()).wait().await.unwrap_err();
		assert!(matches!(StoreError::find(&err), Some(StoreError::LoadFailed(_))));

		let retry = slot.lookup(id, reader.clone());
		assert_eq!(retry.outcome(), CacheOutcome::Miss);
		assert_eq!(retry.wait().await?.as_slice(), &[3u8; 4]);
		assert_eq!(reader.reads(), 2);
		assert_eq!(slot.occupied_bytes(), 4);
		Ok(())
	}

	#[tokio::test]
	async fn stale_ids_do_not_replace_the_current_load() -> Result<()> {
		let slot = LoadSlot::default();
		let (old, new) = (Uuid::new_v4(), Uuid::new_v4());
		let old_reader = CountingReader::new(2, 1).with_delay(Duration::from_millis(50)).arc();
		let new_reader = CountingReader::new(2, 2).with_delay(Duration::from_millis(50)).arc();
		slot.reset(new);

		let current = slot.lookup(new, new_reader.clone());
		assert_eq!(current.outcome(), CacheOutcome::Miss);
		let stale = slot.lookup(old, old_reader.clone());
		assert_eq!(stale.outcome(), CacheOutcome::Miss);
		let joined = slot.lookup(new, new_reader.clone());
		assert_eq!(joined.outcome(), CacheOutcome::Joined);

		assert_eq!(stale.wait().await?.as_slice(), &[1u8; 4]);
		assert_eq!(current.wait().await?.as_slice(), &[2u8; 4]);
		assert_eq!(joined.wait().await?.as_slice(), &[2u8; 4]);
		assert_eq!(new_reader.reads(), 1);
		assert_eq!(old_reader.reads(), 1);

		// the stale result is not kept for the current binding
		match slot.lookup(new, new_reader.clone()) {
			Lookup::Ready(data) => assert_eq!(data.as_slice(), &[2u8; 4]),
			Lookup::Pending(..) => panic!("expected the current binding's data"),
		}
		Ok(())
	}
}
