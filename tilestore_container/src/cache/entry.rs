//! Bookkeeping for one cache slot.

use std::sync::Arc;
use tilestore_core::{Blob, Rect};

/// Milliseconds since the Unix epoch.
pub(crate) fn now_millis() -> u64 {
	(time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as u64
}

/// One slot of the tile cache.
///
/// The buffer (`Empty` / `Loaded`) and the on-disk flag (`NotPersisted` / `Persisted`) change
/// independently: an entry that was spilled to disk keeps its flag after its buffer is evicted.
#[derive(Clone, Debug)]
pub struct CacheEntry {
	buffer: Option<Arc<Blob>>,
	written_at: u64,
	read_at: u64,
	rect: Rect,
	last_access: u64,
}

impl CacheEntry {
	pub fn new(rect: Rect) -> CacheEntry {
		CacheEntry {
			buffer: None,
			written_at: 0,
			read_at: 0,
			rect,
			last_access: 0,
		}
	}

	/// Sets or clears the buffer and returns the change in occupied bytes.
	pub fn set_buffer(&mut self, buffer: Option<Arc<Blob>>) -> i64 {
		let old = self.occupied_bytes() as i64;
		self.read_at = if buffer.is_some() { now_millis() } else { 0 };
		self.buffer = buffer;
		self.occupied_bytes() as i64 - old
	}

	/// Frees the buffer, optionally forgetting that the entry is on disk. Returns the bytes freed.
	pub fn clear(&mut self, drop_disk_flag: bool) -> u64 {
		if drop_disk_flag {
			self.written_at = 0;
		}
		self.set_buffer(None).unsigned_abs()
	}

	pub fn buffer(&self) -> Option<&Arc<Blob>> {
		self.buffer.as_ref()
	}

	pub fn occupied_bytes(&self) -> u64 {
		self.buffer.as_ref().map_or(0, |buffer| buffer.len())
	}

	pub fn is_loaded(&self) -> bool {
		self.buffer.is_some()
	}

	pub fn is_persisted(&self) -> bool {
		self.written_at != 0
	}

	pub fn mark_written(&mut self) {
		self.written_at = now_millis().max(1);
	}

	pub fn written_at(&self) -> u64 {
		self.written_at
	}

	pub fn read_at(&self) -> u64 {
		self.read_at
	}

	pub fn rect(&self) -> Rect {
		self.rect
	}

	pub(crate) fn touch(&mut self, tick: u64) {
		self.last_access = tick;
	}

	pub(crate) fn last_access(&self) -> u64 {
		self.last_access
	}
}
