//! A bounded pool of reusable byte buffers.
//!
//! Tile and fragment reads check out a [`PooledBuffer`], fill it and hand it back. Returned blocks
//! stay idle in the pool and are reused by later checkouts that fit into them. Two ceilings bound the
//! pool: the total capacity of all blocks (idle and checked out) and the number of concurrent
//! checkouts. Hitting either ceiling fails immediately; the pool never blocks and never falls back to
//! unpooled memory.
//!
//! # Examples
//!
//! ```rust
//! use tilestore_core::{BufferPool, PoolConfig};
//!
//! let pool = BufferPool::new(PoolConfig { capacity: 1024, max_checkouts: 4 });
//! {
//!     let mut buffer = pool.allocate(100).unwrap();
//!     buffer[0] = 42;
//!     assert_eq!(pool.stats().outstanding_bytes, 100);
//! } // dropping returns the block
//!
//! let stats = pool.stats();
//! assert_eq!(stats.outstanding_bytes, 0);
//! assert_eq!(stats.idle_bytes, 100);
//! ```

use crate::StoreError;
use anyhow::Result;
use parking_lot::Mutex;
use std::{
	collections::HashMap,
	fmt,
	ops::{Deref, DerefMut},
	sync::{
		Arc,
		atomic::{AtomicU64, Ordering},
	},
};

static NEXT_BUFFER_ID: AtomicU64 = AtomicU64::new(1);

/// Ceilings of a [`BufferPool`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolConfig {
	/// Maximum bytes held by the pool, idle blocks included.
	pub capacity: usize,
	/// Maximum number of buffers checked out at the same time.
	pub max_checkouts: usize,
}

impl Default for PoolConfig {
	fn default() -> Self {
		PoolConfig {
			capacity: 64 << 20,
			max_checkouts: 64,
		}
	}
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
	pub capacity: usize,
	pub outstanding_bytes: usize,
	pub outstanding_checkouts: usize,
	pub idle_bytes: usize,
	pub idle_blocks: usize,
	/// Blocks freshly allocated from the system.
	pub allocations: u64,
	/// Checkouts served by an idle block.
	pub reuses: u64,
}

struct PoolState {
	config: PoolConfig,
	idle: Vec<Vec<u8>>,
	idle_bytes: usize,
	/// Block capacity per checked out buffer id.
	outstanding: HashMap<u64, usize>,
	outstanding_bytes: usize,
	allocations: u64,
	reuses: u64,
}

impl PoolState {
	fn checkout(&mut self, size: usize) -> Result<(u64, Vec<u8>)> {
		if self.outstanding.len() >= self.config.max_checkouts {
			return Err(StoreError::CheckoutLimit {
				limit: self.config.max_checkouts,
			}
			.into());
		}

		let best_fit = self
			.idle
			.iter()
			.enumerate()
			.filter(|(_, block)| block.capacity() >= size)
			.min_by_key(|(_, block)| block.capacity())
			.map(|(index, _)| index);

		let data = if let Some(index) = best_fit {
			let mut block = self.idle.swap_remove(index);
			self.idle_bytes -= block.capacity();
			block.clear();
			block.resize(size, 0);
			self.reuses += 1;
			block
		} else {
			if self.outstanding_bytes + size > self.config.capacity {
				return Err(StoreError::PoolExhausted {
					requested: size,
					outstanding: self.outstanding_bytes,
					capacity: self.config.capacity,
				}
				.into());
			}
			self.trim_idle(self.config.capacity - self.outstanding_bytes - size);
			self.allocations += 1;
			vec![0u8; size]
		};

		let id = NEXT_BUFFER_ID.fetch_add(1, Ordering::Relaxed);
		self.outstanding.insert(id, data.capacity());
		self.outstanding_bytes += data.capacity();
		Ok((id, data))
	}

	fn checkin(&mut self, id: u64, data: Vec<u8>) -> Result<()> {
		let Some(capacity) = self.outstanding.remove(&id) else {
			return Err(StoreError::NotCheckedOut { id }.into());
		};
		self.outstanding_bytes -= capacity;
		self.idle_bytes += data.capacity();
		self.idle.push(data);
		self.trim_idle(self.config.capacity.saturating_sub(self.outstanding_bytes));
		Ok(())
	}

	/// Drops idle blocks, largest first, until at most `limit` idle bytes remain.
	fn trim_idle(&mut self, limit: usize) {
		if self.idle_bytes <= limit {
			return;
		}
		self.idle.sort_unstable_by_key(Vec::capacity);
		while self.idle_bytes > limit {
			match self.idle.pop() {
				Some(block) => self.idle_bytes -= block.capacity(),
				None => break,
			}
		}
	}
}

/// A shared handle to a buffer pool. Clones refer to the same pool.
#[derive(Clone)]
pub struct BufferPool {
	state: Arc<Mutex<PoolState>>,
}

impl BufferPool {
	pub fn new(config: PoolConfig) -> BufferPool {
		BufferPool {
			state: Arc::new(Mutex::new(PoolState {
				config,
				idle: Vec::new(),
				idle_bytes: 0,
				outstanding: HashMap::new(),
				outstanding_bytes: 0,
				allocations: 0,
				reuses: 0,
			})),
		}
	}

	/// Checks out a zero-filled buffer of exactly `size` bytes.
	///
	/// Fails with [`StoreError::CheckoutLimit`] or [`StoreError::PoolExhausted`] instead of waiting.
	pub fn allocate(&self, size: usize) -> Result<PooledBuffer> {
		let (id, data) = self.state.lock().checkout(size)?;
		log::trace!("checked out buffer #{id} with {size} bytes");
		Ok(PooledBuffer {
			id,
			data,
			pool: Some(self.clone()),
		})
	}

	/// Returns `buffer` to this pool.
	///
	/// A buffer checked out from a different pool is rejected with [`StoreError::NotCheckedOut`]
	/// (it still goes back to the pool it came from).
	pub fn release(&self, mut buffer: PooledBuffer) -> Result<()> {
		let id = buffer.id;
		let Some(owner) = buffer.pool.take_if(|owner| Arc::ptr_eq(&owner.state, &self.state)) else {
			return Err(StoreError::NotCheckedOut { id }.into());
		};
		owner.checkin(id, std::mem::take(&mut buffer.data))
	}

	fn checkin(&self, id: u64, data: Vec<u8>) -> Result<()> {
		self.state.lock().checkin(id, data)?;
		log::trace!("released buffer #{id}");
		Ok(())
	}

	pub fn config(&self) -> PoolConfig {
		self.state.lock().config
	}

	pub fn stats(&self) -> PoolStats {
		let state = self.state.lock();
		PoolStats {
			capacity: state.config.capacity,
			outstanding_bytes: state.outstanding_bytes,
			outstanding_checkouts: state.outstanding.len(),
			idle_bytes: state.idle_bytes,
			idle_blocks: state.idle.len(),
			allocations: state.allocations,
			reuses: state.reuses,
		}
	}
}

impl Default for BufferPool {
	fn default() -> Self {
		BufferPool::new(PoolConfig::default())
	}
}

impl fmt::Debug for BufferPool {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("BufferPool").field("stats", &self.stats()).finish()
	}
}

/// An exclusively checked out block of a [`BufferPool`].
///
/// Dereferences to exactly the requested number of bytes. Dropping it returns the block.
pub struct PooledBuffer {
	id: u64,
	data: Vec<u8>,
	pool: Option<BufferPool>,
}

impl PooledBuffer {
	pub fn id(&self) -> u64 {
		self.id
	}

	pub fn len(&self) -> usize {
		self.data.len()
	}

	pub fn is_empty(&self) -> bool {
		self.data.is_empty()
	}

	/// Size of the underlying block, at least [`len`](Self::len).
	pub fn capacity(&self) -> usize {
		self.data.capacity()
	}
}

impl Deref for PooledBuffer {
	type Target = [u8];

	fn deref(&self) -> &[u8] {
		&self.data
	}
}

impl DerefMut for PooledBuffer {
	fn deref_mut(&mut self) -> &mut [u8] {
		&mut self.data
	}
}

impl Drop for PooledBuffer {
	fn drop(&mut self) {
		if let Some(pool) = self.pool.take()
			&& let Err(err) = pool.checkin(self.id, std::mem::take(&mut self.data))
		{
			log::warn!("could not return buffer to its pool: {err}");
		}
	}
}

impl fmt::Debug for PooledBuffer {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "PooledBuffer(#{}: {} of {} bytes)", self.id, self.len(), self.capacity())
	}
}
