//! Typed failures of the storage layer.
//!
//! Operations return `anyhow::Result` so that context can be layered on with `#[context]`; the
//! leaf error is always one of the [`StoreError`] variants below (or a `std::io::Error`), and callers
//! classify failures with `err.downcast_ref::<StoreError>()`.
//!
//! None of these conditions is fatal to the hosting process. Every failure is per request.

use std::{sync::Arc, time::Duration};
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum StoreError {
	/// Tile coordinates outside of the declared tile counts of a level.
	#[error("tile {column}/{row} is out of bounds for level '{level}'")]
	OutOfBounds { level: String, column: i64, row: i64 },

	#[error("level '{0}' is not part of the tile data set")]
	UnknownLevel(String),

	/// A request rectangle that does not overlap the raster at all.
	#[error("rectangle {rect} lies outside of the raster ({width}x{height})")]
	OutsideRaster { rect: String, width: u32, height: u32 },

	#[error("short read at offset {offset}: expected {expected} bytes, got {actual}")]
	ShortRead { offset: u64, expected: u64, actual: u64 },

	#[error("pool exhausted: {requested} bytes requested, {outstanding} of {capacity} bytes checked out")]
	PoolExhausted {
		requested: usize,
		outstanding: usize,
		capacity: usize,
	},

	#[error("pool checkout limit of {limit} buffers reached")]
	CheckoutLimit { limit: usize },

	/// Releasing a buffer that this pool does not consider checked out.
	#[error("buffer #{id} is not checked out from this pool")]
	NotCheckedOut { id: u64 },

	#[error("malformed fragment: {0}")]
	MalformedFragment(String),

	#[error("container is not bound to a reader")]
	Unbound,

	/// Failure of a load that may be shared by several waiting callers.
	#[error("loading data failed: {0:#}")]
	LoadFailed(Arc<anyhow::Error>),

	/// The waiting caller gave up; the load itself keeps running.
	#[error("timed out after {0:?} waiting for data")]
	Timeout(Duration),
}

impl StoreError {
	/// Returns the [`StoreError`] at the root of an `anyhow` chain, if there is one.
	pub fn find(err: &anyhow::Error) -> Option<&StoreError> {
		err.chain().find_map(|cause| cause.downcast_ref::<StoreError>())
	}
}
