//! Byte containers handed out by readers and containers.
//!
//! [`Blob`] is an owned, mutable wrapper around `Vec<u8>`. [`ReadOnlyBlob`] is a shared handle to
//! the same kind of data that has no mutable accessors at all, so code that receives cached data
//! cannot modify it; the handle clones in O(1) and never copies the bytes.
//!
//! # Examples
//!
//! ```rust
//! use tilestore_core::{Blob, ReadOnlyBlob};
//!
//! let mut blob = Blob::new_sized(4);
//! blob.as_mut_slice()[0] = 7;
//!
//! let shared = ReadOnlyBlob::from(blob);
//! let other = shared.clone();
//! assert_eq!(other.as_slice(), &[7, 0, 0, 0]);
//! assert!(shared.shares_memory_with(&other));
//! ```

use super::ByteRange;
use anyhow::{Result, bail};
use std::{fmt::Debug, ops::Deref, sync::Arc};

/// A simple wrapper around [`Vec<u8>`].
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Blob(Vec<u8>);

impl Blob {
	#[must_use]
	pub fn new_empty() -> Blob {
		Blob(Vec::new())
	}

	/// Creates a zero-filled `Blob` of `length` bytes.
	#[must_use]
	pub fn new_sized(length: usize) -> Blob {
		Blob(vec![0u8; length])
	}

	/// Returns a new [`Blob`] with the bytes in `range`.
	pub fn read_range(&self, range: &ByteRange) -> Result<Blob> {
		if range.offset + range.length > self.len() {
			bail!("range {range:?} lies outside of a blob of {} bytes", self.len())
		}
		Ok(Blob::from(&self.0[range.as_range_usize()]))
	}

	#[must_use]
	pub fn as_slice(&self) -> &[u8] {
		&self.0
	}

	pub fn as_mut_slice(&mut self) -> &mut [u8] {
		&mut self.0
	}

	/// Resizes to `length` bytes, zero-filling new space. Existing capacity is reused.
	pub fn resize(&mut self, length: usize) {
		self.0.resize(length, 0);
	}

	/// Sets every byte to zero without changing the length.
	pub fn fill_zero(&mut self) {
		self.0.fill(0);
	}

	#[must_use]
	pub fn into_vec(self) -> Vec<u8> {
		self.0
	}

	#[must_use]
	pub fn len(&self) -> u64 {
		self.0.len() as u64
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Space-separated hex dump, mostly for debugging.
	#[must_use]
	pub fn as_hex(&self) -> String {
		self
			.0
			.iter()
			.map(|byte| format!("{byte:02x}"))
			.collect::<Vec<_>>()
			.join(" ")
	}
}

impl From<Vec<u8>> for Blob {
	fn from(item: Vec<u8>) -> Self {
		Blob(item)
	}
}

impl From<&[u8]> for Blob {
	fn from(item: &[u8]) -> Self {
		Blob(item.to_vec())
	}
}

impl<const N: usize> From<&[u8; N]> for Blob {
	fn from(item: &[u8; N]) -> Self {
		Blob(item.to_vec())
	}
}

impl Debug for Blob {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		if self.0.len() <= 16 {
			write!(f, "Blob({}: {})", self.0.len(), self.as_hex())
		} else {
			write!(f, "Blob({} bytes)", self.0.len())
		}
	}
}

/// An immutable, shareable view over a [`Blob`].
///
/// Produced by caches and containers for callers that only read. Cloning shares the backing
/// allocation; there is intentionally no way to obtain `&mut [u8]` from it.
#[derive(Clone, PartialEq, Eq)]
pub struct ReadOnlyBlob(Arc<Blob>);

impl ReadOnlyBlob {
	#[must_use]
	pub fn as_slice(&self) -> &[u8] {
		self.0.as_slice()
	}

	#[must_use]
	pub fn len(&self) -> u64 {
		self.0.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Copies the bytes into a new, caller-owned [`Blob`].
	#[must_use]
	pub fn to_blob(&self) -> Blob {
		Blob::clone(&self.0)
	}

	/// `true` if both handles point at the same allocation.
	#[must_use]
	pub fn shares_memory_with(&self, other: &ReadOnlyBlob) -> bool {
		Arc::ptr_eq(&self.0, &other.0)
	}
}

impl Deref for ReadOnlyBlob {
	type Target = [u8];

	fn deref(&self) -> &[u8] {
		self.as_slice()
	}
}

impl From<Arc<Blob>> for ReadOnlyBlob {
	fn from(item: Arc<Blob>) -> Self {
		ReadOnlyBlob(item)
	}
}

impl From<Blob> for ReadOnlyBlob {
	fn from(item: Blob) -> Self {
		ReadOnlyBlob(Arc::new(item))
	}
}

impl Debug for ReadOnlyBlob {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "ReadOnly{:?}", self.0)
	}
}
