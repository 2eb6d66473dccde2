//! This module provides the `ByteRange` struct, an offset/length pair addressing bytes in a source.
//!
//! Fragments in a fragment file are addressed this way; the index of offsets and lengths is kept by
//! the caller.
//!
//! # Examples
//!
//! ```rust
//! use tilestore_core::ByteRange;
//!
//! let range = ByteRange::new(23, 42);
//! assert_eq!(range.end(), 65);
//! assert_eq!(range.as_range_usize(), 23..65);
//! ```

use std::fmt;
use std::ops::Range;

#[derive(Clone, Copy, Default, Eq, Hash, PartialEq)]
pub struct ByteRange {
	/// The starting offset of the byte range.
	pub offset: u64,
	/// The length of the byte range.
	pub length: u64,
}

impl ByteRange {
	#[must_use]
	pub fn new(offset: u64, length: u64) -> Self {
		Self { offset, length }
	}

	/// Exclusive end offset.
	#[must_use]
	pub fn end(&self) -> u64 {
		self.offset + self.length
	}

	#[must_use]
	pub fn shifted_forward(&self, offset: u64) -> Self {
		Self::new(self.offset + offset, self.length)
	}

	#[must_use]
	pub fn as_range_usize(&self) -> Range<usize> {
		self.offset as usize..self.end() as usize
	}
}

impl fmt::Debug for ByteRange {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}..{}", self.offset, self.end())
	}
}
