//! This module provides the [`Rect`] struct, an integer rectangle in raster cell units.
//!
//! Every higher component describes regions of a raster with it: tile extents within a level,
//! request rectangles handed to grid readers and the overlap between the two.
//!
//! # Examples
//!
//! ```rust
//! use tilestore_core::Rect;
//!
//! let tile = Rect::new(256, 0, 256, 256);
//! let request = Rect::new(200, 100, 100, 100);
//! assert_eq!(Rect::intersect(&tile, &request), Some(Rect::new(256, 100, 44, 100)));
//! ```

use std::fmt;

/// A rectangle with an integer origin and an unsigned size.
///
/// The size is unsigned so `width >= 0` and `height >= 0` hold by construction.
#[derive(Clone, Copy, Default, Eq, Hash, PartialEq)]
pub struct Rect {
	pub x: i64,
	pub y: i64,
	pub width: u32,
	pub height: u32,
}

impl Rect {
	#[must_use]
	pub const fn new(x: i64, y: i64, width: u32, height: u32) -> Rect {
		Rect { x, y, width, height }
	}

	/// Exclusive right edge.
	#[must_use]
	pub fn max_x(&self) -> i64 {
		self.x + i64::from(self.width)
	}

	/// Exclusive bottom edge.
	#[must_use]
	pub fn max_y(&self) -> i64 {
		self.y + i64::from(self.height)
	}

	#[must_use]
	pub fn area(&self) -> u64 {
		u64::from(self.width) * u64::from(self.height)
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.width == 0 || self.height == 0
	}

	/// Returns the same rectangle moved by `(dx, dy)`.
	#[must_use]
	pub fn translated(&self, dx: i64, dy: i64) -> Rect {
		Rect::new(self.x + dx, self.y + dy, self.width, self.height)
	}

	/// `true` if `other` lies completely inside `self`.
	#[must_use]
	pub fn contains_rect(&self, other: &Rect) -> bool {
		other.x >= self.x && other.y >= self.y && other.max_x() <= self.max_x() && other.max_y() <= self.max_y()
	}

	/// Computes the maximal rectangle covered by both `a` and `b`.
	///
	/// Returns `None` if they do not overlap. Rectangles that only share an edge or a corner
	/// do not overlap.
	#[must_use]
	pub fn intersect(a: &Rect, b: &Rect) -> Option<Rect> {
		let a_max_x = a.max_x();
		let a_max_y = a.max_y();
		let b_max_x = b.max_x();
		let b_max_y = b.max_y();

		if b.x >= a_max_x || b_max_x <= a.x || b.y >= a_max_y || b_max_y <= a.y {
			return None;
		}

		let x = a.x.max(b.x);
		let y = a.y.max(b.y);
		Some(Rect::new(
			x,
			y,
			(a_max_x.min(b_max_x) - x) as u32,
			(a_max_y.min(b_max_y) - y) as u32,
		))
	}
}

impl fmt::Debug for Rect {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Rect({}, {}, {}x{})", self.x, self.y, self.width, self.height)
	}
}

impl fmt::Display for Rect {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "[{},{} {}x{}]", self.x, self.y, self.width, self.height)
	}
}
