//! Tile addressing within the levels of a tile data set.
//!
//! A [`TileLevel`] is a raster split into `num_tiles_x * num_tiles_y` tiles of `tile_width *
//! tile_height` cells. Tile `(column, row)` covers the cells starting at `(column * tile_width,
//! row * tile_height)`. Levels are owned by a [`TileDataSet`], which fixes their ordinal index.
//!
//! # Examples
//!
//! ```rust
//! use tilestore_core::{Rect, TileDataSet, TileLevel};
//!
//! let data_set = TileDataSet::new(vec![
//!     TileLevel::new("overview", 2, 1, 256, 256),
//!     TileLevel::new("detail", 8, 4, 256, 256),
//! ]).unwrap();
//!
//! let level = data_set.level("detail").unwrap();
//! assert_eq!(level.index, 1);
//! assert_eq!(level.tile_rect(1, 2), Some(Rect::new(256, 512, 256, 256)));
//! assert_eq!(level.tile_rect(8, 0), None);
//! ```

use super::Rect;
use crate::StoreError;
use anyhow::{Result, ensure};
use std::{collections::HashMap, fmt};

/// One resolution level of a tile data set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TileLevel {
	pub identifier: String,
	/// Position in the data set, assigned by [`TileDataSet::new`].
	pub index: usize,
	pub num_tiles_x: u32,
	pub num_tiles_y: u32,
	pub tile_width: u32,
	pub tile_height: u32,
}

impl TileLevel {
	/// Creates a level with index 0. The real index is set when the level joins a data set.
	pub fn new(identifier: &str, num_tiles_x: u32, num_tiles_y: u32, tile_width: u32, tile_height: u32) -> TileLevel {
		TileLevel {
			identifier: identifier.to_owned(),
			index: 0,
			num_tiles_x,
			num_tiles_y,
			tile_width,
			tile_height,
		}
	}

	#[must_use]
	pub fn contains(&self, column: i64, row: i64) -> bool {
		(0..i64::from(self.num_tiles_x)).contains(&column) && (0..i64::from(self.num_tiles_y)).contains(&row)
	}

	/// Like [`contains`](Self::contains), but reports the failing coordinates as
	/// [`StoreError::OutOfBounds`].
	pub fn check_bounds(&self, column: i64, row: i64) -> Result<()> {
		if self.contains(column, row) {
			Ok(())
		} else {
			Err(StoreError::OutOfBounds {
				level: self.identifier.clone(),
				column,
				row,
			}
			.into())
		}
	}

	/// The cell rectangle of tile `(column, row)`, or `None` if the tile is out of bounds.
	#[must_use]
	pub fn tile_rect(&self, column: i64, row: i64) -> Option<Rect> {
		if !self.contains(column, row) {
			return None;
		}
		Some(Rect::new(
			column * i64::from(self.tile_width),
			row * i64::from(self.tile_height),
			self.tile_width,
			self.tile_height,
		))
	}

	/// The rectangle covered by all tiles of this level.
	///
	/// Sides that do not fit into `u32` saturate; [`TileDataSet::new`] rejects such levels.
	#[must_use]
	pub fn raster_rect(&self) -> Rect {
		Rect::new(
			0,
			0,
			self.num_tiles_x.saturating_mul(self.tile_width),
			self.num_tiles_y.saturating_mul(self.tile_height),
		)
	}

	/// Number of bytes of one tile file with `sample_size` bytes per cell.
	#[must_use]
	pub fn tile_bytes(&self, sample_size: u32) -> usize {
		self.tile_width as usize * self.tile_height as usize * sample_size as usize
	}

	/// All tiles touched by `rect`, or `None` if `rect` does not overlap the level.
	#[must_use]
	pub fn intersecting_tiles(&self, rect: &Rect) -> Option<TileRange> {
		let clipped = Rect::intersect(&self.raster_rect(), rect)?;
		if clipped.is_empty() {
			return None;
		}
		let tile_width = i64::from(self.tile_width);
		let tile_height = i64::from(self.tile_height);
		Some(TileRange {
			column_min: clipped.x / tile_width,
			row_min: clipped.y / tile_height,
			column_max: (clipped.max_x() - 1) / tile_width,
			row_max: (clipped.max_y() - 1) / tile_height,
		})
	}
}

/// An inclusive range of tile columns and rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileRange {
	pub column_min: i64,
	pub row_min: i64,
	pub column_max: i64,
	pub row_max: i64,
}

impl TileRange {
	#[must_use]
	pub fn count(&self) -> u64 {
		((self.column_max - self.column_min + 1) * (self.row_max - self.row_min + 1)) as u64
	}

	/// Iterates `(column, row)` pairs, row by row.
	pub fn iter(&self) -> impl Iterator<Item = (i64, i64)> + use<> {
		let TileRange {
			column_min,
			row_min,
			column_max,
			row_max,
		} = *self;
		(row_min..=row_max).flat_map(move |row| (column_min..=column_max).map(move |column| (column, row)))
	}
}

/// A fully qualified tile: level identifier plus column and row.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TileAddress {
	pub level: String,
	pub column: i64,
	pub row: i64,
}

impl TileAddress {
	pub fn new(level: &str, column: i64, row: i64) -> TileAddress {
		TileAddress {
			level: level.to_owned(),
			column,
			row,
		}
	}
}

impl fmt::Display for TileAddress {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}/{}/{}", self.level, self.column, self.row)
	}
}

/// The ordered list of levels of one tile data set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TileDataSet {
	levels: Vec<TileLevel>,
	lookup: HashMap<String, usize>,
}

impl TileDataSet {
	/// Builds a data set, assigning every level its position as `index`.
	pub fn new(levels: Vec<TileLevel>) -> Result<TileDataSet> {
		let mut lookup = HashMap::new();
		let mut indexed = Vec::with_capacity(levels.len());
		for (index, mut level) in levels.into_iter().enumerate() {
			ensure!(
				level.tile_width > 0 && level.tile_height > 0,
				"level '{}' must have a non-empty tile size",
				level.identifier
			);
			ensure!(
				level.num_tiles_x.checked_mul(level.tile_width).is_some()
					&& level.num_tiles_y.checked_mul(level.tile_height).is_some(),
				"level '{}' is too large: a raster side exceeds {} cells",
				level.identifier,
				u32::MAX
			);
			ensure!(
				lookup.insert(level.identifier.clone(), index).is_none(),
				"level '{}' is defined twice",
				level.identifier
			);
			level.index = index;
			indexed.push(level);
		}
		Ok(TileDataSet {
			levels: indexed,
			lookup,
		})
	}

	#[must_use]
	pub fn level(&self, identifier: &str) -> Option<&TileLevel> {
		self.lookup.get(identifier).map(|index| &self.levels[*index])
	}

	/// Like [`level`](Self::level), failing with [`StoreError::UnknownLevel`].
	pub fn get_level(&self, identifier: &str) -> Result<&TileLevel> {
		self
			.level(identifier)
			.ok_or_else(|| StoreError::UnknownLevel(identifier.to_owned()).into())
	}

	#[must_use]
	pub fn level_by_index(&self, index: usize) -> Option<&TileLevel> {
		self.levels.get(index)
	}

	pub fn levels(&self) -> &[TileLevel] {
		&self.levels
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.levels.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.levels.is_empty()
	}
}
