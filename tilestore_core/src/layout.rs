//! Mapping of tile addresses to storage locations.
//!
//! [`DiskLayout`] is the seam between tile addressing and the file system. The built-in
//! [`TileCacheDiskLayout`] spreads tiles over a nested directory tree so that no directory holds
//! more than a thousand entries:
//!
//! ```text
//! <base>/<level:02>/<col/1e6:03>/<(col/1e3)%1e3:03>/<col%1e3:03>/<r/1e6:03>/<(r/1e3)%1e3:03>/<r%1e3:03>.<ext>
//! ```
//!
//! where `r = num_tiles_y - 1 - row` counts rows from the top of the level.
//!
//! # Examples
//!
//! ```rust
//! use tilestore_core::{DiskLayout, TileCacheDiskLayout, TileDataSet, TileLevel};
//! use std::path::Path;
//!
//! let data_set = TileDataSet::new(vec![
//!     TileLevel::new("0", 1, 1, 256, 256),
//!     TileLevel::new("1", 2, 2, 256, 256),
//! ]).unwrap();
//! let layout = TileCacheDiskLayout::new(Path::new("/tiles"), "bin", data_set);
//!
//! let path = layout.resolve("1", 1, 0).unwrap();
//! assert_eq!(path, Path::new("/tiles/01/000/000/001/000/000/001.bin"));
//! assert!(layout.resolve("1", 2, 0).is_none());
//! ```

use crate::{TileAddress, TileDataSet};
use std::{
	fmt::Debug,
	path::{Component, Path, PathBuf},
};

/// Resolves tile addresses to storage locations.
///
/// Implementations hold no mutable state and are shared between threads.
pub trait DiskLayout: Debug + Send + Sync {
	/// Location of tile `(column, row)` of level `level_id`.
	///
	/// Returns `None` if the level is unknown or the coordinates are out of bounds.
	fn resolve(&self, level_id: &str, column: i64, row: i64) -> Option<PathBuf>;
}

const GROUP: i64 = 1000;

/// The nested directory layout of tile caches.
#[derive(Clone, Debug)]
pub struct TileCacheDiskLayout {
	base_dir: PathBuf,
	extension: String,
	data_set: TileDataSet,
}

impl TileCacheDiskLayout {
	pub fn new(base_dir: &Path, extension: &str, data_set: TileDataSet) -> TileCacheDiskLayout {
		TileCacheDiskLayout {
			base_dir: base_dir.to_path_buf(),
			extension: extension.trim_start_matches('.').to_owned(),
			data_set,
		}
	}

	pub fn base_dir(&self) -> &Path {
		&self.base_dir
	}

	pub fn extension(&self) -> &str {
		&self.extension
	}

	pub fn data_set(&self) -> &TileDataSet {
		&self.data_set
	}

	/// Inverts [`resolve`](DiskLayout::resolve).
	///
	/// Returns `None` for paths outside of the base directory, with the wrong extension or
	/// depth, with malformed number groups, or pointing at tiles that do not exist in the data set.
	pub fn decode(&self, path: &Path) -> Option<TileAddress> {
		let relative = path.strip_prefix(&self.base_dir).ok()?;
		if relative.extension()?.to_str()? != self.extension {
			return None;
		}
		let relative = relative.with_extension("");

		let parts = relative
			.components()
			.map(|component| match component {
				Component::Normal(part) => part.to_str(),
				_ => None,
			})
			.collect::<Option<Vec<&str>>>()?;
		let [level, columns @ .., r1, r2, r3] = parts.as_slice() else {
			return None;
		};
		if columns.len() != 3 {
			return None;
		}
		let index = parse_group(level)? as usize;
		// only the spelling `resolve` writes: two digits, more from level 100 on
		if format!("{index:02}") != *level {
			return None;
		}

		let level = self.data_set.level_by_index(index)?;
		let column = join_groups(columns[0], columns[1], columns[2])?;
		let inverted_row = join_groups(r1, r2, r3)?;
		let row = i64::from(level.num_tiles_y) - 1 - inverted_row;

		level
			.contains(column, row)
			.then(|| TileAddress::new(&level.identifier, column, row))
	}
}

impl DiskLayout for TileCacheDiskLayout {
	fn resolve(&self, level_id: &str, column: i64, row: i64) -> Option<PathBuf> {
		let level = self.data_set.level(level_id)?;
		if !level.contains(column, row) {
			return None;
		}
		let row = i64::from(level.num_tiles_y) - 1 - row;

		let mut path = self.base_dir.join(format!("{:02}", level.index));
		for group in split_groups(column).into_iter().chain(split_groups(row)) {
			path.push(format!("{group:03}"));
		}
		path.set_extension(&self.extension);
		Some(path)
	}
}

fn split_groups(value: i64) -> [i64; 3] {
	[value / (GROUP * GROUP), (value / GROUP) % GROUP, value % GROUP]
}

fn parse_group(text: &str) -> Option<i64> {
	if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
		return None;
	}
	text.parse().ok()
}

fn join_groups(high: &str, mid: &str, low: &str) -> Option<i64> {
	if mid.len() != 3 || low.len() != 3 || high.len() < 3 {
		return None;
	}
	Some(parse_group(high)? * GROUP * GROUP + parse_group(mid)? * GROUP + parse_group(low)?)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::TileLevel;
	use pretty_assertions::assert_eq;
	use rstest::rstest;

	fn layout() -> TileCacheDiskLayout {
		let data_set = TileDataSet::new(vec![
			TileLevel::new("coarse", 3, 2, 256, 256),
			TileLevel::new("fine", 5000, 2_000_500, 256, 256),
		])
		.unwrap();
		TileCacheDiskLayout::new(Path::new("/data/tiles"), ".png", data_set)
	}

	#[test]
	fn bottom_row_of_level_one() {
		let layout = layout();
		let num_tiles_y = i64::from(layout.data_set().level("fine").unwrap().num_tiles_y);
		let path = layout.resolve("fine", 0, num_tiles_y - 1).unwrap();
		assert_eq!(path, Path::new("/data/tiles/01/000/000/000/000/000/000.png"));
	}

	#[rstest]
	#[case("coarse", 0, 0, "00/000/000/000/000/000/001.png")]
	#[case("coarse", 2, 1, "00/000/000/002/000/000/000.png")]
	#[case("fine", 4321, 0, "01/000/004/321/002/000/499.png")]
	#[case("fine", 1234, 1_000_499, "01/000/001/234/001/000/000.png")]
	fn resolve(#[case] level: &str, #[case] column: i64, #[case] row: i64, #[case] expected: &str) {
		let path = layout().resolve(level, column, row).unwrap();
		assert_eq!(path, Path::new("/data/tiles").join(expected));
	}

	#[rstest]
	#[case("coarse", 3, 0)]
	#[case("coarse", 0, 2)]
	#[case("coarse", -1, 0)]
	#[case("unknown", 0, 0)]
	fn resolve_rejects(#[case] level: &str, #[case] column: i64, #[case] row: i64) {
		assert_eq!(layout().resolve(level, column, row), None);
	}

	#[test]
	fn decode_inverts_resolve() {
		let layout = layout();
		for (level, column, row) in [
			("coarse", 0, 0),
			("coarse", 2, 1),
			("fine", 0, 0),
			("fine", 4999, 2_000_499),
			("fine", 1234, 1_000_499),
		] {
			let path = layout.resolve(level, column, row).unwrap();
			assert_eq!(layout.decode(&path), Some(TileAddress::new(level, column, row)), "{path:?}");
		}
	}

	#[rstest]
	#[case("/elsewhere/00/000/000/000/000/000/000.png")]
	#[case("/data/tiles/00/000/000/000/000/000/000.jpg")]
	#[case("/data/tiles/00/000/000/000/000/000.png")]
	#[case("/data/tiles/00/000/000/0a0/000/000/000.png")]
	#[case("/data/tiles/00/000/000/003/000/000/000.png")]
	#[case("/data/tiles/07/000/000/000/000/000/000.png")]
	#[case("/data/tiles/0/000/000/000/000/000/000.png")]
	#[case("/data/tiles/000/000/000/000/000/000/000.png")]
	fn decode_rejects(#[case] path: &str) {
		assert_eq!(layout().decode(Path::new(path)), None);
	}

	#[test]
	fn three_digit_level_indices() {
		let levels = (0..105).map(|index| TileLevel::new(&format!("l{index}"), 1, 1, 16, 16)).collect();
		let layout = TileCacheDiskLayout::new(Path::new("/data/tiles"), "png", TileDataSet::new(levels).unwrap());

		let path = layout.resolve("l104", 0, 0).unwrap();
		assert_eq!(path, Path::new("/data/tiles/104/000/000/000/000/000/000.png"));
		assert_eq!(layout.decode(&path), Some(TileAddress::new("l104", 0, 0)));

		let path = layout.resolve("l9", 0, 0).unwrap();
		assert_eq!(path, Path::new("/data/tiles/09/000/000/000/000/000/000.png"));
		assert_eq!(layout.decode(&path), Some(TileAddress::new("l9", 0, 0)));
		assert_eq!(layout.decode(Path::new("/data/tiles/009/000/000/000/000/000/000.png")), None);
	}

	#[test]
	fn distinct_tiles_get_distinct_paths() {
		let layout = layout();
		let mut paths = std::collections::HashSet::new();
		for column in 0..3 {
			for row in 0..2 {
				assert!(paths.insert(layout.resolve("coarse", column, row).unwrap()));
			}
		}
		assert_eq!(paths.len(), 6);
	}
}
