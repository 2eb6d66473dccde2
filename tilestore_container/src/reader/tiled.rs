//! A grid reader over one level of a tile data set on disk.
//!
//! Every tile is a raw file of `tile_width * tile_height * sample_size` bytes at the location given
//! by a [`DiskLayout`]. Tiles without a file read as zeros.

use super::{BufferResult, GeoReference, GridReader, RasterDimensions, copy_region, destination};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tilestore_core::{
	Blob, BufferPool, DiskLayout, Rect, StoreError, TileLevel,
	io::{DataReaderFile, DataReaderTrait},
};
use tilestore_derive::context;

#[derive(Debug)]
pub struct TiledGridReader {
	name: String,
	layout: Arc<dyn DiskLayout>,
	level: TileLevel,
	dimensions: RasterDimensions,
	georeference: GeoReference,
	pool: BufferPool,
}

impl TiledGridReader {
	pub fn new(layout: Arc<dyn DiskLayout>, level: TileLevel, sample_size: u32, pool: BufferPool) -> TiledGridReader {
		let raster = level.raster_rect();
		TiledGridReader {
			name: format!("level '{}'", level.identifier),
			dimensions: RasterDimensions {
				width: raster.width,
				height: raster.height,
				sample_size,
			},
			layout,
			level,
			georeference: GeoReference::default(),
			pool,
		}
	}

	#[must_use]
	pub fn with_georeference(mut self, georeference: GeoReference) -> Self {
		self.georeference = georeference;
		self
	}

	pub fn level(&self) -> &TileLevel {
		&self.level
	}

	/// Copies the part of tile `(column, row)` that overlaps `target` into `data`.
	#[context("reading tile {column}/{row} of {}", self.name)]
	async fn read_tile(&self, column: i64, row: i64, target: &Rect, data: &mut Blob) -> Result<()> {
		self.level.check_bounds(column, row)?;
		let (Some(tile_rect), Some(path)) = (
			self.level.tile_rect(column, row),
			self.layout.resolve(&self.level.identifier, column, row),
		) else {
			return Err(StoreError::UnknownLevel(self.level.identifier.clone()).into());
		};
		let Some(overlap) = Rect::intersect(&tile_rect, target) else {
			return Ok(());
		};
		if !path.exists() {
			log::debug!("tile file {path:?} does not exist, reading as no-data");
			return Ok(());
		}

		let reader = DataReaderFile::open(&std::path::absolute(&path)?)?;
		let expected = self.level.tile_bytes(self.dimensions.sample_size);
		let mut buffer = self.pool.allocate(expected)?;
		let actual = reader.read_into(0, &mut buffer).await?;
		if actual != expected {
			return Err(StoreError::ShortRead {
				offset: 0,
				expected: expected as u64,
				actual: actual as u64,
			})
			.with_context(|| format!("tile file {path:?} is truncated"));
		}

		copy_region(
			&buffer,
			&tile_rect,
			data.as_mut_slice(),
			target,
			&overlap,
			self.dimensions.sample_size,
		);
		Ok(())
	}
}

#[async_trait]
impl GridReader for TiledGridReader {
	async fn read(&self, rect: &Rect, dest: Option<Blob>) -> Result<BufferResult> {
		let clipped = self.dimensions.clip(rect)?;
		let mut data = destination(dest, &self.dimensions, &clipped);
		if let Some(tiles) = self.level.intersecting_tiles(&clipped) {
			log::trace!("reading {} tiles of {} for {clipped}", tiles.count(), self.name);
			for (column, row) in tiles.iter() {
				self.read_tile(column, row, &clipped, &mut data).await?;
			}
		}
		Ok(BufferResult { rect: clipped, data })
	}

	fn dimensions(&self) -> RasterDimensions {
		self.dimensions
	}

	fn georeference(&self) -> GeoReference {
		self.georeference
	}

	fn supported_formats(&self) -> Vec<String> {
		vec![String::from("raw")]
	}

	fn can_read_tiles(&self) -> bool {
		true
	}

	fn dispose(&self) {
		log::debug!("disposing tiled reader for {}", self.name);
	}

	fn name(&self) -> &str {
		&self.name
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use assert_fs::TempDir;
	use pretty_assertions::assert_eq;
	use std::fs;
	use tilestore_core::{PoolConfig, TileCacheDiskLayout, TileDataSet, assert_wildcard};

	/// A 3x2 level of 2x2 tiles with one byte per cell. Tile `(c, r)` is filled with `10 * r + c + 1`,
	/// except tile (2, 1), which has no file.
	fn fixture() -> (TempDir, TiledGridReader, BufferPool) {
		let dir = TempDir::new().unwrap();
		let level = TileLevel::new("z", 3, 2, 2, 2);
		let data_set = TileDataSet::new(vec![level]).unwrap();
		let layout = TileCacheDiskLayout::new(dir.path(), "bin", data_set.clone());
		for row in 0..2 {
			for column in 0..3 {
				if (column, row) == (2, 1) {
					continue;
				}
				let path = layout.resolve("z", column, row).unwrap();
				fs::create_dir_all(path.parent().unwrap()).unwrap();
				fs::write(&path, [(10 * row + column + 1) as u8; 4]).unwrap();
			}
		}
		let pool = BufferPool::new(PoolConfig {
			capacity: 1024,
			max_checkouts: 2,
		});
		let level = data_set.level("z").unwrap().clone();
		let reader = TiledGridReader::new(Arc::new(layout), level, 1, pool.clone());
		(dir, reader, pool)
	}

	#[tokio::test]
	async fn read_whole_level() -> Result<()> {
		let (_dir, reader, pool) = fixture();
		assert_eq!(
			reader.dimensions(),
			RasterDimensions {
				width: 6,
				height: 4,
				sample_size: 1
			}
		);
		let result = reader.read_all().await?;
		assert_eq!(result.rect, Rect::new(0, 0, 6, 4));
		let expected: [u8; 24] = [
			1, 1, 2, 2, 3, 3, //
			1, 1, 2, 2, 3, 3, //
			11, 11, 12, 12, 0, 0, //
			11, 11, 12, 12, 0, 0,
		];
		assert_eq!(result.data.as_slice(), &expected);
		assert_eq!(pool.stats().outstanding_checkouts, 0);
		Ok(())
	}

	#[tokio::test]
	async fn read_across_tile_borders() -> Result<()> {
		let (_dir, reader, _pool) = fixture();
		let result = reader.read(&Rect::new(1, 1, 2, 2), None).await?;
		assert_eq!(result.data.as_slice(), &[1, 2, 11, 12]);
		Ok(())
	}

	#[tokio::test]
	async fn truncated_tile_is_a_short_read() -> Result<()> {
		let (dir, reader, pool) = fixture();
		let path = dir.path().join("00/000/000/001/000/000/001.bin");
		fs::write(&path, [9u8; 3])?;

		let err = reader.read(&Rect::new(0, 0, 4, 2), None).await.unwrap_err();
		assert!(matches!(
			StoreError::find(&err),
			Some(StoreError::ShortRead {
				expected: 4,
				actual: 3,
				..
			})
		));
		assert_wildcard!(format!("{err:#}"), "reading tile 1/0 of level 'z': tile file * is truncated: *");
		assert_eq!(pool.stats().outstanding_checkouts, 0);
		Ok(())
	}

	#[tokio::test]
	async fn outside_of_level() {
		let (_dir, reader, _pool) = fixture();
		let err = reader.read(&Rect::new(6, 0, 2, 2), None).await.unwrap_err();
		assert!(matches!(StoreError::find(&err), Some(StoreError::OutsideRaster { .. })));
	}
}
