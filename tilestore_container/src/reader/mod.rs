//! Grid readers: the upstream data sources that containers are bound to.
//!
//! A [`GridReader`] serves rectangles of a raster of `width * height` cells with `sample_size`
//! bytes per cell, stored row-major. Requests are clipped to the raster; a request that does not
//! overlap it at all is a [`StoreError::OutsideRaster`].

mod memory;
mod offset;
mod tiled;

pub use memory::*;
pub use offset::*;
pub use tiled::*;

use anyhow::Result;
use async_trait::async_trait;
use std::fmt::Debug;
use tilestore_core::{Blob, Rect, StoreError};

/// Size of a raster and of its cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RasterDimensions {
	pub width: u32,
	pub height: u32,
	/// Bytes per cell.
	pub sample_size: u32,
}

impl RasterDimensions {
	pub fn rect(&self) -> Rect {
		Rect::new(0, 0, self.width, self.height)
	}

	pub fn bytes_for(&self, rect: &Rect) -> usize {
		rect.area() as usize * self.sample_size as usize
	}

	/// Clips `rect` to the raster.
	pub fn clip(&self, rect: &Rect) -> Result<Rect> {
		match Rect::intersect(&self.rect(), rect) {
			Some(clipped) if !clipped.is_empty() => Ok(clipped),
			_ => Err(StoreError::OutsideRaster {
				rect: rect.to_string(),
				width: self.width,
				height: self.height,
			}
			.into()),
		}
	}
}

/// Placement of the raster in world coordinates. Not interpreted by the store.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GeoReference {
	pub origin_x: f64,
	pub origin_y: f64,
	pub resolution_x: f64,
	pub resolution_y: f64,
}

impl GeoReference {
	pub fn new(origin_x: f64, origin_y: f64, resolution_x: f64, resolution_y: f64) -> GeoReference {
		GeoReference {
			origin_x,
			origin_y,
			resolution_x,
			resolution_y,
		}
	}
}

/// Data read for a request, together with the rectangle it actually covers.
#[derive(Clone, Debug, PartialEq)]
pub struct BufferResult {
	pub rect: Rect,
	pub data: Blob,
}

#[async_trait]
pub trait GridReader: Debug + Send + Sync {
	/// Reads `rect`, clipped to the raster.
	///
	/// If `dest` is given, its allocation is resized and reused for the result.
	async fn read(&self, rect: &Rect, dest: Option<Blob>) -> Result<BufferResult>;

	fn dimensions(&self) -> RasterDimensions;

	fn georeference(&self) -> GeoReference;

	fn supported_formats(&self) -> Vec<String>;

	fn can_read_tiles(&self) -> bool;

	/// Releases resources held by the reader. Later reads may fail.
	fn dispose(&self);

	fn name(&self) -> &str;

	/// Reads the whole raster.
	async fn read_all(&self) -> Result<BufferResult> {
		self.read(&self.dimensions().rect(), None).await
	}
}

/// Prepares the destination blob for a result of `rect`: resized and zeroed.
pub(crate) fn destination(dest: Option<Blob>, dimensions: &RasterDimensions, rect: &Rect) -> Blob {
	let mut data = dest.unwrap_or_default();
	data.resize(dimensions.bytes_for(rect));
	data.fill_zero();
	data
}

/// Copies the cells of `region` from a row-major buffer covering `src_rect` into one covering
/// `dst_rect`. `region` must lie inside both.
pub(crate) fn copy_region(src: &[u8], src_rect: &Rect, dst: &mut [u8], dst_rect: &Rect, region: &Rect, sample_size: u32) {
	let sample = sample_size as usize;
	let row_bytes = region.width as usize * sample;
	for y in region.y..region.max_y() {
		let src_start = (((y - src_rect.y) * i64::from(src_rect.width) + region.x - src_rect.x) as usize) * sample;
		let dst_start = (((y - dst_rect.y) * i64::from(dst_rect.width) + region.x - dst_rect.x) as usize) * sample;
		dst[dst_start..dst_start + row_bytes].copy_from_slice(&src[src_start..src_start + row_bytes]);
	}
}
