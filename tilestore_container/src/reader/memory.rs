//! A grid reader over a raster held in memory.

use super::{BufferResult, GeoReference, GridReader, RasterDimensions, copy_region, destination};
use anyhow::{Result, ensure};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tilestore_core::{Blob, Rect};

#[derive(Debug)]
pub struct MemoryGridReader {
	name: String,
	dimensions: RasterDimensions,
	georeference: GeoReference,
	formats: Vec<String>,
	data: Blob,
	reads: AtomicU64,
	disposed: AtomicBool,
}

impl MemoryGridReader {
	/// `data` holds `width * height` cells of `sample_size` bytes, row by row.
	pub fn new(name: &str, width: u32, height: u32, sample_size: u32, data: Blob) -> Result<MemoryGridReader> {
		let dimensions = RasterDimensions {
			width,
			height,
			sample_size,
		};
		let expected = dimensions.bytes_for(&dimensions.rect()) as u64;
		ensure!(
			data.len() == expected,
			"raster '{name}' of {width}x{height}x{sample_size} needs {expected} bytes, got {}",
			data.len()
		);
		Ok(MemoryGridReader {
			name: name.to_owned(),
			dimensions,
			georeference: GeoReference::default(),
			formats: vec![String::from("raw")],
			data,
			reads: AtomicU64::new(0),
			disposed: AtomicBool::new(false),
		})
	}

	#[must_use]
	pub fn with_georeference(mut self, georeference: GeoReference) -> Self {
		self.georeference = georeference;
		self
	}

	/// Number of reads served so far.
	pub fn read_count(&self) -> u64 {
		self.reads.load(Ordering::Relaxed)
	}

	pub fn is_disposed(&self) -> bool {
		self.disposed.load(Ordering::Relaxed)
	}
}

#[async_trait]
impl GridReader for MemoryGridReader {
	async fn read(&self, rect: &Rect, dest: Option<Blob>) -> Result<BufferResult> {
		ensure!(!self.is_disposed(), "reader '{}' has been disposed", self.name);
		let clipped = self.dimensions.clip(rect)?;
		let mut data = destination(dest, &self.dimensions, &clipped);
		copy_region(
			self.data.as_slice(),
			&self.dimensions.rect(),
			data.as_mut_slice(),
			&clipped,
			&clipped,
			self.dimensions.sample_size,
		);
		self.reads.fetch_add(1, Ordering::Relaxed);
		Ok(BufferResult { rect: clipped, data })
	}

	fn dimensions(&self) -> RasterDimensions {
		self.dimensions
	}

	fn georeference(&self) -> GeoReference {
		self.georeference
	}

	fn supported_formats(&self) -> Vec<String> {
		self.formats.clone()
	}

	fn can_read_tiles(&self) -> bool {
		false
	}

	fn dispose(&self) {
		log::debug!("disposing memory reader '{}'", self.name);
		self.disposed.store(true, Ordering::Relaxed);
	}

	fn name(&self) -> &str {
		&self.name
	}
}
