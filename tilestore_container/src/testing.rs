//! Shared test utilities for the tilestore_container crate.
//!
//! Only compiled when running tests.

use crate::{BufferResult, GeoReference, GridReader, MemoryGridReader, RasterDimensions};
use anyhow::{Result, bail};
use async_trait::async_trait;
use std::{
	sync::{
		Arc,
		atomic::{AtomicBool, AtomicU64, Ordering},
	},
	time::Duration,
};
use tilestore_core::{Blob, Rect};

/// A square raster filled with one value that counts its reads, optionally slowly or failing.
#[derive(Debug)]
pub struct CountingReader {
	inner: MemoryGridReader,
	reads: AtomicU64,
	delay: Duration,
	failing: AtomicBool,
	panic_next: AtomicBool,
}

impl CountingReader {
	pub fn new(side: u32, fill: u8) -> CountingReader {
		let data = Blob::from(vec![fill; (side * side) as usize]);
		CountingReader {
			inner: MemoryGridReader::new("counting", side, side, 1, data).unwrap(),
			reads: AtomicU64::new(0),
			delay: Duration::ZERO,
			failing: AtomicBool::new(false),
			panic_next: AtomicBool::new(false),
		}
	}

	pub fn with_delay(mut self, delay: Duration) -> Self {
		self.delay = delay;
		self
	}

	pub fn arc(self) -> Arc<CountingReader> {
		Arc::new(self)
	}

	pub fn set_failing(&self, failing: bool) {
		self.failing.store(failing, Ordering::SeqCst);
	}

	/// Makes the next read panic.
	pub fn panic_once(&self) {
		self.panic_next.store(true, Ordering::SeqCst);
	}

	pub fn reads(&self) -> u64 {
		self.reads.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl GridReader for CountingReader {
	async fn read(&self, rect: &Rect, dest: Option<Blob>) -> Result<BufferResult> {
		self.reads.fetch_add(1, Ordering::SeqCst);
		if !self.delay.is_zero() {
			tokio::time::sleep(self.delay).await;
		}
		assert!(!self.panic_next.swap(false, Ordering::SeqCst), "reader crashed");
		if self.failing.load(Ordering::SeqCst) {
			bail!("upstream unavailable");
		}
		self.inner.read(rect, dest).await
	}

	fn dimensions(&self) -> RasterDimensions {
		self.inner.dimensions()
	}

	fn georeference(&self) -> GeoReference {
		self.inner.georeference()
	}

	fn supported_formats(&self) -> Vec<String> {
		self.inner.supported_formats()
	}

	fn can_read_tiles(&self) -> bool {
		false
	}

	fn dispose(&self) {
		self.inner.dispose();
	}

	fn name(&self) -> &str {
		self.inner.name()
	}
}
