//! Treats one tile of a larger grid as a raster of its own.

use super::{BufferResult, GeoReference, GridReader, RasterDimensions};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tilestore_core::{Blob, Rect};

/// Forwards reads to an upstream reader with the request moved by the origin of `tile`.
///
/// Everything else is answered by the upstream reader unchanged.
#[derive(Debug, Clone)]
pub struct OffsetReader {
	upstream: Arc<dyn GridReader>,
	tile: Rect,
}

impl OffsetReader {
	pub fn new(upstream: Arc<dyn GridReader>, tile: Rect) -> OffsetReader {
		OffsetReader { upstream, tile }
	}

	pub fn tile(&self) -> Rect {
		self.tile
	}
}

#[async_trait]
impl GridReader for OffsetReader {
	async fn read(&self, rect: &Rect, dest: Option<Blob>) -> Result<BufferResult> {
		let rect = rect.translated(self.tile.x, self.tile.y);
		self.upstream.read(&rect, dest).await
	}

	fn dimensions(&self) -> RasterDimensions {
		self.upstream.dimensions()
	}

	fn georeference(&self) -> GeoReference {
		self.upstream.georeference()
	}

	fn supported_formats(&self) -> Vec<String> {
		self.upstream.supported_formats()
	}

	fn can_read_tiles(&self) -> bool {
		self.upstream.can_read_tiles()
	}

	fn dispose(&self) {
		self.upstream.dispose();
	}

	fn name(&self) -> &str {
		self.upstream.name()
	}
}
