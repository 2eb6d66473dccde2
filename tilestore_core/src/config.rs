//! YAML configuration of a tile store.
//!
//! ```yaml
//! loading_policy: cached        # none | memory | lazy | cached
//! cache:
//!   max_bytes: 256M
//!   spill_dir: /var/cache/tiles # optional
//! pool:
//!   capacity: 64M
//!   max_checkouts: 64
//! layout:
//!   base_dir: /data/tiles
//!   extension: bin
//! levels:
//!   - identifier: "0"
//!     num_tiles_x: 4
//!     num_tiles_y: 2
//!     tile_width: 256
//!     tile_height: 256
//! sample_size: 1
//! ```
//!
//! Every section is optional. Relative directories are resolved against the directory of the
//! configuration file when it is loaded with [`StoreConfig::from_path`].

use crate::{BufferPool, ByteSize, LoadingPolicy, PoolConfig, TileCacheDiskLayout, TileDataSet, TileLevel};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::{
	fs::File,
	io::{BufReader, Read},
	path::{Path, PathBuf},
};

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
	#[serde(default)]
	pub loading_policy: LoadingPolicy,

	#[serde(default)]
	pub cache: CacheConfig,

	#[serde(default)]
	pub pool: PoolSection,

	#[serde(default)]
	pub layout: LayoutSection,

	#[serde(default)]
	pub levels: Vec<LevelConfig>,

	/// Bytes per raster cell.
	#[serde(default = "default_sample_size")]
	pub sample_size: u32,
}

/// Budget and spill directory of the shared tile cache.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
	#[serde(default = "default_cache_bytes")]
	pub max_bytes: ByteSize,

	/// Where cached entries are written on flush. Without it, flushing does nothing.
	#[serde(default)]
	pub spill_dir: Option<PathBuf>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PoolSection {
	#[serde(default = "default_pool_bytes")]
	pub capacity: ByteSize,

	#[serde(default = "default_max_checkouts")]
	pub max_checkouts: usize,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LayoutSection {
	#[serde(default = "default_base_dir")]
	pub base_dir: PathBuf,

	#[serde(default = "default_extension")]
	pub extension: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LevelConfig {
	pub identifier: String,
	pub num_tiles_x: u32,
	pub num_tiles_y: u32,
	pub tile_width: u32,
	pub tile_height: u32,
}

fn default_sample_size() -> u32 {
	1
}

fn default_cache_bytes() -> ByteSize {
	ByteSize::mib(256)
}

fn default_pool_bytes() -> ByteSize {
	ByteSize::mib(64)
}

fn default_max_checkouts() -> usize {
	64
}

fn default_base_dir() -> PathBuf {
	PathBuf::from(".")
}

fn default_extension() -> String {
	String::from("bin")
}

impl Default for StoreConfig {
	fn default() -> Self {
		StoreConfig {
			loading_policy: LoadingPolicy::default(),
			cache: CacheConfig::default(),
			pool: PoolSection::default(),
			layout: LayoutSection::default(),
			levels: Vec::new(),
			sample_size: default_sample_size(),
		}
	}
}

impl Default for CacheConfig {
	fn default() -> Self {
		CacheConfig {
			max_bytes: default_cache_bytes(),
			spill_dir: None,
		}
	}
}

impl CacheConfig {
	pub fn new(max_bytes: usize, spill_dir: Option<&Path>) -> CacheConfig {
		CacheConfig {
			max_bytes: ByteSize::new(max_bytes as u64),
			spill_dir: spill_dir.map(Path::to_path_buf),
		}
	}
}

impl Default for PoolSection {
	fn default() -> Self {
		PoolSection {
			capacity: default_pool_bytes(),
			max_checkouts: default_max_checkouts(),
		}
	}
}

impl Default for LayoutSection {
	fn default() -> Self {
		LayoutSection {
			base_dir: default_base_dir(),
			extension: default_extension(),
		}
	}
}

impl From<&LevelConfig> for TileLevel {
	fn from(level: &LevelConfig) -> Self {
		TileLevel::new(
			&level.identifier,
			level.num_tiles_x,
			level.num_tiles_y,
			level.tile_width,
			level.tile_height,
		)
	}
}

impl StoreConfig {
	pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
		Ok(serde_yaml_ng::from_reader(reader)?)
	}

	pub fn from_string(text: &str) -> Result<Self> {
		Ok(serde_yaml_ng::from_str(text)?)
	}

	/// Parses a file and resolves relative directories against the file's location.
	pub fn from_path(path: &Path) -> Result<Self> {
		let file = File::open(path).with_context(|| format!("failed to open config {path:?}"))?;
		let mut config =
			StoreConfig::from_reader(BufReader::new(file)).with_context(|| format!("failed to parse config {path:?}"))?;
		config.resolve_paths(path.parent().unwrap_or(Path::new(".")));
		Ok(config)
	}

	pub fn resolve_paths(&mut self, base: &Path) {
		self.layout.base_dir = base.join(&self.layout.base_dir);
		if let Some(spill_dir) = &self.cache.spill_dir {
			self.cache.spill_dir = Some(base.join(spill_dir));
		}
	}

	pub fn data_set(&self) -> Result<TileDataSet> {
		TileDataSet::new(self.levels.iter().map(TileLevel::from).collect())
	}

	pub fn disk_layout(&self) -> Result<TileCacheDiskLayout> {
		Ok(TileCacheDiskLayout::new(
			&self.layout.base_dir,
			&self.layout.extension,
			self.data_set()?,
		))
	}

	pub fn pool_config(&self) -> PoolConfig {
		PoolConfig {
			capacity: self.pool.capacity.as_usize(),
			max_checkouts: self.pool.max_checkouts,
		}
	}

	pub fn pool(&self) -> BufferPool {
		BufferPool::new(self.pool_config())
	}

	pub fn cache(&self) -> CacheConfig {
		self.cache.clone()
	}
}
