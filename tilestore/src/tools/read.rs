use anyhow::{Context, Result};
use clap::Args;
use std::{fmt::Write, path::PathBuf, sync::Arc};
use tilestore_container::{ContainerRegistry, GridReader, OffsetReader, TileCache, TiledGridReader};
use tilestore_core::{DiskLayout, LoadingPolicy, Rect, StoreConfig};

#[derive(Args, Debug)]
#[command(arg_required_else_help = true, disable_version_flag = true)]
pub struct Subcommand {
	/// store configuration (YAML)
	#[arg(required = true)]
	config: PathBuf,

	/// level identifier
	level: String,

	/// loading policy, overrides the configuration (none, memory, lazy, cached)
	#[arg(long)]
	policy: Option<String>,

	/// how often the data is requested
	#[arg(long, default_value_t = 1)]
	repeat: u32,

	/// additionally read a single tile through an offset reader
	#[arg(long, value_name = "COLUMN/ROW")]
	tile: Option<String>,
}

#[tokio::main]
pub async fn run(arguments: &Subcommand) -> Result<()> {
	print!("{}", read(arguments).await?);
	Ok(())
}

async fn read(arguments: &Subcommand) -> Result<String> {
	let config = StoreConfig::from_path(&arguments.config)?;
	let layout = config.disk_layout()?;
	let level = layout.data_set().get_level(&arguments.level)?.clone();
	let layout: Arc<dyn DiskLayout> = Arc::new(layout);
	let reader: Arc<dyn GridReader> = Arc::new(TiledGridReader::new(
		layout,
		level.clone(),
		config.sample_size,
		config.pool(),
	));

	let policy = arguments
		.policy
		.as_deref()
		.map_or(config.loading_policy, LoadingPolicy::parse);
	let cache = Arc::new(TileCache::new(config.cache()));
	let registry = ContainerRegistry::new(Arc::clone(&cache));
	let container = registry.with_loading_policy(Arc::clone(&reader), policy).await?;

	let mut bytes = 0;
	for _ in 0..arguments.repeat {
		bytes = container.get_read_only_data().await?.len();
	}
	let stats = container.stats();
	let cache_stats = cache.stats();

	let mut text = String::new();
	writeln!(text, "read {bytes} bytes of {} with policy '{}'", reader.name(), container.policy())?;
	writeln!(
		text,
		"container: {} hits, {} misses, {} bytes held",
		stats.hits,
		stats.misses,
		container.occupied_bytes()
	)?;
	writeln!(
		text,
		"cache: {} entries, {} of {} bytes, {} evictions",
		cache_stats.entries,
		cache_stats.occupied_bytes,
		cache.max_bytes(),
		cache_stats.evictions
	)?;

	if let Some(tile) = &arguments.tile {
		let (column, row) = parse_tile(tile)?;
		level.check_bounds(column, row)?;
		let tile_rect = level
			.tile_rect(column, row)
			.with_context(|| format!("tile {tile} has no cells"))?;
		let tile_reader = OffsetReader::new(Arc::clone(&reader), tile_rect);
		let result = tile_reader
			.read(&Rect::new(0, 0, tile_rect.width, tile_rect.height), None)
			.await?;
		let filled = result.data.as_slice().iter().filter(|value| **value != 0).count();
		writeln!(
			text,
			"tile {column}/{row}: {} bytes at {}, {filled} non-zero",
			result.data.len(),
			result.rect
		)?;
	}

	let unused = cache.clear(true);
	log::debug!("released {unused} cached bytes");
	Ok(text)
}

fn parse_tile(text: &str) -> Result<(i64, i64)> {
	let (column, row) = text
		.split_once('/')
		.with_context(|| format!("tile '{text}' must be given as COLUMN/ROW"))?;
	Ok((
		column.trim().parse().with_context(|| format!("invalid column in '{text}'"))?,
		row.trim().parse().with_context(|| format!("invalid row in '{text}'"))?,
	))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::tests::run_command;
	use assert_fs::{TempDir, prelude::*};
	use clap::Parser;
	use pretty_assertions::assert_eq;
	use tilestore_core::StoreError;

	#[derive(Parser)]
	struct TestCli {
		#[command(flatten)]
		arguments: Subcommand,
	}

	/// A store with one level of 2x1 tiles of 2x2 cells, where only tile 0/0 exists.
	fn store() -> Result<TempDir> {
		let dir = TempDir::new()?;
		dir.child("store.yml").write_str(
			"loading_policy: lazy\nlayout:\n  base_dir: tiles\nlevels:\n  - identifier: base\n    num_tiles_x: 2\n    num_tiles_y: 1\n    tile_width: 2\n    tile_height: 2\n",
		)?;
		dir.child("tiles/00/000/000/000/000/000").create_dir_all()?;
		dir.child("tiles/00/000/000/000/000/000/000.bin").write_binary(&[1, 2, 3, 4])?;
		Ok(dir)
	}

	async fn read_store(dir: &TempDir, args: &[&str]) -> Result<String> {
		let config = dir.child("store.yml");
		let path = config.path().to_str().unwrap();
		let cli = TestCli::try_parse_from(["read", path, "base"].into_iter().chain(args.iter().copied()))?;
		read(&cli.arguments).await
	}

	#[tokio::test]
	async fn lazy_container_from_configuration() -> Result<()> {
		let dir = store()?;
		let text = read_store(&dir, &["--repeat", "3"]).await?;
		let lines: Vec<&str> = text.lines().collect();
		assert_eq!(lines[0], "read 8 bytes of level 'base' with policy 'lazy'");
		assert_eq!(lines[1], "container: 2 hits, 1 misses, 8 bytes held");
		assert_eq!(lines[2], "cache: 0 entries, 0 of 268435456 bytes, 0 evictions");
		Ok(())
	}

	#[tokio::test]
	async fn cached_policy_override() -> Result<()> {
		let dir = store()?;
		let text = read_store(&dir, &["--policy", "CACHED", "--repeat", "2"]).await?;
		assert_eq!(
			text.lines().collect::<Vec<_>>()[1..],
			[
				"container: 1 hits, 1 misses, 8 bytes held",
				"cache: 1 entries, 8 of 268435456 bytes, 0 evictions"
			]
		);
		Ok(())
	}

	#[tokio::test]
	async fn single_tiles() -> Result<()> {
		let dir = store()?;
		let text = read_store(&dir, &["--tile", "0/0"]).await?;
		assert_eq!(text.lines().last(), Some("tile 0/0: 4 bytes at [0,0 2x2], 4 non-zero"));

		let text = read_store(&dir, &["--tile", "1/0", "--policy", "memory"]).await?;
		assert_eq!(text.lines().last(), Some("tile 1/0: 4 bytes at [2,0 2x2], 0 non-zero"));

		let err = read_store(&dir, &["--tile", "2/0"]).await.unwrap_err();
		assert!(matches!(StoreError::find(&err), Some(StoreError::OutOfBounds { .. })));
		assert!(read_store(&dir, &["--tile", "1"]).await.is_err());
		Ok(())
	}

	#[test]
	fn tile_argument() {
		assert_eq!(parse_tile("3/14").unwrap(), (3, 14));
		assert_eq!(parse_tile(" 0 / 2 ").unwrap(), (0, 2));
		assert_eq!(
			parse_tile("a/2").unwrap_err().to_string(),
			"invalid column in 'a/2'"
		);
	}

	#[test]
	fn command_line() -> Result<()> {
		let dir = store()?;
		let config = dir.child("store.yml");
		run_command(vec!["tilestore", "read", config.path().to_str().unwrap(), "base", "--tile", "0/0"])?;
		Ok(())
	}
}
