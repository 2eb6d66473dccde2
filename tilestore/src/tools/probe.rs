use anyhow::Result;
use clap::Args;
use std::{fmt::Write, path::PathBuf};
use tilestore_core::{DiskLayout, StoreConfig};

#[derive(Args, Debug)]
#[command(arg_required_else_help = true, disable_version_flag = true)]
pub struct Subcommand {
	/// store configuration (YAML)
	#[arg(required = true)]
	config: PathBuf,
}

pub fn run(arguments: &Subcommand) -> Result<()> {
	print!("{}", probe(arguments)?);
	Ok(())
}

fn probe(arguments: &Subcommand) -> Result<String> {
	let config = StoreConfig::from_path(&arguments.config)?;
	let layout = config.disk_layout()?;
	log::debug!("probing {:?} with tiles in {:?}", arguments.config, layout.base_dir());

	let mut text = String::new();
	writeln!(text, "loading policy: {}", config.loading_policy)?;
	match &config.cache.spill_dir {
		Some(spill_dir) => writeln!(text, "cache:          {} (spill to {})", config.cache.max_bytes, spill_dir.display())?,
		None => writeln!(text, "cache:          {}", config.cache.max_bytes)?,
	}
	writeln!(
		text,
		"pool:           {} in at most {} buffers",
		config.pool.capacity, config.pool.max_checkouts
	)?;
	writeln!(text, "sample size:    {} bytes", config.sample_size)?;
	writeln!(text, "tiles:          {}/**/*.{}", layout.base_dir().display(), layout.extension())?;

	for level in layout.data_set().levels() {
		let raster = level.raster_rect();
		let tiles = level.intersecting_tiles(&raster);
		let total = tiles.as_ref().map_or(0, |tiles| tiles.count());
		let existing = tiles
			.iter()
			.flat_map(|tiles| tiles.iter())
			.filter_map(|(column, row)| layout.resolve(&level.identifier, column, row))
			.filter(|path| path.is_file())
			.count();
		writeln!(
			text,
			"level {} '{}': {}x{} tiles of {}x{} cells, raster {}x{}, {existing} of {total} tile files present",
			level.index,
			level.identifier,
			level.num_tiles_x,
			level.num_tiles_y,
			level.tile_width,
			level.tile_height,
			raster.width,
			raster.height,
		)?;
	}
	Ok(text)
}
