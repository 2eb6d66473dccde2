use anyhow::{Result, anyhow};
use clap::Args;
use std::path::PathBuf;
use tilestore_core::{DiskLayout, StoreConfig};

#[derive(Args, Debug)]
#[command(arg_required_else_help = true, disable_version_flag = true, allow_negative_numbers = true)]
pub struct Subcommand {
	/// store configuration (YAML)
	#[arg(required = true)]
	config: PathBuf,

	/// level identifier
	level: String,

	/// tile column, counted from the left
	column: i64,

	/// tile row, counted from the bottom
	row: i64,
}

pub fn run(arguments: &Subcommand) -> Result<()> {
	println!("{}", tile_path(arguments)?.display());
	Ok(())
}

fn tile_path(arguments: &Subcommand) -> Result<PathBuf> {
	let config = StoreConfig::from_path(&arguments.config)?;
	let layout = config.disk_layout()?;
	layout
		.data_set()
		.get_level(&arguments.level)?
		.check_bounds(arguments.column, arguments.row)?;
	layout
		.resolve(&arguments.level, arguments.column, arguments.row)
		.ok_or_else(|| anyhow!("tile {}/{} has no path", arguments.column, arguments.row))
}
