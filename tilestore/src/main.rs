mod tools;

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_verbosity_flag::{Verbosity, WarnLevel};

#[derive(Parser, Debug)]
#[command(
	author,
	version,
	about,
	long_about = None,
	propagate_version = true,
	disable_help_subcommand = true,
)]
struct Cli {
	#[command(subcommand)]
	command: Commands,

	#[command(flatten)]
	verbose: Verbosity<WarnLevel>,
}

#[derive(Subcommand, Debug)]
enum Commands {
	/// Print the file path of a tile
	Path(tools::path::Subcommand),

	/// Read one mesh fragment from a file
	Fragment(tools::fragment::Subcommand),

	/// Show the levels of a store configuration and which tile files exist
	Probe(tools::probe::Subcommand),

	/// Read the raster of a level through a data container
	Read(tools::read::Subcommand),
}

fn main() -> Result<()> {
	let cli = Cli::parse();

	env_logger::Builder::new()
		.filter_level(cli.verbose.log_level_filter())
		.format_timestamp(None)
		.init();

	run(&cli)
}

fn run(cli: &Cli) -> Result<()> {
	match &cli.command {
		Commands::Path(arguments) => tools::path::run(arguments),
		Commands::Fragment(arguments) => tools::fragment::run(arguments),
		Commands::Probe(arguments) => tools::probe::run(arguments),
		Commands::Read(arguments) => tools::read::run(arguments),
	}
}
