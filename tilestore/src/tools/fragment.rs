use anyhow::Result;
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use clap::Args;
use std::{fmt::Write, path::PathBuf};
use tilestore_core::{
	BufferPool, Fragment, FragmentReader,
	io::{DataReaderFile, DataReaderTrait},
};

#[derive(Args, Debug)]
#[command(arg_required_else_help = true, disable_version_flag = true)]
pub struct Subcommand {
	/// file containing the fragment
	#[arg(required = true)]
	filename: PathBuf,

	/// byte offset of the fragment in the file
	#[arg(long, default_value_t = 0)]
	offset: u64,

	/// byte length of the fragment, defaults to the rest of the file
	#[arg(long)]
	length: Option<u64>,

	/// the fragment is stored big-endian
	#[arg(long)]
	big_endian: bool,
}

#[tokio::main]
pub async fn run(arguments: &Subcommand) -> Result<()> {
	print!("{}", describe(arguments).await?);
	Ok(())
}

async fn describe(arguments: &Subcommand) -> Result<String> {
	let source = DataReaderFile::open(&std::path::absolute(&arguments.filename)?)?;
	let length = arguments
		.length
		.unwrap_or_else(|| source.get_size().saturating_sub(arguments.offset));
	let pool = BufferPool::default();

	if arguments.big_endian {
		let reader: FragmentReader<BigEndian> = FragmentReader::new(source, pool);
		summarize(&reader.read(arguments.offset, length).await?)
	} else {
		let reader: FragmentReader<LittleEndian> = FragmentReader::new(source, pool);
		summarize(&reader.read(arguments.offset, length).await?)
	}
}

fn summarize<E: ByteOrder>(fragment: &Fragment<E>) -> Result<String> {
	let vertices = fragment.vertices().to_vec();
	let mut text = String::new();
	writeln!(text, "bytes:    {}", fragment.byte_len())?;
	writeln!(text, "vertices: {}", fragment.vertex_count())?;
	writeln!(
		text,
		"indices:  {} ({} bytes each)",
		fragment.indices().len(),
		fragment.index_width().bytes()
	)?;
	if !vertices.is_empty() {
		let mut min = [f32::INFINITY; 3];
		let mut max = [f32::NEG_INFINITY; 3];
		for vertex in vertices.chunks_exact(3) {
			for axis in 0..3 {
				min[axis] = min[axis].min(vertex[axis]);
				max[axis] = max[axis].max(vertex[axis]);
			}
		}
		writeln!(text, "bounds:   {min:?} .. {max:?}")?;
	}
	Ok(text)
}
