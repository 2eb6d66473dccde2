//! This module provides functionality for reading data from files.
//!
//! The file must exist, be given by an absolute path and be a regular file. Reads clone the file
//! handle, so one `DataReaderFile` can serve concurrent reads.
//!
//! # Examples
//!
//! ```rust
//! use tilestore_core::{io::{DataReaderFile, DataReaderTrait}, ByteRange};
//! use anyhow::Result;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let dir = tempfile::tempdir()?;
//!     let path = dir.path().join("tile.bin");
//!     std::fs::write(&path, b"raster payload")?;
//!
//!     let reader = DataReaderFile::open(&path)?;
//!     assert_eq!(reader.read_range(&ByteRange::new(7, 7)).await?.as_slice(), b"payload");
//!     Ok(())
//! }
//! ```

use super::DataReaderTrait;
use crate::{Blob, ByteRange, StoreError};
use anyhow::{Context, Result, ensure};
use async_trait::async_trait;
use std::{
	fs::File,
	io::{ErrorKind, Read, Seek, SeekFrom},
	path::Path,
};

/// A struct that provides reading capabilities from a file.
#[derive(Debug)]
pub struct DataReaderFile {
	name: String,
	file: File,
	size: u64,
}

impl DataReaderFile {
	/// Opens a file and creates a `DataReaderFile` instance.
	pub fn open(path: &Path) -> Result<Box<DataReaderFile>> {
		ensure!(path.exists(), "file {path:?} does not exist");
		ensure!(path.is_absolute(), "path {path:?} must be absolute");
		ensure!(path.is_file(), "path {path:?} must be a file");

		let path = path.canonicalize()?;
		let file = File::open(&path).with_context(|| format!("failed to open {path:?}"))?;
		let size = file.metadata()?.len();

		Ok(Box::new(DataReaderFile {
			name: path.to_string_lossy().into_owned(),
			file,
			size,
		}))
	}

	fn positioned(&self, offset: u64) -> Result<File> {
		let mut file = self
			.file
			.try_clone()
			.with_context(|| format!("failed to clone file '{}'", self.name))?;
		file
			.seek(SeekFrom::Start(offset))
			.with_context(|| format!("failed to seek to offset {offset} in file '{}'", self.name))?;
		Ok(file)
	}
}

#[async_trait]
impl DataReaderTrait for DataReaderFile {
	async fn read_range(&self, range: &ByteRange) -> Result<Blob> {
		let mut buffer = Blob::new_sized(range.length as usize);
		let actual = self.read_into(range.offset, buffer.as_mut_slice()).await?;
		if actual as u64 != range.length {
			return Err(StoreError::ShortRead {
				offset: range.offset,
				expected: range.length,
				actual: actual as u64,
			})
			.with_context(|| format!("reading {range:?} from '{}'", self.name));
		}
		Ok(buffer)
	}

	async fn read_all(&self) -> Result<Blob> {
		self.read_range(&ByteRange::new(0, self.size)).await
	}

	async fn read_into(&self, offset: u64, buffer: &mut [u8]) -> Result<usize> {
		let mut file = self.positioned(offset)?;
		let mut filled = 0;
		while filled < buffer.len() {
			match file.read(&mut buffer[filled..]) {
				Ok(0) => break,
				Ok(count) => filled += count,
				Err(err) if err.kind() == ErrorKind::Interrupted => {}
				Err(err) => {
					return Err(err).with_context(|| {
						format!(
							"failed to read {} bytes at offset {offset} in file '{}'",
							buffer.len(),
							self.name
						)
					});
				}
			}
		}
		Ok(filled)
	}

	fn get_size(&self) -> u64 {
		self.size
	}

	fn get_name(&self) -> &str {
		&self.name
	}
}
