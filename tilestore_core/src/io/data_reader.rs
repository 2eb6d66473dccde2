//! This module defines the `DataReaderTrait` for reading bytes from random-access sources.
//!
//! # Examples
//!
//! ```rust
//! use tilestore_core::{io::{DataReader, DataReaderBlob}, Blob, ByteRange};
//! use anyhow::Result;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let reader: DataReader = Box::new(DataReaderBlob::from(Blob::from(vec![1, 2, 3, 4, 5])));
//!
//!     let partial = reader.read_range(&ByteRange::new(1, 3)).await?;
//!     assert_eq!(partial.as_slice(), &[2, 3, 4]);
//!
//!     let mut buffer = [0u8; 4];
//!     assert_eq!(reader.read_into(3, &mut buffer).await?, 2);
//!     Ok(())
//! }
//! ```

use crate::{Blob, ByteRange};
use anyhow::Result;
use async_trait::async_trait;
use std::fmt::Debug;

/// Type alias for a boxed dynamic implementation of the `DataReaderTrait`.
pub type DataReader = Box<dyn DataReaderTrait>;

/// A trait for reading data from various sources.
#[async_trait]
pub trait DataReaderTrait: Debug + Send + Sync {
	/// Reads exactly the bytes in `range`. Fails if the source ends before the range does.
	async fn read_range(&self, range: &ByteRange) -> Result<Blob>;

	/// Reads the whole source.
	async fn read_all(&self) -> Result<Blob>;

	/// Reads up to `buffer.len()` bytes starting at `offset` into `buffer`.
	///
	/// Returns the number of bytes actually read, which is smaller than the buffer only when the
	/// source ends first. Callers decide whether a short read is an error.
	async fn read_into(&self, offset: u64, buffer: &mut [u8]) -> Result<usize>;

	/// Total size of the source in bytes.
	fn get_size(&self) -> u64;

	/// Gets the name of the data source.
	fn get_name(&self) -> &str;
}
