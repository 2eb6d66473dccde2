//! An in-memory [`DataReaderTrait`] implementation.

use super::DataReaderTrait;
use crate::{Blob, ByteRange};
use anyhow::{Result, ensure};
use async_trait::async_trait;

#[derive(Debug)]
pub struct DataReaderBlob {
	name: String,
	blob: Blob,
}

impl DataReaderBlob {
	pub fn new(name: &str, blob: Blob) -> DataReaderBlob {
		DataReaderBlob {
			name: name.to_owned(),
			blob,
		}
	}
}

impl From<Blob> for DataReaderBlob {
	fn from(blob: Blob) -> Self {
		DataReaderBlob::new("memory", blob)
	}
}

impl From<Vec<u8>> for DataReaderBlob {
	fn from(data: Vec<u8>) -> Self {
		DataReaderBlob::from(Blob::from(data))
	}
}

#[async_trait]
impl DataReaderTrait for DataReaderBlob {
	async fn read_range(&self, range: &ByteRange) -> Result<Blob> {
		ensure!(
			range.end() <= self.blob.len(),
			"range {range:?} exceeds '{}' of {} bytes",
			self.name,
			self.blob.len()
		);
		self.blob.read_range(range)
	}

	async fn read_all(&self) -> Result<Blob> {
		Ok(self.blob.clone())
	}

	async fn read_into(&self, offset: u64, buffer: &mut [u8]) -> Result<usize> {
		let data = self.blob.as_slice();
		let start = (offset as usize).min(data.len());
		let count = buffer.len().min(data.len() - start);
		buffer[..count].copy_from_slice(&data[start..start + count]);
		Ok(count)
	}

	fn get_size(&self) -> u64 {
		self.blob.len()
	}

	fn get_name(&self) -> &str {
		&self.name
	}
}
