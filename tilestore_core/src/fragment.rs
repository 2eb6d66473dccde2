//! Reading of binary mesh fragments.
//!
//! A fragment is a flat record addressed by an external `(offset, length)` pair:
//!
//! | field    | type                          | count     |
//! |----------|-------------------------------|-----------|
//! | `N`      | `u32`                         | 1         |
//! | vertices | `f32`                         | `N * 3`   |
//! | normals  | `f32`                         | `N * 3`   |
//! | indices  | `u8`, `u16` or `u32` (by `N`) | remainder |
//!
//! The index width is the smallest type that can address all `N` vertices. The whole record is
//! read into one [`PooledBuffer`], and the typed views returned by a [`Fragment`] borrow from it.
//!
//! # Examples
//!
//! ```rust
//! use tilestore_core::{BufferPool, FragmentReader, IndexWidth, io::DataReaderBlob};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // one vertex at (1, 2, 3) with normal (0, 0, 1) and a single index
//!     let mut bytes = 1u32.to_le_bytes().to_vec();
//!     for value in [1f32, 2.0, 3.0, 0.0, 0.0, 1.0] {
//!         bytes.extend_from_slice(&value.to_le_bytes());
//!     }
//!     bytes.push(0);
//!
//!     let reader: FragmentReader = FragmentReader::new(Box::new(DataReaderBlob::from(bytes)), BufferPool::default());
//!     let fragment = reader.read(0, 29).await?;
//!     assert_eq!(fragment.vertex_count(), 1);
//!     assert_eq!(fragment.vertices().to_vec(), vec![1.0, 2.0, 3.0]);
//!     assert_eq!(fragment.index_width(), IndexWidth::U8);
//!     assert_eq!(fragment.indices().to_vec(), vec![0]);
//!     Ok(())
//! }
//! ```

use crate::{BufferPool, PooledBuffer, StoreError, io::DataReader};
use anyhow::Result;
use byteorder::{ByteOrder, LittleEndian};
use std::{fmt, marker::PhantomData};
use tilestore_derive::context;

/// Byte width of the entries of an index region.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexWidth {
	U8,
	U16,
	U32,
}

impl IndexWidth {
	/// The narrowest width able to address `vertex_count` vertices.
	#[must_use]
	pub fn for_vertex_count(vertex_count: u32) -> IndexWidth {
		match vertex_count {
			0..=255 => IndexWidth::U8,
			256..=65535 => IndexWidth::U16,
			_ => IndexWidth::U32,
		}
	}

	#[must_use]
	pub fn bytes(self) -> usize {
		match self {
			IndexWidth::U8 => 1,
			IndexWidth::U16 => 2,
			IndexWidth::U32 => 4,
		}
	}
}

/// Reads fragments from a random-access source into pooled buffers.
#[derive(Debug)]
pub struct FragmentReader<E: ByteOrder = LittleEndian> {
	source: DataReader,
	pool: BufferPool,
	_phantom: PhantomData<E>,
}

impl<E: ByteOrder> FragmentReader<E> {
	pub fn new(source: DataReader, pool: BufferPool) -> FragmentReader<E> {
		FragmentReader {
			source,
			pool,
			_phantom: PhantomData,
		}
	}

	/// Reads the fragment stored in `length` bytes at `offset`.
	///
	/// Fails with [`StoreError::ShortRead`] if the source ends early and with
	/// [`StoreError::MalformedFragment`] if the bytes do not describe a fragment. The pooled buffer is
	/// returned to the pool on every failure.
	#[context("reading fragment at offset {offset} with {length} bytes from '{}'", self.source.get_name())]
	pub async fn read(&self, offset: u64, length: u64) -> Result<Fragment<E>> {
		let mut buffer = self.pool.allocate(length as usize)?;
		let actual = self.source.read_into(offset, &mut buffer).await?;
		if actual as u64 != length {
			return Err(StoreError::ShortRead {
				offset,
				expected: length,
				actual: actual as u64,
			}
			.into());
		}
		Fragment::parse(buffer)
	}

	pub fn pool(&self) -> &BufferPool {
		&self.pool
	}
}

/// A parsed fragment. Owns its pooled buffer until dropped.
pub struct Fragment<E: ByteOrder = LittleEndian> {
	buffer: PooledBuffer,
	vertex_count: u32,
	index_width: IndexWidth,
	_phantom: PhantomData<E>,
}

const HEADER: usize = 4;

impl<E: ByteOrder> Fragment<E> {
	/// Interprets `buffer` as a fragment, validating all region sizes.
	pub fn parse(buffer: PooledBuffer) -> Result<Fragment<E>> {
		if buffer.len() < HEADER {
			return Err(malformed(format!("{} bytes cannot hold the vertex count", buffer.len())));
		}
		let vertex_count = E::read_u32(&buffer[..HEADER]);
		let array_bytes = u64::from(vertex_count) * 12;
		let required = HEADER as u64 + 2 * array_bytes;
		if (buffer.len() as u64) < required {
			return Err(malformed(format!(
				"{vertex_count} vertices need {required} bytes, fragment has {}",
				buffer.len()
			)));
		}

		let index_width = IndexWidth::for_vertex_count(vertex_count);
		let index_bytes = buffer.len() - required as usize;
		if index_bytes % index_width.bytes() != 0 {
			return Err(malformed(format!(
				"index region of {index_bytes} bytes is not a multiple of {} bytes",
				index_width.bytes()
			)));
		}

		Ok(Fragment {
			buffer,
			vertex_count,
			index_width,
			_phantom: PhantomData,
		})
	}

	pub fn vertex_count(&self) -> u32 {
		self.vertex_count
	}

	pub fn index_width(&self) -> IndexWidth {
		self.index_width
	}

	pub fn byte_len(&self) -> usize {
		self.buffer.len()
	}

	fn array_bytes(&self) -> usize {
		self.vertex_count as usize * 12
	}

	/// `N * 3` vertex coordinates.
	pub fn vertices(&self) -> FloatView<'_, E> {
		FloatView::new(&self.buffer[HEADER..HEADER + self.array_bytes()])
	}

	/// `N * 3` normal components.
	pub fn normals(&self) -> FloatView<'_, E> {
		let start = HEADER + self.array_bytes();
		FloatView::new(&self.buffer[start..start + self.array_bytes()])
	}

	pub fn indices(&self) -> IndexView<'_, E> {
		let start = HEADER + 2 * self.array_bytes();
		IndexView::new(&self.buffer[start..], self.index_width)
	}
}

impl<E: ByteOrder> fmt::Debug for Fragment<E> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Fragment")
			.field("vertex_count", &self.vertex_count)
			.field("index_width", &self.index_width)
			.field("bytes", &self.buffer.len())
			.finish()
	}
}

fn malformed(message: String) -> anyhow::Error {
	StoreError::MalformedFragment(message).into()
}

/// A borrowed run of `f32` values.
#[derive(Clone, Copy)]
pub struct FloatView<'a, E: ByteOrder> {
	bytes: &'a [u8],
	_phantom: PhantomData<E>,
}

impl<'a, E: ByteOrder> FloatView<'a, E> {
	fn new(bytes: &'a [u8]) -> FloatView<'a, E> {
		FloatView {
			bytes,
			_phantom: PhantomData,
		}
	}

	pub fn len(&self) -> usize {
		self.bytes.len() / 4
	}

	pub fn is_empty(&self) -> bool {
		self.bytes.is_empty()
	}

	pub fn get(&self, index: usize) -> Option<f32> {
		let start = index.checked_mul(4)?;
		self.bytes.get(start..start + 4).map(E::read_f32)
	}

	pub fn iter(&self) -> impl Iterator<Item = f32> {
		self.bytes.chunks_exact(4).map(E::read_f32)
	}

	pub fn to_vec(&self) -> Vec<f32> {
		self.iter().collect()
	}

	/// The underlying bytes, still in the fragment's byte order.
	pub fn as_bytes(&self) -> &'a [u8] {
		self.bytes
	}
}

/// A borrowed run of indices, widened to `u32`.
#[derive(Clone, Copy)]
pub struct IndexView<'a, E: ByteOrder> {
	bytes: &'a [u8],
	width: IndexWidth,
	_phantom: PhantomData<E>,
}

impl<'a, E: ByteOrder> IndexView<'a, E> {
	fn new(bytes: &'a [u8], width: IndexWidth) -> IndexView<'a, E> {
		IndexView {
			bytes,
			width,
			_phantom: PhantomData,
		}
	}

	pub fn width(&self) -> IndexWidth {
		self.width
	}

	pub fn len(&self) -> usize {
		self.bytes.len() / self.width.bytes()
	}

	pub fn is_empty(&self) -> bool {
		self.bytes.is_empty()
	}

	pub fn get(&self, index: usize) -> Option<u32> {
		let size = self.width.bytes();
		let start = index.checked_mul(size)?;
		self.bytes.get(start..start + size).map(|chunk| self.decode(chunk))
	}

	fn decode(&self, chunk: &[u8]) -> u32 {
		match self.width {
			IndexWidth::U8 => u32::from(chunk[0]),
			IndexWidth::U16 => u32::from(E::read_u16(chunk)),
			IndexWidth::U32 => E::read_u32(chunk),
		}
	}

	pub fn iter(&self) -> impl Iterator<Item = u32> {
		let view = *self;
		self.bytes.chunks_exact(self.width.bytes()).map(move |chunk| view.decode(chunk))
	}

	pub fn to_vec(&self) -> Vec<u32> {
		self.iter().collect()
	}

	pub fn as_bytes(&self) -> &'a [u8] {
		self.bytes
	}
}
