//! Random-access byte sources.
//!
//! Tile files and fragment files are both read through [`DataReaderTrait`], either backed by a
//! file on disk ([`DataReaderFile`]) or by memory ([`DataReaderBlob`]).

mod data_reader;
mod data_reader_blob;
mod data_reader_file;

pub use data_reader::*;
pub use data_reader_blob::*;
pub use data_reader_file::*;
