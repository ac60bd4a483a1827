//! Opens a fresh reader positioned at an arbitrary file offset.
//!
//! Each chunk opens its own reader rather than sharing one seekable handle
//! across chunks: sharing handles safely would depend on assumptions about
//! the block-range iterator's internal buffering that this crate does not
//! make.

use std::io::{Cursor, Read, Seek, SeekFrom};
use std::path::PathBuf;

use crate::error::Result;

pub trait ByteSource: Send + Sync {
    fn open_at(&self, offset: u64) -> Result<Box<dyn Read + Send>>;
}

impl ByteSource for PathBuf {
    fn open_at(&self, offset: u64) -> Result<Box<dyn Read + Send>> {
        let mut file = std::fs::File::open(self)?;
        file.seek(SeekFrom::Start(offset))?;
        Ok(Box::new(file))
    }
}

/// In-memory byte source, primarily for tests and small indexed BAMs.
/// Implemented on `Vec<u8>` (not `Arc<Vec<u8>>`) so `Arc<Vec<u8>>` still
/// unsize-coerces to `Arc<dyn ByteSource>`: coercion requires the pointee
/// to implement the trait, not the smart pointer itself.
impl ByteSource for Vec<u8> {
    fn open_at(&self, offset: u64) -> Result<Box<dyn Read + Send>> {
        Ok(Box::new(Cursor::new(self[offset as usize..].to_vec())))
    }
}
