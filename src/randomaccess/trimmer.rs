//! Block Trimmer: walks the decompressed stream in lockstep with the sorted
//! chunk list, attaching `skip_start`/`skip_end` to the blocks that sit at a
//! chunk boundary.

use crate::bgzf::DecompressedBlock;
use crate::chunk::Chunk;
use crate::error::Result;

/// A decompressed block plus how many leading/trailing bytes fall outside
/// the requested chunk range.
#[derive(Debug, Clone)]
pub struct AugmentedBlock {
    pub start_offset: u64,
    pub data: Vec<u8>,
    pub skip_start: u16,
    pub skip_end: u16,
}

pub struct Trimmer<I> {
    inner: I,
    chunks: std::vec::IntoIter<Chunk>,
    current_chunk: Option<Chunk>,
}

impl<I: Iterator<Item = Result<DecompressedBlock>>> Trimmer<I> {
    pub fn new(inner: I, chunks: Vec<Chunk>) -> Self {
        let mut chunks = chunks.into_iter();
        let current_chunk = chunks.next();
        Trimmer { inner, chunks, current_chunk }
    }
}

impl<I: Iterator<Item = Result<DecompressedBlock>>> Iterator for Trimmer<I> {
    type Item = Result<AugmentedBlock>;

    fn next(&mut self) -> Option<Self::Item> {
        let block = match self.inner.next()? {
            Ok(b) => b,
            Err(e) => return Some(Err(e)),
        };

        let mut skip_start = 0u16;
        let mut skip_end = 0u16;

        if let Some(chunk) = self.current_chunk {
            if block.start_offset == chunk.beg.coffset() {
                skip_start = chunk.beg.uoffset();
            }

            if block.start_offset == chunk.end.coffset() {
                skip_end = (block.data.len() as u32 - chunk.end.uoffset() as u32) as u16;
                self.current_chunk = self.chunks.next();
            }
        }

        Some(Ok(AugmentedBlock { start_offset: block.start_offset, data: block.data, skip_start, skip_end }))
    }
}
