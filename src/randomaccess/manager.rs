//! Ties the pipeline together: index resolve → splice → decompress → trim →
//! byte stream → record decode → overlap filter, behind one query call.
//! Also supports a variant that tags each emitted record with its
//! `(start_vo, end_vo)`.

use std::sync::Arc;

use crate::bai::BaiIndex;
use crate::error::{BamError, Result};
use crate::record::AlignmentRecord;
use crate::vo::VirtualOffset;

use super::byte_source::ByteSource;
use super::decompressor::{DecompressConfig, ParallelDecompressor};
use super::filter::{OverlapFilter, QueryInterval};
use super::resolver::resolve;
use super::splicer::Splicer;
use super::trimmer::{AugmentedBlock, Trimmer};
use super::vostream::VirtualOffsetByteStream;

/// Tunables threaded down into [`DecompressConfig`].
#[derive(Debug, Clone, Copy)]
pub struct RandomAccessConfig {
    pub threads: Option<usize>,
    pub cache_capacity: usize,
}

impl Default for RandomAccessConfig {
    fn default() -> Self {
        let defaults = DecompressConfig::default();
        RandomAccessConfig { threads: defaults.threads, cache_capacity: defaults.cache_capacity }
    }
}

impl From<RandomAccessConfig> for DecompressConfig {
    fn from(c: RandomAccessConfig) -> Self {
        DecompressConfig { threads: c.threads, cache_capacity: c.cache_capacity }
    }
}

/// Decodes alignment records off a [`VirtualOffsetByteStream`], optionally
/// tagging each one with the virtual offsets it spans.
struct RecordDecoder<I> {
    stream: VirtualOffsetByteStream<I>,
    tag_vo: bool,
}

impl<I: Iterator<Item = Result<AugmentedBlock>>> Iterator for RecordDecoder<I> {
    type Item = Result<AlignmentRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        // Forces the next unconsumed block in before reading so a record
        // landing exactly on a block boundary is tagged with the following
        // block's virtual offset, not the exhausted one's. `current_virtual_offset`
        // only errors on a genuine I/O/corruption fault further down the
        // pipeline — at true end of stream it reports the last block's
        // position rather than failing, same as `read` is still free to do below.
        let start_vo = match self.stream.current_virtual_offset() {
            Ok(vo) => vo,
            Err(e) => return Some(Err(e)),
        };

        let size_bytes = match self.stream.read(4) {
            Ok(b) => b,
            Err(BamError::UnexpectedEof { .. }) => return None,
            Err(e) => return Some(Err(e)),
        };
        let block_size = i32::from_le_bytes([size_bytes[0], size_bytes[1], size_bytes[2], size_bytes[3]]);
        if block_size < 0 {
            return Some(Err(BamError::corrupt_record("negative block_size")));
        }

        let body = match self.stream.read(block_size as usize) {
            Ok(b) => b,
            Err(e) => return Some(Err(e)),
        };

        let mut record = match AlignmentRecord::decode_body(&body) {
            Ok(r) => r,
            Err(e) => return Some(Err(e)),
        };

        if self.tag_vo {
            record.start_vo = Some(start_vo);
            record.end_vo = match self.stream.current_virtual_offset() {
                Ok(vo) => Some(vo),
                Err(e) => return Some(Err(e)),
            };
        }

        Some(Ok(record))
    }
}

pub struct RandomAccessManager {
    source: Arc<dyn ByteSource>,
    index: Option<BaiIndex>,
    config: RandomAccessConfig,
    file_id: u64,
}

impl RandomAccessManager {
    pub fn new(source: Arc<dyn ByteSource>, index: Option<BaiIndex>, config: RandomAccessConfig) -> Self {
        // file_id only needs to distinguish concurrent queries against different
        // sources for the decompressed-block cache; the source pointer is unique per file.
        let file_id = Arc::as_ptr(&source) as *const () as u64;
        RandomAccessManager { source, index, config, file_id }
    }

    /// Runs `(ref_id, beg, end)` through the full pipeline, yielding records
    /// overlapping the interval in coordinate order.
    pub fn query(
        &self,
        ref_id: i32,
        beg: u32,
        end: u32,
    ) -> Result<Box<dyn Iterator<Item = Result<AlignmentRecord>> + '_>> {
        self.query_impl(ref_id, beg, end, false)
    }

    /// Same as [`Self::query`], but each returned record carries the virtual
    /// offsets of its first and one-past-last bytes.
    pub fn query_with_vo(
        &self,
        ref_id: i32,
        beg: u32,
        end: u32,
    ) -> Result<Box<dyn Iterator<Item = Result<AlignmentRecord>> + '_>> {
        self.query_impl(ref_id, beg, end, true)
    }

    fn query_impl(
        &self,
        ref_id: i32,
        beg: u32,
        end: u32,
        tag_vo: bool,
    ) -> Result<Box<dyn Iterator<Item = Result<AlignmentRecord>> + '_>> {
        let index = self.index.as_ref().ok_or(BamError::IndexMissing)?;
        let chunks = resolve(index, ref_id, beg, end)?;

        if chunks.is_empty() {
            return Ok(Box::new(std::iter::empty()));
        }

        let splicer = Splicer::new(Arc::clone(&self.source), chunks.clone());
        let decompressor = ParallelDecompressor::new(splicer, self.file_id, self.config.into());
        let trimmer = Trimmer::new(decompressor, chunks);
        let stream = VirtualOffsetByteStream::new(trimmer);
        let decoder = RecordDecoder { stream, tag_vo };

        let query = QueryInterval { ref_id, beg, end };
        Ok(Box::new(OverlapFilter::new(decoder, query)))
    }

    /// The pruning lower bound alone, exposed for diagnostics.
    pub fn min_offset_for(&self, ref_id: i32, beg: u32) -> Option<VirtualOffset> {
        self.index.as_ref().and_then(|idx| idx.reference(ref_id)).map(|r| r.min_offset_for(beg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bai::ReferenceIndex;
    use crate::chunk::Chunk;
    use std::collections::HashMap;

    #[test]
    fn query_without_index_is_index_missing() {
        let source: Arc<dyn ByteSource> = Arc::new(std::path::PathBuf::from("/nonexistent"));
        let manager = RandomAccessManager::new(source, None, RandomAccessConfig::default());
        let err = manager.query(0, 0, 10).unwrap_err();
        assert!(matches!(err, BamError::IndexMissing));
    }

    #[test]
    fn empty_chunk_set_yields_no_records() {
        let source: Arc<dyn ByteSource> = Arc::new(std::path::PathBuf::from("/nonexistent"));
        let index = BaiIndex {
            references: vec![ReferenceIndex { bins: HashMap::new(), linear_index: vec![] }],
            n_no_coor: None,
        };
        let manager = RandomAccessManager::new(source, Some(index), RandomAccessConfig::default());
        let mut records = manager.query(0, 0, 100).unwrap();
        assert!(records.next().is_none());
    }

    #[test]
    fn beg_equals_end_yields_no_records() {
        let source: Arc<dyn ByteSource> = Arc::new(std::path::PathBuf::from("/nonexistent"));
        let index = BaiIndex {
            references: vec![ReferenceIndex {
                bins: HashMap::from([(0, vec![Chunk::new(VirtualOffset::new(0, 0), VirtualOffset::new(10, 0))])]),
                linear_index: vec![],
            }],
            n_no_coor: None,
        };
        let manager = RandomAccessManager::new(source, Some(index), RandomAccessConfig::default());
        let mut records = manager.query(0, 50, 50).unwrap();
        assert!(records.next().is_none());
    }
}
