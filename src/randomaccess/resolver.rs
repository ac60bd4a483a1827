//! Index Resolver: Query -> Chunks.

use tracing::debug;

use crate::bai::{reg2bins, BaiIndex};
use crate::chunk::{coalesce, Chunk};
use crate::error::{BamError, Result};
use crate::vo::VirtualOffset;

/// Resolves `(ref_id, beg, end)` against a parsed BAI into a sorted, disjoint
/// chunk list: bin selection and pruning against the linear-index bound,
/// followed by coalescing.
pub fn resolve(index: &BaiIndex, ref_id: i32, beg: u32, end: u32) -> Result<Vec<Chunk>> {
    if ref_id < 0 || ref_id as usize >= index.references.len() {
        return Err(BamError::InvalidRefId { ref_id, num_refs: index.references.len() });
    }
    if end < beg {
        return Err(BamError::InvalidRange { beg, end });
    }

    if beg == end {
        return Ok(Vec::new());
    }

    let reference = &index.references[ref_id as usize];
    let min_offset = reference.min_offset_for(beg);

    let mut chunks = Vec::new();
    for bin_id in reg2bins(beg, end) {
        let Some(bin_chunks) = reference.bins.get(&bin_id) else { continue };
        for chunk in bin_chunks {
            if chunk.end <= min_offset {
                continue; // entirely below the linear-index bound: cannot contain an overlapping read
            }

            let clamped_beg = if chunk.beg < min_offset { min_offset } else { chunk.beg };
            chunks.push(Chunk::new(clamped_beg, chunk.end));
        }
    }

    chunks.sort_by_key(|c| c.beg);
    let coalesced = coalesce(chunks);

    debug!(ref_id, beg, end, chunk_count = coalesced.len(), "resolved query to chunks");
    Ok(coalesced)
}

/// Convenience: `min_offset` alone, exposed for callers who want the pruning
/// bound without running the full resolver (e.g. diagnostics).
pub fn min_offset(index: &BaiIndex, ref_id: i32, beg: u32) -> Option<VirtualOffset> {
    index.reference(ref_id).map(|r| r.min_offset_for(beg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bai::ReferenceIndex;
    use std::collections::HashMap;

    fn vo(c: u64, u: u16) -> VirtualOffset {
        VirtualOffset::new(c, u)
    }

    fn index_with_bin(bin_id: u32, chunks: Vec<Chunk>) -> BaiIndex {
        let mut bins = HashMap::new();
        bins.insert(bin_id, chunks);
        BaiIndex {
            references: vec![ReferenceIndex { bins, linear_index: vec![] }],
            n_no_coor: None,
        }
    }

    #[test]
    fn beg_equals_end_yields_no_chunks() {
        let index = index_with_bin(0, vec![Chunk::new(vo(0, 0), vo(10, 0))]);
        let chunks = resolve(&index, 0, 100, 100).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn out_of_range_ref_id_is_invalid_query() {
        let index = BaiIndex::default();
        let err = resolve(&index, 5, 0, 10).unwrap_err();
        assert!(matches!(err, BamError::InvalidRefId { .. }));
    }

    #[test]
    fn chunk_below_min_offset_is_pruned() {
        let mut index = index_with_bin(0, vec![Chunk::new(vo(0, 0), vo(5, 0))]);
        index.references[0].linear_index = vec![vo(10, 0)]; // window 0 -> min offset (10,0)
        let chunks = resolve(&index, 0, 100, 200).unwrap(); // beg=100 -> window 0
        assert!(chunks.is_empty());
    }

    #[test]
    fn chunk_beg_is_clamped_up_to_min_offset() {
        let mut index = index_with_bin(0, vec![Chunk::new(vo(0, 0), vo(20, 0))]);
        index.references[0].linear_index = vec![vo(10, 0)];
        let chunks = resolve(&index, 0, 100, 200).unwrap();
        assert_eq!(chunks, vec![Chunk::new(vo(10, 0), vo(20, 0))]);
    }
}
