//! BAI index: a UCSC-style bin tree plus a 16 kbp linear index, per reference
//! sequence. Parsing these bytes is a thin concrete collaborator kept
//! separate from the random-access engine proper.

use std::collections::HashMap;
use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::chunk::Chunk;
use crate::error::{BamError, Result};
use crate::vo::VirtualOffset;

/// Width, in base pairs, of one linear-index window.
pub const LINEAR_INDEX_WINDOW_SHIFT: u32 = 14; // 2^14 == 16384
pub const LINEAR_INDEX_WINDOW_SIZE: u32 = 1 << LINEAR_INDEX_WINDOW_SHIFT;

const BAI_MAGIC: &[u8; 4] = b"BAI\x01";

/// Per-reference bin tree and linear index.
#[derive(Debug, Clone, Default)]
pub struct ReferenceIndex {
    pub bins: HashMap<u32, Vec<Chunk>>,
    pub linear_index: Vec<VirtualOffset>,
}

impl ReferenceIndex {
    /// Lower-bound VO for any read overlapping the 16384-bp window containing `beg`,
    /// or `VirtualOffset::MIN` if `beg` lies past the linear index.
    pub fn min_offset_for(&self, beg: u32) -> VirtualOffset {
        let window = (beg >> LINEAR_INDEX_WINDOW_SHIFT) as usize;
        self.linear_index.get(window).copied().unwrap_or(VirtualOffset::MIN)
    }
}

/// A fully parsed `.bai` file: one [`ReferenceIndex`] per reference sequence.
#[derive(Debug, Clone, Default)]
pub struct BaiIndex {
    pub references: Vec<ReferenceIndex>,
    /// Count of unplaced reads, if the optional trailing field is present.
    pub n_no_coor: Option<u64>,
}

impl BaiIndex {
    pub fn reference(&self, ref_id: i32) -> Option<&ReferenceIndex> {
        usize::try_from(ref_id).ok().and_then(|i| self.references.get(i))
    }

    /// Parse a `.bai` file from a byte stream.
    pub fn read<R: Read>(mut reader: R) -> Result<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != BAI_MAGIC {
            return Err(BamError::corrupt_block(0, "bad BAI magic"));
        }

        let n_ref = reader.read_i32::<LittleEndian>()?;
        if n_ref < 0 {
            return Err(BamError::corrupt_record("negative n_ref in BAI"));
        }

        let mut references = Vec::with_capacity(n_ref as usize);
        for _ in 0..n_ref {
            references.push(read_reference_index(&mut reader)?);
        }

        // Trailing unplaced-read count is optional (absent in some writers).
        let n_no_coor = reader.read_u64::<LittleEndian>().ok();

        Ok(BaiIndex { references, n_no_coor })
    }
}

fn read_reference_index<R: Read>(reader: &mut R) -> Result<ReferenceIndex> {
    let n_bin = reader.read_i32::<LittleEndian>()?;
    if n_bin < 0 {
        return Err(BamError::corrupt_record("negative n_bin in BAI"));
    }

    let mut bins = HashMap::with_capacity(n_bin as usize);
    for _ in 0..n_bin {
        let bin_id = reader.read_u32::<LittleEndian>()?;
        let n_chunk = reader.read_i32::<LittleEndian>()?;
        if n_chunk < 0 {
            return Err(BamError::corrupt_record("negative n_chunk in BAI"));
        }

        let mut chunks = Vec::with_capacity(n_chunk as usize);
        for _ in 0..n_chunk {
            let beg = VirtualOffset::from_raw(reader.read_u64::<LittleEndian>()?);
            let end = VirtualOffset::from_raw(reader.read_u64::<LittleEndian>()?);
            chunks.push(Chunk::new(beg, end));
        }

        bins.insert(bin_id, chunks);
    }

    let n_intv = reader.read_i32::<LittleEndian>()?;
    if n_intv < 0 {
        return Err(BamError::corrupt_record("negative n_intv in BAI"));
    }

    let mut linear_index = Vec::with_capacity(n_intv as usize);
    for _ in 0..n_intv {
        linear_index.push(VirtualOffset::from_raw(reader.read_u64::<LittleEndian>()?));
    }

    Ok(ReferenceIndex { bins, linear_index })
}

/// Standard UCSC/SAM bin-overlap routine: every bin id whose covered genomic
/// interval intersects `[beg, end)`. `end` is inclusive here per the
/// reg2bin convention (callers pass `end - 1` when `end` is exclusive and
/// `end > beg`).
///
/// A constant-depth sequence of ranges, one per bin-tree level, reused
/// verbatim from the htslib/SAM reference algorithm.
pub fn reg2bins(beg: u32, end: u32) -> SmallBinVec {
    let end = end.saturating_sub(1).max(beg);
    let mut bins = SmallBinVec::new();
    bins.push(0);

    let ranges: &[(u32, u32)] = &[
        (1, 26), (9, 23), (73, 20), (585, 17), (4681, 14),
    ];

    for &(offset, shift) in ranges {
        let lo = offset + (beg >> shift);
        let hi = offset + (end >> shift);
        for bin in lo..=hi {
            bins.push(bin);
        }
    }

    bins
}

pub type SmallBinVec = smallvec::SmallVec<[u32; 32]>;
