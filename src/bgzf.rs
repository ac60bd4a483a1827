//! BGZF container framing (bit-exact) and the EOF probe.
//!
//! The block-range iterator here is the concrete "block-range producer"
//! collaborator the random-access engine is built against; decompression
//! itself is delegated to `flate2`'s raw deflate decoder.

use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt};
use flate2::{Decompress, FlushDecompress};
use tracing::warn;

use crate::error::{BamError, Result};

/// Fixed 4-byte magic every BGZF block header begins with.
pub const BGZF_MAGIC: [u8; 4] = [0x1F, 0x8B, 0x08, 0x04];

/// Canonical 28-byte empty BGZF block used as an EOF marker.
pub const EOF_MARKER: [u8; 28] = [
    0x1F, 0x8B, 0x08, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0xFF, 0x06, 0x00,
    0x42, 0x43, 0x02, 0x00, 0x1B, 0x00, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00,
];

/// A raw, still-compressed BGZF block as read from the file.
#[derive(Debug, Clone)]
pub struct RawBlock {
    /// File byte position where this block's header begins.
    pub start_offset: u64,
    /// Total on-disk size of the block (header + payload + footer).
    pub block_size: u32,
    /// Deflate-compressed payload bytes (raw deflate, no zlib/gzip wrapper).
    pub payload: Vec<u8>,
    /// CRC32 of the decompressed payload, from the block footer.
    pub crc32: u32,
    /// Declared decompressed size, from the block footer. Always `<= 65536`.
    pub decompressed_size: u32,
}

/// A decompressed BGZF block: `start_offset` is preserved from the source block.
#[derive(Debug, Clone)]
pub struct DecompressedBlock {
    pub start_offset: u64,
    pub data: Vec<u8>,
}

/// Reads successive raw BGZF blocks from a byte stream, in file order.
///
/// Tracks the file offset itself so `RawBlock::start_offset` is always
/// correct regardless of how the caller positioned the underlying reader.
pub struct BlockReader<R> {
    inner: R,
    offset: u64,
}

impl<R: Read> BlockReader<R> {
    /// `start_offset` is the file position the reader is currently positioned
    /// at (the caller is responsible for seeking there first).
    pub fn new(inner: R, start_offset: u64) -> Self {
        BlockReader { inner, offset: start_offset }
    }

    pub fn current_offset(&self) -> u64 {
        self.offset
    }

    /// Reads one BGZF block, or `None` at a clean end of stream (zero bytes
    /// read where a new block header was expected).
    pub fn read_next(&mut self) -> Option<Result<RawBlock>> {
        let block_start = self.offset;

        let mut fixed_header = [0u8; 12];
        match read_exact_or_eof(&mut self.inner, &mut fixed_header) {
            Ok(false) => return None,
            Ok(true) => {}
            Err(e) => return Some(Err(block_io_err(e, "BGZF block header"))),
        }

        if fixed_header[0..4] != BGZF_MAGIC {
            warn!(offset = block_start, "bad BGZF magic");
            return Some(Err(BamError::corrupt_block(block_start, "bad BGZF magic")));
        }

        let result = (|| -> Result<RawBlock> {
            let xlen = (&fixed_header[10..12])
                .read_u16::<LittleEndian>()
                .map_err(|e| block_io_err(e, "BGZF extra-field length"))?;

            let mut extra = vec![0u8; xlen as usize];
            self.inner.read_exact(&mut extra).map_err(|e| block_io_err(e, "BGZF extra field"))?;

            let bsize = find_bsize_subfield(&extra)
                .ok_or_else(|| BamError::corrupt_block(block_start, "missing BC subfield"))?;

            let total_block_size = bsize as u32 + 1;
            let header_len = 12 + xlen as u32;
            let footer_len = 8u32;
            if total_block_size < header_len + footer_len {
                return Err(BamError::corrupt_block(block_start, "block_size smaller than header+footer"));
            }
            let payload_len = total_block_size - header_len - footer_len;

            let mut payload = vec![0u8; payload_len as usize];
            self.inner.read_exact(&mut payload).map_err(|e| block_io_err(e, "BGZF block payload"))?;

            let crc32 = self.inner.read_u32::<LittleEndian>().map_err(|e| block_io_err(e, "BGZF block footer CRC32"))?;
            let decompressed_size = self.inner.read_u32::<LittleEndian>().map_err(|e| block_io_err(e, "BGZF block footer size"))?;
            if decompressed_size > 65536 {
                return Err(BamError::corrupt_block(block_start, "decompressed size exceeds 64 KiB"));
            }

            Ok(RawBlock { start_offset: block_start, block_size: total_block_size, payload, crc32, decompressed_size })
        })();

        match &result {
            Ok(block) => self.offset = block_start + block.block_size as u64,
            Err(e) => warn!(offset = block_start, error = %e, "corrupt BGZF block"),
        }

        Some(result)
    }
}

impl<R: Read> Iterator for BlockReader<R> {
    type Item = Result<RawBlock>;
    fn next(&mut self) -> Option<Self::Item> {
        self.read_next()
    }
}

/// Reads exactly `buf.len()` bytes, or returns `Ok(false)` if the stream was
/// already at a clean boundary (zero bytes available).
fn read_exact_or_eof<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(false),
            Ok(0) => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "truncated BGZF block header",
                ));
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(true)
}

/// Maps a truncation while reading part of a block to the dedicated
/// `UnexpectedEof` variant (spec §7: "stream truncated inside a header,
/// block, or record"), forwarding any other I/O failure verbatim.
fn block_io_err(e: std::io::Error, context: &'static str) -> BamError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        BamError::UnexpectedEof { context }
    } else {
        BamError::Io(e)
    }
}

/// Finds the little-endian `BSIZE` field inside the gzip extra-field subfields.
/// Subfield layout: `SI1 SI2 SLEN(u16) <SLEN bytes>`, repeated until `extra` is consumed.
fn find_bsize_subfield(extra: &[u8]) -> Option<u16> {
    let mut pos = 0;
    while pos + 4 <= extra.len() {
        let si1 = extra[pos];
        let si2 = extra[pos + 1];
        let slen = u16::from_le_bytes([extra[pos + 2], extra[pos + 3]]) as usize;
        let subfield_start = pos + 4;

        if si1 == b'B' && si2 == b'C' && slen == 2 && subfield_start + 2 <= extra.len() {
            return Some(u16::from_le_bytes([extra[subfield_start], extra[subfield_start + 1]]));
        }

        pos = subfield_start + slen;
    }
    None
}

/// Inflates a raw block's payload, verifying CRC32 and the declared decompressed size.
pub fn decompress(raw: &RawBlock) -> Result<DecompressedBlock> {
    let mut data = vec![0u8; raw.decompressed_size as usize];

    let mut inflater = Decompress::new(false); // false: raw deflate, no zlib header
    inflater
        .decompress(&raw.payload, &mut data, FlushDecompress::Finish)
        .map_err(|e| BamError::corrupt_block(raw.start_offset, format!("inflate failed: {e}")))?;

    let actual_crc = crc32fast::hash(&data);
    if actual_crc != raw.crc32 {
        warn!(offset = raw.start_offset, expected = raw.crc32, actual = actual_crc, "BGZF CRC32 mismatch");
        return Err(BamError::corrupt_block(
            raw.start_offset,
            format!("CRC32 mismatch: expected {:#010x}, got {:#010x}", raw.crc32, actual_crc),
        ));
    }

    Ok(DecompressedBlock { start_offset: raw.start_offset, data })
}

/// `true` iff the final 28 bytes of the file equal [`EOF_MARKER`].
pub fn has_eof_block<R: Read + std::io::Seek>(reader: &mut R) -> Result<bool> {
    let file_size = reader.seek(std::io::SeekFrom::End(0))?;
    if file_size < EOF_MARKER.len() as u64 {
        return Ok(false);
    }

    reader.seek(std::io::SeekFrom::Start(file_size - EOF_MARKER.len() as u64))?;
    let mut tail = [0u8; 28];
    reader.read_exact(&mut tail)?;
    Ok(tail == EOF_MARKER)
}

/// `(file_size - 28, 0)` when the EOF marker is present, else `(file_size, 0)`.
pub fn eof_virtual_offset<R: Read + std::io::Seek>(reader: &mut R) -> Result<crate::vo::VirtualOffset> {
    let file_size = reader.seek(std::io::SeekFrom::End(0))?;
    let present = has_eof_block(reader)?;
    let coffset = if present { file_size - EOF_MARKER.len() as u64 } else { file_size };
    Ok(crate::vo::VirtualOffset::new(coffset, 0))
}
