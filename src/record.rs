//! BAM alignment records: the record data model, plus a minimal concrete
//! binary decoder. Decoding BAM records is conceptually an external
//! collaborator, but a thin concrete implementation lives here so the
//! pipeline is testable end to end.

use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt};
use tracing::warn;

use crate::error::{BamError, Result};
use crate::vo::VirtualOffset;

/// CIGAR operation codes, in BAM's packed-nibble order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CigarOp {
    Match,       // M
    Insertion,   // I
    Deletion,    // D
    Skip,        // N
    SoftClip,    // S
    HardClip,    // H
    Padding,     // P
    SeqMatch,    // =
    SeqMismatch, // X
}

impl CigarOp {
    fn from_code(code: u32) -> Result<Self> {
        use CigarOp::*;
        Ok(match code {
            0 => Match,
            1 => Insertion,
            2 => Deletion,
            3 => Skip,
            4 => SoftClip,
            5 => HardClip,
            6 => Padding,
            7 => SeqMatch,
            8 => SeqMismatch,
            other => return Err(BamError::corrupt_record(format!("unknown CIGAR op code {other}"))),
        })
    }

    /// Whether this op consumes reference bases.
    pub fn consumes_reference(self) -> bool {
        matches!(self, CigarOp::Match | CigarOp::Deletion | CigarOp::Skip | CigarOp::SeqMatch | CigarOp::SeqMismatch)
    }

    pub fn as_char(self) -> char {
        use CigarOp::*;
        match self {
            Match => 'M', Insertion => 'I', Deletion => 'D', Skip => 'N',
            SoftClip => 'S', HardClip => 'H', Padding => 'P', SeqMatch => '=', SeqMismatch => 'X',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CigarElement {
    pub len: u32,
    pub op: CigarOp,
}

/// Sum of lengths of reference-consuming ops: M, D, N, =, X.
/// Invariant under insertions of zero-length ops, since those contribute 0 regardless of type.
pub fn bases_covered(cigar: &[CigarElement]) -> u32 {
    cigar.iter().filter(|e| e.op.consumes_reference()).map(|e| e.len).sum()
}

/// Typed tag value union.
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    Text(String),
    Hex(String),
    Char(u8),
    Int(i64),
    Float(f32),
    IntArray { elem_type: u8, values: Vec<i64> },
    FloatArray(Vec<f32>),
}

#[derive(Debug, Clone)]
pub struct AlignmentRecord {
    pub ref_id: i32,
    pub position: i32, // 0-based
    pub flag: u16,
    pub mapq: u8,
    pub cigar: Vec<CigarElement>,
    pub next_ref_id: i32,
    pub next_pos: i32,
    pub template_length: i32,
    /// BAM-packed 4-bit-per-base sequence, as stored on disk.
    pub packed_sequence: Vec<u8>,
    pub seq_len: usize,
    /// Phred qualities, or empty/0xFF-prefixed if absent.
    pub qualities: Vec<u8>,
    pub name: String,
    pub tags: Vec<([u8; 2], TagValue)>,
    /// Virtual offset of the first byte of this record, if the caller asked
    /// for VO-tagged decoding.
    pub start_vo: Option<VirtualOffset>,
    pub end_vo: Option<VirtualOffset>,
}

const SEQ_NIBBLES: [char; 16] = ['=', 'A', 'C', 'M', 'G', 'R', 'S', 'V', 'T', 'W', 'Y', 'H', 'K', 'D', 'B', 'N'];

impl AlignmentRecord {
    /// Decodes one record, advancing `reader` by exactly the record's on-disk
    /// length (the leading `block_size` field plus 4).
    pub fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        let block_size = reader
            .read_i32::<LittleEndian>()
            .map_err(|e| stream_io_err(e, "alignment record block_size"))?;
        if block_size < 0 {
            return Err(BamError::corrupt_record("negative block_size"));
        }

        let mut body = vec![0u8; block_size as usize];
        reader.read_exact(&mut body).map_err(|e| stream_io_err(e, "alignment record body"))?;

        Self::decode_body(&body)
    }

    pub(crate) fn decode_body(body: &[u8]) -> Result<Self> {
        let mut cur = std::io::Cursor::new(body);

        let ref_id = cur.read_i32::<LittleEndian>().map_err(record_io_err)?;
        let position = cur.read_i32::<LittleEndian>().map_err(record_io_err)?;
        let l_read_name = cur.read_u8().map_err(record_io_err)?;
        let mapq = cur.read_u8().map_err(record_io_err)?;
        let _bin = cur.read_u16::<LittleEndian>().map_err(record_io_err)?;
        let n_cigar_op = cur.read_u16::<LittleEndian>().map_err(record_io_err)?;
        let flag = cur.read_u16::<LittleEndian>().map_err(record_io_err)?;
        let l_seq = cur.read_u32::<LittleEndian>().map_err(record_io_err)?;
        let next_ref_id = cur.read_i32::<LittleEndian>().map_err(record_io_err)?;
        let next_pos = cur.read_i32::<LittleEndian>().map_err(record_io_err)?;
        let template_length = cur.read_i32::<LittleEndian>().map_err(record_io_err)?;

        let mut name_bytes = vec![0u8; l_read_name as usize];
        cur.read_exact(&mut name_bytes).map_err(record_io_err)?;
        let name = String::from_utf8_lossy(
            name_bytes.split(|&b| b == 0).next().unwrap_or(&[])
        ).into_owned();

        let mut cigar = Vec::with_capacity(n_cigar_op as usize);
        for _ in 0..n_cigar_op {
            let raw = cur.read_u32::<LittleEndian>().map_err(record_io_err)?;
            let len = raw >> 4;
            let op = CigarOp::from_code(raw & 0xF)?;
            cigar.push(CigarElement { len, op });
        }

        let packed_len = (l_seq as usize + 1) / 2;
        let mut packed_sequence = vec![0u8; packed_len];
        cur.read_exact(&mut packed_sequence).map_err(record_io_err)?;

        let mut qualities = vec![0u8; l_seq as usize];
        cur.read_exact(&mut qualities).map_err(record_io_err)?;

        let mut tags = Vec::new();
        let pos = cur.position() as usize;
        let mut tag_reader = std::io::Cursor::new(&body[pos..]);
        while (tag_reader.position() as usize) < tag_reader.get_ref().len() {
            tags.push(decode_tag(&mut tag_reader)?);
        }

        Ok(AlignmentRecord {
            ref_id, position, flag, mapq, cigar,
            next_ref_id, next_pos, template_length,
            packed_sequence, seq_len: l_seq as usize,
            qualities, name, tags,
            start_vo: None, end_vo: None,
        })
    }

    /// Expands the packed 4-bit sequence into IUPAC base characters.
    pub fn sequence_string(&self) -> String {
        let mut out = String::with_capacity(self.seq_len);
        for i in 0..self.seq_len {
            let byte = self.packed_sequence[i / 2];
            let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0xF };
            out.push(SEQ_NIBBLES[nibble as usize]);
        }
        out
    }

    /// Whether qualities are absent (empty, or 0xFF-prefixed).
    pub fn qualities_missing(&self) -> bool {
        self.qualities.is_empty() || self.qualities[0] == 0xFF
    }
}

/// Truncation while decoding fields out of an in-memory record body means a
/// length field (name length, cigar op count, tag length, B-array count)
/// claimed more bytes than the body actually has — spec §7's `CorruptRecord`
/// ("record-length field implies bytes beyond the chunk boundary"), not a
/// generic I/O failure.
fn record_io_err(e: std::io::Error) -> BamError {
    BamError::corrupt_record(format!("record truncated: {e}"))
}

/// Truncation reading the length-prefixed `block_size` or the record body
/// itself off the live stream is a genuine stream truncation, not a
/// malformed length field.
fn stream_io_err(e: std::io::Error, context: &'static str) -> BamError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        BamError::UnexpectedEof { context }
    } else {
        BamError::Io(e)
    }
}

fn decode_tag<R: Read>(reader: &mut R) -> Result<([u8; 2], TagValue)> {
    let mut key = [0u8; 2];
    reader.read_exact(&mut key).map_err(record_io_err)?;
    let type_char = reader.read_u8().map_err(record_io_err)?;

    let value = match type_char {
        b'A' => TagValue::Char(reader.read_u8().map_err(record_io_err)?),
        b'c' => TagValue::Int(reader.read_i8().map_err(record_io_err)? as i64),
        b'C' => TagValue::Int(reader.read_u8().map_err(record_io_err)? as i64),
        b's' => TagValue::Int(reader.read_i16::<LittleEndian>().map_err(record_io_err)? as i64),
        b'S' => TagValue::Int(reader.read_u16::<LittleEndian>().map_err(record_io_err)? as i64),
        b'i' => TagValue::Int(reader.read_i32::<LittleEndian>().map_err(record_io_err)? as i64),
        b'I' => TagValue::Int(reader.read_u32::<LittleEndian>().map_err(record_io_err)? as i64),
        b'f' => TagValue::Float(reader.read_f32::<LittleEndian>().map_err(record_io_err)?),
        b'Z' => TagValue::Text(read_nul_terminated(reader)?),
        b'H' => TagValue::Hex(read_nul_terminated(reader)?),
        b'B' => read_numeric_array(reader)?,
        other => {
            warn!(tag = %String::from_utf8_lossy(&key), type_char = other as char, "unknown tag type");
            return Err(BamError::corrupt_record(format!("unknown tag type '{}'", other as char)));
        }
    };

    Ok((key, value))
}

fn read_nul_terminated<R: Read>(reader: &mut R) -> Result<String> {
    let mut bytes = Vec::new();
    loop {
        let b = reader.read_u8().map_err(record_io_err)?;
        if b == 0 {
            break;
        }
        bytes.push(b);
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn read_numeric_array<R: Read>(reader: &mut R) -> Result<TagValue> {
    let elem_type = reader.read_u8().map_err(record_io_err)?;
    let count = reader.read_i32::<LittleEndian>().map_err(record_io_err)?;
    if count < 0 {
        return Err(BamError::corrupt_record("negative B-array count"));
    }

    match elem_type {
        b'f' => {
            let mut v = Vec::with_capacity(count as usize);
            for _ in 0..count { v.push(reader.read_f32::<LittleEndian>().map_err(record_io_err)?); }
            Ok(TagValue::FloatArray(v))
        }
        b'c' | b'C' | b's' | b'S' | b'i' | b'I' => {
            let mut v = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let value = match elem_type {
                    b'c' => reader.read_i8().map_err(record_io_err)? as i64,
                    b'C' => reader.read_u8().map_err(record_io_err)? as i64,
                    b's' => reader.read_i16::<LittleEndian>().map_err(record_io_err)? as i64,
                    b'S' => reader.read_u16::<LittleEndian>().map_err(record_io_err)? as i64,
                    b'i' => reader.read_i32::<LittleEndian>().map_err(record_io_err)? as i64,
                    b'I' => reader.read_u32::<LittleEndian>().map_err(record_io_err)? as i64,
                    _ => unreachable!(),
                };
                v.push(value);
            }
            Ok(TagValue::IntArray { elem_type, values: v })
        }
        other => Err(BamError::corrupt_record(format!("unknown B-array element type '{}'", other as char))),
    }
}
