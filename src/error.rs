//! Error taxonomy for the random-access engine.
//!
//! `InvalidQuery` and `IndexMissing` are returned synchronously at query
//! start. `CorruptBlock`, `CorruptRecord` and `UnexpectedEof` terminate the
//! record stream — any records already yielded before the fault stay
//! observable, nothing is rolled back. `IoError` is forwarded verbatim.
//! No variant here is retried internally.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BamError>;

#[derive(Error, Debug)]
pub enum BamError {
    #[error("invalid query: ref_id {ref_id} out of range (num_refs={num_refs})")]
    InvalidRefId { ref_id: i32, num_refs: usize },

    #[error("invalid query: end ({end}) < beg ({beg})")]
    InvalidRange { beg: u32, end: u32 },

    #[error("interval query requested but no BAI index was supplied")]
    IndexMissing,

    #[error("unexpected end of stream while reading {context}")]
    UnexpectedEof { context: &'static str },

    #[error("corrupt BGZF block at file offset {offset}: {reason}")]
    CorruptBlock { offset: u64, reason: String },

    #[error("corrupt alignment record: {reason}")]
    CorruptRecord { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BamError {
    pub fn corrupt_block(offset: u64, reason: impl Into<String>) -> Self {
        BamError::CorruptBlock { offset, reason: reason.into() }
    }

    pub fn corrupt_record(reason: impl Into<String>) -> Self {
        BamError::CorruptRecord { reason: reason.into() }
    }
}
