#![warn(
    rust_2018_idioms,
    future_incompatible,
    unused_extern_crates,
    unused,

    missing_copy_implementations,
    missing_debug_implementations,
)]

#![deny(
    unused_variables,
    unused_assignments,
    dead_code,
    unused_must_use,
    trivial_numeric_casts,
    redundant_semicolon
)]

#![forbid(unsafe_code)]

pub mod bai;
pub mod bgzf;
pub mod chunk;
pub mod error;
pub mod randomaccess;
pub mod record;
pub mod sam;
pub mod vo;

/// Re-exports of the types most callers need for a query-and-render round trip.
pub mod prelude {
    pub use crate::bai::BaiIndex;
    pub use crate::chunk::Chunk;
    pub use crate::error::{BamError, Result};
    pub use crate::randomaccess::{RandomAccessConfig, RandomAccessManager};
    pub use crate::record::AlignmentRecord;
    pub use crate::sam;
    pub use crate::vo::VirtualOffset;
}
