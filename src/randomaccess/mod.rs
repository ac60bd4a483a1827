//! The random-access engine: index resolution, chunk coalescing,
//! compressed-block splicing, parallel decompression, block trimming, the
//! virtual-offset byte stream, and the overlap filter, wired together by
//! [`manager::RandomAccessManager`].

pub mod byte_source;
pub mod decompressor;
pub mod filter;
pub mod manager;
pub mod resolver;
pub mod splicer;
pub mod trimmer;
pub mod vostream;

pub use byte_source::ByteSource;
pub use decompressor::{DecompressConfig, ParallelDecompressor};
pub use filter::{OverlapFilter, QueryInterval};
pub use manager::{RandomAccessConfig, RandomAccessManager};
pub use resolver::resolve;
pub use splicer::Splicer;
pub use trimmer::{AugmentedBlock, Trimmer};
pub use vostream::VirtualOffsetByteStream;
