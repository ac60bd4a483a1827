//! Compressed-Block Splicer: turns a disjoint chunk list into a single
//! ordered stream of raw BGZF blocks covering exactly those chunks.

use std::io::Read;
use std::sync::Arc;

use crate::bgzf::{BlockReader, RawBlock};
use crate::chunk::Chunk;
use crate::error::{BamError, Result};

use super::byte_source::ByteSource;

pub struct Splicer {
    source: Arc<dyn ByteSource>,
    chunks: std::vec::IntoIter<Chunk>,
    current: Option<(BlockReader<Box<dyn Read + Send>>, Chunk)>,
}

impl Splicer {
    pub fn new(source: Arc<dyn ByteSource>, chunks: Vec<Chunk>) -> Self {
        Splicer { source, chunks: chunks.into_iter(), current: None }
    }
}

impl Iterator for Splicer {
    type Item = Result<RawBlock>;

    fn next(&mut self) -> Option<Result<RawBlock>> {
        loop {
            match &mut self.current {
                Some((reader, chunk)) => match reader.read_next() {
                    Some(Ok(block)) => {
                        let chunk_end = chunk.end.coffset();
                        if block.start_offset > chunk_end {
                            // Overshot this chunk's tail; a fresh reader is opened for
                            // whichever chunk comes next, so this block is simply dropped.
                            self.current = None;
                            continue;
                        }

                        let is_boundary = block.start_offset == chunk_end;
                        if is_boundary {
                            self.current = None;
                        }
                        return Some(Ok(block));
                    }
                    Some(Err(e)) => return Some(Err(e)),
                    None => {
                        return Some(Err(BamError::UnexpectedEof { context: "chunk tail block" }));
                    }
                },
                None => match self.chunks.next() {
                    None => return None,
                    Some(chunk) => {
                        let reader = match self.source.open_at(chunk.beg.coffset()) {
                            Ok(r) => r,
                            Err(e) => return Some(Err(e)),
                        };
                        self.current = Some((BlockReader::new(reader, chunk.beg.coffset()), chunk));
                    }
                },
            }
        }
    }
}
