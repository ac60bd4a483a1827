//! Virtual-Offset Byte Stream: a linear byte reader over the trimmed block
//! stream that also reports the BAI-style virtual offset of the next byte
//! to be read.

use crate::error::{BamError, Result};
use crate::vo::VirtualOffset;

use super::trimmer::AugmentedBlock;

struct CurrentBlock {
    start_offset: u64,
    data: Vec<u8>,
    pos: usize,
    effective_len: usize,
}

pub struct VirtualOffsetByteStream<I> {
    inner: I,
    current: Option<CurrentBlock>,
}

impl<I: Iterator<Item = Result<AugmentedBlock>>> VirtualOffsetByteStream<I> {
    pub fn new(inner: I) -> Self {
        VirtualOffsetByteStream { inner, current: None }
    }

    /// Pulls blocks until the current one has unread bytes, or the stream is exhausted.
    /// On pulling a new block, immediately advances past its `skip_start` bytes.
    fn ensure_current(&mut self) -> Result<bool> {
        loop {
            if let Some(block) = &self.current {
                if block.pos < block.effective_len {
                    return Ok(true);
                }
            }

            match self.inner.next() {
                None => return Ok(self.current.is_some() && self.current.as_ref().unwrap().pos < self.current.as_ref().unwrap().effective_len),
                Some(Err(e)) => return Err(e),
                Some(Ok(block)) => {
                    let effective_len = block.data.len() - block.skip_end as usize;
                    self.current = Some(CurrentBlock {
                        start_offset: block.start_offset,
                        data: block.data,
                        pos: block.skip_start as usize,
                        effective_len,
                    });
                }
            }
        }
    }

    /// Pulls exactly `n` bytes, possibly spanning several blocks.
    pub fn read(&mut self, n: usize) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(n);

        while out.len() < n {
            if !self.ensure_current()? {
                return Err(BamError::UnexpectedEof { context: "virtual-offset byte stream" });
            }

            let block = self.current.as_mut().unwrap();
            let remaining_needed = n - out.len();
            let available = block.effective_len - block.pos;
            let take = remaining_needed.min(available);

            out.extend_from_slice(&block.data[block.pos..block.pos + take]);
            block.pos += take;
        }

        Ok(out)
    }

    /// The virtual offset of the next byte this stream will yield.
    ///
    /// Forces `ensure_current()` first so a block the caller has already
    /// fully consumed is never reported: without this, a record landing
    /// exactly on a block boundary would report the finished block's
    /// `(start_offset, effective_len)` — an offset equal to its own
    /// decompressed size, violating `uoffset < decompressed_size(coffset)` —
    /// instead of the next block's `(start_offset, skip_start)`.
    pub fn current_virtual_offset(&mut self) -> Result<VirtualOffset> {
        self.ensure_current()?;
        Ok(match &self.current {
            Some(block) => VirtualOffset::new(block.start_offset, block.pos as u16),
            None => VirtualOffset::MIN,
        })
    }
}
