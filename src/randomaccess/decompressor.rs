//! Parallel Decompressor: bounded-lookahead producer/consumer with
//! order-preserving prefetch. Completion order among workers is hidden
//! behind a FIFO join — the consumer always receives blocks strictly in
//! submission (file) order, regardless of which worker finishes first.

use std::collections::{HashMap, VecDeque};
use std::sync::mpsc::{channel, Receiver};
use std::sync::{Arc, Mutex};

use tracing::trace;

use crate::bgzf::{self, DecompressedBlock, RawBlock};
use crate::error::Result;

/// Tunables for the decompression pipeline.
#[derive(Debug, Clone, Copy)]
pub struct DecompressConfig {
    /// `None` or `Some(w)` with `w < 2` means synchronous decompression on
    /// the consumer thread. `Some(w)` with `w >= 2` spins up a `w`-thread pool.
    pub threads: Option<usize>,
    /// Bounded FIFO cache capacity, keyed by `(file_id, start_offset)`. `0` disables it.
    pub cache_capacity: usize,
}

impl Default for DecompressConfig {
    fn default() -> Self {
        DecompressConfig { threads: None, cache_capacity: 512 }
    }
}

/// Process-wide bounded FIFO cache of recently decompressed blocks.
/// Purely an optimization: disabling it must never change observable stream
/// contents; only correctness tests should run with capacity 0.
pub struct BlockCache {
    capacity: usize,
    map: HashMap<(u64, u64), Arc<DecompressedBlock>>,
    order: VecDeque<(u64, u64)>,
}

impl BlockCache {
    pub fn new(capacity: usize) -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(BlockCache { capacity, map: HashMap::new(), order: VecDeque::new() }))
    }

    fn get(&self, key: (u64, u64)) -> Option<Arc<DecompressedBlock>> {
        self.map.get(&key).cloned()
    }

    fn insert(&mut self, key: (u64, u64), block: Arc<DecompressedBlock>) {
        if self.capacity == 0 {
            return;
        }
        if self.map.insert(key, block).is_none() {
            self.order.push_back(key);
            if self.order.len() > self.capacity {
                if let Some(evict) = self.order.pop_front() {
                    self.map.remove(&evict);
                }
            }
        }
    }
}

pub struct ParallelDecompressor<I> {
    inner: I,
    file_id: u64,
    cache: Option<Arc<Mutex<BlockCache>>>,
    #[cfg(feature = "rayon")]
    pool: Option<Arc<rayon::ThreadPool>>,
    window: VecDeque<Receiver<Result<DecompressedBlock>>>,
    window_size: usize,
    exhausted: bool,
}

impl<I: Iterator<Item = Result<RawBlock>> + Send + 'static> ParallelDecompressor<I> {
    pub fn new(inner: I, file_id: u64, config: DecompressConfig) -> Self {
        let cache = if config.cache_capacity > 0 { Some(BlockCache::new(config.cache_capacity)) } else { None };

        #[cfg(feature = "rayon")]
        let (pool, window_size) = match config.threads {
            Some(w) if w >= 2 => {
                let pool = rayon::ThreadPoolBuilder::new().num_threads(w).build().ok();
                let window = pool.as_ref().map(|_| w).unwrap_or(1);
                (pool.map(Arc::new), window)
            }
            _ => (None, 1),
        };

        #[cfg(not(feature = "rayon"))]
        let window_size = 1;

        ParallelDecompressor {
            inner,
            file_id,
            cache,
            #[cfg(feature = "rayon")]
            pool,
            window: VecDeque::new(),
            window_size,
            exhausted: false,
        }
    }

    fn submit_next(&mut self) -> bool {
        if self.exhausted {
            return false;
        }

        let Some(item) = self.inner.next() else {
            self.exhausted = true;
            return false;
        };

        let (tx, rx) = channel();

        match item {
            Err(e) => {
                let _ = tx.send(Err(e));
            }
            Ok(raw) => {
                let key = (self.file_id, raw.start_offset);
                if let Some(cache) = &self.cache {
                    if let Some(hit) = cache.lock().unwrap().get(key) {
                        trace!(start_offset = raw.start_offset, "decompressed block cache hit");
                        let _ = tx.send(Ok((*hit).clone()));
                        self.window.push_back(rx);
                        return true;
                    }
                }

                let cache = self.cache.clone();

                #[cfg(feature = "rayon")]
                {
                    if let Some(pool) = &self.pool {
                        let pool = Arc::clone(pool);
                        pool.spawn(move || {
                            let result = bgzf::decompress(&raw);
                            if let (Ok(block), Some(cache)) = (&result, &cache) {
                                cache.lock().unwrap().insert(key, Arc::new(block.clone()));
                            }
                            let _ = tx.send(result);
                        });
                        self.window.push_back(rx);
                        return true;
                    }
                }

                let result = bgzf::decompress(&raw);
                if let (Ok(block), Some(cache)) = (&result, &cache) {
                    cache.lock().unwrap().insert(key, Arc::new(block.clone()));
                }
                let _ = tx.send(result);
            }
        }

        self.window.push_back(rx);
        true
    }
}

impl<I: Iterator<Item = Result<RawBlock>> + Send + 'static> Iterator for ParallelDecompressor<I> {
    type Item = Result<DecompressedBlock>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.window.len() < self.window_size {
            if !self.submit_next() {
                break;
            }
        }

        let rx = self.window.pop_front()?;
        Some(rx.recv().expect("decompression task dropped its sender"))
    }
}
