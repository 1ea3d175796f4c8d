use crate::buffer::lru_k_replacer::LruKReplacer;
use crate::buffer::lru_replacer::LruReplacer;
use crate::buffer::replacer::Replacer;
use crate::errors::{Result, StorageError};
use crate::{BUFFER_POOL_SIZE, LRUK_REPLACER_K};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReplacerKind {
    Lru,
    LruK(usize),
}

impl ReplacerKind {
    pub(crate) fn build(self, pool_size: usize) -> Result<Box<dyn Replacer>> {
        let replacer: Box<dyn Replacer> = match self {
            ReplacerKind::Lru => Box::new(LruReplacer::new(pool_size)),
            ReplacerKind::LruK(0) => bail!(StorageError::InvalidArgument(
                "LRU-K needs k of at least one".to_string()
            )),
            ReplacerKind::LruK(k) => Box::new(LruKReplacer::new(k, pool_size)),
        };
        Ok(replacer)
    }
}

/// Runtime knobs of a buffer pool.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BufferPoolConfig {
    pub pool_size: usize,
    pub replacer: ReplacerKind,
}

impl BufferPoolConfig {
    pub fn new(pool_size: usize) -> Self {
        Self {
            pool_size,
            ..Default::default()
        }
    }

    pub fn with_replacer(mut self, replacer: ReplacerKind) -> Self {
        self.replacer = replacer;
        self
    }
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self {
            pool_size: BUFFER_POOL_SIZE,
            replacer: ReplacerKind::LruK(LRUK_REPLACER_K),
        }
    }
}
