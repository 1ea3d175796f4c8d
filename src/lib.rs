mod buffer;
mod common;
mod concurrency;
pub mod config;
mod container;
pub mod errors;
mod storage;

#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate slog;
extern crate slog_async;
extern crate slog_term;

pub use self::buffer::buffer_pool_manager::BufferPoolManager;
pub use self::buffer::lru_k_replacer::LruKReplacer;
pub use self::buffer::lru_replacer::LruReplacer;
pub use self::buffer::page_guard::PageGuard;
pub use self::buffer::replacer::Replacer;
pub use self::common::rid::Rid;
pub use self::common::rwlatch::ReaderWriterLatch;
pub use self::concurrency::transaction::Transaction;
pub use self::container::hash::extendible_hash_table::{DiskExtendibleHashTable, HashTableOptions};
pub use self::container::hash::hash_function::HashFunction;
pub use self::storage::disk::disk_manager;
pub use self::storage::page::hash_table_bucket_page::HashTableBucketPage;
pub use self::storage::page::hash_table_directory_page::HashTableDirectoryPage;
pub use self::storage::page::hash_table_page_defs::FixedSizeType;
pub use self::storage::page::header_page::HeaderPage;
pub use self::storage::page::Page;

use std::fmt;

pub fn default_logger() -> slog::Logger {
    use slog::Drain;

    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    slog::Logger::root(drain, o!())
}

/// Same as `default_logger`, but drops every record below `level`.
pub fn logger_with_level(level: slog::Level) -> slog::Logger {
    use slog::Drain;

    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog::LevelFilter::new(drain, level).fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    slog::Logger::root(drain, o!())
}

pub const PAGE_SIZE: usize = 4096;
pub const BUFFER_POOL_SIZE: usize = 10;
pub const LRUK_REPLACER_K: usize = 2;

pub const INVALID_PAGE_ID: PageId = PageId(-1);
// page 0 holds the header page, data pages start right after it
pub const HEADER_PAGE_ID: PageId = PageId(0);
pub const INVALID_LSN: LogSequenceNum = -1;

pub type LogSequenceNum = i32; // modify it will break the page layouts
pub type TxnId = i32;

/// Identity of a page on disk. Offset in the db file is `id * PAGE_SIZE`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(pub i32);

impl PageId {
    pub fn is_valid(self) -> bool {
        self.0 >= 0
    }

    pub fn to_le_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    pub fn from_le_bytes(bytes: [u8; 4]) -> Self {
        PageId(i32::from_le_bytes(bytes))
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index of a slot in the buffer pool's frame array.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(pub usize);

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
pub(crate) fn remove_db_files(filename: &str) {
    let _ = std::fs::remove_file(filename);
    if let Some(n) = filename.rfind('.') {
        let _ = std::fs::remove_file(filename[..n].to_string() + ".log");
    }
}
