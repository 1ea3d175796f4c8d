pub mod hash_table_bucket_page;
pub mod hash_table_directory_page;
pub mod hash_table_page_defs;
pub mod header_page;

#[cfg(test)]
mod header_page_test;

use crate::common::rwlatch::ReaderWriterLatch;
use crate::{LogSequenceNum, PageId, INVALID_PAGE_ID, PAGE_SIZE};
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};
use std::sync::{RwLockReadGuard, RwLockWriteGuard};

pub type PageData = Box<[u8; PAGE_SIZE]>;

const OFFSET_LSN: usize = 0;

/// Page is the in-memory copy of one disk page plus the bookkeeping the buffer pool needs.
///
/// The bytes sit behind the page latch. Metadata (id, pin count, dirty flag) is only mutated
/// by the buffer pool while it holds its own lock; reads from anywhere are fine.
pub struct Page {
    data: ReaderWriterLatch<PageData>,
    page_id: AtomicI32,
    pin_count: AtomicU32,
    is_dirty: AtomicBool,
}

impl Page {
    pub fn new() -> Self {
        Self {
            data: ReaderWriterLatch::new(Box::new([0; PAGE_SIZE])),
            page_id: AtomicI32::new(INVALID_PAGE_ID.0),
            pin_count: AtomicU32::new(0),
            is_dirty: AtomicBool::new(false),
        }
    }

    /// Acquire the page read latch.
    pub fn rlatch(&self) -> RwLockReadGuard<'_, PageData> {
        self.data.rlock()
    }

    /// Acquire the page write latch.
    pub fn wlatch(&self) -> RwLockWriteGuard<'_, PageData> {
        self.data.wlock()
    }

    /// Copy of the page bytes, taken under the read latch.
    pub fn get_data(&self) -> Vec<u8> {
        self.rlatch().to_vec()
    }

    /// Overwrite the leading bytes of the page under the write latch.
    /// Anything beyond `PAGE_SIZE` is ignored.
    pub fn set_data(&self, data: &[u8]) {
        let n = data.len().min(PAGE_SIZE);
        self.wlatch()[..n].copy_from_slice(&data[..n]);
    }

    pub fn get_id(&self) -> PageId {
        PageId(self.page_id.load(Ordering::SeqCst))
    }
    pub fn get_pin_count(&self) -> u32 {
        self.pin_count.load(Ordering::SeqCst)
    }
    pub fn is_dirty(&self) -> bool {
        self.is_dirty.load(Ordering::SeqCst)
    }

    pub fn get_lsn(&self) -> LogSequenceNum {
        let data = self.rlatch();
        let mut lsn = [0u8; 4];
        lsn.copy_from_slice(&data[OFFSET_LSN..OFFSET_LSN + 4]);
        LogSequenceNum::from_le_bytes(lsn)
    }
    pub fn set_lsn(&self, lsn: LogSequenceNum) {
        self.wlatch()[OFFSET_LSN..OFFSET_LSN + 4].copy_from_slice(&lsn.to_le_bytes());
    }

    pub(crate) fn set_id(&self, page_id: PageId) {
        self.page_id.store(page_id.0, Ordering::SeqCst)
    }
    pub(crate) fn set_pin_count(&self, pin_count: u32) {
        self.pin_count.store(pin_count, Ordering::SeqCst)
    }
    pub(crate) fn incr_pin_count(&self) -> u32 {
        self.pin_count.fetch_add(1, Ordering::SeqCst) + 1
    }
    // callers check the count is positive first
    pub(crate) fn decr_pin_count(&self) -> u32 {
        self.pin_count.fetch_sub(1, Ordering::SeqCst) - 1
    }
    pub(crate) fn mark_dirty(&self, dirty: bool) {
        self.is_dirty.store(dirty, Ordering::SeqCst);
    }

    /// Zero the bytes and forget which page this frame held.
    pub(crate) fn reset_memory(&self) {
        self.wlatch().iter_mut().for_each(|b| *b = 0);
        self.set_id(INVALID_PAGE_ID);
        self.set_pin_count(0);
        self.mark_dirty(false);
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}
