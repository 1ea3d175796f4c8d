use crate::buffer::buffer_pool_manager::BufferPoolManager;
use crate::storage::page::{Page, PageData};
use crate::PageId;
use std::sync::{Arc, RwLockReadGuard, RwLockWriteGuard};

/// A pinned page that is unpinned when the guard goes out of scope, on every exit path.
///
/// `data_mut` marks the page dirty, so the unpin reports the modification. Latch guards borrow
/// from the page guard and are always released before the unpin happens.
pub struct PageGuard<'a> {
    bpm: &'a BufferPoolManager,
    page: Arc<Page>,
    page_id: PageId,
    is_dirty: bool,
}

impl<'a> PageGuard<'a> {
    pub(crate) fn new(bpm: &'a BufferPoolManager, page: Arc<Page>) -> Self {
        let page_id = page.get_id();
        Self {
            bpm,
            page,
            page_id,
            is_dirty: false,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Read-latch the page content.
    pub fn data(&self) -> RwLockReadGuard<'_, PageData> {
        self.page.rlatch()
    }

    /// Write-latch the page content and remember to unpin it dirty.
    pub fn data_mut(&mut self) -> RwLockWriteGuard<'_, PageData> {
        self.is_dirty = true;
        self.page.wlatch()
    }

    pub fn mark_dirty(&mut self) {
        self.is_dirty = true;
    }
}

impl Drop for PageGuard<'_> {
    fn drop(&mut self) {
        self.bpm.unpin_page(self.page_id, self.is_dirty);
    }
}
