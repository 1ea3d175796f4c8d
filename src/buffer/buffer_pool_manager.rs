use crate::buffer::page_guard::PageGuard;
use crate::buffer::replacer::Replacer;
use crate::config::BufferPoolConfig;
use crate::errors::{Result, StorageError};
use crate::storage::disk::disk_manager::DiskManager;
use crate::storage::page::Page;
use crate::{FrameId, PageId, HEADER_PAGE_ID};
use slog::Logger;
use std::collections::{HashMap, VecDeque};
use std::convert::TryFrom;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

// Bookkeeping guarded by the pool latch.
struct PoolState {
    // Page table for keeping track of buffer pool pages
    page_table: HashMap<PageId, FrameId>,
    // Frames that don't hold any page
    free_list: VecDeque<FrameId>,
    // The next page id to be allocated
    next_page_id: PageId,
}

/// The buffer pool moves physical pages back and forth between main memory and disk.
///
/// Callers ask for a page by id and never learn whether it was already cached. Every page
/// handed out is pinned; it stays in its frame until it is unpinned as many times as it was
/// pinned. Pages are shared as `Arc<Page>`, content access goes through the page latch.
///
/// Never call back into the pool while holding a page latch: the pool may latch pages while
/// holding its own lock (write-back, flushes).
pub struct BufferPoolManager {
    // Number of pages in the buffer pool
    pool_size: usize,
    // Array of buffer pool pages, indexed by FrameId
    pages: Vec<Arc<Page>>,
    latch: Mutex<PoolState>,
    replacer: Box<dyn Replacer>,
    disk_manager: DiskManager,
    logger: Logger,
}

impl BufferPoolManager {
    pub fn new(pool_size: usize, disk_manager: DiskManager, logger: &Logger) -> Result<Self> {
        Self::from_config(BufferPoolConfig::new(pool_size), disk_manager, logger)
    }

    pub fn from_config(
        config: BufferPoolConfig,
        disk_manager: DiskManager,
        logger: &Logger,
    ) -> Result<Self> {
        let replacer = config.replacer.build(config.pool_size)?;
        Self::with_replacer(config.pool_size, disk_manager, replacer, logger)
    }

    pub fn with_replacer(
        pool_size: usize,
        disk_manager: DiskManager,
        replacer: Box<dyn Replacer>,
        logger: &Logger,
    ) -> Result<Self> {
        if pool_size == 0 {
            bail!(StorageError::InvalidArgument(
                "buffer pool needs at least one frame".to_string()
            ))
        }

        // never hand out an id that already lives in the file, and keep the header page reserved
        let next_page_id = first_free_page_id(disk_manager.num_pages()?)?;

        let pages = (0..pool_size).map(|_| Arc::new(Page::new())).collect();
        let free_list = (0..pool_size).map(FrameId).collect();

        debug!(logger, "buffer pool created";
            "pool_size" => pool_size, "next_page_id" => next_page_id.0);

        Ok(Self {
            pool_size,
            pages,
            latch: Mutex::new(PoolState {
                page_table: HashMap::with_capacity(pool_size),
                free_list,
                next_page_id,
            }),
            replacer,
            disk_manager,
            logger: logger.clone(),
        })
    }

    pub fn get_pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn disk_manager(&self) -> &DiskManager {
        &self.disk_manager
    }

    /// Create a new zeroed page, pinned once. `None` when every frame is pinned.
    pub fn new_page(&self) -> Result<Option<Arc<Page>>> {
        let mut state = self.state();

        let frame_id = match self.find_replacement(&mut state)? {
            Some(frame_id) => frame_id,
            None => {
                debug!(self.logger, "new_page: every frame is pinned");
                return Ok(None);
            }
        };
        let page_id = Self::allocate_page(&mut state);

        let page = &self.pages[frame_id.0];
        page.reset_memory();
        page.set_id(page_id);
        page.set_pin_count(1);

        state.page_table.insert(page_id, frame_id);
        self.replacer.record_access(frame_id);
        self.replacer.pin(frame_id);

        trace!(self.logger, "new page"; "page_id" => page_id.0, "frame_id" => frame_id.0);
        Ok(Some(Arc::clone(page)))
    }

    /// Fetch the page with the given id, reading it from disk if it is not cached.
    /// `None` when the page is not resident and every frame is pinned.
    pub fn fetch_page(&self, page_id: PageId) -> Result<Option<Arc<Page>>> {
        if !page_id.is_valid() {
            bail!(StorageError::InvalidArgument(format!(
                "cannot fetch page {}",
                page_id
            )))
        }
        let mut state = self.state();

        if let Some(&frame_id) = state.page_table.get(&page_id) {
            let page = &self.pages[frame_id.0];
            page.incr_pin_count();
            self.replacer.record_access(frame_id);
            self.replacer.pin(frame_id);
            return Ok(Some(Arc::clone(page)));
        }

        let frame_id = match self.find_replacement(&mut state)? {
            Some(frame_id) => frame_id,
            None => {
                debug!(self.logger, "fetch_page: every frame is pinned"; "page_id" => page_id.0);
                return Ok(None);
            }
        };

        let page = &self.pages[frame_id.0];
        page.reset_memory();
        {
            let mut data = page.wlatch();
            if let Err(e) = self.disk_manager.read_page(page_id, &mut data[..]) {
                state.free_list.push_back(frame_id);
                return Err(e);
            }
        }
        page.set_id(page_id);
        page.set_pin_count(1);

        state.page_table.insert(page_id, frame_id);
        self.replacer.record_access(frame_id);
        self.replacer.pin(frame_id);

        trace!(self.logger, "fetched page from disk"; "page_id" => page_id.0, "frame_id" => frame_id.0);
        Ok(Some(Arc::clone(page)))
    }

    /// Drop one pin of the page. Returns false if the page is not resident or not pinned.
    /// The dirty flag is sticky until the page is written back.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let state = self.state();

        let frame_id = match state.page_table.get(&page_id) {
            Some(&frame_id) => frame_id,
            None => return false,
        };
        let page = &self.pages[frame_id.0];
        if page.get_pin_count() == 0 {
            warn!(self.logger, "unpin of a page that is not pinned"; "page_id" => page_id.0);
            return false;
        }
        if is_dirty {
            page.mark_dirty(true);
        }
        if page.decr_pin_count() == 0 {
            self.replacer.unpin(frame_id);
        }
        true
    }

    /// Write the page to disk whether or not it is dirty. Returns false if it is not resident.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        let state = self.state();

        match state.page_table.get(&page_id) {
            Some(&frame_id) => {
                self.flush_frame(frame_id)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Write every resident page to disk, pinned or not.
    pub fn flush_all_pages(&self) -> Result<()> {
        let state = self.state();

        for &frame_id in state.page_table.values() {
            self.flush_frame(frame_id)?;
        }
        debug!(self.logger, "flushed all pages"; "resident" => state.page_table.len());
        Ok(())
    }

    /// Drop the page from the pool. True if it was not resident or got deleted,
    /// false if somebody still holds a pin on it.
    pub fn delete_page(&self, page_id: PageId) -> bool {
        let mut state = self.state();

        let frame_id = match state.page_table.get(&page_id) {
            Some(&frame_id) => frame_id,
            None => return true,
        };
        let page = &self.pages[frame_id.0];
        if page.get_pin_count() > 0 {
            warn!(self.logger, "cannot delete a pinned page";
                "page_id" => page_id.0, "pin_count" => page.get_pin_count());
            return false;
        }

        state.page_table.remove(&page_id);
        self.replacer.remove(frame_id);
        page.reset_memory();
        state.free_list.push_back(frame_id);
        self.deallocate_page(page_id);
        true
    }

    pub fn new_page_guarded(&self) -> Result<Option<PageGuard<'_>>> {
        Ok(self.new_page()?.map(|page| PageGuard::new(self, page)))
    }

    pub fn fetch_page_guarded(&self, page_id: PageId) -> Result<Option<PageGuard<'_>>> {
        Ok(self
            .fetch_page(page_id)?
            .map(|page| PageGuard::new(self, page)))
    }

    // Find a frame in the free list first, then ask the replacer. A dirty victim is written
    // back and unlinked from the page table.
    fn find_replacement(&self, state: &mut PoolState) -> Result<Option<FrameId>> {
        if let Some(frame_id) = state.free_list.pop_front() {
            return Ok(Some(frame_id));
        }
        let frame_id = match self.replacer.evict() {
            Some(frame_id) => frame_id,
            // all the pages in buffer pool are pinned
            None => return Ok(None),
        };

        let page = &self.pages[frame_id.0];
        let victim_id = page.get_id();
        if page.is_dirty() {
            if let Err(e) = self.flush_frame(frame_id) {
                // keep the victim resident and evictable, nothing was lost
                self.replacer.unpin(frame_id);
                return Err(e);
            }
        }
        state.page_table.remove(&victim_id);

        debug!(self.logger, "evicted page"; "page_id" => victim_id.0, "frame_id" => frame_id.0);
        Ok(Some(frame_id))
    }

    fn flush_frame(&self, frame_id: FrameId) -> Result<()> {
        let page = &self.pages[frame_id.0];
        let data = page.rlatch();
        // cleared before the write so a concurrent unpin(dirty) is never lost
        page.mark_dirty(false);
        if let Err(e) = self.disk_manager.write_page(page.get_id(), &data[..]) {
            page.mark_dirty(true);
            return Err(e);
        }
        Ok(())
    }

    // Allocate a page id. Caller must hold the pool latch.
    fn allocate_page(state: &mut PoolState) -> PageId {
        let page_id = state.next_page_id;
        state.next_page_id = PageId(page_id.0 + 1);
        page_id
    }

    // Space on disk is not reclaimed, the id is simply never handed out again.
    fn deallocate_page(&self, page_id: PageId) {
        trace!(self.logger, "deallocated page"; "page_id" => page_id.0);
    }

    fn state(&self) -> MutexGuard<'_, PoolState> {
        self.latch.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// First id a pool over a file of `num_pages` pages may allocate. The header page stays reserved.
pub(crate) fn first_free_page_id(num_pages: u64) -> Result<PageId> {
    let on_disk = i32::try_from(num_pages).map_err(|_| {
        StorageError::InvalidArgument(format!("{} pages overflow the page id space", num_pages))
    })?;
    Ok(PageId(on_disk.max(HEADER_PAGE_ID.0 + 1)))
}
