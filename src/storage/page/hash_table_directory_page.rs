use crate::errors::Result;
use crate::storage::page::hash_table_page_defs::{DIRECTORY_ARRAY_SIZE, HTABLE_DIRECTORY_MAX_DEPTH};
use crate::{LogSequenceNum, PageId, INVALID_LSN, INVALID_PAGE_ID};
use std::collections::HashMap;

const OFFSET_LSN: usize = 0;
const OFFSET_PAGE_ID: usize = 4;
const OFFSET_GLOBAL_DEPTH: usize = 8;
const OFFSET_LOCAL_DEPTHS: usize = 12;
const OFFSET_BUCKET_PAGE_IDS: usize = OFFSET_LOCAL_DEPTHS + DIRECTORY_ARRAY_SIZE;

/**
 *
 * Directory Page for extendible hash table.
 *
 * Directory format (size in byte, little endian):
 * --------------------------------------------------------------------------------------------
 * | LSN (4) | PageId(4) | GlobalDepth(4) | LocalDepths(512) | BucketPageIds(2048) | Free(1524)
 * --------------------------------------------------------------------------------------------
 */
pub struct HashTableDirectoryPage {
    lsn: LogSequenceNum,
    page_id: PageId,
    global_depth: u32,
    local_depths: [u8; DIRECTORY_ARRAY_SIZE],
    bucket_page_ids: [PageId; DIRECTORY_ARRAY_SIZE],
}

impl HashTableDirectoryPage {
    pub fn new(page_id: PageId) -> Self {
        Self {
            lsn: INVALID_LSN,
            page_id,
            global_depth: 0,
            local_depths: [0; DIRECTORY_ARRAY_SIZE],
            bucket_page_ids: [INVALID_PAGE_ID; DIRECTORY_ARRAY_SIZE],
        }
    }

    pub fn get_page_id(&self) -> PageId {
        self.page_id
    }
    pub fn set_page_id(&mut self, page_id: PageId) {
        self.page_id = page_id
    }
    pub fn get_lsn(&self) -> LogSequenceNum {
        self.lsn
    }
    pub fn set_lsn(&mut self, lsn: LogSequenceNum) {
        self.lsn = lsn
    }

    /// Lookup a bucket page using a directory index.
    pub fn get_bucket_page_id(&self, bucket_idx: usize) -> PageId {
        self.bucket_page_ids[bucket_idx]
    }
    pub fn set_bucket_page_id(&mut self, bucket_idx: usize, bucket_page_id: PageId) {
        self.bucket_page_ids[bucket_idx] = bucket_page_id
    }

    pub fn get_local_depth(&self, bucket_idx: usize) -> u32 {
        self.local_depths[bucket_idx] as u32
    }
    pub fn set_local_depth(&mut self, bucket_idx: usize, local_depth: u32) {
        self.local_depths[bucket_idx] = local_depth as u8
    }
    pub fn incr_local_depth(&mut self, bucket_idx: usize) {
        self.local_depths[bucket_idx] += 1
    }
    pub fn decr_local_depth(&mut self, bucket_idx: usize) {
        self.local_depths[bucket_idx] -= 1
    }

    /// Mask with the low `local_depth(bucket_idx)` bits set.
    pub fn get_local_depth_mask(&self, bucket_idx: usize) -> u64 {
        (1u64 << self.get_local_depth(bucket_idx)) - 1
    }

    pub fn get_global_depth(&self) -> u32 {
        self.global_depth
    }

    /// Mask with the low `global_depth` bits set. `DirectoryIndex = Hash(key) & mask`.
    pub fn get_global_depth_mask(&self) -> u64 {
        (1u64 << self.global_depth) - 1
    }

    /// Double the directory. The new upper half mirrors the lower half, so every
    /// bucket is now referenced by twice as many slots. Returns false at the max depth.
    pub fn incr_global_depth(&mut self) -> bool {
        if self.global_depth >= HTABLE_DIRECTORY_MAX_DEPTH {
            return false;
        }
        let size = self.size();
        for i in 0..size {
            self.local_depths[size + i] = self.local_depths[i];
            self.bucket_page_ids[size + i] = self.bucket_page_ids[i];
        }
        self.global_depth += 1;
        true
    }

    /// Halve the directory, forgetting the upper half. Only valid when `can_shrink`.
    pub fn decr_global_depth(&mut self) {
        if self.global_depth == 0 {
            return;
        }
        self.global_depth -= 1;
        let size = self.size();
        for i in size..size * 2 {
            self.local_depths[i] = 0;
            self.bucket_page_ids[i] = INVALID_PAGE_ID;
        }
    }

    /// True if every bucket's local depth is below the global depth.
    pub fn can_shrink(&self) -> bool {
        self.global_depth > 0
            && self.local_depths[..self.size()]
                .iter()
                .all(|ld| (*ld as u32) < self.global_depth)
    }

    /// Number of directory slots in use, `2^global_depth`.
    pub fn size(&self) -> usize {
        1 << self.global_depth
    }

    /// The slot that differs from `bucket_idx` only in the highest bit of its local depth.
    pub fn get_split_image_index(&self, bucket_idx: usize) -> usize {
        let local_depth = self.get_local_depth(bucket_idx);
        if local_depth == 0 {
            return bucket_idx;
        }
        bucket_idx ^ (1 << (local_depth - 1))
    }

    /// Checks the directory invariants:
    ///  1. every local depth is at most the global depth
    ///  2. each bucket is referenced by exactly 2^(global depth - local depth) slots
    ///  3. all slots referencing a bucket agree on its local depth and on its low
    ///     `local depth` index bits
    pub fn verify_integrity(&self) -> Result<()> {
        let mut page_id_to_count: HashMap<PageId, u32> = HashMap::new();
        let mut page_id_to_ld: HashMap<PageId, (u32, usize)> = HashMap::new();

        for idx in 0..self.size() {
            let page_id = self.bucket_page_ids[idx];
            let ld = self.get_local_depth(idx);
            ensure!(
                ld <= self.global_depth,
                "local depth {} exceeds global depth {} at slot {}",
                ld,
                self.global_depth,
                idx
            );
            ensure!(page_id.is_valid(), "slot {} points to no bucket", idx);

            *page_id_to_count.entry(page_id).or_insert(0) += 1;

            let (old_ld, first_idx) = *page_id_to_ld.entry(page_id).or_insert((ld, idx));
            ensure!(
                old_ld == ld,
                "bucket {} seen with local depths {} and {}",
                page_id,
                old_ld,
                ld
            );
            let mask = self.get_local_depth_mask(idx) as usize;
            ensure!(
                first_idx & mask == idx & mask,
                "slots {} and {} share bucket {} but differ in the low {} bits",
                first_idx,
                idx,
                page_id,
                ld
            );
        }

        for (page_id, count) in page_id_to_count {
            let (ld, _) = page_id_to_ld[&page_id];
            let required = 1u32 << (self.global_depth - ld);
            ensure!(
                count == required,
                "bucket {} has {} slots, local depth {} needs {}",
                page_id,
                count,
                ld,
                required
            );
        }
        Ok(())
    }

    /// Serialize into the first bytes of a page.
    pub fn write_to(&self, page: &mut [u8]) {
        page[OFFSET_LSN..OFFSET_LSN + 4].copy_from_slice(&self.lsn.to_le_bytes());
        page[OFFSET_PAGE_ID..OFFSET_PAGE_ID + 4].copy_from_slice(&self.page_id.to_le_bytes());
        page[OFFSET_GLOBAL_DEPTH..OFFSET_GLOBAL_DEPTH + 4]
            .copy_from_slice(&self.global_depth.to_le_bytes());
        page[OFFSET_LOCAL_DEPTHS..OFFSET_BUCKET_PAGE_IDS].copy_from_slice(&self.local_depths);
        for (i, page_id) in self.bucket_page_ids.iter().enumerate() {
            let offset = OFFSET_BUCKET_PAGE_IDS + i * 4;
            page[offset..offset + 4].copy_from_slice(&page_id.to_le_bytes());
        }
    }
}

impl From<&[u8]> for HashTableDirectoryPage {
    fn from(page: &[u8]) -> Self {
        let field = |offset: usize| {
            let mut bytes: [u8; 4] = Default::default();
            bytes.copy_from_slice(&page[offset..offset + 4]);
            bytes
        };

        let mut local_depths = [0u8; DIRECTORY_ARRAY_SIZE];
        local_depths.copy_from_slice(&page[OFFSET_LOCAL_DEPTHS..OFFSET_BUCKET_PAGE_IDS]);

        let mut bucket_page_ids = [INVALID_PAGE_ID; DIRECTORY_ARRAY_SIZE];
        for (i, page_id) in bucket_page_ids.iter_mut().enumerate() {
            *page_id = PageId::from_le_bytes(field(OFFSET_BUCKET_PAGE_IDS + i * 4));
        }

        Self {
            lsn: LogSequenceNum::from_le_bytes(field(OFFSET_LSN)),
            page_id: PageId::from_le_bytes(field(OFFSET_PAGE_ID)),
            global_depth: u32::from_le_bytes(field(OFFSET_GLOBAL_DEPTH)),
            local_depths,
            bucket_page_ids,
        }
    }
}
