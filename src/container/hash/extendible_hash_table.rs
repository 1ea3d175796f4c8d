use crate::buffer::buffer_pool_manager::BufferPoolManager;
use crate::buffer::page_guard::PageGuard;
use crate::common::rwlatch::ReaderWriterLatch;
use crate::concurrency::transaction::Transaction;
use crate::container::hash::hash_function::HashFunction;
use crate::errors::{Result, StorageError};
use crate::storage::page::hash_table_bucket_page::HashTableBucketPage;
use crate::storage::page::hash_table_directory_page::HashTableDirectoryPage;
use crate::storage::page::hash_table_page_defs::{FixedSizeType, HTABLE_DIRECTORY_MAX_DEPTH};
use crate::storage::page::header_page::HeaderPage;
use crate::{PageId, HEADER_PAGE_ID};
use slog::Logger;
use std::collections::HashSet;
use std::marker::PhantomData;
use std::sync::Arc;

/// Tuning of one hash table.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct HashTableOptions {
    /// Deepest the directory may grow, at most `HTABLE_DIRECTORY_MAX_DEPTH`.
    pub directory_max_depth: u32,
    /// Pairs per bucket. Capped at what fits in a page, so the default means "a full page".
    pub bucket_max_size: usize,
}

impl Default for HashTableOptions {
    fn default() -> Self {
        Self {
            directory_max_depth: HTABLE_DIRECTORY_MAX_DEPTH,
            bucket_max_size: usize::MAX,
        }
    }
}

/// Extendible hash table backed by a buffer pool. Non-unique keys are supported; an exact
/// (key, value) pair is stored at most once. Buckets split when full and merge back with
/// their split image when empty, and the directory grows and shrinks accordingly.
///
/// The table latch is taken shared by point operations and exclusive by anything that
/// changes the directory. Page latches are never held across a call into the buffer pool.
pub struct DiskExtendibleHashTable<K, V> {
    name: String,
    bpm: Arc<BufferPoolManager>,
    directory_page_id: PageId,
    hash_fn: HashFunction<K>,
    table_latch: ReaderWriterLatch<()>,
    directory_max_depth: u32,
    bucket_max_size: usize,
    logger: Logger,
    _marker: PhantomData<fn() -> V>,
}

impl<K: FixedSizeType, V: FixedSizeType> DiskExtendibleHashTable<K, V> {
    /// Open the table registered as `name` in the header page, or create and register it.
    pub fn new(
        name: &str,
        bpm: Arc<BufferPoolManager>,
        options: HashTableOptions,
        logger: &Logger,
    ) -> Result<Self> {
        if options.directory_max_depth > HTABLE_DIRECTORY_MAX_DEPTH {
            bail!(StorageError::InvalidArgument(format!(
                "directory depth {} exceeds {}",
                options.directory_max_depth, HTABLE_DIRECTORY_MAX_DEPTH
            )))
        }
        if options.bucket_max_size == 0 {
            bail!(StorageError::InvalidArgument(
                "buckets must hold at least one pair".to_string()
            ))
        }

        let mut table = Self {
            name: name.to_string(),
            bpm,
            directory_page_id: HEADER_PAGE_ID,
            hash_fn: HashFunction::new(),
            table_latch: ReaderWriterLatch::new(()),
            directory_max_depth: options.directory_max_depth,
            bucket_max_size: options
                .bucket_max_size
                .min(HashTableBucketPage::<K, V>::array_size()),
            logger: logger.new(o!("index" => name.to_string())),
            _marker: PhantomData,
        };

        let registered = {
            let header = table.fetch(HEADER_PAGE_ID)?;
            let root_id = HeaderPage::from(&header.data()[..]).get_root_id(name);
            root_id
        };
        table.directory_page_id = match registered {
            Some(directory_page_id) => {
                debug!(table.logger, "reopened hash table"; "directory_page_id" => directory_page_id.0);
                directory_page_id
            }
            None => table.create()?,
        };
        Ok(table)
    }

    /// Directory index of `key` is `hash(key) & global_depth_mask`.
    pub fn hash(&self, key: &K) -> Result<u64> {
        self.hash_fn.get_hash(key)
    }

    /// Insert a (key, value) pair. Returns false if the exact pair is already present or the
    /// target bucket cannot split any further.
    pub fn insert(&self, txn: &Transaction, key: K, value: V) -> Result<bool> {
        {
            let _table = self.table_latch.rlock();
            let directory = self.read_directory()?;
            let bucket_idx = self.directory_index(&key, &directory)?;
            let bucket_page_id = directory.get_bucket_page_id(bucket_idx);

            let mut guard = self.fetch(bucket_page_id)?;
            let inserted = {
                let mut data = guard.page().wlatch();
                let mut bucket = self.decode_bucket(&data[..]);
                if bucket.contains(&key, &value) {
                    return Ok(false);
                }
                if bucket.insert(key, value) {
                    bucket.write_to(&mut data[..]);
                    true
                } else {
                    false
                }
            };
            if inserted {
                guard.mark_dirty();
                return Ok(true);
            }
        }
        self.split_insert(txn, key, value)
    }

    /// Every value stored under `key`.
    pub fn get_value(&self, _txn: &Transaction, key: &K) -> Result<Vec<V>> {
        let _table = self.table_latch.rlock();
        let directory = self.read_directory()?;
        let bucket_idx = self.directory_index(key, &directory)?;
        let bucket_page_id = directory.get_bucket_page_id(bucket_idx);

        let guard = self.fetch(bucket_page_id)?;
        let values = self.decode_bucket(&guard.data()[..]).get_value(key);
        Ok(values)
    }

    /// Remove the exact (key, value) pair. Returns false if it was not present.
    pub fn remove(&self, txn: &Transaction, key: &K, value: &V) -> Result<bool> {
        let now_empty = {
            let _table = self.table_latch.rlock();
            let directory = self.read_directory()?;
            let bucket_idx = self.directory_index(key, &directory)?;
            let bucket_page_id = directory.get_bucket_page_id(bucket_idx);

            let mut guard = self.fetch(bucket_page_id)?;
            let now_empty = {
                let mut data = guard.page().wlatch();
                let mut bucket = self.decode_bucket(&data[..]);
                if !bucket.remove(key, value) {
                    return Ok(false);
                }
                bucket.write_to(&mut data[..]);
                bucket.is_empty()
            };
            guard.mark_dirty();
            now_empty
        };

        if now_empty {
            self.merge(txn, key)?;
        }
        Ok(true)
    }

    pub fn global_depth(&self) -> Result<u32> {
        let _table = self.table_latch.rlock();
        Ok(self.read_directory()?.get_global_depth())
    }

    pub fn directory_page_id(&self) -> PageId {
        self.directory_page_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check the directory invariants and that every stored key lives in a bucket its
    /// hash can reach.
    pub fn verify_integrity(&self) -> Result<()> {
        let _table = self.table_latch.rlock();
        let directory = self.read_directory()?;
        directory.verify_integrity()?;

        let mut checked = HashSet::new();
        for idx in 0..directory.size() {
            let bucket_page_id = directory.get_bucket_page_id(idx);
            if !checked.insert(bucket_page_id) {
                continue;
            }
            let mask = directory.get_local_depth_mask(idx);
            let guard = self.fetch(bucket_page_id)?;
            let bucket = self.decode_bucket(&guard.data()[..]);
            for (key, _) in bucket.entries() {
                ensure!(
                    self.hash(&key)? & mask == idx as u64 & mask,
                    "key {:?} is stored in bucket {} it does not hash to",
                    key,
                    bucket_page_id
                );
            }
        }
        Ok(())
    }

    // Slow path of insert: split the target bucket until the pair fits.
    fn split_insert(&self, _txn: &Transaction, key: K, value: V) -> Result<bool> {
        let _table = self.table_latch.wlock();
        let mut directory_guard = self.fetch(self.directory_page_id)?;
        let mut directory = HashTableDirectoryPage::from(&directory_guard.data()[..]);

        loop {
            let bucket_idx = self.directory_index(&key, &directory)?;
            let bucket_page_id = directory.get_bucket_page_id(bucket_idx);
            let mut bucket_guard = self.fetch(bucket_page_id)?;
            let mut bucket = self.decode_bucket(&bucket_guard.data()[..]);

            if bucket.contains(&key, &value) {
                return Ok(false);
            }
            if bucket.insert(key, value) {
                bucket.write_to(&mut bucket_guard.data_mut()[..]);
                return Ok(true);
            }

            let local_depth = directory.get_local_depth(bucket_idx);
            if local_depth >= self.directory_max_depth {
                warn!(self.logger, "bucket is full at the max depth";
                    "bucket_page_id" => bucket_page_id.0, "local_depth" => local_depth);
                return Ok(false);
            }
            if local_depth == directory.get_global_depth() {
                if !directory.incr_global_depth() {
                    return Ok(false);
                }
                debug!(self.logger, "directory grew"; "global_depth" => directory.get_global_depth());
            }

            let mut image_guard = self.new_page()?;
            let image_page_id = image_guard.page_id();

            // slots of the old bucket with the new bit set move to the split image
            let high_bit = 1usize << local_depth;
            for i in 0..directory.size() {
                if directory.get_bucket_page_id(i) == bucket_page_id {
                    directory.incr_local_depth(i);
                    if i & high_bit != 0 {
                        directory.set_bucket_page_id(i, image_page_id);
                    }
                }
            }

            let mut stay = HashTableBucketPage::<K, V>::new(self.bucket_max_size);
            let mut moved = HashTableBucketPage::<K, V>::new(self.bucket_max_size);
            for (k, v) in bucket.entries() {
                if self.hash(&k)? & high_bit as u64 != 0 {
                    moved.insert(k, v);
                } else {
                    stay.insert(k, v);
                }
            }
            stay.write_to(&mut bucket_guard.data_mut()[..]);
            moved.write_to(&mut image_guard.data_mut()[..]);
            directory.write_to(&mut directory_guard.data_mut()[..]);

            debug!(self.logger, "split bucket";
                "bucket_page_id" => bucket_page_id.0,
                "image_page_id" => image_page_id.0,
                "local_depth" => local_depth + 1,
                "stayed" => stay.num_readable(),
                "moved" => moved.num_readable());
        }
    }

    // Fold the empty bucket `key` maps to into its split image, then shrink the directory.
    fn merge(&self, _txn: &Transaction, key: &K) -> Result<()> {
        let _table = self.table_latch.wlock();
        let mut directory_guard = self.fetch(self.directory_page_id)?;
        let mut directory = HashTableDirectoryPage::from(&directory_guard.data()[..]);
        let mut emptied = vec![];

        loop {
            let bucket_idx = self.directory_index(key, &directory)?;
            let local_depth = directory.get_local_depth(bucket_idx);
            if local_depth == 0 {
                break;
            }
            let image_idx = directory.get_split_image_index(bucket_idx);
            let bucket_page_id = directory.get_bucket_page_id(bucket_idx);
            let image_page_id = directory.get_bucket_page_id(image_idx);
            if directory.get_local_depth(image_idx) != local_depth || image_page_id == bucket_page_id
            {
                break;
            }

            // another thread may have refilled it before we got the table latch
            let is_empty = {
                let guard = self.fetch(bucket_page_id)?;
                let is_empty = self.decode_bucket(&guard.data()[..]).is_empty();
                is_empty
            };
            if !is_empty {
                break;
            }

            for i in 0..directory.size() {
                let page_id = directory.get_bucket_page_id(i);
                if page_id == bucket_page_id || page_id == image_page_id {
                    directory.set_bucket_page_id(i, image_page_id);
                    directory.decr_local_depth(i);
                }
            }
            emptied.push(bucket_page_id);
            debug!(self.logger, "merged bucket";
                "bucket_page_id" => bucket_page_id.0,
                "image_page_id" => image_page_id.0,
                "local_depth" => local_depth - 1);
        }

        while directory.can_shrink() {
            directory.decr_global_depth();
            debug!(self.logger, "directory shrank"; "global_depth" => directory.get_global_depth());
        }
        if emptied.is_empty() {
            return Ok(());
        }
        directory.write_to(&mut directory_guard.data_mut()[..]);
        drop(directory_guard);

        for page_id in emptied {
            if !self.bpm.delete_page(page_id) {
                warn!(self.logger, "merged bucket is still pinned"; "bucket_page_id" => page_id.0);
            }
        }
        Ok(())
    }

    // Allocate the directory and its first bucket, then register them under the table name.
    fn create(&self) -> Result<PageId> {
        let mut directory_guard = self.new_page()?;
        let mut bucket_guard = self.new_page()?;
        let directory_page_id = directory_guard.page_id();

        let mut directory = HashTableDirectoryPage::new(directory_page_id);
        directory.set_bucket_page_id(0, bucket_guard.page_id());
        directory.set_local_depth(0, 0);
        directory.write_to(&mut directory_guard.data_mut()[..]);
        HashTableBucketPage::<K, V>::new(self.bucket_max_size)
            .write_to(&mut bucket_guard.data_mut()[..]);

        let mut header_guard = self.fetch(HEADER_PAGE_ID)?;
        let registered = {
            let mut data = header_guard.data_mut();
            let mut header = HeaderPage::from(&data[..]);
            let registered = header.insert_record(&self.name, directory_page_id);
            if registered {
                header.write_to(&mut data[..]);
            }
            registered
        };
        if !registered {
            bail!(StorageError::InvalidArgument(format!(
                "cannot register index {:?} in the header page",
                self.name
            )))
        }

        debug!(self.logger, "created hash table";
            "directory_page_id" => directory_page_id.0,
            "bucket_page_id" => bucket_guard.page_id().0);
        Ok(directory_page_id)
    }

    fn directory_index(&self, key: &K, directory: &HashTableDirectoryPage) -> Result<usize> {
        Ok((self.hash(key)? & directory.get_global_depth_mask()) as usize)
    }

    fn decode_bucket(&self, page: &[u8]) -> HashTableBucketPage<K, V> {
        HashTableBucketPage::from_bytes(page, self.bucket_max_size)
    }

    fn read_directory(&self) -> Result<HashTableDirectoryPage> {
        let guard = self.fetch(self.directory_page_id)?;
        let directory = HashTableDirectoryPage::from(&guard.data()[..]);
        Ok(directory)
    }

    fn fetch(&self, page_id: PageId) -> Result<PageGuard<'_>> {
        match self.bpm.fetch_page_guarded(page_id)? {
            Some(guard) => Ok(guard),
            None => Err(StorageError::Full.into()),
        }
    }

    fn new_page(&self) -> Result<PageGuard<'_>> {
        match self.bpm.new_page_guarded()? {
            Some(guard) => Ok(guard),
            None => Err(StorageError::Full.into()),
        }
    }
}
