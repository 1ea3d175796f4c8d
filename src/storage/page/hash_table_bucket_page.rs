use crate::storage::page::hash_table_page_defs::{bitmap_size, bucket_array_size, FixedSizeType};

/**
 * Bucket page for extendible hash table. Stores keys and values together and supports
 * non-unique keys.
 *
 * Bucket page format:
 * ----------------------------------------------------------------------------------------
 * | Occupied bitmap | Readable bitmap | KEY(1) + VALUE(1) | KEY(2) + VALUE(2) | ... | Free
 * ----------------------------------------------------------------------------------------
 *
 * A slot is occupied once anything was ever stored in it and readable while it holds a live
 * pair. Occupied but not readable is a tombstone. Inserts reuse the first non-readable slot,
 * so occupied slots always form a prefix and scans stop at the first unoccupied one.
 */
pub struct HashTableBucketPage<K, V> {
    occupied: Vec<u8>,
    readable: Vec<u8>,
    array: Vec<Option<(K, V)>>,
    max_size: usize,
}

impl<K: FixedSizeType, V: FixedSizeType> HashTableBucketPage<K, V> {
    /// Slots that fit in one page for this key and value type.
    pub fn array_size() -> usize {
        bucket_array_size(K::SIZE + V::SIZE)
    }

    /// An empty bucket holding at most `max_size` pairs (capped at `array_size`).
    pub fn new(max_size: usize) -> Self {
        let array_size = Self::array_size();
        Self {
            occupied: vec![0; bitmap_size(array_size)],
            readable: vec![0; bitmap_size(array_size)],
            array: vec![None; array_size],
            max_size: max_size.min(array_size),
        }
    }

    /// Decode a bucket from page bytes.
    pub fn from_bytes(page: &[u8], max_size: usize) -> Self {
        let mut bucket = Self::new(max_size);
        let bitmap_len = bucket.occupied.len();
        bucket.occupied.copy_from_slice(&page[..bitmap_len]);
        bucket.readable.copy_from_slice(&page[bitmap_len..2 * bitmap_len]);

        let entry_size = K::SIZE + V::SIZE;
        for idx in 0..bucket.array.len() {
            if !bucket.is_occupied(idx) {
                break;
            }
            let offset = 2 * bitmap_len + idx * entry_size;
            let key = K::read_from(&page[offset..offset + K::SIZE]);
            let value = V::read_from(&page[offset + K::SIZE..offset + entry_size]);
            bucket.array[idx] = Some((key, value));
        }
        bucket
    }

    /// Serialize into page bytes. Unoccupied slots are zeroed.
    pub fn write_to(&self, page: &mut [u8]) {
        let bitmap_len = self.occupied.len();
        page[..bitmap_len].copy_from_slice(&self.occupied);
        page[bitmap_len..2 * bitmap_len].copy_from_slice(&self.readable);

        let entry_size = K::SIZE + V::SIZE;
        for (idx, slot) in self.array.iter().enumerate() {
            let offset = 2 * bitmap_len + idx * entry_size;
            let entry = &mut page[offset..offset + entry_size];
            match slot {
                Some((key, value)) => {
                    key.write_to(&mut entry[..K::SIZE]);
                    value.write_to(&mut entry[K::SIZE..]);
                }
                None => entry.iter_mut().for_each(|b| *b = 0),
            }
        }
    }

    /// Scan the bucket and collect values that have the matching key.
    pub fn get_value(&self, key: &K) -> Vec<V> {
        self.live_slots()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| *v)
            .collect()
    }

    /// Store the pair in the first non-readable slot. False if the exact pair is
    /// already present or the bucket is full.
    pub fn insert(&mut self, key: K, value: V) -> bool {
        if self.is_full() || self.contains(&key, &value) {
            return false;
        }
        match (0..self.max_size).find(|idx| !self.is_readable(*idx)) {
            Some(idx) => {
                self.array[idx] = Some((key, value));
                self.set_occupied(idx);
                self.set_readable(idx);
                true
            }
            None => false,
        }
    }

    /// Remove the exact pair. False if it was not present.
    pub fn remove(&mut self, key: &K, value: &V) -> bool {
        let found = self.scan().find(|idx| match &self.array[*idx] {
            Some((k, v)) => self.is_readable(*idx) && k == key && v == value,
            None => false,
        });
        match found {
            Some(idx) => {
                self.remove_at(idx);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, key: &K, value: &V) -> bool {
        self.live_slots().any(|(k, v)| k == key && v == value)
    }

    /// Key at `bucket_idx`, `None` unless the slot is readable.
    pub fn key_at(&self, bucket_idx: usize) -> Option<K> {
        self.readable_slot(bucket_idx).map(|(k, _)| k)
    }

    /// Value at `bucket_idx`, `None` unless the slot is readable.
    pub fn value_at(&self, bucket_idx: usize) -> Option<V> {
        self.readable_slot(bucket_idx).map(|(_, v)| v)
    }

    /// Turn the slot into a tombstone.
    pub fn remove_at(&mut self, bucket_idx: usize) {
        if bucket_idx < self.array.len() {
            self.readable[bucket_idx / 8] &= !(1 << (bucket_idx % 8));
        }
    }

    pub fn is_occupied(&self, bucket_idx: usize) -> bool {
        self.occupied[bucket_idx / 8] & (1 << (bucket_idx % 8)) != 0
    }

    pub fn is_readable(&self, bucket_idx: usize) -> bool {
        self.readable[bucket_idx / 8] & (1 << (bucket_idx % 8)) != 0
    }

    pub fn num_readable(&self) -> usize {
        self.readable.iter().map(|b| b.count_ones() as usize).sum()
    }

    pub fn is_full(&self) -> bool {
        self.num_readable() >= self.max_size
    }

    pub fn is_empty(&self) -> bool {
        self.readable.iter().all(|b| *b == 0)
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// All live pairs in slot order.
    pub fn entries(&self) -> Vec<(K, V)> {
        self.live_slots().map(|(k, v)| (*k, *v)).collect()
    }

    /// Drop every pair and tombstone.
    pub fn reset(&mut self) {
        self.occupied.iter_mut().for_each(|b| *b = 0);
        self.readable.iter_mut().for_each(|b| *b = 0);
        self.array.iter_mut().for_each(|slot| *slot = None);
    }

    fn set_occupied(&mut self, bucket_idx: usize) {
        self.occupied[bucket_idx / 8] |= 1 << (bucket_idx % 8);
    }

    fn set_readable(&mut self, bucket_idx: usize) {
        self.readable[bucket_idx / 8] |= 1 << (bucket_idx % 8);
    }

    fn readable_slot(&self, bucket_idx: usize) -> Option<(K, V)> {
        if bucket_idx < self.array.len() && self.is_readable(bucket_idx) {
            self.array[bucket_idx]
        } else {
            None
        }
    }

    // Indices of the occupied prefix.
    fn scan(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.array.len()).take_while(move |idx| self.is_occupied(*idx))
    }

    fn live_slots(&self) -> impl Iterator<Item = &(K, V)> + '_ {
        self.scan()
            .filter(move |idx| self.is_readable(*idx))
            .filter_map(move |idx| self.array[idx].as_ref())
    }
}
