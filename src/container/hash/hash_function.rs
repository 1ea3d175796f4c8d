use crate::errors::Result;
use crate::storage::page::hash_table_page_defs::FixedSizeType;
use std::io::Cursor;
use std::marker::PhantomData;

const SEED: u32 = 0;

/// Hashes keys by their fixed-size little-endian encoding with MurmurHash3 (x64, 128 bit),
/// keeping the lower 64 bits.
pub struct HashFunction<K> {
    _marker: PhantomData<fn(&K)>,
}

impl<K: FixedSizeType> HashFunction<K> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }

    pub fn get_hash(&self, key: &K) -> Result<u64> {
        let mut bytes = vec![0u8; K::SIZE];
        key.write_to(&mut bytes);
        let hash = murmur3::murmur3_x64_128(&mut Cursor::new(bytes), SEED)?;
        Ok(hash as u64)
    }
}

impl<K: FixedSizeType> Default for HashFunction<K> {
    fn default() -> Self {
        Self::new()
    }
}
