use crate::common::rid::Rid;
use crate::{PageId, PAGE_SIZE};
use std::fmt::Debug;
use std::mem::size_of;

/// Max global depth of the directory. 2^9 slots of (u8 depth, i32 page id) still leave
/// room for the page header.
pub const HTABLE_DIRECTORY_MAX_DEPTH: u32 = 9;
pub const DIRECTORY_ARRAY_SIZE: usize = 1 << HTABLE_DIRECTORY_MAX_DEPTH;

/// A key or value stored inline in a bucket page slot.
pub trait FixedSizeType: Copy + PartialEq + Debug + Send + Sync + 'static {
    /// Encoded width in bytes.
    const SIZE: usize;

    fn write_to(&self, buf: &mut [u8]);
    fn read_from(buf: &[u8]) -> Self;
}

macro_rules! impl_fixed_size_int {
    ($($t:ty),*) => {
        $(
            impl FixedSizeType for $t {
                const SIZE: usize = size_of::<$t>();

                fn write_to(&self, buf: &mut [u8]) {
                    buf[..Self::SIZE].copy_from_slice(&self.to_le_bytes());
                }

                fn read_from(buf: &[u8]) -> Self {
                    let mut bytes = [0u8; size_of::<$t>()];
                    bytes.copy_from_slice(&buf[..Self::SIZE]);
                    <$t>::from_le_bytes(bytes)
                }
            }
        )*
    };
}

impl_fixed_size_int!(i32, u32, i64, u64);

impl FixedSizeType for Rid {
    const SIZE: usize = 8;

    fn write_to(&self, buf: &mut [u8]) {
        buf[..4].copy_from_slice(&self.get_page_id().to_le_bytes());
        buf[4..8].copy_from_slice(&self.get_slot_num().to_le_bytes());
    }

    fn read_from(buf: &[u8]) -> Self {
        let mut page_id = [0u8; 4];
        page_id.copy_from_slice(&buf[..4]);
        let mut slot_num = [0u8; 4];
        slot_num.copy_from_slice(&buf[4..8]);
        Rid::new(PageId::from_le_bytes(page_id), u32::from_le_bytes(slot_num))
    }
}

/// Bytes of one bitmap covering `array_size` slots.
pub fn bitmap_size(array_size: usize) -> usize {
    (array_size + 7) / 8
}

/// Number of (key, value) slots that fit in a bucket page together with the
/// occupied and readable bitmaps.
pub fn bucket_array_size(entry_size: usize) -> usize {
    let mut n = 4 * PAGE_SIZE / (4 * entry_size + 1);
    // bitmap rounding can cost a couple of bytes
    while 2 * bitmap_size(n) + n * entry_size > PAGE_SIZE {
        n -= 1;
    }
    n
}
