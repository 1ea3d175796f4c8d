use crate::PageId;
use std::fmt;

/// Record identifier: the page a tuple lives on plus its slot within that page.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Rid {
    page_id: PageId,
    slot_num: u32,
}

impl Rid {
    pub fn new(page_id: PageId, slot_num: u32) -> Self {
        Self { page_id, slot_num }
    }
    pub fn get_page_id(&self) -> PageId {
        self.page_id
    }
    pub fn get_slot_num(&self) -> u32 {
        self.slot_num
    }
}

impl fmt::Display for Rid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "page_id: {} slot_num: {}", self.page_id, self.slot_num)
    }
}
