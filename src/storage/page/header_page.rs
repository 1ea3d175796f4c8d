use crate::{LogSequenceNum, PageId, INVALID_LSN, PAGE_SIZE};

const OFFSET_LSN: usize = 0;
const OFFSET_RECORD_COUNT: usize = 4;
const OFFSET_RECORDS: usize = 8;

/// Longest index name, in bytes, that fits in a record.
pub const HEADER_NAME_SIZE: usize = 32;
const RECORD_SIZE: usize = HEADER_NAME_SIZE + 4;
pub const HEADER_MAX_RECORDS: usize = (PAGE_SIZE - OFFSET_RECORDS) / RECORD_SIZE;

/**
 *
 * Header Page maps index names to their root page. Always stored at page 0.
 *
 * Header format (size in byte, little endian):
 * -------------------------------------------------------------------------------
 * | LSN (4) | RecordCount (4) | Name(32) + RootId(4) | Name(32) + RootId(4) | ...
 * -------------------------------------------------------------------------------
 *
 * Names are zero padded.
 */
pub struct HeaderPage {
    lsn: LogSequenceNum,
    records: Vec<(String, PageId)>,
}

impl HeaderPage {
    pub fn new() -> Self {
        Self {
            lsn: INVALID_LSN,
            records: vec![],
        }
    }

    pub fn set_lsn(&mut self, lsn: LogSequenceNum) {
        self.lsn = lsn;
    }
    pub fn get_lsn(&self) -> LogSequenceNum {
        self.lsn
    }

    pub fn get_record_count(&self) -> usize {
        self.records.len()
    }

    /// Add a record. False if the name is taken or does not fit its NUL-padded slot, or the
    /// page is full.
    pub fn insert_record(&mut self, name: &str, root_id: PageId) -> bool {
        if name.is_empty() || name.len() > HEADER_NAME_SIZE || name.contains('\0') {
            return false;
        }
        if self.records.len() >= HEADER_MAX_RECORDS || self.find(name).is_some() {
            return false;
        }
        self.records.push((name.to_string(), root_id));
        true
    }

    pub fn update_record(&mut self, name: &str, root_id: PageId) -> bool {
        match self.find(name) {
            Some(idx) => {
                self.records[idx].1 = root_id;
                true
            }
            None => false,
        }
    }

    pub fn delete_record(&mut self, name: &str) -> bool {
        match self.find(name) {
            Some(idx) => {
                self.records.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn get_root_id(&self, name: &str) -> Option<PageId> {
        self.find(name).map(|idx| self.records[idx].1)
    }

    /// Serialize into the first bytes of a page. Slots past the last record are zeroed.
    pub fn write_to(&self, page: &mut [u8]) {
        page[OFFSET_LSN..OFFSET_LSN + 4].copy_from_slice(&self.lsn.to_le_bytes());
        page[OFFSET_RECORD_COUNT..OFFSET_RECORD_COUNT + 4]
            .copy_from_slice(&(self.records.len() as u32).to_le_bytes());

        for i in 0..HEADER_MAX_RECORDS {
            let offset = OFFSET_RECORDS + i * RECORD_SIZE;
            let record = &mut page[offset..offset + RECORD_SIZE];
            record.iter_mut().for_each(|b| *b = 0);
            if let Some((name, root_id)) = self.records.get(i) {
                record[..name.len()].copy_from_slice(name.as_bytes());
                record[HEADER_NAME_SIZE..].copy_from_slice(&root_id.to_le_bytes());
            }
        }
    }

    fn find(&self, name: &str) -> Option<usize> {
        self.records.iter().position(|(n, _)| n == name)
    }
}

impl Default for HeaderPage {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&[u8]> for HeaderPage {
    fn from(page: &[u8]) -> Self {
        let mut lsn: [u8; 4] = Default::default();
        lsn.copy_from_slice(&page[OFFSET_LSN..OFFSET_LSN + 4]);

        let mut count: [u8; 4] = Default::default();
        count.copy_from_slice(&page[OFFSET_RECORD_COUNT..OFFSET_RECORD_COUNT + 4]);
        let count = (u32::from_le_bytes(count) as usize).min(HEADER_MAX_RECORDS);

        let records = (0..count)
            .map(|i| {
                let offset = OFFSET_RECORDS + i * RECORD_SIZE;
                let raw_name = &page[offset..offset + HEADER_NAME_SIZE];
                let len = raw_name
                    .iter()
                    .position(|b| *b == 0)
                    .unwrap_or(HEADER_NAME_SIZE);
                let name = String::from_utf8_lossy(&raw_name[..len]).into_owned();

                let mut root_id: [u8; 4] = Default::default();
                root_id.copy_from_slice(&page[offset + HEADER_NAME_SIZE..offset + RECORD_SIZE]);
                (name, PageId::from_le_bytes(root_id))
            })
            .collect();

        Self {
            lsn: LogSequenceNum::from_le_bytes(lsn),
            records,
        }
    }
}
