use crate::errors::Result;
use crate::storage::disk::disk_manager::DiskManager;
use crate::storage::page::header_page::{HeaderPage, HEADER_MAX_RECORDS};
use crate::{default_logger, remove_db_files, BufferPoolManager, PageId, HEADER_PAGE_ID};

#[test]
fn header_page_sample() -> Result<()> {
    let logger = default_logger();
    let filename = "target/header_page_sample.db";
    remove_db_files(filename);

    let disk_manager = DiskManager::new(filename, &logger)?;
    let bpm = BufferPoolManager::new(5, disk_manager, &logger)?;

    // a fresh file reads back as an empty header
    let mut page = bpm.fetch_page_guarded(HEADER_PAGE_ID)?.unwrap();
    let mut header_page = HeaderPage::from(&page.data()[..]);
    assert_eq!(header_page.get_record_count(), 0);

    for i in 0..11 {
        header_page.set_lsn(i);
        assert_eq!(header_page.get_lsn(), i);
    }

    for i in 0..10 {
        let name = format!("index_{}", i);
        assert!(header_page.insert_record(&name, PageId(i + 1)));
        assert_eq!(header_page.get_root_id(&name), Some(PageId(i + 1)));
        assert_eq!(header_page.get_record_count() as i32, i + 1);
    }
    assert!(!header_page.insert_record("index_3", PageId(99)));
    assert!(!header_page.insert_record(&"x".repeat(33), PageId(99)));

    assert!(header_page.update_record("index_3", PageId(42)));
    assert!(!header_page.update_record("missing", PageId(42)));
    assert!(header_page.delete_record("index_0"));
    assert!(!header_page.delete_record("index_0"));
    assert_eq!(header_page.get_root_id("index_0"), None);

    header_page.write_to(&mut page.data_mut()[..]);
    let page_data = page.page().get_data();
    drop(page);

    bpm.flush_all_pages()?;
    let page = bpm.fetch_page_guarded(HEADER_PAGE_ID)?.unwrap();
    assert_eq!(page.page().get_data(), page_data);

    let reloaded = HeaderPage::from(&page.data()[..]);
    assert_eq!(reloaded.get_lsn(), 10);
    assert_eq!(reloaded.get_record_count(), 9);
    assert_eq!(reloaded.get_root_id("index_3"), Some(PageId(42)));
    assert_eq!(reloaded.get_root_id("index_9"), Some(PageId(10)));
    drop(page);

    remove_db_files(filename);
    Ok(())
}

#[test]
fn header_page_fills_up() {
    let mut header_page = HeaderPage::new();
    for i in 0..HEADER_MAX_RECORDS {
        assert!(header_page.insert_record(&i.to_string(), PageId(i as i32)));
    }
    assert!(!header_page.insert_record("one_too_many", PageId(0)));

    // a full header still fits in a page
    let mut buf = vec![0u8; crate::PAGE_SIZE];
    header_page.write_to(&mut buf);
    let reloaded = HeaderPage::from(&buf[..]);
    assert_eq!(reloaded.get_record_count(), HEADER_MAX_RECORDS);
    assert_eq!(
        reloaded.get_root_id(&(HEADER_MAX_RECORDS - 1).to_string()),
        Some(PageId(HEADER_MAX_RECORDS as i32 - 1))
    );
}

#[test]
fn names_must_survive_the_page_encoding() {
    let mut header_page = HeaderPage::new();
    assert!(!header_page.insert_record("", PageId(1)));
    assert!(!header_page.insert_record(&"x".repeat(33), PageId(1)));
    assert!(!header_page.insert_record("a\0b", PageId(1)));
    assert!(!header_page.insert_record("trailing\0", PageId(1)));
    assert_eq!(header_page.get_record_count(), 0);

    // the longest name still round trips
    let name = "x".repeat(32);
    assert!(header_page.insert_record(&name, PageId(2)));
    assert!(header_page.insert_record("a", PageId(3)));
    let mut buf = vec![0u8; crate::PAGE_SIZE];
    header_page.write_to(&mut buf);
    let reloaded = HeaderPage::from(&buf[..]);
    assert_eq!(reloaded.get_root_id(&name), Some(PageId(2)));
    assert_eq!(reloaded.get_root_id("a"), Some(PageId(3)));
    assert_eq!(reloaded.get_root_id("a\0b"), None);
}
