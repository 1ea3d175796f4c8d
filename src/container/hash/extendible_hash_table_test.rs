use crate::container::hash::extendible_hash_table::{DiskExtendibleHashTable, HashTableOptions};
use crate::errors::{Result, StorageError};
use crate::storage::disk::disk_manager::DiskManager;
use crate::{
    default_logger, logger_with_level, remove_db_files, BufferPoolManager, PageId, Rid, Transaction,
};
use rand::prelude::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::sync::Arc;
use std::thread;

fn open(filename: &str, pool_size: usize) -> Result<Arc<BufferPoolManager>> {
    let logger = default_logger();
    let disk_manager = DiskManager::new(filename, &logger)?;
    Ok(Arc::new(BufferPoolManager::new(
        pool_size,
        disk_manager,
        &logger,
    )?))
}

fn small_buckets(bucket_max_size: usize) -> HashTableOptions {
    HashTableOptions {
        bucket_max_size,
        ..Default::default()
    }
}

// Every frame can be taken over by a new page, so nothing is left pinned.
fn assert_no_pins(bpm: &BufferPoolManager) -> Result<()> {
    let mut pages = vec![];
    for _ in 0..bpm.get_pool_size() {
        let page = bpm.new_page()?;
        assert!(page.is_some(), "a frame is still pinned");
        pages.push(page.unwrap().get_id());
    }
    for page_id in pages {
        assert!(bpm.unpin_page(page_id, false));
    }
    Ok(())
}

#[test]
fn sample_test() -> Result<()> {
    let filename = "target/hash_table_sample_test.db";
    remove_db_files(filename);
    let bpm = open(filename, 50)?;
    let txn = Transaction::new(0);
    let ht = DiskExtendibleHashTable::<i32, i32>::new(
        "foo_pk",
        Arc::clone(&bpm),
        HashTableOptions::default(),
        &default_logger(),
    )?;
    assert_eq!(ht.global_depth()?, 0);

    // insert a few values
    for i in 0..5 {
        assert!(ht.insert(&txn, i, i)?);
        assert_eq!(ht.get_value(&txn, &i)?, vec![i]);
    }
    ht.verify_integrity()?;

    // check if the inserted values are all there
    for i in 0..5 {
        assert_eq!(ht.get_value(&txn, &i)?, vec![i]);
    }

    // insert one more value for each key
    for i in 0..5 {
        if i == 0 {
            // duplicate values for the same key are not allowed
            assert!(!ht.insert(&txn, i, 2 * i)?);
        } else {
            assert!(ht.insert(&txn, i, 2 * i)?);
        }
        assert!(!ht.insert(&txn, i, 2 * i)?);
        let mut values = ht.get_value(&txn, &i)?;
        values.sort();
        if i == 0 {
            assert_eq!(values, vec![i]);
        } else {
            assert_eq!(values, vec![i, 2 * i]);
        }
    }
    ht.verify_integrity()?;

    // look for a key that does not exist
    assert!(ht.get_value(&txn, &20)?.is_empty());

    // delete some values
    for i in 0..5 {
        assert!(ht.remove(&txn, &i, &i)?);
        let values = ht.get_value(&txn, &i)?;
        if i == 0 {
            // (0, 0) is the only pair with key 0
            assert!(values.is_empty());
        } else {
            assert_eq!(values, vec![2 * i]);
        }
    }
    ht.verify_integrity()?;

    // delete all values
    for i in 0..5 {
        if i == 0 {
            // (0, 0) has been deleted already
            assert!(!ht.remove(&txn, &i, &(2 * i))?);
        } else {
            assert!(ht.remove(&txn, &i, &(2 * i))?);
        }
        assert!(ht.get_value(&txn, &i)?.is_empty());
    }
    ht.verify_integrity()?;
    assert_no_pins(&bpm)?;

    drop(ht);
    remove_db_files(filename);
    Ok(())
}

#[test]
fn splits_grow_and_merges_shrink_the_directory() -> Result<()> {
    let filename = "target/hash_table_grow_shrink_test.db";
    remove_db_files(filename);
    // far fewer frames than buckets, so buckets go back and forth to disk
    let bpm = open(filename, 10)?;
    let txn = Transaction::new(0);
    let ht = DiskExtendibleHashTable::<i32, i32>::new(
        "grow_shrink",
        Arc::clone(&bpm),
        small_buckets(4),
        // splits and merges log at debug
        &logger_with_level(slog::Level::Info),
    )?;

    for i in 0..200 {
        assert!(ht.insert(&txn, i, i * 10)?, "insert of {} failed", i);
    }
    let grown = ht.global_depth()?;
    // 200 pairs need at least 50 buckets of 4
    assert!(grown >= 6, "global depth {} is too small", grown);
    ht.verify_integrity()?;

    for i in 0..200 {
        assert_eq!(ht.get_value(&txn, &i)?, vec![i * 10]);
    }
    assert!(ht.get_value(&txn, &200)?.is_empty());

    let mut keys: Vec<i32> = (0..200).collect();
    let mut rng: StdRng = SeedableRng::seed_from_u64(7);
    keys.shuffle(&mut rng);
    for (n, key) in keys.iter().enumerate() {
        assert!(ht.remove(&txn, key, &(key * 10))?);
        assert!(!ht.remove(&txn, key, &(key * 10))?);
        if n % 50 == 0 {
            ht.verify_integrity()?;
        }
    }

    // every bucket emptied and merged back into one
    assert_eq!(ht.global_depth()?, 0);
    ht.verify_integrity()?;
    for i in 0..200 {
        assert!(ht.get_value(&txn, &i)?.is_empty());
    }

    // the table keeps working after shrinking
    assert!(ht.insert(&txn, 7, 70)?);
    assert_eq!(ht.get_value(&txn, &7)?, vec![70]);
    assert_no_pins(&bpm)?;

    drop(ht);
    remove_db_files(filename);
    Ok(())
}

#[test]
fn insert_fails_at_max_depth() -> Result<()> {
    let filename = "target/hash_table_max_depth_test.db";
    remove_db_files(filename);
    let bpm = open(filename, 10)?;
    let txn = Transaction::new(0);
    let ht = DiskExtendibleHashTable::<i32, i32>::new(
        "max_depth",
        Arc::clone(&bpm),
        HashTableOptions {
            directory_max_depth: 2,
            bucket_max_size: 2,
        },
        &default_logger(),
    )?;

    // at most 4 buckets of 2
    let mut inserted = vec![];
    for i in 0..20 {
        if ht.insert(&txn, i, i)? {
            inserted.push(i);
        }
    }
    assert!(inserted.len() <= 8);
    assert!(inserted.len() < 20);
    assert!(ht.global_depth()? <= 2);
    ht.verify_integrity()?;
    for i in inserted {
        assert_eq!(ht.get_value(&txn, &i)?, vec![i]);
    }
    assert_no_pins(&bpm)?;

    drop(ht);
    remove_db_files(filename);
    Ok(())
}

#[test]
fn values_of_one_key_cannot_outgrow_a_bucket() -> Result<()> {
    let filename = "target/hash_table_same_key_test.db";
    remove_db_files(filename);
    let bpm = open(filename, 10)?;
    let txn = Transaction::new(0);
    let ht = DiskExtendibleHashTable::<i32, i32>::new(
        "same_key",
        Arc::clone(&bpm),
        HashTableOptions {
            directory_max_depth: 3,
            bucket_max_size: 2,
        },
        &default_logger(),
    )?;

    assert!(ht.insert(&txn, 1, 0)?);
    assert!(ht.insert(&txn, 1, 1)?);
    // splitting never separates equal keys, so the directory grows to its limit and gives up
    assert!(!ht.insert(&txn, 1, 2)?);
    assert_eq!(ht.global_depth()?, 3);
    ht.verify_integrity()?;

    let mut values = ht.get_value(&txn, &1)?;
    values.sort();
    assert_eq!(values, vec![0, 1]);

    drop(ht);
    remove_db_files(filename);
    Ok(())
}

#[test]
fn reopen_by_name() -> Result<()> {
    let filename = "target/hash_table_reopen_test.db";
    remove_db_files(filename);
    let txn = Transaction::new(0);

    let directory_page_id = {
        let bpm = open(filename, 10)?;
        let ht = DiskExtendibleHashTable::<i64, Rid>::new(
            "orders_pk",
            Arc::clone(&bpm),
            small_buckets(8),
            &default_logger(),
        )?;
        for i in 0..100 {
            assert!(ht.insert(&txn, i, Rid::new(PageId(i as i32), i as u32))?);
        }
        let other = DiskExtendibleHashTable::<i64, Rid>::new(
            "orders_sk",
            Arc::clone(&bpm),
            HashTableOptions::default(),
            &default_logger(),
        )?;
        assert_ne!(other.directory_page_id(), ht.directory_page_id());
        assert!(other.insert(&txn, 1, Rid::new(PageId(9), 9))?);

        bpm.flush_all_pages()?;
        ht.directory_page_id()
    };

    let bpm = open(filename, 10)?;
    let ht = DiskExtendibleHashTable::<i64, Rid>::new(
        "orders_pk",
        Arc::clone(&bpm),
        small_buckets(8),
        &default_logger(),
    )?;
    assert_eq!(ht.directory_page_id(), directory_page_id);
    assert!(ht.global_depth()? > 0);
    ht.verify_integrity()?;
    for i in 0..100 {
        assert_eq!(
            ht.get_value(&txn, &i)?,
            vec![Rid::new(PageId(i as i32), i as u32)]
        );
    }

    // pages allocated after reopening never collide with the table's pages
    assert!(ht.insert(&txn, 1000, Rid::new(PageId(1000), 0))?);
    for i in 0..100 {
        assert_eq!(ht.get_value(&txn, &i)?.len(), 1);
    }

    let other = DiskExtendibleHashTable::<i64, Rid>::new(
        "orders_sk",
        Arc::clone(&bpm),
        HashTableOptions::default(),
        &default_logger(),
    )?;
    assert_eq!(other.get_value(&txn, &1)?, vec![Rid::new(PageId(9), 9)]);
    assert!(other.get_value(&txn, &2)?.is_empty());

    drop(ht);
    drop(other);
    remove_db_files(filename);
    Ok(())
}

#[test]
fn exhausted_pool_is_reported() -> Result<()> {
    let filename = "target/hash_table_full_pool_test.db";
    remove_db_files(filename);
    let bpm = open(filename, 3)?;
    let txn = Transaction::new(0);
    let ht = DiskExtendibleHashTable::<i32, i32>::new(
        "full_pool",
        Arc::clone(&bpm),
        HashTableOptions::default(),
        &default_logger(),
    )?;
    assert!(ht.insert(&txn, 1, 1)?);

    let pinned: Vec<PageId> = (0..3)
        .map(|_| bpm.new_page().map(|page| page.unwrap().get_id()))
        .collect::<Result<_>>()?;

    let err = ht.insert(&txn, 2, 2).unwrap_err();
    assert_eq!(err.downcast_ref::<StorageError>(), Some(&StorageError::Full));
    let err = ht.get_value(&txn, &1).unwrap_err();
    assert_eq!(err.downcast_ref::<StorageError>(), Some(&StorageError::Full));

    for page_id in pinned {
        assert!(bpm.unpin_page(page_id, false));
    }
    assert!(ht.insert(&txn, 2, 2)?);
    assert_eq!(ht.get_value(&txn, &1)?, vec![1]);
    assert_no_pins(&bpm)?;

    drop(ht);
    remove_db_files(filename);
    Ok(())
}

#[test]
fn invalid_options_are_rejected() -> Result<()> {
    let filename = "target/hash_table_options_test.db";
    remove_db_files(filename);
    let bpm = open(filename, 5)?;

    let too_deep = HashTableOptions {
        directory_max_depth: 10,
        ..Default::default()
    };
    let err = DiskExtendibleHashTable::<i32, i32>::new(
        "too_deep",
        Arc::clone(&bpm),
        too_deep,
        &default_logger(),
    )
    .err()
    .unwrap();
    assert!(matches!(
        err.downcast_ref::<StorageError>(),
        Some(StorageError::InvalidArgument(_))
    ));

    let long_name = "n".repeat(64);
    assert!(DiskExtendibleHashTable::<i32, i32>::new(
        &long_name,
        Arc::clone(&bpm),
        HashTableOptions::default(),
        &default_logger(),
    )
    .is_err());

    remove_db_files(filename);
    Ok(())
}

#[test]
fn concurrent_inserts_and_lookups() -> Result<()> {
    let filename = "target/hash_table_concurrent_test.db";
    remove_db_files(filename);
    let bpm = open(filename, 16)?;
    let ht = Arc::new(DiskExtendibleHashTable::<i32, i32>::new(
        "concurrent",
        Arc::clone(&bpm),
        small_buckets(8),
        &logger_with_level(slog::Level::Info),
    )?);

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let ht = Arc::clone(&ht);
            thread::spawn(move || -> Result<()> {
                let txn = Transaction::new(t);
                assert_eq!(txn.get_txn_id(), t);
                for i in t * 100..(t + 1) * 100 {
                    assert!(ht.insert(&txn, i, i)?);
                    assert_eq!(ht.get_value(&txn, &i)?, vec![i]);
                }
                Ok(())
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap()?;
    }

    let txn = Transaction::new(0);
    ht.verify_integrity()?;
    for i in 0..400 {
        assert_eq!(ht.get_value(&txn, &i)?, vec![i]);
    }

    // remove half of the keys from several threads at once
    let handles: Vec<_> = (0..4)
        .map(|t| {
            let ht = Arc::clone(&ht);
            thread::spawn(move || -> Result<()> {
                let txn = Transaction::new(t);
                for i in (t * 100..(t + 1) * 100).filter(|i| i % 2 == 0) {
                    assert!(ht.remove(&txn, &i, &i)?);
                }
                Ok(())
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap()?;
    }

    ht.verify_integrity()?;
    for i in 0..400 {
        let expected = if i % 2 == 0 { vec![] } else { vec![i] };
        assert_eq!(ht.get_value(&txn, &i)?, expected);
    }
    assert_no_pins(&bpm)?;

    drop(ht);
    remove_db_files(filename);
    Ok(())
}
