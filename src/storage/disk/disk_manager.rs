use crate::errors::{Result, StorageError};
use crate::{PageId, PAGE_SIZE};
use slog::Logger;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

// DiskManager takes care of reading and writing pages to and from disk, providing a logical file layer within the
// context of a database management system. It also owns the raw log file the log manager appends to.
//
// Page I/O and log I/O are guarded by separate locks and never wait on each other.
pub struct DiskManager {
    filename: String,
    db_file: Mutex<Option<File>>,
    log_file: Mutex<Option<File>>,
    num_writes: AtomicU64,
    num_flushes: AtomicU64,
    logger: Logger,
}

impl DiskManager {
    // Creates a new disk manager that writes to the specified database file.
    pub fn new(filename: &str, logger: &Logger) -> Result<Self> {
        if let Some(n) = filename.rfind('.') {
            let log_name = filename[..n].to_string() + ".log";
            debug!(logger, "opening storage"; "db_file" => filename, "log_file" => &log_name);

            let log_file = OpenOptions::new()
                .read(true)
                .append(true)
                .create(true)
                .open(&log_name)?;

            let db_file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .open(filename)?;

            Ok(Self {
                filename: filename.to_string(),
                db_file: Mutex::new(Some(db_file)),
                log_file: Mutex::new(Some(log_file)),
                num_writes: AtomicU64::new(0),
                num_flushes: AtomicU64::new(0),
                logger: logger.clone(),
            })
        } else {
            bail!(StorageError::InvalidArgument(format!(
                "wrong file format: {}",
                filename
            )))
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    // Write the contents of the specified page into disk file
    pub fn write_page(&self, page_id: PageId, page_data: &[u8]) -> Result<()> {
        if page_data.len() != PAGE_SIZE {
            bail!(StorageError::SizeMismatch {
                expected: PAGE_SIZE,
                actual: page_data.len(),
            })
        }
        let offset = Self::offset_of(page_id)?;

        let mut guard = lock(&self.db_file);
        let db_file = guard.as_mut().ok_or(StorageError::Closed)?;
        db_file.seek(SeekFrom::Start(offset))?;
        db_file.write_all(page_data)?;
        db_file.flush()?;

        let num_writes = self.num_writes.fetch_add(1, Ordering::SeqCst) + 1;
        trace!(self.logger, "write page"; "page_id" => page_id.0, "num_writes" => num_writes);
        Ok(())
    }

    // Read the contents of the specified page into the given memory area.
    // Regions never written (or cut short) read back as zeroes.
    pub fn read_page(&self, page_id: PageId, page_data: &mut [u8]) -> Result<()> {
        if page_data.len() != PAGE_SIZE {
            bail!(StorageError::SizeMismatch {
                expected: PAGE_SIZE,
                actual: page_data.len(),
            })
        }
        let offset = Self::offset_of(page_id)?;

        let mut guard = lock(&self.db_file);
        let db_file = guard.as_mut().ok_or(StorageError::Closed)?;
        let file_len = db_file.metadata()?.len();

        let mut n = 0;
        if offset < file_len {
            db_file.seek(SeekFrom::Start(offset))?;
            // read() may return early, keep going until EOF or a full page
            while n < PAGE_SIZE {
                let read = db_file.read(&mut page_data[n..])?;
                if read == 0 {
                    break;
                }
                n += read;
            }
        }
        if n < PAGE_SIZE {
            if offset < file_len {
                warn!(
                    self.logger,
                    "Read less than a page, n: {}, page_size: {}", n, PAGE_SIZE
                );
            }
            page_data[n..].iter_mut().for_each(|b| *b = 0);
        }
        Ok(())
    }

    // Write the contents of the log into disk file
    pub fn write_log(&self, log_data: &[u8]) -> Result<()> {
        if log_data.is_empty() {
            return Ok(());
        }

        let mut guard = lock(&self.log_file);
        let log_file = guard.as_mut().ok_or(StorageError::Closed)?;
        log_file.write_all(log_data)?;
        log_file.flush()?;

        self.num_flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    // Fill `log_data` with the log bytes starting at `offset`.
    pub fn read_log(&self, log_data: &mut [u8], offset: u64) -> Result<()> {
        let mut guard = lock(&self.log_file);
        let log_file = guard.as_mut().ok_or(StorageError::Closed)?;

        let log_size = log_data.len() as u64;
        let file_len = log_file.metadata()?.len();
        if offset > file_len || file_len - offset < log_size {
            bail!(StorageError::NotFound(format!(
                "log range [{}, {}) beyond log end {}",
                offset,
                offset + log_size,
                file_len
            )))
        }
        log_file.seek(SeekFrom::Start(offset))?;
        log_file.read_exact(log_data)?;
        Ok(())
    }

    // Number of pages the db file spans, counting a trailing partial page.
    pub fn num_pages(&self) -> Result<u64> {
        let guard = lock(&self.db_file);
        let db_file = guard.as_ref().ok_or(StorageError::Closed)?;
        let len = db_file.metadata()?.len();
        Ok((len + PAGE_SIZE as u64 - 1) / PAGE_SIZE as u64)
    }

    pub fn num_writes(&self) -> u64 {
        self.num_writes.load(Ordering::SeqCst)
    }

    pub fn num_flushes(&self) -> u64 {
        self.num_flushes.load(Ordering::SeqCst)
    }

    // Sync and close both files. Every later call fails with `StorageError::Closed`.
    pub fn shut_down(&self) -> Result<()> {
        if let Some(db_file) = lock(&self.db_file).take() {
            db_file.sync_all()?;
        }
        if let Some(log_file) = lock(&self.log_file).take() {
            log_file.sync_all()?;
        }
        info!(self.logger, "disk manager shut down"; "db_file" => &self.filename);
        Ok(())
    }

    fn offset_of(page_id: PageId) -> Result<u64> {
        if !page_id.is_valid() {
            bail!(StorageError::InvalidArgument(format!(
                "page id {} has no disk offset",
                page_id
            )))
        }
        Ok(page_id.0 as u64 * PAGE_SIZE as u64)
    }
}

fn lock(file: &Mutex<Option<File>>) -> MutexGuard<'_, Option<File>> {
    file.lock().unwrap_or_else(PoisonError::into_inner)
}
