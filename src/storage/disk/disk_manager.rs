use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write, Seek, SeekFrom};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use parking_lot::Mutex;
use thiserror::Error;

use crate::common::types::{Page, PageId, PAGE_SIZE};

#[derive(Error, Debug)]
pub enum DiskManagerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Invalid page ID: {0}")]
    InvalidPageId(PageId),
}

/// DiskManager is responsible for handling the actual disk I/O operations.
///
/// Page IDs are allocated by the buffer pool, not here; the disk manager is
/// only told about deallocations so backing storage can be reused later.
pub struct DiskManager {
    db_file: Mutex<File>,
    deallocated: Mutex<HashSet<PageId>>,
    read_count: AtomicU64,
    write_count: AtomicU64,
}

impl DiskManager {
    /// Create a new DiskManager with the specified database file
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self, DiskManagerError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(db_path)?;

        Ok(Self {
            db_file: Mutex::new(file),
            deallocated: Mutex::new(HashSet::new()),
            read_count: AtomicU64::new(0),
            write_count: AtomicU64::new(0),
        })
    }

    /// Read a page from disk.
    ///
    /// Reading past the current end of file zero-fills the buffer and stamps
    /// the page ID, so pages whose IDs were handed out by the buffer pool can
    /// be fetched before their first writeback.
    pub fn read_page(&self, page_id: PageId, page: &mut Page) -> Result<(), DiskManagerError> {
        if page_id < 0 {
            return Err(DiskManagerError::InvalidPageId(page_id));
        }

        let offset = self.page_offset(page_id);
        self.read_count.fetch_add(1, Ordering::Relaxed);

        {
            let mut file = self.db_file.lock();
            let file_size = file.metadata()?.len();

            // The page has never been written: hand back a fresh zeroed page
            if offset >= file_size {
                page.data.fill(0);
                page.page_id = page_id;
                page.lsn = 0;
                return Ok(());
            }

            file.seek(SeekFrom::Start(offset))?;
            file.read_exact(&mut page.data)?;
        }

        page.page_id = page_id;
        page.lsn = 0;
        Ok(())
    }

    /// Write a page to disk
    pub fn write_page(&self, page: &Page) -> Result<(), DiskManagerError> {
        if page.page_id < 0 {
            return Err(DiskManagerError::InvalidPageId(page.page_id));
        }

        let offset = self.page_offset(page.page_id);

        let mut file = self.db_file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(&page.data)?;
        file.flush()?;

        self.write_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Record that a page ID is no longer in use so its backing storage can
    /// be reused
    pub fn deallocate_page(&self, page_id: PageId) {
        self.deallocated.lock().insert(page_id);
    }

    /// Whether a page ID has been deallocated
    pub fn is_deallocated(&self, page_id: PageId) -> bool {
        self.deallocated.lock().contains(&page_id)
    }

    /// Number of page reads served so far
    pub fn read_count(&self) -> u64 {
        self.read_count.load(Ordering::Relaxed)
    }

    /// Number of page writes performed so far
    pub fn write_count(&self) -> u64 {
        self.write_count.load(Ordering::Relaxed)
    }

    /// Calculate the offset of a page in the file
    fn page_offset(&self, page_id: PageId) -> u64 {
        page_id as u64 * PAGE_SIZE as u64
    }
}
