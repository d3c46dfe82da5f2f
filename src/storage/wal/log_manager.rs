use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use byteorder::{LittleEndian, WriteBytesExt};
use parking_lot::Mutex;
use thiserror::Error;

use crate::common::types::Lsn;

/// Error type for log manager operations
#[derive(Error, Debug)]
pub enum LogManagerError {
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
}

/// Result type for log manager operations
pub type Result<T> = std::result::Result<T, LogManagerError>;

/// The tail of the write-ahead log.
///
/// Records are appended to an in-memory buffer and assigned monotonically
/// increasing LSNs starting at 1. The buffer pool forces the log to disk up
/// to a page's LSN before that page is written back, which is the only
/// ordering the WAL protocol requires of it.
pub struct LogManager {
    /// Next LSN to hand out
    next_lsn: AtomicU64,
    /// Highest LSN known to be on disk
    durable_lsn: AtomicU64,
    /// Records appended but not yet flushed, in LSN order
    buffer: Mutex<VecDeque<(Lsn, Vec<u8>)>>,
    log_file: Mutex<File>,
}

impl LogManager {
    /// Create a new LogManager writing to the specified log file
    pub fn new(log_path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(log_path)?;

        Ok(Self {
            next_lsn: AtomicU64::new(1),
            durable_lsn: AtomicU64::new(0),
            buffer: Mutex::new(VecDeque::new()),
            log_file: Mutex::new(file),
        })
    }

    /// Append a record to the log buffer and return its LSN
    pub fn append(&self, payload: &[u8]) -> Lsn {
        let lsn = self.next_lsn.fetch_add(1, Ordering::SeqCst);
        self.buffer.lock().push_back((lsn, payload.to_vec()));
        lsn
    }

    /// Highest LSN persisted to the log file
    pub fn durable_lsn(&self) -> Lsn {
        self.durable_lsn.load(Ordering::SeqCst)
    }

    /// Force every buffered record with an LSN up to and including `lsn`
    /// out to the log file
    pub fn flush_until(&self, lsn: Lsn) -> Result<()> {
        let mut buffer = self.buffer.lock();
        let mut file = self.log_file.lock();

        let mut flushed = self.durable_lsn();
        while let Some((record_lsn, payload)) = buffer.pop_front() {
            if record_lsn > lsn {
                buffer.push_front((record_lsn, payload));
                break;
            }
            file.write_u64::<LittleEndian>(record_lsn)?;
            file.write_u32::<LittleEndian>(payload.len() as u32)?;
            file.write_all(&payload)?;
            flushed = record_lsn;
        }
        file.flush()?;

        self.durable_lsn.fetch_max(flushed, Ordering::SeqCst);
        Ok(())
    }

    /// Force everything buffered so far out to the log file
    pub fn flush(&self) -> Result<()> {
        let up_to = self.next_lsn.load(Ordering::SeqCst).saturating_sub(1);
        self.flush_until(up_to)
    }
}
