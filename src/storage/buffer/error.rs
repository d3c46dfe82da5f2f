use thiserror::Error;
use crate::storage::disk::DiskManagerError;
use crate::storage::wal::LogManagerError;

#[derive(Error, Debug)]
pub enum BufferPoolError {
    #[error("Disk manager error: {0}")]
    DiskManagerError(#[from] DiskManagerError),

    #[error("WAL error: {0}")]
    WalError(#[from] LogManagerError),
}
