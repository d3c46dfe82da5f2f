use std::sync::Arc;
use tempfile::NamedTempFile;
use anyhow::Result;

use rilldb::storage::buffer::{BufferPoolManager, ParallelBufferPoolManager};
use rilldb::storage::disk::DiskManager;

// Create a temporary database file for testing
#[allow(dead_code)]
pub fn create_temp_db_file() -> Result<(NamedTempFile, String)> {
    let file = NamedTempFile::new()?;
    let path = file.path().to_str().unwrap().to_string();
    Ok((file, path))
}

// Create a buffer pool manager with a temporary database
#[allow(dead_code)]
pub fn create_test_buffer_pool(pool_size: usize) -> Result<(Arc<BufferPoolManager>, NamedTempFile)> {
    let (file, path) = create_temp_db_file()?;
    let disk_manager = Arc::new(DiskManager::new(path)?);
    let buffer_pool = Arc::new(BufferPoolManager::new(pool_size, disk_manager, None));
    Ok((buffer_pool, file))
}

// Same, but hand back the disk manager too so tests can inspect I/O
#[allow(dead_code)]
pub fn create_test_buffer_pool_with_disk(
    pool_size: usize,
) -> Result<(Arc<BufferPoolManager>, Arc<DiskManager>, NamedTempFile)> {
    let (file, path) = create_temp_db_file()?;
    let disk_manager = Arc::new(DiskManager::new(path)?);
    let buffer_pool = Arc::new(BufferPoolManager::new(pool_size, disk_manager.clone(), None));
    Ok((buffer_pool, disk_manager, file))
}

// Create a striped pool over a shared temporary database
#[allow(dead_code)]
pub fn create_test_parallel_pool(
    num_instances: usize,
    pool_size: usize,
) -> Result<(ParallelBufferPoolManager, Arc<DiskManager>, NamedTempFile)> {
    let (file, path) = create_temp_db_file()?;
    let disk_manager = Arc::new(DiskManager::new(path)?);
    let pool = ParallelBufferPoolManager::new(num_instances, pool_size, disk_manager.clone(), None);
    Ok((pool, disk_manager, file))
}
