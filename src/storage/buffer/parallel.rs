use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::common::types::{PageId, PagePtr};
use crate::storage::buffer::error::BufferPoolError;
use crate::storage::buffer::manager::BufferPoolManager;
use crate::storage::disk::DiskManager;
use crate::storage::wal::LogManager;

/// A pool of independent buffer pool instances striping one page-ID space.
///
/// Each page ID is owned by exactly one instance, `page_id mod N`, so routing
/// needs no shared mutable state. `new_page` rotates its starting instance so
/// allocation pressure spreads across the stripes.
pub struct ParallelBufferPoolManager {
    instances: Vec<Arc<BufferPoolManager>>,
    next_instance: AtomicUsize,
}

impl ParallelBufferPoolManager {
    /// Create `num_instances` striped instances of `pool_size` frames each,
    /// sharing one disk manager and optional log manager
    pub fn new(
        num_instances: usize,
        pool_size: usize,
        disk_manager: Arc<DiskManager>,
        log_manager: Option<Arc<LogManager>>,
    ) -> Self {
        assert!(num_instances > 0, "a pool needs at least one instance");

        let instances = (0..num_instances)
            .map(|i| {
                Arc::new(BufferPoolManager::with_striping(
                    pool_size,
                    num_instances as u32,
                    i as u32,
                    disk_manager.clone(),
                    log_manager.clone(),
                ))
            })
            .collect();

        Self {
            instances,
            next_instance: AtomicUsize::new(0),
        }
    }

    /// Total number of frames across all instances
    pub fn pool_size(&self) -> usize {
        self.instances.iter().map(|i| i.pool_size()).sum()
    }

    /// Number of instances in the pool
    pub fn num_instances(&self) -> usize {
        self.instances.len()
    }

    /// Allocate a fresh page from the first instance that has room, starting
    /// from a rotating cursor. Returns `None` once every instance is full of
    /// pinned pages.
    pub fn new_page(&self) -> Result<Option<(PagePtr, PageId)>, BufferPoolError> {
        let start = self.next_instance.fetch_add(1, Ordering::Relaxed);
        for offset in 0..self.instances.len() {
            let instance = &self.instances[(start + offset) % self.instances.len()];
            if let Some(result) = instance.new_page()? {
                return Ok(Some(result));
            }
        }
        Ok(None)
    }

    pub fn fetch_page(&self, page_id: PageId) -> Result<Option<PagePtr>, BufferPoolError> {
        self.instance_for(page_id).fetch_page(page_id)
    }

    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        self.instance_for(page_id).unpin_page(page_id, is_dirty)
    }

    pub fn flush_page(&self, page_id: PageId) -> Result<bool, BufferPoolError> {
        self.instance_for(page_id).flush_page(page_id)
    }

    pub fn delete_page(&self, page_id: PageId) -> Result<bool, BufferPoolError> {
        self.instance_for(page_id).delete_page(page_id)
    }

    /// Flush every dirty page in every instance
    pub fn flush_all_pages(&self) -> Result<(), BufferPoolError> {
        for instance in &self.instances {
            instance.flush_all_pages()?;
        }
        Ok(())
    }

    /// The instance owning a page ID
    fn instance_for(&self, page_id: PageId) -> &BufferPoolManager {
        let index = page_id.rem_euclid(self.instances.len() as PageId) as usize;
        &self.instances[index]
    }
}
