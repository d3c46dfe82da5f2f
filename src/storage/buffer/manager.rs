use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use parking_lot::{Mutex, RwLock};
use log::{debug, error};

use crate::common::types::{Page, PageId, PagePtr, FrameId, INVALID_PAGE_ID};
use crate::storage::buffer::error::BufferPoolError;
use crate::storage::buffer::replacer::ClockReplacer;
use crate::storage::disk::DiskManager;
use crate::storage::wal::LogManager;

/// A slot in the frame array. The page data itself lives behind the frame
/// latch in `page`; everything else is metadata owned by the instance latch.
struct Frame {
    page: PagePtr,
    page_id: PageId,
    pin_count: u32,
    is_dirty: bool,
}

impl Frame {
    fn new() -> Self {
        Self {
            page: Arc::new(RwLock::new(Page::new(INVALID_PAGE_ID))),
            page_id: INVALID_PAGE_ID,
            pin_count: 0,
            is_dirty: false,
        }
    }
}

/// Everything guarded by the instance latch
struct PoolInner {
    frames: Vec<Frame>,
    page_table: HashMap<PageId, FrameId>,
    free_list: VecDeque<FrameId>,
    replacer: ClockReplacer,
    next_page_id: PageId,
}

/// One buffer pool instance: a fixed array of frames caching disk pages,
/// with clock eviction.
///
/// Every public method takes the instance latch for its whole duration and
/// releases it before handing a `PagePtr` back, so page-table, free-list and
/// replacer updates are serialised. The per-frame latch (the `RwLock` inside
/// `PagePtr`) is only ever acquired while the instance latch is held, never
/// the other way around; callers holding a page latch must release it before
/// calling back into the pool.
///
/// Page IDs are allocated here in steps of `num_instances`, starting at
/// `instance_index`, so several instances can stripe one ID space (see
/// [`ParallelBufferPoolManager`](crate::storage::buffer::ParallelBufferPoolManager)).
pub struct BufferPoolManager {
    pool_size: usize,
    num_instances: u32,
    instance_index: u32,
    disk_manager: Arc<DiskManager>,
    log_manager: Option<Arc<LogManager>>,
    inner: Mutex<PoolInner>,
}

impl BufferPoolManager {
    /// Create a standalone instance owning the whole page-ID space
    pub fn new(
        pool_size: usize,
        disk_manager: Arc<DiskManager>,
        log_manager: Option<Arc<LogManager>>,
    ) -> Self {
        Self::with_striping(pool_size, 1, 0, disk_manager, log_manager)
    }

    /// Create one instance of a striped pool. The instance only allocates
    /// page IDs congruent to `instance_index` modulo `num_instances`.
    pub fn with_striping(
        pool_size: usize,
        num_instances: u32,
        instance_index: u32,
        disk_manager: Arc<DiskManager>,
        log_manager: Option<Arc<LogManager>>,
    ) -> Self {
        assert!(num_instances > 0, "a pool needs at least one instance");
        assert!(
            instance_index < num_instances,
            "instance index {} out of range for {} instances",
            instance_index,
            num_instances
        );

        let frames = (0..pool_size).map(|_| Frame::new()).collect();
        let free_list = (0..pool_size).collect();

        Self {
            pool_size,
            num_instances,
            instance_index,
            disk_manager,
            log_manager,
            inner: Mutex::new(PoolInner {
                frames,
                page_table: HashMap::new(),
                free_list,
                replacer: ClockReplacer::new(pool_size),
                next_page_id: instance_index as PageId,
            }),
        }
    }

    /// Allocate a fresh page and pin it.
    ///
    /// Returns `None` when every frame is pinned.
    pub fn new_page(&self) -> Result<Option<(PagePtr, PageId)>, BufferPoolError> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let Some(frame_id) = self.acquire_frame(inner)? else {
            return Ok(None);
        };

        let page_id = self.allocate_page(inner);
        debug!("allocated page {} into frame {}", page_id, frame_id);

        let frame = &mut inner.frames[frame_id];
        {
            let mut page = frame.page.write();
            page.reset();
            page.page_id = page_id;
        }
        frame.page_id = page_id;
        frame.pin_count = 1;
        frame.is_dirty = false;

        inner.page_table.insert(page_id, frame_id);
        inner.replacer.pin(frame_id);

        Ok(Some((inner.frames[frame_id].page.clone(), page_id)))
    }

    /// Fetch a page, reading it from disk if it is not resident.
    ///
    /// Returns `None` when the page cannot be given a frame because every
    /// frame is pinned, or when `page_id` is the invalid sentinel.
    pub fn fetch_page(&self, page_id: PageId) -> Result<Option<PagePtr>, BufferPoolError> {
        if page_id == INVALID_PAGE_ID {
            return Ok(None);
        }

        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        if let Some(&frame_id) = inner.page_table.get(&page_id) {
            inner.frames[frame_id].pin_count += 1;
            inner.replacer.pin(frame_id);
            return Ok(Some(inner.frames[frame_id].page.clone()));
        }

        let Some(frame_id) = self.acquire_frame(inner)? else {
            return Ok(None);
        };

        {
            let frame = &mut inner.frames[frame_id];
            let mut page = frame.page.write();
            if let Err(e) = self.disk_manager.read_page(page_id, &mut page) {
                // The fetch failed but the pool must stay coherent: hand the
                // frame back to the free list before surfacing the error.
                error!("read of page {} failed: {}", page_id, e);
                page.reset();
                drop(page);
                frame.page_id = INVALID_PAGE_ID;
                frame.pin_count = 0;
                frame.is_dirty = false;
                inner.free_list.push_back(frame_id);
                return Err(e.into());
            }
            drop(page);
            frame.page_id = page_id;
            frame.pin_count = 1;
            frame.is_dirty = false;
        }

        inner.page_table.insert(page_id, frame_id);
        inner.replacer.pin(frame_id);

        Ok(Some(inner.frames[frame_id].page.clone()))
    }

    /// Drop one pin on a page, optionally marking it dirty.
    ///
    /// The dirty bit is sticky: once set it stays set until the page is
    /// flushed, whatever later unpins say. Returns false if the page is not
    /// resident or its pin count is already zero.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let Some(&frame_id) = inner.page_table.get(&page_id) else {
            return false;
        };

        let frame = &mut inner.frames[frame_id];
        frame.is_dirty |= is_dirty;
        if frame.pin_count == 0 {
            return false;
        }
        frame.pin_count -= 1;
        if frame.pin_count == 0 {
            inner.replacer.unpin(frame_id);
        }
        true
    }

    /// Write a resident page out to disk, whether or not it is dirty.
    ///
    /// Returns false for the invalid sentinel and for pages that are not
    /// resident.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool, BufferPoolError> {
        if page_id == INVALID_PAGE_ID {
            return Ok(false);
        }

        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let Some(&frame_id) = inner.page_table.get(&page_id) else {
            return Ok(false);
        };

        let frame = &mut inner.frames[frame_id];
        self.write_frame(frame)?;
        frame.is_dirty = false;
        Ok(true)
    }

    /// Write every dirty resident page out to disk
    pub fn flush_all_pages(&self) -> Result<(), BufferPoolError> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        for &frame_id in inner.page_table.values() {
            let frame = &mut inner.frames[frame_id];
            if frame.is_dirty {
                self.write_frame(frame)?;
                frame.is_dirty = false;
            }
        }
        Ok(())
    }

    /// Delete a page from the pool, returning its frame to the free list.
    ///
    /// Returns true if the page is gone afterwards (including "was never
    /// resident"), false if it is still pinned.
    pub fn delete_page(&self, page_id: PageId) -> Result<bool, BufferPoolError> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let Some(&frame_id) = inner.page_table.get(&page_id) else {
            return Ok(true);
        };
        if inner.frames[frame_id].pin_count > 0 {
            return Ok(false);
        }

        inner.page_table.remove(&page_id);
        let frame = &mut inner.frames[frame_id];
        frame.page.write().reset();
        frame.page_id = INVALID_PAGE_ID;
        frame.pin_count = 0;
        frame.is_dirty = false;

        inner.replacer.remove(frame_id);
        inner.free_list.push_back(frame_id);
        self.disk_manager.deallocate_page(page_id);
        debug!("deleted page {} from frame {}", page_id, frame_id);
        Ok(true)
    }

    /// Number of frames in the pool
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Number of frames that have never held a page or were freed by delete
    pub fn free_frame_count(&self) -> usize {
        self.inner.lock().free_list.len()
    }

    /// Number of resident frames the replacer could evict right now
    pub fn evictable_count(&self) -> usize {
        self.inner.lock().replacer.size()
    }

    /// Whether a page is resident
    pub fn contains_page(&self, page_id: PageId) -> bool {
        self.inner.lock().page_table.contains_key(&page_id)
    }

    /// Pin count of a resident page
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        let inner = self.inner.lock();
        let frame_id = *inner.page_table.get(&page_id)?;
        Some(inner.frames[frame_id].pin_count)
    }

    /// Dirty flag of a resident page
    pub fn is_dirty(&self, page_id: PageId) -> Option<bool> {
        let inner = self.inner.lock();
        let frame_id = *inner.page_table.get(&page_id)?;
        Some(inner.frames[frame_id].is_dirty)
    }

    /// Pop a frame from the free list, or evict a victim chosen by the
    /// replacer, writing its page back first if dirty. `Ok(None)` means every
    /// frame is pinned.
    fn acquire_frame(&self, inner: &mut PoolInner) -> Result<Option<FrameId>, BufferPoolError> {
        if let Some(frame_id) = inner.free_list.pop_front() {
            return Ok(Some(frame_id));
        }

        let Some(frame_id) = inner.replacer.victim() else {
            return Ok(None);
        };

        let old_page_id = inner.frames[frame_id].page_id;
        debug!("evicting page {} from frame {}", old_page_id, frame_id);
        if inner.frames[frame_id].is_dirty {
            if let Err(e) = self.write_frame(&inner.frames[frame_id]) {
                // The victim is already out of the replacer; retire its frame
                // to the free list so the pool stays coherent before the
                // error surfaces. The unwritten page is gone with it.
                error!("writeback of page {} failed: {}", old_page_id, e);
                if old_page_id != INVALID_PAGE_ID {
                    inner.page_table.remove(&old_page_id);
                }
                let frame = &mut inner.frames[frame_id];
                frame.page.write().reset();
                frame.page_id = INVALID_PAGE_ID;
                frame.pin_count = 0;
                frame.is_dirty = false;
                inner.free_list.push_back(frame_id);
                return Err(e);
            }
            inner.frames[frame_id].is_dirty = false;
        }
        if old_page_id != INVALID_PAGE_ID {
            inner.page_table.remove(&old_page_id);
        }
        Ok(Some(frame_id))
    }

    /// Write one frame's page to disk, forcing the log first when the page
    /// carries log records beyond the durable LSN
    fn write_frame(&self, frame: &Frame) -> Result<(), BufferPoolError> {
        let page = frame.page.write();
        if let Some(log_manager) = &self.log_manager {
            if page.lsn > log_manager.durable_lsn() {
                log_manager.flush_until(page.lsn)?;
            }
        }
        self.disk_manager.write_page(&page)?;
        Ok(())
    }

    /// Hand out the next page ID under the striping rule
    fn allocate_page(&self, inner: &mut PoolInner) -> PageId {
        let page_id = inner.next_page_id;
        inner.next_page_id += self.num_instances as PageId;
        assert_eq!(
            page_id.rem_euclid(self.num_instances as PageId),
            self.instance_index as PageId,
            "page {} does not belong to instance {}",
            page_id,
            self.instance_index
        );
        page_id
    }
}
