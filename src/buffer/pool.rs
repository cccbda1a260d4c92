use std::collections::HashMap;
use std::process;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use log::debug;
use log::error;
use parking_lot::Mutex;
use parking_lot::RwLock;

use crate::buffer::guard::ReadPageGuard;
use crate::buffer::guard::WritePageGuard;
use crate::buffer::replacer::LruKReplacer;
use crate::buffer::FrameId;
use crate::buffer::LogManager;
use crate::buffer::Replacer;
use crate::config::Config;
use crate::error::Result;
use crate::storage::new_disk;
use crate::storage::page::PageId;
use crate::storage::page::INVALID_PAGE_ID;
use crate::storage::page::PAGE_SIZE;
use crate::storage::scheduler::DiskRequest;
use crate::storage::scheduler::DiskScheduler;
use crate::storage::DiskManager;

/// A frame slot in the buffer pool.
///
/// The buffer holding the page bytes sits behind its own reader/writer
/// lock, shared through `Arc` with page guards and with in-flight disk
/// requests. The metadata fields are atomics so they can be read without
/// the pool lock; they are only written while holding it.
pub struct FrameHeader {
    frame_id: FrameId,
    page_id: AtomicI64,
    pin_count: AtomicUsize,
    dirty: AtomicBool,
    data: Arc<RwLock<Box<[u8]>>>,
}

impl FrameHeader {
    fn new(frame_id: FrameId) -> FrameHeader {
        FrameHeader {
            frame_id,
            page_id: AtomicI64::new(INVALID_PAGE_ID),
            pin_count: AtomicUsize::new(0),
            dirty: AtomicBool::new(false),
            data: Arc::new(RwLock::new(vec![0; PAGE_SIZE].into_boxed_slice())),
        }
    }

    pub(crate) fn page_id(&self) -> PageId {
        self.page_id.load(Ordering::SeqCst)
    }

    pub(crate) fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    pub(crate) fn data(&self) -> &Arc<RwLock<Box<[u8]>>> {
        &self.data
    }

    /// Reset the slot to its free state. Callers must hold the pool lock
    /// and the frame must be unpinned.
    fn reset(&self) {
        self.data.write().fill(0);
        self.page_id.store(INVALID_PAGE_ID, Ordering::SeqCst);
        self.pin_count.store(0, Ordering::SeqCst);
        self.dirty.store(false, Ordering::SeqCst);
    }
}

/// Bookkeeping protected by the pool lock. The page table, the free list
/// and the replacer always change together, so they live under a single
/// mutex.
pub(crate) struct PoolState {
    /// page table for keeping track of resident pages.
    page_table: HashMap<PageId, FrameId>,
    /// frames that currently hold no page, popped from the back.
    free_frames: Vec<FrameId>,
    /// replacer to find unpinned frames for replacement.
    replacer: Box<dyn Replacer>,
}

impl PoolState {
    /// Drop one pin on the frame; the last pin hands the frame back to
    /// the replacer as an eviction candidate.
    pub(crate) fn unpin(&mut self, frame: &FrameHeader) {
        if frame.pin_count.fetch_sub(1, Ordering::SeqCst) == 1 {
            // frame ids tracked by the pool are always in range.
            if let Err(err) = self.replacer.set_evictable(frame.frame_id, true) {
                error!("marking frame {} evictable failed: {}", frame.frame_id, err);
            }
        }
    }
}

/// The buffer pool is responsible for moving physical pages back and
/// forth from main memory to disk. It allows a DBMS to support databases
/// that are larger than the amount of memory available to the system.
///
/// The buffer pool's operations are transparent to other parts of the
/// system. For example, the system asks the buffer pool for a page using
/// its unique identifier (page id) and it does not know whether that page
/// is already in memory or whether it has to be retrieved from disk.
///
/// Page data is accessed through the guards returned by
/// [`BufferPool::checked_read_page`] and
/// [`BufferPool::checked_write_page`]: any number of read guards may
/// observe a page concurrently, a write guard is exclusive. A guard pins
/// the page's frame for its lifetime, shielding it from eviction.
pub struct BufferPool {
    num_frames: usize,
    /// the next page id to be allocated.
    next_page_id: AtomicI64,
    /// the frame headers of the frames this pool manages. The vector
    /// index is the frame id, in range [0, num_frames).
    frames: Vec<Arc<FrameHeader>>,
    /// page table, free list and replacer under the pool lock.
    state: Arc<Mutex<PoolState>>,
    /// the disk scheduler servicing page reads and flushes.
    scheduler: Arc<DiskScheduler>,
    /// write-ahead logging handle, carried for callers but not used by
    /// the pool itself.
    _log: Option<Arc<LogManager>>,
}

impl BufferPool {
    pub fn new(
        num_frames: usize,
        disk: Box<dyn DiskManager>,
        k_dist: usize,
        log: Option<Arc<LogManager>>,
    ) -> BufferPool {
        let mut frames = Vec::with_capacity(num_frames);
        let mut free_frames = Vec::with_capacity(num_frames);
        for i in 0..num_frames {
            frames.push(Arc::new(FrameHeader::new(i)));
            // initially, every frame is free
            free_frames.push(i);
        }
        let replacer: Box<dyn Replacer> = Box::new(LruKReplacer::new(num_frames, k_dist));
        let state = PoolState { page_table: HashMap::new(), free_frames, replacer };
        BufferPool {
            num_frames,
            next_page_id: AtomicI64::new(0),
            frames,
            state: Arc::new(Mutex::new(state)),
            scheduler: Arc::new(DiskScheduler::new(disk)),
            _log: log,
        }
    }

    /// Build a pool from configuration, with the configured disk type.
    pub fn from_config(config: &Config) -> Result<BufferPool> {
        let disk = new_disk(config.disk_type)?;
        Ok(BufferPool::new(config.pool_size, disk, config.replacer_k, None))
    }

    /// The number of frames this pool manages.
    pub fn size(&self) -> usize {
        self.num_frames
    }

    /// Allocate a new page id. The counter is monotonic and the device
    /// capacity is ensured before the id is handed out, so this cannot
    /// fail.
    pub fn new_page(&self) -> PageId {
        let _state = self.state.lock();
        let page_id = self.next_page_id.load(Ordering::SeqCst);
        self.scheduler.increase_disk_space(page_id);
        self.next_page_id.fetch_add(1, Ordering::SeqCst);
        page_id
    }

    /// Delete a page from the buffer pool. A page that is not resident is
    /// nothing to do and returns true. A resident page that is still
    /// pinned cannot be deleted and returns false immediately. Otherwise
    /// the page is flushed if dirty, its frame goes back to the free list
    /// and the scheduler is told the disk page may be reused.
    pub fn delete_page(&self, page_id: PageId) -> Result<bool> {
        let mut state = self.state.lock();
        let frame = match self.get_frame(&state, page_id) {
            Some(frame) => frame,
            None => return Ok(true),
        };
        if frame.pin_count.load(Ordering::SeqCst) > 0 {
            return Ok(false);
        }
        if frame.is_dirty() {
            self.flush_frame(&frame)?;
        }
        state.free_frames.push(frame.frame_id);
        self.scheduler.deallocate_page(page_id);
        state.replacer.remove(frame.frame_id)?;
        state.page_table.remove(&page_id);
        frame.reset();
        Ok(true)
    }

    /// Flush the page's buffer to disk regardless of the dirty flag and
    /// clear the flag afterwards. Returns false if the page is not
    /// resident.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        let state = self.state.lock();
        let frame = match self.get_frame(&state, page_id) {
            Some(frame) => frame,
            None => return Ok(false),
        };
        self.flush_frame(&frame)?;
        Ok(true)
    }

    /// Flush every resident dirty page and clear their dirty flags.
    pub fn flush_all_pages(&self) -> Result<()> {
        let state = self.state.lock();
        for &frame_id in state.page_table.values() {
            let frame = &self.frames[frame_id];
            if frame.is_dirty() {
                self.flush_frame(frame)?;
            }
        }
        Ok(())
    }

    /// Acquire a shared read guard over the page, bringing it into memory
    /// if needed. `Ok(None)` means every frame is pinned and the pool is
    /// out of memory.
    pub fn checked_read_page(&self, page_id: PageId) -> Result<Option<ReadPageGuard>> {
        let frame = match self.acquire_frame(page_id, false)? {
            Some(frame) => frame,
            None => return Ok(None),
        };
        Ok(Some(ReadPageGuard::new(page_id, frame, Arc::clone(&self.state))))
    }

    /// Acquire an exclusive write guard over the page, bringing it into
    /// memory if needed. The frame is marked dirty at pin time. `Ok(None)`
    /// means every frame is pinned and the pool is out of memory.
    pub fn checked_write_page(&self, page_id: PageId) -> Result<Option<WritePageGuard>> {
        let frame = match self.acquire_frame(page_id, true)? {
            Some(frame) => frame,
            None => return Ok(None),
        };
        Ok(Some(WritePageGuard::new(page_id, frame, Arc::clone(&self.state))))
    }

    /// A wrapper around [`BufferPool::checked_read_page`] for call sites
    /// that have statically ensured pool capacity. Terminates the process
    /// when no guard can be produced.
    pub fn read_page(&self, page_id: PageId) -> ReadPageGuard {
        match self.checked_read_page(page_id) {
            Ok(Some(guard)) => guard,
            Ok(None) => {
                error!("checked_read_page failed to bring in page {}", page_id);
                process::abort();
            }
            Err(err) => {
                error!("checked_read_page failed on page {}: {}", page_id, err);
                process::abort();
            }
        }
    }

    /// A wrapper around [`BufferPool::checked_write_page`] for call sites
    /// that have statically ensured pool capacity. Terminates the process
    /// when no guard can be produced.
    pub fn write_page(&self, page_id: PageId) -> WritePageGuard {
        match self.checked_write_page(page_id) {
            Ok(Some(guard)) => guard,
            Ok(None) => {
                error!("checked_write_page failed to bring in page {}", page_id);
                process::abort();
            }
            Err(err) => {
                error!("checked_write_page failed on page {}: {}", page_id, err);
                process::abort();
            }
        }
    }

    /// The current pin count of a resident page, None otherwise. The
    /// count is an atomic load, safe against concurrent pinning.
    pub fn get_pin_count(&self, page_id: PageId) -> Option<usize> {
        let state = self.state.lock();
        let frame = self.get_frame(&state, page_id)?;
        Some(frame.pin_count.load(Ordering::SeqCst))
    }

    /// Common hit/miss path of guard acquisition: returns a pinned frame
    /// holding page_id, or None when every frame is pinned. The pool lock
    /// is released when this returns; callers then take the frame's data
    /// lock in the mode they need.
    fn acquire_frame(&self, page_id: PageId, for_write: bool) -> Result<Option<Arc<FrameHeader>>> {
        let mut state = self.state.lock();

        // hit: the page is resident, pin the existing frame.
        if let Some(frame) = self.get_frame(&state, page_id) {
            self.pin_frame(&mut state, &frame, page_id, for_write)?;
            return Ok(Some(frame));
        }

        // miss: find a target frame, preferring the free list over
        // eviction.
        let frame = match self.find_free_or_evict(&mut state) {
            Some(frame) => frame,
            None => return Ok(None),
        };

        // a dirty target still holds another page's data, persist it
        // before the frame is reused.
        if frame.is_dirty() {
            self.flush_frame(&frame)?;
        }

        self.swap_in(&mut state, page_id, &frame)?;
        self.pin_frame(&mut state, &frame, page_id, for_write)?;
        Ok(Some(frame))
    }

    /// Look up the resident frame for a page, if any.
    fn get_frame(&self, state: &PoolState, page_id: PageId) -> Option<Arc<FrameHeader>> {
        let &frame_id = state.page_table.get(&page_id)?;
        Some(Arc::clone(&self.frames[frame_id]))
    }

    /// Take a frame from the free list, or ask the replacer to evict one.
    fn find_free_or_evict(&self, state: &mut PoolState) -> Option<Arc<FrameHeader>> {
        if let Some(frame_id) = state.free_frames.pop() {
            return Some(Arc::clone(&self.frames[frame_id]));
        }
        let frame_id = state.replacer.evict()?;
        debug!("evicting frame {} holding page {}", frame_id, self.frames[frame_id].page_id());
        Some(Arc::clone(&self.frames[frame_id]))
    }

    /// Read page_id's bytes into the frame buffer and rebind the page
    /// table from the frame's previous occupant to page_id.
    fn swap_in(&self, state: &mut PoolState, page_id: PageId, frame: &FrameHeader) -> Result<()> {
        let (done, future) = DiskScheduler::create_promise();
        self.scheduler.schedule(DiskRequest {
            is_write: false,
            data: Arc::clone(&frame.data),
            page_id,
            done,
        })?;
        future.wait()?;

        let prev_page_id = frame.page_id.load(Ordering::SeqCst);
        state.page_table.remove(&prev_page_id);
        state.page_table.insert(page_id, frame.frame_id);
        Ok(())
    }

    /// Pin the frame for page_id: bump the pin count, mark dirty when
    /// acquiring for write, and shield the frame from the replacer while
    /// recording the access.
    fn pin_frame(
        &self,
        state: &mut PoolState,
        frame: &FrameHeader,
        page_id: PageId,
        for_write: bool,
    ) -> Result<()> {
        frame.pin_count.fetch_add(1, Ordering::SeqCst);
        frame.page_id.store(page_id, Ordering::SeqCst);
        if for_write {
            frame.dirty.store(true, Ordering::SeqCst);
        }
        state.replacer.set_evictable(frame.frame_id, false)?;
        state.replacer.record_access(frame.frame_id)?;
        Ok(())
    }

    /// Submit a synchronous write of the frame's buffer and clear the
    /// dirty flag once it completes. Callers must hold the pool lock.
    fn flush_frame(&self, frame: &FrameHeader) -> Result<()> {
        let page_id = frame.page_id.load(Ordering::SeqCst);
        let (done, future) = DiskScheduler::create_promise();
        self.scheduler.schedule(DiskRequest {
            is_write: true,
            data: Arc::clone(&frame.data),
            page_id,
            done,
        })?;
        future.wait()?;
        frame.dirty.store(false, Ordering::SeqCst);
        Ok(())
    }
}
