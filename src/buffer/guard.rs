use std::ops::Deref;
use std::ops::DerefMut;
use std::sync::Arc;

use parking_lot::lock_api::ArcRwLockReadGuard;
use parking_lot::lock_api::ArcRwLockWriteGuard;
use parking_lot::Mutex;
use parking_lot::RawRwLock;

use crate::buffer::pool::FrameHeader;
use crate::buffer::pool::PoolState;
use crate::storage::page::PageId;

/// The pin half of a page guard. Dropping it returns the pin under the
/// pool lock and, when the last pin goes away, hands the frame back to
/// the replacer as an eviction candidate.
///
/// Guards declare their data lock before the pin, so the frame's data
/// lock is always released before the pool lock is taken here. The pool
/// lock is never acquired with a frame lock held anywhere in the crate,
/// which keeps the lock order single-directional.
struct PinGuard {
    frame: Arc<FrameHeader>,
    state: Arc<Mutex<PoolState>>,
}

impl Drop for PinGuard {
    fn drop(&mut self) {
        self.state.lock().unpin(&self.frame);
    }
}

/// A scoped shared handle over one page's data.
///
/// The guard holds a pin on the page's frame and the frame's data lock
/// in read mode: any number of read guards may observe the same page
/// concurrently, and none of them can observe a write in progress. Both
/// the lock and the pin are released when the guard drops, on every exit
/// path.
pub struct ReadPageGuard {
    page_id: PageId,
    // dropped before `pin`: the data lock is released ahead of the
    // drop-time pool bookkeeping.
    data: ArcRwLockReadGuard<RawRwLock, Box<[u8]>>,
    pin: PinGuard,
}

impl ReadPageGuard {
    /// The pool has already counted the pin; the constructor takes the
    /// frame's data lock in read mode. Must be called without the pool
    /// lock held.
    pub(crate) fn new(
        page_id: PageId,
        frame: Arc<FrameHeader>,
        state: Arc<Mutex<PoolState>>,
    ) -> ReadPageGuard {
        let data = frame.data().read_arc();
        ReadPageGuard { page_id, data, pin: PinGuard { frame, state } }
    }

    /// The page this guard pins.
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Whether the frame's buffer diverges from its on-disk page.
    pub fn is_dirty(&self) -> bool {
        self.pin.frame.is_dirty()
    }

    /// The page's bytes.
    pub fn data(&self) -> &[u8] {
        &self.data[..]
    }
}

impl Deref for ReadPageGuard {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data[..]
    }
}

/// A scoped exclusive handle over one page's data.
///
/// The guard holds a pin on the page's frame and the frame's data lock
/// in write mode: no other read or write guard observes the buffer while
/// it exists. The frame was marked dirty when the guard was created.
/// Both the lock and the pin are released when the guard drops, on every
/// exit path.
pub struct WritePageGuard {
    page_id: PageId,
    // dropped before `pin`: the data lock is released ahead of the
    // drop-time pool bookkeeping.
    data: ArcRwLockWriteGuard<RawRwLock, Box<[u8]>>,
    pin: PinGuard,
}

impl WritePageGuard {
    /// The pool has already counted the pin and set the dirty flag; the
    /// constructor takes the frame's data lock in write mode. Must be
    /// called without the pool lock held.
    pub(crate) fn new(
        page_id: PageId,
        frame: Arc<FrameHeader>,
        state: Arc<Mutex<PoolState>>,
    ) -> WritePageGuard {
        let data = frame.data().write_arc();
        WritePageGuard { page_id, data, pin: PinGuard { frame, state } }
    }

    /// The page this guard pins.
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Whether the frame's buffer diverges from its on-disk page. Always
    /// true while the guard itself is live.
    pub fn is_dirty(&self) -> bool {
        self.pin.frame.is_dirty()
    }

    /// The page's bytes.
    pub fn data(&self) -> &[u8] {
        &self.data[..]
    }

    /// The page's bytes, mutable.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data[..]
    }
}

impl Deref for WritePageGuard {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data[..]
    }
}

impl DerefMut for WritePageGuard {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.data[..]
    }
}
