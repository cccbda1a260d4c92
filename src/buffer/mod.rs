use crate::error::Result;

pub type FrameId = usize;

/// Replacer tracks frame usage for replacement in case the buffer pool
/// is full. Implementations are driven with the pool lock held, so the
/// methods take `&mut self` and need no locking of their own.
pub trait Replacer: Send {
    /// Record the event that the given frame id is accessed at the
    /// current timestamp. Fails with `Error::InvalidFrame` if the frame
    /// id is outside the pool's range.
    fn record_access(&mut self, frame_id: FrameId) -> Result<()>;

    /// Find the frame to evict under the replacement policy. Only frames
    /// that are marked as evictable are candidates for eviction.
    ///
    /// Successful eviction decrements the size of the replacer and
    /// removes the frame's access history.
    ///
    /// Return the frame id if a frame is evicted successfully, None if
    /// no frames can be evicted.
    fn evict(&mut self) -> Option<FrameId>;

    /// Toggle whether a frame is evictable or non-evictable. This
    /// function also controls replacer size: the size is equal to the
    /// number of evictable entries, so flipping the flag adjusts it by
    /// one in either direction. Setting a flag to its current value
    /// changes nothing. Fails with `Error::InvalidFrame` if the frame id
    /// is outside the pool's range.
    fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) -> Result<()>;

    /// Remove an evictable frame from the replacer, along with its
    /// access history, decrementing the size. Note that this is
    /// different from evicting a frame, which always removes the frame
    /// with the largest backward k-distance: this removes the specified
    /// frame no matter its distance.
    ///
    /// Removing an out-of-range id or a frame with no recorded history
    /// does nothing. Removing a frame that is tracked but not evictable
    /// fails with `Error::NotEvictable`.
    fn remove(&mut self, frame_id: FrameId) -> Result<()>;

    /// Replacer size, the number of evictable frames.
    fn size(&self) -> usize;
}

/// Handle to a write-ahead log manager. Recovery lives outside this
/// crate; the buffer pool stores the handle for callers that coordinate
/// flushes with logging but never invokes it itself.
#[derive(Debug, Default)]
pub struct LogManager;

impl LogManager {
    pub fn new() -> LogManager {
        LogManager
    }
}

pub mod guard;
pub mod pool;
pub mod replacer;
