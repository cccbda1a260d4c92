use std::fmt::Debug;

use serde::Deserialize;
use serde::Serialize;

use crate::error::Result;
use crate::storage::page::PageId;

pub mod memory;
pub mod page;
pub mod scheduler;

/// A block-addressed storage device holding fixed-size pages. Durability
/// beyond the device's own guarantees is out of scope here; the buffer
/// pool delegates all persistence to an implementation of this trait,
/// driven through the disk scheduler.
/// The trait is designed as `trait object` compatible, i.e., follow the
/// [object safety rules](https://doc.rust-lang.org/reference/items/traits.html#object-safety),
/// so the scheduler can hold a boxed device of any kind.
pub trait DiskManager: Debug + Send {
    /// Reads the page with the given id into buf. Pages that were
    /// allocated but never written read back as zeros, and a short page
    /// zero-fills the remainder of buf.
    fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> Result<()>;

    /// Writes a page's worth of bytes at the given id, overwriting the
    /// existing page if any.
    fn write_page(&mut self, page_id: PageId, data: &[u8]) -> Result<()>;

    /// Ensures the device has capacity for the given page id. The device
    /// grows as needed, so this cannot fail.
    fn increase_disk_space(&mut self, page_id: PageId);

    /// Records that a page is free for reuse. Space reclamation is not
    /// required, implementations may treat this as a no-op.
    fn deallocate_page(&mut self, page_id: PageId);
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiskType {
    Memory,
}

pub fn new_disk(typ: DiskType) -> Result<Box<dyn DiskManager>> {
    match typ {
        DiskType::Memory => Ok(Box::new(memory::Memory::new())),
    }
}
