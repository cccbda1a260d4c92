use crate::error::Result;
use crate::storage::page::PageId;
use crate::storage::DiskManager;

/// An in-memory disk device, one byte vector per page slot. Used for
/// tests and as the default device; a real deployment substitutes a
/// file-backed implementation of the same trait.
#[derive(Debug)]
pub struct Memory {
    pages: Vec<Vec<u8>>,
}

impl Memory {
    pub fn new() -> Memory {
        Memory { pages: Vec::new() }
    }
}

impl Default for Memory {
    fn default() -> Memory {
        Memory::new()
    }
}

impl DiskManager for Memory {
    fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> Result<()> {
        let idx = usize::try_from(page_id)?;
        buf.fill(0);
        if let Some(page) = self.pages.get(idx) {
            let n = std::cmp::min(buf.len(), page.len());
            buf[..n].copy_from_slice(&page[..n]);
        }
        Ok(())
    }

    fn write_page(&mut self, page_id: PageId, data: &[u8]) -> Result<()> {
        let idx = usize::try_from(page_id)?;
        if idx >= self.pages.len() {
            self.pages.resize_with(idx + 1, Vec::new);
        }
        self.pages[idx] = data.to_vec();
        Ok(())
    }

    fn increase_disk_space(&mut self, page_id: PageId) {
        let idx = match usize::try_from(page_id) {
            Ok(idx) => idx,
            Err(_) => return,
        };
        if idx >= self.pages.len() {
            self.pages.resize_with(idx + 1, Vec::new);
        }
    }

    fn deallocate_page(&mut self, page_id: PageId) {
        // no space reclamation, just drop the bytes so a reused id
        // reads back as zeros.
        if let Ok(idx) = usize::try_from(page_id) {
            if let Some(page) = self.pages.get_mut(idx) {
                page.clear();
            }
        }
    }
}
