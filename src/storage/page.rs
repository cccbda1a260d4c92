pub type PageId = i64;

/// Size of a data page in bytes.
pub const PAGE_SIZE: usize = 4096;

/// Page id of a frame that holds no page.
pub const INVALID_PAGE_ID: PageId = -1;
