use std::fmt;

use page_constants::{INVALID_PAGE_NO, PAGE_SIZE};

pub type PageId = u32;

pub mod page_constants {
    // Size
    pub const PAGE_SIZE: usize = 1024 * 8;

    // Page numbers start at 1
    pub const INVALID_PAGE_NO: super::PageId = 0;
    pub const FIRST_PAGE_NO: super::PageId = 1;
}

/// A fixed-size block of bytes together with the page number it lives at.
///
/// The buffer manager treats the contents as opaque; only the access
/// methods above it give the bytes a layout.
#[derive(Clone, PartialEq, Eq)]
pub struct Page {
    page_no: PageId,
    data: Box<[u8; PAGE_SIZE]>,
}

impl Page {
    pub fn new(page_no: PageId) -> Self {
        Page {
            page_no,
            data: Box::new([0; PAGE_SIZE]),
        }
    }

    /// Builds a page from raw bytes. Shorter input is zero padded.
    pub fn from_bytes(page_no: PageId, bytes: &[u8]) -> Self {
        let mut page = Page::new(page_no);
        page.write_at(0, bytes);
        page
    }

    pub fn empty() -> Self {
        Page::new(INVALID_PAGE_NO)
    }

    pub fn page_number(&self) -> PageId {
        self.page_no
    }

    pub fn is_valid(&self) -> bool {
        self.page_no != INVALID_PAGE_NO
    }

    pub fn data(&self) -> &[u8] {
        &self.data[..]
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data[..]
    }

    /// Copies `src` into the page at `offset`, truncating at the page end.
    /// Returns the number of bytes written.
    pub fn write_at(&mut self, offset: usize, src: &[u8]) -> usize {
        if offset >= PAGE_SIZE {
            return 0;
        }
        let len = src.len().min(PAGE_SIZE - offset);
        self.data[offset..offset + len].copy_from_slice(&src[..len]);
        len
    }

    pub fn read_at(&self, offset: usize, len: usize) -> &[u8] {
        let start = offset.min(PAGE_SIZE);
        let end = offset.saturating_add(len).min(PAGE_SIZE);
        &self.data[start..end]
    }
}

impl Default for Page {
    fn default() -> Self {
        Page::empty()
    }
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let used = self.data.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
        f.debug_struct("Page")
            .field("page_no", &self.page_no)
            .field("used_bytes", &used)
            .finish()
    }
}
