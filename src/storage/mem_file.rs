use std::{collections::BTreeMap, io};

use parking_lot::Mutex;

use super::{
    page::{page_constants::FIRST_PAGE_NO, Page, PageId},
    paged_file::PagedFile,
};

/// An implementation of [`PagedFile`] kept entirely in memory.
///
/// Every read and write is recorded so tests can check exactly which pages
/// reached the store and in what order.
pub struct MemFile {
    name: String,
    state: Mutex<MemState>,
}

#[derive(Default)]
struct MemState {
    pages: BTreeMap<PageId, Page>,
    next_page_no: PageId,
    reads: Vec<PageId>,
    writes: Vec<PageId>,
}

impl MemFile {
    pub fn new(name: impl Into<String>) -> Self {
        MemFile {
            name: name.into(),
            state: Mutex::new(MemState {
                next_page_no: FIRST_PAGE_NO,
                ..MemState::default()
            }),
        }
    }

    /// Page numbers passed to `write_page`, oldest first.
    pub fn write_log(&self) -> Vec<PageId> {
        self.state.lock().writes.clone()
    }

    /// Page numbers passed to `read_page`, oldest first.
    pub fn read_log(&self) -> Vec<PageId> {
        self.state.lock().reads.clone()
    }

    pub fn clear_logs(&self) {
        let mut state = self.state.lock();
        state.reads.clear();
        state.writes.clear();
    }

    /// The durable copy of a page, bypassing the logs.
    pub fn stored(&self, page_no: PageId) -> Option<Page> {
        self.state.lock().pages.get(&page_no).cloned()
    }

    pub fn page_count(&self) -> usize {
        self.state.lock().pages.len()
    }
}

fn not_found(name: &str, page_no: PageId) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("page {} not allocated in {}", page_no, name),
    )
}

impl PagedFile for MemFile {
    fn filename(&self) -> &str {
        &self.name
    }

    fn read_page(&self, page_no: PageId) -> io::Result<Page> {
        let mut state = self.state.lock();
        let page = state
            .pages
            .get(&page_no)
            .cloned()
            .ok_or_else(|| not_found(&self.name, page_no))?;
        state.reads.push(page_no);
        Ok(page)
    }

    fn write_page(&self, page: &Page) -> io::Result<()> {
        let page_no = page.page_number();
        let mut state = self.state.lock();
        match state.pages.get_mut(&page_no) {
            Some(stored) => stored.clone_from(page),
            None => return Err(not_found(&self.name, page_no)),
        }
        state.writes.push(page_no);
        Ok(())
    }

    fn allocate_page(&self) -> io::Result<Page> {
        let mut state = self.state.lock();
        let page_no = state.next_page_no;
        state.next_page_no += 1;

        let page = Page::new(page_no);
        state.pages.insert(page_no, page.clone());
        Ok(page)
    }

    fn delete_page(&self, page_no: PageId) -> io::Result<()> {
        self.state
            .lock()
            .pages
            .remove(&page_no)
            .map(|_| ())
            .ok_or_else(|| not_found(&self.name, page_no))
    }
}
