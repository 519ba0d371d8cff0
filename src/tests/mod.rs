
use std::sync::Arc;

use crate::{
    storage::{FileRef, MemFile, PageId, PagedFile},
    BufferPoolManager,
};

pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// A pool of `num_frames` frames and an in-memory file with `num_pages`
/// pages already allocated.
pub(crate) fn setup(num_frames: usize, num_pages: usize) -> (BufferPoolManager, Arc<MemFile>, FileRef, Vec<PageId>) {
    init_tracing();
    let mem = Arc::new(MemFile::new("test.db"));
    let pages = (0..num_pages)
        .map(|_| mem.allocate_page().map(|p| p.page_number()))
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    let file: FileRef = mem.clone();
    let bpm = BufferPoolManager::with_frames(num_frames).unwrap();
    (bpm, mem, file, pages)
}
