use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::{
    buffer::frame::FrameId,
    storage::{Page, PageId},
};

/// Access to a pinned page's bytes.
///
/// A handle does not unpin on drop: every successful `fetch_page` or
/// `allocate_page` must be balanced by one `unpin_page`, passing
/// `dirty = true` if the page was modified through `write`.
#[derive(Clone)]
pub struct PageHandle {
    frame_id: FrameId,
    page_no: PageId,
    frame: Arc<RwLock<Page>>,
}

impl PageHandle {
    pub(crate) fn new(frame_id: FrameId, page_no: PageId, frame: Arc<RwLock<Page>>) -> Self {
        PageHandle {
            frame_id,
            page_no,
            frame,
        }
    }

    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    pub fn page_number(&self) -> PageId {
        self.page_no
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Page> {
        self.frame.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Page> {
        self.frame.write()
    }

    /// True if both handles refer to the same buffer frame.
    pub fn same_frame(&self, other: &PageHandle) -> bool {
        Arc::ptr_eq(&self.frame, &other.frame)
    }
}

impl std::fmt::Debug for PageHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageHandle")
            .field("frame_id", &self.frame_id)
            .field("page_no", &self.page_no)
            .finish()
    }
}
