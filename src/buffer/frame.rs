use std::sync::Arc;

use parking_lot::RwLock;

use crate::storage::{FileId, FileRef, Page, PageId};

pub type FrameId = usize;

/// Metadata for one buffer slot.
pub struct FrameDescriptor {
    pub frame_id: FrameId,
    file: Option<FileRef>,
    file_id: Option<FileId>,
    pub page_no: PageId,
    pub pin_count: u32,
    pub dirty: bool,
    pub valid: bool,
    // Second-chance bit, set on every access and cleared by the clock sweep
    pub referenced: bool,
}

impl FrameDescriptor {
    pub fn new(frame_id: FrameId) -> Self {
        FrameDescriptor {
            frame_id,
            file: None,
            file_id: None,
            page_no: 0,
            pin_count: 0,
            dirty: false,
            valid: false,
            referenced: false,
        }
    }

    /// Marks the frame as holding `page_no` of `file`, pinned once.
    pub fn set(&mut self, file: FileRef, file_id: FileId, page_no: PageId) {
        self.file = Some(file);
        self.file_id = Some(file_id);
        self.page_no = page_no;
        self.pin_count = 1;
        self.dirty = false;
        self.valid = true;
        self.referenced = true;
    }

    pub fn clear(&mut self) {
        self.file = None;
        self.file_id = None;
        self.page_no = 0;
        self.pin_count = 0;
        self.dirty = false;
        self.valid = false;
        self.referenced = false;
    }

    pub fn pin(&mut self) {
        self.pin_count += 1;
        self.referenced = true;
    }

    pub fn file(&self) -> Option<&FileRef> {
        self.file.as_ref()
    }

    pub fn file_id(&self) -> Option<&FileId> {
        self.file_id.as_ref()
    }

    pub fn holds(&self, file_id: &FileId) -> bool {
        self.file_id.as_ref() == Some(file_id)
    }

    pub fn info(&self) -> FrameInfo {
        FrameInfo {
            frame_id: self.frame_id,
            file: self.file_id.clone(),
            page_no: self.page_no,
            pin_count: self.pin_count,
            dirty: self.dirty,
            valid: self.valid,
            referenced: self.referenced,
        }
    }
}

/// Point-in-time copy of a frame descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameInfo {
    pub frame_id: FrameId,
    pub file: Option<FileId>,
    pub page_no: PageId,
    pub pin_count: u32,
    pub dirty: bool,
    pub valid: bool,
    pub referenced: bool,
}

/// The descriptor table and the frames it describes: two arrays of the same
/// length addressed by the same frame id.
pub struct FrameTable {
    descriptors: Vec<FrameDescriptor>,
    pages: Vec<Arc<RwLock<Page>>>,
}

impl FrameTable {
    pub fn new(num_frames: usize) -> Self {
        FrameTable {
            descriptors: (0..num_frames).map(FrameDescriptor::new).collect(),
            pages: (0..num_frames)
                .map(|_| Arc::new(RwLock::new(Page::empty())))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn descriptor(&self, frame_id: FrameId) -> &FrameDescriptor {
        &self.descriptors[frame_id]
    }

    pub fn descriptor_mut(&mut self, frame_id: FrameId) -> &mut FrameDescriptor {
        &mut self.descriptors[frame_id]
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &FrameDescriptor> {
        self.descriptors.iter()
    }

    pub fn page(&self, frame_id: FrameId) -> &Arc<RwLock<Page>> {
        &self.pages[frame_id]
    }

    /// Gives the frame a fresh page buffer holding `page`.
    ///
    /// Handles to the previous occupant keep the old buffer, so a stale
    /// handle can neither block nor overwrite the new page.
    pub fn replace_page(&mut self, frame_id: FrameId, page: Page) {
        self.pages[frame_id] = Arc::new(RwLock::new(page));
    }

    /// Writes the frame's bytes back to the file that owns it.
    pub fn write_back(&self, frame_id: FrameId) -> std::io::Result<()> {
        let desc = &self.descriptors[frame_id];
        match desc.file() {
            Some(file) => file.write_page(&self.pages[frame_id].read()),
            None => Ok(()),
        }
    }

    pub fn valid_count(&self) -> usize {
        self.descriptors.iter().filter(|d| d.valid).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemFile;

    #[test]
    fn set_then_clear() {
        let file: FileRef = Arc::new(MemFile::new("a"));
        let mut desc = FrameDescriptor::new(2);
        desc.set(file.clone(), FileId::of(file.as_ref()), 9);

        assert!(desc.valid && desc.referenced && !desc.dirty);
        assert_eq!(desc.pin_count, 1);
        assert!(desc.holds(&FileId::new("a")));

        desc.pin();
        assert_eq!(desc.pin_count, 2);

        desc.clear();
        assert_eq!(desc.info(), FrameDescriptor::new(2).info());
        assert!(desc.file().is_none());
    }

    #[test]
    fn table_has_one_page_per_descriptor() {
        let table = FrameTable::new(4);
        assert_eq!(table.len(), 4);
        assert_eq!(table.valid_count(), 0);
        for id in 0..4 {
            assert_eq!(table.descriptor(id).frame_id, id);
            assert!(!table.page(id).read().is_valid());
        }
        assert!(!Arc::ptr_eq(table.page(0), table.page(1)));
    }

    #[test]
    fn replaced_page_detaches_old_holders() {
        let mut table = FrameTable::new(1);
        let old = table.page(0).clone();
        let _guard = old.write();

        // Does not wait on the lock held above
        table.replace_page(0, Page::new(5));
        assert!(!Arc::ptr_eq(&old, table.page(0)));
        assert_eq!(table.page(0).read().page_number(), 5);
    }
}
