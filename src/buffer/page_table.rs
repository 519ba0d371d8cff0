use std::collections::HashMap;

use crate::{
    buffer::frame::FrameId,
    storage::{FileId, PageId},
};

/// Maps a resident page, keyed by (file, page number), to its frame.
///
/// A miss is an ordinary outcome and comes back as `None`.
pub struct PageTable {
    entries: HashMap<(FileId, PageId), FrameId>,
}

impl PageTable {
    /// Sized at roughly 1.2x the frame count so a full pool never rehashes.
    pub fn new(num_frames: usize) -> Self {
        let capacity = num_frames + num_frames / 5 + 1;
        PageTable {
            entries: HashMap::with_capacity(capacity),
        }
    }

    /// Registers a mapping and returns the frame previously registered under
    /// the same key, if any.
    pub fn insert(&mut self, file: FileId, page_no: PageId, frame_id: FrameId) -> Option<FrameId> {
        self.entries.insert((file, page_no), frame_id)
    }

    pub fn lookup(&self, file: &FileId, page_no: PageId) -> Option<FrameId> {
        // Keys own their FileId; the clone is a refcount bump.
        self.entries.get(&(file.clone(), page_no)).copied()
    }

    /// Removes a mapping. Removing an absent key is not an error.
    pub fn remove(&mut self, file: &FileId, page_no: PageId) -> Option<FrameId> {
        self.entries.remove(&(file.clone(), page_no))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every (page, frame) pair registered for `file`.
    pub fn entries_for<'a>(
        &'a self,
        file: &'a FileId,
    ) -> impl Iterator<Item = (PageId, FrameId)> + 'a {
        self.entries
            .iter()
            .filter(move |((f, _), _)| f == file)
            .map(|((_, page_no), frame_id)| (*page_no, *frame_id))
    }
}
