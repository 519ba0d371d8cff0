use std::io;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::{
    buffer::{
        clock_replacer::ClockReplacer,
        frame::{FrameId, FrameInfo, FrameTable},
        page_handle::PageHandle,
        page_table::PageTable,
        BufferPoolStats, PoolSnapshot,
    },
    config::BufferPoolConfig,
    error::{BufferError, BufferResult},
    storage::{FileId, FileRef, Page, PageId},
};

/// Caches pages of any number of paged files in a fixed pool of frames.
///
/// All pool state (descriptors, the lookup index, the clock hand and the
/// statistics) sits behind one mutex, so every public operation is a single
/// critical section. Page bytes live in per-frame locks and are reached
/// through [`PageHandle`]s without holding the pool lock.
///
/// While holding the pool lock the manager only takes the page lock of an
/// unpinned frame, so a caller may keep a page guard across further pool
/// calls as long as it drops the guard before unpinning that page.
pub struct BufferPoolManager {
    num_frames: usize,
    state: Mutex<PoolState>,
}

struct PoolState {
    frames: FrameTable,
    page_table: PageTable,
    replacer: ClockReplacer,
    stats: BufferPoolStats,
}

impl PoolState {
    // Frees a frame through the clock, accounting for any eviction it caused.
    fn allocate_frame(&mut self) -> BufferResult<FrameId> {
        let allocation = self
            .replacer
            .allocate(&mut self.frames, &mut self.page_table)?;

        if allocation.evicted.is_some() {
            self.stats.evictions += 1;
        }
        if allocation.written_back {
            self.stats.disk_writes += 1;
        }
        Ok(allocation.frame_id)
    }

    // Places `page` into a cleared frame and registers it, pinned once.
    fn install(&mut self, frame_id: FrameId, file: &FileRef, file_id: FileId, page: Page) -> PageHandle {
        let page_no = page.page_number();
        self.frames.replace_page(frame_id, page);

        let previous = self.page_table.insert(file_id.clone(), page_no, frame_id);
        debug_assert!(previous.is_none(), "page registered twice");

        self.frames
            .descriptor_mut(frame_id)
            .set(file.clone(), file_id, page_no);
        self.handle(frame_id)
    }

    fn handle(&self, frame_id: FrameId) -> PageHandle {
        let desc = self.frames.descriptor(frame_id);
        PageHandle::new(frame_id, desc.page_no, self.frames.page(frame_id).clone())
    }

    fn evict(&mut self, frame_id: FrameId) {
        let desc = self.frames.descriptor_mut(frame_id);
        if let Some(file_id) = desc.file_id() {
            self.page_table.remove(file_id, desc.page_no);
        }
        desc.clear();
    }
}

impl BufferPoolManager {
    pub fn new(config: BufferPoolConfig) -> BufferResult<Self> {
        config.validate()?;
        let num_frames = config.num_frames;

        Ok(BufferPoolManager {
            num_frames,
            state: Mutex::new(PoolState {
                frames: FrameTable::new(num_frames),
                page_table: PageTable::new(num_frames),
                replacer: ClockReplacer::new(num_frames),
                stats: BufferPoolStats::default(),
            }),
        })
    }

    pub fn with_frames(num_frames: usize) -> BufferResult<Self> {
        BufferPoolManager::new(BufferPoolConfig::new(num_frames))
    }

    pub fn num_frames(&self) -> usize {
        self.num_frames
    }

    /// Pins `page_no` of `file`, reading it from the file on a miss.
    ///
    /// A miss may evict an unpinned page, writing it back first if dirty.
    /// Fails with [`BufferError::PoolExhausted`] when every frame is pinned.
    ///
    /// If the read itself fails, the error is returned but the eviction
    /// that made room for the page stands: the victim is gone from the pool
    /// (written back if it was dirty) and its frame is left free.
    pub fn fetch_page(&self, file: &FileRef, page_no: PageId) -> BufferResult<PageHandle> {
        let file_id = FileId::of(file.as_ref());
        let mut guard = self.state.lock();
        let state = &mut *guard;
        state.stats.accesses += 1;

        if let Some(frame_id) = state.page_table.lookup(&file_id, page_no) {
            state.frames.descriptor_mut(frame_id).pin();
            state.stats.hits += 1;
            trace!(%file_id, page_no, frame_id, "buffer hit");
            return Ok(state.handle(frame_id));
        }

        let frame_id = state.allocate_frame()?;
        let page = file.read_page(page_no)?;
        state.stats.disk_reads += 1;
        if page.page_number() != page_no {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "{} returned page {} for page {}",
                    file_id,
                    page.page_number(),
                    page_no
                ),
            )
            .into());
        }

        debug!(%file_id, page_no, frame_id, "buffer miss, page read");
        Ok(state.install(frame_id, file, file_id, page))
    }

    /// Releases one pin on a resident page, marking it dirty if asked.
    ///
    /// Unpinning a page that is not resident does nothing: an evicted page
    /// has no pins left to release.
    pub fn unpin_page(&self, file: &FileRef, page_no: PageId, dirty: bool) -> BufferResult<()> {
        let file_id = FileId::of(file.as_ref());
        let mut state = self.state.lock();

        let frame_id = match state.page_table.lookup(&file_id, page_no) {
            Some(frame_id) => frame_id,
            None => {
                trace!(%file_id, page_no, "unpin of non-resident page");
                return Ok(());
            }
        };

        let desc = state.frames.descriptor_mut(frame_id);
        if desc.pin_count == 0 {
            return Err(BufferError::NotPinned {
                file: file_id,
                page_no,
                frame_id,
            });
        }
        desc.pin_count -= 1;
        desc.dirty |= dirty;
        Ok(())
    }

    /// Allocates a new page in `file` and pins it in the pool.
    ///
    /// The frame is secured before the file grows, so a full pool never
    /// leaves behind an allocated page nobody knows about.
    pub fn allocate_page(&self, file: &FileRef) -> BufferResult<(PageId, PageHandle)> {
        let file_id = FileId::of(file.as_ref());
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let frame_id = state.allocate_frame()?;
        let page = file.allocate_page()?;
        let page_no = page.page_number();

        debug!(%file_id, page_no, frame_id, "allocated page");
        Ok((page_no, state.install(frame_id, file, file_id, page)))
    }

    /// Deletes a page from `file`, dropping any cached copy without
    /// writing it back.
    ///
    /// A pinned page is disposed of as well: the page is being destroyed,
    /// so its pins no longer protect anything.
    pub fn dispose_page(&self, file: &FileRef, page_no: PageId) -> BufferResult<()> {
        let file_id = FileId::of(file.as_ref());
        let mut state = self.state.lock();

        if let Some(frame_id) = state.page_table.lookup(&file_id, page_no) {
            let pin_count = state.frames.descriptor(frame_id).pin_count;
            state.evict(frame_id);
            debug!(%file_id, page_no, frame_id, pin_count, "disposed cached page");
        }

        file.delete_page(page_no)?;
        Ok(())
    }

    /// Writes back and evicts every cached page of `file`.
    ///
    /// All of the file's frames are checked before anything is written: a
    /// pinned page fails with [`BufferError::PagePinned`] and an indexed
    /// frame that does not hold its page fails with
    /// [`BufferError::CorruptFrame`], in both cases leaving the pool as it
    /// was. Frames are only evicted once every dirty page has been written.
    pub fn flush_file(&self, file: &FileRef) -> BufferResult<()> {
        let file_id = FileId::of(file.as_ref());
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let mut targets = Vec::new();
        for desc in state.frames.descriptors() {
            if !desc.holds(&file_id) {
                continue;
            }
            if desc.pin_count > 0 {
                return Err(BufferError::PagePinned {
                    file: file_id,
                    page_no: desc.page_no,
                    frame_id: desc.frame_id,
                });
            }
            let indexed = state.page_table.lookup(&file_id, desc.page_no) == Some(desc.frame_id);
            if !desc.valid || !indexed {
                return Err(corrupt(&desc.info()));
            }
            targets.push(desc.frame_id);
        }

        for (page_no, frame_id) in state.page_table.entries_for(&file_id) {
            let desc = state.frames.descriptor(frame_id);
            if !desc.valid || !desc.holds(&file_id) || desc.page_no != page_no {
                return Err(corrupt(&desc.info()));
            }
        }

        for &frame_id in &targets {
            if state.frames.descriptor(frame_id).dirty {
                state.frames.write_back(frame_id)?;
                state.frames.descriptor_mut(frame_id).dirty = false;
                state.stats.disk_writes += 1;
            }
        }
        for &frame_id in &targets {
            state.evict(frame_id);
        }

        debug!(%file_id, frames = targets.len(), "flushed file");
        Ok(())
    }

    /// Writes back every unpinned dirty page without evicting anything.
    ///
    /// Pinned pages are skipped and stay dirty, since their holders may be
    /// holding the page lock.
    pub fn flush_all(&self) -> BufferResult<()> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        for frame_id in 0..state.frames.len() {
            let desc = state.frames.descriptor(frame_id);
            if desc.valid && desc.dirty && desc.pin_count == 0 {
                state.frames.write_back(frame_id)?;
                state.frames.descriptor_mut(frame_id).dirty = false;
                state.stats.disk_writes += 1;
            }
        }
        Ok(())
    }

    /// Descriptor of a resident page, or `None` if it is not cached.
    pub fn frame_info(&self, file: &FileRef, page_no: PageId) -> Option<FrameInfo> {
        let file_id = FileId::of(file.as_ref());
        let state = self.state.lock();
        state
            .page_table
            .lookup(&file_id, page_no)
            .map(|frame_id| state.frames.descriptor(frame_id).info())
    }

    /// Snapshot of every frame descriptor, in frame order.
    pub fn describe(&self) -> PoolSnapshot {
        let state = self.state.lock();
        PoolSnapshot {
            frames: state.frames.descriptors().map(|d| d.info()).collect(),
            valid_frames: state.frames.valid_count(),
        }
    }

    pub fn stats(&self) -> BufferPoolStats {
        self.state.lock().stats.clone()
    }

    pub fn clear_stats(&self) {
        self.state.lock().stats = BufferPoolStats::default();
    }
}

fn corrupt(info: &FrameInfo) -> BufferError {
    BufferError::CorruptFrame {
        frame_id: info.frame_id,
        dirty: info.dirty,
        valid: info.valid,
        referenced: info.referenced,
    }
}

impl Drop for BufferPoolManager {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        for frame_id in 0..state.frames.len() {
            let desc = state.frames.descriptor(frame_id);
            if !(desc.valid && desc.dirty) {
                continue;
            }
            if let Err(err) = state.frames.write_back(frame_id) {
                warn!(frame_id, page_no = desc.page_no, error = %err, "lost dirty page on shutdown");
            }
        }
    }
}

impl std::fmt::Debug for BufferPoolManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("BufferPoolManager")
            .field("num_frames", &self.num_frames)
            .field("resident", &state.page_table.len())
            .field("replacer", &state.replacer)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::storage::{MemFile, PagedFile};

    fn dirty_pool(num_pages: usize) -> (BufferPoolManager, Arc<MemFile>, FileRef, Vec<PageId>) {
        let mem = Arc::new(MemFile::new("flush.db"));
        let file: FileRef = mem.clone();
        let bpm = BufferPoolManager::with_frames(4).unwrap();

        let mut pages = Vec::new();
        for i in 0..num_pages {
            let (page_no, handle) = bpm.allocate_page(&file).unwrap();
            handle.write().write_at(0, &[i as u8 + 1]);
            bpm.unpin_page(&file, page_no, true).unwrap();
            pages.push(page_no);
        }
        (bpm, mem, file, pages)
    }

    #[test]
    fn invalid_indexed_frame_is_corrupt() {
        let (bpm, mem, file, _) = dirty_pool(2);
        bpm.state.lock().frames.descriptor_mut(1).valid = false;
        let before = bpm.describe();

        let err = bpm.flush_file(&file).unwrap_err();
        assert!(matches!(
            err,
            BufferError::CorruptFrame {
                frame_id: 1,
                dirty: true,
                valid: false,
                ..
            }
        ));
        assert!(err.is_fatal());

        assert!(mem.write_log().is_empty());
        assert_eq!(bpm.describe().frames, before.frames);
    }

    #[test]
    fn index_pointing_at_the_wrong_page_is_corrupt() {
        let (bpm, mem, file, pages) = dirty_pool(2);
        bpm.state.lock().frames.descriptor_mut(0).page_no = pages[1] + 10;

        assert!(matches!(
            bpm.flush_file(&file),
            Err(BufferError::CorruptFrame { frame_id: 0, .. })
        ));
        assert!(mem.write_log().is_empty());
    }

    #[test]
    fn failed_write_leaves_every_frame_resident() {
        let (bpm, mem, file, pages) = dirty_pool(3);
        // The store loses the middle page, so its write-back fails
        mem.delete_page(pages[1]).unwrap();

        assert!(matches!(
            bpm.flush_file(&file),
            Err(BufferError::Io { .. })
        ));

        assert_eq!(bpm.describe().valid_frames, 3);
        for &page_no in &pages {
            assert!(bpm.frame_info(&file, page_no).is_some());
        }
        assert!(bpm.frame_info(&file, pages[1]).unwrap().dirty);
        assert!(bpm.frame_info(&file, pages[2]).unwrap().dirty);
        assert_eq!(mem.write_log(), vec![pages[0]]);

        // Dropping the lost page lets the rest of the file flush; the store
        // has already forgotten it, so the delete itself fails
        bpm.dispose_page(&file, pages[1]).unwrap_err();
        assert!(bpm.frame_info(&file, pages[1]).is_none());
        bpm.flush_file(&file).unwrap();
        assert_eq!(bpm.describe().valid_frames, 0);
    }

    struct WrongPageFile(MemFile);

    impl PagedFile for WrongPageFile {
        fn filename(&self) -> &str {
            self.0.filename()
        }

        fn read_page(&self, page_no: PageId) -> io::Result<Page> {
            self.0.read_page(page_no + 1)
        }

        fn write_page(&self, page: &Page) -> io::Result<()> {
            self.0.write_page(page)
        }

        fn allocate_page(&self) -> io::Result<Page> {
            self.0.allocate_page()
        }

        fn delete_page(&self, page_no: PageId) -> io::Result<()> {
            self.0.delete_page(page_no)
        }
    }

    #[test]
    fn store_returning_another_page_is_rejected() {
        let inner = MemFile::new("wrong.db");
        inner.allocate_page().unwrap();
        inner.allocate_page().unwrap();
        let file: FileRef = Arc::new(WrongPageFile(inner));
        let bpm = BufferPoolManager::with_frames(2).unwrap();

        let err = bpm.fetch_page(&file, 1).unwrap_err();
        match err {
            BufferError::Io { source } => assert_eq!(source.kind(), io::ErrorKind::InvalidData),
            other => panic!("unexpected error: {other}"),
        }
        assert!(bpm.frame_info(&file, 1).is_none());
        assert_eq!(bpm.describe().valid_frames, 0);
    }
}
