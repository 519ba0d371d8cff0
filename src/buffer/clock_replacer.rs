//! Clock (second-chance) frame allocator.
//!
//! A single hand sweeps the frame table in physical order. Each frame it
//! lands on is handled as follows:
//!
//! 1. not valid: free, take it
//! 2. referenced: clear the bit and move on
//! 3. pinned: skip, counting it towards the exhaustion check
//! 4. otherwise: evict it, writing it back first if dirty
//!
//! A full revolution that finds every frame pinned means no frame can be
//! freed and the allocation fails with `PoolExhausted`.

use std::fmt;

use tracing::debug;

use crate::{
    buffer::{
        frame::{FrameId, FrameTable},
        page_table::PageTable,
    },
    error::{BufferError, BufferResult},
    storage::{FileId, PageId},
};

/// The outcome of a successful allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub frame_id: FrameId,
    /// The page that had to leave the frame, if the frame was occupied.
    pub evicted: Option<(FileId, PageId)>,
    /// Whether the evicted page was dirty and written back.
    pub written_back: bool,
}

pub struct ClockReplacer {
    num_frames: usize,
    hand: FrameId,
}

impl ClockReplacer {
    /// The hand starts on the last frame so the first advance lands on
    /// frame 0.
    pub fn new(num_frames: usize) -> Self {
        ClockReplacer {
            num_frames,
            hand: num_frames.saturating_sub(1),
        }
    }

    pub fn hand_position(&self) -> FrameId {
        self.hand
    }

    fn advance(&mut self) -> FrameId {
        self.hand = (self.hand + 1) % self.num_frames;
        self.hand
    }

    /// Finds a frame for a new page, evicting one if necessary.
    ///
    /// On success the returned frame is cleared and absent from the page
    /// table. If writing back a dirty victim fails, the victim is left
    /// untouched and the I/O error is returned.
    pub fn allocate(
        &mut self,
        frames: &mut FrameTable,
        page_table: &mut PageTable,
    ) -> BufferResult<Allocation> {
        if self.num_frames == 0 {
            return Err(BufferError::PoolExhausted);
        }

        let mut pinned = 0;
        let mut steps = 0;

        loop {
            let frame_id = self.advance();
            steps += 1;

            let desc = frames.descriptor_mut(frame_id);
            if !desc.valid {
                desc.clear();
                return Ok(Allocation {
                    frame_id,
                    evicted: None,
                    written_back: false,
                });
            }

            if desc.referenced {
                desc.referenced = false;
            } else if desc.pin_count > 0 {
                pinned += 1;
            } else {
                return self.evict(frame_id, frames, page_table);
            }

            if steps % self.num_frames == 0 {
                if pinned >= self.num_frames {
                    debug!(num_frames = self.num_frames, "every frame is pinned");
                    return Err(BufferError::PoolExhausted);
                }
                pinned = 0;
            }
        }
    }

    fn evict(
        &mut self,
        frame_id: FrameId,
        frames: &mut FrameTable,
        page_table: &mut PageTable,
    ) -> BufferResult<Allocation> {
        let desc = frames.descriptor(frame_id);
        let dirty = desc.dirty;
        let evicted = desc.file_id().cloned().map(|file| (file, desc.page_no));

        if dirty {
            frames.write_back(frame_id)?;
        }
        if let Some((file, page_no)) = &evicted {
            page_table.remove(file, *page_no);
            debug!(frame_id, %file, page_no, dirty, "evicted page");
        }
        frames.descriptor_mut(frame_id).clear();

        Ok(Allocation {
            frame_id,
            evicted,
            written_back: dirty,
        })
    }
}

impl fmt::Debug for ClockReplacer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClockReplacer")
            .field("num_frames", &self.num_frames)
            .field("hand", &self.hand)
            .finish()
    }
}
