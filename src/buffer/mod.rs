//! The buffer manager: a fixed pool of frames caching pages of paged files.
//!
//! ```text
//!   fetch/unpin/alloc/dispose/flush
//!                 |
//!         BufferPoolManager
//!        /        |         \
//!  PageTable  FrameTable  ClockReplacer
//!  (file,page)  descriptors   hand sweeps
//!   -> frame    + page bytes  the frames
//! ```

use std::fmt;

pub mod buffer_pool_manager;
pub mod clock_replacer;
pub mod frame;
pub mod page_handle;
pub mod page_table;

pub use buffer_pool_manager::BufferPoolManager;
pub use frame::{FrameId, FrameInfo};
pub use page_handle::PageHandle;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferPoolStats {
    /// Calls to `fetch_page`.
    pub accesses: u64,
    /// Fetches served from the pool.
    pub hits: u64,
    pub disk_reads: u64,
    /// Pages written back, by eviction or flush.
    pub disk_writes: u64,
    pub evictions: u64,
}

impl BufferPoolStats {
    pub fn hit_ratio(&self) -> f64 {
        if self.accesses == 0 {
            0.0
        } else {
            self.hits as f64 / self.accesses as f64
        }
    }
}

/// Every frame descriptor at one point in time.
#[derive(Debug, Clone)]
pub struct PoolSnapshot {
    pub frames: Vec<FrameInfo>,
    pub valid_frames: usize,
}

impl PoolSnapshot {
    pub fn frame(&self, frame_id: FrameId) -> Option<&FrameInfo> {
        self.frames.get(frame_id)
    }
}

impl fmt::Display for PoolSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for info in &self.frames {
            match &info.file {
                Some(file) => write!(f, "frame {}: file={} page={}", info.frame_id, file, info.page_no)?,
                None => write!(f, "frame {}: file=- page=-", info.frame_id)?,
            }
            writeln!(
                f,
                " pins={} dirty={} valid={} ref={}",
                info.pin_count, info.dirty, info.valid, info.referenced
            )?;
        }
        writeln!(f, "valid frames: {}", self.valid_frames)
    }
}
