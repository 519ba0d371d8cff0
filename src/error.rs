//! Buffer manager errors.

use std::io;

use thiserror::Error;

use crate::buffer::FrameId;
use crate::storage::{FileId, PageId};

/// Result type for buffer manager operations.
pub type BufferResult<T> = Result<T, BufferError>;

/// Errors surfaced to callers of the buffer manager.
///
/// A lookup miss is not an error: it drives the read-from-disk branch of
/// `fetch_page` and the no-op branch of `unpin_page`.
#[derive(Debug, Error)]
pub enum BufferError {
    /// Every frame was found pinned during a full clock revolution.
    #[error("buffer pool exhausted, all frames are pinned")]
    PoolExhausted,

    /// `unpin_page` on a resident page whose pin count is already zero.
    #[error("page {page_no} of {file} is not pinned (frame {frame_id})")]
    NotPinned {
        file: FileId,
        page_no: PageId,
        frame_id: FrameId,
    },

    /// `flush_file` while the file still has a pinned page.
    #[error("page {page_no} of {file} is pinned (frame {frame_id})")]
    PagePinned {
        file: FileId,
        page_no: PageId,
        frame_id: FrameId,
    },

    /// An indexed frame that does not hold the page it is indexed under.
    #[error("corrupt frame {frame_id}: dirty={dirty} valid={valid} referenced={referenced}")]
    CorruptFrame {
        frame_id: FrameId,
        dirty: bool,
        valid: bool,
        referenced: bool,
    },

    /// Page store I/O failure.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// Invalid construction parameters.
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl BufferError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Pool exhaustion clears once some caller unpins a page.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::PoolExhausted)
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::CorruptFrame { .. })
    }
}
