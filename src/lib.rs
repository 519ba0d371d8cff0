//! In-memory page buffer manager for a disk-backed record store.
//!
//! Pages of any number of [`PagedFile`]s are cached in a fixed pool of
//! frames and replaced with the clock (second-chance) policy.

pub mod buffer;
pub mod config;
pub mod error;
pub mod storage;

#[cfg(test)]
mod tests;

pub use buffer::{BufferPoolManager, BufferPoolStats, FrameId, FrameInfo, PageHandle, PoolSnapshot};
pub use config::BufferPoolConfig;
pub use error::{BufferError, BufferResult};
pub use storage::{DiskFile, FileId, FileRef, MemFile, Page, PageId, PagedFile};
