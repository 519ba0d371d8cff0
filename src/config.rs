//! Buffer pool configuration.

use crate::{
    error::{BufferError, BufferResult},
    storage::page_constants::PAGE_SIZE,
};

pub const DEFAULT_NUM_FRAMES: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferPoolConfig {
    /// Number of frames in the pool. Fixed for the lifetime of the manager.
    pub num_frames: usize,
}

impl BufferPoolConfig {
    pub fn new(num_frames: usize) -> Self {
        BufferPoolConfig { num_frames }
    }

    /// Memory held by page frames, excluding descriptors.
    pub fn memory_usage(&self) -> usize {
        self.num_frames * PAGE_SIZE
    }

    pub fn validate(&self) -> BufferResult<()> {
        if self.num_frames == 0 {
            return Err(BufferError::config("num_frames must be > 0"));
        }
        Ok(())
    }
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        BufferPoolConfig::new(DEFAULT_NUM_FRAMES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_frames_is_rejected() {
        assert!(matches!(
            BufferPoolConfig::new(0).validate(),
            Err(BufferError::Config { .. })
        ));
        assert!(BufferPoolConfig::default().validate().is_ok());
    }

    #[test]
    fn memory_usage_counts_pages() {
        assert_eq!(BufferPoolConfig::new(10).memory_usage(), 10 * PAGE_SIZE);
    }
}
