/**
 * ============================================================================
 * BUFFER POOL MODULE
 * ============================================================================
 *
 * PURPOSE: Fixed ring of video buffer slots reused across sessions
 *
 * FILE STRUCTURE:
 * <buffer_dir>/
 * ├── buffer_0.mp4
 * ├── buffer_1.mp4
 * └── buffer_2.mp4
 *
 * The cursor only moves forward, wrapping at the pool size. The writer
 * advances it after a session has been handed off, so the next session never
 * lands in the slot that was just written.
 *
 * ============================================================================
 */

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct BufferPool {
    buffer_dir: PathBuf,
    prefix: String,
    extension: String,
    count: NonZeroUsize,
    cursor: usize,
}

impl BufferPool {
    pub fn new(
        buffer_dir: impl Into<PathBuf>,
        prefix: impl Into<String>,
        extension: impl Into<String>,
        count: NonZeroUsize,
    ) -> Self {
        Self {
            buffer_dir: buffer_dir.into(),
            prefix: prefix.into(),
            extension: extension.into(),
            count,
            cursor: 0,
        }
    }

    // Path of the slot the next session should write into
    pub fn current(&self) -> PathBuf {
        self.slot_path(self.cursor)
    }

    // Move to the next slot, wrapping around
    pub fn advance(&mut self) {
        self.cursor = (self.cursor + 1) % self.count.get();
    }

    pub fn index(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.count.get()
    }

    pub fn buffer_dir(&self) -> &Path {
        &self.buffer_dir
    }

    // All slot paths in rotation order
    pub fn slots(&self) -> Vec<PathBuf> {
        (0..self.count.get()).map(|i| self.slot_path(i)).collect()
    }

    fn slot_path(&self, index: usize) -> PathBuf {
        let name = if self.extension.is_empty() {
            format!("{}{}", self.prefix, index)
        } else {
            format!("{}{}.{}", self.prefix, index, self.extension)
        };
        self.buffer_dir.join(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(count: usize) -> BufferPool {
        BufferPool::new("/tmp/buffers", "buffer_", "mp4", NonZeroUsize::new(count).unwrap())
    }

    #[test]
    fn test_current_is_idempotent() {
        let pool = pool(3);
        assert_eq!(pool.current(), pool.current());
        assert_eq!(pool.current(), PathBuf::from("/tmp/buffers/buffer_0.mp4"));
    }

    #[test]
    fn test_advance_cycles_with_pool_period() {
        let mut pool = pool(3);
        let mut seen = Vec::new();
        for _ in 0..7 {
            seen.push(pool.current());
            pool.advance();
        }

        for pair in seen.windows(2) {
            assert_ne!(pair[0], pair[1]);
        }
        assert_eq!(seen[0], seen[3]);
        assert_eq!(seen[1], seen[4]);
        assert_eq!(seen[3], seen[6]);
        assert_eq!(pool.index(), 1);
    }

    #[test]
    fn test_single_slot_pool_reuses_slot() {
        let mut pool = pool(1);
        let first = pool.current();
        pool.advance();
        assert_eq!(pool.current(), first);
        assert_eq!(pool.index(), 0);
    }

    #[test]
    fn test_slots_listing() {
        let pool = BufferPool::new("/data", "slot", "", NonZeroUsize::new(2).unwrap());
        assert_eq!(
            pool.slots(),
            vec![PathBuf::from("/data/slot0"), PathBuf::from("/data/slot1")]
        );
        assert_eq!(pool.len(), 2);
    }
}
