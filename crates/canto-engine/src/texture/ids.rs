use std::collections::VecDeque;

use super::TextureHandle;
use crate::error::{RenderError, RenderResult};

/// Bounded pool of texture handles.
///
/// Handles `0..capacity` are minted lazily in ascending order. Released
/// handles go to a FIFO free list that is drained before minting resumes,
/// so the first handle released is the next one issued.
#[derive(Debug)]
pub struct IdAllocator {
    capacity: usize,
    minted: usize,
    free: VecDeque<i32>,
    in_use: Vec<bool>,
}

impl IdAllocator {
    pub fn new(capacity: usize) -> Self {
        // Handles are i32; anything above that is unreachable anyway.
        let capacity = capacity.min(i32::MAX as usize);
        Self {
            capacity,
            minted: 0,
            free: VecDeque::new(),
            in_use: Vec::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Handles that can still be acquired.
    pub fn available(&self) -> usize {
        self.free.len() + (self.capacity - self.minted)
    }

    /// Handles currently held by callers.
    pub fn outstanding(&self) -> usize {
        self.capacity - self.available()
    }

    pub fn acquire(&mut self) -> RenderResult<TextureHandle> {
        let id = match self.free.pop_front() {
            Some(id) => id,
            None if self.minted < self.capacity => {
                let id = self.minted as i32;
                self.minted += 1;
                self.in_use.push(false);
                id
            }
            None => return Err(RenderError::HandlesExhausted { capacity: self.capacity }),
        };

        self.in_use[id as usize] = true;
        Ok(TextureHandle(id))
    }

    /// Returns `handle` to the pool. Releasing a handle that is not
    /// outstanding returns `false` and changes nothing.
    pub fn release(&mut self, handle: TextureHandle) -> bool {
        let Some(slot) = handle.index().and_then(|i| self.in_use.get_mut(i)) else {
            return false;
        };
        if !*slot {
            return false;
        }

        *slot = false;
        self.free.push_back(handle.0);
        true
    }

    pub fn is_outstanding(&self, handle: TextureHandle) -> bool {
        handle.index().and_then(|i| self.in_use.get(i)).copied().unwrap_or(false)
    }

    /// Forgets every handle. Used when the renderer is torn down.
    pub fn clear(&mut self) {
        self.minted = 0;
        self.free.clear();
        self.in_use.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn released_handle_is_reused_first() {
        let mut ids = IdAllocator::new(5);
        let _a = ids.acquire().unwrap();
        let b = ids.acquire().unwrap();
        let _c = ids.acquire().unwrap();
        assert_eq!(ids.outstanding(), 3);

        assert!(ids.release(b));
        assert_eq!(ids.available(), 3);

        let again = ids.acquire().unwrap();
        assert_eq!(again, b);
        assert_eq!(ids.outstanding(), 3);
        assert_eq!(ids.available(), 2);
    }

    #[test]
    fn free_list_is_fifo() {
        let mut ids = IdAllocator::new(10);
        let hs: Vec<_> = (0..4).map(|_| ids.acquire().unwrap()).collect();
        ids.release(hs[2]);
        ids.release(hs[0]);
        assert_eq!(ids.acquire().unwrap(), hs[2]);
        assert_eq!(ids.acquire().unwrap(), hs[0]);
        assert_eq!(ids.acquire().unwrap(), TextureHandle(4));
    }

    #[test]
    fn double_release_does_not_duplicate() {
        let mut ids = IdAllocator::new(4);
        let a = ids.acquire().unwrap();
        assert!(ids.release(a));
        assert!(!ids.release(a));

        let x = ids.acquire().unwrap();
        let y = ids.acquire().unwrap();
        assert_eq!(x, a);
        assert_ne!(x, y);
    }

    #[test]
    fn invalid_and_unknown_handles_are_ignored() {
        let mut ids = IdAllocator::new(4);
        assert!(!ids.release(TextureHandle::INVALID));
        assert!(!ids.release(TextureHandle(3)));
        assert_eq!(ids.available(), 4);
    }

    #[test]
    fn exhaustion_is_an_error() {
        let mut ids = IdAllocator::new(2);
        ids.acquire().unwrap();
        ids.acquire().unwrap();
        let err = ids.acquire().unwrap_err();
        assert!(err.is_fatal());
    }
}
