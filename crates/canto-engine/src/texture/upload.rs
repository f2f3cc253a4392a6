use std::collections::VecDeque;

use super::TextureHandle;

/// Pixel data waiting for its GPU object.
#[derive(Debug, Clone)]
pub struct PendingUpload {
    pub handle: TextureHandle,
    pub width: u32,
    pub height: u32,
    /// BGRA8, `4 * width` bytes per row.
    pub pixels: Vec<u8>,
    pub(crate) serial: u64,
    /// Failed realizations so far.
    pub(crate) attempts: u32,
}

/// FIFO of deferred uploads; drained one entry per frame.
#[derive(Debug, Default)]
pub struct UploadQueue {
    entries: VecDeque<PendingUpload>,
}

impl UploadQueue {
    pub fn push(&mut self, upload: PendingUpload) {
        self.entries.push_back(upload);
    }

    pub fn pop(&mut self) -> Option<PendingUpload> {
        self.entries.pop_front()
    }

    /// Puts an entry back at the head, ahead of newer uploads.
    pub fn push_front(&mut self, upload: PendingUpload) {
        self.entries.push_front(upload);
    }

    /// Drops every entry targeting `handle`. Returns how many were dropped.
    pub fn purge(&mut self, handle: TextureHandle) -> usize {
        let before = self.entries.len();
        self.entries.retain(|u| u.handle != handle);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(h: i32) -> PendingUpload {
        PendingUpload {
            handle: TextureHandle(h),
            width: 1,
            height: 1,
            pixels: vec![0; 4],
            serial: h as u64,
            attempts: 0,
        }
    }

    #[test]
    fn pops_in_submission_order() {
        let mut q = UploadQueue::default();
        q.push(upload(3));
        q.push(upload(1));
        assert_eq!(q.pop().map(|u| u.handle), Some(TextureHandle(3)));
        assert_eq!(q.pop().map(|u| u.handle), Some(TextureHandle(1)));
        assert!(q.pop().is_none());
    }

    #[test]
    fn pushed_back_entry_is_next() {
        let mut q = UploadQueue::default();
        q.push(upload(1));
        q.push(upload(2));
        let first = q.pop().unwrap();
        q.push_front(first);
        assert_eq!(q.pop().map(|u| u.handle), Some(TextureHandle(1)));
    }

    #[test]
    fn purge_removes_only_matching() {
        let mut q = UploadQueue::default();
        q.push(upload(1));
        q.push(upload(2));
        q.push(upload(1));
        assert_eq!(q.purge(TextureHandle(1)), 2);
        assert_eq!(q.len(), 1);
    }
}
