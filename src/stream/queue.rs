//! FIFO byte buffer connecting pipeline stages.

/// Byte FIFO written by a [`ByteSource`](super::ByteSource) and drained by
/// its consumer.
///
/// Besides plain push/pop, the queue supports marks: a stage that forwards
/// an upstream fill can take a [`mark`](Self::mark) before the fill and then
/// edit exactly the bytes that fill appended, in place.
#[derive(Debug, Default, Clone)]
pub struct ByteQueue {
    buf: Vec<u8>,
    head: usize,
}

impl ByteQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of unread bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len() - self.head
    }

    /// Whether there are no unread bytes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head >= self.buf.len()
    }

    /// Drop all unread bytes.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.head = 0;
    }

    /// Remove and return the oldest byte.
    #[inline]
    pub fn pop(&mut self) -> Option<u8> {
        let byte = *self.buf.get(self.head)?;
        self.head += 1;
        if self.head == self.buf.len() {
            self.clear();
        }
        Some(byte)
    }

    /// The oldest byte, without removing it.
    #[inline]
    pub fn peek(&self) -> Option<u8> {
        self.buf.get(self.head).copied()
    }

    /// Append one byte.
    #[inline]
    pub fn push(&mut self, byte: u8) {
        self.compact();
        self.buf.push(byte);
    }

    /// Append `len` copies of `byte`.
    pub fn push_run(&mut self, byte: u8, len: usize) {
        self.compact();
        self.buf.resize(self.buf.len() + len, byte);
    }

    /// Append a slice.
    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        self.compact();
        self.buf.extend_from_slice(bytes);
    }

    /// Move up to `dest.len()` bytes out of the queue. Returns the count.
    pub fn read_into(&mut self, dest: &mut [u8]) -> usize {
        let n = dest.len().min(self.len());
        dest[..n].copy_from_slice(&self.buf[self.head..self.head + n]);
        self.skip(n);
        n
    }

    /// Discard up to `n` unread bytes from the front.
    pub fn skip(&mut self, n: usize) {
        self.head = (self.head + n).min(self.buf.len());
        if self.head == self.buf.len() {
            self.clear();
        }
    }

    /// Remove up to `n` bytes from the back (the most recently pushed).
    pub fn unput(&mut self, n: usize) {
        let keep = self.len().saturating_sub(n);
        self.buf.truncate(self.head + keep);
    }

    /// Position marker for [`since_mark_mut`](Self::since_mark_mut).
    ///
    /// A mark stays valid across pushes but not across reads.
    #[inline]
    pub fn mark(&self) -> usize {
        self.len()
    }

    /// Bytes appended since `mark` was taken.
    pub fn since_mark_mut(&mut self, mark: usize) -> &mut [u8] {
        let start = (self.head + mark).min(self.buf.len());
        &mut self.buf[start..]
    }

    /// Unread bytes as a slice.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf[self.head..]
    }

    /// Reclaim the consumed prefix once it is at least as large as the
    /// unread part.
    #[inline]
    fn compact(&mut self) {
        if self.head > 0 && self.head >= self.len() {
            self.buf.drain(..self.head);
            self.head = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let mut q = ByteQueue::new();
        q.extend_from_slice(&[1, 2, 3]);
        q.push(4);
        assert_eq!(q.len(), 4);
        assert_eq!(q.pop(), Some(1));
        assert_eq!(q.peek(), Some(2));
        assert_eq!(q.as_slice(), &[2, 3, 4]);
    }

    #[test]
    fn test_mark_edits_only_new_bytes() {
        let mut q = ByteQueue::new();
        q.extend_from_slice(&[9, 9]);
        let mark = q.mark();
        q.extend_from_slice(&[1, 2]);
        for b in q.since_mark_mut(mark) {
            *b += 10;
        }
        assert_eq!(q.as_slice(), &[9, 9, 11, 12]);
    }

    #[test]
    fn test_mark_survives_compaction() {
        let mut q = ByteQueue::new();
        q.extend_from_slice(&[1, 2, 3, 4]);
        q.skip(3);
        let mark = q.mark();
        q.extend_from_slice(&[5, 6]);
        assert_eq!(q.since_mark_mut(mark), &[5, 6]);
        assert_eq!(q.as_slice(), &[4, 5, 6]);
    }

    #[test]
    fn test_unput_and_runs() {
        let mut q = ByteQueue::new();
        q.push_run(0xFF, 3);
        q.push(0);
        q.unput(2);
        assert_eq!(q.as_slice(), &[0xFF, 0xFF]);

        let mut out = [0u8; 4];
        assert_eq!(q.read_into(&mut out), 2);
        assert!(q.is_empty());
        assert_eq!(q.pop(), None);
    }
}
