//! Bounded linear byte buffer with `put`/`get`/`del`, one per [`super::parser::StreamParser`]
//! (§4.2). Capacity varies per parser — 64 KiB for audio codecs, up to 2 MiB
//! for H.264/HEVC.

/// A bounded byte queue exposing a single contiguous read view.
///
/// Internally this never actually wraps: `del` compacts the remaining bytes
/// to the front of the backing store, so `get` can always hand back a plain
/// slice rather than a rotated or double-buffered view. `put` accepts at
/// most `capacity - len` bytes and reports how many it took; the caller
/// decides what to do with a short accept (§4.2 puts overflow accounting on
/// the caller, not the buffer).
pub struct RingBuffer {
    storage: Vec<u8>,
    len: usize,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            storage: vec![0u8; capacity],
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Appends as much of `bytes` as fits, returning the number of bytes
    /// actually accepted.
    pub fn put(&mut self, bytes: &[u8]) -> usize {
        let room = self.storage.len() - self.len;
        let accepted = bytes.len().min(room);
        self.storage[self.len..self.len + accepted].copy_from_slice(&bytes[..accepted]);
        self.len += accepted;
        accepted
    }

    /// Returns the current contiguous view of buffered bytes.
    pub fn get(&self) -> &[u8] {
        &self.storage[..self.len]
    }

    /// Advances the consumer by `n` bytes, compacting the remainder to the
    /// front. Clamped to the currently buffered length.
    pub fn del(&mut self, n: usize) {
        let n = n.min(self.len);
        self.storage.copy_within(n..self.len, 0);
        self.len -= n;
    }

    /// Discards all buffered bytes.
    pub fn clear(&mut self) {
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_accepts_up_to_capacity_and_reports_shortfall() {
        let mut ring = RingBuffer::new(4);
        assert_eq!(ring.put(&[1, 2, 3]), 3);
        assert_eq!(ring.put(&[4, 5, 6]), 1);
        assert_eq!(ring.get(), &[1, 2, 3, 4]);
    }

    #[test]
    fn del_compacts_and_get_stays_contiguous() {
        let mut ring = RingBuffer::new(8);
        ring.put(&[1, 2, 3, 4, 5]);
        ring.del(2);
        assert_eq!(ring.get(), &[3, 4, 5]);
        assert_eq!(ring.put(&[6, 7]), 2);
        assert_eq!(ring.get(), &[3, 4, 5, 6, 7]);
    }

    #[test]
    fn clear_resets_without_corrupting_capacity() {
        let mut ring = RingBuffer::new(4);
        ring.put(&[1, 2, 3, 4]);
        ring.clear();
        assert_eq!(ring.get(), &[] as &[u8]);
        assert_eq!(ring.put(&[9, 9]), 2);
    }
}
