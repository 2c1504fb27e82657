//! The decoded-output history buffer, sized to the frame's window, that
//! match offsets index into.
//!
//! Unlike a bulk-copy ring buffer, `copy_match` below walks byte by byte.
//! That is load-bearing: a sequence with `offset < length` is a valid,
//! common way to RLE-encode a run (e.g. offset 1 repeats the last byte
//! `length` times), and a byte that was just written must be visible to
//! the very next read in the same copy.

use alloc::vec::Vec;

use crate::error::Error;

pub struct SlidingWindow {
    buffer: Vec<u8>,
    capacity: usize,
}

impl SlidingWindow {
    pub fn new(capacity: usize) -> Self {
        SlidingWindow {
            buffer: Vec::new(),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append literal bytes directly, growing the window (it is allowed to
    /// exceed `capacity` before the caller drains it; callers are expected
    /// to drain down to the window size between blocks as needed).
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Prime the window with dictionary content so subsequent offsets can
    /// reach back into it.
    pub fn prime_history(&mut self, dict_content: &[u8]) {
        self.buffer.extend_from_slice(dict_content);
    }

    /// Copy `length` bytes from `offset` bytes back in the history into
    /// the end of the buffer, one byte at a time.
    pub fn copy_match(&mut self, offset: usize, length: usize) -> Result<(), Error> {
        if offset == 0 {
            return Err(Error::InvalidBackReference {
                context: "match offset is zero".into(),
            });
        }
        if offset > self.buffer.len() {
            return Err(Error::InvalidBackReference {
                context: alloc::format!(
                    "match offset {} exceeds available history of {} bytes",
                    offset,
                    self.buffer.len()
                ),
            });
        }
        if self.capacity == 0 {
            return Err(Error::InvalidBackReference {
                context: "sliding window has zero capacity".into(),
            });
        }

        self.buffer.reserve(length);
        let mut read_index = self.buffer.len() - offset;
        for _ in 0..length {
            let byte = self.buffer[read_index];
            self.buffer.push(byte);
            read_index += 1;
        }
        Ok(())
    }

    /// Drop everything but the trailing `capacity` bytes, keeping the
    /// buffer from growing without bound across many blocks.
    pub fn shrink_to_window(&mut self) {
        if self.buffer.len() > self.capacity {
            let excess = self.buffer.len() - self.capacity;
            self.buffer.drain(..excess);
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Drain and return everything currently buffered.
    pub fn drain_all(&mut self) -> Vec<u8> {
        core::mem::take(&mut self.buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_match_supports_offset_less_than_length() {
        let mut window = SlidingWindow::new(64);
        window.push(b"a");
        window.copy_match(1, 5).unwrap();
        assert_eq!(window.as_slice(), b"aaaaaa");
    }

    #[test]
    fn copy_match_rejects_zero_offset() {
        let mut window = SlidingWindow::new(64);
        window.push(b"abc");
        assert!(window.copy_match(0, 1).is_err());
    }

    #[test]
    fn copy_match_rejects_offset_beyond_history() {
        let mut window = SlidingWindow::new(64);
        window.push(b"abc");
        assert!(window.copy_match(10, 1).is_err());
    }

    #[test]
    fn prime_history_makes_dictionary_bytes_reachable() {
        let mut window = SlidingWindow::new(64);
        window.prime_history(b"dictionary");
        window.push(b"!");
        window.copy_match(11, 4).unwrap();
        assert_eq!(window.as_slice(), b"dictionary!dict");
    }

    #[test]
    fn shrink_to_window_drops_old_bytes() {
        let mut window = SlidingWindow::new(4);
        window.push(b"abcdefgh");
        window.shrink_to_window();
        assert_eq!(window.as_slice(), b"efgh");
    }
}
