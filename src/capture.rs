use core::ops::{Add, AddAssign};

use crate::WINDOW;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingCursor {
    index: usize,
    bound: usize,
}

impl RingCursor {
    pub fn new(bound: usize) -> RingCursor {
        RingCursor { index: 0, bound }
    }

    pub fn into_inner(self) -> usize {
        self.index
    }
}

impl Add<usize> for RingCursor {
    type Output = RingCursor;

    fn add(self, offset: usize) -> Self::Output {
        RingCursor { index: self.index.wrapping_add(offset) % self.bound, bound: self.bound }
    }
}

impl AddAssign<usize> for RingCursor {
    fn add_assign(&mut self, offset: usize) {
        *self = *self + offset
    }
}

/// Fixed-capacity circular sample buffer, filled by DMA (or the logic sample interrupt) and
/// read by the scheduler.
///
/// `head` and `filled` always move together; readers only see the first `filled` samples, so
/// a window never includes positions the current capture cycle has not written yet.
#[derive(Debug)]
pub struct SampleBuffer {
    samples: Box<[u16]>,
    head: RingCursor,
    filled: usize,
}

impl SampleBuffer {
    pub fn new(capacity: usize) -> SampleBuffer {
        SampleBuffer {
            samples: vec![0; capacity].into_boxed_slice(),
            head: RingCursor::new(capacity),
            filled: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    pub fn filled(&self) -> usize {
        self.filled
    }

    /// Appends one sample. Returns `true` if this write completed a pass over the buffer.
    pub fn push(&mut self, sample: u16) -> bool {
        self.samples[self.head.into_inner()] = sample;
        self.head += 1;
        self.filled = (self.filled + 1).min(self.capacity());
        self.head.into_inner() == 0
    }

    /// Logically empties the buffer; old contents stay in place until overwritten.
    pub fn clear(&mut self) {
        self.head = RingCursor::new(self.capacity());
        self.filled = 0;
    }

    /// Empties the buffer and zeroes its contents.
    pub fn zero(&mut self) {
        self.samples.fill(0);
        self.clear();
    }

    /// Reads the window of samples starting at `cursor`. Positions not yet filled read as 0.
    pub fn window(&self, cursor: usize) -> [u16; WINDOW] {
        let mut window = [0; WINDOW];
        let end = (cursor + WINDOW).min(self.filled);
        if cursor < end {
            window[..end - cursor].copy_from_slice(&self.samples[cursor..end]);
        }
        window
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_ring_cursor() {
        let cursor = RingCursor::new(128);
        assert_eq!((cursor + 10).index, 10);
        assert_eq!((cursor + 10 + 120).index, 2);
        assert_eq!((cursor + 130).index, 2);
        assert_eq!((cursor + 0), cursor);
        let mut cursor = cursor;
        cursor += 127;
        assert_eq!(cursor.into_inner(), 127);
        cursor += 1;
        assert_eq!(cursor.into_inner(), 0);
    }

    #[test]
    fn test_push_wraps() {
        let mut buf = SampleBuffer::new(16);
        for n in 0..15 {
            assert!(!buf.push(n));
        }
        assert!(buf.push(15));
        assert_eq!(buf.filled(), 16);
        assert!(!buf.push(100));
        assert_eq!(buf.filled(), 16);
        assert_eq!(buf.window(0), [100, 1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_window_never_reads_past_filled() {
        let mut buf = SampleBuffer::new(16);
        for n in 1..=11 {
            buf.push(n);
        }
        assert_eq!(buf.window(0), [1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(buf.window(8), [9, 10, 11, 0, 0, 0, 0, 0]);
        assert_eq!(buf.window(16), [0; WINDOW]);
    }

    #[test]
    fn test_clear_hides_stale_samples() {
        let mut buf = SampleBuffer::new(16);
        for n in 1..=16 {
            buf.push(n);
        }
        buf.clear();
        assert_eq!(buf.window(0), [0; WINDOW]);
        buf.push(42);
        assert_eq!(buf.window(0), [42, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_zero() {
        let mut buf = SampleBuffer::new(8);
        buf.push(7);
        buf.zero();
        assert_eq!(buf.filled(), 0);
        assert_eq!(buf.samples.iter().copied().max(), Some(0));
    }
}
