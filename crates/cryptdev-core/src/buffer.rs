//! Session buffer
//!
//! Holds the single most recent transform result. Storage is reserved once,
//! up front, and every later result is written into that storage, so a
//! replacement never allocates and never fails halfway.

use crate::cipher::transform_into;
use crate::error::DeviceError;
use crate::types::{Direction, Shift};

/// The most recent transform result
#[derive(Debug)]
pub struct SessionBuffer {
    contents: Vec<u8>,
    capacity: usize,
}

impl SessionBuffer {
    /// Reserve storage for results up to `capacity` bytes
    pub fn allocate(capacity: usize) -> Result<Self, DeviceError> {
        let mut contents = Vec::new();
        contents
            .try_reserve_exact(capacity)
            .map_err(|_| DeviceError::AllocationFailed { capacity })?;
        Ok(Self { contents, capacity })
    }

    /// Largest result this buffer can hold
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.contents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }

    pub fn contents(&self) -> &[u8] {
        &self.contents
    }

    /// Replace the contents with the transform of `payload`
    ///
    /// The previous result is discarded, never appended to. On error the
    /// buffer is left as it was.
    pub fn replace_with_transform(
        &mut self,
        payload: &[u8],
        shift: Shift,
        direction: Direction,
    ) -> Result<(), DeviceError> {
        if payload.len() > self.capacity {
            return Err(DeviceError::CommandTooLarge {
                size: payload.len(),
                max: self.capacity,
            });
        }
        transform_into(payload, shift, direction, &mut self.contents);
        Ok(())
    }

    /// Up to `max_len` bytes starting at `cursor`
    ///
    /// A cursor at or past the end yields an empty slice.
    pub fn read_at(&self, cursor: u64, max_len: usize) -> &[u8] {
        let start = match usize::try_from(cursor) {
            Ok(start) if start < self.contents.len() => start,
            _ => return &[],
        };
        let end = start + max_len.min(self.contents.len() - start);
        &self.contents[start..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shift(v: i64) -> Shift {
        Shift::new(v).unwrap()
    }

    #[test]
    fn test_allocate_starts_empty() {
        let buf = SessionBuffer::allocate(1024).unwrap();
        assert!(buf.is_empty());
        assert_eq!(buf.capacity(), 1024);
        assert!(buf.read_at(0, 16).is_empty());
    }

    #[test]
    fn test_allocation_failure() {
        let err = SessionBuffer::allocate(usize::MAX).unwrap_err();
        assert_eq!(err, DeviceError::AllocationFailed { capacity: usize::MAX });
    }

    #[test]
    fn test_overwrite_not_append() {
        let mut buf = SessionBuffer::allocate(64).unwrap();
        buf.replace_with_transform(b"hello", shift(3), Direction::Forward)
            .unwrap();
        assert_eq!(buf.contents(), b"khoor");

        buf.replace_with_transform(b"hi", shift(3), Direction::Forward)
            .unwrap();
        assert_eq!(buf.len(), 2);
        assert_eq!(buf.contents(), b"kl");
    }

    #[test]
    fn test_oversized_payload_leaves_buffer_untouched() {
        let mut buf = SessionBuffer::allocate(4).unwrap();
        buf.replace_with_transform(b"abcd", shift(1), Direction::Forward)
            .unwrap();
        let err = buf
            .replace_with_transform(b"abcde", shift(1), Direction::Forward)
            .unwrap_err();
        assert_eq!(err, DeviceError::CommandTooLarge { size: 5, max: 4 });
        assert_eq!(buf.contents(), b"bcde");
    }

    #[test]
    fn test_read_at_cursor() {
        let mut buf = SessionBuffer::allocate(64).unwrap();
        buf.replace_with_transform(b"abcdef", shift(0), Direction::Forward)
            .unwrap();

        assert_eq!(buf.read_at(0, 4), b"abcd");
        assert_eq!(buf.read_at(4, 4), b"ef");
        assert_eq!(buf.read_at(2, 0), b"");
        // End of data, not an error
        assert!(buf.read_at(6, 4).is_empty());
        assert!(buf.read_at(600, 4).is_empty());
        assert!(buf.read_at(u64::MAX, usize::MAX).is_empty());
        assert_eq!(buf.read_at(1, usize::MAX), b"bcdef");
    }
}
