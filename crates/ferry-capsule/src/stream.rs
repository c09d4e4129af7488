//! Host stream primitives.
//!
//! A host stream is a sequence of word pairs and raw byte runs. Word pairs are
//! two little-endian `u32`s, first word first. Byte runs are written verbatim
//! with no padding.

use ferry_core::{CloneError, CloneResult};

use crate::buffer::{SegmentIter, SegmentedBuffer};

/// Size of one encoded word pair.
pub const WORD_PAIR_LEN: usize = 8;

/// Write side of a host serialization stream.
pub trait HostWriter {
    /// Append a word pair.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream rejects the write.
    fn write_word_pair(&mut self, first: u32, second: u32) -> CloneResult<()>;

    /// Append raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream rejects the write.
    fn write_bytes(&mut self, bytes: &[u8]) -> CloneResult<()>;
}

/// Read side of a host serialization stream.
pub trait HostReader {
    /// Bytes left to read.
    fn remaining(&self) -> usize;

    /// Consume a word pair.
    ///
    /// # Errors
    ///
    /// Returns `EnvelopeTruncated` if fewer than eight bytes remain.
    fn read_word_pair(&mut self) -> CloneResult<(u32, u32)>;

    /// Consume exactly `len` bytes, appending them to `out`.
    ///
    /// Nothing is consumed when fewer than `len` bytes remain.
    ///
    /// # Errors
    ///
    /// Returns `EnvelopeTruncated` on a short stream.
    fn read_bytes_into(&mut self, len: usize, out: &mut SegmentedBuffer) -> CloneResult<()>;

    /// Consume exactly `len` bytes into a fresh vector.
    ///
    /// # Errors
    ///
    /// Returns `EnvelopeTruncated` on a short stream.
    fn read_bytes(&mut self, len: usize) -> CloneResult<Vec<u8>> {
        let mut out = SegmentedBuffer::with_reserve(len, len);
        self.read_bytes_into(len, &mut out)?;
        Ok(out.to_vec())
    }
}

impl<W: HostWriter + ?Sized> HostWriter for &mut W {
    fn write_word_pair(&mut self, first: u32, second: u32) -> CloneResult<()> {
        (**self).write_word_pair(first, second)
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> CloneResult<()> {
        (**self).write_bytes(bytes)
    }
}

impl<R: HostReader + ?Sized> HostReader for &mut R {
    fn remaining(&self) -> usize {
        (**self).remaining()
    }

    fn read_word_pair(&mut self) -> CloneResult<(u32, u32)> {
        (**self).read_word_pair()
    }

    fn read_bytes_into(&mut self, len: usize, out: &mut SegmentedBuffer) -> CloneResult<()> {
        (**self).read_bytes_into(len, out)
    }
}

/// A [`HostWriter`] appending to a [`SegmentedBuffer`].
#[derive(Debug)]
pub struct BufferWriter<'a> {
    buffer: &'a mut SegmentedBuffer,
}

impl<'a> BufferWriter<'a> {
    /// Write to the end of `buffer`.
    pub fn new(buffer: &'a mut SegmentedBuffer) -> Self {
        Self { buffer }
    }

    /// Bytes written to the underlying buffer so far, including any that were
    /// there before this writer was created.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether the underlying buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl HostWriter for BufferWriter<'_> {
    fn write_word_pair(&mut self, first: u32, second: u32) -> CloneResult<()> {
        let mut raw = [0u8; WORD_PAIR_LEN];
        let (a, b) = raw.split_at_mut(4);
        a.copy_from_slice(&first.to_le_bytes());
        b.copy_from_slice(&second.to_le_bytes());
        self.buffer.extend_from_slice(&raw);
        Ok(())
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> CloneResult<()> {
        self.buffer.extend_from_slice(bytes);
        Ok(())
    }
}

/// A [`HostReader`] over a [`SegmentedBuffer`].
#[derive(Debug, Clone)]
pub struct BufferReader<'a> {
    cursor: SegmentIter<'a>,
    remaining: usize,
    position: usize,
}

impl<'a> BufferReader<'a> {
    /// Read `buffer` from its first byte.
    #[must_use]
    pub fn new(buffer: &'a SegmentedBuffer) -> Self {
        Self {
            cursor: buffer.iter(),
            remaining: buffer.len(),
            position: 0,
        }
    }

    /// Bytes consumed so far.
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    fn take(&mut self, len: usize, mut sink: impl FnMut(&[u8])) -> CloneResult<()> {
        if len > self.remaining {
            return Err(CloneError::EnvelopeTruncated {
                declared: len,
                available: self.remaining,
            });
        }
        let mut left = len;
        while left > 0 && !self.cursor.done() {
            let chunk = self.cursor.data();
            let (head, _) = chunk.split_at(left.min(chunk.len()));
            sink(head);
            self.cursor.advance(head.len());
            left = left.saturating_sub(head.len());
        }
        self.remaining = self.remaining.saturating_sub(len);
        self.position = self.position.saturating_add(len);
        Ok(())
    }
}

impl HostReader for BufferReader<'_> {
    fn remaining(&self) -> usize {
        self.remaining
    }

    fn read_word_pair(&mut self) -> CloneResult<(u32, u32)> {
        let mut raw = Vec::with_capacity(WORD_PAIR_LEN);
        self.take(WORD_PAIR_LEN, |chunk| raw.extend_from_slice(chunk))?;
        split_word_pair(&raw).ok_or_else(|| CloneError::EnvelopeTruncated {
            declared: WORD_PAIR_LEN,
            available: raw.len(),
        })
    }

    fn read_bytes_into(&mut self, len: usize, out: &mut SegmentedBuffer) -> CloneResult<()> {
        self.take(len, |chunk| out.extend_from_slice(chunk))
    }
}

fn split_word_pair(raw: &[u8]) -> Option<(u32, u32)> {
    let (first, rest) = raw.split_first_chunk::<4>()?;
    let (second, _) = rest.split_first_chunk::<4>()?;
    Some((u32::from_le_bytes(*first), u32::from_le_bytes(*second)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_pair_layout() {
        let mut buffer = SegmentedBuffer::new();
        BufferWriter::new(&mut buffer)
            .write_word_pair(0x0403_0201, 0x0807_0605)
            .unwrap();
        assert_eq!(buffer.to_vec(), vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_read_across_segment_boundary() {
        let mut buffer = SegmentedBuffer::with_segment_size(3);
        let mut writer = BufferWriter::new(&mut buffer);
        writer.write_word_pair(7, 9).unwrap();
        writer.write_bytes(b"hello").unwrap();

        let mut reader = BufferReader::new(&buffer);
        assert_eq!(reader.remaining(), 13);
        assert_eq!(reader.read_word_pair().unwrap(), (7, 9));
        assert_eq!(reader.read_bytes(5).unwrap(), b"hello");
        assert_eq!(reader.remaining(), 0);
        assert_eq!(reader.position(), 13);
    }

    #[test]
    fn test_short_read_consumes_nothing() {
        let buffer = SegmentedBuffer::from_slice(&[1, 2, 3], 4096);
        let mut reader = BufferReader::new(&buffer);

        let err = reader.read_bytes(4).unwrap_err();
        assert!(matches!(
            err,
            CloneError::EnvelopeTruncated {
                declared: 4,
                available: 3
            }
        ));
        assert_eq!(reader.remaining(), 3);
        assert_eq!(reader.read_bytes(3).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_short_word_pair() {
        let buffer = SegmentedBuffer::from_slice(&[0; 7], 4096);
        let mut reader = BufferReader::new(&buffer);
        assert!(matches!(
            reader.read_word_pair(),
            Err(CloneError::EnvelopeTruncated { .. })
        ));
        assert_eq!(reader.position(), 0);
    }

    #[test]
    fn test_zero_length_read() {
        let buffer = SegmentedBuffer::new();
        let mut reader = BufferReader::new(&buffer);
        assert!(reader.read_bytes(0).unwrap().is_empty());
    }
}
