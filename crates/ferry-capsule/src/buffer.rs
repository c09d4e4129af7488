//! Segmented byte buffer.
//!
//! Capsule payloads are stored as a list of fixed-capacity segments so that
//! large payloads grow without reallocating and copying what is already
//! there. Readers walk the segments with a [`SegmentIter`].

use std::fmt;

/// Default segment capacity in bytes.
pub const DEFAULT_SEGMENT_SIZE: usize = 4096;

/// An append-only, length-tracked, segmented store of raw bytes.
#[derive(Clone)]
pub struct SegmentedBuffer {
    segments: Vec<Vec<u8>>,
    len: usize,
    segment_size: usize,
}

impl SegmentedBuffer {
    /// Create an empty buffer with the default segment size.
    #[must_use]
    pub fn new() -> Self {
        Self::with_segment_size(DEFAULT_SEGMENT_SIZE)
    }

    /// Create an empty buffer whose segments hold `segment_size` bytes each.
    #[must_use]
    pub fn with_segment_size(segment_size: usize) -> Self {
        Self {
            segments: Vec::new(),
            len: 0,
            segment_size: segment_size.max(1),
        }
    }

    /// Create an empty buffer with room reserved for `expected` bytes.
    #[must_use]
    pub fn with_reserve(expected: usize, segment_size: usize) -> Self {
        let segment_size = segment_size.max(1);
        let mut segments = Vec::with_capacity(expected.div_ceil(segment_size));
        if expected > 0 {
            segments.push(Vec::with_capacity(expected.min(segment_size)));
        }
        Self {
            segments,
            len: 0,
            segment_size,
        }
    }

    /// Create a buffer holding a copy of `bytes`.
    #[must_use]
    pub fn from_slice(bytes: &[u8], segment_size: usize) -> Self {
        let mut buffer = Self::with_reserve(bytes.len(), segment_size);
        buffer.extend_from_slice(bytes);
        buffer
    }

    /// Total number of bytes stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the buffer holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Capacity of each segment.
    #[must_use]
    pub fn segment_size(&self) -> usize {
        self.segment_size
    }

    /// Number of non-empty segments.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.segments.iter().filter(|s| !s.is_empty()).count()
    }

    /// Append bytes, opening new segments as existing ones fill up.
    pub fn extend_from_slice(&mut self, mut bytes: &[u8]) {
        while !bytes.is_empty() {
            let segment_size = self.segment_size;
            if self.segments.last().is_none_or(|s| s.len() >= segment_size) {
                self.segments.push(Vec::with_capacity(segment_size));
            }
            let Some(last) = self.segments.last_mut() else {
                break;
            };
            let room = segment_size.saturating_sub(last.len());
            let (head, tail) = bytes.split_at(room.min(bytes.len()));
            last.extend_from_slice(head);
            self.len = self.len.saturating_add(head.len());
            bytes = tail;
        }
    }

    /// Iterate over the non-empty segments in order.
    pub fn segments(&self) -> impl Iterator<Item = &[u8]> {
        self.segments
            .iter()
            .filter(|s| !s.is_empty())
            .map(Vec::as_slice)
    }

    /// A cursor positioned at the first byte.
    #[must_use]
    pub fn iter(&self) -> SegmentIter<'_> {
        SegmentIter::new(&self.segments)
    }

    /// Copy the contents into one contiguous vector.
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len);
        for segment in self.segments() {
            out.extend_from_slice(segment);
        }
        out
    }

    /// BLAKE3 digest of the contents, hex encoded.
    ///
    /// Independent of how the bytes are segmented.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for segment in self.segments() {
            hasher.update(segment);
        }
        hex::encode(hasher.finalize().as_bytes())
    }

    fn bytes(&self) -> impl Iterator<Item = u8> + '_ {
        self.segments().flat_map(|s| s.iter().copied())
    }
}

impl Default for SegmentedBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Equality compares contents, not segmentation.
impl PartialEq for SegmentedBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.bytes().eq(other.bytes())
    }
}

impl Eq for SegmentedBuffer {}

impl fmt::Debug for SegmentedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fingerprint = self.fingerprint();
        f.debug_struct("SegmentedBuffer")
            .field("len", &self.len)
            .field("segments", &self.segment_count())
            .field("segment_size", &self.segment_size)
            .field("fingerprint", &fingerprint.get(..16).unwrap_or_default())
            .finish()
    }
}

/// A cursor over the segments of a [`SegmentedBuffer`].
#[derive(Debug, Clone)]
pub struct SegmentIter<'a> {
    segments: &'a [Vec<u8>],
    index: usize,
    offset: usize,
}

impl<'a> SegmentIter<'a> {
    fn new(segments: &'a [Vec<u8>]) -> Self {
        let mut iter = Self {
            segments,
            index: 0,
            offset: 0,
        };
        iter.skip_exhausted();
        iter
    }

    /// Whether every byte has been consumed.
    #[must_use]
    pub fn done(&self) -> bool {
        self.index >= self.segments.len()
    }

    /// The unread bytes of the current segment.
    #[must_use]
    pub fn data(&self) -> &'a [u8] {
        self.segments
            .get(self.index)
            .and_then(|s| s.get(self.offset..))
            .unwrap_or_default()
    }

    /// Number of unread bytes in the current segment.
    #[must_use]
    pub fn remaining_in_segment(&self) -> usize {
        self.data().len()
    }

    /// Consume `n` bytes, moving into later segments as needed.
    ///
    /// Advancing past the end leaves the cursor done.
    pub fn advance(&mut self, mut n: usize) {
        while n > 0 && !self.done() {
            let step = n.min(self.remaining_in_segment());
            self.offset = self.offset.saturating_add(step);
            n = n.saturating_sub(step);
            self.skip_exhausted();
        }
    }

    fn skip_exhausted(&mut self) {
        while let Some(segment) = self.segments.get(self.index) {
            if self.offset < segment.len() {
                break;
            }
            self.index = self.index.saturating_add(1);
            self.offset = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| u8::try_from(i % 251).unwrap()).collect()
    }

    #[test]
    fn test_empty_buffer() {
        let buffer = SegmentedBuffer::new();
        assert!(buffer.is_empty());
        assert_eq!(buffer.segment_count(), 0);
        assert!(buffer.iter().done());
        assert!(buffer.to_vec().is_empty());
    }

    #[test]
    fn test_extend_splits_into_segments() {
        let mut buffer = SegmentedBuffer::with_segment_size(4);
        buffer.extend_from_slice(&[1, 2, 3]);
        buffer.extend_from_slice(&[4, 5, 6, 7, 8, 9]);

        assert_eq!(buffer.len(), 9);
        assert_eq!(buffer.segment_count(), 3);
        let segments: Vec<&[u8]> = buffer.segments().collect();
        assert_eq!(segments, vec![&[1, 2, 3, 4][..], &[5, 6, 7, 8], &[9]]);
    }

    #[test]
    fn test_exact_segment_boundary() {
        let buffer = SegmentedBuffer::from_slice(&pattern(DEFAULT_SEGMENT_SIZE), DEFAULT_SEGMENT_SIZE);
        assert_eq!(buffer.segment_count(), 1);

        let mut bigger = buffer.clone();
        bigger.extend_from_slice(&[0xAA]);
        assert_eq!(bigger.segment_count(), 2);
    }

    #[test]
    fn test_iter_walks_every_byte() {
        let data = pattern(10_000);
        let buffer = SegmentedBuffer::from_slice(&data, 1000);

        let mut collected = Vec::new();
        let mut iter = buffer.iter();
        while !iter.done() {
            let chunk = iter.data();
            assert_eq!(chunk.len(), iter.remaining_in_segment());
            collected.extend_from_slice(chunk);
            iter.advance(chunk.len());
        }
        assert_eq!(collected, data);
    }

    #[test]
    fn test_advance_within_and_across_segments() {
        let buffer = SegmentedBuffer::from_slice(&pattern(10), 4);
        let mut iter = buffer.iter();

        iter.advance(1);
        assert_eq!(iter.data(), &[1, 2, 3]);
        iter.advance(5);
        assert_eq!(iter.data(), &[6, 7]);
        iter.advance(100);
        assert!(iter.done());
        assert_eq!(iter.remaining_in_segment(), 0);
    }

    #[test]
    fn test_equality_ignores_segmentation() {
        let data = pattern(5000);
        let a = SegmentedBuffer::from_slice(&data, 4096);
        let b = SegmentedBuffer::from_slice(&data, 7);
        assert_eq!(a, b);
        assert_eq!(a.fingerprint(), b.fingerprint());

        let c = SegmentedBuffer::from_slice(&data[..4999], 4096);
        assert_ne!(a, c);
    }

    #[test]
    fn test_reserve_does_not_change_length() {
        let buffer = SegmentedBuffer::with_reserve(1_000_000, 4096);
        assert!(buffer.is_empty());
        assert_eq!(buffer.segment_size(), 4096);
    }

    #[test]
    fn test_zero_segment_size_is_clamped() {
        let mut buffer = SegmentedBuffer::with_segment_size(0);
        buffer.extend_from_slice(&[1, 2]);
        assert_eq!(buffer.segment_size(), 1);
        assert_eq!(buffer.segment_count(), 2);
    }
}
