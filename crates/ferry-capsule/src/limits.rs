//! Buffer and envelope limits.

use ferry_config::CapsuleSection;

use crate::buffer::DEFAULT_SEGMENT_SIZE;

/// Limits applied while building buffers and framing envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecLimits {
    /// Segment size for freshly serialized buffers.
    pub segment_size: usize,
    /// Segment size, and so minimum reservation, for decoded buffers.
    pub decode_reserve: usize,
    /// Largest payload accepted in either direction.
    pub max_envelope_len: usize,
}

impl CodecLimits {
    /// Largest payload the envelope's 32-bit length word can describe.
    #[must_use]
    pub fn wire_max() -> usize {
        usize::try_from(u32::MAX).unwrap_or(usize::MAX)
    }

    /// Derive limits from the `[capsule]` config section.
    ///
    /// Lengths above what the envelope can frame are clamped.
    #[must_use]
    pub fn from_config(section: &CapsuleSection) -> Self {
        let max = usize::try_from(section.max_envelope_len).unwrap_or(usize::MAX);
        Self {
            segment_size: section.segment_size.max(1),
            decode_reserve: section.decode_reserve.max(1),
            max_envelope_len: max.min(Self::wire_max()),
        }
    }

    /// Override the maximum payload length.
    #[must_use]
    pub fn with_max_envelope_len(mut self, max: usize) -> Self {
        self.max_envelope_len = max.min(Self::wire_max());
        self
    }
}

impl Default for CodecLimits {
    fn default() -> Self {
        Self {
            segment_size: DEFAULT_SEGMENT_SIZE,
            decode_reserve: DEFAULT_SEGMENT_SIZE,
            max_envelope_len: Self::wire_max(),
        }
    }
}
