//! Envelope codec.
//!
//! A capsule travels inside a host stream as a tagged sub-record:
//!
//! ```text
//! [CAPSULE_TAG, 0] [length, version] [length payload bytes]
//! ```
//!
//! The payload is the capsule's buffer, copied segment by segment with no
//! padding.

use ferry_core::{CloneError, CloneResult};
use tracing::{debug, warn};

use crate::buffer::SegmentedBuffer;
use crate::capsule::Capsule;
use crate::limits::CodecLimits;
use crate::stream::{HostReader, HostWriter};

/// First word of a capsule envelope.
pub const CAPSULE_TAG: u32 = 0xFFFF_8001;

/// Frame `capsule` into `writer`.
///
/// # Errors
///
/// - `EmptyCapsule` if the capsule holds no buffer.
/// - `EnvelopeTooLarge` if the buffer exceeds `limits.max_envelope_len` or
///   the 32-bit length word.
/// - Any error returned by the writer.
pub fn encode<W>(capsule: &Capsule, writer: &mut W, limits: &CodecLimits) -> CloneResult<()>
where
    W: HostWriter + ?Sized,
{
    let (buffer, version) = capsule.contents()?;
    let len = buffer.len();
    let limit = limits.max_envelope_len.min(CodecLimits::wire_max());
    let declared = u32::try_from(len)
        .ok()
        .filter(|_| len <= limit)
        .ok_or(CloneError::EnvelopeTooLarge { len, limit })?;

    writer.write_word_pair(CAPSULE_TAG, 0)?;
    writer.write_word_pair(declared, version)?;

    let mut segments = buffer.iter();
    while !segments.done() {
        let chunk = segments.data();
        writer.write_bytes(chunk)?;
        segments.advance(chunk.len());
    }

    debug!(len, version, "Encoded capsule envelope");
    Ok(())
}

/// Read one capsule envelope from `reader`.
///
/// # Errors
///
/// - `MalformedEnvelope` if the first pair is not a capsule header.
/// - See [`decode_body`] for the rest.
pub fn decode<R>(reader: &mut R, limits: &CodecLimits) -> CloneResult<Capsule>
where
    R: HostReader + ?Sized,
{
    let (tag, reserved) = reader.read_word_pair()?;
    if tag != CAPSULE_TAG {
        return Err(CloneError::MalformedEnvelope(format!(
            "expected tag {CAPSULE_TAG:#010x}, found {tag:#010x}"
        )));
    }
    if reserved != 0 {
        return Err(CloneError::MalformedEnvelope(format!(
            "reserved word is {reserved:#x}, expected 0"
        )));
    }
    decode_body(reader, limits)
}

/// Read the remainder of an envelope whose tag pair was already consumed.
///
/// Used by engines that dispatch on the tag themselves.
///
/// # Errors
///
/// - `EnvelopeTooLarge` if the declared length exceeds
///   `limits.max_envelope_len`.
/// - `EnvelopeTruncated` if fewer payload bytes remain than declared. The
///   payload is left unread.
pub fn decode_body<R>(reader: &mut R, limits: &CodecLimits) -> CloneResult<Capsule>
where
    R: HostReader + ?Sized,
{
    let (length, version) = reader.read_word_pair()?;
    let len = usize::try_from(length).unwrap_or(usize::MAX);
    if len > limits.max_envelope_len {
        return Err(CloneError::EnvelopeTooLarge {
            len,
            limit: limits.max_envelope_len,
        });
    }
    let available = reader.remaining();
    if available < len {
        warn!(declared = len, available, "Capsule envelope truncated");
        return Err(CloneError::EnvelopeTruncated {
            declared: len,
            available,
        });
    }

    let mut buffer = SegmentedBuffer::with_reserve(len, limits.decode_reserve);
    reader.read_bytes_into(len, &mut buffer)?;

    debug!(len, version, "Decoded capsule envelope");
    Ok(Capsule::from_parts(buffer, version))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{BufferReader, BufferWriter};

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| u8::try_from(i % 253).unwrap()).collect()
    }

    fn capsule_of(bytes: &[u8], version: u32) -> Capsule {
        Capsule::from_parts(SegmentedBuffer::from_slice(bytes, 4096), version)
    }

    fn round_trip(len: usize) {
        let data = pattern(len);
        let capsule = capsule_of(&data, 8);
        let limits = CodecLimits::default();

        let mut stream = SegmentedBuffer::new();
        encode(&capsule, &mut BufferWriter::new(&mut stream), &limits).unwrap();
        assert_eq!(stream.len(), len.saturating_add(16));

        let mut reader = BufferReader::new(&stream);
        let decoded = decode(&mut reader, &limits).unwrap();
        assert_eq!(reader.remaining(), 0);
        assert_eq!(decoded.version(), Some(8));
        assert_eq!(decoded.buffer().unwrap().to_vec(), data);
    }

    #[test]
    fn test_round_trip_sizes() {
        for len in [0, 1, 4095, 4096, 1_000_000] {
            round_trip(len);
        }
    }

    #[test]
    fn test_header_layout() {
        let capsule = capsule_of(b"abc", 5);
        let mut stream = SegmentedBuffer::new();
        encode(&capsule, &mut BufferWriter::new(&mut stream), &CodecLimits::default()).unwrap();

        let bytes = stream.to_vec();
        assert_eq!(&bytes[..4], &CAPSULE_TAG.to_le_bytes());
        assert_eq!(&bytes[4..8], &[0, 0, 0, 0]);
        assert_eq!(&bytes[8..12], &3u32.to_le_bytes());
        assert_eq!(&bytes[12..16], &5u32.to_le_bytes());
        assert_eq!(&bytes[16..], b"abc");
    }

    #[test]
    fn test_encode_empty_capsule_fails() {
        let mut stream = SegmentedBuffer::new();
        let err = encode(
            &Capsule::new(),
            &mut BufferWriter::new(&mut stream),
            &CodecLimits::default(),
        )
        .unwrap_err();
        assert!(matches!(err, CloneError::EmptyCapsule));
        assert!(stream.is_empty());
    }

    #[test]
    fn test_encode_over_limit() {
        let limits = CodecLimits::default().with_max_envelope_len(2);
        let mut stream = SegmentedBuffer::new();
        let err = encode(&capsule_of(b"abc", 1), &mut BufferWriter::new(&mut stream), &limits)
            .unwrap_err();
        assert!(matches!(err, CloneError::EnvelopeTooLarge { len: 3, limit: 2 }));
        assert!(stream.is_empty());
    }

    #[test]
    fn test_truncated_payload() {
        let mut stream = SegmentedBuffer::new();
        let mut writer = BufferWriter::new(&mut stream);
        writer.write_word_pair(CAPSULE_TAG, 0).unwrap();
        writer.write_word_pair(100, 1).unwrap();
        writer.write_bytes(&pattern(60)).unwrap();

        let mut reader = BufferReader::new(&stream);
        let err = decode(&mut reader, &CodecLimits::default()).unwrap_err();
        assert!(matches!(
            err,
            CloneError::EnvelopeTruncated {
                declared: 100,
                available: 60
            }
        ));
        assert_eq!(reader.remaining(), 60);
    }

    #[test]
    fn test_wrong_tag() {
        let mut stream = SegmentedBuffer::new();
        BufferWriter::new(&mut stream).write_word_pair(0x1234, 0).unwrap();
        let err = decode(&mut BufferReader::new(&stream), &CodecLimits::default()).unwrap_err();
        assert!(matches!(err, CloneError::MalformedEnvelope(_)));
    }

    #[test]
    fn test_nonzero_reserved_word() {
        let mut stream = SegmentedBuffer::new();
        BufferWriter::new(&mut stream).write_word_pair(CAPSULE_TAG, 1).unwrap();
        let err = decode(&mut BufferReader::new(&stream), &CodecLimits::default()).unwrap_err();
        assert!(matches!(err, CloneError::MalformedEnvelope(_)));
    }

    #[test]
    fn test_declared_length_over_limit() {
        let mut stream = SegmentedBuffer::new();
        let mut writer = BufferWriter::new(&mut stream);
        writer.write_word_pair(CAPSULE_TAG, 0).unwrap();
        writer.write_word_pair(u32::MAX, 1).unwrap();

        let limits = CodecLimits::default().with_max_envelope_len(1024);
        let err = decode(&mut BufferReader::new(&stream), &limits).unwrap_err();
        assert!(matches!(err, CloneError::EnvelopeTooLarge { limit: 1024, .. }));
    }

    #[test]
    fn test_decode_body_after_external_dispatch() {
        let capsule = capsule_of(b"nested", 2);
        let mut stream = SegmentedBuffer::new();
        let mut writer = BufferWriter::new(&mut stream);
        encode(&capsule, &mut writer, &CodecLimits::default()).unwrap();
        writer.write_bytes(b"tail").unwrap();

        let mut reader = BufferReader::new(&stream);
        let (tag, _) = reader.read_word_pair().unwrap();
        assert_eq!(tag, CAPSULE_TAG);
        let decoded = decode_body(&mut reader, &CodecLimits::default()).unwrap();
        assert_eq!(decoded.buffer().unwrap().to_vec(), b"nested");
        assert_eq!(reader.read_bytes(4).unwrap(), b"tail");
    }

    #[test]
    fn test_decoded_buffer_uses_reserve_segments() {
        let capsule = capsule_of(&pattern(10_000), 1);
        let mut stream = SegmentedBuffer::new();
        encode(&capsule, &mut BufferWriter::new(&mut stream), &CodecLimits::default()).unwrap();

        let limits = CodecLimits {
            decode_reserve: 1000,
            ..CodecLimits::default()
        };
        let decoded = decode(&mut BufferReader::new(&stream), &limits).unwrap();
        let buffer = decoded.buffer().unwrap();
        assert_eq!(buffer.segment_size(), 1000);
        assert_eq!(buffer.segment_count(), 10);
        assert_eq!(buffer, capsule.buffer().unwrap());
    }
}
