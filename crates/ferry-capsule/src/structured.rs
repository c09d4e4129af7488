//! Reference structured-clone engine.
//!
//! Values are written as a stream of word pairs. Every record opens with a
//! tag pair; strings and doubles carry extra data after it. Objects are
//! numbered in the order they are first written, and a repeat visit writes a
//! back-reference to that number, so shared structure and cycles survive a
//! round trip.
//!
//! A [`CapsuleHandle`] found in the graph is framed with the envelope codec
//! and comes back as a fresh handle sharing nothing with the original.

use std::collections::HashMap;
use std::sync::Arc;

use ferry_core::{
    CloneError, CloneResult, CloneScope, ObjectId, ObjectKind, ObjectRef, RealmId, Value,
};
use ferry_realm::{RealmRegistry, SecurityLayer};
use tracing::{debug, trace};

use crate::buffer::SegmentedBuffer;
use crate::engine::{CloneEngine, FORMAT_VERSION};
use crate::envelope::{self, CAPSULE_TAG};
use crate::handle::CapsuleHandle;
use crate::limits::CodecLimits;
use crate::stream::{BufferReader, BufferWriter, HostReader, HostWriter};

const TAG_HEADER: u32 = 0xFFF1_0000;
const TAG_NULL: u32 = 0xFFFF_0000;
const TAG_UNDEFINED: u32 = 0xFFFF_0001;
const TAG_BOOLEAN: u32 = 0xFFFF_0002;
const TAG_INT32: u32 = 0xFFFF_0003;
const TAG_STRING: u32 = 0xFFFF_0004;
const TAG_ARRAY: u32 = 0xFFFF_0007;
const TAG_OBJECT: u32 = 0xFFFF_0008;
const TAG_BACK_REFERENCE: u32 = 0xFFFF_0009;
const TAG_DOUBLE: u32 = 0xFFFF_000A;
const TAG_END_OF_KEYS: u32 = 0xFFFF_0013;

/// Deepest object nesting accepted in either direction.
pub const MAX_DEPTH: usize = 512;

/// Engine over a [`RealmRegistry`] heap.
#[derive(Debug, Clone)]
pub struct StructuredCloneEngine {
    registry: Arc<RealmRegistry>,
    limits: CodecLimits,
}

impl StructuredCloneEngine {
    /// Create an engine reading and allocating objects in `registry`.
    #[must_use]
    pub fn new(registry: Arc<RealmRegistry>) -> Self {
        Self {
            registry,
            limits: CodecLimits::default(),
        }
    }

    /// Use `limits` for produced buffers and nested envelopes.
    #[must_use]
    pub fn with_limits(mut self, limits: CodecLimits) -> Self {
        self.limits = limits;
        self
    }

    /// The registry this engine works against.
    #[must_use]
    pub fn registry(&self) -> &Arc<RealmRegistry> {
        &self.registry
    }

    /// The limits in use.
    #[must_use]
    pub fn limits(&self) -> &CodecLimits {
        &self.limits
    }
}

impl CloneEngine for StructuredCloneEngine {
    fn version(&self) -> u32 {
        FORMAT_VERSION
    }

    fn serialize(&self, value: &Value, realm: RealmId) -> CloneResult<SegmentedBuffer> {
        let mut out = SegmentedBuffer::with_segment_size(self.limits.segment_size);
        let objects = {
            let mut serializer = Serializer {
                registry: &self.registry,
                limits: &self.limits,
                writer: BufferWriter::new(&mut out),
                memory: HashMap::new(),
            };
            serializer
                .writer
                .write_word_pair(TAG_HEADER, CloneScope::DifferentProcess.as_u32())?;
            serializer.write_value(value, 0)?;
            serializer.memory.len()
        };

        debug!(%realm, len = out.len(), objects, "Serialized value");
        Ok(out)
    }

    fn deserialize(
        &self,
        data: &SegmentedBuffer,
        version: u32,
        realm: RealmId,
    ) -> CloneResult<Value> {
        if version == 0 || version > FORMAT_VERSION {
            return Err(CloneError::engine(format!(
                "unsupported format version {version} (engine writes {FORMAT_VERSION})"
            )));
        }

        let mut deserializer = Deserializer {
            registry: &self.registry,
            limits: &self.limits,
            realm,
            reader: BufferReader::new(data),
            memory: Vec::new(),
        };
        let value = match deserializer.read_all() {
            Ok(value) => value,
            Err(e) => {
                let released = self.registry.release(&deserializer.memory);
                debug!(%realm, released, error = %e, "Rolled back partial value");
                return Err(e);
            },
        };

        debug!(%realm, len = data.len(), objects = deserializer.memory.len(), "Deserialized value");
        Ok(value)
    }
}

struct Serializer<'a> {
    registry: &'a RealmRegistry,
    limits: &'a CodecLimits,
    writer: BufferWriter<'a>,
    memory: HashMap<ObjectId, u32>,
}

impl Serializer<'_> {
    fn write_value(&mut self, value: &Value, depth: usize) -> CloneResult<()> {
        match value {
            Value::Undefined => self.writer.write_word_pair(TAG_UNDEFINED, 0),
            Value::Null => self.writer.write_word_pair(TAG_NULL, 0),
            Value::Bool(b) => self.writer.write_word_pair(TAG_BOOLEAN, u32::from(*b)),
            Value::Number(n) => self.write_number(*n),
            Value::String(s) => self.write_string(s),
            Value::Object(obj) => self.write_object(obj, depth),
        }
    }

    fn write_number(&mut self, n: f64) -> CloneResult<()> {
        if let Some(i) = exact_int32(n) {
            return self.writer.write_word_pair(TAG_INT32, i.cast_unsigned());
        }
        let [b0, b1, b2, b3, b4, b5, b6, b7] = n.to_bits().to_le_bytes();
        self.writer.write_word_pair(TAG_DOUBLE, 0)?;
        self.writer.write_word_pair(
            u32::from_le_bytes([b0, b1, b2, b3]),
            u32::from_le_bytes([b4, b5, b6, b7]),
        )
    }

    fn write_string(&mut self, s: &str) -> CloneResult<()> {
        let len = u32::try_from(s.len())
            .map_err(|_| CloneError::engine(format!("string of {} bytes is too long", s.len())))?;
        self.writer.write_word_pair(TAG_STRING, len)?;
        self.writer.write_bytes(s.as_bytes())
    }

    fn write_object(&mut self, obj: &ObjectRef, depth: usize) -> CloneResult<()> {
        let obj = self
            .registry
            .unwrap_object(obj)
            .map_err(|e| CloneError::engine(format!("cannot clone {obj}: {e}")))?;
        if let Some(&index) = self.memory.get(&obj.id) {
            return self.writer.write_word_pair(TAG_BACK_REFERENCE, index);
        }
        let depth = nested(depth)?;
        let kind = self
            .registry
            .object(&obj)
            .map_err(|e| CloneError::engine(e.to_string()))?;

        match kind {
            ObjectKind::Plain(props) => {
                self.remember(obj.id)?;
                self.writer.write_word_pair(TAG_OBJECT, 0)?;
                for (key, value) in &props {
                    self.write_string(key)?;
                    self.write_value(value, depth)?;
                }
                self.writer.write_word_pair(TAG_END_OF_KEYS, 0)
            },
            ObjectKind::Array(items) => {
                let len = u32::try_from(items.len())
                    .map_err(|_| CloneError::engine("array is too long"))?;
                self.remember(obj.id)?;
                self.writer.write_word_pair(TAG_ARRAY, len)?;
                for item in &items {
                    self.write_value(item, depth)?;
                }
                Ok(())
            },
            ObjectKind::Function { name } => Err(CloneError::engine(format!(
                "function {name} could not be cloned"
            ))),
            ObjectKind::Host(host) => {
                let Some(handle) = host.as_any().downcast_ref::<CapsuleHandle>() else {
                    return Err(CloneError::engine(format!(
                        "{} object could not be cloned",
                        host.class_name()
                    )));
                };
                self.remember(obj.id)?;
                trace!(object = %obj.id, "Framing nested capsule");
                envelope::encode(handle.capsule(), &mut self.writer, self.limits)
                    .map_err(|e| CloneError::engine(format!("nested capsule: {e}")))
            },
        }
    }

    fn remember(&mut self, id: ObjectId) -> CloneResult<()> {
        let index = u32::try_from(self.memory.len())
            .map_err(|_| CloneError::engine("too many objects"))?;
        self.memory.insert(id, index);
        Ok(())
    }
}

struct Deserializer<'a> {
    registry: &'a RealmRegistry,
    limits: &'a CodecLimits,
    realm: RealmId,
    reader: BufferReader<'a>,
    memory: Vec<ObjectRef>,
}

impl Deserializer<'_> {
    /// Header, one value, and nothing after it. Every object allocated so far
    /// is in `memory` whether this succeeds or not.
    fn read_all(&mut self) -> CloneResult<Value> {
        self.read_header()?;
        let value = self.read_value(0)?;
        let trailing = self.reader.remaining();
        if trailing != 0 {
            return Err(CloneError::engine(format!(
                "{trailing} trailing bytes after value"
            )));
        }
        Ok(value)
    }

    fn read_header(&mut self) -> CloneResult<()> {
        let (tag, scope) = self.read_pair()?;
        if tag != TAG_HEADER {
            return Err(CloneError::engine(format!("missing header, found {tag:#010x}")));
        }
        CloneScope::from_u32(scope)
            .ok_or_else(|| CloneError::engine(format!("unknown clone scope {scope}")))?;
        Ok(())
    }

    fn read_value(&mut self, depth: usize) -> CloneResult<Value> {
        let (tag, data) = self.read_pair()?;
        match tag {
            TAG_UNDEFINED => Ok(Value::Undefined),
            TAG_NULL => Ok(Value::Null),
            TAG_BOOLEAN => Ok(Value::Bool(data != 0)),
            TAG_INT32 => Ok(Value::Number(f64::from(data.cast_signed()))),
            TAG_DOUBLE => {
                let (lo, hi) = self.read_pair()?;
                let [b0, b1, b2, b3] = lo.to_le_bytes();
                let [b4, b5, b6, b7] = hi.to_le_bytes();
                let bits = u64::from_le_bytes([b0, b1, b2, b3, b4, b5, b6, b7]);
                Ok(Value::Number(f64::from_bits(bits)))
            },
            TAG_STRING => self.read_string(data).map(Value::String),
            TAG_OBJECT => self.read_plain(depth),
            TAG_ARRAY => self.read_array(data, depth),
            TAG_BACK_REFERENCE => usize::try_from(data)
                .ok()
                .and_then(|i| self.memory.get(i))
                .map(|obj| Value::Object(*obj))
                .ok_or_else(|| CloneError::engine(format!("dangling back-reference {data}"))),
            CAPSULE_TAG => self.read_capsule(data),
            other => Err(CloneError::engine(format!("unknown tag {other:#010x}"))),
        }
    }

    fn read_plain(&mut self, depth: usize) -> CloneResult<Value> {
        let depth = nested(depth)?;
        let obj = self.allocate(ObjectKind::empty())?;
        let mut props = Vec::new();
        loop {
            let (tag, len) = self.read_pair()?;
            if tag == TAG_END_OF_KEYS {
                break;
            }
            if tag != TAG_STRING {
                return Err(CloneError::engine(format!(
                    "expected property key, found {tag:#010x}"
                )));
            }
            let key = self.read_string(len)?;
            let value = self.read_value(depth)?;
            props.push((key, value));
        }
        self.define(&obj, ObjectKind::Plain(props))?;
        Ok(Value::Object(obj))
    }

    fn read_array(&mut self, len: u32, depth: usize) -> CloneResult<Value> {
        let depth = nested(depth)?;
        let obj = self.allocate(ObjectKind::Array(Vec::new()))?;
        let mut items = Vec::new();
        for _ in 0..len {
            items.push(self.read_value(depth)?);
        }
        self.define(&obj, ObjectKind::Array(items))?;
        Ok(Value::Object(obj))
    }

    fn read_capsule(&mut self, reserved: u32) -> CloneResult<Value> {
        if reserved != 0 {
            return Err(CloneError::engine("malformed nested capsule header"));
        }
        let capsule = envelope::decode_body(&mut self.reader, self.limits)
            .map_err(|e| CloneError::engine(format!("nested capsule: {e}")))?;
        let obj = self.allocate(ObjectKind::Host(Arc::new(CapsuleHandle::from_capsule(capsule))))?;
        Ok(Value::Object(obj))
    }

    fn read_string(&mut self, len: u32) -> CloneResult<String> {
        let len = usize::try_from(len).map_err(|_| CloneError::engine("string too long"))?;
        let bytes = self.reader.read_bytes(len).map_err(malformed)?;
        String::from_utf8(bytes).map_err(|e| CloneError::engine(format!("invalid string: {e}")))
    }

    fn read_pair(&mut self) -> CloneResult<(u32, u32)> {
        self.reader.read_word_pair().map_err(malformed)
    }

    fn allocate(&mut self, kind: ObjectKind) -> CloneResult<ObjectRef> {
        let obj = self
            .registry
            .allocate(self.realm, kind)
            .map_err(|e| CloneError::engine(e.to_string()))?;
        self.memory.push(obj);
        Ok(obj)
    }

    fn define(&self, obj: &ObjectRef, kind: ObjectKind) -> CloneResult<()> {
        self.registry
            .define(obj, kind)
            .map_err(|e| CloneError::engine(e.to_string()))
    }
}

fn nested(depth: usize) -> CloneResult<usize> {
    depth
        .checked_add(1)
        .filter(|d| *d <= MAX_DEPTH)
        .ok_or_else(|| CloneError::engine(format!("object graph deeper than {MAX_DEPTH}")))
}

/// `n` as an `i32`, if that loses nothing. Negative zero stays a double.
#[allow(clippy::cast_possible_truncation)]
fn exact_int32(n: f64) -> Option<i32> {
    let i = n as i32;
    (f64::from(i).to_bits() == n.to_bits()).then_some(i)
}

fn malformed(e: CloneError) -> CloneError {
    CloneError::engine(format!("malformed payload: {e}"))
}
