//! End-to-end capsule lifecycle: construct, frame, decode, materialize.

use std::sync::Arc;

use ferry_capsule::{
    BufferReader, BufferWriter, Capsule, CapsuleHandle, CloneEngine, CodecLimits, HostReader,
    SegmentedBuffer, envelope,
};
use ferry_core::{CloneError, ObjectKind, Value};
use ferry_realm::SecurityLayer;
use ferry_test::{EngineCall, MockEngine, TestWorld, init_test_logging};

#[test]
fn answer_survives_envelope_and_stays_out_of_reach_of_foreign_realm() {
    init_test_logging();
    let world = TestWorld::new();
    let layer = world.layer();
    let limits = *world.engine.limits();

    let handle =
        CapsuleHandle::construct(layer, &world.engine, Value::from(42), Some(world.main)).unwrap();

    let mut stream = SegmentedBuffer::new();
    envelope::encode(handle.capsule(), &mut BufferWriter::new(&mut stream), &limits).unwrap();
    let decoded = CapsuleHandle::from_capsule(
        envelope::decode(&mut BufferReader::new(&stream), &limits).unwrap(),
    );

    let value = decoded.deserialize(layer, &world.engine, world.main).unwrap();
    assert_eq!(value, Value::from(42));

    let err = decoded
        .deserialize(layer, &world.engine, world.foreign)
        .unwrap_err();
    assert!(err.is_access_denied());
    assert_eq!(world.registry.current_realm(), world.main);
}

#[test]
fn object_graph_round_trips_into_sibling_realm() {
    let world = TestWorld::new();
    let layer = world.layer();
    let graph = world.graph_in(world.main);

    let handle =
        CapsuleHandle::construct(layer, &world.engine, Value::Object(graph), None).unwrap();
    let value = handle.deserialize(layer, &world.engine, world.sibling).unwrap();

    let copy = *value.as_object().unwrap();
    assert_eq!(copy.home, world.sibling);
    assert_eq!(copy.seen_from, world.main);
    assert_ne!(copy.id, graph.id);
    assert_eq!(
        world.registry.describe(&value),
        world.registry.describe(&Value::Object(graph))
    );
    // The caller can see through the wrapper it was handed.
    assert!(layer.unwrap_object(&copy).is_ok());
}

#[test]
fn cyclic_graph_round_trips() {
    let world = TestWorld::new();
    let layer = world.layer();
    let node = world.registry.allocate(world.main, ObjectKind::empty()).unwrap();
    let list = world
        .registry
        .allocate(
            world.main,
            ObjectKind::Array(vec![Value::Object(node), Value::Object(node)]),
        )
        .unwrap();
    world
        .registry
        .define(
            &node,
            ObjectKind::plain([("parent", Value::Object(list)), ("label", Value::from("n"))]),
        )
        .unwrap();

    let handle =
        CapsuleHandle::construct(layer, &world.engine, Value::Object(list), None).unwrap();
    let value = handle.deserialize(layer, &world.engine, world.main).unwrap();
    let copy = *value.as_object().unwrap();

    let ObjectKind::Array(items) = world.registry.object(&copy).unwrap() else {
        panic!("expected array");
    };
    assert_eq!(items.len(), 2);
    assert_eq!(items[0], items[1]);
    let child = world.registry.object(items[0].as_object().unwrap()).unwrap();
    assert_eq!(child.get("parent"), Some(&Value::Object(copy)));
    assert_eq!(
        world.registry.describe(&value),
        serde_json::json!([
            { "parent": "[Circular]", "label": "n" },
            { "parent": "[Circular]", "label": "n" }
        ])
    );
}

#[test]
fn capsule_reads_repeatedly_without_consuming() {
    let world = TestWorld::new();
    let layer = world.layer();
    let handle =
        CapsuleHandle::construct(layer, &world.engine, Value::from("again"), None).unwrap();

    for _ in 0..3 {
        let value = handle.deserialize(layer, &world.engine, world.main).unwrap();
        assert_eq!(value, Value::from("again"));
    }
    assert!(handle.capsule().is_written());
}

#[test]
fn second_write_is_refused_and_first_buffer_kept() {
    let world = TestWorld::new();
    let layer = world.layer();
    let capsule = Capsule::new();

    capsule
        .write(layer, &world.engine, &Value::from(1), world.main)
        .unwrap();
    let before = capsule.fingerprint().unwrap();

    let err = capsule
        .write(layer, &world.engine, &Value::from(2), world.main)
        .unwrap_err();
    assert!(matches!(err, CloneError::AlreadyWritten));
    assert_eq!(capsule.fingerprint().unwrap(), before);
    assert_eq!(
        capsule.read(layer, &world.engine, world.main).unwrap(),
        Value::from(1)
    );
}

#[test]
fn write_and_read_run_inside_the_named_realm() {
    let world = TestWorld::new();
    let layer = world.layer();
    let engine = MockEngine::new()
        .with_version(6)
        .with_observer(Arc::clone(&world.registry));

    let handle =
        CapsuleHandle::construct(layer, &engine, Value::from(true), Some(world.sibling)).unwrap();
    assert_eq!(handle.capsule().version(), Some(6));
    handle.deserialize(layer, &engine, world.sibling).unwrap();

    assert_eq!(
        engine.calls(),
        vec![
            EngineCall::Serialize {
                realm: world.sibling,
                ambient: Some(world.sibling),
            },
            EngineCall::Deserialize {
                realm: world.sibling,
                version: 6,
                len: 4,
                ambient: Some(world.sibling),
            },
        ]
    );
    assert_eq!(world.registry.current_realm(), world.main);
}

#[test]
fn function_cannot_be_captured() {
    let world = TestWorld::new();
    let layer = world.layer();
    let f = world
        .registry
        .allocate(world.main, ObjectKind::Function { name: "run".into() })
        .unwrap();

    let err = CapsuleHandle::construct(layer, &world.engine, Value::Object(f), None).unwrap_err();
    assert!(matches!(err, CloneError::EngineError(_)));
    assert_eq!(world.registry.current_realm(), world.main);
}

#[test]
fn nested_capsule_travels_inside_a_larger_graph() {
    let world = TestWorld::new();
    let layer = world.layer();
    let inner = CapsuleHandle::construct(
        layer,
        &world.engine,
        Value::Object(world.graph_in(world.main)),
        None,
    )
    .unwrap();
    let exposed = inner.expose(&world.registry, world.main).unwrap();
    let outer_graph = world
        .registry
        .allocate(
            world.main,
            ObjectKind::plain([("note", Value::from("outer")), ("inner", Value::Object(exposed))]),
        )
        .unwrap();

    let outer =
        CapsuleHandle::construct(layer, &world.engine, Value::Object(outer_graph), None).unwrap();
    let value = outer.deserialize(layer, &world.engine, world.sibling).unwrap();

    let outer_copy = layer.unwrap_object(value.as_object().unwrap()).unwrap();
    let held = world
        .registry
        .object(&outer_copy)
        .unwrap()
        .get("inner")
        .and_then(Value::as_object)
        .copied()
        .unwrap();
    let inner_copy = CapsuleHandle::from_object(&world.registry, &held).unwrap();
    assert!(!inner_copy.ptr_eq(&inner));
    assert_eq!(inner_copy.capsule().buffer(), inner.capsule().buffer());

    let restored = inner_copy
        .deserialize(layer, &world.engine, world.main)
        .unwrap();
    assert_eq!(
        world.registry.describe(&restored),
        serde_json::json!({ "answer": 42.0, "name": "ferry", "tags": ["a", "b"] })
    );
}

#[test]
fn handle_is_shared_not_copied() {
    let world = TestWorld::new();
    let layer = world.layer();
    let handle = CapsuleHandle::construct(layer, &world.engine, Value::Null, None).unwrap();
    let exposed = handle.expose(&world.registry, world.main).unwrap();

    assert_eq!(handle.owners(), 2);
    let again = CapsuleHandle::from_object(&world.registry, &exposed).unwrap();
    assert!(again.ptr_eq(&handle));
    assert_eq!(handle.owners(), 3);
}

#[test]
fn engine_version_travels_through_envelope() {
    let world = TestWorld::new();
    let layer = world.layer();
    let engine = MockEngine::new().with_version(3);
    let capsule = Capsule::new();
    capsule.write(layer, &engine, &Value::from(9), world.main).unwrap();

    let limits = CodecLimits::default();
    let mut stream = SegmentedBuffer::new();
    envelope::encode(&capsule, &mut BufferWriter::new(&mut stream), &limits).unwrap();
    let mut reader = BufferReader::new(&stream);
    let decoded = envelope::decode(&mut reader, &limits).unwrap();

    assert_eq!(reader.remaining(), 0);
    assert_eq!(decoded.version(), Some(engine.version()));
    assert_eq!(
        decoded.read(layer, &engine, world.main).unwrap(),
        Value::from(9)
    );
}
