//! Variant marshaling and the extended-dispatch adapter

mod common;

use std::sync::Arc;

use common::{Expando, ScriptedDispatch};
use raya_interop::variant::{from_variant, to_variant, DispatchAdapter, VariantBlock};
use raya_interop_sdk::variant::{DISPATCH_PROPERTYPUT, DISPATCH_PROPERTYPUTREF};
use raya_interop_sdk::{plain_args, Arg, ByRefSlot, Decimal, HResult, InteropError, TypeHandle, Value, Variant};

// ============================================================================
// Marshaling
// ============================================================================

#[test]
fn test_primitives_cross_unchanged() {
    let values = [
        Value::Void,
        Value::Null,
        Value::Missing,
        Value::Bool(true),
        Value::Bool(false),
        Value::I8(-8),
        Value::U8(8),
        Value::I16(-16),
        Value::U16(16),
        Value::I32(-32),
        Value::U32(32),
        Value::I64(-64),
        Value::U64(u64::MAX),
        Value::F32(0.5),
        Value::F64(-2.25),
        Value::Decimal(Decimal::new(1_234_567, 3).unwrap()),
        Value::from("héllo wörld"),
        Value::from(""),
    ];
    for value in values {
        let mut variant = Variant::empty();
        to_variant(&value, &mut variant).unwrap();
        let back = from_variant(&variant).unwrap();
        // SAFETY: written by to_variant
        unsafe { variant.clear() };
        assert_eq!(back, value);
    }
}

#[test]
fn test_object_keeps_identity() {
    let object = Expando::new().into_value();
    let mut variant = Variant::empty();
    to_variant(&object, &mut variant).unwrap();
    assert_eq!(from_variant(&variant).unwrap(), object);
    unsafe { variant.clear() };
    assert_eq!(Arc::strong_count(object.as_object().unwrap()), 1);
}

#[test]
fn test_failed_block_releases_marshaled_slots() {
    let object = Expando::new().into_value();
    let strong = || Arc::strong_count(object.as_object().unwrap());
    assert_eq!(strong(), 1);

    let result = VariantBlock::new(&[object.clone(), Value::from("text"), Value::Type(TypeHandle::I32)]);
    assert!(matches!(result, Err(InteropError::ArgumentError { .. })));
    assert_eq!(strong(), 1);

    let block = VariantBlock::new(&[object.clone(), Value::I32(1)]).unwrap();
    assert_eq!(strong(), 2);
    drop(block);
    assert_eq!(strong(), 1);
}

// ============================================================================
// Adapter
// ============================================================================

fn sample() -> ScriptedDispatch {
    ScriptedDispatch::new()
        .with_member("name", Value::from("widget"))
        .with_member("0", Value::I32(10))
        .with_member("1", Value::I32(11))
        .with_member("double", Value::Void)
        .with_member("broken", Value::Void)
}

#[test]
fn test_property_get_set_and_ensure() {
    let target = sample();
    let adapter = DispatchAdapter::new(&target);

    assert_eq!(adapter.get_property("name", &mut []).unwrap(), Value::from("widget"));
    adapter.set_property("name", &[Value::from("gadget")]).unwrap();
    assert_eq!(adapter.get_property("name", &mut []).unwrap(), Value::from("gadget"));

    adapter.set_property("fresh", &[Value::Bool(true)]).unwrap();
    assert_eq!(adapter.get_property("fresh", &mut []).unwrap(), Value::Bool(true));

    assert!(matches!(
        adapter.get_property("absent", &mut []),
        Err(InteropError::MissingMember { .. })
    ));
    assert!(adapter.set_property("name", &[]).is_err());
}

#[test]
fn test_third_put_convention() {
    let target = ScriptedDispatch::rejecting(&[DISPATCH_PROPERTYPUT, DISPATCH_PROPERTYPUT | DISPATCH_PROPERTYPUTREF])
        .with_member("sink", Value::Null);
    let adapter = DispatchAdapter::new(&target);

    adapter.set_property("sink", &[Value::I64(7)]).unwrap();
    assert_eq!(
        target.put_attempts(),
        vec![
            DISPATCH_PROPERTYPUT,
            DISPATCH_PROPERTYPUT | DISPATCH_PROPERTYPUTREF,
            DISPATCH_PROPERTYPUTREF
        ]
    );
    assert_eq!(adapter.get_property("sink", &mut []).unwrap(), Value::I64(7));
}

#[test]
fn test_indices_are_named_members() {
    let target = sample();
    let adapter = DispatchAdapter::new(&target);

    assert_eq!(adapter.get_index(1).unwrap(), Value::I32(11));
    adapter.set_index(0, Value::I32(99)).unwrap();
    assert_eq!(adapter.get_index(0).unwrap(), Value::I32(99));
    assert_eq!(adapter.indexed_members().unwrap(), vec![0, 1]);

    assert!(adapter.delete_index(1).unwrap());
    assert!(!adapter.delete_index(1).unwrap());
    assert_eq!(adapter.indexed_members().unwrap(), vec![0]);
}

#[test]
fn test_delete_property() {
    let target = sample();
    let adapter = DispatchAdapter::new(&target);

    assert!(adapter.delete_property("name").unwrap());
    assert!(!adapter.delete_property("name").unwrap());
    assert!(!adapter.delete_property("never").unwrap());
}

#[test]
fn test_invocation_kinds() {
    let target = sample();
    let adapter = DispatchAdapter::new(&target);

    let mut args = plain_args([1, 2, 3]);
    assert_eq!(adapter.invoke(false, &mut args).unwrap(), Value::I32(3));
    assert_eq!(adapter.invoke(true, &mut []).unwrap(), Value::from("constructed"));

    let slot = ByRefSlot::new(8);
    let mut args = vec![Arg::ByRef(slot.clone())];
    adapter.invoke_method("double", &mut args).unwrap();
    assert_eq!(slot.get(), Value::I32(16));

    match adapter.invoke_method("broken", &mut []) {
        Err(InteropError::NativeCall { code, .. }) => assert_eq!(code, HResult::DISP_E_EXCEPTION.0),
        other => panic!("expected native failure, got {:?}", other),
    }
}

#[test]
fn test_enumeration_is_exclusive_and_restartable() {
    let target = sample();
    let adapter = DispatchAdapter::new(&target);

    let mut names = adapter.enumerate_member_names().unwrap();
    assert_eq!(names.next().unwrap().unwrap(), "name");
    assert!(matches!(adapter.enumerate_member_names(), Err(InteropError::EnumerationBusy)));
    drop(names);

    let all: Vec<String> = adapter
        .enumerate_member_names()
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(all, vec!["name", "0", "1", "double", "broken"]);
    assert_eq!(adapter.named_members().unwrap(), vec!["name", "double", "broken"]);

    // another target is unaffected by an open enumeration here
    let other = sample();
    let _open = adapter.enumerate_member_names().unwrap();
    assert!(DispatchAdapter::new(&other).enumerate_member_names().is_ok());
}
