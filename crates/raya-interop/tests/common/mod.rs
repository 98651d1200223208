//! Shared fixtures for integration tests
#![allow(dead_code)]

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use raya_interop::variant::{from_variant, to_variant};
use raya_interop::{host_ref, HostObject, InteropBridge, MemberBuilder, ParameterInfo, TypeBuilder, TypeRegistry};
use raya_interop_sdk::variant::{
    DISPATCH_CONSTRUCT, DISPATCH_METHOD, DISPATCH_PROPERTYGET, DISPATCH_PROPERTYPUT, DISPATCH_PROPERTYPUTREF,
    DISPID_STARTENUM, DISPID_VALUE, FDEX_NAME_ENSURE,
};
use raya_interop_sdk::{
    CallShape, DispId, DispParams, DispatchEx, DynamicBinding, DynamicObject, DynamicOperation, EngineHooks, HResult,
    InteropError, ScriptMemberFlags, ScriptObject, TypeHandle, Value, Variant,
};

// ============================================================================
// Host types
// ============================================================================

/// State behind `Calculator` instances
pub struct Calculator {
    pub total: Mutex<i64>,
}

/// Registry with a `Calculator` class:
///
/// - `Method(int a, params int[] rest)` returns `rest`
/// - `Sum(params int[] values)` returns `values`
/// - `Bump(params int[] values)` increments every element in place
/// - `Double(ref int x)` doubles `x`
/// - `Pick(int)`, `Pick(double)`, `Pick(string)` name the chosen overload
/// - `Total` read/write property
pub struct Fixture {
    pub registry: Arc<TypeRegistry>,
    pub calculator: TypeHandle,
    pub int_array: TypeHandle,
}

impl Fixture {
    pub fn new() -> Self {
        let registry = Arc::new(TypeRegistry::new());
        let int_array = registry.array_of(TypeHandle::I32);

        let pick = |param: TypeHandle, label: &'static str| {
            MemberBuilder::method("Pick", TypeHandle::STRING, move |_, _| Ok(Value::from(label)))
                .with_param(ParameterInfo::new("value", param))
        };

        let calculator = registry
            .register(
                TypeBuilder::class("Calculator")
                    .method(
                        "Method",
                        int_array,
                        vec![
                            ParameterInfo::new("a", TypeHandle::I32),
                            ParameterInfo::new("rest", int_array).params(),
                        ],
                        |_, args| Ok(args[1].clone()),
                    )
                    .method(
                        "Sum",
                        int_array,
                        vec![ParameterInfo::new("values", int_array).params()],
                        |_, args| Ok(args[0].clone()),
                    )
                    .method(
                        "Bump",
                        TypeHandle::VOID,
                        vec![ParameterInfo::new("values", int_array).params()],
                        |_, args| {
                            let values = args[0]
                                .as_array()
                                .ok_or_else(|| InteropError::Runtime("expected array".into()))?;
                            for i in 0..values.len() {
                                let current = values.get(i).and_then(|v| v.as_i32()).unwrap_or(0);
                                values.set(i, Value::I32(current + 1));
                            }
                            Ok(Value::Void)
                        },
                    )
                    .method(
                        "Double",
                        TypeHandle::VOID,
                        vec![ParameterInfo::new("x", TypeHandle::I32).by_ref()],
                        |_, args| {
                            let x = args[0].as_i32().unwrap_or(0);
                            args[0] = Value::I32(x * 2);
                            Ok(Value::Void)
                        },
                    )
                    .member(pick(TypeHandle::I32, "int"))
                    .member(pick(TypeHandle::F64, "double"))
                    .member(pick(TypeHandle::STRING, "string"))
                    .member(
                        MemberBuilder::property("Total", TypeHandle::I64)
                            .getter(|target, _| Ok(Value::I64(*host_ref::<Calculator>(target)?.total.lock())))
                            .setter(|target, args| {
                                let value = args[0].as_i128().unwrap_or(0) as i64;
                                *host_ref::<Calculator>(target)?.total.lock() = value;
                                Ok(Value::Void)
                            }),
                    )
                    .member(MemberBuilder::constructor(|target, _| {
                        let ty = match target {
                            Value::Type(ty) => *ty,
                            _ => return Err(InteropError::Runtime("constructor without type".into())),
                        };
                        Ok(HostObject::value(ty, Calculator { total: Mutex::new(0) }))
                    })),
            )
            .expect("register Calculator");

        Self {
            registry,
            calculator,
            int_array,
        }
    }

    pub fn bridge(&self) -> InteropBridge {
        InteropBridge::new(self.registry.clone())
    }

    pub fn calculator(&self) -> Value {
        HostObject::value(self.calculator, Calculator { total: Mutex::new(0) })
    }
}

pub fn ints(values: &[i32]) -> Vec<Value> {
    values.iter().map(|v| Value::I32(*v)).collect()
}

pub fn array_items(value: &Value) -> Vec<Value> {
    value.as_array().map(|a| a.to_vec()).unwrap_or_default()
}

// ============================================================================
// Dynamic target
// ============================================================================

/// Property bag that binds its own members.
///
/// Methods: `sum(..)` adds its arguments, `increment(..)` adds one to every
/// argument in place, `explode()` fails with a host error.
#[derive(Clone, Default)]
pub struct Expando {
    members: Arc<Mutex<BTreeMap<String, Value>>>,
}

impl Expando {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, name: &str, value: Value) -> Self {
        self.members.lock().insert(name.to_string(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.members.lock().get(name).cloned()
    }

    pub fn into_value(self) -> Value {
        Value::object(self)
    }
}

impl ScriptObject for Expando {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_dynamic(&self) -> Option<&dyn DynamicObject> {
        Some(self)
    }
}

fn index_key(args: &[Value]) -> String {
    args.first()
        .and_then(|v| v.as_i128())
        .map(|i| i.to_string())
        .unwrap_or_default()
}

impl DynamicObject for Expando {
    fn bind(&self, operation: &DynamicOperation, _shape: &CallShape) -> DynamicBinding {
        let members = self.members.clone();
        match operation {
            DynamicOperation::GetMember { name } => {
                if !members.lock().contains_key(name) {
                    return DynamicBinding::NotHandled;
                }
                let name = name.clone();
                DynamicBinding::bound(move |_: &mut [Value]| {
                    members.lock().get(&name).cloned().ok_or_else(|| InteropError::missing(&name))
                })
            }
            DynamicOperation::SetMember { name } => {
                let name = name.clone();
                DynamicBinding::bound(move |args: &mut [Value]| {
                    let value = args.last().cloned().unwrap_or(Value::Null);
                    members.lock().insert(name.clone(), value);
                    Ok(Value::Void)
                })
            }
            DynamicOperation::DeleteMember { name } => {
                let name = name.clone();
                DynamicBinding::bound(move |_: &mut [Value]| Ok(Value::Bool(members.lock().remove(&name).is_some())))
            }
            DynamicOperation::InvokeMember { name } if name == "sum" => DynamicBinding::bound(|args: &mut [Value]| {
                Ok(Value::I64(args.iter().filter_map(Value::as_i128).sum::<i128>() as i64))
            }),
            DynamicOperation::InvokeMember { name } if name == "increment" => {
                DynamicBinding::bound(|args: &mut [Value]| {
                    for arg in args.iter_mut() {
                        if let Some(i) = arg.as_i32() {
                            *arg = Value::I32(i + 1);
                        }
                    }
                    Ok(Value::Void)
                })
            }
            DynamicOperation::InvokeMember { name } if name == "explode" => {
                DynamicBinding::bound(|_: &mut [Value]| Err(InteropError::Runtime("boom".into())))
            }
            DynamicOperation::GetIndex => DynamicBinding::bound(move |args: &mut [Value]| {
                let key = index_key(args);
                members.lock().get(&key).cloned().ok_or_else(|| InteropError::missing(key))
            }),
            DynamicOperation::SetIndex => DynamicBinding::bound(move |args: &mut [Value]| {
                let key = index_key(args);
                let value = args.last().cloned().unwrap_or(Value::Null);
                members.lock().insert(key, value);
                Ok(Value::Void)
            }),
            DynamicOperation::DeleteIndex => DynamicBinding::bound(move |args: &mut [Value]| {
                Ok(Value::Bool(members.lock().remove(&index_key(args)).is_some()))
            }),
            _ => DynamicBinding::NotHandled,
        }
    }

    fn dynamic_member_names(&self) -> Vec<String> {
        self.members.lock().keys().cloned().collect()
    }
}

// ============================================================================
// Native dispatch target
// ============================================================================

/// In-memory extended-dispatch object.
///
/// Member `n` has dispatch id `n + 1`. Property puts with a convention in
/// `rejected_puts` answer `DISP_E_MEMBERNOTFOUND`. Method `double` doubles
/// its by-reference argument; method `broken` fails with
/// `DISP_E_EXCEPTION`. Calling the object itself returns its argument
/// count; constructing it returns `"constructed"`.
pub struct ScriptedDispatch {
    members: Mutex<Vec<Option<(String, Value)>>>,
    rejected_puts: Vec<u16>,
    put_attempts: Mutex<Vec<u16>>,
}

impl ScriptedDispatch {
    pub fn new() -> Self {
        Self::rejecting(&[])
    }

    pub fn rejecting(conventions: &[u16]) -> Self {
        Self {
            members: Mutex::new(Vec::new()),
            rejected_puts: conventions.to_vec(),
            put_attempts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_member(self, name: &str, value: Value) -> Self {
        self.members.lock().push(Some((name.to_string(), value)));
        self
    }

    pub fn put_attempts(&self) -> Vec<u16> {
        self.put_attempts.lock().clone()
    }

    fn entry(&self, id: DispId) -> Option<(String, Value)> {
        let index = usize::try_from(id).ok()?.checked_sub(1)?;
        self.members.lock().get(index).cloned().flatten()
    }

    fn store(&self, id: DispId, value: Value) {
        let Some(index) = usize::try_from(id).ok().and_then(|i| i.checked_sub(1)) else {
            return;
        };
        if let Some(Some(entry)) = self.members.lock().get_mut(index) {
            entry.1 = value;
        }
    }
}

fn write_result(result: Option<&mut Variant>, value: &Value) -> HResult {
    if let Some(out) = result {
        if to_variant(value, out).is_err() {
            return HResult::DISP_E_TYPEMISMATCH;
        }
    }
    HResult::S_OK
}

impl ScriptObject for ScriptedDispatch {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_dispatch(&self) -> Option<&dyn DispatchEx> {
        Some(self)
    }
}

impl DispatchEx for ScriptedDispatch {
    fn get_dispid(&self, name: &str, flags: u32) -> Result<DispId, HResult> {
        let mut members = self.members.lock();
        if let Some(index) = members
            .iter()
            .position(|m| m.as_ref().is_some_and(|(n, _)| n == name))
        {
            return Ok(index as DispId + 1);
        }
        if flags & FDEX_NAME_ENSURE != 0 {
            members.push(Some((name.to_string(), Value::Void)));
            return Ok(members.len() as DispId);
        }
        Err(HResult::DISP_E_UNKNOWNNAME)
    }

    fn invoke_ex(&self, id: DispId, flags: u16, params: &mut DispParams<'_>, result: Option<&mut Variant>) -> HResult {
        if id == DISPID_VALUE {
            let value = if flags & DISPATCH_CONSTRUCT != 0 {
                Value::from("constructed")
            } else {
                Value::I32(params.len() as i32)
            };
            return write_result(result, &value);
        }

        let Some((name, current)) = self.entry(id) else {
            return HResult::DISP_E_MEMBERNOTFOUND;
        };

        if flags & (DISPATCH_PROPERTYPUT | DISPATCH_PROPERTYPUTREF) != 0 {
            self.put_attempts.lock().push(flags);
            if self.rejected_puts.contains(&flags) {
                return HResult::DISP_E_MEMBERNOTFOUND;
            }
            let Some(arg) = params.args.first() else {
                return HResult::DISP_E_BADPARAMCOUNT;
            };
            return match from_variant(arg) {
                Ok(value) => {
                    self.store(id, value);
                    HResult::S_OK
                }
                Err(_) => HResult::DISP_E_TYPEMISMATCH,
            };
        }

        if flags & DISPATCH_PROPERTYGET != 0 {
            return write_result(result, &current);
        }

        if flags & DISPATCH_METHOD != 0 {
            match name.as_str() {
                "double" => {
                    let Some(slot) = params.args.last_mut() else {
                        return HResult::DISP_E_BADPARAMCOUNT;
                    };
                    let inner: &mut Variant = if slot.is_by_ref() {
                        // SAFETY: by-reference slots point at live variants
                        unsafe { &mut *(slot.data.ptr as *mut Variant) }
                    } else {
                        slot
                    };
                    let doubled = match from_variant(inner) {
                        Ok(v) => Value::I32(v.as_i32().unwrap_or(0) * 2),
                        Err(_) => return HResult::DISP_E_TYPEMISMATCH,
                    };
                    // SAFETY: the caller marshaled this variant
                    unsafe { inner.clear() };
                    if to_variant(&doubled, inner).is_err() {
                        return HResult::DISP_E_TYPEMISMATCH;
                    }
                    return write_result(result, &Value::Void);
                }
                "broken" => return HResult::DISP_E_EXCEPTION,
                _ => return write_result(result, &current),
            }
        }
        HResult::DISP_E_MEMBERNOTFOUND
    }

    fn delete_member_by_dispid(&self, id: DispId) -> HResult {
        let index = usize::try_from(id).ok().and_then(|i| i.checked_sub(1));
        let mut members = self.members.lock();
        match index.and_then(|i| members.get_mut(i)) {
            Some(slot) if slot.is_some() => {
                *slot = None;
                HResult::S_OK
            }
            _ => HResult::S_FALSE,
        }
    }

    fn get_next_dispid(&self, _flags: u32, id: DispId) -> Result<Option<DispId>, HResult> {
        let start = if id == DISPID_STARTENUM { 0 } else { id as usize };
        let members = self.members.lock();
        Ok(members
            .iter()
            .enumerate()
            .skip(start)
            .find(|(_, m)| m.is_some())
            .map(|(i, _)| i as DispId + 1))
    }

    fn get_member_name(&self, id: DispId) -> Result<String, HResult> {
        self.entry(id).map(|(name, _)| name).ok_or(HResult::DISP_E_MEMBERNOTFOUND)
    }
}

// ============================================================================
// Engine hooks
// ============================================================================

/// Hooks that count how often the core calls back into the engine
#[derive(Default)]
pub struct CountingHooks {
    pub prepared: AtomicUsize,
    pub thrown: AtomicUsize,
}

impl EngineHooks for CountingHooks {
    fn prepare_result(&self, raw: Value, _declared_type: TypeHandle, _flags: ScriptMemberFlags) -> Value {
        self.prepared.fetch_add(1, Ordering::SeqCst);
        raw
    }

    fn throw_host_exception(&self, error: InteropError) -> InteropError {
        self.thrown.fetch_add(1, Ordering::SeqCst);
        error
    }
}
