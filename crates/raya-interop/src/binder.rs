//! Argument binding and invocation
//!
//! Adapts an untyped argument list to a selected member's formal parameters
//! and performs the call:
//!
//! 1. A trailing variadic parameter collects the remaining arguments into a
//!    fresh array of its element type, unless exactly one argument remains
//!    and it already converts to the array type.
//! 2. A supplied argument is unwrapped (by-ref slots are remembered), coerced
//!    to the parameter type and bound.
//! 3. An omitted optional parameter binds its default. Undecodable defaults
//!    bind null; optionals without a default bind [`Value::Missing`].
//! 4. An omitted required parameter fails the call.
//!
//! After a successful call every by-ref argument receives the post-call value
//! of its slot (including slots inside the collected variadic array), and
//! every other argument before the variadic tail receives its coerced value.
//! A failed call writes nothing back.
//!
//! Failures raised by a member body come back as
//! [`InteropError::HostCallback`] naming the member, after passing through
//! [`EngineHooks::throw_host_exception`]. Only binding failures keep their
//! own variant, so a caller can tell a resolution miss from a host error.

use std::sync::Arc;

use raya_interop_sdk::{
    Arg, EngineHooks, HostArray, InteropError, InteropResult, ScriptMemberFlags, TypeHandle, Value,
};

use crate::conversion::{classify, coerce};
use crate::types::{DefaultValue, MemberBody, MemberDescriptor, MethodFn, ParameterInfo, TypeRegistry};

/// Name of the synthesized value parameter of property setters
pub const SETTER_VALUE_PARAM: &str = "value";

/// Where a by-ref argument's post-call value comes from
#[derive(Debug, Clone)]
enum WriteBack {
    /// Bound parameter slot
    Slot { arg: usize, bound: usize },
    /// Element of the collected variadic array
    Tail { arg: usize, element: usize },
}

/// Arguments bound to a member's parameters
#[derive(Debug, Default)]
pub struct BoundArguments {
    values: Vec<Value>,
    write_backs: Vec<WriteBack>,
    tail: Option<(usize, HostArray)>,
}

impl BoundArguments {
    /// Bound values in parameter order
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Collected variadic array, if the tail collected arguments
    pub fn tail(&self) -> Option<&HostArray> {
        self.tail.as_ref().map(|(_, array)| array)
    }

    /// Number of bound argument positions before the variadic tail
    fn prefix_len(&self) -> usize {
        self.tail.as_ref().map_or(self.values.len(), |(start, _)| *start)
    }
}

/// Binds arguments and invokes host members
pub struct ArgumentBinder<'a> {
    registry: &'a TypeRegistry,
    hooks: &'a dyn EngineHooks,
}

impl<'a> ArgumentBinder<'a> {
    /// Create a binder
    pub fn new(registry: &'a TypeRegistry, hooks: &'a dyn EngineHooks) -> Self {
        Self { registry, hooks }
    }

    /// Coerce one value to a parameter type
    pub fn coerce_value(&self, value: Value, target: TypeHandle, parameter: &str) -> InteropResult<Value> {
        coerce(self.registry, value, target, parameter)
    }

    /// Bind `args` to `params`
    pub fn bind(&self, member: &str, params: &[ParameterInfo], args: &[Arg]) -> InteropResult<BoundArguments> {
        let mut bound = BoundArguments::default();

        for (index, param) in params.iter().enumerate() {
            let is_last = index + 1 == params.len();
            if param.is_params && is_last && self.collects_tail(param, &args[index.min(args.len())..]) {
                let array = self.collect_tail(param, index, args, &mut bound.write_backs)?;
                bound.values.push(Value::Array(array.clone()));
                bound.tail = Some((index, array));
                return Ok(bound);
            }

            if let Some(arg) = args.get(index) {
                let value = coerce(self.registry, arg.value(), param.ty, &param.name)?;
                if arg.is_by_ref() {
                    bound.write_backs.push(WriteBack::Slot { arg: index, bound: index });
                }
                bound.values.push(value);
            } else if param.is_optional {
                bound.values.push(match &param.default {
                    Some(DefaultValue::Value(v)) => v.clone(),
                    Some(DefaultValue::Malformed) => Value::Null,
                    None => Value::Missing,
                });
            } else {
                return Err(InteropError::ArgumentCount {
                    member: member.to_string(),
                    expected: params.iter().filter(|p| !p.is_optional && !p.is_params).count(),
                    got: args.len(),
                });
            }
        }

        if args.len() > params.len() {
            return Err(InteropError::ArgumentCount {
                member: member.to_string(),
                expected: params.len(),
                got: args.len(),
            });
        }
        Ok(bound)
    }

    fn collects_tail(&self, param: &ParameterInfo, remaining: &[Arg]) -> bool {
        match remaining {
            [single] => classify(self.registry, &single.value(), param.ty).is_none(),
            _ => true,
        }
    }

    fn collect_tail(
        &self,
        param: &ParameterInfo,
        start: usize,
        args: &[Arg],
        write_backs: &mut Vec<WriteBack>,
    ) -> InteropResult<HostArray> {
        let element = self
            .registry
            .get(param.ty)
            .and_then(|t| t.element_type())
            .ok_or_else(|| InteropError::argument(&param.name, "Variadic parameter is not an array"))?;

        let mut items = Vec::with_capacity(args.len().saturating_sub(start));
        for (offset, arg) in args.iter().enumerate().skip(start) {
            items.push(coerce(self.registry, arg.value(), element, &param.name)?);
            if arg.is_by_ref() {
                write_backs.push(WriteBack::Tail {
                    arg: offset,
                    element: offset - start,
                });
            }
        }
        Ok(HostArray::new(element, items))
    }

    /// Copy post-call values back into the caller's arguments
    fn write_back(&self, bound: &BoundArguments, args: &mut [Arg]) {
        for wb in &bound.write_backs {
            match *wb {
                WriteBack::Slot { arg, bound: slot } => {
                    if let (Some(target), Some(value)) = (args.get_mut(arg), bound.values.get(slot)) {
                        target.set_value(value.clone());
                    }
                }
                WriteBack::Tail { arg, element } => {
                    let value = bound.tail().and_then(|array| array.get(element));
                    if let (Some(target), Some(value)) = (args.get_mut(arg), value) {
                        target.set_value(value);
                    }
                }
            }
        }

        let prefix = bound.prefix_len().min(args.len());
        for (arg, value) in args[..prefix].iter_mut().zip(&bound.values) {
            if !arg.is_by_ref() {
                arg.set_value(value.clone());
            }
        }
    }

    fn call(
        &self,
        target: &Value,
        member: &MemberDescriptor,
        callable: &MethodFn,
        params: &[ParameterInfo],
        args: &mut [Arg],
    ) -> InteropResult<Value> {
        let mut bound = self.bind(&member.name, params, args)?;
        let raw = callable(target, bound.values.as_mut_slice()).map_err(|e| self.body_failure(member, e))?;
        // callee may swap the variadic array for another one
        let replaced = bound.tail.as_ref().and_then(|(start, array)| match bound.values.get(*start) {
            Some(Value::Array(current)) if !current.ptr_eq(array) => Some((*start, current.clone())),
            _ => None,
        });
        if replaced.is_some() {
            bound.tail = replaced;
        }
        self.write_back(&bound, args);
        Ok(raw)
    }

    /// Wrap an error raised by `member`'s body
    fn body_failure(&self, member: &MemberDescriptor, error: InteropError) -> InteropError {
        match error {
            // already surfaced by a nested call
            e @ InteropError::HostCallback { .. } => e,
            other => self.hooks.throw_host_exception(InteropError::HostCallback {
                context: member.name.clone(),
                source: Arc::new(other),
            }),
        }
    }

    fn prepare(&self, raw: Value, declared: TypeHandle, flags: ScriptMemberFlags) -> Value {
        if declared == TypeHandle::VOID {
            Value::Void
        } else {
            self.hooks.prepare_result(raw, declared, flags)
        }
    }

    // ------------------------------------------------------------------------
    // Member kinds
    // ------------------------------------------------------------------------

    /// Invoke a method
    pub fn invoke_method(
        &self,
        target: &Value,
        member: &MemberDescriptor,
        args: &mut [Arg],
        flags: ScriptMemberFlags,
    ) -> InteropResult<Value> {
        let MemberBody::Method(f) = &member.body else {
            return Err(InteropError::Runtime(format!("{} is not a method", member.name)));
        };
        let raw = self.call(target, member, f, &member.parameters, args)?;
        Ok(self.prepare(raw, member.return_type, flags))
    }

    /// Invoke a constructor; returns the new instance
    pub fn invoke_constructor(&self, member: &MemberDescriptor, args: &mut [Arg]) -> InteropResult<Value> {
        let MemberBody::Constructor(f) = &member.body else {
            return Err(InteropError::Runtime(format!("{} is not a constructor", member.name)));
        };
        let raw = self.call(&Value::Type(member.declaring_type), member, f, &member.parameters, args)?;
        Ok(self.prepare(raw, member.declaring_type, ScriptMemberFlags::NONE))
    }

    /// Read a field, or a property through its getter with index arguments
    pub fn get_value(
        &self,
        target: &Value,
        member: &MemberDescriptor,
        args: &mut [Arg],
        flags: ScriptMemberFlags,
    ) -> InteropResult<Value> {
        let raw = match &member.body {
            MemberBody::Field { get, .. } => {
                if !args.is_empty() {
                    return Err(InteropError::ArgumentCount {
                        member: member.name.clone(),
                        expected: 0,
                        got: args.len(),
                    });
                }
                get(target).map_err(|e| self.body_failure(member, e))?
            }
            MemberBody::Property { get: Some(getter), .. } => {
                self.call(target, member, &getter.invoke, &member.parameters, args)?
            }
            MemberBody::Property { get: None, .. } => {
                return Err(InteropError::AccessDenied(format!("{} has no getter", member.name)));
            }
            _ => return Err(InteropError::Runtime(format!("{} is not a field or property", member.name))),
        };
        Ok(self.prepare(raw, member.return_type, flags))
    }

    /// Assign a field, or a property through its setter.
    ///
    /// `args` holds the index arguments followed by the value.
    pub fn set_value(&self, target: &Value, member: &MemberDescriptor, args: &mut [Arg]) -> InteropResult<()> {
        match &member.body {
            MemberBody::Field { set: Some(set), .. } => {
                let [arg] = args else {
                    return Err(InteropError::ArgumentCount {
                        member: member.name.clone(),
                        expected: 1,
                        got: args.len(),
                    });
                };
                let value = coerce(self.registry, arg.value(), member.return_type, SETTER_VALUE_PARAM)?;
                set(target, value).map_err(|e| self.body_failure(member, e))
            }
            MemberBody::Property { set: Some(setter), .. } => {
                let mut params = member.parameters.clone();
                params.push(ParameterInfo::new(SETTER_VALUE_PARAM, member.return_type));
                self.call(target, member, &setter.invoke, &params, args).map(|_| ())
            }
            MemberBody::Field { set: None, .. } | MemberBody::Property { set: None, .. } => {
                Err(InteropError::ReadOnly { name: member.name.clone() })
            }
            _ => Err(InteropError::Runtime(format!("{} is not a field or property", member.name))),
        }
    }

    /// Subscribe (`add = true`) or unsubscribe a handler
    pub fn update_event(&self, target: &Value, member: &MemberDescriptor, handler: Value, add: bool) -> InteropResult<()> {
        let MemberBody::Event { add: add_acc, remove } = &member.body else {
            return Err(InteropError::Runtime(format!("{} is not an event", member.name)));
        };
        let accessor = if add { add_acc } else { remove };
        let mut args = [Arg::Plain(handler)];
        self.call(target, member, &accessor.invoke, &member.parameters, &mut args)
            .map(|_| ())
    }
}
