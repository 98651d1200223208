//! Dynamic dispatch bridge
//!
//! Serves targets that resolve their own members through [`DynamicObject`].
//! Every operation runs the same three steps:
//!
//! - **Bind**: build a [`CallShape`] from the runtime types of the live
//!   arguments (null binds as `Object`) and ask the target for a routine.
//! - **Fallback**: a `NotHandled` answer becomes a routine that raises
//!   [`InteropError::Unbound`], never a default value.
//! - **Execute**: run the routine. The fallback's unbound signal becomes
//!   `Ok(None)` ("not handled") so the caller can try another strategy. Any
//!   failure from a routine the target bound, `Unbound` included, is
//!   re-associated with the operation and handed to
//!   [`EngineHooks::throw_host_exception`].

use std::sync::Arc;

use raya_interop_sdk::{
    Arg, CallShape, DynamicBinding, DynamicObject, DynamicOperation, DynamicRoutine, EngineHooks, InteropError,
    InteropResult, TypeHandle, Value,
};

use crate::types::TypeRegistry;

/// Dynamic-binding protocol of a value, if it has one
pub fn dynamic_of(target: &Value) -> Option<&dyn DynamicObject> {
    target.as_object().and_then(|obj| obj.as_dynamic())
}

/// Routine chosen for one operation
pub struct BoundOperation {
    routine: DynamicRoutine,
    /// Target answered `NotHandled`; `routine` is the unbound fallback
    declined: bool,
}

impl BoundOperation {
    /// True when the target declined and the fallback was substituted
    pub fn is_fallback(&self) -> bool {
        self.declined
    }
}

/// Bind/fallback/execute driver for dynamic targets
pub struct DynamicBridge<'a> {
    registry: &'a TypeRegistry,
    hooks: &'a dyn EngineHooks,
}

impl<'a> DynamicBridge<'a> {
    /// Create a bridge
    pub fn new(registry: &'a TypeRegistry, hooks: &'a dyn EngineHooks) -> Self {
        Self { registry, hooks }
    }

    /// Call shape of live argument values
    pub fn call_shape(&self, values: &[Value]) -> CallShape {
        CallShape::new(
            values
                .iter()
                .map(|v| self.registry.type_of(v).unwrap_or(TypeHandle::OBJECT))
                .collect(),
        )
    }

    /// Bind an operation, substituting the unbound routine when declined
    pub fn bind(&self, target: &dyn DynamicObject, operation: &DynamicOperation, values: &[Value]) -> BoundOperation {
        match target.bind(operation, &self.call_shape(values)) {
            DynamicBinding::Bound(routine) => BoundOperation {
                routine,
                declined: false,
            },
            DynamicBinding::NotHandled => {
                let operation = operation.to_string();
                BoundOperation {
                    routine: Box::new(move |_: &mut [Value]| {
                        Err(InteropError::Unbound {
                            operation: operation.clone(),
                        })
                    }),
                    declined: true,
                }
            }
        }
    }

    /// Run a bound operation; the fallback's unbound signal becomes `Ok(None)`
    pub fn execute(
        &self,
        operation: &DynamicOperation,
        bound: &BoundOperation,
        values: &mut [Value],
    ) -> InteropResult<Option<Value>> {
        match (bound.routine)(values) {
            Ok(value) => Ok(Some(value)),
            Err(e) if bound.declined && e.is_unbound() => {
                tracing::trace!(%operation, "dynamic target declined operation");
                Ok(None)
            }
            Err(e) => Err(self.hooks.throw_host_exception(reassociate(operation, e))),
        }
    }

    fn run(&self, target: &Value, operation: DynamicOperation, values: &mut [Value]) -> InteropResult<Option<Value>> {
        let Some(dynamic) = dynamic_of(target) else {
            return Ok(None);
        };
        let bound = self.bind(dynamic, &operation, values);
        self.execute(&operation, &bound, values)
    }

    /// Run with `Arg`s, writing by-ref positions back on success
    fn run_args(&self, target: &Value, operation: DynamicOperation, args: &mut [Arg]) -> InteropResult<Option<Value>> {
        let mut values: Vec<Value> = args.iter().map(Arg::value).collect();
        let result = self.run(target, operation, &mut values)?;
        if result.is_some() {
            for (arg, value) in args.iter_mut().zip(values) {
                if arg.is_by_ref() {
                    arg.set_value(value);
                }
            }
        }
        Ok(result)
    }

    // ------------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------------

    /// Read a named member
    pub fn try_get_member(&self, target: &Value, name: &str) -> InteropResult<Option<Value>> {
        self.run(target, DynamicOperation::GetMember { name: name.to_string() }, &mut [])
    }

    /// Write a named member; returns whether the target handled it
    pub fn try_set_member(&self, target: &Value, name: &str, value: Value) -> InteropResult<bool> {
        let op = DynamicOperation::SetMember { name: name.to_string() };
        Ok(self.run(target, op, &mut [value])?.is_some())
    }

    /// Remove a named member.
    ///
    /// `Some(false)` means the member did not exist; `None` means the target
    /// does not support deletion.
    pub fn try_delete_member(&self, target: &Value, name: &str) -> InteropResult<Option<bool>> {
        let op = DynamicOperation::DeleteMember { name: name.to_string() };
        Ok(self.run(target, op, &mut [])?.map(|v| deletion_outcome(&v)))
    }

    /// Call the target itself.
    ///
    /// With `field_style_get` and no arguments, a declined invocation
    /// yields the target unchanged.
    pub fn try_invoke(&self, target: &Value, args: &mut [Arg], field_style_get: bool) -> InteropResult<Option<Value>> {
        let result = self.run_args(target, DynamicOperation::Invoke, args)?;
        if result.is_none() && field_style_get && args.is_empty() && dynamic_of(target).is_some() {
            return Ok(Some(target.clone()));
        }
        Ok(result)
    }

    /// Call a named member
    pub fn try_invoke_member(&self, target: &Value, name: &str, args: &mut [Arg]) -> InteropResult<Option<Value>> {
        self.run_args(target, DynamicOperation::InvokeMember { name: name.to_string() }, args)
    }

    /// Read by index
    pub fn try_get_index(&self, target: &Value, indices: &mut [Arg]) -> InteropResult<Option<Value>> {
        self.run_args(target, DynamicOperation::GetIndex, indices)
    }

    /// Write by index; returns whether the target handled it
    pub fn try_set_index(&self, target: &Value, indices: &[Value], value: Value) -> InteropResult<bool> {
        let mut values: Vec<Value> = indices.iter().cloned().chain(std::iter::once(value)).collect();
        Ok(self.run(target, DynamicOperation::SetIndex, &mut values)?.is_some())
    }

    /// Remove by index; same outcomes as [`try_delete_member`](Self::try_delete_member)
    pub fn try_delete_index(&self, target: &Value, indices: &[Value]) -> InteropResult<Option<bool>> {
        let mut values = indices.to_vec();
        Ok(self
            .run(target, DynamicOperation::DeleteIndex, &mut values)?
            .map(|v| deletion_outcome(&v)))
    }

    /// Convert the target to a host type
    pub fn try_convert(&self, target: &Value, to: TypeHandle) -> InteropResult<Option<Value>> {
        self.run(target, DynamicOperation::Convert { target: to }, &mut [])
    }

    /// Construct using the target as a constructor
    pub fn try_create_instance(&self, target: &Value, args: &mut [Arg]) -> InteropResult<Option<Value>> {
        self.run_args(target, DynamicOperation::CreateInstance, args)
    }

    /// Member names the target reports
    pub fn dynamic_member_names(&self, target: &Value) -> Vec<String> {
        dynamic_of(target)
            .map(|d| d.dynamic_member_names())
            .unwrap_or_default()
    }
}

/// Deletion routines report `Bool(existed)`; anything else counts as deleted
fn deletion_outcome(value: &Value) -> bool {
    value.as_bool().unwrap_or(true)
}

/// Attach the operation to a failure raised behind the dynamic boundary,
/// keeping the original error as the source
fn reassociate(operation: &DynamicOperation, error: InteropError) -> InteropError {
    match error {
        InteropError::HostCallback { context, source } => InteropError::HostCallback {
            context: format!("{}: {}", operation, context),
            source,
        },
        other => InteropError::HostCallback {
            context: operation.to_string(),
            source: Arc::new(other),
        },
    }
}
