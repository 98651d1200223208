//! Wrappers that expose Rust values as script objects of a registered type

use std::any::Any;
use std::fmt;

use raya_interop_sdk::{DynamicObject, InteropError, InteropResult, ScriptObject, TypeHandle, Value};

/// Rust value tagged with its registered host type
pub struct HostObject<T> {
    handle: TypeHandle,
    inner: T,
}

impl<T: Send + Sync + 'static> HostObject<T> {
    /// Wrap a value
    pub fn new(handle: TypeHandle, inner: T) -> Self {
        Self { handle, inner }
    }

    /// Borrow the wrapped value
    pub fn get(&self) -> &T {
        &self.inner
    }

    /// Wrap a value directly into a script value
    pub fn value(handle: TypeHandle, inner: T) -> Value {
        Value::object(Self::new(handle, inner))
    }
}

impl<T: Send + Sync + 'static> ScriptObject for HostObject<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn type_handle(&self) -> Option<TypeHandle> {
        Some(self.handle)
    }

    fn describe(&self) -> String {
        format!("[host {}]", self.handle)
    }
}

impl<T> fmt::Debug for HostObject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostObject({})", self.handle)
    }
}

/// Host object whose type also resolves members dynamically
pub struct DynamicHostObject<T> {
    handle: TypeHandle,
    inner: T,
}

impl<T: DynamicObject + 'static> DynamicHostObject<T> {
    /// Wrap a value
    pub fn new(handle: TypeHandle, inner: T) -> Self {
        Self { handle, inner }
    }

    /// Borrow the wrapped value
    pub fn get(&self) -> &T {
        &self.inner
    }
}

impl<T: DynamicObject + 'static> ScriptObject for DynamicHostObject<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn type_handle(&self) -> Option<TypeHandle> {
        Some(self.handle)
    }

    fn as_dynamic(&self) -> Option<&dyn DynamicObject> {
        Some(&self.inner)
    }

    fn describe(&self) -> String {
        format!("[dynamic host {}]", self.handle)
    }
}

/// Borrow the Rust value behind a `HostObject<T>` target
pub fn host_ref<T: Send + Sync + 'static>(target: &Value) -> InteropResult<&T> {
    target
        .downcast_ref::<HostObject<T>>()
        .map(HostObject::get)
        .ok_or_else(|| {
            InteropError::Runtime(format!(
                "Expected host object of {}, got {}",
                std::any::type_name::<T>(),
                target.type_name()
            ))
        })
}
