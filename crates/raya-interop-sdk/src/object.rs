//! ScriptObject trait - what the core needs to know about a target
//!
//! Every object a script engine hands to the core implements this trait.
//! Capability queries decide which dispatch back-end serves a call:
//!
//! - `type_handle()` → direct introspection through the member catalog
//! - `as_dynamic()`  → the dynamic dispatch bridge
//! - `as_dispatch()` → the native variant adapter

use std::any::Any;
use std::sync::Arc;

use crate::dynamic::DynamicObject;
use crate::value::TypeHandle;
use crate::variant::DispatchEx;

/// Shared object reference
pub type ObjectRef = Arc<dyn ScriptObject>;

/// An object reachable from script code.
pub trait ScriptObject: Any + Send + Sync {
    /// Upcast for downcasting to the concrete type
    fn as_any(&self) -> &dyn Any;

    /// Registered host type of this object, if it is introspectable
    fn type_handle(&self) -> Option<TypeHandle> {
        None
    }

    /// Dynamic-binding protocol, if the object resolves its own members
    fn as_dynamic(&self) -> Option<&dyn DynamicObject> {
        None
    }

    /// Extended native dispatch interface, if the object exposes one
    fn as_dispatch(&self) -> Option<&dyn DispatchEx> {
        None
    }

    /// Short description for diagnostics
    fn describe(&self) -> String {
        "[object]".to_string()
    }
}
