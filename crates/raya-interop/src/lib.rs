//! Raya Interop - dynamic member access for host objects
//!
//! Lets a caller with no static knowledge of a target's shape read, write
//! and invoke its members. Three dispatch back-ends serve a request:
//!
//! - **Catalog**: registered host types, through the accessibility model,
//!   member catalog, overload selector and argument binder
//! - **Dynamic**: targets implementing [`DynamicObject`](raya_interop_sdk::DynamicObject)
//! - **Variant**: native targets exposing [`DispatchEx`](raya_interop_sdk::DispatchEx)
//!
//! # Example
//!
//! ```ignore
//! let registry = Arc::new(TypeRegistry::new());
//! let point = registry.register(
//!     TypeBuilder::class("Point").property_get("X", TypeHandle::I32, |_, _| Ok(Value::I32(3))),
//! )?;
//! let bridge = InteropBridge::new(registry);
//! let target = HostObject::value(point, ());
//! let x = bridge.resolve_and_invoke(&target, "X", &mut [], None, InvokeKind::GetProperty)?;
//! ```

pub mod access;
pub mod binder;
pub mod bridge;
pub mod catalog;
pub mod config;
pub mod conversion;
pub mod dynamic;
pub mod identity;
pub mod invocability;
pub mod overload;
pub mod types;
pub mod variant;

pub use access::{AccessModel, AssemblyRules, PolicyProvider, PolicyResolver, ScriptAccessPolicy};
pub use binder::{ArgumentBinder, BoundArguments};
pub use bridge::{EventSource, HostMethod, InteropBridge, InvokeKind, DEFAULT_MEMBER_NAME};
pub use catalog::{BindingMode, CandidateSet, MemberCatalog};
pub use config::{BridgeConfig, ConfigError, IdentityCacheConfig};
pub use conversion::ConversionRank;
pub use dynamic::{BoundOperation, DynamicBridge};
pub use identity::{CompactionPolicy, MemberHandle, MemberHandles, MemberIdentityCache, SyntheticKind};
pub use invocability::{Invocability, InvocabilityCache, InvocabilityKey};
pub use overload::{OverloadSelector, Selection};
pub use types::{
    host_ref, AssemblyInfo, DynamicHostObject, HostObject, HostType, MemberBuilder, MemberDescriptor, MemberKind,
    ParameterInfo, TypeBuilder, TypeKind, TypeRegistry, Visibility,
};
pub use variant::DispatchAdapter;

pub use raya_interop_sdk as sdk;
