//! Fluent builders for host types and members
//!
//! ```ignore
//! let handle = registry.register(
//!     TypeBuilder::class("Counter")
//!         .in_assembly("app")
//!         .member(
//!             MemberBuilder::method("Add", TypeHandle::I32, |target, args| { ... })
//!                 .with_param(ParameterInfo::new("amount", TypeHandle::I32)),
//!         ),
//! )?;
//! ```

use std::sync::Arc;

use raya_interop_sdk::{DispId, InteropResult, TypeHandle, Value};

use super::member::{
    Accessor, ConversionFn, MemberBody, MemberDescriptor, MemberId, MemberKind, MethodFn,
    ParameterInfo, Visibility,
};
use super::registry::{HostType, ImplicitConversion, TypeKind};
use crate::access::ScriptAccessPolicy;

/// Name given to constructors
pub const CONSTRUCTOR_NAME: &str = ".ctor";

/// Name of the method a delegate type is invoked through
pub const DELEGATE_INVOKE_NAME: &str = "Invoke";

fn method_fn<F>(f: F) -> MethodFn
where
    F: Fn(&Value, &mut [Value]) -> InteropResult<Value> + Send + Sync + 'static,
{
    Arc::new(f)
}

// ============================================================================
// MemberBuilder
// ============================================================================

/// Builder for one member
pub struct MemberBuilder {
    name: String,
    kind: MemberKind,
    parameters: Vec<ParameterInfo>,
    return_type: TypeHandle,
    visibility: Visibility,
    is_static: bool,
    special_name: bool,
    dispid: Option<DispId>,
    policy: Option<ScriptAccessPolicy>,
    body: MemberBody,
}

impl MemberBuilder {
    fn new(name: impl Into<String>, kind: MemberKind, return_type: TypeHandle, body: MemberBody) -> Self {
        Self {
            name: name.into(),
            kind,
            parameters: Vec::new(),
            return_type,
            visibility: Visibility::Public,
            is_static: false,
            special_name: false,
            dispid: None,
            policy: None,
            body,
        }
    }

    /// Method returning `return_type` (`TypeHandle::VOID` for none)
    pub fn method<F>(name: impl Into<String>, return_type: TypeHandle, f: F) -> Self
    where
        F: Fn(&Value, &mut [Value]) -> InteropResult<Value> + Send + Sync + 'static,
    {
        Self::new(name, MemberKind::Method, return_type, MemberBody::Method(method_fn(f)))
    }

    /// Constructor; the callback returns the new instance
    pub fn constructor<F>(f: F) -> Self
    where
        F: Fn(&Value, &mut [Value]) -> InteropResult<Value> + Send + Sync + 'static,
    {
        let mut builder = Self::new(
            CONSTRUCTOR_NAME,
            MemberKind::Constructor,
            TypeHandle::OBJECT,
            MemberBody::Constructor(method_fn(f)),
        );
        builder.special_name = true;
        builder
    }

    /// Read-only field
    pub fn field<G>(name: impl Into<String>, ty: TypeHandle, get: G) -> Self
    where
        G: Fn(&Value) -> InteropResult<Value> + Send + Sync + 'static,
    {
        Self::new(
            name,
            MemberKind::Field,
            ty,
            MemberBody::Field {
                get: Arc::new(get),
                set: None,
            },
        )
    }

    /// Make a field writable
    pub fn field_setter<S>(mut self, set: S) -> Self
    where
        S: Fn(&Value, Value) -> InteropResult<()> + Send + Sync + 'static,
    {
        if let MemberBody::Field { set: slot, .. } = &mut self.body {
            *slot = Some(Arc::new(set));
        }
        self
    }

    /// Property without accessors; add them with [`getter`](Self::getter)
    /// and [`setter`](Self::setter)
    pub fn property(name: impl Into<String>, ty: TypeHandle) -> Self {
        Self::new(
            name,
            MemberKind::Property,
            ty,
            MemberBody::Property {
                get: None,
                set: None,
            },
        )
    }

    /// Attach a public getter. Receives the index arguments.
    pub fn getter<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value, &mut [Value]) -> InteropResult<Value> + Send + Sync + 'static,
    {
        if let MemberBody::Property { get, .. } = &mut self.body {
            *get = Some(Accessor {
                visibility: Visibility::Public,
                invoke: method_fn(f),
            });
        }
        self
    }

    /// Attach a public setter. Receives the index arguments then the value.
    pub fn setter<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value, &mut [Value]) -> InteropResult<Value> + Send + Sync + 'static,
    {
        if let MemberBody::Property { set, .. } = &mut self.body {
            *set = Some(Accessor {
                visibility: Visibility::Public,
                invoke: method_fn(f),
            });
        }
        self
    }

    /// Restrict the getter
    pub fn getter_visibility(mut self, visibility: Visibility) -> Self {
        if let MemberBody::Property { get: Some(acc), .. } = &mut self.body {
            acc.visibility = visibility;
        }
        self
    }

    /// Restrict the setter
    pub fn setter_visibility(mut self, visibility: Visibility) -> Self {
        if let MemberBody::Property { set: Some(acc), .. } = &mut self.body {
            acc.visibility = visibility;
        }
        self
    }

    /// Event with subscribe and unsubscribe accessors
    pub fn event<A, R>(name: impl Into<String>, handler_type: TypeHandle, add: A, remove: R) -> Self
    where
        A: Fn(&Value, &mut [Value]) -> InteropResult<Value> + Send + Sync + 'static,
        R: Fn(&Value, &mut [Value]) -> InteropResult<Value> + Send + Sync + 'static,
    {
        let mut builder = Self::new(
            name,
            MemberKind::Event,
            TypeHandle::VOID,
            MemberBody::Event {
                add: Accessor {
                    visibility: Visibility::Public,
                    invoke: method_fn(add),
                },
                remove: Accessor {
                    visibility: Visibility::Public,
                    invoke: method_fn(remove),
                },
            },
        );
        builder.parameters.push(ParameterInfo::new("handler", handler_type));
        builder
    }

    /// Restrict the event's add accessor
    pub fn add_visibility(mut self, visibility: Visibility) -> Self {
        if let MemberBody::Event { add, .. } = &mut self.body {
            add.visibility = visibility;
        }
        self
    }

    /// Add a parameter
    pub fn with_param(mut self, param: ParameterInfo) -> Self {
        self.parameters.push(param);
        self
    }

    /// Set the declared visibility
    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        if let MemberBody::Property { get, set } = &mut self.body {
            for acc in get.iter_mut().chain(set.iter_mut()) {
                acc.visibility = visibility;
            }
        }
        if let MemberBody::Event { add, remove } = &mut self.body {
            add.visibility = visibility;
            remove.visibility = visibility;
        }
        self
    }

    /// Mark as static
    pub fn as_static(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Mark as compiler-generated
    pub fn special_name(mut self) -> Self {
        self.special_name = true;
        self
    }

    /// Attach a dispatch identifier
    pub fn dispid(mut self, id: DispId) -> Self {
        self.dispid = Some(id);
        self
    }

    /// Attach a member-level script access override
    pub fn policy(mut self, policy: ScriptAccessPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    fn build(self, id: MemberId) -> MemberDescriptor {
        let return_type = if self.kind == MemberKind::Constructor {
            id.declaring_type
        } else {
            self.return_type
        };
        MemberDescriptor {
            id,
            name: self.name,
            kind: self.kind,
            declaring_type: id.declaring_type,
            parameters: self.parameters,
            return_type,
            visibility: self.visibility,
            is_static: self.is_static,
            special_name: self.special_name,
            dispid: self.dispid,
            policy: self.policy,
            body: self.body,
        }
    }
}

// ============================================================================
// TypeBuilder
// ============================================================================

/// Builder for one host type
pub struct TypeBuilder {
    name: String,
    kind: TypeKind,
    visibility: Visibility,
    assembly: String,
    base: Option<TypeHandle>,
    interfaces: Vec<TypeHandle>,
    enclosing: Option<TypeHandle>,
    members: Vec<MemberBuilder>,
    policy: Option<ScriptAccessPolicy>,
    default_member: Option<String>,
    conversions: Vec<(Option<TypeHandle>, Option<TypeHandle>, ConversionFn)>,
    is_dynamic: bool,
}

impl TypeBuilder {
    fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            visibility: Visibility::Public,
            assembly: String::from("app"),
            base: None,
            interfaces: Vec::new(),
            enclosing: None,
            members: Vec::new(),
            policy: None,
            default_member: None,
            conversions: Vec::new(),
            is_dynamic: false,
        }
    }

    /// Reference type
    pub fn class(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Class)
    }

    /// Value type
    pub fn structure(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Struct)
    }

    /// Interface
    pub fn interface(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Interface)
    }

    /// Enumeration over an integral type
    pub fn enumeration(name: impl Into<String>, underlying: TypeHandle) -> Self {
        Self::new(name, TypeKind::Enum { underlying })
    }

    /// Delegate type with the given `Invoke` signature
    pub fn delegate<F>(
        name: impl Into<String>,
        return_type: TypeHandle,
        parameters: Vec<ParameterInfo>,
        invoke: F,
    ) -> Self
    where
        F: Fn(&Value, &mut [Value]) -> InteropResult<Value> + Send + Sync + 'static,
    {
        Self::new(name, TypeKind::Delegate).method(DELEGATE_INVOKE_NAME, return_type, parameters, invoke)
    }

    pub(crate) fn primitive(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Primitive)
    }

    /// Type name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Owning assembly (defaults to `app`)
    pub fn in_assembly(mut self, assembly: impl Into<String>) -> Self {
        self.assembly = assembly.into();
        self
    }

    /// Restrict a top-level type to friend assemblies
    pub fn internal(mut self) -> Self {
        self.visibility = Visibility::Assembly;
        self
    }

    /// Set the base class
    pub fn extends(mut self, base: TypeHandle) -> Self {
        self.base = Some(base);
        self
    }

    /// Add an implemented interface
    pub fn implements(mut self, iface: TypeHandle) -> Self {
        self.interfaces.push(iface);
        self
    }

    /// Nest inside another type
    pub fn nested_in(mut self, enclosing: TypeHandle, visibility: Visibility) -> Self {
        self.enclosing = Some(enclosing);
        self.visibility = visibility;
        self
    }

    /// Type-level script access override
    pub fn policy(mut self, policy: ScriptAccessPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Declare the default member by name
    pub fn default_member(mut self, name: impl Into<String>) -> Self {
        self.default_member = Some(name.into());
        self
    }

    /// Instances resolve members dynamically
    pub fn dynamic(mut self) -> Self {
        self.is_dynamic = true;
        self
    }

    /// Add a member
    pub fn member(mut self, member: MemberBuilder) -> Self {
        self.members.push(member);
        self
    }

    /// Add a public instance method
    pub fn method<F>(
        self,
        name: impl Into<String>,
        return_type: TypeHandle,
        parameters: Vec<ParameterInfo>,
        f: F,
    ) -> Self
    where
        F: Fn(&Value, &mut [Value]) -> InteropResult<Value> + Send + Sync + 'static,
    {
        let member = parameters
            .into_iter()
            .fold(MemberBuilder::method(name, return_type, f), MemberBuilder::with_param);
        self.member(member)
    }

    /// Add a public read-only instance property
    pub fn property_get<F>(self, name: impl Into<String>, ty: TypeHandle, f: F) -> Self
    where
        F: Fn(&Value, &mut [Value]) -> InteropResult<Value> + Send + Sync + 'static,
    {
        self.member(MemberBuilder::property(name, ty).getter(f))
    }

    /// Declare an implicit conversion from `source` into this type
    pub fn implicit_from<F>(mut self, source: TypeHandle, f: F) -> Self
    where
        F: Fn(&Value) -> InteropResult<Value> + Send + Sync + 'static,
    {
        self.conversions.push((Some(source), None, Arc::new(f)));
        self
    }

    /// Declare an implicit conversion from this type into `target`
    pub fn implicit_to<F>(mut self, target: TypeHandle, f: F) -> Self
    where
        F: Fn(&Value) -> InteropResult<Value> + Send + Sync + 'static,
    {
        self.conversions.push((None, Some(target), Arc::new(f)));
        self
    }

    pub(crate) fn build(self, handle: TypeHandle) -> HostType {
        let base = match self.kind {
            _ if handle == TypeHandle::OBJECT => None,
            TypeKind::Interface => None,
            _ => Some(self.base.unwrap_or(TypeHandle::OBJECT)),
        };
        let members = self
            .members
            .into_iter()
            .enumerate()
            .map(|(index, m)| {
                Arc::new(m.build(MemberId {
                    declaring_type: handle,
                    index: index as u32,
                }))
            })
            .collect();
        let conversions = self
            .conversions
            .into_iter()
            .map(|(from, to, convert)| ImplicitConversion {
                from: from.unwrap_or(handle),
                to: to.unwrap_or(handle),
                convert,
            })
            .collect();

        HostType {
            handle,
            name: self.name,
            kind: self.kind,
            visibility: self.visibility,
            assembly: self.assembly,
            base,
            interfaces: self.interfaces,
            enclosing: self.enclosing,
            members,
            policy: self.policy,
            default_member: self.default_member,
            conversions,
            is_dynamic: self.is_dynamic,
        }
    }
}
