//! Member descriptors
//!
//! A `MemberDescriptor` is the resolved, immutable description of one
//! field, property, method, constructor, event or nested type. Host
//! behaviour is attached as callbacks in the [`MemberBody`].

use std::fmt;
use std::sync::Arc;

use raya_interop_sdk::{DispId, InteropResult, TypeHandle, Value};

use crate::access::ScriptAccessPolicy;

/// Host callback for methods, constructors and property/event accessors.
///
/// Receives the target (`Value::Type` for static members) and the bound
/// arguments in formal-parameter order. By-reference parameters are written
/// through the slice.
pub type MethodFn = Arc<dyn Fn(&Value, &mut [Value]) -> InteropResult<Value> + Send + Sync>;

/// Host callback reading a field
pub type FieldGetFn = Arc<dyn Fn(&Value) -> InteropResult<Value> + Send + Sync>;

/// Host callback writing a field
pub type FieldSetFn = Arc<dyn Fn(&Value, Value) -> InteropResult<()> + Send + Sync>;

/// Implicit conversion routine
pub type ConversionFn = Arc<dyn Fn(&Value) -> InteropResult<Value> + Send + Sync>;

/// Declared visibility tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Visibility {
    /// Accessible everywhere
    Public,
    /// Declaring type (and types nested in it) only
    Private,
    /// Declaring type and its subtypes ("protected")
    Family,
    /// Friend assemblies ("internal")
    Assembly,
    /// Family or assembly ("protected internal")
    FamilyOrAssembly,
    /// Family and assembly ("private protected")
    FamilyAndAssembly,
}

/// Member kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    /// Field
    Field,
    /// Property (possibly indexed)
    Property,
    /// Method
    Method,
    /// Constructor
    Constructor,
    /// Event
    Event,
    /// Nested type
    NestedType,
}

/// Stable member identity: declaring type plus declaration index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemberId {
    /// Declaring type
    pub declaring_type: TypeHandle,
    /// Index within the declaring type
    pub index: u32,
}

/// Declared default of an optional parameter
#[derive(Debug, Clone)]
pub enum DefaultValue {
    /// Well-formed default
    Value(Value),
    /// Metadata the host cannot decode; binds as null
    Malformed,
}

/// Formal parameter
#[derive(Debug, Clone)]
pub struct ParameterInfo {
    /// Parameter name
    pub name: String,
    /// Parameter type (the array type for a variadic tail)
    pub ty: TypeHandle,
    /// Passed by reference (`ref`/`out`)
    pub is_by_ref: bool,
    /// May be omitted
    pub is_optional: bool,
    /// Declared default for an optional parameter
    pub default: Option<DefaultValue>,
    /// Trailing variadic collection
    pub is_params: bool,
}

impl ParameterInfo {
    /// Create a required by-value parameter
    pub fn new(name: impl Into<String>, ty: TypeHandle) -> Self {
        Self {
            name: name.into(),
            ty,
            is_by_ref: false,
            is_optional: false,
            default: None,
            is_params: false,
        }
    }

    /// Mark as by-reference
    pub fn by_ref(mut self) -> Self {
        self.is_by_ref = true;
        self
    }

    /// Mark as optional without a default
    pub fn optional(mut self) -> Self {
        self.is_optional = true;
        self
    }

    /// Mark as optional with a default value
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.is_optional = true;
        self.default = Some(DefaultValue::Value(value.into()));
        self
    }

    /// Mark as optional with an undecodable default
    pub fn with_malformed_default(mut self) -> Self {
        self.is_optional = true;
        self.default = Some(DefaultValue::Malformed);
        self
    }

    /// Mark as the variadic tail. `ty` must be an array type.
    pub fn params(mut self) -> Self {
        self.is_params = true;
        self
    }
}

/// Property or event accessor
#[derive(Clone)]
pub struct Accessor {
    /// Accessor visibility
    pub visibility: Visibility,
    /// Accessor implementation
    pub invoke: MethodFn,
}

impl fmt::Debug for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Accessor({:?})", self.visibility)
    }
}

/// Host behaviour of a member
#[derive(Clone)]
pub enum MemberBody {
    /// Field; `set` is `None` for read-only fields
    Field {
        /// Reader
        get: FieldGetFn,
        /// Writer
        set: Option<FieldSetFn>,
    },
    /// Property; setter receives index arguments followed by the value
    Property {
        /// Getter
        get: Option<Accessor>,
        /// Setter
        set: Option<Accessor>,
    },
    /// Method
    Method(MethodFn),
    /// Constructor; returns the new instance
    Constructor(MethodFn),
    /// Event; accessors receive the handler
    Event {
        /// Subscribe accessor
        add: Accessor,
        /// Unsubscribe accessor
        remove: Accessor,
    },
    /// Nested type
    NestedType(TypeHandle),
}

impl fmt::Debug for MemberBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberBody::Field { set, .. } => write!(f, "Field {{ writable: {} }}", set.is_some()),
            MemberBody::Property { get, set } => f
                .debug_struct("Property")
                .field("get", get)
                .field("set", set)
                .finish(),
            MemberBody::Method(_) => write!(f, "Method"),
            MemberBody::Constructor(_) => write!(f, "Constructor"),
            MemberBody::Event { add, .. } => write!(f, "Event({:?})", add.visibility),
            MemberBody::NestedType(h) => write!(f, "NestedType({})", h),
        }
    }
}

/// Resolved member description. Immutable once registered.
#[derive(Debug, Clone)]
pub struct MemberDescriptor {
    /// Stable identity
    pub id: MemberId,
    /// Member name
    pub name: String,
    /// Member kind
    pub kind: MemberKind,
    /// Declaring type
    pub declaring_type: TypeHandle,
    /// Formal parameters (methods, constructors, indexed properties)
    pub parameters: Vec<ParameterInfo>,
    /// Field/property type or method return type (`VOID` for none)
    pub return_type: TypeHandle,
    /// Declared visibility
    pub visibility: Visibility,
    /// Static member
    pub is_static: bool,
    /// Compiler-generated special name
    pub special_name: bool,
    /// Dispatch identifier attribute
    pub dispid: Option<DispId>,
    /// Member-level script access override
    pub policy: Option<ScriptAccessPolicy>,
    /// Host behaviour
    pub body: MemberBody,
}

impl MemberDescriptor {
    /// Parameter-signature equality, ignoring the return type
    pub fn signature_eq(&self, other: &MemberDescriptor) -> bool {
        self.parameters.len() == other.parameters.len()
            && self
                .parameters
                .iter()
                .zip(&other.parameters)
                .all(|(a, b)| a.ty == b.ty && a.is_by_ref == b.is_by_ref)
    }

    /// Check for a trailing variadic parameter
    pub fn is_variadic(&self) -> bool {
        self.parameters.last().is_some_and(|p| p.is_params)
    }

    /// Number of parameters that must be supplied
    pub fn required_param_count(&self) -> usize {
        self.parameters
            .iter()
            .filter(|p| !p.is_optional && !p.is_params)
            .count()
    }

    /// Check if the member is an indexed property
    pub fn is_indexer(&self) -> bool {
        self.kind == MemberKind::Property && !self.parameters.is_empty()
    }

    /// Check for a readable field or property
    pub fn is_readable(&self) -> bool {
        match &self.body {
            MemberBody::Field { .. } => true,
            MemberBody::Property { get, .. } => get.is_some(),
            _ => false,
        }
    }

    /// Visibility tiers that gate access to this member.
    ///
    /// Properties are gated by either accessor, events by their add accessor.
    pub fn access_tiers(&self) -> Vec<Visibility> {
        match &self.body {
            MemberBody::Property { get, set } => get
                .iter()
                .chain(set.iter())
                .map(|a| a.visibility)
                .collect(),
            MemberBody::Event { add, .. } => vec![add.visibility],
            _ => vec![self.visibility],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn method(params: Vec<ParameterInfo>, ret: TypeHandle) -> MemberDescriptor {
        MemberDescriptor {
            id: MemberId {
                declaring_type: TypeHandle::OBJECT,
                index: 0,
            },
            name: "M".into(),
            kind: MemberKind::Method,
            declaring_type: TypeHandle::OBJECT,
            parameters: params,
            return_type: ret,
            visibility: Visibility::Public,
            is_static: false,
            special_name: false,
            dispid: None,
            policy: None,
            body: MemberBody::Method(Arc::new(|_, _| Ok(Value::Void))),
        }
    }

    #[test]
    fn test_signature_ignores_return_type() {
        let a = method(vec![ParameterInfo::new("x", TypeHandle::I32)], TypeHandle::VOID);
        let b = method(vec![ParameterInfo::new("y", TypeHandle::I32)], TypeHandle::STRING);
        let c = method(vec![ParameterInfo::new("x", TypeHandle::I32).by_ref()], TypeHandle::VOID);
        assert!(a.signature_eq(&b));
        assert!(!a.signature_eq(&c));
    }

    #[test]
    fn test_required_param_count() {
        let m = method(
            vec![
                ParameterInfo::new("a", TypeHandle::I32),
                ParameterInfo::new("b", TypeHandle::I32).with_default(1),
                ParameterInfo::new("rest", TypeHandle::OBJECT).params(),
            ],
            TypeHandle::VOID,
        );
        assert_eq!(m.required_param_count(), 1);
        assert!(m.is_variadic());
    }
}
