//! Dynamic-binding protocol
//!
//! Objects that resolve their own members implement [`DynamicObject`]. The
//! core describes each request as a [`DynamicOperation`] plus a
//! [`CallShape`] built from the live argument types; the object answers
//! with a ready-to-call routine or [`DynamicBinding::NotHandled`].

use std::fmt;

use crate::error::InteropResult;
use crate::value::{TypeHandle, Value};

/// Operation kinds a dynamic target can be asked to bind
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DynamicOperation {
    /// Read a named member
    GetMember {
        /// Member name
        name: String,
    },
    /// Write a named member; the call shape ends with the value
    SetMember {
        /// Member name
        name: String,
    },
    /// Remove a named member; the routine returns `Bool(existed)`
    DeleteMember {
        /// Member name
        name: String,
    },
    /// Call the target itself
    Invoke,
    /// Call a named member
    InvokeMember {
        /// Member name
        name: String,
    },
    /// Read by index; the call shape holds the index values
    GetIndex,
    /// Write by index; the call shape holds the indices then the value
    SetIndex,
    /// Remove by index; the routine returns `Bool(existed)`
    DeleteIndex,
    /// Convert the target to a host type
    Convert {
        /// Requested type
        target: TypeHandle,
    },
    /// Construct a new instance using the target as a constructor
    CreateInstance,
}

impl DynamicOperation {
    /// Operation kind name
    pub fn kind_name(&self) -> &'static str {
        match self {
            DynamicOperation::GetMember { .. } => "GetMember",
            DynamicOperation::SetMember { .. } => "SetMember",
            DynamicOperation::DeleteMember { .. } => "DeleteMember",
            DynamicOperation::Invoke => "Invoke",
            DynamicOperation::InvokeMember { .. } => "InvokeMember",
            DynamicOperation::GetIndex => "GetIndex",
            DynamicOperation::SetIndex => "SetIndex",
            DynamicOperation::DeleteIndex => "DeleteIndex",
            DynamicOperation::Convert { .. } => "Convert",
            DynamicOperation::CreateInstance => "CreateInstance",
        }
    }

    /// Member name for named operations
    pub fn member_name(&self) -> Option<&str> {
        match self {
            DynamicOperation::GetMember { name }
            | DynamicOperation::SetMember { name }
            | DynamicOperation::DeleteMember { name }
            | DynamicOperation::InvokeMember { name } => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for DynamicOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DynamicOperation::Convert { target } => write!(f, "Convert({})", target),
            other => match other.member_name() {
                Some(name) => write!(f, "{}({})", other.kind_name(), name),
                None => write!(f, "{}", other.kind_name()),
            },
        }
    }
}

/// Parameter types of a request, taken from the live argument values
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct CallShape {
    param_types: Vec<TypeHandle>,
}

impl CallShape {
    /// Create from parameter types
    pub fn new(param_types: Vec<TypeHandle>) -> Self {
        Self { param_types }
    }

    /// Parameter types in order
    pub fn param_types(&self) -> &[TypeHandle] {
        &self.param_types
    }

    /// Number of parameters
    pub fn len(&self) -> usize {
        self.param_types.len()
    }

    /// Check for a parameterless shape
    pub fn is_empty(&self) -> bool {
        self.param_types.is_empty()
    }
}

/// Synthesized invocation routine. Receives the arguments in call-shape
/// order; values left in by-reference positions are written back.
pub type DynamicRoutine = Box<dyn Fn(&mut [Value]) -> InteropResult<Value> + Send + Sync>;

/// Answer of a dynamic target to a bind request
pub enum DynamicBinding {
    /// The target can service the shape with this routine
    Bound(DynamicRoutine),
    /// The target has no member or conversion for this shape
    NotHandled,
}

impl DynamicBinding {
    /// Box a closure as a bound routine
    pub fn bound<F>(routine: F) -> Self
    where
        F: Fn(&mut [Value]) -> InteropResult<Value> + Send + Sync + 'static,
    {
        DynamicBinding::Bound(Box::new(routine))
    }

    /// Check if the target declined
    pub fn is_not_handled(&self) -> bool {
        matches!(self, DynamicBinding::NotHandled)
    }
}

impl fmt::Debug for DynamicBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DynamicBinding::Bound(_) => write!(f, "DynamicBinding::Bound(..)"),
            DynamicBinding::NotHandled => write!(f, "DynamicBinding::NotHandled"),
        }
    }
}

/// Objects that supply their own member resolution.
pub trait DynamicObject: Send + Sync {
    /// Produce a routine for `operation` with the given call shape
    fn bind(&self, operation: &DynamicOperation, shape: &CallShape) -> DynamicBinding;

    /// Names of the members the object currently exposes
    fn dynamic_member_names(&self) -> Vec<String> {
        Vec::new()
    }
}
