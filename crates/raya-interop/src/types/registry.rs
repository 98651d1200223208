//! Type registry
//!
//! Owns every [`HostType`] the bridge can see, keyed by [`TypeHandle`].
//! Well-known primitive types are registered on construction; array types
//! are interned on first use and carry a synthesized element indexer.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use raya_interop_sdk::variant::DISPID_VALUE;
use raya_interop_sdk::{InteropError, InteropResult, TypeHandle, Value};

use super::builder::TypeBuilder;
use super::member::{
    Accessor, ConversionFn, MemberBody, MemberDescriptor, MemberId, MemberKind, ParameterInfo,
    Visibility,
};
use crate::access::ScriptAccessPolicy;

/// Assembly that well-known types belong to
pub const CORE_ASSEMBLY: &str = "core";

/// Name of the synthesized array element indexer
pub const ARRAY_INDEXER_NAME: &str = "Item";

// ============================================================================
// Type descriptors
// ============================================================================

/// Type category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// Reference type
    Class,
    /// Value type
    Struct,
    /// Interface
    Interface,
    /// Enumeration over an integral type
    Enum {
        /// Underlying integral type
        underlying: TypeHandle,
    },
    /// Single-dimensional array
    Array {
        /// Element type
        element: TypeHandle,
    },
    /// Well-known primitive
    Primitive,
    /// Callable delegate type; invoked through its `Invoke` method
    Delegate,
}

/// User-defined implicit conversion declared on a type
#[derive(Clone)]
pub struct ImplicitConversion {
    /// Source type
    pub from: TypeHandle,
    /// Target type
    pub to: TypeHandle,
    /// Conversion routine
    pub convert: ConversionFn,
}

impl fmt::Debug for ImplicitConversion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ImplicitConversion({} -> {})", self.from, self.to)
    }
}

/// Registered host type
#[derive(Debug, Clone)]
pub struct HostType {
    /// Handle
    pub handle: TypeHandle,
    /// Full name
    pub name: String,
    /// Category
    pub kind: TypeKind,
    /// Declared visibility. Top-level types are `Public` or `Assembly`.
    pub visibility: Visibility,
    /// Owning assembly
    pub assembly: String,
    /// Base class
    pub base: Option<TypeHandle>,
    /// Directly implemented interfaces
    pub interfaces: Vec<TypeHandle>,
    /// Enclosing type for nested types
    pub enclosing: Option<TypeHandle>,
    /// Declared members, in declaration order
    pub members: Vec<Arc<MemberDescriptor>>,
    /// Type-level script access override
    pub policy: Option<ScriptAccessPolicy>,
    /// Name of the declared default member
    pub default_member: Option<String>,
    /// User-defined implicit conversions
    pub conversions: Vec<ImplicitConversion>,
    /// Instances resolve members dynamically
    pub is_dynamic: bool,
}

impl HostType {
    /// Check for a delegate type
    pub fn is_delegate(&self) -> bool {
        self.kind == TypeKind::Delegate
    }

    /// Check for an interface
    pub fn is_interface(&self) -> bool {
        self.kind == TypeKind::Interface
    }

    /// Element type of an array type
    pub fn element_type(&self) -> Option<TypeHandle> {
        match self.kind {
            TypeKind::Array { element } => Some(element),
            _ => None,
        }
    }

    /// Declared members with a given name
    pub fn members_named<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a Arc<MemberDescriptor>> + 'a {
        self.members.iter().filter(move |m| m.name == name)
    }
}

/// Assembly metadata used for friend-access checks and policy rules
#[derive(Debug, Clone, Default)]
pub struct AssemblyInfo {
    /// Assembly name
    pub name: String,
    /// Assemblies granted `Assembly`-tier access
    pub friends: Vec<String>,
    /// Assembly-level script access override
    pub policy: Option<ScriptAccessPolicy>,
}

impl AssemblyInfo {
    /// Create assembly metadata
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Grant friend access to another assembly
    pub fn with_friend(mut self, friend: impl Into<String>) -> Self {
        self.friends.push(friend.into());
        self
    }

    /// Set the assembly-level policy
    pub fn with_policy(mut self, policy: ScriptAccessPolicy) -> Self {
        self.policy = Some(policy);
        self
    }
}

// ============================================================================
// Registry
// ============================================================================

struct RegistryInner {
    types: FxHashMap<TypeHandle, Arc<HostType>>,
    by_name: FxHashMap<String, TypeHandle>,
    arrays: FxHashMap<TypeHandle, TypeHandle>,
    assemblies: FxHashMap<String, AssemblyInfo>,
    /// Bumped whenever assembly metadata changes
    assembly_generation: u64,
    next_handle: u32,
}

/// Registry of host types
pub struct TypeRegistry {
    inner: RwLock<RegistryInner>,
}

impl TypeRegistry {
    /// Create a registry with the well-known types registered
    pub fn new() -> Self {
        let registry = Self {
            inner: RwLock::new(RegistryInner {
                types: FxHashMap::default(),
                by_name: FxHashMap::default(),
                arrays: FxHashMap::default(),
                assemblies: FxHashMap::default(),
                assembly_generation: 0,
                next_handle: TypeHandle::FIRST_USER,
            }),
        };
        registry.register_well_known();
        registry
    }

    fn register_well_known(&self) {
        let primitives = [
            (TypeHandle::VOID, "Void"),
            (TypeHandle::BOOL, "Boolean"),
            (TypeHandle::I8, "SByte"),
            (TypeHandle::U8, "Byte"),
            (TypeHandle::I16, "Int16"),
            (TypeHandle::U16, "UInt16"),
            (TypeHandle::I32, "Int32"),
            (TypeHandle::U32, "UInt32"),
            (TypeHandle::I64, "Int64"),
            (TypeHandle::U64, "UInt64"),
            (TypeHandle::F32, "Single"),
            (TypeHandle::F64, "Double"),
            (TypeHandle::DECIMAL, "Decimal"),
        ];

        let mut inner = self.inner.write();
        inner
            .assemblies
            .insert(CORE_ASSEMBLY.to_string(), AssemblyInfo::new(CORE_ASSEMBLY));

        let object = TypeBuilder::class("Object")
            .in_assembly(CORE_ASSEMBLY)
            .method(
                "ToString",
                TypeHandle::STRING,
                Vec::new(),
                |target, _| Ok(Value::string(describe(target))),
            )
            .method(
                "Equals",
                TypeHandle::BOOL,
                vec![ParameterInfo::new("other", TypeHandle::OBJECT)],
                |target, args| Ok(Value::Bool(*target == args[0])),
            )
            .build(TypeHandle::OBJECT);
        insert(&mut inner, object);

        for (handle, name) in primitives {
            let ty = TypeBuilder::primitive(name).in_assembly(CORE_ASSEMBLY).build(handle);
            insert(&mut inner, ty);
        }

        let string = TypeBuilder::class("String")
            .in_assembly(CORE_ASSEMBLY)
            .property_get("Length", TypeHandle::I32, |target, _| {
                let len = target.as_str().map(|s| s.chars().count()).unwrap_or(0);
                Ok(Value::I32(len as i32))
            })
            .build(TypeHandle::STRING);
        insert(&mut inner, string);
    }

    /// Register an assembly (replaces earlier metadata with the same name)
    pub fn register_assembly(&self, info: AssemblyInfo) {
        let mut inner = self.inner.write();
        inner.assemblies.insert(info.name.clone(), info);
        inner.assembly_generation += 1;
    }

    /// Counter that changes every time assembly metadata is registered
    pub fn assembly_generation(&self) -> u64 {
        self.inner.read().assembly_generation
    }

    /// Assembly metadata
    pub fn assembly(&self, name: &str) -> Option<AssemblyInfo> {
        self.inner.read().assemblies.get(name).cloned()
    }

    /// Register a type
    pub fn register(&self, builder: TypeBuilder) -> InteropResult<TypeHandle> {
        self.register_with(|_| builder)
    }

    /// Register a type whose definition needs its own handle (self-typed
    /// members, nested types referring back to their parent)
    pub fn register_with<F>(&self, define: F) -> InteropResult<TypeHandle>
    where
        F: FnOnce(TypeHandle) -> TypeBuilder,
    {
        let handle = {
            let mut inner = self.inner.write();
            let handle = TypeHandle::from_raw(inner.next_handle);
            inner.next_handle += 1;
            handle
        };

        let builder = define(handle);
        let name = builder.name().to_string();
        let ty = builder.build(handle);

        let mut inner = self.inner.write();
        if inner.by_name.contains_key(&name) {
            return Err(InteropError::Runtime(format!("Type already registered: {}", name)));
        }
        for referenced in ty.base.iter().chain(ty.interfaces.iter()).chain(ty.enclosing.iter()) {
            if !inner.types.contains_key(referenced) {
                return Err(InteropError::Runtime(format!(
                    "Type {} references unregistered type {}",
                    name, referenced
                )));
            }
        }
        inner
            .assemblies
            .entry(ty.assembly.clone())
            .or_insert_with(|| AssemblyInfo::new(ty.assembly.clone()));

        // Surface the nested type as a member of its enclosing type
        if let Some(parent) = ty.enclosing.and_then(|e| inner.types.get(&e).cloned()) {
            let mut parent = (*parent).clone();
            let simple_name = ty.name.rsplit('.').next().unwrap_or(&ty.name).to_string();
            parent.members.push(Arc::new(MemberDescriptor {
                id: MemberId {
                    declaring_type: parent.handle,
                    index: parent.members.len() as u32,
                },
                name: simple_name,
                kind: MemberKind::NestedType,
                declaring_type: parent.handle,
                parameters: Vec::new(),
                return_type: handle,
                visibility: ty.visibility,
                is_static: true,
                special_name: false,
                dispid: None,
                policy: ty.policy,
                body: MemberBody::NestedType(handle),
            }));
            insert(&mut inner, parent);
        }

        insert(&mut inner, ty);
        Ok(handle)
    }

    /// Look up a type
    pub fn get(&self, handle: TypeHandle) -> Option<Arc<HostType>> {
        self.inner.read().types.get(&handle).cloned()
    }

    /// Look up a type, failing with a runtime error when unknown
    pub fn expect_type(&self, handle: TypeHandle) -> InteropResult<Arc<HostType>> {
        self.get(handle)
            .ok_or_else(|| InteropError::Runtime(format!("Unknown type handle {}", handle)))
    }

    /// Look up a type by name
    pub fn by_name(&self, name: &str) -> Option<TypeHandle> {
        self.inner.read().by_name.get(name).copied()
    }

    /// Type name for diagnostics
    pub fn type_name(&self, handle: TypeHandle) -> String {
        self.get(handle)
            .map(|t| t.name.clone())
            .unwrap_or_else(|| handle.to_string())
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.inner.read().types.len()
    }

    /// Check if no types are registered
    pub fn is_empty(&self) -> bool {
        self.inner.read().types.is_empty()
    }

    /// Interned array type over `element`
    pub fn array_of(&self, element: TypeHandle) -> TypeHandle {
        if let Some(existing) = self.inner.read().arrays.get(&element) {
            return *existing;
        }

        let mut inner = self.inner.write();
        // Another thread may have interned it between the locks
        if let Some(existing) = inner.arrays.get(&element) {
            return *existing;
        }

        let handle = TypeHandle::from_raw(inner.next_handle);
        inner.next_handle += 1;

        let (element_name, element_assembly, element_visibility) = match inner.types.get(&element) {
            Some(t) => (t.name.clone(), t.assembly.clone(), t.visibility),
            None => (element.to_string(), CORE_ASSEMBLY.to_string(), Visibility::Public),
        };

        let ty = HostType {
            handle,
            name: format!("{}[]", element_name),
            kind: TypeKind::Array { element },
            visibility: element_visibility,
            assembly: element_assembly,
            base: Some(TypeHandle::OBJECT),
            interfaces: Vec::new(),
            enclosing: None,
            members: array_members(handle, element),
            policy: None,
            default_member: Some(ARRAY_INDEXER_NAME.to_string()),
            conversions: Vec::new(),
            is_dynamic: false,
        };
        inner.arrays.insert(element, handle);
        insert(&mut inner, ty);
        handle
    }

    // ------------------------------------------------------------------------
    // Type relationships
    // ------------------------------------------------------------------------

    /// Check if `sub` is `sup` or derives from it through base classes
    pub fn is_subclass_of(&self, sub: TypeHandle, sup: TypeHandle) -> bool {
        if sub == sup {
            return true;
        }
        let inner = self.inner.read();
        let mut current = inner.types.get(&sub).and_then(|t| t.base);
        while let Some(handle) = current {
            if handle == sup {
                return true;
            }
            current = inner.types.get(&handle).and_then(|t| t.base);
        }
        false
    }

    /// Check if `ty` implements `iface`, directly, through a base class or
    /// through interface inheritance
    pub fn implements(&self, ty: TypeHandle, iface: TypeHandle) -> bool {
        let inner = self.inner.read();
        let mut pending = vec![ty];
        let mut seen = Vec::new();
        while let Some(handle) = pending.pop() {
            if seen.contains(&handle) {
                continue;
            }
            seen.push(handle);
            let Some(t) = inner.types.get(&handle) else {
                continue;
            };
            if t.interfaces.contains(&iface) {
                return true;
            }
            pending.extend(t.interfaces.iter().copied());
            pending.extend(t.base);
        }
        false
    }

    /// All interfaces `ty` inherits, nearest first (excluding `ty` itself)
    pub fn interface_closure(&self, ty: TypeHandle) -> Vec<TypeHandle> {
        let inner = self.inner.read();
        let mut result = Vec::new();
        let mut queue: Vec<TypeHandle> = inner
            .types
            .get(&ty)
            .map(|t| t.interfaces.clone())
            .unwrap_or_default();
        let mut index = 0;
        while index < queue.len() {
            let handle = queue[index];
            index += 1;
            if result.contains(&handle) {
                continue;
            }
            result.push(handle);
            if let Some(t) = inner.types.get(&handle) {
                queue.extend(t.interfaces.iter().copied());
            }
        }
        result
    }

    /// Check if a reference to `from` can be stored in a location of type `to`
    /// without conversion
    pub fn is_assignable(&self, from: TypeHandle, to: TypeHandle) -> bool {
        if from == to || to == TypeHandle::OBJECT {
            return true;
        }
        if self.is_subclass_of(from, to) || self.implements(from, to) {
            return true;
        }
        // Array covariance over reference element types
        match (self.get(from).map(|t| t.kind), self.get(to).map(|t| t.kind)) {
            (Some(TypeKind::Array { element: a }), Some(TypeKind::Array { element: b })) => {
                self.is_reference_type(a) && self.is_assignable(a, b)
            }
            _ => false,
        }
    }

    /// Check if null is a valid value of `ty`
    pub fn is_reference_type(&self, ty: TypeHandle) -> bool {
        if ty == TypeHandle::OBJECT || ty == TypeHandle::STRING {
            return true;
        }
        match self.get(ty).map(|t| t.kind) {
            Some(TypeKind::Class)
            | Some(TypeKind::Interface)
            | Some(TypeKind::Array { .. })
            | Some(TypeKind::Delegate) => true,
            Some(TypeKind::Struct)
            | Some(TypeKind::Enum { .. })
            | Some(TypeKind::Primitive)
            | None => false,
        }
    }

    /// Runtime type of a value; `None` for null and markers
    pub fn type_of(&self, value: &Value) -> Option<TypeHandle> {
        if let Some(handle) = value.primitive_type() {
            return Some(handle);
        }
        match value {
            Value::Enum(ty, _) => Some(*ty),
            Value::Array(array) => Some(self.array_of(array.element_type())),
            Value::Object(obj) => Some(obj.type_handle().unwrap_or(TypeHandle::OBJECT)),
            Value::Type(_) => Some(TypeHandle::OBJECT),
            _ => None,
        }
    }

    /// Enclosing types of `ty`, innermost first
    pub fn enclosing_chain(&self, ty: TypeHandle) -> Vec<TypeHandle> {
        let inner = self.inner.read();
        let mut chain = Vec::new();
        let mut current = inner.types.get(&ty).and_then(|t| t.enclosing);
        while let Some(handle) = current {
            chain.push(handle);
            current = inner.types.get(&handle).and_then(|t| t.enclosing);
        }
        chain
    }

    /// Check if code in assembly `from` may use `Assembly`-tier members of
    /// assembly `target`
    pub fn is_friend(&self, from: &str, target: &str) -> bool {
        from == target
            || self
                .inner
                .read()
                .assemblies
                .get(target)
                .is_some_and(|a| a.friends.iter().any(|f| f == from))
    }

    /// Implicit conversions declared on either side that turn `from` into `to`
    pub fn find_conversion(&self, from: TypeHandle, to: TypeHandle) -> Option<ImplicitConversion> {
        let inner = self.inner.read();
        [to, from]
            .iter()
            .filter_map(|h| inner.types.get(h))
            .flat_map(|t| t.conversions.iter())
            .find(|c| c.from == from && c.to == to)
            .cloned()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("types", &self.len())
            .finish()
    }
}

fn insert(inner: &mut RegistryInner, ty: HostType) {
    inner.by_name.insert(ty.name.clone(), ty.handle);
    inner.types.insert(ty.handle, Arc::new(ty));
}

fn describe(target: &Value) -> String {
    match target {
        Value::String(s) => s.to_string(),
        Value::Object(o) => o.describe(),
        Value::Decimal(d) => d.to_string(),
        other => format!("{:?}", other),
    }
}

/// Element indexer and `Length` for a synthesized array type
fn array_members(array: TypeHandle, element: TypeHandle) -> Vec<Arc<MemberDescriptor>> {
    let get: Accessor = Accessor {
        visibility: Visibility::Public,
        invoke: Arc::new(|target, args| {
            let (items, index) = array_slot(target, args)?;
            items
                .get(index)
                .ok_or_else(|| InteropError::argument("index", "Index out of range"))
        }),
    };
    let set: Accessor = Accessor {
        visibility: Visibility::Public,
        invoke: Arc::new(|target, args| {
            let (items, index) = array_slot(target, args)?;
            let value = args.get(1).cloned().unwrap_or_default();
            if items.set(index, value) {
                Ok(Value::Void)
            } else {
                Err(InteropError::argument("index", "Index out of range"))
            }
        }),
    };
    let length: Accessor = Accessor {
        visibility: Visibility::Public,
        invoke: Arc::new(|target, _| {
            let items = target
                .as_array()
                .ok_or_else(|| InteropError::Runtime("Array accessor on non-array target".into()))?;
            Ok(Value::I32(items.len() as i32))
        }),
    };

    let indexer = MemberDescriptor {
        id: MemberId {
            declaring_type: array,
            index: 0,
        },
        name: ARRAY_INDEXER_NAME.to_string(),
        kind: MemberKind::Property,
        declaring_type: array,
        parameters: vec![ParameterInfo::new("index", TypeHandle::I32)],
        return_type: element,
        visibility: Visibility::Public,
        is_static: false,
        special_name: false,
        dispid: Some(DISPID_VALUE),
        policy: None,
        body: MemberBody::Property {
            get: Some(get),
            set: Some(set),
        },
    };
    let len = MemberDescriptor {
        id: MemberId {
            declaring_type: array,
            index: 1,
        },
        name: "Length".to_string(),
        kind: MemberKind::Property,
        declaring_type: array,
        parameters: Vec::new(),
        return_type: TypeHandle::I32,
        visibility: Visibility::Public,
        is_static: false,
        special_name: false,
        dispid: None,
        policy: None,
        body: MemberBody::Property {
            get: Some(length),
            set: None,
        },
    };
    vec![Arc::new(indexer), Arc::new(len)]
}

fn array_slot<'a>(
    target: &'a Value,
    args: &[Value],
) -> InteropResult<(&'a raya_interop_sdk::HostArray, usize)> {
    let items = target
        .as_array()
        .ok_or_else(|| InteropError::Runtime("Array accessor on non-array target".into()))?;
    let index = args
        .first()
        .and_then(Value::as_i128)
        .filter(|i| *i >= 0)
        .ok_or_else(|| InteropError::argument("index", "Expected a non-negative integer"))?;
    Ok((items, index as usize))
}
