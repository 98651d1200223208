//! Member catalog
//!
//! Enumerates the scriptable members of a type: the declared members of the
//! type and its ancestors, filtered through the accessibility model and
//! script access policies, with base members hidden by an identically-signed
//! derived member counted once.
//!
//! Interfaces union the members of every inherited interface, plus the
//! methods (only) of `Object`.

use std::sync::Arc;

use raya_interop_sdk::variant::DISPID_VALUE;
use raya_interop_sdk::{InteropError, InteropResult, TypeHandle, Value};

use crate::access::{AccessModel, ScriptAccessPolicy};
use crate::invocability::{Invocability, InvocabilityCache, InvocabilityKey};
use crate::overload::{OverloadSelector, Selection};
use crate::types::{MemberDescriptor, MemberKind, TypeKind};

/// Instance or static member access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingMode {
    /// Members of an instance
    Instance,
    /// Static members and nested types of a type
    Static,
}

impl BindingMode {
    fn admits(self, member: &MemberDescriptor) -> bool {
        match member.kind {
            MemberKind::Constructor => false,
            MemberKind::NestedType => self == BindingMode::Static,
            _ => member.is_static == (self == BindingMode::Static),
        }
    }
}

// ============================================================================
// CandidateSet
// ============================================================================

/// Members sharing a lookup, deduplicated by name, kind and parameter
/// signature (return types ignored)
#[derive(Debug, Clone, Default)]
pub struct CandidateSet {
    members: Vec<Arc<MemberDescriptor>>,
}

impl CandidateSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a member unless an equivalent one is already present.
    /// Returns true if the member was added.
    pub fn insert(&mut self, member: Arc<MemberDescriptor>) -> bool {
        let duplicate = self
            .members
            .iter()
            .any(|m| m.name == member.name && m.kind == member.kind && m.signature_eq(&member));
        if !duplicate {
            self.members.push(member);
        }
        !duplicate
    }

    /// Number of members
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Check if the set is empty
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Iterate over members
    pub fn iter(&self) -> impl Iterator<Item = &Arc<MemberDescriptor>> {
        self.members.iter()
    }

    /// Members as a slice
    pub fn as_slice(&self) -> &[Arc<MemberDescriptor>] {
        &self.members
    }

    /// First member
    pub fn first(&self) -> Option<&Arc<MemberDescriptor>> {
        self.members.first()
    }

    /// Subset with a given name
    pub fn named(&self, name: &str) -> CandidateSet {
        self.filter(|m| m.name == name)
    }

    /// Subset of a given kind
    pub fn of_kind(&self, kind: MemberKind) -> CandidateSet {
        self.filter(|m| m.kind == kind)
    }

    /// Subset matching a predicate
    pub fn filter(&self, predicate: impl Fn(&MemberDescriptor) -> bool) -> CandidateSet {
        CandidateSet {
            members: self.members.iter().filter(|m| predicate(m)).cloned().collect(),
        }
    }

    /// Distinct names in first-seen order
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for member in &self.members {
            if !names.contains(&member.name) {
                names.push(member.name.clone());
            }
        }
        names
    }
}

impl FromIterator<Arc<MemberDescriptor>> for CandidateSet {
    fn from_iter<I: IntoIterator<Item = Arc<MemberDescriptor>>>(iter: I) -> Self {
        let mut set = CandidateSet::new();
        for member in iter {
            set.insert(member);
        }
        set
    }
}

// ============================================================================
// MemberCatalog
// ============================================================================

/// Scriptable-member queries over the access model
#[derive(Clone, Copy)]
pub struct MemberCatalog<'a> {
    access: AccessModel<'a>,
    invocability: &'a InvocabilityCache,
}

impl<'a> MemberCatalog<'a> {
    /// Create a catalog
    pub fn new(access: AccessModel<'a>, invocability: &'a InvocabilityCache) -> Self {
        Self { access, invocability }
    }

    /// Access model in use
    pub fn access(&self) -> AccessModel<'a> {
        self.access
    }

    /// Types whose declared members are visible through `ty`, nearest first
    fn hierarchy(&self, ty: TypeHandle) -> Vec<TypeHandle> {
        let registry = self.access.registry();
        let Some(info) = registry.get(ty) else {
            return Vec::new();
        };
        if info.is_interface() {
            let mut chain = vec![ty];
            chain.extend(registry.interface_closure(ty));
            return chain;
        }
        let mut chain = vec![ty];
        let mut current = info.base;
        while let Some(handle) = current {
            chain.push(handle);
            current = registry.get(handle).and_then(|t| t.base);
        }
        chain
    }

    /// Every scriptable member of `ty` for the binding mode
    pub fn scriptable_members(
        &self,
        ty: TypeHandle,
        mode: BindingMode,
        context: Option<TypeHandle>,
        default: ScriptAccessPolicy,
    ) -> CandidateSet {
        let registry = self.access.registry();
        let mut set = CandidateSet::new();
        for handle in self.hierarchy(ty) {
            let Some(info) = registry.get(handle) else {
                continue;
            };
            for member in &info.members {
                if mode.admits(member) && self.access.is_scriptable(member, context, default) {
                    set.insert(member.clone());
                }
            }
        }

        let is_interface = registry.get(ty).is_some_and(|t| t.is_interface());
        if is_interface && mode == BindingMode::Instance {
            if let Some(object) = registry.get(TypeHandle::OBJECT) {
                for member in object.members.iter().filter(|m| m.kind == MemberKind::Method) {
                    if self.access.is_scriptable(member, context, default) {
                        set.insert(member.clone());
                    }
                }
            }
        }
        set
    }

    /// Scriptable members of `ty` with a given name
    pub fn members_named(
        &self,
        ty: TypeHandle,
        mode: BindingMode,
        name: &str,
        context: Option<TypeHandle>,
        default: ScriptAccessPolicy,
    ) -> CandidateSet {
        self.scriptable_members(ty, mode, context, default).named(name)
    }

    /// Scriptable fields
    pub fn scriptable_fields(&self, ty: TypeHandle, mode: BindingMode, context: Option<TypeHandle>, default: ScriptAccessPolicy) -> CandidateSet {
        self.scriptable_members(ty, mode, context, default).of_kind(MemberKind::Field)
    }

    /// Scriptable properties
    pub fn scriptable_properties(&self, ty: TypeHandle, mode: BindingMode, context: Option<TypeHandle>, default: ScriptAccessPolicy) -> CandidateSet {
        self.scriptable_members(ty, mode, context, default).of_kind(MemberKind::Property)
    }

    /// Scriptable methods
    pub fn scriptable_methods(&self, ty: TypeHandle, mode: BindingMode, context: Option<TypeHandle>, default: ScriptAccessPolicy) -> CandidateSet {
        self.scriptable_members(ty, mode, context, default).of_kind(MemberKind::Method)
    }

    /// Scriptable events
    pub fn scriptable_events(&self, ty: TypeHandle, mode: BindingMode, context: Option<TypeHandle>, default: ScriptAccessPolicy) -> CandidateSet {
        self.scriptable_members(ty, mode, context, default).of_kind(MemberKind::Event)
    }

    /// Scriptable nested types (static mode only)
    pub fn scriptable_nested_types(&self, ty: TypeHandle, context: Option<TypeHandle>, default: ScriptAccessPolicy) -> CandidateSet {
        self.scriptable_members(ty, BindingMode::Static, context, default)
            .of_kind(MemberKind::NestedType)
    }

    /// Constructors scripts may call
    pub fn scriptable_constructors(&self, ty: TypeHandle, context: Option<TypeHandle>, default: ScriptAccessPolicy) -> CandidateSet {
        let Some(info) = self.access.registry().get(ty) else {
            return CandidateSet::new();
        };
        info.members
            .iter()
            .filter(|m| self.access.is_constructor_scriptable(m, context, default))
            .cloned()
            .collect()
    }

    /// Default (indexer) properties.
    ///
    /// Arrays expose their synthesized element indexer. Other types expose
    /// properties named by the type's default member or tagged with the
    /// default dispatch identifier.
    pub fn scriptable_default_properties(
        &self,
        ty: TypeHandle,
        mode: BindingMode,
        context: Option<TypeHandle>,
        default: ScriptAccessPolicy,
    ) -> CandidateSet {
        let registry = self.access.registry();
        let Some(info) = registry.get(ty) else {
            return CandidateSet::new();
        };
        let default_member = info.default_member.clone();
        let properties = self.scriptable_properties(ty, mode, context, default);

        if let TypeKind::Array { .. } = info.kind {
            return properties.filter(|p| p.is_indexer());
        }
        properties.filter(|p| {
            default_member.as_deref() == Some(p.name.as_str()) || p.dispid == Some(DISPID_VALUE)
        })
    }

    /// Distinct scriptable member names
    pub fn member_names(
        &self,
        ty: TypeHandle,
        mode: BindingMode,
        context: Option<TypeHandle>,
        default: ScriptAccessPolicy,
    ) -> Vec<String> {
        self.scriptable_members(ty, mode, context, default).names()
    }

    // ------------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------------

    /// Select a property among candidates for the given index arguments.
    ///
    /// A lone candidate is accepted without type checks when the argument
    /// count matches its parameter count, or when at least one argument is
    /// supplied and fewer than declared. Otherwise the overload selector
    /// decides, and the count heuristic is retried only if it fails.
    pub fn select_property(
        &self,
        candidates: &CandidateSet,
        name: &str,
        args: &[Value],
    ) -> InteropResult<Arc<MemberDescriptor>> {
        let count_compatible = |m: &MemberDescriptor| {
            let params = m.parameters.len();
            args.len() == params || (!args.is_empty() && args.len() < params)
        };

        if candidates.len() == 1 {
            if let Some(only) = candidates.first().filter(|m| count_compatible(m)) {
                return Ok(only.clone());
            }
        }

        let selection = OverloadSelector::new(self.access.registry()).select(candidates.as_slice(), args);
        if let Selection::Found(member) = selection {
            return Ok(member);
        }

        let compatible = candidates.filter(|m| count_compatible(m));
        if compatible.len() == 1 {
            if let Some(member) = compatible.first() {
                tracing::trace!(name, "property selected by argument count");
                return Ok(member.clone());
            }
        }
        Err(selection_error(selection, name))
    }

    /// Select a method (or constructor) overload
    pub fn select_method(
        &self,
        candidates: &CandidateSet,
        name: &str,
        args: &[Value],
    ) -> InteropResult<Arc<MemberDescriptor>> {
        match OverloadSelector::new(self.access.registry()).select(candidates.as_slice(), args) {
            Selection::Found(member) => Ok(member),
            other => Err(selection_error(other, name)),
        }
    }

    // ------------------------------------------------------------------------
    // Invocability
    // ------------------------------------------------------------------------

    /// How values of `ty` are invoked, cached per 5-tuple
    pub fn invocability(
        &self,
        ty: TypeHandle,
        mode: BindingMode,
        context: Option<TypeHandle>,
        default: ScriptAccessPolicy,
        ignore_dynamic: bool,
    ) -> Invocability {
        let key = InvocabilityKey {
            ty,
            mode,
            context,
            default,
            ignore_dynamic,
        };
        self.invocability.get_or_compute(key, || {
            let Some(info) = self.access.registry().get(ty) else {
                return Invocability::None;
            };
            if info.is_delegate() {
                Invocability::Delegate
            } else if !ignore_dynamic && info.is_dynamic {
                Invocability::Dynamic
            } else if !self.scriptable_default_properties(ty, mode, context, default).is_empty() {
                Invocability::DefaultProperty
            } else {
                Invocability::None
            }
        })
    }
}

fn selection_error(selection: Selection, name: &str) -> InteropError {
    match selection {
        Selection::Ambiguous => InteropError::AmbiguousMatch { name: name.to_string() },
        _ => InteropError::missing(name),
    }
}
