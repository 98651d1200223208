//! Accessibility predicates
//!
//! Pure functions of the registry: nothing here is cached except what the
//! [`PolicyResolver`] memoizes. A `None` access context evaluates public
//! accessibility only.

use raya_interop_sdk::TypeHandle;

use super::policy::{PolicyResolver, ScriptAccessPolicy};
use crate::types::{MemberBody, MemberDescriptor, MemberKind, TypeKind, TypeRegistry, Visibility};

/// Accessibility and scriptability checks over a registry
#[derive(Clone, Copy)]
pub struct AccessModel<'a> {
    registry: &'a TypeRegistry,
    policies: &'a PolicyResolver,
}

impl<'a> AccessModel<'a> {
    /// Create a model over a registry and policy chain
    pub fn new(registry: &'a TypeRegistry, policies: &'a PolicyResolver) -> Self {
        Self { registry, policies }
    }

    /// Underlying registry
    pub fn registry(&self) -> &'a TypeRegistry {
        self.registry
    }

    /// Check if a type can be named from `context`.
    ///
    /// Nested types also require every enclosing type to be accessible.
    pub fn is_type_accessible(&self, ty: TypeHandle, context: Option<TypeHandle>) -> bool {
        let Some(info) = self.registry.get(ty) else {
            return false;
        };
        match info.kind {
            TypeKind::Primitive => return true,
            TypeKind::Array { element } => return self.is_type_accessible(element, context),
            _ => {}
        }

        match info.enclosing {
            Some(enclosing) => {
                self.is_type_accessible(enclosing, context)
                    && self.tier_permits(info.visibility, enclosing, context)
            }
            None => match info.visibility {
                Visibility::Public => true,
                _ => context.is_some_and(|ctx| self.same_or_friend_assembly(ctx, ty)),
            },
        }
    }

    /// Check if a member is reachable from `context`.
    ///
    /// Properties are accessible when either accessor is; events follow
    /// their add accessor.
    pub fn is_member_accessible(&self, member: &MemberDescriptor, context: Option<TypeHandle>) -> bool {
        if !self.is_type_accessible(member.declaring_type, context) {
            return false;
        }
        if let MemberBody::NestedType(nested) = member.body {
            return self.is_type_accessible(nested, context);
        }
        member
            .access_tiers()
            .into_iter()
            .any(|tier| self.tier_permits(tier, member.declaring_type, context))
    }

    /// Resolved script access policy for a member
    pub fn policy(
        &self,
        member: &MemberDescriptor,
        context: Option<TypeHandle>,
        default: ScriptAccessPolicy,
    ) -> ScriptAccessPolicy {
        self.policies.resolve(self.registry, member, context, default)
    }

    /// Check if scripts may see a member: accessible, not compiler-special,
    /// not an explicit interface implementation, and not hidden by policy
    pub fn is_scriptable(
        &self,
        member: &MemberDescriptor,
        context: Option<TypeHandle>,
        default: ScriptAccessPolicy,
    ) -> bool {
        !member.special_name
            && !member.name.contains('.')
            && self.is_member_accessible(member, context)
            && self.policy(member, context, default).allows_read()
    }

    /// Check if scripts may construct through a constructor
    pub fn is_constructor_scriptable(
        &self,
        member: &MemberDescriptor,
        context: Option<TypeHandle>,
        default: ScriptAccessPolicy,
    ) -> bool {
        member.kind == MemberKind::Constructor
            && self.is_member_accessible(member, context)
            && self.policy(member, context, default).allows_read()
    }

    /// Check if scripts may assign a field or property
    pub fn is_writable(
        &self,
        member: &MemberDescriptor,
        context: Option<TypeHandle>,
        default: ScriptAccessPolicy,
    ) -> bool {
        if !self.is_scriptable(member, context, default) || !self.policy(member, context, default).allows_write() {
            return false;
        }
        match &member.body {
            MemberBody::Field { set, .. } => set.is_some(),
            MemberBody::Property { set: Some(setter), .. } => {
                self.tier_permits(setter.visibility, member.declaring_type, context)
            }
            _ => false,
        }
    }

    /// Check if a property getter is reachable from `context`
    pub fn is_readable(&self, member: &MemberDescriptor, context: Option<TypeHandle>) -> bool {
        match &member.body {
            MemberBody::Field { .. } => true,
            MemberBody::Property { get: Some(getter), .. } => {
                self.tier_permits(getter.visibility, member.declaring_type, context)
            }
            _ => false,
        }
    }

    // ------------------------------------------------------------------------
    // Tier composition
    // ------------------------------------------------------------------------

    fn tier_permits(&self, tier: Visibility, declaring: TypeHandle, context: Option<TypeHandle>) -> bool {
        match tier {
            Visibility::Public => true,
            Visibility::Private => context.is_some_and(|ctx| self.is_within(ctx, declaring)),
            Visibility::Family => context.is_some_and(|ctx| self.is_family(ctx, declaring)),
            Visibility::Assembly => context.is_some_and(|ctx| self.same_or_friend_assembly(ctx, declaring)),
            Visibility::FamilyOrAssembly => context.is_some_and(|ctx| {
                self.is_family(ctx, declaring) || self.same_or_friend_assembly(ctx, declaring)
            }),
            Visibility::FamilyAndAssembly => context.is_some_and(|ctx| {
                self.is_family(ctx, declaring) && self.same_or_friend_assembly(ctx, declaring)
            }),
        }
    }

    /// `context` is `declaring` or nested (at any depth) inside it
    fn is_within(&self, context: TypeHandle, declaring: TypeHandle) -> bool {
        context == declaring || self.registry.enclosing_chain(context).contains(&declaring)
    }

    /// `context`, or a type enclosing it, derives from `declaring`
    fn is_family(&self, context: TypeHandle, declaring: TypeHandle) -> bool {
        std::iter::once(context)
            .chain(self.registry.enclosing_chain(context))
            .any(|ty| self.registry.is_subclass_of(ty, declaring))
    }

    fn same_or_friend_assembly(&self, context: TypeHandle, declaring: TypeHandle) -> bool {
        match (self.registry.get(context), self.registry.get(declaring)) {
            (Some(ctx), Some(decl)) => self.registry.is_friend(&ctx.assembly, &decl.assembly),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AssemblyInfo, MemberBuilder, TypeBuilder};
    use raya_interop_sdk::Value;
    use std::sync::Arc;

    struct Fixture {
        registry: TypeRegistry,
        policies: PolicyResolver,
        base: TypeHandle,
        derived: TypeHandle,
        stranger: TypeHandle,
        friend: TypeHandle,
    }

    fn field(name: &str, visibility: Visibility) -> MemberBuilder {
        MemberBuilder::field(name, TypeHandle::I32, |_| Ok(Value::I32(0))).visibility(visibility)
    }

    fn fixture() -> Fixture {
        let registry = TypeRegistry::new();
        registry.register_assembly(AssemblyInfo::new("lib").with_friend("lib.tests"));
        let base = registry
            .register(
                TypeBuilder::class("Base")
                    .in_assembly("lib")
                    .member(field("pub", Visibility::Public))
                    .member(field("priv", Visibility::Private))
                    .member(field("fam", Visibility::Family))
                    .member(field("asm", Visibility::Assembly))
                    .member(field("fam_or_asm", Visibility::FamilyOrAssembly))
                    .member(field("fam_and_asm", Visibility::FamilyAndAssembly))
                    .member(field("IFoo.Bar", Visibility::Public))
                    .member(field("special", Visibility::Public).special_name()),
            )
            .unwrap();
        let derived = registry
            .register(TypeBuilder::class("Derived").in_assembly("app").extends(base))
            .unwrap();
        let stranger = registry.register(TypeBuilder::class("Stranger").in_assembly("app")).unwrap();
        let friend = registry
            .register(TypeBuilder::class("FriendTest").in_assembly("lib.tests"))
            .unwrap();
        Fixture {
            registry,
            policies: PolicyResolver::new(),
            base,
            derived,
            stranger,
            friend,
        }
    }

    fn get(f: &Fixture, name: &str) -> Arc<MemberDescriptor> {
        f.registry.get(f.base).unwrap().members_named(name).next().unwrap().clone()
    }

    #[test]
    fn test_null_context_is_public_only() {
        let f = fixture();
        let model = AccessModel::new(&f.registry, &f.policies);
        assert!(model.is_member_accessible(&get(&f, "pub"), None));
        for name in ["priv", "fam", "asm", "fam_or_asm", "fam_and_asm"] {
            assert!(!model.is_member_accessible(&get(&f, name), None), "{}", name);
        }
    }

    #[test]
    fn test_visibility_tiers() {
        let f = fixture();
        let model = AccessModel::new(&f.registry, &f.policies);

        assert!(model.is_member_accessible(&get(&f, "priv"), Some(f.base)));
        assert!(!model.is_member_accessible(&get(&f, "priv"), Some(f.derived)));

        assert!(model.is_member_accessible(&get(&f, "fam"), Some(f.derived)));
        assert!(!model.is_member_accessible(&get(&f, "fam"), Some(f.stranger)));

        assert!(model.is_member_accessible(&get(&f, "asm"), Some(f.friend)));
        assert!(!model.is_member_accessible(&get(&f, "asm"), Some(f.derived)));

        assert!(model.is_member_accessible(&get(&f, "fam_or_asm"), Some(f.derived)));
        assert!(model.is_member_accessible(&get(&f, "fam_or_asm"), Some(f.friend)));
        assert!(!model.is_member_accessible(&get(&f, "fam_or_asm"), Some(f.stranger)));

        // Derived lives outside the assembly
        assert!(!model.is_member_accessible(&get(&f, "fam_and_asm"), Some(f.derived)));
        assert!(model.is_member_accessible(&get(&f, "fam_and_asm"), Some(f.base)));
    }

    #[test]
    fn test_scriptable_excludes_special_and_qualified_names() {
        let f = fixture();
        let model = AccessModel::new(&f.registry, &f.policies);
        assert!(model.is_scriptable(&get(&f, "pub"), None, ScriptAccessPolicy::Full));
        assert!(!model.is_scriptable(&get(&f, "IFoo.Bar"), None, ScriptAccessPolicy::Full));
        assert!(!model.is_scriptable(&get(&f, "special"), None, ScriptAccessPolicy::Full));
        assert!(!model.is_scriptable(&get(&f, "pub"), None, ScriptAccessPolicy::None));
        assert!(model.is_scriptable(&get(&f, "pub"), None, ScriptAccessPolicy::ReadOnly));
    }

    #[test]
    fn test_property_either_accessor() {
        let registry = TypeRegistry::new();
        let policies = PolicyResolver::new();
        let ty = registry
            .register(
                TypeBuilder::class("P")
                    .member(
                        MemberBuilder::property("WriteOnlyPublic", TypeHandle::I32)
                            .getter(|_, _| Ok(Value::I32(1)))
                            .getter_visibility(Visibility::Private)
                            .setter(|_, _| Ok(Value::Void)),
                    )
                    .member(
                        MemberBuilder::property("Hidden", TypeHandle::I32)
                            .getter(|_, _| Ok(Value::I32(1)))
                            .getter_visibility(Visibility::Private),
                    ),
            )
            .unwrap();
        let model = AccessModel::new(&registry, &policies);
        let info = registry.get(ty).unwrap();
        let wop = info.members_named("WriteOnlyPublic").next().unwrap();
        let hidden = info.members_named("Hidden").next().unwrap();
        assert!(model.is_member_accessible(wop, None));
        assert!(!model.is_readable(wop, None));
        assert!(model.is_writable(wop, None, ScriptAccessPolicy::Full));
        assert!(!model.is_member_accessible(hidden, None));
    }

    #[test]
    fn test_event_uses_add_accessor() {
        let registry = TypeRegistry::new();
        let policies = PolicyResolver::new();
        let ty = registry
            .register(
                TypeBuilder::class("E").member(
                    MemberBuilder::event("Changed", TypeHandle::OBJECT, |_, _| Ok(Value::Void), |_, _| Ok(Value::Void))
                        .add_visibility(Visibility::Private),
                ),
            )
            .unwrap();
        let model = AccessModel::new(&registry, &policies);
        let event = registry.get(ty).unwrap().members_named("Changed").next().unwrap().clone();
        assert!(!model.is_member_accessible(&event, None));
        assert!(model.is_member_accessible(&event, Some(ty)));
    }

    #[test]
    fn test_nested_type_requires_enclosing_chain() {
        let registry = TypeRegistry::new();
        let policies = PolicyResolver::new();
        let outer = registry.register(TypeBuilder::class("Outer").in_assembly("lib").internal()).unwrap();
        let inner = registry
            .register(TypeBuilder::class("Outer.Inner").in_assembly("lib").nested_in(outer, Visibility::Public))
            .unwrap();
        let hidden = registry
            .register(TypeBuilder::class("Outer.Hidden").in_assembly("lib").nested_in(outer, Visibility::Private))
            .unwrap();
        let lib_type = registry.register(TypeBuilder::class("LibType").in_assembly("lib")).unwrap();
        let model = AccessModel::new(&registry, &policies);

        assert!(!model.is_type_accessible(inner, None));
        assert!(model.is_type_accessible(inner, Some(lib_type)));
        assert!(!model.is_type_accessible(hidden, Some(lib_type)));
        assert!(model.is_type_accessible(hidden, Some(inner)));
    }

    #[test]
    fn test_read_only_policy_blocks_writes() {
        let registry = TypeRegistry::new();
        let policies = PolicyResolver::new();
        let ty = registry
            .register(
                TypeBuilder::class("W").member(
                    MemberBuilder::field("x", TypeHandle::I32, |_| Ok(Value::I32(0)))
                        .field_setter(|_, _| Ok(()))
                        .policy(ScriptAccessPolicy::ReadOnly),
                ),
            )
            .unwrap();
        let model = AccessModel::new(&registry, &policies);
        let x = registry.get(ty).unwrap().members_named("x").next().unwrap().clone();
        assert!(model.is_scriptable(&x, None, ScriptAccessPolicy::Full));
        assert!(!model.is_writable(&x, None, ScriptAccessPolicy::Full));
    }
}
