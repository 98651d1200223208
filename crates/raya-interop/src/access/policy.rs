//! Script access policies
//!
//! A [`ScriptAccessPolicy`] narrows what scripts may do with an otherwise
//! accessible member. The policy for a member comes from an ordered chain of
//! providers, first match wins:
//!
//! | Order | Provider             | Source                                     |
//! |-------|----------------------|--------------------------------------------|
//! | 1     | `MemberOverride`     | policy declared on the member itself       |
//! | 2     | `EnclosingTypes`     | declaring type, then its enclosing types   |
//! | 3     | `AssemblyOverride`   | policy declared on the declaring assembly  |
//! | 4     | `AssemblyRules`      | configured assembly name patterns          |
//! | -     | caller default       | when no provider answers                   |
//!
//! ## TOML Configuration
//!
//! ```toml
//! [interop.assemblies]
//! "app" = "full"
//! "plugins.*" = "read_only"
//! "untrusted.**" = "none"
//! ```

use std::fmt;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::Deserialize;

use raya_interop_sdk::TypeHandle;

use crate::types::{MemberDescriptor, MemberId, TypeRegistry};

/// What scripts may do with a member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptAccessPolicy {
    /// Hidden from scripts
    None,
    /// Readable and invocable, never written
    #[serde(alias = "readonly")]
    ReadOnly,
    /// Unrestricted
    #[default]
    Full,
}

impl ScriptAccessPolicy {
    /// Parse from string representation
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Some(Self::None),
            "read_only" | "readonly" => Some(Self::ReadOnly),
            "full" => Some(Self::Full),
            _ => None,
        }
    }

    /// Canonical name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::ReadOnly => "read_only",
            Self::Full => "full",
        }
    }

    /// Check if scripts can see the member at all
    pub fn allows_read(&self) -> bool {
        *self != Self::None
    }

    /// Check if scripts can assign the member
    pub fn allows_write(&self) -> bool {
        *self == Self::Full
    }
}

impl fmt::Display for ScriptAccessPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Assembly rules
// ============================================================================

/// Assembly name pattern with a policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyPolicyRule {
    /// Pattern (e.g., "app", "plugins.*", "**")
    pub pattern: String,
    /// Policy for matching assemblies
    pub policy: ScriptAccessPolicy,
}

impl AssemblyPolicyRule {
    /// Create a rule
    pub fn new(pattern: impl Into<String>, policy: ScriptAccessPolicy) -> Self {
        Self {
            pattern: pattern.into(),
            policy,
        }
    }

    /// Check if an assembly name matches this pattern
    ///
    /// `prefix.*` matches direct children of `prefix`, `prefix.**` matches
    /// `prefix` itself and everything below it.
    pub fn matches(&self, assembly: &str) -> bool {
        if self.pattern == "**" || self.pattern == "*" {
            return true;
        }

        if let Some(prefix) = self.pattern.strip_suffix(".**") {
            assembly == prefix
                || assembly
                    .strip_prefix(prefix)
                    .is_some_and(|rest| rest.starts_with('.'))
        } else if let Some(prefix) = self.pattern.strip_suffix(".*") {
            assembly
                .strip_prefix(prefix)
                .and_then(|rest| rest.strip_prefix('.'))
                .is_some_and(|child| !child.is_empty() && !child.contains('.'))
        } else {
            self.pattern == assembly
        }
    }
}

/// Configured assembly policies: exact names first, then patterns in order
#[derive(Debug, Clone, Default)]
pub struct AssemblyRules {
    exact: FxHashMap<String, ScriptAccessPolicy>,
    patterns: Vec<AssemblyPolicyRule>,
}

impl AssemblyRules {
    /// Create an empty rule set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule; patterns containing `*` are matched in insertion order
    pub fn add(&mut self, pattern: impl Into<String>, policy: ScriptAccessPolicy) {
        let pattern = pattern.into();
        if pattern.contains('*') {
            self.patterns.push(AssemblyPolicyRule::new(pattern, policy));
        } else {
            self.exact.insert(pattern, policy);
        }
    }

    /// Resolve the policy for an assembly
    pub fn resolve(&self, assembly: &str) -> Option<ScriptAccessPolicy> {
        if let Some(policy) = self.exact.get(assembly) {
            return Some(*policy);
        }
        self.patterns
            .iter()
            .find(|rule| rule.matches(assembly))
            .map(|rule| rule.policy)
    }

    /// Check if no rules are configured
    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.patterns.is_empty()
    }
}

// ============================================================================
// Provider chain
// ============================================================================

/// One link of the policy chain
pub trait PolicyProvider: Send + Sync {
    /// Provider name for diagnostics
    fn name(&self) -> &'static str;

    /// Policy for `member`, or `None` to defer to the next provider
    fn policy_for(&self, member: &MemberDescriptor, registry: &TypeRegistry) -> Option<ScriptAccessPolicy>;
}

/// Policy declared on the member
pub struct MemberOverride;

impl PolicyProvider for MemberOverride {
    fn name(&self) -> &'static str {
        "member"
    }

    fn policy_for(&self, member: &MemberDescriptor, _registry: &TypeRegistry) -> Option<ScriptAccessPolicy> {
        member.policy
    }
}

/// Policy declared on the declaring type or the nearest enclosing type
pub struct EnclosingTypes;

impl PolicyProvider for EnclosingTypes {
    fn name(&self) -> &'static str {
        "enclosing-types"
    }

    fn policy_for(&self, member: &MemberDescriptor, registry: &TypeRegistry) -> Option<ScriptAccessPolicy> {
        std::iter::once(member.declaring_type)
            .chain(registry.enclosing_chain(member.declaring_type))
            .find_map(|handle| registry.get(handle).and_then(|t| t.policy))
    }
}

/// Policy declared on the declaring assembly
pub struct AssemblyOverride;

impl PolicyProvider for AssemblyOverride {
    fn name(&self) -> &'static str {
        "assembly"
    }

    fn policy_for(&self, member: &MemberDescriptor, registry: &TypeRegistry) -> Option<ScriptAccessPolicy> {
        let ty = registry.get(member.declaring_type)?;
        registry.assembly(&ty.assembly)?.policy
    }
}

impl PolicyProvider for AssemblyRules {
    fn name(&self) -> &'static str {
        "assembly-rules"
    }

    fn policy_for(&self, member: &MemberDescriptor, registry: &TypeRegistry) -> Option<ScriptAccessPolicy> {
        let ty = registry.get(member.declaring_type)?;
        self.resolve(&ty.assembly)
    }
}

type PolicyKey = (MemberId, Option<TypeHandle>, ScriptAccessPolicy);

/// Resolved policies for one generation of assembly metadata
#[derive(Default)]
struct PolicyMemo {
    generation: u64,
    entries: FxHashMap<PolicyKey, ScriptAccessPolicy>,
}

/// Ordered provider chain with a memo of resolved policies
pub struct PolicyResolver {
    providers: Vec<Box<dyn PolicyProvider>>,
    cache: Mutex<PolicyMemo>,
}

impl PolicyResolver {
    /// Standard chain without configured assembly rules
    pub fn new() -> Self {
        Self::with_assembly_rules(AssemblyRules::new())
    }

    /// Standard chain with configured assembly rules as the last provider
    pub fn with_assembly_rules(rules: AssemblyRules) -> Self {
        let mut providers: Vec<Box<dyn PolicyProvider>> =
            vec![Box::new(MemberOverride), Box::new(EnclosingTypes), Box::new(AssemblyOverride)];
        if !rules.is_empty() {
            providers.push(Box::new(rules));
        }
        Self::from_providers(providers)
    }

    /// Custom chain
    pub fn from_providers(providers: Vec<Box<dyn PolicyProvider>>) -> Self {
        Self {
            providers,
            cache: Mutex::new(PolicyMemo::default()),
        }
    }

    /// Provider names in consultation order
    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Resolve the policy for `member`.
    ///
    /// The access context is part of the memo key only; no provider depends
    /// on it. Registering assembly metadata drops every memoized result.
    pub fn resolve(
        &self,
        registry: &TypeRegistry,
        member: &MemberDescriptor,
        context: Option<TypeHandle>,
        default: ScriptAccessPolicy,
    ) -> ScriptAccessPolicy {
        let key = (member.id, context, default);
        let generation = registry.assembly_generation();
        {
            let mut memo = self.cache.lock();
            if memo.generation != generation {
                memo.entries.clear();
                memo.generation = generation;
            }
            if let Some(policy) = memo.entries.get(&key) {
                return *policy;
            }
        }

        let policy = self
            .providers
            .iter()
            .find_map(|p| p.policy_for(member, registry))
            .unwrap_or(default);
        let mut memo = self.cache.lock();
        if memo.generation == generation {
            memo.entries.insert(key, policy);
        }
        policy
    }

    /// Number of memoized resolutions
    pub fn cached_len(&self) -> usize {
        self.cache.lock().entries.len()
    }
}

impl Default for PolicyResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AssemblyInfo, MemberBuilder, TypeBuilder, Visibility};
    use raya_interop_sdk::Value;
    use std::sync::Arc;

    fn field(name: &str) -> MemberBuilder {
        MemberBuilder::field(name, TypeHandle::I32, |_| Ok(Value::I32(0)))
    }

    fn member(registry: &TypeRegistry, ty: TypeHandle, name: &str) -> Arc<MemberDescriptor> {
        registry.get(ty).unwrap().members_named(name).next().unwrap().clone()
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!(ScriptAccessPolicy::parse("NONE"), Some(ScriptAccessPolicy::None));
        assert_eq!(ScriptAccessPolicy::parse("readonly"), Some(ScriptAccessPolicy::ReadOnly));
        assert_eq!(ScriptAccessPolicy::parse("full"), Some(ScriptAccessPolicy::Full));
        assert_eq!(ScriptAccessPolicy::parse("bogus"), None);
        assert_eq!(ScriptAccessPolicy::ReadOnly.to_string(), "read_only");
    }

    #[test]
    fn test_rule_matching() {
        let exact = AssemblyPolicyRule::new("app", ScriptAccessPolicy::Full);
        assert!(exact.matches("app"));
        assert!(!exact.matches("app.core"));

        let children = AssemblyPolicyRule::new("plugins.*", ScriptAccessPolicy::ReadOnly);
        assert!(children.matches("plugins.audio"));
        assert!(!children.matches("plugins"));
        assert!(!children.matches("plugins.audio.codecs"));
        assert!(!children.matches("pluginsx.audio"));

        let subtree = AssemblyPolicyRule::new("plugins.**", ScriptAccessPolicy::None);
        assert!(subtree.matches("plugins"));
        assert!(subtree.matches("plugins.audio.codecs"));
        assert!(!subtree.matches("pluginsx"));

        assert!(AssemblyPolicyRule::new("**", ScriptAccessPolicy::None).matches("anything"));
    }

    #[test]
    fn test_assembly_rules_exact_before_patterns() {
        let mut rules = AssemblyRules::new();
        rules.add("plugins.**", ScriptAccessPolicy::None);
        rules.add("plugins.trusted", ScriptAccessPolicy::Full);
        assert_eq!(rules.resolve("plugins.trusted"), Some(ScriptAccessPolicy::Full));
        assert_eq!(rules.resolve("plugins.other"), Some(ScriptAccessPolicy::None));
        assert_eq!(rules.resolve("app"), None);
    }

    #[test]
    fn test_member_override_wins() {
        let registry = TypeRegistry::new();
        let ty = registry
            .register(
                TypeBuilder::class("Guarded")
                    .policy(ScriptAccessPolicy::None)
                    .member(field("open").policy(ScriptAccessPolicy::Full))
                    .member(field("closed")),
            )
            .unwrap();
        let resolver = PolicyResolver::new();
        let open = member(&registry, ty, "open");
        let closed = member(&registry, ty, "closed");
        assert_eq!(resolver.resolve(&registry, &open, None, ScriptAccessPolicy::Full), ScriptAccessPolicy::Full);
        assert_eq!(resolver.resolve(&registry, &closed, None, ScriptAccessPolicy::Full), ScriptAccessPolicy::None);
    }

    #[test]
    fn test_innermost_enclosing_type_wins() {
        let registry = TypeRegistry::new();
        let outer = registry
            .register(TypeBuilder::class("Outer").policy(ScriptAccessPolicy::None))
            .unwrap();
        let middle = registry
            .register(
                TypeBuilder::class("Outer.Middle")
                    .nested_in(outer, Visibility::Public)
                    .policy(ScriptAccessPolicy::ReadOnly),
            )
            .unwrap();
        let inner = registry
            .register(
                TypeBuilder::class("Outer.Middle.Inner")
                    .nested_in(middle, Visibility::Public)
                    .member(field("value")),
            )
            .unwrap();
        let resolver = PolicyResolver::new();
        let value = member(&registry, inner, "value");
        assert_eq!(
            resolver.resolve(&registry, &value, None, ScriptAccessPolicy::Full),
            ScriptAccessPolicy::ReadOnly
        );
    }

    #[test]
    fn test_assembly_then_default() {
        let registry = TypeRegistry::new();
        registry.register_assembly(AssemblyInfo::new("locked").with_policy(ScriptAccessPolicy::ReadOnly));
        let locked = registry
            .register(TypeBuilder::class("L").in_assembly("locked").member(field("x")))
            .unwrap();
        let open = registry
            .register(TypeBuilder::class("O").in_assembly("open").member(field("x")))
            .unwrap();

        let mut rules = AssemblyRules::new();
        rules.add("open", ScriptAccessPolicy::None);
        let resolver = PolicyResolver::with_assembly_rules(rules);

        let lx = member(&registry, locked, "x");
        let ox = member(&registry, open, "x");
        assert_eq!(resolver.resolve(&registry, &lx, None, ScriptAccessPolicy::Full), ScriptAccessPolicy::ReadOnly);
        assert_eq!(resolver.resolve(&registry, &ox, None, ScriptAccessPolicy::Full), ScriptAccessPolicy::None);

        let plain = PolicyResolver::new();
        assert_eq!(plain.resolve(&registry, &ox, None, ScriptAccessPolicy::ReadOnly), ScriptAccessPolicy::ReadOnly);
    }

    #[test]
    fn test_resolution_is_memoized() {
        let registry = TypeRegistry::new();
        let ty = registry.register(TypeBuilder::class("M").member(field("x"))).unwrap();
        let resolver = PolicyResolver::new();
        let x = member(&registry, ty, "x");
        let first = resolver.resolve(&registry, &x, None, ScriptAccessPolicy::Full);
        let second = resolver.resolve(&registry, &x, None, ScriptAccessPolicy::Full);
        assert_eq!(first, second);
        assert_eq!(resolver.cached_len(), 1);
        resolver.resolve(&registry, &x, Some(ty), ScriptAccessPolicy::Full);
        assert_eq!(resolver.cached_len(), 2);
        assert_eq!(resolver.provider_names(), vec!["member", "enclosing-types", "assembly"]);
    }

    #[test]
    fn test_late_assembly_metadata_replaces_memo() {
        let registry = TypeRegistry::new();
        let ty = registry
            .register(TypeBuilder::class("Late").in_assembly("plugins").member(field("x")))
            .unwrap();
        let resolver = PolicyResolver::new();
        let x = member(&registry, ty, "x");
        assert_eq!(resolver.resolve(&registry, &x, None, ScriptAccessPolicy::Full), ScriptAccessPolicy::Full);

        registry.register_assembly(AssemblyInfo::new("plugins").with_policy(ScriptAccessPolicy::ReadOnly));
        assert_eq!(resolver.resolve(&registry, &x, None, ScriptAccessPolicy::Full), ScriptAccessPolicy::ReadOnly);
        assert_eq!(resolver.cached_len(), 1);
    }
}
