//! Accessibility model and script access policies

mod policy;
mod visibility;

pub use policy::{
    AssemblyOverride, AssemblyPolicyRule, AssemblyRules, EnclosingTypes, MemberOverride, PolicyProvider,
    PolicyResolver, ScriptAccessPolicy,
};
pub use visibility::AccessModel;
