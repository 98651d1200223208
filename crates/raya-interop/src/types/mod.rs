//! Host type model
//!
//! The bridge does not define a type system of its own; hosts describe their
//! types to it. A registered [`HostType`] carries its category, hierarchy,
//! nesting, assembly and members, and each [`MemberDescriptor`] carries the
//! callbacks that perform the actual host work.

mod builder;
mod host_object;
mod member;
mod registry;

pub use builder::{MemberBuilder, TypeBuilder, CONSTRUCTOR_NAME, DELEGATE_INVOKE_NAME};
pub use host_object::{host_ref, DynamicHostObject, HostObject};
pub use member::{
    Accessor, ConversionFn, DefaultValue, FieldGetFn, FieldSetFn, MemberBody, MemberDescriptor, MemberId,
    MemberKind, MethodFn, ParameterInfo, Visibility,
};
pub use registry::{
    AssemblyInfo, HostType, ImplicitConversion, TypeKind, TypeRegistry, ARRAY_INDEXER_NAME, CORE_ASSEMBLY,
};
