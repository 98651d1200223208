//! Raya Interop SDK - contracts between script engines and the interop core
//!
//! This crate carries the types a script engine (or a native dispatch
//! target) needs to talk to `raya-interop` without depending on the core's
//! internals:
//!
//! - [`Value`], [`HostArray`], [`Decimal`] and [`TypeHandle`]
//! - [`Arg`] / [`ByRefSlot`] for by-reference arguments
//! - [`InteropError`], the error taxonomy
//! - [`EngineHooks`], the result-preparation and host-exception hooks
//! - [`DynamicObject`], the dynamic-binding protocol
//! - [`Variant`] / [`DispatchEx`], the native variant ABI
//! - [`FromValue`] / [`ToValue`] conversions

#![warn(missing_docs)]

pub mod args;
pub mod convert;
pub mod dynamic;
pub mod error;
pub mod hooks;
pub mod object;
pub mod value;
pub mod variant;

pub use args::{plain_args, Arg, ByRefSlot};
pub use convert::{FromValue, ToValue};
pub use dynamic::{CallShape, DynamicBinding, DynamicObject, DynamicOperation, DynamicRoutine};
pub use error::{InteropError, InteropResult};
pub use hooks::{DefaultHooks, EngineHooks, ScriptMemberFlags};
pub use object::{ObjectRef, ScriptObject};
pub use value::{Decimal, HostArray, TypeHandle, Value};
pub use variant::{DispId, DispParams, DispatchEx, HResult, Variant};
