//! Call arguments - plain values and by-reference slots
//!
//! A script engine marks an argument by-reference when the caller expects
//! to observe the callee's post-call value (`ref`/`out` parameters). The
//! slot is shared: the core writes the post-call value into it once the
//! call has returned successfully.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::value::{TypeHandle, Value};

/// Shared by-reference argument cell.
#[derive(Clone)]
pub struct ByRefSlot {
    cell: Arc<Mutex<Value>>,
    declared_type: Option<TypeHandle>,
}

impl ByRefSlot {
    /// Create an untyped slot holding `value`
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            cell: Arc::new(Mutex::new(value.into())),
            declared_type: None,
        }
    }

    /// Create a slot that declares the type it expects to carry
    pub fn typed(value: impl Into<Value>, declared_type: TypeHandle) -> Self {
        Self {
            cell: Arc::new(Mutex::new(value.into())),
            declared_type: Some(declared_type),
        }
    }

    /// Current value
    pub fn get(&self) -> Value {
        self.cell.lock().clone()
    }

    /// Replace the current value
    pub fn set(&self, value: Value) {
        *self.cell.lock() = value;
    }

    /// Declared type, if any
    pub fn declared_type(&self) -> Option<TypeHandle> {
        self.declared_type
    }

    /// Check if two slots share the same cell
    pub fn ptr_eq(&self, other: &ByRefSlot) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }
}

impl fmt::Debug for ByRefSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ByRef({:?})", *self.cell.lock())
    }
}

/// One call argument.
#[derive(Clone, Debug)]
pub enum Arg {
    /// Passed by value
    Plain(Value),
    /// Passed by reference; receives the post-call value
    ByRef(ByRefSlot),
}

impl Arg {
    /// Plain argument
    pub fn plain(value: impl Into<Value>) -> Self {
        Arg::Plain(value.into())
    }

    /// By-reference argument with a fresh slot
    pub fn by_ref(value: impl Into<Value>) -> Self {
        Arg::ByRef(ByRefSlot::new(value))
    }

    /// Current value (the slot's value for by-ref arguments)
    pub fn value(&self) -> Value {
        match self {
            Arg::Plain(v) => v.clone(),
            Arg::ByRef(slot) => slot.get(),
        }
    }

    /// Replace the argument's value in place
    pub fn set_value(&mut self, value: Value) {
        match self {
            Arg::Plain(v) => *v = value,
            Arg::ByRef(slot) => slot.set(value),
        }
    }

    /// Check if passed by reference
    pub fn is_by_ref(&self) -> bool {
        matches!(self, Arg::ByRef(_))
    }

    /// Get the by-reference slot
    pub fn as_by_ref(&self) -> Option<&ByRefSlot> {
        match self {
            Arg::ByRef(slot) => Some(slot),
            Arg::Plain(_) => None,
        }
    }
}

impl From<Value> for Arg {
    fn from(value: Value) -> Self {
        Arg::Plain(value)
    }
}

impl From<ByRefSlot> for Arg {
    fn from(slot: ByRefSlot) -> Self {
        Arg::ByRef(slot)
    }
}

/// Build a plain argument list from values
pub fn plain_args<I, V>(values: I) -> Vec<Arg>
where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
{
    values.into_iter().map(Arg::plain).collect()
}
