//! Invocability of host types
//!
//! Whether (and how) a value of a type can be called directly. Derived from
//! the type, binding mode, access context, default policy and the "ignore
//! dynamic" flag, and cached on that 5-tuple.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use raya_interop_sdk::TypeHandle;

use crate::access::ScriptAccessPolicy;
use crate::catalog::BindingMode;

/// How a value of a type is invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Invocability {
    /// Not callable
    None,
    /// Delegate: invoked through its `Invoke` method
    Delegate,
    /// Resolves calls through the dynamic bridge
    Dynamic,
    /// Calls read the default (indexed) property
    DefaultProperty,
}

/// Cache key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InvocabilityKey {
    /// Target type
    pub ty: TypeHandle,
    /// Instance or static access
    pub mode: BindingMode,
    /// Access context
    pub context: Option<TypeHandle>,
    /// Default policy
    pub default: ScriptAccessPolicy,
    /// Skip the dynamic classification
    pub ignore_dynamic: bool,
}

/// Shared invocability table
#[derive(Default)]
pub struct InvocabilityCache {
    table: Mutex<FxHashMap<InvocabilityKey, Invocability>>,
}

impl InvocabilityCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached value for `key`, computing it under the table lock on a miss
    pub fn get_or_compute<F>(&self, key: InvocabilityKey, compute: F) -> Invocability
    where
        F: FnOnce() -> Invocability,
    {
        let mut table = self.table.lock();
        *table.entry(key).or_insert_with(compute)
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.table.lock().len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.table.lock().is_empty()
    }
}
