//! EngineHooks trait - callbacks from the core into the script engine
//!
//! The core calls `prepare_result` after every successful invocation and
//! `throw_host_exception` when host code reached through a dynamic target
//! fails, so the engine can attach its own diagnostic context before the
//! error crosses back into script code.

use crate::error::InteropError;
use crate::value::{TypeHandle, Value};

/// Member flags passed to result preparation (bitflags)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ScriptMemberFlags(u8);

impl ScriptMemberFlags {
    /// No flags
    pub const NONE: Self = Self(0x00);
    /// Member is exposed read-only to script code
    pub const READ_ONLY: Self = Self(0x01);
    /// Expose the runtime type of the result instead of the declared type
    pub const EXPOSE_RUNTIME_TYPE: Self = Self(0x02);
    /// Wrap null results so the declared type survives
    pub const WRAP_NULL_RESULT: Self = Self(0x04);

    /// Create from raw bits
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Get raw bits
    pub const fn bits(&self) -> u8 {
        self.0
    }

    /// Check if all flags in `other` are set
    pub const fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Union of flags
    pub const fn union(&self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// Hooks implemented by the script-engine layer.
pub trait EngineHooks: Send + Sync {
    /// Marshal a raw invocation result for the dynamic caller
    fn prepare_result(
        &self,
        raw: Value,
        _declared_type: TypeHandle,
        _flags: ScriptMemberFlags,
    ) -> Value {
        raw
    }

    /// Attach engine context to a host failure before it reaches script code.
    ///
    /// Implementations must keep the original error reachable through
    /// `source()`.
    fn throw_host_exception(&self, error: InteropError) -> InteropError {
        error
    }
}

/// Hooks that pass results and errors through unchanged
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultHooks;

impl EngineHooks for DefaultHooks {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags() {
        let flags = ScriptMemberFlags::READ_ONLY.union(ScriptMemberFlags::WRAP_NULL_RESULT);
        assert!(flags.contains(ScriptMemberFlags::READ_ONLY));
        assert!(!flags.contains(ScriptMemberFlags::EXPOSE_RUNTIME_TYPE));
        assert_eq!(flags.bits(), 0x05);
    }

    #[test]
    fn test_default_hooks_pass_through() {
        let hooks = DefaultHooks;
        let v = hooks.prepare_result(Value::I32(3), TypeHandle::I32, ScriptMemberFlags::NONE);
        assert_eq!(v, Value::I32(3));
    }
}
