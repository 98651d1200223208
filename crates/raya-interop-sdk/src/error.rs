//! Error taxonomy for member resolution and invocation

use std::error::Error as StdError;
use std::sync::Arc;

/// Result type for interop operations
pub type InteropResult<T> = Result<T, InteropError>;

/// Interop error types
#[derive(Debug, Clone, thiserror::Error)]
pub enum InteropError {
    /// No scriptable member or overload matches the requested name and arity
    #[error("Member not found: {name}")]
    MissingMember {
        /// Requested member name
        name: String,
    },

    /// More than one overload is equally applicable
    #[error("Ambiguous match for member: {name}")]
    AmbiguousMatch {
        /// Requested member name
        name: String,
    },

    /// An argument cannot be coerced to its parameter's type
    #[error("Argument error for parameter '{parameter}': {message}")]
    ArgumentError {
        /// Offending parameter name
        parameter: String,
        /// Description of the mismatch
        message: String,
    },

    /// Too few arguments for a non-optional parameter
    #[error("Parameter count mismatch for {member}: expected {expected}, got {got}")]
    ArgumentCount {
        /// Member name
        member: String,
        /// Number of required parameters
        expected: usize,
        /// Number of supplied arguments
        got: usize,
    },

    /// Access policy forbids the operation
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Mutation of a read-only member
    #[error("Member is read-only: {name}")]
    ReadOnly {
        /// Member name
        name: String,
    },

    /// A dynamic target declined the requested operation shape
    #[error("Operation not supported by dynamic target: {operation}")]
    Unbound {
        /// Operation description
        operation: String,
    },

    /// Native dispatch returned a non-recoverable status code
    #[error("Native call failed with status {code:#010X}: {message}")]
    NativeCall {
        /// Native status code
        code: i32,
        /// Call description
        message: String,
    },

    /// Host code invoked through a dynamic target raised an error
    #[error("{context}: {source}")]
    HostCallback {
        /// Where the failure crossed back into the core
        context: String,
        /// The original failure
        source: Arc<dyn StdError + Send + Sync>,
    },

    /// Native resource acquisition failed
    #[error("Resource error: {0}")]
    Resource(String),

    /// Another enumeration is active against the same native target
    #[error("Member enumeration already in progress for this target")]
    EnumerationBusy,

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failure raised by a host member implementation
    #[error("{0}")]
    Runtime(String),
}

impl InteropError {
    /// Create a missing-member error
    pub fn missing(name: impl Into<String>) -> Self {
        InteropError::MissingMember { name: name.into() }
    }

    /// Create an argument error naming the parameter
    pub fn argument(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        InteropError::ArgumentError {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Wrap a host failure, keeping the original error as the source
    pub fn host_callback(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        InteropError::HostCallback {
            context: context.into(),
            source: Arc::new(source),
        }
    }

    /// True for resolution misses that an alternative dispatch strategy may
    /// still satisfy
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            InteropError::MissingMember { .. }
                | InteropError::AmbiguousMatch { .. }
                | InteropError::Unbound { .. }
        )
    }

    /// True for the dynamic bridge's unbound-operation signal
    pub fn is_unbound(&self) -> bool {
        matches!(self, InteropError::Unbound { .. })
    }
}

impl From<String> for InteropError {
    fn from(s: String) -> Self {
        InteropError::Runtime(s)
    }
}

impl From<&str> for InteropError {
    fn from(s: &str) -> Self {
        InteropError::Runtime(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("disk on fire")]
    struct HostFailure;

    #[test]
    fn test_recoverable() {
        assert!(InteropError::missing("x").is_recoverable());
        assert!(InteropError::Unbound { operation: "GetMember(x)".into() }.is_recoverable());
        assert!(!InteropError::argument("a", "bad").is_recoverable());
        assert!(!InteropError::NativeCall { code: -1, message: String::new() }.is_recoverable());
    }

    #[test]
    fn test_host_callback_keeps_source() {
        let err = InteropError::host_callback("InvokeMember(save)", HostFailure);
        assert_eq!(err.to_string(), "InvokeMember(save): disk on fire");
        let source = StdError::source(&err).expect("source");
        assert_eq!(source.to_string(), "disk on fire");
    }

    #[test]
    fn test_native_code_format() {
        let err = InteropError::NativeCall {
            code: 0x8002_0009_u32 as i32,
            message: "InvokeEx".into(),
        };
        assert!(err.to_string().contains("0x80020009"));
    }
}
