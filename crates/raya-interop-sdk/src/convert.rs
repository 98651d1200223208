//! Traits for converting between interop values and Rust types.
//!
//! Host member implementations use these to read their bound arguments and
//! build results without matching on [`Value`] by hand.
//!
//! # Example
//!
//! ```ignore
//! use raya_interop_sdk::{FromValue, ToValue, Value};
//!
//! let doubled = i32::from_value(&Value::I32(21))? * 2;
//! assert_eq!(doubled.to_value(), Value::I32(42));
//! ```

use crate::error::{InteropError, InteropResult};
use crate::value::{Decimal, Value};

/// Convert from a `Value` to a Rust type.
pub trait FromValue: Sized {
    /// Convert, returning an error if the value's category doesn't match
    fn from_value(value: &Value) -> InteropResult<Self>;
}

/// Convert from a Rust type to a `Value`.
pub trait ToValue {
    /// Convert to a Value
    fn to_value(self) -> Value;
}

fn mismatch(expected: &str, got: &Value) -> InteropError {
    InteropError::Runtime(format!(
        "Type mismatch: expected {}, got {}",
        expected,
        got.type_name()
    ))
}

macro_rules! impl_primitive {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: &Value) -> InteropResult<Self> {
                    match value {
                        Value::$variant(v) => Ok(*v),
                        other => Err(mismatch(stringify!($ty), other)),
                    }
                }
            }

            impl ToValue for $ty {
                fn to_value(self) -> Value {
                    Value::$variant(self)
                }
            }
        )*
    };
}

impl_primitive! {
    bool => Bool,
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    Decimal => Decimal,
}

impl FromValue for String {
    fn from_value(value: &Value) -> InteropResult<Self> {
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| mismatch("string", value))
    }
}

impl ToValue for String {
    fn to_value(self) -> Value {
        Value::from(self)
    }
}

impl ToValue for &str {
    fn to_value(self) -> Value {
        Value::from(self)
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> InteropResult<Self> {
        Ok(value.clone())
    }
}

impl ToValue for Value {
    fn to_value(self) -> Value {
        self
    }
}

// Null maps to None
impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> InteropResult<Self> {
        if value.is_null() || value.is_missing() {
            Ok(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null,
        }
    }
}

// Unit type (for members that return void)
impl ToValue for () {
    fn to_value(self) -> Value {
        Value::Void
    }
}
