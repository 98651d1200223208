//! Implicit argument conversions
//!
//! Conversions are ranked; lower ranks are preferred when comparing
//! overloads:
//!
//! | Rank               | Example                                      |
//! |--------------------|----------------------------------------------|
//! | `Exact`            | `I32` → `Int32`                              |
//! | `UserDefined`      | implicit operator on either type             |
//! | `Assignable`       | `Derived` → `Base`, anything → `Object`      |
//! | `NumericWidening`  | `I32` → `Int64`, `I64` → `Double`, `0` → enum |
//!
//! Narrowing conversions and enum ↔ underlying conversions (other than the
//! integral zero literal) are never implicit.

use raya_interop_sdk::{Decimal, InteropError, InteropResult, TypeHandle, Value};

use crate::types::{TypeKind, TypeRegistry};

/// Quality of an implicit conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConversionRank {
    /// Argument type equals parameter type
    Exact,
    /// Implicit conversion declared on the argument or parameter type
    UserDefined,
    /// Reference conversion through the type hierarchy
    Assignable,
    /// Built-in numeric widening
    NumericWidening,
}

/// Check for a built-in implicit numeric conversion
pub fn widens(from: TypeHandle, to: TypeHandle) -> bool {
    use raya_interop_sdk::TypeHandle as T;
    const FLOATS: [TypeHandle; 3] = [T::F32, T::F64, T::DECIMAL];
    let targets: &[TypeHandle] = match from {
        T::I8 => &[T::I16, T::I32, T::I64],
        T::U8 => &[T::I16, T::U16, T::I32, T::U32, T::I64, T::U64],
        T::I16 => &[T::I32, T::I64],
        T::U16 => &[T::I32, T::U32, T::I64, T::U64],
        T::I32 => &[T::I64],
        T::U32 => &[T::I64, T::U64],
        T::I64 | T::U64 => &[],
        T::F32 => return to == T::F64,
        _ => return false,
    };
    targets.contains(&to) || FLOATS.contains(&to)
}

/// Rank the implicit conversion of `value` to `target`, or `None` when no
/// implicit conversion exists
pub fn classify(registry: &TypeRegistry, value: &Value, target: TypeHandle) -> Option<ConversionRank> {
    match value {
        Value::Null | Value::Void => {
            return registry.is_reference_type(target).then_some(ConversionRank::Assignable);
        }
        Value::Missing => {
            return (target == TypeHandle::OBJECT).then_some(ConversionRank::Assignable);
        }
        _ => {}
    }

    let source = registry.type_of(value)?;
    if source == target {
        return Some(ConversionRank::Exact);
    }
    if registry.find_conversion(source, target).is_some() {
        return Some(ConversionRank::UserDefined);
    }
    if registry.is_assignable(source, target) {
        return Some(ConversionRank::Assignable);
    }
    if widens(source, target) {
        return Some(ConversionRank::NumericWidening);
    }
    if value.is_integral_zero() && matches!(registry.get(target).map(|t| t.kind), Some(TypeKind::Enum { .. })) {
        return Some(ConversionRank::NumericWidening);
    }
    None
}

/// Apply the implicit conversion of `value` to `target`.
///
/// Fails with an argument error naming `parameter` when no implicit
/// conversion exists.
pub fn coerce(registry: &TypeRegistry, value: Value, target: TypeHandle, parameter: &str) -> InteropResult<Value> {
    let rank = classify(registry, &value, target).ok_or_else(|| {
        InteropError::argument(
            parameter,
            format!(
                "Cannot convert {} to {}",
                value.type_name(),
                registry.type_name(target)
            ),
        )
    })?;

    match rank {
        ConversionRank::Exact | ConversionRank::Assignable => Ok(value),
        ConversionRank::UserDefined => {
            let source = registry
                .type_of(&value)
                .ok_or_else(|| InteropError::argument(parameter, "Untyped value"))?;
            let conversion = registry
                .find_conversion(source, target)
                .ok_or_else(|| InteropError::argument(parameter, "Conversion disappeared"))?;
            (conversion.convert)(&value)
        }
        ConversionRank::NumericWidening => widen(&value, target)
            .ok_or_else(|| InteropError::argument(parameter, format!("Cannot widen {}", value.type_name()))),
    }
}

fn widen(value: &Value, target: TypeHandle) -> Option<Value> {
    if value.is_integral_zero() && !target.is_well_known() {
        return Some(Value::Enum(target, 0));
    }
    if let Value::F32(f) = value {
        return (target == TypeHandle::F64).then_some(Value::F64(*f as f64));
    }

    let i = value.as_i128()?;
    Some(match target {
        TypeHandle::I16 => Value::I16(i16::try_from(i).ok()?),
        TypeHandle::U16 => Value::U16(u16::try_from(i).ok()?),
        TypeHandle::I32 => Value::I32(i32::try_from(i).ok()?),
        TypeHandle::U32 => Value::U32(u32::try_from(i).ok()?),
        TypeHandle::I64 => Value::I64(i64::try_from(i).ok()?),
        TypeHandle::U64 => Value::U64(u64::try_from(i).ok()?),
        TypeHandle::F32 => Value::F32(i as f32),
        TypeHandle::F64 => Value::F64(i as f64),
        TypeHandle::DECIMAL => Value::Decimal(Decimal::new(i, 0)?),
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeBuilder;

    #[test]
    fn test_widening_table() {
        assert!(widens(TypeHandle::I32, TypeHandle::I64));
        assert!(widens(TypeHandle::I32, TypeHandle::F64));
        assert!(widens(TypeHandle::U8, TypeHandle::U64));
        assert!(widens(TypeHandle::F32, TypeHandle::F64));
        assert!(widens(TypeHandle::U64, TypeHandle::DECIMAL));
        assert!(!widens(TypeHandle::I64, TypeHandle::I32));
        assert!(!widens(TypeHandle::I32, TypeHandle::U32));
        assert!(!widens(TypeHandle::F64, TypeHandle::F32));
        assert!(!widens(TypeHandle::I8, TypeHandle::U8));
    }

    #[test]
    fn test_classify_ranks() {
        let registry = TypeRegistry::new();
        assert_eq!(classify(&registry, &Value::I32(1), TypeHandle::I32), Some(ConversionRank::Exact));
        assert_eq!(classify(&registry, &Value::I32(1), TypeHandle::OBJECT), Some(ConversionRank::Assignable));
        assert_eq!(classify(&registry, &Value::I32(1), TypeHandle::I64), Some(ConversionRank::NumericWidening));
        assert_eq!(classify(&registry, &Value::I64(1), TypeHandle::I32), None);
        assert_eq!(classify(&registry, &Value::Null, TypeHandle::STRING), Some(ConversionRank::Assignable));
        assert_eq!(classify(&registry, &Value::Null, TypeHandle::I32), None);
    }

    #[test]
    fn test_enum_only_from_zero() {
        let registry = TypeRegistry::new();
        let color = registry
            .register(TypeBuilder::enumeration("Color", TypeHandle::I32))
            .unwrap();
        assert!(classify(&registry, &Value::I32(0), color).is_some());
        assert!(classify(&registry, &Value::I32(2), color).is_none());
        assert!(classify(&registry, &Value::Enum(color, 2), TypeHandle::I32).is_none());
        assert_eq!(
            coerce(&registry, Value::U8(0), color, "c").unwrap(),
            Value::Enum(color, 0)
        );
    }

    #[test]
    fn test_user_defined_conversion() {
        let registry = TypeRegistry::new();
        let meters = registry
            .register(TypeBuilder::structure("Meters").implicit_from(TypeHandle::F64, |v| {
                Ok(Value::string(format!("{}m", v.as_f64().unwrap_or_default())))
            }))
            .unwrap();
        assert_eq!(classify(&registry, &Value::F64(2.5), meters), Some(ConversionRank::UserDefined));
        assert_eq!(coerce(&registry, Value::F64(2.5), meters, "m").unwrap(), Value::from("2.5m"));
    }

    #[test]
    fn test_coerce_widens_values() {
        let registry = TypeRegistry::new();
        assert_eq!(coerce(&registry, Value::I32(7), TypeHandle::I64, "x").unwrap(), Value::I64(7));
        assert_eq!(coerce(&registry, Value::I16(-2), TypeHandle::F64, "x").unwrap(), Value::F64(-2.0));
        assert_eq!(
            coerce(&registry, Value::U32(12), TypeHandle::DECIMAL, "x").unwrap(),
            Value::Decimal(Decimal::from(12u64))
        );
        let err = coerce(&registry, Value::from("s"), TypeHandle::I32, "count").unwrap_err();
        assert!(matches!(err, InteropError::ArgumentError { ref parameter, .. } if parameter == "count"));
    }
}
