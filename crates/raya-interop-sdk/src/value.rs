//! Value - the dynamically-typed value crossing the interop boundary
//!
//! Script engines hand the core `Value`s and get `Value`s back. Primitive
//! categories are stored inline; arrays and objects are shared handles so
//! that by-reference write-back and identity comparisons behave the way the
//! host expects.
//!
//! ```text
//! Null / Missing / Void           markers (no payload)
//! Bool, I8..U64, F32, F64         inline primitives
//! Decimal                         96-bit mantissa + scale (Automation DECIMAL)
//! String                          Arc<str>
//! Enum(type, raw)                 enum value with its underlying integral
//! Array                           shared, typed element storage
//! Object                          Arc<dyn ScriptObject>
//! Type                            a host type used as a static target
//! ```

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::object::{ObjectRef, ScriptObject};

// ============================================================================
// TypeHandle
// ============================================================================

/// Opaque identity of a host type.
///
/// Handles below [`TypeHandle::FIRST_USER`] are reserved for the well-known
/// primitive types; everything else is assigned by the type registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TypeHandle(u32);

impl TypeHandle {
    /// The universal base type
    pub const OBJECT: Self = Self(0);
    /// Return type of members that produce nothing
    pub const VOID: Self = Self(1);
    /// Boolean
    pub const BOOL: Self = Self(2);
    /// Signed 8-bit integer
    pub const I8: Self = Self(3);
    /// Unsigned 8-bit integer
    pub const U8: Self = Self(4);
    /// Signed 16-bit integer
    pub const I16: Self = Self(5);
    /// Unsigned 16-bit integer
    pub const U16: Self = Self(6);
    /// Signed 32-bit integer
    pub const I32: Self = Self(7);
    /// Unsigned 32-bit integer
    pub const U32: Self = Self(8);
    /// Signed 64-bit integer
    pub const I64: Self = Self(9);
    /// Unsigned 64-bit integer
    pub const U64: Self = Self(10);
    /// 32-bit float
    pub const F32: Self = Self(11);
    /// 64-bit float
    pub const F64: Self = Self(12);
    /// Decimal
    pub const DECIMAL: Self = Self(13);
    /// String
    pub const STRING: Self = Self(14);

    /// First handle value available to registered types
    pub const FIRST_USER: u32 = 16;

    /// Create from a raw handle value
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw handle value
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Check if this is one of the reserved well-known handles
    #[inline]
    pub const fn is_well_known(self) -> bool {
        self.0 < Self::FIRST_USER
    }
}

impl fmt::Display for TypeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ============================================================================
// Decimal
// ============================================================================

/// Decimal number in Automation layout: 96-bit magnitude, power-of-ten
/// scale in `0..=28` and a sign flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Decimal {
    lo: u64,
    hi: u32,
    scale: u8,
    negative: bool,
}

impl Decimal {
    /// Largest supported scale
    pub const MAX_SCALE: u8 = 28;

    const MANTISSA_LIMIT: u128 = 1 << 96;

    /// Create from a signed mantissa and scale.
    ///
    /// Returns `None` when the magnitude does not fit 96 bits or the scale
    /// exceeds [`Decimal::MAX_SCALE`].
    pub fn new(mantissa: i128, scale: u8) -> Option<Self> {
        let magnitude = mantissa.unsigned_abs();
        if magnitude >= Self::MANTISSA_LIMIT || scale > Self::MAX_SCALE {
            return None;
        }
        Some(Self {
            lo: magnitude as u64,
            hi: (magnitude >> 64) as u32,
            scale,
            negative: mantissa < 0,
        })
    }

    /// Create from raw Automation parts
    pub const fn from_parts(lo: u64, hi: u32, scale: u8, negative: bool) -> Self {
        Self {
            lo,
            hi,
            scale,
            negative,
        }
    }

    /// Low 64 bits of the magnitude
    pub const fn lo(&self) -> u64 {
        self.lo
    }

    /// High 32 bits of the magnitude
    pub const fn hi(&self) -> u32 {
        self.hi
    }

    /// Power-of-ten scale
    pub const fn scale(&self) -> u8 {
        self.scale
    }

    /// Sign flag
    pub const fn is_negative(&self) -> bool {
        self.negative
    }

    /// Signed mantissa
    pub fn mantissa(&self) -> i128 {
        let magnitude = ((self.hi as i128) << 64) | self.lo as i128;
        if self.negative {
            -magnitude
        } else {
            magnitude
        }
    }

    /// Lossy conversion to f64
    pub fn to_f64(&self) -> f64 {
        self.mantissa() as f64 / 10f64.powi(self.scale as i32)
    }
}

impl From<i64> for Decimal {
    fn from(value: i64) -> Self {
        // Any i64 fits 96 bits at scale 0
        Self {
            lo: value.unsigned_abs(),
            hi: 0,
            scale: 0,
            negative: value < 0,
        }
    }
}

impl From<u64> for Decimal {
    fn from(value: u64) -> Self {
        Self {
            lo: value,
            hi: 0,
            scale: 0,
            negative: false,
        }
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let magnitude = self.mantissa().unsigned_abs().to_string();
        let scale = self.scale as usize;
        let sign = if self.negative { "-" } else { "" };
        if scale == 0 {
            return write!(f, "{}{}", sign, magnitude);
        }
        let padded = format!("{:0>width$}", magnitude, width = scale + 1);
        let (int_part, frac_part) = padded.split_at(padded.len() - scale);
        write!(f, "{}{}.{}", sign, int_part, frac_part)
    }
}

// ============================================================================
// HostArray
// ============================================================================

/// Shared, typed array storage.
///
/// Clones share the same backing storage, which is what lets a variadic
/// tail array be written by the callee and read back by the binder.
#[derive(Clone)]
pub struct HostArray {
    element_type: TypeHandle,
    items: Arc<RwLock<Vec<Value>>>,
}

impl HostArray {
    /// Create an array from existing items
    pub fn new(element_type: TypeHandle, items: Vec<Value>) -> Self {
        Self {
            element_type,
            items: Arc::new(RwLock::new(items)),
        }
    }

    /// Create an array of `len` null elements
    pub fn with_len(element_type: TypeHandle, len: usize) -> Self {
        Self::new(element_type, vec![Value::Null; len])
    }

    /// Element type
    pub fn element_type(&self) -> TypeHandle {
        self.element_type
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    /// Check if the array is empty
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// Get element at index
    pub fn get(&self, index: usize) -> Option<Value> {
        self.items.read().get(index).cloned()
    }

    /// Set element at index. Returns false if out of bounds.
    pub fn set(&self, index: usize, value: Value) -> bool {
        match self.items.write().get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Snapshot of all elements
    pub fn to_vec(&self) -> Vec<Value> {
        self.items.read().clone()
    }

    /// Check if two handles share storage
    pub fn ptr_eq(&self, other: &HostArray) -> bool {
        Arc::ptr_eq(&self.items, &other.items)
    }
}

impl fmt::Debug for HostArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostArray")
            .field("element_type", &self.element_type)
            .field("items", &*self.items.read())
            .finish()
    }
}

// ============================================================================
// Value
// ============================================================================

/// A dynamically-typed value.
#[derive(Clone, Default)]
pub enum Value {
    /// Null reference
    #[default]
    Null,
    /// "No value supplied" marker bound to optional parameters without a default
    Missing,
    /// Result of a member that returns nothing
    Void,
    /// Boolean
    Bool(bool),
    /// Signed 8-bit integer
    I8(i8),
    /// Unsigned 8-bit integer
    U8(u8),
    /// Signed 16-bit integer
    I16(i16),
    /// Unsigned 16-bit integer
    U16(u16),
    /// Signed 32-bit integer
    I32(i32),
    /// Unsigned 32-bit integer
    U32(u32),
    /// Signed 64-bit integer
    I64(i64),
    /// Unsigned 64-bit integer
    U64(u64),
    /// 32-bit float
    F32(f32),
    /// 64-bit float
    F64(f64),
    /// Decimal
    Decimal(Decimal),
    /// String
    String(Arc<str>),
    /// Enum value: enum type and underlying integral value
    Enum(TypeHandle, i64),
    /// Array
    Array(HostArray),
    /// Object reference
    Object(ObjectRef),
    /// Host type used as a target for static members and construction
    Type(TypeHandle),
}

impl Value {
    /// Create a string value
    pub fn string(s: impl Into<Arc<str>>) -> Self {
        Value::String(s.into())
    }

    /// Wrap an object
    pub fn object(obj: impl ScriptObject) -> Self {
        Value::Object(Arc::new(obj))
    }

    /// Check for null
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check for the missing-argument marker
    #[inline]
    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    /// Check for the void sentinel
    #[inline]
    pub fn is_void(&self) -> bool {
        matches!(self, Value::Void)
    }

    /// Check if this is any integral primitive
    pub fn is_integral(&self) -> bool {
        matches!(
            self,
            Value::I8(_)
                | Value::U8(_)
                | Value::I16(_)
                | Value::U16(_)
                | Value::I32(_)
                | Value::U32(_)
                | Value::I64(_)
                | Value::U64(_)
        )
    }

    /// Check if this is an integral primitive equal to zero
    pub fn is_integral_zero(&self) -> bool {
        self.is_integral() && self.as_i128() == Some(0)
    }

    /// Get as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Any integral primitive (or enum) widened to i128
    pub fn as_i128(&self) -> Option<i128> {
        Some(match self {
            Value::I8(v) => *v as i128,
            Value::U8(v) => *v as i128,
            Value::I16(v) => *v as i128,
            Value::U16(v) => *v as i128,
            Value::I32(v) => *v as i128,
            Value::U32(v) => *v as i128,
            Value::I64(v) => *v as i128,
            Value::U64(v) => *v as i128,
            Value::Enum(_, v) => *v as i128,
            _ => return None,
        })
    }

    /// Get as i32 when the value is an i32
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I32(v) => Some(*v),
            _ => None,
        }
    }

    /// Any numeric primitive as f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F32(v) => Some(*v as f64),
            Value::F64(v) => Some(*v),
            Value::Decimal(d) => Some(d.to_f64()),
            other => other.as_i128().map(|v| v as f64),
        }
    }

    /// Get as string slice
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as array
    pub fn as_array(&self) -> Option<&HostArray> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Get as object reference
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Downcast an object payload to a concrete type
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.as_object()?.as_any().downcast_ref::<T>()
    }

    /// Well-known type of a primitive value.
    ///
    /// Returns `None` for null and markers, and for values whose type needs
    /// a registry to resolve (arrays, objects, enums, types).
    pub fn primitive_type(&self) -> Option<TypeHandle> {
        Some(match self {
            Value::Bool(_) => TypeHandle::BOOL,
            Value::I8(_) => TypeHandle::I8,
            Value::U8(_) => TypeHandle::U8,
            Value::I16(_) => TypeHandle::I16,
            Value::U16(_) => TypeHandle::U16,
            Value::I32(_) => TypeHandle::I32,
            Value::U32(_) => TypeHandle::U32,
            Value::I64(_) => TypeHandle::I64,
            Value::U64(_) => TypeHandle::U64,
            Value::F32(_) => TypeHandle::F32,
            Value::F64(_) => TypeHandle::F64,
            Value::Decimal(_) => TypeHandle::DECIMAL,
            Value::String(_) => TypeHandle::STRING,
            _ => return None,
        })
    }

    /// Short type name for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Missing => "missing",
            Value::Void => "void",
            Value::Bool(_) => "bool",
            Value::I8(_) => "i8",
            Value::U8(_) => "u8",
            Value::I16(_) => "i16",
            Value::U16(_) => "u16",
            Value::I32(_) => "i32",
            Value::U32(_) => "u32",
            Value::I64(_) => "i64",
            Value::U64(_) => "u64",
            Value::F32(_) => "f32",
            Value::F64(_) => "f64",
            Value::Decimal(_) => "decimal",
            Value::String(_) => "string",
            Value::Enum(..) => "enum",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Type(_) => "type",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Missing, Value::Missing) => true,
            (Value::Void, Value::Void) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::I8(a), Value::I8(b)) => a == b,
            (Value::U8(a), Value::U8(b)) => a == b,
            (Value::I16(a), Value::I16(b)) => a == b,
            (Value::U16(a), Value::U16(b)) => a == b,
            (Value::I32(a), Value::I32(b)) => a == b,
            (Value::U32(a), Value::U32(b)) => a == b,
            (Value::I64(a), Value::I64(b)) => a == b,
            (Value::U64(a), Value::U64(b)) => a == b,
            (Value::F32(a), Value::F32(b)) => a == b,
            (Value::F64(a), Value::F64(b)) => a == b,
            (Value::Decimal(a), Value::Decimal(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Enum(ta, a), Value::Enum(tb, b)) => ta == tb && a == b,
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Type(a), Value::Type(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Missing => write!(f, "Missing"),
            Value::Void => write!(f, "Void"),
            Value::Bool(v) => write!(f, "Bool({})", v),
            Value::I8(v) => write!(f, "I8({})", v),
            Value::U8(v) => write!(f, "U8({})", v),
            Value::I16(v) => write!(f, "I16({})", v),
            Value::U16(v) => write!(f, "U16({})", v),
            Value::I32(v) => write!(f, "I32({})", v),
            Value::U32(v) => write!(f, "U32({})", v),
            Value::I64(v) => write!(f, "I64({})", v),
            Value::U64(v) => write!(f, "U64({})", v),
            Value::F32(v) => write!(f, "F32({})", v),
            Value::F64(v) => write!(f, "F64({})", v),
            Value::Decimal(d) => write!(f, "Decimal({})", d),
            Value::String(s) => write!(f, "String({:?})", s),
            Value::Enum(t, v) => write!(f, "Enum({}, {})", t, v),
            Value::Array(a) => write!(f, "{:?}", a),
            Value::Object(o) => write!(f, "Object({})", o.describe()),
            Value::Type(t) => write!(f, "Type({})", t),
        }
    }
}

macro_rules! impl_from_primitive {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

impl_from_primitive! {
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
    HostArray => Array,
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<ObjectRef> for Value {
    fn from(obj: ObjectRef) -> Self {
        Value::Object(obj)
    }
}
