//! Native variant ABI (Automation layout)
//!
//! `Variant` is the fixed-size tagged union native dispatch targets exchange
//! values through: a 16-bit type tag, three reserved 16-bit words and a
//! payload of two pointers.
//!
//! ```text
//! offset 0   vt        u16
//! offset 2   reserved1 u16   (DECIMAL: scale byte, sign byte)
//! offset 4   reserved2 u16   (DECIMAL: Hi32 low half)
//! offset 6   reserved3 u16   (DECIMAL: Hi32 high half)
//! offset 8   data      2 x pointer
//! ```
//!
//! Strings travel as length-prefixed UTF-16 buffers (`bstr_*`), objects as a
//! boxed [`ObjectRef`] owned by the variant. [`Variant::clear`] releases
//! whatever the variant owns and resets it to `VT_EMPTY`.

use std::alloc::{self, Layout};
use std::ffi::c_void;
use std::fmt;

use crate::object::ObjectRef;

// ============================================================================
// Type tags
// ============================================================================

/// Variant type tag
pub type VarType = u16;

/// Empty
pub const VT_EMPTY: VarType = 0;
/// Null
pub const VT_NULL: VarType = 1;
/// 16-bit signed integer
pub const VT_I2: VarType = 2;
/// 32-bit signed integer
pub const VT_I4: VarType = 3;
/// 32-bit float
pub const VT_R4: VarType = 4;
/// 64-bit float
pub const VT_R8: VarType = 5;
/// String
pub const VT_BSTR: VarType = 8;
/// Dispatch object
pub const VT_DISPATCH: VarType = 9;
/// Status code (used with `DISP_E_PARAMNOTFOUND` for omitted arguments)
pub const VT_ERROR: VarType = 10;
/// Boolean (`VARIANT_TRUE` / `VARIANT_FALSE`)
pub const VT_BOOL: VarType = 11;
/// Variant (only meaningful with `VT_BYREF`)
pub const VT_VARIANT: VarType = 12;
/// Unknown object
pub const VT_UNKNOWN: VarType = 13;
/// Decimal
pub const VT_DECIMAL: VarType = 14;
/// 8-bit signed integer
pub const VT_I1: VarType = 16;
/// 8-bit unsigned integer
pub const VT_UI1: VarType = 17;
/// 16-bit unsigned integer
pub const VT_UI2: VarType = 18;
/// 32-bit unsigned integer
pub const VT_UI4: VarType = 19;
/// 64-bit signed integer
pub const VT_I8: VarType = 20;
/// 64-bit unsigned integer
pub const VT_UI8: VarType = 21;
/// By-reference modifier
pub const VT_BYREF: VarType = 0x4000;

/// Boolean true
pub const VARIANT_TRUE: i16 = -1;
/// Boolean false
pub const VARIANT_FALSE: i16 = 0;

// ============================================================================
// Status codes
// ============================================================================

/// Native status code. Zero and positive values are success codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct HResult(pub i32);

impl HResult {
    /// Success
    pub const S_OK: Self = Self(0);
    /// Success, negative answer (end of enumeration)
    pub const S_FALSE: Self = Self(1);
    /// Not implemented
    pub const E_NOTIMPL: Self = Self(0x8000_4001_u32 as i32);
    /// Out of memory
    pub const E_OUTOFMEMORY: Self = Self(0x8007_000E_u32 as i32);
    /// Invalid argument
    pub const E_INVALIDARG: Self = Self(0x8007_0057_u32 as i32);
    /// Member not found
    pub const DISP_E_MEMBERNOTFOUND: Self = Self(0x8002_0003_u32 as i32);
    /// Parameter not found (omitted optional argument)
    pub const DISP_E_PARAMNOTFOUND: Self = Self(0x8002_0004_u32 as i32);
    /// Type mismatch
    pub const DISP_E_TYPEMISMATCH: Self = Self(0x8002_0005_u32 as i32);
    /// Unknown name
    pub const DISP_E_UNKNOWNNAME: Self = Self(0x8002_0006_u32 as i32);
    /// Exception raised by the callee
    pub const DISP_E_EXCEPTION: Self = Self(0x8002_0009_u32 as i32);
    /// Wrong argument count
    pub const DISP_E_BADPARAMCOUNT: Self = Self(0x8002_000E_u32 as i32);

    /// Check for a success code
    #[inline]
    pub const fn is_success(self) -> bool {
        self.0 >= 0
    }

    /// Check for the expected failures that callers may recover from
    #[inline]
    pub fn is_recoverable(self) -> bool {
        self == Self::DISP_E_UNKNOWNNAME || self == Self::DISP_E_MEMBERNOTFOUND
    }
}

impl fmt::Display for HResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010X}", self.0)
    }
}

// ============================================================================
// Dispatch identifiers and flags
// ============================================================================

/// Member identifier
pub type DispId = i32;

/// Default member
pub const DISPID_VALUE: DispId = 0;
/// Unknown member
pub const DISPID_UNKNOWN: DispId = -1;
/// Start sentinel for member enumeration
pub const DISPID_STARTENUM: DispId = -1;
/// Named argument identifying the value of a property put
pub const DISPID_PROPERTYPUT: DispId = -3;

/// Invoke as a method
pub const DISPATCH_METHOD: u16 = 0x1;
/// Property get
pub const DISPATCH_PROPERTYGET: u16 = 0x2;
/// Property put (by value)
pub const DISPATCH_PROPERTYPUT: u16 = 0x4;
/// Property put (by reference)
pub const DISPATCH_PROPERTYPUTREF: u16 = 0x8;
/// Invoke as a constructor
pub const DISPATCH_CONSTRUCT: u16 = 0x4000;

/// Name lookup is case-sensitive
pub const FDEX_NAME_CASE_SENSITIVE: u32 = 0x1;
/// Create the member if it does not exist
pub const FDEX_NAME_ENSURE: u32 = 0x2;
/// Enumerate every member, not only the default set
pub const FDEX_ENUM_ALL: u32 = 0x2;

// ============================================================================
// Variant
// ============================================================================

/// Variant payload
#[repr(C)]
#[derive(Clone, Copy)]
pub union VariantData {
    /// VT_I8
    pub llval: i64,
    /// VT_UI8, DECIMAL Lo64
    pub ullval: u64,
    /// VT_I4
    pub lval: i32,
    /// VT_UI4
    pub ulval: u32,
    /// VT_I2
    pub ival: i16,
    /// VT_UI2
    pub uival: u16,
    /// VT_I1
    pub cval: i8,
    /// VT_UI1
    pub bval: u8,
    /// VT_BOOL
    pub boolval: i16,
    /// VT_R4
    pub fltval: f32,
    /// VT_R8
    pub dblval: f64,
    /// VT_ERROR
    pub scode: i32,
    /// VT_BSTR, VT_DISPATCH, VT_BYREF
    pub ptr: *mut c_void,
    /// Full payload width
    pub pair: [usize; 2],
}

/// Native tagged union
#[repr(C)]
pub struct Variant {
    /// Type tag
    pub vt: VarType,
    /// Reserved word 1
    pub reserved1: u16,
    /// Reserved word 2
    pub reserved2: u16,
    /// Reserved word 3
    pub reserved3: u16,
    /// Payload
    pub data: VariantData,
}

impl Variant {
    /// Create an empty variant
    pub const fn empty() -> Self {
        Self {
            vt: VT_EMPTY,
            reserved1: 0,
            reserved2: 0,
            reserved3: 0,
            data: VariantData { pair: [0, 0] },
        }
    }

    /// Type tag
    #[inline]
    pub fn vt(&self) -> VarType {
        self.vt
    }

    /// Check for VT_EMPTY
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vt == VT_EMPTY
    }

    /// Check for the by-reference modifier
    #[inline]
    pub fn is_by_ref(&self) -> bool {
        self.vt & VT_BYREF != 0
    }

    /// Release owned payload and reset to VT_EMPTY.
    ///
    /// By-reference variants do not own their referent. Clearing an empty
    /// variant is a no-op, so clearing is idempotent.
    ///
    /// # Safety
    /// The payload must match the tag: a `VT_BSTR` pointer must come from
    /// [`bstr_alloc`] and a `VT_DISPATCH` pointer from [`dispatch_into_raw`].
    pub unsafe fn clear(&mut self) {
        match self.vt {
            VT_BSTR => bstr_free(self.data.ptr as *mut u16),
            VT_DISPATCH | VT_UNKNOWN => dispatch_release(self.data.ptr),
            _ => {}
        }
        *self = Variant::empty();
    }
}

impl Default for Variant {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let raw = unsafe { self.data.pair };
        write!(
            f,
            "Variant {{ vt: {:#06x}, reserved: [{:#x}, {:#x}, {:#x}], data: [{:#x}, {:#x}] }}",
            self.vt, self.reserved1, self.reserved2, self.reserved3, raw[0], raw[1]
        )
    }
}

// ============================================================================
// String payloads
// ============================================================================

const BSTR_PREFIX: usize = std::mem::size_of::<u32>();

fn bstr_layout(units: usize) -> Option<Layout> {
    // prefix + UTF-16 units + terminator
    let bytes = BSTR_PREFIX.checked_add(units.checked_add(1)?.checked_mul(2)?)?;
    Layout::from_size_align(bytes, std::mem::align_of::<u32>()).ok()
}

/// Byte length stored in the prefix; `None` when it does not fit in `u32`
fn bstr_prefix(units: usize) -> Option<u32> {
    u32::try_from(units.checked_mul(2)?).ok()
}

/// Allocate a length-prefixed UTF-16 string. Returns null on allocation
/// failure or when the byte length does not fit the prefix.
pub fn bstr_alloc(s: &str) -> *mut u16 {
    let units: Vec<u16> = s.encode_utf16().collect();
    let (Some(prefix), Some(layout)) = (bstr_prefix(units.len()), bstr_layout(units.len())) else {
        return std::ptr::null_mut();
    };
    unsafe {
        let base = alloc::alloc(layout);
        if base.is_null() {
            return std::ptr::null_mut();
        }
        (base as *mut u32).write(prefix);
        let text = base.add(BSTR_PREFIX) as *mut u16;
        std::ptr::copy_nonoverlapping(units.as_ptr(), text, units.len());
        text.add(units.len()).write(0);
        text
    }
}

/// Length in UTF-16 units
///
/// # Safety
/// `bstr` must be null or come from [`bstr_alloc`] and not yet be freed.
pub unsafe fn bstr_len(bstr: *const u16) -> usize {
    if bstr.is_null() {
        return 0;
    }
    let prefix = (bstr as *const u8).sub(BSTR_PREFIX) as *const u32;
    (prefix.read() / 2) as usize
}

/// Decode to a Rust string (lossy for unpaired surrogates)
///
/// # Safety
/// Same contract as [`bstr_len`].
pub unsafe fn bstr_to_string(bstr: *const u16) -> String {
    if bstr.is_null() {
        return String::new();
    }
    let units = std::slice::from_raw_parts(bstr, bstr_len(bstr));
    String::from_utf16_lossy(units)
}

/// Free a string from [`bstr_alloc`]
///
/// # Safety
/// Same contract as [`bstr_len`]; the pointer must not be used afterwards.
pub unsafe fn bstr_free(bstr: *mut u16) {
    if bstr.is_null() {
        return;
    }
    let units = bstr_len(bstr);
    let base = (bstr as *mut u8).sub(BSTR_PREFIX);
    if let Some(layout) = bstr_layout(units) {
        alloc::dealloc(base, layout);
    }
}

// ============================================================================
// Object payloads
// ============================================================================

/// Transfer an object reference into a raw dispatch payload
pub fn dispatch_into_raw(obj: ObjectRef) -> *mut c_void {
    Box::into_raw(Box::new(obj)) as *mut c_void
}

/// Borrow the object behind a dispatch payload, adding a reference
///
/// # Safety
/// `ptr` must come from [`dispatch_into_raw`] and not yet be released.
pub unsafe fn dispatch_clone(ptr: *const c_void) -> Option<ObjectRef> {
    if ptr.is_null() {
        return None;
    }
    Some((*(ptr as *const ObjectRef)).clone())
}

/// Release a dispatch payload
///
/// # Safety
/// `ptr` must come from [`dispatch_into_raw`]; it must not be used afterwards.
pub unsafe fn dispatch_release(ptr: *mut c_void) {
    if !ptr.is_null() {
        drop(Box::from_raw(ptr as *mut ObjectRef));
    }
}

// ============================================================================
// Extended dispatch interface
// ============================================================================

/// Arguments of one dispatch call.
///
/// `args` is in native order: the last managed argument comes first.
pub struct DispParams<'a> {
    /// Argument variants (reverse order)
    pub args: &'a mut [Variant],
    /// Identifiers of named arguments (`DISPID_PROPERTYPUT` for puts)
    pub named_args: &'a [DispId],
}

impl DispParams<'_> {
    /// Number of arguments
    pub fn len(&self) -> usize {
        self.args.len()
    }

    /// Check for an empty argument list
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }
}

/// Extended native dispatch interface.
///
/// Mirrors the fixed native interface table: name lookup, invoke, delete,
/// enumeration and reverse name lookup. Implementations report status codes;
/// only `DISP_E_UNKNOWNNAME` and `DISP_E_MEMBERNOTFOUND` are treated as
/// recoverable by the core.
pub trait DispatchEx: Send + Sync {
    /// Resolve a member name to its identifier
    fn get_dispid(&self, name: &str, flags: u32) -> Result<DispId, HResult>;

    /// Invoke a member. `result` receives the return value when present.
    fn invoke_ex(
        &self,
        id: DispId,
        flags: u16,
        params: &mut DispParams<'_>,
        result: Option<&mut Variant>,
    ) -> HResult;

    /// Delete a member by identifier
    fn delete_member_by_dispid(&self, id: DispId) -> HResult;

    /// Next member identifier after `id`; `Ok(None)` signals exhaustion
    fn get_next_dispid(&self, flags: u32, id: DispId) -> Result<Option<DispId>, HResult>;

    /// Member name for an identifier
    fn get_member_name(&self, id: DispId) -> Result<String, HResult>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_size() {
        let expected = 2 * std::mem::size_of::<usize>() + 4 * std::mem::size_of::<u16>();
        assert_eq!(std::mem::size_of::<Variant>(), expected);
    }

    #[test]
    fn test_bstr_prefix_limit() {
        assert_eq!(bstr_prefix(3), Some(6));
        assert_eq!(bstr_prefix(u32::MAX as usize / 2), Some(u32::MAX - 1));
        assert_eq!(bstr_prefix(u32::MAX as usize / 2 + 1), None);
        assert_eq!(bstr_prefix(usize::MAX), None);
    }

    #[test]
    fn test_bstr_roundtrip() {
        let s = bstr_alloc("héllo ✓");
        assert!(!s.is_null());
        unsafe {
            assert_eq!(bstr_len(s), "héllo ✓".encode_utf16().count());
            assert_eq!(bstr_to_string(s), "héllo ✓");
            bstr_free(s);
        }
    }

    #[test]
    fn test_clear_is_idempotent() {
        let mut v = Variant::empty();
        v.vt = VT_BSTR;
        v.data.ptr = bstr_alloc("x") as *mut c_void;
        unsafe {
            v.clear();
            assert!(v.is_empty());
            v.clear();
        }
        assert!(v.is_empty());
    }

    #[test]
    fn test_hresult_classes() {
        assert!(HResult::S_OK.is_success());
        assert!(HResult::S_FALSE.is_success());
        assert!(!HResult::DISP_E_EXCEPTION.is_success());
        assert!(HResult::DISP_E_MEMBERNOTFOUND.is_recoverable());
        assert!(HResult::DISP_E_UNKNOWNNAME.is_recoverable());
        assert!(!HResult::E_INVALIDARG.is_recoverable());
        assert_eq!(HResult::DISP_E_UNKNOWNNAME.to_string(), "0x80020006");
    }
}
