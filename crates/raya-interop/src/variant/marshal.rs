//! Value ↔ variant marshaling
//!
//! | Value                  | Variant                                  |
//! |------------------------|------------------------------------------|
//! | `Void`                 | `VT_EMPTY`                               |
//! | `Null`                 | `VT_NULL`                                |
//! | `Missing`              | `VT_ERROR` / `DISP_E_PARAMNOTFOUND`      |
//! | `Bool`                 | `VT_BOOL` (`VARIANT_TRUE` / `FALSE`)     |
//! | integers, floats       | matching `VT_I1` .. `VT_R8`              |
//! | `Decimal`              | `VT_DECIMAL` (scale/sign/Hi32 in header) |
//! | `String`               | `VT_BSTR`                                |
//! | `Enum`                 | `VT_I4`, or `VT_I8` when out of range    |
//! | `Object`, `Array`      | `VT_DISPATCH`                            |
//!
//! Arrays cross as a [`MarshaledArray`] object and come back as the same
//! array. By-reference variants are read through their referent.

use std::any::Any;
use std::ffi::c_void;

use raya_interop_sdk::variant::*;
use raya_interop_sdk::{Decimal, HostArray, InteropError, InteropResult, ObjectRef, ScriptObject, Value};

/// Array passed across the variant boundary as an object
pub struct MarshaledArray(pub HostArray);

impl ScriptObject for MarshaledArray {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn describe(&self) -> String {
        format!("[array({})]", self.0.len())
    }
}

const DECIMAL_NEGATIVE: u16 = 0x80;

/// Write `value` into an empty variant.
///
/// On failure the variant is left empty.
pub fn to_variant(value: &Value, out: &mut Variant) -> InteropResult<()> {
    *out = Variant::empty();
    match value {
        Value::Void => {}
        Value::Null => out.vt = VT_NULL,
        Value::Missing => {
            out.vt = VT_ERROR;
            out.data.scode = HResult::DISP_E_PARAMNOTFOUND.0;
        }
        Value::Bool(b) => {
            out.vt = VT_BOOL;
            out.data.boolval = if *b { VARIANT_TRUE } else { VARIANT_FALSE };
        }
        Value::I8(v) => {
            out.vt = VT_I1;
            out.data.cval = *v;
        }
        Value::U8(v) => {
            out.vt = VT_UI1;
            out.data.bval = *v;
        }
        Value::I16(v) => {
            out.vt = VT_I2;
            out.data.ival = *v;
        }
        Value::U16(v) => {
            out.vt = VT_UI2;
            out.data.uival = *v;
        }
        Value::I32(v) => {
            out.vt = VT_I4;
            out.data.lval = *v;
        }
        Value::U32(v) => {
            out.vt = VT_UI4;
            out.data.ulval = *v;
        }
        Value::I64(v) => {
            out.vt = VT_I8;
            out.data.llval = *v;
        }
        Value::U64(v) => {
            out.vt = VT_UI8;
            out.data.ullval = *v;
        }
        Value::F32(v) => {
            out.vt = VT_R4;
            out.data.fltval = *v;
        }
        Value::F64(v) => {
            out.vt = VT_R8;
            out.data.dblval = *v;
        }
        Value::Decimal(d) => {
            out.vt = VT_DECIMAL;
            let sign = if d.is_negative() { DECIMAL_NEGATIVE } else { 0 };
            out.reserved1 = u16::from(d.scale()) | (sign << 8);
            out.reserved2 = d.hi() as u16;
            out.reserved3 = (d.hi() >> 16) as u16;
            out.data.ullval = d.lo();
        }
        Value::String(s) => {
            let bstr = bstr_alloc(s);
            if bstr.is_null() {
                return Err(InteropError::Resource(format!(
                    "Failed to allocate string of {} bytes",
                    s.len()
                )));
            }
            out.vt = VT_BSTR;
            out.data.ptr = bstr as *mut c_void;
        }
        Value::Enum(_, v) => match i32::try_from(*v) {
            Ok(small) => {
                out.vt = VT_I4;
                out.data.lval = small;
            }
            Err(_) => {
                out.vt = VT_I8;
                out.data.llval = *v;
            }
        },
        Value::Array(array) => {
            let obj: ObjectRef = std::sync::Arc::new(MarshaledArray(array.clone()));
            out.vt = VT_DISPATCH;
            out.data.ptr = dispatch_into_raw(obj);
        }
        Value::Object(obj) => {
            out.vt = VT_DISPATCH;
            out.data.ptr = dispatch_into_raw(obj.clone());
        }
        Value::Type(handle) => {
            return Err(InteropError::argument(
                "value",
                format!("Type reference {} cannot cross the variant boundary", handle),
            ));
        }
    }
    Ok(())
}

/// Read a value out of a variant without taking ownership of its payload
pub fn from_variant(variant: &Variant) -> InteropResult<Value> {
    if variant.is_by_ref() {
        let base = variant.vt & !VT_BYREF;
        // SAFETY: by-ref variants carry a pointer in `data.ptr`
        let ptr = unsafe { variant.data.ptr };
        if base != VT_VARIANT || ptr.is_null() {
            return Err(InteropError::Runtime(format!(
                "Unsupported by-reference variant type {:#06x}",
                variant.vt
            )));
        }
        // SAFETY: VT_BYREF|VT_VARIANT points at a live variant
        return from_variant(unsafe { &*(ptr as *const Variant) });
    }

    // SAFETY: each arm reads the union field selected by the tag
    let value = unsafe {
        match variant.vt {
            VT_EMPTY => Value::Void,
            VT_NULL => Value::Null,
            VT_ERROR if variant.data.scode == HResult::DISP_E_PARAMNOTFOUND.0 => Value::Missing,
            VT_ERROR => Value::I32(variant.data.scode),
            VT_BOOL => Value::Bool(variant.data.boolval != VARIANT_FALSE),
            VT_I1 => Value::I8(variant.data.cval),
            VT_UI1 => Value::U8(variant.data.bval),
            VT_I2 => Value::I16(variant.data.ival),
            VT_UI2 => Value::U16(variant.data.uival),
            VT_I4 => Value::I32(variant.data.lval),
            VT_UI4 => Value::U32(variant.data.ulval),
            VT_I8 => Value::I64(variant.data.llval),
            VT_UI8 => Value::U64(variant.data.ullval),
            VT_R4 => Value::F32(variant.data.fltval),
            VT_R8 => Value::F64(variant.data.dblval),
            VT_DECIMAL => {
                let scale = (variant.reserved1 & 0xFF) as u8;
                let negative = (variant.reserved1 >> 8) & DECIMAL_NEGATIVE != 0;
                let hi = u32::from(variant.reserved2) | (u32::from(variant.reserved3) << 16);
                Value::Decimal(Decimal::from_parts(variant.data.ullval, hi, scale, negative))
            }
            VT_BSTR => Value::string(bstr_to_string(variant.data.ptr as *const u16)),
            VT_DISPATCH | VT_UNKNOWN => match dispatch_clone(variant.data.ptr) {
                Some(obj) => match obj.as_any().downcast_ref::<MarshaledArray>() {
                    Some(array) => Value::Array(array.0.clone()),
                    None => Value::Object(obj),
                },
                None => Value::Null,
            },
            other => {
                return Err(InteropError::Runtime(format!("Unsupported variant type {:#06x}", other)));
            }
        }
    };
    Ok(value)
}
