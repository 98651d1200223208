//! Extended-dispatch adapter
//!
//! Drives a [`DispatchEx`] target by name: property get/set/delete, method
//! and default-member invocation, and member enumeration. Integer indices
//! are addressed as members named by their decimal string.
//!
//! `DISP_E_UNKNOWNNAME` and `DISP_E_MEMBERNOTFOUND` surface as
//! [`InteropError::MissingMember`]; every other failure code is fatal and
//! surfaces as [`InteropError::NativeCall`].

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rustc_hash::FxHashSet;

use raya_interop_sdk::variant::{
    DispId, DispParams, DispatchEx, HResult, Variant, DISPATCH_CONSTRUCT, DISPATCH_METHOD, DISPATCH_PROPERTYGET,
    DISPATCH_PROPERTYPUT, DISPATCH_PROPERTYPUTREF, DISPID_PROPERTYPUT, DISPID_STARTENUM, DISPID_VALUE, FDEX_ENUM_ALL,
    FDEX_NAME_CASE_SENSITIVE, FDEX_NAME_ENSURE,
};
use raya_interop_sdk::{Arg, InteropError, InteropResult, Value};

use super::block::{ByRefVariantBlock, VariantBlock};
use super::marshal::from_variant;

/// Targets with an enumeration in progress, by address
static ACTIVE_ENUMERATIONS: Lazy<Mutex<FxHashSet<usize>>> = Lazy::new(|| Mutex::new(FxHashSet::default()));

/// Put conventions tried in order by [`DispatchAdapter::set_property`]
const PUT_CONVENTIONS: [u16; 3] = [
    DISPATCH_PROPERTYPUT,
    DISPATCH_PROPERTYPUT | DISPATCH_PROPERTYPUTREF,
    DISPATCH_PROPERTYPUTREF,
];

fn target_key(target: &dyn DispatchEx) -> usize {
    target as *const dyn DispatchEx as *const () as usize
}

fn failure(hr: HResult, name: &str, action: &str) -> InteropError {
    if hr.is_recoverable() {
        InteropError::missing(name)
    } else {
        InteropError::NativeCall {
            code: hr.0,
            message: format!("{} '{}'", action, name),
        }
    }
}

/// Parse a member name that is a canonical non-negative integer
pub fn index_of(name: &str) -> Option<u32> {
    let index: u32 = name.parse().ok()?;
    (index.to_string() == name).then_some(index)
}

/// Name-keyed access to a native dispatch target
#[derive(Clone, Copy)]
pub struct DispatchAdapter<'a> {
    target: &'a dyn DispatchEx,
}

impl<'a> DispatchAdapter<'a> {
    /// Wrap a target
    pub fn new(target: &'a dyn DispatchEx) -> Self {
        Self { target }
    }

    fn dispid(&self, name: &str, flags: u32) -> InteropResult<DispId> {
        self.target
            .get_dispid(name, flags)
            .map_err(|hr| failure(hr, name, "Lookup of"))
    }

    /// Invoke with by-reference arguments and read them back afterwards
    fn invoke_by_ref(&self, id: DispId, flags: u16, name: &str, args: &mut [Arg]) -> InteropResult<Value> {
        let values: Vec<Value> = args.iter().map(Arg::value).collect();
        let mut block = ByRefVariantBlock::new(&values)?;
        let mut result = Variant::empty();
        let hr = {
            let mut params = DispParams {
                args: block.refs_mut(),
                named_args: &[],
            };
            self.target.invoke_ex(id, flags, &mut params, Some(&mut result))
        };
        let value = from_variant(&result);
        // SAFETY: `result` was written by the target through the variant ABI
        unsafe { result.clear() };
        if !hr.is_success() {
            return Err(failure(hr, name, "Invocation of"));
        }
        block.read_back(args)?;
        value
    }

    /// Read a property
    pub fn get_property(&self, name: &str, args: &mut [Arg]) -> InteropResult<Value> {
        let id = self.dispid(name, FDEX_NAME_CASE_SENSITIVE)?;
        self.invoke_by_ref(id, DISPATCH_PROPERTYGET, name, args)
    }

    /// Assign a property. `args` ends with the value.
    ///
    /// The member is created if the target supports it. Puts are retried
    /// with the next convention only while the target answers
    /// `DISP_E_MEMBERNOTFOUND`; the last failure is fatal.
    pub fn set_property(&self, name: &str, args: &[Value]) -> InteropResult<()> {
        if args.is_empty() {
            return Err(InteropError::argument("value", "Property assignment requires a value"));
        }
        let id = self.dispid(name, FDEX_NAME_CASE_SENSITIVE | FDEX_NAME_ENSURE)?;
        let mut block = VariantBlock::new(args)?;
        let named = [DISPID_PROPERTYPUT];

        let mut hr = HResult::S_OK;
        for (attempt, flags) in PUT_CONVENTIONS.iter().enumerate() {
            let mut params = DispParams {
                args: block.as_mut_slice(),
                named_args: &named,
            };
            hr = self.target.invoke_ex(id, *flags, &mut params, None);
            if hr.is_success() {
                return Ok(());
            }
            if hr != HResult::DISP_E_MEMBERNOTFOUND {
                break;
            }
            tracing::debug!(name, attempt, flags = *flags, "property put convention rejected");
        }
        Err(InteropError::NativeCall {
            code: hr.0,
            message: format!("Assignment of '{}'", name),
        })
    }

    /// Delete a property; `false` if it did not exist
    pub fn delete_property(&self, name: &str) -> InteropResult<bool> {
        let id = match self.target.get_dispid(name, FDEX_NAME_CASE_SENSITIVE) {
            Ok(id) => id,
            Err(hr) if hr.is_recoverable() => return Ok(false),
            Err(hr) => return Err(failure(hr, name, "Lookup of")),
        };
        let hr = self.target.delete_member_by_dispid(id);
        if hr == HResult::S_OK {
            Ok(true)
        } else if hr.is_success() || hr.is_recoverable() {
            Ok(false)
        } else {
            Err(failure(hr, name, "Deletion of"))
        }
    }

    /// Call a named method
    pub fn invoke_method(&self, name: &str, args: &mut [Arg]) -> InteropResult<Value> {
        let id = self.dispid(name, FDEX_NAME_CASE_SENSITIVE)?;
        self.invoke_by_ref(id, DISPATCH_METHOD, name, args)
    }

    /// Call the target itself, as a function or as a constructor
    pub fn invoke(&self, as_constructor: bool, args: &mut [Arg]) -> InteropResult<Value> {
        let flags = if as_constructor { DISPATCH_CONSTRUCT } else { DISPATCH_METHOD };
        self.invoke_by_ref(DISPID_VALUE, flags, "[default]", args)
    }

    /// Read the member named by `index`
    pub fn get_index(&self, index: u32) -> InteropResult<Value> {
        self.get_property(&index.to_string(), &mut [])
    }

    /// Assign the member named by `index`
    pub fn set_index(&self, index: u32, value: Value) -> InteropResult<()> {
        self.set_property(&index.to_string(), &[value])
    }

    /// Delete the member named by `index`
    pub fn delete_index(&self, index: u32) -> InteropResult<bool> {
        self.delete_property(&index.to_string())
    }

    /// Lazily enumerate member names.
    ///
    /// Each call starts a fresh enumeration. Only one enumeration may be
    /// active per target; a second one fails with
    /// [`InteropError::EnumerationBusy`] until the first is dropped.
    pub fn enumerate_member_names(&self) -> InteropResult<MemberNames<'a>> {
        let key = target_key(self.target);
        if !ACTIVE_ENUMERATIONS.lock().insert(key) {
            return Err(InteropError::EnumerationBusy);
        }
        Ok(MemberNames {
            target: self.target,
            key,
            cursor: DISPID_STARTENUM,
            done: false,
        })
    }

    /// Names that are not integer indices
    pub fn named_members(&self) -> InteropResult<Vec<String>> {
        self.enumerate_member_names()?
            .filter(|name| name.as_ref().map_or(true, |n| index_of(n).is_none()))
            .collect()
    }

    /// Integer indices present as member names
    pub fn indexed_members(&self) -> InteropResult<Vec<u32>> {
        let mut indices = Vec::new();
        for name in self.enumerate_member_names()? {
            if let Some(index) = index_of(&name?) {
                indices.push(index);
            }
        }
        Ok(indices)
    }
}

/// Lazy member-name enumeration; releases the target on drop
pub struct MemberNames<'a> {
    target: &'a dyn DispatchEx,
    key: usize,
    cursor: DispId,
    done: bool,
}

impl Iterator for MemberNames<'_> {
    type Item = InteropResult<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let step = self
            .target
            .get_next_dispid(FDEX_ENUM_ALL, self.cursor)
            .and_then(|next| match next {
                Some(id) => self.target.get_member_name(id).map(|name| Some((id, name))),
                None => Ok(None),
            });
        match step {
            Ok(Some((id, name))) => {
                self.cursor = id;
                Some(Ok(name))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(hr) => {
                self.done = true;
                Some(Err(InteropError::NativeCall {
                    code: hr.0,
                    message: "Member enumeration".to_string(),
                }))
            }
        }
    }
}

impl Drop for MemberNames<'_> {
    fn drop(&mut self) {
        ACTIVE_ENUMERATIONS.lock().remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_names() {
        assert_eq!(index_of("0"), Some(0));
        assert_eq!(index_of("42"), Some(42));
        assert_eq!(index_of("042"), None);
        assert_eq!(index_of("-1"), None);
        assert_eq!(index_of("+1"), None);
        assert_eq!(index_of("length"), None);
        assert_eq!(index_of(""), None);
    }
}
