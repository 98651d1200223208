//! Scoped native argument blocks
//!
//! A block owns `n` contiguous variants holding one call's arguments in
//! native order: argument 0 occupies the last slot. Disposal clears every
//! slot before freeing the memory. It runs on drop, is idempotent, and also
//! covers blocks whose construction failed part-way.

use std::alloc::{self, Layout};
use std::ffi::c_void;
use std::ptr::NonNull;

use raya_interop_sdk::variant::{Variant, VT_BYREF, VT_VARIANT};
use raya_interop_sdk::{Arg, InteropError, InteropResult, Value};

use super::marshal::{from_variant, to_variant};

/// Heap block of variants, cleared and freed on drop
pub struct VariantBlock {
    ptr: NonNull<Variant>,
    len: usize,
    disposed: bool,
}

impl VariantBlock {
    /// Allocate `len` empty variants
    pub fn empty(len: usize) -> InteropResult<Self> {
        if len == 0 {
            return Ok(Self {
                ptr: NonNull::dangling(),
                len: 0,
                disposed: false,
            });
        }
        let layout = Layout::array::<Variant>(len)
            .map_err(|_| InteropError::Resource(format!("Variant block of {} slots is too large", len)))?;
        // SAFETY: layout has non-zero size; all-zero bytes are VT_EMPTY
        let raw = unsafe { alloc::alloc_zeroed(layout) } as *mut Variant;
        let ptr = NonNull::new(raw)
            .ok_or_else(|| InteropError::Resource(format!("Failed to allocate {} variants", len)))?;
        Ok(Self {
            ptr,
            len,
            disposed: false,
        })
    }

    /// Marshal `values` in reverse order into a new block
    pub fn new(values: &[Value]) -> InteropResult<Self> {
        let mut block = Self::empty(values.len())?;
        let n = values.len();
        for (index, value) in values.iter().enumerate() {
            // on error the block drops here and clears the slots already written
            to_variant(value, &mut block.as_mut_slice()[n - 1 - index])?;
        }
        Ok(block)
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check for an empty block
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Slots in native order
    pub fn as_slice(&self) -> &[Variant] {
        // SAFETY: ptr is valid for len initialized variants (len is 0 once
        // disposed)
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// Mutable slots in native order
    pub fn as_mut_slice(&mut self) -> &mut [Variant] {
        // SAFETY: as above, and `&mut self` guarantees exclusivity
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    /// Slot holding argument `index`
    pub fn argument(&self, index: usize) -> Option<&Variant> {
        let n = self.len;
        self.as_slice().get(n.checked_sub(index + 1)?)
    }

    /// Clear every slot and free the block. Safe to call repeatedly.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        for slot in self.as_mut_slice() {
            // SAFETY: slots are only written by `to_variant`, which keeps
            // tags and payloads consistent
            unsafe { slot.clear() };
        }
        if self.len > 0 {
            if let Ok(layout) = Layout::array::<Variant>(self.len) {
                // SAFETY: allocated in `empty` with this layout
                unsafe { alloc::dealloc(self.ptr.as_ptr() as *mut u8, layout) };
            }
        }
        self.ptr = NonNull::dangling();
        self.len = 0;
        self.disposed = true;
    }

    /// Check if the block has been disposed
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

impl Drop for VariantBlock {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Argument block whose slots are passed by reference.
///
/// The callee sees `VT_BYREF | VT_VARIANT` slots pointing at the value block,
/// so it may overwrite arguments; [`read_back`](Self::read_back) copies the
/// post-call values into the caller's arguments.
pub struct ByRefVariantBlock {
    // dropped before `values`, which it points into
    refs: VariantBlock,
    values: VariantBlock,
}

impl ByRefVariantBlock {
    /// Marshal `values` in reverse order, with a reference slot for each
    pub fn new(values: &[Value]) -> InteropResult<Self> {
        let mut values = VariantBlock::new(values)?;
        let mut refs = VariantBlock::empty(values.len())?;
        for (slot, target) in refs.as_mut_slice().iter_mut().zip(values.as_mut_slice()) {
            slot.vt = VT_BYREF | VT_VARIANT;
            slot.data.ptr = target as *mut Variant as *mut c_void;
        }
        Ok(Self { refs, values })
    }

    /// Reference slots to pass to the callee
    pub fn refs_mut(&mut self) -> &mut [Variant] {
        self.refs.as_mut_slice()
    }

    /// Value slots in native order
    pub fn values(&self) -> &VariantBlock {
        &self.values
    }

    /// Copy each post-call argument value into `args`
    pub fn read_back(&self, args: &mut [Arg]) -> InteropResult<()> {
        for (index, arg) in args.iter_mut().enumerate() {
            if let Some(slot) = self.values.argument(index) {
                arg.set_value(from_variant(slot)?);
            }
        }
        Ok(())
    }
}
