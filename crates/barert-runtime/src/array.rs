//! Array handles, element access and reference stores.

use core::mem::size_of;
use core::ptr::NonNull;

use barert_abi::{ARRAY_DATA_OFFSET, ArrayHeader, ObjectHeader, TypeDescriptor};

use crate::fail::{FailFastReason, fail_fast};
use crate::object::{self, ObjectRef};

/// Non-null reference to an array allocated by [`crate::heap::allocate_array`]
/// or emitted by the compiler.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayRef(NonNull<ArrayHeader>);

impl ArrayRef {
    /// # Safety
    ///
    /// A non-null `ptr` must point at a live array whose descriptor is
    /// array-like and whose length field matches its allocation.
    pub unsafe fn from_raw(ptr: *mut ArrayHeader) -> Option<Self> {
        NonNull::new(ptr).map(Self)
    }

    pub(crate) fn from_non_null(ptr: NonNull<ArrayHeader>) -> Self {
        Self(ptr)
    }

    pub fn as_ptr(self) -> *mut ArrayHeader {
        self.0.as_ptr()
    }

    pub(crate) fn as_non_null(self) -> NonNull<ArrayHeader> {
        self.0
    }

    pub fn as_object(self) -> ObjectRef {
        ObjectRef::from_non_null(self.0.cast())
    }

    pub fn type_descriptor(self) -> &'static TypeDescriptor {
        self.as_object().type_descriptor()
    }

    pub fn element_type(self) -> Option<&'static TypeDescriptor> {
        self.type_descriptor().related_type()
    }

    pub fn len(self) -> i32 {
        // SAFETY: the handle points at a live array header.
        unsafe { (*self.0.as_ptr()).length }
    }

    pub fn is_empty(self) -> bool {
        self.len() == 0
    }

    pub fn component_size(self) -> usize {
        self.type_descriptor().component_size as usize
    }

    /// Address of element 0.
    pub fn data_ptr(self) -> *mut u8 {
        // SAFETY: elements follow the fixed header within the allocation.
        unsafe { self.0.as_ptr().cast::<u8>().add(ARRAY_DATA_OFFSET) }
    }

    /// Fail fast unless `0 <= index < len`.
    pub fn check_index(self, index: isize) -> usize {
        // Negative indices wrap to huge unsigned values.
        let index = index as usize;
        if index >= self.len() as u32 as usize {
            fail_fast(FailFastReason::IndexOutOfRange);
        }
        index
    }

    /// Fail fast unless the array's elements are exactly `size_of::<T>()`
    /// bytes wide.
    pub fn check_element<T>(self) {
        if size_of::<T>() != self.component_size() {
            fail_fast(FailFastReason::ElementSizeMismatch);
        }
    }

    pub fn get<T: Copy>(self, index: isize) -> T {
        self.check_element::<T>();
        let index = self.check_index(index);
        // SAFETY: index and element size checked above. Elements of inline
        // value arrays may be under-aligned for `T` on 32-bit targets.
        unsafe { self.data_ptr().cast::<T>().add(index).read_unaligned() }
    }

    pub fn set<T: Copy>(self, index: isize, value: T) {
        self.check_element::<T>();
        let index = self.check_index(index);
        // SAFETY: as in `get`.
        unsafe { self.data_ptr().cast::<T>().add(index).write_unaligned(value) }
    }

    pub fn get_ref(self, index: isize) -> Option<ObjectRef> {
        let raw = self.get::<*mut ObjectHeader>(index);
        // SAFETY: reference slots hold null or a live object.
        unsafe { ObjectRef::from_raw(raw) }
    }

    /// Store an object reference with the covariance check.
    ///
    /// Null is always accepted. For reference-element arrays a non-null
    /// value must have exactly the element descriptor.
    pub fn store_ref(self, index: isize, value: Option<ObjectRef>) {
        let td = self.type_descriptor();
        if let Some(obj) = value {
            if td.has_reference_elements() && !core::ptr::eq(obj.type_descriptor(), td.related_type) {
                fail_fast(FailFastReason::ArrayCovariance);
            }
        }
        self.set::<*mut ObjectHeader>(index, object::as_raw(value));
    }
}

// =============================================================================
// Exported entry points
// =============================================================================

/// Covariant array store.
///
/// Signature: `(array: ptr, index: isize, obj: ptr) -> ()`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn __barert_stelem_ref(
    array: *mut ArrayHeader,
    index: isize,
    obj: *mut ObjectHeader,
) {
    // SAFETY: generated code passes a live array (null is checked before
    // the call) and null or a live object.
    let Some(array) = (unsafe { ArrayRef::from_raw(array) }) else {
        fail_fast(FailFastReason::IndexOutOfRange)
    };
    array.store_ref(index, unsafe { ObjectRef::from_raw(obj) });
}

/// Reference-field store. There is no collector, so no barrier work.
///
/// Signature: `(dst: ptr, obj: ptr) -> ()`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn __barert_assign_ref(dst: *mut *mut ObjectHeader, obj: *mut ObjectHeader) {
    unsafe { dst.write(obj) }
}

/// Reference store to a location that may not be on the managed heap.
///
/// Signature: `(dst: ptr, obj: ptr) -> ()`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn __barert_checked_assign_ref(dst: *mut *mut ObjectHeader, obj: *mut ObjectHeader) {
    unsafe { dst.write(obj) }
}
