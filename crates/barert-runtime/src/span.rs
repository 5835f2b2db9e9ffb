//! Bounds-checked views over contiguous memory.
//!
//! A span is a pointer plus an `i32` length. It may view an array's
//! elements, a sub-range of them, stack memory, or raw native memory. Every
//! index goes through one unsigned comparison against the length.

use core::marker::PhantomData;
use core::ops::{Index, IndexMut};
use core::ptr::NonNull;

use crate::array::ArrayRef;
use crate::fail::{FailFastReason, fail_fast};

#[inline]
fn check_index(index: i32, length: i32) -> usize {
    if index as u32 >= length as u32 {
        fail_fast(FailFastReason::IndexOutOfRange);
    }
    index as usize
}

fn slice_length(len: usize) -> i32 {
    i32::try_from(len).unwrap_or_else(|_| fail_fast(FailFastReason::IndexOutOfRange))
}

/// Element pointer and length for `array[start..start + length]`, or the
/// empty view when there is no array.
fn array_range<T>(array: Option<ArrayRef>, start: i32, length: i32) -> (NonNull<T>, i32) {
    let Some(array) = array else {
        if start != 0 || length != 0 {
            fail_fast(FailFastReason::IndexOutOfRange);
        }
        return (NonNull::dangling(), 0);
    };
    array.check_element::<T>();
    if u64::from(start as u32) + u64::from(length as u32) > u64::from(array.len() as u32) {
        fail_fast(FailFastReason::IndexOutOfRange);
    }
    // SAFETY: the range lies within the array's elements.
    let first = unsafe { array.data_ptr().cast::<T>().add(start as usize) };
    // SAFETY: data pointers of live arrays are never null.
    (unsafe { NonNull::new_unchecked(first) }, length)
}

// =============================================================================
// Span
// =============================================================================

/// Mutable view.
pub struct Span<'a, T> {
    reference: NonNull<T>,
    length: i32,
    _marker: PhantomData<&'a mut [T]>,
}

impl<'a, T> Span<'a, T> {
    pub fn empty() -> Self {
        Self {
            reference: NonNull::dangling(),
            length: 0,
            _marker: PhantomData,
        }
    }

    /// View all elements of `array`. A null array gives an empty view.
    pub fn from_array(array: Option<ArrayRef>) -> Self {
        let length = array.map_or(0, ArrayRef::len);
        Self::from_array_range(array, 0, length)
    }

    /// View `array[start..start + length]`.
    pub fn from_array_range(array: Option<ArrayRef>, start: i32, length: i32) -> Self {
        let (reference, length) = array_range(array, start, length);
        Self {
            reference,
            length,
            _marker: PhantomData,
        }
    }

    /// # Safety
    ///
    /// `ptr` must be valid for reads and writes of `length` elements for
    /// `'a`, and `length` must not be negative. Nothing is checked.
    pub unsafe fn from_raw(ptr: *mut T, length: i32) -> Self {
        Self {
            reference: NonNull::new(ptr).unwrap_or(NonNull::dangling()),
            length,
            _marker: PhantomData,
        }
    }

    pub fn from_slice(slice: &'a mut [T]) -> Self {
        let length = slice_length(slice.len());
        Self {
            // SAFETY: slice pointers are never null.
            reference: unsafe { NonNull::new_unchecked(slice.as_mut_ptr()) },
            length,
            _marker: PhantomData,
        }
    }

    pub fn len(&self) -> i32 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn to_slice(&self) -> &[T] {
        // SAFETY: `reference` is valid for `length` elements.
        unsafe { core::slice::from_raw_parts(self.reference.as_ptr(), self.length as usize) }
    }

    pub fn as_read_only(&self) -> ReadOnlySpan<'_, T> {
        ReadOnlySpan {
            reference: self.reference,
            length: self.length,
            _marker: PhantomData,
        }
    }

    pub fn fill(&mut self, value: T)
    where
        T: Copy,
    {
        for i in 0..self.length {
            self[i] = value;
        }
    }

    pub fn clear(&mut self)
    where
        T: Default,
    {
        for i in 0..self.length {
            self[i] = T::default();
        }
    }
}

impl<T> Index<i32> for Span<'_, T> {
    type Output = T;

    fn index(&self, index: i32) -> &T {
        let i = check_index(index, self.length);
        // SAFETY: bounds checked.
        unsafe { &*self.reference.as_ptr().add(i) }
    }
}

impl<T> IndexMut<i32> for Span<'_, T> {
    fn index_mut(&mut self, index: i32) -> &mut T {
        let i = check_index(index, self.length);
        // SAFETY: bounds checked.
        unsafe { &mut *self.reference.as_ptr().add(i) }
    }
}

// =============================================================================
// ReadOnlySpan
// =============================================================================

/// Shared view.
#[derive(Clone, Copy)]
pub struct ReadOnlySpan<'a, T> {
    reference: NonNull<T>,
    length: i32,
    _marker: PhantomData<&'a [T]>,
}

impl<'a, T> ReadOnlySpan<'a, T> {
    pub fn empty() -> Self {
        Self {
            reference: NonNull::dangling(),
            length: 0,
            _marker: PhantomData,
        }
    }

    pub fn from_array(array: Option<ArrayRef>) -> Self {
        let length = array.map_or(0, ArrayRef::len);
        Self::from_array_range(array, 0, length)
    }

    pub fn from_array_range(array: Option<ArrayRef>, start: i32, length: i32) -> Self {
        let (reference, length) = array_range(array, start, length);
        Self {
            reference,
            length,
            _marker: PhantomData,
        }
    }

    /// # Safety
    ///
    /// `ptr` must be valid for reads of `length` elements for `'a`, and
    /// `length` must not be negative. Nothing is checked.
    pub unsafe fn from_raw(ptr: *const T, length: i32) -> Self {
        Self {
            reference: NonNull::new(ptr.cast_mut()).unwrap_or(NonNull::dangling()),
            length,
            _marker: PhantomData,
        }
    }

    pub fn from_slice(slice: &'a [T]) -> Self {
        let length = slice_length(slice.len());
        Self {
            reference: NonNull::from(slice).cast(),
            length,
            _marker: PhantomData,
        }
    }

    pub fn len(&self) -> i32 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn to_slice(&self) -> &'a [T] {
        // SAFETY: `reference` is valid for `length` elements for `'a`.
        unsafe { core::slice::from_raw_parts(self.reference.as_ptr(), self.length as usize) }
    }
}

impl<T> Index<i32> for ReadOnlySpan<'_, T> {
    type Output = T;

    fn index(&self, index: i32) -> &T {
        let i = check_index(index, self.length);
        // SAFETY: bounds checked.
        unsafe { &*self.reference.as_ptr().add(i) }
    }
}

impl<'a, T> From<Span<'a, T>> for ReadOnlySpan<'a, T> {
    fn from(span: Span<'a, T>) -> Self {
        Self {
            reference: span.reference,
            length: span.length,
            _marker: PhantomData,
        }
    }
}

// =============================================================================
// Block memory helpers
// =============================================================================

/// Copy `len` bytes. The regions may overlap.
///
/// # Safety
///
/// Both regions must be valid for `len` bytes.
pub unsafe fn memmove(dest: *mut u8, src: *const u8, len: usize) {
    unsafe { core::ptr::copy(src, dest, len) }
}

/// # Safety
///
/// `dest` must be valid for writes of `len` bytes.
pub unsafe fn fill_bytes(dest: *mut u8, value: u8, len: usize) {
    unsafe { core::ptr::write_bytes(dest, value, len) }
}

/// Signature: `(dest: ptr, src: ptr, len: usize) -> ()`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn __barert_memmove(dest: *mut u8, src: *const u8, len: usize) {
    unsafe { memmove(dest, src, len) }
}

/// Signature: `(dest: ptr, value: u8, len: usize) -> ()`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn __barert_memset(dest: *mut u8, value: u8, len: usize) {
    unsafe { fill_bytes(dest, value, len) }
}
