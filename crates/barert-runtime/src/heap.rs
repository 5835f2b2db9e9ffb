//! Permanent-leak allocator for managed objects and arrays.
//!
//! Every allocation comes zeroed from the host and is never returned. The
//! only work done here is size arithmetic and writing the header.

use core::alloc::Layout;
use core::mem::size_of;
use core::ptr::NonNull;

use barert_abi::{ArrayHeader, ObjectHeader, TypeDescriptor};

use crate::array::ArrayRef;
use crate::fail::{FailFastReason, fail_fast};
use crate::object::ObjectRef;
use crate::platform;

/// Alignment every [`HostAllocator`] guarantees.
pub const HOST_ALIGN: usize = 8;

/// Source of zeroed memory. One implementation per platform backend.
pub trait HostAllocator {
    /// Return `size` zeroed bytes aligned to at least [`HOST_ALIGN`], or
    /// `None` if the host is out of memory.
    fn allocate_zeroed(&self, size: usize) -> Option<NonNull<u8>>;
}

impl<A: HostAllocator + ?Sized> HostAllocator for &A {
    fn allocate_zeroed(&self, size: usize) -> Option<NonNull<u8>> {
        (**self).allocate_zeroed(size)
    }
}

/// Allocate a zeroed instance of `td` with its header filled in.
pub fn allocate_object<H: HostAllocator + ?Sized>(host: &H, td: &'static TypeDescriptor) -> ObjectRef {
    let size = (td.base_size as usize).max(size_of::<ObjectHeader>());
    let memory = host
        .allocate_zeroed(size)
        .unwrap_or_else(|| fail_fast(FailFastReason::OutOfMemory));

    #[cfg(feature = "debug_runtime")]
    tracing::trace!(size, hash = td.hash_code, "allocate object");

    let header = memory.cast::<ObjectHeader>();
    // SAFETY: freshly allocated, at least one header in size and aligned.
    unsafe { header.as_ptr().write(ObjectHeader { type_descriptor: td }) };
    ObjectRef::from_non_null(header)
}

/// Allocate a zeroed array of `count` elements of the array type `td`.
///
/// Fails fast with `InvalidArrayLength` if `count` is negative or the size
/// does not fit in `isize`, and with `OutOfMemory` if the host refuses.
pub fn allocate_array<H: HostAllocator + ?Sized>(
    host: &H,
    td: &'static TypeDescriptor,
    count: i32,
) -> ArrayRef {
    let size = array_size(td, count).unwrap_or_else(|| fail_fast(FailFastReason::InvalidArrayLength));
    let memory = host
        .allocate_zeroed(size)
        .unwrap_or_else(|| fail_fast(FailFastReason::OutOfMemory));

    #[cfg(feature = "debug_runtime")]
    tracing::trace!(size, count, hash = td.hash_code, "allocate array");

    let header = memory.cast::<ArrayHeader>();
    // SAFETY: the allocation covers the fixed part; the padding word (if
    // any) is already zero.
    unsafe {
        let raw = header.as_ptr();
        (*raw).header.type_descriptor = td;
        (*raw).length = count;
    }
    ArrayRef::from_non_null(header)
}

fn array_size(td: &TypeDescriptor, count: i32) -> Option<usize> {
    let count = usize::try_from(count).ok()?;
    let size = (td.component_size as usize)
        .checked_mul(count)?
        .checked_add((td.base_size as usize).max(size_of::<ArrayHeader>()))?;
    (size <= isize::MAX as usize).then_some(size)
}

/// Allocate memory for an arbitrary Rust layout. Over-aligned requests are
/// over-allocated and aligned up; the slack is never reclaimed.
pub fn allocate_aligned<H: HostAllocator + ?Sized>(host: &H, layout: Layout) -> Option<NonNull<u8>> {
    let size = layout.size().max(1);
    if layout.align() <= HOST_ALIGN {
        return host.allocate_zeroed(size);
    }
    let padded = size.checked_add(layout.align() - 1)?;
    let base = host.allocate_zeroed(padded)?;
    let offset = base.as_ptr().align_offset(layout.align());
    // SAFETY: `offset < align`, which the padding covers.
    Some(unsafe { base.add(offset) })
}

// =============================================================================
// Exported entry points
// =============================================================================

/// Signature: `(td: ptr) -> ptr`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn __barert_new_fast(td: *const TypeDescriptor) -> *mut ObjectHeader {
    // SAFETY: generated code passes a program-lifetime descriptor.
    let td = unsafe { &*td };
    allocate_object(platform::heap(), td).as_ptr()
}

/// Signature: `(td: ptr, count: i32) -> ptr`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn __barert_new_array(td: *const TypeDescriptor, count: i32) -> *mut ArrayHeader {
    // SAFETY: generated code passes a program-lifetime array descriptor.
    let td = unsafe { &*td };
    allocate_array(platform::heap(), td, count).as_ptr()
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Leaks everything it hands out, like the real backends.
    pub(crate) struct LeakHeap;

    impl HostAllocator for LeakHeap {
        fn allocate_zeroed(&self, size: usize) -> Option<NonNull<u8>> {
            let layout = Layout::from_size_align(size.max(1), 16).ok()?;
            NonNull::new(unsafe { std::alloc::alloc_zeroed(layout) })
        }
    }

    pub(crate) struct ExhaustedHeap;

    impl HostAllocator for ExhaustedHeap {
        fn allocate_zeroed(&self, _size: usize) -> Option<NonNull<u8>> {
            None
        }
    }
}
