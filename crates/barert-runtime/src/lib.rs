//! barert runtime library.
//!
//! Provides the runtime support that ahead-of-time compiled programs link
//! against when there is no garbage collector and no managed runtime:
//! - Object and array allocation (`__barert_new_fast`, `__barert_new_array`)
//! - Covariant array stores and write barriers (`__barert_stelem_ref`, ...)
//! - String construction from narrow and wide C strings
//! - Delegate construction (`__barert_delegate_init_*`)
//! - Lazy static constructors (`__barert_check_static_ctor`)
//! - Lazy foreign-symbol binding (`__barert_resolve_pinvoke`)
//! - Checked arithmetic helpers and the fail-fast entry points
//! - Console, clock, sleep and command-line access for one of three
//!   platforms: hosted POSIX, hosted Windows, or UEFI firmware
//!
//! Nothing allocated here is ever freed. There is no collector, no
//! unwinding and no locking; every contract violation terminates the
//! process through [`fail::fail_fast`].

#![cfg_attr(panic = "abort", no_std)]
#![allow(clippy::missing_safety_doc)]

#[cfg(not(any(unix, windows, target_os = "uefi")))]
compile_error!("barert supports hosted POSIX, hosted Windows and UEFI targets only");

pub mod arith;
pub mod array;
mod cell;
pub mod console;
pub mod delegate;
pub mod environment;
pub mod fail;
pub mod heap;
pub mod interop;
pub mod object;
pub mod platform;
pub mod span;
pub mod startup;
pub mod static_init;
pub mod string;

pub use array::ArrayRef;
pub use barert_abi as abi;
pub use fail::{FailFastReason, fail_fast};
pub use heap::HostAllocator;
pub use object::ObjectRef;
pub use span::{ReadOnlySpan, Span};
pub use string::StringRef;

use barert_abi::ObjectHeader;

// =============================================================================
// Global allocator and panic handler (no_std)
//
// Rust-side allocations go through the same host allocator as managed
// objects and are never returned. Only compiled when panic="abort" (the
// `runtime` profile); in dev/test builds std provides these.
// =============================================================================

#[cfg(all(not(test), panic = "abort"))]
mod no_std_runtime {
    use core::alloc::{GlobalAlloc, Layout};
    use core::ptr::{NonNull, null_mut};

    use crate::fail::FailFastReason;
    use crate::platform::current;

    struct LeakingAllocator;

    unsafe impl GlobalAlloc for LeakingAllocator {
        unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
            crate::heap::allocate_aligned(current::heap(), layout).map_or(null_mut(), NonNull::as_ptr)
        }

        // Host memory is already zeroed.
        unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
            unsafe { self.alloc(layout) }
        }

        unsafe fn dealloc(&self, _ptr: *mut u8, _layout: Layout) {}
    }

    #[global_allocator]
    static ALLOCATOR: LeakingAllocator = LeakingAllocator;

    #[panic_handler]
    fn panic(_: &core::panic::PanicInfo) -> ! {
        current::fail_fast(FailFastReason::Panic)
    }

    // Pre-compiled alloc/core reference this symbol even with panic="abort".
    #[unsafe(no_mangle)]
    pub extern "C" fn rust_eh_personality() {}
}

// =============================================================================
// Managed/native transitions
//
// Generated code brackets every native-to-managed and managed-to-native
// transition with these calls. Without a collector there is nothing to
// synchronize with, so they are no-ops kept only as stable symbols.
// =============================================================================

/// Signature: `(frame: ptr) -> ()`
#[unsafe(no_mangle)]
pub extern "C" fn __barert_reverse_pinvoke(_frame: *mut u8) {}

/// Signature: `(frame: ptr) -> ()`
#[unsafe(no_mangle)]
pub extern "C" fn __barert_reverse_pinvoke_return(_frame: *mut u8) {}

/// Signature: `(frame: ptr) -> ()`
#[unsafe(no_mangle)]
pub extern "C" fn __barert_pinvoke(_frame: *mut u8) {}

/// Signature: `(frame: ptr) -> ()`
#[unsafe(no_mangle)]
pub extern "C" fn __barert_pinvoke_return(_frame: *mut u8) {}

/// Collector poll point. Never collects.
///
/// Signature: `() -> ()`
#[unsafe(no_mangle)]
pub extern "C" fn __barert_gc_poll() {}

/// Objects are never finalized, so there is nothing to suppress.
///
/// Signature: `(obj: ptr) -> ()`
#[unsafe(no_mangle)]
pub extern "C" fn __barert_suppress_finalize(_obj: *mut ObjectHeader) {}
