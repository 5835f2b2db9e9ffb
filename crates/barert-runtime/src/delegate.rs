//! Closure objects.
//!
//! Every delegate is invoked the same way: `code(target, args...)`. How the
//! four slots are populated decides what that call does:
//!
//! | Kind            | target   | context        | extra    | code     |
//! |-----------------|----------|----------------|----------|----------|
//! | closed static   | delegate | first argument | function | thunk    |
//! | open static     | delegate | first argument | function | thunk    |
//! | closed instance | receiver | -              | -        | function |
//!
//! For the static kinds the compiler-generated thunk receives the delegate
//! itself and forwards to `extra`, prepending `context` when the function is
//! closed over its first parameter.

use core::ffi::c_void;
use core::ptr::NonNull;

use barert_abi::{DelegateObject, ObjectHeader};

use crate::object::ObjectRef;

/// One way of wiring a delegate's slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelegateInit {
    ClosedStatic {
        first_parameter: *mut ObjectHeader,
        function: *const c_void,
        thunk: *const c_void,
    },
    OpenStatic {
        first_parameter: *mut ObjectHeader,
        function: *const c_void,
        thunk: *const c_void,
    },
    ClosedInstance {
        receiver: *mut ObjectHeader,
        function: *const c_void,
    },
}

impl DelegateInit {
    /// Write the slots of `delegate`.
    ///
    /// # Safety
    ///
    /// `delegate` must point at an allocated delegate object.
    pub unsafe fn install(self, delegate: *mut DelegateObject) {
        let this = unsafe { &mut *delegate };
        match self {
            Self::ClosedStatic {
                first_parameter,
                function,
                thunk,
            }
            | Self::OpenStatic {
                first_parameter,
                function,
                thunk,
            } => {
                this.extra = function;
                this.context = first_parameter;
                this.code = thunk;
                this.target = delegate.cast();
            }
            Self::ClosedInstance { receiver, function } => {
                this.code = function;
                this.target = receiver;
            }
        }
    }
}

/// Non-null reference to a delegate object.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelegateRef(NonNull<DelegateObject>);

impl DelegateRef {
    /// # Safety
    ///
    /// A non-null `ptr` must point at an initialized delegate object.
    pub unsafe fn from_raw(ptr: *mut DelegateObject) -> Option<Self> {
        NonNull::new(ptr).map(Self)
    }

    pub fn as_ptr(self) -> *mut DelegateObject {
        self.0.as_ptr()
    }

    fn slots(&self) -> &DelegateObject {
        // SAFETY: the handle points at a live delegate.
        unsafe { self.0.as_ref() }
    }

    pub fn target(self) -> Option<ObjectRef> {
        unsafe { ObjectRef::from_raw(self.slots().target) }
    }

    pub fn context(self) -> Option<ObjectRef> {
        unsafe { ObjectRef::from_raw(self.slots().context) }
    }

    pub fn extra(self) -> *const c_void {
        self.slots().extra
    }

    pub fn code(self) -> *const c_void {
        self.slots().code
    }

    /// Call `code(target)`.
    ///
    /// # Safety
    ///
    /// `code` must be an `extern "C"` function with exactly this signature.
    pub unsafe fn invoke0<R>(self) -> R {
        let code: unsafe extern "C" fn(*mut ObjectHeader) -> R = unsafe { self.code().cast_fn() };
        unsafe { code(self.slots().target) }
    }

    /// Call `code(target, a)`.
    ///
    /// # Safety
    ///
    /// As for [`DelegateRef::invoke0`].
    pub unsafe fn invoke1<A, R>(self, a: A) -> R {
        let code: unsafe extern "C" fn(*mut ObjectHeader, A) -> R = unsafe { self.code().cast_fn() };
        unsafe { code(self.slots().target, a) }
    }

    /// Call `code(target, a, b)`.
    ///
    /// # Safety
    ///
    /// As for [`DelegateRef::invoke0`].
    pub unsafe fn invoke2<A, B, R>(self, a: A, b: B) -> R {
        let code: unsafe extern "C" fn(*mut ObjectHeader, A, B) -> R = unsafe { self.code().cast_fn() };
        unsafe { code(self.slots().target, a, b) }
    }
}

trait CastFn {
    /// # Safety
    ///
    /// The pointer must be a function of type `F`, and `F` a function
    /// pointer type.
    unsafe fn cast_fn<F: Copy>(self) -> F;
}

impl CastFn for *const c_void {
    unsafe fn cast_fn<F: Copy>(self) -> F {
        debug_assert_eq!(size_of::<F>(), size_of::<*const c_void>());
        unsafe { core::mem::transmute_copy(&self) }
    }
}

// =============================================================================
// Exported entry points
// =============================================================================

/// Signature: `(delegate: ptr, first_parameter: ptr, function: ptr, thunk: ptr) -> ()`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn __barert_delegate_init_closed_static(
    delegate: *mut DelegateObject,
    first_parameter: *mut ObjectHeader,
    function: *const c_void,
    thunk: *const c_void,
) {
    let init = DelegateInit::ClosedStatic {
        first_parameter,
        function,
        thunk,
    };
    unsafe { init.install(delegate) }
}

/// Signature: `(delegate: ptr, first_parameter: ptr, function: ptr, thunk: ptr) -> ()`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn __barert_delegate_init_open_static(
    delegate: *mut DelegateObject,
    first_parameter: *mut ObjectHeader,
    function: *const c_void,
    thunk: *const c_void,
) {
    let init = DelegateInit::OpenStatic {
        first_parameter,
        function,
        thunk,
    };
    unsafe { init.install(delegate) }
}

/// Signature: `(delegate: ptr, receiver: ptr, function: ptr) -> ()`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn __barert_delegate_init_closed_instance(
    delegate: *mut DelegateObject,
    receiver: *mut ObjectHeader,
    function: *const c_void,
) {
    unsafe { DelegateInit::ClosedInstance { receiver, function }.install(delegate) }
}
