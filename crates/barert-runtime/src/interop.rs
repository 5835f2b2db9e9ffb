//! Lazy binding of foreign functions.
//!
//! Generated code calls through a [`MethodFixupCell`]. The first call loads
//! the cell's module (once per module cell) and resolves the symbol; later
//! calls read the cached address.

use core::ffi::{CStr, c_void};
use core::ptr::NonNull;

use barert_abi::{MethodFixupCell, ModuleFixupCell};

use crate::fail::{FailFastReason, fail_fast};
use crate::platform;

/// Host mechanism for loading modules and looking up symbols.
pub trait SymbolLoader {
    fn load_module(&self, name: &CStr) -> Option<NonNull<c_void>>;

    fn resolve_symbol(&self, module: NonNull<c_void>, name: &CStr) -> Option<NonNull<c_void>>;
}

impl<L: SymbolLoader + ?Sized> SymbolLoader for &L {
    fn load_module(&self, name: &CStr) -> Option<NonNull<c_void>> {
        (**self).load_module(name)
    }

    fn resolve_symbol(&self, module: NonNull<c_void>, name: &CStr) -> Option<NonNull<c_void>> {
        (**self).resolve_symbol(module, name)
    }
}

/// Return the address bound to `cell`, resolving it on first use.
///
/// # Safety
///
/// `cell` must point at a live fixup cell whose name pointers (and whose
/// module cell's name pointer) are NUL-terminated strings.
#[inline]
pub unsafe fn resolve<L: SymbolLoader + ?Sized>(cell: *mut MethodFixupCell, loader: &L) -> NonNull<c_void> {
    match NonNull::new(unsafe { (*cell).target }) {
        Some(target) => target,
        None => unsafe { resolve_slow(cell, loader) },
    }
}

#[cold]
#[inline(never)]
unsafe fn resolve_slow<L: SymbolLoader + ?Sized>(cell: *mut MethodFixupCell, loader: &L) -> NonNull<c_void> {
    let module_cell = unsafe { (*cell).module };
    let module = unsafe { load_module(module_cell, loader) };

    let name = unsafe { CStr::from_ptr((*cell).method_name) };
    let Some(target) = loader.resolve_symbol(module, name) else {
        tracing::error!(symbol = ?name, "symbol lookup failed");
        fail_fast(FailFastReason::SymbolNotFound)
    };
    tracing::debug!(symbol = ?name, address = ?target, "resolved foreign symbol");

    unsafe { (*cell).target = target.as_ptr() };
    target
}

unsafe fn load_module<L: SymbolLoader + ?Sized>(cell: *mut ModuleFixupCell, loader: &L) -> NonNull<c_void> {
    if let Some(handle) = NonNull::new(unsafe { (*cell).handle }) {
        return handle;
    }

    let name = unsafe { CStr::from_ptr((*cell).module_name) };
    let Some(handle) = loader.load_module(name) else {
        tracing::error!(module = ?name, "module load failed");
        fail_fast(FailFastReason::ModuleNotFound)
    };
    tracing::debug!(module = ?name, "loaded foreign module");

    unsafe { (*cell).handle = handle.as_ptr() };
    handle
}

/// Signature: `(cell: ptr) -> ptr`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn __barert_resolve_pinvoke(cell: *mut MethodFixupCell) -> *mut c_void {
    unsafe { resolve(cell, platform::symbol_loader()) }.as_ptr()
}
