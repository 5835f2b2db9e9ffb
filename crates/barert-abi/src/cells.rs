//! Lazily-mutated cells emitted by the compiler.
//!
//! Each cell starts zeroed in the binary's data section and is written at
//! most once by the runtime on first use.

use core::ffi::{c_char, c_void};
use core::mem::{offset_of, size_of};

const POINTER_SIZE: usize = size_of::<*const u8>();

/// Guards a type's (or module's) static constructor.
///
/// `initialized` goes from 0 to 1 exactly once, before `initializer` runs.
#[repr(C)]
#[derive(Debug)]
pub struct StaticClassConstructionContext {
    pub initializer: Option<unsafe extern "C" fn()>,
    pub initialized: i32,
}

impl StaticClassConstructionContext {
    pub const fn new(initializer: unsafe extern "C" fn()) -> Self {
        Self {
            initializer: Some(initializer),
            initialized: 0,
        }
    }
}

/// A foreign module referenced by one or more [`MethodFixupCell`]s.
#[repr(C)]
#[derive(Debug)]
pub struct ModuleFixupCell {
    /// Loaded module handle; null until the first call through any method.
    pub handle: *mut c_void,
    /// NUL-terminated platform library name.
    pub module_name: *const c_char,
    pub calling_type: *const c_void,
    pub search_path_and_cookie: u32,
}

/// A foreign function bound by (module, symbol) name.
#[repr(C)]
#[derive(Debug)]
pub struct MethodFixupCell {
    /// Resolved address; null until first call.
    pub target: *mut c_void,
    /// NUL-terminated symbol name.
    pub method_name: *const c_char,
    pub module: *mut ModuleFixupCell,
    pub flags: i32,
}

impl ModuleFixupCell {
    pub const fn new(module_name: *const c_char) -> Self {
        Self {
            handle: core::ptr::null_mut(),
            module_name,
            calling_type: core::ptr::null(),
            search_path_and_cookie: 0,
        }
    }
}

impl MethodFixupCell {
    pub const fn new(method_name: *const c_char, module: *mut ModuleFixupCell) -> Self {
        Self {
            target: core::ptr::null_mut(),
            method_name,
            module,
            flags: 0,
        }
    }
}

const _: () = {
    assert!(offset_of!(StaticClassConstructionContext, initializer) == 0);
    assert!(offset_of!(StaticClassConstructionContext, initialized) == POINTER_SIZE);
    assert!(offset_of!(ModuleFixupCell, handle) == 0);
    assert!(offset_of!(ModuleFixupCell, module_name) == POINTER_SIZE);
    assert!(offset_of!(ModuleFixupCell, search_path_and_cookie) == 3 * POINTER_SIZE);
    assert!(offset_of!(MethodFixupCell, target) == 0);
    assert!(offset_of!(MethodFixupCell, method_name) == POINTER_SIZE);
    assert!(offset_of!(MethodFixupCell, module) == 2 * POINTER_SIZE);
    assert!(offset_of!(MethodFixupCell, flags) == 3 * POINTER_SIZE);
};
