//! Platform backends.
//!
//! Exactly one backend is `current`, selected by target cfg. Each backend
//! module exposes the same set of free functions and types; nothing is
//! dispatched at run time.
//!
//! The UEFI backend uses no host libraries, so it is compiled on every
//! target and can be driven by a fake system table in tests.

pub mod efi;
#[cfg(unix)]
pub mod posix;
#[cfg(windows)]
pub mod windows;

#[cfg(target_os = "uefi")]
pub(crate) use efi as current;
#[cfg(all(unix, not(target_os = "uefi")))]
pub(crate) use posix as current;
#[cfg(all(windows, not(target_os = "uefi")))]
pub(crate) use windows as current;

pub use current::{PlatformConsole, PlatformHeap, PlatformLoader};

use core::ffi::c_char;

use crate::array::ArrayRef;

/// Host memory.
pub fn heap() -> &'static PlatformHeap {
    current::heap()
}

/// Host dynamic linker.
pub fn symbol_loader() -> &'static PlatformLoader {
    current::symbol_loader()
}

/// The process console.
///
/// # Safety
///
/// The returned reference must not outlive the current call into the
/// runtime, and no other reference to the console may be live.
pub unsafe fn console() -> &'static mut PlatformConsole {
    unsafe { current::console() }
}

pub fn sleep(milliseconds: u32) {
    current::sleep(milliseconds)
}

pub fn tick_count64() -> i64 {
    current::tick_count64()
}

/// Remember the process's `argc`/`argv`. Backends that read the command
/// line elsewhere ignore it.
///
/// # Safety
///
/// `argv` must hold `argc` NUL-terminated strings that live for the rest of
/// the program.
pub unsafe fn store_command_line(argc: i32, argv: *const *const c_char) {
    unsafe { current::store_command_line(argc, argv) }
}

/// The program's arguments, without the program name, as a `String[]`.
pub fn main_arguments() -> ArrayRef {
    current::main_arguments()
}
