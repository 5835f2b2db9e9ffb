//! Process startup and argument marshaling.
//!
//! The platform entry point (`main` or `efi_main`) stores whatever argument
//! vector the host provides and calls the compiler-provided managed main.
//! The managed main asks for its `String[]` through
//! `__barert_get_main_args`.

use core::ffi::c_char;

use barert_abi::ArrayHeader;

use crate::array::ArrayRef;
use crate::heap::{HostAllocator, allocate_array};
use crate::platform;
use crate::string::{STRING_ARRAY_TYPE, StringRef};

#[cfg(all(not(test), panic = "abort"))]
unsafe extern "C" {
    /// Emitted by the compiler for the program's entry method.
    pub(crate) fn __barert_managed_main(argc: i32, argv: *const *const c_char) -> i32;
}

/// Build a `String[]` holding `strings` in order.
pub fn string_array<H, I>(host: &H, strings: I) -> ArrayRef
where
    H: HostAllocator + ?Sized,
    I: ExactSizeIterator<Item = StringRef>,
{
    let count = i32::try_from(strings.len()).unwrap_or(i32::MAX);
    let array = allocate_array(host, &STRING_ARRAY_TYPE, count);
    for (index, string) in strings.take(count as usize).enumerate() {
        array.store_ref(index as isize, Some(string.as_object()));
    }
    array
}

/// The program's arguments, without the program name.
pub fn command_line_args() -> ArrayRef {
    platform::main_arguments()
}

/// Signature: `(argc: i32, argv: ptr) -> ()`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn __barert_init_command_line(argc: i32, argv: *const *const c_char) {
    unsafe { platform::store_command_line(argc, argv) }
}

/// Signature: `() -> ptr`
#[unsafe(no_mangle)]
pub extern "C" fn __barert_get_main_args() -> *mut ArrayHeader {
    command_line_args().as_ptr()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::testing::LeakHeap;

    #[test]
    fn test_string_array_keeps_order() {
        let words: [&[u8]; 3] = [b"alpha", b"beta", b"gamma"];
        let array = string_array(&LeakHeap, words.iter().map(|w| StringRef::from_narrow(&LeakHeap, w)));
        assert_eq!(array.len(), 3);
        assert!(core::ptr::eq(array.type_descriptor(), &STRING_ARRAY_TYPE));
        let second = array.get_ref(1).unwrap();
        let second = unsafe { StringRef::from_raw(second.as_ptr().cast()) }.unwrap();
        assert_eq!(second.as_utf16(), "beta".encode_utf16().collect::<Vec<_>>().as_slice());
    }

    #[test]
    fn test_empty_string_array() {
        let array = string_array(&LeakHeap, core::iter::empty());
        assert!(array.is_empty());
    }
}
