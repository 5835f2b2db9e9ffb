//! UTF-16 strings and the built-in string descriptors.

use core::ffi::{CStr, c_char};
use core::ptr::NonNull;

use barert_abi::{ObjectHeader, STRING_DATA_OFFSET, StringHeader, TypeDescriptor};

use crate::fail::{FailFastReason, fail_fast};
use crate::heap::{HostAllocator, allocate_array};
use crate::object::ObjectRef;
use crate::platform;

/// Descriptor of the string type, shared with generated code.
#[unsafe(export_name = "__barert_string_type")]
pub static STRING_TYPE: TypeDescriptor = TypeDescriptor::string(0x5354_5247);

/// Descriptor of `String[]`, used for the main arguments.
#[unsafe(export_name = "__barert_string_array_type")]
pub static STRING_ARRAY_TYPE: TypeDescriptor = TypeDescriptor::reference_array(&STRING_TYPE, 0x5354_5241);

/// Non-null reference to a string object.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StringRef(NonNull<StringHeader>);

impl StringRef {
    /// # Safety
    ///
    /// A non-null `ptr` must point at a live string object.
    pub unsafe fn from_raw(ptr: *mut StringHeader) -> Option<Self> {
        NonNull::new(ptr).map(Self)
    }

    pub fn as_ptr(self) -> *mut StringHeader {
        self.0.as_ptr()
    }

    pub fn as_object(self) -> ObjectRef {
        ObjectRef::from_non_null(self.0.cast::<ObjectHeader>())
    }

    pub fn len(self) -> i32 {
        // SAFETY: the handle points at a live string header.
        unsafe { (*self.0.as_ptr()).length }
    }

    pub fn is_empty(self) -> bool {
        self.len() == 0
    }

    fn data_ptr(self) -> *mut u16 {
        // SAFETY: code units follow the fixed header within the allocation.
        unsafe { self.0.as_ptr().cast::<u8>().add(STRING_DATA_OFFSET).cast() }
    }

    /// The code units, without the terminator.
    pub fn as_utf16(self) -> &'static [u16] {
        // SAFETY: strings are immutable once built and never freed.
        unsafe { core::slice::from_raw_parts(self.data_ptr(), self.len() as usize) }
    }

    pub fn char_at(self, index: i32) -> u16 {
        match self.as_utf16().get(index as u32 as usize) {
            Some(&unit) => unit,
            None => fail_fast(FailFastReason::IndexOutOfRange),
        }
    }

    // =========================================================================
    // Construction
    // =========================================================================

    /// A zero-filled string of `len` units. Callers fill it before handing
    /// it out; strings are immutable afterwards.
    fn allocate<H: HostAllocator + ?Sized>(host: &H, len: usize) -> Self {
        let len = i32::try_from(len).unwrap_or_else(|_| fail_fast(FailFastReason::InvalidArrayLength));
        let array = allocate_array(host, &STRING_TYPE, len);
        Self(array.as_non_null().cast())
    }

    fn from_units<H, I>(host: &H, len: usize, units: I) -> Self
    where
        H: HostAllocator + ?Sized,
        I: IntoIterator<Item = u16>,
    {
        let string = Self::allocate(host, len);
        let data = string.data_ptr();
        for (i, unit) in units.into_iter().take(len).enumerate() {
            // SAFETY: `i < len`, and the allocation holds `len` units.
            unsafe { data.add(i).write(unit) };
        }
        string
    }

    pub fn from_utf16<H: HostAllocator + ?Sized>(host: &H, units: &[u16]) -> Self {
        Self::from_units(host, units.len(), units.iter().copied())
    }

    /// # Safety
    ///
    /// `ptr` must point at a readable sequence of units ending in 0.
    pub unsafe fn from_utf16_cstr<H: HostAllocator + ?Sized>(host: &H, ptr: *const u16) -> Self {
        let mut len = 0;
        while unsafe { ptr.add(len).read() } != 0 {
            len += 1;
        }
        let units = unsafe { core::slice::from_raw_parts(ptr, len) };
        Self::from_utf16(host, units)
    }

    /// Build a string from 8-bit text.
    ///
    /// Bytes are widened one to one, and any byte above 0x7F fails fast with
    /// `NonAsciiText`. With the `utf8` feature the bytes are decoded as UTF-8
    /// instead, and malformed input fails fast with `InvalidUtf8`.
    pub fn from_narrow<H: HostAllocator + ?Sized>(host: &H, bytes: &[u8]) -> Self {
        #[cfg(not(feature = "utf8"))]
        {
            if !bytes.is_ascii() {
                fail_fast(FailFastReason::NonAsciiText);
            }
            Self::from_units(host, bytes.len(), bytes.iter().map(|&b| u16::from(b)))
        }

        #[cfg(feature = "utf8")]
        {
            let text = core::str::from_utf8(bytes).unwrap_or_else(|_| fail_fast(FailFastReason::InvalidUtf8));
            Self::from_units(host, text.encode_utf16().count(), text.encode_utf16())
        }
    }

    /// # Safety
    ///
    /// `ptr` must point at a NUL-terminated byte string.
    pub unsafe fn from_narrow_cstr<H: HostAllocator + ?Sized>(host: &H, ptr: *const c_char) -> Self {
        let bytes = unsafe { CStr::from_ptr(ptr) }.to_bytes();
        Self::from_narrow(host, bytes)
    }
}

// =============================================================================
// Exported entry points
// =============================================================================

/// Signature: `(text: ptr) -> ptr`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn __barert_string_from_narrow(text: *const c_char) -> *mut StringHeader {
    unsafe { StringRef::from_narrow_cstr(platform::heap(), text) }.as_ptr()
}

/// Signature: `(text: ptr) -> ptr`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn __barert_string_from_utf16(text: *const u16) -> *mut StringHeader {
    unsafe { StringRef::from_utf16_cstr(platform::heap(), text) }.as_ptr()
}
