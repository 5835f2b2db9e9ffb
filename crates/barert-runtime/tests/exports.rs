//! The C entry points, called by symbol name the way generated code calls
//! them.
//!
//! A fail-fast cannot unwind out of an `extern "C"` function, so only
//! successful calls are made here. The failing paths are covered through
//! the safe functions behind each export in `object_model.rs`.

use std::ffi::{c_char, c_void};
use std::sync::atomic::{AtomicU32, Ordering};

use barert_runtime::abi::{ArrayHeader, ObjectHeader, StaticClassConstructionContext, StringHeader, TypeDescriptor};
use barert_runtime::string::{STRING_ARRAY_TYPE, STRING_TYPE};
use barert_runtime::{ArrayRef, ObjectRef, StringRef};
use serial_test::serial;

unsafe extern "C" {
    static __barert_string_type: TypeDescriptor;
    static __barert_string_array_type: TypeDescriptor;

    fn __barert_new_fast(td: *const TypeDescriptor) -> *mut ObjectHeader;
    fn __barert_new_array(td: *const TypeDescriptor, count: i32) -> *mut ArrayHeader;
    fn __barert_stelem_ref(array: *mut ArrayHeader, index: isize, obj: *mut ObjectHeader);
    fn __barert_string_from_narrow(text: *const c_char) -> *mut StringHeader;
    fn __barert_string_from_utf16(text: *const u16) -> *mut StringHeader;
    fn __barert_check_static_ctor(ctx: *mut StaticClassConstructionContext);
    fn __barert_check_static_ctor_return_base(ctx: *mut StaticClassConstructionContext, base: *mut u8) -> *mut u8;
    fn __barert_memmove(dest: *mut u8, src: *const u8, len: usize);
    fn __barert_memset(dest: *mut u8, value: u8, len: usize);
    fn __barert_div_u64(a: u64, b: u64) -> u64;
    fn __barert_mod_i64(a: i64, b: i64) -> i64;
    fn __barert_f64_to_i32_checked(value: f64) -> i32;
    fn __barert_init_command_line(argc: i32, argv: *const *const c_char);
    fn __barert_get_main_args() -> *mut ArrayHeader;
    fn __barert_resolve_pinvoke(cell: *mut c_void) -> *mut c_void;
    fn __barert_gc_poll();
    fn __barert_tick_count64() -> i64;
}

static NODE: TypeDescriptor = TypeDescriptor::object(32, 0x300);
static NODE_ARRAY: TypeDescriptor = TypeDescriptor::reference_array(&NODE, 0x301);

#[test]
fn test_exported_descriptors_are_the_runtime_statics() {
    assert!(std::ptr::eq(&raw const __barert_string_type, &STRING_TYPE));
    assert!(std::ptr::eq(&raw const __barert_string_array_type, &STRING_ARRAY_TYPE));
}

#[test]
fn test_allocate_and_store_by_symbol() {
    let node = unsafe { __barert_new_fast(&NODE) };
    let node = unsafe { ObjectRef::from_raw(node) }.unwrap();
    assert!(std::ptr::eq(node.type_descriptor(), &NODE));

    let array = unsafe { __barert_new_array(&NODE_ARRAY, 3) };
    unsafe { __barert_stelem_ref(array, 2, node.as_ptr()) };
    let array = unsafe { ArrayRef::from_raw(array) }.unwrap();
    assert_eq!(array.len(), 3);
    assert_eq!(array.get_ref(2), Some(node));
    assert!(array.get_ref(0).is_none());
}

#[test]
fn test_strings_by_symbol() {
    let narrow = unsafe { StringRef::from_raw(__barert_string_from_narrow(c"Hello".as_ptr())) }.unwrap();
    let wide: Vec<u16> = "Hello".encode_utf16().chain([0]).collect();
    let wide = unsafe { StringRef::from_raw(__barert_string_from_utf16(wide.as_ptr())) }.unwrap();
    assert_eq!(narrow.as_utf16(), wide.as_utf16());
    assert_eq!(narrow.len(), 5);
}

static CTOR_RUNS: AtomicU32 = AtomicU32::new(0);

unsafe extern "C" fn count_ctor_run() {
    CTOR_RUNS.fetch_add(1, Ordering::Relaxed);
}

#[test]
fn test_static_ctor_by_symbol_passes_base_through() {
    let mut ctx = StaticClassConstructionContext::new(count_ctor_run);
    let mut statics = [0u8; 16];
    let base = statics.as_mut_ptr();
    unsafe {
        __barert_check_static_ctor(&mut ctx);
        assert_eq!(__barert_check_static_ctor_return_base(&mut ctx, base), base);
    }
    assert_eq!(CTOR_RUNS.load(Ordering::Relaxed), 1);
}

#[test]
fn test_block_operations_by_symbol() {
    let mut bytes = *b"abcdef";
    unsafe {
        __barert_memmove(bytes.as_mut_ptr().add(2), bytes.as_ptr(), 3);
        __barert_memset(bytes.as_mut_ptr(), b'-', 1);
    }
    assert_eq!(&bytes, b"-babcf");
}

#[test]
fn test_arithmetic_by_symbol() {
    unsafe {
        assert_eq!(__barert_div_u64(u64::MAX, 2), u64::MAX / 2);
        assert_eq!(__barert_mod_i64(-9, 4), -1);
        assert_eq!(__barert_f64_to_i32_checked(-2.75), -2);
    }
}

#[test]
fn test_no_op_hooks_return() {
    unsafe { __barert_gc_poll() };
    assert!(unsafe { __barert_tick_count64() } >= 0);
}

#[cfg(all(target_os = "linux", target_env = "gnu"))]
#[test]
fn test_resolve_pinvoke_by_symbol() {
    use barert_runtime::abi::{MethodFixupCell, ModuleFixupCell};

    let mut module = ModuleFixupCell::new(c"libc.so.6".as_ptr());
    let mut cell = MethodFixupCell::new(c"abs".as_ptr(), &mut module);
    let target = unsafe { __barert_resolve_pinvoke((&raw mut cell).cast()) };
    assert_eq!(target, cell.target);
    let abs: unsafe extern "C" fn(i32) -> i32 = unsafe { std::mem::transmute(target) };
    assert_eq!(unsafe { abs(-12) }, 12);
}

#[cfg(unix)]
#[test]
#[serial]
fn test_main_args_skip_program_name() {
    let argv: &'static [*const c_char] = Box::leak(Box::new([c"prog".as_ptr(), c"first".as_ptr(), c"second".as_ptr()]));
    unsafe { __barert_init_command_line(argv.len() as i32, argv.as_ptr()) };

    let args = unsafe { ArrayRef::from_raw(__barert_get_main_args()) }.unwrap();
    assert!(std::ptr::eq(args.type_descriptor(), &STRING_ARRAY_TYPE));
    assert_eq!(args.len(), 2);
    let second = args.get_ref(1).unwrap();
    let second = unsafe { StringRef::from_raw(second.as_ptr().cast()) }.unwrap();
    assert_eq!(second.as_utf16(), "second".encode_utf16().collect::<Vec<_>>().as_slice());
}
