//! The UEFI backend driven by a fake system table.
//!
//! The installed table is process-wide, so every test here is serialized.

use std::alloc::{Layout, alloc};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::ffi::c_void;
use std::ptr;

use barert_runtime::abi::{ConsoleColor, ConsoleKey, ConsoleKeyInfo, TypeDescriptor};
use barert_runtime::console::ConsoleDriver;
use barert_runtime::heap::{HostAllocator, allocate_array};
use barert_runtime::platform::efi::{
    self, BootServices, EfiConsole, EfiPoolAllocator, InputKey, RuntimeServices, SUCCESS, SimpleTextInput,
    SimpleTextOutput, Status, SystemTable, TableHeader, Time,
};
use serial_test::serial;

const NOT_READY: Status = (1 << (usize::BITS - 1)) | 6;

#[derive(Default)]
struct Firmware {
    output: Vec<u16>,
    attributes: Vec<usize>,
    cursor: Vec<(usize, usize)>,
    cursor_enabled: Vec<bool>,
    keys: VecDeque<InputKey>,
    stalls: Vec<usize>,
    time: Time,
}

thread_local! {
    static FIRMWARE: RefCell<Firmware> = RefCell::new(Firmware::default());
}

fn firmware<R>(f: impl FnOnce(&mut Firmware) -> R) -> R {
    FIRMWARE.with(|fw| f(&mut fw.borrow_mut()))
}

unsafe extern "efiapi" fn output_string(_this: *mut SimpleTextOutput, text: *const u16) -> Status {
    let mut i = 0;
    loop {
        let unit = unsafe { *text.add(i) };
        if unit == 0 {
            return SUCCESS;
        }
        firmware(|fw| fw.output.push(unit));
        i += 1;
    }
}

unsafe extern "efiapi" fn set_attribute(_this: *mut SimpleTextOutput, attribute: usize) -> Status {
    firmware(|fw| fw.attributes.push(attribute));
    SUCCESS
}

unsafe extern "efiapi" fn set_cursor_position(_this: *mut SimpleTextOutput, column: usize, row: usize) -> Status {
    firmware(|fw| fw.cursor.push((column, row)));
    SUCCESS
}

unsafe extern "efiapi" fn enable_cursor(_this: *mut SimpleTextOutput, visible: bool) -> Status {
    firmware(|fw| fw.cursor_enabled.push(visible));
    SUCCESS
}

unsafe extern "efiapi" fn read_key_stroke(_this: *mut SimpleTextInput, key: *mut InputKey) -> Status {
    match firmware(|fw| fw.keys.pop_front()) {
        Some(next) => {
            unsafe { key.write(next) };
            SUCCESS
        }
        None => NOT_READY,
    }
}

unsafe extern "efiapi" fn get_time(time: *mut Time, _capabilities: *mut c_void) -> Status {
    unsafe { time.write(firmware(|fw| fw.time)) };
    SUCCESS
}

unsafe extern "efiapi" fn allocate_pool(_pool_type: u32, size: usize, buffer: *mut *mut c_void) -> Status {
    let Ok(layout) = Layout::from_size_align(size.max(1), 16) else {
        return NOT_READY;
    };
    unsafe {
        let memory = alloc(layout);
        // Firmware pool contents are arbitrary.
        memory.write_bytes(0xAA, layout.size());
        buffer.write(memory.cast());
    }
    SUCCESS
}

unsafe extern "efiapi" fn stall(microseconds: usize) -> Status {
    firmware(|fw| fw.stalls.push(microseconds));
    SUCCESS
}

fn header() -> TableHeader {
    TableHeader::default()
}

/// Install a leaked fake system table and reset the recorded calls.
fn install_fake_firmware(time: Time) {
    firmware(|fw| {
        *fw = Firmware {
            time,
            ..Firmware::default()
        }
    });

    let con_out = Box::leak(Box::new(SimpleTextOutput {
        reset: ptr::null(),
        output_string,
        unused0: [ptr::null(); 3],
        set_attribute,
        clear_screen: ptr::null(),
        set_cursor_position,
        enable_cursor,
        mode: ptr::null(),
    }));
    let con_in = Box::leak(Box::new(SimpleTextInput {
        reset: ptr::null(),
        read_key_stroke,
        wait_for_key: ptr::null(),
    }));
    let runtime_services = Box::leak(Box::new(RuntimeServices { header: header(), get_time }));
    let boot_services = Box::leak(Box::new(BootServices {
        header: header(),
        unused0: [ptr::null(); 5],
        allocate_pool,
        unused1: [ptr::null(); 22],
        stall,
    }));
    let table = Box::leak(Box::new(SystemTable {
        header: header(),
        firmware_vendor: ptr::null(),
        firmware_revision: 0,
        console_in_handle: ptr::null_mut(),
        con_in,
        console_out_handle: ptr::null_mut(),
        con_out,
        standard_error_handle: ptr::null_mut(),
        std_err: ptr::null_mut(),
        runtime_services,
        boot_services,
    }));
    unsafe { efi::install_system_table(table) };
}

fn time_at(year: u16, second: u8) -> Time {
    Time {
        year,
        month: 6,
        day: 1,
        second,
        ..Time::default()
    }
}

fn units(text: &str) -> Vec<u16> {
    text.encode_utf16().collect()
}

static BYTE: TypeDescriptor = TypeDescriptor::value_type(1, 0x200);
static BYTE_ARRAY: TypeDescriptor = TypeDescriptor::value_array(&BYTE, 1, 0x201);

#[test]
#[serial]
fn test_console_writes_through_output_string() {
    install_fake_firmware(Time::default());
    let mut console = EfiConsole::new();
    console.write_line(&units("ok"));
    console.write_line_i32(-7);
    assert_eq!(firmware(|fw| fw.output.clone()), units("ok\r\n-7\r\n"));
}

#[test]
#[serial]
fn test_console_attributes_and_cursor() {
    install_fake_firmware(Time::default());
    let mut console = EfiConsole::new();
    console.set_foreground_color(ConsoleColor::Yellow);
    console.set_cursor_position(3, -2);
    console.set_cursor_visible(false);
    firmware(|fw| {
        assert_eq!(fw.attributes, [14]);
        assert_eq!(fw.cursor, [(3, 0)]);
        assert_eq!(fw.cursor_enabled, [false]);
    });
}

#[test]
#[serial]
fn test_key_available_buffers_one_key() {
    install_fake_firmware(Time::default());
    firmware(|fw| {
        fw.keys.push_back(InputKey {
            scan_code: 1,
            unicode_char: 0,
        });
        fw.keys.push_back(InputKey {
            scan_code: 0,
            unicode_char: u16::from(b'x'),
        });
    });

    let mut console = EfiConsole::new();
    assert!(console.key_available());
    assert!(console.key_available());
    assert_eq!(firmware(|fw| fw.keys.len()), 1);

    assert_eq!(console.read_key(false), ConsoleKeyInfo::new(0, ConsoleKey::UP_ARROW));
    assert_eq!(console.read_key(false), ConsoleKeyInfo::new(u16::from(b'x'), ConsoleKey::NONE));
    assert_eq!(console.read_key(false), ConsoleKeyInfo::default());
    assert!(!console.key_available());
    // Firmware input is never echoed.
    assert!(firmware(|fw| fw.output.is_empty()));
}

#[test]
#[serial]
fn test_pool_allocations_are_zeroed() {
    install_fake_firmware(Time::default());
    let memory = EfiPoolAllocator.allocate_zeroed(64).unwrap();
    let bytes = unsafe { std::slice::from_raw_parts(memory.as_ptr(), 64) };
    assert!(bytes.iter().all(|&b| b == 0));

    let array = allocate_array(&EfiPoolAllocator, &BYTE_ARRAY, 40);
    assert_eq!(array.len(), 40);
    assert!((0..40).all(|i| array.get::<u8>(i) == 0));
}

#[test]
#[serial]
fn test_sleep_stalls_and_advances_frozen_clock() {
    install_fake_firmware(time_at(2031, 7));
    let before = efi::tick_count64();
    efi::sleep(25);
    let after = efi::tick_count64();
    assert_eq!(firmware(|fw| fw.stalls.clone()), [25_000]);
    assert_eq!(after - before, 25);

    firmware(|fw| fw.time = time_at(2031, 8));
    assert_eq!(efi::tick_count64(), before + 1000);
}

#[test]
#[serial]
fn test_main_arguments_are_empty() {
    install_fake_firmware(Time::default());
    assert!(efi::main_arguments().is_empty());
}

#[test]
#[serial]
fn test_services_without_system_table() {
    unsafe { efi::install_system_table(ptr::null_mut()) };
    assert!(EfiPoolAllocator.allocate_zeroed(16).is_none());
    assert_eq!(efi::tick_count64(), 0);
    efi::sleep(10);
    let mut console = EfiConsole::new();
    console.write_line(&units("dropped"));
    assert_eq!(console.read_key(true), ConsoleKeyInfo::default());
}
