//! Hosted Windows backend over kernel32 and shell32.

use core::ffi::{CStr, c_char, c_int, c_void};
use core::ptr::{self, NonNull};

use barert_abi::{ConsoleColor, ConsoleKey, ConsoleKeyInfo};

use crate::array::ArrayRef;
use crate::console::ConsoleDriver;
use crate::fail::{FailFastReason, MessageBuf};
use crate::heap::HostAllocator;
use crate::interop::SymbolLoader;
use crate::startup::string_array;
use crate::string::StringRef;

pub type PlatformHeap = LocalHeap;
pub type PlatformLoader = Win32Loader;
pub type PlatformConsole = Win32Console;

type Handle = *mut c_void;

#[repr(C)]
#[derive(Clone, Copy)]
struct Coord {
    x: i16,
    y: i16,
}

#[repr(C)]
struct SmallRect {
    left: i16,
    top: i16,
    right: i16,
    bottom: i16,
}

#[repr(C)]
struct ConsoleCursorInfo {
    size: u32,
    visible: i32,
}

#[repr(C)]
#[derive(Clone, Copy, Default)]
#[allow(dead_code)]
struct KeyEventRecord {
    key_down: i32,
    repeat_count: u16,
    virtual_key_code: u16,
    virtual_scan_code: u16,
    unicode_char: u16,
    control_key_state: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Default)]
struct InputRecord {
    event_type: u16,
    // The event union; only the key member is read.
    key_event: KeyEventRecord,
}

const _: () = assert!(core::mem::size_of::<InputRecord>() == 20);

const LPTR: u32 = 0x0040;
const STD_INPUT_HANDLE: u32 = -10i32 as u32;
const STD_OUTPUT_HANDLE: u32 = -11i32 as u32;
const STD_ERROR_HANDLE: u32 = -12i32 as u32;
const KEY_EVENT: u16 = 0x0001;
const TITLE_CAPACITY: usize = 256;

#[link(name = "kernel32")]
unsafe extern "system" {
    fn LocalAlloc(flags: u32, bytes: usize) -> *mut c_void;
    fn LoadLibraryA(name: *const c_char) -> Handle;
    fn GetProcAddress(module: Handle, name: *const c_char) -> *mut c_void;
    fn GetStdHandle(which: u32) -> Handle;
    fn WriteConsoleW(out: Handle, units: *const u16, count: u32, written: *mut u32, reserved: *mut c_void) -> i32;
    fn WriteFile(file: Handle, bytes: *const u8, count: u32, written: *mut u32, overlapped: *mut c_void) -> i32;
    fn SetConsoleTextAttribute(out: Handle, attributes: u16) -> i32;
    fn SetConsoleCursorPosition(out: Handle, position: Coord) -> i32;
    fn SetConsoleTitleW(title: *const u16) -> i32;
    fn GetConsoleCursorInfo(out: Handle, info: *mut ConsoleCursorInfo) -> i32;
    fn SetConsoleCursorInfo(out: Handle, info: *const ConsoleCursorInfo) -> i32;
    fn SetConsoleWindowInfo(out: Handle, absolute: i32, window: *const SmallRect) -> i32;
    fn SetConsoleScreenBufferSize(out: Handle, size: Coord) -> i32;
    fn PeekConsoleInputW(input: Handle, records: *mut InputRecord, count: u32, read: *mut u32) -> i32;
    fn ReadConsoleInputW(input: Handle, records: *mut InputRecord, count: u32, read: *mut u32) -> i32;
    fn Sleep(milliseconds: u32);
    fn GetTickCount64() -> u64;
    fn RaiseFailFastException(record: *const c_void, context: *const c_void, flags: u32);
    fn GetCommandLineW() -> *const u16;
}

#[link(name = "shell32")]
unsafe extern "system" {
    fn CommandLineToArgvW(command_line: *const u16, argc: *mut c_int) -> *mut *mut u16;
}

// =============================================================================
// Memory and dynamic linking
// =============================================================================

pub struct LocalHeap;

impl HostAllocator for LocalHeap {
    fn allocate_zeroed(&self, size: usize) -> Option<NonNull<u8>> {
        NonNull::new(unsafe { LocalAlloc(LPTR, size) }.cast())
    }
}

pub fn heap() -> &'static LocalHeap {
    &LocalHeap
}

pub struct Win32Loader;

impl SymbolLoader for Win32Loader {
    fn load_module(&self, name: &CStr) -> Option<NonNull<c_void>> {
        NonNull::new(unsafe { LoadLibraryA(name.as_ptr()) })
    }

    fn resolve_symbol(&self, module: NonNull<c_void>, name: &CStr) -> Option<NonNull<c_void>> {
        NonNull::new(unsafe { GetProcAddress(module.as_ptr(), name.as_ptr()) })
    }
}

pub fn symbol_loader() -> &'static Win32Loader {
    &Win32Loader
}

// =============================================================================
// Console
// =============================================================================

pub struct Win32Console;

fn output() -> Handle {
    unsafe { GetStdHandle(STD_OUTPUT_HANDLE) }
}

fn input() -> Handle {
    unsafe { GetStdHandle(STD_INPUT_HANDLE) }
}

fn coord(x: i32, y: i32) -> Coord {
    Coord {
        x: x.clamp(0, i16::MAX.into()) as i16,
        y: y.clamp(0, i16::MAX.into()) as i16,
    }
}

impl Win32Console {
    fn read_record(&mut self) -> Option<InputRecord> {
        let mut record = InputRecord::default();
        let mut read = 0;
        let ok = unsafe { ReadConsoleInputW(input(), &mut record, 1, &mut read) } != 0;
        (ok && read == 1).then_some(record)
    }
}

fn is_key_down(record: &InputRecord) -> bool {
    record.event_type == KEY_EVENT && record.key_event.key_down != 0
}

impl ConsoleDriver for Win32Console {
    const NEWLINE: &'static [u16] = &[b'\r' as u16, b'\n' as u16];

    fn write(&mut self, unit: u16) {
        self.write_units(&[unit]);
    }

    fn write_units(&mut self, units: &[u16]) {
        for chunk in units.chunks(u32::MAX as usize) {
            let mut written = 0;
            unsafe { WriteConsoleW(output(), chunk.as_ptr(), chunk.len() as u32, &mut written, ptr::null_mut()) };
        }
    }

    fn set_foreground_color(&mut self, color: ConsoleColor) {
        unsafe { SetConsoleTextAttribute(output(), color.to_raw() as u16) };
    }

    fn set_cursor_position(&mut self, x: i32, y: i32) {
        unsafe { SetConsoleCursorPosition(output(), coord(x, y)) };
    }

    fn key_available(&mut self) -> bool {
        loop {
            let mut record = InputRecord::default();
            let mut read = 0;
            if unsafe { PeekConsoleInputW(input(), &mut record, 1, &mut read) } == 0 || read == 0 {
                return false;
            }
            if is_key_down(&record) {
                return true;
            }
            // Drop the mouse, focus or key-up event at the head.
            if self.read_record().is_none() {
                return false;
            }
        }
    }

    fn read_key(&mut self, intercept: bool) -> ConsoleKeyInfo {
        loop {
            let Some(record) = self.read_record() else {
                return ConsoleKeyInfo::default();
            };
            if is_key_down(&record) {
                let key = &record.key_event;
                let info = ConsoleKeyInfo::new(key.unicode_char, ConsoleKey(key.virtual_key_code));
                if !intercept && info.key_char >= 0x20 {
                    self.write(info.key_char);
                }
                return info;
            }
        }
    }

    fn set_title(&mut self, title: &[u16]) {
        let mut buffer = [0u16; TITLE_CAPACITY];
        let len = title.len().min(TITLE_CAPACITY - 1);
        buffer[..len].copy_from_slice(&title[..len]);
        unsafe { SetConsoleTitleW(buffer.as_ptr()) };
    }

    fn set_cursor_visible(&mut self, visible: bool) {
        let mut info = ConsoleCursorInfo { size: 25, visible: 0 };
        unsafe {
            GetConsoleCursorInfo(output(), &mut info);
            info.visible = i32::from(visible);
            SetConsoleCursorInfo(output(), &info);
        }
    }

    fn set_window_size(&mut self, width: i32, height: i32) {
        let window = SmallRect {
            left: 0,
            top: 0,
            right: coord(width - 1, 0).x,
            bottom: coord(height - 1, 0).x,
        };
        unsafe { SetConsoleWindowInfo(output(), 1, &window) };
    }

    fn set_buffer_size(&mut self, width: i32, height: i32) {
        unsafe { SetConsoleScreenBufferSize(output(), coord(width, height)) };
    }
}

static CONSOLE: crate::cell::RacyCell<Win32Console> = crate::cell::RacyCell::new(Win32Console);

pub unsafe fn console() -> &'static mut PlatformConsole {
    unsafe { CONSOLE.get_mut() }
}

// =============================================================================
// Time and process
// =============================================================================

pub fn sleep(milliseconds: u32) {
    unsafe { Sleep(milliseconds) }
}

pub fn tick_count64() -> i64 {
    unsafe { GetTickCount64() as i64 }
}

#[cfg_attr(not(panic = "abort"), allow(dead_code))]
pub(crate) fn fail_fast(reason: FailFastReason) -> ! {
    let message = MessageBuf::for_reason(reason);
    let bytes = message.as_bytes();
    let mut written = 0;
    unsafe {
        WriteFile(GetStdHandle(STD_ERROR_HANDLE), bytes.as_ptr(), bytes.len() as u32, &mut written, ptr::null_mut());
        RaiseFailFastException(ptr::null(), ptr::null(), 0);
    }
    loop {
        core::hint::spin_loop();
    }
}

/// The trampoline's vector is ignored; the wide command line is parsed
/// instead.
pub unsafe fn store_command_line(_argc: i32, _argv: *const *const c_char) {}

pub fn main_arguments() -> ArrayRef {
    let mut argc = 0;
    let argv = unsafe { CommandLineToArgvW(GetCommandLineW(), &mut argc) };
    let count = if argv.is_null() { 0 } else { (argc - 1).max(0) as usize };
    string_array(
        heap(),
        (1..count + 1).map(|i| {
            // SAFETY: CommandLineToArgvW returns `argc` NUL-terminated strings.
            unsafe { StringRef::from_utf16_cstr(heap(), *argv.add(i)) }
        }),
    )
}

#[cfg(all(not(test), panic = "abort"))]
#[unsafe(no_mangle)]
pub extern "C" fn main(argc: c_int, argv: *const *const c_char) -> c_int {
    unsafe { crate::startup::__barert_managed_main(argc, argv) }
}
