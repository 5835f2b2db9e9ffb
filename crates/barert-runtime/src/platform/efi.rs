//! UEFI backend: boot-services memory, the text protocols, and a software
//! clock built on `GetTime`.
//!
//! Every service is reached through the system table handed to `efi_main`
//! and stored with [`install_system_table`]. Before that, allocation fails
//! and console output is dropped.

use core::ffi::{CStr, c_char, c_void};
use core::ptr::{self, NonNull};

use barert_abi::{ConsoleColor, ConsoleKey, ConsoleKeyInfo};

use crate::array::ArrayRef;
use crate::cell::RacyCell;
use crate::console::ConsoleDriver;
use crate::fail::{FailFastReason, MessageBuf};
use crate::heap::HostAllocator;
use crate::interop::SymbolLoader;
use crate::startup::string_array;

pub type PlatformHeap = EfiPoolAllocator;
pub type PlatformLoader = NoDynamicLinking;
pub type PlatformConsole = EfiConsole;

pub type Status = usize;
pub type Handle = *mut c_void;

pub const SUCCESS: Status = 0;

/// `EfiLoaderData` memory type.
pub const EFI_LOADER_DATA: u32 = 2;

// =============================================================================
// Firmware tables
// =============================================================================

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct TableHeader {
    pub signature: u64,
    pub revision: u32,
    pub header_size: u32,
    pub crc32: u32,
    pub reserved: u32,
}

#[repr(C)]
pub struct SimpleTextOutput {
    pub reset: *const c_void,
    pub output_string: unsafe extern "efiapi" fn(*mut SimpleTextOutput, *const u16) -> Status,
    /// TestString, QueryMode, SetMode.
    pub unused0: [*const c_void; 3],
    pub set_attribute: unsafe extern "efiapi" fn(*mut SimpleTextOutput, usize) -> Status,
    pub clear_screen: *const c_void,
    pub set_cursor_position: unsafe extern "efiapi" fn(*mut SimpleTextOutput, usize, usize) -> Status,
    pub enable_cursor: unsafe extern "efiapi" fn(*mut SimpleTextOutput, bool) -> Status,
    pub mode: *const c_void,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputKey {
    pub scan_code: u16,
    pub unicode_char: u16,
}

#[repr(C)]
pub struct SimpleTextInput {
    pub reset: *const c_void,
    pub read_key_stroke: unsafe extern "efiapi" fn(*mut SimpleTextInput, *mut InputKey) -> Status,
    pub wait_for_key: *const c_void,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Time {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub pad1: u8,
    pub nanosecond: u32,
    pub time_zone: i16,
    pub daylight: u8,
    pub pad2: u8,
}

#[repr(C)]
pub struct RuntimeServices {
    pub header: TableHeader,
    pub get_time: unsafe extern "efiapi" fn(*mut Time, *mut c_void) -> Status,
}

#[repr(C)]
pub struct BootServices {
    pub header: TableHeader,
    /// RaiseTPL through GetMemoryMap.
    pub unused0: [*const c_void; 5],
    pub allocate_pool: unsafe extern "efiapi" fn(u32, usize, *mut *mut c_void) -> Status,
    /// FreePool through GetNextMonotonicCount.
    pub unused1: [*const c_void; 22],
    pub stall: unsafe extern "efiapi" fn(usize) -> Status,
}

#[repr(C)]
pub struct SystemTable {
    pub header: TableHeader,
    pub firmware_vendor: *const u16,
    pub firmware_revision: u32,
    pub console_in_handle: Handle,
    pub con_in: *mut SimpleTextInput,
    pub console_out_handle: Handle,
    pub con_out: *mut SimpleTextOutput,
    pub standard_error_handle: Handle,
    pub std_err: *mut SimpleTextOutput,
    pub runtime_services: *mut RuntimeServices,
    pub boot_services: *mut BootServices,
}

#[cfg(target_pointer_width = "64")]
const _: () = {
    use core::mem::offset_of;
    assert!(size_of::<TableHeader>() == 24);
    assert!(size_of::<Time>() == 16);
    assert!(offset_of!(SimpleTextOutput, output_string) == 0x08);
    assert!(offset_of!(SimpleTextOutput, set_attribute) == 0x28);
    assert!(offset_of!(SimpleTextOutput, set_cursor_position) == 0x38);
    assert!(offset_of!(SimpleTextOutput, enable_cursor) == 0x40);
    assert!(offset_of!(SimpleTextInput, read_key_stroke) == 0x08);
    assert!(offset_of!(BootServices, allocate_pool) == 0x40);
    assert!(offset_of!(BootServices, stall) == 0xF8);
    assert!(offset_of!(SystemTable, con_in) == 0x30);
    assert!(offset_of!(SystemTable, con_out) == 0x40);
    assert!(offset_of!(SystemTable, runtime_services) == 0x58);
    assert!(offset_of!(SystemTable, boot_services) == 0x60);
};

static SYSTEM_TABLE: RacyCell<*mut SystemTable> = RacyCell::new(ptr::null_mut());

/// # Safety
///
/// `table` must be null or a system table (with its protocol and service
/// tables) valid for the rest of the program.
pub unsafe fn install_system_table(table: *mut SystemTable) {
    SYSTEM_TABLE.set(table);
}

fn system_table() -> Option<&'static SystemTable> {
    // SAFETY: see `install_system_table`.
    unsafe { SYSTEM_TABLE.get().as_ref() }
}

fn con_out() -> Option<*mut SimpleTextOutput> {
    system_table().map(|table| table.con_out).filter(|out| !out.is_null())
}

// =============================================================================
// Memory and dynamic linking
// =============================================================================

/// Boot-services pool memory. The pool is not zeroed by firmware.
pub struct EfiPoolAllocator;

impl HostAllocator for EfiPoolAllocator {
    fn allocate_zeroed(&self, size: usize) -> Option<NonNull<u8>> {
        let boot = system_table()?.boot_services;
        if boot.is_null() {
            return None;
        }
        let mut buffer = ptr::null_mut();
        let status = unsafe { ((*boot).allocate_pool)(EFI_LOADER_DATA, size, &mut buffer) };
        if status != SUCCESS {
            return None;
        }
        let memory = NonNull::new(buffer.cast::<u8>())?;
        unsafe { memory.as_ptr().write_bytes(0, size) };
        Some(memory)
    }
}

pub fn heap() -> &'static EfiPoolAllocator {
    &EfiPoolAllocator
}

/// Firmware has no dynamic linker; every module load fails.
pub struct NoDynamicLinking;

impl SymbolLoader for NoDynamicLinking {
    fn load_module(&self, _name: &CStr) -> Option<NonNull<c_void>> {
        None
    }

    fn resolve_symbol(&self, _module: NonNull<c_void>, _name: &CStr) -> Option<NonNull<c_void>> {
        None
    }
}

pub fn symbol_loader() -> &'static NoDynamicLinking {
    &NoDynamicLinking
}

// =============================================================================
// Console
// =============================================================================

/// Text protocols with a one-key lookahead buffer.
pub struct EfiConsole {
    buffered: InputKey,
    pending: bool,
}

impl EfiConsole {
    pub const fn new() -> Self {
        Self {
            buffered: InputKey {
                scan_code: 0,
                unicode_char: 0,
            },
            pending: false,
        }
    }

    /// Poll `ReadKeyStroke` unless a key is already buffered.
    fn fill_buffer(&mut self) -> bool {
        if self.pending {
            return true;
        }
        let Some(con_in) = system_table().map(|table| table.con_in).filter(|input| !input.is_null()) else {
            return false;
        };
        let mut key = InputKey::default();
        if unsafe { ((*con_in).read_key_stroke)(con_in, &mut key) } == SUCCESS {
            self.buffered = key;
            self.pending = true;
        }
        self.pending
    }
}

impl Default for EfiConsole {
    fn default() -> Self {
        Self::new()
    }
}

fn scan_code_key(scan_code: u16) -> ConsoleKey {
    match scan_code {
        1 => ConsoleKey::UP_ARROW,
        2 => ConsoleKey::DOWN_ARROW,
        3 => ConsoleKey::RIGHT_ARROW,
        4 => ConsoleKey::LEFT_ARROW,
        _ => ConsoleKey::NONE,
    }
}

impl ConsoleDriver for EfiConsole {
    const NEWLINE: &'static [u16] = &[b'\r' as u16, b'\n' as u16];

    fn write(&mut self, unit: u16) {
        if let Some(out) = con_out() {
            let text = [unit, 0];
            unsafe { ((*out).output_string)(out, text.as_ptr()) };
        }
    }

    fn set_foreground_color(&mut self, color: ConsoleColor) {
        if let Some(out) = con_out() {
            unsafe { ((*out).set_attribute)(out, color.to_raw() as usize) };
        }
    }

    fn set_cursor_position(&mut self, x: i32, y: i32) {
        if let Some(out) = con_out() {
            unsafe { ((*out).set_cursor_position)(out, x.max(0) as usize, y.max(0) as usize) };
        }
    }

    fn key_available(&mut self) -> bool {
        self.fill_buffer()
    }

    /// Returns the buffered key, or an empty key if none is waiting.
    /// Firmware does not echo, and neither does this.
    fn read_key(&mut self, _intercept: bool) -> ConsoleKeyInfo {
        if !self.fill_buffer() {
            return ConsoleKeyInfo::default();
        }
        self.pending = false;
        ConsoleKeyInfo::new(self.buffered.unicode_char, scan_code_key(self.buffered.scan_code))
    }

    fn set_title(&mut self, _title: &[u16]) {}

    fn set_cursor_visible(&mut self, visible: bool) {
        if let Some(out) = con_out() {
            unsafe { ((*out).enable_cursor)(out, visible) };
        }
    }

    fn set_window_size(&mut self, _width: i32, _height: i32) {}

    fn set_buffer_size(&mut self, _width: i32, _height: i32) {}
}

static CONSOLE: RacyCell<EfiConsole> = RacyCell::new(EfiConsole::new());

pub unsafe fn console() -> &'static mut PlatformConsole {
    unsafe { CONSOLE.get_mut() }
}

// =============================================================================
// Time
// =============================================================================

/// Millisecond counter derived from the real-time clock.
///
/// Some firmware reports whole seconds only. Stalls issued while the
/// reading stays the same are added on top, so the counter still advances
/// across short sleeps.
#[derive(Debug, Default)]
pub struct EfiClock {
    last_reading: i64,
    stall_since_last: i64,
}

impl EfiClock {
    pub const fn new() -> Self {
        Self {
            last_reading: 0,
            stall_since_last: 0,
        }
    }

    /// Milliseconds for `time` under the day-count approximation
    /// `year * 365 + month * 31 + day`.
    pub fn milliseconds(time: &Time) -> i64 {
        let days = i64::from(time.year) * 365 + i64::from(time.month) * 31 + i64::from(time.day);
        let seconds =
            days * 24 * 60 * 60 + i64::from(time.hour) * 60 * 60 + i64::from(time.minute) * 60 + i64::from(time.second);
        seconds * 1000 + i64::from(time.nanosecond / 1_000_000)
    }

    pub fn observe(&mut self, reading: i64) -> i64 {
        if reading == self.last_reading {
            reading + self.stall_since_last
        } else {
            self.last_reading = reading;
            self.stall_since_last = 0;
            reading
        }
    }

    pub fn record_stall(&mut self, milliseconds: u32) {
        self.stall_since_last += i64::from(milliseconds);
    }
}

static CLOCK: RacyCell<EfiClock> = RacyCell::new(EfiClock::new());

pub fn sleep(milliseconds: u32) {
    let Some(boot) = system_table().map(|table| table.boot_services).filter(|boot| !boot.is_null()) else {
        return;
    };
    unsafe { ((*boot).stall)(milliseconds as usize * 1000) };
    // SAFETY: single-threaded; no other clock reference is live.
    unsafe { CLOCK.get_mut() }.record_stall(milliseconds);
}

pub fn tick_count64() -> i64 {
    let Some(runtime) = system_table().map(|table| table.runtime_services).filter(|rt| !rt.is_null()) else {
        return 0;
    };
    let mut time = Time::default();
    unsafe { ((*runtime).get_time)(&mut time, ptr::null_mut()) };
    // SAFETY: single-threaded; no other clock reference is live.
    unsafe { CLOCK.get_mut() }.observe(EfiClock::milliseconds(&time))
}

// =============================================================================
// Process
// =============================================================================

/// Print the reason on the console and hang; firmware applications have no
/// process to abort.
#[cfg_attr(not(all(target_os = "uefi", panic = "abort")), allow(dead_code))]
pub(crate) fn fail_fast(reason: FailFastReason) -> ! {
    if let Some(out) = con_out() {
        let message = MessageBuf::for_reason(reason);
        let mut text = [0u16; 128];
        for (unit, &byte) in text.iter_mut().zip(message.as_bytes()) {
            *unit = u16::from(byte);
        }
        unsafe { ((*out).output_string)(out, text.as_ptr()) };
    }
    loop {
        core::hint::spin_loop();
    }
}

/// Firmware passes no argument vector.
pub unsafe fn store_command_line(_argc: i32, _argv: *const *const c_char) {}

pub fn main_arguments() -> ArrayRef {
    string_array(heap(), core::iter::empty())
}

#[cfg(all(not(test), panic = "abort", target_os = "uefi"))]
#[unsafe(no_mangle)]
pub extern "efiapi" fn efi_main(_image: Handle, system_table: *mut SystemTable) -> Status {
    unsafe {
        install_system_table(system_table);
        crate::startup::__barert_managed_main(0, ptr::null());
    }
    loop {
        core::hint::spin_loop();
    }
}
