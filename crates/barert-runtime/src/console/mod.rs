//! Console access.
//!
//! One [`ConsoleDriver`] implementation is compiled per platform and
//! reached through `platform::console()`. Calls are statically dispatched;
//! there is no driver table.

pub mod ansi;

use barert_abi::{ConsoleColor, ConsoleKeyInfo, StringHeader};

use crate::platform;
use crate::string::StringRef;

pub trait ConsoleDriver {
    /// Line terminator emitted by [`ConsoleDriver::write_line`].
    const NEWLINE: &'static [u16];

    /// Write one UTF-16 code unit.
    fn write(&mut self, unit: u16);

    fn set_foreground_color(&mut self, color: ConsoleColor);

    /// Move the cursor to column `x`, row `y` (both 0-based).
    fn set_cursor_position(&mut self, x: i32, y: i32);

    /// Whether [`ConsoleDriver::read_key`] would return without blocking.
    fn key_available(&mut self) -> bool;

    /// Block for one key press. Unless `intercept` is set, the key is
    /// echoed the way the platform normally echoes input.
    fn read_key(&mut self, intercept: bool) -> ConsoleKeyInfo;

    fn set_title(&mut self, title: &[u16]);

    fn set_cursor_visible(&mut self, visible: bool);

    fn set_window_size(&mut self, width: i32, height: i32);

    fn set_buffer_size(&mut self, width: i32, height: i32);

    fn write_units(&mut self, units: &[u16]) {
        for &unit in units {
            self.write(unit);
        }
    }

    fn write_line(&mut self, units: &[u16]) {
        self.write_units(units);
        self.write_units(Self::NEWLINE);
    }

    fn write_line_i32(&mut self, value: i32) {
        let mut digits = [0u16; 11];
        let mut pos = digits.len();
        let mut magnitude = value.unsigned_abs();
        loop {
            pos -= 1;
            digits[pos] = u16::from(b'0') + (magnitude % 10) as u16;
            magnitude /= 10;
            if magnitude == 0 {
                break;
            }
        }
        if value < 0 {
            pos -= 1;
            digits[pos] = u16::from(b'-');
        }
        self.write_line(&digits[pos..]);
    }
}

unsafe fn units_of(text: *mut StringHeader) -> &'static [u16] {
    match unsafe { StringRef::from_raw(text) } {
        Some(text) => text.as_utf16(),
        None => &[],
    }
}

// =============================================================================
// Exported entry points
// =============================================================================

/// Signature: `(unit: u16) -> ()`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn __barert_console_write(unit: u16) {
    unsafe { platform::console() }.write(unit);
}

/// Write a string object (null writes just the newline).
///
/// Signature: `(text: ptr) -> ()`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn __barert_console_write_line(text: *mut StringHeader) {
    let units = unsafe { units_of(text) };
    unsafe { platform::console() }.write_line(units);
}

/// Signature: `(value: i32) -> ()`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn __barert_console_write_line_i32(value: i32) {
    unsafe { platform::console() }.write_line_i32(value);
}

/// Values outside the 16-color palette are ignored.
///
/// Signature: `(color: i32) -> ()`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn __barert_console_set_foreground_color(color: i32) {
    if let Some(color) = ConsoleColor::from_raw(color) {
        unsafe { platform::console() }.set_foreground_color(color);
    }
}

/// Signature: `(x: i32, y: i32) -> ()`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn __barert_console_set_cursor_position(x: i32, y: i32) {
    unsafe { platform::console() }.set_cursor_position(x, y);
}

/// Signature: `() -> bool`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn __barert_console_key_available() -> bool {
    unsafe { platform::console() }.key_available()
}

/// Signature: `(intercept: bool) -> ConsoleKeyInfo`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn __barert_console_read_key(intercept: bool) -> ConsoleKeyInfo {
    unsafe { platform::console() }.read_key(intercept)
}

/// Signature: `(title: ptr) -> ()`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn __barert_console_set_title(title: *mut StringHeader) {
    let units = unsafe { units_of(title) };
    unsafe { platform::console() }.set_title(units);
}

/// Signature: `(visible: bool) -> ()`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn __barert_console_set_cursor_visible(visible: bool) {
    unsafe { platform::console() }.set_cursor_visible(visible);
}

/// Signature: `(width: i32, height: i32) -> ()`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn __barert_console_set_window_size(width: i32, height: i32) {
    unsafe { platform::console() }.set_window_size(width, height);
}

/// Signature: `(width: i32, height: i32) -> ()`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn __barert_console_set_buffer_size(width: i32, height: i32) {
    unsafe { platform::console() }.set_buffer_size(width, height);
}
