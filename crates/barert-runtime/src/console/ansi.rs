//! ANSI/VT100 console over a byte stream.
//!
//! Output is UTF-8 plus escape sequences. Input is read a buffer at a time
//! into a small ring and decoded into key presses: the three-byte cursor
//! sequences `ESC [ A..D`, and single ASCII bytes otherwise.

use barert_abi::{ConsoleColor, ConsoleKey, ConsoleKeyInfo};

use super::ConsoleDriver;
use crate::fail::{FailFastReason, fail_fast};

pub const INPUT_RING_SIZE: usize = 256;

const ESC: u8 = 0x1B;
const BEL: u8 = 0x07;

/// Byte stream under an [`AnsiConsole`].
pub trait TerminalIo {
    fn write_bytes(&mut self, bytes: &[u8]);

    /// Block until input arrives and copy it into `buffer`. Returns the
    /// number of bytes read; zero or negative means end of input or error.
    fn read_bytes(&mut self, buffer: &mut [u8]) -> isize;

    /// Whether a read would return without blocking.
    fn input_ready(&mut self) -> bool;
}

struct InputRing {
    bytes: [u8; INPUT_RING_SIZE],
    start: usize,
    end: usize,
}

impl InputRing {
    const fn new() -> Self {
        Self {
            bytes: [0; INPUT_RING_SIZE],
            start: 0,
            end: 0,
        }
    }

    fn pending(&self) -> &[u8] {
        &self.bytes[self.start..self.end]
    }

    fn is_empty(&self) -> bool {
        self.start == self.end
    }

    fn consume(&mut self, count: usize) {
        self.start = (self.start + count).min(self.end);
    }

    /// Refill from `io`. Only called when empty, so the buffer restarts at 0.
    fn refill<Io: TerminalIo>(&mut self, io: &mut Io) -> bool {
        self.start = 0;
        self.end = 0;
        let read = io.read_bytes(&mut self.bytes);
        if read <= 0 {
            return false;
        }
        let read = (read as usize).min(INPUT_RING_SIZE);
        if !self.bytes[..read].is_ascii() {
            fail_fast(FailFastReason::NonAsciiText);
        }
        self.end = read;
        true
    }
}

pub struct AnsiConsole<Io> {
    io: Io,
    input: InputRing,
}

impl<Io: TerminalIo> AnsiConsole<Io> {
    pub const fn new(io: Io) -> Self {
        Self {
            io,
            input: InputRing::new(),
        }
    }

    pub fn io(&self) -> &Io {
        &self.io
    }

    pub fn io_mut(&mut self) -> &mut Io {
        &mut self.io
    }

    /// `ESC [ p1 ; p2 ... final`
    fn control_sequence(&mut self, params: &[u32], final_byte: u8) {
        let mut sequence = [0u8; 32];
        sequence[0] = ESC;
        sequence[1] = b'[';
        let mut len = 2;
        for (i, &param) in params.iter().enumerate() {
            if i > 0 {
                sequence[len] = b';';
                len += 1;
            }
            len += write_decimal(&mut sequence[len..], param);
        }
        sequence[len] = final_byte;
        self.io.write_bytes(&sequence[..=len]);
    }

    fn write_utf8(&mut self, unit: u16) {
        let mut bytes = [0u8; 3];
        let len = encode_utf8(unit, &mut bytes);
        self.io.write_bytes(&bytes[..len]);
    }
}

/// Write `value` in decimal at the start of `out`; returns the digit count.
fn write_decimal(out: &mut [u8], value: u32) -> usize {
    let mut digits = [0u8; 10];
    let mut pos = digits.len();
    let mut rest = value;
    loop {
        pos -= 1;
        digits[pos] = b'0' + (rest % 10) as u8;
        rest /= 10;
        if rest == 0 {
            break;
        }
    }
    let count = digits.len() - pos;
    out[..count].copy_from_slice(&digits[pos..]);
    count
}

/// UTF-8 encode one UTF-16 unit. Lone surrogates encode as three bytes.
fn encode_utf8(unit: u16, out: &mut [u8; 3]) -> usize {
    match unit {
        0..0x80 => {
            out[0] = unit as u8;
            1
        }
        0x80..0x800 => {
            out[0] = 0xC0 | (unit >> 6) as u8;
            out[1] = 0x80 | (unit & 0x3F) as u8;
            2
        }
        _ => {
            out[0] = 0xE0 | (unit >> 12) as u8;
            out[1] = 0x80 | ((unit >> 6) & 0x3F) as u8;
            out[2] = 0x80 | (unit & 0x3F) as u8;
            3
        }
    }
}

/// SGR foreground code. Dark colors are shown as their bright counterparts.
fn foreground_code(color: ConsoleColor) -> u32 {
    let raw = color.to_raw();
    let bright = if (ConsoleColor::DarkBlue.to_raw()..=ConsoleColor::Gray.to_raw()).contains(&raw) {
        raw + 8
    } else {
        raw
    };
    match ConsoleColor::from_raw(bright) {
        Some(ConsoleColor::Black) => 30,
        Some(ConsoleColor::Red) => 31,
        Some(ConsoleColor::Green) => 32,
        Some(ConsoleColor::Yellow) => 33,
        Some(ConsoleColor::Blue) => 34,
        Some(ConsoleColor::Magenta) => 35,
        Some(ConsoleColor::Cyan) => 36,
        _ => 37,
    }
}

fn decode_byte(byte: u8) -> ConsoleKeyInfo {
    let key = match byte {
        b'a'..=b'z' => ConsoleKey(ConsoleKey::A.0 + u16::from(byte - b'a')),
        b'A'..=b'Z' => ConsoleKey(ConsoleKey::A.0 + u16::from(byte - b'A')),
        b'0'..=b'9' => ConsoleKey(ConsoleKey::D0.0 + u16::from(byte - b'0')),
        ESC => ConsoleKey::ESCAPE,
        b'\r' | b'\n' => return ConsoleKeyInfo::new(u16::from(b'\r'), ConsoleKey::ENTER),
        b'\t' => ConsoleKey::TAB,
        b' ' => ConsoleKey::SPACEBAR,
        0x08 | 0x7F => return ConsoleKeyInfo::new(0x08, ConsoleKey::BACKSPACE),
        _ => ConsoleKey::NONE,
    };
    ConsoleKeyInfo::new(u16::from(byte), key)
}

/// Final byte of `ESC [ x`.
fn decode_cursor_key(final_byte: u8) -> ConsoleKey {
    match final_byte {
        b'A' => ConsoleKey::UP_ARROW,
        b'B' => ConsoleKey::DOWN_ARROW,
        b'C' => ConsoleKey::RIGHT_ARROW,
        b'D' => ConsoleKey::LEFT_ARROW,
        _ => fail_fast(FailFastReason::UnrecognizedInput),
    }
}

impl<Io: TerminalIo> ConsoleDriver for AnsiConsole<Io> {
    const NEWLINE: &'static [u16] = &[b'\n' as u16];

    fn write(&mut self, unit: u16) {
        self.write_utf8(unit);
    }

    fn write_units(&mut self, units: &[u16]) {
        // One write per buffered chunk.
        let mut buffer = [0u8; 64];
        let mut len = 0;
        for &unit in units {
            if len + 3 > buffer.len() {
                self.io.write_bytes(&buffer[..len]);
                len = 0;
            }
            let mut encoded = [0u8; 3];
            let n = encode_utf8(unit, &mut encoded);
            buffer[len..len + n].copy_from_slice(&encoded[..n]);
            len += n;
        }
        if len > 0 {
            self.io.write_bytes(&buffer[..len]);
        }
    }

    fn set_foreground_color(&mut self, color: ConsoleColor) {
        self.control_sequence(&[foreground_code(color)], b'm');
    }

    fn set_cursor_position(&mut self, x: i32, y: i32) {
        // CUP is 1-based; callers pass 0-based coordinates.
        let row = y.max(0) as u32 + 1;
        let column = x.max(0) as u32 + 1;
        self.control_sequence(&[row, column], b'H');
    }

    fn key_available(&mut self) -> bool {
        !self.input.is_empty() || self.io.input_ready()
    }

    fn read_key(&mut self, intercept: bool) -> ConsoleKeyInfo {
        if self.input.is_empty() && !self.input.refill(&mut self.io) {
            return ConsoleKeyInfo::default();
        }

        let (consumed, key) = match *self.input.pending() {
            [ESC, b'[', final_byte, ..] => (3, ConsoleKeyInfo::new(0, decode_cursor_key(final_byte))),
            [byte, ..] => (1, decode_byte(byte)),
            [] => (0, ConsoleKeyInfo::default()),
        };
        self.input.consume(consumed);

        if !intercept && (0x20..0x7F).contains(&key.key_char) {
            self.write(key.key_char);
        }
        key
    }

    fn set_title(&mut self, title: &[u16]) {
        self.io.write_bytes(&[ESC, b']', b'2', b';']);
        self.write_units(title);
        self.io.write_bytes(&[BEL]);
    }

    fn set_cursor_visible(&mut self, visible: bool) {
        let sequence: &[u8] = if visible { b"\x1b[?25h" } else { b"\x1b[?25l" };
        self.io.write_bytes(sequence);
    }

    fn set_window_size(&mut self, _width: i32, _height: i32) {}

    fn set_buffer_size(&mut self, _width: i32, _height: i32) {}
}
