//! The ANSI console driven over a scripted terminal.

use std::collections::VecDeque;

use barert_runtime::abi::{ConsoleColor, ConsoleKey, ConsoleKeyInfo};
use barert_runtime::console::ConsoleDriver;
use barert_runtime::console::ansi::{AnsiConsole, TerminalIo};

#[derive(Default)]
struct ScriptedTerminal {
    output: Vec<u8>,
    input: VecDeque<Vec<u8>>,
    ready: bool,
    writes: usize,
}

impl ScriptedTerminal {
    fn with_input(chunks: &[&[u8]]) -> Self {
        Self {
            input: chunks.iter().map(|chunk| chunk.to_vec()).collect(),
            ..Self::default()
        }
    }
}

impl TerminalIo for ScriptedTerminal {
    fn write_bytes(&mut self, bytes: &[u8]) {
        self.output.extend_from_slice(bytes);
        self.writes += 1;
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> isize {
        let Some(chunk) = self.input.pop_front() else {
            return 0;
        };
        buffer[..chunk.len()].copy_from_slice(&chunk);
        chunk.len() as isize
    }

    fn input_ready(&mut self) -> bool {
        self.ready
    }
}

fn render(console: &AnsiConsole<ScriptedTerminal>) -> String {
    String::from_utf8_lossy(&console.io().output)
        .replace('\x1b', "<ESC>")
        .replace('\x07', "<BEL>")
        .replace('\n', "<LF>")
}

fn units(text: &str) -> Vec<u16> {
    text.encode_utf16().collect()
}

#[test]
fn test_output_sequences() {
    let mut console = AnsiConsole::new(ScriptedTerminal::default());
    console.set_foreground_color(ConsoleColor::Red);
    console.set_cursor_position(0, 0);
    console.write_units(&units("hi"));
    console.write_line_i32(-42);
    console.set_title(&units("T"));
    console.set_cursor_visible(false);
    insta::assert_snapshot!(render(&console), @"<ESC>[31m<ESC>[1;1Hhi-42<LF><ESC>]2;T<BEL><ESC>[?25l");
}

#[test]
fn test_dark_colors_and_cursor_origin() {
    let mut console = AnsiConsole::new(ScriptedTerminal::default());
    console.set_foreground_color(ConsoleColor::DarkGreen);
    console.set_foreground_color(ConsoleColor::DarkGray);
    console.set_cursor_position(9, 4);
    console.set_cursor_position(-3, -1);
    insta::assert_snapshot!(render(&console), @"<ESC>[32m<ESC>[37m<ESC>[5;10H<ESC>[1;1H");
}

#[test]
fn test_wide_text_is_utf8_encoded() {
    let mut console = AnsiConsole::new(ScriptedTerminal::default());
    console.write_line(&units("é世"));
    assert_eq!(console.io().output, "é世\n".as_bytes());
    insta::assert_snapshot!(render(&console), @"é世<LF>");
}

#[test]
fn test_long_text_is_written_in_batches() {
    let mut console = AnsiConsole::new(ScriptedTerminal::default());
    let text = "x".repeat(200);
    console.write_units(&units(&text));
    assert_eq!(console.io().output, text.as_bytes());
    assert!(console.io().writes < 10);
}

#[test]
fn test_read_key_decodes_arrows_and_letters() {
    let mut console = AnsiConsole::new(ScriptedTerminal::with_input(&[b"\x1b[Aq\r", b"\x1b[D"]));
    assert_eq!(console.read_key(true), ConsoleKeyInfo::new(0, ConsoleKey::UP_ARROW));
    assert_eq!(
        console.read_key(true),
        ConsoleKeyInfo::new(u16::from(b'q'), ConsoleKey(ConsoleKey::A.0 + 16))
    );
    assert_eq!(
        console.read_key(true),
        ConsoleKeyInfo::new(u16::from(b'\r'), ConsoleKey::ENTER)
    );
    assert_eq!(console.read_key(true), ConsoleKeyInfo::new(0, ConsoleKey::LEFT_ARROW));
    assert!(console.io().output.is_empty());
}

#[test]
fn test_read_key_echoes_printable_keys_unless_intercepted() {
    let mut console = AnsiConsole::new(ScriptedTerminal::with_input(&[b"z7\r\x1b[B"]));
    console.read_key(false);
    console.read_key(false);
    console.read_key(false);
    console.read_key(false);
    insta::assert_snapshot!(render(&console), @"z7");
}

#[test]
fn test_read_key_at_end_of_input_returns_empty_key() {
    let mut console = AnsiConsole::new(ScriptedTerminal::default());
    assert_eq!(console.read_key(false), ConsoleKeyInfo::default());
}

#[test]
fn test_key_available_sees_buffered_input() {
    let mut console = AnsiConsole::new(ScriptedTerminal::with_input(&[b"ab"]));
    assert!(!console.key_available());

    console.io_mut().ready = true;
    assert!(console.key_available());
    console.io_mut().ready = false;

    console.read_key(true);
    assert!(console.key_available());
    console.read_key(true);
    assert!(!console.key_available());
}

#[test]
#[should_panic(expected = "unrecognized terminal input sequence")]
fn test_unknown_escape_sequence_fails_fast() {
    let mut console = AnsiConsole::new(ScriptedTerminal::with_input(&[b"\x1b[Z"]));
    console.read_key(true);
}

#[test]
#[should_panic(expected = "non-ASCII byte in narrow text")]
fn test_non_ascii_input_fails_fast() {
    let mut console = AnsiConsole::new(ScriptedTerminal::with_input(&["é".as_bytes()]));
    console.read_key(true);
}
