//! Values exchanged with the console entry points.

use core::mem::size_of;

/// Sixteen-color palette, numbered the way the Windows console and the UEFI
/// text protocol number their attributes.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConsoleColor {
    Black = 0,
    DarkBlue = 1,
    DarkGreen = 2,
    DarkCyan = 3,
    DarkRed = 4,
    DarkMagenta = 5,
    DarkYellow = 6,
    Gray = 7,
    DarkGray = 8,
    Blue = 9,
    Green = 10,
    Cyan = 11,
    Red = 12,
    Magenta = 13,
    Yellow = 14,
    White = 15,
}

impl ConsoleColor {
    const ALL: [ConsoleColor; 16] = [
        Self::Black,
        Self::DarkBlue,
        Self::DarkGreen,
        Self::DarkCyan,
        Self::DarkRed,
        Self::DarkMagenta,
        Self::DarkYellow,
        Self::Gray,
        Self::DarkGray,
        Self::Blue,
        Self::Green,
        Self::Cyan,
        Self::Red,
        Self::Magenta,
        Self::Yellow,
        Self::White,
    ];

    pub fn from_raw(value: i32) -> Option<Self> {
        usize::try_from(value)
            .ok()
            .and_then(|index| Self::ALL.get(index).copied())
    }

    pub const fn to_raw(self) -> i32 {
        self as i32
    }
}

/// Virtual key code. Only the arrow keys are guaranteed to decode on every
/// backend; other values are best-effort.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct ConsoleKey(pub u16);

impl ConsoleKey {
    pub const NONE: Self = Self(0);
    pub const BACKSPACE: Self = Self(8);
    pub const TAB: Self = Self(9);
    pub const ENTER: Self = Self(13);
    pub const ESCAPE: Self = Self(27);
    pub const SPACEBAR: Self = Self(32);
    pub const LEFT_ARROW: Self = Self(37);
    pub const UP_ARROW: Self = Self(38);
    pub const RIGHT_ARROW: Self = Self(39);
    pub const DOWN_ARROW: Self = Self(40);
    pub const D0: Self = Self(48);
    pub const A: Self = Self(65);
}

/// One key press: the character it produced (0 if none) and its key code.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct ConsoleKeyInfo {
    pub key_char: u16,
    pub key: ConsoleKey,
}

impl ConsoleKeyInfo {
    pub const fn new(key_char: u16, key: ConsoleKey) -> Self {
        Self { key_char, key }
    }
}

const _: () = assert!(size_of::<ConsoleKeyInfo>() == 4);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_from_raw_round_trips_palette() {
        assert_eq!(ConsoleColor::from_raw(0), Some(ConsoleColor::Black));
        assert_eq!(ConsoleColor::from_raw(12), Some(ConsoleColor::Red));
        assert_eq!(ConsoleColor::from_raw(15), Some(ConsoleColor::White));
        assert_eq!(ConsoleColor::Yellow.to_raw(), 14);
    }

    #[test]
    fn test_color_from_raw_rejects_out_of_palette() {
        assert_eq!(ConsoleColor::from_raw(-1), None);
        assert_eq!(ConsoleColor::from_raw(16), None);
    }

    #[test]
    fn test_default_key_info_is_empty() {
        let info = ConsoleKeyInfo::default();
        assert_eq!(info.key, ConsoleKey::NONE);
        assert_eq!(info.key_char, 0);
    }
}
