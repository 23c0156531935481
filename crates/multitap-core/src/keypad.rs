use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Label delivered by input sources for the backspace key.
pub const BACKSPACE_LABEL: &str = "Backspace";

/// One of the 12 physical keys of a phone keypad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    #[serde(rename = "1")]
    One,
    #[serde(rename = "2")]
    Two,
    #[serde(rename = "3")]
    Three,
    #[serde(rename = "4")]
    Four,
    #[serde(rename = "5")]
    Five,
    #[serde(rename = "6")]
    Six,
    #[serde(rename = "7")]
    Seven,
    #[serde(rename = "8")]
    Eight,
    #[serde(rename = "9")]
    Nine,
    #[serde(rename = "*")]
    Star,
    #[serde(rename = "0")]
    Zero,
    #[serde(rename = "#")]
    Pound,
}

impl Key {
    /// All keys in keypad grid order (three columns, top-left first).
    pub const ALL: [Key; 12] = [
        Key::One,
        Key::Two,
        Key::Three,
        Key::Four,
        Key::Five,
        Key::Six,
        Key::Seven,
        Key::Eight,
        Key::Nine,
        Key::Star,
        Key::Zero,
        Key::Pound,
    ];

    /// The glyph printed on the key.
    pub fn glyph(self) -> char {
        match self {
            Key::One => '1',
            Key::Two => '2',
            Key::Three => '3',
            Key::Four => '4',
            Key::Five => '5',
            Key::Six => '6',
            Key::Seven => '7',
            Key::Eight => '8',
            Key::Nine => '9',
            Key::Star => '*',
            Key::Zero => '0',
            Key::Pound => '#',
        }
    }

    /// Parse a raw key label. Returns None for anything that is not one of
    /// the 12 keypad labels.
    pub fn from_label(label: &str) -> Option<Key> {
        let mut chars = label.chars();
        let c = chars.next()?;
        if chars.next().is_some() {
            return None;
        }
        Self::ALL.into_iter().find(|k| k.glyph() == c)
    }

    fn position(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.glyph())
    }
}

impl FromStr for Key {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match Key::from_label(s) {
            Some(key) => Ok(key),
            None => bail!("'{}' is not a keypad key (expected 0-9, * or #)", s),
        }
    }
}

/// Key-validity predicate for raw labels.
pub fn is_digit_key(label: &str) -> bool {
    Key::from_label(label).is_some()
}

/// A key paired with the characters it cycles through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMapping {
    pub key: Key,
    pub chars: Vec<char>,
}

/// The key -> candidate characters table.
///
/// Entries are stored in [`Key::ALL`] order and every candidate list is
/// non-empty, so lookups are total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keypad {
    entries: Vec<KeyMapping>,
}

const BUILTIN: [(Key, &[char]); 12] = [
    (Key::One, &['.', ',', '?', '!', '1']),
    (Key::Two, &['a', 'b', 'c', '2']),
    (Key::Three, &['d', 'e', 'f', '3']),
    (Key::Four, &['g', 'h', 'i', '4']),
    (Key::Five, &['j', 'k', 'l', '5']),
    (Key::Six, &['m', 'n', 'o', '6']),
    (Key::Seven, &['p', 'q', 'r', 's', '7']),
    (Key::Eight, &['t', 'u', 'v', '8']),
    (Key::Nine, &['w', 'x', 'y', 'z', '9']),
    (Key::Star, &['+', '*']),
    (Key::Zero, &[' ', '0']),
    (Key::Pound, &['#']),
];

impl Keypad {
    /// The standard phone keypad layout.
    pub fn builtin() -> Self {
        Self {
            entries: BUILTIN
                .iter()
                .map(|(key, chars)| KeyMapping {
                    key: *key,
                    chars: chars.to_vec(),
                })
                .collect(),
        }
    }

    /// Built-in table with per-key replacements. Keys are raw labels
    /// ("2", "*", ...); every replacement must be non-empty.
    pub fn with_overrides(overrides: &HashMap<String, Vec<char>>) -> Result<Self> {
        let mut keypad = Self::builtin();
        for (label, chars) in overrides {
            let Some(key) = Key::from_label(label) else {
                bail!("keypad override for unknown key '{}'", label);
            };
            if chars.is_empty() {
                bail!("keypad override for key '{}' has no characters", label);
            }
            keypad.entries[key.position()].chars = chars.clone();
        }
        Ok(keypad)
    }

    /// Ordered candidate characters for a key.
    pub fn candidates_for(&self, key: Key) -> &[char] {
        &self.entries[key.position()].chars
    }

    pub fn iter(&self) -> impl Iterator<Item = &KeyMapping> {
        self.entries.iter()
    }
}

impl Default for Keypad {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Map an evdev key code to a raw key label.
/// Covers the digit row, the numeric keypad, the KEY_NUMERIC_* phone keys and
/// Backspace. On the digit row Shift+3 yields "#" and Shift+8 yields "*"
/// (US layout); other shifted digits are not keypad input.
pub fn keycode_to_label(code: u16, shift: bool) -> Option<&'static str> {
    if shift {
        return match code {
            4 => Some("#"),  // KEY_3
            9 => Some("*"),  // KEY_8
            14 => Some(BACKSPACE_LABEL),
            55 => Some("*"), // KEY_KPASTERISK
            71..=82 => keypad_code_to_label(code),
            0x200..=0x20b => numeric_code_to_label(code),
            _ => None,
        };
    }

    match code {
        2 => Some("1"),
        3 => Some("2"),
        4 => Some("3"),
        5 => Some("4"),
        6 => Some("5"),
        7 => Some("6"),
        8 => Some("7"),
        9 => Some("8"),
        10 => Some("9"),
        11 => Some("0"),
        14 => Some(BACKSPACE_LABEL),
        55 => Some("*"),
        71..=82 => keypad_code_to_label(code),
        0x200..=0x20b => numeric_code_to_label(code),
        _ => None,
    }
}

fn keypad_code_to_label(code: u16) -> Option<&'static str> {
    match code {
        71 => Some("7"), // KEY_KP7
        72 => Some("8"),
        73 => Some("9"),
        75 => Some("4"), // KEY_KP4
        76 => Some("5"),
        77 => Some("6"),
        79 => Some("1"), // KEY_KP1
        80 => Some("2"),
        81 => Some("3"),
        82 => Some("0"), // KEY_KP0
        _ => None,
    }
}

fn numeric_code_to_label(code: u16) -> Option<&'static str> {
    const LABELS: [&str; 12] = ["0", "1", "2", "3", "4", "5", "6", "7", "8", "9", "*", "#"];
    LABELS.get(code.checked_sub(0x200)? as usize).copied()
}
