use evdev::{EventType, InputEvent, Key};
use multitap_core::keypad;
use std::collections::HashMap;

/// A keypad-relevant key transition, carrying the raw key label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEdge {
    Down(&'static str),
    Up(&'static str),
}

/// Per-device translation from evdev events to key labels.
///
/// Tracks Shift (for "#" and "*" on the digit row) and remembers the label
/// each held key went down with, so the matching release reports the same
/// label even if Shift changed in between.
#[derive(Debug, Default)]
pub struct Translator {
    shift_held: bool,
    held: HashMap<u16, &'static str>,
}

impl Translator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns None for events that are not keypad input.
    pub fn translate(&mut self, event: &InputEvent) -> Option<KeyEdge> {
        if event.event_type() != EventType::KEY {
            return None;
        }

        let code = event.code();
        self.update_modifiers(code, event.value());

        match event.value() {
            // press
            1 => {
                let label = keypad::keycode_to_label(code, self.shift_held)?;
                self.held.insert(code, label);
                Some(KeyEdge::Down(label))
            }
            // autorepeat keeps cycling, like a held key in a browser
            2 => self.held.get(&code).copied().map(KeyEdge::Down),
            // release
            0 => self.held.remove(&code).map(KeyEdge::Up),
            _ => None,
        }
    }

    fn update_modifiers(&mut self, code: u16, value: i32) {
        match Key::new(code) {
            Key::KEY_LEFTSHIFT | Key::KEY_RIGHTSHIFT => {
                if value == 1 {
                    self.shift_held = true;
                } else if value == 0 {
                    self.shift_held = false;
                }
            }
            _ => {}
        }
    }
}
