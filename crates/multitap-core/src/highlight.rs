use crate::keypad::Key;

/// Tracks which keypad key is physically held, for the on-screen highlight.
/// Independent of the typing state: it never commits or cancels anything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Highlight {
    pressed: Option<Key>,
}

impl Highlight {
    pub fn pressed(&self) -> Option<Key> {
        self.pressed
    }

    /// Returns true if the highlighted key changed.
    pub fn key_down(&mut self, label: &str) -> bool {
        let Some(key) = Key::from_label(label) else {
            return false;
        };
        self.set(Some(key))
    }

    /// Any keypad key-up clears the highlight, even if another key is shown.
    pub fn key_up(&mut self, label: &str) -> bool {
        if Key::from_label(label).is_none() {
            return false;
        }
        self.set(None)
    }

    fn set(&mut self, pressed: Option<Key>) -> bool {
        let changed = self.pressed != pressed;
        self.pressed = pressed;
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_nothing_pressed() {
        assert_eq!(Highlight::default().pressed(), None);
    }

    #[test]
    fn key_down_then_up() {
        let mut hl = Highlight::default();
        assert!(hl.key_down("5"));
        assert_eq!(hl.pressed(), Some(Key::Five));
        assert!(hl.key_up("5"));
        assert_eq!(hl.pressed(), None);
    }

    #[test]
    fn repeated_key_down_is_not_a_change() {
        let mut hl = Highlight::default();
        hl.key_down("#");
        assert!(!hl.key_down("#"));
    }

    #[test]
    fn non_keypad_labels_are_ignored() {
        let mut hl = Highlight::default();
        hl.key_down("2");
        assert!(!hl.key_down("Backspace"));
        assert!(!hl.key_up("a"));
        assert_eq!(hl.pressed(), Some(Key::Two));
    }

    #[test]
    fn release_of_other_key_clears() {
        let mut hl = Highlight::default();
        hl.key_down("2");
        hl.key_down("3");
        assert!(hl.key_up("2"));
        assert_eq!(hl.pressed(), None);
    }
}
