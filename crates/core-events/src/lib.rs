//! Keyboard event types, the fixed-capacity event ring, and the hotkey table.
//!
//! Everything here is plain data: the HID decoder (external to this
//! workspace) produces [`KeyEvent`]s, the main loop pushes them through the
//! hotkey table first and only then to the focused consumer. Hotkey matches
//! are recorded in the ring as [`EventKind::Hotkey`] so diagnostics can
//! replay what the dispatcher saw.

use std::fmt;

mod keys;
mod queue;

pub mod hotkey;

pub use keys::KeyCode;
pub use queue::{EventQueue, QueuedEvent, EVENT_QUEUE_CAPACITY};

bitflags::bitflags! {
    /// Modifier bits as delivered in HID reports.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0000_0001;
        const CTRL  = 0b0000_0010;
        const SUPER = 0b0000_0100;
    }
}

/// A single decoded key press.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct KeyEvent {
    pub code: KeyCode,
    pub mods: Modifiers,
}

impl KeyEvent {
    pub fn new(code: KeyCode) -> Self {
        Self {
            code,
            mods: Modifiers::empty(),
        }
    }

    pub fn with_mods(code: KeyCode, mods: Modifiers) -> Self {
        Self { code, mods }
    }

    /// Printable character for this event, honoring shift. `None` for keys
    /// that only carry editing or navigation meaning (Enter, arrows, ...).
    pub fn to_char(self) -> Option<char> {
        self.code.to_char(self.mods.contains(Modifiers::SHIFT))
    }
}

impl fmt::Display for KeyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}+{:?}", self.mods, self.code)
    }
}

/// Discriminates ring entries: plain key presses vs. hotkey firings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    KeyPressed,
    Hotkey,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn shift_produces_uppercase_and_symbols() {
        let a = KeyEvent::new(KeyCode::A);
        assert_eq!(a.to_char(), Some('a'));
        let shift_a = KeyEvent::with_mods(KeyCode::A, Modifiers::SHIFT);
        assert_eq!(shift_a.to_char(), Some('A'));
        let shift_one = KeyEvent::with_mods(KeyCode::Num1, Modifiers::SHIFT);
        assert_eq!(shift_one.to_char(), Some('!'));
    }

    #[test]
    fn navigation_keys_have_no_char() {
        for code in [
            KeyCode::Enter,
            KeyCode::Backspace,
            KeyCode::Tab,
            KeyCode::Esc,
            KeyCode::Left,
            KeyCode::Right,
            KeyCode::Up,
            KeyCode::Down,
            KeyCode::CapsLock,
        ] {
            assert_eq!(KeyEvent::new(code).to_char(), None, "{code:?}");
        }
    }

    #[test]
    fn ctrl_does_not_change_char_mapping() {
        let e = KeyEvent::with_mods(KeyCode::X, Modifiers::CTRL);
        assert_eq!(e.to_char(), Some('x'));
    }
}
