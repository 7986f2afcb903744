//! Hotkey table: `(modifiers, key) -> action name`.
//!
//! Consulted on every key event before terminal dispatch. A match consumes
//! the event; the associated action name is handed to the action registry
//! and the event never reaches the line editor. Matching is by modifier
//! superset: a binding for `Shift+A` also fires on `Ctrl+Shift+A`, mirroring
//! how the keyboard firmware reports chords.

use crate::{KeyCode, KeyEvent, Modifiers};

pub const MAX_HOTKEYS: usize = 16;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Hotkey {
    pub mods: Modifiers,
    pub code: KeyCode,
    pub action: String,
}

#[derive(Default)]
pub struct HotkeyTable {
    entries: Vec<Hotkey>,
}

impl HotkeyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a binding. Ignored once the table is full; first
    /// registration wins on lookup, so boot-time defaults cannot be
    /// shadowed by later duplicates.
    pub fn register_key(&mut self, mods: Modifiers, code: KeyCode, action: impl Into<String>) {
        if self.entries.len() >= MAX_HOTKEYS {
            tracing::warn!(target: "input", "hotkey table full, binding ignored");
            return;
        }
        let action = action.into();
        tracing::debug!(target: "input", key = ?code, ?mods, action = %action, "hotkey registered");
        self.entries.push(Hotkey {
            mods,
            code,
            action,
        });
    }

    /// Clear all bindings (used by `reload` and tests).
    pub fn reset(&mut self) {
        self.entries.clear();
    }

    /// Action name for a matching binding, if any.
    pub fn find_action(&self, evt: KeyEvent) -> Option<&str> {
        self.entries
            .iter()
            .find(|h| h.code == evt.code && evt.mods.contains(h.mods))
            .map(|h| h.action.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn superset_modifiers_match() {
        let mut t = HotkeyTable::new();
        t.register_key(Modifiers::SHIFT, KeyCode::A, "terminal");
        let exact = KeyEvent::with_mods(KeyCode::A, Modifiers::SHIFT);
        let superset = KeyEvent::with_mods(KeyCode::A, Modifiers::SHIFT | Modifiers::CTRL);
        let missing = KeyEvent::new(KeyCode::A);
        assert_eq!(t.find_action(exact), Some("terminal"));
        assert_eq!(t.find_action(superset), Some("terminal"));
        assert_eq!(t.find_action(missing), None);
    }

    #[test]
    fn first_registration_wins() {
        let mut t = HotkeyTable::new();
        t.register_key(Modifiers::SHIFT, KeyCode::D, "close_terminal");
        t.register_key(Modifiers::SHIFT, KeyCode::D, "terminal");
        let evt = KeyEvent::with_mods(KeyCode::D, Modifiers::SHIFT);
        assert_eq!(t.find_action(evt), Some("close_terminal"));
    }

    #[test]
    fn table_capacity_is_bounded() {
        let mut t = HotkeyTable::new();
        for _ in 0..MAX_HOTKEYS + 4 {
            t.register_key(Modifiers::CTRL, KeyCode::Q, "x");
        }
        assert_eq!(t.len(), MAX_HOTKEYS);
    }
}
