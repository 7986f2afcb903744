//! Hosted front-end: crossterm in, character grids out.
//!
//! Stands in for the TFT and the USB keyboard on a development machine.
//! The active terminal's 24×80 grid is drawn to the host terminal with a
//! status line naming every open window; key events are translated into
//! the core's fixed key enumeration.

use std::io::{stdout, Write};

use anyhow::Result;
use crossterm::{
    cursor::MoveTo,
    event::{KeyCode as CtKeyCode, KeyEvent as CtKeyEvent, KeyModifiers as CtMods},
    execute, queue,
    style::Print,
    terminal::{
        disable_raw_mode, enable_raw_mode, Clear, ClearType, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
};

use core_events::{KeyCode, KeyEvent, Modifiers};
use core_shell::Session;
use core_term::{TERMINAL_COLS, TERMINAL_ROWS};

/// RAII guard for raw mode + alternate screen.
pub struct HostTerminal {
    entered: bool,
}

impl HostTerminal {
    pub fn enter() -> Result<Self> {
        enable_raw_mode()?;
        execute!(stdout(), EnterAlternateScreen)?;
        Ok(Self { entered: true })
    }

    pub fn leave(&mut self) -> Result<()> {
        if self.entered {
            execute!(stdout(), LeaveAlternateScreen)?;
            disable_raw_mode()?;
            self.entered = false;
        }
        Ok(())
    }
}

impl Drop for HostTerminal {
    fn drop(&mut self) {
        let _ = self.leave();
    }
}

/// Translate a shifted symbol back to its base key.
fn shifted_symbol(c: char) -> Option<KeyCode> {
    let base = match c {
        '!' => '1',
        '@' => '2',
        '#' => '3',
        '$' => '4',
        '%' => '5',
        '^' => '6',
        '&' => '7',
        '*' => '8',
        '(' => '9',
        ')' => '0',
        '_' => '-',
        '+' => '=',
        '{' => '[',
        '}' => ']',
        '|' => '\\',
        ':' => ';',
        '"' => '\'',
        '<' => ',',
        '>' => '.',
        '?' => '/',
        '~' => '`',
        _ => return None,
    };
    KeyCode::from_name(&base.to_string())
}

/// Map a crossterm key event into the core's key model. Keys outside the
/// fixed enumeration are dropped.
pub fn map_key(ev: CtKeyEvent) -> Option<KeyEvent> {
    let mut mods = Modifiers::empty();
    if ev.modifiers.contains(CtMods::CONTROL) {
        mods |= Modifiers::CTRL;
    }
    if ev.modifiers.contains(CtMods::SUPER) {
        mods |= Modifiers::SUPER;
    }

    let code = match ev.code {
        CtKeyCode::Enter => KeyCode::Enter,
        CtKeyCode::Backspace => KeyCode::Backspace,
        CtKeyCode::Esc => KeyCode::Esc,
        CtKeyCode::Tab => KeyCode::Tab,
        CtKeyCode::Left => KeyCode::Left,
        CtKeyCode::Right => KeyCode::Right,
        CtKeyCode::Up => KeyCode::Up,
        CtKeyCode::Down => KeyCode::Down,
        CtKeyCode::Char(c) => {
            if c.is_ascii_uppercase() || ev.modifiers.contains(CtMods::SHIFT) {
                mods |= Modifiers::SHIFT;
            }
            if let Some(code) = shifted_symbol(c) {
                mods |= Modifiers::SHIFT;
                code
            } else {
                KeyCode::from_name(&c.to_ascii_lowercase().to_string())?
            }
        }
        _ => return None,
    };
    Some(KeyEvent::with_mods(code, mods))
}

/// Repaint the host terminal from the session state.
pub fn draw(session: &Session) -> Result<()> {
    let mut out = stdout();
    queue!(out, Clear(ClearType::All), MoveTo(0, 0))?;

    // window strip: every open terminal, the active one marked
    let active = session.wm.active_id();
    let mut strip = String::from("slate ");
    for (id, _) in session.wm.iter_active() {
        if id == active {
            strip.push_str(&format!("[{id}*]"));
        } else {
            strip.push_str(&format!("[{id}]"));
        }
    }
    queue!(out, Print(&strip), MoveTo(0, 1))?;
    queue!(out, Print("-".repeat(TERMINAL_COLS)))?;

    if let Some(term) = session.wm.active_terminal() {
        for row in 0..TERMINAL_ROWS {
            queue!(out, MoveTo(0, 2 + row as u16), Print(term.row_text(row)))?;
        }
        let cursor_row = 2 + term.cursor_row.min(TERMINAL_ROWS - 1) as u16;
        let cursor_col = term.cursor_col.min(TERMINAL_COLS - 1) as u16;
        queue!(out, MoveTo(cursor_col, cursor_row))?;
    }

    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ct(code: CtKeyCode, mods: CtMods) -> CtKeyEvent {
        CtKeyEvent::new(code, mods)
    }

    #[test]
    fn plain_and_shifted_chars_map() {
        let a = map_key(ct(CtKeyCode::Char('a'), CtMods::NONE)).unwrap();
        assert_eq!(a.code, KeyCode::A);
        assert!(a.mods.is_empty());

        let upper = map_key(ct(CtKeyCode::Char('A'), CtMods::SHIFT)).unwrap();
        assert_eq!(upper.code, KeyCode::A);
        assert!(upper.mods.contains(Modifiers::SHIFT));

        let bang = map_key(ct(CtKeyCode::Char('!'), CtMods::NONE)).unwrap();
        assert_eq!(bang.code, KeyCode::Num1);
        assert!(bang.mods.contains(Modifiers::SHIFT));
    }

    #[test]
    fn control_chords_carry_the_modifier() {
        let ctrl_x = map_key(ct(CtKeyCode::Char('x'), CtMods::CONTROL)).unwrap();
        assert_eq!(ctrl_x.code, KeyCode::X);
        assert!(ctrl_x.mods.contains(Modifiers::CTRL));
    }

    #[test]
    fn named_keys_map_and_unknown_keys_drop() {
        assert_eq!(
            map_key(ct(CtKeyCode::Enter, CtMods::NONE)).unwrap().code,
            KeyCode::Enter
        );
        assert!(map_key(ct(CtKeyCode::F(5), CtMods::NONE)).is_none());
    }
}
