//! Login prompt shown at boot when a user is configured.

use core_events::{KeyCode, KeyEvent};
use core_term::TerminalState;
use core_vfs::Vfs;

use crate::auth;

const MAX_INPUT: usize = 64;

#[derive(Default)]
pub struct LoginMode {
    active: bool,
    username: String,
    expected_hash: u32,
    input: String,
}

impl LoginMode {
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Activate when `/etc/passwd` holds a user; otherwise leave the shell
    /// alone (first boot handles the empty case).
    pub fn begin_if_needed(&mut self, vfs: &mut Vfs, term: &mut TerminalState) {
        let Some(entry) = auth::read_entry(vfs) else {
            return;
        };
        self.active = true;
        self.username = entry.username;
        self.expected_hash = entry.hash;
        self.input.clear();
        self.show_screen(term);
        tracing::info!(target: "shell", user = %self.username, "login prompt active");
    }

    fn show_screen(&mut self, term: &mut TerminalState) {
        term.clear();
        term.write_str("Username: ");
        term.write_line(&self.username);
        term.write_str("password: ");
        self.input.clear();
    }

    pub fn handle_key(
        &mut self,
        term: &mut TerminalState,
        evt: KeyEvent,
        prompt: &str,
    ) {
        if !self.active {
            return;
        }
        match evt.code {
            KeyCode::Backspace => {
                if !self.input.is_empty() && term.cursor_col > 0 {
                    self.input.pop();
                    term.cursor_col -= 1;
                    let row = term.cursor_row;
                    let col = term.cursor_col;
                    term.write_char(b' ');
                    term.cursor_row = row;
                    term.cursor_col = col;
                }
            }
            KeyCode::Enter => {
                term.newline();
                if auth::fnv1a(self.input.as_bytes()) != self.expected_hash {
                    tracing::debug!(target: "shell", "login attempt failed");
                    term.write_line("Incorrect password. Try again.");
                    term.write_str("password: ");
                    self.input.clear();
                    return;
                }
                self.finish(term, prompt);
            }
            KeyCode::Tab | KeyCode::Esc => {}
            _ => {
                let Some(c) = evt.to_char() else { return };
                if self.input.len() + 1 >= MAX_INPUT {
                    return;
                }
                self.input.push(c);
                term.write_char(b'*');
            }
        }
    }

    fn finish(&mut self, term: &mut TerminalState, prompt: &str) {
        self.active = false;
        self.input.clear();
        term.clear();
        term.input_line.clear();
        term.input_pos = 0;
        term.write_str(prompt);
        tracing::info!(target: "shell", user = %self.username, "login ok");
    }
}
