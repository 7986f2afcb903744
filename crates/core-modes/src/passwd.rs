//! Interactive password change (the `passwd` builtin's state machine).

use core_events::{KeyCode, KeyEvent};
use core_term::TerminalState;
use core_vfs::Vfs;

use crate::auth;

const MAX_INPUT: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Step {
    Current,
    New,
    Confirm,
}

pub struct PasswdMode {
    active: bool,
    step: Step,
    username: String,
    current_hash: u32,
    new_password: String,
    input: String,
}

impl Default for PasswdMode {
    fn default() -> Self {
        Self {
            active: false,
            step: Step::Current,
            username: String::new(),
            current_hash: 0,
            new_password: String::new(),
            input: String::new(),
        }
    }
}

impl PasswdMode {
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Start the flow. `false` when no user is configured.
    pub fn begin(&mut self, vfs: &mut Vfs, term: &mut TerminalState) -> bool {
        let Some(entry) = auth::read_entry(vfs) else {
            return false;
        };
        *self = Self {
            active: true,
            username: entry.username,
            current_hash: entry.hash,
            ..Self::default()
        };
        term.write_str("Current password: ");
        true
    }

    pub fn handle_key(
        &mut self,
        vfs: &mut Vfs,
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
                    let (row, col) = (term.cursor_row, term.cursor_col);
                    term.write_char(b' ');
                    term.cursor_row = row;
                    term.cursor_col = col;
                }
            }
            KeyCode::Enter => self.accept_input(vfs, term, prompt),
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

    fn accept_input(&mut self, vfs: &mut Vfs, term: &mut TerminalState, prompt: &str) {
        term.newline();
        match self.step {
            Step::Current => {
                if auth::fnv1a(self.input.as_bytes()) != self.current_hash {
                    term.write_line("passwd: authentication failure");
                    self.finish(term, prompt);
                    return;
                }
                self.input.clear();
                self.step = Step::New;
                term.write_str("New password: ");
            }
            Step::New => {
                if self.input.is_empty() {
                    term.write_line("Password cannot be empty.");
                    term.write_str("New password: ");
                    return;
                }
                self.new_password = std::mem::take(&mut self.input);
                self.step = Step::Confirm;
                term.write_str("Confirm password: ");
            }
            Step::Confirm => {
                let confirm = std::mem::take(&mut self.input);
                if confirm != self.new_password {
                    term.write_line("Passwords do not match.");
                    self.step = Step::New;
                    term.write_str("New password: ");
                    return;
                }
                if auth::write_entry(vfs, &self.username, &self.new_password) {
                    tracing::info!(target: "shell", user = %self.username, "password changed");
                    term.write_line("Password updated.");
                } else {
                    term.write_line("passwd: failed to write /etc/passwd");
                }
                self.finish(term, prompt);
            }
        }
    }

    fn finish(&mut self, term: &mut TerminalState, prompt: &str) {
        self.active = false;
        self.input.clear();
        self.new_password.clear();
        term.input_line.clear();
        term.input_pos = 0;
        term.write_str(prompt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_vfs::MemoryFs;

    fn setup() -> (Vfs, TerminalState, PasswdMode) {
        let mut fs = MemoryFs::new();
        fs.put_dir("/etc").unwrap();
        let mut vfs = Vfs::new();
        vfs.mount("/", Box::new(fs)).unwrap();
        auth::write_entry(&mut vfs, "alice", "old");
        let mut term = TerminalState::new();
        term.active = true;
        let mut mode = PasswdMode::default();
        assert!(mode.begin(&mut vfs, &mut term));
        (vfs, term, mode)
    }

    fn submit(mode: &mut PasswdMode, vfs: &mut Vfs, term: &mut TerminalState, word: &str) {
        for c in word.chars() {
            let code = KeyCode::from_name(&c.to_string()).unwrap();
            mode.handle_key(vfs, term, KeyEvent::new(code), "$ ");
        }
        mode.handle_key(vfs, term, KeyEvent::new(KeyCode::Enter), "$ ");
    }

    #[test]
    fn change_flow_rewrites_entry() {
        let (mut vfs, mut term, mut mode) = setup();
        submit(&mut mode, &mut vfs, &mut term, "old");
        submit(&mut mode, &mut vfs, &mut term, "new");
        submit(&mut mode, &mut vfs, &mut term, "new");
        assert!(!mode.is_active());
        let entry = auth::read_entry(&mut vfs).unwrap();
        assert_eq!(entry.username, "alice");
        assert!(entry.matches("new"));
        assert!(term.screen_text().iter().any(|r| r == "Password updated."));
    }

    #[test]
    fn wrong_current_password_aborts() {
        let (mut vfs, mut term, mut mode) = setup();
        submit(&mut mode, &mut vfs, &mut term, "guess");
        assert!(!mode.is_active());
        assert!(auth::read_entry(&mut vfs).unwrap().matches("old"));
        assert!(term
            .screen_text()
            .iter()
            .any(|r| r == "passwd: authentication failure"));
    }

    #[test]
    fn mismatch_retries_new_password() {
        let (mut vfs, mut term, mut mode) = setup();
        submit(&mut mode, &mut vfs, &mut term, "old");
        submit(&mut mode, &mut vfs, &mut term, "aaa");
        submit(&mut mode, &mut vfs, &mut term, "bbb");
        assert!(mode.is_active());
        submit(&mut mode, &mut vfs, &mut term, "ccc");
        submit(&mut mode, &mut vfs, &mut term, "ccc");
        assert!(!mode.is_active());
        assert!(auth::read_entry(&mut vfs).unwrap().matches("ccc"));
    }
}
