//! First-boot setup: pick a username and password when `/etc/passwd` is
//! empty or missing, then claim the stock home directory.

use core_events::{KeyCode, KeyEvent};
use core_term::TerminalState;
use core_vfs::{NodeType, Vfs};

use crate::auth;

const MAX_USERNAME: usize = 32;
const MAX_PASSWORD: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Step {
    Username,
    Password,
    Confirm,
}

pub struct FirstBootMode {
    active: bool,
    step: Step,
    username: String,
    password: String,
    input: String,
}

impl Default for FirstBootMode {
    fn default() -> Self {
        Self {
            active: false,
            step: Step::Username,
            username: String::new(),
            password: String::new(),
            input: String::new(),
        }
    }
}

fn username_is_valid(name: &str) -> bool {
    !name.is_empty()
        && !name
            .chars()
            .any(|c| c == '/' || c == '.' || c.is_whitespace())
}

impl FirstBootMode {
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Activate when no user is configured yet.
    pub fn begin_if_needed(&mut self, vfs: &mut Vfs, term: &mut TerminalState) {
        if auth::has_configured_user(vfs) {
            return;
        }
        *self = Self {
            active: true,
            ..Self::default()
        };
        term.clear();
        term.write_line("First boot setup");
        term.write_str("Enter username: ");
        tracing::info!(target: "shell", "first boot setup active");
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
                let limit = if self.step == Step::Username {
                    MAX_USERNAME
                } else {
                    MAX_PASSWORD
                };
                if self.input.len() + 1 >= limit {
                    return;
                }
                self.input.push(c);
                let echo = if self.step == Step::Username {
                    c as u8
                } else {
                    b'*'
                };
                term.write_char(echo);
            }
        }
    }

    fn accept_input(&mut self, vfs: &mut Vfs, term: &mut TerminalState, prompt: &str) {
        term.newline();
        match self.step {
            Step::Username => {
                if !username_is_valid(&self.input) {
                    term.write_line("Invalid username. Use letters/numbers, no dots or slashes.");
                    term.write_str("Enter username: ");
                    self.input.clear();
                    return;
                }
                self.username = std::mem::take(&mut self.input);
                self.step = Step::Password;
                term.write_str("Enter password: ");
            }
            Step::Password => {
                if self.input.is_empty() {
                    term.write_line("Password cannot be empty.");
                    term.write_str("Enter password: ");
                    return;
                }
                self.password = std::mem::take(&mut self.input);
                self.step = Step::Confirm;
                term.write_str("Confirm password: ");
            }
            Step::Confirm => {
                let confirm = std::mem::take(&mut self.input);
                if confirm != self.password {
                    term.write_line("Passwords do not match. Try again.");
                    self.step = Step::Password;
                    term.write_str("Enter password: ");
                    return;
                }
                if !claim_home_dir(vfs, &self.username) {
                    term.write_line("Failed to set home directory.");
                    self.finish(term, prompt);
                    return;
                }
                if !auth::write_entry(vfs, &self.username, &self.password) {
                    term.write_line("Failed to write /etc/passwd.");
                    self.finish(term, prompt);
                    return;
                }
                tracing::info!(target: "shell", user = %self.username, "first boot complete");
                self.finish(term, prompt);
            }
        }
    }

    fn finish(&mut self, term: &mut TerminalState, prompt: &str) {
        self.active = false;
        term.write_line("Setup complete.");
        term.input_line.clear();
        term.input_pos = 0;
        term.write_str(prompt);
    }
}

/// Rename the stock home directory (`/home/users` or `/home/user`) to the
/// chosen name; create a fresh one when neither exists.
fn claim_home_dir(vfs: &mut Vfs, username: &str) -> bool {
    let Some(home) = vfs.resolve("/home") else {
        return false;
    };
    if vfs.node_type(home) != Ok(NodeType::Directory) {
        vfs.release(home);
        return false;
    }

    for stock in ["users", "user"] {
        if let Some(existing) = vfs.resolve_at(Some(home), stock) {
            let is_dir = vfs.node_type(existing) == Ok(NodeType::Directory);
            vfs.release(existing);
            if is_dir {
                let renamed = vfs.dir_rename_node(home, stock, home, username).is_ok();
                vfs.release(home);
                return renamed;
            }
        }
    }

    let created = vfs.dir_create_node(home, username, NodeType::Directory);
    vfs.release(home);
    match created {
        Ok(node) => {
            vfs.release(node);
            true
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_vfs::MemoryFs;

    fn setup() -> (Vfs, TerminalState, FirstBootMode) {
        let mut fs = MemoryFs::new();
        fs.put_file("/etc/passwd", b"").unwrap();
        fs.put_dir("/home/user/documents").unwrap();
        let mut vfs = Vfs::new();
        vfs.mount("/", Box::new(fs)).unwrap();
        let mut term = TerminalState::new();
        term.active = true;
        let mut fb = FirstBootMode::default();
        fb.begin_if_needed(&mut vfs, &mut term);
        (vfs, term, fb)
    }

    fn type_word(fb: &mut FirstBootMode, vfs: &mut Vfs, term: &mut TerminalState, word: &str) {
        for c in word.chars() {
            let code = KeyCode::from_name(&c.to_string()).unwrap();
            fb.handle_key(vfs, term, KeyEvent::new(code), "$ ");
        }
        fb.handle_key(vfs, term, KeyEvent::new(KeyCode::Enter), "$ ");
    }

    #[test]
    fn full_flow_creates_user_and_renames_home() {
        let (mut vfs, mut term, mut fb) = setup();
        assert!(fb.is_active());
        type_word(&mut fb, &mut vfs, &mut term, "alice");
        type_word(&mut fb, &mut vfs, &mut term, "pass");
        type_word(&mut fb, &mut vfs, &mut term, "pass");
        assert!(!fb.is_active());

        let entry = auth::read_entry(&mut vfs).unwrap();
        assert_eq!(entry.username, "alice");
        assert!(entry.matches("pass"));

        let home = vfs.resolve("/home/alice").unwrap();
        vfs.release(home);
        assert!(vfs.resolve("/home/user").is_none(), "stock home renamed");
        let docs = vfs.resolve("/home/alice/documents").unwrap();
        vfs.release(docs);
    }

    #[test]
    fn invalid_usernames_are_rejected() {
        let (mut vfs, mut term, mut fb) = setup();
        // dots are reserved for files
        type_word(&mut fb, &mut vfs, &mut term, "al.ice");
        assert!(fb.is_active());
        assert!(term
            .screen_text()
            .iter()
            .any(|r| r.starts_with("Invalid username")));
        type_word(&mut fb, &mut vfs, &mut term, "alice");
        type_word(&mut fb, &mut vfs, &mut term, "pw");
        type_word(&mut fb, &mut vfs, &mut term, "pw");
        assert!(!fb.is_active());
    }

    #[test]
    fn mismatched_confirmation_restarts_password_step() {
        let (mut vfs, mut term, mut fb) = setup();
        type_word(&mut fb, &mut vfs, &mut term, "bob");
        type_word(&mut fb, &mut vfs, &mut term, "one");
        type_word(&mut fb, &mut vfs, &mut term, "two");
        assert!(fb.is_active());
        type_word(&mut fb, &mut vfs, &mut term, "one");
        type_word(&mut fb, &mut vfs, &mut term, "one");
        assert!(!fb.is_active());
        assert!(auth::read_entry(&mut vfs).unwrap().matches("one"));
    }

    #[test]
    fn configured_system_skips_first_boot() {
        let mut fs = MemoryFs::new();
        fs.put_file("/etc/passwd", b"alice:abcdef12\n").unwrap();
        let mut vfs = Vfs::new();
        vfs.mount("/", Box::new(fs)).unwrap();
        let mut term = TerminalState::new();
        let mut fb = FirstBootMode::default();
        fb.begin_if_needed(&mut vfs, &mut term);
        assert!(!fb.is_active());
    }
}
