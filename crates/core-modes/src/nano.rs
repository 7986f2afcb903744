//! Minimal nano-style editor over a bounded in-memory buffer.
//!
//! The whole file lives in a 4096-byte buffer; editing is insert and
//! backspace at a byte cursor. The terminal grid is repainted from scratch
//! on every keystroke: header, numbered text rows, status row, footer.
//! `^X` starts the exit flow (save prompt when dirty), `^P` opens the
//! one-command prompt.

use core_events::{KeyCode, KeyEvent, Modifiers};
use core_term::{TerminalState, TERMINAL_COLS, TERMINAL_ROWS};
use core_vfs::{OpenFlags, Vfs};

pub const NANO_MAX_BUFFER: usize = 4096;
const PROMPT_MAX: usize = 32;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum PromptState {
    #[default]
    None,
    Command,
    SaveChoice,
    Confirm,
}

#[derive(Default)]
pub struct NanoMode {
    active: bool,
    path: String,
    buffer: Vec<u8>,
    cursor: usize,
    dirty: bool,
    prompt_state: PromptState,
    prompt_input: String,
    pending_save: bool,
}

impl NanoMode {
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Load `path` (an existing file, already type-checked by the builtin)
    /// and take over the terminal.
    pub fn open(&mut self, vfs: &mut Vfs, term: &mut TerminalState, path: &str) -> bool {
        let base = term.cwd;
        let Ok(file) = vfs.open_at(base, path, OpenFlags::READ) else {
            return false;
        };
        let mut buffer = Vec::new();
        let mut chunk = [0u8; 128];
        loop {
            match vfs.read(file, &mut chunk) {
                Ok(0) => break,
                Ok(n) => {
                    let room = NANO_MAX_BUFFER - 1 - buffer.len();
                    buffer.extend_from_slice(&chunk[..n.min(room)]);
                    if room <= n {
                        break;
                    }
                }
                Err(_) => {
                    let _ = vfs.close(file);
                    return false;
                }
            }
        }
        let _ = vfs.close(file);

        *self = Self {
            active: true,
            path: path.to_string(),
            buffer,
            ..Self::default()
        };
        tracing::info!(target: "shell", path = %path, "editor opened");
        self.render(term);
        true
    }

    fn save(&mut self, vfs: &mut Vfs, term: &TerminalState) -> bool {
        let Ok(file) = vfs.open_at(
            term.cwd,
            &self.path,
            OpenFlags::WRITE | OpenFlags::TRUNC | OpenFlags::CREATE,
        ) else {
            return false;
        };
        let ok = matches!(vfs.write(file, &self.buffer), Ok(n) if n == self.buffer.len());
        let _ = vfs.close(file);
        if ok {
            tracing::info!(target: "shell", path = %self.path, bytes = self.buffer.len(), "editor saved");
        }
        ok
    }

    fn exit_to_shell(&mut self, term: &mut TerminalState, prompt: &str) {
        self.active = false;
        self.prompt_state = PromptState::None;
        self.prompt_input.clear();
        self.pending_save = false;
        term.clear();
        term.input_line.clear();
        term.input_pos = 0;
        term.write_str(prompt);
    }

    fn insert(&mut self, c: u8) {
        if self.buffer.len() >= NANO_MAX_BUFFER - 1 {
            return;
        }
        self.buffer.insert(self.cursor, c);
        self.cursor += 1;
        self.dirty = true;
    }

    fn backspace(&mut self) {
        if self.cursor == 0 || self.buffer.is_empty() {
            return;
        }
        self.cursor -= 1;
        self.buffer.remove(self.cursor);
        self.dirty = true;
    }

    fn cursor_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    fn cursor_right(&mut self) {
        if self.cursor < self.buffer.len() {
            self.cursor += 1;
        }
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

        if evt.mods.contains(Modifiers::CTRL) && evt.code == KeyCode::X {
            if !self.dirty {
                self.exit_to_shell(term, prompt);
                return;
            }
            self.prompt_state = PromptState::SaveChoice;
            self.render(term);
            return;
        }

        if evt.mods.contains(Modifiers::CTRL) && evt.code == KeyCode::P {
            self.prompt_state = if self.prompt_state == PromptState::None {
                self.prompt_input.clear();
                PromptState::Command
            } else {
                self.prompt_input.clear();
                self.pending_save = false;
                PromptState::None
            };
            self.render(term);
            return;
        }

        match self.prompt_state {
            PromptState::Command => {
                match evt.code {
                    KeyCode::Backspace => {
                        self.prompt_input.pop();
                    }
                    KeyCode::Enter => {
                        if self.prompt_input == "x" {
                            self.prompt_state = PromptState::SaveChoice;
                        } else {
                            self.prompt_state = PromptState::None;
                            self.prompt_input.clear();
                        }
                    }
                    _ => {
                        if let Some(c) = evt.to_char() {
                            if self.prompt_input.is_empty() && c == 'x' {
                                self.prompt_state = PromptState::SaveChoice;
                            } else if self.prompt_input.len() < PROMPT_MAX - 1 {
                                self.prompt_input.push(c);
                            }
                        }
                    }
                }
                self.render(term);
            }
            PromptState::SaveChoice => {
                match evt.to_char() {
                    Some('y') | Some('Y') => {
                        self.pending_save = true;
                        self.prompt_state = PromptState::Confirm;
                    }
                    Some('n') | Some('N') => {
                        self.pending_save = false;
                        self.prompt_state = PromptState::Confirm;
                    }
                    _ => {}
                }
                self.render(term);
            }
            PromptState::Confirm => {
                if evt.code == KeyCode::Enter {
                    if self.pending_save {
                        if self.save(vfs, term) {
                            self.dirty = false;
                            self.exit_to_shell(term, prompt);
                            return;
                        }
                        // save failed: drop back to the editor
                        self.prompt_state = PromptState::None;
                        self.pending_save = false;
                        self.render(term);
                    } else {
                        self.exit_to_shell(term, prompt);
                    }
                }
            }
            PromptState::None => {
                match evt.code {
                    KeyCode::Enter => self.insert(b'\n'),
                    KeyCode::Backspace => self.backspace(),
                    KeyCode::Left => self.cursor_left(),
                    KeyCode::Right => self.cursor_right(),
                    _ => {
                        if let Some(c) = evt.to_char() {
                            if !evt.mods.contains(Modifiers::CTRL) {
                                self.insert(c as u8);
                            }
                        }
                    }
                }
                self.render(term);
            }
        }
    }

    /// Repaint the whole grid: header, gutter + text, status, footer.
    fn render(&self, term: &mut TerminalState) {
        term.clear();
        term.set_row(0, &format!("  GNU nano  {}", self.path));

        let edit_rows = TERMINAL_ROWS - 3;
        let total_lines = if self.buffer.is_empty() {
            0
        } else {
            1 + self.buffer.iter().filter(|&&b| b == b'\n').count()
        };
        let digits = {
            let mut d = 1;
            let mut n = total_lines.max(1);
            while n >= 10 {
                d += 1;
                n /= 10;
            }
            d
        };
        let prefix_width = (digits + 1).clamp(3, TERMINAL_COLS - 1);

        let mut lines = self.buffer.split(|&b| b == b'\n');
        for row in 0..edit_rows {
            let mut text = vec![b' '; TERMINAL_COLS];
            if row < total_lines {
                let prefix = format!("{:>width$} ", row + 1, width = digits);
                let plen = prefix.len().min(prefix_width);
                text[..plen].copy_from_slice(&prefix.as_bytes()[..plen]);
                if let Some(line) = lines.next() {
                    let avail = TERMINAL_COLS - prefix_width;
                    let n = line.len().min(avail);
                    text[prefix_width..prefix_width + n].copy_from_slice(&line[..n]);
                }
            } else {
                text[0] = b'~';
            }
            term.set_row(1 + row, &String::from_utf8_lossy(&text));
        }

        let dirty = if self.dirty { "Modified" } else { "Saved" };
        term.set_row(
            TERMINAL_ROWS - 2,
            &format!("File: {} -- {}", self.path, dirty),
        );
        let footer = match self.prompt_state {
            PromptState::Command => format!("Command: {}", self.prompt_input),
            PromptState::SaveChoice => "Save changes? (y/n)".to_string(),
            PromptState::Confirm => "Press Enter to confirm".to_string(),
            PromptState::None => "^P Command".to_string(),
        };
        term.set_row(TERMINAL_ROWS - 1, &footer);

        // place the cursor inside the visible text region
        let (mut line, mut col) = (0usize, 0usize);
        for &b in &self.buffer[..self.cursor.min(self.buffer.len())] {
            if b == b'\n' {
                line += 1;
                col = 0;
            } else {
                col += 1;
            }
        }
        term.cursor_row = (1 + line.min(edit_rows - 1)).min(TERMINAL_ROWS - 1);
        term.cursor_col = (prefix_width + col).min(TERMINAL_COLS - 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_vfs::MemoryFs;

    fn setup(contents: &[u8]) -> (Vfs, TerminalState, NanoMode) {
        let mut fs = MemoryFs::new();
        fs.put_file("/notes.txt", contents).unwrap();
        let mut vfs = Vfs::new();
        vfs.mount("/", Box::new(fs)).unwrap();
        let mut term = TerminalState::new();
        term.active = true;
        let mut nano = NanoMode::default();
        assert!(nano.open(&mut vfs, &mut term, "/notes.txt"));
        (vfs, term, nano)
    }

    fn press(nano: &mut NanoMode, vfs: &mut Vfs, term: &mut TerminalState, code: KeyCode, mods: Modifiers) {
        nano.handle_key(vfs, term, KeyEvent::with_mods(code, mods), "$ ");
    }

    fn read_file(vfs: &mut Vfs, path: &str) -> Vec<u8> {
        let f = vfs.open_at(None, path, OpenFlags::READ).unwrap();
        let mut out = Vec::new();
        let mut buf = [0u8; 64];
        loop {
            let n = vfs.read(f, &mut buf).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        vfs.close(f).unwrap();
        out
    }

    #[test]
    fn renders_gutter_status_and_footer() {
        let (_vfs, term, _nano) = setup(b"alpha\nbeta\n");
        assert_eq!(term.row_text(0), "  GNU nano  /notes.txt");
        assert_eq!(term.row_text(1), "1  alpha");
        assert_eq!(term.row_text(2), "2  beta");
        assert_eq!(term.row_text(4), "~", "rows past the file show a marker");
        assert_eq!(term.row_text(TERMINAL_ROWS - 2), "File: /notes.txt -- Saved");
        assert_eq!(term.row_text(TERMINAL_ROWS - 1), "^P Command");
    }

    #[test]
    fn typing_marks_dirty_and_save_flow_writes_back() {
        let (mut vfs, mut term, mut nano) = setup(b"");
        for code in [KeyCode::H, KeyCode::I] {
            press(&mut nano, &mut vfs, &mut term, code, Modifiers::empty());
        }
        assert!(nano.is_dirty());
        assert_eq!(term.row_text(TERMINAL_ROWS - 2), "File: /notes.txt -- Modified");

        press(&mut nano, &mut vfs, &mut term, KeyCode::X, Modifiers::CTRL);
        assert_eq!(term.row_text(TERMINAL_ROWS - 1), "Save changes? (y/n)");
        press(&mut nano, &mut vfs, &mut term, KeyCode::Y, Modifiers::empty());
        assert_eq!(term.row_text(TERMINAL_ROWS - 1), "Press Enter to confirm");
        press(&mut nano, &mut vfs, &mut term, KeyCode::Enter, Modifiers::empty());

        assert!(!nano.is_active());
        assert_eq!(read_file(&mut vfs, "/notes.txt"), b"hi");
        assert_eq!(term.row_text(0), "$", "shell prompt restored");
    }

    #[test]
    fn discarding_changes_leaves_file_alone() {
        let (mut vfs, mut term, mut nano) = setup(b"keep\n");
        press(&mut nano, &mut vfs, &mut term, KeyCode::Z, Modifiers::empty());
        press(&mut nano, &mut vfs, &mut term, KeyCode::X, Modifiers::CTRL);
        press(&mut nano, &mut vfs, &mut term, KeyCode::N, Modifiers::empty());
        press(&mut nano, &mut vfs, &mut term, KeyCode::Enter, Modifiers::empty());
        assert!(!nano.is_active());
        assert_eq!(read_file(&mut vfs, "/notes.txt"), b"keep\n");
    }

    #[test]
    fn clean_exit_skips_the_prompt() {
        let (mut vfs, mut term, mut nano) = setup(b"x\n");
        press(&mut nano, &mut vfs, &mut term, KeyCode::X, Modifiers::CTRL);
        assert!(!nano.is_active());
    }

    #[test]
    fn command_prompt_x_routes_to_save_choice() {
        let (mut vfs, mut term, mut nano) = setup(b"");
        press(&mut nano, &mut vfs, &mut term, KeyCode::A, Modifiers::empty());
        press(&mut nano, &mut vfs, &mut term, KeyCode::P, Modifiers::CTRL);
        assert_eq!(term.row_text(TERMINAL_ROWS - 1), "Command:");
        press(&mut nano, &mut vfs, &mut term, KeyCode::X, Modifiers::empty());
        assert_eq!(term.row_text(TERMINAL_ROWS - 1), "Save changes? (y/n)");
    }

    #[test]
    fn buffer_is_bounded() {
        let big = vec![b'a'; NANO_MAX_BUFFER + 100];
        let (mut vfs, mut term, mut nano) = setup(&big);
        assert_eq!(nano.buffer.len(), NANO_MAX_BUFFER - 1, "load truncates");
        // inserting past the cap is a no-op
        press(&mut nano, &mut vfs, &mut term, KeyCode::B, Modifiers::empty());
        assert_eq!(nano.buffer.len(), NANO_MAX_BUFFER - 1);
        assert!(!nano.is_dirty());
    }
}
