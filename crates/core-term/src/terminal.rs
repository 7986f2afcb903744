//! Per-terminal state: screen buffer, input line, history, capture.

use core_vfs::NodeId;

pub const TERMINAL_ROWS: usize = 24;
pub const TERMINAL_COLS: usize = 80;
const BUFFER_SIZE: usize = TERMINAL_ROWS * TERMINAL_COLS;

/// History ring depth.
pub const MAX_HISTORY: usize = 16;

/// Split orientation recorded on each window.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SplitDir {
    #[default]
    None,
    Vertical,
    Horizontal,
}

/// Window placement in pixel units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Geometry {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub split: SplitDir,
}

/// State of the fastfetch banner region inside a terminal. The pixel data
/// is composited by the external renderer; the core only tracks what is
/// reserved where.
#[derive(Clone, Debug, Default)]
pub struct FastfetchOverlay {
    pub active: bool,
    pub image_path: String,
    pub pixels: Vec<u16>,
    pub width: u16,
    pub height: u16,
    pub start_row: usize,
    pub line_count: usize,
}

impl FastfetchOverlay {
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

pub struct TerminalState {
    buffer: Vec<u8>,
    pub cursor_row: usize,
    pub cursor_col: usize,
    pub active: bool,

    pub input_line: String,
    pub input_pos: usize,

    history: Vec<String>,
    pub history_pos: usize,

    /// Working directory, pinned in the node cache while this terminal
    /// lives. Released by the window manager when the terminal closes.
    pub cwd: Option<NodeId>,

    /// Bytes injected by the shell when this terminal runs the right-hand
    /// side of a pipe. Cleared after the consuming command returns.
    pub pipe_input: Option<Vec<u8>>,

    capture: Option<Vec<u8>>,

    pub geometry: Geometry,
    pub fastfetch: FastfetchOverlay,
    /// Path being viewed when image-view mode swallows key events.
    pub image_view: Option<String>,
}

impl Default for TerminalState {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalState {
    pub fn new() -> Self {
        Self {
            buffer: vec![b' '; BUFFER_SIZE],
            cursor_row: 0,
            cursor_col: 0,
            active: false,
            input_line: String::new(),
            input_pos: 0,
            history: Vec::new(),
            history_pos: 0,
            cwd: None,
            pipe_input: None,
            capture: None,
            geometry: Geometry::default(),
            fastfetch: FastfetchOverlay::default(),
            image_view: None,
        }
    }

    // ---- screen buffer -------------------------------------------------

    pub fn write_char(&mut self, c: u8) {
        if let Some(buf) = self.capture.as_mut() {
            buf.push(c);
            return;
        }
        if self.cursor_row >= TERMINAL_ROWS {
            self.scroll_up();
        }
        match c {
            b'\n' => {
                self.cursor_col = 0;
                self.cursor_row += 1;
            }
            b'\r' => {
                self.cursor_col = 0;
            }
            _ => {
                let pos = self.cursor_row * TERMINAL_COLS + self.cursor_col;
                if pos < BUFFER_SIZE {
                    self.buffer[pos] = c;
                    self.cursor_col += 1;
                    if self.cursor_col >= TERMINAL_COLS {
                        self.cursor_col = 0;
                        self.cursor_row += 1;
                    }
                }
            }
        }
    }

    pub fn write_str(&mut self, s: &str) {
        for &b in s.as_bytes() {
            self.write_char(b);
        }
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.write_char(b);
        }
    }

    pub fn write_line(&mut self, s: &str) {
        self.write_str(s);
        self.newline();
    }

    pub fn newline(&mut self) {
        self.write_char(b'\n');
    }

    fn scroll_up(&mut self) {
        self.buffer.copy_within(TERMINAL_COLS.., 0);
        let tail = BUFFER_SIZE - TERMINAL_COLS;
        self.buffer[tail..].fill(b' ');
        self.cursor_row = TERMINAL_ROWS - 1;
    }

    pub fn clear(&mut self) {
        self.buffer.fill(b' ');
        self.cursor_row = 0;
        self.cursor_col = 0;
    }

    /// Overwrite a whole row (used by full-row renderers like the editor).
    pub fn set_row(&mut self, row: usize, text: &str) {
        if row >= TERMINAL_ROWS {
            return;
        }
        let start = row * TERMINAL_COLS;
        self.buffer[start..start + TERMINAL_COLS].fill(b' ');
        let n = text.len().min(TERMINAL_COLS);
        self.buffer[start..start + n].copy_from_slice(&text.as_bytes()[..n]);
    }

    /// Text content of a row, trailing blanks trimmed.
    pub fn row_text(&self, row: usize) -> String {
        if row >= TERMINAL_ROWS {
            return String::new();
        }
        let start = row * TERMINAL_COLS;
        let line = &self.buffer[start..start + TERMINAL_COLS];
        String::from_utf8_lossy(line).trim_end().to_string()
    }

    /// Full screen content as text rows, trailing blank rows trimmed.
    /// Mostly a test and diagnostics convenience.
    pub fn screen_text(&self) -> Vec<String> {
        let mut rows: Vec<String> = (0..TERMINAL_ROWS).map(|r| self.row_text(r)).collect();
        while rows.last().map(|r| r.is_empty()).unwrap_or(false) {
            rows.pop();
        }
        rows
    }

    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    // ---- capture -------------------------------------------------------

    /// Redirect the write primitives into a growable buffer. Capture must
    /// not nest; starting a second capture discards the first.
    pub fn capture_start(&mut self) {
        debug_assert!(self.capture.is_none(), "capture must not nest");
        self.capture = Some(Vec::new());
    }

    /// Stop capturing and hand back everything written since the start.
    pub fn capture_stop(&mut self) -> Vec<u8> {
        self.capture.take().unwrap_or_default()
    }

    pub fn capture_active(&self) -> bool {
        self.capture.is_some()
    }

    // ---- line editing --------------------------------------------------

    pub fn handle_key(&mut self, c: char) {
        if !c.is_ascii() || c.is_ascii_control() {
            return;
        }
        if self.input_line.len() >= TERMINAL_COLS - 1 {
            return;
        }
        if self.input_pos == self.input_line.len() {
            self.input_line.push(c);
            self.input_pos += 1;
            self.write_char(c as u8);
        } else {
            // mid-line insert: splice and repaint the tail
            self.input_line.insert(self.input_pos, c);
            self.input_pos += 1;
            let tail: String = self.input_line[self.input_pos - 1..].to_string();
            let col = self.cursor_col;
            self.write_str(&tail);
            self.cursor_col = col + 1;
        }
    }

    pub fn handle_backspace(&mut self) {
        if self.input_pos == 0 {
            return;
        }
        self.input_pos -= 1;
        self.input_line.remove(self.input_pos);
        if self.cursor_col > 0 {
            self.cursor_col -= 1;
            let pos = self.cursor_row * TERMINAL_COLS + self.cursor_col;
            if pos < BUFFER_SIZE {
                self.buffer[pos] = b' ';
            }
            if self.input_pos < self.input_line.len() {
                let tail: String = self.input_line[self.input_pos..].to_string();
                let col = self.cursor_col;
                self.write_str(&tail);
                self.write_char(b' ');
                self.cursor_col = col;
            }
        }
    }

    pub fn handle_arrow_left(&mut self) {
        if self.input_pos > 0 {
            self.input_pos -= 1;
            self.cursor_col = self.cursor_col.saturating_sub(1);
        }
    }

    pub fn handle_arrow_right(&mut self) {
        if self.input_pos < self.input_line.len() && self.cursor_col < TERMINAL_COLS - 1 {
            self.input_pos += 1;
            self.cursor_col += 1;
        }
    }

    /// Enter: echo the newline, push the line into history, clear the
    /// editing state, and hand the submitted line to the caller.
    pub fn commit_input(&mut self) -> String {
        self.newline();
        let line = std::mem::take(&mut self.input_line);
        self.input_pos = 0;
        if !line.is_empty() {
            if self.history.len() >= MAX_HISTORY {
                self.history.remove(0);
            }
            self.history.push(line.clone());
        }
        self.history_pos = self.history.len();
        line
    }

    /// Recall the previous history entry onto the input line.
    pub fn history_up(&mut self, prompt: &str) {
        if self.history_pos == 0 {
            return;
        }
        self.history_pos -= 1;
        let entry = self.history[self.history_pos].clone();
        self.replace_input_line(prompt, &entry);
    }

    /// Walk back toward the blank line after the newest entry.
    pub fn history_down(&mut self, prompt: &str) {
        if self.history_pos >= self.history.len() {
            return;
        }
        self.history_pos += 1;
        let entry = if self.history_pos < self.history.len() {
            self.history[self.history_pos].clone()
        } else {
            String::new()
        };
        self.replace_input_line(prompt, &entry);
    }

    fn replace_input_line(&mut self, prompt: &str, text: &str) {
        let row = self.cursor_row.min(TERMINAL_ROWS - 1);
        self.set_row(row, "");
        self.cursor_row = row;
        self.cursor_col = 0;
        self.write_str(prompt);
        self.write_str(text);
        self.input_line = text.to_string();
        self.input_pos = text.len();
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
        self.history_pos = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn writes_land_in_the_grid() {
        let mut t = TerminalState::new();
        t.write_line("hello");
        t.write_str("$ ");
        assert_eq!(t.row_text(0), "hello");
        assert_eq!(t.row_text(1), "$");
        assert_eq!((t.cursor_row, t.cursor_col), (1, 2));
    }

    #[test]
    fn long_line_wraps() {
        let mut t = TerminalState::new();
        t.write_str(&"x".repeat(TERMINAL_COLS + 5));
        assert_eq!(t.cursor_row, 1);
        assert_eq!(t.cursor_col, 5);
        assert_eq!(t.row_text(0).len(), TERMINAL_COLS);
    }

    #[test]
    fn bottom_row_scrolls() {
        let mut t = TerminalState::new();
        for i in 0..TERMINAL_ROWS + 2 {
            t.write_line(&format!("line{i}"));
        }
        assert_eq!(t.row_text(0), "line3");
        assert_eq!(t.cursor_row, TERMINAL_ROWS - 1);
    }

    #[test]
    fn capture_diverts_output_from_screen() {
        let mut t = TerminalState::new();
        t.write_str("visible");
        t.capture_start();
        t.write_line("captured");
        let got = t.capture_stop();
        assert_eq!(got, b"captured\n");
        assert_eq!(t.row_text(0), "visible");
    }

    #[test]
    fn commit_input_pushes_history_and_resets() {
        let mut t = TerminalState::new();
        for c in "ls /etc".chars() {
            t.handle_key(c);
        }
        let line = t.commit_input();
        assert_eq!(line, "ls /etc");
        assert_eq!(t.input_line, "");
        assert_eq!(t.history(), &["ls /etc".to_string()]);
    }

    #[test]
    fn history_replay_in_reverse_then_back_to_blank() {
        let mut t = TerminalState::new();
        for cmd in ["one", "two", "three"] {
            for c in cmd.chars() {
                t.handle_key(c);
            }
            t.commit_input();
        }
        t.history_up("$ ");
        assert_eq!(t.input_line, "three");
        t.history_up("$ ");
        assert_eq!(t.input_line, "two");
        t.history_up("$ ");
        assert_eq!(t.input_line, "one");
        t.history_down("$ ");
        t.history_down("$ ");
        t.history_down("$ ");
        assert_eq!(t.input_line, "", "down past newest returns a blank line");
    }

    #[test]
    fn history_ring_is_bounded() {
        let mut t = TerminalState::new();
        for i in 0..MAX_HISTORY + 4 {
            for c in format!("cmd{i}").chars() {
                t.handle_key(c);
            }
            t.commit_input();
        }
        assert_eq!(t.history().len(), MAX_HISTORY);
        assert_eq!(t.history()[0], "cmd4", "oldest entries shifted out");
    }

    #[test]
    fn backspace_edits_line_and_screen() {
        let mut t = TerminalState::new();
        t.write_str("$ ");
        for c in "lx".chars() {
            t.handle_key(c);
        }
        t.handle_backspace();
        t.handle_key('s');
        assert_eq!(t.input_line, "ls");
        assert_eq!(t.row_text(0), "$ ls");
    }

    #[test]
    fn mid_line_insert_repaints_tail() {
        let mut t = TerminalState::new();
        for c in "ct".chars() {
            t.handle_key(c);
        }
        t.handle_arrow_left();
        t.handle_key('a');
        assert_eq!(t.input_line, "cat");
        assert_eq!(t.row_text(0), "cat");
    }
}
