//! Tiled window management.
//!
//! The first terminal takes the whole panel minus a margin. Every later
//! terminal splits the selected one: side-by-side when the cell is wider
//! than tall, stacked otherwise, with at most four terminals sharing a row.
//! Closing re-tiles the survivors into a grid. After every layout change a
//! sanity pass checks bounds, minimum sizes and coverage; failing it forces
//! a full clear-and-redraw rather than leaving gaps on the panel.

use core_vfs::{NodeType, OpenFlags, Vfs};

use crate::terminal::{Geometry, SplitDir, TerminalState};
use crate::{Display, COLOR_WHITE};

pub const MAX_WINDOWS: usize = 8;

/// Most terminals allowed side by side in one row.
const MAX_HORIZONTAL_TERMINALS: usize = 4;
const MARGIN: i32 = 5;
const BORDER: i32 = 2;
const MIN_CELL: i32 = 50;
/// Row-alignment tolerance when counting horizontal neighbors.
const ROW_TOLERANCE: i32 = 5;

/// Index of a terminal slot. Stable for the terminal's lifetime.
pub type TermId = usize;

pub struct WindowManager {
    terminals: Vec<TerminalState>,
    window_count: usize,
    active: TermId,
    selected: TermId,
    /// Set when a sanity failure forced a full redraw; the front-end
    /// consumes it.
    needs_full_redraw: bool,
}

impl Default for WindowManager {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowManager {
    pub fn new() -> Self {
        Self {
            terminals: (0..MAX_WINDOWS).map(|_| TerminalState::new()).collect(),
            window_count: 0,
            active: 0,
            selected: 0,
            needs_full_redraw: false,
        }
    }

    pub fn window_count(&self) -> usize {
        self.window_count
    }

    pub fn active_id(&self) -> TermId {
        self.active
    }

    pub fn selected_id(&self) -> TermId {
        self.selected
    }

    pub fn terminal(&self, id: TermId) -> &TerminalState {
        &self.terminals[id]
    }

    pub fn terminal_mut(&mut self, id: TermId) -> &mut TerminalState {
        &mut self.terminals[id]
    }

    pub fn active_terminal(&self) -> Option<&TerminalState> {
        let t = &self.terminals[self.active];
        t.active.then_some(t)
    }

    pub fn active_terminal_mut(&mut self) -> Option<&mut TerminalState> {
        let t = &mut self.terminals[self.active];
        t.active.then_some(t)
    }

    pub fn iter_active(&self) -> impl Iterator<Item = (TermId, &TerminalState)> {
        self.terminals
            .iter()
            .enumerate()
            .filter(|(_, t)| t.active)
    }

    pub fn take_full_redraw(&mut self) -> bool {
        std::mem::take(&mut self.needs_full_redraw)
    }

    fn count_horizontal_at_y(&self, y: i32) -> usize {
        self.terminals
            .iter()
            .filter(|t| t.active)
            .filter(|t| (t.geometry.y - y).abs() <= ROW_TOLERANCE)
            .count()
    }

    /// Open a new terminal. Returns `None` when the limit is reached or no
    /// split direction can satisfy the minimum cell size; the slot is left
    /// untouched and `window_count` unchanged in that case.
    pub fn new_terminal(
        &mut self,
        vfs: &mut Vfs,
        display: &mut dyn Display,
        greeting: &str,
        prompt: &str,
    ) -> Option<TermId> {
        if self.window_count >= MAX_WINDOWS {
            tracing::debug!(target: "term.wm", "window limit reached");
            return None;
        }
        let new_idx = self.terminals.iter().position(|t| !t.active)?;

        let screen_w = display.width();
        let screen_h = display.height();

        let geometry = if self.window_count == 0 {
            Geometry {
                x: MARGIN,
                y: MARGIN,
                width: screen_w - MARGIN * 2,
                height: screen_h - MARGIN * 2,
                split: SplitDir::None,
            }
        } else {
            let sel_idx = self.pick_selected();
            let orig = self.terminals[sel_idx].geometry;

            // at the row cap, force stacking; otherwise aspect ratio decides
            let mut split = if self.count_horizontal_at_y(orig.y) >= MAX_HORIZONTAL_TERMINALS {
                SplitDir::Horizontal
            } else if orig.width > orig.height {
                SplitDir::Vertical
            } else {
                SplitDir::Horizontal
            };

            let mut geometry = None;
            if split == SplitDir::Vertical {
                let half_w = orig.width / 2 - BORDER;
                if half_w < MIN_CELL {
                    tracing::debug!(target: "term.wm", "too narrow to split, trying stacked");
                    split = SplitDir::Horizontal;
                } else {
                    let sel = &mut self.terminals[sel_idx];
                    sel.geometry.x = orig.x + half_w + BORDER * 2;
                    sel.geometry.width = half_w;
                    sel.geometry.split = SplitDir::Vertical;
                    geometry = Some(Geometry {
                        x: orig.x,
                        y: orig.y,
                        width: half_w,
                        height: orig.height,
                        split: SplitDir::Vertical,
                    });
                }
            }
            if split == SplitDir::Horizontal {
                let half_h = orig.height / 2 - BORDER;
                if half_h < MIN_CELL {
                    tracing::debug!(target: "term.wm", "cell too small for any split");
                    return None;
                }
                let sel = &mut self.terminals[sel_idx];
                sel.geometry.y = orig.y + half_h + BORDER * 2;
                sel.geometry.height = half_h;
                sel.geometry.split = SplitDir::Horizontal;
                geometry = Some(Geometry {
                    x: orig.x,
                    y: orig.y,
                    width: orig.width,
                    height: half_h,
                    split: SplitDir::Horizontal,
                });
            }
            // clear the area the split carved up
            display.fill_rect(orig.x, orig.y, orig.width, orig.height, COLOR_WHITE);
            geometry?
        };

        let term = &mut self.terminals[new_idx];
        *term = TerminalState::new();
        term.active = true;
        term.geometry = geometry;
        term.cwd = vfs.resolve("/");
        self.set_cwd_from_passwd(vfs, new_idx);

        self.active = new_idx;
        self.selected = new_idx;
        self.window_count += 1;

        let term = &mut self.terminals[new_idx];
        term.write_line(greeting);
        term.write_str(prompt);

        if !self.validate_layout(display) {
            tracing::warn!(target: "term.wm", "layout sanity failed after split, full redraw");
            display.fill_screen(COLOR_WHITE);
            self.needs_full_redraw = true;
        }
        tracing::info!(target: "term.wm", id = new_idx, count = self.window_count, "terminal opened");
        Some(new_idx)
    }

    fn pick_selected(&mut self) -> TermId {
        if self.terminals[self.selected].active {
            return self.selected;
        }
        if let Some((i, _)) = self.terminals.iter().enumerate().find(|(_, t)| t.active) {
            self.selected = i;
        }
        self.selected
    }

    /// Point the terminal's cwd at `/home/<user>` from `/etc/passwd` when
    /// that resolves; keeps `/` otherwise.
    fn set_cwd_from_passwd(&mut self, vfs: &mut Vfs, id: TermId) {
        let Ok(file) = vfs.open_at(None, "/etc/passwd", OpenFlags::READ) else {
            return;
        };
        let mut buf = [0u8; 128];
        let n = vfs.read(file, &mut buf).unwrap_or(0);
        let _ = vfs.close(file);
        if n == 0 {
            return;
        }
        let text = String::from_utf8_lossy(&buf[..n]);
        let first_line = text.lines().next().unwrap_or("");
        let user = first_line.split(':').next().unwrap_or("");
        if user.is_empty() {
            return;
        }
        let Some(home) = vfs.resolve(&format!("/home/{user}")) else {
            return;
        };
        if vfs.node_type(home) != Ok(NodeType::Directory) {
            vfs.release(home);
            return;
        }
        if let Some(old) = self.terminals[id].cwd.take() {
            vfs.release(old);
        }
        self.terminals[id].cwd = Some(home);
    }

    /// Close the selected terminal and re-tile the survivors.
    pub fn close_terminal(&mut self, vfs: &mut Vfs, display: &mut dyn Display) {
        if self.window_count == 0 {
            return;
        }
        let mut idx = self.selected;
        if !self.terminals[idx].active {
            idx = self.active;
            self.selected = self.active;
        }
        if !self.terminals[idx].active {
            return;
        }

        let closed = self.terminals[idx].geometry;
        if let Some(cwd) = self.terminals[idx].cwd.take() {
            vfs.release(cwd);
        }
        self.terminals[idx].active = false;
        self.window_count -= 1;

        match self.terminals.iter().position(|t| t.active) {
            Some(next) => {
                self.selected = next;
                self.active = next;
            }
            None => {
                self.selected = 0;
                self.active = 0;
            }
        }

        if self.window_count == 0 {
            display.fill_screen(COLOR_WHITE);
            tracing::info!(target: "term.wm", count = 0, "last terminal closed");
            return;
        }

        self.retile(display);
        display.fill_rect(closed.x, closed.y, closed.width, closed.height, COLOR_WHITE);
        if !self.validate_layout(display) {
            tracing::warn!(target: "term.wm", "layout sanity failed after close, full redraw");
            display.fill_screen(COLOR_WHITE);
            self.needs_full_redraw = true;
        }
        tracing::info!(target: "term.wm", count = self.window_count, "terminal closed");
    }

    /// Grid rebuild after close: `min(n, 4)` columns, `ceil(n / 4)` rows.
    fn retile(&mut self, display: &mut dyn Display) {
        let screen_w = display.width();
        let screen_h = display.height();
        let active: Vec<TermId> = self
            .terminals
            .iter()
            .enumerate()
            .filter(|(_, t)| t.active)
            .map(|(i, _)| i)
            .collect();

        if active.len() == 1 {
            let geom = &mut self.terminals[active[0]].geometry;
            geom.x = MARGIN;
            geom.y = MARGIN;
            geom.width = screen_w - MARGIN * 2;
            geom.height = screen_h - MARGIN * 2;
            geom.split = SplitDir::None;
            return;
        }

        let cols = active.len().min(MAX_HORIZONTAL_TERMINALS);
        let rows = active.len().div_ceil(cols);
        let cell_w =
            (screen_w - MARGIN * 2 - BORDER * (cols as i32 - 1)) / cols as i32;
        let cell_h =
            (screen_h - MARGIN * 2 - BORDER * (rows as i32 - 1)) / rows as i32;
        let cell_w = cell_w.max(MIN_CELL);
        let cell_h = cell_h.max(MIN_CELL);

        for (n, &id) in active.iter().enumerate() {
            let col = (n % cols) as i32;
            let row = (n / cols) as i32;
            let geom = &mut self.terminals[id].geometry;
            geom.x = MARGIN + col * (cell_w + BORDER);
            geom.y = MARGIN + row * (cell_h + BORDER);
            geom.width = cell_w;
            geom.height = cell_h;
            geom.split = if cols > 1 {
                SplitDir::Vertical
            } else {
                SplitDir::Horizontal
            };
        }
    }

    /// Bounds, minimum size, and coverage sanity for the current layout.
    fn validate_layout(&self, display: &dyn Display) -> bool {
        let screen_w = display.width();
        let screen_h = display.height();
        let mut total_area: i64 = 0;
        for t in self.terminals.iter().filter(|t| t.active) {
            let g = t.geometry;
            if g.x < 0 || g.y < 0 || g.x + g.width > screen_w || g.y + g.height > screen_h {
                tracing::debug!(target: "term.wm", "window out of bounds");
                return false;
            }
            if g.width < MIN_CELL || g.height < MIN_CELL {
                tracing::debug!(target: "term.wm", "window below minimum size");
                return false;
            }
            total_area += g.width as i64 * g.height as i64;
        }
        let usable = (screen_w - MARGIN * 2) as i64 * (screen_h - MARGIN * 2) as i64;
        if usable > 0 && self.window_count > 1 {
            let coverage = total_area * 100 / usable;
            if coverage < 70 {
                tracing::debug!(target: "term.wm", coverage, "low coverage");
                return false;
            }
        }
        true
    }

    // ---- selection by direction ----------------------------------------

    pub fn select_left(&mut self) {
        self.select_direction(-1, 0);
    }

    pub fn select_right(&mut self) {
        self.select_direction(1, 0);
    }

    pub fn select_up(&mut self) {
        self.select_direction(0, -1);
    }

    pub fn select_down(&mut self) {
        self.select_direction(0, 1);
    }

    /// Pick the neighbor with the greatest perpendicular overlap, breaking
    /// ties by smallest gap along the requested axis; candidates with no
    /// overlap compete on corner-to-corner distance.
    fn select_direction(&mut self, dx: i32, dy: i32) {
        if self.window_count == 0 {
            return;
        }
        let cur = self.terminals[self.selected].geometry;
        let (left, right) = (cur.x, cur.x + cur.width);
        let (top, bottom) = (cur.y, cur.y + cur.height);

        let mut best: Option<(TermId, bool, i32, i32)> = None;
        for (i, t) in self.terminals.iter().enumerate() {
            if !t.active || i == self.selected {
                continue;
            }
            let g = t.geometry;
            let (c_left, c_right) = (g.x, g.x + g.width);
            let (c_top, c_bottom) = (g.y, g.y + g.height);

            let (primary, overlap, secondary) = if dx < 0 {
                if c_right > left {
                    continue;
                }
                let overlap = !(c_bottom <= top || c_top >= bottom);
                let secondary = if overlap {
                    0
                } else if c_bottom <= top {
                    top - c_bottom
                } else {
                    c_top - bottom
                };
                (left - c_right, overlap, secondary)
            } else if dx > 0 {
                if c_left < right {
                    continue;
                }
                let overlap = !(c_bottom <= top || c_top >= bottom);
                let secondary = if overlap {
                    0
                } else if c_bottom <= top {
                    top - c_bottom
                } else {
                    c_top - bottom
                };
                (c_left - right, overlap, secondary)
            } else if dy < 0 {
                if c_bottom > top {
                    continue;
                }
                let overlap = !(c_right <= left || c_left >= right);
                let secondary = if overlap {
                    0
                } else if c_right <= left {
                    left - c_right
                } else {
                    c_left - right
                };
                (top - c_bottom, overlap, secondary)
            } else {
                if c_top < bottom {
                    continue;
                }
                let overlap = !(c_right <= left || c_left >= right);
                let secondary = if overlap {
                    0
                } else if c_right <= left {
                    left - c_right
                } else {
                    c_left - right
                };
                (c_top - bottom, overlap, secondary)
            };

            if primary < 0 {
                continue;
            }
            let better = match best {
                None => true,
                Some((_, b_overlap, b_primary, b_secondary)) => {
                    (overlap && !b_overlap)
                        || (overlap == b_overlap && primary < b_primary)
                        || (overlap == b_overlap
                            && primary == b_primary
                            && secondary < b_secondary)
                }
            };
            if better {
                best = Some((i, overlap, primary, secondary));
            }
        }

        if let Some((idx, ..)) = best {
            self.selected = idx;
            self.active = idx;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NullDisplay;
    use core_vfs::MemoryFs;

    fn vfs() -> Vfs {
        let mut fs = MemoryFs::new();
        fs.put_dir("/etc").unwrap();
        fs.put_dir("/home/user").unwrap();
        let mut v = Vfs::new();
        v.mount("/", Box::new(fs)).unwrap();
        v
    }

    fn open_n(wm: &mut WindowManager, vfs: &mut Vfs, d: &mut NullDisplay, n: usize) {
        for _ in 0..n {
            wm.new_terminal(vfs, d, "term", "$ ");
        }
    }

    fn overlap(a: &Geometry, b: &Geometry) -> bool {
        a.x < b.x + b.width && b.x < a.x + a.width && a.y < b.y + b.height && b.y < a.y + a.height
    }

    #[test]
    fn first_terminal_is_fullscreen_minus_margin() {
        let mut wm = WindowManager::new();
        let mut d = NullDisplay::default();
        let mut v = vfs();
        let id = wm.new_terminal(&mut v, &mut d, "term", "$ ").unwrap();
        let g = wm.terminal(id).geometry;
        assert_eq!((g.x, g.y), (5, 5));
        assert_eq!((g.width, g.height), (470, 310));
        assert_eq!(g.split, SplitDir::None);
    }

    #[test]
    fn wide_cell_splits_side_by_side() {
        let mut wm = WindowManager::new();
        let mut d = NullDisplay::default();
        let mut v = vfs();
        let first = wm.new_terminal(&mut v, &mut d, "term", "$ ").unwrap();
        let second = wm.new_terminal(&mut v, &mut d, "term", "$ ").unwrap();
        let a = wm.terminal(first).geometry;
        let b = wm.terminal(second).geometry;
        assert_eq!(a.split, SplitDir::Vertical);
        assert_eq!(b.split, SplitDir::Vertical);
        assert_eq!(a.y, b.y);
        assert!(b.x < a.x, "new terminal takes the left half");
        assert!(!overlap(&a, &b));
    }

    #[test]
    fn windows_never_overlap_and_cover_enough() {
        let mut wm = WindowManager::new();
        let mut d = NullDisplay::default();
        let mut v = vfs();
        for n in 1..=6 {
            open_n(&mut wm, &mut v, &mut d, 1);
            let geoms: Vec<Geometry> =
                wm.iter_active().map(|(_, t)| t.geometry).collect();
            for i in 0..geoms.len() {
                for j in i + 1..geoms.len() {
                    assert!(
                        !overlap(&geoms[i], &geoms[j]),
                        "windows {i} and {j} overlap with {n} open"
                    );
                }
            }
            let area: i64 = geoms
                .iter()
                .map(|g| g.width as i64 * g.height as i64)
                .sum();
            let usable = 470i64 * 310;
            assert!(
                area * 100 / usable >= 70,
                "coverage below 70% with {n} windows"
            );
        }
    }

    #[test]
    fn ninth_terminal_is_refused() {
        let mut wm = WindowManager::new();
        // a panel large enough that eight successive splits all clear the
        // minimum cell size
        let mut d = NullDisplay::new(1024, 900);
        let mut v = vfs();
        open_n(&mut wm, &mut v, &mut d, MAX_WINDOWS);
        assert_eq!(wm.window_count(), MAX_WINDOWS);
        assert!(wm.new_terminal(&mut v, &mut d, "term", "$ ").is_none());
        assert_eq!(wm.window_count(), MAX_WINDOWS);
    }

    #[test]
    fn tiny_display_refuses_split_gracefully() {
        let mut wm = WindowManager::new();
        let mut d = NullDisplay::new(108, 108);
        let mut v = vfs();
        assert!(wm.new_terminal(&mut v, &mut d, "term", "$ ").is_some());
        // halves would be under the minimum in both directions
        assert!(wm.new_terminal(&mut v, &mut d, "term", "$ ").is_none());
        assert_eq!(wm.window_count(), 1);
    }

    #[test]
    fn close_retiles_to_grid() {
        let mut wm = WindowManager::new();
        let mut d = NullDisplay::default();
        let mut v = vfs();
        open_n(&mut wm, &mut v, &mut d, 3);
        wm.close_terminal(&mut v, &mut d);
        assert_eq!(wm.window_count(), 2);
        let geoms: Vec<Geometry> = wm.iter_active().map(|(_, t)| t.geometry).collect();
        assert!(!overlap(&geoms[0], &geoms[1]));
        // both survivors on one row
        assert_eq!(geoms[0].y, geoms[1].y);

        wm.close_terminal(&mut v, &mut d);
        assert_eq!(wm.window_count(), 1);
        let g = wm.iter_active().next().unwrap().1.geometry;
        assert_eq!((g.width, g.height), (470, 310));
    }

    #[test]
    fn closing_releases_cwd_reference() {
        let mut wm = WindowManager::new();
        let mut d = NullDisplay::default();
        let mut v = vfs();
        wm.new_terminal(&mut v, &mut d, "term", "$ ").unwrap();
        assert!(v.live_nodes() > 0);
        wm.close_terminal(&mut v, &mut d);
        assert_eq!(v.live_nodes(), 0);
    }

    #[test]
    fn cwd_starts_at_user_home_when_passwd_names_one() {
        let mut fs = MemoryFs::new();
        fs.put_file("/etc/passwd", b"alice:abcdef12\n").unwrap();
        fs.put_dir("/home/alice").unwrap();
        let mut v = Vfs::new();
        v.mount("/", Box::new(fs)).unwrap();
        let mut wm = WindowManager::new();
        let mut d = NullDisplay::default();
        let id = wm.new_terminal(&mut v, &mut d, "term", "$ ").unwrap();
        let cwd = wm.terminal(id).cwd.unwrap();
        assert_eq!(v.node_path(cwd).unwrap(), "/home/alice");
    }

    #[test]
    fn selection_moves_toward_neighbors() {
        let mut wm = WindowManager::new();
        let mut d = NullDisplay::default();
        let mut v = vfs();
        let a = wm.new_terminal(&mut v, &mut d, "term", "$ ").unwrap();
        let b = wm.new_terminal(&mut v, &mut d, "term", "$ ").unwrap();
        // b sits left of a after the vertical split, and b is selected
        assert_eq!(wm.selected_id(), b);
        wm.select_right();
        assert_eq!(wm.selected_id(), a);
        wm.select_left();
        assert_eq!(wm.selected_id(), b);
        // no neighbor above: selection stays put
        wm.select_up();
        assert_eq!(wm.selected_id(), b);
    }
}
