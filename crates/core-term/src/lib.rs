//! Terminal windows: the character grid each shell session renders into,
//! and the tiling window manager that carves the display between up to
//! eight of them.
//!
//! Pixel-level drawing is not done here. The window manager computes
//! geometry in pixel units and talks to the panel only through the
//! [`Display`] seam (fill-screen / fill-rect / dimensions); composing the
//! character grid onto the panel is the front-end's job.

mod terminal;
mod wm;

pub use terminal::{
    FastfetchOverlay, Geometry, SplitDir, TerminalState, MAX_HISTORY, TERMINAL_COLS,
    TERMINAL_ROWS,
};
pub use wm::{TermId, WindowManager, MAX_WINDOWS};

/// RGB565 pixel value, as the panel consumes them.
pub type Rgb565 = u16;

pub const COLOR_WHITE: Rgb565 = 0xFFFF;
pub const COLOR_BLACK: Rgb565 = 0x0000;

/// The drawing primitives the window manager needs from the panel driver.
/// The hosted build implements this over the host terminal; tests use
/// [`NullDisplay`].
pub trait Display {
    fn width(&self) -> i32;
    fn height(&self) -> i32;
    fn fill_screen(&mut self, color: Rgb565);
    fn fill_rect(&mut self, x: i32, y: i32, w: i32, h: i32, color: Rgb565);
}

/// A display that swallows drawing and only reports a size.
pub struct NullDisplay {
    pub width: i32,
    pub height: i32,
}

impl NullDisplay {
    pub fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }
}

impl Default for NullDisplay {
    fn default() -> Self {
        // the usual 3.5" panel, landscape
        Self::new(480, 320)
    }
}

impl Display for NullDisplay {
    fn width(&self) -> i32 {
        self.width
    }

    fn height(&self) -> i32 {
        self.height
    }

    fn fill_screen(&mut self, _color: Rgb565) {}

    fn fill_rect(&mut self, _x: i32, _y: i32, _w: i32, _h: i32, _color: Rgb565) {}
}
