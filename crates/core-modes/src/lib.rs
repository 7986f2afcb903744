//! Modal input interceptors.
//!
//! Login, first-boot setup, password change and the nano editor each own an
//! `active` flag and consume key events before the shell's line editor sees
//! them. The dispatch order is fixed: image view swallows everything, then
//! login, first boot, passwd, nano, and only then the shell.

pub mod auth;

mod firstboot;
mod login;
mod nano;
mod passwd;

pub use firstboot::FirstBootMode;
pub use login::LoginMode;
pub use nano::NanoMode;
pub use passwd::PasswdMode;

/// The interceptor set, in dispatch order.
#[derive(Default)]
pub struct Modes {
    pub login: LoginMode,
    pub firstboot: FirstBootMode,
    pub passwd: PasswdMode,
    pub nano: NanoMode,
}

impl Modes {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when any interceptor will consume the next key event.
    pub fn any_active(&self) -> bool {
        self.login.is_active()
            || self.firstboot.is_active()
            || self.passwd.is_active()
            || self.nano.is_active()
    }
}
