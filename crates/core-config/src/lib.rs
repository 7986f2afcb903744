//! System configuration: `/etc/system.conf`.
//!
//! TOML with a default for every field; unknown fields are ignored so the
//! file can grow without breaking older firmware. The file is read through
//! the VFS like everything else. A missing or malformed file logs a warning
//! and falls back to defaults — configuration problems must never keep the
//! shell from coming up. The `reload` builtin re-reads and re-applies.

use serde::Deserialize;

use core_events::hotkey::HotkeyTable;
use core_events::{KeyCode, Modifiers};
use core_vfs::{OpenFlags, Vfs};

pub const CONFIG_PATH: &str = "/etc/system.conf";

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SchedulerConfig {
    pub quantum_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { quantum_ms: 10 }
    }
}

/// One `[[hotkeys]]` entry: key and modifier names as written in the file.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct HotkeyEntry {
    pub modifiers: Vec<String>,
    pub key: String,
    pub action: String,
}

impl HotkeyEntry {
    /// Translate to a concrete binding; `None` (with a warning) when a key
    /// or modifier name is unknown.
    pub fn to_binding(&self) -> Option<(Modifiers, KeyCode, String)> {
        let code = match KeyCode::from_name(&self.key) {
            Some(c) => c,
            None => {
                tracing::warn!(target: "config", key = %self.key, "unknown key name");
                return None;
            }
        };
        let mut mods = Modifiers::empty();
        for m in &self.modifiers {
            match m.to_ascii_lowercase().as_str() {
                "shift" => mods |= Modifiers::SHIFT,
                "ctrl" | "control" => mods |= Modifiers::CTRL,
                "super" => mods |= Modifiers::SUPER,
                other => {
                    tracing::warn!(target: "config", modifier = other, "unknown modifier name");
                    return None;
                }
            }
        }
        Some((mods, code, self.action.clone()))
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    pub prompt: String,
    pub greeting: String,
    pub history_limit: usize,
    pub scheduler: SchedulerConfig,
    pub hotkeys: Vec<HotkeyEntry>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prompt: "$ ".to_string(),
            greeting: "Slate Terminal v0.1".to_string(),
            history_limit: 16,
            scheduler: SchedulerConfig::default(),
            hotkeys: Vec::new(),
        }
    }
}

impl Config {
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Read the config file through the VFS. Any failure — absent file,
    /// read error, parse error — yields defaults.
    pub fn load(vfs: &mut Vfs) -> Self {
        let Ok(file) = vfs.open_at(None, CONFIG_PATH, OpenFlags::READ) else {
            tracing::info!(target: "config", path = CONFIG_PATH, "no config file, using defaults");
            return Self::default();
        };
        let mut text = Vec::new();
        let mut buf = [0u8; 256];
        loop {
            match vfs.read(file, &mut buf) {
                Ok(0) => break,
                Ok(n) => text.extend_from_slice(&buf[..n]),
                Err(e) => {
                    tracing::warn!(target: "config", error = %e, "config read failed");
                    let _ = vfs.close(file);
                    return Self::default();
                }
            }
        }
        let _ = vfs.close(file);
        match std::str::from_utf8(&text).map_err(|_| ()).and_then(|s| {
            Self::parse(s).map_err(|e| {
                tracing::warn!(target: "config", error = %e, "config parse failed");
            })
        }) {
            Ok(cfg) => cfg,
            Err(()) => Self::default(),
        }
    }

    /// Install hotkeys: the configured entries when present, the stock
    /// bindings otherwise. Replaces the table's contents.
    pub fn apply_hotkeys(&self, table: &mut HotkeyTable) {
        table.reset();
        if self.hotkeys.is_empty() {
            table.register_key(Modifiers::SHIFT, KeyCode::A, "terminal");
            table.register_key(Modifiers::SHIFT, KeyCode::D, "close_terminal");
            table.register_key(Modifiers::SUPER, KeyCode::Left, "select_left");
            table.register_key(Modifiers::SUPER, KeyCode::Right, "select_right");
            table.register_key(Modifiers::SUPER, KeyCode::Up, "select_up");
            table.register_key(Modifiers::SUPER, KeyCode::Down, "select_down");
            return;
        }
        for entry in &self.hotkeys {
            if let Some((mods, code, action)) = entry.to_binding() {
                table.register_key(mods, code, action);
            }
        }
    }
}
