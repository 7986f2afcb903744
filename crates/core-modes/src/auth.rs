//! Password storage: the single-line `/etc/passwd` format.
//!
//! `<username>:<8-digit-hex-hash>\n`, where the hash is 32-bit FNV-1a of
//! the password bytes. Not cryptography — an interlock against casual
//! snooping on a single-user gadget.

use core_vfs::{OpenFlags, Vfs};

pub const PASSWD_PATH: &str = "/etc/passwd";

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1a.
pub fn fnv1a(data: &[u8]) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    for &b in data {
        hash ^= b as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswdEntry {
    pub username: String,
    pub hash: u32,
}

impl PasswdEntry {
    pub fn matches(&self, password: &str) -> bool {
        fnv1a(password.as_bytes()) == self.hash
    }
}

/// Read the single entry. `None` when the file is missing, unreadable, or
/// malformed (no colon, empty user, empty hash).
pub fn read_entry(vfs: &mut Vfs) -> Option<PasswdEntry> {
    let file = vfs.open_at(None, PASSWD_PATH, OpenFlags::READ).ok()?;
    let mut buf = [0u8; 128];
    let n = vfs.read(file, &mut buf).unwrap_or(0);
    let _ = vfs.close(file);
    if n == 0 {
        return None;
    }
    let text = std::str::from_utf8(&buf[..n]).ok()?;
    let line = text.lines().next()?;
    let (user, hash_str) = line.split_once(':')?;
    if user.is_empty() || hash_str.is_empty() {
        return None;
    }
    let hash = u32::from_str_radix(hash_str.trim(), 16).ok()?;
    Some(PasswdEntry {
        username: user.to_string(),
        hash,
    })
}

/// Rewrite the file with a fresh entry.
pub fn write_entry(vfs: &mut Vfs, username: &str, password: &str) -> bool {
    let line = format!("{username}:{:08x}\n", fnv1a(password.as_bytes()));
    let Ok(file) = vfs.open_at(
        None,
        PASSWD_PATH,
        OpenFlags::WRITE | OpenFlags::TRUNC | OpenFlags::CREATE,
    ) else {
        return false;
    };
    let ok = matches!(vfs.write(file, line.as_bytes()), Ok(n) if n == line.len());
    let _ = vfs.close(file);
    ok
}

/// True when the passwd file exists and holds more than whitespace.
pub fn has_configured_user(vfs: &mut Vfs) -> bool {
    let Ok(file) = vfs.open_at(None, PASSWD_PATH, OpenFlags::READ) else {
        return false;
    };
    let mut found = false;
    let mut buf = [0u8; 128];
    while let Ok(n) = vfs.read(file, &mut buf) {
        if n == 0 {
            break;
        }
        if buf[..n].iter().any(|b| !b.is_ascii_whitespace()) {
            found = true;
            break;
        }
    }
    let _ = vfs.close(file);
    found
}
