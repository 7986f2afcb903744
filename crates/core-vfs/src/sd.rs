//! SD card backend.
//!
//! Every primitive acquires the shared peripheral bus through the arbiter
//! for exactly the duration of the card operation; the TFT configuration is
//! restored before returning. Directory cursors keep one open card
//! directory handle for the life of the iteration but never hold the bus
//! across yields — each `dir_next` re-acquires it.
//!
//! This backend is deliberately minimal: stat and the directory operations.
//! File-content operations are not in its capability mask, so the VFS
//! answers `NotPermitted` for them without ever reaching the card. The
//! in-memory backend carries file contents on the hosted build.

use std::cell::RefCell;
use std::rc::Rc;

use core_bus::BusArbiter;

use crate::backend::{Backend, BackendHandle, NodeMeta};
use crate::node::{NodeFlags, NodeType, OpsMask};
use crate::{VfsError, VfsResult};

/// What the card driver reports for an existing entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SdEntryKind {
    File,
    Directory,
}

/// Seam to the SD card library. Raw directory listings may include `.`,
/// `..`, and names carrying a full path prefix; the backend normalizes.
pub trait SdCard {
    fn stat(&mut self, path: &str) -> Option<SdEntryKind>;
    fn mkdir(&mut self, path: &str) -> bool;
    fn create_file(&mut self, path: &str) -> bool;
    fn remove_file(&mut self, path: &str) -> bool;
    fn rmdir(&mut self, path: &str) -> bool;
    fn rename(&mut self, from: &str, to: &str) -> bool;
    fn dir_open(&mut self, path: &str) -> Option<u32>;
    fn dir_next(&mut self, handle: u32) -> Option<String>;
    fn dir_close(&mut self, handle: u32);
}

/// Fixed number of concurrent directory cursors, matching the card
/// library's appetite for open handles.
const MAX_SD_ITERS: usize = 4;

pub struct SdBackend<C: SdCard> {
    bus: Rc<RefCell<BusArbiter>>,
    card: C,
    cursors: [Option<u32>; MAX_SD_ITERS],
}

impl<C: SdCard> SdBackend<C> {
    pub fn new(bus: Rc<RefCell<BusArbiter>>, card: C) -> Self {
        Self {
            bus,
            card,
            cursors: [None; MAX_SD_ITERS],
        }
    }

    /// True iff the card is inserted and the arbiter can reach it.
    pub fn available(&self) -> bool {
        self.bus.borrow().available()
    }

    fn with_bus<R>(&mut self, f: impl FnOnce(&mut C) -> R) -> VfsResult<R> {
        let card = &mut self.card;
        self.bus
            .borrow_mut()
            .with_sd(|_| f(card))
            .map_err(|_| VfsError::Io)
    }

    fn child(dir_path: &str, name: &str) -> String {
        if dir_path == "/" {
            format!("/{name}")
        } else {
            format!("{dir_path}/{name}")
        }
    }

    /// Strip any path prefix the card library leaks into entry names.
    fn leaf_name(raw: &str) -> &str {
        raw.rsplit('/').next().unwrap_or(raw)
    }
}

impl<C: SdCard> Backend for SdBackend<C> {
    fn name(&self) -> &'static str {
        "sd"
    }

    fn ops_for(&self, node_type: NodeType) -> OpsMask {
        match node_type {
            // file contents are not served by this backend
            NodeType::File => OpsMask::empty(),
            NodeType::Directory => {
                OpsMask::DIR_ITER | OpsMask::DIR_CREATE | OpsMask::DIR_REMOVE | OpsMask::DIR_RENAME
            }
            NodeType::Device | NodeType::Proc | NodeType::Invalid => OpsMask::empty(),
        }
    }

    fn stat(&mut self, path: &str) -> VfsResult<Option<NodeMeta>> {
        let path = path.to_string();
        self.with_bus(move |card| {
            card.stat(&path).map(|kind| NodeMeta {
                node_type: match kind {
                    SdEntryKind::File => NodeType::File,
                    SdEntryKind::Directory => NodeType::Directory,
                },
                flags: NodeFlags::empty(),
            })
        })
    }

    fn dir_open(&mut self, path: &str) -> VfsResult<BackendHandle> {
        let slot = self
            .cursors
            .iter()
            .position(|c| c.is_none())
            .ok_or(VfsError::TooManyOpen)?;
        let path = path.to_string();
        let raw = self.with_bus(move |card| card.dir_open(&path))?;
        match raw {
            Some(handle) => {
                self.cursors[slot] = Some(handle);
                Ok(slot as BackendHandle)
            }
            None => Err(VfsError::NotFound),
        }
    }

    fn dir_next(&mut self, handle: BackendHandle) -> VfsResult<Option<String>> {
        let raw = self
            .cursors
            .get(handle as usize)
            .copied()
            .flatten()
            .ok_or(VfsError::BadHandle)?;
        loop {
            let entry = self.with_bus(|card| card.dir_next(raw))?;
            match entry {
                None => return Ok(None),
                Some(name) => {
                    let leaf = Self::leaf_name(&name);
                    if leaf.is_empty() || leaf == "." || leaf == ".." {
                        continue;
                    }
                    return Ok(Some(leaf.to_string()));
                }
            }
        }
    }

    fn dir_close(&mut self, handle: BackendHandle) -> VfsResult<()> {
        let slot = self
            .cursors
            .get_mut(handle as usize)
            .ok_or(VfsError::BadHandle)?;
        let raw = slot.take().ok_or(VfsError::BadHandle)?;
        self.with_bus(|card| card.dir_close(raw))
    }

    fn create(&mut self, dir_path: &str, name: &str, node_type: NodeType) -> VfsResult<()> {
        let full = Self::child(dir_path, name);
        crate::path::check_limits(&full)?;
        tracing::debug!(target: "vfs.sd", path = %full, ?node_type, "create");
        self.with_bus(|card| {
            if card.stat(&full).is_some() {
                return Ok(());
            }
            let ok = match node_type {
                NodeType::Directory => card.mkdir(&full),
                NodeType::File => card.create_file(&full),
                _ => return Err(VfsError::Invalid),
            };
            if ok {
                Ok(())
            } else {
                Err(VfsError::Io)
            }
        })?
    }

    fn remove(&mut self, dir_path: &str, name: &str) -> VfsResult<()> {
        if name.is_empty() {
            return Err(VfsError::Invalid);
        }
        let full = Self::child(dir_path, name);
        crate::path::check_limits(&full)?;
        tracing::debug!(target: "vfs.sd", path = %full, "remove");
        self.with_bus(|card| match card.stat(&full) {
            None => Err(VfsError::NotFound),
            Some(SdEntryKind::Directory) => {
                if card.rmdir(&full) {
                    Ok(())
                } else {
                    Err(VfsError::NotPermitted)
                }
            }
            Some(SdEntryKind::File) => {
                if card.remove_file(&full) {
                    Ok(())
                } else {
                    Err(VfsError::NotPermitted)
                }
            }
        })?
    }

    fn rename(
        &mut self,
        old_dir: &str,
        old_name: &str,
        new_dir: &str,
        new_name: &str,
    ) -> VfsResult<()> {
        let from = Self::child(old_dir, old_name);
        let to = Self::child(new_dir, new_name);
        crate::path::check_limits(&to)?;
        self.with_bus(|card| {
            if card.stat(&from).is_none() {
                return Err(VfsError::NotFound);
            }
            if card.rename(&from, &to) {
                Ok(())
            } else {
                Err(VfsError::Io)
            }
        })?
    }
}

/// RAM-backed card image. Stands in for the card library on the hosted
/// build; raw listings deliberately include `.`/`..` and full-path names to
/// exercise the backend's normalization.
#[derive(Default)]
pub struct RamCard {
    dirs: Vec<String>,
    files: Vec<String>,
    open_dirs: Vec<Option<(Vec<String>, usize)>>,
}

impl RamCard {
    pub fn new() -> Self {
        Self {
            dirs: vec!["/".to_string()],
            files: Vec::new(),
            open_dirs: Vec::new(),
        }
    }

    fn children_raw(&self, path: &str) -> Vec<String> {
        let prefix = if path == "/" {
            "/".to_string()
        } else {
            format!("{path}/")
        };
        let mut out = vec![".".to_string(), "..".to_string()];
        for entry in self.dirs.iter().chain(self.files.iter()) {
            if entry == "/" || !entry.starts_with(&prefix) {
                continue;
            }
            let rest = &entry[prefix.len()..];
            if !rest.is_empty() && !rest.contains('/') {
                // full path, as some card libraries return
                out.push(entry.clone());
            }
        }
        out
    }
}

impl SdCard for RamCard {
    fn stat(&mut self, path: &str) -> Option<SdEntryKind> {
        if self.dirs.iter().any(|d| d == path) {
            Some(SdEntryKind::Directory)
        } else if self.files.iter().any(|f| f == path) {
            Some(SdEntryKind::File)
        } else {
            None
        }
    }

    fn mkdir(&mut self, path: &str) -> bool {
        if self.stat(path).is_some() {
            return false;
        }
        self.dirs.push(path.to_string());
        true
    }

    fn create_file(&mut self, path: &str) -> bool {
        if self.stat(path).is_some() {
            return false;
        }
        self.files.push(path.to_string());
        true
    }

    fn remove_file(&mut self, path: &str) -> bool {
        let before = self.files.len();
        self.files.retain(|f| f != path);
        self.files.len() != before
    }

    fn rmdir(&mut self, path: &str) -> bool {
        let prefix = format!("{path}/");
        let occupied = self.dirs.iter().any(|d| d.starts_with(&prefix))
            || self.files.iter().any(|f| f.starts_with(&prefix));
        if occupied {
            return false;
        }
        let before = self.dirs.len();
        self.dirs.retain(|d| d != path);
        self.dirs.len() != before
    }

    fn rename(&mut self, from: &str, to: &str) -> bool {
        if self.stat(to).is_some() {
            return false;
        }
        let from_prefix = format!("{from}/");
        for list in [&mut self.dirs, &mut self.files] {
            for entry in list.iter_mut() {
                if entry == from {
                    *entry = to.to_string();
                } else if entry.starts_with(&from_prefix) {
                    let rest = entry[from_prefix.len()..].to_string();
                    *entry = format!("{to}/{rest}");
                }
            }
        }
        true
    }

    fn dir_open(&mut self, path: &str) -> Option<u32> {
        if self.stat(path) != Some(SdEntryKind::Directory) {
            return None;
        }
        let names = self.children_raw(path);
        self.open_dirs.push(Some((names, 0)));
        Some(self.open_dirs.len() as u32 - 1)
    }

    fn dir_next(&mut self, handle: u32) -> Option<String> {
        let (names, idx) = self.open_dirs.get_mut(handle as usize)?.as_mut()?;
        if *idx >= names.len() {
            return None;
        }
        let name = names[*idx].clone();
        *idx += 1;
        Some(name)
    }

    fn dir_close(&mut self, handle: u32) {
        if let Some(slot) = self.open_dirs.get_mut(handle as usize) {
            *slot = None;
        }
    }
}
