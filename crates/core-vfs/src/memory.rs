//! In-memory backend.
//!
//! The hosted root filesystem: a map from canonical path to entry. Supports
//! the full capability set, which makes it the workhorse for everything the
//! shell does with file contents. Directory cursors snapshot the entry list
//! at creation, so a listing is never corrupted by concurrent removal from
//! the same cooperative turn.

use std::collections::BTreeMap;

use crate::backend::{Backend, BackendHandle, NodeMeta, OpenFlags};
use crate::node::{NodeFlags, NodeType, OpsMask};
use crate::{path, VfsError, VfsResult};

#[derive(Debug, Clone)]
enum MemEntry {
    Directory,
    File(Vec<u8>),
}

struct OpenState {
    path: String,
    writable: bool,
}

pub struct MemoryFs {
    entries: BTreeMap<String, MemEntry>,
    files: Vec<Option<OpenState>>,
    cursors: Vec<Option<(Vec<String>, usize)>>,
}

impl Default for MemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFs {
    pub fn new() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert("/".to_string(), MemEntry::Directory);
        Self {
            entries,
            files: Vec::new(),
            cursors: Vec::new(),
        }
    }

    /// Seed a file with contents, creating parent directories. Fixture
    /// helper for boot-time population and tests.
    pub fn put_file(&mut self, path: &str, contents: &[u8]) -> VfsResult<()> {
        let canon = path::canonicalize(path);
        let (parent, _) = path::split_parent(&canon)?;
        self.ensure_dirs(&parent)?;
        self.entries
            .insert(canon, MemEntry::File(contents.to_vec()));
        Ok(())
    }

    /// Seed a directory, creating parents.
    pub fn put_dir(&mut self, path: &str) -> VfsResult<()> {
        self.ensure_dirs(&path::canonicalize(path))
    }

    fn ensure_dirs(&mut self, canon: &str) -> VfsResult<()> {
        if canon == "/" {
            return Ok(());
        }
        let mut prefix = String::new();
        for comp in canon.split('/').filter(|c| !c.is_empty()) {
            prefix.push('/');
            prefix.push_str(comp);
            match self.entries.get(&prefix) {
                Some(MemEntry::Directory) => {}
                Some(MemEntry::File(_)) => return Err(VfsError::NotDir),
                None => {
                    self.entries.insert(prefix.clone(), MemEntry::Directory);
                }
            }
        }
        Ok(())
    }

    fn full_child(dir_path: &str, name: &str) -> String {
        if dir_path == "/" {
            format!("/{name}")
        } else {
            format!("{dir_path}/{name}")
        }
    }

    fn children_of(&self, dir_path: &str) -> Vec<String> {
        let prefix = if dir_path == "/" {
            "/".to_string()
        } else {
            format!("{dir_path}/")
        };
        self.entries
            .keys()
            .filter(|k| k.as_str() != "/" && k.starts_with(&prefix))
            .filter_map(|k| {
                let rest = &k[prefix.len()..];
                if rest.is_empty() || rest.contains('/') {
                    None
                } else {
                    Some(rest.to_string())
                }
            })
            .collect()
    }

    fn file_state(&self, handle: BackendHandle) -> VfsResult<&OpenState> {
        self.files
            .get(handle as usize)
            .and_then(|s| s.as_ref())
            .ok_or(VfsError::BadHandle)
    }

    fn contents_mut(&mut self, path: &str) -> VfsResult<&mut Vec<u8>> {
        match self.entries.get_mut(path) {
            Some(MemEntry::File(data)) => Ok(data),
            Some(MemEntry::Directory) => Err(VfsError::IsDir),
            None => Err(VfsError::NotFound),
        }
    }
}

impl Backend for MemoryFs {
    fn name(&self) -> &'static str {
        "mem"
    }

    fn ops_for(&self, node_type: NodeType) -> OpsMask {
        match node_type {
            NodeType::File => {
                OpsMask::OPEN
                    | OpsMask::READ
                    | OpsMask::WRITE
                    | OpsMask::SIZE
                    | OpsMask::SEEK
                    | OpsMask::TELL
            }
            NodeType::Directory => {
                OpsMask::DIR_ITER | OpsMask::DIR_CREATE | OpsMask::DIR_REMOVE | OpsMask::DIR_RENAME
            }
            NodeType::Device | NodeType::Proc | NodeType::Invalid => OpsMask::empty(),
        }
    }

    fn stat(&mut self, path: &str) -> VfsResult<Option<NodeMeta>> {
        Ok(self.entries.get(path).map(|e| {
            let node_type = match e {
                MemEntry::Directory => NodeType::Directory,
                MemEntry::File(_) => NodeType::File,
            };
            let name_hidden = path
                .rsplit('/')
                .next()
                .map(|n| n.starts_with('.') && n.len() > 1)
                .unwrap_or(false);
            let flags = if name_hidden {
                NodeFlags::HIDDEN
            } else {
                NodeFlags::empty()
            };
            NodeMeta { node_type, flags }
        }))
    }

    fn open(&mut self, path: &str, flags: OpenFlags) -> VfsResult<BackendHandle> {
        match self.entries.get_mut(path) {
            Some(MemEntry::File(data)) => {
                if flags.contains(OpenFlags::TRUNC) && flags.contains(OpenFlags::WRITE) {
                    data.clear();
                }
            }
            Some(MemEntry::Directory) => return Err(VfsError::IsDir),
            None => return Err(VfsError::NotFound),
        }
        let state = OpenState {
            path: path.to_string(),
            writable: flags.contains(OpenFlags::WRITE) || flags.contains(OpenFlags::APPEND),
        };
        let slot = self.files.iter().position(|s| s.is_none());
        let handle = match slot {
            Some(i) => {
                self.files[i] = Some(state);
                i
            }
            None => {
                self.files.push(Some(state));
                self.files.len() - 1
            }
        };
        Ok(handle as BackendHandle)
    }

    fn close(&mut self, handle: BackendHandle) -> VfsResult<()> {
        let slot = self
            .files
            .get_mut(handle as usize)
            .ok_or(VfsError::BadHandle)?;
        if slot.take().is_none() {
            return Err(VfsError::BadHandle);
        }
        Ok(())
    }

    fn read_at(&mut self, handle: BackendHandle, pos: u64, buf: &mut [u8]) -> VfsResult<usize> {
        let path = self.file_state(handle)?.path.clone();
        let data = self.contents_mut(&path)?;
        let pos = pos as usize;
        if pos >= data.len() {
            return Ok(0);
        }
        let n = buf.len().min(data.len() - pos);
        buf[..n].copy_from_slice(&data[pos..pos + n]);
        Ok(n)
    }

    fn write_at(&mut self, handle: BackendHandle, pos: u64, data: &[u8]) -> VfsResult<usize> {
        let state = self.file_state(handle)?;
        if !state.writable {
            return Err(VfsError::NotPermitted);
        }
        let path = state.path.clone();
        let contents = self.contents_mut(&path)?;
        let pos = pos as usize;
        if pos > contents.len() {
            contents.resize(pos, 0);
        }
        let end = pos + data.len();
        if end > contents.len() {
            contents.resize(end, 0);
        }
        contents[pos..end].copy_from_slice(data);
        Ok(data.len())
    }

    fn size(&mut self, path: &str) -> VfsResult<u64> {
        match self.entries.get(path) {
            Some(MemEntry::File(data)) => Ok(data.len() as u64),
            Some(MemEntry::Directory) => Err(VfsError::IsDir),
            None => Err(VfsError::NotFound),
        }
    }

    fn dir_open(&mut self, path: &str) -> VfsResult<BackendHandle> {
        match self.entries.get(path) {
            Some(MemEntry::Directory) => {}
            Some(MemEntry::File(_)) => return Err(VfsError::NotDir),
            None => return Err(VfsError::NotFound),
        }
        let names = self.children_of(path);
        let slot = self.cursors.iter().position(|s| s.is_none());
        let handle = match slot {
            Some(i) => {
                self.cursors[i] = Some((names, 0));
                i
            }
            None => {
                self.cursors.push(Some((names, 0)));
                self.cursors.len() - 1
            }
        };
        Ok(handle as BackendHandle)
    }

    fn dir_next(&mut self, handle: BackendHandle) -> VfsResult<Option<String>> {
        let cursor = self
            .cursors
            .get_mut(handle as usize)
            .and_then(|s| s.as_mut())
            .ok_or(VfsError::BadHandle)?;
        let (names, idx) = cursor;
        if *idx >= names.len() {
            return Ok(None);
        }
        let name = names[*idx].clone();
        *idx += 1;
        Ok(Some(name))
    }

    fn dir_close(&mut self, handle: BackendHandle) -> VfsResult<()> {
        let slot = self
            .cursors
            .get_mut(handle as usize)
            .ok_or(VfsError::BadHandle)?;
        if slot.take().is_none() {
            return Err(VfsError::BadHandle);
        }
        Ok(())
    }

    fn create(&mut self, dir_path: &str, name: &str, node_type: NodeType) -> VfsResult<()> {
        match self.entries.get(dir_path) {
            Some(MemEntry::Directory) => {}
            Some(MemEntry::File(_)) => return Err(VfsError::NotDir),
            None => return Err(VfsError::NotFound),
        }
        let full = Self::full_child(dir_path, name);
        if self.entries.contains_key(&full) {
            return Ok(());
        }
        let entry = match node_type {
            NodeType::Directory => MemEntry::Directory,
            NodeType::File => MemEntry::File(Vec::new()),
            _ => return Err(VfsError::Invalid),
        };
        self.entries.insert(full, entry);
        Ok(())
    }

    fn remove(&mut self, dir_path: &str, name: &str) -> VfsResult<()> {
        let full = Self::full_child(dir_path, name);
        match self.entries.get(&full) {
            Some(MemEntry::Directory) => {
                if !self.children_of(&full).is_empty() {
                    return Err(VfsError::Busy);
                }
            }
            Some(MemEntry::File(_)) => {}
            None => return Err(VfsError::NotFound),
        }
        self.entries.remove(&full);
        Ok(())
    }

    fn rename(
        &mut self,
        old_dir: &str,
        old_name: &str,
        new_dir: &str,
        new_name: &str,
    ) -> VfsResult<()> {
        let from = Self::full_child(old_dir, old_name);
        let to = Self::full_child(new_dir, new_name);
        if from == to {
            return Ok(());
        }
        if to.starts_with(&format!("{from}/")) {
            return Err(VfsError::Invalid);
        }
        if !self.entries.contains_key(&from) {
            return Err(VfsError::NotFound);
        }
        if self.entries.contains_key(&to) {
            return Err(VfsError::Exists);
        }
        match self.entries.get(new_dir) {
            Some(MemEntry::Directory) => {}
            _ => return Err(VfsError::NotDir),
        }
        // move the entry and, for directories, its whole subtree
        let moved: Vec<(String, MemEntry)> = self
            .entries
            .range(from.clone()..)
            .take_while(|(k, _)| k.as_str() == from || k.starts_with(&format!("{from}/")))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (k, _) in &moved {
            self.entries.remove(k);
        }
        for (k, v) in moved {
            let suffix = &k[from.len()..];
            self.entries.insert(format!("{to}{suffix}"), v);
        }
        Ok(())
    }
}
