//! Virtual filesystem layer.
//!
//! All filesystem access in the system flows through [`Vfs`]; no subsystem
//! talks to a backend or the SD card directly. Resolution returns a node
//! carrying an immutable type and capability mask — callers check
//! capabilities once at resolve time and never again. Node identity is the
//! canonical absolute path; while a node is cached, resolving the same path
//! yields the same [`NodeId`].
//!
//! Reference discipline: every function handing out a `NodeId` has
//! incremented its refcount, and the caller owes exactly one
//! [`release`](Vfs::release). The `_node` variants operate on a caller-owned
//! node without consuming it. Open files and directory iterators pin their
//! node: releasing a pinned node drops the refcount but the slot survives
//! until the handles close.

mod backend;
mod error;
mod memory;
mod node;
mod sd;

pub mod path;

pub use backend::{Backend, BackendHandle, NodeMeta, OpenFlags};
pub use error::{VfsError, VfsResult};
pub use memory::MemoryFs;
pub use node::{NodeFlags, NodeId, NodeType, OpsMask, NODE_CACHE_SLOTS};
pub use sd::{RamCard, SdBackend, SdCard, SdEntryKind};

use node::NodeCache;

/// Concurrent open-file bound.
pub const MAX_OPEN_FILES: usize = 16;
/// Concurrent directory-iterator bound.
pub const MAX_DIR_ITERS: usize = 8;

/// Handle to an open file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileId(usize);

/// Handle to a live directory iterator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DirIterId(usize);

struct Mount {
    point: String,
    backend: Box<dyn Backend>,
}

struct OpenFile {
    node: NodeId,
    mount: usize,
    handle: BackendHandle,
    pos: u64,
}

struct DirIterState {
    node: NodeId,
    mount: usize,
    handle: BackendHandle,
}

pub struct Vfs {
    mounts: Vec<Option<Mount>>,
    cache: NodeCache,
    files: Vec<Option<OpenFile>>,
    iters: Vec<Option<DirIterState>>,
}

impl Default for Vfs {
    fn default() -> Self {
        Self::new()
    }
}

impl Vfs {
    pub fn new() -> Self {
        Self {
            mounts: Vec::new(),
            cache: NodeCache::new(),
            files: (0..MAX_OPEN_FILES).map(|_| None).collect(),
            iters: (0..MAX_DIR_ITERS).map(|_| None).collect(),
        }
    }

    // ---- mount table ---------------------------------------------------

    /// Mount a backend at `mount_point`. The root mount (`/`) must come
    /// first; any other mount point must already resolve to a directory.
    pub fn mount(&mut self, mount_point: &str, backend: Box<dyn Backend>) -> VfsResult<()> {
        let point = path::canonicalize(mount_point);
        if self
            .mounts
            .iter()
            .flatten()
            .any(|m| m.point == point)
        {
            return Err(VfsError::Exists);
        }
        if point != "/" {
            let node = self.resolve(&point).ok_or(VfsError::NotFound)?;
            let is_dir = self.node_type(node)? == NodeType::Directory;
            self.release(node);
            if !is_dir {
                return Err(VfsError::NotDir);
            }
        }
        tracing::info!(target: "vfs", mount_point = %point, backend = backend.name(), "mounted");
        match self.mounts.iter().position(|m| m.is_none()) {
            Some(i) => self.mounts[i] = Some(Mount { point, backend }),
            None => self.mounts.push(Some(Mount { point, backend })),
        }
        Ok(())
    }

    /// Unmount. Refuses while any node of the mount is referenced, pinned,
    /// open, or being iterated.
    pub fn umount(&mut self, mount_point: &str) -> VfsResult<()> {
        let point = path::canonicalize(mount_point);
        let idx = self
            .mounts
            .iter()
            .position(|m| m.as_ref().map(|m| m.point.as_str()) == Some(point.as_str()))
            .ok_or(VfsError::NotFound)?;
        let in_use = self.files.iter().flatten().any(|f| f.mount == idx)
            || self.iters.iter().flatten().any(|i| i.mount == idx)
            || self.cache.any_live_for_mount(idx);
        if in_use {
            return Err(VfsError::Busy);
        }
        self.mounts[idx] = None;
        tracing::info!(target: "vfs", mount_point = %point, "unmounted");
        Ok(())
    }

    /// Longest-prefix mount match for a canonical path.
    fn mount_for(&self, canon: &str) -> Option<usize> {
        let mut best: Option<(usize, usize)> = None;
        for (i, mount) in self.mounts.iter().enumerate() {
            let Some(m) = mount else { continue };
            let matches = m.point == "/"
                || canon == m.point
                || canon.starts_with(&format!("{}/", m.point));
            if matches {
                let len = m.point.len();
                if best.map(|(_, l)| len > l).unwrap_or(true) {
                    best = Some((i, len));
                }
            }
        }
        best.map(|(i, _)| i)
    }

    fn rel_path(&self, mount: usize, canon: &str) -> String {
        let point = self.mounts[mount].as_ref().map(|m| m.point.as_str()).unwrap_or("/");
        if point == "/" {
            canon.to_string()
        } else {
            let rest = &canon[point.len()..];
            if rest.is_empty() {
                "/".to_string()
            } else {
                rest.to_string()
            }
        }
    }

    fn backend_mut(&mut self, mount: usize) -> VfsResult<&mut (dyn Backend + '_)> {
        match self.mounts.get_mut(mount).and_then(|m| m.as_mut()) {
            Some(m) => Ok(m.backend.as_mut()),
            None => Err(VfsError::NoDevice),
        }
    }

    // ---- resolution ----------------------------------------------------

    /// Resolve an absolute path. `None` is the system's sole indicator that
    /// the path does not exist. On success the node's refcount has been
    /// incremented for the caller.
    pub fn resolve(&mut self, p: &str) -> Option<NodeId> {
        let canon = path::canonicalize(p);
        if path::check_limits(&canon).is_err() {
            return None;
        }
        if let Some(hit) = self.cache.lookup(&canon) {
            return Some(hit);
        }
        let mount = self.mount_for(&canon)?;
        let rel = self.rel_path(mount, &canon);
        let meta = match self.backend_mut(mount).ok()?.stat(&rel) {
            Ok(Some(meta)) => meta,
            Ok(None) => return None,
            Err(e) => {
                tracing::debug!(target: "vfs", path = %canon, error = %e, "stat failed");
                return None;
            }
        };
        let ops = self.mounts[mount].as_ref()?.backend.ops_for(meta.node_type);
        match self
            .cache
            .insert(canon.clone(), mount, meta.node_type, meta.flags, ops)
        {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!(target: "vfs", path = %canon, error = %e, "node cache full");
                None
            }
        }
    }

    /// Resolve relative to `base`, honoring `.` and `..`; absolute paths
    /// bypass the base. `..` at root stays at root.
    pub fn resolve_at(&mut self, base: Option<NodeId>, p: &str) -> Option<NodeId> {
        if p.starts_with('/') || base.is_none() {
            return self.resolve(p);
        }
        let base_path = self.cache.get(base?).ok()?.path.clone();
        let full = path::join(&base_path, p);
        self.resolve(&full)
    }

    /// Atomically decompose a path into `(parent node, entry name)` so
    /// create/remove callers do not race between the lookup and the entry
    /// operation. The parent comes back referenced; the root path is
    /// rejected with `Invalid`.
    pub fn resolve_parent(
        &mut self,
        base: Option<NodeId>,
        p: &str,
    ) -> VfsResult<(NodeId, String)> {
        let full = match (p.starts_with('/'), base) {
            (false, Some(b)) => {
                let base_path = self.cache.get(b)?.path.clone();
                path::join(&base_path, p)
            }
            _ => path::canonicalize(p),
        };
        let (parent, name) = path::split_parent(&full)?;
        if name == "." || name == ".." {
            return Err(VfsError::Invalid);
        }
        let parent_id = self.resolve(&parent).ok_or(VfsError::NotFound)?;
        if self.node_type(parent_id)? != NodeType::Directory {
            self.release(parent_id);
            return Err(VfsError::NotDir);
        }
        Ok((parent_id, name))
    }

    /// Take an additional reference on a caller-owned node.
    pub fn retain(&mut self, node: NodeId) -> VfsResult<()> {
        self.cache.retain(node)
    }

    /// Drop one reference. Must be called exactly once per reference
    /// handed out.
    pub fn release(&mut self, node: NodeId) {
        self.cache.release(node);
    }

    // ---- node accessors ------------------------------------------------

    pub fn node_type(&self, node: NodeId) -> VfsResult<NodeType> {
        Ok(self.cache.get(node)?.node_type)
    }

    pub fn node_flags(&self, node: NodeId) -> VfsResult<NodeFlags> {
        Ok(self.cache.get(node)?.flags)
    }

    pub fn node_ops(&self, node: NodeId) -> VfsResult<OpsMask> {
        Ok(self.cache.get(node)?.ops)
    }

    /// Canonical absolute path of a live node.
    pub fn node_path(&self, node: NodeId) -> VfsResult<&str> {
        Ok(self.cache.get(node)?.path.as_str())
    }

    /// Refcount of a cached path, `None` on cache miss. Test hook backing
    /// the refcount-balance invariants.
    pub fn refcount_of(&self, p: &str) -> Option<u32> {
        self.cache.refcount_of(&path::canonicalize(p))
    }

    /// Number of live cache slots. Test hook.
    pub fn live_nodes(&self) -> usize {
        self.cache.live_slots()
    }

    // ---- files ---------------------------------------------------------

    /// Open by path relative to `base`. With `CREATE`, a missing final
    /// entry is created through the parent directory first.
    pub fn open_at(
        &mut self,
        base: Option<NodeId>,
        p: &str,
        flags: OpenFlags,
    ) -> VfsResult<FileId> {
        let node = match self.resolve_at(base, p) {
            Some(n) => n,
            None if flags.contains(OpenFlags::CREATE) => {
                let (parent, name) = self.resolve_parent(base, p)?;
                let created = self.dir_create_node(parent, &name, NodeType::File);
                self.release(parent);
                created?
            }
            None => return Err(VfsError::NotFound),
        };
        let out = self.open_node(node, flags);
        self.release(node);
        out
    }

    /// Open an already-resolved node. The caller keeps its reference; the
    /// handle pins the node independently.
    pub fn open_node(&mut self, node: NodeId, flags: OpenFlags) -> VfsResult<FileId> {
        let slot = self.cache.get(node)?;
        let (node_type, ops, node_flags, mount, full) = (
            slot.node_type,
            slot.ops,
            slot.flags,
            slot.mount,
            slot.path.clone(),
        );
        match node_type {
            NodeType::File | NodeType::Device | NodeType::Proc => {}
            NodeType::Directory => return Err(VfsError::IsDir),
            NodeType::Invalid => return Err(VfsError::Invalid),
        }
        if !ops.contains(OpsMask::OPEN) {
            return Err(VfsError::NotPermitted);
        }
        if node_flags.contains(NodeFlags::READONLY)
            && flags.intersects(OpenFlags::WRITE | OpenFlags::APPEND | OpenFlags::TRUNC)
        {
            return Err(VfsError::ReadOnly);
        }
        let free = self
            .files
            .iter()
            .position(|f| f.is_none())
            .ok_or(VfsError::TooManyOpen)?;
        let rel = self.rel_path(mount, &full);
        let handle = self.backend_mut(mount)?.open(&rel, flags)?;
        let pos = if flags.contains(OpenFlags::APPEND) {
            self.backend_mut(mount)?.size(&rel).unwrap_or(0)
        } else {
            0
        };
        self.cache.pin(node)?;
        self.files[free] = Some(OpenFile {
            node,
            mount,
            handle,
            pos,
        });
        Ok(FileId(free))
    }

    fn file_mut(&mut self, file: FileId) -> VfsResult<&mut OpenFile> {
        self.files
            .get_mut(file.0)
            .and_then(|f| f.as_mut())
            .ok_or(VfsError::BadHandle)
    }

    pub fn read(&mut self, file: FileId, buf: &mut [u8]) -> VfsResult<usize> {
        let (node, mount, handle, pos) = {
            let f = self.file_mut(file)?;
            (f.node, f.mount, f.handle, f.pos)
        };
        if !self.cache.get(node)?.ops.contains(OpsMask::READ) {
            return Err(VfsError::NotPermitted);
        }
        let n = self.backend_mut(mount)?.read_at(handle, pos, buf)?;
        self.file_mut(file)?.pos += n as u64;
        Ok(n)
    }

    pub fn write(&mut self, file: FileId, data: &[u8]) -> VfsResult<usize> {
        let (node, mount, handle, pos) = {
            let f = self.file_mut(file)?;
            (f.node, f.mount, f.handle, f.pos)
        };
        if !self.cache.get(node)?.ops.contains(OpsMask::WRITE) {
            return Err(VfsError::NotPermitted);
        }
        let n = self.backend_mut(mount)?.write_at(handle, pos, data)?;
        self.file_mut(file)?.pos += n as u64;
        Ok(n)
    }

    /// Absolute seek. Rejected for nodes whose backend does not advertise
    /// seeking.
    pub fn seek(&mut self, file: FileId, pos: u64) -> VfsResult<()> {
        let node = self.file_mut(file)?.node;
        if !self.cache.get(node)?.ops.contains(OpsMask::SEEK) {
            return Err(VfsError::IllegalSeek);
        }
        self.file_mut(file)?.pos = pos;
        Ok(())
    }

    pub fn tell(&mut self, file: FileId) -> VfsResult<u64> {
        Ok(self.file_mut(file)?.pos)
    }

    pub fn size_node(&mut self, node: NodeId) -> VfsResult<u64> {
        let slot = self.cache.get(node)?;
        let (ops, mount, full) = (slot.ops, slot.mount, slot.path.clone());
        if !ops.contains(OpsMask::SIZE) {
            return Err(VfsError::NotPermitted);
        }
        let rel = self.rel_path(mount, &full);
        self.backend_mut(mount)?.size(&rel)
    }

    pub fn size(&mut self, p: &str) -> VfsResult<u64> {
        let node = self.resolve(p).ok_or(VfsError::NotFound)?;
        let out = self.size_node(node);
        self.release(node);
        out
    }

    pub fn close(&mut self, file: FileId) -> VfsResult<()> {
        let OpenFile {
            node,
            mount,
            handle,
            ..
        } = self
            .files
            .get_mut(file.0)
            .and_then(|f| f.take())
            .ok_or(VfsError::BadHandle)?;
        let out = self.backend_mut(mount)?.close(handle);
        self.cache.unpin(node);
        out
    }

    // ---- directory iteration -------------------------------------------

    /// Begin iterating a directory node. The caller keeps its node
    /// reference; the iterator pins the node until destroyed.
    pub fn dir_iter_create(&mut self, dir: NodeId) -> VfsResult<DirIterId> {
        let slot = self.cache.get(dir)?;
        let (node_type, ops, mount, full) =
            (slot.node_type, slot.ops, slot.mount, slot.path.clone());
        if node_type != NodeType::Directory {
            return Err(VfsError::NotDir);
        }
        if !ops.contains(OpsMask::DIR_ITER) {
            return Err(VfsError::NotPermitted);
        }
        let free = self
            .iters
            .iter()
            .position(|i| i.is_none())
            .ok_or(VfsError::TooManyOpen)?;
        let rel = self.rel_path(mount, &full);
        let handle = self.backend_mut(mount)?.dir_open(&rel)?;
        self.cache.pin(dir)?;
        self.iters[free] = Some(DirIterState {
            node: dir,
            mount,
            handle,
        });
        Ok(DirIterId(free))
    }

    /// Next entry name; `Ok(None)` at end. `.` and `..` never appear.
    pub fn dir_iter_next(&mut self, iter: DirIterId) -> VfsResult<Option<String>> {
        let (mount, handle) = {
            let it = self
                .iters
                .get(iter.0)
                .and_then(|i| i.as_ref())
                .ok_or(VfsError::BadHandle)?;
            (it.mount, it.handle)
        };
        self.backend_mut(mount)?.dir_next(handle)
    }

    pub fn dir_iter_destroy(&mut self, iter: DirIterId) {
        let Some(DirIterState {
            node,
            mount,
            handle,
        }) = self.iters.get_mut(iter.0).and_then(|i| i.take())
        else {
            return;
        };
        if let Ok(backend) = self.backend_mut(mount) {
            let _ = backend.dir_close(handle);
        }
        self.cache.unpin(node);
    }

    // ---- directory modification ----------------------------------------

    /// Create `name` of `node_type` inside `dir`. Returns the new node,
    /// referenced for the caller. Creating an existing entry resolves it.
    pub fn dir_create_node(
        &mut self,
        dir: NodeId,
        name: &str,
        node_type: NodeType,
    ) -> VfsResult<NodeId> {
        self.check_entry_name(name)?;
        let slot = self.cache.get(dir)?;
        let (dtype, ops, mount, full) = (slot.node_type, slot.ops, slot.mount, slot.path.clone());
        if dtype != NodeType::Directory {
            return Err(VfsError::NotDir);
        }
        if !ops.contains(OpsMask::DIR_CREATE) {
            return Err(VfsError::NotPermitted);
        }
        let rel = self.rel_path(mount, &full);
        self.backend_mut(mount)?.create(&rel, name, node_type)?;
        let child = path::join(&full, name);
        self.resolve(&child).ok_or(VfsError::Io)
    }

    /// Remove `name` from `dir`. The cache entry for the removed path is
    /// dropped if nothing holds it.
    pub fn dir_remove_node(&mut self, dir: NodeId, name: &str) -> VfsResult<()> {
        self.check_entry_name(name)?;
        let slot = self.cache.get(dir)?;
        let (dtype, ops, mount, full) = (slot.node_type, slot.ops, slot.mount, slot.path.clone());
        if dtype != NodeType::Directory {
            return Err(VfsError::NotDir);
        }
        if !ops.contains(OpsMask::DIR_REMOVE) {
            return Err(VfsError::NotPermitted);
        }
        let rel = self.rel_path(mount, &full);
        self.backend_mut(mount)?.remove(&rel, name)?;
        let child = path::join(&full, name);
        self.cache.evict_if_unused(&child);
        Ok(())
    }

    /// Rename `old_name` in `old_dir` to `new_name` in `new_dir`. Renames
    /// across mount points are rejected with `Invalid`.
    pub fn dir_rename_node(
        &mut self,
        old_dir: NodeId,
        old_name: &str,
        new_dir: NodeId,
        new_name: &str,
    ) -> VfsResult<()> {
        self.check_entry_name(old_name)?;
        self.check_entry_name(new_name)?;
        let (old_type, old_ops, old_mount, old_full) = {
            let s = self.cache.get(old_dir)?;
            (s.node_type, s.ops, s.mount, s.path.clone())
        };
        let (new_type, new_mount, new_full) = {
            let s = self.cache.get(new_dir)?;
            (s.node_type, s.mount, s.path.clone())
        };
        if old_type != NodeType::Directory || new_type != NodeType::Directory {
            return Err(VfsError::NotDir);
        }
        if old_mount != new_mount {
            return Err(VfsError::Invalid);
        }
        if !old_ops.contains(OpsMask::DIR_RENAME) {
            return Err(VfsError::NotPermitted);
        }
        let old_rel = self.rel_path(old_mount, &old_full);
        let new_rel = self.rel_path(new_mount, &new_full);
        self.backend_mut(old_mount)?
            .rename(&old_rel, old_name, &new_rel, new_name)?;
        let old_child = path::join(&old_full, old_name);
        let new_child = path::join(&new_full, new_name);
        self.cache.rename_prefix(&old_child, &new_child);
        Ok(())
    }

    fn check_entry_name(&self, name: &str) -> VfsResult<()> {
        if name.is_empty() || name == "." || name == ".." || name.contains('/') {
            return Err(VfsError::Invalid);
        }
        if name.len() >= path::MAX_NAME {
            return Err(VfsError::NameTooLong);
        }
        Ok(())
    }
}

impl NodeCache {
    fn any_live_for_mount(&self, mount: usize) -> bool {
        (0..NODE_CACHE_SLOTS).any(|i| {
            self.get(NodeId(i))
                .map(|s| s.mount == mount && (s.refcount > 0 || s.pins > 0))
                .unwrap_or(false)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn vfs_with_tree() -> Vfs {
        let mut fs = MemoryFs::new();
        fs.put_dir("/etc").unwrap();
        fs.put_file("/etc/passwd", b"alice:abcdef12\n").unwrap();
        fs.put_dir("/home/user/docs").unwrap();
        fs.put_file("/home/user/docs/a.txt", b"hello\n").unwrap();
        fs.put_dir("/tmp").unwrap();
        let mut vfs = Vfs::new();
        vfs.mount("/", Box::new(fs)).unwrap();
        vfs
    }

    #[test]
    fn resolve_increments_and_release_balances() {
        let mut vfs = vfs_with_tree();
        let a = vfs.resolve("/etc/passwd").unwrap();
        assert_eq!(vfs.refcount_of("/etc/passwd"), Some(1));
        let b = vfs.resolve("/etc/passwd").unwrap();
        assert_eq!(a, b, "same canonical path, same node identity");
        assert_eq!(vfs.refcount_of("/etc/passwd"), Some(2));
        vfs.release(b);
        vfs.release(a);
        assert_eq!(vfs.refcount_of("/etc/passwd"), None, "slot freed at zero");
    }

    #[test]
    fn node_type_and_ops_are_fixed_at_resolution() {
        let mut vfs = vfs_with_tree();
        let n = vfs.resolve("/etc").unwrap();
        let t1 = vfs.node_type(n).unwrap();
        let o1 = vfs.node_ops(n).unwrap();
        // interleave unrelated activity
        let f = vfs.resolve("/etc/passwd").unwrap();
        vfs.release(f);
        assert_eq!(vfs.node_type(n).unwrap(), t1);
        assert_eq!(vfs.node_ops(n).unwrap(), o1);
        vfs.release(n);
    }

    #[test]
    fn resolve_at_handles_dot_dot_and_absolute_bypass() {
        let mut vfs = vfs_with_tree();
        let docs = vfs.resolve("/home/user/docs").unwrap();
        let up = vfs.resolve_at(Some(docs), "..").unwrap();
        assert_eq!(vfs.node_path(up).unwrap(), "/home/user");
        let abs = vfs.resolve_at(Some(docs), "/etc").unwrap();
        assert_eq!(vfs.node_path(abs).unwrap(), "/etc");
        let root = vfs.resolve("/").unwrap();
        let still_root = vfs.resolve_at(Some(root), "..").unwrap();
        assert_eq!(vfs.node_path(still_root).unwrap(), "/");
        for n in [docs, up, abs, root, still_root] {
            vfs.release(n);
        }
        assert_eq!(vfs.live_nodes(), 0);
    }

    #[test]
    fn resolve_parent_decomposes_and_references_parent() {
        let mut vfs = vfs_with_tree();
        let (parent, name) = vfs.resolve_parent(None, "/home/user/docs/a.txt").unwrap();
        assert_eq!(vfs.node_path(parent).unwrap(), "/home/user/docs");
        assert_eq!(name, "a.txt");
        assert_eq!(vfs.refcount_of("/home/user/docs"), Some(1));
        vfs.release(parent);
        assert_eq!(
            vfs.resolve_parent(None, "/").unwrap_err(),
            VfsError::Invalid
        );
    }

    #[test]
    fn open_read_write_round_trip() {
        let mut vfs = vfs_with_tree();
        let f = vfs
            .open_at(None, "/tmp/x", OpenFlags::WRITE | OpenFlags::CREATE)
            .unwrap();
        assert_eq!(vfs.write(f, b"hi\n").unwrap(), 3);
        vfs.close(f).unwrap();

        let f = vfs.open_at(None, "/tmp/x", OpenFlags::READ).unwrap();
        let mut buf = [0u8; 8];
        let n = vfs.read(f, &mut buf).unwrap();
        assert_eq!(&buf[..n], b"hi\n");
        assert_eq!(vfs.read(f, &mut buf).unwrap(), 0, "eof");
        assert_eq!(vfs.tell(f).unwrap(), 3);
        vfs.close(f).unwrap();
        assert_eq!(vfs.live_nodes(), 0, "handles release their pins");
    }

    #[test]
    fn append_positions_at_end_and_trunc_clears() {
        let mut vfs = vfs_with_tree();
        let f = vfs
            .open_at(None, "/tmp/log", OpenFlags::WRITE | OpenFlags::CREATE)
            .unwrap();
        vfs.write(f, b"one\n").unwrap();
        vfs.close(f).unwrap();

        let f = vfs
            .open_at(None, "/tmp/log", OpenFlags::WRITE | OpenFlags::APPEND)
            .unwrap();
        vfs.write(f, b"two\n").unwrap();
        vfs.close(f).unwrap();
        assert_eq!(vfs.size("/tmp/log").unwrap(), 8);

        let f = vfs
            .open_at(None, "/tmp/log", OpenFlags::WRITE | OpenFlags::TRUNC)
            .unwrap();
        vfs.close(f).unwrap();
        assert_eq!(vfs.size("/tmp/log").unwrap(), 0);
    }

    #[test]
    fn opening_a_directory_is_isdir() {
        let mut vfs = vfs_with_tree();
        assert_eq!(
            vfs.open_at(None, "/etc", OpenFlags::READ).unwrap_err(),
            VfsError::IsDir
        );
    }

    #[test]
    fn pinned_node_survives_release_until_close() {
        let mut vfs = vfs_with_tree();
        let n = vfs.resolve("/etc/passwd").unwrap();
        let f = vfs.open_node(n, OpenFlags::READ).unwrap();
        vfs.release(n);
        // refcount hit zero but the open handle keeps the slot alive
        assert_eq!(vfs.refcount_of("/etc/passwd"), Some(0));
        let again = vfs.resolve("/etc/passwd").unwrap();
        assert_eq!(again, n, "identity preserved while pinned");
        vfs.release(again);
        vfs.close(f).unwrap();
        assert_eq!(vfs.refcount_of("/etc/passwd"), None);
    }

    #[test]
    fn dir_iteration_lists_children() {
        let mut vfs = vfs_with_tree();
        let root = vfs.resolve("/").unwrap();
        let it = vfs.dir_iter_create(root).unwrap();
        let mut names = Vec::new();
        while let Some(name) = vfs.dir_iter_next(it).unwrap() {
            names.push(name);
        }
        vfs.dir_iter_destroy(it);
        vfs.release(root);
        names.sort();
        assert_eq!(names, vec!["etc", "home", "tmp"]);
        assert_eq!(vfs.live_nodes(), 0);
    }

    #[test]
    fn mkdir_rmdir_round_trip_returns_cache_to_no_hit() {
        let mut vfs = vfs_with_tree();
        let root = vfs.resolve("/").unwrap();
        let x = vfs.dir_create_node(root, "x", NodeType::Directory).unwrap();
        assert_eq!(vfs.node_type(x).unwrap(), NodeType::Directory);
        vfs.release(x);
        vfs.dir_remove_node(root, "x").unwrap();
        vfs.release(root);
        assert_eq!(vfs.refcount_of("/x"), None, "no-hit after round trip");
        assert!(vfs.resolve("/x").is_none());
    }

    #[test]
    fn rename_updates_cached_identities() {
        let mut vfs = vfs_with_tree();
        let home = vfs.resolve("/home").unwrap();
        let user = vfs.resolve("/home/user").unwrap();
        vfs.dir_rename_node(home, "user", home, "alice").unwrap();
        assert_eq!(vfs.node_path(user).unwrap(), "/home/alice");
        assert!(vfs.resolve("/home/user").is_none());
        let docs = vfs.resolve("/home/alice/docs").unwrap();
        vfs.release(docs);
        vfs.release(user);
        vfs.release(home);
    }

    #[test]
    fn sd_backend_file_content_ops_are_not_permitted() {
        use core_bus::{BusArbiter, LoopbackPort};
        use std::cell::RefCell;
        use std::rc::Rc;

        let bus = Rc::new(RefCell::new(
            BusArbiter::new(Box::new(LoopbackPort::with_card())).unwrap(),
        ));
        let mut card = RamCard::new();
        card.mkdir("/data");
        card.create_file("/data/raw.bin");
        let mut vfs = Vfs::new();
        vfs.mount("/", Box::new(SdBackend::new(bus, card))).unwrap();

        let n = vfs.resolve("/data/raw.bin").unwrap();
        assert_eq!(vfs.node_type(n).unwrap(), NodeType::File);
        assert_eq!(
            vfs.open_node(n, OpenFlags::READ).unwrap_err(),
            VfsError::NotPermitted
        );
        assert_eq!(vfs.size_node(n).unwrap_err(), VfsError::NotPermitted);
        vfs.release(n);

        let dir = vfs.resolve("/data").unwrap();
        let it = vfs.dir_iter_create(dir).unwrap();
        assert_eq!(vfs.dir_iter_next(it).unwrap().as_deref(), Some("raw.bin"));
        vfs.dir_iter_destroy(it);
        vfs.release(dir);
    }

    #[test]
    fn mount_point_must_resolve_and_duplicates_are_rejected() {
        let mut vfs = vfs_with_tree();
        assert_eq!(
            vfs.mount("/", Box::new(MemoryFs::new())).unwrap_err(),
            VfsError::Exists
        );
        assert_eq!(
            vfs.mount("/nonexistent", Box::new(MemoryFs::new()))
                .unwrap_err(),
            VfsError::NotFound
        );
        vfs.mount("/tmp", Box::new(MemoryFs::new())).unwrap();
        let n = vfs.resolve("/tmp").unwrap();
        vfs.release(n);
    }

    #[test]
    fn umount_refuses_while_nodes_are_held() {
        let mut vfs = vfs_with_tree();
        vfs.mount("/tmp", Box::new(MemoryFs::new())).unwrap();
        let held = vfs.resolve("/tmp/").unwrap();
        assert_eq!(vfs.umount("/tmp").unwrap_err(), VfsError::Busy);
        vfs.release(held);
        vfs.umount("/tmp").unwrap();
        assert_eq!(vfs.umount("/tmp").unwrap_err(), VfsError::NotFound);
    }

    #[test]
    fn open_file_table_is_bounded() {
        let mut vfs = vfs_with_tree();
        let mut handles = Vec::new();
        for _ in 0..MAX_OPEN_FILES {
            handles.push(vfs.open_at(None, "/etc/passwd", OpenFlags::READ).unwrap());
        }
        assert_eq!(
            vfs.open_at(None, "/etc/passwd", OpenFlags::READ).unwrap_err(),
            VfsError::TooManyOpen
        );
        for h in handles {
            vfs.close(h).unwrap();
        }
    }

    #[test]
    fn seek_then_read_from_offset() {
        let mut vfs = vfs_with_tree();
        let f = vfs
            .open_at(None, "/home/user/docs/a.txt", OpenFlags::READ)
            .unwrap();
        vfs.seek(f, 2).unwrap();
        let mut buf = [0u8; 8];
        let n = vfs.read(f, &mut buf).unwrap();
        assert_eq!(&buf[..n], b"llo\n");
        vfs.close(f).unwrap();
    }
}
