//! Resolved nodes and the fixed-slot node cache.
//!
//! A node is immutable after resolution except for its reference count: the
//! type and capability mask observed at resolve time stay valid for the
//! node's whole cache lifetime, so callers check capabilities once and never
//! again. The cache is an arena keyed by canonical path; slots are never
//! relocated, so a [`NodeId`] stays stable until the slot is freed.

use crate::{VfsError, VfsResult};

/// Number of cache slots. When all are live, resolution of new paths fails
/// with `NoMemory` rather than evicting an entry somebody may still hold.
pub const NODE_CACHE_SLOTS: usize = 32;

/// What a resolved path turned out to be.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeType {
    File,
    Directory,
    Device,
    Proc,
    /// Placeholder for "no such node"; never stored in a live slot.
    Invalid,
}

bitflags::bitflags! {
    /// Immutable per-node attribute bits.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct NodeFlags: u8 {
        const READONLY = 0b0000_0001;
        const HIDDEN   = 0b0000_0010;
    }
}

bitflags::bitflags! {
    /// Capability mask standing in for a per-type operations vtable. An
    /// absent bit means the backend does not implement the operation for
    /// this node; the VFS layer answers `NotPermitted` without consulting
    /// the backend.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct OpsMask: u16 {
        const OPEN       = 1 << 0;
        const READ       = 1 << 1;
        const WRITE      = 1 << 2;
        const SIZE       = 1 << 3;
        const SEEK       = 1 << 4;
        const TELL       = 1 << 5;
        const DIR_ITER   = 1 << 6;
        const DIR_CREATE = 1 << 7;
        const DIR_REMOVE = 1 << 8;
        const DIR_RENAME = 1 << 9;
    }
}

/// Stable handle to a cache slot. Plain data; ownership of the reference it
/// represents is tracked by the cache's counts, not by this value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

#[derive(Debug)]
pub(crate) struct NodeSlot {
    pub path: String,
    pub mount: usize,
    pub node_type: NodeType,
    pub flags: NodeFlags,
    pub ops: OpsMask,
    /// Count of outstanding `resolve`/`retain` references.
    pub refcount: u32,
    /// Count of open file handles and live iterators pinning the slot. A
    /// slot is freed only when both counts reach zero.
    pub pins: u32,
}

#[derive(Default)]
pub(crate) struct NodeCache {
    slots: Vec<Option<NodeSlot>>,
}

impl NodeCache {
    pub fn new() -> Self {
        Self {
            slots: (0..NODE_CACHE_SLOTS).map(|_| None).collect(),
        }
    }

    /// Cache hit: bump the refcount and hand back the existing identity.
    pub fn lookup(&mut self, path: &str) -> Option<NodeId> {
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if let Some(s) = slot {
                if s.path == path {
                    s.refcount += 1;
                    return Some(NodeId(i));
                }
            }
        }
        None
    }

    /// Peek without touching counts.
    pub fn find(&self, path: &str) -> Option<NodeId> {
        self.slots.iter().position(|s| {
            s.as_ref().map(|s| s.path.as_str()) == Some(path)
        }).map(NodeId)
    }

    /// Insert a freshly resolved node with refcount 1.
    pub fn insert(
        &mut self,
        path: String,
        mount: usize,
        node_type: NodeType,
        flags: NodeFlags,
        ops: OpsMask,
    ) -> VfsResult<NodeId> {
        let free = self
            .slots
            .iter()
            .position(|s| s.is_none())
            .ok_or(VfsError::NoMemory)?;
        self.slots[free] = Some(NodeSlot {
            path,
            mount,
            node_type,
            flags,
            ops,
            refcount: 1,
            pins: 0,
        });
        Ok(NodeId(free))
    }

    pub fn get(&self, id: NodeId) -> VfsResult<&NodeSlot> {
        self.slots
            .get(id.0)
            .and_then(|s| s.as_ref())
            .ok_or(VfsError::BadHandle)
    }

    pub fn get_mut(&mut self, id: NodeId) -> VfsResult<&mut NodeSlot> {
        self.slots
            .get_mut(id.0)
            .and_then(|s| s.as_mut())
            .ok_or(VfsError::BadHandle)
    }

    pub fn retain(&mut self, id: NodeId) -> VfsResult<()> {
        self.get_mut(id)?.refcount += 1;
        Ok(())
    }

    /// Drop one reference. The slot is freed once no references and no pins
    /// remain.
    pub fn release(&mut self, id: NodeId) {
        let free = match self.slots.get_mut(id.0).and_then(|s| s.as_mut()) {
            Some(slot) => {
                if slot.refcount > 0 {
                    slot.refcount -= 1;
                }
                slot.refcount == 0 && slot.pins == 0
            }
            None => false,
        };
        if free {
            self.slots[id.0] = None;
        }
    }

    pub fn pin(&mut self, id: NodeId) -> VfsResult<()> {
        self.get_mut(id)?.pins += 1;
        Ok(())
    }

    pub fn unpin(&mut self, id: NodeId) {
        let free = match self.slots.get_mut(id.0).and_then(|s| s.as_mut()) {
            Some(slot) => {
                if slot.pins > 0 {
                    slot.pins -= 1;
                }
                slot.refcount == 0 && slot.pins == 0
            }
            None => false,
        };
        if free {
            self.slots[id.0] = None;
        }
    }

    /// Drop a slot outright if nothing holds it. Used when the underlying
    /// entry is removed from the backend.
    pub fn evict_if_unused(&mut self, path: &str) {
        if let Some(id) = self.find(path) {
            let unused = self
                .get(id)
                .map(|s| s.refcount == 0 && s.pins == 0)
                .unwrap_or(false);
            // refcount 0 with pins 0 is already freed on release; a live
            // entry for a removed path is left to age out with its holders.
            if unused {
                self.slots[id.0] = None;
            }
        }
    }

    /// Rewrite cached paths under `old_prefix` after a rename so stale
    /// spellings cannot resolve to moved entries.
    pub fn rename_prefix(&mut self, old_prefix: &str, new_prefix: &str) {
        for slot in self.slots.iter_mut().flatten() {
            if slot.path == old_prefix {
                slot.path = new_prefix.to_string();
            } else if let Some(rest) = slot.path.strip_prefix(old_prefix) {
                if rest.starts_with('/') {
                    slot.path = format!("{new_prefix}{rest}");
                }
            }
        }
    }

    /// Refcount for a cached path; `None` on cache miss. Test hook.
    pub fn refcount_of(&self, path: &str) -> Option<u32> {
        self.find(path)
            .and_then(|id| self.get(id).ok())
            .map(|s| s.refcount)
    }

    pub fn live_slots(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache_with(path: &str) -> (NodeCache, NodeId) {
        let mut c = NodeCache::new();
        let id = c
            .insert(
                path.to_string(),
                0,
                NodeType::Directory,
                NodeFlags::empty(),
                OpsMask::DIR_ITER,
            )
            .unwrap();
        (c, id)
    }

    #[test]
    fn lookup_returns_same_identity_and_bumps_refcount() {
        let (mut c, id) = cache_with("/etc");
        let hit = c.lookup("/etc").unwrap();
        assert_eq!(hit, id);
        assert_eq!(c.refcount_of("/etc"), Some(2));
    }

    #[test]
    fn release_to_zero_frees_slot() {
        let (mut c, id) = cache_with("/etc");
        c.release(id);
        assert_eq!(c.refcount_of("/etc"), None);
        assert_eq!(c.live_slots(), 0);
    }

    #[test]
    fn pinned_slot_survives_release() {
        let (mut c, id) = cache_with("/etc");
        c.pin(id).unwrap();
        c.release(id);
        // still cached: an open handle pins it
        assert_eq!(c.refcount_of("/etc"), Some(0));
        c.unpin(id);
        assert_eq!(c.refcount_of("/etc"), None);
    }

    #[test]
    fn cache_full_reports_no_memory() {
        let mut c = NodeCache::new();
        for i in 0..NODE_CACHE_SLOTS {
            c.insert(
                format!("/f{i}"),
                0,
                NodeType::File,
                NodeFlags::empty(),
                OpsMask::OPEN,
            )
            .unwrap();
        }
        let err = c
            .insert(
                "/overflow".to_string(),
                0,
                NodeType::File,
                NodeFlags::empty(),
                OpsMask::OPEN,
            )
            .unwrap_err();
        assert_eq!(err, VfsError::NoMemory);
    }

    #[test]
    fn rename_prefix_rewrites_subtree_only() {
        let mut c = NodeCache::new();
        let a = c
            .insert("/home/user".into(), 0, NodeType::Directory, NodeFlags::empty(), OpsMask::DIR_ITER)
            .unwrap();
        c.insert("/home/user/docs".into(), 0, NodeType::Directory, NodeFlags::empty(), OpsMask::DIR_ITER)
            .unwrap();
        c.insert("/home/userx".into(), 0, NodeType::Directory, NodeFlags::empty(), OpsMask::DIR_ITER)
            .unwrap();
        c.rename_prefix("/home/user", "/home/alice");
        assert_eq!(c.get(a).unwrap().path, "/home/alice");
        assert!(c.find("/home/alice/docs").is_some());
        assert!(c.find("/home/userx").is_some());
        assert!(c.find("/home/user/docs").is_none());
    }
}
