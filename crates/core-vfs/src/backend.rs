//! The backend seam.
//!
//! A backend serves one mount. Paths handed to a backend are canonical and
//! relative to the mount root (always starting with `/`). Capability
//! discovery happens once at resolution through [`Backend::ops_for`];
//! operations a backend leaves on the default implementation are precisely
//! the ones its mask must not advertise.

use crate::node::{NodeFlags, NodeType, OpsMask};
use crate::{VfsError, VfsResult};

/// Opaque per-backend handle for open files and directory cursors.
pub type BackendHandle = u32;

/// Result of a successful stat.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeMeta {
    pub node_type: NodeType,
    pub flags: NodeFlags,
}

impl NodeMeta {
    pub fn file() -> Self {
        Self {
            node_type: NodeType::File,
            flags: NodeFlags::empty(),
        }
    }

    pub fn directory() -> Self {
        Self {
            node_type: NodeType::Directory,
            flags: NodeFlags::empty(),
        }
    }
}

bitflags::bitflags! {
    /// File open flags.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct OpenFlags: u8 {
        const READ   = 1 << 0;
        const WRITE  = 1 << 1;
        const APPEND = 1 << 2;
        const TRUNC  = 1 << 3;
        const CREATE = 1 << 4;
    }
}

pub trait Backend {
    /// Short name for diagnostics ("mem", "sd", ...).
    fn name(&self) -> &'static str;

    /// Capability mask for nodes of the given type on this backend. Fixed
    /// for the lifetime of the mount.
    fn ops_for(&self, node_type: NodeType) -> OpsMask;

    /// Existence and type of a path. `Ok(None)` means the path does not
    /// exist — the only way a backend reports absence.
    fn stat(&mut self, path: &str) -> VfsResult<Option<NodeMeta>>;

    fn open(&mut self, _path: &str, _flags: OpenFlags) -> VfsResult<BackendHandle> {
        Err(VfsError::NotPermitted)
    }

    fn close(&mut self, _handle: BackendHandle) -> VfsResult<()> {
        Err(VfsError::NotPermitted)
    }

    fn read_at(&mut self, _handle: BackendHandle, _pos: u64, _buf: &mut [u8]) -> VfsResult<usize> {
        Err(VfsError::NotPermitted)
    }

    fn write_at(&mut self, _handle: BackendHandle, _pos: u64, _data: &[u8]) -> VfsResult<usize> {
        Err(VfsError::NotPermitted)
    }

    fn size(&mut self, _path: &str) -> VfsResult<u64> {
        Err(VfsError::NotPermitted)
    }

    /// Begin iterating a directory. The cursor owns any backend state until
    /// [`dir_close`](Self::dir_close).
    fn dir_open(&mut self, _path: &str) -> VfsResult<BackendHandle> {
        Err(VfsError::NotPermitted)
    }

    /// Next entry name, already filtered of `.` and `..`. `Ok(None)` at end.
    fn dir_next(&mut self, _handle: BackendHandle) -> VfsResult<Option<String>> {
        Err(VfsError::NotPermitted)
    }

    fn dir_close(&mut self, _handle: BackendHandle) -> VfsResult<()> {
        Err(VfsError::NotPermitted)
    }

    /// Create `name` inside `dir_path`. Creating an entry that already
    /// exists is not an error; the existing entry is kept.
    fn create(&mut self, _dir_path: &str, _name: &str, _node_type: NodeType) -> VfsResult<()> {
        Err(VfsError::NotPermitted)
    }

    fn remove(&mut self, _dir_path: &str, _name: &str) -> VfsResult<()> {
        Err(VfsError::NotPermitted)
    }

    fn rename(
        &mut self,
        _old_dir: &str,
        _old_name: &str,
        _new_dir: &str,
        _new_name: &str,
    ) -> VfsResult<()> {
        Err(VfsError::NotPermitted)
    }
}
