//! The error taxonomy surfaced at the VFS boundary.
//!
//! One variant per condition callers can act on. Shell builtins translate a
//! subset of these to their exit codes; everything else collapses to the
//! generic failure code at the dispatch layer.

use thiserror::Error;

pub type VfsResult<T> = Result<T, VfsError>;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum VfsError {
    #[error("operation not permitted")]
    NotPermitted,
    #[error("no such file or directory")]
    NotFound,
    #[error("input/output error")]
    Io,
    #[error("no such device or address")]
    NoDevice,
    #[error("argument list too long")]
    TooBig,
    #[error("bad file handle")]
    BadHandle,
    #[error("resource temporarily unavailable")]
    WouldBlock,
    #[error("cannot allocate memory")]
    NoMemory,
    #[error("permission denied")]
    Access,
    #[error("bad address")]
    BadAddress,
    #[error("device or resource busy")]
    Busy,
    #[error("file exists")]
    Exists,
    #[error("not a directory")]
    NotDir,
    #[error("is a directory")]
    IsDir,
    #[error("invalid argument")]
    Invalid,
    #[error("too many open files")]
    TooManyOpen,
    #[error("inappropriate ioctl for device")]
    NotTty,
    #[error("no space left on device")]
    NoSpace,
    #[error("illegal seek")]
    IllegalSeek,
    #[error("read-only file system")]
    ReadOnly,
    #[error("broken pipe")]
    BrokenPipe,
    #[error("file name too long")]
    NameTooLong,
}
