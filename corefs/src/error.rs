//! Error taxonomy shared by every file and directory operation.
//!
//! Expected conditions (a missing file, a refused open) always come back to the
//! immediate caller as a [`CoreFsError`]; nothing in this crate panics or aborts
//! for them. Catalog overflow and a missing advanced interface are not errors at all.

use thiserror::Error;

/// Failure of a file-access or directory-access operation.
#[derive(Debug, Error)]
pub enum CoreFsError {
    /// Open or stat target is absent or inaccessible.
    #[error("not found: {0}")]
    NotFound(String),

    /// The backend refused to open the path in the requested mode.
    #[error("could not open {path} ({mode:?})")]
    OpenFailed { path: String, mode: crate::OpenMode },

    /// A read did not complete as requested.
    #[error("read failed: {0}")]
    ReadFailed(String),

    /// A write did not complete as requested (short writes included).
    #[error("write failed: {path} ({written} of {expected} bytes)")]
    WriteFailed {
        path: String,
        written: usize,
        expected: usize,
    },

    /// Allocation for a whole-file read failed.
    #[error("out of memory reading {path} ({size} bytes)")]
    OutOfMemory { path: String, size: u64 },

    #[error("seek failed")]
    SeekFailed,

    #[error("flush failed")]
    FlushFailed,

    #[error("close failed")]
    CloseFailed,

    #[error("remove failed: {0}")]
    RemoveFailed(String),

    #[error("rename failed: {from} -> {to}")]
    RenameFailed { from: String, to: String },

    /// A handle produced by one backend was passed to the other.
    #[error("handle belongs to the {0} backend")]
    ForeignHandle(crate::BackendKind),

    /// Requested capability is absent on both backends.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
}

pub type Result<T> = core::result::Result<T, CoreFsError>;
