//! File backends
//!
//! Two structurally different ways of touching files sit behind one trait:
//!
//! - **Vfs**: the host-negotiated advanced interface (version 3 or later)
//! - **Native**: direct `std::fs` calls, used when no interface was negotiated
//!   or the negotiated one is too old
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐
//! │    CoreFs    │  (roots, scratch path, catalog)
//! └──────┬───────┘
//!        │ Box<dyn FileBackend>, chosen once per session
//!    ┌───┴────┐
//!    │        │
//! ┌──▼──┐ ┌───▼────┐
//! │ Vfs │ │ Native │
//! └─────┘ └────────┘
//! ```
//!
//! Handles remember which backend produced them; passing one to the other
//! backend is refused with [`CoreFsError::ForeignHandle`].

pub mod native;
pub mod vfs;

pub use native::NativeBackend;
pub use vfs::VfsBackend;

use core::fmt;
use std::fs::{File, ReadDir};

use bitflags::bitflags;

use crate::capability::BackendFeatures;
use crate::error::{CoreFsError, Result};
use crate::vfs::{VfsDir, VfsFile};

/// Longest directory entry name kept by the advanced backend, terminator included.
pub const ENTRY_NAME_MAX: usize = 256;

/// Which backend serves the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Vfs,
    Native,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Vfs => f.write_str("vfs"),
            BackendKind::Native => f.write_str("native"),
        }
    }
}

/// How a file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Read-only; the file must exist.
    Read,
    /// Write-only; created or truncated.
    Write,
    /// Read-write from the start; the file must exist and is not truncated.
    Revise,
    /// Read-write; created or truncated.
    Truncate,
}

/// Seek origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Start,
    Current,
    End,
}

bitflags! {
    /// Mode bits in the traditional `st_mode` layout.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ModeFlags: u32 {
        const OWNER_READ = 0o400;
        const OWNER_WRITE = 0o200;
        const OWNER_EXEC = 0o100;
        const CHAR_DEVICE = 0o020000;
        const DIRECTORY = 0o040000;
        const REGULAR = 0o100000;
    }
}

/// Result of [`FileBackend::stat`].
///
/// Times are seconds since the Unix epoch; zero means the backend could not
/// tell (see [`BackendFeatures`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metadata {
    pub size: u64,
    pub modified: u64,
    pub accessed: u64,
    pub mode: ModeFlags,
}

impl Metadata {
    pub fn is_dir(&self) -> bool {
        self.mode.contains(ModeFlags::DIRECTORY)
    }

    pub fn is_writable(&self) -> bool {
        self.mode.contains(ModeFlags::OWNER_WRITE)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Handles
// ═══════════════════════════════════════════════════════════════════════════════

pub(crate) enum FileInner {
    Vfs(VfsFile),
    Native(File),
}

/// Open file, owned exclusively by whoever opened it until passed back to `close`.
pub struct FileHandle(pub(crate) FileInner);

impl FileHandle {
    pub fn backend(&self) -> BackendKind {
        match self.0 {
            FileInner::Vfs(_) => BackendKind::Vfs,
            FileInner::Native(_) => BackendKind::Native,
        }
    }
}

impl fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            FileInner::Vfs(file) => write!(f, "FileHandle(vfs:{})", file.id()),
            FileInner::Native(_) => f.write_str("FileHandle(native)"),
        }
    }
}

pub(crate) enum DirInner {
    Vfs(VfsDir),
    Native(ReadDir),
}

/// One directory enumeration pass.
///
/// Holds the single "current entry" record that `readdir` overwrites on every
/// step. The borrow returned by `readdir` ends at the next call, so copy the
/// name out first if it is needed later.
pub struct DirHandle {
    pub(crate) inner: DirInner,
    pub(crate) entry: Dirent,
}

impl DirHandle {
    pub(crate) fn new(inner: DirInner) -> Self {
        Self {
            inner,
            entry: Dirent::default(),
        }
    }

    pub fn backend(&self) -> BackendKind {
        match self.inner {
            DirInner::Vfs(_) => BackendKind::Vfs,
            DirInner::Native(_) => BackendKind::Native,
        }
    }
}

impl fmt::Debug for DirHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            DirInner::Vfs(dir) => write!(f, "DirHandle(vfs:{})", dir.id()),
            DirInner::Native(_) => f.write_str("DirHandle(native)"),
        }
    }
}

/// Directory entry record. Only the name is guaranteed meaningful.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dirent {
    name: String,
    is_dir: Option<bool>,
}

impl Dirent {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Entry type, when the backend reported one without following links.
    pub fn is_dir(&self) -> Option<bool> {
        self.is_dir
    }

    /// Overwrite in place, reusing the name allocation.
    pub(crate) fn set(&mut self, name: &str, is_dir: Option<bool>) {
        self.name.clear();
        self.name.push_str(name);
        self.is_dir = is_dir;
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Backend trait
// ═══════════════════════════════════════════════════════════════════════════════

/// Abstract file backend
///
/// Implemented by [`VfsBackend`] and [`NativeBackend`].
pub trait FileBackend {
    fn kind(&self) -> BackendKind;

    fn features(&self) -> BackendFeatures;

    fn open(&mut self, path: &str, mode: OpenMode) -> Result<FileHandle>;

    fn close(&mut self, file: FileHandle) -> Result<()>;

    /// Size of an open file, without disturbing its position.
    fn size(&mut self, file: &mut FileHandle) -> Result<u64>;

    fn tell(&mut self, file: &mut FileHandle) -> Result<u64>;

    /// Move the position; returns the new position.
    fn seek(&mut self, file: &mut FileHandle, offset: i64, whence: Whence) -> Result<u64>;

    /// Read up to `buf.len()` bytes. Errors and end of file read as 0.
    fn read(&mut self, file: &mut FileHandle, buf: &mut [u8]) -> usize;

    /// Write up to `buf.len()` bytes. Errors read as 0.
    fn write(&mut self, file: &mut FileHandle, buf: &[u8]) -> usize;

    fn flush(&mut self, file: &mut FileHandle) -> Result<()>;

    fn remove(&mut self, path: &str) -> Result<()>;

    fn rename(&mut self, old_path: &str, new_path: &str) -> Result<()>;

    fn stat(&mut self, path: &str) -> Result<Metadata>;

    fn opendir(&mut self, path: &str, include_hidden: bool) -> Option<DirHandle>;

    /// Next entry, or `None` at the end of the listing.
    fn readdir<'d>(&mut self, dir: &'d mut DirHandle) -> Option<&'d Dirent>;

    fn closedir(&mut self, dir: DirHandle) -> Result<()>;
}

/// The error for a handle that reached the wrong backend.
pub(crate) fn foreign(kind: BackendKind) -> CoreFsError {
    CoreFsError::ForeignHandle(kind)
}

/// Next entry the OS could read. An unreadable entry is skipped rather than
/// ending the listing.
pub(crate) fn next_readable<T>(entries: &mut impl Iterator<Item = std::io::Result<T>>) -> Option<T> {
    entries.find_map(|entry| entry.ok())
}
