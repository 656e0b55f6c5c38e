//! Advanced (versioned) file-services interface
//!
//! This is the host side of the contract: a capability-negotiated file API that
//! the emulation host may hand us during setup. Its shape follows the
//! frontend-provided VFS of plugin hosts: opaque handles, raw integer result
//! codes (negative on failure), flag words for access modes and stat results,
//! and a directory cursor that exposes one entry at a time.
//!
//! Nothing here is trusted before negotiation reaches
//! [`MIN_FULL_VERSION`](crate::capability::MIN_FULL_VERSION); below it the
//! facade ignores the interface entirely and uses native calls.

pub mod local;

pub use local::LocalVfs;

use bitflags::bitflags;

bitflags! {
    /// Access mode requested from [`VfsInterface::open`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct VfsAccess: u32 {
        const READ = 1 << 0;
        /// Create or truncate unless combined with `UPDATE_EXISTING`.
        const WRITE = 1 << 1;
        const READ_WRITE = Self::READ.bits() | Self::WRITE.bits();
        /// Open an existing file for update without truncating it.
        const UPDATE_EXISTING = 1 << 2;
    }
}

bitflags! {
    /// Result word of [`VfsInterface::stat`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct VfsStat: u32 {
        const IS_VALID = 1 << 0;
        const IS_DIRECTORY = 1 << 1;
        const IS_CHARACTER_SPECIAL = 1 << 2;
    }
}

/// Seek origin understood by the advanced interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VfsSeek {
    Start,
    Current,
    End,
}

/// Opaque file handle issued by a [`VfsInterface`] implementation.
///
/// Deliberately neither `Clone` nor `Copy`: closing consumes it.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct VfsFile(u64);

impl VfsFile {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Opaque directory cursor issued by a [`VfsInterface`] implementation.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct VfsDir(u64);

impl VfsDir {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Host-provided file services.
///
/// Integer results follow the host convention: a negative value is failure,
/// zero or positive is success (or a byte count / position).
pub trait VfsInterface {
    fn open(&mut self, path: &str, access: VfsAccess) -> Option<VfsFile>;

    fn close(&mut self, file: VfsFile) -> i32;

    /// Total size of the open file.
    fn size(&mut self, file: &VfsFile) -> i64;

    fn tell(&mut self, file: &VfsFile) -> i64;

    /// Returns the new position.
    fn seek(&mut self, file: &VfsFile, offset: i64, whence: VfsSeek) -> i64;

    fn read(&mut self, file: &VfsFile, buf: &mut [u8]) -> i64;

    fn write(&mut self, file: &VfsFile, buf: &[u8]) -> i64;

    fn flush(&mut self, file: &VfsFile) -> i32;

    fn remove(&mut self, path: &str) -> i32;

    fn rename(&mut self, old_path: &str, new_path: &str) -> i32;

    /// Stat flags plus the size in bytes (32-bit, as hosts report it).
    fn stat(&mut self, path: &str) -> (VfsStat, i32);

    fn opendir(&mut self, path: &str, include_hidden: bool) -> Option<VfsDir>;

    /// Advance the cursor. `false` once the listing is exhausted.
    fn readdir(&mut self, dir: &VfsDir) -> bool;

    /// Name of the entry under the cursor.
    fn dirent_name(&self, dir: &VfsDir) -> Option<&str>;

    fn dirent_is_dir(&self, dir: &VfsDir) -> bool;

    fn closedir(&mut self, dir: VfsDir) -> i32;
}

/// Outcome of a successful negotiation: the interface and the version the host agreed to.
pub struct VfsNegotiation {
    pub version: u32,
    pub interface: Box<dyn VfsInterface>,
}

impl core::fmt::Debug for VfsNegotiation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("VfsNegotiation")
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}
