//! Advanced-interface backend
//!
//! Implements the `FileBackend` trait on top of a host-negotiated
//! [`VfsInterface`]. The host reports failure through negative integers and
//! flag words; this wrapper turns those into [`CoreFsError`] values and the
//! zero-for-error byte counts the facade promises.

use log::debug;

use super::{
    foreign, BackendKind, DirHandle, DirInner, Dirent, FileBackend, FileHandle, FileInner, Metadata, ModeFlags,
    OpenMode, Whence, ENTRY_NAME_MAX,
};
use crate::capability::BackendFeatures;
use crate::error::{CoreFsError, Result};
use crate::path::truncated;
use crate::vfs::{VfsAccess, VfsFile, VfsInterface, VfsSeek, VfsStat};

/// Backend routing every call through the host's file services
pub struct VfsBackend {
    iface: Box<dyn VfsInterface>,
}

impl VfsBackend {
    pub fn new(iface: Box<dyn VfsInterface>) -> Self {
        Self { iface }
    }
}

fn access_for(mode: OpenMode) -> VfsAccess {
    match mode {
        OpenMode::Read => VfsAccess::READ,
        OpenMode::Write => VfsAccess::WRITE,
        OpenMode::Revise => VfsAccess::READ_WRITE | VfsAccess::UPDATE_EXISTING,
        OpenMode::Truncate => VfsAccess::READ_WRITE,
    }
}

fn vfs(file: &FileHandle) -> Result<&VfsFile> {
    match &file.0 {
        FileInner::Vfs(f) => Ok(f),
        FileInner::Native(_) => Err(foreign(BackendKind::Native)),
    }
}

/// Translate a host stat word. The host has no times or permission bits, so
/// times read as zero and every valid entry is assumed owner-writable.
pub(crate) fn metadata_from(flags: VfsStat, size: i32) -> Metadata {
    let mut mode = ModeFlags::OWNER_WRITE;
    if flags.contains(VfsStat::IS_DIRECTORY) {
        mode |= ModeFlags::DIRECTORY;
    } else if flags.contains(VfsStat::IS_CHARACTER_SPECIAL) {
        mode |= ModeFlags::CHAR_DEVICE;
    } else {
        mode |= ModeFlags::REGULAR;
    }
    Metadata {
        size: u64::try_from(size).unwrap_or(0),
        modified: 0,
        accessed: 0,
        mode,
    }
}

impl FileBackend for VfsBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Vfs
    }

    fn features(&self) -> BackendFeatures {
        BackendFeatures {
            timestamps: false,
            permissions: false,
        }
    }

    fn open(&mut self, path: &str, mode: OpenMode) -> Result<FileHandle> {
        if let Some(f) = self.iface.open(path, access_for(mode)) {
            return Ok(FileHandle(FileInner::Vfs(f)));
        }
        // The host only says no; tell a missing file apart for modes that need one
        let must_exist = matches!(mode, OpenMode::Read | OpenMode::Revise);
        if must_exist && !self.iface.stat(path).0.contains(VfsStat::IS_VALID) {
            return Err(CoreFsError::NotFound(path.to_owned()));
        }
        Err(CoreFsError::OpenFailed {
            path: path.to_owned(),
            mode,
        })
    }

    fn close(&mut self, file: FileHandle) -> Result<()> {
        match file.0 {
            FileInner::Vfs(f) => {
                if self.iface.close(f) < 0 {
                    Err(CoreFsError::CloseFailed)
                } else {
                    Ok(())
                }
            }
            FileInner::Native(_) => Err(foreign(BackendKind::Native)),
        }
    }

    fn size(&mut self, file: &mut FileHandle) -> Result<u64> {
        let rs = self.iface.size(vfs(file)?);
        u64::try_from(rs).map_err(|_| CoreFsError::ReadFailed(format!("size query returned {}", rs)))
    }

    fn tell(&mut self, file: &mut FileHandle) -> Result<u64> {
        let pos = self.iface.tell(vfs(file)?);
        u64::try_from(pos).map_err(|_| CoreFsError::SeekFailed)
    }

    fn seek(&mut self, file: &mut FileHandle, offset: i64, whence: Whence) -> Result<u64> {
        let whence = match whence {
            Whence::Start => VfsSeek::Start,
            Whence::Current => VfsSeek::Current,
            Whence::End => VfsSeek::End,
        };
        let pos = self.iface.seek(vfs(file)?, offset, whence);
        u64::try_from(pos).map_err(|_| CoreFsError::SeekFailed)
    }

    fn read(&mut self, file: &mut FileHandle, buf: &mut [u8]) -> usize {
        match vfs(file) {
            Ok(f) => usize::try_from(self.iface.read(f, buf)).unwrap_or(0),
            Err(_) => 0,
        }
    }

    fn write(&mut self, file: &mut FileHandle, buf: &[u8]) -> usize {
        match vfs(file) {
            Ok(f) => usize::try_from(self.iface.write(f, buf)).unwrap_or(0),
            Err(_) => 0,
        }
    }

    fn flush(&mut self, file: &mut FileHandle) -> Result<()> {
        if self.iface.flush(vfs(file)?) < 0 {
            Err(CoreFsError::FlushFailed)
        } else {
            Ok(())
        }
    }

    fn remove(&mut self, path: &str) -> Result<()> {
        if self.iface.remove(path) < 0 {
            Err(CoreFsError::RemoveFailed(path.to_owned()))
        } else {
            Ok(())
        }
    }

    fn rename(&mut self, old_path: &str, new_path: &str) -> Result<()> {
        if self.iface.rename(old_path, new_path) < 0 {
            Err(CoreFsError::RenameFailed {
                from: old_path.to_owned(),
                to: new_path.to_owned(),
            })
        } else {
            Ok(())
        }
    }

    fn stat(&mut self, path: &str) -> Result<Metadata> {
        let (flags, size) = self.iface.stat(path);
        if !flags.contains(VfsStat::IS_VALID) {
            return Err(CoreFsError::NotFound(path.to_owned()));
        }
        Ok(metadata_from(flags, size))
    }

    fn opendir(&mut self, path: &str, include_hidden: bool) -> Option<DirHandle> {
        let dir = self.iface.opendir(path, include_hidden);
        if dir.is_none() {
            debug!("opendir('{}') refused by host", path);
        }
        dir.map(|d| DirHandle::new(DirInner::Vfs(d)))
    }

    fn readdir<'d>(&mut self, dir: &'d mut DirHandle) -> Option<&'d Dirent> {
        let DirInner::Vfs(vdir) = &dir.inner else {
            return None;
        };
        if !self.iface.readdir(vdir) {
            return None;
        }
        // One shared record, overwritten on every step
        let name = self.iface.dirent_name(vdir).unwrap_or_default();
        let is_dir = self.iface.dirent_is_dir(vdir);
        dir.entry.set(truncated(name, ENTRY_NAME_MAX), Some(is_dir));
        Some(&dir.entry)
    }

    fn closedir(&mut self, dir: DirHandle) -> Result<()> {
        match dir.inner {
            DirInner::Vfs(d) => {
                if self.iface.closedir(d) < 0 {
                    Err(CoreFsError::CloseFailed)
                } else {
                    Ok(())
                }
            }
            DirInner::Native(_) => Err(foreign(BackendKind::Native)),
        }
    }
}
