//! Native backend: direct `std::fs` calls
//!
//! Used whenever the host offered no advanced interface or one older than
//! version 3. Open modes map onto `OpenOptions` the way the classic
//! `rb` / `wb` / `rb+` / `wb+` stdio modes behave.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use log::debug;

use super::{
    foreign, next_readable, BackendKind, DirHandle, DirInner, Dirent, FileBackend, FileHandle, FileInner,
    Metadata, ModeFlags, OpenMode, Whence,
};
use crate::capability::BackendFeatures;
use crate::error::{CoreFsError, Result};

/// Native file backend
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeBackend;

impl NativeBackend {
    pub fn new() -> Self {
        Self
    }
}

fn options_for(mode: OpenMode) -> OpenOptions {
    let mut opts = OpenOptions::new();
    match mode {
        OpenMode::Read => opts.read(true),
        OpenMode::Write => opts.write(true).create(true).truncate(true),
        OpenMode::Revise => opts.read(true).write(true),
        OpenMode::Truncate => opts.read(true).write(true).create(true).truncate(true),
    };
    opts
}

fn native(file: &mut FileHandle) -> Result<&mut File> {
    match &mut file.0 {
        FileInner::Native(f) => Ok(f),
        FileInner::Vfs(_) => Err(foreign(BackendKind::Vfs)),
    }
}

fn epoch_secs(time: std::io::Result<SystemTime>) -> u64 {
    time.ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(unix)]
fn permission_bits(meta: &fs::Metadata) -> ModeFlags {
    use std::os::unix::fs::PermissionsExt;
    let owner = ModeFlags::OWNER_READ | ModeFlags::OWNER_WRITE | ModeFlags::OWNER_EXEC;
    ModeFlags::from_bits_truncate(meta.permissions().mode()) & owner
}

#[cfg(not(unix))]
fn permission_bits(meta: &fs::Metadata) -> ModeFlags {
    if meta.permissions().readonly() {
        ModeFlags::OWNER_READ
    } else {
        ModeFlags::OWNER_READ | ModeFlags::OWNER_WRITE
    }
}

#[cfg(unix)]
fn is_char_device(meta: &fs::Metadata) -> bool {
    use std::os::unix::fs::FileTypeExt;
    meta.file_type().is_char_device()
}

#[cfg(not(unix))]
fn is_char_device(_meta: &fs::Metadata) -> bool {
    false
}

pub(crate) fn metadata_from(meta: &fs::Metadata) -> Metadata {
    let mut mode = permission_bits(meta);
    if meta.is_dir() {
        mode |= ModeFlags::DIRECTORY;
    } else if meta.is_file() {
        mode |= ModeFlags::REGULAR;
    } else if is_char_device(meta) {
        mode |= ModeFlags::CHAR_DEVICE;
    }
    Metadata {
        size: meta.len(),
        modified: epoch_secs(meta.modified()),
        accessed: epoch_secs(meta.accessed()),
        mode,
    }
}

impl FileBackend for NativeBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Native
    }

    fn features(&self) -> BackendFeatures {
        BackendFeatures {
            timestamps: true,
            permissions: true,
        }
    }

    fn open(&mut self, path: &str, mode: OpenMode) -> Result<FileHandle> {
        match options_for(mode).open(path) {
            Ok(f) => Ok(FileHandle(FileInner::Native(f))),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(CoreFsError::NotFound(path.to_owned())),
            Err(_) => Err(CoreFsError::OpenFailed {
                path: path.to_owned(),
                mode,
            }),
        }
    }

    fn close(&mut self, file: FileHandle) -> Result<()> {
        match file.0 {
            // Dropping the File closes it
            FileInner::Native(_) => Ok(()),
            FileInner::Vfs(_) => Err(foreign(BackendKind::Vfs)),
        }
    }

    fn size(&mut self, file: &mut FileHandle) -> Result<u64> {
        // seek to end, tell, seek back to where we were
        let f = native(file)?;
        let pos = f.stream_position().map_err(|_| CoreFsError::SeekFailed)?;
        let end = f.seek(SeekFrom::End(0)).map_err(|_| CoreFsError::SeekFailed)?;
        f.seek(SeekFrom::Start(pos)).map_err(|_| CoreFsError::SeekFailed)?;
        Ok(end)
    }

    fn tell(&mut self, file: &mut FileHandle) -> Result<u64> {
        native(file)?.stream_position().map_err(|_| CoreFsError::SeekFailed)
    }

    fn seek(&mut self, file: &mut FileHandle, offset: i64, whence: Whence) -> Result<u64> {
        let target = match whence {
            Whence::Start => SeekFrom::Start(u64::try_from(offset).map_err(|_| CoreFsError::SeekFailed)?),
            Whence::Current => SeekFrom::Current(offset),
            Whence::End => SeekFrom::End(offset),
        };
        native(file)?.seek(target).map_err(|_| CoreFsError::SeekFailed)
    }

    fn read(&mut self, file: &mut FileHandle, buf: &mut [u8]) -> usize {
        let Ok(f) = native(file) else {
            return 0;
        };
        // Keep reading until full or end of file, as buffered stdio reads do
        let mut total = 0;
        while total < buf.len() {
            match f.read(&mut buf[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
        total
    }

    fn write(&mut self, file: &mut FileHandle, buf: &[u8]) -> usize {
        let Ok(f) = native(file) else {
            return 0;
        };
        let mut total = 0;
        while total < buf.len() {
            match f.write(&buf[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
        total
    }

    fn flush(&mut self, file: &mut FileHandle) -> Result<()> {
        native(file)?.flush().map_err(|_| CoreFsError::FlushFailed)
    }

    fn remove(&mut self, path: &str) -> Result<()> {
        let result = match fs::metadata(path) {
            Ok(m) if m.is_dir() => fs::remove_dir(path),
            _ => fs::remove_file(path),
        };
        result.map_err(|_| CoreFsError::RemoveFailed(path.to_owned()))
    }

    fn rename(&mut self, old_path: &str, new_path: &str) -> Result<()> {
        fs::rename(old_path, new_path).map_err(|_| CoreFsError::RenameFailed {
            from: old_path.to_owned(),
            to: new_path.to_owned(),
        })
    }

    fn stat(&mut self, path: &str) -> Result<Metadata> {
        fs::metadata(path)
            .map(|m| metadata_from(&m))
            .map_err(|_| CoreFsError::NotFound(path.to_owned()))
    }

    fn opendir(&mut self, path: &str, _include_hidden: bool) -> Option<DirHandle> {
        // Native listings always include hidden entries
        let dir = if path.is_empty() { "." } else { path };
        match fs::read_dir(dir) {
            Ok(entries) => Some(DirHandle::new(DirInner::Native(entries))),
            Err(e) => {
                debug!("opendir('{}') failed: {}", path, e);
                None
            }
        }
    }

    fn readdir<'d>(&mut self, dir: &'d mut DirHandle) -> Option<&'d Dirent> {
        let DirInner::Native(entries) = &mut dir.inner else {
            return None;
        };
        let entry = next_readable(entries)?;
        // Symlinks are left undecided so callers stat the target
        let is_dir = entry
            .file_type()
            .ok()
            .filter(|t| !t.is_symlink())
            .map(|t| t.is_dir());
        dir.entry.set(&entry.file_name().to_string_lossy(), is_dir);
        Some(&dir.entry)
    }

    fn closedir(&mut self, dir: DirHandle) -> Result<()> {
        match dir.inner {
            DirInner::Native(_) => Ok(()),
            DirInner::Vfs(_) => Err(foreign(BackendKind::Vfs)),
        }
    }
}
