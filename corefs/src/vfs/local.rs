//! Local VFS: the advanced interface served from `std::fs`
//!
//! A host that wants to offer file services but has no special storage can
//! hand out a [`LocalVfs`]. It is also what the tests and the `fsprobe` tool use
//! to drive the advanced backend against a real directory tree.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions, ReadDir};
use std::io::{Read, Seek, SeekFrom, Write};

use crate::backend::next_readable;

use super::{VfsAccess, VfsDir, VfsFile, VfsInterface, VfsSeek, VfsStat};

/// Directory cursor state
struct DirCursor {
    entries: ReadDir,
    include_hidden: bool,
    /// (name, is_dir) of the entry under the cursor
    current: Option<(String, bool)>,
}

/// `std::fs`-backed implementation of [`VfsInterface`].
pub struct LocalVfs {
    next_id: u64,
    files: HashMap<u64, File>,
    dirs: HashMap<u64, DirCursor>,
}

impl LocalVfs {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            files: HashMap::new(),
            dirs: HashMap::new(),
        }
    }

    /// Number of files currently open through this interface
    pub fn open_files(&self) -> usize {
        self.files.len()
    }

    fn alloc_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl Default for LocalVfs {
    fn default() -> Self {
        Self::new()
    }
}

fn options_for(access: VfsAccess) -> Option<OpenOptions> {
    let mut opts = OpenOptions::new();
    let update = access.contains(VfsAccess::UPDATE_EXISTING);
    if access.contains(VfsAccess::READ_WRITE) {
        opts.read(true).write(true);
        if !update {
            opts.create(true).truncate(true);
        }
    } else if access.contains(VfsAccess::WRITE) {
        opts.write(true);
        if !update {
            opts.create(true).truncate(true);
        }
    } else if access.contains(VfsAccess::READ) {
        opts.read(true);
    } else {
        return None;
    }
    Some(opts)
}

/// Read until `buf` is full or the file ends.
fn read_full(file: &mut File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match file.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(total)
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

impl VfsInterface for LocalVfs {
    fn open(&mut self, path: &str, access: VfsAccess) -> Option<VfsFile> {
        if fs::metadata(path).map(|m| m.is_dir()).unwrap_or(false) {
            return None;
        }
        let file = options_for(access)?.open(path).ok()?;
        let id = self.alloc_id();
        self.files.insert(id, file);
        Some(VfsFile::new(id))
    }

    fn close(&mut self, file: VfsFile) -> i32 {
        match self.files.remove(&file.id()) {
            Some(_) => 0,
            None => -1,
        }
    }

    fn size(&mut self, file: &VfsFile) -> i64 {
        self.files
            .get(&file.id())
            .and_then(|f| f.metadata().ok())
            .map(|m| m.len() as i64)
            .unwrap_or(-1)
    }

    fn tell(&mut self, file: &VfsFile) -> i64 {
        match self.files.get_mut(&file.id()) {
            Some(f) => f.stream_position().map(|p| p as i64).unwrap_or(-1),
            None => -1,
        }
    }

    fn seek(&mut self, file: &VfsFile, offset: i64, whence: VfsSeek) -> i64 {
        let Some(f) = self.files.get_mut(&file.id()) else {
            return -1;
        };
        let target = match whence {
            VfsSeek::Start if offset < 0 => return -1,
            VfsSeek::Start => SeekFrom::Start(offset as u64),
            VfsSeek::Current => SeekFrom::Current(offset),
            VfsSeek::End => SeekFrom::End(offset),
        };
        f.seek(target).map(|p| p as i64).unwrap_or(-1)
    }

    fn read(&mut self, file: &VfsFile, buf: &mut [u8]) -> i64 {
        match self.files.get_mut(&file.id()) {
            Some(f) => read_full(f, buf).map(|n| n as i64).unwrap_or(-1),
            None => -1,
        }
    }

    fn write(&mut self, file: &VfsFile, buf: &[u8]) -> i64 {
        match self.files.get_mut(&file.id()) {
            Some(f) => match f.write_all(buf) {
                Ok(()) => buf.len() as i64,
                Err(_) => -1,
            },
            None => -1,
        }
    }

    fn flush(&mut self, file: &VfsFile) -> i32 {
        match self.files.get_mut(&file.id()).map(|f| f.flush()) {
            Some(Ok(())) => 0,
            _ => -1,
        }
    }

    fn remove(&mut self, path: &str) -> i32 {
        let result = match fs::metadata(path) {
            Ok(m) if m.is_dir() => fs::remove_dir(path),
            _ => fs::remove_file(path),
        };
        if result.is_ok() { 0 } else { -1 }
    }

    fn rename(&mut self, old_path: &str, new_path: &str) -> i32 {
        if fs::rename(old_path, new_path).is_ok() { 0 } else { -1 }
    }

    fn stat(&mut self, path: &str) -> (VfsStat, i32) {
        let Ok(meta) = fs::metadata(path) else {
            return (VfsStat::empty(), 0);
        };
        let mut flags = VfsStat::IS_VALID;
        if meta.is_dir() {
            flags |= VfsStat::IS_DIRECTORY;
        }
        if is_char_device(&meta) {
            flags |= VfsStat::IS_CHARACTER_SPECIAL;
        }
        (flags, i32::try_from(meta.len()).unwrap_or(i32::MAX))
    }

    fn opendir(&mut self, path: &str, include_hidden: bool) -> Option<VfsDir> {
        // An empty path means the working directory, as it does for native calls
        let entries = fs::read_dir(if path.is_empty() { "." } else { path }).ok()?;
        let id = self.alloc_id();
        self.dirs.insert(
            id,
            DirCursor {
                entries,
                include_hidden,
                current: None,
            },
        );
        Some(VfsDir::new(id))
    }

    fn readdir(&mut self, dir: &VfsDir) -> bool {
        let Some(cursor) = self.dirs.get_mut(&dir.id()) else {
            return false;
        };
        loop {
            let Some(entry) = next_readable(&mut cursor.entries) else {
                cursor.current = None;
                return false;
            };
            let name = entry.file_name().to_string_lossy().into_owned();
            if !cursor.include_hidden && name.starts_with('.') {
                continue;
            }
            let is_dir = match entry.file_type() {
                Ok(t) if t.is_symlink() => fs::metadata(entry.path()).map(|m| m.is_dir()).unwrap_or(false),
                Ok(t) => t.is_dir(),
                Err(_) => false,
            };
            cursor.current = Some((name, is_dir));
            return true;
        }
    }

    fn dirent_name(&self, dir: &VfsDir) -> Option<&str> {
        self.dirs
            .get(&dir.id())
            .and_then(|c| c.current.as_ref())
            .map(|(name, _)| name.as_str())
    }

    fn dirent_is_dir(&self, dir: &VfsDir) -> bool {
        self.dirs
            .get(&dir.id())
            .and_then(|c| c.current.as_ref())
            .map(|(_, is_dir)| *is_dir)
            .unwrap_or(false)
    }

    fn closedir(&mut self, dir: VfsDir) -> i32 {
        match self.dirs.remove(&dir.id()) {
            Some(_) => 0,
            None => -1,
        }
    }
}
