//! System asset catalog
//!
//! Built once at session setup by scanning the system root:
//!
//! - the boot firmware image directly under the root, listed first and unprefixed
//! - every non-directory child of the extensions folder, labeled
//!   `<extensions>/<name>`
//! - every subdirectory of the extensions folder, as `{ name, name + "/" }`
//!
//! The scan is not recursive and is best effort. Both lists are capped (the
//! catalog backs a fixed-size menu); anything past a cap is dropped without
//! complaint, and a missing extensions folder just means fewer entries.

use log::info;

use crate::backend::{FileBackend, OpenMode};
use crate::config::{CoreFsConfig, ScanLimits};
use crate::path::{append_truncated, copy_truncated, terminated_str, PathBuilder};
use crate::roots::SEPARATOR;

/// Discovered file, labeled relative to the system root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub label: String,
}

/// Discovered extensions subdirectory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Bare directory name
    pub name: String,
    /// Name plus trailing separator, for display
    pub label: String,
}

/// Bounded, ordered scan result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetCatalog {
    limits: ScanLimits,
    files: Vec<FileEntry>,
    dirs: Vec<DirEntry>,
    /// Scratch buffer labels are assembled in
    label_buf: Vec<u8>,
}

impl Default for AssetCatalog {
    fn default() -> Self {
        Self::new(ScanLimits::default())
    }
}

impl AssetCatalog {
    pub fn new(limits: ScanLimits) -> Self {
        Self {
            limits,
            files: Vec::new(),
            dirs: Vec::new(),
            label_buf: vec![0; limits.max_label.max(1)],
        }
    }

    pub fn files(&self) -> &[FileEntry] {
        &self.files
    }

    pub fn dirs(&self) -> &[DirEntry] {
        &self.dirs
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn dir_count(&self) -> usize {
        self.dirs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.dirs.is_empty()
    }

    /// Label of file `index`, or `""` past the end.
    pub fn file_label(&self, index: usize) -> &str {
        self.files.get(index).map(|f| f.label.as_str()).unwrap_or("")
    }

    /// Name of directory `index`, or `""` past the end.
    pub fn dir_name(&self, index: usize) -> &str {
        self.dirs.get(index).map(|d| d.name.as_str()).unwrap_or("")
    }

    /// Label of directory `index`, or `""` past the end.
    pub fn dir_label(&self, index: usize) -> &str {
        self.dirs.get(index).map(|d| d.label.as_str()).unwrap_or("")
    }

    pub fn clear(&mut self) {
        self.files.clear();
        self.dirs.clear();
    }

    /// Record a file. Returns `false` once the file cap is reached.
    pub(crate) fn add_file(&mut self, name: &str, prefix: Option<&str>) -> bool {
        if self.files.len() >= self.limits.max_files {
            return false;
        }
        self.label_buf[0] = 0;
        if let Some(prefix) = prefix {
            copy_truncated(&mut self.label_buf, prefix);
        }
        append_truncated(&mut self.label_buf, name);
        let label = terminated_str(&self.label_buf).to_owned();
        self.files.push(FileEntry { label });
        true
    }

    /// Record a directory, skipping the `.` and `..` pseudo-entries.
    pub(crate) fn add_dir(&mut self, name: &str) -> bool {
        if self.dirs.len() >= self.limits.max_dirs {
            return false;
        }
        if name == "." || name == ".." {
            return false;
        }
        copy_truncated(&mut self.label_buf, name);
        let name = terminated_str(&self.label_buf).to_owned();
        let mut sep = [0u8; 4];
        append_truncated(&mut self.label_buf, SEPARATOR.encode_utf8(&mut sep));
        let label = terminated_str(&self.label_buf).to_owned();
        self.dirs.push(DirEntry { name, label });
        true
    }
}

/// Scan `system_root` and build a fresh catalog.
///
/// `scratch` is the session's path builder; its previous contents are lost.
pub fn scan_system_assets(
    backend: &mut dyn FileBackend,
    scratch: &mut PathBuilder,
    system_root: &str,
    config: &CoreFsConfig,
) -> AssetCatalog {
    let mut catalog = AssetCatalog::new(config.scan);

    // Boot firmware: must open read-only and must not be a directory
    let firmware = scratch.join(Some(system_root), Some(&config.boot_firmware));
    if let Ok(fh) = backend.open(firmware, OpenMode::Read) {
        let _ = backend.close(fh);
        let firmware = scratch.join(Some(system_root), Some(&config.boot_firmware));
        if backend.stat(firmware).map(|m| !m.is_dir()).unwrap_or(true) {
            catalog.add_file(&config.boot_firmware, None);
        }
    }

    let mut prefix = String::with_capacity(config.extensions_dir.len() + 1);
    prefix.push_str(&config.extensions_dir);
    prefix.push(SEPARATOR);

    let extensions = scratch.join(Some(system_root), Some(&config.extensions_dir));
    if let Some(mut dir) = backend.opendir(extensions, false) {
        let mut name = String::new();
        loop {
            // Copy the name out before the record is overwritten
            let hint = match backend.readdir(&mut dir) {
                Some(entry) => {
                    name.clear();
                    name.push_str(entry.name());
                    entry.is_dir()
                }
                None => break,
            };
            if name.is_empty() {
                continue;
            }
            let is_dir = match hint {
                Some(is_dir) => is_dir,
                None => {
                    let child = scratch.join3(Some(system_root), Some(&prefix), Some(&name));
                    match backend.stat(child) {
                        Ok(meta) => meta.is_dir(),
                        Err(_) => continue,
                    }
                }
            };
            if is_dir {
                catalog.add_dir(&name);
            } else {
                catalog.add_file(&name, Some(&prefix));
            }
        }
        let _ = backend.closedir(dir);
    }

    info!(
        "system scan: {} files, {} directories",
        catalog.file_count(),
        catalog.dir_count()
    );
    catalog
}
