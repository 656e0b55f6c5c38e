//! Session context: the one place all file access goes through
//!
//! [`CoreFs`] owns everything that used to be process-wide state: the
//! negotiated capability, the resolved roots, the scratch path buffer, the
//! asset catalog and the backend chosen for the session. The host is injected,
//! so every query it answers can be faked in tests.
//!
//! ```text
//! CoreFs::new(host, config)
//!     │
//!     ▼
//! set_environment() ── negotiate ──► backend (vfs if version >= 3, else native)
//!     │             ── system root
//!     │             ── asset scan ─► catalog
//!     ▼
//! read_whole / write_whole / open / read / ... / opendir / readdir
//!     │
//!     └─ save-area calls resolve the save root first, exactly once
//! ```

use log::{debug, error, info};

use crate::backend::{
    BackendKind, DirHandle, Dirent, FileBackend, FileHandle, Metadata, ModeFlags, NativeBackend, OpenMode,
    VfsBackend, Whence,
};
use crate::capability::{BackendCapability, BackendFeatures, Negotiated};
use crate::catalog::{scan_system_assets, AssetCatalog};
use crate::config::CoreFsConfig;
use crate::error::{CoreFsError, Result};
use crate::host::HostEnvironment;
use crate::path::PathBuilder;
use crate::roots::PathRoots;

/// File-access session bound to one host.
pub struct CoreFs {
    config: CoreFsConfig,
    host: Box<dyn HostEnvironment>,
    negotiated: Negotiated,
    roots: PathRoots,
    scratch: PathBuilder,
    backend: Box<dyn FileBackend>,
    catalog: AssetCatalog,
}

impl core::fmt::Debug for CoreFs {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CoreFs")
            .field("capability", &self.negotiated.capability)
            .field("backend", &self.backend.kind())
            .field("roots", &self.roots)
            .field("catalog", &self.catalog)
            .finish_non_exhaustive()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Whole-file helpers (shared by the path and root-relative variants)
// ═══════════════════════════════════════════════════════════════════════════════

fn read_whole_at(backend: &mut dyn FileBackend, path: &str) -> Result<Vec<u8>> {
    info!("read_whole('{}')", path);
    let mut fh = match backend.open(path, OpenMode::Read) {
        Ok(fh) => fh,
        Err(e) => {
            error!("read_whole: {}", e);
            return Err(e);
        }
    };

    let size = match backend.size(&mut fh) {
        Ok(size) => size,
        Err(_) => {
            let _ = backend.close(fh);
            error!("read_whole: size query failed for '{}'", path);
            return Err(CoreFsError::ReadFailed(path.to_owned()));
        }
    };

    let mut data = Vec::new();
    let reserved = usize::try_from(size)
        .ok()
        .filter(|&len| data.try_reserve_exact(len).is_ok());
    let Some(len) = reserved else {
        let _ = backend.close(fh);
        error!("read_whole: out of memory for '{}' ({} bytes)", path, size);
        return Err(CoreFsError::OutOfMemory {
            path: path.to_owned(),
            size,
        });
    };
    data.resize(len, 0);

    let got = backend.read(&mut fh, &mut data);
    let _ = backend.close(fh);
    if got != len {
        error!("read_whole: short read of '{}' ({} of {} bytes)", path, got, len);
        return Err(CoreFsError::ReadFailed(path.to_owned()));
    }
    Ok(data)
}

fn write_whole_at(backend: &mut dyn FileBackend, path: &str, data: &[u8]) -> Result<()> {
    info!("write_whole('{}', {})", path, data.len());
    let mut fh = match backend.open(path, OpenMode::Write) {
        Ok(fh) => fh,
        Err(_) => {
            error!("write_whole: could not open '{}'", path);
            return Err(CoreFsError::OpenFailed {
                path: path.to_owned(),
                mode: OpenMode::Write,
            });
        }
    };
    // One write; a short one is reported, never retried
    let written = backend.write(&mut fh, data);
    let _ = backend.close(fh);
    if written != data.len() {
        error!("write_whole: short write to '{}' ({} of {} bytes)", path, written, data.len());
        return Err(CoreFsError::WriteFailed {
            path: path.to_owned(),
            written,
            expected: data.len(),
        });
    }
    Ok(())
}

fn exists_at(backend: &mut dyn FileBackend, path: &str) -> bool {
    match backend.stat(path) {
        Ok(meta) => !meta.is_dir() && meta.mode.intersects(ModeFlags::OWNER_READ | ModeFlags::OWNER_WRITE),
        Err(_) => false,
    }
}

impl CoreFs {
    /// Bind a session to `host`. Nothing is queried until [`set_environment`](Self::set_environment);
    /// until then every call goes to the native backend.
    pub fn new(host: Box<dyn HostEnvironment>, config: CoreFsConfig) -> Self {
        let scratch = PathBuilder::new(config.max_path);
        let catalog = AssetCatalog::new(config.scan);
        Self {
            config,
            host,
            negotiated: Negotiated::default(),
            roots: PathRoots::new(),
            scratch,
            backend: Box::new(NativeBackend::new()),
            catalog,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Session setup
    // ═══════════════════════════════════════════════════════════════════════════

    /// Negotiate the backend, resolve the system root and rebuild the catalog.
    ///
    /// Safe to call again: an interface already held is kept, and the save
    /// root, once resolved, stays as it was.
    pub fn set_environment(&mut self) {
        self.catalog.clear();

        if self.config.use_advanced_vfs {
            self.negotiated
                .resolve(self.host.as_mut(), self.config.required_vfs_version);
        } else {
            info!("vfs disabled by configuration");
        }
        self.select_backend();

        self.roots.init_system_root(self.host.as_mut(), self.config.max_path);
        self.catalog = scan_system_assets(
            self.backend.as_mut(),
            &mut self.scratch,
            self.roots.system(),
            &self.config,
        );
    }

    /// Switch to the advanced backend once a full interface is held.
    fn select_backend(&mut self) {
        if self.backend.kind() == BackendKind::Vfs {
            return;
        }
        if !self.negotiated.capability.is_full() {
            if self.negotiated.capability.available {
                info!(
                    "vfs version {} too old, using native file access",
                    self.negotiated.capability.version
                );
            }
            return;
        }
        if let Some(iface) = self.negotiated.interface.take() {
            self.backend = Box::new(VfsBackend::new(iface));
            info!("file access: vfs");
        }
    }

    pub fn config(&self) -> &CoreFsConfig {
        &self.config
    }

    pub fn capability(&self) -> BackendCapability {
        self.negotiated.capability
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// What the active backend can really report in [`Metadata`].
    pub fn features(&self) -> BackendFeatures {
        self.backend.features()
    }

    pub fn roots(&self) -> &PathRoots {
        &self.roots
    }

    pub fn catalog(&self) -> &AssetCatalog {
        &self.catalog
    }

    /// Resolve the save root if needed and return it.
    pub fn ensure_save_root(&mut self) -> &str {
        self.roots.ensure_save_root(self.host.as_mut(), self.config.max_path)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Whole-file operations
    // ═══════════════════════════════════════════════════════════════════════════

    /// Read an entire file into memory.
    pub fn read_whole(&mut self, path: &str) -> Result<Vec<u8>> {
        read_whole_at(self.backend.as_mut(), path)
    }

    /// Replace a file's contents with `data`.
    pub fn write_whole(&mut self, path: &str, data: &[u8]) -> Result<()> {
        write_whole_at(self.backend.as_mut(), path, data)
    }

    /// Read `name` from the system root.
    pub fn read_system_file(&mut self, name: &str) -> Result<Vec<u8>> {
        let path = self.scratch.join(Some(self.roots.system()), Some(name));
        read_whole_at(self.backend.as_mut(), path)
    }

    /// Read `name` from the save root.
    pub fn read_save_file(&mut self, name: &str) -> Result<Vec<u8>> {
        let save = self.roots.ensure_save_root(self.host.as_mut(), self.config.max_path);
        let path = self.scratch.join(Some(save), Some(name));
        read_whole_at(self.backend.as_mut(), path)
    }

    /// Write `name` under the save root.
    pub fn write_save_file(&mut self, name: &str, data: &[u8]) -> Result<()> {
        let save = self.roots.ensure_save_root(self.host.as_mut(), self.config.max_path);
        let path = self.scratch.join(Some(save), Some(name));
        write_whole_at(self.backend.as_mut(), path, data)
    }

    pub fn save_exists(&mut self, name: &str) -> bool {
        let save = self.roots.ensure_save_root(self.host.as_mut(), self.config.max_path);
        let path = self.scratch.join(Some(save), Some(name));
        exists_at(self.backend.as_mut(), path)
    }

    pub fn open_system(&mut self, name: &str, mode: OpenMode) -> Result<FileHandle> {
        let path = self.scratch.join(Some(self.roots.system()), Some(name));
        debug!("open('{}', {:?})", path, mode);
        self.backend.open(path, mode)
    }

    pub fn open_save(&mut self, name: &str, mode: OpenMode) -> Result<FileHandle> {
        let save = self.roots.ensure_save_root(self.host.as_mut(), self.config.max_path);
        let path = self.scratch.join(Some(save), Some(name));
        debug!("open('{}', {:?})", path, mode);
        self.backend.open(path, mode)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Handle operations
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn open(&mut self, path: &str, mode: OpenMode) -> Result<FileHandle> {
        debug!("open('{}', {:?})", path, mode);
        self.backend.open(path, mode)
    }

    /// Whether `path` is an accessible regular file. Directories never count.
    pub fn exists(&mut self, path: &str) -> bool {
        let found = exists_at(self.backend.as_mut(), path);
        debug!("exists('{}') = {}", path, found);
        found
    }

    pub fn close(&mut self, file: FileHandle) -> Result<()> {
        debug!("close({:?})", file);
        self.backend.close(file)
    }

    pub fn seek(&mut self, file: &mut FileHandle, offset: i64, whence: Whence) -> Result<u64> {
        debug!("seek({:?}, {}, {:?})", file, offset, whence);
        self.backend.seek(file, offset, whence)
    }

    pub fn tell(&mut self, file: &mut FileHandle) -> Result<u64> {
        self.backend.tell(file)
    }

    /// Read into `buf`; returns the byte count, 0 at end of file or on error.
    pub fn read(&mut self, file: &mut FileHandle, buf: &mut [u8]) -> usize {
        let n = self.backend.read(file, buf);
        debug!("read({:?}, {}) = {}", file, buf.len(), n);
        n
    }

    /// Write `buf`; returns the byte count, 0 on error.
    pub fn write(&mut self, file: &mut FileHandle, buf: &[u8]) -> usize {
        let n = self.backend.write(file, buf);
        debug!("write({:?}, {}) = {}", file, buf.len(), n);
        n
    }

    pub fn flush(&mut self, file: &mut FileHandle) -> Result<()> {
        debug!("flush({:?})", file);
        self.backend.flush(file)
    }

    pub fn remove(&mut self, path: &str) -> Result<()> {
        debug!("remove('{}')", path);
        self.backend.remove(path)
    }

    pub fn rename(&mut self, old_path: &str, new_path: &str) -> Result<()> {
        debug!("rename('{}', '{}')", old_path, new_path);
        self.backend.rename(old_path, new_path)
    }

    pub fn stat(&mut self, path: &str) -> Result<Metadata> {
        debug!("stat('{}')", path);
        self.backend.stat(path)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Directory operations
    // ═══════════════════════════════════════════════════════════════════════════

    /// Start enumerating `path`, hidden entries included.
    pub fn opendir(&mut self, path: &str) -> Option<DirHandle> {
        debug!("opendir('{}')", path);
        self.backend.opendir(path, true)
    }

    /// Next entry. The returned record is overwritten by the following call.
    pub fn readdir<'d>(&mut self, dir: &'d mut DirHandle) -> Option<&'d Dirent> {
        self.backend.readdir(dir)
    }

    pub fn closedir(&mut self, dir: DirHandle) -> Result<()> {
        debug!("closedir({:?})", dir);
        self.backend.closedir(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScanLimits;
    use crate::host::LocalHost;
    use crate::vfs::{VfsAccess, VfsDir, VfsFile, VfsInterface, VfsNegotiation, VfsSeek, VfsStat};
    use std::cell::Cell;
    use std::fs;
    use std::path::Path;
    use std::rc::Rc;

    /// (label, negotiated vfs version, backend the session should end up on)
    const HOSTS: [(&str, Option<u32>, BackendKind); 3] = [
        ("native", None, BackendKind::Native),
        ("vfs3", Some(3), BackendKind::Vfs),
        ("vfs2", Some(2), BackendKind::Native),
    ];

    fn s(p: &Path) -> String {
        p.to_string_lossy().into_owned()
    }

    /// Build a session over `<root>/system` and `<root>/save`.
    fn session(root: &Path, vfs: Option<u32>, config: CoreFsConfig) -> CoreFs {
        fs::create_dir_all(root.join("system")).unwrap();
        fs::create_dir_all(root.join("save")).unwrap();
        let mut host = LocalHost::new()
            .with_system_dir(s(&root.join("system")))
            .with_save_dir(s(&root.join("save")));
        if let Some(version) = vfs {
            host = host.with_vfs(version);
        }
        let mut cfs = CoreFs::new(Box::new(host), config);
        cfs.set_environment();
        cfs
    }

    fn each_backend(mut check: impl FnMut(&str, &Path, CoreFs)) {
        for (label, vfs, _) in HOSTS {
            let dir = tempfile::tempdir().unwrap();
            let cfs = session(dir.path(), vfs, CoreFsConfig::default());
            check(label, dir.path(), cfs);
        }
    }

    #[test]
    fn test_backend_selection() {
        for (label, vfs, expected) in HOSTS {
            let dir = tempfile::tempdir().unwrap();
            let cfs = session(dir.path(), vfs, CoreFsConfig::default());
            assert_eq!(cfs.backend_kind(), expected, "{}", label);
            assert_eq!(cfs.capability().available, vfs.is_some(), "{}", label);
        }
    }

    #[test]
    fn test_native_only_config_skips_negotiation() {
        let dir = tempfile::tempdir().unwrap();
        let cfs = session(dir.path(), Some(3), CoreFsConfig::default().native_only());
        assert_eq!(cfs.backend_kind(), BackendKind::Native);
        assert_eq!(cfs.capability(), BackendCapability::UNAVAILABLE);
    }

    #[test]
    fn test_whole_file_round_trip() {
        each_backend(|label, root, mut cfs| {
            let path = s(&root.join("state.bin"));
            let data: Vec<u8> = (0..=255u8).cycle().take(5000).collect();
            cfs.write_whole(&path, &data).unwrap();
            assert_eq!(cfs.read_whole(&path).unwrap(), data, "{}", label);

            // Rewriting truncates
            cfs.write_whole(&path, b"short").unwrap();
            assert_eq!(cfs.read_whole(&path).unwrap(), b"short", "{}", label);

            cfs.write_whole(&path, b"").unwrap();
            assert!(cfs.read_whole(&path).unwrap().is_empty(), "{}", label);
        });
    }

    #[test]
    fn test_read_whole_missing_is_not_found() {
        each_backend(|label, root, mut cfs| {
            let path = s(&root.join("absent.cfg"));
            assert!(matches!(cfs.read_whole(&path), Err(CoreFsError::NotFound(_))), "{}", label);
        });
    }

    #[test]
    fn test_write_whole_into_missing_directory_fails_to_open() {
        each_backend(|label, root, mut cfs| {
            let path = s(&root.join("nowhere").join("x.bin"));
            assert!(
                matches!(cfs.write_whole(&path, b"x"), Err(CoreFsError::OpenFailed { .. })),
                "{}",
                label
            );
        });
    }

    #[test]
    fn test_exists_is_false_for_directories() {
        each_backend(|label, root, mut cfs| {
            let file = s(&root.join("f.img"));
            fs::write(&file, b"x").unwrap();
            assert!(cfs.exists(&file), "{}", label);
            assert!(!cfs.exists(&s(&root.join("system"))), "{}", label);
            assert!(!cfs.exists(&s(&root.join("missing"))), "{}", label);
        });
    }

    #[test]
    fn test_read_at_eof_returns_zero() {
        each_backend(|label, root, mut cfs| {
            let path = s(&root.join("f"));
            fs::write(&path, b"abc").unwrap();
            let mut fh = cfs.open(&path, OpenMode::Read).unwrap();
            let mut buf = [0u8; 8];
            assert_eq!(cfs.read(&mut fh, &mut buf), 3, "{}", label);
            assert_eq!(&buf[..3], b"abc");
            assert_eq!(cfs.read(&mut fh, &mut buf), 0, "{}", label);
            cfs.close(fh).unwrap();
        });
    }

    #[test]
    fn test_open_modes_behave_alike() {
        each_backend(|label, root, mut cfs| {
            let path = s(&root.join("disk.st"));
            assert!(matches!(cfs.open(&path, OpenMode::Read), Err(CoreFsError::NotFound(_))), "{}", label);
            assert!(matches!(cfs.open(&path, OpenMode::Revise), Err(CoreFsError::NotFound(_))), "{}", label);

            let mut fh = cfs.open(&path, OpenMode::Write).unwrap();
            assert_eq!(cfs.write(&mut fh, b"abcdef"), 6);
            cfs.close(fh).unwrap();

            // Revise: existing contents kept, positioned at the start
            let mut fh = cfs.open(&path, OpenMode::Revise).unwrap();
            assert_eq!(cfs.tell(&mut fh).unwrap(), 0, "{}", label);
            assert_eq!(cfs.write(&mut fh, b"XY"), 2);
            cfs.seek(&mut fh, 0, Whence::Start).unwrap();
            let mut buf = [0u8; 6];
            assert_eq!(cfs.read(&mut fh, &mut buf), 6);
            assert_eq!(&buf, b"XYcdef", "{}", label);
            cfs.flush(&mut fh).unwrap();
            cfs.close(fh).unwrap();

            // Truncate: read-write, emptied
            let mut fh = cfs.open(&path, OpenMode::Truncate).unwrap();
            assert_eq!(cfs.read(&mut fh, &mut buf), 0, "{}", label);
            assert_eq!(cfs.write(&mut fh, b"z"), 1);
            cfs.close(fh).unwrap();
            assert_eq!(fs::read(&path).unwrap(), b"z", "{}", label);
        });
    }

    #[test]
    fn test_seek_and_tell() {
        each_backend(|label, root, mut cfs| {
            let path = s(&root.join("f"));
            fs::write(&path, b"0123456789").unwrap();
            let mut fh = cfs.open(&path, OpenMode::Read).unwrap();
            assert_eq!(cfs.seek(&mut fh, -3, Whence::End).unwrap(), 7, "{}", label);
            assert_eq!(cfs.seek(&mut fh, -2, Whence::Current).unwrap(), 5, "{}", label);
            assert_eq!(cfs.tell(&mut fh).unwrap(), 5, "{}", label);
            let mut b = [0u8; 1];
            cfs.read(&mut fh, &mut b);
            assert_eq!(&b, b"5");
            assert!(cfs.seek(&mut fh, -1, Whence::Start).is_err(), "{}", label);
            cfs.close(fh).unwrap();
        });
    }

    #[test]
    fn test_remove_and_rename() {
        each_backend(|label, root, mut cfs| {
            let a = s(&root.join("a"));
            let b = s(&root.join("b"));
            cfs.write_whole(&a, b"1").unwrap();
            cfs.rename(&a, &b).unwrap();
            assert!(!cfs.exists(&a), "{}", label);
            assert!(cfs.exists(&b), "{}", label);
            cfs.remove(&b).unwrap();
            assert!(!cfs.exists(&b), "{}", label);
            assert!(matches!(cfs.remove(&b), Err(CoreFsError::RemoveFailed(_))), "{}", label);
            assert!(matches!(cfs.rename(&a, &b), Err(CoreFsError::RenameFailed { .. })), "{}", label);
        });
    }

    #[test]
    fn test_stat_and_features() {
        each_backend(|label, root, mut cfs| {
            let path = s(&root.join("f"));
            fs::write(&path, b"1234").unwrap();
            let meta = cfs.stat(&path).unwrap();
            assert_eq!(meta.size, 4, "{}", label);
            assert!(!meta.is_dir());
            assert!(meta.is_writable());
            if cfs.features().timestamps {
                assert!(meta.modified > 0, "{}", label);
            } else {
                assert_eq!(meta.modified, 0, "{}", label);
            }
            assert!(cfs.stat(&s(&root.join("system"))).unwrap().is_dir(), "{}", label);
            assert!(matches!(cfs.stat(&s(&root.join("nope"))), Err(CoreFsError::NotFound(_))));
        });
    }

    #[test]
    fn test_readdir_names_copied_before_next_call() {
        each_backend(|label, root, mut cfs| {
            let listing = root.join("listing");
            fs::create_dir(&listing).unwrap();
            fs::write(listing.join("a.st"), b"").unwrap();
            fs::write(listing.join(".hidden"), b"").unwrap();
            fs::create_dir(listing.join("sub")).unwrap();

            let mut dir = cfs.opendir(&s(&listing)).unwrap();
            let mut names = Vec::new();
            while let Some(entry) = cfs.readdir(&mut dir) {
                names.push(entry.name().to_owned());
            }
            cfs.closedir(dir).unwrap();
            names.sort();
            assert_eq!(names, [".hidden", "a.st", "sub"], "{}", label);

            assert!(cfs.opendir(&s(&root.join("missing"))).is_none(), "{}", label);
        });
    }

    #[test]
    fn test_catalog_scan() {
        each_backend(|label, root, _| {
            let system = root.join("system");
            fs::write(system.join("tos.img"), b"rom").unwrap();
            fs::create_dir(system.join("hatarib")).unwrap();
            fs::write(system.join("hatarib").join("x.img"), b"").unwrap();
            fs::create_dir(system.join("hatarib").join("demo")).unwrap();

            // Rescan now that the fixture exists
            let vfs = HOSTS.iter().find(|h| h.0 == label).and_then(|h| h.1);
            let cfs = session(root, vfs, CoreFsConfig::default());
            let cat = cfs.catalog();
            assert_eq!(cat.file_count(), 2, "{}", label);
            assert_eq!(cat.file_label(0), "tos.img");
            assert_eq!(cat.file_label(1), "hatarib/x.img");
            assert_eq!(cat.dir_count(), 1, "{}", label);
            assert_eq!(cat.dir_name(0), "demo");
            assert_eq!(cat.dir_label(0), "demo/");
        });
    }

    #[test]
    fn test_empty_system_root_gives_empty_catalog() {
        each_backend(|label, _, cfs| {
            assert!(cfs.catalog().is_empty(), "{}", label);
            assert_eq!(cfs.catalog().file_label(0), "");
        });
    }

    #[test]
    fn test_boot_firmware_directory_is_ignored() {
        each_backend(|label, root, _| {
            fs::create_dir(root.join("system").join("tos.img")).unwrap();
            let vfs = HOSTS.iter().find(|h| h.0 == label).and_then(|h| h.1);
            let cfs = session(root, vfs, CoreFsConfig::default());
            assert_eq!(cfs.catalog().file_count(), 0, "{}", label);
        });
    }

    #[test]
    fn test_catalog_caps_are_respected() {
        let dir = tempfile::tempdir().unwrap();
        let ext = dir.path().join("system").join("hatarib");
        fs::create_dir_all(&ext).unwrap();
        for i in 0..5 {
            fs::write(ext.join(format!("f{}.img", i)), b"").unwrap();
            fs::create_dir(ext.join(format!("d{}", i))).unwrap();
        }
        let limits = ScanLimits {
            max_files: 3,
            max_dirs: 2,
            ..ScanLimits::default()
        };
        for (label, vfs, _) in HOSTS {
            let cfs = session(dir.path(), vfs, CoreFsConfig::default().with_scan_limits(limits));
            assert_eq!(cfs.catalog().file_count(), 3, "{}", label);
            assert_eq!(cfs.catalog().dir_count(), 2, "{}", label);
        }
    }

    #[test]
    fn test_system_and_save_relative_access() {
        each_backend(|label, root, mut cfs| {
            fs::write(root.join("system").join("keys.cfg"), b"k=1").unwrap();
            assert_eq!(cfs.read_system_file("keys.cfg").unwrap(), b"k=1", "{}", label);

            assert!(!cfs.save_exists("slot0.sav"));
            cfs.write_save_file("slot0.sav", b"state").unwrap();
            assert!(cfs.save_exists("slot0.sav"), "{}", label);
            assert_eq!(cfs.read_save_file("slot0.sav").unwrap(), b"state");
            assert_eq!(fs::read(root.join("save").join("slot0.sav")).unwrap(), b"state");

            let mut fh = cfs.open_save("slot0.sav", OpenMode::Revise).unwrap();
            assert_eq!(cfs.write(&mut fh, b"S"), 1);
            cfs.close(fh).unwrap();
            let mut fh = cfs.open_system("keys.cfg", OpenMode::Read).unwrap();
            let mut buf = [0u8; 3];
            assert_eq!(cfs.read(&mut fh, &mut buf), 3);
            cfs.close(fh).unwrap();
            assert_eq!(cfs.read_save_file("slot0.sav").unwrap(), b"State", "{}", label);
        });
    }

    /// Host whose save directory changes on every query.
    struct DriftingHost {
        queries: Rc<Cell<usize>>,
    }

    impl HostEnvironment for DriftingHost {
        fn negotiate_vfs(&mut self, _required_version: u32) -> Option<VfsNegotiation> {
            None
        }

        fn system_directory(&mut self) -> Option<String> {
            None
        }

        fn save_directory(&mut self) -> Option<String> {
            self.queries.set(self.queries.get() + 1);
            Some(format!("/saves/{}", self.queries.get()))
        }
    }

    #[test]
    fn test_save_root_resolved_once_per_session() {
        let queries = Rc::new(Cell::new(0));
        let host = DriftingHost {
            queries: Rc::clone(&queries),
        };
        let mut cfs = CoreFs::new(Box::new(host), CoreFsConfig::default());
        assert_eq!(cfs.roots().save(), None);

        let first = cfs.ensure_save_root().to_owned();
        // Re-initializing the session does not reset it either
        cfs.set_environment();
        let second = cfs.ensure_save_root().to_owned();
        assert_eq!(first, "/saves/1/");
        assert_eq!(first, second);
        assert_eq!(queries.get(), 1);
    }

    #[test]
    fn test_set_environment_twice_keeps_vfs() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfs = session(dir.path(), Some(3), CoreFsConfig::default());
        cfs.set_environment();
        assert_eq!(cfs.backend_kind(), BackendKind::Vfs);
        assert_eq!(cfs.capability(), BackendCapability::available(3));
    }

    #[test]
    fn test_handle_from_other_backend_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = s(&dir.path().join("f"));
        let mut native = CoreFs::new(Box::new(LocalHost::new()), CoreFsConfig::default());
        let fh = native.open(&path, OpenMode::Write).unwrap();

        let mut vfs = session(dir.path(), Some(3), CoreFsConfig::default());
        assert!(matches!(vfs.close(fh), Err(CoreFsError::ForeignHandle(BackendKind::Native))));
    }

    #[test]
    fn test_read_whole_passes_open_error_through() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfs = session(dir.path(), Some(3), CoreFsConfig::default());
        // Exists, but the interface will not open a directory as a file
        let system = s(&dir.path().join("system"));
        assert!(matches!(cfs.read_whole(&system), Err(CoreFsError::OpenFailed { .. })));
    }

    #[test]
    fn test_custom_firmware_and_extensions_dir() {
        each_backend(|label, root, _| {
            let system = root.join("system");
            fs::write(system.join("rom.img"), b"rom").unwrap();
            fs::write(system.join("tos.img"), b"rom").unwrap();
            fs::create_dir_all(system.join("ext").join("demo")).unwrap();
            fs::write(system.join("ext").join("x.img"), b"").unwrap();
            fs::create_dir(system.join("hatarib")).unwrap();
            fs::write(system.join("hatarib").join("y.img"), b"").unwrap();

            let config = CoreFsConfig::default()
                .with_boot_firmware("rom.img")
                .with_extensions_dir("ext");
            let vfs = HOSTS.iter().find(|h| h.0 == label).and_then(|h| h.1);
            let cfs = session(root, vfs, config);
            let cat = cfs.catalog();
            assert_eq!(cat.file_count(), 2, "{}", label);
            assert_eq!(cat.file_label(0), "rom.img");
            assert_eq!(cat.file_label(1), "ext/x.img");
            assert_eq!(cat.dir_count(), 1, "{}", label);
            assert_eq!(cat.dir_label(0), "demo/");
        });
    }

    #[test]
    fn test_max_path_bounds_root_relative_paths() {
        each_backend(|label, root, _| {
            let system = root.join("system");
            fs::write(system.join("key"), b"short").unwrap();
            fs::write(system.join("keys.cfg"), b"full").unwrap();

            // Room for the root plus three more bytes and the terminator
            let system_root = format!("{}/", s(&system));
            let config = CoreFsConfig::default().with_max_path(system_root.len() + 4);
            let vfs = HOSTS.iter().find(|h| h.0 == label).and_then(|h| h.1);
            let mut cfs = session(root, vfs, config);
            assert_eq!(cfs.roots().system(), system_root, "{}", label);
            assert_eq!(cfs.read_system_file("keys.cfg").unwrap(), b"short", "{}", label);
        });
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Interface failures that a real directory tree never produces
    // ═══════════════════════════════════════════════════════════════════════════

    #[derive(Default)]
    struct CallLog {
        writes: Cell<usize>,
        closes: Cell<usize>,
    }

    /// Interface answering every call on one file with fixed results.
    struct ScriptedVfs {
        size: i64,
        read: i64,
        write: i64,
        log: Rc<CallLog>,
    }

    impl VfsInterface for ScriptedVfs {
        fn open(&mut self, _path: &str, _access: VfsAccess) -> Option<VfsFile> {
            Some(VfsFile::new(1))
        }

        fn close(&mut self, _file: VfsFile) -> i32 {
            self.log.closes.set(self.log.closes.get() + 1);
            0
        }

        fn size(&mut self, _file: &VfsFile) -> i64 {
            self.size
        }

        fn tell(&mut self, _file: &VfsFile) -> i64 {
            0
        }

        fn seek(&mut self, _file: &VfsFile, _offset: i64, _whence: VfsSeek) -> i64 {
            0
        }

        fn read(&mut self, _file: &VfsFile, buf: &mut [u8]) -> i64 {
            if let Ok(n) = usize::try_from(self.read) {
                let len = buf.len();
                buf[..n.min(len)].fill(b'x');
            }
            self.read
        }

        fn write(&mut self, _file: &VfsFile, _buf: &[u8]) -> i64 {
            self.log.writes.set(self.log.writes.get() + 1);
            self.write
        }

        fn flush(&mut self, _file: &VfsFile) -> i32 {
            0
        }

        fn remove(&mut self, _path: &str) -> i32 {
            0
        }

        fn rename(&mut self, _old_path: &str, _new_path: &str) -> i32 {
            0
        }

        fn stat(&mut self, _path: &str) -> (VfsStat, i32) {
            (VfsStat::IS_VALID, 0)
        }

        fn opendir(&mut self, _path: &str, _include_hidden: bool) -> Option<VfsDir> {
            None
        }

        fn readdir(&mut self, _dir: &VfsDir) -> bool {
            false
        }

        fn dirent_name(&self, _dir: &VfsDir) -> Option<&str> {
            None
        }

        fn dirent_is_dir(&self, _dir: &VfsDir) -> bool {
            false
        }

        fn closedir(&mut self, _dir: VfsDir) -> i32 {
            0
        }
    }

    /// Host negotiating a [`ScriptedVfs`] at version 3.
    struct ScriptedHost {
        vfs: Option<ScriptedVfs>,
    }

    impl HostEnvironment for ScriptedHost {
        fn negotiate_vfs(&mut self, _required_version: u32) -> Option<VfsNegotiation> {
            self.vfs.take().map(|vfs| VfsNegotiation {
                version: 3,
                interface: Box::new(vfs),
            })
        }

        fn system_directory(&mut self) -> Option<String> {
            None
        }

        fn save_directory(&mut self) -> Option<String> {
            None
        }
    }

    fn scripted(size: i64, read: i64, write: i64) -> (CoreFs, Rc<CallLog>) {
        let log = Rc::new(CallLog::default());
        let vfs = ScriptedVfs {
            size,
            read,
            write,
            log: Rc::clone(&log),
        };
        let mut cfs = CoreFs::new(Box::new(ScriptedHost { vfs: Some(vfs) }), CoreFsConfig::default());
        cfs.set_environment();
        assert_eq!(cfs.backend_kind(), BackendKind::Vfs);
        (cfs, log)
    }

    #[test]
    fn test_size_failure_returns_no_data() {
        let (mut cfs, log) = scripted(-1, 10, 0);
        let closes = log.closes.get();
        assert!(matches!(cfs.read_whole("state.bin"), Err(CoreFsError::ReadFailed(_))));
        assert_eq!(log.closes.get(), closes + 1);
    }

    #[test]
    fn test_short_read_is_an_error() {
        let (mut cfs, _) = scripted(10, 4, 0);
        assert!(matches!(cfs.read_whole("state.bin"), Err(CoreFsError::ReadFailed(_))));

        let (mut cfs, _) = scripted(4, 4, 0);
        assert_eq!(cfs.read_whole("state.bin").unwrap(), b"xxxx");
    }

    #[test]
    fn test_short_write_is_reported_once() {
        let (mut cfs, log) = scripted(0, 0, 3);
        let result = cfs.write_whole("state.bin", b"12345");
        assert!(matches!(
            result,
            Err(CoreFsError::WriteFailed {
                written: 3,
                expected: 5,
                ..
            })
        ));
        assert_eq!(log.writes.get(), 1);
    }

    #[test]
    fn test_negative_counts_read_as_zero() {
        let (mut cfs, _) = scripted(8, -7, -7);
        let mut fh = cfs.open("disk.st", OpenMode::Revise).unwrap();
        assert_eq!(cfs.read(&mut fh, &mut [0u8; 8]), 0);
        assert_eq!(cfs.write(&mut fh, b"abc"), 0);
        cfs.close(fh).unwrap();
    }
}
