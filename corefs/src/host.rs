//! Host environment queries
//!
//! The emulation host answers three optional questions by key: can it provide
//! the advanced file interface (and at which version), where do system assets
//! live, and where should per-content saves go. Any of them may be missing;
//! the save directory in particular is often unknown until content starts
//! loading.

use crate::vfs::{LocalVfs, VfsNegotiation};

/// Query-by-key protocol offered by the emulation host.
pub trait HostEnvironment {
    /// Negotiate the advanced file interface, asking for at least `required_version`.
    fn negotiate_vfs(&mut self, required_version: u32) -> Option<VfsNegotiation>;

    /// Directory holding shared, read-only assets.
    fn system_directory(&mut self) -> Option<String>;

    /// Directory for per-content persistent state.
    fn save_directory(&mut self) -> Option<String>;
}

/// Host answering from fixed values, serving [`LocalVfs`] when asked to.
#[derive(Debug, Clone, Default)]
pub struct LocalHost {
    system_dir: Option<String>,
    save_dir: Option<String>,
    vfs_version: Option<u32>,
    save_queries: usize,
}

impl LocalHost {
    /// A host that offers nothing: no interface, no directories.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_system_dir(mut self, dir: impl Into<String>) -> Self {
        self.system_dir = Some(dir.into());
        self
    }

    pub fn with_save_dir(mut self, dir: impl Into<String>) -> Self {
        self.save_dir = Some(dir.into());
        self
    }

    /// Offer a [`LocalVfs`] at `version`, whatever version the core asks for.
    pub fn with_vfs(mut self, version: u32) -> Self {
        self.vfs_version = Some(version);
        self
    }

    /// How many times the save directory was asked for.
    pub fn save_queries(&self) -> usize {
        self.save_queries
    }
}

impl HostEnvironment for LocalHost {
    fn negotiate_vfs(&mut self, _required_version: u32) -> Option<VfsNegotiation> {
        let version = self.vfs_version?;
        Some(VfsNegotiation {
            version,
            interface: Box::new(LocalVfs::new()),
        })
    }

    fn system_directory(&mut self) -> Option<String> {
        self.system_dir.clone()
    }

    fn save_directory(&mut self) -> Option<String> {
        self.save_queries += 1;
        self.save_dir.clone()
    }
}
