//! System and save roots
//!
//! The system root is known as soon as the host is attached. The save root is
//! not: hosts commonly answer the save-directory query only once content
//! starts loading, so it is looked up on first use and then frozen, whether
//! the lookup worked or not.

use log::{debug, info};

use crate::host::HostEnvironment;
use crate::path::truncated;

/// Path separator appended to every non-empty root.
pub const SEPARATOR: char = '/';

/// Resolved roots. Empty means "relative to the working directory".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathRoots {
    system: String,
    save: String,
    save_ready: bool,
}

/// Bound `dir` to `max_path` and make it end in exactly one separator.
pub fn normalize_root(dir: &str, max_path: usize) -> String {
    // Leave room for the separator we may add
    let dir = truncated(dir, max_path.saturating_sub(1));
    if dir.is_empty() {
        return String::new();
    }
    let trimmed = dir.trim_end_matches(['/', '\\']);
    if trimmed.is_empty() {
        // Filesystem root itself
        return SEPARATOR.to_string();
    }
    let mut root = String::with_capacity(trimmed.len() + 1);
    root.push_str(trimmed);
    root.push(SEPARATOR);
    root
}

impl PathRoots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn system(&self) -> &str {
        &self.system
    }

    /// The save root, if it was resolved already.
    pub fn save(&self) -> Option<&str> {
        self.save_ready.then_some(self.save.as_str())
    }

    pub fn save_ready(&self) -> bool {
        self.save_ready
    }

    /// Query the host for the system directory. Nothing provided leaves it empty.
    pub fn init_system_root(&mut self, host: &mut dyn HostEnvironment, max_path: usize) {
        match host.system_directory() {
            Some(dir) => {
                debug!("system directory query succeeded");
                self.system = normalize_root(&dir, max_path);
            }
            None => self.system.clear(),
        }
        info!("system_path: {}", self.system);
    }

    /// Resolve the save root on first call; later calls return the frozen value.
    pub fn ensure_save_root(&mut self, host: &mut dyn HostEnvironment, max_path: usize) -> &str {
        if !self.save_ready {
            match host.save_directory() {
                Some(dir) => {
                    debug!("save directory query succeeded");
                    self.save = normalize_root(&dir, max_path);
                }
                None => self.save.clear(),
            }
            info!("save_path: {}", self.save);
            self.save_ready = true;
        }
        &self.save
    }
}
