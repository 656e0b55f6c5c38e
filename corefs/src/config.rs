//! Session configuration
//!
//! Defaults describe the emulator this layer was built for: a `tos.img` boot
//! image and a `hatarib/` extensions folder under the system directory.

use crate::capability::MIN_FULL_VERSION;

/// Default scratch path bound, terminator included.
pub const DEFAULT_MAX_PATH: usize = 2048;
/// Default catalog label bound, terminator included.
pub const DEFAULT_MAX_LABEL: usize = 256;
pub const DEFAULT_MAX_FILES: usize = 128;
pub const DEFAULT_MAX_DIRS: usize = 16;

/// Capacity of the asset catalog. Discoveries past a limit are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanLimits {
    pub max_files: usize,
    pub max_dirs: usize,
    /// Longest label kept, terminator included.
    pub max_label: usize,
}

impl Default for ScanLimits {
    fn default() -> Self {
        Self {
            max_files: DEFAULT_MAX_FILES,
            max_dirs: DEFAULT_MAX_DIRS,
            max_label: DEFAULT_MAX_LABEL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreFsConfig {
    /// Ask the host for its file interface at all. Off means native only.
    pub use_advanced_vfs: bool,
    pub required_vfs_version: u32,
    pub max_path: usize,
    pub scan: ScanLimits,
    /// Boot firmware file looked for directly under the system root.
    pub boot_firmware: String,
    /// Extensions subdirectory of the system root.
    pub extensions_dir: String,
}

impl Default for CoreFsConfig {
    fn default() -> Self {
        Self {
            use_advanced_vfs: true,
            required_vfs_version: MIN_FULL_VERSION,
            max_path: DEFAULT_MAX_PATH,
            scan: ScanLimits::default(),
            boot_firmware: String::from("tos.img"),
            extensions_dir: String::from("hatarib"),
        }
    }
}

impl CoreFsConfig {
    pub fn native_only(mut self) -> Self {
        self.use_advanced_vfs = false;
        self
    }

    pub fn with_max_path(mut self, max_path: usize) -> Self {
        self.max_path = max_path;
        self
    }

    pub fn with_scan_limits(mut self, scan: ScanLimits) -> Self {
        self.scan = scan;
        self
    }

    pub fn with_boot_firmware(mut self, name: impl Into<String>) -> Self {
        self.boot_firmware = name.into();
        self
    }

    pub fn with_extensions_dir(mut self, name: impl Into<String>) -> Self {
        self.extensions_dir = name.into();
        self
    }
}
