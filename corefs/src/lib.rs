//! corefs: file access for a hosted emulator core
//!
//! The host may or may not hand the core a versioned file-services interface.
//! Everything here goes through one [`CoreFs`] session, which picks the
//! interface when it is recent enough (version 3 or later) and plain `std::fs`
//! otherwise, so callers never see the difference.
//!
//! # Layout
//!
//! ```text
//! access      CoreFs session: whole-file, handle and directory operations
//! ├── catalog     startup scan of the system root (boot firmware, extensions)
//! ├── roots       system root (eager) and save root (lazy, frozen once resolved)
//! ├── capability  negotiated interface version
//! ├── backend     FileBackend trait, Vfs and Native implementations
//! │   └── vfs         host interface contract, LocalVfs
//! ├── path        bounded, truncating path and label buffers
//! └── host        HostEnvironment queries, LocalHost
//! ```
//!
//! All state is owned by the session; nothing is global.

pub mod access;
pub mod backend;
pub mod capability;
pub mod catalog;
pub mod config;
pub mod error;
pub mod host;
pub mod path;
pub mod roots;
pub mod vfs;

pub use access::CoreFs;
pub use backend::{
    BackendKind, DirHandle, Dirent, FileBackend, FileHandle, Metadata, ModeFlags, NativeBackend, OpenMode,
    VfsBackend, Whence,
};
pub use capability::{BackendCapability, BackendFeatures};
pub use catalog::{AssetCatalog, DirEntry, FileEntry};
pub use config::{CoreFsConfig, ScanLimits};
pub use error::{CoreFsError, Result};
pub use host::{HostEnvironment, LocalHost};
pub use path::{append_truncated, copy_truncated, PathBuilder};
pub use roots::PathRoots;
pub use vfs::{LocalVfs, VfsInterface};
