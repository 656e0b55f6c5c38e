//! Backend capability negotiation
//!
//! Records whether the host offers the advanced file-services interface and at
//! which version. The value is resolved once per session and only ever moves
//! from "unavailable" to "available": hosts are known to fail a second
//! negotiation, so once an interface is held the existing value is kept.

use log::info;

use crate::host::HostEnvironment;
use crate::vfs::{VfsInterface, VfsNegotiation};

/// Lowest negotiated version that offers sized reads, stat, rename, remove and
/// directory enumeration. Anything below is treated as unavailable.
pub const MIN_FULL_VERSION: u32 = 3;

/// Negotiated state of the advanced interface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackendCapability {
    pub available: bool,
    /// Meaningful only when `available` is set.
    pub version: u32,
}

impl BackendCapability {
    pub const UNAVAILABLE: Self = Self {
        available: false,
        version: 0,
    };

    pub const fn available(version: u32) -> Self {
        Self {
            available: true,
            version,
        }
    }

    /// Whether operations should be routed to the advanced interface.
    pub fn is_full(&self) -> bool {
        self.available && self.version >= MIN_FULL_VERSION
    }
}

/// What a backend can actually report.
///
/// The advanced interface carries no timestamps and no permission bits, so
/// [`Metadata`](crate::Metadata) from it holds zero times and an assumed
/// owner-write bit. Callers that care check this descriptor instead of
/// trusting those fields blindly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendFeatures {
    pub timestamps: bool,
    pub permissions: bool,
}

/// Capability plus the interface it was negotiated for.
#[derive(Default)]
pub(crate) struct Negotiated {
    pub capability: BackendCapability,
    pub interface: Option<Box<dyn VfsInterface>>,
}

impl Negotiated {
    /// Ask the host for the advanced interface unless one is already held.
    ///
    /// Returns `true` when this call changed the state.
    pub fn resolve(&mut self, host: &mut dyn HostEnvironment, required_version: u32) -> bool {
        if self.capability.available {
            // Renegotiation is known to fail on some hosts; keep what we have
            info!("vfs version: {}", self.capability.version);
            return false;
        }
        match host.negotiate_vfs(required_version) {
            Some(VfsNegotiation { version, interface }) => {
                info!("vfs version: {}", version);
                self.capability = BackendCapability::available(version);
                self.interface = Some(interface);
                true
            }
            None => {
                info!("vfs not available");
                self.capability = BackendCapability::UNAVAILABLE;
                false
            }
        }
    }
}
