//! Deterministic snapshot encoding for emulated devices.
//!
//! The snapshot format uses a small tag-length-value (TLV) encoding to provide:
//! - deterministic byte output (canonical tag ordering)
//! - forward compatibility (unknown tags are skipped)
//! - explicit versioning (major/minor) at the device level

#![forbid(unsafe_code)]

mod version;

pub use version::{
    SnapshotError, SnapshotReader, SnapshotResult, SnapshotVersion, SnapshotWriter,
};

/// Snapshotting contract for emulated devices.
///
/// Implementations must keep `DEVICE_ID` stable forever and only perform
/// forward-compatible additions within the same major version by adding new
/// TLV fields.
pub trait IoSnapshot {
    const DEVICE_ID: [u8; 4];
    const DEVICE_VERSION: SnapshotVersion;

    fn save_state(&self) -> Vec<u8>;
    fn load_state(&mut self, bytes: &[u8]) -> SnapshotResult<()>;
}
