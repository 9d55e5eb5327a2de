//! Snapshot Hashing
//!
//! Provides deterministic hashing of match snapshots for:
//! - Skipping byte-identical rewrites in the store
//! - Replay validation (action log must reproduce the same hash)

use sha2::{Sha256, Digest};

/// Hash output type (256 bits / 32 bytes)
pub type SnapshotHash = [u8; 32];

/// Deterministic hasher for match state.
///
/// Wraps SHA-256 with helpers for the scalar types used in snapshots.
/// Order of updates is critical for determinism.
pub struct SnapshotHasher {
    hasher: Sha256,
}

impl SnapshotHasher {
    /// Create a new hasher with domain separator.
    pub fn new(domain: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        Self { hasher }
    }

    /// Create hasher for match snapshots.
    pub fn for_match() -> Self {
        Self::new(b"QUAD_CRICKET_MATCH_V1")
    }

    /// Update with a u8 value.
    #[inline]
    pub fn update_u8(&mut self, value: u8) {
        self.hasher.update([value]);
    }

    /// Update with a u32 value (little-endian).
    #[inline]
    pub fn update_u32(&mut self, value: u32) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with an i32 value (little-endian).
    #[inline]
    pub fn update_i32(&mut self, value: i32) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with an i64 value (little-endian).
    #[inline]
    pub fn update_i64(&mut self, value: i64) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a boolean.
    #[inline]
    pub fn update_bool(&mut self, value: bool) {
        self.update_u8(value as u8);
    }

    /// Update with a 16-byte id.
    #[inline]
    pub fn update_id(&mut self, id: &[u8; 16]) {
        self.hasher.update(id);
    }

    /// Update with an optional 16-byte id. Absent and present are distinguished.
    pub fn update_opt_id(&mut self, id: Option<&[u8; 16]>) {
        match id {
            Some(id) => {
                self.update_u8(1);
                self.update_id(id);
            }
            None => self.update_u8(0),
        }
    }

    /// Finalize and return the hash.
    pub fn finalize(self) -> SnapshotHash {
        self.hasher.finalize().into()
    }
}

/// Compute a match snapshot hash.
///
/// Called by `Match::compute_hash()`; the closure adds the match contents.
pub fn compute_snapshot_hash<F>(match_id: &[u8; 16], add_state: F) -> SnapshotHash
where
    F: FnOnce(&mut SnapshotHasher),
{
    let mut hasher = SnapshotHasher::for_match();
    hasher.update_id(match_id);
    add_state(&mut hasher);
    hasher.finalize()
}
