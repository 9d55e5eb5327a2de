//! Typed Identifiers
//!
//! Every record id is a 16-byte UUID wrapped in its own newtype so a team id
//! can never be passed where a match id is expected.
//! All ids implement Ord for deterministic BTreeMap ordering.

use serde::{Serialize, Deserialize};
use sha2::{Sha256, Digest};

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub [u8; 16]);

        impl $name {
            /// Create from raw bytes.
            pub const fn new(bytes: [u8; 16]) -> Self {
                Self(bytes)
            }

            /// Create a fresh random id.
            pub fn random() -> Self {
                Self(uuid::Uuid::new_v4().into_bytes())
            }

            /// Create from UUID string.
            pub fn from_uuid_str(s: &str) -> Option<Self> {
                uuid::Uuid::parse_str(s)
                    .ok()
                    .map(|u| Self(*u.as_bytes()))
            }

            /// Convert to UUID string.
            pub fn to_uuid_string(&self) -> String {
                uuid::Uuid::from_bytes(self.0).to_string()
            }

            /// Get raw bytes.
            pub fn as_bytes(&self) -> &[u8; 16] {
                &self.0
            }

            /// Short hex prefix for log lines.
            pub fn short(&self) -> String {
                hex::encode(&self.0[..4])
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.to_uuid_string())
            }
        }
    };
}

uuid_id!(
    /// Team identifier.
    TeamId
);

uuid_id!(
    /// Player identifier.
    PlayerId
);

uuid_id!(
    /// Match identifier.
    MatchId
);

uuid_id!(
    /// Innings identifier. Derived from the match id and batting position.
    InningsId
);

uuid_id!(
    /// Tournament identifier.
    TournamentId
);

/// Derive a stable 16-byte id from a domain tag and parts.
///
/// Same inputs always give the same id, so records created by a retried
/// operation land on the same key instead of duplicating.
pub fn derive_id(domain: &[u8], parts: &[&[u8]]) -> [u8; 16] {
    let mut hasher = Sha256::new();
    hasher.update(domain);
    for part in parts {
        hasher.update((part.len() as u32).to_le_bytes());
        hasher.update(part);
    }
    let hash = hasher.finalize();

    let mut id = [0u8; 16];
    id.copy_from_slice(&hash[..16]);
    id
}

impl InningsId {
    /// Id of the innings batted at `position` (0-3) within a match.
    pub fn for_match(match_id: MatchId, position: u8) -> Self {
        Self(derive_id(b"quad-cricket-innings:", &[match_id.as_bytes(), &[position]]))
    }
}
