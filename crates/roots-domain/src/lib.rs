//! RootsLegacy Domain Layer
//!
//! This crate defines the value types shared by every other layer of the
//! family graph: person profiles, typed relationships between them, the
//! key layout used to persist both, and the trait boundary to the
//! key-value store the graph engine runs on.
//!
//! ## Key Concepts
//!
//! - **Profile**: one person, optionally claimed by a user account
//! - **Relationship**: a typed edge between exactly two distinct profiles
//! - **Adjacency index**: per-profile list of relationship ids
//! - **Pair key**: canonical existence key for an unordered pair and kind
//!
//! ## Architecture
//!
//! - No storage or transport code lives here
//! - Infrastructure implementations live in `roots-store`
//! - Graph operations live in `roots-graph`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ids;
pub mod keys;
pub mod profile;
pub mod relationship;
pub mod traits;

// Re-exports for convenience
pub use ids::{ProfileId, RelationshipId};
pub use profile::{NewProfile, Profile, ProfileUpdate};
pub use relationship::{
    RelatedProfile, Relationship, RelationshipKind, RelationshipMetadata, RelationshipUpdate,
};
pub use traits::{KeyValueStore, KvWrite};

/// Current wall-clock time in Unix milliseconds
///
/// All record timestamps (`created_at`, `updated_at`) use this unit.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
