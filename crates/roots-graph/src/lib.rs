//! RootsLegacy Relationship Graph
//!
//! Profiles and typed relationships on top of any `KeyValueStore`.
//!
//! # Components
//!
//! - [`ProfileDirectory`]: create/read/update profiles, invitation-based claiming
//! - [`RelationshipGraph`]: typed edges, adjacency queries, family-tree traversal
//! - [`calculate_generations`]: generation depth for exports
//! - [`RelationshipGraph::reconcile`]: heal index drift from the edge records
//!
//! # Examples
//!
//! ```no_run
//! use roots_domain::{NewProfile, RelationshipKind};
//! use roots_graph::RelationshipGraph;
//! use roots_store::MemoryStore;
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), roots_graph::GraphError> {
//! let graph = RelationshipGraph::new(Arc::new(MemoryStore::new()));
//! let ama = graph.profiles().create_profile(NewProfile::named("Ama"), "admin1").await?;
//! let kofi = graph.profiles().create_profile(NewProfile::named("Kofi"), "admin1").await?;
//! graph
//!     .create_relationship(&ama.id, &kofi.id, RelationshipKind::Spouse, "admin1", None)
//!     .await?;
//! let spouses = graph.get_spouses(&ama.id).await?;
//! assert_eq!(spouses[0].profile.name, "Kofi");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod directory;
mod engine;
mod error;
mod export;
mod generations;
mod reconcile;
mod records;
mod tree;

pub use directory::ProfileDirectory;
pub use engine::RelationshipGraph;
pub use error::{GraphError, Result};
pub use export::FamilyExport;
pub use generations::calculate_generations;
pub use reconcile::ReconcileReport;
pub use tree::{FamilyTreeNode, DEFAULT_TREE_DEPTH};
