//! Family export snapshot (feeds the PDF renderer)

use crate::engine::RelationshipGraph;
use crate::generations::calculate_generations;
use crate::Result;
use roots_domain::{now_millis, KeyValueStore, Profile, Relationship};
use serde::{Deserialize, Serialize};

/// Everything a family book export needs, captured at one point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyExport {
    /// All profiles
    pub profiles: Vec<Profile>,
    /// All relationships
    pub relationships: Vec<Relationship>,
    /// Number of generations spanned by parent edges
    pub generations: usize,
    /// Snapshot time (Unix milliseconds)
    pub generated_at: u64,
}

impl<S: KeyValueStore> RelationshipGraph<S> {
    /// Snapshot every profile and relationship with the generation count
    pub async fn export(&self) -> Result<FamilyExport> {
        let profiles = self.profiles.list_profiles(None).await?;
        let relationships = self.get_all_relationships().await?;
        let generations = calculate_generations(&profiles, &relationships);

        Ok(FamilyExport {
            profiles,
            relationships,
            generations,
            generated_at: now_millis(),
        })
    }
}
