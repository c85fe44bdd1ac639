//! Ego-centric family tree traversal
//!
//! The visited set is path-local: each branch gets its own copy, so a
//! profile may appear in several branches (a grandparent shared by two
//! parents) but never twice on one root-to-node path.

use crate::engine::RelationshipGraph;
use crate::Result;
use futures::future::{try_join_all, BoxFuture};
use roots_domain::{KeyValueStore, Profile, ProfileId, RelationshipKind};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// Default number of levels expanded below the root
pub const DEFAULT_TREE_DEPTH: usize = 3;

/// One profile with its four relation categories expanded
///
/// An entry is `None` when the depth bound was exceeded, the profile is
/// missing, or the profile already appears on the path from the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyTreeNode {
    /// The profile at this node
    pub profile: Profile,
    /// Spouses
    pub spouses: Vec<Option<FamilyTreeNode>>,
    /// Parents
    pub parents: Vec<Option<FamilyTreeNode>>,
    /// Children
    pub children: Vec<Option<FamilyTreeNode>>,
    /// Siblings
    pub siblings: Vec<Option<FamilyTreeNode>>,
}

impl FamilyTreeNode {
    /// Number of rendered (non-`None`) nodes in this subtree, including this one
    pub fn rendered_count(&self) -> usize {
        1 + [&self.spouses, &self.parents, &self.children, &self.siblings]
            .into_iter()
            .flatten()
            .flatten()
            .map(FamilyTreeNode::rendered_count)
            .sum::<usize>()
    }
}

#[derive(Default)]
struct Neighbours {
    spouses: Vec<ProfileId>,
    parents: Vec<ProfileId>,
    children: Vec<ProfileId>,
    siblings: Vec<ProfileId>,
}

impl<S: KeyValueStore> RelationshipGraph<S> {
    /// Build the family tree rooted at `profile_id`, `max_depth` levels deep
    ///
    /// The root is depth 0; with `max_depth == 0` the root's relation
    /// entries are all `None`. Returns `Ok(None)` when the root profile does
    /// not exist.
    pub async fn get_family_tree(
        &self,
        profile_id: &ProfileId,
        max_depth: usize,
    ) -> Result<Option<FamilyTreeNode>> {
        debug!(%profile_id, max_depth, "building family tree");
        self.tree_node(profile_id.clone(), 0, max_depth, HashSet::new())
            .await
    }

    fn tree_node(
        &self,
        profile_id: ProfileId,
        depth: usize,
        max_depth: usize,
        mut path: HashSet<ProfileId>,
    ) -> BoxFuture<'_, Result<Option<FamilyTreeNode>>> {
        Box::pin(async move {
            if depth > max_depth || path.contains(&profile_id) {
                return Ok(None);
            }
            let Some(profile) = self.profiles.get_profile(&profile_id).await? else {
                return Ok(None);
            };
            path.insert(profile_id.clone());

            let neighbours = self.neighbours(&profile_id).await?;
            let branch = |ids: Vec<ProfileId>| {
                try_join_all(
                    ids.into_iter()
                        .map(|id| self.tree_node(id, depth + 1, max_depth, path.clone())),
                )
            };

            let (spouses, parents, children, siblings) = futures::try_join!(
                branch(neighbours.spouses),
                branch(neighbours.parents),
                branch(neighbours.children),
                branch(neighbours.siblings),
            )?;

            Ok(Some(FamilyTreeNode {
                profile,
                spouses,
                parents,
                children,
                siblings,
            }))
        })
    }

    async fn neighbours(&self, profile_id: &ProfileId) -> Result<Neighbours> {
        let mut neighbours = Neighbours::default();
        for rel in self.get_profile_relationships(profile_id).await? {
            match rel.kind {
                RelationshipKind::Spouse => {
                    neighbours.spouses.extend(rel.other_endpoint(profile_id).cloned())
                }
                RelationshipKind::Sibling => {
                    neighbours.siblings.extend(rel.other_endpoint(profile_id).cloned())
                }
                RelationshipKind::Parent if &rel.profile_id_2 == profile_id => {
                    neighbours.parents.push(rel.profile_id_1)
                }
                RelationshipKind::Parent => neighbours.children.push(rel.profile_id_2),
            }
        }
        Ok(neighbours)
    }
}
