//! Relationship graph engine
//!
//! Edges live under `relationship:<id>`. Every edge is listed in the
//! adjacency index of both endpoints, and owns the canonical pair key of
//! its unordered endpoint pair and kind. Creation and deletion write the
//! edge, both index entries and the pair key in one atomic batch.

use crate::directory::ProfileDirectory;
use crate::records::{encode, load, load_all, load_index};
use crate::{GraphError, Result};
use futures::future::try_join_all;
use roots_domain::{
    keys, now_millis, KeyValueStore, KvWrite, Profile, ProfileId, RelatedProfile, Relationship,
    RelationshipId, RelationshipKind, RelationshipMetadata, RelationshipUpdate,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Value stored under a pair key
///
/// Carries the endpoints so the key can be re-derived from the value
/// during reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct PairClaim {
    #[serde(rename = "relationshipId")]
    pub relationship_id: RelationshipId,
    #[serde(rename = "profileId1")]
    pub profile_id_1: ProfileId,
    #[serde(rename = "profileId2")]
    pub profile_id_2: ProfileId,
    #[serde(rename = "type")]
    pub kind: RelationshipKind,
}

impl PairClaim {
    pub(crate) fn for_relationship(relationship: &Relationship) -> Self {
        Self {
            relationship_id: relationship.id.clone(),
            profile_id_1: relationship.profile_id_1.clone(),
            profile_id_2: relationship.profile_id_2.clone(),
            kind: relationship.kind,
        }
    }

    pub(crate) fn key(&self) -> String {
        keys::relationship_pair(&self.profile_id_1, &self.profile_id_2, self.kind)
    }
}

/// Typed edges between profiles, with adjacency queries and traversal
pub struct RelationshipGraph<S> {
    pub(crate) store: Arc<S>,
    pub(crate) profiles: ProfileDirectory<S>,
}

impl<S> Clone for RelationshipGraph<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            profiles: self.profiles.clone(),
        }
    }
}

impl<S: KeyValueStore> RelationshipGraph<S> {
    /// Create a graph over `store`
    pub fn new(store: Arc<S>) -> Self {
        Self {
            profiles: ProfileDirectory::new(Arc::clone(&store)),
            store,
        }
    }

    /// The profile directory sharing this graph's store
    pub fn profiles(&self) -> &ProfileDirectory<S> {
        &self.profiles
    }

    /// Create a typed edge between two existing, distinct profiles
    ///
    /// For [`RelationshipKind::Parent`], `profile_id_1` is the parent.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` when both ids are equal
    /// - `NotFound` when either profile does not exist
    /// - `Conflict` when an edge of the same kind already joins the pair,
    ///   in either order
    pub async fn create_relationship(
        &self,
        profile_id_1: &ProfileId,
        profile_id_2: &ProfileId,
        kind: RelationshipKind,
        created_by: &str,
        metadata: Option<RelationshipMetadata>,
    ) -> Result<Relationship> {
        if profile_id_1 == profile_id_2 {
            return Err(GraphError::InvalidArgument(
                "Cannot create relationship with self".to_string(),
            ));
        }

        self.profiles.require_profile(profile_id_1).await?;
        self.profiles.require_profile(profile_id_2).await?;

        let relationship = Relationship {
            id: RelationshipId::generate(),
            profile_id_1: profile_id_1.clone(),
            profile_id_2: profile_id_2.clone(),
            kind,
            created_by: created_by.to_string(),
            created_at: now_millis(),
            metadata: metadata.unwrap_or_default(),
            updated_by: None,
            updated_at: None,
        };

        let claim = PairClaim::for_relationship(&relationship);
        self.claim_pair(&claim).await?;

        if let Err(e) = self.write_new_edge(&relationship).await {
            // Free the pair so the caller can retry; the write error wins
            if let Err(release_err) = self.release_pair(&claim).await {
                warn!(
                    pair_key = %claim.key(),
                    error = %release_err,
                    "failed to release pair key after write error"
                );
            }
            return Err(e);
        }

        info!(
            relationship_id = %relationship.id,
            profile_id_1 = %relationship.profile_id_1,
            profile_id_2 = %relationship.profile_id_2,
            kind = %relationship.kind,
            "created relationship"
        );
        Ok(relationship)
    }

    async fn write_new_edge(&self, relationship: &Relationship) -> Result<()> {
        let store = self.store.as_ref();
        let mut index_1 = load_index(store, &relationship.profile_id_1).await?;
        let mut index_2 = load_index(store, &relationship.profile_id_2).await?;
        push_unique(&mut index_1, &relationship.id);
        push_unique(&mut index_2, &relationship.id);

        let edge_key = keys::relationship(&relationship.id);
        let index_key_1 = keys::profile_relationships(&relationship.profile_id_1);
        let index_key_2 = keys::profile_relationships(&relationship.profile_id_2);
        let writes = vec![
            KvWrite::put(&edge_key, encode(&edge_key, relationship)?),
            KvWrite::put(&index_key_1, encode(&index_key_1, &index_1)?),
            KvWrite::put(&index_key_2, encode(&index_key_2, &index_2)?),
        ];
        store.apply(writes).await.map_err(GraphError::store)
    }

    /// Take ownership of a pair key, failing with `Conflict` when anything holds it
    async fn claim_pair(&self, claim: &PairClaim) -> Result<()> {
        let key = claim.key();
        let value = encode(&key, claim)?;
        if self
            .store
            .set_if_absent(&key, value)
            .await
            .map_err(GraphError::store)?
        {
            return Ok(());
        }

        // A taken key is never overwritten; the holder may still be mid-write
        let holder: Option<PairClaim> = load(self.store.as_ref(), &key).await?;
        if let Some(holder) = &holder {
            if self.get_relationship(&holder.relationship_id).await?.is_none() {
                warn!(
                    pair_key = %key,
                    holder_relationship = %holder.relationship_id,
                    "pair key held by a missing relationship; reconcile releases it"
                );
            }
        }
        Err(GraphError::Conflict(format!(
            "A {} relationship already exists between {} and {}",
            claim.kind, claim.profile_id_1, claim.profile_id_2
        )))
    }

    /// Drop a pair key if it still belongs to `claim`'s relationship
    async fn release_pair(&self, claim: &PairClaim) -> Result<()> {
        let key = claim.key();
        let holder: Option<PairClaim> = load(self.store.as_ref(), &key).await?;
        if holder.is_some_and(|h| h.relationship_id == claim.relationship_id) {
            self.store.del(&key).await.map_err(GraphError::store)?;
        }
        Ok(())
    }

    /// Get an edge by id
    pub async fn get_relationship(&self, id: &RelationshipId) -> Result<Option<Relationship>> {
        load(self.store.as_ref(), &keys::relationship(id)).await
    }

    /// The edge of `kind` joining `a` and `b` in either order, if any
    ///
    /// Resolved through the pair key rather than a scan of all edges.
    pub async fn find_relationship(
        &self,
        a: &ProfileId,
        b: &ProfileId,
        kind: RelationshipKind,
    ) -> Result<Option<Relationship>> {
        let key = keys::relationship_pair(a, b, kind);
        let Some(claim) = load::<_, PairClaim>(self.store.as_ref(), &key).await? else {
            return Ok(None);
        };
        Ok(self
            .get_relationship(&claim.relationship_id)
            .await?
            .filter(|rel| rel.kind == kind && rel.involves(a) && rel.involves(b)))
    }

    /// Every edge touching `profile_id`, in adjacency-index order
    ///
    /// Index entries whose edge no longer exists are skipped, so the result
    /// may be shorter than the index.
    pub async fn get_profile_relationships(&self, profile_id: &ProfileId) -> Result<Vec<Relationship>> {
        let index = load_index(self.store.as_ref(), profile_id).await?;
        let loaded = try_join_all(index.iter().map(|id| self.get_relationship(id))).await?;

        let mut relationships = Vec::with_capacity(loaded.len());
        for (id, relationship) in index.iter().zip(loaded) {
            match relationship {
                Some(rel) if rel.involves(profile_id) => relationships.push(rel),
                Some(_) => warn!(%profile_id, relationship_id = %id, "index entry points at foreign edge"),
                None => warn!(%profile_id, relationship_id = %id, "skipping stale index entry"),
            }
        }
        Ok(relationships)
    }

    /// Edges of one kind touching `profile_id`, in adjacency-index order
    pub async fn get_profile_relationships_by_type(
        &self,
        profile_id: &ProfileId,
        kind: RelationshipKind,
    ) -> Result<Vec<Relationship>> {
        let mut relationships = self.get_profile_relationships(profile_id).await?;
        relationships.retain(|rel| rel.kind == kind);
        Ok(relationships)
    }

    /// Spouses of `profile_id`, annotated with edge id and marriage metadata
    pub async fn get_spouses(&self, profile_id: &ProfileId) -> Result<Vec<RelatedProfile>> {
        let edges = self
            .get_profile_relationships_by_type(profile_id, RelationshipKind::Spouse)
            .await?;
        self.resolve(edges, |rel| rel.other_endpoint(profile_id).cloned(), RelatedProfile::spouse_via)
            .await
    }

    /// Siblings of `profile_id`, annotated with edge id
    pub async fn get_siblings(&self, profile_id: &ProfileId) -> Result<Vec<RelatedProfile>> {
        let edges = self
            .get_profile_relationships_by_type(profile_id, RelationshipKind::Sibling)
            .await?;
        self.resolve(edges, |rel| rel.other_endpoint(profile_id).cloned(), RelatedProfile::via)
            .await
    }

    /// Parents of `profile_id`: first endpoints of parent edges where it is the second
    pub async fn get_parents(&self, profile_id: &ProfileId) -> Result<Vec<RelatedProfile>> {
        let edges = self
            .get_profile_relationships_by_type(profile_id, RelationshipKind::Parent)
            .await?;
        self.resolve(
            edges,
            |rel| (&rel.profile_id_2 == profile_id).then(|| rel.profile_id_1.clone()),
            RelatedProfile::via,
        )
        .await
    }

    /// Children of `profile_id`: second endpoints of parent edges where it is the first
    pub async fn get_children(&self, profile_id: &ProfileId) -> Result<Vec<RelatedProfile>> {
        let edges = self
            .get_profile_relationships_by_type(profile_id, RelationshipKind::Parent)
            .await?;
        self.resolve(
            edges,
            |rel| (&rel.profile_id_1 == profile_id).then(|| rel.profile_id_2.clone()),
            RelatedProfile::via,
        )
        .await
    }

    /// Load the profile `pick` selects from each edge, skipping edges it rejects
    /// and profiles that no longer exist
    async fn resolve<P, A>(
        &self,
        edges: Vec<Relationship>,
        pick: P,
        annotate: A,
    ) -> Result<Vec<RelatedProfile>>
    where
        P: Fn(&Relationship) -> Option<ProfileId>,
        A: Fn(Profile, &Relationship) -> RelatedProfile,
    {
        let selected: Vec<(Relationship, ProfileId)> = edges
            .into_iter()
            .filter_map(|rel| pick(&rel).map(|other| (rel, other)))
            .collect();

        let profiles =
            try_join_all(selected.iter().map(|(_, other)| self.profiles.get_profile(other))).await?;

        Ok(selected
            .iter()
            .zip(profiles)
            .filter_map(|((rel, _), profile)| profile.map(|p| annotate(p, rel)))
            .collect())
    }

    /// Merge `updates` into an edge, stamping `user_id` as the editor
    ///
    /// Changing the kind moves the edge to a new pair key; the move fails
    /// with `Conflict` when another edge already holds it.
    pub async fn update_relationship(
        &self,
        id: &RelationshipId,
        updates: RelationshipUpdate,
        user_id: &str,
    ) -> Result<Relationship> {
        let mut relationship = self
            .get_relationship(id)
            .await?
            .ok_or_else(|| GraphError::NotFound(format!("Relationship {} not found", id)))?;

        let old_claim = PairClaim::for_relationship(&relationship);
        relationship.apply(updates, user_id, now_millis());
        let new_claim = PairClaim::for_relationship(&relationship);
        let kind_changed = old_claim.kind != new_claim.kind;

        if kind_changed {
            self.claim_pair(&new_claim).await?;
        }

        let edge_key = keys::relationship(id);
        let mut writes = vec![KvWrite::put(&edge_key, encode(&edge_key, &relationship)?)];
        if kind_changed {
            writes.push(KvWrite::delete(old_claim.key()));
        }

        if let Err(e) = self.store.apply(writes).await.map_err(GraphError::store) {
            if kind_changed {
                if let Err(release_err) = self.release_pair(&new_claim).await {
                    warn!(
                        pair_key = %new_claim.key(),
                        error = %release_err,
                        "failed to release pair key after write error"
                    );
                }
            }
            return Err(e);
        }

        debug!(relationship_id = %id, user_id, "updated relationship");
        Ok(relationship)
    }

    /// Remove an edge from both adjacency indices, then delete it
    pub async fn delete_relationship(&self, id: &RelationshipId) -> Result<()> {
        let relationship = self
            .get_relationship(id)
            .await?
            .ok_or_else(|| GraphError::NotFound(format!("Relationship {} not found", id)))?;

        let store = self.store.as_ref();
        let mut writes = Vec::with_capacity(4);
        for endpoint in [&relationship.profile_id_1, &relationship.profile_id_2] {
            let mut index = load_index(store, endpoint).await?;
            index.retain(|entry| entry != id);
            let index_key = keys::profile_relationships(endpoint);
            writes.push(if index.is_empty() {
                KvWrite::delete(index_key)
            } else {
                KvWrite::put(&index_key, encode(&index_key, &index)?)
            });
        }
        writes.push(KvWrite::delete(keys::relationship(id)));

        let claim = PairClaim::for_relationship(&relationship);
        let holder: Option<PairClaim> = load(store, &claim.key()).await?;
        if holder.is_some_and(|h| &h.relationship_id == id) {
            writes.push(KvWrite::delete(claim.key()));
        }

        store.apply(writes).await.map_err(GraphError::store)?;
        info!(relationship_id = %id, "deleted relationship");
        Ok(())
    }

    /// Every edge in the store
    pub async fn get_all_relationships(&self) -> Result<Vec<Relationship>> {
        load_all(self.store.as_ref(), keys::RELATIONSHIP_PREFIX).await
    }
}

pub(crate) fn push_unique(index: &mut Vec<RelationshipId>, id: &RelationshipId) {
    if !index.contains(id) {
        index.push(id.clone());
    }
}
