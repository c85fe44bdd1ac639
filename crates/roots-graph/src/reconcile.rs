//! Rebuild adjacency indices and pair keys from the edge records
//!
//! Index appends are read-modify-write without compare-and-swap, so two
//! concurrent writers to one profile's index can lose an entry. This pass
//! treats `relationship:<id>` records as the source of truth and rewrites
//! everything derived from them.

use crate::engine::{PairClaim, RelationshipGraph};
use crate::records::{encode, load_all, load_index};
use crate::{GraphError, Result};
use roots_domain::{keys, KeyValueStore, KvWrite, ProfileId, Relationship, RelationshipId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::info;

/// Summary of a reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    /// Edge records examined
    pub relationships: usize,
    /// Adjacency indices that were rewritten
    pub indices_rewritten: usize,
    /// Index entries dropped because their edge is missing or foreign
    pub stale_index_entries: usize,
    /// Pair keys written or repointed
    pub pair_keys_restored: usize,
    /// Pair keys deleted because no edge holds them
    pub pair_keys_released: usize,
    /// Edges that duplicate another edge's pair and kind (left in place)
    pub duplicate_relationships: Vec<RelationshipId>,
}

impl<S: KeyValueStore> RelationshipGraph<S> {
    /// Re-derive every adjacency index and pair key from the edge set
    ///
    /// Existing index order is preserved for entries that survive; missing
    /// entries are appended in edge-id order. All repairs are written in
    /// one atomic batch.
    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        let store = self.store.as_ref();
        let relationships = self.get_all_relationships().await?;
        let by_id: HashMap<&RelationshipId, &Relationship> =
            relationships.iter().map(|rel| (&rel.id, rel)).collect();

        let mut report = ReconcileReport {
            relationships: relationships.len(),
            ..Default::default()
        };
        let mut writes = Vec::new();

        // Adjacency indices
        let mut desired: BTreeMap<&ProfileId, Vec<&RelationshipId>> = BTreeMap::new();
        for rel in &relationships {
            desired.entry(&rel.profile_id_1).or_default().push(&rel.id);
            desired.entry(&rel.profile_id_2).or_default().push(&rel.id);
        }

        let profiles = self.profiles.list_profiles(None).await?;
        let candidates: BTreeSet<&ProfileId> = profiles
            .iter()
            .map(|profile| &profile.id)
            .chain(desired.keys().copied())
            .collect();

        for profile_id in candidates {
            let current = load_index(store, profile_id).await?;
            let wanted: HashSet<&RelationshipId> = desired
                .get(profile_id)
                .map(|ids| ids.iter().copied().collect())
                .unwrap_or_default();

            let mut rebuilt: Vec<RelationshipId> = Vec::with_capacity(wanted.len());
            for id in &current {
                if wanted.contains(id) && !rebuilt.contains(id) {
                    rebuilt.push(id.clone());
                } else {
                    report.stale_index_entries += 1;
                }
            }
            for id in desired.get(profile_id).into_iter().flatten() {
                if !rebuilt.contains(id) {
                    rebuilt.push((*id).clone());
                }
            }

            if rebuilt != current {
                report.indices_rewritten += 1;
                let key = keys::profile_relationships(profile_id);
                writes.push(if rebuilt.is_empty() {
                    KvWrite::delete(key)
                } else {
                    KvWrite::put(&key, encode(&key, &rebuilt)?)
                });
            }
        }

        // Pair keys
        let existing: Vec<PairClaim> = load_all(store, keys::RELATIONSHIP_PAIR_PREFIX).await?;
        let existing_by_key: HashMap<String, PairClaim> = existing
            .into_iter()
            .map(|claim| (claim.key(), claim))
            .collect();

        let mut holders: BTreeMap<String, &Relationship> = BTreeMap::new();
        for (key, claim) in &existing_by_key {
            if let Some(rel) = by_id.get(&claim.relationship_id) {
                if PairClaim::for_relationship(rel).key() == *key {
                    holders.insert(key.clone(), *rel);
                }
            }
        }
        for rel in &relationships {
            let key = PairClaim::for_relationship(rel).key();
            let holder = holders.entry(key).or_insert(rel);
            if holder.id != rel.id {
                report.duplicate_relationships.push(rel.id.clone());
            }
        }

        for (key, holder) in &holders {
            let claim = PairClaim::for_relationship(holder);
            if existing_by_key.get(key) != Some(&claim) {
                report.pair_keys_restored += 1;
                writes.push(KvWrite::put(key, encode(key, &claim)?));
            }
        }
        for key in existing_by_key.keys() {
            if !holders.contains_key(key) {
                report.pair_keys_released += 1;
                writes.push(KvWrite::delete(key));
            }
        }

        if !writes.is_empty() {
            store.apply(writes).await.map_err(GraphError::store)?;
        }

        info!(
            relationships = report.relationships,
            indices_rewritten = report.indices_rewritten,
            stale_index_entries = report.stale_index_entries,
            pair_keys_restored = report.pair_keys_restored,
            pair_keys_released = report.pair_keys_released,
            duplicates = report.duplicate_relationships.len(),
            "reconciled relationship indices"
        );
        Ok(report)
    }
}
