//! Typed access to JSON records in the key-value store

use crate::{GraphError, Result};
use roots_domain::{keys, KeyValueStore, ProfileId, RelationshipId};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

pub(crate) async fn load<S, T>(store: &S, key: &str) -> Result<Option<T>>
where
    S: KeyValueStore,
    T: DeserializeOwned,
{
    match store.get(key).await.map_err(GraphError::store)? {
        Some(value) => decode(key, value).map(Some),
        None => Ok(None),
    }
}

pub(crate) async fn load_all<S, T>(store: &S, prefix: &str) -> Result<Vec<T>>
where
    S: KeyValueStore,
    T: DeserializeOwned,
{
    store
        .get_by_prefix(prefix)
        .await
        .map_err(GraphError::store)?
        .into_iter()
        .map(|value| decode(prefix, value))
        .collect()
}

pub(crate) fn encode<T: Serialize>(key: &str, record: &T) -> Result<Value> {
    serde_json::to_value(record).map_err(|source| GraphError::Serialization {
        key: key.to_string(),
        source,
    })
}

fn decode<T: DeserializeOwned>(key: &str, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|source| GraphError::Serialization {
        key: key.to_string(),
        source,
    })
}

/// Relationship ids listed in a profile's adjacency index (empty when absent)
pub(crate) async fn load_index<S: KeyValueStore>(
    store: &S,
    profile_id: &ProfileId,
) -> Result<Vec<RelationshipId>> {
    Ok(load(store, &keys::profile_relationships(profile_id))
        .await?
        .unwrap_or_default())
}
