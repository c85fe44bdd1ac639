//! Profile directory: person records and invitation-based claiming

use crate::records::{encode, load, load_all};
use crate::{GraphError, Result};
use roots_domain::{
    keys, now_millis, KeyValueStore, KvWrite, NewProfile, Profile, ProfileId, ProfileUpdate,
};
use std::sync::Arc;
use tracing::{info, warn};

/// CRUD over `profile:<id>` records plus invitation tokens
pub struct ProfileDirectory<S> {
    store: Arc<S>,
}

impl<S> Clone for ProfileDirectory<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: KeyValueStore> ProfileDirectory<S> {
    /// Create a directory over `store`
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Create a new, unclaimed profile
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when the display name is blank.
    pub async fn create_profile(&self, input: NewProfile, created_by: &str) -> Result<Profile> {
        if input.name.trim().is_empty() {
            return Err(GraphError::InvalidArgument(
                "Profile name must not be empty".to_string(),
            ));
        }

        let profile = Profile::from_new(ProfileId::generate(), input, created_by, now_millis());
        self.put(&profile).await?;

        info!(profile_id = %profile.id, created_by, "created profile");
        Ok(profile)
    }

    /// Get a profile by id
    pub async fn get_profile(&self, id: &ProfileId) -> Result<Option<Profile>> {
        load(self.store.as_ref(), &keys::profile(id)).await
    }

    /// Get a profile by id, failing with `NotFound` when it does not exist
    pub async fn require_profile(&self, id: &ProfileId) -> Result<Profile> {
        self.get_profile(id)
            .await?
            .ok_or_else(|| GraphError::NotFound(format!("Profile {} not found", id)))
    }

    /// List profiles in id order, at most `limit` of them
    pub async fn list_profiles(&self, limit: Option<usize>) -> Result<Vec<Profile>> {
        let mut profiles: Vec<Profile> = load_all(self.store.as_ref(), keys::PROFILE_PREFIX).await?;
        if let Some(limit) = limit {
            profiles.truncate(limit);
        }
        Ok(profiles)
    }

    /// Merge `update` into an existing profile
    pub async fn update_profile(&self, id: &ProfileId, update: ProfileUpdate) -> Result<Profile> {
        let mut profile = self.require_profile(id).await?;
        if matches!(&update.name, Some(name) if name.trim().is_empty()) {
            return Err(GraphError::InvalidArgument(
                "Profile name must not be empty".to_string(),
            ));
        }

        profile.apply(update, now_millis());
        self.put(&profile).await?;
        Ok(profile)
    }

    /// Issue a one-time invitation token for an unclaimed profile
    ///
    /// A previously issued token for the same profile stops working.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown profile, `Conflict` when the profile is
    /// already claimed.
    pub async fn issue_invitation(&self, id: &ProfileId) -> Result<String> {
        let mut profile = self.require_profile(id).await?;
        if profile.is_claimed() || self.claim_holder(id).await?.is_some() {
            return Err(GraphError::Conflict(format!(
                "Profile {} has already been claimed",
                id
            )));
        }

        let token = uuid::Uuid::new_v4().simple().to_string();
        let mut writes = Vec::with_capacity(3);
        if let Some(previous) = profile.invitation_token.take() {
            writes.push(KvWrite::delete(keys::invitation(&previous)));
        }
        writes.push(KvWrite::put(
            keys::invitation(&token),
            encode(&keys::invitation(&token), &profile.id)?,
        ));

        profile.invitation_token = Some(token.clone());
        profile.updated_at = now_millis();
        let profile_key = keys::profile(&profile.id);
        writes.push(KvWrite::put(&profile_key, encode(&profile_key, &profile)?));

        self.store.apply(writes).await.map_err(GraphError::store)?;
        info!(profile_id = %profile.id, "issued invitation");
        Ok(token)
    }

    /// Bind a profile to `user_id` using an invitation token
    ///
    /// When `expected_profile` is given, the token must have been issued for
    /// that profile. The token is consumed on success. Ownership is taken
    /// through a write-once `profile_claim:<id>` key, so of several
    /// concurrent claims exactly one succeeds.
    ///
    /// # Errors
    ///
    /// - `NotFound` when the token or its profile does not exist
    /// - `Conflict` when the profile is already claimed
    /// - `Unauthorized` when the token was not issued for the profile
    pub async fn claim_profile(
        &self,
        token: &str,
        expected_profile: Option<&ProfileId>,
        user_id: &str,
    ) -> Result<Profile> {
        let invitation_key = keys::invitation(token);
        let profile_id: ProfileId = load(self.store.as_ref(), &invitation_key)
            .await?
            .ok_or_else(|| GraphError::NotFound("Invitation not found".to_string()))?;

        if let Some(expected) = expected_profile {
            if expected != &profile_id {
                return Err(GraphError::Unauthorized(
                    "Invitation was issued for a different profile".to_string(),
                ));
            }
        }

        let mut profile = self.require_profile(&profile_id).await?;
        if profile.is_claimed() {
            return Err(GraphError::Conflict(format!(
                "Profile {} has already been claimed",
                profile_id
            )));
        }
        if profile.invitation_token.as_deref() != Some(token) {
            return Err(GraphError::Unauthorized(
                "Invitation token does not match profile".to_string(),
            ));
        }

        profile.user_id = Some(user_id.to_string());
        profile.invitation_token = None;
        profile.updated_at = now_millis();
        let profile_key = keys::profile(&profile.id);
        let profile_value = encode(&profile_key, &profile)?;

        let claim_key = keys::profile_claim(&profile_id);
        if !self
            .store
            .set_if_absent(&claim_key, encode(&claim_key, &user_id)?)
            .await
            .map_err(GraphError::store)?
        {
            return Err(GraphError::Conflict(format!(
                "Profile {} has already been claimed",
                profile_id
            )));
        }

        let written = self
            .store
            .apply(vec![
                KvWrite::put(&profile_key, profile_value),
                KvWrite::delete(invitation_key),
            ])
            .await
            .map_err(GraphError::store);
        if let Err(e) = written {
            // Let a later claim retry with the same token
            if let Err(release_err) = self.store.del(&claim_key).await {
                warn!(claim_key = %claim_key, error = %release_err, "failed to release profile claim");
            }
            return Err(e);
        }

        info!(profile_id = %profile.id, user_id, "profile claimed");
        Ok(profile)
    }

    /// User id recorded by the claim lock of `id`, if any
    async fn claim_holder(&self, id: &ProfileId) -> Result<Option<String>> {
        load(self.store.as_ref(), &keys::profile_claim(id)).await
    }

    async fn put(&self, profile: &Profile) -> Result<()> {
        let key = keys::profile(&profile.id);
        let value = encode(&key, profile)?;
        self.store.set(&key, value).await.map_err(GraphError::store)
    }

    /// Store a profile record as-is (imports and fixtures with known ids)
    pub async fn insert_profile(&self, profile: &Profile) -> Result<()> {
        self.put(profile).await
    }
}
