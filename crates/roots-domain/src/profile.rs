//! Profile module - one person in the family graph

use crate::ProfileId;
use serde::{Deserialize, Serialize};

/// A person record
///
/// Profiles are created by an admin on behalf of a family and later claimed
/// by a user account through a one-time invitation token. They are never
/// hard-deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Unique identifier
    pub id: ProfileId,

    /// Display name
    pub name: String,

    /// Name in the family's local or native language
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_name: Option<String>,

    /// Birth date as entered (free-form, usually ISO `YYYY-MM-DD`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,

    /// Death date as entered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub death_date: Option<String>,

    /// Reference to a photo held by the object store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,

    /// Short biography
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,

    /// Account that created the profile
    pub created_by: String,

    /// Owning account, `None` until the profile is claimed
    #[serde(default)]
    pub user_id: Option<String>,

    /// Outstanding invitation token, if one has been issued
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invitation_token: Option<String>,

    /// Creation time (Unix milliseconds)
    pub created_at: u64,

    /// Last update time (Unix milliseconds)
    pub updated_at: u64,
}

impl Profile {
    /// Whether a user account already owns this profile
    pub fn is_claimed(&self) -> bool {
        self.user_id.is_some()
    }

    /// Build a profile from creation input
    pub fn from_new(id: ProfileId, input: NewProfile, created_by: &str, now: u64) -> Self {
        Self {
            id,
            name: input.name,
            local_name: input.local_name,
            birth_date: input.birth_date,
            death_date: input.death_date,
            photo_url: input.photo_url,
            bio: input.bio,
            created_by: created_by.to_string(),
            user_id: None,
            invitation_token: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Merge the fields present in `update`, leaving the rest untouched
    pub fn apply(&mut self, update: ProfileUpdate, now: u64) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(local_name) = update.local_name {
            self.local_name = Some(local_name);
        }
        if let Some(birth_date) = update.birth_date {
            self.birth_date = Some(birth_date);
        }
        if let Some(death_date) = update.death_date {
            self.death_date = Some(death_date);
        }
        if let Some(photo_url) = update.photo_url {
            self.photo_url = Some(photo_url);
        }
        if let Some(bio) = update.bio {
            self.bio = Some(bio);
        }
        self.updated_at = now;
    }
}

/// Input for creating a profile
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewProfile {
    /// Display name
    pub name: String,
    /// Local or native name
    #[serde(default)]
    pub local_name: Option<String>,
    /// Birth date
    #[serde(default)]
    pub birth_date: Option<String>,
    /// Death date
    #[serde(default)]
    pub death_date: Option<String>,
    /// Photo reference
    #[serde(default)]
    pub photo_url: Option<String>,
    /// Short biography
    #[serde(default)]
    pub bio: Option<String>,
}

impl NewProfile {
    /// Creation input carrying only a display name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Partial update of a profile's descriptive fields
///
/// Ownership, invitation state and timestamps are not updatable through
/// this type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    /// New display name
    #[serde(default)]
    pub name: Option<String>,
    /// New local name
    #[serde(default)]
    pub local_name: Option<String>,
    /// New birth date
    #[serde(default)]
    pub birth_date: Option<String>,
    /// New death date
    #[serde(default)]
    pub death_date: Option<String>,
    /// New photo reference
    #[serde(default)]
    pub photo_url: Option<String>,
    /// New biography
    #[serde(default)]
    pub bio: Option<String>,
}
